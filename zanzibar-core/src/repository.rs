use crate::{
    error::Result,
    models::{Identifier, Page, Tuple, TuplePage},
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Storage for relationship tuples.
///
/// Implementations must make `insert` and `delete` atomic check-and-set
/// operations: concurrent inserts of the same tuple store it once and exactly
/// one of them reports `true`.
#[async_trait]
pub trait TupleStore: Send + Sync {
    /// Add the tuple if absent; `false` means it was already present
    async fn insert(&self, tuple: &Tuple) -> Result<bool>;

    /// Remove the tuple if present; `false` means there was nothing to remove
    async fn delete(&self, tuple: &Tuple) -> Result<bool>;

    /// Exact membership test
    async fn exists(&self, object: &Identifier, relation: &str, user: &Identifier) -> Result<bool>;

    /// All users stored against `(object, relation)`, sorted
    async fn users(&self, object: &Identifier, relation: &str) -> Result<Vec<Identifier>>;

    async fn list_by_object(&self, object: &Identifier, page: Page) -> Result<TuplePage>;

    async fn list_by_user(&self, user: &Identifier, page: Page) -> Result<TuplePage>;

    /// Total number of stored tuples
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

type RelationIndex = HashMap<String, HashSet<Identifier>>;

/// In-memory tuple store.
///
/// Tuples are grouped per object; the object's map entry lock serializes
/// writes to that object, so an insert racing a delete of the same tuple is
/// decided by whichever takes the entry lock last. A reverse index by user is
/// maintained while that lock is held. Lock order is always object then user.
pub struct InMemoryTupleStore {
    objects: DashMap<Identifier, RelationIndex>,
    users: DashMap<Identifier, HashSet<(Identifier, String)>>,
}

impl InMemoryTupleStore {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            users: DashMap::new(),
        }
    }
}

impl Default for InMemoryTupleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TupleStore for InMemoryTupleStore {
    async fn insert(&self, tuple: &Tuple) -> Result<bool> {
        let mut relations = self.objects.entry(tuple.object.clone()).or_default();
        let inserted = relations
            .entry(tuple.relation.clone())
            .or_default()
            .insert(tuple.user.clone());
        if inserted {
            self.users
                .entry(tuple.user.clone())
                .or_default()
                .insert((tuple.object.clone(), tuple.relation.clone()));
        }
        drop(relations);

        debug!(tuple = %tuple, inserted, "Tuple insert");
        Ok(inserted)
    }

    async fn delete(&self, tuple: &Tuple) -> Result<bool> {
        let existed = match self.objects.get_mut(&tuple.object) {
            Some(mut relations) => {
                let existed = relations
                    .get_mut(&tuple.relation)
                    .is_some_and(|users| users.remove(&tuple.user));
                if existed {
                    relations.retain(|_, users| !users.is_empty());
                    if let Some(mut grants) = self.users.get_mut(&tuple.user) {
                        grants.remove(&(tuple.object.clone(), tuple.relation.clone()));
                    }
                }
                existed
            }
            None => false,
        };

        if existed {
            self.objects
                .remove_if(&tuple.object, |_, relations| relations.is_empty());
            self.users.remove_if(&tuple.user, |_, grants| grants.is_empty());
        }

        debug!(tuple = %tuple, existed, "Tuple delete");
        Ok(existed)
    }

    async fn exists(&self, object: &Identifier, relation: &str, user: &Identifier) -> Result<bool> {
        Ok(self.objects.get(object).is_some_and(|relations| {
            relations
                .get(relation)
                .is_some_and(|users| users.contains(user))
        }))
    }

    async fn users(&self, object: &Identifier, relation: &str) -> Result<Vec<Identifier>> {
        let mut users: Vec<Identifier> = self
            .objects
            .get(object)
            .and_then(|relations| relations.get(relation).map(|u| u.iter().cloned().collect()))
            .unwrap_or_default();
        users.sort();
        Ok(users)
    }

    async fn list_by_object(&self, object: &Identifier, page: Page) -> Result<TuplePage> {
        let all: Vec<Tuple> = self
            .objects
            .get(object)
            .map(|relations| {
                relations
                    .iter()
                    .flat_map(|(relation, users)| {
                        users
                            .iter()
                            .map(|user| Tuple::new(object.clone(), relation, user.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(TuplePage::from_sorted(all, page))
    }

    async fn list_by_user(&self, user: &Identifier, page: Page) -> Result<TuplePage> {
        let all: Vec<Tuple> = self
            .users
            .get(user)
            .map(|grants| {
                grants
                    .iter()
                    .map(|(object, relation)| Tuple::new(object.clone(), relation, user.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(TuplePage::from_sorted(all, page))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self
            .objects
            .iter()
            .map(|entry| entry.value().values().map(HashSet::len).sum::<usize>())
            .sum())
    }
}

use crate::{
    check::DEFAULT_MAX_DEPTH,
    error::{Result, ZanzibarError},
    models::{Anomaly, Identifier},
    namespace::NamespaceRegistry,
    repository::TupleStore,
    schema::{NamespaceDefinition, RewriteRule},
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Who holds a relation on an object, and through which relations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersetTree {
    pub object: Identifier,
    pub relation: String,
    /// Users granted by tuples stored against this relation
    pub direct: Vec<Identifier>,
    /// One subtree per computed userset reached from this relation's rule
    pub children: Vec<UsersetTree>,
    /// Set when this branch was cut by the cycle or depth guard
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated: Option<Anomaly>,
    /// The relation was already expanded elsewhere in this tree; this node
    /// is a reference to that subtree and carries no users of its own.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub repeated: bool,
}

impl UsersetTree {
    fn leaf(object: &Identifier, relation: &str) -> Self {
        Self {
            object: object.clone(),
            relation: relation.to_string(),
            direct: Vec::new(),
            children: Vec::new(),
            truncated: None,
            repeated: false,
        }
    }

    /// Every user in the tree, sorted and de-duplicated
    pub fn users(&self) -> Vec<Identifier> {
        let mut users = BTreeSet::new();
        self.collect(&mut users);
        users.into_iter().collect()
    }

    /// Number of nodes, this one included
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(UsersetTree::node_count).sum::<usize>()
    }

    fn collect(&self, out: &mut BTreeSet<Identifier>) {
        out.extend(self.direct.iter().cloned());
        for child in &self.children {
            child.collect(out);
        }
    }
}

/// Per-expansion state. A relation is expanded in full again only when it
/// is reached at a shallower depth than before, so the depth bound cannot
/// hide users; other occurrences become `repeated` leaves.
struct ExpandContext {
    active: HashSet<String>,
    /// Relation -> shallowest depth it was expanded at
    expanded: HashMap<String, u32>,
    deadline: Instant,
    timeout: Duration,
}

impl ExpandContext {
    fn new(timeout: Duration) -> Self {
        Self {
            active: HashSet::new(),
            expanded: HashMap::new(),
            deadline: Instant::now() + timeout,
            timeout,
        }
    }

    fn deadline_error(&self) -> ZanzibarError {
        ZanzibarError::DeadlineExceeded {
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Subject expander lists the users that hold a relation on an object
pub struct SubjectExpander {
    store: Arc<dyn TupleStore>,
    registry: Arc<NamespaceRegistry>,
    max_depth: u32,
}

impl SubjectExpander {
    pub fn new(store: Arc<dyn TupleStore>, registry: Arc<NamespaceRegistry>) -> Self {
        Self {
            store,
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Build the userset tree of `relation` on `object`
    ///
    /// # Errors
    /// `NamespaceNotFound`/`RelationNotFound` for configuration gaps,
    /// `DeadlineExceeded` when expansion outlives `timeout`.
    pub async fn expand(
        &self,
        object: &Identifier,
        relation: &str,
        timeout: Duration,
    ) -> Result<UsersetTree> {
        let namespace = self.registry.get(object.kind())?;
        namespace.rule(relation)?;

        let mut ctx = ExpandContext::new(timeout);
        let expansion = self.expand_relation(&namespace, object, relation, &mut ctx, 0);
        let outcome = tokio::time::timeout(timeout, expansion).await;
        match outcome {
            Ok(tree) => tree,
            Err(_) => Err(ctx.deadline_error()),
        }
    }

    /// Flattened users holding `relation` on `object`
    pub async fn list_users(
        &self,
        object: &Identifier,
        relation: &str,
        timeout: Duration,
    ) -> Result<Vec<Identifier>> {
        Ok(self.expand(object, relation, timeout).await?.users())
    }

    fn expand_relation<'a>(
        &'a self,
        namespace: &'a NamespaceDefinition,
        object: &'a Identifier,
        relation: &'a str,
        ctx: &'a mut ExpandContext,
        depth: u32,
    ) -> BoxFuture<'a, Result<UsersetTree>> {
        Box::pin(async move {
            if Instant::now() >= ctx.deadline {
                return Err(ctx.deadline_error());
            }

            let mut tree = UsersetTree::leaf(object, relation);
            if depth > self.max_depth {
                tree.truncated = Some(Anomaly::DepthExceeded {
                    relation: relation.to_string(),
                    max_depth: self.max_depth,
                });
                return Ok(tree);
            }
            if ctx.active.contains(relation) {
                tree.truncated = Some(Anomaly::Cycle {
                    object: object.to_string(),
                    relation: relation.to_string(),
                });
                return Ok(tree);
            }
            if ctx.expanded.get(relation).is_some_and(|&seen| seen <= depth) {
                tree.repeated = true;
                return Ok(tree);
            }

            debug!(%object, relation, depth, "Expanding relation");
            ctx.active.insert(relation.to_string());

            let mut direct = false;
            let mut computed = Vec::new();
            flatten_rule(namespace.rule(relation)?, &mut direct, &mut computed);

            let result = async {
                if direct {
                    tree.direct = self.store.users(object, relation).await?;
                }
                for target in computed {
                    let child = self
                        .expand_relation(namespace, object, target, ctx, depth.saturating_add(1))
                        .await?;
                    tree.children.push(child);
                }
                Ok::<_, ZanzibarError>(())
            }
            .await;

            ctx.active.remove(relation);
            result?;
            ctx.expanded.insert(relation.to_string(), depth);
            Ok(tree)
        })
    }
}

/// Union membership is order-insensitive for expansion: collect whether any
/// branch is direct and which relations are computed from.
fn flatten_rule<'a>(rule: &'a RewriteRule, direct: &mut bool, computed: &mut Vec<&'a str>) {
    match rule {
        RewriteRule::Direct => *direct = true,
        RewriteRule::ComputedUserset { relation } => {
            if !computed.contains(&relation.as_str()) {
                computed.push(relation);
            }
        }
        RewriteRule::Union(children) => {
            for child in children {
                flatten_rule(child, direct, computed);
            }
        }
    }
}

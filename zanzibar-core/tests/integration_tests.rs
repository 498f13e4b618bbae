//! Integration tests for the authorization engine
//!
//! These walk the document hierarchy scenarios end to end:
//! 1. Owner inherits editor and viewer
//! 2. Editor inherits viewer but not owner
//! 3. Revocation removes derived access
//! 4. Grants never leak across objects
//! 5. Cyclic schemas fail closed
//! 6. Concurrent writers converge on a single tuple
//! 7. Slow storage hits the check deadline
//! 8. Shared relations are looked up once per check
//! 9. Storage failures surface as errors

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use zanzibar_core::*;

// Helper to create test engine with the document namespace loaded
fn create_test_engine() -> Arc<AuthorizationEngine> {
    let engine = AuthorizationEngine::in_memory(EngineConfig::default());
    engine
        .define_namespace("doc", document_namespace())
        .unwrap();
    Arc::new(engine)
}

fn id(raw: &str) -> Identifier {
    Identifier::parse(raw).unwrap()
}

async fn grant(engine: &AuthorizationEngine, object: &str, relation: &str, user: &str) -> bool {
    engine
        .write_tuple(&Tuple::parse(object, relation, user).unwrap())
        .await
        .unwrap()
}

async fn holds(engine: &AuthorizationEngine, object: &str, relation: &str, user: &str) -> bool {
    engine.check(&id(object), relation, &id(user)).await.unwrap()
}

#[tokio::test]
async fn test_owner_inherits_all_relations() {
    let engine = create_test_engine();

    assert!(grant(&engine, "doc:readme", "owner", "user:alice").await);

    assert!(holds(&engine, "doc:readme", "owner", "user:alice").await);
    assert!(holds(&engine, "doc:readme", "editor", "user:alice").await, "owner should imply editor");
    assert!(holds(&engine, "doc:readme", "viewer", "user:alice").await, "owner should imply viewer");

    let relations = engine
        .accessible_relations(&id("doc:readme"), &id("user:alice"))
        .await
        .unwrap();
    assert_eq!(relations, vec!["editor", "owner", "viewer"]);
}

#[tokio::test]
async fn test_no_reverse_inheritance() {
    let engine = create_test_engine();

    grant(&engine, "doc:readme", "editor", "user:bob").await;
    grant(&engine, "doc:readme", "viewer", "user:carol").await;

    assert!(holds(&engine, "doc:readme", "viewer", "user:bob").await);
    assert!(!holds(&engine, "doc:readme", "owner", "user:bob").await, "editor must not imply owner");
    assert!(!holds(&engine, "doc:readme", "editor", "user:carol").await, "viewer must not imply editor");
    assert!(!holds(&engine, "doc:readme", "owner", "user:carol").await);
}

#[tokio::test]
async fn test_insert_is_idempotent() {
    let engine = create_test_engine();

    assert!(grant(&engine, "doc:readme", "viewer", "user:carol").await);
    assert!(!grant(&engine, "doc:readme", "viewer", "user:carol").await);

    let page = engine
        .list_tuples_by_object(&id("doc:readme"), Page::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);
}

#[tokio::test]
async fn test_revocation_removes_derived_access() {
    let engine = create_test_engine();
    let tuple = Tuple::parse("doc:readme", "owner", "user:alice").unwrap();

    engine.write_tuple(&tuple).await.unwrap();
    assert!(holds(&engine, "doc:readme", "viewer", "user:alice").await);

    assert!(engine.delete_tuple(&tuple).await.unwrap());
    assert!(!holds(&engine, "doc:readme", "owner", "user:alice").await);
    assert!(!holds(&engine, "doc:readme", "viewer", "user:alice").await, "derived access should go with the tuple");

    assert!(!engine.delete_tuple(&tuple).await.unwrap());
}

#[tokio::test]
async fn test_objects_are_isolated() {
    let engine = create_test_engine();

    grant(&engine, "doc:readme", "owner", "user:alice").await;

    assert!(!holds(&engine, "doc:changelog", "viewer", "user:alice").await);
    assert!(!holds(&engine, "doc:readme", "viewer", "user:mallory").await);
}

#[tokio::test]
async fn test_unknown_namespace_and_relation_are_errors() {
    let engine = create_test_engine();

    let err = engine
        .check(&id("folder:f1"), "viewer", &id("user:alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ZanzibarError::NamespaceNotFound(_)));

    let err = engine
        .check(&id("doc:readme"), "commenter", &id("user:alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ZanzibarError::RelationNotFound { .. }));
}

#[tokio::test]
async fn test_cyclic_schema_fails_closed() {
    let engine = AuthorizationEngine::in_memory(EngineConfig::default());
    let mut relations = BTreeMap::new();
    relations.insert("a".to_string(), RewriteRule::computed("b"));
    relations.insert("b".to_string(), RewriteRule::computed("a"));
    engine.define_namespace("loop", relations).unwrap();

    let request = CheckRequest::new(id("loop:l1"), "a", id("user:alice"));
    let result = engine.check_request(&request).await.unwrap();

    assert!(!result.authorized);
    assert!(result
        .anomalies
        .iter()
        .any(|anomaly| matches!(anomaly, Anomaly::Cycle { .. })));
}

#[tokio::test]
async fn test_cyclic_schema_can_be_rejected() {
    let engine = AuthorizationEngine::in_memory(EngineConfig {
        reject_cyclic_namespaces: true,
        ..EngineConfig::default()
    });
    let mut relations = BTreeMap::new();
    relations.insert("a".to_string(), RewriteRule::computed("b"));
    relations.insert("b".to_string(), RewriteRule::computed("a"));

    let err = engine.define_namespace("loop", relations).unwrap_err();
    assert!(matches!(err, ZanzibarError::InvalidSchema(_)));
    assert!(engine.list_namespaces().is_empty());
}

#[tokio::test]
async fn test_namespace_redefinition_is_versioned() {
    let engine = create_test_engine();
    grant(&engine, "doc:readme", "owner", "user:alice").await;
    assert!(holds(&engine, "doc:readme", "viewer", "user:alice").await);

    // viewer no longer follows editor
    let mut relations = document_namespace();
    relations.insert("viewer".to_string(), RewriteRule::Direct);
    let v2 = engine.define_namespace("doc", relations).unwrap();
    assert_eq!(v2.version, 2);

    assert!(!holds(&engine, "doc:readme", "viewer", "user:alice").await);
    assert!(holds(&engine, "doc:readme", "editor", "user:alice").await);

    let v1 = engine.get_namespace_version("doc", 1).unwrap();
    assert!(matches!(v1.rule("viewer").unwrap(), RewriteRule::Union(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writes_converge() {
    let engine = create_test_engine();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .write_tuple(&Tuple::parse("doc:readme", "editor", "user:bob").unwrap())
                .await
                .unwrap()
        }));
    }

    let mut inserted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            inserted += 1;
        }
    }
    assert_eq!(inserted, 1, "exactly one writer should report the insert");

    let page = engine
        .list_tuples_by_user(&id("user:bob"), Page::default())
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    for _ in 0..5 {
        assert!(holds(&engine, "doc:readme", "viewer", "user:bob").await);
    }
}

#[tokio::test]
async fn test_concurrent_checks_during_writes() {
    let engine = create_test_engine();
    grant(&engine, "doc:readme", "owner", "user:alice").await;

    let mut handles = Vec::new();
    for i in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            let user = format!("user:u{i}");
            engine
                .write_tuple(&Tuple::parse("doc:readme", "viewer", &user).unwrap())
                .await
                .unwrap();
            engine
                .check(&id("doc:readme"), "viewer", &id("user:alice"))
                .await
                .unwrap()
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap());
    }
}

#[tokio::test]
async fn test_expand_lists_effective_users() {
    let engine = create_test_engine();
    grant(&engine, "doc:readme", "owner", "user:alice").await;
    grant(&engine, "doc:readme", "editor", "user:bob").await;
    grant(&engine, "doc:readme", "viewer", "user:carol").await;

    let tree = engine.expand(&id("doc:readme"), "editor").await.unwrap();
    assert_eq!(tree.users(), vec![id("user:alice"), id("user:bob")]);

    let tree = engine.expand(&id("doc:readme"), "viewer").await.unwrap();
    assert_eq!(tree.users().len(), 3);
}

/// Tuple store whose lookups take longer than any reasonable deadline
struct SlowTupleStore {
    inner: InMemoryTupleStore,
    delay: Duration,
}

#[async_trait]
impl TupleStore for SlowTupleStore {
    async fn insert(&self, tuple: &Tuple) -> Result<bool> {
        self.inner.insert(tuple).await
    }

    async fn delete(&self, tuple: &Tuple) -> Result<bool> {
        self.inner.delete(tuple).await
    }

    async fn exists(&self, object: &Identifier, relation: &str, user: &Identifier) -> Result<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.exists(object, relation, user).await
    }

    async fn users(&self, object: &Identifier, relation: &str) -> Result<Vec<Identifier>> {
        tokio::time::sleep(self.delay).await;
        self.inner.users(object, relation).await
    }

    async fn list_by_object(&self, object: &Identifier, page: Page) -> Result<TuplePage> {
        self.inner.list_by_object(object, page).await
    }

    async fn list_by_user(&self, user: &Identifier, page: Page) -> Result<TuplePage> {
        self.inner.list_by_user(user, page).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}

#[tokio::test]
async fn test_slow_store_hits_deadline() {
    let store = Arc::new(SlowTupleStore {
        inner: InMemoryTupleStore::new(),
        delay: Duration::from_millis(200),
    });
    let engine = AuthorizationEngine::new(
        store,
        EngineConfig {
            check_timeout: Duration::from_millis(50),
            ..EngineConfig::default()
        },
    );
    engine.define_namespace("doc", document_namespace()).unwrap();

    let err = engine
        .check(&id("doc:readme"), "viewer", &id("user:alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ZanzibarError::DeadlineExceeded { timeout_ms: 50 }));

    // A caller-supplied deadline overrides the default
    let request = CheckRequest::new(id("doc:readme"), "owner", id("user:alice"));
    let result = engine
        .check_with_deadline(&request, Duration::from_secs(2))
        .await
        .unwrap();
    assert!(!result.authorized);
}

#[tokio::test]
async fn test_slow_store_bounds_expand() {
    let store = Arc::new(SlowTupleStore {
        inner: InMemoryTupleStore::new(),
        delay: Duration::from_millis(200),
    });
    let engine = AuthorizationEngine::new(
        store,
        EngineConfig {
            check_timeout: Duration::from_millis(50),
            ..EngineConfig::default()
        },
    );
    engine.define_namespace("doc", document_namespace()).unwrap();

    let err = engine.expand(&id("doc:readme"), "viewer").await.unwrap_err();
    assert!(matches!(err, ZanzibarError::DeadlineExceeded { timeout_ms: 50 }));
}

/// Tuple store that counts `exists` lookups per tuple
#[derive(Default)]
struct CountingTupleStore {
    inner: InMemoryTupleStore,
    lookups: Mutex<HashMap<String, usize>>,
}

impl CountingTupleStore {
    fn lookups(&self, tuple: &str) -> usize {
        self.lookups.lock().get(tuple).copied().unwrap_or(0)
    }

    fn total_lookups(&self) -> usize {
        self.lookups.lock().values().sum()
    }
}

#[async_trait]
impl TupleStore for CountingTupleStore {
    async fn insert(&self, tuple: &Tuple) -> Result<bool> {
        self.inner.insert(tuple).await
    }

    async fn delete(&self, tuple: &Tuple) -> Result<bool> {
        self.inner.delete(tuple).await
    }

    async fn exists(&self, object: &Identifier, relation: &str, user: &Identifier) -> Result<bool> {
        *self
            .lookups
            .lock()
            .entry(format!("{object}#{relation}@{user}"))
            .or_default() += 1;
        self.inner.exists(object, relation, user).await
    }

    async fn users(&self, object: &Identifier, relation: &str) -> Result<Vec<Identifier>> {
        self.inner.users(object, relation).await
    }

    async fn list_by_object(&self, object: &Identifier, page: Page) -> Result<TuplePage> {
        self.inner.list_by_object(object, page).await
    }

    async fn list_by_user(&self, user: &Identifier, page: Page) -> Result<TuplePage> {
        self.inner.list_by_user(user, page).await
    }

    async fn len(&self) -> Result<usize> {
        self.inner.len().await
    }
}

#[tokio::test]
async fn test_shared_relation_evaluated_once() {
    let store = Arc::new(CountingTupleStore::default());
    let engine = AuthorizationEngine::new(store.clone(), EngineConfig::default());

    // viewer reaches owner both directly and through editor
    let mut relations = BTreeMap::new();
    relations.insert("owner".to_string(), RewriteRule::Direct);
    relations.insert(
        "editor".to_string(),
        RewriteRule::Union(vec![RewriteRule::Direct, RewriteRule::computed("owner")]),
    );
    relations.insert(
        "viewer".to_string(),
        RewriteRule::Union(vec![
            RewriteRule::computed("editor"),
            RewriteRule::computed("owner"),
        ]),
    );
    engine.define_namespace("doc", relations).unwrap();

    assert!(!holds(&engine, "doc:readme", "viewer", "user:alice").await);
    assert_eq!(store.lookups("doc:readme#owner@user:alice"), 1);
    assert_eq!(store.lookups("doc:readme#editor@user:alice"), 1);
    assert_eq!(store.total_lookups(), 2);
}

/// Every relation is `this` plus a computed userset of every other relation
fn dense_cycle(size: usize) -> BTreeMap<String, RewriteRule> {
    let names: Vec<String> = (0..size).map(|i| format!("r{i}")).collect();
    names
        .iter()
        .map(|name| {
            let mut branches = vec![RewriteRule::Direct];
            branches.extend(
                names
                    .iter()
                    .filter(|other| *other != name)
                    .map(|other| RewriteRule::computed(other)),
            );
            (name.clone(), RewriteRule::Union(branches))
        })
        .collect()
}

#[tokio::test]
async fn test_dense_cycle_fails_closed() {
    let store = Arc::new(CountingTupleStore::default());
    let engine = AuthorizationEngine::new(store.clone(), EngineConfig::default());
    engine.define_namespace("loop", dense_cycle(8)).unwrap();

    let started = Instant::now();
    let request = CheckRequest::new(id("loop:l1"), "r0", id("user:alice"));
    let result = engine.check_request(&request).await.unwrap();

    assert!(!result.authorized);
    assert!(started.elapsed() < Duration::from_millis(500));
    assert!(result
        .anomalies
        .iter()
        .all(|anomaly| matches!(anomaly, Anomaly::Cycle { .. })));
    assert!(result.anomalies.len() <= 8);
    assert_eq!(store.total_lookups(), 8, "one lookup per relation");

    // A grant anywhere in the loop reaches every relation
    grant(&engine, "loop:l1", "r7", "user:alice").await;
    assert!(holds(&engine, "loop:l1", "r0", "user:alice").await);
    let relations = engine
        .accessible_relations(&id("loop:l1"), &id("user:alice"))
        .await
        .unwrap();
    assert_eq!(relations.len(), 8);
}

/// Tuple store whose backend is unreachable
struct FailingTupleStore;

#[async_trait]
impl TupleStore for FailingTupleStore {
    async fn insert(&self, _tuple: &Tuple) -> Result<bool> {
        Err(ZanzibarError::Storage("backend unavailable".to_string()))
    }

    async fn delete(&self, _tuple: &Tuple) -> Result<bool> {
        Err(ZanzibarError::Storage("backend unavailable".to_string()))
    }

    async fn exists(&self, _object: &Identifier, _relation: &str, _user: &Identifier) -> Result<bool> {
        Err(ZanzibarError::Storage("backend unavailable".to_string()))
    }

    async fn users(&self, _object: &Identifier, _relation: &str) -> Result<Vec<Identifier>> {
        Err(anyhow::anyhow!("connection reset").into())
    }

    async fn list_by_object(&self, _object: &Identifier, _page: Page) -> Result<TuplePage> {
        Err(ZanzibarError::Storage("backend unavailable".to_string()))
    }

    async fn list_by_user(&self, _user: &Identifier, _page: Page) -> Result<TuplePage> {
        Err(ZanzibarError::Storage("backend unavailable".to_string()))
    }

    async fn len(&self) -> Result<usize> {
        Ok(0)
    }
}

#[tokio::test]
async fn test_store_failures_are_errors_not_decisions() {
    let engine = AuthorizationEngine::new(Arc::new(FailingTupleStore), EngineConfig::default());
    engine.define_namespace("doc", document_namespace()).unwrap();

    let err = engine
        .check(&id("doc:readme"), "viewer", &id("user:alice"))
        .await
        .unwrap_err();
    assert!(matches!(err, ZanzibarError::Storage(_)));

    let err = engine
        .write_tuple(&Tuple::parse("doc:readme", "owner", "user:alice").unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ZanzibarError::Storage(_)));

    let err = engine.expand(&id("doc:readme"), "owner").await.unwrap_err();
    assert!(matches!(err, ZanzibarError::Internal(_)));
}

use crate::{
    check::{PermissionChecker, DEFAULT_MAX_DEPTH},
    error::{Result, ZanzibarError},
    expand::{SubjectExpander, UsersetTree},
    models::*,
    namespace::NamespaceRegistry,
    repository::{InMemoryTupleStore, TupleStore},
    schema::{NamespaceDefinition, RelationConfig, RewriteRule},
};
use futures::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Default deadline applied to a top-level check
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_millis(2000);

/// Tunables of the authorization engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Recursion bound for computed usersets
    pub max_depth: u32,
    /// Deadline for one top-level check
    pub check_timeout: Duration,
    /// Refuse namespaces whose computed usersets form a cycle
    pub reject_cyclic_namespaces: bool,
    /// Collect evaluation traces on check results
    pub debug_trace: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            check_timeout: DEFAULT_CHECK_TIMEOUT,
            reject_cyclic_namespaces: false,
            debug_trace: false,
        }
    }
}

/// Core Zanzibar authorization engine
pub struct AuthorizationEngine {
    /// Storage for relationship tuples
    store: Arc<dyn TupleStore>,

    /// Namespace definitions, one per object type
    registry: Arc<NamespaceRegistry>,

    /// Permission checker for authorization queries
    checker: PermissionChecker,

    /// Subject expander for listing users
    expander: SubjectExpander,

    config: EngineConfig,
}

impl AuthorizationEngine {
    /// Create a new authorization engine over the given tuple store
    pub fn new(store: Arc<dyn TupleStore>, config: EngineConfig) -> Self {
        let registry = Arc::new(
            NamespaceRegistry::new().with_cycle_rejection(config.reject_cyclic_namespaces),
        );
        let checker = PermissionChecker::new(store.clone(), registry.clone())
            .with_max_depth(config.max_depth)
            .with_debug(config.debug_trace);
        let expander =
            SubjectExpander::new(store.clone(), registry.clone()).with_max_depth(config.max_depth);

        Self {
            store,
            registry,
            checker,
            expander,
            config,
        }
    }

    /// Engine backed by the in-memory tuple store
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(Arc::new(InMemoryTupleStore::new()), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =============================================================================
    // Namespace Management
    // =============================================================================

    pub fn define_namespace(
        &self,
        name: &str,
        relations: BTreeMap<String, RewriteRule>,
    ) -> Result<Arc<NamespaceDefinition>> {
        self.registry.define(name, relations)
    }

    /// Define a namespace from the wire relation format
    pub fn define_namespace_config(
        &self,
        name: &str,
        relations: &HashMap<String, RelationConfig>,
    ) -> Result<Arc<NamespaceDefinition>> {
        self.registry
            .publish(NamespaceDefinition::from_config(name, relations)?)
    }

    pub fn get_namespace(&self, name: &str) -> Result<Arc<NamespaceDefinition>> {
        self.registry.get(name)
    }

    pub fn get_namespace_version(&self, name: &str, version: u32) -> Result<Arc<NamespaceDefinition>> {
        self.registry.get_version(name, version)
    }

    pub fn list_namespaces(&self) -> Vec<String> {
        self.registry.list()
    }

    pub fn delete_namespace(&self, name: &str) -> Result<()> {
        if self.registry.delete(name) {
            Ok(())
        } else {
            Err(ZanzibarError::NamespaceNotFound(name.to_string()))
        }
    }

    // =============================================================================
    // Tuple Management
    // =============================================================================

    /// Write a relationship tuple; `false` means it already existed
    pub async fn write_tuple(&self, tuple: &Tuple) -> Result<bool> {
        self.registry.resolve(tuple.object.kind(), &tuple.relation)?;

        let inserted = self.store.insert(tuple).await?;
        info!(tuple = %tuple, inserted, "Tuple written");
        Ok(inserted)
    }

    /// Delete a relationship tuple; `false` means it was not stored
    pub async fn delete_tuple(&self, tuple: &Tuple) -> Result<bool> {
        let existed = self.store.delete(tuple).await?;
        info!(tuple = %tuple, existed, "Tuple deleted");
        Ok(existed)
    }

    /// Apply writes then deletes. Every write is validated before anything is
    /// applied, but the batch is not transactional: a storage failure part way
    /// leaves the earlier tuples applied.
    pub async fn batch_write(&self, request: &WriteRequest) -> Result<WriteResponse> {
        for tuple in &request.writes {
            self.registry.resolve(tuple.object.kind(), &tuple.relation)?;
        }

        let mut response = WriteResponse::default();
        for tuple in &request.writes {
            response.inserted.push(self.store.insert(tuple).await?);
        }
        for tuple in &request.deletes {
            response.deleted.push(self.store.delete(tuple).await?);
        }

        info!(
            writes = request.writes.len(),
            deletes = request.deletes.len(),
            "Batch write applied"
        );
        Ok(response)
    }

    pub async fn list_tuples_by_object(&self, object: &Identifier, page: Page) -> Result<TuplePage> {
        self.store.list_by_object(object, page).await
    }

    pub async fn list_tuples_by_user(&self, user: &Identifier, page: Page) -> Result<TuplePage> {
        self.store.list_by_user(user, page).await
    }

    // =============================================================================
    // Core Authorization Operations
    // =============================================================================

    /// Check if `user` holds `relation` on `object` under the default deadline
    pub async fn check(&self, object: &Identifier, relation: &str, user: &Identifier) -> Result<bool> {
        let request = CheckRequest::new(object.clone(), relation, user.clone());
        Ok(self.check_request(&request).await?.authorized)
    }

    pub async fn check_request(&self, request: &CheckRequest) -> Result<CheckResult> {
        self.check_with_deadline(request, self.config.check_timeout)
            .await
    }

    pub async fn check_with_deadline(
        &self,
        request: &CheckRequest,
        timeout: Duration,
    ) -> Result<CheckResult> {
        self.checker.check(request, timeout).await
    }

    /// Evaluate independent checks concurrently; results keep request order
    pub async fn batch_check(&self, requests: &[CheckRequest]) -> Vec<Result<CheckResult>> {
        join_all(requests.iter().map(|request| self.check_request(request))).await
    }

    /// Relations of the object's namespace the user holds
    pub async fn accessible_relations(
        &self,
        object: &Identifier,
        user: &Identifier,
    ) -> Result<Vec<String>> {
        self.checker
            .accessible_relations(object, user, self.config.check_timeout)
            .await
    }

    // =============================================================================
    // Permission Expansion
    // =============================================================================

    /// Userset tree of `relation` on `object`, bounded by the check deadline
    pub async fn expand(&self, object: &Identifier, relation: &str) -> Result<UsersetTree> {
        self.expander
            .expand(object, relation, self.config.check_timeout)
            .await
    }
}

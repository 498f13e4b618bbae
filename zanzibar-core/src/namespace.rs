use crate::{
    error::{Result, ZanzibarError},
    schema::{NamespaceDefinition, RewriteRule},
};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Process-wide namespace registry.
///
/// Definitions are built and validated outside the lock and published as a
/// whole `Arc<NamespaceDefinition>`, so a reader sees either the previous or
/// the new relation map, never a mix. Every published version is kept.
pub struct NamespaceRegistry {
    namespaces: RwLock<HashMap<String, Vec<Arc<NamespaceDefinition>>>>,
    reject_cyclic: bool,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            reject_cyclic: false,
        }
    }

    /// Refuse namespaces whose computed usersets form a cycle
    pub fn with_cycle_rejection(mut self, enabled: bool) -> Self {
        self.reject_cyclic = enabled;
        self
    }

    /// Replace the namespace definition atomically, returning the published version
    pub fn define(
        &self,
        name: &str,
        relations: BTreeMap<String, RewriteRule>,
    ) -> Result<Arc<NamespaceDefinition>> {
        self.publish(NamespaceDefinition::new(name, relations)?)
    }

    /// Publish an already validated definition under the next version number
    pub fn publish(&self, mut definition: NamespaceDefinition) -> Result<Arc<NamespaceDefinition>> {
        let cyclic = definition.cyclic_relations();
        if !cyclic.is_empty() {
            if self.reject_cyclic {
                return Err(ZanzibarError::InvalidSchema(format!(
                    "Namespace '{}' has cyclic relations: {}",
                    definition.name,
                    cyclic.join(", ")
                )));
            }
            warn!(
                namespace = %definition.name,
                relations = ?cyclic,
                "Namespace contains a computed userset cycle; checks through it resolve to denied"
            );
        }

        let mut namespaces = self.namespaces.write();
        let history = namespaces.entry(definition.name.clone()).or_default();
        definition.version = history
            .last()
            .map_or(1, |latest| latest.version.saturating_add(1));
        let definition = Arc::new(definition);
        history.push(definition.clone());
        drop(namespaces);

        info!(
            namespace = %definition.name,
            version = definition.version,
            relations = definition.relations.len(),
            "Namespace defined"
        );
        Ok(definition)
    }

    /// Latest published definition
    pub fn get(&self, name: &str) -> Result<Arc<NamespaceDefinition>> {
        self.namespaces
            .read()
            .get(name)
            .and_then(|history| history.last().cloned())
            .ok_or_else(|| ZanzibarError::NamespaceNotFound(name.to_string()))
    }

    pub fn get_version(&self, name: &str, version: u32) -> Result<Arc<NamespaceDefinition>> {
        let namespaces = self.namespaces.read();
        let history = namespaces
            .get(name)
            .ok_or_else(|| ZanzibarError::NamespaceNotFound(name.to_string()))?;
        history
            .iter()
            .find(|def| def.version == version)
            .cloned()
            .ok_or_else(|| ZanzibarError::NamespaceVersionNotFound {
                namespace: name.to_string(),
                version,
            })
    }

    pub fn resolve(&self, object_type: &str, relation: &str) -> Result<RewriteRule> {
        self.get(object_type)?.rule(relation).cloned()
    }

    /// Sorted namespace names
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop a namespace and its history; stored tuples are left untouched
    pub fn delete(&self, name: &str) -> bool {
        let removed = self.namespaces.write().remove(name).is_some();
        if removed {
            info!(namespace = %name, "Namespace deleted");
        }
        removed
    }
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::document_namespace;

    #[test]
    fn test_define_and_resolve() {
        let registry = NamespaceRegistry::new();
        let def = registry.define("doc", document_namespace()).unwrap();
        assert_eq!(def.version, 1);

        assert_eq!(registry.resolve("doc", "owner").unwrap(), RewriteRule::Direct);
        assert!(matches!(
            registry.resolve("folder", "owner"),
            Err(ZanzibarError::NamespaceNotFound(_))
        ));
        assert!(matches!(
            registry.resolve("doc", "commenter"),
            Err(ZanzibarError::RelationNotFound { .. })
        ));
    }

    #[test]
    fn test_versions_are_kept() {
        let registry = NamespaceRegistry::new();
        registry.define("doc", document_namespace()).unwrap();

        let mut owner_only = BTreeMap::new();
        owner_only.insert("owner".to_string(), RewriteRule::Direct);
        let v2 = registry.define("doc", owner_only).unwrap();
        assert_eq!(v2.version, 2);

        assert_eq!(registry.get("doc").unwrap().relations.len(), 1);
        assert_eq!(registry.get_version("doc", 1).unwrap().relations.len(), 3);
        assert!(matches!(
            registry.get_version("doc", 7),
            Err(ZanzibarError::NamespaceVersionNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_definition_keeps_previous() {
        let registry = NamespaceRegistry::new();
        registry.define("doc", document_namespace()).unwrap();

        let mut broken = BTreeMap::new();
        broken.insert("viewer".to_string(), RewriteRule::computed("missing"));
        assert!(registry.define("doc", broken).is_err());
        assert_eq!(registry.get("doc").unwrap().version, 1);
    }

    #[test]
    fn test_cycle_rejection_is_opt_in() {
        let mut cyclic = BTreeMap::new();
        cyclic.insert("a".to_string(), RewriteRule::computed("b"));
        cyclic.insert("b".to_string(), RewriteRule::computed("a"));

        assert!(NamespaceRegistry::new().define("loop", cyclic.clone()).is_ok());
        assert!(matches!(
            NamespaceRegistry::new()
                .with_cycle_rejection(true)
                .define("loop", cyclic),
            Err(ZanzibarError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_list_and_delete() {
        let registry = NamespaceRegistry::new();
        registry.define("folder", document_namespace()).unwrap();
        registry.define("doc", document_namespace()).unwrap();
        assert_eq!(registry.list(), vec!["doc", "folder"]);

        assert!(registry.delete("doc"));
        assert!(!registry.delete("doc"));
        assert_eq!(registry.list(), vec!["folder"]);
    }
}

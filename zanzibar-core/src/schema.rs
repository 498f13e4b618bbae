use crate::{
    error::{Result, ZanzibarError},
    models::validate_name,
};
use chrono::{DateTime, Utc};
use petgraph::{algo::tarjan_scc, graphmap::DiGraphMap};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// How membership in a relation is established
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteRule {
    /// Satisfied by tuples stored literally against this relation
    Direct,
    /// Satisfied if any child is satisfied, evaluated in declaration order
    Union(Vec<RewriteRule>),
    /// Satisfied if the same user holds `relation` on the same object
    ComputedUserset { relation: String },
}

impl RewriteRule {
    pub fn computed(relation: &str) -> Self {
        Self::ComputedUserset {
            relation: relation.to_string(),
        }
    }

    /// Relations referenced through computed usersets anywhere in this rule
    pub fn referenced_relations(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            RewriteRule::Direct => {}
            RewriteRule::Union(children) => {
                for child in children {
                    child.collect_references(out);
                }
            }
            RewriteRule::ComputedUserset { relation } => out.push(relation),
        }
    }

    fn validate_shape(&self, relation: &str) -> Result<()> {
        match self {
            RewriteRule::Direct | RewriteRule::ComputedUserset { .. } => Ok(()),
            RewriteRule::Union(children) if children.is_empty() => Err(
                ZanzibarError::InvalidSchema(format!("Relation '{relation}' has an empty union")),
            ),
            RewriteRule::Union(children) => children
                .iter()
                .try_for_each(|child| child.validate_shape(relation)),
        }
    }
}

// =============================================================================
// Wire configuration format
// =============================================================================

/// Relation configuration as submitted by callers:
/// `{"union": [{"this": {}}, {"computed_userset": {"relation": "owner"}}]}`.
/// An absent or empty union means direct membership only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub union: Vec<UnionMember>,
}

/// One member of a union; exactly one field must be set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnionMember {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub this: Option<ThisConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub computed_userset: Option<ComputedUsersetConfig>,
    /// Nested union
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub union: Option<Vec<UnionMember>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThisConfig {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedUsersetConfig {
    pub relation: String,
}

impl RelationConfig {
    /// Parse the wire form into a rewrite rule
    pub fn to_rule(&self, relation: &str) -> Result<RewriteRule> {
        if self.union.is_empty() {
            return Ok(RewriteRule::Direct);
        }
        let children = self
            .union
            .iter()
            .map(|member| member.to_rule(relation))
            .collect::<Result<Vec<_>>>()?;
        Ok(RewriteRule::Union(children))
    }

    pub fn from_rule(rule: &RewriteRule) -> Self {
        match rule {
            RewriteRule::Direct => Self::default(),
            RewriteRule::Union(children) => Self {
                union: children.iter().map(UnionMember::from_rule).collect(),
            },
            RewriteRule::ComputedUserset { .. } => Self {
                union: vec![UnionMember::from_rule(rule)],
            },
        }
    }
}

impl UnionMember {
    fn to_rule(&self, relation: &str) -> Result<RewriteRule> {
        match (&self.this, &self.computed_userset, &self.union) {
            (Some(_), None, None) => Ok(RewriteRule::Direct),
            (None, Some(computed), None) => {
                validate_name("computed userset relation", &computed.relation)?;
                Ok(RewriteRule::computed(&computed.relation))
            }
            (None, None, Some(members)) => {
                let children = members
                    .iter()
                    .map(|member| member.to_rule(relation))
                    .collect::<Result<Vec<_>>>()?;
                Ok(RewriteRule::Union(children))
            }
            _ => Err(ZanzibarError::InvalidSchema(format!(
                "Union member of relation '{relation}' must set exactly one of 'this', 'computed_userset' or 'union'"
            ))),
        }
    }

    fn from_rule(rule: &RewriteRule) -> Self {
        match rule {
            RewriteRule::Direct => Self {
                this: Some(ThisConfig {}),
                ..Self::default()
            },
            RewriteRule::ComputedUserset { relation } => Self {
                computed_userset: Some(ComputedUsersetConfig {
                    relation: relation.clone(),
                }),
                ..Self::default()
            },
            RewriteRule::Union(children) => Self {
                union: Some(children.iter().map(Self::from_rule).collect()),
                ..Self::default()
            },
        }
    }
}

/// Parse a whole wire relation map
pub fn parse_relations(
    relations: &HashMap<String, RelationConfig>,
) -> Result<BTreeMap<String, RewriteRule>> {
    relations
        .iter()
        .map(|(name, config)| Ok((name.clone(), config.to_rule(name)?)))
        .collect()
}

// =============================================================================
// Namespace definition
// =============================================================================

/// The relation schema for one object type, immutable once published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDefinition {
    pub name: String,
    pub relations: BTreeMap<String, RewriteRule>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
}

impl NamespaceDefinition {
    /// Build and validate a definition; the registry assigns the version
    pub fn new(name: &str, relations: BTreeMap<String, RewriteRule>) -> Result<Self> {
        validate_name("namespace", name)?;
        if relations.is_empty() {
            return Err(ZanzibarError::InvalidSchema(format!(
                "Namespace '{name}' must define at least one relation"
            )));
        }

        for (relation, rule) in &relations {
            validate_name("relation", relation)?;
            rule.validate_shape(relation)?;
            for referenced in rule.referenced_relations() {
                if !relations.contains_key(referenced) {
                    return Err(ZanzibarError::InvalidSchema(format!(
                        "Relation '{relation}' references unknown relation '{referenced}' in namespace '{name}'"
                    )));
                }
            }
        }

        Ok(Self {
            name: name.to_string(),
            relations,
            version: 0,
            created_at: Utc::now(),
        })
    }

    pub fn from_config(name: &str, relations: &HashMap<String, RelationConfig>) -> Result<Self> {
        Self::new(name, parse_relations(relations)?)
    }

    pub fn rule(&self, relation: &str) -> Result<&RewriteRule> {
        self.relations
            .get(relation)
            .ok_or_else(|| ZanzibarError::relation_not_found(&self.name, relation))
    }

    pub fn relation_names(&self) -> impl Iterator<Item = &str> {
        self.relations.keys().map(String::as_str)
    }

    pub fn to_config(&self) -> HashMap<String, RelationConfig> {
        self.relations
            .iter()
            .map(|(name, rule)| (name.clone(), RelationConfig::from_rule(rule)))
            .collect()
    }

    /// Relations that take part in a computed-userset cycle, sorted
    pub fn cyclic_relations(&self) -> Vec<String> {
        let mut graph = DiGraphMap::<&str, ()>::new();
        for (relation, rule) in &self.relations {
            graph.add_node(relation.as_str());
            for referenced in rule.referenced_relations() {
                graph.add_edge(relation.as_str(), referenced, ());
            }
        }

        let mut cyclic: Vec<String> = tarjan_scc(&graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|node| graph.contains_edge(*node, *node))
            })
            .flatten()
            .map(str::to_string)
            .collect();
        cyclic.sort();
        cyclic
    }
}

/// Reference document namespace: owner implies editor implies viewer
pub fn document_namespace() -> BTreeMap<String, RewriteRule> {
    let mut relations = BTreeMap::new();
    relations.insert("owner".to_string(), RewriteRule::Direct);
    relations.insert(
        "editor".to_string(),
        RewriteRule::Union(vec![RewriteRule::Direct, RewriteRule::computed("owner")]),
    );
    relations.insert(
        "viewer".to_string(),
        RewriteRule::Union(vec![RewriteRule::Direct, RewriteRule::computed("editor")]),
    );
    relations
}

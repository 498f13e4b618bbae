use crate::error::{Result, ZanzibarError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the type tag and the opaque id of an identifier
pub const IDENTIFIER_SEPARATOR: char = ':';

/// Typed reference to an object or a user, textually `type:id`
///
/// Exactly one colon; both segments non-empty. Serialized as its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier {
    kind: String,
    id: String,
}

impl Identifier {
    pub fn new(kind: &str, id: &str) -> Result<Self> {
        if kind.is_empty() || id.is_empty() {
            return Err(ZanzibarError::validation(format!(
                "identifier '{kind}{IDENTIFIER_SEPARATOR}{id}' must have a non-empty type and id"
            )));
        }
        if kind.contains(IDENTIFIER_SEPARATOR) || id.contains(IDENTIFIER_SEPARATOR) {
            return Err(ZanzibarError::validation(format!(
                "identifier '{kind}{IDENTIFIER_SEPARATOR}{id}' must contain exactly one ':'"
            )));
        }
        Ok(Self {
            kind: kind.to_string(),
            id: id.to_string(),
        })
    }

    /// Parse the wire form `type:id`
    pub fn parse(raw: &str) -> Result<Self> {
        let (kind, id) = raw.split_once(IDENTIFIER_SEPARATOR).ok_or_else(|| {
            ZanzibarError::validation(format!(
                "identifier '{raw}' must be in format 'type:id'"
            ))
        })?;
        Self::new(kind, id)
    }

    /// Shorthand for `user:<id>`
    pub fn user(id: &str) -> Result<Self> {
        Self::new("user", id)
    }

    /// The type tag, which is also the namespace name for objects
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.kind, IDENTIFIER_SEPARATOR, self.id)
    }
}

impl FromStr for Identifier {
    type Err = ZanzibarError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = ZanzibarError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.to_string()
    }
}

/// Validate a relation or namespace name
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ZanzibarError::validation(format!("{kind} name is required")));
    }
    if name.contains([IDENTIFIER_SEPARATOR, '#', '@']) || name.chars().any(char::is_whitespace) {
        return Err(ZanzibarError::validation(format!(
            "{kind} name '{name}' must not contain ':', '#', '@' or whitespace"
        )));
    }
    Ok(())
}

/// A granted relation fact: `user` is a member of `object`'s `relation`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Tuple {
    pub object: Identifier,
    pub relation: String,
    pub user: Identifier,
}

impl Tuple {
    pub fn new(object: Identifier, relation: &str, user: Identifier) -> Self {
        Self {
            object,
            relation: relation.to_string(),
            user,
        }
    }

    /// Build a tuple from its three wire strings, validating each
    pub fn parse(object: &str, relation: &str, user: &str) -> Result<Self> {
        validate_name("relation", relation)?;
        Ok(Self::new(
            Identifier::parse(object)?,
            relation,
            Identifier::parse(user)?,
        ))
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

/// Authorization check request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRequest {
    pub object: Identifier,
    pub relation: String,
    pub user: Identifier,
}

impl CheckRequest {
    pub fn new(object: Identifier, relation: &str, user: Identifier) -> Self {
        Self {
            object,
            relation: relation.to_string(),
            user,
        }
    }
}

impl fmt::Display for CheckRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.object, self.relation, self.user)
    }
}

/// Engine-level safety net triggered during a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// The triple was already on the recursion stack
    Cycle { object: String, relation: String },
    /// The recursion depth bound was hit
    DepthExceeded { relation: String, max_depth: u32 },
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::Cycle { object, relation } => {
                write!(f, "cycle detected at {object}#{relation}")
            }
            Anomaly::DepthExceeded { relation, max_depth } => {
                write!(f, "max depth {max_depth} exceeded at relation {relation}")
            }
        }
    }
}

/// Outcome of one top-level check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub authorized: bool,
    /// Cycle/depth cuts hit while evaluating; any cut resolves to denial on that path
    pub anomalies: Vec<Anomaly>,
    /// Evaluation steps, collected only when debug tracing is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

/// Batch write request; not transactional across the batch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WriteRequest {
    pub writes: Vec<Tuple>,
    pub deletes: Vec<Tuple>,
}

/// Per-tuple outcome of a batch write
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteResponse {
    pub inserted: Vec<bool>,
    pub deleted: Vec<bool>,
}

/// 1-based pagination window for tuple listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: usize,
    pub page_size: usize,
}

impl Page {
    pub const DEFAULT_PAGE_SIZE: usize = 50;
    pub const MAX_PAGE_SIZE: usize = 1000;

    /// Clamp raw query values into a usable window
    pub fn new(page: Option<usize>, page_size: Option<usize>) -> Self {
        let page = page.filter(|p| *p > 0).unwrap_or(1);
        let page_size = page_size
            .filter(|s| *s > 0)
            .unwrap_or(Self::DEFAULT_PAGE_SIZE)
            .min(Self::MAX_PAGE_SIZE);
        Self { page, page_size }
    }

    pub fn offset(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of tuples plus the total number of matches
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuplePage {
    pub tuples: Vec<Tuple>,
    pub total: usize,
    pub has_more: bool,
}

impl TuplePage {
    /// Cut a sorted match list down to one page
    pub fn from_sorted(mut all: Vec<Tuple>, page: Page) -> Self {
        all.sort();
        let total = all.len();
        let tuples: Vec<Tuple> = all
            .into_iter()
            .skip(page.offset())
            .take(page.page_size)
            .collect();
        let has_more = page.offset().saturating_add(tuples.len()) < total;
        Self {
            tuples,
            total,
            has_more,
        }
    }
}

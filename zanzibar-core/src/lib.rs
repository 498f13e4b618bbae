//! Zanzibar-style relation-based authorization engine
//!
//! This crate decides whether a user holds a relation on an object, providing:
//! - A tuple store of granted relation facts (`object#relation@user`)
//! - A namespace registry of per-type rewrite rules, versioned and
//!   published atomically
//! - A check engine that evaluates rewrite rules recursively with
//!   memoization, cycle and depth protection, and a per-check deadline
//! - Expansion of the users holding a relation
//!
//! # Core Concepts
//!
//! - **Identifier**: a typed reference `type:id` (e.g. `doc:report1`, `user:alice`)
//! - **Tuple**: a stored fact granting direct membership
//! - **Namespace**: the relation schema for one object type
//! - **Rewrite rule**: `Direct`, `Union(..)` or `ComputedUserset(relation)`
//!
//! # Example
//!
//! ```rust
//! use zanzibar_core::{document_namespace, AuthorizationEngine, EngineConfig, Identifier, Tuple};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = AuthorizationEngine::in_memory(EngineConfig::default());
//!     engine.define_namespace("doc", document_namespace())?;
//!
//!     let doc = Identifier::parse("doc:report1")?;
//!     let alice = Identifier::parse("user:alice")?;
//!     engine.write_tuple(&Tuple::new(doc.clone(), "owner", alice.clone())).await?;
//!
//!     // owner implies editor implies viewer
//!     assert!(engine.check(&doc, "viewer", &alice).await?);
//!     Ok(())
//! }
//! ```

pub mod check;
pub mod engine;
pub mod error;
pub mod expand;
pub mod models;
pub mod namespace;
pub mod repository;
pub mod schema;

pub use check::{PermissionChecker, DEFAULT_MAX_DEPTH};
pub use engine::*;
pub use error::*;
pub use expand::{SubjectExpander, UsersetTree};
pub use models::*;
pub use namespace::NamespaceRegistry;
pub use repository::{InMemoryTupleStore, TupleStore};
pub use schema::*;

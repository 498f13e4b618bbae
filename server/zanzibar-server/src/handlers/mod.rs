pub mod acl;
pub mod health;
pub mod namespace;

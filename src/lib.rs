//! Condition-tree editor for encoded record queries.
//!
//! A [`Model`](ast::Model) is an ordered list of root AND/OR groups holding
//! `field operator value` conditions. The [`editor`] functions rebuild it
//! immutably with structural sharing, [`encoder`] renders it to the encoded
//! query grammar (`^`, `^OR`, `^NQ`), and [`session::Session`] keeps the
//! current model for an editing UI.

pub mod ast;
pub mod builder;
pub mod config;
pub mod editor;
pub mod encoder;
pub mod error;
pub mod session;
pub mod truncate;

#[cfg(test)]
mod test_utils;

pub use ast::{Condition, ConditionPatch, Group, GroupKind, Model, Node, NodeId};
pub use builder::{new_empty_condition, new_empty_group, new_empty_model};
pub use encoder::serialize_model;
pub use error::{CatalogError, ModelError, SessionError};
pub use session::{QueryExecutor, Session};

//! Editing session: the one place that holds a "current" model.
//!
//! Each command runs the matching editor operation and keeps the result only
//! when it reports a change. `run_query` encodes strictly and hands the query
//! to a [`QueryExecutor`]; an incomplete model is rejected without running.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ast::{ConditionPatch, Group, Model, NodeId};
use crate::builder::new_empty_model;
use crate::editor::{
    add_condition_to_group, append_and_condition_near, delete_condition, split_condition_to_or_group,
    update_condition, Edit,
};
use crate::encoder::{incomplete_conditions, serialize_model};
use crate::error::SessionError;
use crate::truncate::{breadcrumbs, truncate_model_at_index, Breadcrumb};

/// Downstream collaborator that runs an encoded query against a table.
pub trait QueryExecutor {
    type Error: std::error::Error + Send + Sync + 'static;

    fn execute(&mut self, table: &str, encoded_query: &str) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone)]
pub struct Session {
    table: String,
    model: Model,
}

impl Session {
    /// Start with [`new_empty_model`].
    pub fn new(table: impl Into<String>) -> Self {
        Self::with_model(table, new_empty_model())
    }

    /// Start from a decoded query.
    pub fn with_model(table: impl Into<String>, model: Model) -> Self {
        let table = table.into();
        info!(table = %table, conditions = model.leaf_count(), "editing session started");
        Self { table, model }
    }

    /// Start from a decoded query delivered as a JSON document.
    pub fn from_model_json(table: impl Into<String>, json: &str) -> Result<Self, SessionError> {
        let roots: Vec<Arc<Group>> = serde_json::from_str(json)?;
        Ok(Self::with_model(table, Model::from_roots(roots)?))
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Replace the whole model, e.g. after decoding another saved query.
    pub fn replace_model(&mut self, model: Model) {
        info!(conditions = model.leaf_count(), "model replaced");
        self.model = model;
    }

    pub fn reset(&mut self) {
        self.replace_model(new_empty_model());
    }

    fn apply(&mut self, (model, changed): Edit) -> bool {
        if changed {
            self.model = model;
        }
        changed
    }

    pub fn update_condition(&mut self, group_id: &NodeId, condition_id: &NodeId, patch: &ConditionPatch) -> bool {
        let edit = update_condition(&self.model, group_id, condition_id, patch);
        self.apply(edit)
    }

    pub fn add_condition(&mut self, group_id: &NodeId) -> bool {
        let edit = add_condition_to_group(&self.model, group_id);
        self.apply(edit)
    }

    pub fn append_and_condition(&mut self, group_id: &NodeId) -> bool {
        let edit = append_and_condition_near(&self.model, group_id);
        self.apply(edit)
    }

    pub fn split_condition(&mut self, group_id: &NodeId, condition_id: &NodeId) -> bool {
        let edit = split_condition_to_or_group(&self.model, group_id, condition_id);
        self.apply(edit)
    }

    pub fn delete_condition(&mut self, group_id: &NodeId, condition_id: &NodeId) -> bool {
        let edit = delete_condition(&self.model, group_id, condition_id);
        self.apply(edit)
    }

    pub fn truncate(&mut self, root_index: usize, leaf_ordinal: usize) -> bool {
        let edit = truncate_model_at_index(&self.model, root_index, leaf_ordinal);
        self.apply(edit)
    }

    pub fn breadcrumbs(&self) -> Vec<Breadcrumb> {
        breadcrumbs(&self.model)
    }

    /// Cut the model back to the given breadcrumb.
    pub fn truncate_to(&mut self, crumb: &Breadcrumb) -> bool {
        self.truncate(crumb.root_index, crumb.leaf_ordinal)
    }

    /// Current encoded query; `None` in strict mode while a condition is
    /// incomplete.
    pub fn encoded_query(&self, strict: bool) -> Option<String> {
        serialize_model(&self.model, strict)
    }

    /// Validate, encode and execute the current model.
    pub fn run_query<E: QueryExecutor>(&self, executor: &mut E) -> Result<String, SessionError> {
        let Some(query) = serialize_model(&self.model, true) else {
            let incomplete = incomplete_conditions(&self.model);
            warn!(incomplete = incomplete.len(), "query not run, conditions incomplete");
            return Err(SessionError::IncompleteConditions(incomplete));
        };

        debug!(table = %self.table, query = %query, "running query");
        executor
            .execute(&self.table, &query)
            .map_err(|e| SessionError::Executor(Box::new(e)))?;
        info!(table = %self.table, "query executed");
        Ok(query)
    }
}

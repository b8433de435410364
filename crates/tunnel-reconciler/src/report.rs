use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Outcome of one reconciliation: what changed, whether it worked, and a
/// human readable account of it.
///
/// `result` is `None` only for a dry run with pending changes.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Report {
    pub name: String,
    pub changes: BTreeMap<String, Value>,
    pub result: Option<bool>,
    pub comment: String,
}

impl Report {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            changes: BTreeMap::new(),
            result: None,
            comment: String::new(),
        }
    }

    pub(crate) fn note(&mut self, comment: impl Into<String>) {
        let comment = comment.into();
        if !self.comment.is_empty() {
            self.comment.push('\n');
        }
        self.comment.push_str(&comment);
    }

    pub(crate) fn record(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
        comment: impl Into<String>,
    ) {
        let comment = comment.into();
        info!(name = %self.name, "{}", comment);
        self.changes.insert(key.into(), value.into());
        self.note(comment);
    }

    pub(crate) fn succeed(mut self, comment: impl Into<String>) -> Self {
        self.result = Some(true);
        self.note(comment);
        self
    }

    pub(crate) fn fail(mut self, comment: impl Into<String>) -> Self {
        let comment = comment.into();
        warn!(name = %self.name, "{}", comment);
        self.result = Some(false);
        self.note(comment);
        self
    }

    pub(crate) fn pending(mut self, comment: impl Into<String>) -> Self {
        self.result = None;
        self.note(comment);
        self
    }

    pub fn is_failure(&self) -> bool {
        self.result == Some(false)
    }
}

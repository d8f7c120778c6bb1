use crate::constants::system::CHILD_ID_SEPARATOR;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Address of one orchestration instance.
///
/// Child ids are composed from the parent id and the child's natural key, so a replayed
/// parent always addresses the same children.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id for a top-level run
    pub fn generate() -> Self {
        Self(format!("run-{}", Uuid::new_v4()))
    }

    /// `{self}:{part}:{part}...`
    pub fn child(&self, parts: &[&str]) -> Self {
        let mut id = self.0.clone();
        for part in parts {
            id.push(CHILD_ID_SEPARATOR);
            id.push_str(part);
        }
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of `:`-separated levels above this instance
    pub fn depth(&self) -> usize {
        self.0.matches(CHILD_ID_SEPARATOR).count()
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

//! # Provider Record
//!
//! The one shape the pipeline sees for a directory provider. Providers are
//! owned by the surrounding directory system; repositories populate this
//! record at the boundary and the pipeline only reads it.

use crate::constants::provider_status;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub id: i32,
    pub name: String,
    pub status: String,
    /// Source-specific fields step handlers may inspect
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ProviderRecord {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: provider_status::PENDING.to_string(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == provider_status::PENDING
    }
}

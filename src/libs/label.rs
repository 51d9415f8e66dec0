//! Activity labels: a flat catalog of named, coloured tags.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityLabel {
    pub name: String,
    pub color: Option<String>,
}

impl ActivityLabel {
    pub fn new(name: impl Into<String>, color: Option<String>) -> Self {
        Self { name: name.into(), color }
    }
}

use crate::config::Number;
use serde::{Deserialize, Serialize};

/// What a stored vector stands for.
///
/// Serialized untagged, so a text payload is a bare JSON string in the
/// category file. New variants must stay distinguishable by JSON shape.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Text(String),
}

impl Payload {
    pub fn as_text(&self) -> &str {
        match self {
            Payload::Text(text) => text,
        }
    }
}

impl From<String> for Payload {
    fn from(text: String) -> Self {
        Payload::Text(text)
    }
}

impl From<&str> for Payload {
    fn from(text: &str) -> Self {
        Payload::Text(text.to_string())
    }
}

/// One persisted record: `{"vector": [...], "data": ...}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VectorEntry {
    pub vector: Vec<Number>,
    pub data: Payload,
}

impl VectorEntry {
    pub fn new(vector: Vec<Number>, data: impl Into<Payload>) -> Self {
        Self {
            vector,
            data: data.into(),
        }
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    domain::{HistoryId, Tone},
    error::ValidationError,
    metrics::TextStats,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RephraseRequest {
    pub text: String,
    #[serde(default)]
    pub tone: Tone,
}

impl RephraseRequest {
    /// Builds a request, rejecting whitespace-only text.
    pub fn new(text: impl Into<String>, tone: Tone) -> Result<Self, ValidationError> {
        let request = Self {
            text: text.into(),
            tone,
        };
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::BlankText);
        }
        Ok(())
    }
}

/// Successful rephrase; counts describe `rephrased_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RephraseResult {
    pub rephrased_text: String,
    pub original_text: String,
    pub tone: Tone,
    pub word_count: usize,
    pub char_count: usize,
}

impl RephraseResult {
    pub fn stats(&self) -> TextStats {
        TextStats {
            words: self.word_count,
            chars: self.char_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub original_text: String,
    pub rephrased_text: String,
    pub tone: Tone,
    pub timestamp: DateTime<Utc>,
}

/// Body of a create-history call; id and timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub original_text: String,
    pub rephrased_text: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub fn rephrase_route() -> &'static str {
    "/api/rephrase"
}

pub fn history_route() -> &'static str {
    "/api/history"
}

pub fn history_item_route(id: HistoryId) -> String {
    format!("{}/{id}", history_route())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_is_rejected() {
        assert_eq!(
            RephraseRequest::new("  \n\t", Tone::Formal),
            Err(ValidationError::BlankText)
        );
        assert!(RephraseRequest::new(" hi ", Tone::Formal).is_ok());
    }

    #[test]
    fn missing_tone_defaults_to_conversational() {
        let request: RephraseRequest =
            serde_json::from_str(r#"{"text":"hello there"}"#).expect("json");
        assert_eq!(request.tone, Tone::Conversational);
    }

    #[test]
    fn history_entry_wire_shape() {
        let raw = r#"{
            "id": "0b8c4a43-3a52-4a8f-9b1e-4f3f3f0c2a11",
            "original_text": "The cat sat.",
            "rephrased_text": "The feline was seated.",
            "tone": "formal",
            "timestamp": "2024-05-01T10:00:00Z"
        }"#;
        let entry: HistoryEntry = serde_json::from_str(raw).expect("json");
        assert_eq!(entry.tone, Tone::Formal);
        assert_eq!(
            history_item_route(entry.id),
            "/api/history/0b8c4a43-3a52-4a8f-9b1e-4f3f3f0c2a11"
        );
    }
}

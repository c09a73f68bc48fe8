// Legally Data Models
// Shared types for the analysis pipeline, history records and caller-facing results

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::services::text_processor::{char_len, normalize_whitespace};

// ============ Document Text ============

/// Whitespace-normalized, non-empty text extracted from an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DocumentText(String);

impl DocumentText {
    /// Normalizes `raw` and returns `None` when nothing but whitespace remains.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = normalize_whitespace(raw);
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn char_count(&self) -> usize {
        char_len(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for DocumentText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============ Document Type ============

/// Coarse document category. Serialized with the labels stored in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "Договор")]
    Contract,
    #[serde(rename = "Приказ")]
    Order,
    #[serde(rename = "Постановление")]
    Resolution,
    #[serde(rename = "Закон")]
    Law,
    #[serde(rename = "Решение")]
    Decision,
    #[serde(rename = "Неизвестно")]
    Unknown,
}

impl DocumentType {
    pub fn label(self) -> &'static str {
        match self {
            DocumentType::Contract => "Договор",
            DocumentType::Order => "Приказ",
            DocumentType::Resolution => "Постановление",
            DocumentType::Law => "Закон",
            DocumentType::Decision => "Решение",
            DocumentType::Unknown => "Неизвестно",
        }
    }

    /// Stable ASCII identifier for logs.
    pub fn code(self) -> &'static str {
        match self {
            DocumentType::Contract => "contract",
            DocumentType::Order => "order",
            DocumentType::Resolution => "resolution",
            DocumentType::Law => "law",
            DocumentType::Decision => "decision",
            DocumentType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============ History ============

/// One persisted pipeline run. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub document_type: DocumentType,
    pub analysis: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(
        filename: impl Into<String>,
        document_type: DocumentType,
        analysis: impl Into<String>,
        text: &DocumentText,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            document_type,
            analysis: analysis.into(),
            text: text.as_str().to_string(),
            created_at: Utc::now(),
        }
    }
}

// ============ Caller-facing Result ============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub analysis: String,
    pub document_type: DocumentType,
    pub filename: String,
    /// RFC3339 completion time.
    pub timestamp: String,
}

impl AnalysisResponse {
    pub fn new(analysis: String, document_type: DocumentType, filename: String) -> Self {
        Self {
            analysis,
            document_type,
            filename,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelevantLaw {
    pub name: String,
    pub url: String,
}

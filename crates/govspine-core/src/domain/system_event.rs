//! System events
//!
//! Durable failure records written when a wrapped transaction fails, kept
//! for later triage.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::DomainError;
use super::newtypes::{RequestId, UserId};

/// Severity of a system event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Severity::Info),
            "WARNING" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(DomainError::UnknownSeverity(other.to_string())),
        }
    }
}

/// A failure record for later diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    pub event_type: String,
    pub category: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub request_id: RequestId,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub user_id: Option<UserId>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl SystemEvent {
    /// Creates an event with no entity or user attribution and empty metadata
    pub fn new(
        event_type: impl Into<String>,
        category: impl Into<String>,
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        request_id: RequestId,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            category: category.into(),
            severity,
            title: title.into(),
            description: description.into(),
            request_id,
            entity_type: None,
            entity_id: None,
            user_id: None,
            metadata: Value::Object(Default::default()),
            created_at: Utc::now(),
        }
    }

    pub fn with_entity(mut self, entity_type: Option<String>, entity_id: Option<String>) -> Self {
        self.entity_type = entity_type;
        self.entity_id = entity_id;
        self
    }

    pub fn with_user_id(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

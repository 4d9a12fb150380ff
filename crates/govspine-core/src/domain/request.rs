//! Request context value types
//!
//! A [`RequestContext`] is the identity and attribution data attached to one
//! logical call chain. It is built once when an inbound call begins and is
//! never mutated afterwards; see [`crate::context`] for how it is made
//! ambient.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::DomainError;
use super::newtypes::{RequestId, UserId};

/// Where an inbound call originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestSource {
    Api,
    Ui,
    Sync,
    Ai,
    System,
    Cron,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSource::Api => "API",
            RequestSource::Ui => "UI",
            RequestSource::Sync => "SYNC",
            RequestSource::Ai => "AI",
            RequestSource::System => "SYSTEM",
            RequestSource::Cron => "CRON",
        }
    }
}

impl fmt::Display for RequestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "API" => Ok(RequestSource::Api),
            "UI" => Ok(RequestSource::Ui),
            "SYNC" => Ok(RequestSource::Sync),
            "AI" => Ok(RequestSource::Ai),
            "SYSTEM" => Ok(RequestSource::System),
            "CRON" => Ok(RequestSource::Cron),
            other => Err(DomainError::UnknownSource(other.to_string())),
        }
    }
}

/// Authenticated session data handed over by the identity source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: UserId,
    pub name: Option<String>,
    pub role: Option<String>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            name: None,
            role: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

/// Identity and attribution for one logical call chain
///
/// Fields are private; the only way to "change" a context is to build a new
/// one and run a nested scope with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    request_id: RequestId,
    user_id: Option<UserId>,
    user_name: Option<String>,
    user_role: Option<String>,
    source: RequestSource,
    start_time: DateTime<Utc>,
    metadata: Option<Map<String, Value>>,
}

impl RequestContext {
    /// Creates a context for the given user with a fresh request id,
    /// source `API` and the current time as start time.
    pub fn new(user_id: Option<UserId>) -> Self {
        Self {
            request_id: RequestId::new(),
            user_id,
            user_name: None,
            user_role: None,
            source: RequestSource::Api,
            start_time: Utc::now(),
            metadata: None,
        }
    }

    /// Builds a context from an authenticated session.
    ///
    /// A missing session yields an anonymous context (no user), which is
    /// still a valid scope: the request id and source are preserved.
    pub fn from_session(session: Option<&Session>, source: RequestSource) -> Self {
        let mut ctx = Self::new(session.map(|s| s.user_id)).with_source(source);
        if let Some(session) = session {
            ctx.user_name = session.name.clone();
            ctx.user_role = session.role.clone();
        }
        ctx
    }

    /// Builds a context for background jobs, cron tasks and other work
    /// that does not act on behalf of a user.
    pub fn system(source: RequestSource, metadata: Option<Map<String, Value>>) -> Self {
        let mut ctx = Self::new(None).with_source(source);
        ctx.metadata = metadata;
        ctx
    }

    /// The "no context" default used by accessors outside any scope
    pub fn detached() -> Self {
        Self::system(RequestSource::System, None)
    }

    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_source(mut self, source: RequestSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_user_name(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_user_role(mut self, role: impl Into<String>) -> Self {
        self.user_role = Some(role.into());
        self
    }

    pub fn with_start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    pub fn user_role(&self) -> Option<&str> {
        self.user_role.as_deref()
    }

    pub fn source(&self) -> RequestSource {
        self.source
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// Time since the call chain started (zero if the clock went backwards)
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.start_time).to_std().unwrap_or_default()
    }
}

//! Topic naming for the build service and classification of inbound topics.
//!
//! ```text
//! sketch/{name}                              retained editor content
//! {verify|upload}/{correlation_id}           job request
//! response/{verify|upload}/{correlation_id}  job accepted, carries the job id
//! result/{job_id}                            job finished
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const RESPONSE_PREFIX: &str = "response/";
pub const RESULT_PREFIX: &str = "result/";
pub const SKETCH_PREFIX: &str = "sketch/";

/// Build service command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    /// Compile only
    Verify,
    /// Compile and flash the board
    Upload,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Verify => "verify",
            Command::Upload => "upload",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "verify" => Some(Command::Verify),
            "upload" => Some(Command::Upload),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-generated token linking a request to its response topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Fresh random id, 36 hex/dash characters.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned token linking a response to its result topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(String);

impl JobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn request_topic(command: Command, id: &CorrelationId) -> String {
    format!("{}/{}", command, id)
}

pub fn response_topic(command: Command, id: &CorrelationId) -> String {
    format!("{}{}/{}", RESPONSE_PREFIX, command, id)
}

pub fn result_topic(job_id: &JobId) -> String {
    format!("{}{}", RESULT_PREFIX, job_id)
}

pub fn sketch_topic(name: &str) -> String {
    format!("{}{}", SKETCH_PREFIX, name)
}

/// File name the build service expects for a sketch.
pub fn sketch_file_name(name: &str) -> String {
    format!("{}.ino", name)
}

/// Inbound topic classified by prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `response/{command}/{correlation_id}`. Segments are `None` when the
    /// topic carries the prefix but not the expected shape.
    Response {
        command: Option<Command>,
        correlation_id: Option<CorrelationId>,
    },
    Result { job_id: JobId },
    SketchSync { name: String },
    Unknown,
}

impl Route {
    pub fn classify(topic: &str) -> Self {
        if let Some(rest) = topic.strip_prefix(RESPONSE_PREFIX) {
            let (command, correlation_id) = match rest.split_once('/') {
                Some((command, id)) if !id.is_empty() && !id.contains('/') => (Command::parse(command), Some(CorrelationId::from(id))),
                _ => (None, None),
            };
            Route::Response { command, correlation_id }
        } else if let Some(job_id) = topic.strip_prefix(RESULT_PREFIX) {
            Route::Result { job_id: JobId::from(job_id) }
        } else if let Some(name) = topic.strip_prefix(SKETCH_PREFIX) {
            Route::SketchSync { name: name.to_string() }
        } else {
            Route::Unknown
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Route::Response { .. } => "response",
            Route::Result { .. } => "result",
            Route::SketchSync { .. } => "sketch",
            Route::Unknown => "unknown",
        }
    }
}

//! Outcome model: what the collaborators hand back to the worker, and what the
//! worker decided for each message.
//!
//! This module is transport-agnostic: it only defines the "shape" of results.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::message::Message;

/// Description of a work-level failure.
///
/// The output message is still sent when this is present; it only changes the
/// acknowledgment decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,

    /// Optional structured detail (stack, codes, offending field, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result of the work step: an output message plus an optional failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkResult {
    pub output: Message,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorInfo>,
}

impl WorkResult {
    pub fn ok(output: Message) -> Self {
        Self {
            output,
            failure: None,
        }
    }

    /// `output` should carry the error information for downstream consumers.
    pub fn failed(output: Message, failure: ErrorInfo) -> Self {
        Self {
            output,
            failure: Some(failure),
        }
    }
}

/// Result of the payload check.
///
/// When `valid` is false, `rejection` replaces the normal result as the
/// message sent downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,

    #[serde(default)]
    pub rejection: Message,
}

impl Validation {
    pub fn accept() -> Self {
        Self {
            valid: true,
            rejection: Message::Null,
        }
    }

    pub fn reject(rejection: Message) -> Self {
        Self {
            valid: false,
            rejection,
        }
    }
}

/// What the worker did with one input message.
///
/// Serialized as SCREAMING_SNAKE_CASE so it reads well in JSON logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Disposition {
    /// Upstream error forwarded verbatim, input acked.
    Forwarded,

    /// Payload check failed, rejection sent, input nacked.
    Rejected,

    /// Work succeeded, result sent, input acked.
    Completed,

    /// Work reported a failure, result sent, acknowledgment withheld.
    Withheld,
}

impl Disposition {
    /// The acknowledgment issued for this disposition as `Some(is_nack)`,
    /// or `None` when it is withheld.
    pub fn acknowledgment(self) -> Option<bool> {
        match self {
            Disposition::Forwarded | Disposition::Completed => Some(false),
            Disposition::Rejected => Some(true),
            Disposition::Withheld => None,
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Disposition::Forwarded => "FORWARDED",
            Disposition::Rejected => "REJECTED",
            Disposition::Completed => "COMPLETED",
            Disposition::Withheld => "WITHHELD",
        };
        f.write_str(s)
    }
}

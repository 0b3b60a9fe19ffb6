//! Shared vocabulary for the course-selection wire protocol: the
//! space-delimited text codec, year-group/course-group/course-type enums,
//! and the typed client/server message set built on top of the codec.

pub mod codec;
pub mod message;
pub mod types;

pub use codec::{decode, encode};
pub use message::{ClientMessage, ServerMessage};
pub use types::{CourseGroup, CourseType, YearGroup};

use serde::{Deserialize, Serialize};

/// Error envelope returned by the admin HTTP endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

impl HttpErrorEnvelope {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_owned(),
            message: message.into(),
            details: None,
        }
    }
}

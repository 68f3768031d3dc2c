use std::fmt;
use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::message::{MessageRequest, MessageSender};

/// Error category reported back for a directive that could not be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionErrorType {
    UnexpectedInformationReceived,
    UnsupportedOperation,
    InternalError,
}

impl fmt::Display for ExceptionErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExceptionErrorType::UnexpectedInformationReceived => "UNEXPECTED_INFORMATION_RECEIVED",
            ExceptionErrorType::UnsupportedOperation => "UNSUPPORTED_OPERATION",
            ExceptionErrorType::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(s)
    }
}

pub trait ExceptionReporter: Send + Sync {
    fn send_exception_encountered(
        &self,
        unparsed_directive: &str,
        error: ExceptionErrorType,
        message: &str,
    );
}

/// Reports exceptions as `System.ExceptionEncountered` events
pub struct ExceptionEncounteredSender {
    message_sender: Arc<dyn MessageSender>,
}

impl ExceptionEncounteredSender {
    pub fn new(message_sender: Arc<dyn MessageSender>) -> Self {
        Self { message_sender }
    }
}

impl ExceptionReporter for ExceptionEncounteredSender {
    fn send_exception_encountered(
        &self,
        unparsed_directive: &str,
        error: ExceptionErrorType,
        message: &str,
    ) {
        warn!(target: "exception_sender", error = %error, message = %message, "Reporting exception");
        let payload = json!({
            "unparsedDirective": unparsed_directive,
            "error": { "type": error.to_string(), "message": message },
        });
        self.message_sender
            .send_message(MessageRequest::event("System", "ExceptionEncountered", payload));
    }
}

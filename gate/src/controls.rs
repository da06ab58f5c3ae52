//! Inline controls attached to notifications.
//!
//! A control travels over the transport as a short callback string of the
//! form `<kind>:<request id>`. Pressing it comes back as the same string.

use crate::types::RequestId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Interactive button attached to a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Operator opened the gate
    Accept(RequestId),
    /// Operator will not act
    Dismiss(RequestId),
    /// Client confirms and thanks the operator
    Acknowledge(RequestId),
}

impl Control {
    const ACCEPT: &'static str = "done";
    const DISMISS: &'static str = "ignore";
    const ACKNOWLEDGE: &'static str = "thank";

    /// The request this control targets.
    #[must_use]
    pub const fn request_id(&self) -> RequestId {
        match self {
            Self::Accept(id) | Self::Dismiss(id) | Self::Acknowledge(id) => *id,
        }
    }

    /// Button caption.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Accept(_) => "✅ Done",
            Self::Dismiss(_) => "❌ Ignore",
            Self::Acknowledge(_) => crate::messages::THANKS_BUTTON,
        }
    }

    /// Callback payload the transport hands back when pressed.
    #[must_use]
    pub fn callback_data(&self) -> String {
        self.to_string()
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Accept(_) => Self::ACCEPT,
            Self::Dismiss(_) => Self::DISMISS,
            Self::Acknowledge(_) => Self::ACKNOWLEDGE,
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.request_id())
    }
}

/// Error decoding callback data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlParseError {
    /// No `:` between kind and request ID
    #[error("callback data {0:?} is missing the ':' separator")]
    MissingSeparator(String),

    /// Kind prefix is not one of `done`, `ignore`, `thank`
    #[error("unknown control kind {0:?}")]
    UnknownKind(String),

    /// Request ID part is not a UUID
    #[error("invalid request id in callback data {data:?}: {source}")]
    InvalidRequestId {
        /// The full callback data
        data: String,
        /// UUID parse failure
        #[source]
        source: uuid::Error,
    },
}

impl FromStr for Control {
    type Err = ControlParseError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let (kind, id) = data
            .trim()
            .split_once(':')
            .ok_or_else(|| ControlParseError::MissingSeparator(data.to_string()))?;

        let build: fn(RequestId) -> Self = match kind {
            Self::ACCEPT => Self::Accept,
            Self::DISMISS => Self::Dismiss,
            Self::ACKNOWLEDGE => Self::Acknowledge,
            other => return Err(ControlParseError::UnknownKind(other.to_string())),
        };

        let request_id = id
            .parse::<RequestId>()
            .map_err(|source| ControlParseError::InvalidRequestId {
                data: data.to_string(),
                source,
            })?;

        Ok(build(request_id))
    }
}

//! Normalized inbound events.
//!
//! A transport turns whatever it receives (button presses, typed text) into a
//! [`GateEvent`] before handing it to the coordinator. Text that is not one of
//! the recognised shortcuts is not an event at all.

use crate::actions::Decision;
use crate::controls::Control;
use crate::messages;
use crate::types::{ClientId, Direction, OperatorId, RequestId};

/// The user behind an inbound message or button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// Transport user/chat id
    pub id: i64,
    /// Name shown in messages
    pub display_name: String,
}

impl Actor {
    /// Create an actor with an explicit display name.
    #[must_use]
    pub fn new(id: i64, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    /// Build an actor from a transport profile: the username when set,
    /// otherwise the first name.
    #[must_use]
    pub fn from_profile(id: i64, username: Option<&str>, first_name: &str) -> Self {
        let display_name = username
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(first_name);
        Self::new(id, display_name)
    }
}

/// Inbound event, already stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateEvent {
    /// A client asked for a gate
    ClientRequestedGate {
        /// Requesting client
        client: ClientId,
        /// Client display name
        client_name: String,
        /// Which gate
        direction: Direction,
    },

    /// An operator pressed Accept or Dismiss
    OperatorActed {
        /// Targeted request
        request_id: RequestId,
        /// Accept or Dismiss
        decision: Decision,
        /// Acting user
        operator: OperatorId,
        /// Acting user's display name
        operator_name: String,
    },

    /// A client pressed Acknowledge on a completion notice
    ClientAcknowledged {
        /// Targeted request
        request_id: RequestId,
    },

    /// A client used the thank shortcut
    ClientAcknowledgedLatest {
        /// Acknowledging client
        client: ClientId,
    },
}

impl GateEvent {
    /// Event for a pressed control.
    #[must_use]
    pub fn from_control(control: Control, actor: &Actor) -> Self {
        match control {
            Control::Accept(request_id) => {
                Self::operator_acted(request_id, Decision::Accept, actor)
            },
            Control::Dismiss(request_id) => {
                Self::operator_acted(request_id, Decision::Dismiss, actor)
            },
            Control::Acknowledge(request_id) => Self::ClientAcknowledged { request_id },
        }
    }

    /// Event for typed text, if it is one of the shortcuts.
    ///
    /// Recognised: the entry/exit/thanks keyboard captions and the digits
    /// `1` (entry), `2` (exit), `4` (thank the latest operator).
    #[must_use]
    pub fn from_text(text: &str, actor: &Actor) -> Option<Self> {
        let client = ClientId::new(actor.id);
        let requested = |direction| Self::ClientRequestedGate {
            client,
            client_name: actor.display_name.clone(),
            direction,
        };

        match text.trim() {
            "1" | messages::ENTRY_BUTTON => Some(requested(Direction::Entry)),
            "2" | messages::EXIT_BUTTON => Some(requested(Direction::Exit)),
            "4" | messages::THANKS_BUTTON => Some(Self::ClientAcknowledgedLatest { client }),
            _ => None,
        }
    }

    fn operator_acted(request_id: RequestId, decision: Decision, actor: &Actor) -> Self {
        Self::OperatorActed {
            request_id,
            decision,
            operator: OperatorId::new(actor.id),
            operator_name: actor.display_name.clone(),
        }
    }
}

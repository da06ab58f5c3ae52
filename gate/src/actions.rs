//! Actions for the gate reducer.
//!
//! Commands come from the transport. The `*NoticeSent` actions are effect
//! feedback: they carry the message handle a notifier call returned, so the
//! reducer can record it on the request (or retract it if the request moved
//! on while the message was in flight). `OperatorNoticeFailed` tells it that
//! a handle will never arrive.

use crate::types::{ClientId, Direction, MessageRef, OperatorId, RequestId};
use serde::{Deserialize, Serialize};

/// What an operator chose to do with an open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// The operator opened the gate
    Accept,
    /// The operator will not act
    Dismiss,
}

/// Gate actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GateAction {
    // ========== Commands ==========
    /// Client asked for a gate
    SubmitRequest {
        /// ID minted for the new request
        request_id: RequestId,
        /// Requesting client
        client: ClientId,
        /// Client display name
        client_name: String,
        /// Which gate
        direction: Direction,
    },

    /// Operator pressed Accept or Dismiss
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

    /// Client pressed Acknowledge on a completion notice
    AcknowledgeCompletion {
        /// Targeted request
        request_id: RequestId,
    },

    /// Client used the "thank" shortcut without naming a request
    AcknowledgeLatest {
        /// Acknowledging client
        client: ClientId,
    },

    // ========== Effect feedback ==========
    /// The wait notice reached the client
    ClientNoticeSent {
        /// Request the notice belongs to
        request_id: RequestId,
        /// Client it was delivered to
        client: ClientId,
        /// Delivered message
        message: MessageRef,
    },

    /// An operator notice was delivered
    OperatorNoticeSent {
        /// Request the notice belongs to
        request_id: RequestId,
        /// Operator it was delivered to
        operator: OperatorId,
        /// Delivered message
        message: MessageRef,
    },

    /// The completion notice reached the client
    CompletionNoticeSent {
        /// Request the notice belongs to
        request_id: RequestId,
        /// Client it was delivered to
        client: ClientId,
        /// Delivered message
        message: MessageRef,
    },

    /// An operator notice could not be delivered
    OperatorNoticeFailed {
        /// Request the notice belongs to
        request_id: RequestId,
        /// Operator it was aimed at
        operator: OperatorId,
    },
}

//! Core types for gate request coordination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Unique identifier of one gate request.
///
/// Random 128-bit value, generated when the client asks for the gate. It is
/// carried in the callback data of every control attached to the request's
/// notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generate a new request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Recipient handle of a client (the chat the client talks to the bot from).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(i64);

impl ClientId {
    /// Wrap a raw chat id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw chat id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Recipient handle of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OperatorId(i64);

impl OperatorId {
    /// Wrap a raw chat id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The raw chat id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for OperatorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a message previously delivered by the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(i64);

impl MessageRef {
    /// Wrap a transport message id.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// The transport message id.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for MessageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whoever a message was delivered to; needed to edit or delete it later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Recipient {
    /// A requesting client
    Client(ClientId),
    /// A configured operator
    Operator(OperatorId),
}

impl std::fmt::Display for Recipient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Client(id) => write!(f, "client:{id}"),
            Self::Operator(id) => write!(f, "operator:{id}"),
        }
    }
}

/// Which physical gate a request concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Entry gate
    Entry,
    /// Exit gate
    Exit,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// Lifecycle state of a request.
///
/// Transitions only move forward: `Open → Accepted → Terminated` or
/// `Open → Terminated`. A request leaves the registry as soon as it is
/// terminated, so live records are always `Open` or `Accepted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Waiting for an operator
    Open,
    /// An operator opened the gate, waiting for the client's acknowledgement
    Accepted,
    /// Dismissed or acknowledged
    Terminated,
}

/// The operator whose action was accepted for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActingOperator {
    /// Operator recipient handle
    pub id: OperatorId,
    /// Display name used in messages
    pub name: String,
}

/// One gate-open workflow instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRequest {
    /// Unique request ID
    pub id: RequestId,

    /// Submission order; higher means more recent
    pub sequence: u64,

    /// Which gate to open
    pub direction: Direction,

    /// Requesting client
    pub client: ClientId,

    /// Username or first name of the client
    pub client_name: String,

    /// Current lifecycle state
    pub status: RequestStatus,

    /// "Please wait" message shown to the client
    pub client_notice: Option<MessageRef>,

    /// Actionable notice delivered to each operator
    pub operator_notices: HashMap<OperatorId, MessageRef>,

    /// Operators whose notice is still in flight
    pub awaiting_notices: HashSet<OperatorId>,

    /// Set once, by the first operator whose acceptance was committed
    pub acting_operator: Option<ActingOperator>,

    /// Message offering the Acknowledge control to the client
    pub completion_notice: Option<MessageRef>,

    /// When the client asked
    pub created_at: DateTime<Utc>,

    /// When an operator accepted
    pub accepted_at: Option<DateTime<Utc>>,
}

impl GateRequest {
    /// Create a new open request. The sequence is assigned on insertion.
    #[must_use]
    pub fn new(
        id: RequestId,
        direction: Direction,
        client: ClientId,
        client_name: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            sequence: 0,
            direction,
            client,
            client_name,
            status: RequestStatus::Open,
            client_notice: None,
            operator_notices: HashMap::new(),
            awaiting_notices: HashSet::new(),
            acting_operator: None,
            completion_notice: None,
            created_at,
            accepted_at: None,
        }
    }

    /// Name of the accepting operator, if any.
    #[must_use]
    pub fn acting_operator_name(&self) -> Option<&str> {
        self.acting_operator.as_ref().map(|op| op.name.as_str())
    }
}

/// Result of reducing one inbound command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// A new request was registered
    Submitted(RequestId),
    /// The request moved to `Accepted`
    Accepted,
    /// The request was dismissed and evicted
    Dismissed,
    /// The request was acknowledged and evicted
    Acknowledged,
    /// No live request matched (already closed, never existed, or wrong state)
    NotFound,
    /// The acting user is not a configured operator
    NotAuthorized,
    /// A request with the same ID is already registered
    Duplicate,
}

impl Outcome {
    /// Whether the command committed a transition.
    #[must_use]
    pub const fn is_committed(&self) -> bool {
        matches!(
            self,
            Self::Submitted(_) | Self::Accepted | Self::Dismissed | Self::Acknowledged
        )
    }

    /// Soft reply for the actor when nothing was committed.
    #[must_use]
    pub const fn feedback_text(&self) -> Option<&'static str> {
        match self {
            Self::NotFound => Some(crate::messages::ALREADY_CLOSED),
            Self::NotAuthorized => Some(crate::messages::NOT_AUTHORIZED),
            Self::Duplicate => Some(crate::messages::TRY_AGAIN),
            Self::Submitted(_) | Self::Accepted | Self::Dismissed | Self::Acknowledged => None,
        }
    }
}

/// State for the gate reducer: the registry of live requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateState {
    requests: HashMap<RequestId, GateRequest>,

    next_sequence: u64,

    /// Operator notice rewrites waiting for the notice's handle
    #[serde(skip)]
    deferred_rewrites: HashMap<(RequestId, OperatorId), String>,

    /// Outcome of the most recently reduced inbound command
    pub last_outcome: Option<Outcome>,
}

impl GateState {
    /// Create a new empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request, assigning it the next submission sequence.
    ///
    /// Returns `false` and leaves the registry untouched if the ID is taken.
    pub fn insert(&mut self, mut request: GateRequest) -> bool {
        if self.requests.contains_key(&request.id) {
            return false;
        }
        self.next_sequence += 1;
        request.sequence = self.next_sequence;
        self.requests.insert(request.id, request);
        true
    }

    /// Get a live request by ID.
    #[must_use]
    pub fn get(&self, request_id: &RequestId) -> Option<&GateRequest> {
        self.requests.get(request_id)
    }

    /// Get a mutable reference to a live request.
    pub fn get_mut(&mut self, request_id: &RequestId) -> Option<&mut GateRequest> {
        self.requests.get_mut(request_id)
    }

    /// Evict a request.
    pub fn remove(&mut self, request_id: &RequestId) -> Option<GateRequest> {
        self.requests.remove(request_id)
    }

    /// Whether a request with this ID is live.
    #[must_use]
    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.requests.contains_key(request_id)
    }

    /// Most recently submitted live request of a client.
    #[must_use]
    pub fn latest_for_client(&self, client: ClientId) -> Option<&GateRequest> {
        self.requests
            .values()
            .filter(|r| r.client == client)
            .max_by_key(|r| r.sequence)
    }

    /// Live requests, oldest first.
    #[must_use]
    pub fn pending(&self) -> Vec<&GateRequest> {
        let mut pending: Vec<_> = self.requests.values().collect();
        pending.sort_by_key(|r| r.sequence);
        pending
    }

    /// Remember the text an in-flight operator notice must be rewritten to.
    ///
    /// Survives eviction of the request, so a dismissal or acknowledgement
    /// does not lose it.
    pub fn defer_rewrite(&mut self, request_id: RequestId, operator: OperatorId, text: String) {
        self.deferred_rewrites.insert((request_id, operator), text);
    }

    /// Claim a deferred rewrite.
    pub fn take_deferred_rewrite(
        &mut self,
        request_id: RequestId,
        operator: OperatorId,
    ) -> Option<String> {
        self.deferred_rewrites.remove(&(request_id, operator))
    }

    /// Count of deferred rewrites.
    #[must_use]
    pub fn deferred_rewrites(&self) -> usize {
        self.deferred_rewrites.len()
    }

    /// Count of live requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Check if no request is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

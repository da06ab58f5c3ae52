//! # Gatekeeper
//!
//! Request lifecycle coordinator for operator-approved gate openings.
//!
//! A client asks for the entry or exit gate. Every configured operator gets an
//! actionable notice; the first operator to press Accept or Dismiss decides the
//! request, later presses find nothing. After an acceptance the client is told
//! who opened the gate and can acknowledge, which closes the request and
//! thanks the operators.
//!
//! ## Architecture
//!
//! - [`GateReducer`] holds every transition rule and returns notifications as
//!   effects
//! - [`GateCoordinator`] owns the store, serializes actions and reports the
//!   [`Outcome`] of each one
//! - [`Notifier`] is the outbound transport boundary
//!
//! ## Example
//!
//! ```ignore
//! let env = GateEnvironment::new(Arc::new(SystemClock), LoggingNotifier::shared(), operators);
//! let coordinator = GateCoordinator::new(env);
//!
//! let id = coordinator.submit_request(client, "ann", Direction::Entry).await?;
//! let outcome = coordinator
//!     .apply_operator_action(id, Decision::Accept, operator, "bob")
//!     .await?;
//! assert_eq!(outcome, Outcome::Accepted);
//! ```

pub mod actions;
pub mod config;
pub mod controls;
pub mod coordinator;
pub mod environment;
pub mod events;
pub mod messages;
pub mod notifier;
pub mod reducer;
pub mod types;

pub use actions::{Decision, GateAction};
pub use config::{Config, ConfigError};
pub use controls::{Control, ControlParseError};
pub use coordinator::{CoordinatorError, GateCoordinator};
pub use environment::GateEnvironment;
pub use events::{Actor, GateEvent};
pub use notifier::{LoggingNotifier, Notifier, NotifierCall, NotifierError, RecordingNotifier};
pub use reducer::GateReducer;
pub use types::{
    ClientId, Direction, GateRequest, GateState, MessageRef, OperatorId, Outcome, Recipient,
    RequestId, RequestStatus,
};

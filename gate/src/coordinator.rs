//! Coordinator facade over the gate store.
//!
//! The store serializes every transition; the coordinator turns transport
//! events into actions, reports the committed [`Outcome`] back to the caller,
//! and counts transitions.

use crate::actions::{Decision, GateAction};
use crate::environment::GateEnvironment;
use crate::events::GateEvent;
use crate::reducer::GateReducer;
use crate::types::{ClientId, Direction, GateRequest, GateState, OperatorId, Outcome, RequestId};
use gatekeeper_runtime::{Store, StoreError};
use std::time::Duration;
use thiserror::Error;

/// Store type backing the coordinator.
pub type GateStore = Store<GateState, GateAction, GateEnvironment, GateReducer>;

/// Coordinator error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// The store rejected or timed out
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A freshly minted request ID collided with a live one
    #[error("request id {0} is already registered")]
    DuplicateRequestId(RequestId),
}

/// Entry point for transports.
///
/// Cheap to clone; every clone drives the same registry.
#[derive(Clone)]
pub struct GateCoordinator {
    store: GateStore,
}

impl GateCoordinator {
    /// Create a coordinator with an empty registry.
    #[must_use]
    pub fn new(environment: GateEnvironment) -> Self {
        Self {
            store: Store::new(GateState::new(), GateReducer::new(), environment),
        }
    }

    /// Register a new request and start the wait/broadcast notifications.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Store`] while shutting down, or
    /// [`CoordinatorError::DuplicateRequestId`] if the new ID collided.
    pub async fn submit_request(
        &self,
        client: ClientId,
        client_name: impl Into<String>,
        direction: Direction,
    ) -> Result<RequestId, CoordinatorError> {
        let request_id = RequestId::new();
        let outcome = self
            .dispatch(GateAction::SubmitRequest {
                request_id,
                client,
                client_name: client_name.into(),
                direction,
            })
            .await?;

        match outcome {
            Outcome::Submitted(id) => Ok(id),
            _ => Err(CoordinatorError::DuplicateRequestId(request_id)),
        }
    }

    /// Apply an operator's Accept or Dismiss.
    ///
    /// Exactly one of several concurrent actions on the same open request
    /// gets `Accepted`/`Dismissed`; the rest get `NotFound`.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Store`] while shutting down.
    pub async fn apply_operator_action(
        &self,
        request_id: RequestId,
        decision: Decision,
        operator: OperatorId,
        operator_name: impl Into<String>,
    ) -> Result<Outcome, CoordinatorError> {
        self.dispatch(GateAction::OperatorActed {
            request_id,
            decision,
            operator,
            operator_name: operator_name.into(),
        })
        .await
    }

    /// Close an accepted request on the client's acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Store`] while shutting down.
    pub async fn acknowledge_completion(
        &self,
        request_id: RequestId,
    ) -> Result<Outcome, CoordinatorError> {
        self.dispatch(GateAction::AcknowledgeCompletion { request_id })
            .await
    }

    /// Acknowledge the client's most recent live request.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Store`] while shutting down.
    pub async fn acknowledge_latest(&self, client: ClientId) -> Result<Outcome, CoordinatorError> {
        self.dispatch(GateAction::AcknowledgeLatest { client }).await
    }

    /// Route a normalized transport event.
    ///
    /// # Errors
    ///
    /// Same as the operation the event maps to.
    pub async fn handle(&self, event: GateEvent) -> Result<Outcome, CoordinatorError> {
        match event {
            GateEvent::ClientRequestedGate {
                client,
                client_name,
                direction,
            } => self
                .submit_request(client, client_name, direction)
                .await
                .map(Outcome::Submitted),
            GateEvent::OperatorActed {
                request_id,
                decision,
                operator,
                operator_name,
            } => {
                self.apply_operator_action(request_id, decision, operator, operator_name)
                    .await
            },
            GateEvent::ClientAcknowledged { request_id } => {
                self.acknowledge_completion(request_id).await
            },
            GateEvent::ClientAcknowledgedLatest { client } => self.acknowledge_latest(client).await,
        }
    }

    /// ID of the client's most recent live request.
    pub async fn latest_for_client(&self, client: ClientId) -> Option<RequestId> {
        self.store
            .state(|s| s.latest_for_client(client).map(|r| r.id))
            .await
    }

    /// Snapshot of a live request.
    pub async fn get(&self, request_id: RequestId) -> Option<GateRequest> {
        self.store.state(|s| s.get(&request_id).cloned()).await
    }

    /// Snapshot of every live request, oldest first.
    pub async fn pending(&self) -> Vec<GateRequest> {
        self.store
            .state(|s| s.pending().into_iter().cloned().collect())
            .await
    }

    /// Wait until every notification, and every follow-up it triggered, has
    /// completed.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Store`] if work is still running after
    /// `timeout`.
    pub async fn settle(&self, timeout: Duration) -> Result<(), CoordinatorError> {
        Ok(self.store.wait_for_idle(timeout).await?)
    }

    /// Stop accepting events and drain in-flight notifications.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::Store`] if notifications are still running
    /// after `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), CoordinatorError> {
        tracing::info!(live_requests = self.store.state(GateState::len).await, "Shutting down");
        Ok(self.store.shutdown(timeout).await?)
    }

    async fn dispatch(&self, action: GateAction) -> Result<Outcome, CoordinatorError> {
        let (outcome, _effects) = self
            .store
            .send_and_inspect(action, |state| state.last_outcome.clone())
            .await?;
        let outcome = outcome.unwrap_or(Outcome::NotFound);
        record_outcome(&outcome);
        Ok(outcome)
    }
}

impl std::fmt::Debug for GateCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateCoordinator")
            .field("pending_effects", &self.store.pending_effects())
            .field("shutting_down", &self.store.is_shutting_down())
            .finish()
    }
}

fn record_outcome(outcome: &Outcome) {
    let name = match outcome {
        Outcome::Submitted(_) => "gate.requests.submitted",
        Outcome::Accepted => "gate.requests.accepted",
        Outcome::Dismissed => "gate.requests.dismissed",
        Outcome::Acknowledged => "gate.requests.acknowledged",
        Outcome::NotFound => "gate.actions.not_found",
        Outcome::NotAuthorized => "gate.actions.not_authorized",
        Outcome::Duplicate => "gate.actions.duplicate",
    };
    metrics::counter!(name).increment(1);
}

//! Environment for the gate reducer.

use crate::notifier::Notifier;
use crate::types::OperatorId;
use gatekeeper_core::environment::Clock;
use std::sync::Arc;

/// Injected dependencies of the gate reducer.
///
/// Production wires a `SystemClock` and a transport notifier; tests use
/// `FixedClock` and `RecordingNotifier`.
#[derive(Clone)]
pub struct GateEnvironment {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    operators: Arc<[OperatorId]>,
}

impl GateEnvironment {
    /// Create a new environment.
    ///
    /// `operators` is the allow-list in broadcast order. It is fixed for the
    /// lifetime of the environment.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        operators: impl Into<Arc<[OperatorId]>>,
    ) -> Self {
        Self {
            clock,
            notifier,
            operators: operators.into(),
        }
    }

    /// Clock for timestamps.
    #[must_use]
    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Shared handle to the notifier, for moving into effects.
    #[must_use]
    pub fn notifier(&self) -> Arc<dyn Notifier> {
        Arc::clone(&self.notifier)
    }

    /// Configured operators, in broadcast order.
    #[must_use]
    pub fn operators(&self) -> &[OperatorId] {
        &self.operators
    }

    /// Whether `id` is on the operator allow-list.
    #[must_use]
    pub fn is_operator(&self, id: OperatorId) -> bool {
        self.operators.contains(&id)
    }
}

impl std::fmt::Debug for GateEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateEnvironment")
            .field("operators", &self.operators)
            .finish_non_exhaustive()
    }
}

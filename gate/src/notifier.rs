//! Outbound notification boundary.
//!
//! The coordinator never talks to a chat transport directly. Every message it
//! sends, rewrites or retracts goes through a [`Notifier`], which the
//! environment injects. Calls are fire-and-forget from the reducer's point of
//! view: a failure is logged and counted, never retried, and never rolls back
//! a transition.

use crate::controls::Control;
use crate::types::{ClientId, MessageRef, OperatorId, Recipient};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by every notifier call.
pub type NotifierFuture<T> = Pin<Box<dyn Future<Output = Result<T, NotifierError>> + Send>>;

/// Notifier error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifierError {
    /// The transport refused or failed the call
    #[error("delivery to {recipient} failed: {reason}")]
    Delivery {
        /// Targeted recipient
        recipient: Recipient,
        /// Transport-provided reason
        reason: String,
    },
}

/// Outbound messaging capability.
///
/// Deleting a message that is already gone must succeed.
pub trait Notifier: Send + Sync {
    /// Send a message to a client, optionally with controls
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails to deliver the message
    fn send_to_client(
        &self,
        client: ClientId,
        text: String,
        controls: Vec<Control>,
    ) -> NotifierFuture<MessageRef>;

    /// Send a message to an operator, optionally with controls
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails to deliver the message
    fn send_to_operator(
        &self,
        operator: OperatorId,
        text: String,
        controls: Vec<Control>,
    ) -> NotifierFuture<MessageRef>;

    /// Replace the text of a delivered message and drop its controls
    ///
    /// # Errors
    ///
    /// Returns error if the message cannot be edited
    fn edit_message(
        &self,
        recipient: Recipient,
        message: MessageRef,
        text: String,
    ) -> NotifierFuture<()>;

    /// Retract a delivered message
    ///
    /// # Errors
    ///
    /// Returns error if the transport fails the call
    fn delete_message(&self, recipient: Recipient, message: MessageRef) -> NotifierFuture<()>;
}

/// Notifier that writes every call to the log.
///
/// Used by the console binary in place of a chat transport.
#[derive(Debug, Default)]
pub struct LoggingNotifier {
    next_message: AtomicI64,
}

impl LoggingNotifier {
    /// Creates a new logging notifier
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_message: AtomicI64::new(0),
        }
    }

    /// Creates an Arc-wrapped instance for sharing
    #[must_use]
    pub fn shared() -> Arc<dyn Notifier> {
        Arc::new(Self::new())
    }

    fn deliver(&self, recipient: Recipient, text: &str, controls: &[Control]) -> MessageRef {
        let message = MessageRef::new(self.next_message.fetch_add(1, Ordering::Relaxed) + 1);
        let buttons: Vec<String> = controls
            .iter()
            .map(|c| format!("[{}]({})", c.label(), c.callback_data()))
            .collect();
        tracing::info!(
            %recipient,
            %message,
            buttons = %buttons.join(" "),
            "{text}"
        );
        message
    }
}

impl Notifier for LoggingNotifier {
    fn send_to_client(
        &self,
        client: ClientId,
        text: String,
        controls: Vec<Control>,
    ) -> NotifierFuture<MessageRef> {
        let message = self.deliver(Recipient::Client(client), &text, &controls);
        Box::pin(async move { Ok(message) })
    }

    fn send_to_operator(
        &self,
        operator: OperatorId,
        text: String,
        controls: Vec<Control>,
    ) -> NotifierFuture<MessageRef> {
        let message = self.deliver(Recipient::Operator(operator), &text, &controls);
        Box::pin(async move { Ok(message) })
    }

    fn edit_message(
        &self,
        recipient: Recipient,
        message: MessageRef,
        text: String,
    ) -> NotifierFuture<()> {
        tracing::info!(%recipient, %message, "edited: {text}");
        Box::pin(async { Ok(()) })
    }

    fn delete_message(&self, recipient: Recipient, message: MessageRef) -> NotifierFuture<()> {
        tracing::info!(%recipient, %message, "deleted");
        Box::pin(async { Ok(()) })
    }
}

/// One call observed by a [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    /// A message was delivered
    Sent {
        /// Receiver
        recipient: Recipient,
        /// Handle returned to the caller
        message: MessageRef,
        /// Message text
        text: String,
        /// Attached controls
        controls: Vec<Control>,
    },
    /// A message was rewritten
    Edited {
        /// Owner of the message
        recipient: Recipient,
        /// Rewritten message
        message: MessageRef,
        /// New text
        text: String,
    },
    /// A message was retracted
    Deleted {
        /// Owner of the message
        recipient: Recipient,
        /// Retracted message
        message: MessageRef,
    },
}

impl NotifierCall {
    /// Recipient the call targeted.
    #[must_use]
    pub const fn recipient(&self) -> Recipient {
        match self {
            Self::Sent { recipient, .. }
            | Self::Edited { recipient, .. }
            | Self::Deleted { recipient, .. } => *recipient,
        }
    }
}

#[derive(Debug, Default)]
struct Recording {
    calls: Vec<NotifierCall>,
    next_message: i64,
    failing: HashSet<Recipient>,
}

/// In-memory notifier for tests.
///
/// Records every successful call in order, hands out increasing message
/// handles, and fails every call aimed at a recipient marked with
/// [`fail_for`](Self::fail_for). An optional latency makes in-flight windows
/// observable.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    inner: Arc<Mutex<Recording>>,
    latency: Option<Duration>,
}

impl RecordingNotifier {
    /// Creates a new recording notifier with no latency
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call by `latency` before it completes
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every call aimed at `recipient` fail
    pub fn fail_for(&self, recipient: Recipient) {
        self.lock().failing.insert(recipient);
    }

    /// All recorded calls, in completion order
    #[must_use]
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.lock().calls.clone()
    }

    /// Recorded calls aimed at one recipient
    #[must_use]
    pub fn calls_to(&self, recipient: Recipient) -> Vec<NotifierCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.recipient() == recipient)
            .cloned()
            .collect()
    }

    /// Texts delivered to one recipient, in order
    #[must_use]
    pub fn texts_sent_to(&self, recipient: Recipient) -> Vec<String> {
        self.calls_to(recipient)
            .into_iter()
            .filter_map(|call| match call {
                NotifierCall::Sent { text, .. } => Some(text),
                NotifierCall::Edited { .. } | NotifierCall::Deleted { .. } => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record<T: Send + 'static>(
        &self,
        recipient: Recipient,
        complete: impl FnOnce(&mut Recording) -> T + Send + 'static,
    ) -> NotifierFuture<T> {
        let inner = Arc::clone(&self.inner);
        let latency = self.latency;
        Box::pin(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            let mut recording = inner.lock().unwrap_or_else(PoisonError::into_inner);
            if recording.failing.contains(&recipient) {
                return Err(NotifierError::Delivery {
                    recipient,
                    reason: "recipient unreachable".to_string(),
                });
            }
            Ok(complete(&mut recording))
        })
    }

    fn send(
        &self,
        recipient: Recipient,
        text: String,
        controls: Vec<Control>,
    ) -> NotifierFuture<MessageRef> {
        self.record(recipient, move |recording| {
            recording.next_message += 1;
            let message = MessageRef::new(recording.next_message);
            recording.calls.push(NotifierCall::Sent {
                recipient,
                message,
                text,
                controls,
            });
            message
        })
    }
}

impl Notifier for RecordingNotifier {
    fn send_to_client(
        &self,
        client: ClientId,
        text: String,
        controls: Vec<Control>,
    ) -> NotifierFuture<MessageRef> {
        self.send(Recipient::Client(client), text, controls)
    }

    fn send_to_operator(
        &self,
        operator: OperatorId,
        text: String,
        controls: Vec<Control>,
    ) -> NotifierFuture<MessageRef> {
        self.send(Recipient::Operator(operator), text, controls)
    }

    fn edit_message(
        &self,
        recipient: Recipient,
        message: MessageRef,
        text: String,
    ) -> NotifierFuture<()> {
        self.record(recipient, move |recording| {
            recording.calls.push(NotifierCall::Edited {
                recipient,
                message,
                text,
            });
        })
    }

    fn delete_message(&self, recipient: Recipient, message: MessageRef) -> NotifierFuture<()> {
        self.record(recipient, move |recording| {
            recording
                .calls
                .push(NotifierCall::Deleted { recipient, message });
        })
    }
}

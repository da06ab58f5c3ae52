//! Reducer for gate request coordination.
//!
//! Every transition of the request registry happens here, under the store's
//! write lock. Notifications are returned as effects and run afterwards, so a
//! slow or failing transport never blocks another action and never undoes a
//! transition that was already committed.

use crate::actions::{Decision, GateAction};
use crate::controls::Control;
use crate::environment::GateEnvironment;
use crate::messages;
use crate::notifier::NotifierError;
use crate::types::{
    ActingOperator, ClientId, Direction, GateRequest, GateState, MessageRef, OperatorId, Outcome,
    Recipient, RequestId, RequestStatus,
};
use gatekeeper_core::{effect::Effect, reducer::Reducer};
use smallvec::{SmallVec, smallvec};

type Effects = SmallVec<[Effect<GateAction>; 4]>;

/// Reducer for the gate request lifecycle.
///
/// Commands record their [`Outcome`] in [`GateState::last_outcome`]; effect
/// feedback leaves it alone.
#[derive(Debug, Clone, Copy)]
pub struct GateReducer;

impl GateReducer {
    /// Create a new gate reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn submit(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        client: ClientId,
        client_name: String,
        direction: Direction,
    ) -> Effects {
        let mut request = GateRequest::new(
            request_id,
            direction,
            client,
            client_name.clone(),
            env.clock().now(),
        );
        request.awaiting_notices = env.operators().iter().copied().collect();
        if !state.insert(request) {
            tracing::warn!(%request_id, "Request id already registered");
            state.last_outcome = Some(Outcome::Duplicate);
            return SmallVec::new();
        }

        tracing::info!(%request_id, %client, %direction, "Gate request submitted");
        state.last_outcome = Some(Outcome::Submitted(request_id));

        let mut fanout = Vec::with_capacity(env.operators().len() + 1);
        fanout.push(notify_client(
            env,
            client,
            messages::wait_notice(),
            Vec::new(),
            move |message| {
                Some(GateAction::ClientNoticeSent {
                    request_id,
                    client,
                    message,
                })
            },
        ));
        let notice = messages::operator_request(&client_name, direction);
        for &operator in env.operators() {
            fanout.push(notify_operator(
                env,
                operator,
                notice.clone(),
                vec![Control::Accept(request_id), Control::Dismiss(request_id)],
                move |message| {
                    Some(GateAction::OperatorNoticeSent {
                        request_id,
                        operator,
                        message,
                    })
                },
                Some(GateAction::OperatorNoticeFailed {
                    request_id,
                    operator,
                }),
            ));
        }

        smallvec![Effect::merge(fanout)]
    }

    fn operator_acted(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        decision: Decision,
        operator: OperatorId,
        operator_name: String,
    ) -> Effects {
        if !env.is_operator(operator) {
            tracing::warn!(%request_id, %operator, "Operator action from unknown user");
            state.last_outcome = Some(Outcome::NotAuthorized);
            return SmallVec::new();
        }

        let is_open = state
            .get(&request_id)
            .is_some_and(|r| r.status == RequestStatus::Open);
        if !is_open {
            tracing::debug!(%request_id, %operator, ?decision, "Request no longer open");
            state.last_outcome = Some(Outcome::NotFound);
            return SmallVec::new();
        }

        match decision {
            Decision::Accept => Self::accept(state, env, request_id, operator, operator_name),
            Decision::Dismiss => Self::dismiss(state, env, request_id, operator),
        }
    }

    fn accept(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        operator: OperatorId,
        operator_name: String,
    ) -> Effects {
        let now = env.clock().now();
        let Some(request) = state.get_mut(&request_id) else {
            state.last_outcome = Some(Outcome::NotFound);
            return SmallVec::new();
        };

        request.status = RequestStatus::Accepted;
        request.accepted_at = Some(now);
        request.acting_operator = Some(ActingOperator {
            id: operator,
            name: operator_name.clone(),
        });

        let client = request.client;
        let direction = request.direction;
        let retract = request
            .client_notice
            .take()
            .map(|message| delete(env, Recipient::Client(client), message));
        let notice = request.operator_notices.get(&operator).copied();
        let in_flight = request.awaiting_notices.contains(&operator);
        let completed = messages::operator_completed(&request.client_name, direction);

        tracing::info!(%request_id, %operator, "Gate request accepted");
        state.last_outcome = Some(Outcome::Accepted);

        let rewrite = Self::rewrite_operator_notice(
            state, env, request_id, operator, notice, in_flight, completed,
        );

        let completion = notify_client(
            env,
            client,
            messages::client_gate_opened(direction, &operator_name),
            vec![Control::Acknowledge(request_id)],
            move |message| {
                Some(GateAction::CompletionNoticeSent {
                    request_id,
                    client,
                    message,
                })
            },
        );
        let follow_up = Effect::merge(rewrite.into_iter().chain([completion]).collect());

        // The wait notice goes before anything new reaches the client.
        match retract {
            Some(retract) => smallvec![Effect::chain(vec![retract, follow_up])],
            None => smallvec![follow_up],
        }
    }

    fn dismiss(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        operator: OperatorId,
    ) -> Effects {
        let Some(mut request) = state.remove(&request_id) else {
            state.last_outcome = Some(Outcome::NotFound);
            return SmallVec::new();
        };
        request.status = RequestStatus::Terminated;

        tracing::info!(%request_id, %operator, "Gate request dismissed");
        state.last_outcome = Some(Outcome::Dismissed);

        let retract = request
            .client_notice
            .map(|message| delete(env, Recipient::Client(request.client), message));
        let rewrite = Self::rewrite_operator_notice(
            state,
            env,
            request_id,
            operator,
            request.operator_notices.get(&operator).copied(),
            request.awaiting_notices.contains(&operator),
            messages::operator_dismissed(request.direction),
        );

        smallvec![Effect::merge(retract.into_iter().chain(rewrite).collect())]
    }

    fn acknowledge(state: &mut GateState, env: &GateEnvironment, request_id: RequestId) -> Effects {
        let is_accepted = state
            .get(&request_id)
            .is_some_and(|r| r.status == RequestStatus::Accepted);
        if !is_accepted {
            tracing::debug!(%request_id, "Nothing to acknowledge");
            state.last_outcome = Some(Outcome::NotFound);
            return SmallVec::new();
        }
        let Some(mut request) = state.remove(&request_id) else {
            state.last_outcome = Some(Outcome::NotFound);
            return SmallVec::new();
        };
        request.status = RequestStatus::Terminated;

        tracing::info!(%request_id, client = %request.client, "Gate request acknowledged");
        state.last_outcome = Some(Outcome::Acknowledged);

        let client = request.client;
        let direction = request.direction;
        let operator_name = request
            .acting_operator_name()
            .unwrap_or(messages::FALLBACK_OPERATOR_NAME);

        let mut fanout = Vec::with_capacity(env.operators().len() + 2);
        if let Some(message) = request.completion_notice {
            fanout.push(delete(env, Recipient::Client(client), message));
        }
        fanout.push(notify_client(
            env,
            client,
            messages::client_request_closed(direction, operator_name),
            Vec::new(),
            |_| None,
        ));
        let thanks = messages::operator_thanked(&request.client_name, direction);
        for &operator in env.operators() {
            fanout.push(notify_operator(
                env,
                operator,
                thanks.clone(),
                Vec::new(),
                |_| None,
                None,
            ));
        }

        smallvec![Effect::merge(fanout)]
    }

    /// Rewrite the acting operator's notice, or remember the text until the
    /// notice's handle arrives.
    fn rewrite_operator_notice(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        operator: OperatorId,
        notice: Option<MessageRef>,
        in_flight: bool,
        text: String,
    ) -> Option<Effect<GateAction>> {
        if let Some(message) = notice {
            return Some(edit(env, Recipient::Operator(operator), message, text));
        }
        if in_flight {
            tracing::debug!(%request_id, %operator, "Operator notice in flight, deferring rewrite");
            state.defer_rewrite(request_id, operator, text);
        }
        None
    }

    fn operator_notice_sent(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        operator: OperatorId,
        message: MessageRef,
    ) -> Effects {
        // Notices of other operators keep their controls once the request
        // is decided; pressing them later only yields NotFound.
        if let Some(request) = state.get_mut(&request_id) {
            request.awaiting_notices.remove(&operator);
            request.operator_notices.insert(operator, message);
        }
        match state.take_deferred_rewrite(request_id, operator) {
            Some(text) => {
                tracing::debug!(%request_id, %operator, %message, "Applying deferred rewrite");
                smallvec![edit(env, Recipient::Operator(operator), message, text)]
            },
            None => SmallVec::new(),
        }
    }

    fn operator_notice_failed(
        state: &mut GateState,
        request_id: RequestId,
        operator: OperatorId,
    ) -> Effects {
        if let Some(request) = state.get_mut(&request_id) {
            request.awaiting_notices.remove(&operator);
        }
        if state.take_deferred_rewrite(request_id, operator).is_some() {
            tracing::debug!(%request_id, %operator, "Dropped rewrite of undelivered notice");
        }
        SmallVec::new()
    }

    fn client_notice_sent(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        client: ClientId,
        message: MessageRef,
    ) -> Effects {
        match state.get_mut(&request_id) {
            Some(request) if request.status == RequestStatus::Open => {
                request.client_notice = Some(message);
                SmallVec::new()
            },
            _ => {
                tracing::debug!(%request_id, %message, "Wait notice arrived late, retracting");
                smallvec![delete(env, Recipient::Client(client), message)]
            },
        }
    }

    fn completion_notice_sent(
        state: &mut GateState,
        env: &GateEnvironment,
        request_id: RequestId,
        client: ClientId,
        message: MessageRef,
    ) -> Effects {
        match state.get_mut(&request_id) {
            Some(request) if request.status == RequestStatus::Accepted => {
                request.completion_notice = Some(message);
                SmallVec::new()
            },
            _ => {
                tracing::debug!(%request_id, %message, "Completion notice arrived late");
                smallvec![delete(env, Recipient::Client(client), message)]
            },
        }
    }
}

impl Default for GateReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for GateReducer {
    type State = GateState;
    type Action = GateAction;
    type Environment = GateEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            GateAction::SubmitRequest {
                request_id,
                client,
                client_name,
                direction,
            } => Self::submit(state, env, request_id, client, client_name, direction),

            GateAction::OperatorActed {
                request_id,
                decision,
                operator,
                operator_name,
            } => Self::operator_acted(state, env, request_id, decision, operator, operator_name),

            GateAction::AcknowledgeCompletion { request_id } => {
                Self::acknowledge(state, env, request_id)
            },

            GateAction::AcknowledgeLatest { client } => {
                match state.latest_for_client(client).map(|r| r.id) {
                    Some(request_id) => Self::acknowledge(state, env, request_id),
                    None => {
                        tracing::debug!(%client, "No live request to acknowledge");
                        state.last_outcome = Some(Outcome::NotFound);
                        SmallVec::new()
                    },
                }
            },

            GateAction::ClientNoticeSent {
                request_id,
                client,
                message,
            } => Self::client_notice_sent(state, env, request_id, client, message),

            GateAction::OperatorNoticeSent {
                request_id,
                operator,
                message,
            } => Self::operator_notice_sent(state, env, request_id, operator, message),

            GateAction::OperatorNoticeFailed {
                request_id,
                operator,
            } => Self::operator_notice_failed(state, request_id, operator),

            GateAction::CompletionNoticeSent {
                request_id,
                client,
                message,
            } => Self::completion_notice_sent(state, env, request_id, client, message),
        }
    }
}

fn report_failure(call: &'static str, error: &NotifierError) {
    tracing::warn!(call, %error, "Notifier call failed");
    metrics::counter!("gate.notifier.failures", "call" => call).increment(1);
}

fn notify_client(
    env: &GateEnvironment,
    client: ClientId,
    text: String,
    controls: Vec<Control>,
    on_sent: impl FnOnce(MessageRef) -> Option<GateAction> + Send + 'static,
) -> Effect<GateAction> {
    let notifier = env.notifier();
    Effect::future(async move {
        match notifier.send_to_client(client, text, controls).await {
            Ok(message) => on_sent(message),
            Err(error) => {
                report_failure("send_to_client", &error);
                None
            },
        }
    })
}

fn notify_operator(
    env: &GateEnvironment,
    operator: OperatorId,
    text: String,
    controls: Vec<Control>,
    on_sent: impl FnOnce(MessageRef) -> Option<GateAction> + Send + 'static,
    on_failed: Option<GateAction>,
) -> Effect<GateAction> {
    let notifier = env.notifier();
    Effect::future(async move {
        match notifier.send_to_operator(operator, text, controls).await {
            Ok(message) => on_sent(message),
            Err(error) => {
                report_failure("send_to_operator", &error);
                on_failed
            },
        }
    })
}

fn edit(
    env: &GateEnvironment,
    recipient: Recipient,
    message: MessageRef,
    text: String,
) -> Effect<GateAction> {
    let notifier = env.notifier();
    Effect::future(async move {
        if let Err(error) = notifier.edit_message(recipient, message, text).await {
            report_failure("edit_message", &error);
        }
        None
    })
}

fn delete(env: &GateEnvironment, recipient: Recipient, message: MessageRef) -> Effect<GateAction> {
    let notifier = env.notifier();
    Effect::future(async move {
        if let Err(error) = notifier.delete_message(recipient, message).await {
            report_failure("delete_message", &error);
        }
        None
    })
}

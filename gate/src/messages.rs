//! User-facing texts.
//!
//! Clients see lines prefixed with `-`, operators see lines prefixed with `>`.

use crate::types::Direction;

/// Reply-keyboard caption a client presses to ask for the entry gate.
pub const ENTRY_BUTTON: &str = "Please open the entry 🚗";

/// Reply-keyboard caption a client presses to ask for the exit gate.
pub const EXIT_BUTTON: &str = "🚗 Please open the exit";

/// Reply-keyboard caption for thanking the operator of the latest request.
pub const THANKS_BUTTON: &str = "👍 Thank you";

/// Feedback when the targeted request is no longer live.
pub const ALREADY_CLOSED: &str = "Request already closed or not found.";

/// Feedback when a non-operator presses an operator control.
pub const NOT_AUTHORIZED: &str = "Only operators can act on gate requests.";

/// Feedback when a submission collided with a live request ID.
pub const TRY_AGAIN: &str = "Could not register the request, please try again.";

/// Used when an accepted request somehow lost its operator name.
pub const FALLBACK_OPERATOR_NAME: &str = "operator";

/// Greeting sent on `/start`.
pub const WELCOME: &str = "Welcome! Use the buttons below to request the gate.";

/// "Please wait" notice sent to the client right after submission.
#[must_use]
pub fn wait_notice() -> String {
    "- Request forwarded to the operators. Please wait.".to_string()
}

/// Actionable notice sent to every operator.
#[must_use]
pub fn operator_request(client_name: &str, direction: Direction) -> String {
    format!("> @{client_name} asks to open the {direction}")
}

/// Operator notice rewritten after a dismissal.
#[must_use]
pub fn operator_dismissed(direction: Direction) -> String {
    format!("> Request to open the {direction} dismissed")
}

/// Operator notice rewritten after an acceptance.
#[must_use]
pub fn operator_completed(client_name: &str, direction: Direction) -> String {
    format!("> Request from @{client_name} to open the {direction} completed")
}

/// Completion notice offering the client the Acknowledge control.
#[must_use]
pub fn client_gate_opened(direction: Direction, operator_name: &str) -> String {
    format!("- The {direction} gate was opened by operator @{operator_name}")
}

/// Final confirmation sent to the client after acknowledging.
#[must_use]
pub fn client_request_closed(direction: Direction, operator_name: &str) -> String {
    format!("- Request to open the {direction} completed by @{operator_name}")
}

/// Thanks forwarded to every operator after the client acknowledged.
#[must_use]
pub fn operator_thanked(client_name: &str, direction: Direction) -> String {
    format!("> 👏 Thanks for the {direction} from @{client_name}")
}

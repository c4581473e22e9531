//! Conversation state types

use crate::catalog::SearchResults;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Classifier decision for the opening query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    #[default]
    #[serde(alias = "")]
    Unset,
    Order,
    Greeting,
}

/// Position of a conversation in the order flow.
///
/// This is the complete set of values `current_step` can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[default]
    Starting,
    Routed,
    /// Greeting answered
    Complete,
    ProductsExtracted,
    /// Nothing to look up in the query
    NoProducts,
    /// Every mentioned product is unknown or out of stock
    NoProductsAvailable,
    NeedConfirmation,
    NeedQuantity,
    /// Quantity came with the confirmation reply
    QuantityExtracted,
    /// Quantity came as a separate numeric reply
    QuantityReceived,
    OrderDeclined,
    OrderComplete,
    OrderError,
}

impl Step {
    pub const ALL: [Step; 13] = [
        Step::Starting,
        Step::Routed,
        Step::Complete,
        Step::ProductsExtracted,
        Step::NoProducts,
        Step::NoProductsAvailable,
        Step::NeedConfirmation,
        Step::NeedQuantity,
        Step::QuantityExtracted,
        Step::QuantityReceived,
        Step::OrderDeclined,
        Step::OrderComplete,
        Step::OrderError,
    ];

    /// The conversation is over once one of these is reached
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Step::Complete
                | Step::NoProducts
                | Step::NoProductsAvailable
                | Step::OrderDeclined
                | Step::OrderComplete
                | Step::OrderError
        )
    }

    /// Steps at which the flow waits for a user reply
    pub fn is_suspend(self) -> bool {
        matches!(self, Step::NeedConfirmation | Step::NeedQuantity)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Step::Starting => "starting",
            Step::Routed => "routed",
            Step::Complete => "complete",
            Step::ProductsExtracted => "products_extracted",
            Step::NoProducts => "no_products",
            Step::NoProductsAvailable => "no_products_available",
            Step::NeedConfirmation => "need_confirmation",
            Step::NeedQuantity => "need_quantity",
            Step::QuantityExtracted => "quantity_extracted",
            Step::QuantityReceived => "quantity_received",
            Step::OrderDeclined => "order_declined",
            Step::OrderComplete => "order_complete",
            Step::OrderError => "order_error",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of reply the flow is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputType {
    #[default]
    #[serde(alias = "")]
    None,
    Confirmation,
    Quantity,
}

/// Errors reconstructing a state from a caller-supplied snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("invalid conversation state: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// State of one order conversation, threaded by value through the flow
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationState {
    pub user_query: String,
    pub route: Route,
    pub products_to_search: Vec<String>,
    /// Lookups keyed by the mention as extracted, not the catalog key
    pub search_results: SearchResults,
    pub wants_to_order: bool,
    /// Only meaningful when `wants_to_order` is set
    pub quantity: u32,
    pub messages: Vec<String>,
    pub current_step: Step,
    pub waiting_for_input: bool,
    pub input_type: InputType,
    pub user_response: Option<String>,
}

impl ConversationState {
    /// Fresh state for a new conversation
    pub fn new(user_query: impl Into<String>) -> Self {
        Self {
            user_query: user_query.into(),
            ..Self::default()
        }
    }

    /// Rebuild a state from a snapshot echoed back by the caller, ready to
    /// process `user_response`.
    pub fn from_snapshot(snapshot: Value, user_response: &str) -> Result<Self, SnapshotError> {
        let mut state: Self = serde_json::from_value(snapshot)?;
        state.accept_reply(user_response);
        Ok(state)
    }

    pub fn to_snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Record the reply being processed and clear the waiting flags
    pub fn accept_reply(&mut self, user_response: &str) {
        self.user_response = Some(user_response.to_string());
        self.waiting_for_input = false;
        self.input_type = InputType::None;
    }

    pub(crate) fn suspend(&mut self, input_type: InputType) {
        self.waiting_for_input = true;
        self.input_type = input_type;
    }

    pub fn say(&mut self, message: impl Into<String>) {
        self.messages.push(message.into());
    }

    pub fn last_message(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}

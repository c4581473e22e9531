//! Transition functions of the order flow
//!
//! Each node takes the state by value and returns the advanced state. Nodes
//! never fail: classifier problems have already been folded into fallback
//! values by the time a node sees them.

use super::state::{ConversationState, InputType, Step};
use crate::catalog::{self, ProductCatalog};
use crate::classifier::{positive_integer, IntentClassifier, QuantityInputError};

pub const QUANTITY_PROMPT: &str = "Perfect! How many would you like?";
pub const DECLINED_MESSAGE: &str = "No problem! Feel free to ask if you need anything else.";
pub const NOTHING_TO_ORDER_MESSAGE: &str = "Sorry, no products are available for ordering.";
pub const INVALID_QUANTITY_MESSAGE: &str = "Sorry, invalid quantity specified.";
pub const NOT_A_NUMBER_MESSAGE: &str = "Please enter a valid number for the quantity.";
pub const NOT_POSITIVE_MESSAGE: &str = "Please enter a valid positive number.";

pub async fn route_query(
    mut state: ConversationState,
    classifier: &dyn IntentClassifier,
) -> ConversationState {
    state.route = classifier.classify_route(&state.user_query).await;
    state.current_step = Step::Routed;
    state
}

pub async fn handle_greeting(
    mut state: ConversationState,
    classifier: &dyn IntentClassifier,
) -> ConversationState {
    let reply = classifier.greeting_reply(&state.user_query).await;
    state.say(reply);
    state.current_step = Step::Complete;
    state
}

pub async fn extract_products(
    mut state: ConversationState,
    classifier: &dyn IntentClassifier,
) -> ConversationState {
    state.products_to_search = classifier.extract_products(&state.user_query).await;
    state.current_step = Step::ProductsExtracted;
    state
}

pub fn search_products(mut state: ConversationState, catalog: &ProductCatalog) -> ConversationState {
    if state.products_to_search.is_empty() {
        state.say(catalog::no_products_message());
        state.current_step = Step::NoProducts;
        return state;
    }

    state.search_results = catalog.search(&state.products_to_search);
    state.say(catalog::format_results(&state.search_results));
    state.current_step = if catalog::available_subset(&state.search_results).is_empty() {
        Step::NoProductsAvailable
    } else {
        Step::NeedConfirmation
    };
    state
}

/// Suspends for a confirmation, or processes `reply` when one is supplied
pub async fn ask_order_confirmation(
    mut state: ConversationState,
    classifier: &dyn IntentClassifier,
    reply: Option<&str>,
) -> ConversationState {
    if catalog::available_subset(&state.search_results).is_empty() {
        state.current_step = Step::NoProductsAvailable;
        return state;
    }

    match reply {
        Some(reply) => process_user_response(state, classifier, reply).await,
        None => {
            state.current_step = Step::NeedConfirmation;
            state.suspend(InputType::Confirmation);
            state
        }
    }
}

pub async fn process_user_response(
    mut state: ConversationState,
    classifier: &dyn IntentClassifier,
    reply: &str,
) -> ConversationState {
    state.wants_to_order = classifier.detect_order_intent(reply).await;
    if !state.wants_to_order {
        state.current_step = Step::OrderDeclined;
        return state;
    }

    let quantity = classifier.extract_quantity(reply).await;
    if quantity > 0 {
        state.quantity = quantity;
        state.current_step = Step::QuantityExtracted;
    } else {
        state.current_step = Step::NeedQuantity;
    }
    state
}

/// Suspends for a numeric reply, or validates `reply` when one is supplied.
/// A rejected reply re-prompts instead of failing the order.
pub fn ask_quantity(mut state: ConversationState, reply: Option<&str>) -> ConversationState {
    let Some(reply) = reply else {
        if state.wants_to_order && state.quantity == 0 {
            state.say(QUANTITY_PROMPT);
            state.current_step = Step::NeedQuantity;
            state.suspend(InputType::Quantity);
        }
        return state;
    };

    match positive_integer(reply) {
        Ok(quantity) => {
            state.quantity = quantity;
            state.current_step = Step::QuantityReceived;
        }
        Err(e) => {
            state.say(match e {
                QuantityInputError::NotANumber => NOT_A_NUMBER_MESSAGE,
                QuantityInputError::NotPositive => NOT_POSITIVE_MESSAGE,
            });
            state.current_step = Step::NeedQuantity;
            state.suspend(InputType::Quantity);
        }
    }
    state
}

/// Orders the first in-stock product in extraction order
pub fn finalize_order(mut state: ConversationState) -> ConversationState {
    let available = catalog::available_subset(&state.search_results);
    let Some((_, product)) = available.iter().next() else {
        state.say(NOTHING_TO_ORDER_MESSAGE);
        state.current_step = Step::OrderError;
        return state;
    };

    if state.quantity > 0 {
        let confirmation = catalog::format_order_confirmation(product, state.quantity);
        state.say(confirmation);
        state.current_step = Step::OrderComplete;
    } else {
        state.say(INVALID_QUANTITY_MESSAGE);
        state.current_step = Step::OrderError;
    }
    state
}

pub fn end_conversation(mut state: ConversationState) -> ConversationState {
    match state.current_step {
        Step::OrderDeclined => state.say(DECLINED_MESSAGE),
        Step::NeedQuantity => state.say(QUANTITY_PROMPT),
        _ => {}
    }
    state.waiting_for_input = false;
    state.input_type = InputType::None;
    state
}

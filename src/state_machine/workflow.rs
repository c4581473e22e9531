//! Drives a conversation through its transition functions
//!
//! A turn runs node by node until the flow suspends for user input or reaches
//! a terminal step. Resuming re-enters the flow at `current_step` with the
//! user's reply, so a state restored from a snapshot and an in-memory state
//! at the same step behave identically.

use super::state::{ConversationState, Route, Step};
use super::transition;
use crate::catalog::ProductCatalog;
use crate::classifier::IntentClassifier;
use std::sync::Arc;
use thiserror::Error;

/// Result of driving one turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub state: ConversationState,
    /// The flow is waiting for user input at `state.current_step`
    pub suspended: bool,
}

impl TurnOutcome {
    pub fn is_complete(&self) -> bool {
        self.state.current_step.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResumeError {
    #[error("conversation is not waiting for input at step {0}")]
    NotSuspended(Step),
}

/// The order flow with its collaborators
#[derive(Clone)]
pub struct Workflow {
    classifier: Arc<dyn IntentClassifier>,
    catalog: Arc<ProductCatalog>,
}

impl Workflow {
    pub fn new(classifier: Arc<dyn IntentClassifier>, catalog: Arc<ProductCatalog>) -> Self {
        Self { classifier, catalog }
    }

    pub fn catalog(&self) -> &ProductCatalog {
        &self.catalog
    }

    /// Advance `state` without user input
    pub async fn run_until_suspend_or_terminal(&self, state: ConversationState) -> TurnOutcome {
        self.drive(state, None).await
    }

    /// Continue a suspended conversation with the user's reply
    pub async fn resume(
        &self,
        mut state: ConversationState,
        reply: &str,
    ) -> Result<TurnOutcome, ResumeError> {
        if !state.current_step.is_suspend() {
            return Err(ResumeError::NotSuspended(state.current_step));
        }
        state.accept_reply(reply);
        Ok(self.drive(state, Some(reply)).await)
    }

    async fn drive(&self, mut state: ConversationState, mut reply: Option<&str>) -> TurnOutcome {
        let classifier = self.classifier.as_ref();
        let mut advanced = false;

        loop {
            let from = state.current_step;
            if from.is_suspend() && state.waiting_for_input && reply.is_none() {
                return TurnOutcome {
                    state,
                    suspended: true,
                };
            }

            state = match from {
                Step::Starting => transition::route_query(state, classifier).await,
                Step::Routed => match state.route {
                    Route::Order => transition::extract_products(state, classifier).await,
                    Route::Greeting | Route::Unset => {
                        transition::handle_greeting(state, classifier).await
                    }
                },
                Step::ProductsExtracted => transition::search_products(state, &self.catalog),
                Step::NeedConfirmation => {
                    transition::ask_order_confirmation(state, classifier, reply.take()).await
                }
                Step::NeedQuantity => transition::ask_quantity(state, reply.take()),
                Step::QuantityExtracted | Step::QuantityReceived => {
                    transition::finalize_order(state)
                }
                Step::Complete
                | Step::NoProducts
                | Step::NoProductsAvailable
                | Step::OrderDeclined
                | Step::OrderComplete
                | Step::OrderError => {
                    if advanced {
                        state = transition::end_conversation(state);
                    }
                    return TurnOutcome {
                        state,
                        suspended: false,
                    };
                }
            };
            advanced = true;

            // A node that neither moved nor suspended hands off to the end node,
            // which re-prompts if a quantity is still missing.
            if state.current_step == from && !state.waiting_for_input {
                state = transition::end_conversation(state);
                return TurnOutcome {
                    suspended: state.current_step.is_suspend(),
                    state,
                };
            }

            tracing::debug!(from = %from, to = %state.current_step, "Transition");
        }
    }
}

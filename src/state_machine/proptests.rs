//! Property-based tests for the order flow
//!
//! These tests verify key invariants hold across classifier answers and
//! user replies.

use super::*;
use crate::catalog::{order_total, ProductCatalog};
use crate::runtime::testing::ScriptedClassifier;
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
        .block_on(future)
}

fn workflow(classifier: ScriptedClassifier) -> Workflow {
    Workflow::new(Arc::new(classifier), Arc::new(ProductCatalog::default()))
}

#[derive(Debug, Clone)]
struct Script {
    route: Route,
    products: Vec<String>,
    order_intent: bool,
    quantity: u32,
}

impl Script {
    fn classifier(&self) -> ScriptedClassifier {
        let products: Vec<&str> = self.products.iter().map(String::as_str).collect();
        ScriptedClassifier::new()
            .with_route(self.route)
            .with_products(&products)
            .with_order_intent(self.order_intent)
            .with_quantity(self.quantity)
    }
}

/// Every state the flow passes through at turn boundaries
fn run_conversation(script: &Script, query: &str, replies: &[String]) -> Vec<ConversationState> {
    let wf = workflow(script.classifier());
    block_on(async {
        let mut outcome = wf
            .run_until_suspend_or_terminal(ConversationState::new(query))
            .await;
        let mut seen = vec![outcome.state.clone()];
        for reply in replies {
            if !outcome.suspended {
                break;
            }
            outcome = match wf.resume(outcome.state, reply).await {
                Ok(next) => next,
                Err(e) => panic!("suspended state refused reply: {e}"),
            };
            seen.push(outcome.state.clone());
        }
        seen
    })
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_mention() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("apple".to_string()),
        Just("Orange".to_string()),
        Just(" BANANA ".to_string()),
        Just("pineapple".to_string()),
        Just("milk".to_string()),
        Just("bread".to_string()),
        "[a-z]{3,8}",
    ]
}

fn arb_script() -> impl Strategy<Value = Script> {
    (
        prop_oneof![Just(Route::Order), Just(Route::Greeting)],
        proptest::collection::vec(arb_mention(), 0..4),
        any::<bool>(),
        0u32..6,
    )
        .prop_map(|(route, products, order_intent, quantity)| Script {
            route,
            products,
            order_intent,
            quantity,
        })
}

fn arb_reply() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("yes".to_string()),
        Just("no".to_string()),
        "-?[0-9]{1,3}",
        "[a-z ]{0,12}",
    ]
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Lookup answers for any input, and the same way every time
    #[test]
    fn prop_lookup_is_total_and_idempotent(mention in ".{0,24}") {
        let catalog = ProductCatalog::default();
        let first = catalog.lookup(&mention);
        let second = catalog.lookup(&mention);
        prop_assert_eq!(&first, &second);
        if !first.in_stock && first.price.abs() < f64::EPSILON {
            prop_assert_eq!(first.name, mention);
        }
    }

    #[test]
    fn prop_order_total_is_exact_product(quantity in 0u32..10_000) {
        let catalog = ProductCatalog::default();
        for key in ["apple", "orange", "banana", "grape", "milk", "bread"] {
            let product = catalog.lookup(key);
            let expected = product.price * f64::from(quantity);
            prop_assert!((order_total(&product, quantity) - expected).abs() < f64::EPSILON);
        }
    }

    /// Serialized steps stay inside the closed set and the flow never
    /// confirms or finalizes without search results
    #[test]
    fn prop_flow_respects_step_invariants(
        script in arb_script(),
        replies in proptest::collection::vec(arb_reply(), 0..4),
    ) {
        let names: Vec<&str> = Step::ALL.iter().map(|s| s.as_str()).collect();
        for state in run_conversation(&script, "I want something", &replies) {
            let snapshot = state.to_snapshot();
            let step = snapshot["current_step"].as_str().unwrap_or_default().to_string();
            prop_assert!(names.contains(&step.as_str()), "unexpected step {}", step);

            if matches!(
                state.current_step,
                Step::NeedConfirmation | Step::OrderComplete | Step::OrderError
            ) {
                prop_assert!(!state.search_results.is_empty());
            }
            if state.quantity > 0 {
                prop_assert!(state.wants_to_order);
            }
            prop_assert!(state.current_step.is_terminal() || state.current_step.is_suspend());
            prop_assert!(!state.messages.is_empty());
        }
    }

    /// Resuming from a snapshot behaves exactly like resuming in memory
    #[test]
    fn prop_snapshot_resume_matches_in_memory(
        script in arb_script(),
        first in arb_reply(),
        second in arb_reply(),
    ) {
        let wf = workflow(script.classifier());
        block_on(async {
            let mut outcome = wf
                .run_until_suspend_or_terminal(ConversationState::new("I want something"))
                .await;

            for reply in [first, second] {
                if !outcome.suspended {
                    break;
                }
                let restored = ConversationState::from_snapshot(outcome.state.to_snapshot(), &reply)
                    .map_err(|e| TestCaseError::fail(e.to_string()))?;
                let via_snapshot = wf.resume(restored, &reply).await;
                let in_memory = wf.resume(outcome.state, &reply).await;
                prop_assert_eq!(&via_snapshot, &in_memory);
                outcome = in_memory.map_err(|e| TestCaseError::fail(e.to_string()))?;
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Only suspend steps accept a reply
    #[test]
    fn prop_resume_requires_suspend_step(index in 0usize..Step::ALL.len(), reply in arb_reply()) {
        let step = Step::ALL[index];
        let mut state = ConversationState::new("apples");
        state.current_step = step;
        let result = block_on(workflow(ScriptedClassifier::new()).resume(state, &reply));
        prop_assert_eq!(result.is_ok(), step.is_suspend());
    }
}

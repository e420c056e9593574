use aifuse::config::{global_observers, set_global_observers};
use aifuse::function::generate_text;
use aifuse::prelude::*;
use aifuse_core::mock::MockProvider;
use std::sync::Arc;

// Global settings are process-wide, so this binary holds a single test.
#[tokio::test]
async fn global_and_per_call_observers_both_see_calls() {
    let global = Arc::new(EventRecorder::new());
    let local = Arc::new(EventRecorder::new());
    set_global_observers(vec![global.clone() as Arc<dyn FunctionObserver>]);

    generate_text(
        &MockProvider::new(),
        "m",
        TextParams::prompt("hi"),
        FunctionOptions::new()
            .with_function_id("greeting")
            .with_observer(local.clone()),
    )
    .await
    .unwrap();

    assert_eq!(global.len(), 2);
    assert_eq!(local.len(), 2);
    assert_eq!(
        global.events()[0].metadata.function_id.as_deref(),
        Some("greeting")
    );

    set_global_observers(Vec::new());
    assert!(global_observers().is_empty());
}

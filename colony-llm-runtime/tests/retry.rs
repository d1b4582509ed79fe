//! Retry-loop tests: the five-request budget and the synthetic terminal
//! response.

use colony_bus::{emit, InProcessBus};
use colony_core::{AgentId, LlmRequestEvent, LlmResponseEvent, LlmRuntimeErrorEvent, Message};
use colony_llm_runtime::{LlmRuntime, ScriptedProvider, MAX_RETRIES};
use std::sync::Arc;

async fn runtime(provider: ScriptedProvider) -> (Arc<InProcessBus>, Arc<LlmRuntime>) {
    let bus = Arc::new(InProcessBus::new());
    let runtime = Arc::new(LlmRuntime::new(bus.clone(), Arc::new(provider)));
    runtime.subscribe().await.unwrap();
    (bus, runtime)
}

#[tokio::test]
async fn successful_call_emits_response_with_request_attached() {
    let provider = ScriptedProvider::new().respond(vec![Message::assistant("hi")]);
    let (bus, _runtime) = runtime(provider).await;

    let request = LlmRequestEvent::new(AgentId::primary(), vec![Message::user("say hi")], vec![]);
    emit(bus.as_ref(), &request).await.unwrap();

    let responses = bus.events::<LlmResponseEvent>();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response, vec![Message::assistant("hi")]);
    assert_eq!(responses[0].request.messages, request.messages);
}

#[tokio::test]
async fn failure_budget_exhausts_into_synthetic_response() {
    // Six consecutive provider failures: the original call plus five
    // retries, then the synthetic assistant message.
    let mut provider = ScriptedProvider::new();
    for _ in 0..6 {
        provider = provider.fail("model unavailable");
    }
    let (bus, _runtime) = runtime(provider).await;

    let agent_id = AgentId::primary();
    let request = LlmRequestEvent::new(agent_id.clone(), vec![Message::user("hi")], vec![]);
    emit(bus.as_ref(), &request).await.unwrap();

    let errors = bus.events::<LlmRuntimeErrorEvent>();
    assert_eq!(errors.len(), 6);

    // Five retry requests were issued after the original.
    let requests = bus.events::<LlmRequestEvent>();
    assert_eq!(requests.len(), 1 + MAX_RETRIES as usize);
    let counts: Vec<u32> = requests.iter().map(|r| r.retry_count).collect();
    assert_eq!(counts, vec![0, 1, 2, 3, 4, 5]);

    let responses = bus.events::<LlmResponseEvent>();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response.len(), 1);
    match &responses[0].response[0] {
        Message::Assistant { content } => {
            assert!(content.starts_with("Runtime error:"), "got {content:?}");
            assert!(content.contains("model unavailable"));
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(responses[0].agent_id, agent_id);
}

#[tokio::test]
async fn transient_failure_recovers_within_budget() {
    let provider = ScriptedProvider::new()
        .fail("flaky")
        .fail("flaky")
        .respond(vec![Message::assistant("recovered")]);
    let (bus, _runtime) = runtime(provider).await;

    let request = LlmRequestEvent::new(AgentId::primary(), vec![Message::user("hi")], vec![]);
    emit(bus.as_ref(), &request).await.unwrap();

    let responses = bus.events::<LlmResponseEvent>();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].response, vec![Message::assistant("recovered")]);
    assert_eq!(responses[0].request.retry_count, 2);
    assert_eq!(bus.events::<LlmRuntimeErrorEvent>().len(), 2);
}

#[tokio::test]
async fn redelivered_retry_does_not_grow_the_count() {
    // The retry count lives in the event, so handling the same error event
    // twice re-issues the same next request instead of burning extra budget.
    // No subscriptions here: the handler is driven directly so the emitted
    // requests are not consumed again.
    let bus = Arc::new(InProcessBus::new());
    let runtime = LlmRuntime::new(bus.clone(), Arc::new(ScriptedProvider::new()));

    let request = LlmRequestEvent::new(AgentId::primary(), vec![Message::user("hi")], vec![]);
    let error = LlmRuntimeErrorEvent::new(request, "boom");
    runtime.handle_runtime_error(error.clone()).await;
    runtime.handle_runtime_error(error).await;

    let requests = bus.events::<LlmRequestEvent>();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|r| r.retry_count == 1));
}

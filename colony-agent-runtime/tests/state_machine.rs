//! State machine tests: the full event choreography driven over the
//! in-process bus with scripted model and tool runtimes.

use colony_agent_runtime::AgentRuntime;
use colony_bus::{emit, subscribe, EventBus, InProcessBus};
use colony_core::processor::conversation_is_well_formed;
use colony_core::subject::queue;
use colony_core::{
    AgentCreateEvent, AgentDeletedEvent, AgentErrorEvent, AgentFinishEvent,
    AgentRuntimeErrorEvent, AgentId, AgentStartEvent, LlmRequestEvent, LlmResponseEvent, Message,
    TaskCreateEvent, TaskErrorEvent, TaskFinishEvent, ToolCallResult, ToolExecRequestEvent,
    ToolExecResultsEvent, ToolParam, ToolSchema,
};
use colony_store::{AgentRecord, AgentStore, MemoryKv};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct Harness {
    bus: Arc<InProcessBus>,
    agents: AgentStore,
}

impl Harness {
    async fn new() -> Self {
        Self::with_runtime(|bus, agents| AgentRuntime::new(bus, agents)).await
    }

    async fn with_runtime(
        build: impl FnOnce(Arc<dyn EventBus>, AgentStore) -> AgentRuntime,
    ) -> Self {
        let bus = Arc::new(InProcessBus::new());
        let agents = AgentStore::new(Arc::new(MemoryKv::new()));
        let dyn_bus: Arc<dyn EventBus> = bus.clone();
        let runtime = Arc::new(build(dyn_bus, agents.clone()));
        runtime.subscribe().await.unwrap();
        Self { bus, agents }
    }

    /// Play the LLM runtime: answer each `llm-request` with the next
    /// scripted message list.
    async fn script_llm(&self, responses: Vec<Vec<Message>>) {
        let responses = Arc::new(Mutex::new(VecDeque::from(responses)));
        let bus = self.bus.clone();
        subscribe::<LlmRequestEvent, _, _>(self.bus.as_ref(), queue::LLM_RUNTIME, move |event| {
            let responses = responses.clone();
            let bus = bus.clone();
            async move {
                let next = responses.lock().unwrap().pop_front();
                if let Some(messages) = next {
                    let response = LlmResponseEvent::new(event, messages);
                    emit(bus.as_ref(), &response).await.unwrap();
                }
            }
        })
        .await
        .unwrap();
    }

    /// Play the tool runtime: answer every call in a request with a fixed
    /// result, preserving request order.
    async fn script_tools(&self, result: &'static str) {
        let bus = self.bus.clone();
        subscribe::<ToolExecRequestEvent, _, _>(
            self.bus.as_ref(),
            queue::TOOL_RUNTIME,
            move |event| {
                let bus = bus.clone();
                async move {
                    let results = event
                        .tool_calls
                        .iter()
                        .map(|call| ToolCallResult {
                            tool_call_id: call.tool_call_id.clone(),
                            tool_name: call.tool_name.clone(),
                            result: result.to_string(),
                        })
                        .collect();
                    let event = ToolExecResultsEvent::new(event.agent_id, results);
                    emit(bus.as_ref(), &event).await.unwrap();
                }
            },
        )
        .await
        .unwrap();
    }
}

fn calc_schema() -> ToolSchema {
    ToolSchema::new("calculator", "Perform basic arithmetic")
        .with_param(ToolParam::string("operation", "add, subtract", true))
        .with_param(ToolParam::number("a", "First operand", true))
        .with_param(ToolParam::number("b", "Second operand", true))
}

fn tool_call(id: &str, name: &str, args: serde_json::Value) -> Message {
    let arguments = match args {
        serde_json::Value::Object(map) => map,
        _ => panic!("args must be an object"),
    };
    Message::tool_call(id, name, arguments)
}

#[tokio::test]
async fn simple_completion_runs_to_task_finish() {
    let harness = Harness::new().await;
    harness.script_llm(vec![vec![Message::assistant("hi")]]).await;

    let agent_id = AgentId::primary();
    let task = TaskCreateEvent::new(agent_id.clone(), "say hi", "", vec![], vec![]);
    emit(harness.bus.as_ref(), &task).await.unwrap();

    let finishes = harness.bus.events::<TaskFinishEvent>();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].agent_id, agent_id);
    assert_eq!(finishes[0].result, "hi");

    // Cleanup ran: the agent row is gone.
    assert_eq!(harness.bus.events::<AgentDeletedEvent>().len(), 1);
    assert!(!harness.agents.exists(&agent_id).await.unwrap());
}

#[tokio::test]
async fn one_tool_round_preserves_order_and_pairing() {
    let harness = Harness::new().await;
    harness
        .script_llm(vec![
            vec![tool_call(
                "c1",
                "calculator",
                json!({"a": 2, "b": 2, "operation": "add"}),
            )],
            vec![Message::assistant("4")],
        ])
        .await;
    harness.script_tools("4").await;

    let agent_id = AgentId::primary();
    let task = TaskCreateEvent::new(agent_id.clone(), "2+2", "", vec![calc_schema()], vec![]);
    emit(harness.bus.as_ref(), &task).await.unwrap();

    let exec_requests = harness.bus.events::<ToolExecRequestEvent>();
    assert_eq!(exec_requests.len(), 1);
    assert_eq!(exec_requests[0].tool_calls.len(), 1);
    assert_eq!(exec_requests[0].tool_calls[0].tool_call_id, "c1");

    let exec_results = harness.bus.events::<ToolExecResultsEvent>();
    assert_eq!(exec_results.len(), 1);
    for (i, result) in exec_results[0].results.iter().enumerate() {
        assert_eq!(result.tool_call_id, exec_requests[0].tool_calls[i].tool_call_id);
    }

    let finishes = harness.bus.events::<TaskFinishEvent>();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].result, "4");

    // Every prompt snapshot along the way was well-formed.
    for request in harness.bus.events::<LlmRequestEvent>() {
        assert!(conversation_is_well_formed(&request.messages));
    }
}

#[tokio::test]
async fn system_prompt_leads_the_assembled_prompt() {
    let harness = Harness::new().await;

    let agent_id = AgentId::primary();
    let create = AgentCreateEvent::new(agent_id, "greet", "You are terse.", vec![], vec![]);
    emit(harness.bus.as_ref(), &create).await.unwrap();

    let requests = harness.bus.events::<LlmRequestEvent>();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].messages[0], Message::system("You are terse."));
    assert_eq!(requests[0].messages[1], Message::user("greet"));
    assert_eq!(requests[0].retry_count, 0);
}

#[tokio::test]
async fn duplicate_create_is_rejected_once() {
    let harness = Harness::new().await;

    let agent_id = AgentId::primary();
    let create = AgentCreateEvent::new(agent_id.clone(), "t", "", vec![], vec![]);
    emit(harness.bus.as_ref(), &create).await.unwrap();
    emit(harness.bus.as_ref(), &create).await.unwrap();

    // One row, one rejection, one start.
    assert!(harness.agents.exists(&agent_id).await.unwrap());
    assert_eq!(harness.bus.events::<AgentRuntimeErrorEvent>().len(), 1);
    assert_eq!(harness.bus.events::<AgentStartEvent>().len(), 1);
}

#[tokio::test]
async fn task_terminals_fire_only_for_primaries() {
    let harness = Harness::new().await;
    let primary = AgentId::primary();
    let sub = primary.sub_agent();

    emit(
        harness.bus.as_ref(),
        &AgentFinishEvent::new(sub.clone(), "sub done"),
    )
    .await
    .unwrap();
    assert!(harness.bus.events::<TaskFinishEvent>().is_empty());
    assert_eq!(harness.bus.events::<AgentDeletedEvent>().len(), 1);

    emit(
        harness.bus.as_ref(),
        &AgentFinishEvent::new(primary.clone(), "done"),
    )
    .await
    .unwrap();
    let finishes = harness.bus.events::<TaskFinishEvent>();
    assert_eq!(finishes.len(), 1);
    assert_eq!(finishes[0].agent_id, primary);

    emit(harness.bus.as_ref(), &AgentErrorEvent::new(sub, "boom"))
        .await
        .unwrap();
    assert!(harness.bus.events::<TaskErrorEvent>().is_empty());

    emit(harness.bus.as_ref(), &AgentErrorEvent::new(primary, "boom"))
        .await
        .unwrap();
    assert_eq!(harness.bus.events::<TaskErrorEvent>().len(), 1);
}

#[tokio::test]
async fn redelivered_tool_results_append_once_but_still_advance() {
    let harness = Harness::new().await;

    let agent_id = AgentId::primary();
    let record = AgentRecord {
        agent_id: agent_id.clone(),
        task: "2+2".into(),
        system_prompt: String::new(),
        tool_schemas: vec![calc_schema()],
        messages: vec![
            Message::user("2+2"),
            tool_call("c1", "calculator", json!({"a": 2, "b": 2, "operation": "add"})),
        ],
    };
    harness.agents.save(&record).await.unwrap();

    let results = ToolExecResultsEvent::new(
        agent_id.clone(),
        vec![ToolCallResult {
            tool_call_id: "c1".into(),
            tool_name: "calculator".into(),
            result: "4".into(),
        }],
    );
    emit(harness.bus.as_ref(), &results).await.unwrap();
    emit(harness.bus.as_ref(), &results).await.unwrap();

    let stored = harness.agents.get(&agent_id).await.unwrap();
    let appended: Vec<_> = stored
        .messages
        .iter()
        .filter(|message| message.is_tool_result())
        .collect();
    assert_eq!(appended.len(), 1);
    assert!(conversation_is_well_formed(&stored.messages));

    // Both deliveries still re-entered the model loop.
    assert_eq!(harness.bus.events::<LlmRequestEvent>().len(), 2);
}

#[tokio::test]
async fn missing_row_unwinds_through_task_error() {
    let harness = Harness::new().await;

    let agent_id = AgentId::primary();
    let request = LlmRequestEvent::new(agent_id.clone(), vec![Message::user("hi")], vec![]);
    let response = LlmResponseEvent::new(request, vec![Message::assistant("hi")]);
    emit(harness.bus.as_ref(), &response).await.unwrap();

    assert_eq!(harness.bus.events::<AgentErrorEvent>().len(), 1);
    let errors = harness.bus.events::<TaskErrorEvent>();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].agent_id, agent_id);
    assert_eq!(harness.bus.events::<AgentDeletedEvent>().len(), 1);
}

#[tokio::test]
async fn response_without_assistant_text_finishes_empty() {
    let harness = Harness::new().await;
    harness.script_llm(vec![vec![]]).await;

    let agent_id = AgentId::primary();
    let task = TaskCreateEvent::new(agent_id, "noop", "", vec![], vec![]);
    emit(harness.bus.as_ref(), &task).await.unwrap();

    let finishes = harness.bus.events::<TaskFinishEvent>();
    assert_eq!(finishes.len(), 1);
    assert!(finishes[0].result.is_empty());
}

#[tokio::test]
async fn conversation_processor_reshapes_stored_history() {
    let harness = Harness::with_runtime(|bus, agents| {
        AgentRuntime::new(bus, agents).with_processor(Arc::new(|messages| {
            messages
                .into_iter()
                .map(|message| match message {
                    Message::Assistant { content } => Message::assistant(content.to_uppercase()),
                    other => other,
                })
                .collect()
        }))
    })
    .await;

    let agent_id = AgentId::primary();
    let record = AgentRecord {
        agent_id: agent_id.clone(),
        task: "greet".into(),
        system_prompt: String::new(),
        tool_schemas: vec![],
        messages: vec![Message::user("greet")],
    };
    harness.agents.save(&record).await.unwrap();

    let request = LlmRequestEvent::new(agent_id.clone(), record.prompt(), vec![]);
    let response = LlmResponseEvent::new(
        request,
        vec![tool_call("c1", "calculator", json!({})), Message::assistant("hi")],
    );
    emit(harness.bus.as_ref(), &response).await.unwrap();

    let stored = harness.agents.get(&agent_id).await.unwrap();
    assert!(stored
        .messages
        .iter()
        .any(|message| matches!(message, Message::Assistant { content } if content == "HI")));
    assert!(conversation_is_well_formed(&stored.messages));
}

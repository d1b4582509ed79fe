//! The tool registry: name to (schema, function).

use crate::ToolError;
use colony_core::{AgentId, ToolSchema};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio_util::sync::CancellationToken;

/// Per-invocation context handed to a tool function.
#[derive(Clone)]
pub struct ToolContext {
    /// The agent on whose behalf the tool runs.
    pub agent_id: AgentId,
    /// Cancelled when the runtime shuts down; long waits should observe it.
    pub cancel: CancellationToken,
}

/// A tool implementation: arguments in, string result out.
pub type ToolFn =
    Arc<dyn Fn(ToolContext, Map<String, Value>) -> BoxFuture<'static, Result<String, ToolError>>
        + Send
        + Sync>;

/// A registered tool.
#[derive(Clone)]
pub struct Tool {
    pub schema: ToolSchema,
    pub function: ToolFn,
}

impl Tool {
    /// Wrap a synchronous function as a tool.
    pub fn simple<F>(schema: ToolSchema, function: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        Self {
            schema,
            function: Arc::new(move |_ctx, args| {
                let function = function.clone();
                Box::pin(async move { function(&args) })
            }),
        }
    }
}

/// In-memory registry mapping tool name to (schema, function).
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, tool: Tool) -> Result<(), ToolError> {
        let mut tools = self.tools.write().expect("tools lock");
        let name = tool.schema.name.clone();
        if tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.tools.read().expect("tools lock").get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.read().expect("tools lock").contains_key(name)
    }

    /// All schemas, or the subset matching `filter`. Unknown names are
    /// silently omitted.
    pub fn schemas(&self, filter: Option<&[String]>) -> Vec<ToolSchema> {
        let tools = self.tools.read().expect("tools lock");
        match filter {
            None => tools.values().map(|tool| tool.schema.clone()).collect(),
            Some(names) => names
                .iter()
                .filter_map(|name| tools.get(name).map(|tool| tool.schema.clone()))
                .collect(),
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.read().expect("tools lock").keys().cloned().collect()
    }
}

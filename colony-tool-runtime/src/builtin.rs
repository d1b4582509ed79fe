//! Built-in demo tools.

use crate::{Tool, ToolError, ToolRegistry};
use colony_core::{ToolParam, ToolSchema};
use serde_json::{Map, Value};

fn number(args: &Map<String, Value>, name: &str) -> Result<f64, ToolError> {
    args.get(name)
        .and_then(Value::as_f64)
        .ok_or_else(|| ToolError::invalid_arguments(format!("{name} must be a number")))
}

fn string<'a>(args: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| ToolError::invalid_arguments(format!("{name} must be a string")))
}

fn calculator() -> Tool {
    let schema = ToolSchema::new("calculator", "Perform basic arithmetic operations")
        .with_param(ToolParam::string(
            "operation",
            "add, subtract, multiply, divide",
            true,
        ))
        .with_param(ToolParam::number("a", "First number", true))
        .with_param(ToolParam::number("b", "Second number", true));

    Tool::simple(schema, |args| {
        let operation = string(args, "operation")?;
        let a = number(args, "a")?;
        let b = number(args, "b")?;
        let result = match operation {
            "add" => a + b,
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" => {
                if b == 0.0 {
                    return Err(ToolError::execution("division by zero"));
                }
                a / b
            }
            other => {
                return Err(ToolError::execution(format!("unknown operation: {other}")));
            }
        };
        Ok(format!("{result:.2}"))
    })
}

fn weather() -> Tool {
    let schema = ToolSchema::new("weather", "Get weather information for a city")
        .with_param(ToolParam::string("city", "City name", true));

    Tool::simple(schema, |args| {
        let city = string(args, "city")?;
        Ok(format!("Weather in {city}: Sunny, 25°C"))
    })
}

fn current_time() -> Tool {
    let schema = ToolSchema::new("current_time", "Get current time");

    Tool::simple(schema, |_args| {
        Ok(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string())
    })
}

/// Register the built-in tool set.
pub fn register_builtins(registry: &ToolRegistry) -> Result<(), ToolError> {
    registry.register(calculator())?;
    registry.register(weather())?;
    registry.register(current_time())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("args must be an object"),
        }
    }

    async fn run(tool: &Tool, value: Value) -> Result<String, ToolError> {
        use tokio_util::sync::CancellationToken;
        let ctx = crate::ToolContext {
            agent_id: colony_core::AgentId::primary(),
            cancel: CancellationToken::new(),
        };
        (tool.function)(ctx, args(value)).await
    }

    #[tokio::test]
    async fn calculator_adds() {
        let result = run(&calculator(), json!({"operation": "add", "a": 2, "b": 2}))
            .await
            .unwrap();
        assert_eq!(result, "4.00");
    }

    #[tokio::test]
    async fn calculator_rejects_division_by_zero() {
        let result = run(&calculator(), json!({"operation": "divide", "a": 1, "b": 0})).await;
        assert!(matches!(result, Err(ToolError::Execution(_))));
    }

    #[tokio::test]
    async fn calculator_rejects_missing_operand() {
        let result = run(&calculator(), json!({"operation": "add", "a": 2})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn weather_is_canned() {
        let result = run(&weather(), json!({"city": "Oslo"})).await.unwrap();
        assert_eq!(result, "Weather in Oslo: Sunny, 25°C");
    }

    #[test]
    fn builtins_register_once() {
        let registry = ToolRegistry::new();
        register_builtins(&registry).unwrap();
        assert!(registry.contains("calculator"));
        assert!(registry.contains("weather"));
        assert!(registry.contains("current_time"));
        assert!(register_builtins(&registry).is_err());
    }
}

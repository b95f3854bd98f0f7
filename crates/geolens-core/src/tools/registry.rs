use std::collections::BTreeMap;
use std::fmt;

use geolens_tools::{ToolError, ToolOutput, ToolSchema};
use serde_json::Value;

use super::tool::{ErasedTool, ToolContext};

/// The tool catalog offered to the model. Transports only see this, never
/// concrete tool types.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn ErasedTool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ErasedTool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn with_tool<T: ErasedTool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.run(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::Tool;
    use crate::types::{SessionId, ToolCallId};
    use async_trait::async_trait;
    use schemars::JsonSchema;
    use serde::Deserialize;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct EchoArgs {
        value: String,
    }

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        type Args = EchoArgs;

        const NAME: &'static str = "echo";
        const DESCRIPTION: &'static str = "Echo a value";

        async fn execute(&self, args: EchoArgs, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::new(args.value))
        }
    }

    fn context(token: CancellationToken) -> ToolContext {
        ToolContext {
            tool_call_id: ToolCallId::from("t1"),
            session_id: SessionId::from("s1"),
            cancellation_token: token,
        }
    }

    #[test]
    fn schemas_describe_registered_tools() {
        let registry = ToolRegistry::new().with_tool(EchoTool);
        let schemas = registry.schemas();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].name, "echo");
        assert!(schemas[0].input_schema.required.contains(&"value".to_string()));
    }

    #[tokio::test]
    async fn execute_validates_arguments() {
        let registry = ToolRegistry::new().with_tool(EchoTool);
        let ctx = context(CancellationToken::new());

        let output = registry
            .execute("echo", json!({"value": "hi"}), &ctx)
            .await
            .unwrap();
        assert_eq!(output.primary, json!("hi"));

        let err = registry.execute("echo", json!({"v": 1}), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams { .. }));
    }

    #[tokio::test]
    async fn unknown_tool_and_cancellation_are_errors() {
        let registry = ToolRegistry::new().with_tool(EchoTool);
        let token = CancellationToken::new();
        token.cancel();
        let ctx = context(token);

        assert_eq!(
            registry.execute("nope", json!({}), &ctx).await.unwrap_err(),
            ToolError::UnknownTool("nope".into())
        );
        assert_eq!(
            registry
                .execute("echo", json!({"value": "x"}), &ctx)
                .await
                .unwrap_err(),
            ToolError::Cancelled("echo".into())
        );
    }
}

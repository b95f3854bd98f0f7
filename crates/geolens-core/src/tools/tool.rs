use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::types::{SessionId, ToolCallId};
use geolens_tools::{ToolError, ToolOutput, ToolSchema};

#[derive(Debug, Clone)]
pub struct ToolContext {
    pub tool_call_id: ToolCallId,
    pub session_id: SessionId,
    pub cancellation_token: CancellationToken,
}

impl ToolContext {
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }
}

/// A typed tool. Arguments are validated into `Args` before `execute` runs.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + JsonSchema + Send;

    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    /// Turn raw model arguments into `Args`. Overrides should still reject
    /// anything serde would.
    fn validate(&self, args: Value) -> Result<Self::Args, ToolError> {
        serde_json::from_value(args).map_err(|e| ToolError::invalid_params(Self::NAME, e.to_string()))
    }

    async fn execute(&self, args: Self::Args, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;

    fn schema() -> ToolSchema
    where
        Self: Sized,
    {
        let settings = schemars::generate::SchemaSettings::draft07().with(|s| {
            s.inline_subschemas = true;
        });
        let input_schema = settings.into_generator().into_root_schema_for::<Self::Args>();

        ToolSchema {
            name: Self::NAME.to_string(),
            description: Self::DESCRIPTION.to_string(),
            input_schema: input_schema.into(),
        }
    }
}

/// Object-safe view of [`Tool`] used by the registry and transports.
#[async_trait]
pub trait ErasedTool: Send + Sync {
    fn name(&self) -> &'static str;
    fn schema(&self) -> ToolSchema;

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

#[async_trait]
impl<T> ErasedTool for T
where
    T: Tool,
{
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn schema(&self) -> ToolSchema {
        T::schema()
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args = self.validate(args)?;

        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled(T::NAME.to_string()));
        }

        self.execute(args, ctx).await
    }
}

pub mod classify;
pub mod registry;
pub mod tool;

pub use classify::QuantileBreaksTool;
pub use registry::ToolRegistry;
pub use tool::{ErasedTool, Tool, ToolContext};

/// Registry holding every tool that ships with the crate.
pub fn builtin_registry() -> ToolRegistry {
    ToolRegistry::new().with_tool(QuantileBreaksTool)
}

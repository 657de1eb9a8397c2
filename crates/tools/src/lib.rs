//! Built-in tool implementations for murmur.
//!
//! Tools give the assistant the ability to act beyond text: do arithmetic,
//! fetch a URL, check the clock. Anything heavier lives outside the core
//! and registers through the same `Tool` trait.

pub mod calculator;
pub mod current_time;
pub mod http_request;

pub use calculator::CalculatorTool;
pub use current_time::CurrentTimeTool;
pub use http_request::HttpRequestTool;

use murmur_core::tool::ToolRegistry;

/// Create a registry with all built-in tools.
///
/// Fails if two tools claim the same name — a wiring bug surfaced at
/// startup rather than at call time.
pub fn builtin_registry() -> murmur_core::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(CalculatorTool))?;
    registry.register(Box::new(CurrentTimeTool))?;
    registry.register(Box::new(HttpRequestTool::new()))?;
    Ok(registry)
}

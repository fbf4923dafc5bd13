//! Tool declarations and the tool registry.
//!
//! Tools are declared once in code as `{ name, schema, handler }` and
//! registered at startup; the registry is read-only afterwards. Display
//! tools do not execute effects: the handler validates the model's
//! arguments against the typed schema and echoes them back as the result,
//! a structured rendering intent for the client.

use chatrelay_core::Result;

pub mod card;
pub mod chart;
pub mod code;
pub mod form;
pub mod metrics;
pub mod search;

pub use card::GenerateCard;
pub use chart::GenerateChart;
pub use code::GenerateCode;
pub use form::GenerateForm;
pub use metrics::AnalyzeComplexity;
pub use search::SearchNotes;

/// The display tools enabled through the client's per-request whitelist.
pub const DISPLAY_TOOLS: [&str; 4] = [
    "generateForm",
    "generateChart",
    "generateCode",
    "generateCard",
];

/// A tool exposed to the model.
///
/// Handlers are short and non-blocking; cancellation is observed between
/// invocations, never inside one.
pub trait Tool: Send + Sync {
    /// Name as exposed to the model (e.g. "generateForm").
    fn name(&self) -> &str;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's arguments, derived from the typed
    /// argument struct.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute with already-parsed arguments.
    fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value>;
}

/// Registry of available tools. Registration order is preserved.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Registered tools matching a whitelist, in registration order.
    /// Unknown names are silently dropped.
    pub fn subset<'a>(&'a self, whitelist: &[String]) -> Vec<&'a dyn Tool> {
        self.tools
            .iter()
            .filter(|t| whitelist.iter().any(|name| name == t.name()))
            .map(|t| t.as_ref())
            .collect()
    }
}

/// Register every built-in tool: the four display tools plus the
/// agent-bundle tools.
pub fn register_builtin_tools(registry: &mut ToolRegistry) {
    registry.register(Box::new(GenerateForm));
    registry.register(Box::new(GenerateChart));
    registry.register(Box::new(GenerateCode));
    registry.register(Box::new(GenerateCard));
    registry.register(Box::new(SearchNotes));
    registry.register(Box::new(AnalyzeComplexity));
}

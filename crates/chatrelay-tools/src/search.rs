//! `searchNotes` — the research agent's search tool.
//!
//! The search backend is not wired up yet; the handler returns an empty
//! result set with an explanatory message, matching the agent contract.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;

use chatrelay_core::{Error, Result};

use crate::Tool;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchNotesArgs {
    /// Search query string.
    pub query: String,
}

pub struct SearchNotes;

impl Tool for SearchNotes {
    fn name(&self) -> &str {
        "searchNotes"
    }

    fn description(&self) -> &str {
        "Search through notes and documents for content matching a query."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!(schema_for!(SearchNotesArgs))
    }

    fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let parsed: SearchNotesArgs = serde_json::from_value(args)
            .map_err(|e| Error::ToolFailure(format!("searchNotes: {e}")))?;
        Ok(json!({
            "query": parsed.query,
            "results": [],
            "message": "search backend not connected",
        }))
    }
}

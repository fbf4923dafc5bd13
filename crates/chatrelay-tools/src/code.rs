//! `generateCode` — syntax-highlighted code block intent.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use chatrelay_core::{Error, Result};

use crate::Tool;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateCodeArgs {
    #[serde(rename = "type", default = "code_kind")]
    pub kind: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "showLineNumbers")]
    pub show_line_numbers: Option<bool>,
}

fn code_kind() -> String {
    "code".into()
}

pub struct GenerateCode;

impl Tool for GenerateCode {
    fn name(&self) -> &str {
        "generateCode"
    }

    fn description(&self) -> &str {
        "Generate a code block with syntax highlighting, optionally named and editable."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!(schema_for!(GenerateCodeArgs))
    }

    fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let parsed: GenerateCodeArgs = serde_json::from_value(args)
            .map_err(|e| Error::ToolFailure(format!("generateCode: {e}")))?;
        Ok(serde_json::to_value(parsed)?)
    }
}

//! `generateForm` — structured form definition for client-side rendering.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use chatrelay_core::{Error, Result};

use crate::Tool;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FormFieldOption {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FormFieldType {
    Text,
    Textarea,
    Select,
    Checkbox,
    Radio,
    Date,
    Slider,
    File,
    Number,
    Email,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FormField {
    pub id: String,
    #[serde(rename = "type")]
    pub field_type: FormFieldType,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "defaultValue")]
    pub default_value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<FormFieldOption>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateFormArgs {
    #[serde(rename = "type", default = "form_kind")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<FormField>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "submitLabel")]
    pub submit_label: Option<String>,
}

fn form_kind() -> String {
    "form".into()
}

pub struct GenerateForm;

impl Tool for GenerateForm {
    fn name(&self) -> &str {
        "generateForm"
    }

    fn description(&self) -> &str {
        "Generate a form for collecting user input. Declare the fields with ids, types, and labels; the client renders and submits it."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!(schema_for!(GenerateFormArgs))
    }

    fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let parsed: GenerateFormArgs = serde_json::from_value(args)
            .map_err(|e| Error::ToolFailure(format!("generateForm: {e}")))?;
        Ok(serde_json::to_value(parsed)?)
    }
}

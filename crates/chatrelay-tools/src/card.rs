//! `generateCard` — rich card component intent.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use chatrelay_core::{Error, Result};

use crate::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardMediaType {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CardMedia {
    #[serde(rename = "type")]
    pub media_type: CardMediaType,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CardActionVariant {
    Default,
    Secondary,
    Destructive,
    Outline,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CardAction {
    pub label: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<CardActionVariant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateCardArgs {
    #[serde(rename = "type", default = "card_kind")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<CardMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<CardAction>>,
}

fn card_kind() -> String {
    "card".into()
}

pub struct GenerateCard;

impl Tool for GenerateCard {
    fn name(&self) -> &str {
        "generateCard"
    }

    fn description(&self) -> &str {
        "Generate a card component with optional description, body content, media, and action buttons."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!(schema_for!(GenerateCardArgs))
    }

    fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let parsed: GenerateCardArgs = serde_json::from_value(args)
            .map_err(|e| Error::ToolFailure(format!("generateCard: {e}")))?;
        Ok(serde_json::to_value(parsed)?)
    }
}

//! `generateChart` — chart visualization intent.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

use chatrelay_core::{Error, Result};

use crate::Tool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Line,
    Bar,
    Pie,
    Area,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChartDataPoint {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateChartArgs {
    #[serde(rename = "type", default = "chart_kind")]
    pub kind: String,
    #[serde(rename = "chartType")]
    pub chart_type: ChartType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data: Vec<ChartDataPoint>,
}

fn chart_kind() -> String {
    "chart".into()
}

pub struct GenerateChart;

impl Tool for GenerateChart {
    fn name(&self) -> &str {
        "generateChart"
    }

    fn description(&self) -> &str {
        "Generate a chart (line, bar, pie, or area) from labelled data points for the client to render."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!(schema_for!(GenerateChartArgs))
    }

    fn execute(&self, args: serde_json::Value) -> Result<serde_json::Value> {
        let parsed: GenerateChartArgs = serde_json::from_value(args)
            .map_err(|e| Error::ToolFailure(format!("generateChart: {e}")))?;
        Ok(serde_json::to_value(parsed)?)
    }
}

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::tool::{Tool, ToolContext};
use geolens_tools::{ToolError, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct QuantileBreaksArgs {
    /// Numeric attribute values to classify.
    pub values: Vec<f64>,
    /// Number of classes, at least 2.
    pub classes: usize,
}

/// Quantile classification of a numeric column. The model sees the break
/// values; per-class counts go to the side channel for the map legend.
pub struct QuantileBreaksTool;

#[async_trait]
impl Tool for QuantileBreaksTool {
    type Args = QuantileBreaksArgs;

    const NAME: &'static str = "quantile_breaks";
    const DESCRIPTION: &'static str =
        "Split numeric values into classes holding roughly equal numbers of observations. Returns the upper bound of each class.";

    fn validate(&self, args: Value) -> Result<QuantileBreaksArgs, ToolError> {
        let args: QuantileBreaksArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::invalid_params(Self::NAME, e.to_string()))?;
        if args.classes < 2 {
            return Err(ToolError::invalid_params(Self::NAME, "classes must be at least 2"));
        }
        if args.values.is_empty() {
            return Err(ToolError::invalid_params(Self::NAME, "values must not be empty"));
        }
        if args.values.iter().any(|v| !v.is_finite()) {
            return Err(ToolError::invalid_params(Self::NAME, "values must be finite"));
        }
        Ok(args)
    }

    async fn execute(&self, args: QuantileBreaksArgs, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        if args.values.is_empty() || args.classes == 0 {
            return Err(ToolError::invalid_params(Self::NAME, "nothing to classify"));
        }
        let mut sorted = args.values;
        sorted.sort_by(f64::total_cmp);

        let n = sorted.len();
        let breaks: Vec<f64> = (1..=args.classes)
            .map(|k| {
                let idx = (k * n).div_ceil(args.classes).saturating_sub(1);
                sorted[idx.min(n - 1)]
            })
            .collect();

        let mut counts = vec![0usize; breaks.len()];
        for value in &sorted {
            let class = breaks.iter().position(|b| value <= b).unwrap_or(breaks.len() - 1);
            counts[class] += 1;
        }

        let mut side = Map::new();
        side.insert("method".to_string(), json!("quantile"));
        side.insert("breaks".to_string(), json!(breaks));
        side.insert("counts".to_string(), json!(counts));

        Ok(ToolOutput::new(json!({ "breaks": breaks })).with_side_channel(side))
    }
}

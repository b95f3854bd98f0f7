use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// JSON-schema subset advertised to the model for a tool's arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub properties: serde_json::Map<String, Value>,
    pub required: Vec<String>,
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl InputSchema {
    pub fn object(properties: serde_json::Map<String, Value>, required: Vec<String>) -> Self {
        Self {
            properties,
            required,
            schema_type: "object".to_string(),
        }
    }

    /// Render as a plain JSON schema object for provider requests.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

impl From<schemars::Schema> for InputSchema {
    fn from(schema: schemars::Schema) -> Self {
        let value = serde_json::to_value(&schema).unwrap_or(Value::Null);
        let schema_type = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("object")
            .to_string();

        let mut properties = serde_json::Map::new();
        let mut required = BTreeSet::new();
        collect_properties(&value, &mut properties, &mut required);

        Self {
            properties,
            required: required.into_iter().collect(),
            schema_type,
        }
    }
}

// Flattens `allOf` branches produced by `#[serde(flatten)]` argument structs.
fn collect_properties(
    schema: &Value,
    properties: &mut serde_json::Map<String, Value>,
    required: &mut BTreeSet<String>,
) {
    let Some(obj) = schema.as_object() else {
        return;
    };

    if let Some(props) = obj.get("properties").and_then(Value::as_object) {
        for (key, value) in props {
            properties
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }

    if let Some(req) = obj.get("required").and_then(Value::as_array) {
        required.extend(req.iter().filter_map(Value::as_str).map(str::to_string));
    }

    if let Some(all_of) = obj.get("allOf").and_then(Value::as_array) {
        for sub in all_of {
            collect_properties(sub, properties, required);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub parameters: Value,
}

#[cfg(test)]
mod tests {
    use super::InputSchema;
    use schemars::{JsonSchema, schema_for};
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[expect(dead_code)]
    struct Bounds {
        min_x: f64,
        max_x: f64,
    }

    #[derive(Deserialize, JsonSchema)]
    #[expect(dead_code)]
    struct ClassifyParams {
        column: String,
        classes: Option<u32>,
        #[serde(flatten)]
        bounds: Bounds,
    }

    #[test]
    fn flattened_params_are_merged() {
        let input_schema: InputSchema = schema_for!(ClassifyParams).into();

        assert_eq!(input_schema.schema_type, "object");
        for key in ["column", "classes", "min_x", "max_x"] {
            assert!(input_schema.properties.contains_key(key), "missing {key}");
        }
        assert!(input_schema.required.contains(&"column".to_string()));
        assert!(input_schema.required.contains(&"min_x".to_string()));
        assert!(!input_schema.required.contains(&"classes".to_string()));
    }

    #[test]
    fn to_json_renders_object_schema() {
        let schema = InputSchema::object(serde_json::Map::new(), vec!["x".to_string()]);
        let json = schema.to_json();
        assert_eq!(json["type"], "object");
        assert_eq!(json["required"][0], "x");
    }
}

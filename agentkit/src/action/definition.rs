//! Function-calling description of an action.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An action as presented to a language model.
///
/// Serializes to the function-calling shape:
///
/// ```json
/// {
///     "type": "function",
///     "function": {
///         "name": "wallet_native_transfer",
///         "description": "...",
///         "parameters": { ... }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[non_exhaustive]
pub struct ActionDefinition {
    /// Action name, unique within its provider.
    pub name: String,
    /// What the action does, for the model.
    pub description: String,
    /// JSON schema of the input.
    pub parameters: Value,
}

impl ActionDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Returns the action name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Serialize for ActionDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut function = Map::new();
        function.insert("name".to_owned(), Value::String(self.name.clone()));
        function.insert(
            "description".to_owned(),
            Value::String(self.description.clone()),
        );
        function.insert("parameters".to_owned(), self.parameters.clone());

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &function)?;
        map.end()
    }
}

/// JSON schema of `T` without the `$schema` meta field.
#[must_use]
pub fn input_schema<T: schemars::JsonSchema>() -> Value {
    let root = schemars::schema_for!(T);
    let mut schema = serde_json::to_value(&root).unwrap_or_default();
    if let Value::Object(ref mut map) = schema {
        map.remove("$schema");
    }
    schema
}

#[cfg(test)]
mod tests {
    use schemars::JsonSchema;
    use serde_json::json;

    use super::*;

    #[derive(JsonSchema)]
    #[allow(dead_code)]
    struct Transfer {
        /// Destination.
        to: String,
        amount: String,
    }

    #[test]
    fn serializes_as_function() {
        let def = ActionDefinition::new("get_balance", "Get the balance", json!({"type": "object"}));
        assert_eq!(
            serde_json::to_value(&def).unwrap(),
            json!({
                "type": "function",
                "function": {
                    "name": "get_balance",
                    "description": "Get the balance",
                    "parameters": {"type": "object"}
                }
            })
        );
    }

    #[test]
    fn schema_drops_meta_field() {
        let schema = input_schema::<Transfer>();
        assert!(schema.get("$schema").is_none());
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["to"]["description"], "Destination.");
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 2);
        assert!(required.contains(&json!("amount")));
    }
}

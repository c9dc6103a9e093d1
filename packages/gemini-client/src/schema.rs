//! Type-safe schema generation for Gemini structured outputs.
//!
//! Gemini's `responseSchema` accepts a subset of OpenAPI 3.0: no `$ref`,
//! no `definitions`, nullability expressed as `nullable: true` rather than a
//! `null` member in `type`, and upper-case type names.
//!
//! # Example
//!
//! ```rust,ignore
//! use gemini_client::StructuredOutput;
//! use schemars::JsonSchema;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize, JsonSchema)]
//! struct Summary {
//!     headline: String,
//!     category: Option<String>,
//! }
//!
//! let schema = Summary::gemini_schema();
//! ```

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// Keywords Gemini rejects or ignores.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "$schema",
    "definitions",
    "title",
    "additionalProperties",
    "default",
    "format",
    "examples",
];

/// Trait for types that can be used as Gemini structured output.
///
/// Automatically implemented for any type that implements `JsonSchema + DeserializeOwned`.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Generate a Gemini-compatible response schema for this type.
    fn gemini_schema() -> Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        // Refs first: the other passes need the inlined bodies.
        inline_refs(&mut value);
        flatten_single_all_of(&mut value);
        collapse_nullable(&mut value);
        require_all_properties(&mut value);
        strip_keywords(&mut value);
        uppercase_types(&mut value);

        value
    }

    /// Get the schema name for this type.
    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> StructuredOutput for T {}

fn inline_refs(value: &mut Value) {
    let definitions = match value {
        Value::Object(map) => map.get("definitions").cloned(),
        _ => None,
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.get(name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

/// schemars wraps a `$ref` carrying its own description or default in a
/// one-element `allOf`; hoist the inlined body into the parent.
fn flatten_single_all_of(value: &mut Value) {
    match value {
        Value::Object(map) => {
            let single = match map.get("allOf") {
                Some(Value::Array(items)) if items.len() == 1 => items[0].as_object().cloned(),
                _ => None,
            };
            if let Some(inner) = single {
                map.remove("allOf");
                for (key, v) in inner {
                    map.entry(key).or_insert(v);
                }
            }

            for (_, v) in map.iter_mut() {
                flatten_single_all_of(v);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                flatten_single_all_of(item);
            }
        }
        _ => {}
    }
}

/// Rewrite `type: [T, "null"]` and `anyOf: [S, {type: null}]` as `nullable: true`.
fn collapse_nullable(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Array(types)) = map.get("type").cloned() {
                let non_null: Vec<Value> = types
                    .into_iter()
                    .filter(|t| t.as_str() != Some("null"))
                    .collect();
                if non_null.len() == 1 {
                    map.insert("type".to_string(), non_null[0].clone());
                    map.insert("nullable".to_string(), Value::Bool(true));
                }
            }

            if let Some(replacement) = nullable_any_of(map) {
                *value = replacement;
                collapse_nullable(value);
                return;
            }

            // `Option<Enum>` comes through as `enum: [.., null]`.
            let mut had_null_variant = false;
            if let Some(Value::Array(variants)) = map.get_mut("enum") {
                let before = variants.len();
                variants.retain(|v| !v.is_null());
                had_null_variant = variants.len() != before;
            }
            if had_null_variant {
                map.insert("nullable".to_string(), Value::Bool(true));
            }

            for (_, v) in map.iter_mut() {
                collapse_nullable(v);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                collapse_nullable(item);
            }
        }
        _ => {}
    }
}

fn nullable_any_of(map: &Map<String, Value>) -> Option<Value> {
    let Some(Value::Array(options)) = map.get("anyOf") else {
        return None;
    };

    let (nulls, rest): (Vec<&Value>, Vec<&Value>) = options
        .iter()
        .partition(|o| o.get("type").and_then(Value::as_str) == Some("null"));
    if nulls.is_empty() || rest.len() != 1 {
        return None;
    }

    let mut inner = rest[0].clone();
    if let Value::Object(inner_map) = &mut inner {
        inner_map.insert("nullable".to_string(), Value::Bool(true));
        if let Some(description) = map.get("description") {
            inner_map
                .entry("description")
                .or_insert_with(|| description.clone());
        }
    }
    Some(inner)
}

/// Gemini treats unlisted properties as optional and tends to drop them.
fn require_all_properties(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(props)) = map.get("properties") {
                let keys: Vec<Value> = props.keys().map(|k| Value::String(k.clone())).collect();
                map.insert("required".to_string(), Value::Array(keys));
            }

            for (_, v) in map.iter_mut() {
                require_all_properties(v);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                require_all_properties(item);
            }
        }
        _ => {}
    }
}

fn strip_keywords(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for keyword in UNSUPPORTED_KEYWORDS {
                map.remove(*keyword);
            }

            for (key, v) in map.iter_mut() {
                // Keys of `properties` are field names, not keywords.
                match (key.as_str(), v) {
                    ("properties", Value::Object(props)) => {
                        for (_, prop) in props.iter_mut() {
                            strip_keywords(prop);
                        }
                    }
                    (_, v) => strip_keywords(v),
                }
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                strip_keywords(item);
            }
        }
        _ => {}
    }
}

fn uppercase_types(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ty)) = map.get_mut("type") {
                *ty = ty.to_uppercase();
            }

            for (key, v) in map.iter_mut() {
                if key == "enum" {
                    continue;
                }
                uppercase_types(v);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                uppercase_types(item);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemars::JsonSchema;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    enum Region {
        KR,
        ROW,
    }

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct Publisher {
        website: Option<String>,
        region: Option<Region>,
    }

    #[derive(Deserialize, JsonSchema)]
    #[serde(rename_all = "camelCase")]
    #[allow(dead_code)]
    struct Insights {
        /// Hero image
        thumbnail_url: Option<String>,
        tags: Vec<String>,
        source: Publisher,
    }

    #[test]
    fn test_refs_inlined_and_definitions_removed() {
        let schema = Insights::gemini_schema();
        let text = serde_json::to_string(&schema).unwrap();

        assert!(!text.contains("$ref"), "refs should be inlined: {}", text);
        assert!(schema.get("definitions").is_none());
        assert!(schema.get("$schema").is_none());
        assert!(schema.get("title").is_none());
        assert_eq!(schema["properties"]["source"]["type"], "OBJECT");
    }

    #[test]
    fn test_option_becomes_nullable() {
        let schema = Insights::gemini_schema();
        let thumbnail = &schema["properties"]["thumbnailUrl"];

        assert_eq!(thumbnail["type"], "STRING");
        assert_eq!(thumbnail["nullable"], true);
        assert_eq!(thumbnail["description"], "Hero image");
    }

    #[test]
    fn test_optional_enum_keeps_variants() {
        let schema = Insights::gemini_schema();
        let region = &schema["properties"]["source"]["properties"]["region"];

        assert_eq!(region["nullable"], true);
        let variants: Vec<&str> = region["enum"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(variants, vec!["KR", "ROW"]);
    }

    #[test]
    fn test_all_properties_required() {
        let schema = Insights::gemini_schema();
        let required: Vec<&str> = schema["properties"]["source"]["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();

        assert!(required.contains(&"website"));
        assert!(required.contains(&"region"));
    }

    #[test]
    fn test_described_ref_is_flattened() {
        #[derive(Deserialize, JsonSchema)]
        #[allow(dead_code)]
        struct Wrapper {
            /// The publisher
            #[serde(default)]
            source: Option<Publisher>,
            /// Always present
            main: Publisher,
        }

        let schema = Wrapper::gemini_schema();
        let main = &schema["properties"]["main"];
        assert!(main.get("allOf").is_none());
        assert_eq!(main["type"], "OBJECT");
        assert_eq!(main["description"], "Always present");
        assert_eq!(schema["properties"]["source"]["type"], "OBJECT");
    }

    #[test]
    fn test_no_additional_properties_keyword() {
        let schema = Insights::gemini_schema();
        let text = serde_json::to_string(&schema).unwrap();
        assert!(!text.contains("additionalProperties"));
        assert_eq!(schema["properties"]["tags"]["items"]["type"], "STRING");
    }
}

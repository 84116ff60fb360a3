//! Typed parameter schemas and argument coercion.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Number,
}

impl ParamType {
    fn json_type(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.json_type())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: &'static str,
    pub tp: ParamType,
    pub description: &'static str,
    pub required: bool,
}

impl Parameter {
    #[must_use]
    pub fn required(name: &'static str, tp: ParamType, description: &'static str) -> Self {
        Self {
            name,
            tp,
            description,
            required: true,
        }
    }
}

/// A validated argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Text(String),
    Number(f64),
}

/// Arguments that passed validation, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(BTreeMap<&'static str, ArgValue>);

impl Arguments {
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ArgValue::Text(value)) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn number(&self, name: &str) -> Option<f64> {
        match self.0.get(name) {
            Some(ArgValue::Number(value)) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("arguments are not valid JSON: {0}")]
    Syntax(String),
    #[error("arguments must be a JSON object")]
    NotAnObject,
    #[error("missing required parameter `{0}`")]
    Missing(&'static str),
    #[error("parameter `{name}` must be a {expected}")]
    WrongType {
        name: &'static str,
        expected: ParamType,
    },
}

/// Ordered parameter list of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterSchema {
    params: Vec<Parameter>,
}

impl ParameterSchema {
    #[must_use]
    pub fn new(params: Vec<Parameter>) -> Self {
        Self { params }
    }

    #[must_use]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// JSON-Schema object advertised to the model.
    #[must_use]
    pub fn to_json(&self) -> Map<String, Value> {
        let properties: Map<String, Value> = self
            .params
            .iter()
            .map(|param| {
                (
                    param.name.to_string(),
                    json!({ "type": param.tp.json_type(), "description": param.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .params
            .iter()
            .filter(|param| param.required)
            .map(|param| param.name)
            .collect();

        let mut schema = Map::new();
        schema.insert("type".to_string(), json!("object"));
        schema.insert("properties".to_string(), Value::Object(properties));
        schema.insert("required".to_string(), json!(required));
        schema
    }

    /// Parses raw model arguments and coerces each declared parameter.
    ///
    /// Unknown keys are ignored. `null` counts as absent. Blank input is an
    /// empty object, so it only fails when something is required.
    pub fn validate(&self, raw: &str) -> Result<Arguments, ArgumentError> {
        let value: Value = if raw.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw).map_err(|err| ArgumentError::Syntax(err.to_string()))?
        };
        let Value::Object(object) = value else {
            return Err(ArgumentError::NotAnObject);
        };

        let mut arguments = Arguments::default();
        for param in &self.params {
            match object.get(param.name).filter(|value| !value.is_null()) {
                Some(value) => {
                    let coerced = coerce(param.tp, value).ok_or(ArgumentError::WrongType {
                        name: param.name,
                        expected: param.tp,
                    })?;
                    arguments.0.insert(param.name, coerced);
                }
                None if param.required => return Err(ArgumentError::Missing(param.name)),
                None => {}
            }
        }

        Ok(arguments)
    }
}

fn coerce(tp: ParamType, value: &Value) -> Option<ArgValue> {
    match (tp, value) {
        (ParamType::String, Value::String(text)) => Some(ArgValue::Text(text.clone())),
        (ParamType::String, Value::Number(number)) => Some(ArgValue::Text(number.to_string())),
        (ParamType::String, Value::Bool(flag)) => Some(ArgValue::Text(flag.to_string())),
        (ParamType::Number, Value::Number(number)) => number.as_f64().map(ArgValue::Number),
        (ParamType::Number, Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|number| number.is_finite())
            .map(ArgValue::Number),
        _ => None,
    }
}

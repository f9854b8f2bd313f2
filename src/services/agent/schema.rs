// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

//! Declared parameter schemas and the coercion applied to planner arguments
//! before any collaborator is touched.

use crate::common::parsing::{parse_boolish, value_as_i64};
use crate::domain::error::AppError;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

#[derive(Clone, Copy, Debug)]
pub enum ParamType {
    String,
    Integer,
    Boolean,
    Enum(&'static [&'static str]),
    ArrayOfString,
    ArrayOfObject(&'static [ParamSpec]),
}

#[derive(Clone, Copy, Debug)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
}

impl ParamSpec {
    pub const fn required(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: true,
            description,
        }
    }

    pub const fn optional(name: &'static str, ty: ParamType, description: &'static str) -> Self {
        Self {
            name,
            ty,
            required: false,
            description,
        }
    }
}

fn type_schema(ty: &ParamType) -> Value {
    match ty {
        ParamType::String => json!({ "type": "string" }),
        ParamType::Integer => json!({ "type": "integer" }),
        ParamType::Boolean => json!({ "type": "boolean" }),
        ParamType::Enum(values) => json!({ "type": "string", "enum": values }),
        ParamType::ArrayOfString => json!({ "type": "array", "items": { "type": "string" } }),
        ParamType::ArrayOfObject(fields) => json!({ "type": "array", "items": object_schema(fields) }),
    }
}

/// JSON-schema object describing `params`.
pub fn object_schema(params: &[ParamSpec]) -> Value {
    let mut properties = Map::new();
    for param in params {
        let mut schema = type_schema(&param.ty);
        if !param.description.is_empty() {
            schema["description"] = Value::String(param.description.to_string());
        }
        properties.insert(param.name.to_string(), schema);
    }
    let required: Vec<&str> = params.iter().filter(|p| p.required).map(|p| p.name).collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn invalid(field: &str, message: impl Into<String>) -> AppError {
    AppError::validation(field, message)
}

fn coerce_value(field: &str, ty: &ParamType, value: &Value) -> Result<Value, AppError> {
    match ty {
        ParamType::String => match value {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid(field, "expected a string")),
        },
        ParamType::Integer => match value_as_i64(value) {
            Some(v) if v >= 0 => Ok(Value::from(v)),
            Some(_) => Err(invalid(field, "must not be negative")),
            None => Err(invalid(field, "expected an integer")),
        },
        ParamType::Boolean => match value {
            Value::Bool(b) => Ok(Value::Bool(*b)),
            Value::String(s) => parse_boolish(s)
                .map(Value::Bool)
                .ok_or_else(|| invalid(field, "expected a boolean")),
            Value::Number(n) => Ok(Value::Bool(n.as_f64().unwrap_or(0.0) != 0.0)),
            _ => Err(invalid(field, "expected a boolean")),
        },
        ParamType::Enum(allowed) => {
            let raw = value
                .as_str()
                .ok_or_else(|| invalid(field, "expected a string"))?
                .trim()
                .to_ascii_lowercase();
            if allowed.contains(&raw.as_str()) {
                Ok(Value::String(raw))
            } else {
                Err(invalid(field, format!("must be one of {}", allowed.join(", "))))
            }
        }
        ParamType::ArrayOfString => match value {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| coerce_value(&format!("{field}[{i}]"), &ParamType::String, item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::String(_) | Value::Number(_) => {
                Ok(Value::Array(vec![coerce_value(field, &ParamType::String, value)?]))
            }
            _ => Err(invalid(field, "expected an array of strings")),
        },
        ParamType::ArrayOfObject(fields) => {
            let Value::Array(items) = value else {
                return Err(invalid(field, "expected an array of objects"));
            };
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let path = format!("{field}[{i}]");
                    let Value::Object(map) = item else {
                        return Err(invalid(&path, "expected an object"));
                    };
                    coerce_at(&path, map, fields).map(Value::Object)
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
    }
}

fn coerce_at(prefix: &str, args: &Map<String, Value>, params: &[ParamSpec]) -> Result<Map<String, Value>, AppError> {
    let mut out = Map::new();
    for param in params {
        let field = if prefix.is_empty() {
            param.name.to_string()
        } else {
            format!("{prefix}.{}", param.name)
        };
        match args.get(param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(invalid(&field, "is required"));
                }
            }
            Some(value) => {
                out.insert(param.name.to_string(), coerce_value(&field, &param.ty, value)?);
            }
        }
    }
    Ok(out)
}

/// Validates `args` against `params`. Unknown keys are dropped, integers
/// accept floats (truncated) and numeric strings.
pub fn coerce(args: &Map<String, Value>, params: &[ParamSpec]) -> Result<Map<String, Value>, AppError> {
    coerce_at("", args, params)
}

/// Typed view over already-coerced arguments.
pub fn parse_args<T: DeserializeOwned>(args: Map<String, Value>) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(args)).map_err(|e| invalid("arguments", e.to_string()))
}

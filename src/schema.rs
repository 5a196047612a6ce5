//! Fact schemas and coercion
//!
//! A schema is plain data: an ordered list of named, typed, described fields.
//! The fixed company schema and the one-field schema built from a run-time
//! target name go through the same generic [`Schema::coerce`] routine, so no
//! new type is needed per target.

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::fmt;

use crate::error::SchemaError;

/// Title used for the schema object and the finalize tool.
pub const SCHEMA_TITLE: &str = "Info";

/// Declared type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Number,
    Boolean,
}

impl FieldType {
    fn json_type(&self) -> &'static str {
        match self {
            FieldType::Text => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: FieldType,
    pub description: String,
    /// Optional fields accept a missing or `null` value.
    pub optional: bool,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, ty: FieldType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            description: description.into(),
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Ordered field contract for one research run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    title: String,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Build a schema, checking that every name is an identifier and unique.
    pub fn new(title: impl Into<String>, fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::Empty);
        }
        let mut seen = HashSet::new();
        for field in &fields {
            if !is_identifier(&field.name) {
                return Err(SchemaError::InvalidFieldName(field.name.clone()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(field.name.clone()));
            }
        }
        Ok(Self {
            title: title.into(),
            fields,
        })
    }

    /// The fixed six-field company schema.
    pub fn company() -> Self {
        Self {
            title: SCHEMA_TITLE.to_string(),
            fields: vec![
                FieldSpec::new(
                    "headquarters",
                    FieldType::Text,
                    "City in which this company is headquartered, should be in the form \"San Francisco, USA\"",
                ),
                FieldSpec::new("number_employees", FieldType::Integer, "number of full time employees")
                    .optional(),
                FieldSpec::new(
                    "investors",
                    FieldType::Text,
                    "Notable investors, should be a comma separated list",
                ),
                FieldSpec::new(
                    "capital_raised",
                    FieldType::Text,
                    "amount of money raised, should be like: `None`, `10k`, `35m`, `1b` etc",
                ),
                FieldSpec::new("ceo", FieldType::Text, "Name of CEO"),
                FieldSpec::new("ceo_college", FieldType::Text, "Where did the CEO go to college"),
            ],
        }
    }

    /// A schema with one required text field named by the caller.
    pub fn single_field(name: &str) -> Result<Self, SchemaError> {
        Self::new(SCHEMA_TITLE, vec![FieldSpec::new(name, FieldType::Text, "")])
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// JSON-Schema description, used both in prompts and as the parameter
    /// schema of the finalize tool.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        for field in &self.fields {
            let mut property = Map::new();
            property.insert("title".to_string(), json!(display_title(&field.name)));
            if !field.description.is_empty() {
                property.insert("description".to_string(), json!(field.description));
            }
            property.insert("type".to_string(), json!(field.ty.json_type()));
            properties.insert(field.name.clone(), Value::Object(property));
        }

        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|f| !f.optional)
            .map(|f| f.name.as_str())
            .collect();

        json!({
            "title": self.title,
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }

    /// Coerce raw proposed values into a [`Record`] of this schema.
    ///
    /// Unknown keys are ignored. Every failing field is reported, not just
    /// the first one.
    pub fn coerce(&self, raw: &Value) -> Result<Record, CoercionError> {
        let Some(object) = raw.as_object() else {
            return Err(CoercionError {
                title: self.title.clone(),
                issues: vec![FieldIssue::new("__root__", "value is not a valid dict")],
            });
        };

        let mut values = Vec::with_capacity(self.fields.len());
        let mut issues = Vec::new();

        for field in &self.fields {
            match object.get(&field.name) {
                None if field.optional => values.push((field.name.clone(), Value::Null)),
                None => issues.push(FieldIssue::new(&field.name, "field required")),
                Some(Value::Null) if field.optional => values.push((field.name.clone(), Value::Null)),
                Some(Value::Null) => issues.push(FieldIssue::new(&field.name, "none is not an allowed value")),
                Some(value) => match coerce_value(field.ty, value) {
                    Ok(coerced) => values.push((field.name.clone(), coerced)),
                    Err(message) => issues.push(FieldIssue::new(&field.name, message)),
                },
            }
        }

        if issues.is_empty() {
            Ok(Record { fields: values })
        } else {
            Err(CoercionError {
                title: self.title.clone(),
                issues,
            })
        }
    }
}

fn coerce_value(ty: FieldType, value: &Value) -> Result<Value, &'static str> {
    match ty {
        FieldType::Text => match value {
            Value::String(s) => Ok(Value::String(s.clone())),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            _ => Err("str type expected"),
        },
        FieldType::Integer => {
            const NOT_INT: &str = "value is not a valid integer";
            let parsed = match value {
                Value::Number(n) if n.is_u64() => n.as_i64(),
                Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral_f64)),
                Value::String(s) => {
                    let s = s.trim();
                    s.parse::<i64>()
                        .ok()
                        .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                }
                _ => None,
            };
            parsed.map(|i| json!(i)).ok_or(NOT_INT)
        }
        FieldType::Number => {
            const NOT_FLOAT: &str = "value is not a valid float";
            let parsed = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            parsed
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or(NOT_FLOAT)
        }
        FieldType::Boolean => {
            const NOT_BOOL: &str = "value could not be parsed to a boolean";
            match value {
                Value::Bool(b) => Ok(Value::Bool(*b)),
                Value::Number(n) => match n.as_i64() {
                    Some(0) => Ok(Value::Bool(false)),
                    Some(1) => Ok(Value::Bool(true)),
                    _ => Err(NOT_BOOL),
                },
                Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "yes" | "on" | "1" | "y" => Ok(Value::Bool(true)),
                    "false" | "no" | "off" | "0" | "n" => Ok(Value::Bool(false)),
                    _ => Err(NOT_BOOL),
                },
                _ => Err(NOT_BOOL),
            }
        }
    }
}

/// Whole floats inside the `i64` range; `as` would saturate anything else.
fn integral_f64(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

/// `number_employees` -> `Number Employees`
fn display_title(name: &str) -> String {
    name.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A validated instance of a [`Schema`], fields in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Consume the record and take a single field's value.
    pub fn take(self, name: &str) -> Option<Value> {
        self.fields.into_iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl FieldIssue {
    fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Proposed values did not fit the declared field types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionError {
    pub title: String,
    pub issues: Vec<FieldIssue>,
}

impl fmt::Display for CoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.issues.len();
        let plural = if count == 1 { "error" } else { "errors" };
        write!(f, "{} validation {} for {}", count, plural, self.title)?;
        for issue in &self.issues {
            write!(f, "\n{}\n  {}", issue.field, issue.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for CoercionError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_company() -> Value {
        json!({
            "headquarters": "San Francisco, USA",
            "number_employees": 120,
            "investors": "Sequoia, Benchmark",
            "capital_raised": "35m",
            "ceo": "Jane Doe",
            "ceo_college": "Stanford",
        })
    }

    #[test]
    fn test_company_schema_field_order() {
        let schema = Schema::company();
        assert_eq!(
            schema.field_names(),
            vec!["headquarters", "number_employees", "investors", "capital_raised", "ceo", "ceo_college"]
        );
    }

    #[test]
    fn test_json_schema_marks_optional_fields() {
        let schema = Schema::company().to_json_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert!(!required.contains(&json!("number_employees")));
        assert_eq!(schema["properties"]["number_employees"]["type"], "integer");
        assert_eq!(schema["properties"]["ceo_college"]["title"], "Ceo College");
        assert_eq!(schema["title"], "Info");
    }

    #[test]
    fn test_single_field_schema() {
        let schema = Schema::single_field("company_ceo").unwrap();
        assert_eq!(schema.field_names(), vec!["company_ceo"]);
        let json = schema.to_json_schema();
        assert_eq!(json["required"], json!(["company_ceo"]));
        assert!(json["properties"]["company_ceo"].get("description").is_none());
    }

    #[test]
    fn test_invalid_field_names_rejected() {
        assert_eq!(
            Schema::single_field("ceo name"),
            Err(SchemaError::InvalidFieldName("ceo name".to_string()))
        );
        assert!(Schema::single_field("1st").is_err());
        assert!(Schema::single_field("").is_err());
        assert!(Schema::single_field("_private").is_ok());
    }

    #[test]
    fn test_duplicate_and_empty_schemas_rejected() {
        let dup = Schema::new(
            "Info",
            vec![
                FieldSpec::new("ceo", FieldType::Text, ""),
                FieldSpec::new("ceo", FieldType::Text, ""),
            ],
        );
        assert_eq!(dup, Err(SchemaError::DuplicateField("ceo".to_string())));
        assert_eq!(Schema::new("Info", vec![]), Err(SchemaError::Empty));
    }

    #[test]
    fn test_coerce_full_company_record() {
        let record = Schema::company().coerce(&full_company()).unwrap();
        assert_eq!(record.field_names(), Schema::company().field_names());
        assert_eq!(record.get("number_employees"), Some(&json!(120)));
        assert_eq!(record.get("ceo"), Some(&json!("Jane Doe")));
    }

    #[test]
    fn test_coerce_optional_field_may_be_missing_or_null() {
        let mut raw = full_company();
        raw.as_object_mut().unwrap().remove("number_employees");
        let record = Schema::company().coerce(&raw).unwrap();
        assert_eq!(record.get("number_employees"), Some(&Value::Null));

        raw["number_employees"] = Value::Null;
        assert!(Schema::company().coerce(&raw).is_ok());
    }

    #[test]
    fn test_coerce_integer_from_string() {
        let mut raw = full_company();
        raw["number_employees"] = json!(" 250 ");
        let record = Schema::company().coerce(&raw).unwrap();
        assert_eq!(record.get("number_employees"), Some(&json!(250)));

        raw["number_employees"] = json!(300.0);
        let record = Schema::company().coerce(&raw).unwrap();
        assert_eq!(record.get("number_employees"), Some(&json!(300)));
    }

    #[test]
    fn test_coerce_integer_out_of_range_fails() {
        for huge in [json!(1e30), json!(u64::MAX), json!("1e30"), json!(-1e30)] {
            let mut raw = full_company();
            raw["number_employees"] = huge.clone();
            let err = Schema::company().coerce(&raw).unwrap_err();
            assert_eq!(err.issues[0].field, "number_employees", "{}", huge);
            assert_eq!(err.issues[0].message, "value is not a valid integer");
        }

        let mut raw = full_company();
        raw["number_employees"] = json!(i64::MAX);
        let record = Schema::company().coerce(&raw).unwrap();
        assert_eq!(record.get("number_employees"), Some(&json!(i64::MAX)));
    }

    #[test]
    fn test_coerce_reports_failing_field() {
        let mut raw = full_company();
        raw["number_employees"] = json!("about fifty");
        let err = Schema::company().coerce(&raw).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].field, "number_employees");
        let text = err.to_string();
        assert!(text.starts_with("1 validation error for Info"));
        assert!(text.contains("number_employees\n  value is not a valid integer"));
    }

    #[test]
    fn test_coerce_reports_every_missing_field() {
        let err = Schema::company().coerce(&json!({"ceo": "Jane Doe"})).unwrap_err();
        let fields: Vec<&str> = err.issues.iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["headquarters", "investors", "capital_raised", "ceo_college"]);
        assert!(err.to_string().starts_with("4 validation errors"));
    }

    #[test]
    fn test_coerce_text_accepts_numbers_rejects_lists() {
        let schema = Schema::single_field("company_founded").unwrap();
        let record = schema.coerce(&json!({"company_founded": 2019})).unwrap();
        assert_eq!(record.get("company_founded"), Some(&json!("2019")));

        let err = schema.coerce(&json!({"company_founded": [2019]})).unwrap_err();
        assert_eq!(err.issues[0].message, "str type expected");
    }

    #[test]
    fn test_coerce_non_object() {
        let err = Schema::company().coerce(&json!("Jane Doe")).unwrap_err();
        assert_eq!(err.issues[0].field, "__root__");
    }

    #[test]
    fn test_coerce_boolean_and_number_fields() {
        let schema = Schema::new(
            "Info",
            vec![
                FieldSpec::new("is_public", FieldType::Boolean, ""),
                FieldSpec::new("valuation", FieldType::Number, ""),
            ],
        )
        .unwrap();
        let record = schema.coerce(&json!({"is_public": "False", "valuation": "1.5"})).unwrap();
        assert_eq!(record.get("is_public"), Some(&json!(false)));
        assert_eq!(record.get("valuation"), Some(&json!(1.5)));

        assert!(schema.coerce(&json!({"is_public": "maybe", "valuation": 1})).is_err());
    }

    #[test]
    fn test_extra_keys_ignored_and_record_serializes_in_order() {
        let schema = Schema::single_field("ceo").unwrap();
        let record = schema.coerce(&json!({"ceo": "Jane Doe", "confidence": "high"})).unwrap();
        assert_eq!(record.field_names(), vec!["ceo"]);

        let company = Schema::company().coerce(&full_company()).unwrap();
        let text = serde_json::to_string(&company).unwrap();
        assert!(text.starts_with("{\"headquarters\""));
        assert!(text.ends_with("\"ceo_college\":\"Stanford\"}"));
    }

    #[test]
    fn test_record_take() {
        let record = Schema::single_field("ceo").unwrap().coerce(&json!({"ceo": "Jane Doe"})).unwrap();
        assert_eq!(record.take("ceo"), Some(json!("Jane Doe")));
    }
}

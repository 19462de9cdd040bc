use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::schema::{FieldKey, FieldKind, FieldSpec, FormSchema};

pub const REQUIRED_MESSAGE: &str = "Required";
pub const EXPECTED_TEXT_MESSAGE: &str = "Expected text";
pub const EXPECTED_FLAG_MESSAGE: &str = "Expected a checkbox value";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RawValue {
    Text(String),
    Flag(bool),
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        RawValue::Text(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        RawValue::Flag(value)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawFormValues(BTreeMap<String, RawValue>);

impl RawFormValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, RawValue::Text(value.into()));
        self
    }

    pub fn with_flag(mut self, field: impl Into<String>, value: bool) -> Self {
        self.insert(field, RawValue::Flag(value));
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: RawValue) {
        self.0.insert(field.into(), value);
    }

    pub fn get(&self, field: &str) -> Option<&RawValue> {
        self.0.get(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<RawValue> {
        self.0.remove(field)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Flag(bool),
    Missing,
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            FieldValue::Flag(flag) => Some(*flag),
            _ => None,
        }
    }
}

/// Normalized, type-coerced form input. Holds exactly the fields declared by
/// the schema it was validated against.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormValues(BTreeMap<String, FieldValue>);

impl FormValues {
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn flag(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(FieldValue::as_flag)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: FieldValue) {
        self.0.insert(field.into(), value);
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.0.remove(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

pub type FieldErrors = BTreeMap<FieldKey, String>;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ValidationResult {
    Valid(FormValues),
    Invalid(FieldErrors),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            ValidationResult::Invalid(errors) => Some(errors),
            ValidationResult::Valid(_) => None,
        }
    }

    pub fn into_values(self) -> Option<FormValues> {
        match self {
            ValidationResult::Valid(values) => Some(values),
            ValidationResult::Invalid(_) => None,
        }
    }
}

pub fn validate(schema: &FormSchema, input: &RawFormValues) -> ValidationResult {
    let mut candidate = FormValues::default();
    let mut errors = FieldErrors::new();

    for spec in schema.fields() {
        match check_field(spec, input.get(spec.key.as_str())) {
            Ok(value) => candidate.insert(spec.key.as_str(), value),
            Err(message) => {
                errors.insert(spec.key, message);
            }
        }
    }

    if errors.is_empty() {
        for refinement in schema.refinements() {
            if !(refinement.predicate)(&candidate) {
                errors.insert(refinement.owner, refinement.message.to_string());
            }
        }
    }

    if errors.is_empty() {
        debug!(schema = schema.id(), "form input is valid");
        ValidationResult::Valid(candidate)
    } else {
        debug!(
            schema = schema.id(),
            invalid_fields = errors.len(),
            "form input rejected"
        );
        ValidationResult::Invalid(errors)
    }
}

/// Runs the per-field rules of a single field. Refinements are not evaluated.
pub fn validate_field(schema: &FormSchema, input: &RawFormValues, field: &str) -> Option<String> {
    let spec = schema.field(field)?;
    check_field(spec, input.get(field)).err()
}

fn check_field(spec: &FieldSpec, raw: Option<&RawValue>) -> Result<FieldValue, String> {
    let value = match (raw, spec.optional) {
        (None, true) => return Ok(FieldValue::Missing),
        (Some(RawValue::Text(text)), true) if text.is_empty() => return Ok(FieldValue::Missing),
        (None, false) if spec.kind == FieldKind::Flag => FieldValue::Flag(false),
        (None, false) => return Err(REQUIRED_MESSAGE.to_string()),
        (Some(raw), _) => coerce(spec.kind, raw)?,
    };

    match spec.rules.iter().find(|rule| !rule.check.passes(&value)) {
        Some(failed) => Err(failed.message.to_string()),
        None => Ok(value),
    }
}

fn coerce(kind: FieldKind, raw: &RawValue) -> Result<FieldValue, String> {
    match (kind, raw) {
        (FieldKind::Text, RawValue::Text(text)) => Ok(FieldValue::Text(text.clone())),
        (FieldKind::Text, RawValue::Flag(_)) => Err(EXPECTED_TEXT_MESSAGE.to_string()),
        (FieldKind::Flag, RawValue::Flag(flag)) => Ok(FieldValue::Flag(*flag)),
        (FieldKind::Flag, RawValue::Text(text)) => match text.as_str() {
            "true" | "on" => Ok(FieldValue::Flag(true)),
            "false" | "off" | "" => Ok(FieldValue::Flag(false)),
            _ => Err(EXPECTED_FLAG_MESSAGE.to_string()),
        },
    }
}

use std::borrow::{Borrow, Cow};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use super::validation::{FieldValue, FormValues};

static EMAIL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
        .expect("email pattern compiles")
});

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldKey(&'static str);

impl FieldKey {
    pub const fn new(value: &'static str) -> Self {
        Self(value)
    }

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl Borrow<str> for FieldKey {
    fn borrow(&self) -> &str {
        self.0
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Text,
    Flag,
}

/// The predicate half of a [`FieldRule`]. Every variant is a pure function of
/// the field value.
#[derive(Clone, Debug)]
pub enum Check {
    MinLength(usize),
    MaxLength(usize),
    Email,
    Pattern(Regex),
    Accepted,
    Custom(fn(&FieldValue) -> bool),
}

impl Check {
    pub fn passes(&self, value: &FieldValue) -> bool {
        match (self, value) {
            (Check::MinLength(min), FieldValue::Text(text)) => text.chars().count() >= *min,
            (Check::MaxLength(max), FieldValue::Text(text)) => text.chars().count() <= *max,
            (Check::Email, FieldValue::Text(text)) => is_email_shaped(text),
            (Check::Pattern(pattern), FieldValue::Text(text)) => pattern.is_match(text),
            (Check::Accepted, FieldValue::Flag(accepted)) => *accepted,
            (Check::Custom(predicate), value) => predicate(value),
            _ => false,
        }
    }
}

fn is_email_shaped(text: &str) -> bool {
    !text.starts_with('.') && !text.contains("..") && EMAIL_SHAPE.is_match(text)
}

#[derive(Clone, Debug)]
pub struct FieldRule {
    pub check: Check,
    pub message: Cow<'static, str>,
}

impl FieldRule {
    pub fn new(check: Check, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }

    pub fn min_length(min: usize, message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Check::MinLength(min), message)
    }

    pub fn max_length(max: usize, message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Check::MaxLength(max), message)
    }

    pub fn email(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Check::Email, message)
    }

    pub fn pattern(
        pattern: &str,
        message: impl Into<Cow<'static, str>>,
    ) -> Result<Self, SchemaError> {
        let compiled = Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self::new(Check::Pattern(compiled), message))
    }

    pub fn accepted(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(Check::Accepted, message)
    }

    pub fn custom(
        predicate: fn(&FieldValue) -> bool,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(Check::Custom(predicate), message)
    }
}

/// A check over the whole candidate object. Failures are reported against
/// `owner`.
#[derive(Clone, Debug)]
pub struct Refinement {
    pub owner: FieldKey,
    pub message: Cow<'static, str>,
    pub predicate: fn(&FormValues) -> bool,
}

impl Refinement {
    pub fn new(
        owner: &'static str,
        message: impl Into<Cow<'static, str>>,
        predicate: fn(&FormValues) -> bool,
    ) -> Self {
        Self {
            owner: FieldKey::new(owner),
            message: message.into(),
            predicate,
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldSpec {
    pub key: FieldKey,
    pub kind: FieldKind,
    pub optional: bool,
    pub rules: Vec<FieldRule>,
}

impl FieldSpec {
    pub fn text(key: &'static str) -> Self {
        Self::new(key, FieldKind::Text)
    }

    pub fn flag(key: &'static str) -> Self {
        Self::new(key, FieldKind::Flag)
    }

    fn new(key: &'static str, kind: FieldKind) -> Self {
        Self {
            key: FieldKey::new(key),
            kind,
            optional: false,
            rules: Vec::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn rule(mut self, rule: FieldRule) -> Self {
        self.rules.push(rule);
        self
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema '{schema}' declares field '{field}' more than once")]
    DuplicateField { schema: String, field: FieldKey },
    #[error("refinement in schema '{schema}' targets unknown field '{owner}'")]
    UnknownOwner { schema: String, owner: FieldKey },
    #[error("invalid pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[derive(Clone, Debug)]
pub struct FormSchema {
    id: &'static str,
    fields: Vec<FieldSpec>,
    refinements: Vec<Refinement>,
}

impl FormSchema {
    pub fn builder(id: &'static str) -> FormSchemaBuilder {
        FormSchemaBuilder {
            id,
            fields: Vec::new(),
            refinements: Vec::new(),
        }
    }

    pub fn id(&self) -> &'static str {
        self.id
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn refinements(&self) -> &[Refinement] {
        &self.refinements
    }

    pub fn field(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|spec| spec.key.as_str() == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.fields.iter().map(|spec| spec.key)
    }
}

#[derive(Debug)]
pub struct FormSchemaBuilder {
    id: &'static str,
    fields: Vec<FieldSpec>,
    refinements: Vec<Refinement>,
}

impl FormSchemaBuilder {
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    pub fn refine(mut self, refinement: Refinement) -> Self {
        self.refinements.push(refinement);
        self
    }

    pub fn build(self) -> Result<FormSchema, SchemaError> {
        let mut seen = BTreeSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.key) {
                return Err(SchemaError::DuplicateField {
                    schema: self.id.to_string(),
                    field: spec.key,
                });
            }
        }
        if let Some(orphan) = self
            .refinements
            .iter()
            .find(|refinement| !seen.contains(&refinement.owner))
        {
            return Err(SchemaError::UnknownOwner {
                schema: self.id.to_string(),
                owner: orphan.owner,
            });
        }

        Ok(FormSchema {
            id: self.id,
            fields: self.fields,
            refinements: self.refinements,
        })
    }
}

use std::collections::BTreeSet;
use std::sync::RwLock;

use tracing::debug;

use super::controller::{
    FormResult, SubmissionController, SubmissionState, SubmitOutcome, read_lock, write_lock,
};
use super::schema::{FieldKey, FormSchema};
use super::validation::{
    FieldErrors, RawFormValues, RawValue, ValidationResult, validate, validate_field,
};

/// When a field's own rules run in addition to the full pass on submit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValidationMode {
    OnChange,
    OnBlur,
    OnSubmit,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitAttempt {
    Rejected(FieldErrors),
    Submitted(SubmitOutcome),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormSnapshot {
    pub values: RawFormValues,
    pub errors: FieldErrors,
    pub touched: BTreeSet<FieldKey>,
    pub submission: SubmissionState,
}

#[derive(Default)]
struct SessionState {
    values: RawFormValues,
    touched: BTreeSet<FieldKey>,
    errors: FieldErrors,
}

pub struct FormSession<'s> {
    schema: &'s FormSchema,
    mode: ValidationMode,
    state: RwLock<SessionState>,
    controller: SubmissionController,
}

impl<'s> FormSession<'s> {
    pub fn new(
        schema: &'s FormSchema,
        mode: ValidationMode,
        controller: SubmissionController,
    ) -> Self {
        Self {
            schema,
            mode,
            state: RwLock::new(SessionState::default()),
            controller,
        }
    }

    pub fn schema(&self) -> &'s FormSchema {
        self.schema
    }

    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    pub fn controller(&self) -> &SubmissionController {
        &self.controller
    }

    pub fn set(&self, field: &str, value: impl Into<RawValue>) -> FormResult<()> {
        let had_error = {
            let mut state = write_lock(&self.state, "writing field value")?;
            state.values.insert(field, value.into());
            state.errors.contains_key(field)
        };
        if self.mode == ValidationMode::OnChange || had_error {
            self.revalidate_field(field)?;
        }
        Ok(())
    }

    pub fn set_text(&self, field: &str, value: impl Into<String>) -> FormResult<()> {
        self.set(field, RawValue::Text(value.into()))
    }

    pub fn set_flag(&self, field: &str, value: bool) -> FormResult<()> {
        self.set(field, RawValue::Flag(value))
    }

    pub fn blur(&self, field: &str) -> FormResult<()> {
        let Some(key) = self.schema.field(field).map(|spec| spec.key) else {
            return Ok(());
        };
        write_lock(&self.state, "touching field")?.touched.insert(key);
        if self.mode == ValidationMode::OnBlur {
            self.revalidate_field(field)?;
        }
        Ok(())
    }

    /// Runs the whole schema against the current values and publishes the
    /// resulting field errors.
    pub fn validate(&self) -> FormResult<ValidationResult> {
        let mut state = write_lock(&self.state, "validating form")?;
        let result = validate(self.schema, &state.values);
        state.errors = result.errors().cloned().unwrap_or_default();
        Ok(result)
    }

    pub async fn submit(&self) -> FormResult<SubmitAttempt> {
        let values = match self.validate()? {
            ValidationResult::Valid(values) => values,
            ValidationResult::Invalid(errors) => {
                debug!(
                    schema = self.schema.id(),
                    invalid_fields = errors.len(),
                    "submit halted by validation"
                );
                return Ok(SubmitAttempt::Rejected(errors));
            }
        };

        let outcome = self.controller.submit(values).await?;
        if matches!(outcome, SubmitOutcome::Succeeded(_)) {
            self.reset()?;
        }
        Ok(SubmitAttempt::Submitted(outcome))
    }

    pub fn reset(&self) -> FormResult<()> {
        let mut state = write_lock(&self.state, "resetting form")?;
        state.values.clear();
        state.touched.clear();
        state.errors.clear();
        Ok(())
    }

    pub fn values(&self) -> FormResult<RawFormValues> {
        Ok(read_lock(&self.state, "reading form values")?.values.clone())
    }

    pub fn errors(&self) -> FormResult<FieldErrors> {
        Ok(read_lock(&self.state, "reading field errors")?.errors.clone())
    }

    pub fn field_error(&self, field: &str) -> FormResult<Option<String>> {
        Ok(read_lock(&self.state, "reading field error")?
            .errors
            .get(field)
            .cloned())
    }

    pub fn is_touched(&self, field: &str) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading touched fields")?
            .touched
            .iter()
            .any(|key| key.as_str() == field))
    }

    pub fn submission_state(&self) -> FormResult<SubmissionState> {
        self.controller.current_state()
    }

    pub fn snapshot(&self) -> FormResult<FormSnapshot> {
        let submission = self.controller.current_state()?;
        let state = read_lock(&self.state, "creating form snapshot")?;
        Ok(FormSnapshot {
            values: state.values.clone(),
            errors: state.errors.clone(),
            touched: state.touched.clone(),
            submission,
        })
    }

    fn revalidate_field(&self, field: &str) -> FormResult<()> {
        let Some(key) = self.schema.field(field).map(|spec| spec.key) else {
            return Ok(());
        };
        let mut state = write_lock(&self.state, "writing field validation result")?;
        match validate_field(self.schema, &state.values, field) {
            Some(message) => {
                state.errors.insert(key, message);
            }
            None => {
                state.errors.remove(&key);
            }
        }
        Ok(())
    }
}

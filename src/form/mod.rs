mod controller;
mod schema;
mod session;
mod validation;


pub use controller::{
    AttemptId, DEFAULT_FAILURE_MESSAGE, FormError, FormResult, SubmissionController,
    SubmissionState, SubmitEndpoint, SubmitOptions, SubmitOutcome, SubscriptionId,
};
pub use schema::{
    Check, FieldKey, FieldKind, FieldRule, FieldSpec, FormSchema, FormSchemaBuilder, Refinement,
    SchemaError,
};
pub use session::{FormSession, FormSnapshot, SubmitAttempt, ValidationMode};
pub use validation::{
    EXPECTED_FLAG_MESSAGE, EXPECTED_TEXT_MESSAGE, FieldErrors, FieldValue, FormValues,
    REQUIRED_MESSAGE, RawFormValues, RawValue, ValidationResult, validate, validate_field,
};

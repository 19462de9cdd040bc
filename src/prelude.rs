pub use crate::config::FormsConfig;
pub use crate::form::{
    FieldErrors, FieldRule, FieldSpec, FieldValue, FormSchema, FormSession, FormValues,
    RawFormValues, Refinement, SubmissionController, SubmissionState, SubmitAttempt,
    SubmitOptions, SubmitOutcome, ValidationMode, ValidationResult, validate,
};
pub use crate::persistence::{
    FileStore, InMemoryStore, KeyValueStore, PersistedRecord, PersistenceAdapter,
};
pub use crate::site::{Site, contact, registration};

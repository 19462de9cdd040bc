use futures::task::Spawn;
use once_cell::sync::Lazy;

use crate::form::{
    FieldRule, FieldSpec, FormSchema, FormSession, SubmissionController, SubmitOptions,
    ValidationMode,
};
use crate::persistence::{KeyValueStore, MockEndpoint, RecordDestination};

pub const NAMESPACE: &str = "contacts";

static SCHEMA: Lazy<FormSchema> = Lazy::new(|| {
    FormSchema::builder("contact")
        .field(
            FieldSpec::text("name")
                .rule(FieldRule::min_length(2, "Name must be at least 2 characters")),
        )
        .field(
            FieldSpec::text("email").rule(FieldRule::email("Please enter a valid email address")),
        )
        .field(
            FieldSpec::text("subject")
                .rule(FieldRule::min_length(5, "Subject must be at least 5 characters")),
        )
        .field(
            FieldSpec::text("message")
                .rule(FieldRule::min_length(
                    20,
                    "Message must be at least 20 characters",
                ))
                .rule(FieldRule::max_length(
                    1000,
                    "Message must be less than 1000 characters",
                )),
        )
        .field(FieldSpec::text("company").optional())
        .field(FieldSpec::text("phone").optional())
        .build()
        .expect("contact schema is well-formed")
});

pub fn schema() -> &'static FormSchema {
    &SCHEMA
}

pub fn destination() -> RecordDestination {
    RecordDestination::new(NAMESPACE)
}

pub fn open<S>(
    store: S,
    spawner: impl Spawn + Send + Sync + 'static,
    options: SubmitOptions,
) -> FormSession<'static>
where
    S: KeyValueStore,
{
    let endpoint = MockEndpoint::new(store, destination());
    let controller = SubmissionController::new(endpoint, spawner, options);
    FormSession::new(schema(), ValidationMode::OnSubmit, controller)
}

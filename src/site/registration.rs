use futures::task::Spawn;
use once_cell::sync::Lazy;

use crate::form::{
    FieldRule, FieldSpec, FormSchema, FormSession, Refinement, SchemaError, SubmissionController,
    SubmitOptions, ValidationMode,
};
use crate::persistence::{
    KeyValueStore, MirrorSource, MockEndpoint, PersistenceAdapter, RecordDestination,
    StorageError,
};

pub const NAMESPACE: &str = "registrations";

pub mod profile_keys {
    pub const IS_LOGGED_IN: &str = "isLoggedIn";
    pub const USER_EMAIL: &str = "userEmail";
    pub const USER_NAME: &str = "userName";
    pub const FULL_NAME: &str = "fullName";
    pub const USER_ORGANIZATION: &str = "userOrganization";
    pub const LICENSE_NUMBER: &str = "licenseNumber";
    pub const OCCUPATION: &str = "occupation";
}

static SCHEMA: Lazy<FormSchema> =
    Lazy::new(|| build_schema().expect("registration schema is well-formed"));

fn required_text(key: &'static str, min: usize, message: &'static str) -> FieldSpec {
    FieldSpec::text(key).rule(FieldRule::min_length(min, message))
}

fn build_schema() -> Result<FormSchema, SchemaError> {
    FormSchema::builder("registration")
        .field(required_text(
            "firstName",
            2,
            "First name must be at least 2 characters",
        ))
        .field(required_text(
            "lastName",
            2,
            "Last name must be at least 2 characters",
        ))
        .field(required_text("fullName", 4, "Full name is required"))
        .field(
            FieldSpec::text("email").rule(FieldRule::email("Please enter a valid email address")),
        )
        .field(
            FieldSpec::text("phoneNumber")
                .rule(FieldRule::pattern(
                    r"^[\d\s\-+()]+$",
                    "Please enter a valid phone number",
                )?)
                .rule(FieldRule::min_length(
                    10,
                    "Phone number must be at least 10 digits",
                )),
        )
        .field(required_text("address", 5, "Address is required"))
        .field(required_text("state", 2, "State is required"))
        .field(required_text("region", 2, "Region is required"))
        .field(
            FieldSpec::text("zipCode")
                .rule(FieldRule::pattern(r"^\d{5,6}$", "Zip code must be 5-6 digits")?),
        )
        .field(required_text("occupation", 2, "Occupation is required"))
        .field(required_text("licenseNumber", 5, "License number is required"))
        .field(FieldSpec::text("specialty").optional())
        .field(required_text(
            "organization",
            2,
            "Organization/Hospital name is required",
        ))
        .field(required_text(
            "password",
            8,
            "Password must be at least 8 characters",
        ))
        .field(FieldSpec::text("confirmPassword"))
        .field(
            FieldSpec::flag("agreeToTerms")
                .rule(FieldRule::accepted("You must agree to the terms")),
        )
        .refine(Refinement::new(
            "confirmPassword",
            "Passwords do not match",
            |values| values.text("password") == values.text("confirmPassword"),
        ))
        .build()
}

pub fn schema() -> &'static FormSchema {
    &SCHEMA
}

/// Credentials are dropped from the stored record; selected profile fields are
/// mirrored into their own keys.
pub fn destination() -> RecordDestination {
    RecordDestination::new(NAMESPACE)
        .redact("password")
        .redact("confirmPassword")
        .mirror(profile_keys::IS_LOGGED_IN, MirrorSource::Literal("true"))
        .mirror(profile_keys::USER_EMAIL, MirrorSource::Field("email"))
        .mirror(
            profile_keys::USER_NAME,
            MirrorSource::Joined(&["firstName", "lastName"], " "),
        )
        .mirror(profile_keys::FULL_NAME, MirrorSource::Field("fullName"))
        .mirror(
            profile_keys::USER_ORGANIZATION,
            MirrorSource::Field("organization"),
        )
        .mirror(
            profile_keys::LICENSE_NUMBER,
            MirrorSource::Field("licenseNumber"),
        )
        .mirror(profile_keys::OCCUPATION, MirrorSource::Field("occupation"))
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
    FormSession::new(schema(), ValidationMode::OnBlur, controller)
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Profile {
    pub email: String,
    pub user_name: String,
    pub full_name: String,
    pub organization: String,
    pub license_number: String,
    pub occupation: String,
}

/// Reads the mirrored profile keys. `None` until a registration has been
/// committed.
pub fn profile<S>(adapter: &PersistenceAdapter<S>) -> Result<Option<Profile>, StorageError>
where
    S: KeyValueStore,
{
    if adapter.read_text(profile_keys::IS_LOGGED_IN)?.as_deref() != Some("true") {
        return Ok(None);
    }
    let read = |key: &str| -> Result<String, StorageError> {
        Ok(adapter.read_text(key)?.unwrap_or_default())
    };
    Ok(Some(Profile {
        email: read(profile_keys::USER_EMAIL)?,
        user_name: read(profile_keys::USER_NAME)?,
        full_name: read(profile_keys::FULL_NAME)?,
        organization: read(profile_keys::USER_ORGANIZATION)?,
        license_number: read(profile_keys::LICENSE_NUMBER)?,
        occupation: read(profile_keys::OCCUPATION)?,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_builds_with_every_field_in_order() {
        let schema = build_schema().expect("schema builds");
        let keys = schema.keys().map(|key| key.as_str()).collect::<Vec<_>>();
        assert_eq!(keys.first(), Some(&"firstName"));
        assert_eq!(keys.last(), Some(&"agreeToTerms"));
        assert_eq!(keys.len(), 16);
        assert_eq!(schema.refinements().len(), 1);
    }
}

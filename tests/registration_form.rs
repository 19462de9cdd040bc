use std::time::Duration;

use futures::executor::{ThreadPool, block_on};
use medlicense_forms::form::{SubmitAttempt, ValidationMode};
use medlicense_forms::persistence::StorageError;
use medlicense_forms::prelude::*;
use medlicense_forms::site::registration::profile_keys;

/// Accepts every write except the one key it is told to refuse.
#[derive(Clone)]
struct RefusingStore {
    inner: InMemoryStore,
    refused: &'static str,
}

impl KeyValueStore for RefusingStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key == self.refused {
            return Err(StorageError::Unavailable);
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

fn applicant() -> RawFormValues {
    RawFormValues::new()
        .with_text("firstName", "Jane")
        .with_text("lastName", "Doe")
        .with_text("fullName", "Dr. Jane Q. Doe")
        .with_text("email", "jane.doe@hospital.example")
        .with_text("phoneNumber", "+1 (555) 123-4567")
        .with_text("address", "123 Healthcare Ave")
        .with_text("state", "MA")
        .with_text("region", "New England")
        .with_text("zipCode", "02101")
        .with_text("occupation", "Physician")
        .with_text("licenseNumber", "MD-44821")
        .with_text("organization", "Boston General")
        .with_text("password", "12345678")
        .with_text("confirmPassword", "12345678")
        .with_flag("agreeToTerms", true)
}

fn error_keys(input: &RawFormValues) -> Vec<&'static str> {
    validate(registration::schema(), input)
        .errors()
        .map(|errors| errors.keys().map(|key| key.as_str()).collect())
        .unwrap_or_default()
}

#[test]
fn complete_application_is_valid() {
    let values = validate(registration::schema(), &applicant())
        .into_values()
        .expect("applicant is valid");
    assert_eq!(values.len(), registration::schema().fields().len());
    assert_eq!(values.flag("agreeToTerms"), Some(true));
    assert_eq!(values.get("specialty"), Some(&FieldValue::Missing));
}

#[test]
fn unchecked_terms_is_the_only_error() {
    let input = applicant().with_flag("agreeToTerms", false);
    let errors = validate(registration::schema(), &input)
        .errors()
        .cloned()
        .expect("invalid");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.get("agreeToTerms").map(String::as_str),
        Some("You must agree to the terms")
    );
}

#[test]
fn mismatched_confirmation_is_owned_by_confirm_password() {
    let input = applicant()
        .with_text("password", "abcdefgh")
        .with_text("confirmPassword", "abcdefgX");
    let errors = validate(registration::schema(), &input)
        .errors()
        .cloned()
        .expect("invalid");
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors.get("confirmPassword").map(String::as_str),
        Some("Passwords do not match")
    );
}

#[test]
fn phone_checks_characters_before_length() {
    let letters = applicant().with_text("phoneNumber", "555-CALL-NOW");
    let short = applicant().with_text("phoneNumber", "555 1234");
    let letters_error = validate(registration::schema(), &letters)
        .errors()
        .and_then(|errors| errors.get("phoneNumber").cloned());
    let short_error = validate(registration::schema(), &short)
        .errors()
        .and_then(|errors| errors.get("phoneNumber").cloned());
    assert_eq!(
        letters_error.as_deref(),
        Some("Please enter a valid phone number")
    );
    assert_eq!(
        short_error.as_deref(),
        Some("Phone number must be at least 10 digits")
    );
}

#[test]
fn zip_code_needs_five_or_six_digits() {
    for bad in ["0210", "0210100", "02a01", ""] {
        let input = applicant().with_text("zipCode", bad);
        assert_eq!(error_keys(&input), vec!["zipCode"], "zip {bad:?}");
    }
    for good in ["02101", "021011"] {
        let input = applicant().with_text("zipCode", good);
        assert!(error_keys(&input).is_empty(), "zip {good:?}");
    }
}

#[test]
fn empty_form_flags_every_required_field() {
    let errors = validate(registration::schema(), &RawFormValues::new())
        .errors()
        .cloned()
        .expect("empty form is invalid");
    assert!(!errors.contains_key("specialty"));
    assert_eq!(errors.len(), registration::schema().fields().len() - 1);
    assert_eq!(
        errors.get("firstName").map(String::as_str),
        Some("Required")
    );
    assert_eq!(
        errors.get("agreeToTerms").map(String::as_str),
        Some("You must agree to the terms")
    );
}

#[test]
fn registration_validates_on_blur() {
    let site = Site::new(
        InMemoryStore::new(),
        ThreadPool::new().expect("thread pool"),
        SubmitOptions::default(),
    );
    let form = site.registration_form();
    assert_eq!(form.mode(), ValidationMode::OnBlur);

    form.set_text("firstName", "J").expect("set");
    assert_eq!(form.field_error("firstName").expect("error"), None);
    form.blur("firstName").expect("blur");
    assert_eq!(
        form.field_error("firstName").expect("error").as_deref(),
        Some("First name must be at least 2 characters")
    );
}

#[test]
fn successful_registration_mirrors_profile_and_drops_credentials() {
    let store = InMemoryStore::new();
    let site = Site::new(
        store.clone(),
        ThreadPool::new().expect("thread pool"),
        SubmitOptions {
            latency: Duration::from_millis(5),
            ..SubmitOptions::default()
        },
    );
    assert_eq!(site.profile().expect("profile"), None);

    let form = site.registration_form();
    for (field, value) in applicant().iter() {
        form.set(field, value.clone()).expect("set field");
    }
    let attempt = block_on(form.submit()).expect("submit");
    assert!(matches!(
        attempt,
        SubmitAttempt::Submitted(SubmitOutcome::Succeeded(_))
    ));

    let records = site.registrations().expect("read registrations");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].values.get("password"), None);
    assert_eq!(records[0].values.get("confirmPassword"), None);
    assert_eq!(records[0].values.text("licenseNumber"), Some("MD-44821"));

    assert_eq!(
        store.get(profile_keys::IS_LOGGED_IN).expect("get").as_deref(),
        Some("true")
    );
    let profile = site.profile().expect("profile").expect("registered");
    assert_eq!(profile.user_name, "Jane Doe");
    assert_eq!(profile.full_name, "Dr. Jane Q. Doe");
    assert_eq!(profile.email, "jane.doe@hospital.example");
    assert_eq!(profile.organization, "Boston General");
    assert_eq!(profile.occupation, "Physician");
}

#[test]
fn failed_profile_mirror_leaves_nothing_stored() {
    let inner = InMemoryStore::new();
    let store = RefusingStore {
        inner: inner.clone(),
        refused: profile_keys::OCCUPATION,
    };
    let site = Site::new(
        store,
        ThreadPool::new().expect("thread pool"),
        SubmitOptions {
            latency: Duration::from_millis(5),
            ..SubmitOptions::default()
        },
    );
    let form = site.registration_form();
    for (field, value) in applicant().iter() {
        form.set(field, value.clone()).expect("set field");
    }

    for _ in 0..2 {
        let attempt = block_on(form.submit()).expect("submit");
        assert!(matches!(
            attempt,
            SubmitAttempt::Submitted(SubmitOutcome::Failed(_))
        ));
    }

    assert!(site.registrations().expect("read registrations").is_empty());
    assert_eq!(inner.get(registration::NAMESPACE).expect("get"), None);
    assert_eq!(inner.get(profile_keys::IS_LOGGED_IN).expect("get"), None);
    assert_eq!(inner.get(profile_keys::USER_EMAIL).expect("get"), None);
    assert_eq!(site.profile().expect("profile"), None);
    assert!(
        form.submission_state()
            .expect("state")
            .failure_message()
            .is_some()
    );
    assert_eq!(form.values().expect("values"), applicant());
}

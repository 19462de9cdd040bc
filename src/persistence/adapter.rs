use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{KeyValueStore, StorageError};
use crate::form::{FieldValue, FormValues, SubmitEndpoint};
use crate::id::{RecordId, timestamp_now};

/// A submitted form value as it lives in storage. Never mutated after it is
/// created.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    #[serde(flatten)]
    pub values: FormValues,
    pub id: RecordId,
    pub created_at: String,
}

impl PersistedRecord {
    pub fn new(values: FormValues) -> Result<Self, StorageError> {
        Ok(Self {
            values,
            id: RecordId::generate(),
            created_at: timestamp_now()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PersistenceAdapter<S> {
    store: S,
}

impl<S> PersistenceAdapter<S>
where
    S: KeyValueStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn append(&self, namespace: &str, record: &PersistedRecord) -> Result<(), StorageError> {
        let mut records = self.read_all(namespace)?;
        records.push(record.clone());
        self.write(namespace, &records)?;
        debug!(namespace, total = records.len(), "appended record");
        Ok(())
    }

    pub fn read_all(&self, namespace: &str) -> Result<Vec<PersistedRecord>, StorageError> {
        let Some(text) = self.store.get(namespace)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&text).map_err(|source| StorageError::Corrupt {
            key: namespace.to_string(),
            source,
        })
    }

    pub fn write<T>(&self, key: &str, value: &T) -> Result<(), StorageError>
    where
        T: Serialize + ?Sized,
    {
        let text = serde_json::to_string(value)?;
        self.store.set(key, &text)
    }

    pub fn write_text(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.store.set(key, value)
    }

    pub fn read_text(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.store.get(key)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MirrorSource {
    Literal(&'static str),
    Field(&'static str),
    Joined(&'static [&'static str], &'static str),
}

impl MirrorSource {
    pub fn resolve(&self, values: &FormValues) -> Option<String> {
        match self {
            MirrorSource::Literal(text) => Some((*text).to_string()),
            MirrorSource::Field(field) => values.get(field).and_then(render),
            MirrorSource::Joined(fields, separator) => {
                let parts = fields
                    .iter()
                    .map(|field| values.get(field).and_then(render))
                    .collect::<Option<Vec<_>>>()?;
                Some(parts.join(*separator))
            }
        }
    }
}

fn render(value: &FieldValue) -> Option<String> {
    match value {
        FieldValue::Text(text) => Some(text.clone()),
        FieldValue::Flag(flag) => Some(flag.to_string()),
        FieldValue::Missing => None,
    }
}

/// A single plain-text key written next to the record so later pages can read
/// profile data without parsing the namespace.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ProfileMirror {
    pub key: &'static str,
    pub source: MirrorSource,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordDestination {
    pub namespace: &'static str,
    pub redacted: Vec<&'static str>,
    pub mirrors: Vec<ProfileMirror>,
}

impl RecordDestination {
    pub fn new(namespace: &'static str) -> Self {
        Self {
            namespace,
            redacted: Vec::new(),
            mirrors: Vec::new(),
        }
    }

    pub fn redact(mut self, field: &'static str) -> Self {
        self.redacted.push(field);
        self
    }

    pub fn mirror(mut self, key: &'static str, source: MirrorSource) -> Self {
        self.mirrors.push(ProfileMirror { key, source });
        self
    }
}

/// Stands in for the remote service: "delivering" a record means committing
/// it to local storage.
#[derive(Clone, Debug)]
pub struct MockEndpoint<S> {
    adapter: PersistenceAdapter<S>,
    destination: RecordDestination,
}

impl<S> MockEndpoint<S>
where
    S: KeyValueStore,
{
    pub fn new(store: S, destination: RecordDestination) -> Self {
        Self {
            adapter: PersistenceAdapter::new(store),
            destination,
        }
    }

    pub fn adapter(&self) -> &PersistenceAdapter<S> {
        &self.adapter
    }

    pub fn destination(&self) -> &RecordDestination {
        &self.destination
    }

    fn restore(&self, previous: &[(&'static str, Option<String>)]) {
        for (key, value) in previous {
            let restored = match value {
                Some(text) => self.adapter.write_text(key, text),
                None => self.adapter.store().remove(key),
            };
            if let Err(error) = restored {
                warn!(key, %error, "could not roll back failed delivery");
            }
        }
    }
}

impl<S> SubmitEndpoint for MockEndpoint<S>
where
    S: KeyValueStore,
{
    /// Commits the record and its mirrors together. If any write fails, every
    /// touched key is put back the way it was.
    fn deliver(&self, record: &PersistedRecord) -> Result<(), StorageError> {
        let mut stored = record.clone();
        for field in &self.destination.redacted {
            stored.values.remove(field);
        }
        let mirrors = self
            .destination
            .mirrors
            .iter()
            .filter_map(|mirror| Some((mirror.key, mirror.source.resolve(&record.values)?)))
            .collect::<Vec<_>>();

        let touched = std::iter::once(self.destination.namespace)
            .chain(mirrors.iter().map(|(key, _)| *key))
            .map(|key| self.adapter.read_text(key).map(|value| (key, value)))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self
            .adapter
            .append(self.destination.namespace, &stored)
            .and_then(|()| {
                mirrors
                    .iter()
                    .try_for_each(|(key, value)| self.adapter.write_text(key, value))
            });
        if let Err(error) = committed {
            self.restore(&touched);
            return Err(error);
        }

        info!(
            namespace = self.destination.namespace,
            record = %record.id,
            "record committed"
        );
        Ok(())
    }
}

pub mod contact;
pub mod registration;

use futures::task::Spawn;

use crate::form::{FormSession, SubmitOptions};
use crate::persistence::{KeyValueStore, PersistedRecord, PersistenceAdapter, StorageError};

pub use registration::Profile;

/// Opens the site's forms against one shared store.
#[derive(Clone, Debug)]
pub struct Site<S, X> {
    store: S,
    spawner: X,
    options: SubmitOptions,
}

impl<S, X> Site<S, X>
where
    S: KeyValueStore + Clone,
    X: Spawn + Clone + Send + Sync + 'static,
{
    pub fn new(store: S, spawner: X, options: SubmitOptions) -> Self {
        Self {
            store,
            spawner,
            options,
        }
    }

    pub fn options(&self) -> &SubmitOptions {
        &self.options
    }

    pub fn contact_form(&self) -> FormSession<'static> {
        contact::open(
            self.store.clone(),
            self.spawner.clone(),
            self.options.clone(),
        )
    }

    pub fn registration_form(&self) -> FormSession<'static> {
        registration::open(
            self.store.clone(),
            self.spawner.clone(),
            self.options.clone(),
        )
    }

    pub fn adapter(&self) -> PersistenceAdapter<S> {
        PersistenceAdapter::new(self.store.clone())
    }

    pub fn contacts(&self) -> Result<Vec<PersistedRecord>, StorageError> {
        self.adapter().read_all(contact::NAMESPACE)
    }

    pub fn registrations(&self) -> Result<Vec<PersistedRecord>, StorageError> {
        self.adapter().read_all(registration::NAMESPACE)
    }

    pub fn profile(&self) -> Result<Option<Profile>, StorageError> {
        registration::profile(&self.adapter())
    }
}

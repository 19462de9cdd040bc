use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use futures::channel::oneshot;
use futures::future::{AbortHandle, abortable};
use futures::task::{Spawn, SpawnExt};
use futures_timer::Delay;
use thiserror::Error;
use tracing::{debug, warn};

use super::validation::FormValues;
use crate::persistence::{PersistedRecord, StorageError};

pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to submit form. Please try again.";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmissionState {
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

impl SubmissionState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, SubmissionState::InFlight)
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            SubmissionState::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// The remote side of a submission. The site has no backend, so the only
/// implementation writes to local storage, but the controller does not care.
pub trait SubmitEndpoint: Send + Sync + 'static {
    fn deliver(&self, record: &PersistedRecord) -> Result<(), StorageError>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubmitOptions {
    pub latency: Duration,
    pub success_reset: Duration,
    pub failure_message: Cow<'static, str>,
}

impl Default for SubmitOptions {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(1_500),
            success_reset: Duration::from_millis(5_000),
            failure_message: Cow::Borrowed(DEFAULT_FAILURE_MESSAGE),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    Succeeded(PersistedRecord),
    Failed(String),
    Ignored,
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum FormError {
    #[error("form state lock poisoned while {0}")]
    StatePoisoned(&'static str),
}

pub type FormResult<T> = Result<T, FormError>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AttemptId(pub u64);

type Listener = Arc<dyn Fn(&SubmissionState) + Send + Sync>;

struct ControllerState {
    state: SubmissionState,
    attempt: AttemptId,
    reset_timer: Option<AbortHandle>,
}

struct Shared {
    state: RwLock<ControllerState>,
    listeners: RwLock<BTreeMap<SubscriptionId, Listener>>,
    next_listener: AtomicU64,
}

impl Shared {
    fn notify(&self, state: &SubmissionState) -> FormResult<()> {
        let listeners = read_lock(&self.listeners, "reading state listeners")?
            .values()
            .cloned()
            .collect::<Vec<_>>();
        for listener in listeners {
            listener(state);
        }
        Ok(())
    }
}

/// Drives one form's submission lifecycle. Owns the success reset timer and
/// cancels it when dropped.
pub struct SubmissionController {
    options: SubmitOptions,
    endpoint: Arc<dyn SubmitEndpoint>,
    spawner: Arc<dyn Spawn + Send + Sync>,
    shared: Arc<Shared>,
}

impl SubmissionController {
    pub fn new(
        endpoint: impl SubmitEndpoint,
        spawner: impl Spawn + Send + Sync + 'static,
        options: SubmitOptions,
    ) -> Self {
        Self {
            options,
            endpoint: Arc::new(endpoint),
            spawner: Arc::new(spawner),
            shared: Arc::new(Shared {
                state: RwLock::new(ControllerState {
                    state: SubmissionState::Idle,
                    attempt: AttemptId(0),
                    reset_timer: None,
                }),
                listeners: RwLock::new(BTreeMap::new()),
                next_listener: AtomicU64::new(1),
            }),
        }
    }

    pub fn options(&self) -> &SubmitOptions {
        &self.options
    }

    pub fn current_state(&self) -> FormResult<SubmissionState> {
        Ok(read_lock(&self.shared.state, "reading submission state")?
            .state
            .clone())
    }

    pub fn attempts(&self) -> FormResult<AttemptId> {
        Ok(read_lock(&self.shared.state, "reading submission attempt")?.attempt)
    }

    pub fn subscribe(
        &self,
        listener: impl Fn(&SubmissionState) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let id = SubscriptionId(self.shared.next_listener.fetch_add(1, Ordering::SeqCst));
        write_lock(&self.shared.listeners, "registering state listener")?
            .insert(id, Arc::new(listener));
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        Ok(
            write_lock(&self.shared.listeners, "removing state listener")?
                .remove(&id)
                .is_some(),
        )
    }

    /// `values` must come from a `Valid` validation result; nothing is
    /// re-checked here. Calls made while a submission is in flight are
    /// ignored. Delivery runs on the spawner, so dropping the returned future
    /// does not abandon the attempt.
    pub async fn submit(&self, values: FormValues) -> FormResult<SubmitOutcome> {
        let attempt = {
            let mut state = write_lock(&self.shared.state, "starting submission")?;
            if state.state.is_in_flight() {
                debug!("submission already in flight, ignoring submit");
                return Ok(SubmitOutcome::Ignored);
            }
            cancel_reset_timer(&mut state);
            state.attempt = AttemptId(state.attempt.0 + 1);
            transition(&mut state, SubmissionState::InFlight);
            state.attempt
        };
        self.shared.notify(&SubmissionState::InFlight)?;

        let (sender, receiver) = oneshot::channel();
        let run = Attempt {
            id: attempt,
            shared: self.shared.clone(),
            endpoint: self.endpoint.clone(),
            spawner: self.spawner.clone(),
            options: self.options.clone(),
        };
        if let Err(error) = self.spawner.spawn(async move {
            let outcome = run.deliver(values).await;
            let _ = sender.send(outcome);
        }) {
            warn!(%error, "could not schedule submission");
        }

        match receiver.await {
            Ok(outcome) => outcome,
            Err(oneshot::Canceled) => {
                warn!(attempt = attempt.0, "submission task ended without a result");
                settle(&self.shared, &self.spawner, &self.options, attempt, None)
            }
        }
    }

    /// Returns a finished submission to `Idle`. Has no effect while idle or in
    /// flight.
    pub fn dismiss(&self) -> FormResult<bool> {
        {
            let mut state = write_lock(&self.shared.state, "dismissing submission result")?;
            match state.state {
                SubmissionState::Succeeded | SubmissionState::Failed(_) => {
                    cancel_reset_timer(&mut state);
                    transition(&mut state, SubmissionState::Idle);
                }
                SubmissionState::Idle | SubmissionState::InFlight => return Ok(false),
            }
        }
        self.shared.notify(&SubmissionState::Idle)?;
        Ok(true)
    }
}

/// One in-flight submission, owned by the spawned task that runs it.
struct Attempt {
    id: AttemptId,
    shared: Arc<Shared>,
    endpoint: Arc<dyn SubmitEndpoint>,
    spawner: Arc<dyn Spawn + Send + Sync>,
    options: SubmitOptions,
}

impl Attempt {
    async fn deliver(self, values: FormValues) -> FormResult<SubmitOutcome> {
        Delay::new(self.options.latency).await;

        let delivered = PersistedRecord::new(values).and_then(|record| {
            self.endpoint.deliver(&record)?;
            Ok(record)
        });
        let record = match delivered {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(%error, attempt = self.id.0, "submission failed");
                None
            }
        };
        settle(&self.shared, &self.spawner, &self.options, self.id, record)
    }
}

/// Moves an in-flight attempt to its final state. A second call for the same
/// attempt leaves the state alone.
fn settle(
    shared: &Arc<Shared>,
    spawner: &Arc<dyn Spawn + Send + Sync>,
    options: &SubmitOptions,
    attempt: AttemptId,
    record: Option<PersistedRecord>,
) -> FormResult<SubmitOutcome> {
    let message = options.failure_message.to_string();
    let (next, outcome) = match record {
        Some(record) => (SubmissionState::Succeeded, SubmitOutcome::Succeeded(record)),
        None => (
            SubmissionState::Failed(message.clone()),
            SubmitOutcome::Failed(message.clone()),
        ),
    };

    {
        let mut state = write_lock(&shared.state, "completing submission")?;
        if state.attempt != attempt || !state.state.is_in_flight() {
            return Ok(SubmitOutcome::Failed(message));
        }
        transition(&mut state, next.clone());
    }
    shared.notify(&next)?;

    if next == SubmissionState::Succeeded {
        arm_reset_timer(shared, spawner.as_ref(), attempt, options.success_reset)?;
    }
    Ok(outcome)
}

fn arm_reset_timer(
    shared: &Arc<Shared>,
    spawner: &(dyn Spawn + Send + Sync),
    attempt: AttemptId,
    after: Duration,
) -> FormResult<()> {
    let mut state = write_lock(&shared.state, "arming success reset")?;
    if state.attempt != attempt || state.state != SubmissionState::Succeeded {
        return Ok(());
    }

    let (timer, handle) = abortable(expire_success(Arc::downgrade(shared), attempt, after));
    match spawner.spawn(async move {
        let _ = timer.await;
    }) {
        Ok(()) => state.reset_timer = Some(handle),
        Err(error) => warn!(%error, "could not schedule success reset"),
    }
    Ok(())
}

impl Drop for SubmissionController {
    fn drop(&mut self) {
        let mut state = match self.shared.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cancel_reset_timer(&mut state);
    }
}

async fn expire_success(shared: Weak<Shared>, attempt: AttemptId, after: Duration) {
    Delay::new(after).await;
    let Some(shared) = shared.upgrade() else {
        return;
    };

    let expired = match shared.state.write() {
        Ok(mut state) if state.attempt == attempt && state.state == SubmissionState::Succeeded => {
            state.reset_timer = None;
            transition(&mut state, SubmissionState::Idle);
            true
        }
        Ok(_) => false,
        Err(_) => {
            warn!("submission state poisoned, dropping success reset");
            false
        }
    };
    if expired && let Err(error) = shared.notify(&SubmissionState::Idle) {
        warn!(%error, "failed to notify success reset");
    }
}

fn transition(state: &mut ControllerState, next: SubmissionState) {
    debug!(
        from = ?state.state,
        to = ?next,
        attempt = state.attempt.0,
        "submission state changed"
    );
    state.state = next;
}

fn cancel_reset_timer(state: &mut ControllerState) {
    if let Some(timer) = state.reset_timer.take() {
        timer.abort();
    }
}

pub(super) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(super) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}

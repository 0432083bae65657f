use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, Weak};

use tokio::sync::broadcast::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::backend::rwfc::{RwfcPoller, SessionSource};
use crate::config::EntryConfig;
use crate::error::{BridgeResult, ConfigFlowError};
use crate::sensor::{self, AggregateGroup, Sensor};
use crate::sink::{SensorBatch, SensorReport, StateSink};
use crate::snapshot::{PollEvent, SnapshotStore};

/// The poll loop plus the store it publishes into.
///
/// Every live entry holds an [`Arc`] of this; the loop is told to stop
/// when the last one is released.
#[derive(Debug)]
pub struct SharedPoller {
    store: Arc<SnapshotStore>,
    shutdown: watch::Sender<bool>,
}

impl SharedPoller {
    fn spawn(source: Arc<dyn SessionSource>) -> Arc<Self> {
        let store = Arc::new(SnapshotStore::new());
        let (shutdown, rx) = watch::channel(false);
        let poller = RwfcPoller::new(source, store.clone());
        tokio::spawn(poller.run(rx));

        Arc::new(Self { store, shutdown })
    }

    #[must_use]
    pub fn store(&self) -> Arc<SnapshotStore> {
        self.store.clone()
    }
}

impl Drop for SharedPoller {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[derive(Debug)]
struct PlatformState {
    poller: Weak<SharedPoller>,
    /// Entry id -> unique id of every live entry.
    entries: BTreeMap<String, String>,
    /// Aggregate groups whose sensor pair has already been claimed.
    registered_groups: BTreeSet<AggregateGroup>,
}

/// Owner of the entry registry and the shared poller slot.
///
/// One poller serves every configured entry: it is created when the
/// first entry acquires it and dropped (stopping the poll loop) when the
/// last handle goes away. Aggregate sensor pairs are claimed by the
/// first entry that enables them; the claims reset once the registry
/// empties.
pub struct Platform {
    source: Arc<dyn SessionSource>,
    sink: Arc<dyn StateSink>,
    state: Arc<Mutex<PlatformState>>,
}

impl Platform {
    #[must_use]
    pub fn new(source: Arc<dyn SessionSource>, sink: Arc<dyn StateSink>) -> Self {
        Self {
            source,
            sink,
            state: Arc::new(Mutex::new(PlatformState {
                poller: Weak::new(),
                entries: BTreeMap::new(),
                registered_groups: BTreeSet::new(),
            })),
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    /// The shared snapshot store, while at least one entry holds the
    /// poller alive.
    #[must_use]
    pub fn store(&self) -> Option<Arc<SnapshotStore>> {
        self.state
            .lock()
            .unwrap()
            .poller
            .upgrade()
            .map(|poller| poller.store())
    }

    /// Bring one configured entry up: validate it, acquire (or start) the
    /// shared poller, claim this entry's sensors and spawn its update
    /// task. The returned handle tears all of that down when dropped.
    ///
    /// Must be called from within the tokio runtime.
    pub fn setup_entry(&self, entry_id: &str, entry: &EntryConfig) -> BridgeResult<EntryHandle> {
        entry.validate(entry_id)?;

        let unique_id = entry.unique_id();
        let title = entry.title();

        let mut state = self.state.lock().unwrap();

        if let Some((existing, _)) = state.entries.iter().find(|(_, uid)| **uid == unique_id) {
            return Err(ConfigFlowError::DuplicateUniqueId(
                existing.clone(),
                entry_id.to_string(),
                unique_id,
            )
            .into());
        }

        let poller = match state.poller.upgrade() {
            Some(poller) => poller,
            None => {
                log::debug!("Starting shared session poller");
                let poller = SharedPoller::spawn(self.source.clone());
                state.poller = Arc::downgrade(&poller);
                poller
            }
        };

        let sensors = Self::build_entry_sensors(entry, &mut state.registered_groups);
        state.entries.insert(entry_id.to_string(), unique_id);
        drop(state);

        // subscribe before spawning so no poll outcome can slip past
        let events = poller.store.subscribe();
        let task = if sensors.is_empty() {
            log::debug!("[{title}] Entry adds no sensors (aggregate pairs already claimed)");
            None
        } else {
            log::info!("[{title}] Registering {} sensors", sensors.len());
            Some(tokio::spawn(run_entry(
                title.clone(),
                sensors,
                poller.store(),
                self.sink.clone(),
                events,
            )))
        };

        Ok(EntryHandle {
            entry_id: entry_id.to_string(),
            title,
            poller,
            state: self.state.clone(),
            task,
        })
    }

    /// The sensors an entry's options select. Aggregate groups already
    /// present in `registered_groups` are skipped; newly claimed ones
    /// are recorded there.
    #[must_use]
    pub fn build_entry_sensors(
        entry: &EntryConfig,
        registered_groups: &mut BTreeSet<AggregateGroup>,
    ) -> Vec<Sensor> {
        let mut sensors = Vec::new();

        if let Some(friend_code) = entry.friend_code() {
            sensors.extend(sensor::player_sensors(friend_code, entry.player_name()));
        }

        for group in sensor::enabled_groups(entry) {
            if registered_groups.insert(group) {
                sensors.extend(sensor::aggregate_sensors(group));
            }
        }

        sensors
    }
}

/// A live configuration entry.
///
/// Dropping the handle is the teardown entrypoint: the update task is
/// aborted, the poller reference is released and, once the registry is
/// empty, the aggregate sensor claims are cleared.
#[derive(Debug)]
pub struct EntryHandle {
    entry_id: String,
    title: String,
    poller: Arc<SharedPoller>,
    state: Arc<Mutex<PlatformState>>,
    task: Option<JoinHandle<()>>,
}

impl EntryHandle {
    #[must_use]
    pub fn entry_id(&self) -> &str {
        &self.entry_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn store(&self) -> Arc<SnapshotStore> {
        self.poller.store()
    }
}

impl Drop for EntryHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }

        // a poisoned registry cannot be cleaned up, only skipped
        if let Ok(mut state) = self.state.lock() {
            state.entries.remove(&self.entry_id);
            if state.entries.is_empty() {
                state.registered_groups.clear();
            }
        }
    }
}

/// Per-entry update task: push once at startup (entities appear as
/// unavailable until the first poll lands), then re-derive and push on
/// every poll outcome, success or failure.
async fn run_entry(
    title: String,
    sensors: Vec<Sensor>,
    store: Arc<SnapshotStore>,
    sink: Arc<dyn StateSink>,
    events: Receiver<PollEvent>,
) {
    let mut events = BroadcastStream::new(events);

    push_states(&title, &sensors, &store, sink.as_ref()).await;

    while let Some(event) = events.next().await {
        if let Err(BroadcastStreamRecvError::Lagged(skipped)) = event {
            log::debug!("[{title}] Missed {skipped} poll events, pushing current state");
        }
        push_states(&title, &sensors, &store, sink.as_ref()).await;
    }
}

async fn push_states(entry: &str, sensors: &[Sensor], store: &SnapshotStore, sink: &dyn StateSink) {
    let snapshot = store.current().await;
    let fresh = store.is_live().await;

    let reports = sensors
        .iter()
        .map(|sensor| SensorReport::compute(sensor, snapshot.as_deref()))
        .collect();
    let batch = SensorBatch {
        entry: entry.to_string(),
        fresh,
        reports,
    };

    if let Err(err) = sink.push(&batch).await {
        log::warn!("[{entry}] State push failed: {err}");
    }
}

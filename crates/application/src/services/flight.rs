//! In-process call coalescing
//!
//! The first caller to miss on a key becomes the leader of a flight and runs
//! the computation; callers arriving while the flight is open follow it and
//! receive the leader's outcome instead of computing again.
//!
//! The registry maps each key to the receiving half of a `watch` channel. The
//! leader owns the sender, publishes exactly one outcome, and removes the
//! entry when it is dropped. A leader dropped before publishing (cancelled or
//! panicked) closes the channel, which followers observe as an abandoned
//! flight.

use std::collections::HashMap;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::error::ComputeError;

/// What a leader hands to its followers
#[derive(Debug, Clone)]
pub(crate) enum FlightOutcome {
    /// The serialized value
    Value(Bytes),
    /// The computation failed; every follower receives this same error
    Failed(ComputeError),
    /// The value was computed but could not be serialized for sharing
    Unshareable,
}

type Slot = watch::Receiver<Option<FlightOutcome>>;

/// Registry of open flights, keyed by cache key
#[derive(Debug, Default)]
pub(crate) struct FlightRegistry {
    inflight: Mutex<HashMap<String, Slot>>,
}

/// Result of joining a flight
pub(crate) enum Flight<'a> {
    Leader(FlightLeader<'a>),
    Follower(FlightFollower),
}

impl FlightRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Join the flight for `key`, opening it if none is in progress
    pub(crate) fn join(&self, key: &str) -> Flight<'_> {
        let mut inflight = self.inflight.lock();
        if let Some(slot) = inflight.get(key) {
            return Flight::Follower(FlightFollower { slot: slot.clone() });
        }

        let (tx, rx) = watch::channel(None);
        inflight.insert(key.to_owned(), rx.clone());
        Flight::Leader(FlightLeader {
            registry: self,
            key: key.to_owned(),
            tx,
            own: rx,
        })
    }

    /// Number of flights currently open
    pub(crate) fn len(&self) -> usize {
        self.inflight.lock().len()
    }
}

/// The caller responsible for computing a key
///
/// Dropping the leader closes its flight.
pub(crate) struct FlightLeader<'a> {
    registry: &'a FlightRegistry,
    key: String,
    tx: watch::Sender<Option<FlightOutcome>>,
    own: Slot,
}

impl FlightLeader<'_> {
    /// Publish the outcome to every follower and close the flight
    pub(crate) fn complete(self, outcome: FlightOutcome) {
        self.tx.send_replace(Some(outcome));
    }
}

impl Drop for FlightLeader<'_> {
    fn drop(&mut self) {
        let mut inflight = self.registry.inflight.lock();
        if inflight
            .get(&self.key)
            .is_some_and(|slot| slot.same_channel(&self.own))
        {
            inflight.remove(&self.key);
        }
    }
}

/// A caller waiting on someone else's computation
pub(crate) struct FlightFollower {
    slot: Slot,
}

impl FlightFollower {
    /// Wait for the leader's outcome
    ///
    /// Returns `None` if the leader went away without publishing one.
    pub(crate) async fn wait(mut self) -> Option<FlightOutcome> {
        self.slot
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| outcome.clone())
    }
}

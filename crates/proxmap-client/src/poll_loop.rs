//! Poll loop: wires feed → aggregation → state machines → dispatcher.
//!
//! Two timers drive everything: the snapshot poll (default 4 s) and the
//! status evaluator (default 60 s). Each fetch is awaited inline in its tick
//! loop, so polls coalesce rather than overlap and all state mutation stays
//! single-writer behind one mutex.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;
use tokio::time::{Duration, interval};

use proxmap_core::aggregate::flatten_snapshot;
use proxmap_core::availability::AvailabilityTracker;
use proxmap_core::evaluator::{EvaluatorConfig, EvaluatorStore};
use proxmap_core::proximity::ProximityTracker;
use proxmap_core::types::{Availability, Snapshot};

use crate::cli::WatchOpts;
use crate::dispatch::Dispatcher;
use crate::feed::FeedClient;
use crate::sink::EventSink;

/// Shared client state protected by a mutex.
pub struct ClientState {
    pub proximity: ProximityTracker,
    pub availability: AvailabilityTracker,
    pub store: EvaluatorStore,
    pub dispatcher: Dispatcher,
}

impl ClientState {
    pub fn new(opts: &WatchOpts, sink: Option<EventSink>) -> Self {
        let offline_after = TimeDelta::seconds(opts.offline_after_secs);
        let still_interval = TimeDelta::seconds(opts.still_interval_secs);
        Self {
            proximity: ProximityTracker::with_still_interval(still_interval),
            availability: AvailabilityTracker::with_offline_after(offline_after),
            store: EvaluatorStore::with_config(EvaluatorConfig {
                offline_after,
                still_interval,
                beacon_ttl: TimeDelta::seconds(opts.beacon_ttl_secs),
            }),
            dispatcher: Dispatcher::new(sink),
        }
    }

    /// Run one detection cycle over a fetched snapshot.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) {
        for device in &snapshot.devices {
            if device.is_daily_report() {
                continue;
            }
            if let Some(event) = self.availability.observe(device, now) {
                self.dispatcher.dispatch(event);
            }
            if let Some(state) = self.availability.get(&device.ident) {
                self.store
                    .record_device(&device.ident, state == Availability::Online, now);
            }
        }

        for obs in flatten_snapshot(snapshot) {
            let key = obs.track_key();
            let newly_tracked = !self.store.contains(&key);

            match self.proximity.observe(&obs, now) {
                Err(err) => {
                    tracing::warn!("observation rejected: {err}");
                    continue;
                }
                Ok(Some(event)) => {
                    if let Some(state) = self.proximity.get(&key) {
                        self.store.record_transition(&key, &obs.name, state.state, now);
                    }
                    self.dispatcher.dispatch(event);
                }
                Ok(None) => {
                    // Seed the evaluator with the silent first-sight baseline
                    // so still pings can start from it.
                    if newly_tracked {
                        if let Some(state) = self.proximity.get(&key) {
                            self.store.record_transition(&key, &obs.name, state.state, now);
                        }
                    }
                }
            }

            self.store.record_beacon_seen(&key, &obs.name, now);
        }
    }
}

/// Run the watch client: poll loop + evaluator loop, until ctrl-c/SIGTERM.
pub async fn run_watch(opts: WatchOpts) -> anyhow::Result<()> {
    let feed = FeedClient::new(&opts.feed_url)?;
    let sink = match &opts.sink_url {
        Some(url) => Some(EventSink::new(url)?),
        None => None,
    };
    let state = Arc::new(Mutex::new(ClientState::new(&opts, sink)));

    let poll_state = Arc::clone(&state);
    let poll_secs = opts.poll_interval_secs;
    let poll_handle = tokio::spawn(async move {
        run_poll_loop(feed, poll_state, poll_secs).await;
    });

    let eval_state = Arc::clone(&state);
    let eval_secs = opts.evaluator_interval_secs;
    let eval_handle = tokio::spawn(async move {
        run_evaluator_loop(eval_state, eval_secs).await;
    });

    // Wait for shutdown signal (ctrl-c or SIGTERM)
    let shutdown = async {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            tokio::select! {
                _ = ctrl_c => tracing::info!("received ctrl-c, shutting down"),
                _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c.await.ok();
            tracing::info!("received ctrl-c, shutting down");
        }
    };

    tokio::select! {
        () = shutdown => {}
        _ = poll_handle => {
            tracing::warn!("poll loop exited unexpectedly");
        }
        _ = eval_handle => {
            tracing::warn!("evaluator loop exited unexpectedly");
        }
    }

    tracing::info!("watch stopped");
    Ok(())
}

async fn run_poll_loop(feed: FeedClient, state: Arc<Mutex<ClientState>>, poll_secs: u64) {
    let mut ticker = interval(Duration::from_secs(poll_secs.max(1)));

    loop {
        ticker.tick().await;

        // A failed cycle leaves prior state untouched; the next tick still
        // fires. Stale state is acceptable, fabricated events are not.
        if let Err(e) = poll_tick(&feed, &state).await {
            tracing::warn!("poll cycle skipped: {e}");
        }
    }
}

async fn poll_tick(feed: &FeedClient, state: &Arc<Mutex<ClientState>>) -> anyhow::Result<()> {
    // Fetch outside the lock; mutate under it.
    let snapshot = feed.fetch_snapshot().await?;
    let now = Utc::now();

    let mut st = state.lock().await;
    st.apply_snapshot(&snapshot, now);
    tracing::debug!(
        "cycle complete: {} devices, {} tracked keys",
        snapshot.devices.len(),
        st.proximity.len()
    );
    Ok(())
}

async fn run_evaluator_loop(state: Arc<Mutex<ClientState>>, eval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(eval_secs.max(1)));

    loop {
        ticker.tick().await;

        let now = Utc::now();
        let mut st = state.lock().await;
        let events = st.store.run_pass(now);
        if !events.is_empty() {
            tracing::debug!("evaluator pass produced {} events", events.len());
        }
        for event in events {
            st.dispatcher.dispatch(event);
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────

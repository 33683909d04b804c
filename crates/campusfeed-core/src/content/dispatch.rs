//! Preference versioning and the fan-out dispatcher.

use std::future::Future;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::client::ContentClient;
use super::store::{ContentUpdate, Scope};
use crate::api::FetchError;
use crate::models::{Category, ContentItem, UserPreference};

/// A preference value tagged with the version that published it.
#[derive(Debug, Clone, Default)]
pub struct PreferenceSnapshot {
    pub version: u64,
    pub preference: Option<Arc<UserPreference>>,
}

/// Publishes preference changes as explicit versions.
///
/// Publishing a value equal to the current one does not bump the version,
/// so re-publishing is never a reason to fetch again.
#[derive(Clone)]
pub struct PreferenceHandle {
    tx: Arc<watch::Sender<PreferenceSnapshot>>,
}

impl Default for PreferenceHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PreferenceHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(PreferenceSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    /// Publish a preference. Returns true if this created a new version.
    pub fn publish(&self, preference: UserPreference) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.preference.as_deref() == Some(&preference) {
                return false;
            }
            snapshot.version += 1;
            snapshot.preference = Some(Arc::new(preference));
            true
        })
    }

    /// Withdraw the preference (e.g. on sign-out). Returns true if one was set.
    pub fn clear(&self) -> bool {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.preference.is_none() {
                return false;
            }
            snapshot.version += 1;
            snapshot.preference = None;
            true
        })
    }

    pub fn current(&self) -> PreferenceSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PreferenceSnapshot> {
        self.tx.subscribe()
    }
}

/// Starts the five personalized fetches once per preference version.
pub struct Dispatcher {
    client: ContentClient,
    last_dispatched: Option<u64>,
}

impl Dispatcher {
    pub fn new(client: ContentClient) -> Self {
        Self {
            client,
            last_dispatched: None,
        }
    }

    /// A snapshot triggers a dispatch if it carries a preference and a
    /// version newer than the last one dispatched.
    pub fn should_dispatch(&self, snapshot: &PreferenceSnapshot) -> bool {
        snapshot.preference.is_some() && self.last_dispatched.map_or(true, |v| snapshot.version > v)
    }

    /// Dispatch for a snapshot if it warrants it. Returns the number of
    /// fetches issued.
    pub async fn on_snapshot(
        &mut self,
        snapshot: &PreferenceSnapshot,
        tx: &mpsc::Sender<ContentUpdate>,
    ) -> usize {
        if !self.should_dispatch(snapshot) {
            return 0;
        }
        let Some(preference) = snapshot.preference.as_deref() else {
            return 0;
        };
        self.last_dispatched = Some(snapshot.version);
        info!(version = snapshot.version, "Preference available, fetching personalized content");

        let general = preference.general_query();
        let sports = preference.sports_query();
        let jobs: Vec<_> = Category::ALL
            .into_iter()
            .map(|category| {
                let client = self.client.clone();
                let query = if category.uses_sports_query() {
                    sports.clone()
                } else {
                    general.clone()
                };
                (category, async move { client.fetch_category(category, &query).await })
            })
            .collect();

        fan_out(tx, Scope::Personalized, snapshot.version, jobs).await
    }

    /// Watch the preference channel until it closes.
    pub async fn run(
        mut self,
        mut preferences: watch::Receiver<PreferenceSnapshot>,
        tx: mpsc::Sender<ContentUpdate>,
    ) {
        loop {
            let snapshot = preferences.borrow_and_update().clone();
            self.on_snapshot(&snapshot, &tx).await;

            if preferences.changed().await.is_err() {
                debug!("Preference channel closed, dispatcher stopping");
                return;
            }
        }
    }
}

/// Helper to send updates, logging any channel errors
pub(crate) async fn send_update(tx: &mpsc::Sender<ContentUpdate>, update: ContentUpdate) {
    if let Err(e) = tx.send(update).await {
        error!(error = %e, "Failed to send content update - channel closed");
    }
}

/// Run one fetch per category concurrently, publishing each result as soon
/// as it resolves. Every update is tagged with `generation`. Returns the
/// number of fetches run.
pub(crate) async fn fan_out<F>(
    tx: &mpsc::Sender<ContentUpdate>,
    scope: Scope,
    generation: u64,
    jobs: Vec<(Category, F)>,
) -> usize
where
    F: Future<Output = Result<Vec<ContentItem>, FetchError>>,
{
    let count = jobs.len();
    // Job futures are Send but not Sync; no borrow of `jobs` may live across an await
    let categories: Vec<Category> = jobs.iter().map(|(category, _)| *category).collect();
    for category in categories {
        send_update(tx, ContentUpdate::Started { scope, category, generation }).await;
    }

    stream::iter(jobs)
        .map(|(category, fetch)| async move { (category, fetch.await) })
        .buffer_unordered(Category::ALL.len())
        .for_each(|(category, result)| {
            let tx = tx.clone();
            async move {
                match &result {
                    Ok(items) => debug!(%scope, %category, count = items.len(), "Content fetched"),
                    Err(e) => warn!(%scope, %category, error = %e, "Content fetch failed"),
                }
                send_update(&tx, ContentUpdate::Finished { scope, category, generation, result }).await;
            }
        })
        .await;

    count
}

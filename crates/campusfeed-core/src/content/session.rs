//! Feed session: wires the dispatcher, the update channel and the store.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::client::ContentClient;
use super::dispatch::{fan_out, Dispatcher, PreferenceHandle};
use super::store::{ContentStore, ContentUpdate, Scope};
use crate::models::{Category, UserPreference};

/// Buffer size for the content update channel.
/// One dispatch sends two messages per category; 32 leaves room for both scopes.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Owns the content store and the background tasks that feed it.
///
/// Updates are applied only when the owner drains the channel, through
/// [`check_background_tasks`](Self::check_background_tasks) or
/// [`wait_until_settled`](Self::wait_until_settled).
pub struct FeedSession {
    client: ContentClient,
    preference: PreferenceHandle,
    store: ContentStore,
    updates_tx: mpsc::Sender<ContentUpdate>,
    updates_rx: mpsc::Receiver<ContentUpdate>,
    dispatcher: Option<JoinHandle<()>>,
    /// Generation of the latest table refresh
    refresh_generation: u64,
}

impl FeedSession {
    pub fn new(client: ContentClient) -> Self {
        let (updates_tx, updates_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        Self {
            client,
            preference: PreferenceHandle::new(),
            store: ContentStore::new(),
            updates_tx,
            updates_rx,
            dispatcher: None,
            refresh_generation: 0,
        }
    }

    /// Spawn the dispatcher task. Must be called from within a Tokio runtime.
    /// Calling it again is a no-op.
    pub fn start(&mut self) {
        if self.dispatcher.is_some() {
            return;
        }
        let dispatcher = Dispatcher::new(self.client.clone());
        let preferences = self.preference.subscribe();
        let tx = self.updates_tx.clone();
        self.dispatcher = Some(tokio::spawn(dispatcher.run(preferences, tx)));
        debug!("Dispatcher started");
    }

    /// The underlying handle. Publishing through it directly triggers a
    /// dispatch but does not reset the store; prefer
    /// [`set_preference`](Self::set_preference).
    pub fn preference(&self) -> &PreferenceHandle {
        &self.preference
    }

    /// Publish the user's preference. Returns true if it was a change.
    ///
    /// A change marks the personalized slices as loading for the new
    /// version, so [`wait_until_settled`](Self::wait_until_settled) waits
    /// for that version's results rather than returning the previous ones.
    pub fn set_preference(&mut self, preference: UserPreference) -> bool {
        if !self.preference.publish(preference) {
            return false;
        }
        let version = self.preference.current().version;
        self.store.begin(Scope::Personalized, version);
        true
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    /// Spawn a background scan of every category from the document table.
    pub fn refresh_all_background(&mut self) {
        self.refresh_generation += 1;
        let generation = self.refresh_generation;
        info!(generation, "Starting background refresh of all content");
        self.store.begin(Scope::All, generation);

        let client = self.client.clone();
        let tx = self.updates_tx.clone();

        tokio::spawn(async move {
            let jobs: Vec<_> = Category::ALL
                .into_iter()
                .map(|category| {
                    let client = client.clone();
                    (category, async move { client.fetch_all(category).await })
                })
                .collect();
            fan_out(&tx, Scope::All, generation, jobs).await;
        });
    }

    /// Apply every update that has arrived so far. Returns how many were applied.
    pub fn check_background_tasks(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            self.store.apply(update);
            applied += 1;
        }
        applied
    }

    /// Apply updates as they arrive until every slice of the scope has
    /// loaded or failed.
    pub async fn wait_until_settled(&mut self, scope: Scope) {
        while !self.store.is_settled(scope) {
            // The session holds a sender, so the channel never closes here
            let Some(update) = self.updates_rx.recv().await else {
                return;
            };
            self.store.apply(update);
        }
    }
}

impl Drop for FeedSession {
    fn drop(&mut self) {
        if let Some(handle) = self.dispatcher.take() {
            handle.abort();
        }
    }
}

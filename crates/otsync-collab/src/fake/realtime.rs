use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;

use super::doc::DocKind;
use super::doc::FakeDocHandle;
use crate::events::Collection;
use crate::ids::UniqueId;
use crate::traits::DocHandle;
use crate::traits::RealtimeClient;

/// In-memory [`RealtimeClient`]: a collection is just a map of
/// `UniqueId -> FakeDocHandle`, pre-populated by a test via [`Self::insert`]
/// before the core subscribes.
#[derive(Default)]
pub struct FakeRealtimeClient {
    docs: DashMap<(Collection, UniqueId), Arc<FakeDocHandle>>,
    moves: Mutex<Vec<(UniqueId, Option<UniqueId>)>>,
    save_requests: Mutex<Vec<UniqueId>>,
}

impl FakeRealtimeClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document into a collection, returning the shared handle so
    /// the test can push remote ops or deletions on it later.
    pub fn insert(
        &self,
        collection: Collection,
        unique_id: UniqueId,
        snapshot: serde_json::Value,
    ) -> Arc<FakeDocHandle> {
        let kind = match collection {
            Collection::Assets => DocKind::Json,
            Collection::Documents => DocKind::Text,
        };
        let handle = Arc::new(FakeDocHandle::new(unique_id, kind, snapshot));
        self.docs.insert((collection, unique_id), Arc::clone(&handle));
        handle
    }

    #[must_use]
    pub fn get(&self, collection: Collection, unique_id: UniqueId) -> Option<Arc<FakeDocHandle>> {
        self.docs.get(&(collection, unique_id)).map(|entry| Arc::clone(entry.value()))
    }

    /// Every `move_asset` call received, in order.
    #[must_use]
    pub fn moves(&self) -> Vec<(UniqueId, Option<UniqueId>)> {
        self.moves.lock().expect("moves mutex poisoned").clone()
    }

    /// Every `request_save` call received, in order.
    #[must_use]
    pub fn save_requests(&self) -> Vec<UniqueId> {
        self.save_requests.lock().expect("save_requests mutex poisoned").clone()
    }
}

#[async_trait]
impl RealtimeClient for FakeRealtimeClient {
    async fn subscribe(&self, collection: Collection) -> anyhow::Result<Vec<Box<dyn DocHandle>>> {
        Ok(self
            .docs
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| Box::new(Arc::clone(entry.value())) as Box<dyn DocHandle>)
            .collect())
    }

    async fn get_doc(
        &self,
        collection: Collection,
        unique_id: UniqueId,
    ) -> anyhow::Result<Box<dyn DocHandle>> {
        self.get(collection, unique_id)
            .map(|handle| Box::new(handle) as Box<dyn DocHandle>)
            .ok_or_else(|| anyhow::anyhow!("no fake doc for {unique_id} in {collection:?}"))
    }

    async fn move_asset(&self, unique_id: UniqueId, dest_folder: Option<UniqueId>) -> anyhow::Result<()> {
        self.moves.lock().expect("moves mutex poisoned").push((unique_id, dest_folder));
        Ok(())
    }

    async fn request_save(&self, unique_id: UniqueId) -> anyhow::Result<()> {
        self.save_requests.lock().expect("save_requests mutex poisoned").push(unique_id);
        Ok(())
    }
}

use std::sync::atomic::AtomicU32;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::asset::Asset;
use crate::asset::AssetFile;
use crate::asset::Branch;
use crate::ids::ItemId;
use crate::ids::UniqueId;
use crate::traits::AssetCreateRequest;
use crate::traits::RestClient;

/// In-memory [`RestClient`]: hands out ever-increasing ids and records
/// every call so a test can assert on what the core sent.
pub struct FakeRestClient {
    next_unique_id: AtomicU64,
    next_item_id: AtomicU32,
    branches: Mutex<Vec<Branch>>,
    created: Mutex<Vec<Asset>>,
    deleted: Mutex<Vec<UniqueId>>,
    renamed: Mutex<Vec<(UniqueId, String)>>,
}

impl Default for FakeRestClient {
    fn default() -> Self {
        Self {
            next_unique_id: AtomicU64::new(1),
            next_item_id: AtomicU32::new(1),
            branches: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            renamed: Mutex::new(Vec::new()),
        }
    }
}

impl FakeRestClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_branch(&self, branch: Branch) {
        self.branches.lock().expect("branches mutex poisoned").push(branch);
    }

    #[must_use]
    pub fn created_assets(&self) -> Vec<Asset> {
        self.created.lock().expect("created mutex poisoned").clone()
    }

    #[must_use]
    pub fn deleted_ids(&self) -> Vec<UniqueId> {
        self.deleted.lock().expect("deleted mutex poisoned").clone()
    }

    #[must_use]
    pub fn renamed_assets(&self) -> Vec<(UniqueId, String)> {
        self.renamed.lock().expect("renamed mutex poisoned").clone()
    }
}

#[async_trait]
impl RestClient for FakeRestClient {
    async fn create_asset(&self, request: AssetCreateRequest) -> anyhow::Result<Asset> {
        let unique_id = UniqueId::new(self.next_unique_id.fetch_add(1, Ordering::SeqCst));
        let item_id = ItemId::new(self.next_item_id.fetch_add(1, Ordering::SeqCst));
        let path = request.parent_item_id.map_or_else(Vec::new, |p| vec![p]);
        let file = (request.kind != crate::asset::AssetKind::Folder).then(|| AssetFile {
            filename: Some(request.name.clone()),
            hash: request.content.as_deref().map(|content| format!("{:x}", md5::compute(content))),
        });
        let asset = Asset {
            unique_id,
            item_id,
            kind: request.kind,
            name: request.name,
            path,
            file,
            branch_id: request.branch_id,
        };
        self.created.lock().expect("created mutex poisoned").push(asset.clone());
        Ok(asset)
    }

    async fn delete_asset(&self, unique_id: UniqueId) -> anyhow::Result<()> {
        self.deleted.lock().expect("deleted mutex poisoned").push(unique_id);
        Ok(())
    }

    async fn rename_asset(&self, unique_id: UniqueId, new_name: String) -> anyhow::Result<()> {
        self.renamed.lock().expect("renamed mutex poisoned").push((unique_id, new_name));
        Ok(())
    }

    async fn list_branches(&self) -> anyhow::Result<Vec<Branch>> {
        Ok(self.branches.lock().expect("branches mutex poisoned").clone())
    }
}

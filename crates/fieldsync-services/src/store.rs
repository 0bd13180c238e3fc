//! In-memory item store.
//!
//! The single source of truth for reads. Every mutation goes through one of
//! the methods below, each of which runs under the write lock and bumps a
//! version counter that waiters observe through a `watch` channel.

use fieldsync_core::models::{MediaItem, SyncStatus, TicketLinkage};
use fieldsync_core::SyncError;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

/// Outcome of [`MediaStore::begin_sync`].
#[derive(Debug)]
pub enum BeginSync {
    /// The item moved to `syncing`; the caller owns the upload.
    Started(MediaItem),
    /// Another upload is already running.
    InFlight,
    /// The intake copy already exists.
    AlreadySynced(MediaItem),
}

#[derive(Default)]
struct StoreState {
    items: HashMap<Uuid, MediaItem>,
    reserved: HashSet<Uuid>,
    /// Items whose upload was claimed through `begin_sync` in this process.
    uploading: HashSet<Uuid>,
}

pub struct MediaStore {
    state: RwLock<StoreState>,
    version: watch::Sender<u64>,
}

impl MediaStore {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            state: RwLock::new(StoreState::default()),
            version,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut StoreState) -> R) -> R {
        let result = {
            let mut guard: RwLockWriteGuard<'_, StoreState> =
                self.state.write().unwrap_or_else(|e| e.into_inner());
            f(&mut *guard)
        };
        self.version.send_modify(|v| *v = v.wrapping_add(1));
        result
    }

    /// Replace the whole snapshot (hydration). Reservations are kept.
    ///
    /// Uploads running in this process keep their in-memory state. Any other
    /// item recorded as `syncing` was left behind by an interrupted upload and
    /// is moved to `failed` so it can be retried; its id is returned so the
    /// caller can persist the change.
    pub fn replace_all(&self, items: Vec<MediaItem>) -> Vec<Uuid> {
        self.mutate(|state| {
            let mut interrupted = Vec::new();
            let mut fresh = HashMap::with_capacity(items.len());
            for mut item in items {
                if state.uploading.contains(&item.id) {
                    if let Some(current) = state.items.remove(&item.id) {
                        item = current;
                    }
                } else if item.sync_status == SyncStatus::Syncing {
                    item.sync_status = SyncStatus::Failed;
                    item.updated_at = chrono::Utc::now();
                    interrupted.push(item.id);
                }
                fresh.insert(item.id, item);
            }
            state.items = fresh;
            interrupted
        })
    }

    pub fn insert(&self, item: MediaItem) {
        self.mutate(|state| {
            state.items.insert(item.id, item);
        });
    }

    pub fn get(&self, id: Uuid) -> Option<MediaItem> {
        self.read().items.get(&id).cloned()
    }

    /// Snapshot of all items, newest first.
    pub fn list(&self) -> Vec<MediaItem> {
        let mut items: Vec<MediaItem> = self.read().items.values().cloned().collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        items
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn remove(&self, id: Uuid) -> Option<MediaItem> {
        self.mutate(|state| {
            state.reserved.remove(&id);
            state.uploading.remove(&id);
            state.items.remove(&id)
        })
    }

    /// Atomically check the status and claim the upload.
    pub fn begin_sync(&self, id: Uuid) -> Result<BeginSync, SyncError> {
        self.mutate(|state| {
            let item = state.items.get_mut(&id).ok_or(SyncError::ItemNotFound(id))?;
            if state.uploading.contains(&id) {
                return Ok(BeginSync::InFlight);
            }
            let status = match item.sync_status {
                SyncStatus::Synced => return Ok(BeginSync::AlreadySynced(item.clone())),
                // Nobody here owns that upload
                SyncStatus::Syncing => SyncStatus::Failed,
                status => status,
            };
            if item.local_path.is_none() {
                return Err(SyncError::NoSource(id));
            }
            item.sync_status = status.transition_to(SyncStatus::Syncing)?;
            item.updated_at = chrono::Utc::now();
            state.uploading.insert(id);
            Ok(BeginSync::Started(item.clone()))
        })
    }

    /// `syncing -> synced`, recording where the intake copy lives.
    pub fn complete_sync(
        &self,
        id: Uuid,
        remote_locator: String,
        storage_path: String,
    ) -> Result<MediaItem, SyncError> {
        self.mutate(|state| {
            state.uploading.remove(&id);
            let item = state.items.get_mut(&id).ok_or(SyncError::ItemNotFound(id))?;
            item.sync_status = item.sync_status.transition_to(SyncStatus::Synced)?;
            item.remote_locator = Some(remote_locator);
            item.storage_path = Some(storage_path);
            item.updated_at = chrono::Utc::now();
            Ok(item.clone())
        })
    }

    /// `syncing -> failed`. Local bytes are left untouched.
    pub fn fail_sync(&self, id: Uuid) -> Result<MediaItem, SyncError> {
        self.mutate(|state| {
            state.uploading.remove(&id);
            let item = state.items.get_mut(&id).ok_or(SyncError::ItemNotFound(id))?;
            item.sync_status = item.sync_status.transition_to(SyncStatus::Failed)?;
            item.updated_at = chrono::Utc::now();
            Ok(item.clone())
        })
    }

    /// Reserve a batch for assignment, all or nothing.
    ///
    /// Items that are linked or reserved by another assignment count as
    /// conflicting. Duplicate ids are collapsed; snapshots come back in
    /// request order.
    pub fn reserve_for_assignment(&self, ids: &[Uuid]) -> Result<Vec<MediaItem>, SyncError> {
        self.mutate(|state| {
            let mut seen = HashSet::new();
            let mut batch = Vec::with_capacity(ids.len());
            for id in ids {
                if !seen.insert(*id) {
                    continue;
                }
                let item = state.items.get(id).ok_or(SyncError::ItemNotFound(*id))?;
                batch.push(item.clone());
            }

            let conflicting = batch
                .iter()
                .filter(|item| item.is_assigned() || state.reserved.contains(&item.id))
                .count();
            if conflicting > 0 {
                return Err(SyncError::AlreadyAssigned { conflicting });
            }

            state.reserved.extend(batch.iter().map(|item| item.id));
            Ok(batch)
        })
    }

    pub fn release(&self, ids: &[Uuid]) {
        self.mutate(|state| {
            for id in ids {
                state.reserved.remove(id);
            }
        });
    }

    /// Set ticket, attachment and timestamp together.
    ///
    /// Returns `None` if the item has been removed in the meantime.
    pub fn apply_linkage(
        &self,
        id: Uuid,
        linkage: TicketLinkage,
    ) -> Result<Option<MediaItem>, SyncError> {
        self.mutate(|state| {
            let Some(item) = state.items.get_mut(&id) else {
                return Ok(None);
            };
            if item.is_assigned() {
                return Err(SyncError::AlreadyAssigned { conflicting: 1 });
            }
            item.updated_at = linkage.assigned_at;
            item.linkage = Some(linkage);
            Ok(Some(item.clone()))
        })
    }

    /// Wait until `ready` holds for the item, the item disappears (`None`),
    /// or `timeout` elapses.
    pub async fn wait_until(
        &self,
        id: Uuid,
        timeout: Duration,
        ready: impl Fn(&MediaItem) -> bool,
    ) -> Result<Option<MediaItem>, SyncError> {
        let mut changes = self.version.subscribe();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.get(id) {
                None => return Ok(None),
                Some(item) if ready(&item) => return Ok(Some(item)),
                Some(_) => {}
            }
            match tokio::time::timeout_at(deadline, changes.changed()).await {
                Ok(Ok(())) => continue,
                Ok(Err(_)) | Err(_) => return Err(SyncError::SyncTimeout(id)),
            }
        }
    }

    /// Wait for an in-flight sync of `id` to settle.
    pub async fn wait_for_settled(
        &self,
        id: Uuid,
        timeout: Duration,
    ) -> Result<Option<MediaItem>, SyncError> {
        self.wait_until(id, timeout, |item| !item.sync_status.is_in_flight())
            .await
    }
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fieldsync_core::models::{MediaType, NewMediaItem};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn captured(name: &str) -> MediaItem {
        MediaItem::from_capture(NewMediaItem {
            owner_id: Uuid::new_v4(),
            media_type: MediaType::Image,
            file_name: name.to_string(),
            local_path: format!("/tmp/{name}"),
            file_size_bytes: 10,
            duration_seconds: None,
            width: Some(4),
            height: Some(3),
            metadata: BTreeMap::new(),
        })
    }

    fn linkage(ticket: &str) -> TicketLinkage {
        TicketLinkage {
            ticket_id: ticket.to_string(),
            attachment_id: Uuid::new_v4(),
            assigned_at: Utc::now(),
        }
    }

    #[test]
    fn begin_sync_claims_once() {
        let store = MediaStore::new();
        let item = captured("a.jpg");
        let id = item.id;
        store.insert(item);

        assert!(matches!(store.begin_sync(id), Ok(BeginSync::Started(_))));
        assert!(matches!(store.begin_sync(id), Ok(BeginSync::InFlight)));

        store.fail_sync(id).unwrap();
        assert_eq!(store.get(id).unwrap().sync_status, SyncStatus::Failed);

        assert!(matches!(store.begin_sync(id), Ok(BeginSync::Started(_))));
        store
            .complete_sync(id, "http://x/a".into(), "o/a".into())
            .unwrap();
        assert!(matches!(
            store.begin_sync(id),
            Ok(BeginSync::AlreadySynced(_))
        ));
    }

    #[test]
    fn complete_requires_syncing() {
        let store = MediaStore::new();
        let item = captured("a.jpg");
        let id = item.id;
        store.insert(item);

        let err = store
            .complete_sync(id, "http://x/a".into(), "o/a".into())
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidTransition { .. }));
        assert_eq!(store.get(id).unwrap().remote_locator, None);
    }

    #[test]
    fn reservation_counts_assigned_and_reserved_items() {
        let store = MediaStore::new();
        let (a, b, c) = (captured("a.jpg"), captured("b.jpg"), captured("c.jpg"));
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);
        store.insert(a);
        store.insert(b);
        store.insert(c);
        store.apply_linkage(a_id, linkage("t-1")).unwrap();

        let err = store.reserve_for_assignment(&[a_id, b_id]).unwrap_err();
        assert!(matches!(err, SyncError::AlreadyAssigned { conflicting: 1 }));

        let batch = store.reserve_for_assignment(&[b_id, b_id]).unwrap();
        assert_eq!(batch.len(), 1);

        let err = store.reserve_for_assignment(&[c_id, b_id]).unwrap_err();
        assert!(matches!(err, SyncError::AlreadyAssigned { conflicting: 1 }));

        store.release(&[b_id]);
        assert_eq!(store.reserve_for_assignment(&[c_id, b_id]).unwrap().len(), 2);
    }

    #[test]
    fn reservation_rejects_unknown_ids() {
        let store = MediaStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            store.reserve_for_assignment(&[missing]),
            Err(SyncError::ItemNotFound(id)) if id == missing
        ));
    }

    #[test]
    fn linkage_is_applied_once() {
        let store = MediaStore::new();
        let item = captured("a.jpg");
        let id = item.id;
        store.insert(item);

        let linked = store.apply_linkage(id, linkage("t-1")).unwrap().unwrap();
        assert_eq!(linked.ticket_id(), Some("t-1"));
        assert!(store.apply_linkage(id, linkage("t-2")).is_err());
        assert_eq!(store.get(id).unwrap().ticket_id(), Some("t-1"));
        assert!(store
            .apply_linkage(Uuid::new_v4(), linkage("t-3"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn list_is_newest_first() {
        let store = MediaStore::new();
        let mut older = captured("old.jpg");
        older.created_at = Utc::now() - chrono::Duration::hours(1);
        let newer = captured("new.jpg");
        store.replace_all(vec![older, newer]);

        let names: Vec<_> = store.list().into_iter().map(|i| i.file_name).collect();
        assert_eq!(names, vec!["new.jpg", "old.jpg"]);
    }

    #[tokio::test]
    async fn waiters_observe_settlement() {
        let store = Arc::new(MediaStore::new());
        let item = captured("a.jpg");
        let id = item.id;
        store.insert(item);
        store.begin_sync(id).unwrap();

        let waiter = {
            let store = store.clone();
            tokio::spawn(async move { store.wait_for_settled(id, Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        store
            .complete_sync(id, "http://x/a".into(), "o/a".into())
            .unwrap();

        let settled = waiter.await.unwrap().unwrap().unwrap();
        assert_eq!(settled.sync_status, SyncStatus::Synced);
    }

    #[tokio::test]
    async fn wait_times_out() {
        let store = MediaStore::new();
        let item = captured("a.jpg");
        let id = item.id;
        store.insert(item);
        store.begin_sync(id).unwrap();

        let err = store
            .wait_for_settled(id, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SyncTimeout(_)));
    }

    #[test]
    fn hydration_fails_interrupted_uploads() {
        let store = MediaStore::new();
        let mut stalled = captured("stalled.jpg");
        stalled.sync_status = SyncStatus::Syncing;
        let stalled_id = stalled.id;
        let pending = captured("pending.jpg");

        let interrupted = store.replace_all(vec![stalled, pending]);

        assert_eq!(interrupted, vec![stalled_id]);
        assert_eq!(store.get(stalled_id).unwrap().sync_status, SyncStatus::Failed);
        assert!(matches!(
            store.begin_sync(stalled_id),
            Ok(BeginSync::Started(_))
        ));
    }

    #[test]
    fn hydration_keeps_running_uploads() {
        let store = MediaStore::new();
        let item = captured("a.jpg");
        let id = item.id;
        store.insert(item.clone());
        store.begin_sync(id).unwrap();

        let mut persisted = item;
        persisted.sync_status = SyncStatus::Syncing;
        assert!(store.replace_all(vec![persisted]).is_empty());

        assert!(matches!(store.begin_sync(id), Ok(BeginSync::InFlight)));
        store
            .complete_sync(id, "http://x/a".into(), "o/a".into())
            .unwrap();
        assert_eq!(store.get(id).unwrap().sync_status, SyncStatus::Synced);
    }

    #[test]
    fn unowned_syncing_item_can_be_claimed() {
        let store = MediaStore::new();
        let mut item = captured("a.jpg");
        item.sync_status = SyncStatus::Syncing;
        let id = item.id;
        store.insert(item);

        assert!(matches!(store.begin_sync(id), Ok(BeginSync::Started(_))));
        assert!(matches!(store.begin_sync(id), Ok(BeginSync::InFlight)));
    }
}

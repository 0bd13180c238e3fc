//! Deletion and query integration tests.
//!
//! Run with: `cargo test -p fieldsync-services --test lifecycle_test`

mod helpers;

use fieldsync_core::models::{MediaType, SyncStatus};
use fieldsync_db::MediaItemRepository;
use fieldsync_services::{MediaFilter, SyncEvent, TicketFilter};
use fieldsync_storage::keys;
use helpers::setup_test_engine;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
async fn test_delete_nonexistent_item_is_noop() {
    let engine = setup_test_engine().await;
    let kept = engine.capture(MediaType::Image, "kept.jpg").await;
    let mut events = engine.service.subscribe();

    engine.service.delete(Uuid::new_v4()).await;

    assert_eq!(engine.storage_calls(), 0);
    assert_eq!(engine.items.writes(), 0);
    assert!(events.try_recv().is_err());
    assert!(engine.service.get(kept.id).is_some());
}

#[tokio::test]
async fn test_delete_removes_record_file_and_object() {
    let engine = setup_test_engine().await;
    let item = engine.capture(MediaType::Image, "gone.jpg").await;
    let synced = engine.service.upload_item(item.id).await.unwrap();
    let key = synced.storage_path.clone().unwrap();
    let local = synced.local_path.clone().unwrap();
    let mut events = engine.service.subscribe();

    engine.service.delete(item.id).await;

    assert!(engine.service.get(item.id).is_none());
    assert!(engine.items.inner.get(item.id).await.unwrap().is_none());
    assert!(!Path::new(&local).exists());
    assert!(!engine.object_exists(&engine.intake, &key));
    assert_eq!(
        events.try_recv().unwrap(),
        SyncEvent::Deleted { item_id: item.id }
    );
}

#[tokio::test]
async fn test_delete_steps_are_independent() {
    let engine = setup_test_engine().await;
    let item = engine.capture(MediaType::Audio, "stuck.m4a").await;
    let synced = engine.service.upload_item(item.id).await.unwrap();
    let local = synced.local_path.clone().unwrap();
    engine.items.fail_deletes(true);
    engine.intake.fail_deletes(true);

    engine.service.delete(item.id).await;

    assert!(!Path::new(&local).exists());
    assert_eq!(engine.intake.deletes(), 1);
    assert!(engine.service.get(item.id).is_none());
}

#[tokio::test]
async fn test_delete_keeps_platform_assets() {
    let engine = setup_test_engine().await;
    let path = engine.write_capture("library.jpg", b"jpeg").await;
    engine.resolver.register("ph://asset/library", &path);
    let item = engine
        .capture_from(MediaType::Image, "library.jpg", "ph://asset/library".into())
        .await;

    engine.service.delete(item.id).await;

    assert!(path.exists());
    assert!(engine.service.get(item.id).is_none());
}

#[tokio::test]
async fn test_filter_over_engine_snapshot() {
    let engine = setup_test_engine().await;
    let photo = engine.capture(MediaType::Image, "photo.jpg").await;
    let memo = engine.capture(MediaType::Audio, "memo.m4a").await;
    let clip = engine.capture(MediaType::Video, "clip.mp4").await;
    engine.service.upload_item(clip.id).await.unwrap();
    let (_, followups) = engine
        .service
        .assign_with_followups(&[memo.id], "ticket-5")
        .await
        .unwrap();
    for handle in followups {
        handle.await.unwrap();
    }

    let unassigned = engine.service.filter(&MediaFilter {
        ticket: TicketFilter::Unassigned,
        ..Default::default()
    });
    let mut ids: Vec<Uuid> = unassigned.iter().map(|i| i.id).collect();
    ids.sort();
    let mut expected = vec![photo.id, clip.id];
    expected.sort();
    assert_eq!(ids, expected);

    let on_ticket = engine.service.filter(&MediaFilter {
        ticket: TicketFilter::Ticket("ticket-5".into()),
        ..Default::default()
    });
    assert_eq!(on_ticket.len(), 1);
    assert_eq!(on_ticket[0].id, memo.id);

    let pending = engine.service.filter(&MediaFilter {
        sync_status: Some(SyncStatus::Pending),
        ..Default::default()
    });
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, photo.id);

    let searched = engine.service.filter(&MediaFilter {
        search: Some("CLIP".into()),
        ..Default::default()
    });
    assert_eq!(searched.len(), 1);

    assert_eq!(engine.service.list().len(), 3);
}

#[tokio::test]
async fn test_delete_during_upload_leaves_no_intake_object() {
    let engine = setup_test_engine().await;
    let item = engine.capture(MediaType::Image, "racing.jpg").await;
    let item_id = item.id;
    engine.intake.delay_uploads(Duration::from_millis(200));

    let upload = {
        let service = engine.service.clone();
        tokio::spawn(async move { service.upload_item(item_id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    engine.service.delete(item_id).await;

    let outcome = upload.await.unwrap();

    assert!(outcome.is_err());
    assert!(engine.service.get(item_id).is_none());
    assert!(engine.items.inner.get(item_id).await.unwrap().is_none());
    let key = keys::intake_key(engine.owner_id, item_id);
    assert!(!engine.object_exists(&engine.intake, &key));
}

//! Owner binding and reconciliation tests

use gallery_core::{GalleryError, Operation, RecordId, SLOT_COUNT};
use gallery_test_utils::{blob_url, credential, image, BlobCall, Harness, RecordCall, TEST_OWNER};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_bind_loads_owner_blobs_with_record_links() {
    let h = Harness::new();
    let first = h.seed_image("prop-001/1_a.jpg");
    let second = h.seed_image("prop-001/2_b.jpg");
    h.blobs.insert("prop-001/3_c.jpg", b"no record");

    let loaded = h.gallery.bind(TEST_OWNER, credential()).await.unwrap();

    assert_eq!(loaded, 3);
    let slots = h.gallery.slots();
    assert_eq!(slots[0].display.blob_url(), Some(&blob_url("prop-001/1_a.jpg")));
    assert_eq!(slots[0].record_id, Some(first));
    assert_eq!(slots[1].record_id, Some(second));
    assert_eq!(slots[2].display.blob_url(), Some(&blob_url("prop-001/3_c.jpg")));
    assert_eq!(slots[2].record_id, None);
    assert!(slots[3..].iter().all(|slot| slot.is_empty()));
}

#[tokio::test]
async fn test_bind_lists_only_owner_prefix() {
    let h = Harness::new();
    h.seed_image("prop-001/1_a.jpg");
    h.blobs.insert("prop-002/1_other.jpg", b"other");
    h.blobs.insert("prop-0010/1_lookalike.jpg", b"other");

    let loaded = h.gallery.bind(TEST_OWNER, credential()).await.unwrap();

    assert_eq!(loaded, 1);
    assert_eq!(h.blobs.calls(), vec![BlobCall::List("prop-001/".to_string())]);
    assert_eq!(h.records.calls(), vec![RecordCall::Query(TEST_OWNER.to_string())]);
}

#[tokio::test]
async fn test_bind_caps_at_slot_count() {
    let h = Harness::new();
    for n in 0..10 {
        h.seed_image(&format!("prop-001/{n}_img.jpg"));
    }

    let loaded = h.gallery.bind(TEST_OWNER, credential()).await.unwrap();

    assert_eq!(loaded, SLOT_COUNT);
    assert_eq!(
        h.gallery.slots()[7].display.blob_url(),
        Some(&blob_url("prop-001/7_img.jpg"))
    );
}

#[tokio::test]
async fn test_bind_survives_record_query_failure() {
    let h = Harness::new();
    h.seed_image("prop-001/1_a.jpg");
    h.records.fail_query(true);

    let loaded = h.gallery.bind(TEST_OWNER, credential()).await.unwrap();

    assert_eq!(loaded, 1);
    assert_eq!(h.gallery.slots()[0].record_id, None);
    assert!(h.gallery.notification().is_none());
}

#[tokio::test]
async fn test_bind_reports_listing_failure() {
    let h = Harness::new();
    h.seed_image("prop-001/1_a.jpg");
    h.blobs.fail_list(true);

    let err = h.gallery.bind(TEST_OWNER, credential()).await.unwrap_err();

    assert!(matches!(err, GalleryError::Transport { op: Operation::ListBlobs, .. }));
    assert_eq!(h.gallery.registry().occupied(), 0);
    assert_eq!(h.gallery.notification().unwrap().message, "Error loading images.");
}

#[tokio::test]
async fn test_bind_reports_unaddressable_blob() {
    let h = Harness::new();
    h.seed_image("prop-001/1_a.jpg");
    h.blobs.fail_urls(true);

    let err = h.gallery.bind(TEST_OWNER, credential()).await.unwrap_err();

    assert!(matches!(err, GalleryError::Transport { op: Operation::ListBlobs, .. }));
    assert_eq!(h.gallery.registry().occupied(), 0);
    assert_eq!(h.gallery.notification().unwrap().message, "Error loading images.");
}

#[tokio::test]
async fn test_rebind_to_other_owner_clears_slots() {
    let h = Harness::bound().await;
    h.gallery
        .upload_images(vec![image("a.jpg"), image("b.jpg")])
        .await
        .unwrap();

    let loaded = h.gallery.set_owner("prop-002").await.unwrap();

    assert_eq!(loaded, 0);
    assert_eq!(h.gallery.registry().occupied(), 0);
    assert_eq!(h.gallery.owner().unwrap().as_str(), "prop-002");
}

#[tokio::test]
async fn test_rebind_same_owner_reloads_from_storage() {
    let h = Harness::bound().await;
    h.gallery.upload_images(vec![image("a.jpg")]).await.unwrap();
    h.gallery.registry().reset(0).unwrap();

    let loaded = h.gallery.set_owner(TEST_OWNER).await.unwrap();

    assert_eq!(loaded, 1);
    assert_eq!(h.gallery.slots()[0].record_id, Some(RecordId::new("rec-1")));
}

#[tokio::test]
async fn test_invalid_owner_leaves_gallery_unbound_and_empty() {
    let h = Harness::bound().await;
    h.gallery.upload_images(vec![image("a.jpg")]).await.unwrap();

    for bad in ["", "   ", "a/b", "..", "{}"] {
        let err = h.gallery.set_owner(bad).await.unwrap_err();
        assert_eq!(err, GalleryError::InvalidOwnerId, "owner {bad:?}");
        assert!(h.gallery.owner().is_none());
        assert_eq!(h.gallery.registry().occupied(), 0);
    }
}

#[tokio::test]
async fn test_braced_owner_is_normalized() {
    let h = Harness::new();
    h.seed_image("prop-001/1_a.jpg");

    let loaded = h.gallery.bind("{prop-001}", credential()).await.unwrap();

    assert_eq!(loaded, 1);
    assert_eq!(h.gallery.owner().unwrap().as_str(), TEST_OWNER);
}

#[tokio::test]
async fn test_rebind_with_new_credential_uses_it() {
    let h = Harness::bound().await;
    h.gallery.set_credential(gallery_core::SasToken::default());

    let err = h.gallery.set_owner(TEST_OWNER).await.unwrap_err();
    assert!(err.is_transport());

    h.gallery.set_credential(credential());
    assert_eq!(h.gallery.set_owner(TEST_OWNER).await, Ok(0));
}

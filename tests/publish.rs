//! Publisher, destination key and cache integration tests.

mod common;

use std::sync::Arc;

use loopclip::{
    DestinationKey, DirectoryPublisher, PreviewCache, PreviewError, PreviewOptions,
    PreviewPipeline, PublishError, Publisher,
};

use common::{MemoryPublisher, SyntheticLoader, moving};

fn pipeline() -> PreviewPipeline {
    PreviewPipeline::new(PreviewOptions::new().with_size(16, 16)).unwrap()
}

// ── DestinationKey ─────────────────────────────────────────────────

#[test]
fn key_renders_category_resource_extension() {
    let key = DestinationKey::new("legs", "squat-01", "gif").unwrap();
    assert_eq!(key.to_string(), "legs/squat-01.gif");
    assert_eq!(key.category(), "legs");
    assert_eq!(key.resource(), "squat-01");
    assert_eq!(key.extension(), "gif");
    assert_eq!(
        key.to_path(),
        std::path::Path::new("legs").join("squat-01.gif")
    );
}

#[test]
fn key_rejects_bad_segments() {
    let cases = [
        ("", "squat", "gif"),
        ("legs", "", "gif"),
        ("legs", "squat", ""),
        ("legs/upper", "squat", "gif"),
        ("legs", "../squat", "gif"),
        ("legs", "squat", "g\\if"),
        ("..", "squat", "gif"),
    ];
    for (category, resource, extension) in cases {
        assert!(
            matches!(
                DestinationKey::new(category, resource, extension),
                Err(PublishError::InvalidKey(_))
            ),
            "accepted {category:?}/{resource:?}.{extension:?}"
        );
    }
}

// ── DirectoryPublisher ─────────────────────────────────────────────

#[test]
fn directory_publisher_writes_under_root() {
    let root = tempfile::tempdir().unwrap();
    let publisher = DirectoryPublisher::new(root.path());
    let key = DestinationKey::new("core", "plank", "gif").unwrap();

    let url = publisher.publish(b"GIF89a-payload", &key).unwrap();

    let written = root.path().join("core").join("plank.gif");
    assert_eq!(std::fs::read(&written).unwrap(), b"GIF89a-payload");
    assert!(url.starts_with("file://"));
    assert!(url.ends_with("plank.gif"));
}

#[test]
fn directory_publisher_uses_base_url() {
    let root = tempfile::tempdir().unwrap();
    let publisher =
        DirectoryPublisher::new(root.path()).with_base_url("https://cdn.example.com/previews/");
    let key = DestinationKey::new("core", "plank", "gif").unwrap();

    let url = publisher.publish(b"x", &key).unwrap();

    assert_eq!(url, "https://cdn.example.com/previews/core/plank.gif");
}

#[test]
fn directory_publisher_can_refuse_overwrite() {
    let root = tempfile::tempdir().unwrap();
    let publisher = DirectoryPublisher::new(root.path()).with_overwrite(false);
    let key = DestinationKey::new("core", "plank", "gif").unwrap();

    publisher.publish(b"first", &key).unwrap();
    let error = publisher.publish(b"second", &key).unwrap_err();

    assert!(matches!(error, PublishError::AlreadyExists(_)));
    let written = root.path().join("core").join("plank.gif");
    assert_eq!(std::fs::read(written).unwrap(), b"first");
}

// ── transcode_and_publish ──────────────────────────────────────────

#[test]
fn publish_hands_off_the_payload() {
    let loader = SyntheticLoader::new(10.0, moving());
    let publisher = MemoryPublisher::new();
    let key = DestinationKey::new("arms", "curl", "gif").unwrap();

    let published = pipeline()
        .transcode_and_publish(&loader, "curl.mp4", &publisher, &key)
        .unwrap();

    assert_eq!(published.url, "mem://arms/curl.gif");
    assert_eq!(published.key, key);
    assert!(!published.is_cached());
    let preview = published.preview.unwrap();
    assert_eq!(publisher.get("arms/curl.gif").unwrap(), preview.payload);
}

#[test]
fn publisher_errors_pass_through_unmodified() {
    let loader = SyntheticLoader::new(10.0, moving());
    let publisher = MemoryPublisher::rejecting();
    let key = DestinationKey::new("arms", "curl", "gif").unwrap();

    let error = pipeline()
        .transcode_and_publish(&loader, "curl.mp4", &publisher, &key)
        .unwrap_err();

    assert_eq!(
        error.to_string(),
        "Publisher rejected arms/curl.gif: quota exceeded"
    );
    match error {
        PreviewError::Publish(PublishError::Rejected { key, reason }) => {
            assert_eq!(key, "arms/curl.gif");
            assert_eq!(reason, "quota exceeded");
        }
        other => panic!("Expected Publish, got: {other}"),
    }
}

#[test]
fn transcode_failure_publishes_nothing() {
    let loader = SyntheticLoader::missing();
    let publisher = MemoryPublisher::new();
    let key = DestinationKey::new("arms", "curl", "gif").unwrap();

    let result = pipeline().transcode_and_publish(&loader, "curl.mp4", &publisher, &key);

    assert!(matches!(result, Err(PreviewError::VideoLoad { .. })));
    assert_eq!(publisher.len(), 0);
}

#[test]
fn cache_hit_skips_transcoding() {
    let cache = Arc::new(PreviewCache::new(8));
    let pipeline = pipeline().with_cache(Arc::clone(&cache));
    let loader = SyntheticLoader::new(10.0, moving());
    let probe = loader.probe();
    let publisher = MemoryPublisher::new();
    let key = DestinationKey::new("back", "row", "gif").unwrap();

    let first = pipeline
        .transcode_and_publish(&loader, "row.mp4", &publisher, &key)
        .unwrap();
    let second = pipeline
        .transcode_and_publish(&loader, "row.mp4", &publisher, &key)
        .unwrap();

    assert!(!first.is_cached());
    assert!(second.is_cached());
    assert_eq!(first.url, second.url);
    assert_eq!(probe.opens(), 1);
    assert_eq!(cache.get(&key).as_deref(), Some("mem://back/row.gif"));
}

#[test]
fn failed_publish_is_not_cached() {
    let cache = Arc::new(PreviewCache::new(8));
    let pipeline = pipeline().with_cache(Arc::clone(&cache));
    let loader = SyntheticLoader::new(10.0, moving());
    let key = DestinationKey::new("back", "row", "gif").unwrap();

    assert!(
        pipeline
            .transcode_and_publish(&loader, "row.mp4", &MemoryPublisher::rejecting(), &key)
            .is_err()
    );
    assert!(cache.is_empty());
}

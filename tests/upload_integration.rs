use bytes::Bytes;
use futures::stream::{self, StreamExt};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, ObjectStore};
use release_mirror::credentials::StorageCredentials;
use release_mirror::upload::ObjectStoreSink;
use release_mirror_core::contract::{ByteStream, ObjectSink, StorageError, StreamError, OCTET_STREAM};
use std::sync::Arc;

fn sink() -> (Arc<InMemory>, ObjectStoreSink) {
    let store = Arc::new(InMemory::new());
    let sink = ObjectStoreSink::new(store.clone(), "test-bucket");
    (store, sink)
}

fn body(chunks: Vec<Result<Bytes, StreamError>>) -> ByteStream {
    stream::iter(chunks).boxed()
}

async fn stored(store: &InMemory, key: &str) -> (Bytes, Option<String>) {
    let result = store.get(&Path::from(key)).await.expect("object exists");
    let content_type = result
        .attributes
        .get(&Attribute::ContentType)
        .map(|v| v.to_string());
    let bytes = result.bytes().await.expect("read body");
    (bytes, content_type)
}

#[tokio::test]
async fn test_put_stream_writes_all_chunks_with_content_type() {
    let (store, sink) = sink();

    let written = sink
        .put_stream(
            "22.04/ubuntu.iso",
            body(vec![
                Ok(Bytes::from_static(b"hello ")),
                Ok(Bytes::from_static(b"release ")),
                Ok(Bytes::from_static(b"mirror")),
            ]),
            OCTET_STREAM,
        )
        .await
        .expect("upload succeeds");

    assert_eq!(written, 20);
    let (bytes, content_type) = stored(&store, "22.04/ubuntu.iso").await;
    assert_eq!(&bytes[..], b"hello release mirror");
    assert_eq!(content_type.as_deref(), Some(OCTET_STREAM));
}

#[tokio::test]
async fn test_put_stream_body_error_leaves_no_object() {
    let (store, sink) = sink();

    let err = sink
        .put_stream(
            "22.04/broken.iso",
            body(vec![
                Ok(Bytes::from_static(b"partial")),
                Err("connection reset".into()),
            ]),
            OCTET_STREAM,
        )
        .await
        .unwrap_err();

    match err {
        StorageError::Body { written, reason } => {
            assert_eq!(written, 7);
            assert!(reason.contains("connection reset"));
        }
        other => panic!("expected body error, got {other:?}"),
    }
    assert!(store.head(&Path::from("22.04/broken.iso")).await.is_err());
}

#[tokio::test]
async fn test_put_html_sets_text_html() {
    let (store, sink) = sink();
    let html = "<html><body>index</body></html>".to_string();

    let written = sink
        .put_html("index.html", html.clone())
        .await
        .expect("write succeeds");

    assert_eq!(written, html.len() as u64);
    let (bytes, content_type) = stored(&store, "index.html").await;
    assert_eq!(&bytes[..], html.as_bytes());
    assert_eq!(content_type.as_deref(), Some("text/html"));
}

#[tokio::test]
async fn test_put_html_overwrites_previous_index() {
    let (store, sink) = sink();

    sink.put_html("22.04/index.html", "old".to_string())
        .await
        .expect("first write");
    sink.put_html("22.04/index.html", "new".to_string())
        .await
        .expect("second write");

    let (bytes, _) = stored(&store, "22.04/index.html").await;
    assert_eq!(&bytes[..], b"new");
}

#[test]
fn test_from_credentials_binds_bucket() {
    let creds = StorageCredentials {
        access_key_id: "access".to_string(),
        secret_access_key: "secret".to_string(),
        endpoint_url: Some("https://acct.r2.cloudflarestorage.com".to_string()),
    };

    let sink = ObjectStoreSink::from_credentials(&creds, "my-bucket", "auto")
        .expect("builder accepts credentials");

    assert_eq!(sink.bucket(), "my-bucket");
}

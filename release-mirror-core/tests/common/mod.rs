#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use release_mirror_core::config::MirrorConfig;
use release_mirror_core::contract::{ByteStream, ObjectSink, StorageError, TEXT_HTML};
use std::collections::BTreeMap;
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Sink that drains every body into memory and remembers each write.
#[derive(Default)]
pub struct RecordingSink {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    writes: Mutex<Vec<String>>,
    fail_html_keys: Vec<String>,
}

impl RecordingSink {
    pub fn failing_html(keys: &[&str]) -> Self {
        Self {
            fail_html_keys: keys.iter().map(|k| k.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn objects(&self) -> BTreeMap<String, StoredObject> {
        self.objects.lock().unwrap().clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Every key written, in write order, including overwrites.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|o| String::from_utf8_lossy(&o.body).into_owned())
    }

    fn store(&self, key: &str, body: Vec<u8>, content_type: &str) -> u64 {
        let len = body.len() as u64;
        self.writes.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        len
    }
}

#[async_trait]
impl ObjectSink for RecordingSink {
    async fn put_stream(
        &self,
        key: &str,
        mut body: ByteStream,
        content_type: &str,
    ) -> Result<u64, StorageError> {
        let mut buf = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| StorageError::Body {
                written: buf.len() as u64,
                reason: e.to_string(),
            })?;
            buf.extend_from_slice(&chunk);
        }
        Ok(self.store(key, buf, content_type))
    }

    async fn put_html(&self, key: &str, html: String) -> Result<u64, StorageError> {
        if self.fail_html_keys.iter().any(|k| k == key) {
            return Err(StorageError::Backend {
                key: key.to_string(),
                reason: "injected failure".into(),
            });
        }
        Ok(self.store(key, html.into_bytes(), TEXT_HTML))
    }
}

pub fn listing_html(files: &[&str]) -> String {
    let mut html = String::from("<html><body><pre>\n<a href=\"../\">Parent Directory</a>\n");
    for f in files {
        html.push_str(&format!("<a href=\"{f}\">{f}</a>\n"));
    }
    html.push_str("</pre></body></html>");
    html
}

pub async fn mount_listing(server: &MockServer, version: &str, files: &[&str]) {
    Mock::given(method("GET"))
        .and(path(format!("/{version}/")))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(listing_html(files), "text/html"),
        )
        .mount(server)
        .await;
}

pub async fn mount_file(server: &MockServer, version: &str, file: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/{version}/{file}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route.to_string()))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn config_for(server: &MockServer, releases: &[&str]) -> MirrorConfig {
    let mut config = MirrorConfig::new(
        releases.iter().map(|r| r.to_string()).collect(),
        "my-bucket",
    );
    config.source_url = format!("{}/{{version}}/", server.uri());
    config.validate().expect("test config is valid")
}

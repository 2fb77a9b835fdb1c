// src/services/storage.rs
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{config::Builder as S3ConfigBuilder, primitives::ByteStream, Client as S3Client};
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },
    #[error("delete of {key} failed: {message}")]
    Delete { key: String, message: String },
}

/// Minimal object store surface: documents are only ever written and removed.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError>;
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;
    fn public_url(&self, key: &str) -> String;
}

/// S3-compatible bucket (Cloudflare R2 by default).
pub struct R2Store {
    client: S3Client,
    bucket: String,
    public_base_url: String,
}

impl R2Store {
    pub async fn connect(config: &StorageConfig) -> Self {
        let base_config = aws_config::defaults(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint)
            .region("auto")
            .credentials_provider(aws_sdk_s3::config::Credentials::new(
                config.access_key_id.clone(),
                config.secret_access_key.clone(),
                None,
                None,
                "static",
            ))
            .load()
            .await;

        let s3_config = S3ConfigBuilder::from(&base_config)
            .force_path_style(true)
            .build();

        Self {
            client: S3Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_base_url: config.public_base_url.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for R2Store {
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!(bucket = %self.bucket, key, "object uploaded");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }
}

/// Replaces anything outside `[A-Za-z0-9._-]` so the key stays URL safe.
pub fn sanitize_file_name(name: &str) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").expect("static pattern"));
    let cleaned = re.replace_all(name.trim(), "_").to_string();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

pub fn generate_object_key(id: Uuid, file_name: &str) -> String {
    format!("{}-{}", id, sanitize_file_name(file_name))
}

/// The object key is the last path segment of the stored document url.
pub fn object_key_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(|segment| urlencoding::decode(segment).map(|s| s.into_owned()).unwrap_or_else(|_| segment.to_string()))
}

#[cfg(test)]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-process store for tests.
    #[derive(Default)]
    pub struct MemoryStore {
        pub objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
        pub fail_uploads: bool,
    }

    #[async_trait]
    impl ObjectStore for MemoryStore {
        async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
            if self.fail_uploads {
                return Err(StorageError::Upload {
                    key: key.to_string(),
                    message: "simulated failure".to_string(),
                });
            }
            self.objects
                .lock()
                .unwrap()
                .insert(key.to_string(), (body, content_type.to_string()));
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://files.test/{}", key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    #[test]
    fn file_names_are_sanitised() {
        assert_eq!(sanitize_file_name("my report (v2).pdf"), "my_report__v2_.pdf");
        assert_eq!(sanitize_file_name("../etc/passwd"), ".._etc_passwd");
        assert_eq!(sanitize_file_name("   "), "file");
    }

    #[test]
    fn key_is_last_url_segment() {
        assert_eq!(
            object_key_from_url("https://cdn.example.com/docs/abc-file.pdf").as_deref(),
            Some("abc-file.pdf")
        );
        assert_eq!(
            object_key_from_url("https://cdn.example.com/abc-a%20b.txt?x=1").as_deref(),
            Some("abc-a b.txt")
        );
        assert_eq!(object_key_from_url("https://"), None);
    }

    #[test]
    fn generated_keys_prefix_the_id() {
        let id = Uuid::nil();
        assert_eq!(
            generate_object_key(id, "a b.txt"),
            "00000000-0000-0000-0000-000000000000-a_b.txt"
        );
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStore::default();
        store.put_object("k", b"data".to_vec(), "text/plain").await.unwrap();
        assert!(store.objects.lock().unwrap().contains_key("k"));
        store.delete_object("k").await.unwrap();
        assert!(store.objects.lock().unwrap().is_empty());
        assert_eq!(store.public_url("k"), "https://files.test/k");
    }
}

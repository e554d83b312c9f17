use async_trait::async_trait;
use reqwest::{header, Client};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage upload failed with status {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Durable object storage for generated media
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `path` and return the public URL
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError>;
}

fn validate_path(path: &str) -> Result<(), StorageError> {
    let is_safe = !path.is_empty()
        && Path::new(path)
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
    if is_safe {
        Ok(())
    } else {
        Err(StorageError::InvalidPath(path.to_string()))
    }
}

/// Files on local disk, served by the API under `/media`
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
    public_base: String,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_url: &str) -> Self {
        Self {
            root: root.into(),
            public_base: format!("{}/media", public_url.trim_end_matches('/')),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, StorageError> {
        validate_path(path)?;
        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;
        Ok(format!("{}/{}", self.public_base, path))
    }
}

/// Supabase storage bucket accessed with the service key
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(client: Client, base_url: &str, service_key: impl Into<String>, bucket: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        }
    }

    pub fn public_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, encode_path(path))
    }
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for SupabaseStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, StorageError> {
        validate_path(path)?;
        let response = self
            .client
            .post(format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, encode_path(path)))
            .header(header::AUTHORIZATION, format!("Bearer {}", self.service_key))
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StorageError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(self.public_url(path))
    }
}

impl std::fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .field("bucket", &self.bucket)
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_escaping_paths() {
        assert!(validate_path("posts/1-abc.png").is_ok());
        assert!(validate_path("../etc/passwd").is_err());
        assert!(validate_path("/abs/path.png").is_err());
        assert!(validate_path("").is_err());
    }

    #[tokio::test]
    async fn test_local_store_writes_file() {
        let root = std::env::temp_dir().join(format!("robogram-store-{}", uuid::Uuid::new_v4()));
        let store = LocalObjectStore::new(&root, "http://localhost:3000/");

        let url = store
            .put("avatars/1-abcdefgh.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/media/avatars/1-abcdefgh.png");
        let written = tokio::fs::read(root.join("avatars/1-abcdefgh.png")).await.unwrap();
        assert_eq!(written, vec![1, 2, 3]);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn test_supabase_public_url() {
        let store = SupabaseStore::new(Client::new(), "https://proj.supabase.co/", "sb-secret", "images");
        assert_eq!(
            store.public_url("posts/1-x.png"),
            "https://proj.supabase.co/storage/v1/object/public/images/posts/1-x.png"
        );
        assert!(!format!("{:?}", store).contains("sb-secret"));
        assert_eq!(encode_path("posts/a b.png"), "posts/a%20b.png");
    }
}

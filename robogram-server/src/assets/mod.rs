//! Copies generated images from short-lived provider URLs into durable storage

pub mod storage;

use anyhow::Context;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::{header, Client};
use std::sync::Arc;
use std::time::Duration;

use robogram_types::AssetFolder;

use crate::config::{Server, Storage};
use storage::{LocalObjectStore, ObjectStore, SupabaseStore};

pub use storage::StorageError;

#[derive(Clone)]
pub struct AssetMaterializer {
    client: Client,
    store: Arc<dyn ObjectStore>,
}

impl AssetMaterializer {
    pub fn new(client: Client, store: Arc<dyn ObjectStore>) -> Self {
        Self { client, store }
    }

    pub fn from_settings(storage: &Storage, server: &Server, timeout_secs: u64) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        let store: Arc<dyn ObjectStore> = match storage.backend.as_str() {
            "supabase" => {
                let url = storage
                    .supabase_url
                    .as_deref()
                    .context("SUPABASE_URL is required for the supabase storage backend")?;
                let key = storage
                    .supabase_service_key
                    .as_deref()
                    .context("SUPABASE_SERVICE_KEY is required for the supabase storage backend")?;
                Arc::new(SupabaseStore::new(client.clone(), url, key, storage.supabase_bucket.clone()))
            }
            "local" => Arc::new(LocalObjectStore::new(&storage.local_dir, &server.public_url)),
            other => anyhow::bail!("Unknown storage backend '{}'", other),
        };

        Ok(Self::new(client, store))
    }

    /// Download `source_url` and upload it under `folder`.
    /// Returns the durable URL, or `None` if either step fails.
    pub async fn materialize(&self, source_url: &str, folder: AssetFolder) -> Option<String> {
        let response = match self.client.get(source_url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to fetch generated asset: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::warn!("Generated asset fetch returned {}", response.status());
            return None;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_ascii_lowercase());

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Failed to read generated asset body: {}", e);
                return None;
            }
        };

        let extension = extension_for(content_type.as_deref());
        let path = object_path(folder, extension, &mut rand::thread_rng());
        let upload_type = content_type.unwrap_or_else(|| format!("image/{}", extension));

        match self.store.put(&path, bytes.to_vec(), &upload_type).await {
            Ok(url) => {
                tracing::debug!("Materialized asset at {}", url);
                Some(url)
            }
            Err(e) => {
                tracing::warn!("Failed to upload asset {}: {}", path, e);
                None
            }
        }
    }

    /// Like [`materialize`](Self::materialize) but falls back to the
    /// provider URL so the caller always has something to store.
    pub async fn persist_or_fallback(&self, source_url: &str, folder: AssetFolder) -> String {
        match self.materialize(source_url, folder).await {
            Some(url) => url,
            None => {
                tracing::warn!("Keeping ephemeral URL for {} asset", folder.as_str());
                source_url.to_string()
            }
        }
    }
}

fn extension_for(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some("image/jpeg") | Some("image/jpg") => "jpg",
        Some("image/webp") => "webp",
        Some("image/gif") => "gif",
        _ => "png",
    }
}

/// `<folder>/<unix_millis>-<8 random alphanumerics>.<ext>`
fn object_path<R: Rng + ?Sized>(folder: AssetFolder, extension: &str, rng: &mut R) -> String {
    let suffix: String = rng
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    format!(
        "{}/{}-{}.{}",
        folder.as_str(),
        Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}

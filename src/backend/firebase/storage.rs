use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;
use tracing::{debug, instrument};

use super::FirebaseBackend;
use crate::backend::{BackendError, BlobStore, StoredBlob};

/// Object names are a single path segment in the storage API, so `/` is escaped too
const OBJECT_NAME: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

impl FirebaseBackend {
    fn object_url(&self, path: &str) -> String {
        format!("{}/{}", self.storage_base, utf8_percent_encode(path, OBJECT_NAME))
    }

    fn download_url_for(&self, path: &str, token: &str) -> String {
        format!("{}?alt=media&token={}", self.object_url(path), token)
    }
}

/// Resolve a blob reference (download URL or object path) to the object path
pub(crate) fn object_path(reference: &str) -> Result<String, BackendError> {
    if !reference.starts_with("http://") && !reference.starts_with("https://") {
        return Ok(reference.trim_start_matches('/').to_string());
    }

    let encoded = reference
        .split_once("/o/")
        .map(|(_, rest)| rest.split('?').next().unwrap_or(rest))
        .filter(|name| !name.is_empty())
        .ok_or_else(|| BackendError::InvalidResponse(format!("not a storage object URL: {}", reference)))?;

    percent_decode_str(encoded)
        .decode_utf8()
        .map(|name| name.into_owned())
        .map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

/// First download token of an object metadata resource
fn first_token(metadata: &Value) -> Result<String, BackendError> {
    metadata
        .get("downloadTokens")
        .and_then(Value::as_str)
        .and_then(|tokens| tokens.split(',').next())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BackendError::InvalidResponse("object has no download token".to_string()))
}

#[async_trait]
impl BlobStore for FirebaseBackend {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<StoredBlob, BackendError> {
        let request = self
            .client
            .post(&self.storage_base)
            .query(&[("uploadType", "media"), ("name", path)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        let metadata = self.execute(request).await?;
        let token = first_token(&metadata)?;
        debug!("Uploaded blob");

        Ok(StoredBlob {
            path: path.to_string(),
            download_url: self.download_url_for(path, &token),
        })
    }

    #[instrument(skip(self))]
    async fn download_url(&self, reference: &str) -> Result<String, BackendError> {
        let path = object_path(reference)?;
        let metadata = self.execute(self.client.get(self.object_url(&path))).await?;
        let token = first_token(&metadata)?;
        Ok(self.download_url_for(&path, &token))
    }

    #[instrument(skip(self))]
    async fn delete(&self, reference: &str) -> Result<(), BackendError> {
        let path = object_path(reference)?;
        self.execute(self.client.delete(self.object_url(&path))).await?;
        debug!(path = %path, "Deleted blob");
        Ok(())
    }
}

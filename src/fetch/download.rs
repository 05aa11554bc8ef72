use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, info};
use url::Url;

use crate::error::{EtlError, EtlResult};

/// Download `url` into `dest`, replacing any file already there.
/// Returns the number of bytes written.
pub async fn download_export(client: &Client, url: &Url, dest: &Path) -> EtlResult<u64> {
    let location = url.as_str();

    if fs::try_exists(dest).await.unwrap_or(false) {
        info!(path = %dest.display(), "replacing existing export");
        fs::remove_file(dest)
            .await
            .map_err(|e| EtlError::fetch(dest.display().to_string(), format!("removing old file: {}", e)))?;
    }
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| EtlError::fetch(parent.display().to_string(), e))?;
    }

    info!(url = %location, "downloading");
    let resp = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| EtlError::fetch(location, e))?
        .error_for_status()
        .map_err(|e| EtlError::fetch(location, e))?;

    let mut file = fs::File::create(dest)
        .await
        .map_err(|e| EtlError::fetch(dest.display().to_string(), e))?;
    let mut body = resp.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| EtlError::fetch(location, e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| EtlError::fetch(dest.display().to_string(), e))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| EtlError::fetch(dest.display().to_string(), e))?;

    debug!(path = %dest.display(), bytes = written, "download complete");
    Ok(written)
}

use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use anyhow::Context as _;
use bytes::Bytes;
use futures::Stream;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::storage::StorageClient;

pub const MAX_FILE_BYTES: usize = 2 * 1024 * 1024;
pub const MAX_FILES: usize = 6;

pub struct UploadItem {
    pub file_name: String,
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Percentage of files stored so far, `0..=100`.
    Progress(u8),
    /// Durable URLs, in input order.
    Completed(Vec<String>),
    Failed(String),
}

/// A running batch upload, observed as a finite stream of [`UploadEvent`]s that
/// ends right after `Completed` or `Failed`. Dropping it cancels the upload.
///
/// A cancelled upload emits no terminal event; the stream ends once every
/// object stored so far has been removed again.
pub struct UploadTask {
    events: ReceiverStream<UploadEvent>,
    cancel: CancellationToken,
}

impl UploadTask {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for UploadTask {
    type Item = UploadEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.events).poll_next(cx)
    }
}

impl Drop for UploadTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub fn upload_images(
    storage: Arc<dyn StorageClient>,
    owner_id: Uuid,
    items: Vec<UploadItem>,
) -> UploadTask {
    let (tx, rx) = mpsc::channel(items.len() + 2);
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        let event = match run_upload(storage.as_ref(), owner_id, items, &tx, &token).await {
            Ok(Some(urls)) => UploadEvent::Completed(urls),
            Ok(None) => {
                debug!(%owner_id, "image upload cancelled");
                return;
            }
            Err(e) => {
                warn!(error = ?e, %owner_id, "image upload failed");
                UploadEvent::Failed(format!("{e:#}"))
            }
        };
        let _ = tx.send(event).await;
    });
    UploadTask {
        events: ReceiverStream::new(rx),
        cancel,
    }
}

/// Stores every item in order. `Ok(None)` means the upload was cancelled and
/// everything it had stored was removed.
async fn run_upload(
    storage: &dyn StorageClient,
    owner_id: Uuid,
    items: Vec<UploadItem>,
    tx: &mpsc::Sender<UploadEvent>,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<Vec<String>>> {
    anyhow::ensure!(!items.is_empty(), "no images provided");

    let _ = tx.send(UploadEvent::Progress(0)).await;
    let total = items.len();
    let mut keys: Vec<String> = Vec::with_capacity(total);

    for (i, item) in items.into_iter().enumerate() {
        let key = object_key(owner_id, &item.file_name, &item.content_type);
        let stored = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                // the interrupted put may or may not have landed
                keys.push(key);
                rollback(storage, &keys).await;
                return Ok(None);
            }
            res = storage.put_object(&key, item.body, &item.content_type) => {
                res.with_context(|| format!("put_object {}", key))
            }
        };
        if let Err(e) = stored {
            rollback(storage, &keys).await;
            return Err(e);
        }
        keys.push(key);

        let pct = ((i + 1) * 100 / total) as u8;
        debug!(%owner_id, progress = pct, "image stored");
        let _ = tx.send(UploadEvent::Progress(pct)).await;
    }

    Ok(Some(keys.iter().map(|k| storage.public_url(k)).collect()))
}

async fn rollback(storage: &dyn StorageClient, keys: &[String]) {
    for key in keys {
        if let Err(e) = storage.delete_object(key).await {
            warn!(error = ?e, %key, "failed to remove partially uploaded image");
        }
    }
}

fn object_key(owner_id: Uuid, file_name: &str, content_type: &str) -> String {
    let ext = ext_from_mime(content_type)
        .or_else(|| ext_from_name(file_name))
        .unwrap_or("bin");
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    format!("listings/{}/{}_{}.{}", owner_id, millis, Uuid::new_v4(), ext)
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

fn ext_from_name(name: &str) -> Option<&'static str> {
    let (_, ext) = name.rsplit_once('.')?;
    ext_from_mime(&format!("image/{}", ext.to_ascii_lowercase()))
}

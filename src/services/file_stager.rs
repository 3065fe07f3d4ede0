//! FileStager: durable on-disk storage for uploaded résumé files.
//!
//! Files land flat under `base_path` as `<uuid-v4><original extension>`. Bytes
//! are streamed into a temporary file, fsynced and renamed into place, so a
//! returned path always points at a fully written file.

use crate::services::error::{ServiceError, ServiceResult};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut, stream};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_EXTENSION_LEN: usize = 16;

/// Outcome of a successful `save`.
#[derive(Debug, Clone)]
pub struct StagedFile {
    pub path: PathBuf,
    pub generated_name: String,
    pub size: i64,
    /// MD5 hex digest of the written bytes.
    pub checksum: String,
}

#[derive(Clone, Debug)]
pub struct FileStager {
    base_path: PathBuf,
}

impl FileStager {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Store an in-memory payload.
    pub async fn save(&self, bytes: Bytes, original_filename: &str) -> ServiceResult<StagedFile> {
        self.save_stream(stream::once(async move { Ok(bytes) }), original_filename)
            .await
    }

    /// Stream a payload to disk.
    ///
    /// Empty input is rejected with `EmptyInput` before any file is created.
    /// On any write failure the temporary file is removed and a storage
    /// error returned.
    pub async fn save_stream<S>(&self, stream: S, original_filename: &str) -> ServiceResult<StagedFile>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        pin_mut!(stream);

        // Hold back file creation until the first non-empty chunk shows up.
        let first = loop {
            match stream.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
                Some(Err(err)) => return Err(ServiceError::Storage(err)),
                None => return Err(ServiceError::EmptyInput),
            }
        };

        fs::create_dir_all(&self.base_path).await?;
        let generated_name = generated_name(original_filename);
        let final_path = self.base_path.join(&generated_name);
        let tmp_path = self.base_path.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size: i64 = 0;
        let mut digest = Context::new();
        let mut pending = Some(Ok(first));
        loop {
            let chunk_res = match pending.take() {
                Some(chunk_res) => chunk_res,
                None => match stream.next().await {
                    Some(chunk_res) => chunk_res,
                    None => break,
                },
            };
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(ServiceError::Storage(err));
                }
            };
            size += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(ServiceError::Storage(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::Storage(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::Storage(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ServiceError::Storage(err));
        }

        debug!("staged {} ({} bytes)", final_path.display(), size);
        Ok(StagedFile {
            path: final_path,
            generated_name,
            size,
            checksum: format!("{:x}", digest.compute()),
        })
    }

    /// Open a staged file for reading.
    pub async fn open(&self, path: impl AsRef<Path>) -> ServiceResult<File> {
        File::open(path.as_ref()).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ServiceError::not_found("Resume file")
            } else {
                ServiceError::Storage(err)
            }
        })
    }

    /// Remove a staged file. A file that is already gone is not an error.
    pub async fn remove(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!("removed physical file {}", path.display());
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", path.display());
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// `<uuid-v4><.ext>`, keeping the original extension as sent (case included)
/// when it is short and alphanumeric. Anything else would end up in a path
/// on disk, so it is dropped.
fn generated_name(original_filename: &str) -> String {
    let extension = Path::new(original_filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    format!("{}{}", Uuid::new_v4(), extension)
}

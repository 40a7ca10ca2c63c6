use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use crate::error::Result;
use crate::types::StagedFile;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Source of temporary-file names.
///
/// Tokens must be filesystem-safe and unguessable (128 bits of randomness in
/// the default implementation). Tests inject a deterministic source.
pub trait TokenSource: Send + Sync {
    fn issue(&self) -> String;
}

/// Default token source: UUIDv4 in its compact hex form.
pub struct RandomTokens;

impl TokenSource for RandomTokens {
    fn issue(&self) -> String {
        Uuid::new_v4().simple().to_string()
    }
}

/// Receives uploaded byte streams into temporary files.
///
/// Each file is staged independently; a failed stage cleans up its own
/// partial file and leaves siblings alone. Cleaning up the whole batch when
/// the commit aborts is the pipeline's job, not the staging area's.
pub struct StagingArea {
    temp_dir: PathBuf,
    tokens: Arc<dyn TokenSource>,
}

impl StagingArea {
    pub fn new(temp_dir: impl Into<PathBuf>) -> Self {
        Self::with_tokens(temp_dir, Arc::new(RandomTokens))
    }

    pub fn with_tokens(temp_dir: impl Into<PathBuf>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            temp_dir: temp_dir.into(),
            tokens,
        }
    }

    /// Streams `reader` to a fresh temporary path, hashing while writing.
    ///
    /// The whole file is never held in memory. The returned descriptor is
    /// transient: the commit pipeline either promotes the temp file to the
    /// permanent store or deletes it.
    pub async fn stage<R: AsyncRead>(&self, reader: R, original_name: &str) -> Result<StagedFile> {
        fs::create_dir_all(&self.temp_dir).await?;
        let temp_path = self.temp_dir.join(self.tokens.issue());

        match self.write_and_hash(reader, &temp_path).await {
            Ok(hash) => Ok(StagedFile {
                name: original_name.to_string(),
                hash,
                temp_path,
            }),
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            "failed to remove partial staging file {}: {cleanup}",
                            temp_path.display()
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn write_and_hash<R: AsyncRead>(&self, reader: R, temp_path: &Path) -> Result<String> {
        let mut reader = std::pin::pin!(reader);
        let mut file = File::create(temp_path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; COPY_BUF_SIZE];

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            file.write_all(&buf[..n]).await?;
        }

        file.sync_all().await?;
        Ok(hex::encode(hasher.finalize()))
    }
}

use std::{
    io::ErrorKind,
    path::{Component, Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use thiserror::Error;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid video name '{0}'")]
    InvalidName(String),
    #[error("video not found")]
    NotFound,
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

const TEMP_PREFIX: &str = ".upload-";

static UPLOAD_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A video as currently present on disk.
#[derive(Debug, Clone)]
pub struct StoredVideo {
    pub name: String,
    pub size: u64,
    pub created: DateTime<Utc>,
}

/// The uploads directory. Holds no index: every call reads the filesystem.
#[derive(Debug, Clone)]
pub struct VideoStore {
    root: PathBuf,
}

/// Checks that `name` addresses a single visible entry directly under the store root.
fn validate_name(name: &str) -> StoreResult<()> {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !single || name.starts_with('.') || name.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn map_not_found(e: std::io::Error) -> StoreError {
    if e.kind() == ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        StoreError::Io(e)
    }
}

fn creation_time(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .unwrap_or(SystemTime::UNIX_EPOCH)
        .into()
}

impl VideoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the root if needed and removes temporary files left by interrupted uploads.
    pub async fn ensure_root(&self) -> StoreResult<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let mut read_dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if !entry.file_name().to_string_lossy().starts_with(TEMP_PREFIX) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => info!("removed stale upload '{}'", entry.path().display()),
                Err(e) if e.kind() == ErrorKind::NotFound => (),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn path_of(&self, name: &str) -> StoreResult<PathBuf> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Lists visible regular files, newest first.
    pub async fn list(&self) -> StoreResult<Vec<StoredVideo>> {
        let mut videos = vec![];
        let mut read_dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                // deleted between read_dir and stat
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            if !metadata.is_file() {
                continue;
            }
            videos.push(StoredVideo {
                name,
                size: metadata.len(),
                created: creation_time(&metadata),
            });
        }
        videos.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| a.name.cmp(&b.name)));
        Ok(videos)
    }

    /// Opens a stored video for reading, returning the handle and its current length.
    pub async fn open(&self, name: &str) -> StoreResult<(File, u64)> {
        let path = self.path_of(name)?;
        let file = File::open(&path).await.map_err(map_not_found)?;
        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound);
        }
        Ok((file, metadata.len()))
    }

    pub async fn delete(&self, name: &str) -> StoreResult<()> {
        let path = self.path_of(name)?;
        let metadata = tokio::fs::metadata(&path).await.map_err(map_not_found)?;
        if !metadata.is_file() {
            return Err(StoreError::NotFound);
        }
        tokio::fs::remove_file(&path).await.map_err(map_not_found)
    }

    /// Starts writing a new video whose stored name derives from `original_name`.
    pub async fn begin_upload(&self, original_name: &str) -> StoreResult<PendingUpload> {
        let (stem, extension) = split_upload_name(original_name)?;
        let temp_path = self.root.join(format!(
            "{TEMP_PREFIX}{}-{}",
            Utc::now().timestamp_millis(),
            UPLOAD_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .await?;
        Ok(PendingUpload {
            root: self.root.clone(),
            stem,
            extension,
            temp_path,
            file: Some(file),
            written: 0,
            finished: false,
        })
    }
}

/// Splits the final path component of a client-supplied filename into stem and extension (with dot).
fn split_upload_name(original_name: &str) -> StoreResult<(String, String)> {
    let file_name = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|x| x.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|x| format!(".{}", x.to_string_lossy()))
        .unwrap_or_default();
    let candidate = format!("{stem}_0{extension}");
    if stem.is_empty() || validate_name(&candidate).is_err() {
        return Err(StoreError::InvalidName(original_name.to_string()));
    }
    Ok((stem, extension))
}

/// An upload being written to a hidden temporary file in the store.
///
/// Dropping it unfinished removes the temporary file in the background.
pub struct PendingUpload {
    root: PathBuf,
    stem: String,
    extension: String,
    temp_path: PathBuf,
    file: Option<File>,
    written: u64,
    finished: bool,
}

impl PendingUpload {
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, chunk: &[u8]) -> StoreResult<()> {
        let Some(file) = self.file.as_mut() else {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::Other,
                "upload already closed",
            )));
        };
        file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flushes and links the upload as `<stem>_<unix millis><ext>`, bumping the timestamp until the name is free.
    ///
    /// The hard link fails rather than replacing an existing file, so concurrent commits never share a name.
    pub async fn commit(mut self) -> StoreResult<StoredVideo> {
        if let Some(mut file) = self.file.take() {
            file.flush().await?;
        }
        let mut timestamp = Utc::now().timestamp_millis();
        let (name, path) = loop {
            let name = format!("{}_{timestamp}{}", self.stem, self.extension);
            let path = self.root.join(&name);
            match tokio::fs::hard_link(&self.temp_path, &path).await {
                Ok(()) => break (name, path),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => timestamp += 1,
                Err(e) => return Err(e.into()),
            }
        };
        self.finished = true;
        if let Err(e) = tokio::fs::remove_file(&self.temp_path).await {
            error!(
                "failed to remove upload staging file '{}': {e}",
                self.temp_path.display()
            );
        }
        let metadata = tokio::fs::metadata(&path).await?;
        Ok(StoredVideo {
            name,
            size: metadata.len(),
            created: creation_time(&metadata),
        })
    }

    /// Removes the temporary file of an upload that will not be committed.
    pub async fn discard(mut self) {
        self.finished = true;
        drop(self.file.take());
        remove_incomplete(&self.temp_path, tokio::fs::remove_file(&self.temp_path).await);
    }
}

fn remove_incomplete(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => warn!("discarded incomplete upload '{}'", path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => (),
        Err(e) => error!("failed to remove incomplete upload '{}': {e}", path.display()),
    }
}

// covers uploads cancelled mid-request; error paths go through `discard`
impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        drop(self.file.take());
        let path = self.temp_path.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let result = tokio::fs::remove_file(&path).await;
                    remove_incomplete(&path, result);
                });
            }
            Err(_) => {
                let result = std::fs::remove_file(&path);
                remove_incomplete(&path, result);
            }
        }
    }
}

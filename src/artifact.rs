//! Transient artifact management: scratch files with guaranteed, exactly-once
//! cleanup.
//!
//! Every file the pipeline materialises (page images handed to OCR, the
//! finished docx/xlsx/txt) is allocated from an [`ArtifactStore`]. Each
//! allocation gets an unguessable name, created with `O_EXCL` semantics by
//! [`tempfile`], so concurrent runs sharing one scratch directory can never
//! collide and no lock is needed on the namespace.
//!
//! ## Lifecycle
//!
//! ```text
//! allocate ──▶ Live { readers: 0 } ──open──▶ Live { readers: n } ──close──┐
//!    │                  │                                               │
//!    │          ttl elapsed / handle dropped            AfterRead: now   │
//!    │                  ▼                         Delayed(g): after g ◀──┘
//!    └────────────▶  Released (file removed, exactly once)
//! ```
//!
//! The file is removed by whichever of these fires first; the state machine
//! makes every later attempt a no-op. A live reader always defers removal.

use crate::config::ReleasePolicy;
use crate::error::TranscodeError;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};
use std::task::{Context, Poll};
use std::time::Duration;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio::task::AbortHandle;
use tracing::{debug, warn};

/// A scratch namespace shared by concurrent conversion runs.
///
/// Cheap to clone; all clones share the same directory and counters.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    inner: Arc<StoreInner>,
}

#[derive(Debug)]
struct StoreInner {
    root: PathBuf,
    ttl: Duration,
    live: AtomicUsize,
    released: AtomicUsize,
}

impl ArtifactStore {
    /// Open (creating if needed) a scratch namespace rooted at `root`.
    ///
    /// `ttl` is the safety net: an artifact nobody is reading is removed this
    /// long after allocation even if its owner never opens or drops it.
    pub fn new(root: impl Into<PathBuf>, ttl: Duration) -> Result<Self, TranscodeError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            TranscodeError::assembly(format!("creating scratch dir {}", root.display()), e)
        })?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                root,
                ttl,
                live: AtomicUsize::new(0),
                released: AtomicUsize::new(0),
            }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Artifacts allocated but not yet removed.
    pub fn live_count(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    /// Artifacts removed since the store was created.
    pub fn released_count(&self) -> usize {
        self.inner.released.load(Ordering::SeqCst)
    }

    /// Allocate an empty, uniquely named file `<label>-<random>.<ext>`.
    pub fn allocate(
        &self,
        label: &str,
        ext: &str,
        policy: ReleasePolicy,
    ) -> Result<TransientArtifact, TranscodeError> {
        let named = tempfile::Builder::new()
            .prefix(&format!("{label}-"))
            .suffix(&format!(".{ext}"))
            .rand_bytes(16)
            .tempfile_in(&self.inner.root)
            .map_err(|e| TranscodeError::assembly("allocating scratch artifact", e))?;
        let (_file, temp_path) = named.into_parts();

        let path = temp_path.to_path_buf();
        let id = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.inner.live.fetch_add(1, Ordering::SeqCst);
        debug!(artifact = %id, ?policy, "allocated");

        let lease = Arc::new(Lease {
            id,
            path,
            policy,
            store: Arc::clone(&self.inner),
            state: Mutex::new(LeaseState::Live {
                temp_path,
                readers: 0,
            }),
            ttl_timer: OnceLock::new(),
        });
        if let Some(timer) =
            spawn_release_timer(Arc::downgrade(&lease), self.inner.ttl, "ttl elapsed")
        {
            // Set before anyone else can see the lease.
            let _ = lease.ttl_timer.set(timer);
        }

        Ok(TransientArtifact { lease })
    }
}

/// A handle to one scratch file.
///
/// Dropping every handle while no reader is open removes the file
/// immediately, which covers aborted requests and error paths.
#[derive(Debug)]
pub struct TransientArtifact {
    lease: Arc<Lease>,
}

impl TransientArtifact {
    /// Unique name within the store's namespace.
    pub fn id(&self) -> &str {
        &self.lease.id
    }

    pub fn path(&self) -> &Path {
        &self.lease.path
    }

    pub fn policy(&self) -> ReleasePolicy {
        self.lease.policy
    }

    pub fn is_released(&self) -> bool {
        matches!(*self.lease.lock(), LeaseState::Released)
    }

    /// Size of the artifact on disk.
    pub fn len(&self) -> io::Result<u64> {
        std::fs::metadata(&self.lease.path).map(|m| m.len())
    }

    pub fn is_empty(&self) -> io::Result<bool> {
        self.len().map(|n| n == 0)
    }

    /// Open a reader. Removal is deferred until the reader is closed.
    pub async fn open(&self) -> Result<ArtifactStream, TranscodeError> {
        self.lease.begin_read()?;
        match tokio::fs::File::open(&self.lease.path).await {
            Ok(file) => Ok(ArtifactStream {
                file: Some(file),
                lease: Arc::clone(&self.lease),
            }),
            Err(e) => {
                self.lease.end_read();
                Err(TranscodeError::assembly(
                    format!("opening artifact {}", self.lease.id),
                    e,
                ))
            }
        }
    }

    /// Read the whole artifact into memory through a regular reader.
    pub async fn read_all(&self) -> Result<Vec<u8>, TranscodeError> {
        let mut stream = self.open().await?;
        let mut buf = Vec::new();
        stream
            .read_to_end(&mut buf)
            .await
            .map_err(|e| TranscodeError::assembly(format!("reading artifact {}", self.id()), e))?;
        Ok(buf)
    }

    /// Copy the artifact to `dest` without a runtime. Counts as one complete
    /// read for the release policy.
    pub fn copy_to(&self, dest: &Path) -> Result<u64, TranscodeError> {
        self.lease.begin_read()?;
        let copied = std::fs::copy(&self.lease.path, dest);
        self.lease.end_read();
        copied.map_err(|e| {
            TranscodeError::assembly(format!("copying artifact to {}", dest.display()), e)
        })
    }

    /// Remove the file now unless a reader is open. Returns `true` if this
    /// call performed the removal.
    pub fn release(&self) -> bool {
        self.lease.release_if_idle("explicit release")
    }
}

/// Byte stream over a [`TransientArtifact`].
///
/// Reaching end-of-file or dropping the stream closes the reader; the
/// artifact's [`ReleasePolicy`] then decides when the file goes away.
#[derive(Debug)]
pub struct ArtifactStream {
    file: Option<tokio::fs::File>,
    lease: Arc<Lease>,
}

impl ArtifactStream {
    fn close(&mut self) {
        if self.file.take().is_some() {
            self.lease.end_read();
        }
    }
}

impl AsyncRead for ArtifactStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        let Some(file) = this.file.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let before = buf.filled().len();
        match Pin::new(file).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {
                if buf.filled().len() == before && buf.remaining() > 0 {
                    // EOF: the consumer has everything.
                    this.close();
                }
                Poll::Ready(Ok(()))
            }
            other => other,
        }
    }
}

impl Drop for ArtifactStream {
    fn drop(&mut self) {
        self.close();
    }
}

// ── Lease ────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum LeaseState {
    Live { temp_path: TempPath, readers: usize },
    Released,
}

#[derive(Debug)]
struct Lease {
    id: String,
    path: PathBuf,
    policy: ReleasePolicy,
    store: Arc<StoreInner>,
    state: Mutex<LeaseState>,
    ttl_timer: OnceLock<AbortHandle>,
}

impl Lease {
    fn lock(&self) -> std::sync::MutexGuard<'_, LeaseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_read(&self) -> Result<(), TranscodeError> {
        match &mut *self.lock() {
            LeaseState::Live { readers, .. } => {
                *readers += 1;
                Ok(())
            }
            LeaseState::Released => Err(TranscodeError::ArtifactReleased {
                id: self.id.clone(),
            }),
        }
    }

    fn end_read(self: &Arc<Self>) {
        let idle = match &mut *self.lock() {
            LeaseState::Live { readers, .. } => {
                *readers = readers.saturating_sub(1);
                *readers == 0
            }
            LeaseState::Released => false,
        };
        if !idle {
            return;
        }
        match self.policy {
            ReleasePolicy::AfterRead => {
                self.release_if_idle("read complete");
            }
            ReleasePolicy::Delayed(grace) => {
                // Holds a strong reference so the grace period survives the
                // owner dropping its handle right after the download.
                let lease = Arc::clone(self);
                spawn_or_release(self, move || async move {
                    tokio::time::sleep(grace).await;
                    lease.release_if_idle("grace period elapsed");
                });
            }
        }
    }

    /// Take the file out of the `Live` state if nobody is reading it.
    fn release_if_idle(&self, reason: &str) -> bool {
        let taken = {
            let mut state = self.lock();
            if matches!(*state, LeaseState::Live { readers: 0, .. }) {
                match std::mem::replace(&mut *state, LeaseState::Released) {
                    LeaseState::Live { temp_path, .. } => Some(temp_path),
                    LeaseState::Released => None,
                }
            } else {
                None
            }
        };
        match taken {
            Some(temp_path) => {
                self.remove(temp_path, reason);
                true
            }
            None => false,
        }
    }

    fn remove(&self, temp_path: TempPath, reason: &str) {
        if let Some(timer) = self.ttl_timer.get() {
            timer.abort();
        }
        if let Err(e) = temp_path.close() {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(artifact = %self.id, "failed to remove scratch file: {e}");
            }
        }
        self.store.live.fetch_sub(1, Ordering::SeqCst);
        self.store.released.fetch_add(1, Ordering::SeqCst);
        debug!(artifact = %self.id, reason, "released");
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let state = std::mem::replace(
            self.state.get_mut().unwrap_or_else(PoisonError::into_inner),
            LeaseState::Released,
        );
        if let LeaseState::Live { temp_path, .. } = state {
            self.remove(temp_path, "last handle dropped");
        }
    }
}

/// Returns a handle to abort the timer once the lease is released some other
/// way.
fn spawn_release_timer(
    lease: Weak<Lease>,
    after: Duration,
    reason: &'static str,
) -> Option<AbortHandle> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            let task = handle.spawn(async move {
                tokio::time::sleep(after).await;
                if let Some(lease) = lease.upgrade() {
                    lease.release_if_idle(reason);
                }
            });
            Some(task.abort_handle())
        }
        Err(_) => {
            debug!("no tokio runtime; ttl safety net disabled, release on drop only");
            None
        }
    }
}

/// Spawn a deferred release, or release right away when there is no runtime
/// to run the timer on.
fn spawn_or_release<F, Fut>(lease: &Arc<Lease>, task: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(task());
        }
        Err(_) => {
            warn!(artifact = %lease.id, "no tokio runtime for delayed release; releasing now");
            lease.release_if_idle("no runtime");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    fn store(dir: &TempDir, ttl: Duration) -> ArtifactStore {
        ArtifactStore::new(dir.path().join("scratch"), ttl).unwrap()
    }

    fn entries(store: &ArtifactStore) -> usize {
        std::fs::read_dir(store.root()).unwrap().count()
    }

    async fn write(artifact: &TransientArtifact, bytes: &[u8]) {
        let mut f = tokio::fs::File::create(artifact.path()).await.unwrap();
        f.write_all(bytes).await.unwrap();
        f.flush().await.unwrap();
    }

    #[tokio::test]
    async fn after_read_releases_on_eof() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(60));
        let artifact = store.allocate("run-out", "txt", ReleasePolicy::AfterRead).unwrap();
        write(&artifact, b"hello").await;

        let bytes = artifact.read_all().await.unwrap();
        assert_eq!(bytes, b"hello");
        assert!(artifact.is_released());
        assert_eq!(entries(&store), 0);
        assert_eq!(store.released_count(), 1);
        assert!(matches!(
            artifact.open().await,
            Err(TranscodeError::ArtifactReleased { .. })
        ));
    }

    #[tokio::test]
    async fn dropping_unread_handle_releases() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(60));
        let artifact = store
            .allocate("run-out", "xlsx", ReleasePolicy::Delayed(Duration::from_secs(30)))
            .unwrap();
        assert_eq!(entries(&store), 1);
        drop(artifact);
        assert_eq!(entries(&store), 0);
        assert_eq!(store.live_count(), 0);
    }

    #[tokio::test]
    async fn ttl_releases_never_opened_artifact() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_millis(50));
        let artifact = store.allocate("run-out", "txt", ReleasePolicy::AfterRead).unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(artifact.is_released());
        assert_eq!(entries(&store), 0);
    }

    #[tokio::test]
    async fn open_reader_defers_ttl() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_millis(50));
        let artifact = store.allocate("run-out", "txt", ReleasePolicy::AfterRead).unwrap();
        write(&artifact, b"slow download").await;

        let mut stream = artifact.open().await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!artifact.is_released(), "removed under an open reader");

        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"slow download");
        assert!(artifact.is_released());
    }

    #[tokio::test]
    async fn delayed_policy_allows_reopen_within_grace() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(60));
        let artifact = store
            .allocate("run-out", "docx", ReleasePolicy::Delayed(Duration::from_millis(100)))
            .unwrap();
        write(&artifact, b"abc").await;

        assert_eq!(artifact.read_all().await.unwrap(), b"abc");
        assert!(!artifact.is_released());
        // A retried download within the grace period still works.
        assert_eq!(artifact.read_all().await.unwrap(), b"abc");

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(artifact.is_released());
        assert_eq!(entries(&store), 0);
        assert_eq!(store.released_count(), 1);
    }

    #[tokio::test]
    async fn delayed_grace_survives_handle_drop() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(60));
        let artifact = store
            .allocate("run-out", "txt", ReleasePolicy::Delayed(Duration::from_millis(100)))
            .unwrap();
        write(&artifact, b"x").await;
        artifact.read_all().await.unwrap();
        drop(artifact);

        assert_eq!(entries(&store), 1, "grace period should keep the file");
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(entries(&store), 0);
    }

    #[test]
    fn copy_without_runtime_releases_after_read() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(60));
        let artifact = store
            .allocate("run-out", "txt", ReleasePolicy::Delayed(Duration::from_secs(5)))
            .unwrap();
        std::fs::write(artifact.path(), b"sync").unwrap();

        let dest = dir.path().join("out.txt");
        assert_eq!(artifact.copy_to(&dest).unwrap(), 4);
        assert_eq!(std::fs::read(&dest).unwrap(), b"sync");
        // No runtime to run the grace timer on.
        assert!(artifact.is_released());
    }

    #[tokio::test]
    async fn release_happens_exactly_once() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_millis(20));
        let artifact = store.allocate("run-out", "txt", ReleasePolicy::AfterRead).unwrap();
        assert!(artifact.release());
        assert!(!artifact.release());
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(artifact);
        assert_eq!(store.released_count(), 1);
        assert_eq!(store.live_count(), 0);
    }

    async fn ttl_timer_finished(artifact: &TransientArtifact) -> bool {
        let timer = artifact.lease.ttl_timer.get().unwrap();
        for _ in 0..100 {
            if timer.is_finished() {
                return true;
            }
            tokio::task::yield_now().await;
        }
        false
    }

    #[tokio::test]
    async fn release_cancels_ttl_timer() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(3600));
        let artifact = store.allocate("run-out", "txt", ReleasePolicy::AfterRead).unwrap();
        assert!(!ttl_timer_finished(&artifact).await);

        write(&artifact, b"done").await;
        artifact.read_all().await.unwrap();

        assert!(artifact.is_released());
        assert!(ttl_timer_finished(&artifact).await);
    }

    #[tokio::test]
    async fn dropping_handle_cancels_ttl_timer() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(3600));
        let artifact = store.allocate("run-out", "txt", ReleasePolicy::AfterRead).unwrap();
        let timer = artifact.lease.ttl_timer.get().unwrap().clone();

        drop(artifact);
        for _ in 0..100 {
            if timer.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(timer.is_finished());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_never_collide() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir, Duration::from_secs(60));

        let mut tasks = Vec::new();
        for worker in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                let mut held = Vec::new();
                for i in 0..25 {
                    // Same label everywhere: uniqueness must come from the
                    // random component alone.
                    let a = store.allocate("run", "bin", ReleasePolicy::AfterRead).unwrap();
                    if (worker + i) % 3 == 0 {
                        tokio::task::yield_now().await;
                    }
                    held.push(a);
                }
                held
            }));
        }

        let mut ids = HashSet::new();
        let mut all = Vec::new();
        for task in tasks {
            for a in task.await.unwrap() {
                assert!(ids.insert(a.id().to_string()), "duplicate id {}", a.id());
                all.push(a);
            }
        }
        assert_eq!(ids.len(), 400);
        assert_eq!(entries(&store), 400);
        drop(all);
        assert_eq!(entries(&store), 0);
    }
}

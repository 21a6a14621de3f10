//! Snapshot channel over a shared-memory segment guarded by a named lock.
//!
//! # Design
//! - **Writer**: replaces the whole published snapshot under the lock, so a
//!   reader sees either the previous write or the new one, never a mix.
//! - **Readers**: copy the full snapshot out under the lock. Polling for new
//!   data (`sequence_id` changes) is up to the caller.
//!
//! The segment outlives every process attached to it. `cleanup` only detaches;
//! `remove` is the explicit administrative teardown.

use crate::clock::now_us;
use crate::error::{ChannelError, InitError};
use crate::semaphore::NamedSemaphore;
use crate::shm_layout::{SNAPSHOT_SIZE, Snapshot};
use posebus_events::{MAX_PERSONS, PersonDetection};
use posebus_mmap::{Attach, SharedMapping};
use std::io;
use std::mem::align_of;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::ptr::NonNull;
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const DEFAULT_SHM_DIR: &str = "/dev/shm";
pub const DEFAULT_SEGMENT_NAME: &str = "pose_detection_shm";
pub const DEFAULT_LOCK_NAME: &str = "/pose_detection_sem";
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Identity of a channel. All cooperating processes must agree on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Directory holding the segment file; tmpfs for real shared memory.
    pub shm_dir: PathBuf,
    pub segment_name: String,
    /// POSIX semaphore name, a single leading '/' and no other slashes.
    pub lock_name: String,
    /// `None` waits for the lock without bound.
    pub lock_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            shm_dir: PathBuf::from(DEFAULT_SHM_DIR),
            segment_name: DEFAULT_SEGMENT_NAME.into(),
            lock_name: DEFAULT_LOCK_NAME.into(),
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
        }
    }
}

impl ChannelConfig {
    pub fn new(
        shm_dir: impl Into<PathBuf>,
        segment_name: impl Into<String>,
        lock_name: impl Into<String>,
    ) -> Self {
        Self {
            shm_dir: shm_dir.into(),
            segment_name: segment_name.into(),
            lock_name: lock_name.into(),
            ..Self::default()
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn segment_path(&self) -> PathBuf {
        self.shm_dir.join(&self.segment_name)
    }

    fn check_names(&self) -> Result<(), InitError> {
        let seg = &self.segment_name;
        if seg.is_empty() || seg.contains('/') || seg.contains('\0') {
            return Err(InitError::InvalidName(seg.clone()));
        }
        let lock = &self.lock_name;
        let bare = lock.strip_prefix('/').unwrap_or_default();
        if bare.is_empty() || bare.contains('/') || bare.contains('\0') {
            return Err(InitError::InvalidName(lock.clone()));
        }
        Ok(())
    }
}

/// Outcome of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub sequence_id: u64,
    pub num_persons: u32,
    /// Detections dropped because the input exceeded `MAX_PERSONS`.
    pub truncated: usize,
}

struct Segment {
    /// Owns the mapping; `base` points into it.
    mapping: SharedMapping,
    base: NonNull<Snapshot>,
    lock: NamedSemaphore,
}

/// A process-local handle on a snapshot channel.
pub struct Channel {
    config: ChannelConfig,
    segment: Option<Segment>,
    fresh: bool,
}

// SAFETY: the raw snapshot pointer is only dereferenced through
// `SnapshotGuard`, which exists only while the named semaphore is held. The
// semaphore serializes threads of this process as well as other processes.
unsafe impl Send for Channel {}
unsafe impl Sync for Channel {}

/// Exclusive access to the shared snapshot. The lock is released on drop.
pub struct SnapshotGuard<'a> {
    segment: &'a Segment,
}

impl Channel {
    /// Attaches to the channel, creating the segment and lock if needed.
    ///
    /// The first process to find the segment unstamped and never written
    /// zero-initializes it; later attachers leave the contents alone.
    pub fn open(config: ChannelConfig) -> Result<Self, InitError> {
        config.check_names()?;
        let path = config.segment_path();

        let (mut mapping, attach) = SharedMapping::open_or_create(&path, SNAPSHOT_SIZE as u64)
            .map_err(|source| InitError::Segment {
                path: path.clone(),
                source,
            })?;
        if let Attach::ReplacedStale { old_len } = attach {
            warn!(
                path = %path.display(),
                old_len,
                expected = SNAPSHOT_SIZE,
                "removed undersized segment from an older layout"
            );
        }

        let base = NonNull::new(mapping.as_mut_ptr() as *mut Snapshot).ok_or_else(|| {
            InitError::Segment {
                path: path.clone(),
                source: io::Error::other("null mapping"),
            }
        })?;
        if base.as_ptr().align_offset(align_of::<Snapshot>()) != 0 {
            return Err(InitError::Incompatible("Misaligned mapping"));
        }

        let lock = NamedSemaphore::open(&config.lock_name).map_err(|source| InitError::Lock {
            name: config.lock_name.clone(),
            source,
        })?;

        let mut channel = Channel {
            config,
            segment: Some(Segment {
                mapping,
                base,
                lock,
            }),
            fresh: false,
        };
        channel.fresh = channel.prepare()?;

        info!(
            path = %path.display(),
            lock = %channel.config.lock_name,
            bytes = SNAPSHOT_SIZE,
            fresh = channel.fresh,
            "channel attached"
        );
        Ok(channel)
    }

    /// First-attach initialization and header check, under the lock.
    fn prepare(&self) -> Result<bool, InitError> {
        let mut guard = self.lock().map_err(|e| InitError::Lock {
            name: self.config.lock_name.clone(),
            source: match e {
                ChannelError::Lock(source) => source,
                other => io::Error::new(io::ErrorKind::TimedOut, other.to_string()),
            },
        })?;

        match guard.validate() {
            Ok(()) => return Ok(false),
            // Only a never-stamped, never-written segment is ours to zero. A
            // peer with another layout may have stamped it without writing.
            Err(_) if guard.magic == 0 && guard.sequence_id == 0 => {}
            Err(reason) => return Err(InitError::Incompatible(reason)),
        }
        guard.reset(now_us());
        info!("initialized shared snapshot");
        Ok(true)
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.segment.is_some()
    }

    /// Whether this handle performed the one-time zero initialization.
    pub fn initialized_fresh(&self) -> bool {
        self.fresh
    }

    /// Detaches from the segment and closes the lock handle. Neither the
    /// segment nor the lock name is removed. No-op when already detached.
    pub fn cleanup(&mut self) {
        if let Some(segment) = self.segment.take() {
            let path = segment.mapping.path().display().to_string();
            drop(segment);
            info!(path = %path, "channel detached");
        }
    }

    /// Acquires the channel lock for a critical section spanning several
    /// operations. Honors `ChannelConfig::lock_timeout`.
    ///
    /// Fails with `NotInitialized` on a detached handle instead of handing
    /// out a guard over nothing.
    pub fn lock(&self) -> Result<SnapshotGuard<'_>, ChannelError> {
        let segment = self.segment.as_ref().ok_or(ChannelError::NotInitialized)?;
        segment
            .lock
            .wait(self.config.lock_timeout)
            .map_err(|e| match (e.kind(), self.config.lock_timeout) {
                (io::ErrorKind::TimedOut, Some(timeout)) => ChannelError::LockTimeout(timeout),
                _ => ChannelError::Lock(e),
            })?;
        Ok(SnapshotGuard { segment })
    }

    /// Publishes one frame's detections, replacing the previous snapshot.
    ///
    /// More than `MAX_PERSONS` detections are truncated, not rejected. A zero
    /// `timestamp_us` is replaced by the current time.
    pub fn write(
        &self,
        detections: &[PersonDetection],
        frame_number: u32,
        timestamp_us: u64,
    ) -> Result<WriteReport, ChannelError> {
        if !self.is_ready() {
            error!("write on uninitialized channel");
            return Err(ChannelError::NotInitialized);
        }

        let truncated = detections.len().saturating_sub(MAX_PERSONS);
        if truncated > 0 {
            warn!(
                supplied = detections.len(),
                capacity = MAX_PERSONS,
                "too many detections, truncating"
            );
        }

        let timestamp_us = if timestamp_us != 0 {
            timestamp_us
        } else {
            now_us()
        };

        let mut guard = self.lock()?;
        let n = guard.apply_write(detections, frame_number, timestamp_us);
        let report = WriteReport {
            sequence_id: guard.sequence_id,
            num_persons: n as u32,
            truncated,
        };
        drop(guard);

        debug!(
            seq = report.sequence_id,
            frame = frame_number,
            persons = report.num_persons,
            "snapshot written"
        );
        Ok(report)
    }

    /// Copies the current snapshot out.
    pub fn read(&self) -> Result<Box<Snapshot>, ChannelError> {
        if !self.is_ready() {
            return Err(ChannelError::NotInitialized);
        }
        let mut out = Snapshot::new_boxed();
        self.read_into(&mut out)?;
        Ok(out)
    }

    /// Copies the current snapshot into a caller-owned buffer.
    pub fn read_into(&self, out: &mut Snapshot) -> Result<(), ChannelError> {
        let guard = self.lock()?;
        bytemuck::bytes_of_mut(out).copy_from_slice(bytemuck::bytes_of(&*guard));
        Ok(())
    }

    /// Current `sequence_id`, without copying the snapshot.
    pub fn sequence_id(&self) -> Result<u64, ChannelError> {
        Ok(self.lock()?.sequence_id)
    }

    /// Appends an RGB image to the thumbnail ring. Returns the slot written.
    pub fn push_thumbnail(
        &self,
        width: u32,
        height: u32,
        rgb: &[u8],
    ) -> Result<u32, ChannelError> {
        let mut guard = self.lock()?;
        Ok(guard.thumbnails.push(width, height, rgb)?)
    }

    pub fn set_pipeline_status(
        &self,
        fps: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Result<(), ChannelError> {
        let mut guard = self.lock()?;
        guard.fps = fps;
        guard.frame_width = frame_width;
        guard.frame_height = frame_height;
        Ok(())
    }

    /// Producer shutdown marker; readers keep seeing the last data.
    pub fn mark_inactive(&self) -> Result<(), ChannelError> {
        self.lock()?.pipeline_active = 0;
        Ok(())
    }

    /// Replaces a lock left held by a dead process and switches this handle
    /// to the new one. See [`recover_lock`].
    pub fn recover_lock(&mut self) -> Result<(), ChannelError> {
        let segment = self.segment.as_mut().ok_or(ChannelError::NotInitialized)?;
        segment.lock = recreate_lock(&self.config.lock_name).map_err(ChannelError::Lock)?;
        Ok(())
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Replaces a lock left held by a dead process, without attaching.
///
/// Unlinks the lock name and re-creates it unlocked. Opening a channel takes
/// the lock, so this is the way back in for a process that is not attached
/// yet. Processes still holding the old handle keep using the old semaphore
/// until they reattach; call this only once the stale holder is gone.
pub fn recover_lock(config: &ChannelConfig) -> Result<(), InitError> {
    config.check_names()?;
    recreate_lock(&config.lock_name).map_err(|source| InitError::Lock {
        name: config.lock_name.clone(),
        source,
    })?;
    Ok(())
}

fn recreate_lock(name: &str) -> io::Result<NamedSemaphore> {
    NamedSemaphore::unlink(name)?;
    let lock = NamedSemaphore::open(name)?;
    warn!(lock = name, "channel lock re-created");
    Ok(lock)
}

/// Removes the segment file and unlinks the lock name system-wide.
///
/// Attached processes keep their mappings; new attachers start from a fresh,
/// zeroed segment.
pub fn remove(config: &ChannelConfig) -> io::Result<()> {
    SharedMapping::remove(config.segment_path())?;
    NamedSemaphore::unlink(&config.lock_name)?;
    info!(path = %config.segment_path().display(), "channel removed");
    Ok(())
}

impl Deref for SnapshotGuard<'_> {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        // SAFETY: base points at a mapping of SNAPSHOT_SIZE bytes that the
        // segment keeps alive, and the named lock is held for our lifetime.
        unsafe { self.segment.base.as_ref() }
    }
}

impl DerefMut for SnapshotGuard<'_> {
    fn deref_mut(&mut self) -> &mut Snapshot {
        // SAFETY: as in `deref`; holding the lock makes this access exclusive.
        unsafe { &mut *self.segment.base.as_ptr() }
    }
}

impl Drop for SnapshotGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.segment.lock.post() {
            error!(error = %e, lock = self.segment.lock.name(), "failed to release channel lock");
        }
    }
}

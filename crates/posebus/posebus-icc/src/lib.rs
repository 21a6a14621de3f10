mod channel;
mod clock;
mod error;
mod semaphore;
mod shm_layout;
mod summary;

pub use channel::{
    Channel, ChannelConfig, DEFAULT_LOCK_NAME, DEFAULT_LOCK_TIMEOUT, DEFAULT_SEGMENT_NAME,
    DEFAULT_SHM_DIR, SnapshotGuard, WriteReport, recover_lock, remove,
};
pub use clock::now_us;
pub use error::{ChannelError, InitError, ThumbnailError};
pub use shm_layout::{
    LAYOUT_VERSION, SNAPSHOT_MAGIC, SNAPSHOT_SIZE, Snapshot, Thumbnail, ThumbnailRing,
};
pub use summary::{Summary, render_summary};

use std::io;
use std::path::PathBuf;
use std::time::Duration;

/// Failure to attach a channel. The channel is unusable; nothing was left
/// mapped or open.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("invalid channel name '{0}'")]
    InvalidName(String),

    #[error("failed to create or map segment '{}'", path.display())]
    Segment {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open lock '{name}'")]
    Lock {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("segment holds an incompatible layout: {0}")]
    Incompatible(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel is not initialized")]
    NotInitialized,

    /// The lock stayed held for the whole timeout. A peer may have died while
    /// holding it; see `Channel::recover_lock`.
    #[error("timed out after {0:?} waiting for the channel lock")]
    LockTimeout(Duration),

    #[error("lock operation failed")]
    Lock(#[source] io::Error),

    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ThumbnailError {
    #[error("thumbnail {width}x{height} exceeds {max_width}x{max_height}")]
    TooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("thumbnail data is {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

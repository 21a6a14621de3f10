pub mod detection;
pub mod pose;

pub use detection::{BoundingBox, Joint2D, Joint3D, PersonDetection};
pub use pose::{PoseClass, pose_class_label};

// Capacities below are part of the binary contract between processes.
// Changing any of them changes the snapshot size and breaks running peers.

pub const MAX_PERSONS: usize = 10;
pub const MAX_JOINTS: usize = 34;
pub const MAX_POSE_CLASSES: usize = 6;

pub const THUMBNAIL_MAX_WIDTH: usize = 320;
pub const THUMBNAIL_MAX_HEIGHT: usize = 240;
/// RGB, 3 bytes per pixel.
pub const THUMBNAIL_MAX_SIZE: usize = THUMBNAIL_MAX_WIDTH * THUMBNAIL_MAX_HEIGHT * 3;
pub const THUMBNAIL_BUFFER_COUNT: usize = 100;

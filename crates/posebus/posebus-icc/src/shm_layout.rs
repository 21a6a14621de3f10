//! Binary layout of the snapshot segment.
//!
//! The whole segment is one `Snapshot` at offset 0. Every record is
//! `#[repr(C)]` with explicit padding and derives `Pod`, which refuses to
//! compile if the compiler would insert padding of its own. The layout is
//! therefore fully described by the field list below.
//!
//! # Memory Layout
//!
//! ```text
//! offset      size        field
//! 0           8           magic ("POSEBUS1")
//! 8           8           layout_size
//! 16          4           layout_version
//! 20          4           frame_number
//! 24          8           sequence_id
//! 32          8           timestamp_us
//! 40          4           num_persons
//! 44          12          fps, frame_width, frame_height
//! 56          8           pipeline_active (u8) + padding
//! 64          23_040_024  ThumbnailRing
//! 23_040_088  13_680      persons[MAX_PERSONS]
//! 23_053_768  16          total_frames_processed, total_persons_detected
//! 23_053_784  256         reserved
//! 23_054_040              end
//! ```

use crate::error::ThumbnailError;
use bytemuck::{Pod, Zeroable};
use posebus_events::{
    MAX_PERSONS, PersonDetection, THUMBNAIL_BUFFER_COUNT, THUMBNAIL_MAX_HEIGHT, THUMBNAIL_MAX_SIZE,
    THUMBNAIL_MAX_WIDTH,
};
use std::mem::size_of;

/// ASCII "POSEBUS1", identifies a segment written by this layout family.
pub const SNAPSHOT_MAGIC: u64 = 0x504F_5345_4255_5331;

/// Increment on any change to field order, widths or capacities.
pub const LAYOUT_VERSION: u32 = 1;

/// Bytes mapped for one channel.
pub const SNAPSHOT_SIZE: usize = size_of::<Snapshot>();

/// Fixed-capacity circular buffer of raw RGB images.
///
/// `current_thumbnail_index` is the next slot to write; the most recent image
/// lives one slot behind it.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct ThumbnailRing {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    /// Byte length of the most recent image.
    pub thumbnail_size: u32,
    pub current_thumbnail_index: u32,
    pub has_thumbnail: u8,
    pub _pad: [u8; 7],
    pub frames: [[u8; THUMBNAIL_MAX_SIZE]; THUMBNAIL_BUFFER_COUNT],
}

/// Borrowed view of one image in the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thumbnail<'a> {
    pub slot: u32,
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

/// The shared record. Only ever handled by reference or in a `Box`; it is
/// far too large for the stack.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
pub struct Snapshot {
    pub magic: u64,
    pub layout_size: u64,
    pub layout_version: u32,

    pub frame_number: u32,
    /// Bumped once per successful write. Zero means "never written".
    pub sequence_id: u64,
    pub timestamp_us: u64,
    pub num_persons: u32,

    pub fps: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    pub pipeline_active: u8,
    pub _pad: [u8; 7],

    pub thumbnails: ThumbnailRing,

    /// Slots at or beyond `num_persons` are all-zero.
    pub persons: [PersonDetection; MAX_PERSONS],

    pub total_frames_processed: u64,
    pub total_persons_detected: u64,

    pub reserved: [u8; 256],
}

impl Snapshot {
    /// Heap-allocated all-zero snapshot.
    pub fn new_boxed() -> Box<Self> {
        bytemuck::zeroed_box()
    }

    /// Validates the layout header against this build.
    ///
    /// # Returns
    /// - `Ok(())` if magic, version and size all match
    /// - `Err(&'static str)` naming the first mismatch
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err("Bad magic");
        }
        if self.layout_version != LAYOUT_VERSION {
            return Err("Wrong layout version");
        }
        if self.layout_size != SNAPSHOT_SIZE as u64 {
            return Err("Layout size mismatch");
        }
        Ok(())
    }

    /// Zero everything and stamp the layout header.
    pub fn reset(&mut self, timestamp_us: u64) {
        bytemuck::bytes_of_mut(self).fill(0);
        self.magic = SNAPSHOT_MAGIC;
        self.layout_size = SNAPSHOT_SIZE as u64;
        self.layout_version = LAYOUT_VERSION;
        self.timestamp_us = timestamp_us;
    }

    /// Replace the published detections. Input beyond `MAX_PERSONS` is
    /// dropped; the return value is the number of persons stored.
    ///
    /// Caller must hold the channel lock when `self` lives in shared memory.
    pub fn apply_write(
        &mut self,
        detections: &[PersonDetection],
        frame_number: u32,
        timestamp_us: u64,
    ) -> usize {
        let n = detections.len().min(MAX_PERSONS);

        self.timestamp_us = timestamp_us;
        self.frame_number = frame_number;
        self.sequence_id = self.sequence_id.wrapping_add(1);
        self.num_persons = n as u32;
        self.pipeline_active = 1;
        self.total_frames_processed += 1;

        self.persons[..n].copy_from_slice(&detections[..n]);
        self.total_persons_detected += n as u64;

        for slot in &mut self.persons[n..] {
            *slot = PersonDetection::zeroed();
        }
        n
    }

    /// The populated person slots.
    pub fn persons(&self) -> &[PersonDetection] {
        let n = (self.num_persons as usize).min(MAX_PERSONS);
        &self.persons[..n]
    }

    #[inline]
    pub fn pipeline_active(&self) -> bool {
        self.pipeline_active != 0
    }
}

impl ThumbnailRing {
    /// Writes an RGB image into the current slot and advances the index.
    /// Returns the slot written.
    pub fn push(&mut self, width: u32, height: u32, rgb: &[u8]) -> Result<u32, ThumbnailError> {
        if width as usize > THUMBNAIL_MAX_WIDTH || height as usize > THUMBNAIL_MAX_HEIGHT {
            return Err(ThumbnailError::TooLarge {
                width,
                height,
                max_width: THUMBNAIL_MAX_WIDTH as u32,
                max_height: THUMBNAIL_MAX_HEIGHT as u32,
            });
        }
        let expected = width as usize * height as usize * 3;
        if rgb.len() != expected {
            return Err(ThumbnailError::SizeMismatch {
                expected,
                actual: rgb.len(),
            });
        }

        let slot = self.current_thumbnail_index as usize % THUMBNAIL_BUFFER_COUNT;
        let frame = &mut self.frames[slot];
        frame[..expected].copy_from_slice(rgb);
        frame[expected..].fill(0);

        self.thumbnail_width = width;
        self.thumbnail_height = height;
        self.thumbnail_size = expected as u32;
        self.has_thumbnail = 1;
        self.current_thumbnail_index = ((slot + 1) % THUMBNAIL_BUFFER_COUNT) as u32;
        Ok(slot as u32)
    }

    /// Most recently pushed image, if any.
    pub fn latest(&self) -> Option<Thumbnail<'_>> {
        if self.has_thumbnail == 0 || self.thumbnail_size == 0 {
            return None;
        }
        let current = self.current_thumbnail_index as usize % THUMBNAIL_BUFFER_COUNT;
        let slot = (current + THUMBNAIL_BUFFER_COUNT - 1) % THUMBNAIL_BUFFER_COUNT;
        let len = (self.thumbnail_size as usize).min(THUMBNAIL_MAX_SIZE);
        Some(Thumbnail {
            slot: slot as u32,
            width: self.thumbnail_width,
            height: self.thumbnail_height,
            data: &self.frames[slot][..len],
        })
    }
}

// Plain-old-data records shared verbatim between processes.
//
// Every struct is repr(C) with explicit padding fields, so the derived `Pod`
// impl proves at compile time that no implicit padding exists. Flags are u8
// (0/1) because `bool` has invalid bit patterns and cannot be Pod.

use crate::{MAX_JOINTS, MAX_POSE_CLASSES, PoseClass};
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Joint2D {
    pub x: f32,
    pub y: f32,
    /// Advisory, nominally in [0, 1].
    pub confidence: f32,
    pub visible: u8,
    pub _pad: [u8; 3],
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Joint3D {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub confidence: f32,
    pub visible: u8,
    pub _pad: [u8; 3],
}

/// Image-space box.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// One tracked person in one frame.
///
/// Joint indices carry pipeline-defined skeletal meaning; this crate treats
/// them as opaque. Fields guarded by a `has_*` flag are zero when the flag is 0.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct PersonDetection {
    pub timestamp_us: u64,
    /// Assigned by the tracker, stable while the person stays tracked.
    pub person_id: u32,
    pub frame_number: u32,

    pub bbox: BoundingBox,
    pub joints_2d: [Joint2D; MAX_JOINTS],
    pub joints_3d: [Joint3D; MAX_JOINTS],

    /// Raw `PoseClass` discriminant. Values outside the enumeration are
    /// representable and read back as "unknown".
    pub pose_class: u32,
    pub pose_confidence: f32,
    pub pose_scores: [f32; MAX_POSE_CLASSES],

    /// Frames continuously tracked.
    pub tracking_age: u32,
    pub is_tracked: u8,
    pub has_2d_pose: u8,
    pub has_3d_pose: u8,
    pub has_classification: u8,

    pub reserved: [u8; 64],
    pub _pad: [u8; 4],
}

impl Default for PersonDetection {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Joint2D {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            confidence,
            visible: 1,
            _pad: [0; 3],
        }
    }
}

impl Joint3D {
    pub fn new(x: f32, y: f32, z: f32, confidence: f32) -> Self {
        Self {
            x,
            y,
            z,
            confidence,
            visible: 1,
            _pad: [0; 3],
        }
    }
}

impl BoundingBox {
    pub fn new(left: f32, top: f32, width: f32, height: f32, confidence: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            confidence,
        }
    }
}

impl PersonDetection {
    pub fn new(person_id: u32, frame_number: u32, timestamp_us: u64) -> Self {
        Self {
            person_id,
            frame_number,
            timestamp_us,
            ..Self::zeroed()
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = bbox;
        self
    }

    /// Sets the chosen class, its confidence and the per-class score vector.
    pub fn with_classification(
        mut self,
        class: PoseClass,
        confidence: f32,
        scores: [f32; MAX_POSE_CLASSES],
    ) -> Self {
        self.pose_class = class.raw();
        self.pose_confidence = confidence;
        self.pose_scores = scores;
        self.has_classification = 1;
        self
    }

    pub fn with_tracking(mut self, tracking_age: u32) -> Self {
        self.is_tracked = 1;
        self.tracking_age = tracking_age;
        self
    }

    /// Copies up to `MAX_JOINTS` joints; extra input is ignored.
    pub fn with_joints_2d(mut self, joints: &[Joint2D]) -> Self {
        let n = joints.len().min(MAX_JOINTS);
        self.joints_2d[..n].copy_from_slice(&joints[..n]);
        self.has_2d_pose = 1;
        self
    }

    /// Copies up to `MAX_JOINTS` joints; extra input is ignored.
    pub fn with_joints_3d(mut self, joints: &[Joint3D]) -> Self {
        let n = joints.len().min(MAX_JOINTS);
        self.joints_3d[..n].copy_from_slice(&joints[..n]);
        self.has_3d_pose = 1;
        self
    }

    #[inline]
    pub fn pose(&self) -> Option<PoseClass> {
        PoseClass::from_raw(self.pose_class)
    }

    #[inline]
    pub fn tracked(&self) -> bool {
        self.is_tracked != 0
    }

    #[inline]
    pub fn pose_2d_valid(&self) -> bool {
        self.has_2d_pose != 0
    }

    #[inline]
    pub fn pose_3d_valid(&self) -> bool {
        self.has_3d_pose != 0
    }

    #[inline]
    pub fn classified(&self) -> bool {
        self.has_classification != 0
    }

    /// True when every byte of the record is zero (an unused slot).
    pub fn is_zeroed(&self) -> bool {
        bytemuck::bytes_of(self).iter().all(|b| *b == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    /// Sizes are part of the cross-process contract; a change here means the
    /// snapshot layout version must be bumped.
    #[test]
    fn record_sizes_are_stable() {
        assert_eq!(size_of::<Joint2D>(), 16);
        assert_eq!(size_of::<Joint3D>(), 20);
        assert_eq!(size_of::<BoundingBox>(), 20);
        assert_eq!(size_of::<PersonDetection>(), 1368, "PersonDetection layout changed");
        assert_eq!(align_of::<PersonDetection>(), 8);
    }

    #[test]
    fn default_is_all_zero() {
        assert!(PersonDetection::default().is_zeroed());
        assert!(!PersonDetection::new(1, 0, 0).is_zeroed());
    }

    #[test]
    fn builders_set_validity_flags() {
        let joints = vec![Joint2D::new(1.0, 2.0, 0.5); MAX_JOINTS + 4];
        let p = PersonDetection::new(7, 42, 1000)
            .with_classification(PoseClass::Walking, 0.8, [0.0, 0.0, 0.0, 0.2, 0.8, 0.0])
            .with_tracking(12)
            .with_joints_2d(&joints);

        assert_eq!(p.pose(), Some(PoseClass::Walking));
        assert!(p.classified());
        assert!(p.tracked());
        assert_eq!(p.tracking_age, 12);
        assert!(p.pose_2d_valid());
        assert!(!p.pose_3d_valid());
        assert_eq!(p.joints_2d[MAX_JOINTS - 1].visible, 1);
    }

    #[test]
    fn unknown_pose_class_reads_as_none() {
        let mut p = PersonDetection::new(1, 0, 0);
        p.pose_class = 99;
        assert_eq!(p.pose(), None);
    }
}

use std::fmt;

/// Pose classes produced by the classifier. The discriminant is what gets
/// stored in `PersonDetection::pose_class` and indexes `pose_scores`.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoseClass {
    SittingDown = 0,
    GettingUp = 1,
    Sitting = 2,
    Standing = 3,
    Walking = 4,
    Jumping = 5,
}

impl PoseClass {
    pub const ALL: [PoseClass; crate::MAX_POSE_CLASSES] = [
        PoseClass::SittingDown,
        PoseClass::GettingUp,
        PoseClass::Sitting,
        PoseClass::Standing,
        PoseClass::Walking,
        PoseClass::Jumping,
    ];

    #[inline]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PoseClass::SittingDown),
            1 => Some(PoseClass::GettingUp),
            2 => Some(PoseClass::Sitting),
            3 => Some(PoseClass::Standing),
            4 => Some(PoseClass::Walking),
            5 => Some(PoseClass::Jumping),
            _ => None,
        }
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Canonical lowercase label.
    pub const fn label(self) -> &'static str {
        match self {
            PoseClass::SittingDown => "sitting_down",
            PoseClass::GettingUp => "getting_up",
            PoseClass::Sitting => "sitting",
            PoseClass::Standing => "standing",
            PoseClass::Walking => "walking",
            PoseClass::Jumping => "jumping",
        }
    }
}

impl TryFrom<u32> for PoseClass {
    type Error = u32;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        PoseClass::from_raw(raw).ok_or(raw)
    }
}

impl fmt::Display for PoseClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for a raw pose class value as read from shared memory.
/// Anything outside the enumeration maps to `"unknown"`.
pub const fn pose_class_label(raw: u32) -> &'static str {
    match PoseClass::from_raw(raw) {
        Some(class) => class.label(),
        None => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_match_classifier_names() {
        assert_eq!(pose_class_label(PoseClass::Standing.raw()), "standing");
        assert_eq!(pose_class_label(0), "sitting_down");
        assert_eq!(pose_class_label(5), "jumping");
        assert_eq!(PoseClass::GettingUp.to_string(), "getting_up");
    }

    #[test]
    fn out_of_range_is_unknown() {
        assert_eq!(pose_class_label(6), "unknown");
        assert_eq!(pose_class_label(u32::MAX), "unknown");
        assert_eq!(PoseClass::try_from(6), Err(6));
    }

    #[test]
    fn discriminants_are_dense() {
        for (i, class) in PoseClass::ALL.iter().enumerate() {
            assert_eq!(class.raw() as usize, i);
            assert_eq!(PoseClass::from_raw(i as u32), Some(*class));
        }
    }
}

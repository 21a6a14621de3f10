use crate::shm_layout::Snapshot;
use posebus_events::pose_class_label;
use std::fmt;

/// Multi-line, human-readable rendering of a snapshot for operators.
pub struct Summary<'a>(pub &'a Snapshot);

impl Snapshot {
    pub fn summary(&self) -> Summary<'_> {
        Summary(self)
    }
}

pub fn render_summary(snapshot: &Snapshot) -> String {
    snapshot.summary().to_string()
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "Yes" } else { "No" }
}

impl fmt::Display for Summary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.0;
        writeln!(f, "=== Detection Data ===")?;
        writeln!(f, "Timestamp: {} us", s.timestamp_us)?;
        writeln!(f, "Frame: {}", s.frame_number)?;
        writeln!(f, "Sequence: {}", s.sequence_id)?;
        writeln!(f, "Persons: {}", s.num_persons)?;
        writeln!(f, "Pipeline Active: {}", yes_no(s.pipeline_active()))?;
        writeln!(f, "FPS: {}", s.fps)?;
        writeln!(f, "Frame Size: {}x{}", s.frame_width, s.frame_height)?;

        for (i, p) in s.persons().iter().enumerate() {
            writeln!(
                f,
                "Person {i}: ID={}, Pose={} ({:.2}), Tracked={}",
                p.person_id,
                pose_class_label(p.pose_class),
                p.pose_confidence,
                yes_no(p.tracked())
            )?;
        }
        writeln!(f, "===================")
    }
}

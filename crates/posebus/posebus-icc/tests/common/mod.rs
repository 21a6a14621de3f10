#![allow(dead_code)]

use posebus_events::{PersonDetection, PoseClass};
use posebus_icc::ChannelConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

static NEXT: AtomicUsize = AtomicUsize::new(0);

/// A channel identity private to one test. The segment lives in a temp dir
/// and the lock name is unique per process and test; both are removed on drop.
pub struct Fixture {
    pub config: ChannelConfig,
    _dir: TempDir,
}

impl Fixture {
    pub fn new(tag: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let n = NEXT.fetch_add(1, Ordering::Relaxed);
        let pid = std::process::id();
        let config = ChannelConfig::new(
            dir.path(),
            format!("posebus_{tag}"),
            format!("/posebus_test_{tag}_{pid}_{n}"),
        )
        .with_lock_timeout(Some(Duration::from_secs(5)));
        Self { config, _dir: dir }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = posebus_icc::remove(&self.config);
    }
}

pub fn person(id: u32, frame: u32) -> PersonDetection {
    PersonDetection::new(id, frame, 1000 + frame as u64)
        .with_classification(PoseClass::Walking, 0.5, [0.1, 0.1, 0.1, 0.1, 0.5, 0.1])
        .with_tracking(frame)
}

pub fn persons(count: u32, frame: u32) -> Vec<PersonDetection> {
    (1..=count).map(|id| person(id, frame)).collect()
}

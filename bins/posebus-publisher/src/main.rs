use anyhow::Context;
use posebus_config::PosebusConfig;
use posebus_events::{BoundingBox, Joint2D, Joint3D, MAX_JOINTS, PersonDetection, PoseClass};
use posebus_icc::{Channel, ChannelConfig};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Synthetic stand-in for the pose pipeline: people drifting across the frame
/// with a class that changes every couple of seconds.
fn synth_person(id: u32, frame: u32, timestamp_us: u64, cfg: &PosebusConfig) -> PersonDetection {
    let w = cfg.publisher.frame_width as f32;
    let h = cfg.publisher.frame_height as f32;
    let phase = (frame as f32 * 0.02 + id as f32).sin();
    let left = (w * 0.1 * id as f32 + phase * 40.0).rem_euclid(w * 0.8);
    let top = h * 0.2 + phase * 20.0;
    let (bw, bh) = (w * 0.08, h * 0.45);

    let joints_2d: Vec<Joint2D> = (0..MAX_JOINTS)
        .map(|j| {
            let t = j as f32 / MAX_JOINTS as f32;
            Joint2D::new(left + bw * 0.5, top + bh * t, 0.9)
        })
        .collect();
    let joints_3d: Vec<Joint3D> = joints_2d
        .iter()
        .map(|j| Joint3D::new(j.x / w, j.y / h, 2.5, j.confidence))
        .collect();

    let class = PoseClass::ALL[((frame / 60 + id) as usize) % PoseClass::ALL.len()];
    let mut scores = [0.02f32; 6];
    scores[class.raw() as usize] = 0.9;

    PersonDetection::new(id, frame, timestamp_us)
        .with_bbox(BoundingBox::new(left, top, bw, bh, 0.95))
        .with_joints_2d(&joints_2d)
        .with_joints_3d(&joints_3d)
        .with_classification(class, 0.9, scores)
        .with_tracking(frame)
}

fn synth_thumbnail(frame: u32) -> (u32, u32, Vec<u8>) {
    let (tw, th) = (160u32, 120u32);
    let shade = (frame % 256) as u8;
    let rgb = (0..tw * th)
        .flat_map(|i| [shade, (i % tw) as u8, (i / tw) as u8])
        .collect();
    (tw, th, rgb)
}

fn main() -> anyhow::Result<()> {
    let cfg = PosebusConfig::load_or_default(std::env::args().nth(1))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();

    let channel_cfg = ChannelConfig::new(&cfg.shm_dir, &cfg.segment_name, &cfg.lock_name)
        .with_lock_timeout(cfg.lock_timeout());
    let channel = Channel::open(channel_cfg).context("shared memory channel unavailable")?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install signal handler")?;
    }

    channel.set_pipeline_status(
        cfg.publisher.fps,
        cfg.publisher.frame_width,
        cfg.publisher.frame_height,
    )?;

    let interval = Duration::from_millis(cfg.publisher.publish_interval_ms);
    info!(
        segment = %channel.config().segment_path().display(),
        interval_ms = cfg.publisher.publish_interval_ms,
        "POSEBUS: publishing synthetic detections"
    );

    let mut frame: u32 = 0;
    let mut last = Instant::now();
    let mut count: u64 = 0;

    while running.load(Ordering::SeqCst) {
        frame = frame.wrapping_add(1);
        let ts = posebus_icc::now_us();
        let n = if cfg.publisher.max_persons == 0 {
            0
        } else {
            1 + (frame / 90) % cfg.publisher.max_persons
        };
        let persons: Vec<_> = (1..=n).map(|id| synth_person(id, frame, ts, &cfg)).collect();

        let report = channel.write(&persons, frame, ts)?;
        if cfg.publisher.thumbnails {
            let (tw, th, rgb) = synth_thumbnail(frame);
            channel.push_thumbnail(tw, th, &rgb)?;
        }
        count += 1;

        if last.elapsed() >= Duration::from_secs(1) {
            info!(rate = count, seq = report.sequence_id, "POSEBUS: publish rate (frames/s)");
            count = 0;
            last = Instant::now();
        }

        std::thread::sleep(interval);
    }

    channel.mark_inactive()?;
    info!("POSEBUS: publisher stopped, pipeline marked inactive");
    Ok(())
}

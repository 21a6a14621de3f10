use anyhow::{Context, bail};
use posebus_config::PosebusConfig;
use posebus_icc::{Channel, ChannelConfig, ChannelError, Snapshot};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Consecutive lock timeouts before the monitor suggests lock recovery.
const STALE_LOCK_WARN_AFTER: u32 = 3;

enum Mode {
    Watch,
    /// Re-create a lock left held by a crashed process, then exit.
    RecoverLock,
    /// Remove the segment and lock name system-wide, then exit.
    Remove,
}

struct Args {
    config_path: Option<String>,
    mode: Mode,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        config_path: None,
        mode: Mode::Watch,
    };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--recover-lock" => args.mode = Mode::RecoverLock,
            "--remove" => args.mode = Mode::Remove,
            flag if flag.starts_with("--") => bail!("unknown flag '{flag}'"),
            path => args.config_path = Some(path.to_string()),
        }
    }
    Ok(args)
}

fn report(snapshot: &Snapshot, last_seq: u64) {
    let missed = snapshot.sequence_id.saturating_sub(last_seq + 1);
    if last_seq > 0 && missed > 0 {
        info!(missed, "writes happened between polls");
    }
    print!("{}", snapshot.summary());
    if let Some(thumb) = snapshot.thumbnails.latest() {
        println!(
            "Thumbnail: slot {} {}x{} ({} bytes)",
            thumb.slot,
            thumb.width,
            thumb.height,
            thumb.data.len()
        );
    }
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let cfg = PosebusConfig::load_or_default(args.config_path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.log_level)),
        )
        .init();

    let channel_cfg = ChannelConfig::new(&cfg.shm_dir, &cfg.segment_name, &cfg.lock_name)
        .with_lock_timeout(cfg.lock_timeout());

    if let Mode::Remove = args.mode {
        posebus_icc::remove(&channel_cfg).context("failed to remove channel")?;
        return Ok(());
    }

    if let Mode::RecoverLock = args.mode {
        posebus_icc::recover_lock(&channel_cfg).context("failed to recover channel lock")?;
        return Ok(());
    }

    let mut channel = Channel::open(channel_cfg).context("shared memory channel unavailable")?;

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))
            .context("failed to install signal handler")?;
    }

    let poll = Duration::from_millis(cfg.monitor.poll_interval_ms);
    info!(
        segment = %channel.config().segment_path().display(),
        poll_ms = cfg.monitor.poll_interval_ms,
        "POSEBUS: monitoring snapshots"
    );

    let mut buf = Snapshot::new_boxed();
    let mut last_seq = 0u64;
    let mut timeouts = 0u32;

    while running.load(Ordering::SeqCst) {
        match channel.sequence_id() {
            Ok(seq) if seq != last_seq => {
                channel.read_into(&mut buf)?;
                report(&buf, last_seq);
                last_seq = buf.sequence_id;
                timeouts = 0;
            }
            Ok(_) => timeouts = 0,
            Err(ChannelError::LockTimeout(waited)) => {
                timeouts += 1;
                warn!(?waited, timeouts, "channel lock not acquired");
                if timeouts == STALE_LOCK_WARN_AFTER {
                    warn!("lock may be held by a dead process; consider --recover-lock");
                }
            }
            Err(e) => return Err(e.into()),
        }
        std::thread::sleep(poll);
    }

    channel.cleanup();
    Ok(())
}

use std::{
    io,
    sync::atomic::{AtomicBool, Ordering},
    thread::sleep,
    time::{Duration, Instant},
};

use tracing::{debug, info, warn};

use crate::{process::Monitored, rollup::Rollup, stats::Samples};

// longest time between checks of the interrupt flag and process exit
const POLL_SLICE: Duration = Duration::from_millis(50);

/// Samples the memory rollup of the monitored process every `interval`
/// until it exits or `interrupted` is set.
///
/// Samples are scheduled from the start time, time spent reading the rollup
/// doesn't shift later samples. Exit and interrupt are noticed within
/// [`POLL_SLICE`] even for long intervals. A failed read ends sampling and the
/// samples collected so far are returned.
pub fn watch(monitored: &mut Monitored, interval: Duration, interrupted: &AtomicBool) -> io::Result<Samples> {
    let mut samples = Samples::default();
    let mut next = Instant::now();
    loop {
        next = next.checked_add(interval).ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("sampling interval {:?} is too long", interval))
        })?;
        loop {
            if interrupted.load(Ordering::Relaxed) {
                info!("interrupted after {} samples", samples.len());
                return Ok(samples);
            }
            if let Some(status) = monitored.try_wait()? {
                info!("process has terminated: {}", status);
                return Ok(samples);
            }
            match next.checked_duration_since(Instant::now()) {
                Some(delay) if !delay.is_zero() => sleep(delay.min(POLL_SLICE)),
                _ => break,
            }
        }
        match Rollup::read(monitored.pid()) {
            Ok(rollup) => {
                samples.push(Instant::now(), rollup);
                debug!(rss = rollup.rss, pss = rollup.pss, "collected sample #{}", samples.len());
            }
            Err(err) => {
                // process may exit between try_wait and the read
                if monitored.try_wait()?.is_none() {
                    warn!("stopped sampling: {}", err);
                }
                return Ok(samples);
            }
        }
    }
}

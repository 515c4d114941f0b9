use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::{InstallBackend, InstallQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriveOptions {
    pub tick_interval: Duration,
    /// Gives up after this many ticks. The queue has no timeout of its own.
    pub max_ticks: Option<u64>,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            max_ticks: None,
        }
    }
}

pub fn drive_until_idle<B: InstallBackend>(
    queue: &mut InstallQueue<B>,
    options: &DriveOptions,
) -> Result<u64> {
    drive_until_idle_with(queue, options, |_| {})
}

/// Runs the single-threaded scheduler loop until the queue is idle.
///
/// `on_tick` runs after every tick so callers can drain events or redraw progress.
pub fn drive_until_idle_with<B, F>(
    queue: &mut InstallQueue<B>,
    options: &DriveOptions,
    mut on_tick: F,
) -> Result<u64>
where
    B: InstallBackend,
    F: FnMut(&InstallQueue<B>),
{
    let mut ticks = 0_u64;
    while !queue.is_idle() {
        if let Some(max_ticks) = options.max_ticks {
            if ticks >= max_ticks {
                let status = queue.status();
                bail!(
                    "install queue still busy after {ticks} ticks ({}, {} pending)",
                    status.current_label,
                    status.pending
                );
            }
        }

        queue.tick();
        ticks += 1;
        on_tick(queue);

        if !queue.is_idle() && !options.tick_interval.is_zero() {
            thread::sleep(options.tick_interval);
        }
    }
    Ok(ticks)
}

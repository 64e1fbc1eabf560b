use std::sync::atomic::Ordering;
use std::time::Duration;

use apocalypse_game::GameListener;
use tracing::{debug, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, ListenArgs, POLL_INTERVAL};
use crate::exit::{game_error, CliResult, SUCCESS};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let idle_limit = args.timeout.as_deref().map(parse_duration).transpose()?;
    let slice = idle_limit.map_or(POLL_INTERVAL, |limit| limit.min(POLL_INTERVAL));

    let mut listener =
        GameListener::bind(&args.endpoint).map_err(|err| game_error("bind failed", err))?;
    let running = install_ctrlc_handler()?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let mut conn = listener
            .accept()
            .map_err(|err| game_error("accept failed", err))?;
        let mut clock = IdleClock::new(conn.bytes_received());

        while running.load(Ordering::SeqCst) {
            // Partial frames stay buffered in the channel across polls.
            let frame = match conn.receive_raw(slice) {
                Ok(frame) => frame,
                Err(err) if err.is_timeout() => {
                    let idle = clock.observe(conn.bytes_received(), slice);
                    if idle_limit.is_some_and(|limit| idle >= limit) {
                        warn!(connection = conn.id(), ?idle, "dropping idle connection");
                        break;
                    }
                    continue;
                }
                Err(err) if err.is_disconnected() => {
                    debug!(connection = conn.id(), "connection closed");
                    break;
                }
                Err(err) => return Err(game_error("receive failed", err)),
            };
            clock.reset(conn.bytes_received());

            print_frame(&frame, conn.id(), format);
            printed = printed.saturating_add(1);

            if let Some(count) = args.count {
                if printed >= count {
                    return Ok(SUCCESS);
                }
            }
        }
    }

    Ok(SUCCESS)
}

/// Silence on one connection. Any byte received resets it, including the
/// bytes of a frame that is still being assembled.
#[derive(Debug)]
struct IdleClock {
    idle: Duration,
    seen: u64,
}

impl IdleClock {
    fn new(bytes_received: u64) -> Self {
        Self {
            idle: Duration::ZERO,
            seen: bytes_received,
        }
    }

    /// Account for a poll that waited `waited` without completing a frame.
    fn observe(&mut self, bytes_received: u64, waited: Duration) -> Duration {
        if bytes_received == self.seen {
            self.idle = self.idle.saturating_add(waited);
        } else {
            self.reset(bytes_received);
        }
        self.idle
    }

    fn reset(&mut self, bytes_received: u64) {
        self.seen = bytes_received;
        self.idle = Duration::ZERO;
    }
}

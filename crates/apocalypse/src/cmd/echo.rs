use std::sync::atomic::Ordering;

use apocalypse_game::{GameError, GameListener};
use tracing::{debug, info};

use crate::cmd::{install_ctrlc_handler, EchoArgs, POLL_INTERVAL};
use crate::exit::{game_error, CliError, CliResult, SUCCESS};

enum RecvDisposition {
    Retry,
    Break,
    Fatal(CliError),
}

pub fn run(args: EchoArgs) -> CliResult<i32> {
    let mut listener =
        GameListener::bind(&args.endpoint).map_err(|err| game_error("bind failed", err))?;
    let running = install_ctrlc_handler()?;

    while running.load(Ordering::SeqCst) {
        let mut conn = listener
            .accept()
            .map_err(|err| game_error("accept failed", err))?;

        while running.load(Ordering::SeqCst) {
            let frame = match conn.receive_raw(POLL_INTERVAL) {
                Ok(frame) => frame,
                Err(err) => match classify_recv_error(err) {
                    RecvDisposition::Retry => continue,
                    RecvDisposition::Break => {
                        debug!(connection = conn.id(), "connection closed");
                        break;
                    }
                    RecvDisposition::Fatal(cli_err) => return Err(cli_err),
                },
            };

            info!(connection = conn.id(), size = frame.len(), "echoing frame");

            conn.send_raw(frame.as_ref())
                .map_err(|err| game_error("echo send failed", err))?;
        }
    }

    Ok(SUCCESS)
}

fn classify_recv_error(err: GameError) -> RecvDisposition {
    if err.is_timeout() {
        return RecvDisposition::Retry;
    }
    if err.is_disconnected() {
        return RecvDisposition::Break;
    }
    RecvDisposition::Fatal(game_error("receive failed", err))
}

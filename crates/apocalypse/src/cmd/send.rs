use std::fs;

use apocalypse_game::{connect, ConnectionConfig};

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{game_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let mut conn = connect(&args.endpoint, &ConnectionConfig::default())
        .map_err(|err| game_error("connect failed", err))?;

    conn.send_raw(&payload)
        .map_err(|err| game_error("send failed", err))?;

    if args.wait {
        let frame = conn
            .receive_raw(wait_timeout)
            .map_err(|err| game_error("receive failed", err))?;
        print_frame(&frame, conn.id(), format);
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err));
    }
    Ok(Vec::new())
}

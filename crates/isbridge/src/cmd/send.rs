use std::thread;

use isbridge_transport::{PubSocket, Stream};
use serde::Serialize;
use tracing::debug;

use crate::cmd::encode::encode_args;
use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{stream_error, transport_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct SendOutput<'a> {
    endpoint: &'a str,
    did: u8,
    offset: u16,
    bytes: usize,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let settle = parse_duration(&args.settle)?;
    let wire = encode_args(&args.frame)?;

    let mut socket = PubSocket::connect(&args.send)
        .map_err(|err| transport_error(&format!("failed to open publisher {}", args.send), err))?;

    // Subscriptions reach a fresh publisher asynchronously; anything sent
    // before then is dropped.
    thread::sleep(settle);

    let sent = socket
        .write(&wire)
        .map_err(|err| stream_error("publish failed", err))?;
    debug!(bytes = sent, endpoint = %args.send, "frame published");
    // Closing flushes queued output for up to the socket linger.
    socket
        .close()
        .map_err(|err| stream_error("close failed", err))?;

    let summary = SendOutput {
        endpoint: &args.send,
        did: args.frame.did,
        offset: args.frame.offset,
        bytes: sent,
    };
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&summary).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Raw => {}
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "sent {} bytes (did={}, offset={}) to {}",
            summary.bytes, summary.did, summary.offset, summary.endpoint
        ),
    }

    Ok(SUCCESS)
}

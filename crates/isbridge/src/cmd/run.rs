use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use isbridge_bridge::{Bridge, BridgeOptions, BridgeStatus};
use tracing::info;

use crate::cmd::{install_ctrlc_handler, parse_duration, RunArgs};
use crate::exit::{bridge_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_status, OutputFormat};

const STATUS_POLL: Duration = Duration::from_millis(50);

pub fn run(args: RunArgs, format: OutputFormat) -> CliResult<i32> {
    let options = BridgeOptions {
        recv_timeout: parse_duration(&args.recv_timeout)?,
        poll_interval: parse_duration(&args.poll_interval)?,
        ..BridgeOptions::default()
    };
    let deadline = args
        .duration
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|limit| Instant::now() + limit);

    let running = install_ctrlc_handler()?;

    let mut bridge = Bridge::with_options(options);
    bridge
        .start(&args.subscribe, &args.publish, args.port)
        .map_err(|err| bridge_error("bridge start failed", err))?;
    print_status(&bridge.status(), format);

    let outcome = supervise(&bridge, &running, deadline);

    bridge
        .stop()
        .map_err(|err| bridge_error("bridge stop failed", err))?;
    info!("bridge shut down");

    match outcome {
        BridgeStatus::Failed { reason } => Err(CliError::new(FAILURE, format!("bridge failed: {reason}"))),
        _ => {
            print_status(&bridge.status(), format);
            Ok(SUCCESS)
        }
    }
}

/// Wait until cancelled, the deadline passes, or the bridge stops running.
fn supervise(bridge: &Bridge, running: &AtomicBool, deadline: Option<Instant>) -> BridgeStatus {
    loop {
        let status = bridge.status();
        if !status.is_running() {
            return status;
        }
        if !running.load(Ordering::SeqCst) || deadline.is_some_and(|d| Instant::now() >= d) {
            return status;
        }
        std::thread::sleep(STATUS_POLL);
    }
}

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use isbridge_client::{HEADSET_1_CLIENT_TO_IMU, HEADSET_1_IMU_TO_CLIENT};
use isbridge_frame::PacketType;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod listen;
pub mod run;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the pub/sub to TCP bridge until interrupted.
    Run(RunArgs),
    /// Subscribe and print validated frames.
    Listen(ListenArgs),
    /// Encode one frame and publish it.
    Send(SendArgs),
    /// Encode one frame and print it.
    Encode(EncodeArgs),
    /// Decode and validate a frame or ASCII sentence.
    Decode(DecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Run(args) => run::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Endpoint to subscribe to (device output).
    #[arg(long = "sub", value_name = "ENDPOINT", default_value = HEADSET_1_IMU_TO_CLIENT)]
    pub subscribe: String,
    /// Endpoint to publish client data to (device input).
    #[arg(long = "pub", value_name = "ENDPOINT", default_value = HEADSET_1_CLIENT_TO_IMU)]
    pub publish: String,
    /// TCP port to listen on (0 picks a free port).
    #[arg(long, default_value_t = 8000)]
    pub port: u16,
    /// Longest single subscribe receive (e.g. 20ms).
    #[arg(long, default_value = "20ms")]
    pub recv_timeout: String,
    /// Listening-server housekeeping interval (e.g. 10ms).
    #[arg(long, default_value = "10ms")]
    pub poll_interval: String,
    /// Stop after this long instead of waiting for Ctrl-C.
    #[arg(long, value_name = "DURATION")]
    pub duration: Option<String>,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to subscribe to.
    #[arg(long, value_name = "ENDPOINT", default_value = HEADSET_1_IMU_TO_CLIENT)]
    pub recv: String,
    /// Endpoint outbound frames would be published to.
    #[arg(long, value_name = "ENDPOINT", default_value = HEADSET_1_CLIENT_TO_IMU)]
    pub send: String,
    /// Read from a connection string instead, e.g. `PUBSUB:IS:7116:7115` or
    /// `TCP:IS:127.0.0.1:8000`. Prints payloads rather than whole frames.
    #[arg(long, value_name = "SPEC", conflicts_with_all = ["recv", "send"])]
    pub conn: Option<String>,
    /// Exit after receiving N frames.
    #[arg(long)]
    pub count: Option<usize>,
    /// Give up after this long without reaching --count (e.g. 5s).
    #[arg(long)]
    pub timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Data identifier.
    #[arg(long)]
    pub did: u8,
    /// Byte offset into the data set.
    #[arg(long, default_value_t = 0)]
    pub offset: u16,
    /// Packet type.
    #[arg(long = "type", value_enum, default_value = "data")]
    pub packet_type: PacketTypeArg,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
    /// Endpoint to publish to.
    #[arg(long, value_name = "ENDPOINT", default_value = HEADSET_1_CLIENT_TO_IMU)]
    pub send: String,
    /// Wait this long for a subscriber to attach before publishing.
    #[arg(long, default_value = "250ms")]
    pub settle: String,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    #[command(flatten)]
    pub frame: FrameArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Hex-encoded frame, or sentence text with --ascii.
    pub input: String,
    /// Treat the input as an ASCII sentence (`$BODY*XX`).
    #[arg(long)]
    pub ascii: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum PacketTypeArg {
    Ack,
    Nack,
    GetData,
    Data,
    SetData,
    StopAll,
    StopDid,
    StopPort,
}

impl From<PacketTypeArg> for PacketType {
    fn from(arg: PacketTypeArg) -> Self {
        match arg {
            PacketTypeArg::Ack => PacketType::Ack,
            PacketTypeArg::Nack => PacketType::Nack,
            PacketTypeArg::GetData => PacketType::GetData,
            PacketTypeArg::Data => PacketType::Data,
            PacketTypeArg::SetData => PacketType::SetData,
            PacketTypeArg::StopAll => PacketType::StopBroadcastsAllPorts,
            PacketTypeArg::StopDid => PacketType::StopDidBroadcast,
            PacketTypeArg::StopPort => PacketType::StopBroadcastsCurrentPort,
        }
    }
}

/// Flag cleared by Ctrl-C; long-running commands poll it.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

pub fn resolve_payload(args: &FrameArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(text) = &args.hex {
        return hex::decode(text.trim())
            .map_err(|err| CliError::new(USAGE, format!("--hex is not valid hex: {err}")));
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

/// Parse a duration such as `10ms`, `1.5s` or `2m`. A bare number is
/// milliseconds, the unit every bridge timing is tuned in.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let text = input.trim();
    let invalid = |why: &str| CliError::new(USAGE, format!("invalid duration {input:?}: {why}"));

    let split = text
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let unit_nanos: u128 = match unit {
        "" | "ms" => 1_000_000,
        "s" => 1_000_000_000,
        "m" => 60_000_000_000,
        _ => return Err(invalid("unit must be ms, s or m")),
    };

    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    let digits_only = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty()
        || !digits_only(whole)
        || !digits_only(fraction)
        || (number.contains('.') && fraction.is_empty())
        || fraction.len() > 18
    {
        return Err(invalid("expected a number like 10 or 0.5"));
    }

    let whole: u128 = whole
        .parse()
        .map_err(|_| invalid("value is too large"))?;
    let fraction_nanos = if fraction.is_empty() {
        0
    } else {
        let scale = 10u128.pow(fraction.len() as u32);
        let value: u128 = fraction
            .parse()
            .map_err(|_| invalid("expected a number like 10 or 0.5"))?;
        value * unit_nanos / scale
    };
    let nanos = whole
        .checked_mul(unit_nanos)
        .and_then(|n| n.checked_add(fraction_nanos))
        .ok_or_else(|| invalid("value is too large"))?;

    let secs = u64::try_from(nanos / 1_000_000_000).map_err(|_| invalid("value is too large"))?;
    let duration = Duration::new(secs, (nanos % 1_000_000_000) as u32);
    if duration.is_zero() {
        return Err(invalid("must be greater than zero"));
    }
    Ok(duration)
}

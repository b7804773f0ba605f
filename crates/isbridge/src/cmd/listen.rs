use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use isbridge_client::{open_connection, PubSubClient, PubSubTarget};
use isbridge_frame::PKT_BUF_SIZE;
use isbridge_transport::{Open, Stream, StreamError, StreamResult};
use tracing::{debug, warn};

use crate::cmd::{install_ctrlc_handler, parse_duration, ListenArgs};
use crate::exit::{client_error, stream_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_frame, print_payload, OutputFormat};

const IDLE_SLEEP: Duration = Duration::from_millis(2);

/// What `listen` reads from.
enum Feed {
    /// Validated frames from a pub/sub pair, printed whole.
    Frames { client: PubSubClient, source: String },
    /// Any stream from a connection string, printed as payload chunks.
    Payloads {
        stream: Box<dyn Stream>,
        source: String,
        buf: Box<[u8]>,
    },
}

impl Feed {
    fn open(args: &ListenArgs) -> CliResult<Self> {
        if let Some(spec) = &args.conn {
            let stream = open_connection(spec).map_err(|err| client_error("open failed", err))?;
            debug!(stream = %stream.describe(), "listening on connection string");
            return Ok(Feed::Payloads {
                stream,
                source: spec.clone(),
                buf: vec![0u8; PKT_BUF_SIZE].into_boxed_slice(),
            });
        }

        let mut client = PubSubClient::new();
        client
            .open(PubSubTarget::new(args.send.clone(), args.recv.clone()))
            .map_err(|err| stream_error("open failed", err))?;
        Ok(Feed::Frames {
            client,
            source: args.recv.clone(),
        })
    }

    /// Print at most one received item. `Ok(false)` when nothing was pending.
    fn print_next(&mut self, format: OutputFormat) -> StreamResult<bool> {
        match self {
            Feed::Frames { client, source } => match client.read_frame()? {
                Some(frame) => {
                    print_frame(&frame, source, format);
                    Ok(true)
                }
                None => Ok(false),
            },
            Feed::Payloads {
                stream,
                source,
                buf,
            } => match stream.read(buf)? {
                0 => Ok(false),
                n => {
                    print_payload(&buf[..n], source, format);
                    Ok(true)
                }
            },
        }
    }

    fn close(&mut self) -> StreamResult<()> {
        match self {
            Feed::Frames { client, .. } => client.close(),
            Feed::Payloads { stream, .. } => stream.close(),
        }
    }
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = args
        .timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?
        .map(|limit| Instant::now() + limit);

    let mut feed = Feed::open(&args)?;
    let running = install_ctrlc_handler()?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            if args.count.is_none() {
                break;
            }
            return Err(CliError::new(
                TIMEOUT,
                format!("received {printed} message(s) before timing out"),
            ));
        }

        match feed.print_next(format) {
            Ok(true) => {}
            Ok(false) => {
                std::thread::sleep(IDLE_SLEEP);
                continue;
            }
            Err(StreamError::Frame(err)) => {
                warn!(error = %err, "dropping invalid message");
                continue;
            }
            Err(err) => return Err(stream_error("receive failed", err)),
        }
        printed = printed.saturating_add(1);

        if args.count.is_some_and(|count| printed >= count) {
            break;
        }
    }

    feed.close()
        .map_err(|err| stream_error("close failed", err))?;
    Ok(SUCCESS)
}

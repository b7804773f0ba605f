use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use isbridge_transport::{ClientData, PubSocket, Stream, SubSocket, TcpServer};
use tracing::{debug, error, info, trace, warn};

use crate::config::BridgeOptions;
use crate::error::{BridgeError, Result};
use crate::status::BridgeStatus;

type FailureSlot = Arc<Mutex<Option<String>>>;

/// Forwards pub/sub traffic to TCP clients and TCP client data back to pub/sub.
///
/// While running, one thread moves every message received on the subscribe
/// endpoint to all connected clients, and another services the listening
/// server and publishes whatever clients send. Bytes are forwarded as-is in
/// both directions.
///
/// ```no_run
/// use isbridge_bridge::Bridge;
///
/// let mut bridge = Bridge::new();
/// bridge.start("tcp://127.0.0.1:7115", "tcp://127.0.0.1:7116", 8000)?;
/// println!("{}", bridge.status());
/// bridge.stop()?;
/// # Ok::<(), isbridge_bridge::BridgeError>(())
/// ```
pub struct Bridge {
    options: BridgeOptions,
    run: Option<Run>,
}

/// Everything owned by one successful `start`.
struct Run {
    subscribe_endpoint: String,
    publish_endpoint: String,
    server: Arc<TcpServer>,
    publisher: Arc<Mutex<PubSocket>>,
    shutdown: Arc<AtomicBool>,
    failure: FailureSlot,
    subscribe_task: JoinHandle<SubSocket>,
    publish_task: JoinHandle<()>,
}

impl Bridge {
    pub fn new() -> Self {
        Self::with_options(BridgeOptions::default())
    }

    pub fn with_options(options: BridgeOptions) -> Self {
        Self { options, run: None }
    }

    /// Open the subscribe socket, the publish socket and the listening
    /// server, in that order, then launch both forwarding tasks.
    ///
    /// On any failure everything opened so far is released and the bridge
    /// stays stopped. A failed bridge is cleaned up first and restarted.
    pub fn start(
        &mut self,
        subscribe_endpoint: &str,
        publish_endpoint: &str,
        listen_port: u16,
    ) -> Result<()> {
        if self.is_running() {
            return Err(BridgeError::AlreadyRunning);
        }
        if self.run.is_some() {
            self.stop()?;
        }

        let mut subscriber =
            SubSocket::connect_with_config(subscribe_endpoint, self.options.pubsub.clone())?;
        let mut publisher =
            match PubSocket::connect_with_config(publish_endpoint, self.options.pubsub.clone()) {
                Ok(publisher) => publisher,
                Err(err) => {
                    release("subscribe", &mut subscriber);
                    return Err(err.into());
                }
            };
        let server = match TcpServer::open_with_config(listen_port, self.options.server.clone()) {
            Ok(server) => server,
            Err(err) => {
                release("publish", &mut publisher);
                release("subscribe", &mut subscriber);
                return Err(err.into());
            }
        };

        let inbound = server.inbound();
        let server = Arc::new(server);
        let publisher = Arc::new(Mutex::new(publisher));
        let shutdown = Arc::new(AtomicBool::new(false));
        let failure: FailureSlot = Arc::new(Mutex::new(None));

        let subscribe_task = {
            let server = Arc::clone(&server);
            let shutdown = Arc::clone(&shutdown);
            let failure = Arc::clone(&failure);
            let recv_timeout = self.options.recv_timeout;
            thread::Builder::new()
                .name("isbridge-subscribe".to_string())
                .spawn(move || {
                    let _guard = TaskGuard::new("subscribe", &shutdown, &failure);
                    forward_subscribed(subscriber, &server, &shutdown, recv_timeout)
                })
        };
        let subscribe_task = match subscribe_task {
            Ok(handle) => handle,
            Err(err) => {
                server.close();
                return Err(BridgeError::Spawn(err));
            }
        };

        let publish_task = {
            let server = Arc::clone(&server);
            let publisher = Arc::clone(&publisher);
            let shutdown = Arc::clone(&shutdown);
            let failure = Arc::clone(&failure);
            let poll_interval = self.options.poll_interval;
            thread::Builder::new()
                .name("isbridge-publish".to_string())
                .spawn(move || {
                    let _guard = TaskGuard::new("publish", &shutdown, &failure);
                    forward_inbound(&server, &inbound, &publisher, &shutdown, poll_interval);
                })
        };
        let publish_task = match publish_task {
            Ok(handle) => handle,
            Err(err) => {
                shutdown.store(true, Ordering::Release);
                let subscriber = subscribe_task.join().ok();
                server.close();
                release("publish", &mut *lock(&publisher));
                if let Some(mut subscriber) = subscriber {
                    release("subscribe", &mut subscriber);
                }
                return Err(BridgeError::Spawn(err));
            }
        };

        info!(
            subscribe = subscribe_endpoint,
            publish = publish_endpoint,
            port = server.port(),
            "bridge started"
        );
        self.run = Some(Run {
            subscribe_endpoint: subscribe_endpoint.to_string(),
            publish_endpoint: publish_endpoint.to_string(),
            server,
            publisher,
            shutdown,
            failure,
            subscribe_task,
            publish_task,
        });
        Ok(())
    }

    /// Stop both tasks, wait for them, and release the listening server,
    /// the publish socket and the subscribe socket in that order.
    ///
    /// Stopping a stopped bridge succeeds and does nothing.
    pub fn stop(&mut self) -> Result<()> {
        let Some(run) = self.run.take() else {
            return Ok(());
        };

        run.shutdown.store(true, Ordering::Release);
        let subscriber = match run.subscribe_task.join() {
            Ok(subscriber) => Some(subscriber),
            Err(_) => {
                warn!("subscribe task panicked; its socket was dropped during unwinding");
                None
            }
        };
        if run.publish_task.join().is_err() {
            warn!("publish task panicked");
        }

        run.server.close();
        drop(run.server);
        release("publish", &mut *lock(&run.publisher));
        if let Some(mut subscriber) = subscriber {
            release("subscribe", &mut subscriber);
        }

        info!(
            subscribe = %run.subscribe_endpoint,
            publish = %run.publish_endpoint,
            "bridge stopped"
        );
        Ok(())
    }

    /// True while both forwarding tasks are alive and no stop was requested.
    pub fn is_running(&self) -> bool {
        self.run.as_ref().is_some_and(|run| lock(&run.failure).is_none())
    }

    pub fn status(&self) -> BridgeStatus {
        let Some(run) = &self.run else {
            return BridgeStatus::Stopped;
        };
        if let Some(reason) = lock(&run.failure).clone() {
            return BridgeStatus::Failed { reason };
        }
        BridgeStatus::Running {
            subscribe_endpoint: run.subscribe_endpoint.clone(),
            publish_endpoint: run.publish_endpoint.clone(),
            listen_port: run.server.port(),
        }
    }

    /// Publish `data` directly, serialized with the listener-to-publish task.
    pub fn publish(&self, data: &[u8]) -> Result<usize> {
        let run = self.run.as_ref().ok_or(BridgeError::NotRunning)?;
        let sent = lock(&run.publisher).write(data)?;
        Ok(sent)
    }

    /// Bound listen port; the ephemeral port when started with `0`.
    pub fn listen_port(&self) -> Option<u16> {
        self.run.as_ref().map(|run| run.server.port())
    }

    /// TCP clients currently connected to the listening server.
    pub fn client_count(&self) -> usize {
        self.run
            .as_ref()
            .map_or(0, |run| run.server.client_count())
    }

    pub fn options(&self) -> &BridgeOptions {
        &self.options
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Subscribe side to every connected TCP client. Hands the socket back on exit.
fn forward_subscribed(
    mut subscriber: SubSocket,
    server: &TcpServer,
    shutdown: &AtomicBool,
    recv_timeout: Duration,
) -> SubSocket {
    debug!(socket = %subscriber.describe(), "subscribe forwarding started");
    while !shutdown.load(Ordering::Acquire) {
        match subscriber.recv_timeout(recv_timeout) {
            Ok(Some(message)) => {
                let sent = server.broadcast(&message);
                trace!(size = message.len(), sent, "forwarded to clients");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, "subscribe receive failed");
                thread::sleep(recv_timeout);
            }
        }
    }
    debug!("subscribe forwarding stopped");
    subscriber
}

/// Listening-server housekeeping plus client data to the publish socket.
fn forward_inbound(
    server: &TcpServer,
    inbound: &Receiver<ClientData>,
    publisher: &Mutex<PubSocket>,
    shutdown: &AtomicBool,
    poll_interval: Duration,
) {
    debug!(port = server.port(), "publish forwarding started");
    while !shutdown.load(Ordering::Acquire) {
        server.update();
        while let Ok(message) = inbound.try_recv() {
            match lock(publisher).write(&message.data) {
                Ok(sent) => trace!(client = message.client_id, sent, "forwarded to publish socket"),
                Err(err) => warn!(client = message.client_id, error = %err, "publish failed"),
            }
        }
        thread::sleep(poll_interval);
    }
    debug!("publish forwarding stopped");
}

/// Close a pub/sub socket during teardown; failures are only logged.
fn release(role: &str, socket: &mut dyn Stream) {
    if let Err(err) = socket.close() {
        warn!(role, error = %err, "closing pub/sub socket failed");
    }
}

/// Records an unexpected task exit so the bridge stops reporting Running.
struct TaskGuard {
    name: &'static str,
    shutdown: Arc<AtomicBool>,
    failure: FailureSlot,
}

impl TaskGuard {
    fn new(name: &'static str, shutdown: &Arc<AtomicBool>, failure: &FailureSlot) -> Self {
        Self {
            name,
            shutdown: Arc::clone(shutdown),
            failure: Arc::clone(failure),
        }
    }
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if self.shutdown.load(Ordering::Acquire) {
            return;
        }
        let reason = if thread::panicking() {
            format!("{} task panicked", self.name)
        } else {
            format!("{} task exited unexpectedly", self.name)
        };
        error!(task = self.name, "{reason}");
        lock(&self.failure).get_or_insert(reason);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

//! MAX! protocol engine
//!
//! [`MaxDriver`] owns the connection to the CUL stick. It turns high-level
//! commands into packets for the link driver and inbound lines into
//! [`MaxEvent`]s on a broadcast channel.
//!
//! A connection consists of three kinds of background tasks: the reader
//! (owns the read half), the link driver (owns the write half) and the
//! periodic time broadcast and credit poll. Background tasks only hold a weak
//! reference to the driver, so dropping the last clone stops them.

mod commands;
mod dispatch;
mod events;

pub use commands::group_flags;
pub use events::{DeviceReport, MaxEvent, PairDevice};

use futures::StreamExt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::codec::LinesCodecError;
use tracing::{debug, error, info, warn};

use crate::config::CulConfig;
use crate::device::Address;
use crate::protocol::{
    handshake, line_reader, open_port, Delivery, HandshakeOutcome, HandshakeTiming, LinkDriver,
    LinkHandle, LinkStatus, PacketBuilder, ProtocolError,
};

/// Events buffered per subscriber before the slowest one starts lagging
pub const EVENT_CAPACITY: usize = 256;

struct Inner {
    config: CulConfig,
    events: broadcast::Sender<MaxEvent>,
    link: RwLock<Option<LinkHandle>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    counter: AtomicU8,
    pairing: AtomicBool,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let tasks = self.tasks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
        if let Some(link) = self.link.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            link.close();
        }
    }
}

/// Protocol engine for one CUL stick
#[derive(Clone)]
pub struct MaxDriver {
    inner: Arc<Inner>,
}

impl MaxDriver {
    /// Create a driver; nothing is opened until [`connect`](Self::connect)
    pub fn new(config: CulConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let pairing = AtomicBool::new(config.pairing_enabled);
        Self {
            inner: Arc::new(Inner {
                config,
                events,
                link: RwLock::new(None),
                tasks: Mutex::new(Vec::new()),
                counter: AtomicU8::new(1),
                pairing,
            }),
        }
    }

    fn from_weak(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Driver configuration
    pub fn config(&self) -> &CulConfig {
        &self.inner.config
    }

    /// Address this controller sends from
    pub fn base_address(&self) -> Address {
        self.inner.config.base_address
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<MaxEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a link to the stick is up
    pub fn is_connected(&self) -> bool {
        self.link().is_some()
    }

    /// Enable or disable answering pairing requests
    pub fn set_pairing(&self, enabled: bool) {
        info!(enabled, "pairing mode changed");
        self.inner.pairing.store(enabled, Ordering::Relaxed);
    }

    /// Whether pairing requests are answered
    pub fn pairing_enabled(&self) -> bool {
        self.inner.pairing.load(Ordering::Relaxed)
    }

    /// Last credit balance reported by the stick
    pub fn credits(&self) -> Option<u32> {
        self.link().map(|link| link.credits())
    }

    /// Snapshot of the link driver's queues
    pub async fn link_status(&self) -> Result<LinkStatus, ProtocolError> {
        match self.link() {
            Some(link) => link.status().await,
            None => Err(ProtocolError::NotConnected),
        }
    }

    pub(crate) fn link(&self) -> Option<LinkHandle> {
        self.inner
            .link
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn emit(&self, event: MaxEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn next_counter(&self) -> u8 {
        self.inner.counter.fetch_add(1, Ordering::Relaxed)
    }

    fn has_tasks(&self) -> bool {
        !self
            .inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    fn push_task(&self, task: JoinHandle<()>) {
        self.inner
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    /// Open the serial port, run the handshake and start the link
    ///
    /// A stick that never reports its firmware version is not an error: the
    /// link starts anyway and the outcome says so.
    pub async fn connect(&self) -> Result<HandshakeOutcome, ProtocolError> {
        if self.is_connected() || self.has_tasks() {
            return Err(ProtocolError::AlreadyConnected);
        }
        let config = &self.inner.config;
        config
            .validate()
            .map_err(|e| ProtocolError::InvalidArgument(e.to_string()))?;

        let port = open_port(&config.serial_port, config.baud_rate)?;
        info!(port = %config.serial_port, baud_rate = config.baud_rate, "serial port opened");
        let (reader, writer) = tokio::io::split(port);

        let timing = HandshakeTiming {
            ready_timeout: config.ready_timeout(),
            ..HandshakeTiming::default()
        };
        self.start_with_handshake(reader, writer, timing).await
    }

    async fn start_with_handshake<R, W>(
        &self,
        reader: R,
        mut writer: W,
        timing: HandshakeTiming,
    ) -> Result<HandshakeOutcome, ProtocolError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        // Subscribe before the reader can see the version line
        let ready = self.ready_signal();
        self.spawn_reader(reader);

        let outcome = match handshake(&mut writer, self.base_address(), ready, timing).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(error = %err, "handshake failed, starting link anyway");
                HandshakeOutcome {
                    firmware_confirmed: false,
                }
            }
        };

        // The reader disconnects when the port closes under the handshake
        if !self.has_tasks() {
            warn!("serial port closed during handshake");
            return Err(ProtocolError::ConnectionFailed(
                "serial port closed during handshake".to_string(),
            ));
        }
        self.start_link(writer);
        Ok(outcome)
    }

    /// Run on an already opened transport, skipping the handshake
    pub fn attach<R, W>(&self, reader: R, writer: W) -> Result<(), ProtocolError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        if self.is_connected() || self.has_tasks() {
            return Err(ProtocolError::AlreadyConnected);
        }
        self.spawn_reader(reader);
        self.start_link(writer);
        debug!("attached to transport");
        Ok(())
    }

    /// Close the link and stop background tasks
    ///
    /// Pending deliveries fail with [`ProtocolError::LinkClosed`]. Returns
    /// whether anything was open.
    pub fn disconnect(&self) -> bool {
        let link = self
            .inner
            .link
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let tasks = std::mem::take(
            &mut *self
                .inner
                .tasks
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let was_open = link.is_some() || !tasks.is_empty();
        if let Some(link) = link {
            link.close();
        }
        for task in tasks {
            task.abort();
        }
        if was_open {
            info!("disconnected from CUL");
            self.emit(MaxEvent::Close);
        }
        was_open
    }

    /// Assign the next message counter and hand the packet to the link
    pub fn build_and_send(&self, builder: PacketBuilder) -> Delivery {
        let Some(link) = self.link() else {
            debug!(command = %builder.command(), "not connected, dropping packet");
            return Delivery::failed(ProtocolError::NotConnected);
        };
        let packet = builder.build(self.next_counter());
        debug!(
            command = %command_label(&packet),
            dst = %packet.destination,
            "queueing packet"
        );
        link.enqueue(packet)
    }

    fn ready_signal(&self) -> impl Future<Output = bool> + Send + 'static {
        let mut events = self.subscribe();
        async move {
            loop {
                match events.recv().await {
                    Ok(MaxEvent::Ready) => return true,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return false,
                }
            }
        }
    }

    fn spawn_reader<R>(&self, reader: R)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut lines = line_reader(reader);
            while let Some(item) = lines.next().await {
                let Some(driver) = MaxDriver::from_weak(&weak) else {
                    return;
                };
                match item {
                    Ok(line) => driver.handle_inbound_line(&line),
                    Err(LinesCodecError::MaxLineLengthExceeded) => {
                        warn!("discarding overlong line from CUL");
                    }
                    Err(LinesCodecError::Io(err)) => {
                        error!(error = %err, "serial read failed");
                        driver.emit(MaxEvent::Error(err.to_string()));
                        break;
                    }
                }
            }
            if let Some(driver) = MaxDriver::from_weak(&weak) {
                debug!("serial port closed");
                driver.disconnect();
            }
        });
        self.push_task(task);
    }

    fn start_link<W>(&self, writer: W)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (link, _task) = LinkDriver::spawn(writer);
        *self
            .inner
            .link
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(link);

        let config = &self.inner.config;
        if let Some(period) = config.time_broadcast_interval() {
            self.spawn_periodic(period, |driver| {
                debug!("broadcasting time");
                drop(driver.send_time_information(Address::BROADCAST, None));
            });
        }
        if let Some(period) = config.credit_poll_interval() {
            self.spawn_periodic(period, |driver| drop(driver.get_credits()));
        }
    }

    fn spawn_periodic(&self, period: Duration, tick: fn(&MaxDriver)) {
        let weak = Arc::downgrade(&self.inner);
        let task = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(driver) = MaxDriver::from_weak(&weak) else {
                    break;
                };
                tick(&driver);
            }
        });
        self.push_task(task);
    }
}

fn command_label(packet: &crate::protocol::Packet) -> String {
    match packet.command_id() {
        Some(command) => command.to_string(),
        None => format!("{:02x}", packet.command),
    }
}

impl std::fmt::Debug for MaxDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaxDriver")
            .field("base_address", &self.base_address())
            .field("connected", &self.is_connected())
            .field("pairing", &self.pairing_enabled())
            .finish()
    }
}

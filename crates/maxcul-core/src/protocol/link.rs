//! Link driver
//!
//! One task per port owns the writer half, the message queue, the write queue
//! and the credit counter. Everything else talks to it through a
//! [`LinkHandle`]. Packets go through `queued -> sending -> awaiting ack ->
//! acked | timed out`, one at a time; the write queue paces raw lines
//! against the stick's duty-cycle credits.

use futures::future::{try_join_all, TryJoinAll};
use std::collections::VecDeque;
use std::future::{self, Future};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, warn};

use super::{
    Packet, PacketKind, PacketStatus, ProtocolError, ACK_TIMEOUT_MS, CREDIT_THRESHOLD,
    MAX_SEND_RETRIES,
};
use crate::device::{Address, DeviceType};

/// Credit queries resolve locally after this delay
pub const CREDIT_QUERY_RESOLVE_MS: u64 = 50;

/// Wait after a credit query sent in place of a held-back command
pub const LOW_CREDIT_WAIT_MS: u64 = 5000;

/// Wait after a real command before the next write
pub const COMMAND_GAP_MS: u64 = 2000;

/// Wait before retrying a failed write
pub const WRITE_RETRY_MS: u64 = 100;

const CREDIT_QUERY_LINE: &str = "X\n";

type DeliveryResult = Result<(), ProtocolError>;

/// Completion of one submitted packet
///
/// Resolves once the device acked (or, for credit queries and time
/// broadcasts, once the link is done with it). Dropping it does not cancel the
/// packet.
#[derive(Debug)]
#[must_use = "a Delivery does nothing unless awaited, but the packet is sent either way"]
pub struct Delivery {
    inner: DeliveryInner,
}

#[derive(Debug)]
enum DeliveryInner {
    Pending(oneshot::Receiver<DeliveryResult>),
    Failed(Option<ProtocolError>),
    All(Pin<Box<TryJoinAll<Delivery>>>),
}

impl Delivery {
    fn pending(rx: oneshot::Receiver<DeliveryResult>) -> Self {
        Self {
            inner: DeliveryInner::Pending(rx),
        }
    }

    /// A delivery that has already failed
    pub fn failed(err: ProtocolError) -> Self {
        Self {
            inner: DeliveryInner::Failed(Some(err)),
        }
    }

    /// Resolves when every delivery succeeded, or with the first failure
    pub fn all(deliveries: Vec<Delivery>) -> Self {
        Self {
            inner: DeliveryInner::All(Box::pin(try_join_all(deliveries))),
        }
    }
}

impl Future for Delivery {
    type Output = DeliveryResult;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            DeliveryInner::Pending(rx) => Pin::new(rx)
                .poll(cx)
                .map(|res| res.unwrap_or(Err(ProtocolError::LinkClosed))),
            DeliveryInner::Failed(err) => {
                Poll::Ready(Err(err.take().unwrap_or(ProtocolError::LinkClosed)))
            }
            DeliveryInner::All(all) => all.as_mut().poll(cx).map_ok(|_| ()),
        }
    }
}

/// Snapshot of the link driver's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkStatus {
    /// Packets waiting behind the current one
    pub queued: usize,
    /// A packet is being sent or awaits its ack
    pub in_flight: bool,
    /// Raw lines waiting in the write queue
    pub pending_writes: usize,
    /// Last known credit balance
    pub credits: u32,
}

enum LinkCommand {
    Enqueue {
        packet: Packet,
        reply: oneshot::Sender<DeliveryResult>,
    },
    Ack(Address),
    Credits(u32),
    Status(oneshot::Sender<LinkStatus>),
    Close,
}

/// Cloneable handle to a running [`LinkDriver`]
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::UnboundedSender<LinkCommand>,
    credits: watch::Receiver<u32>,
}

impl LinkHandle {
    /// Queue a packet for transmission
    pub fn enqueue(&self, packet: Packet) -> Delivery {
        let (reply, rx) = oneshot::channel();
        // A closed link drops the reply sender, which resolves as LinkClosed
        let _ = self.tx.send(LinkCommand::Enqueue { packet, reply });
        Delivery::pending(rx)
    }

    /// Report an OK ack received from `source`
    pub fn ack(&self, source: Address) {
        let _ = self.tx.send(LinkCommand::Ack(source));
    }

    /// Record a credit report from the stick
    pub fn update_credits(&self, credits: u32) {
        let _ = self.tx.send(LinkCommand::Credits(credits));
    }

    /// Last known credit balance
    pub fn credits(&self) -> u32 {
        *self.credits.borrow()
    }

    /// Snapshot of queue and credit state
    pub async fn status(&self) -> Result<LinkStatus, ProtocolError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(LinkCommand::Status(reply))
            .map_err(|_| ProtocolError::LinkClosed)?;
        rx.await.map_err(|_| ProtocolError::LinkClosed)
    }

    /// Stop the driver, rejecting everything still pending
    pub fn close(&self) {
        let _ = self.tx.send(LinkCommand::Close);
    }

    /// Whether the driver task has stopped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for LinkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkHandle")
            .field("credits", &self.credits())
            .field("closed", &self.is_closed())
            .finish()
    }
}

struct Queued {
    packet: Packet,
    raw: String,
    reply: Option<oneshot::Sender<DeliveryResult>>,
}

enum Wake {
    Command(LinkCommand),
    Closed,
    AckTimeout,
    LocalResolve,
    WriteSlot,
}

/// Owns the writer half of the port and serializes all traffic to it
pub struct LinkDriver<W> {
    writer: W,
    rx: mpsc::UnboundedReceiver<LinkCommand>,
    credits: watch::Sender<u32>,
    queue: VecDeque<Queued>,
    current: Option<Queued>,
    writes: VecDeque<String>,
    ack_deadline: Option<Instant>,
    local_resolve_at: Option<Instant>,
    next_write_at: Option<Instant>,
}

impl<W> LinkDriver<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Create a driver and its handle; the driver does nothing until [`run`](Self::run)
    pub fn new(writer: W) -> (Self, LinkHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (credits, credits_rx) = watch::channel(0);
        let driver = Self {
            writer,
            rx,
            credits,
            queue: VecDeque::new(),
            current: None,
            writes: VecDeque::new(),
            ack_deadline: None,
            local_resolve_at: None,
            next_write_at: None,
        };
        let handle = LinkHandle {
            tx,
            credits: credits_rx,
        };
        (driver, handle)
    }

    /// Create a driver and run it on the current runtime
    pub fn spawn(writer: W) -> (LinkHandle, JoinHandle<()>) {
        let (driver, handle) = Self::new(writer);
        (handle, tokio::spawn(driver.run()))
    }

    /// Drive the link until closed or every handle is dropped
    pub async fn run(mut self) {
        debug!("link driver started");
        loop {
            // Commands first, so an ack that races its own timeout still counts
            let wake = tokio::select! {
                biased;
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => Wake::Command(cmd),
                    None => Wake::Closed,
                },
                _ = sleep_until_opt(self.ack_deadline) => Wake::AckTimeout,
                _ = sleep_until_opt(self.local_resolve_at) => Wake::LocalResolve,
                _ = sleep_until_opt(self.next_write_at) => Wake::WriteSlot,
            };

            match wake {
                Wake::Command(LinkCommand::Close) | Wake::Closed => break,
                Wake::Command(cmd) => self.handle_command(cmd),
                Wake::AckTimeout => self.on_ack_timeout(),
                Wake::LocalResolve => self.on_local_resolve(),
                Wake::WriteSlot => self.write_next().await,
            }
        }
        self.shutdown();
        debug!("link driver stopped");
    }

    fn handle_command(&mut self, cmd: LinkCommand) {
        match cmd {
            LinkCommand::Enqueue { packet, reply } => self.enqueue(packet, reply),
            LinkCommand::Ack(source) => self.on_ack(source),
            LinkCommand::Credits(credits) => {
                self.credits.send_replace(credits);
            }
            LinkCommand::Status(reply) => {
                let _ = reply.send(LinkStatus {
                    queued: self.queue.len(),
                    in_flight: self.current.is_some(),
                    pending_writes: self.writes.len(),
                    credits: *self.credits.borrow(),
                });
            }
            LinkCommand::Close => {}
        }
    }

    fn enqueue(&mut self, packet: Packet, reply: oneshot::Sender<DeliveryResult>) {
        let raw = if packet.is_credit_query() {
            "X".to_string()
        } else {
            packet.to_hex()
        };
        let urgent = packet.device_type == Some(DeviceType::ShutterContact);
        let queued = Queued {
            packet,
            raw,
            reply: Some(reply),
        };
        if urgent {
            self.queue.push_front(queued);
        } else {
            self.queue.push_back(queued);
        }
        self.advance();
    }

    fn advance(&mut self) {
        if self.current.is_some() {
            return;
        }
        if let Some(next) = self.queue.pop_front() {
            self.current = Some(next);
            self.transmit();
        }
    }

    fn transmit(&mut self) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        let line = current.packet.wire_line();
        match current.packet.kind {
            PacketKind::CreditQuery => {
                current.packet.status = PacketStatus::Sent;
                self.local_resolve_at =
                    Some(Instant::now() + Duration::from_millis(CREDIT_QUERY_RESOLVE_MS));
            }
            // The ack wait starts once the line is on the port, see `on_written`
            PacketKind::Frame => {
                debug!(raw = %current.raw, tries = current.packet.send_tries, "queueing packet");
            }
        }
        self.queue_write(line);
    }

    fn on_ack(&mut self, source: Address) {
        let matches = self.current.as_ref().is_some_and(|current| {
            current.packet.kind == PacketKind::Frame
                && current.packet.status == PacketStatus::Sent
                && (current.packet.destination.is_broadcast()
                    || current.packet.destination == source)
        });
        if !matches {
            debug!(%source, "ack does not match a packet in flight");
            return;
        }

        self.ack_deadline = None;
        if let Some(current) = self.current.take() {
            // A retransmission still waiting for its slot is no longer needed
            let line = current.packet.wire_line();
            self.writes.retain(|pending| *pending != line);
            resolve(current);
        }
        self.advance();
    }

    fn on_ack_timeout(&mut self) {
        self.ack_deadline = None;
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.packet.send_tries < MAX_SEND_RETRIES {
            current.packet.send_tries += 1;
            debug!(raw = %current.raw, tries = current.packet.send_tries, "no ack, retransmitting");
            self.transmit();
            return;
        }

        if let Some(current) = self.current.take() {
            let line = current.packet.wire_line();
            self.writes.retain(|pending| *pending != line);
            if current.packet.is_time_broadcast() {
                resolve(current);
            } else {
                let raw = current.raw.clone();
                reject(current, ProtocolError::NoResponse { raw });
            }
        }
        self.advance();
    }

    fn on_local_resolve(&mut self) {
        self.local_resolve_at = None;
        if let Some(current) = self.current.take() {
            resolve(current);
        }
        self.advance();
    }

    fn queue_write(&mut self, line: String) {
        if !self.writes.contains(&line) {
            self.writes.push_back(line);
        }
        if self.next_write_at.is_none() {
            self.next_write_at = Some(Instant::now());
        }
    }

    fn schedule_write(&mut self, delay_ms: u64) {
        self.next_write_at = Some(Instant::now() + Duration::from_millis(delay_ms));
    }

    async fn write_next(&mut self) {
        self.next_write_at = None;
        let Some(front) = self.writes.front().cloned() else {
            return;
        };

        if front.starts_with('X') {
            match self.write_line(&front).await {
                Ok(()) => {
                    self.writes.pop_front();
                    if !self.writes.is_empty() {
                        self.schedule_write(0);
                    }
                }
                Err(err) => self.on_write_error(front, err),
            }
            return;
        }

        let credits = *self.credits.borrow();
        if credits < CREDIT_THRESHOLD {
            debug!(credits, "credits low, holding command back");
            match self.write_line(CREDIT_QUERY_LINE).await {
                Ok(()) => self.schedule_write(LOW_CREDIT_WAIT_MS),
                Err(err) => {
                    warn!(error = %err, "credit query write failed");
                    self.schedule_write(WRITE_RETRY_MS);
                }
            }
            return;
        }

        match self.write_line(&front).await {
            Ok(()) => {
                self.writes.pop_front();
                self.writes.retain(|pending| pending != CREDIT_QUERY_LINE);
                self.writes.push_front(CREDIT_QUERY_LINE.to_string());
                self.schedule_write(COMMAND_GAP_MS);
                self.on_written(&front);
            }
            Err(err) => self.on_write_error(front, err),
        }
    }

    fn on_written(&mut self, line: &str) {
        let Some(current) = self.current.as_mut() else {
            return;
        };
        if current.packet.kind != PacketKind::Frame || current.packet.wire_line() != line {
            return;
        }
        debug!(raw = %current.raw, tries = current.packet.send_tries, "packet sent");
        current.packet.status = PacketStatus::Sent;
        self.ack_deadline = Some(Instant::now() + Duration::from_millis(ACK_TIMEOUT_MS));
    }

    async fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        if let Err(err) = self.writer.flush().await {
            warn!(error = %err, line = line.trim_end(), "drain failed");
        }
        Ok(())
    }

    fn on_write_error(&mut self, line: String, err: io::Error) {
        warn!(error = %err, line = line.trim_end(), "write failed");
        self.schedule_write(WRITE_RETRY_MS);

        let is_current = self
            .current
            .as_ref()
            .is_some_and(|current| current.packet.wire_line() == line);
        if !is_current {
            return;
        }

        self.writes.pop_front();
        self.ack_deadline = None;
        self.local_resolve_at = None;
        if let Some(current) = self.current.take() {
            let raw = current.raw.clone();
            reject(current, ProtocolError::SendFailed { raw, source: err });
        }
        self.advance();
    }

    fn shutdown(&mut self) {
        self.ack_deadline = None;
        self.local_resolve_at = None;
        self.next_write_at = None;
        self.writes.clear();
        if let Some(current) = self.current.take() {
            reject(current, ProtocolError::LinkClosed);
        }
        while let Some(queued) = self.queue.pop_front() {
            reject(queued, ProtocolError::LinkClosed);
        }
    }
}

fn resolve(mut queued: Queued) {
    queued.packet.status = PacketStatus::Acked;
    debug!(raw = %queued.raw, "packet done");
    if let Some(reply) = queued.reply.take() {
        let _ = reply.send(Ok(()));
    }
}

fn reject(mut queued: Queued, err: ProtocolError) {
    queued.packet.status = PacketStatus::Rejected;
    warn!(error = %err, "packet rejected");
    if let Some(reply) = queued.reply.take() {
        let _ = reply.send(Err(err));
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CommandId, PacketBuilder};

    #[tokio::test]
    async fn test_failed_delivery() {
        let delivery = Delivery::failed(ProtocolError::NotConnected);
        assert!(matches!(delivery.await, Err(ProtocolError::NotConnected)));
    }

    #[tokio::test]
    async fn test_all_reports_first_failure() {
        let all = Delivery::all(vec![
            Delivery::failed(ProtocolError::NotConnected),
            Delivery::failed(ProtocolError::LinkClosed),
        ]);
        assert!(all.await.is_err());
        assert!(Delivery::all(Vec::new()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_credit_query_resolves_locally() {
        let (handle, _task) = LinkDriver::spawn(tokio::io::sink());
        handle.enqueue(Packet::credit_query()).await.unwrap();
        let status = handle.status().await.unwrap();
        assert!(!status.in_flight);
        assert_eq!(status.pending_writes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_rejects_pending() {
        let (handle, task) = LinkDriver::spawn(tokio::io::sink());
        let packet = PacketBuilder::new(CommandId::WakeUp)
            .destination("160bd0".parse().unwrap())
            .build(1);
        let delivery = handle.enqueue(packet);
        handle.close();
        task.await.unwrap();

        assert!(matches!(delivery.await, Err(ProtocolError::LinkClosed)));
        assert!(handle.is_closed());
        assert!(matches!(
            handle.enqueue(Packet::credit_query()).await,
            Err(ProtocolError::LinkClosed)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_credits_visible_through_handle() {
        let (handle, _task) = LinkDriver::spawn(tokio::io::sink());
        handle.update_credits(321);
        let status = handle.status().await.unwrap();
        assert_eq!(status.credits, 321);
        assert_eq!(handle.credits(), 321);
    }
}

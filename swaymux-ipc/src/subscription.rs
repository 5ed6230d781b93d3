//! Continuous demultiplexing of unsolicited events to registered handlers.
//!
//! A [`Subscription`] owns a connection dedicated to events; it is never
//! shared with request/reply calls, because unsolicited events and call
//! replies cannot be told apart by position on one stream. The dispatch
//! loop ([`Subscription::run`]) exclusively consumes the read half; the
//! write half sits behind its own mutex and carries only subscribe
//! requests, so registering a handler can never deadlock against an
//! in-progress read. Subscribe replies are picked up by the loop, which
//! reports rejections through the error sink.

use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use log::{debug, trace, warn};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::{Mutex, mpsc};
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

use crate::client::{ConnectError, SOCKET_ENV};
use crate::codec::{ByteOrder, Packet, PacketCodec, PacketCodecError};
use crate::event::{
    BindingChange, ModeChange, ShutdownChange, Tick, WindowChange,
    WorkspaceChange,
};
use crate::message::{EventType, PayloadType};
use crate::reply::CommandOutcome;

/// Identifies one registered handler. Allocated by atomic increment;
/// zero is reserved and never issued.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cookie(u32);

impl Cookie {
    pub const fn get(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("subscription is closed")]
    Closed,
    #[error("dispatch loop is already running")]
    AlreadyRunning,
}

/// Structured error raised by the dispatch loop, distinct from a
/// synchronous call error. Delivered to every registered error observer.
#[derive(Debug, Error)]
pub enum MonitoringError {
    #[error("event transport: {0}")]
    Transport(#[from] PacketCodecError),
    #[error("event stream closed by the compositor")]
    StreamClosed,
    #[error("bad event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("unknown payload type `{0:#x}`")]
    UnknownPayloadType(u32),
    #[error("no dispatch for `{0}` events")]
    UnsupportedEvent(&'static str),
    #[error("event subscription rejected by the compositor")]
    SubscribeRejected { reason: Option<String> },
    #[error("failed to send a subscribe request: {0}")]
    SubscribeSend(#[source] PacketCodecError),
}

type Handler<T> = Arc<dyn Fn(T) + Send + Sync + 'static>;
type HandlerMap<T> = StdMutex<HashMap<Cookie, Handler<T>>>;

fn lock_or_recover<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared<S> {
    cancel: CancellationToken,
    next_cookie: AtomicU32,
    writer: Mutex<Option<SplitSink<Framed<S, PacketCodec>, Packet>>>,
    reader: Mutex<Option<SplitStream<Framed<S, PacketCodec>>>>,
    observers: StdMutex<Vec<mpsc::UnboundedSender<Arc<MonitoringError>>>>,
    workspaces: HandlerMap<WorkspaceChange>,
    modes: HandlerMap<ModeChange>,
    windows: HandlerMap<WindowChange>,
    bindings: HandlerMap<BindingChange>,
    shutdowns: HandlerMap<ShutdownChange>,
    ticks: HandlerMap<Tick>,
}

/// Event demultiplexer over a dedicated connection.
///
/// Cheap to clone; clones share the connection and the handler
/// registries, so a handler may hold a clone and call
/// [`Subscription::close`] from inside a callback.
pub struct Subscription<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for Subscription<S> {
    fn clone(&self) -> Self {
        Subscription {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Subscription<UnixStream> {
    /// Connects a dedicated event connection to the socket named by
    /// `SWAYSOCK`, little-endian header fields.
    pub async fn connect() -> Result<Self, ConnectError> {
        let path = env::var_os(SOCKET_ENV).ok_or(ConnectError::SocketNotSet)?;
        Self::connect_to(path, ByteOrder::Little).await
    }

    pub async fn connect_to(
        path: impl AsRef<Path>,
        order: ByteOrder,
    ) -> Result<Self, ConnectError> {
        debug!("connecting event stream to {:?}", path.as_ref());
        let stream = UnixStream::connect(path).await?;

        Ok(Self::new(stream, order))
    }
}

impl<S> Subscription<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, order: ByteOrder) -> Self {
        let framed = Framed::new(stream, PacketCodec::new(order));
        let (writer, reader) = framed.split();

        Subscription {
            shared: Arc::new(Shared {
                cancel: CancellationToken::new(),
                next_cookie: AtomicU32::new(0),
                writer: Mutex::new(Some(writer)),
                reader: Mutex::new(Some(reader)),
                observers: StdMutex::new(Vec::new()),
                workspaces: HandlerMap::default(),
                modes: HandlerMap::default(),
                windows: HandlerMap::default(),
                bindings: HandlerMap::default(),
                shutdowns: HandlerMap::default(),
                ticks: HandlerMap::default(),
            }),
        }
    }

    /// Registers an additional error observer. Every monitoring error is
    /// delivered to every observer over its own unbounded channel; a slow
    /// observer cannot block another observer or the dispatch loop.
    pub fn errors(&self) -> mpsc::UnboundedReceiver<Arc<MonitoringError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock_or_recover(&self.shared.observers).push(tx);
        rx
    }

    pub async fn workspace_changes<F>(
        &self,
        handler: F,
    ) -> Result<Cookie, SubscriptionError>
    where
        F: Fn(WorkspaceChange) + Send + Sync + 'static,
    {
        self.register(&self.shared.workspaces, EventType::Workspace, handler)
            .await
    }

    pub async fn mode_changes<F>(
        &self,
        handler: F,
    ) -> Result<Cookie, SubscriptionError>
    where
        F: Fn(ModeChange) + Send + Sync + 'static,
    {
        self.register(&self.shared.modes, EventType::Mode, handler).await
    }

    pub async fn window_changes<F>(
        &self,
        handler: F,
    ) -> Result<Cookie, SubscriptionError>
    where
        F: Fn(WindowChange) + Send + Sync + 'static,
    {
        self.register(&self.shared.windows, EventType::Window, handler).await
    }

    pub async fn binding_changes<F>(
        &self,
        handler: F,
    ) -> Result<Cookie, SubscriptionError>
    where
        F: Fn(BindingChange) + Send + Sync + 'static,
    {
        self.register(&self.shared.bindings, EventType::Binding, handler)
            .await
    }

    pub async fn shutdown_changes<F>(
        &self,
        handler: F,
    ) -> Result<Cookie, SubscriptionError>
    where
        F: Fn(ShutdownChange) + Send + Sync + 'static,
    {
        self.register(&self.shared.shutdowns, EventType::Shutdown, handler)
            .await
    }

    pub async fn ticks<F>(&self, handler: F) -> Result<Cookie, SubscriptionError>
    where
        F: Fn(Tick) + Send + Sync + 'static,
    {
        self.register(&self.shared.ticks, EventType::Tick, handler).await
    }

    /// Removes the cookie from every registry; a no-op when the cookie is
    /// absent. No protocol-level unsubscribe is sent: once an event
    /// category is subscribed it stays subscribed for the life of the
    /// connection, even with zero local handlers.
    pub fn remove_handler(&self, cookie: Cookie) {
        lock_or_recover(&self.shared.workspaces).remove(&cookie);
        lock_or_recover(&self.shared.modes).remove(&cookie);
        lock_or_recover(&self.shared.windows).remove(&cookie);
        lock_or_recover(&self.shared.bindings).remove(&cookie);
        lock_or_recover(&self.shared.shutdowns).remove(&cookie);
        lock_or_recover(&self.shared.ticks).remove(&cookie);
    }

    /// Clears every registry and tears the connection down. Idempotent.
    /// Registration fails deterministically afterwards.
    pub fn close(&self) {
        self.shared.cancel.cancel();

        lock_or_recover(&self.shared.workspaces).clear();
        lock_or_recover(&self.shared.modes).clear();
        lock_or_recover(&self.shared.windows).clear();
        lock_or_recover(&self.shared.bindings).clear();
        lock_or_recover(&self.shared.shutdowns).clear();
        lock_or_recover(&self.shared.ticks).clear();

        // Drop whichever connection halves are not in use right now; the
        // dispatch loop drops its half when it observes the cancellation.
        if let Ok(mut writer) = self.shared.writer.try_lock() {
            *writer = None;
        }
        if let Ok(mut reader) = self.shared.reader.try_lock() {
            *reader = None;
        }
    }

    /// The dispatch loop. Blocks until [`Subscription::close`] or until
    /// the transport is invalidated; protocol-level anomalies (magic
    /// mismatch, unknown payload types, undecodable payloads, rejected
    /// subscriptions) are reported to the error sink and never stop the
    /// loop.
    pub async fn run(&self) -> Result<(), SubscriptionError> {
        let mut reader = {
            let mut slot = self.shared.reader.lock().await;
            match slot.take() {
                Some(reader) => reader,
                None if self.shared.cancel.is_cancelled() => {
                    return Err(SubscriptionError::Closed);
                }
                None => return Err(SubscriptionError::AlreadyRunning),
            }
        };

        debug!("event dispatch loop started");

        loop {
            tokio::select! {
                _ = self.shared.cancel.cancelled() => break,
                frame = reader.next() => match frame {
                    Some(Ok(packet)) => self.dispatch(packet),
                    Some(Err(err @ PacketCodecError::BadMagic)) => {
                        // Buffered bytes were dropped; skip and resync.
                        self.report(MonitoringError::Transport(err));
                    }
                    Some(Err(err)) => {
                        self.report(MonitoringError::Transport(err));
                        self.shared.cancel.cancel();
                        break;
                    }
                    None => {
                        self.report(MonitoringError::StreamClosed);
                        self.shared.cancel.cancel();
                        break;
                    }
                },
            }
        }

        debug!("event dispatch loop stopped");
        Ok(())
    }

    async fn register<T, F>(
        &self,
        map: &HandlerMap<T>,
        event: EventType,
        handler: F,
    ) -> Result<Cookie, SubscriptionError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        if self.shared.cancel.is_cancelled() {
            return Err(SubscriptionError::Closed);
        }

        let cookie =
            Cookie(self.shared.next_cookie.fetch_add(1, Ordering::Relaxed) + 1);

        let first = {
            let mut handlers = lock_or_recover(map);
            let first = handlers.is_empty();
            handlers.insert(cookie, Arc::new(handler));
            first
        };

        if first {
            // Local registration has already succeeded; a subscribe
            // failure surfaces on the error sink, not here.
            self.send_subscribe(event).await;
        }

        Ok(cookie)
    }

    async fn send_subscribe(&self, event: EventType) {
        debug!("subscribing to {} events", event.name());

        let payload = match serde_json::to_vec(&[event]) {
            Ok(payload) => payload,
            Err(err) => {
                self.report(MonitoringError::Payload(err));
                return;
            }
        };

        let mut writer = self.shared.writer.lock().await;
        match writer.as_mut() {
            Some(sink) => {
                let request = Packet {
                    payload_type: PayloadType::Subscribe as u32,
                    payload: payload.into(),
                };
                if let Err(err) = sink.send(request).await {
                    self.report(MonitoringError::SubscribeSend(err));
                }
            }
            None => self.report(MonitoringError::StreamClosed),
        }
    }

    fn dispatch(&self, packet: Packet) {
        if packet.payload_type == PayloadType::Subscribe as u32 {
            self.check_subscribe_reply(&packet.payload);
            return;
        }

        let Some(event) = EventType::from_wire(packet.payload_type) else {
            self.report(MonitoringError::UnknownPayloadType(
                packet.payload_type,
            ));
            return;
        };

        let outcome = match event {
            EventType::Workspace => {
                self.fan_out(&self.shared.workspaces, &packet.payload)
            }
            EventType::Mode => self.fan_out(&self.shared.modes, &packet.payload),
            EventType::Window => {
                self.fan_out(&self.shared.windows, &packet.payload)
            }
            EventType::Binding => {
                self.fan_out(&self.shared.bindings, &packet.payload)
            }
            EventType::Shutdown => {
                self.fan_out(&self.shared.shutdowns, &packet.payload)
            }
            EventType::Tick => self.fan_out(&self.shared.ticks, &packet.payload),
            other => {
                self.report(MonitoringError::UnsupportedEvent(other.name()));
                return;
            }
        };

        if let Err(err) = outcome {
            self.report(MonitoringError::Payload(err));
        }
    }

    /// Decodes the payload once, then invokes every currently registered
    /// handler on its own task: no handler's latency or panic can stall
    /// frame delivery to the others or block the next read.
    fn fan_out<T>(
        &self,
        map: &HandlerMap<T>,
        payload: &[u8],
    ) -> Result<(), serde_json::Error>
    where
        T: DeserializeOwned + Clone + Send + 'static,
    {
        let args: T = serde_json::from_slice(payload)?;

        let handlers: Vec<Handler<T>> =
            lock_or_recover(map).values().cloned().collect();
        trace!("dispatching an event to {} handler(s)", handlers.len());

        for handler in handlers {
            let args = args.clone();
            tokio::spawn(async move { handler(args) });
        }

        Ok(())
    }

    fn check_subscribe_reply(&self, payload: &[u8]) {
        match serde_json::from_slice::<CommandOutcome>(payload) {
            Ok(outcome) if outcome.success => {
                trace!("subscribe acknowledged");
            }
            Ok(outcome) => self.report(MonitoringError::SubscribeRejected {
                reason: outcome.error,
            }),
            Err(err) => self.report(MonitoringError::Payload(err)),
        }
    }

    fn report(&self, err: MonitoringError) {
        warn!("monitoring error: {}", err);

        let err = Arc::new(err);
        let observers = lock_or_recover(&self.shared.observers);
        for observer in observers.iter() {
            // Unbounded send never blocks; dropped receivers are ignored.
            let _ = observer.send(Arc::clone(&err));
        }
    }
}

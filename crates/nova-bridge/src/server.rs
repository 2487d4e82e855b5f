//! Bridge server: accept/poll I/O thread, client table, send and broadcast.

use crate::frame::{self, Opcode};
use crate::handshake::{head_end, HandshakeError, UpgradeRequest, MAX_REQUEST_SIZE};
use crate::listener::{run_dispatcher, BridgeEvent, BridgeListener, Dispatch, ListenerId, ListenerSet};
use crate::message::now_millis;
use crate::{BridgeConfig, BridgeError, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Per-client readiness bound while polling.
const CLIENT_POLL_TIMEOUT: Duration = Duration::from_millis(1);

/// Read slice during the handshake, so stop is noticed promptly.
const HANDSHAKE_SLICE: Duration = Duration::from_millis(50);

struct ClientConnection {
    /// Kept outside the write lock so stop can shut the socket down while a
    /// write is blocked.
    stream: TcpStream,
    writer: Arc<Mutex<TcpStream>>,
    upgraded: bool,
    peer: SocketAddr,
}

struct Shared {
    clients: Mutex<HashMap<String, ClientConnection>>,
    shutdown: AtomicBool,
    running: AtomicBool,
    next_client: AtomicU64,
    /// Latest pending frame per publish key, drained by the writer thread.
    outbox: Mutex<HashMap<String, Vec<u8>>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Shared {
    fn new() -> Self {
        let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
        Self {
            clients: Mutex::new(HashMap::new()),
            shutdown: AtomicBool::new(false),
            running: AtomicBool::new(false),
            next_client: AtomicU64::new(0),
            outbox: Mutex::new(HashMap::new()),
            wake_tx,
            wake_rx,
        }
    }

    fn next_client_id(&self) -> String {
        let seq = self.next_client.fetch_add(1, Ordering::Relaxed);
        format!("client_{}_{}", now_millis(), seq)
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    fn wake_writer(&self) {
        let _ = self.wake_tx.try_send(());
    }

    fn writer_for(&self, client_id: &str) -> Option<Arc<Mutex<TcpStream>>> {
        self.clients
            .lock()
            .get(client_id)
            .filter(|client| client.upgraded)
            .map(|client| Arc::clone(&client.writer))
    }

    /// Writes happen after the client table is unlocked, so a client that
    /// stops reading only stalls writers to that client.
    fn write_to(&self, client_id: &str, bytes: &[u8]) -> bool {
        match self.writer_for(client_id) {
            Some(writer) => write_frame(client_id, &writer, bytes),
            None => false,
        }
    }

    fn broadcast_frame(&self, bytes: &[u8]) -> usize {
        let targets: Vec<(String, Arc<Mutex<TcpStream>>)> = self
            .clients
            .lock()
            .iter()
            .filter(|(_, client)| client.upgraded)
            .map(|(id, client)| (id.clone(), Arc::clone(&client.writer)))
            .collect();
        targets
            .iter()
            .filter(|(id, writer)| write_frame(id, writer, bytes))
            .count()
    }

    fn upgraded_ids(&self) -> Vec<String> {
        self.clients
            .lock()
            .iter()
            .filter(|(_, client)| client.upgraded)
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn upgraded_count(&self) -> usize {
        self.clients
            .lock()
            .values()
            .filter(|client| client.upgraded)
            .count()
    }
}

fn write_frame(client_id: &str, writer: &Mutex<TcpStream>, bytes: &[u8]) -> bool {
    match writer.lock().write_all(bytes) {
        Ok(()) => true,
        Err(e) => {
            tracing::debug!(client = %client_id, error = %e, "write failed");
            false
        }
    }
}

/// Writer thread body. Delivers published frames until shutdown.
fn run_writer(shared: Arc<Shared>) {
    while shared.wake_rx.recv().is_ok() {
        if shared.is_shutting_down() {
            break;
        }
        let pending: Vec<(String, Vec<u8>)> = shared.outbox.lock().drain().collect();
        for (key, bytes) in pending {
            let delivered = shared.broadcast_frame(&bytes);
            tracing::trace!(key = %key, delivered, "published frame");
        }
    }
    tracing::debug!("bridge writer exiting");
}

fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
    )
}

/// Cloneable handle for sending to bridge clients from any thread.
#[derive(Clone)]
pub struct BridgeSender {
    shared: Arc<Shared>,
}

impl BridgeSender {
    /// Send `message` as JSON to one upgraded client.
    ///
    /// Returns `Ok(false)` for unknown or not yet upgraded clients and for
    /// failed writes.
    pub fn send<T: Serialize + ?Sized>(&self, client_id: &str, message: &T) -> Result<bool> {
        let payload = serde_json::to_vec(message)?;
        Ok(self.shared.write_to(client_id, &frame::encode(&payload)))
    }

    /// Send `message` to every upgraded client. The message is serialized and
    /// framed once. Returns the number of clients written to.
    ///
    /// Blocks on each client's socket for up to `write_timeout`. Real-time
    /// callers use [`publish`](Self::publish) instead.
    pub fn broadcast<T: Serialize + ?Sized>(&self, message: &T) -> Result<usize> {
        let payload = serde_json::to_vec(message)?;
        Ok(self.shared.broadcast_frame(&frame::encode(&payload)))
    }

    /// Queue `message` for every upgraded client without touching a socket.
    ///
    /// One frame is kept per `key`: publishing again before the writer thread
    /// has delivered the previous frame replaces it. Returns `Ok(false)` when
    /// the server is stopped or no client is connected.
    pub fn publish<T: Serialize + ?Sized>(&self, key: &str, message: &T) -> Result<bool> {
        if !self.shared.running.load(Ordering::Acquire) || self.shared.upgraded_count() == 0 {
            return Ok(false);
        }
        let payload = serde_json::to_vec(message)?;
        self.shared
            .outbox
            .lock()
            .insert(key.to_owned(), frame::encode(&payload));
        self.shared.wake_writer();
        Ok(true)
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.shared.upgraded_ids()
    }

    pub fn client_count(&self) -> usize {
        self.shared.upgraded_count()
    }
}

impl std::fmt::Debug for BridgeSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeSender")
            .field("clients", &self.client_count())
            .finish()
    }
}

/// A named thread whose exit can be awaited with a bound.
struct Worker {
    name: &'static str,
    handle: JoinHandle<()>,
    done: Receiver<()>,
}

impl Worker {
    fn spawn(name: &'static str, body: impl FnOnce() + Send + 'static) -> Result<Self> {
        let (done_tx, done) = crossbeam_channel::bounded::<()>(0);
        let handle = thread::Builder::new().name(name.into()).spawn(move || {
            let _done = done_tx;
            body();
        })?;
        Ok(Self { name, handle, done })
    }

    fn join(self, timeout: Duration) -> Result<()> {
        match self.done.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(
                    thread = self.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "thread did not exit in time, leaking it"
                );
                Err(BridgeError::JoinTimeout {
                    thread: self.name.to_owned(),
                    duration_ms: timeout.as_millis() as u64,
                })
            }
            _ => {
                if self.handle.join().is_err() {
                    tracing::error!(thread = self.name, "thread panicked");
                }
                Ok(())
            }
        }
    }
}

/// Bridge protocol server.
///
/// Owns a dedicated I/O thread (accept, handshake, poll, read), a dispatcher
/// thread that runs listener callbacks and a writer thread that delivers
/// published frames.
pub struct BridgeServer {
    config: BridgeConfig,
    shared: Arc<Shared>,
    listeners: Arc<ListenerSet>,
    local_addr: Option<SocketAddr>,
    io_thread: Option<Worker>,
    dispatcher: Option<Worker>,
    writer: Option<Worker>,
    dispatch_tx: Option<Sender<Dispatch>>,
}

impl BridgeServer {
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shared: Arc::new(Shared::new()),
            listeners: Arc::new(ListenerSet::default()),
            local_addr: None,
            io_thread: None,
            dispatcher: None,
            writer: None,
            dispatch_tx: None,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bind and start the I/O and dispatcher threads. Returns the bound
    /// address.
    pub fn start(&mut self) -> Result<SocketAddr> {
        if self.io_thread.is_some() {
            return Err(BridgeError::AlreadyRunning);
        }

        let listener = TcpListener::bind(self.config.socket_addr())?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        self.shared.shutdown.store(false, Ordering::Release);
        self.shared.outbox.lock().clear();
        while self.shared.wake_rx.try_recv().is_ok() {}

        let (dispatch_tx, dispatch_rx) = crossbeam_channel::unbounded();
        let listeners = Arc::clone(&self.listeners);
        let dispatcher = Worker::spawn("nova-bridge-dispatch", move || {
            run_dispatcher(dispatch_rx, listeners)
        })?;

        let io = IoLoop {
            listener,
            shared: Arc::clone(&self.shared),
            dispatch: dispatch_tx.clone(),
            config: self.config.clone(),
            readers: Vec::new(),
        };
        let shared = Arc::clone(&self.shared);
        let writer = match Worker::spawn("nova-bridge-writer", move || run_writer(shared)) {
            Ok(worker) => worker,
            Err(e) => {
                let _ = dispatch_tx.send(Dispatch::Shutdown);
                let _ = dispatcher.join(self.config.join_timeout);
                return Err(e);
            }
        };
        let io_thread = match Worker::spawn("nova-bridge-io", move || io.run()) {
            Ok(worker) => worker,
            Err(e) => {
                self.shared.shutdown.store(true, Ordering::Release);
                self.shared.wake_writer();
                let _ = writer.join(self.config.join_timeout);
                let _ = dispatch_tx.send(Dispatch::Shutdown);
                let _ = dispatcher.join(self.config.join_timeout);
                return Err(e);
            }
        };

        self.shared.running.store(true, Ordering::Release);
        self.dispatcher = Some(dispatcher);
        self.writer = Some(writer);
        self.io_thread = Some(io_thread);
        self.dispatch_tx = Some(dispatch_tx);
        self.local_addr = Some(local_addr);
        tracing::info!(%local_addr, "bridge server listening");
        Ok(local_addr)
    }

    /// Stop every server thread and close every client.
    ///
    /// Each join waits at most `join_timeout`; a thread that misses it is
    /// leaked and reported as [`BridgeError::JoinTimeout`].
    pub fn stop(&mut self) -> Result<()> {
        let Some(io_thread) = self.io_thread.take() else {
            return Ok(());
        };
        let timeout = self.config.join_timeout;

        self.shared.running.store(false, Ordering::Release);
        self.shared.shutdown.store(true, Ordering::Release);
        let io_result = io_thread.join(timeout);

        let closed: Vec<String> = self
            .shared
            .clients
            .lock()
            .drain()
            .filter_map(|(id, client)| {
                let _ = client.stream.shutdown(Shutdown::Both);
                client.upgraded.then_some(id)
            })
            .collect();

        // Shutting the sockets down unblocks a writer stuck on a stalled client
        self.shared.wake_writer();
        let writer_result = match self.writer.take() {
            Some(writer) => writer.join(timeout),
            None => Ok(()),
        };
        self.shared.outbox.lock().clear();

        if let Some(tx) = self.dispatch_tx.take() {
            for id in closed {
                let _ = tx.send(Dispatch::Event(BridgeEvent::ClientDisconnected(id)));
            }
            let _ = tx.send(Dispatch::Shutdown);
        }
        let dispatch_result = match self.dispatcher.take() {
            Some(dispatcher) => dispatcher.join(timeout),
            None => Ok(()),
        };

        self.local_addr = None;
        tracing::info!("bridge server stopped");
        io_result.and(writer_result).and(dispatch_result)
    }

    pub fn is_running(&self) -> bool {
        self.io_thread.is_some()
    }

    /// Bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn add_listener(&self, listener: Arc<dyn BridgeListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn sender(&self) -> BridgeSender {
        BridgeSender {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn send<T: Serialize + ?Sized>(&self, client_id: &str, message: &T) -> Result<bool> {
        self.sender().send(client_id, message)
    }

    pub fn broadcast<T: Serialize + ?Sized>(&self, message: &T) -> Result<usize> {
        self.sender().broadcast(message)
    }

    pub fn client_ids(&self) -> Vec<String> {
        self.shared.upgraded_ids()
    }

    pub fn client_count(&self) -> usize {
        self.sender().client_count()
    }
}

impl Drop for BridgeServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            tracing::error!(error = %e, "bridge server did not stop cleanly");
        }
    }
}

struct ClientReader {
    id: String,
    stream: TcpStream,
    buf: Vec<u8>,
}

struct IoLoop {
    listener: TcpListener,
    shared: Arc<Shared>,
    dispatch: Sender<Dispatch>,
    config: BridgeConfig,
    readers: Vec<ClientReader>,
}

impl IoLoop {
    fn run(mut self) {
        let mut chunk = vec![0u8; self.config.read_buffer_size];
        while !self.shared.is_shutting_down() {
            self.accept_pending();
            self.poll_clients(&mut chunk);
            thread::sleep(self.config.poll_interval);
        }
        tracing::debug!("bridge I/O loop exiting");
    }

    fn accept_pending(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => self.handle_new_connection(stream, peer),
                Err(e) if is_timeout(&e) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    break;
                }
            }
            if self.shared.is_shutting_down() {
                break;
            }
        }
    }

    fn handle_new_connection(&mut self, stream: TcpStream, peer: SocketAddr) {
        let id = self.shared.next_client_id();
        tracing::debug!(client = %id, %peer, "connection accepted");

        match self.upgrade(&id, stream, peer) {
            Ok(reader) => {
                self.readers.push(reader);
                tracing::info!(client = %id, %peer, "client connected");
                let _ = self
                    .dispatch
                    .send(Dispatch::Event(BridgeEvent::ClientConnected(id)));
            }
            Err(e) => {
                self.shared.clients.lock().remove(&id);
                tracing::warn!(client = %id, %peer, error = %e, "dropping connection");
            }
        }
    }

    fn upgrade(&self, id: &str, mut stream: TcpStream, peer: SocketAddr) -> Result<ClientReader> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_write_timeout(Some(self.config.write_timeout))?;
        self.shared.clients.lock().insert(
            id.to_owned(),
            ClientConnection {
                stream: stream.try_clone()?,
                writer: Arc::new(Mutex::new(stream.try_clone()?)),
                upgraded: false,
                peer,
            },
        );

        let (head, leftover) = self.read_request(&mut stream)?;
        let request = UpgradeRequest::parse(&head)?;
        stream.write_all(request.response().as_bytes())?;
        stream.set_read_timeout(Some(CLIENT_POLL_TIMEOUT))?;

        match self.shared.clients.lock().get_mut(id) {
            Some(client) => client.upgraded = true,
            None => return Err(io::Error::from(ErrorKind::ConnectionAborted).into()),
        }

        Ok(ClientReader {
            id: id.to_owned(),
            stream,
            buf: leftover,
        })
    }

    /// Read until the end of the request head. Returns the head and any bytes
    /// that followed it.
    fn read_request(&self, stream: &mut TcpStream) -> Result<(String, Vec<u8>)> {
        let deadline = Instant::now() + self.config.handshake_timeout;
        let mut buf = Vec::with_capacity(1024);
        let mut chunk = [0u8; 1024];

        loop {
            if let Some(end) = head_end(&buf) {
                let head = String::from_utf8_lossy(&buf[..end]).into_owned();
                return Ok((head, buf[end..].to_vec()));
            }
            if buf.len() > MAX_REQUEST_SIZE {
                return Err(HandshakeError::TooLarge.into());
            }
            let now = Instant::now();
            if now >= deadline || self.shared.is_shutting_down() {
                return Err(HandshakeError::Timeout.into());
            }

            stream.set_read_timeout(Some((deadline - now).min(HANDSHAKE_SLICE)))?;
            match stream.read(&mut chunk) {
                Ok(0) => return Err(io::Error::from(ErrorKind::UnexpectedEof).into()),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) if is_timeout(&e) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn poll_clients(&mut self, chunk: &mut [u8]) {
        let mut dead = Vec::new();

        for reader in &mut self.readers {
            match reader.stream.read(chunk) {
                Ok(0) => {
                    dead.push(reader.id.clone());
                    continue;
                }
                Ok(n) => reader.buf.extend_from_slice(&chunk[..n]),
                Err(e) if is_timeout(&e) => {}
                Err(e) => {
                    tracing::debug!(client = %reader.id, error = %e, "read failed");
                    dead.push(reader.id.clone());
                    continue;
                }
            }

            if reader.buf.len() > self.config.max_message_size {
                tracing::warn!(client = %reader.id, buffered = reader.buf.len(), "message too large, dropping client");
                dead.push(reader.id.clone());
                continue;
            }
            if !reader.buf.is_empty() && !process_frames(reader, &self.shared, &self.dispatch) {
                dead.push(reader.id.clone());
            }
        }

        for id in dead {
            self.readers.retain(|reader| reader.id != id);
            if let Some(client) = self.shared.clients.lock().remove(&id) {
                let _ = client.stream.shutdown(Shutdown::Both);
                tracing::info!(client = %id, peer = %client.peer, "client disconnected");
                let _ = self
                    .dispatch
                    .send(Dispatch::Event(BridgeEvent::ClientDisconnected(id)));
            }
        }
    }
}

/// Handle every complete frame in the reader's buffer. Returns `false` when
/// the client asked to close.
fn process_frames(reader: &mut ClientReader, shared: &Shared, dispatch: &Sender<Dispatch>) -> bool {
    let mut consumed = 0;
    let mut open = true;

    while let Some((frame, used)) = frame::parse(&reader.buf[consumed..]) {
        consumed += used;
        match frame.opcode {
            Opcode::Text | Opcode::Binary => {
                match serde_json::from_slice::<Value>(&frame.payload) {
                    Ok(message) => {
                        let _ = dispatch.send(Dispatch::Event(BridgeEvent::Message {
                            client_id: reader.id.clone(),
                            message,
                        }));
                    }
                    Err(e) => {
                        tracing::debug!(client = %reader.id, error = %e, "dropping malformed payload");
                    }
                }
            }
            Opcode::Ping => {
                let pong = frame::encode_frame(Opcode::Pong, &frame.payload, None);
                shared.write_to(&reader.id, &pong);
            }
            Opcode::Close => {
                let close = frame::encode_frame(Opcode::Close, &[], None);
                shared.write_to(&reader.id, &close);
                open = false;
                break;
            }
            other => {
                tracing::trace!(client = %reader.id, opcode = ?other, "ignoring frame");
            }
        }
    }

    reader.buf.drain(..consumed);
    open
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ids_are_unique() {
        let shared = Shared::new();
        let a = shared.next_client_id();
        let b = shared.next_client_id();
        assert_ne!(a, b);
        assert!(a.starts_with("client_"));
        assert_eq!(a.split('_').count(), 3);
    }

    #[test]
    fn test_send_to_unknown_client_is_noop() {
        let server = BridgeServer::new(BridgeConfig::with_port(0)).unwrap();
        assert!(!server.send("client_0_0", &serde_json::json!({"action": "PING"})).unwrap());
        assert_eq!(server.broadcast(&serde_json::json!({})).unwrap(), 0);
    }

    #[test]
    fn test_stop_without_start() {
        let mut server = BridgeServer::new(BridgeConfig::with_port(0)).unwrap();
        assert!(!server.is_running());
        assert!(server.stop().is_ok());
    }

    #[test]
    fn test_start_twice_rejected() {
        let mut server = BridgeServer::new(BridgeConfig::with_port(0)).unwrap();
        let addr = server.start().unwrap();
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));
        assert!(matches!(server.start(), Err(BridgeError::AlreadyRunning)));
        server.stop().unwrap();
        assert_eq!(server.local_addr(), None);
    }

    #[test]
    fn test_restart_after_stop() {
        let mut server = BridgeServer::new(BridgeConfig::with_port(0)).unwrap();
        server.start().unwrap();
        server.stop().unwrap();
        server.start().unwrap();
        assert!(server.is_running());
        server.stop().unwrap();
    }

    #[test]
    fn test_worker_join_timeout() {
        let (release_tx, release_rx) = crossbeam_channel::bounded::<()>(0);
        let worker = Worker::spawn("test-stuck", move || {
            let _ = release_rx.recv();
        })
        .unwrap();
        let err = worker.join(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, BridgeError::JoinTimeout { duration_ms: 20, .. }));
        drop(release_tx);
    }
}

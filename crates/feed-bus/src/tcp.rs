//! Newline-delimited publish/subscribe over TCP.
//!
//! The publisher binds and accepts subscribers on a background thread; every
//! published payload is written as one `\n`-terminated frame to each connected
//! subscriber. Topic filtering happens on the subscriber side.
//!
//! Subscribers connect lazily: if the publisher is not listening yet, the
//! connection is retried from [`BusClient::poll_ready`], so subscribers may be
//! started before publishers.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::{BusClient, BusError, Endpoint, TopicFilter};

/// How long the accept thread sleeps when no subscriber is waiting.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Subscribers that cannot take a frame within this time are dropped.
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);
/// Timeout for the eager connection attempt made by [`TcpSubscriber::connect`].
const INITIAL_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);
const READ_CHUNK: usize = 4096;

/// Publishing side of the bus.
pub struct TcpPublisher {
    local_addr: SocketAddr,
    peers: Arc<Mutex<Vec<TcpStream>>>,
    stop: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl TcpPublisher {
    /// Binds `address` (e.g. `tcp://*:5555`) and starts accepting subscribers.
    pub fn bind(address: &str) -> Result<Self, BusError> {
        let endpoint = Endpoint::parse(address)?;
        let listener = TcpListener::bind((endpoint.host(), endpoint.port()))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let peers = Arc::new(Mutex::new(Vec::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let acceptor = thread::Builder::new()
            .name("feed-accept".to_string())
            .spawn({
                let peers = Arc::clone(&peers);
                let stop = Arc::clone(&stop);
                move || accept_loop(&listener, &peers, &stop)
            })?;

        tracing::debug!(%local_addr, "publisher bound");
        Ok(Self {
            local_addr,
            peers,
            stop,
            acceptor: Some(acceptor),
        })
    }

    /// The address actually bound (useful with port 0).
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.peers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Sends `payload` to every connected subscriber.
    ///
    /// Returns the number of subscribers that received it. Subscribers whose
    /// connection fails are dropped.
    pub fn publish(&self, payload: &str) -> Result<usize, BusError> {
        if payload.contains('\n') {
            return Err(BusError::InvalidPayload);
        }
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.extend_from_slice(payload.as_bytes());
        frame.push(b'\n');

        let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        peers.retain_mut(|stream| match stream.write_all(&frame) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(peer = ?stream.peer_addr().ok(), error = %err, "dropping subscriber");
                false
            }
        });
        Ok(peers.len())
    }

    /// Stops accepting and disconnects every subscriber.
    pub fn close(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(acceptor) = self.acceptor.take() {
            let _ = acceptor.join();
        }
        let mut peers = self.peers.lock().unwrap_or_else(PoisonError::into_inner);
        for stream in peers.drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for TcpPublisher {
    fn drop(&mut self) {
        self.close();
    }
}

fn accept_loop(listener: &TcpListener, peers: &Mutex<Vec<TcpStream>>, stop: &AtomicBool) {
    while !stop.load(Ordering::Relaxed) {
        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = configure_peer(&stream) {
                    tracing::warn!(%peer, error = %err, "failed to configure subscriber socket");
                    continue;
                }
                tracing::debug!(%peer, "subscriber connected");
                peers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(stream);
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(err) => {
                tracing::warn!(error = %err, "accept failed");
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn configure_peer(stream: &TcpStream) -> io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))
}

/// Subscribing side of the bus.
pub struct TcpSubscriber {
    endpoint: Endpoint,
    stream: Option<TcpStream>,
    filter: TopicFilter,
    partial: Vec<u8>,
    ready: VecDeque<String>,
    closed: bool,
}

impl TcpSubscriber {
    /// Creates a subscriber for `address` and tries to connect once.
    ///
    /// A publisher that is not listening yet is not an error: the connection
    /// is retried on every poll until it succeeds.
    pub fn connect(address: &str) -> Result<Self, BusError> {
        let endpoint = Endpoint::parse(address)?;
        let mut subscriber = Self {
            endpoint,
            stream: None,
            filter: TopicFilter::default(),
            partial: Vec::new(),
            ready: VecDeque::new(),
            closed: false,
        };
        if let Err(err) = subscriber.reconnect(INITIAL_CONNECT_TIMEOUT) {
            tracing::info!(endpoint = %subscriber.endpoint, error = %err, "publisher not reachable yet, will retry");
        }
        Ok(subscriber)
    }

    pub const fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn reconnect(&mut self, timeout: Duration) -> Result<(), BusError> {
        let deadline = Instant::now() + timeout;
        let addrs = self.endpoint.socket_addrs()?;
        match connect_before(&addrs, deadline) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                tracing::debug!(peer = ?stream.peer_addr().ok(), "connected to publisher");
                self.partial.clear();
                self.stream = Some(stream);
                Ok(())
            }
            Err(err) => Err(self.disconnected(err.to_string())),
        }
    }

    fn disconnected(&self, reason: String) -> BusError {
        BusError::Disconnected {
            address: self.endpoint.to_string(),
            reason,
        }
    }

    /// Reads whatever arrives within `timeout` and queues complete frames.
    fn read_for(&mut self, timeout: Duration) -> Result<(), BusError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(());
        };
        stream.set_read_timeout(Some(timeout))?;

        let mut chunk = [0u8; READ_CHUNK];
        let read = match stream.read(&mut chunk) {
            Ok(read) => read,
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                return Ok(());
            }
            Err(err) => {
                self.stream = None;
                return Err(BusError::Io(err));
            }
        };

        if read == 0 {
            self.stream = None;
            return Err(self.disconnected("publisher closed the connection".to_string()));
        }

        self.partial.extend_from_slice(&chunk[..read]);
        self.split_frames();
        Ok(())
    }

    fn split_frames(&mut self) {
        while let Some(end) = self.partial.iter().position(|&byte| byte == b'\n') {
            let frame: Vec<u8> = self.partial.drain(..=end).collect();
            let text = String::from_utf8_lossy(&frame[..end]);
            let payload = text.strip_suffix('\r').unwrap_or(text.as_ref());
            if self.filter.matches(payload) {
                self.ready.push_back(payload.to_string());
            }
        }
    }
}

/// Tries each address in turn until one connects or `deadline` passes.
///
/// All attempts share the one budget, so a host resolving to several dead
/// addresses costs no more than a single timeout.
fn connect_before(addrs: &[SocketAddr], deadline: Instant) -> io::Result<TcpStream> {
    let mut last_error = io::Error::new(io::ErrorKind::NotFound, "no address resolved");
    for addr in addrs {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out"));
        }
        match TcpStream::connect_timeout(addr, remaining) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = err,
        }
    }
    Err(last_error)
}

impl BusClient for TcpSubscriber {
    fn subscribe(&mut self, topic: &str) -> Result<(), BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }
        self.filter.subscribe(topic);
        let filter = &self.filter;
        self.ready.retain(|payload| filter.matches(payload));
        Ok(())
    }

    fn poll_ready(&mut self, timeout: Duration) -> Result<bool, BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }
        if !self.ready.is_empty() {
            return Ok(true);
        }

        let deadline = Instant::now() + timeout;
        if self.stream.is_none() {
            if let Err(err) = self.reconnect(timeout) {
                // wait out the interval so callers polling in a loop don't spin
                thread::sleep(deadline.saturating_duration_since(Instant::now()));
                return Err(err);
            }
        }

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(false);
            }
            self.read_for(remaining)?;
            if !self.ready.is_empty() {
                return Ok(true);
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<String>, BusError> {
        if self.closed {
            return Err(BusError::Closed);
        }
        Ok(self.ready.pop_front())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.ready.clear();
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        tracing::debug!(endpoint = %self.endpoint, "subscriber closed");
    }
}

impl Drop for TcpSubscriber {
    fn drop(&mut self) {
        self.close();
    }
}

use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::config::ServerSettings;
use crate::pipeline::FramePipeline;

use super::framing::{encode_frame, FrameDecoder};

const READ_CHUNK: usize = 64 * 1024;
/// Upper bound on flushing pending replies once shutdown starts.
const SHUTDOWN_FLUSH_BUDGET: Duration = Duration::from_millis(200);

/// Server lifecycle. Phases only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ServerPhase {
    Created = 0,
    Listening = 1,
    Running = 2,
    Stopping = 3,
    Terminated = 4,
}

impl ServerPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServerPhase::Created,
            1 => ServerPhase::Listening,
            2 => ServerPhase::Running,
            3 => ServerPhase::Stopping,
            _ => ServerPhase::Terminated,
        }
    }
}

#[derive(Debug)]
struct PhaseCell(AtomicU8);

impl PhaseCell {
    fn new() -> Self {
        Self(AtomicU8::new(ServerPhase::Created as u8))
    }

    fn get(&self) -> ServerPhase {
        ServerPhase::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move forward to `next`; never moves backwards.
    fn advance(&self, next: ServerPhase) {
        self.0.fetch_max(next as u8, Ordering::SeqCst);
    }
}

/// Framed image server.
///
/// One thread runs a polling loop over a non-blocking listener and every
/// accepted connection, so a slow or silent peer never stalls the others.
pub struct GuidanceServer {
    settings: ServerSettings,
    pipeline: FramePipeline,
    listener: Option<TcpListener>,
    phase: Arc<PhaseCell>,
}

#[derive(Debug)]
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    phase: Arc<PhaseCell>,
    join: Option<JoinHandle<()>>,
}

impl ServerHandle {
    pub fn phase(&self) -> ServerPhase {
        self.phase.get()
    }

    /// Signal the loop to stop and wait for it to exit. Returns the final phase.
    pub fn stop(mut self) -> Result<ServerPhase> {
        self.phase.advance(ServerPhase::Stopping);
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("guidance server thread panicked"))?;
        }
        Ok(self.phase.get())
    }
}

impl Drop for ServerHandle {
    /// A dropped handle stops the loop as `stop()` would.
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("guidance server thread panicked");
            }
        }
    }
}

impl GuidanceServer {
    pub fn new(settings: ServerSettings, pipeline: FramePipeline) -> Self {
        Self {
            settings,
            pipeline,
            listener: None,
            phase: Arc::new(PhaseCell::new()),
        }
    }

    pub fn phase(&self) -> ServerPhase {
        self.phase.get()
    }

    /// Bind the listening socket. Failure here is fatal for the process.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if self.phase() != ServerPhase::Created {
            return Err(anyhow!("server already bound"));
        }
        let listener = TcpListener::bind(&self.settings.addr)
            .with_context(|| format!("failed to bind {}", self.settings.addr))?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        self.listener = Some(listener);
        self.phase.advance(ServerPhase::Listening);
        Ok(addr)
    }

    /// Bind (if needed) and run the loop on a background thread.
    pub fn spawn(mut self) -> Result<ServerHandle> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let addr = self
            .listener
            .as_ref()
            .ok_or_else(|| anyhow!("server has no listener"))?
            .local_addr()?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let phase = self.phase.clone();
        let join = std::thread::spawn(move || {
            if let Err(err) = self.run(shutdown_thread) {
                log::error!("guidance server stopped: {:#}", err);
            }
        });
        Ok(ServerHandle {
            addr,
            shutdown,
            phase,
            join: Some(join),
        })
    }

    /// Bind (if needed) and run the loop on this thread until `shutdown` is set.
    pub fn run(mut self, shutdown: Arc<AtomicBool>) -> Result<()> {
        if self.listener.is_none() {
            self.bind()?;
        }
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow!("server has no listener"))?;
        self.phase.advance(ServerPhase::Running);
        log::info!("guidance server running on {}", listener.local_addr()?);

        let mut connections: Vec<Connection> = Vec::new();
        while !shutdown.load(Ordering::SeqCst) {
            let mut busy = accept_pending(&listener, &mut connections, self.settings.max_frame_bytes);
            for conn in connections.iter_mut() {
                busy |= conn.service(&self.pipeline);
            }
            connections.retain(|conn| {
                if conn.closed {
                    log::debug!("client {} disconnected", conn.peer);
                }
                !conn.closed
            });
            if !busy {
                std::thread::sleep(self.settings.poll_interval);
            }
        }

        self.phase.advance(ServerPhase::Stopping);
        log::info!(
            "guidance server stopping, {} open connection(s)",
            connections.len()
        );
        for conn in connections.iter_mut() {
            conn.flush_before_close();
        }
        self.phase.advance(ServerPhase::Terminated);
        log::debug!("guidance server terminated");
        Ok(())
    }
}

fn accept_pending(
    listener: &TcpListener,
    connections: &mut Vec<Connection>,
    max_frame_bytes: u32,
) -> bool {
    let mut accepted = false;
    loop {
        match listener.accept() {
            Ok((stream, peer)) => match Connection::new(stream, peer, max_frame_bytes) {
                Ok(conn) => {
                    log::debug!("client {} connected", peer);
                    connections.push(conn);
                    accepted = true;
                }
                Err(err) => log::warn!("could not set up connection from {}: {:#}", peer, err),
            },
            Err(err) if err.kind() == ErrorKind::WouldBlock => break,
            Err(err) => {
                log::warn!("accept failed: {}", err);
                break;
            }
        }
    }
    accepted
}

struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    decoder: FrameDecoder,
    outbox: Vec<u8>,
    peer_done: bool,
    closed: bool,
}

impl Connection {
    fn new(stream: TcpStream, peer: SocketAddr, max_frame_bytes: u32) -> Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer,
            decoder: FrameDecoder::new(max_frame_bytes),
            outbox: Vec::new(),
            peer_done: false,
            closed: false,
        })
    }

    /// Make progress on this connection without blocking. Returns whether
    /// anything happened.
    fn service(&mut self, pipeline: &FramePipeline) -> bool {
        let mut busy = self.flush_outbox();
        if self.closed {
            return busy;
        }
        // Hold off reading until the previous reply is on the wire.
        if !self.outbox.is_empty() {
            return busy;
        }
        // Read only when no whole frame is waiting, and never past one
        // maximum-size frame.
        if !self.peer_done && !self.decoder.has_frame() {
            busy |= self.fill();
        }
        if self.closed {
            return busy;
        }

        match self.decoder.next_frame() {
            Ok(Some(payload)) => {
                self.respond(pipeline, &payload);
                busy |= self.flush_outbox();
                true
            }
            Ok(None) => {
                if self.peer_done {
                    if self.decoder.has_partial() {
                        log::debug!("client {} closed mid-frame", self.peer);
                    }
                    self.closed = true;
                }
                busy
            }
            Err(err) => {
                log::debug!("closing {}: {:#}", self.peer, err);
                self.closed = true;
                true
            }
        }
    }

    fn fill(&mut self) -> bool {
        let want = self.decoder.room().min(READ_CHUNK);
        if want == 0 {
            return false;
        }
        let mut chunk = [0u8; READ_CHUNK];
        match self.stream.read(&mut chunk[..want]) {
            Ok(0) => {
                self.peer_done = true;
                true
            }
            Ok(n) => {
                self.decoder.extend(&chunk[..n]);
                true
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => false,
            Err(err) if err.kind() == ErrorKind::Interrupted => false,
            Err(err) => {
                log::debug!("read from {} failed: {}", self.peer, err);
                self.closed = true;
                true
            }
        }
    }

    fn respond(&mut self, pipeline: &FramePipeline, payload: &[u8]) {
        let reply = pipeline.handle(payload);
        match reply.to_payload().and_then(|bytes| encode_frame(&bytes)) {
            Ok(frame) => self.outbox.extend_from_slice(&frame),
            Err(err) => {
                log::warn!("could not encode reply for {}: {:#}", self.peer, err);
                self.closed = true;
            }
        }
    }

    fn flush_outbox(&mut self) -> bool {
        let mut wrote = false;
        while !self.outbox.is_empty() {
            match self.stream.write(&self.outbox) {
                Ok(0) => {
                    self.closed = true;
                    break;
                }
                Ok(n) => {
                    self.outbox.drain(..n);
                    wrote = true;
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::debug!("write to {} failed: {}", self.peer, err);
                    self.closed = true;
                    break;
                }
            }
        }
        wrote
    }

    /// Push out whatever reply is still pending, within a small time budget.
    fn flush_before_close(&mut self) {
        let deadline = Instant::now() + SHUTDOWN_FLUSH_BUDGET;
        while !self.closed && !self.outbox.is_empty() && Instant::now() < deadline {
            if !self.flush_outbox() {
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

//! Connection state machine for accepted TCP clients.
//!
//! Each connection tracks its lifecycle state, the interest it is
//! registered with, and two byte buffers: pending output and, for line
//! framing, a partial input line.

use bytes::{Buf, BytesMut};
use mio::net::TcpStream;
use mio::Interest;
use slab::Slab;
use std::io::{self, Write};
use std::net::SocketAddr;

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Registered and waiting for readiness.
    Open,
    /// Reading until the socket would block.
    Draining,
    /// Peer went away or an I/O error occurred. Terminal.
    Closed,
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection {
    pub stream: TcpStream,
    pub peer: SocketAddr,
    /// Interest the stream is currently registered with.
    pub interest: Interest,
    /// Responses not yet accepted by the socket.
    pub write_buf: BytesMut,
    /// Unterminated input, line framing only.
    pub line_buf: BytesMut,
    state: ConnState,
}

impl Connection {
    /// Create a new connection registered for reads.
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        Self {
            stream,
            peer,
            interest: Interest::READABLE,
            write_buf: BytesMut::new(),
            line_buf: BytesMut::new(),
            state: ConnState::Open,
        }
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Enter the drain loop for one readiness notification.
    pub fn start_draining(&mut self) {
        if self.state == ConnState::Open {
            self.state = ConnState::Draining;
        }
    }

    /// Socket would block: back to waiting for readiness.
    pub fn finish_draining(&mut self) {
        if self.state == ConnState::Draining {
            self.state = ConnState::Open;
        }
    }

    /// Mark connection as closed.
    pub fn close(&mut self) {
        self.state = ConnState::Closed;
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.write_buf.is_empty()
    }

    /// Output queue has reached `limit`: stop reading until it drains.
    pub fn is_backpressured(&self, limit: usize) -> bool {
        self.write_buf.len() >= limit
    }

    /// Interest matching the current write backlog.
    ///
    /// Readability is dropped while the queue is at `limit`, so a peer that
    /// never reads cannot make the server buffer its input.
    pub fn wanted_interest(&self, limit: usize) -> Interest {
        if self.is_backpressured(limit) {
            Interest::WRITABLE
        } else if self.has_pending_writes() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        }
    }

    /// Write as much pending output as the socket accepts.
    ///
    /// Returns `Ok` when the buffer is empty or the socket would block.
    pub fn flush(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
                }
                Ok(n) => self.write_buf.advance(n),
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

/// Registry of active connections using slab allocation.
///
/// The slab key doubles as the connection's poll token.
pub struct ConnectionRegistry {
    connections: Slab<Connection>,
}

impl ConnectionRegistry {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            connections: Slab::with_capacity(capacity),
        }
    }

    /// Slot the next inserted connection will occupy.
    pub fn next_id(&self) -> usize {
        self.connections.vacant_key()
    }

    /// Insert a new connection, returning its slot.
    pub fn insert(&mut self, conn: Connection) -> usize {
        self.connections.insert(conn)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    /// Remove a connection. Returns `None` if it was already removed.
    pub fn remove(&mut self, id: usize) -> Option<Connection> {
        self.connections.try_remove(id)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.connections.contains(id)
    }

    /// Number of active connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

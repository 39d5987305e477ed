//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready,
//! then we perform non-blocking read/write syscalls.
//! Uses epoll on Linux, kqueue on macOS.
//!
//! mio registers every source edge-triggered, so each handler keeps going
//! until the socket reports `WouldBlock`: the listener accepts every pending
//! connection, the UDP socket receives every queued datagram, and a client
//! is read until drained. Stopping early would leave data pending with no
//! further notification.

use crate::config::{Config, Framing};
use crate::protocols::chat::parser::{self, Command};
use crate::protocols::chat;
use crate::runtime::connection::{ConnState, Connection, ConnectionRegistry};
use crate::runtime::error::{SetupError, SetupResultExt, SetupStage};
use crate::runtime::token::{Source, DATAGRAM_TOKEN, LISTENER_TOKEN};
use crate::state::ServerState;
use bytes::BytesMut;
use mio::event::Event;
use mio::net::{TcpListener, UdpSocket};
use mio::{Events, Interest, Poll};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Read};
use std::net::{SocketAddr, ToSocketAddrs};
use tracing::{debug, error, info, warn};

/// Why the reactor loop exited.
#[derive(Debug)]
pub enum StopReason {
    /// A client sent `/shutdown`.
    Shutdown,
    /// Waiting for events failed.
    PollFailed(io::Error),
}

/// Single-threaded TCP + UDP reactor.
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    socket: UdpSocket,
    connections: ConnectionRegistry,
    state: ServerState,
    /// Shared receive buffer for stream reads and datagrams.
    read_buf: Vec<u8>,
    max_events: usize,
    /// Queued output at which a connection stops being read.
    max_pending_output: usize,
    framing: Framing,
    max_line_length: usize,
}

impl Server {
    /// Create, bind and register both sockets.
    ///
    /// The UDP socket binds to the port the TCP listener ended up on, so a
    /// configured port of 0 yields one ephemeral port for both.
    pub fn bind(config: &Config) -> Result<Self, SetupError> {
        let addr = resolve(&config.host, config.port)?;

        let listener = create_listener(addr, config.backlog)?;
        let tcp_addr = listener.local_addr().stage(SetupStage::Listen)?;
        let socket = create_datagram_socket(SocketAddr::new(addr.ip(), tcp_addr.port()))?;

        let mut listener = TcpListener::from_std(listener);
        let mut socket = UdpSocket::from_std(socket);

        let poll = Poll::new().stage(SetupStage::Poll)?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .stage(SetupStage::Register)?;
        poll.registry()
            .register(&mut socket, DATAGRAM_TOKEN, Interest::READABLE)
            .stage(SetupStage::Register)?;

        let commands: Vec<&str> = Command::all().map(Command::keyword).collect();
        info!(
            addr = %tcp_addr,
            backlog = config.backlog,
            framing = ?config.framing,
            commands = ?commands,
            "Sockets initialized"
        );

        Ok(Self {
            poll,
            listener,
            socket,
            connections: ConnectionRegistry::with_capacity(config.max_events),
            state: ServerState::new(),
            read_buf: vec![0; config.read_buffer_size],
            max_events: config.max_events,
            max_pending_output: config.max_pending_output,
            framing: config.framing,
            max_line_length: config.max_line_length,
        })
    }

    pub fn tcp_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn udp_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Run until `/shutdown` or a poll failure.
    ///
    /// Connections still open when the loop exits are dropped without
    /// notice.
    pub fn run(mut self) -> StopReason {
        let mut events = Events::with_capacity(self.max_events);

        info!("Server running, waiting for connections");

        let reason = loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                if self.state.is_running() {
                    error!(error = %e, "Poll failed, stopping server");
                }
                break StopReason::PollFailed(e);
            }

            for event in events.iter() {
                match Source::from(event.token()) {
                    Source::Listener => self.accept_connections(),
                    Source::Datagram => self.handle_datagrams(),
                    Source::Client(conn_id) => self.handle_client(conn_id, event),
                }
            }

            if !self.state.is_running() {
                break StopReason::Shutdown;
            }
        };

        if !self.connections.is_empty() {
            debug!(
                abandoned = self.connections.len(),
                "Dropping connections still open"
            );
        }

        let stats = self.state.stats();
        info!(
            total_connections = stats.total_connections_accepted,
            open_connections = stats.current_connections,
            "Server stopped"
        );

        reason
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, peer)) => {
                    let conn_id = self.connections.next_id();

                    // On failure the stream is dropped here, closing it.
                    if let Err(e) = self.poll.registry().register(
                        &mut stream,
                        Source::Client(conn_id).token(),
                        Interest::READABLE,
                    ) {
                        warn!(peer = %peer, error = %e, "Failed to register connection");
                        continue;
                    }

                    self.connections.insert(Connection::new(stream, peer));
                    self.state.connection_opened();

                    debug!(conn_id, peer = %peer, "Accepted connection");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Accept error");
                    break;
                }
            }
        }
    }

    fn handle_datagrams(&mut self) {
        loop {
            match self.socket.recv_from(&mut self.read_buf) {
                Ok((0, _)) => continue,
                Ok((n, peer)) => {
                    let mut response = BytesMut::new();
                    chat::respond(&self.read_buf[..n], &mut self.state, &mut response);

                    debug!(
                        peer = %peer,
                        response = %String::from_utf8_lossy(parser::strip_newline(&response)),
                        "Datagram handled"
                    );

                    if let Err(e) = self.socket.send_to(&response, peer) {
                        warn!(peer = %peer, error = %e, "Failed to send datagram response");
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "Datagram receive error");
                    break;
                }
            }
        }
    }

    fn handle_client(&mut self, conn_id: usize, event: &Event) {
        // Already closed earlier in this batch
        if !self.connections.contains(conn_id) {
            return;
        }

        match self.service_client(conn_id, event) {
            Ok(ConnState::Closed) => self.close_connection(conn_id, None),
            Ok(_) => {}
            Err(e) => self.close_connection(conn_id, Some(e)),
        }
    }

    fn service_client(&mut self, conn_id: usize, event: &Event) -> io::Result<ConnState> {
        let mut should_read = event.is_readable() || event.is_read_closed() || event.is_error();

        if event.is_writable() {
            if let Some(conn) = self.connections.get_mut(conn_id) {
                conn.flush()?;
                // Reads were paused; input may have arrived meanwhile
                if !conn.interest.is_readable() {
                    should_read = true;
                }
            }
        }

        if should_read && self.drain_connection(conn_id)? == ConnState::Closed {
            return Ok(ConnState::Closed);
        }

        self.update_interest(conn_id)
    }

    /// Read until the socket would block, answering every message.
    ///
    /// Stops early once the output queue reaches `max_pending_output`; the
    /// rest is read after the peer has consumed enough responses.
    fn drain_connection(&mut self, conn_id: usize) -> io::Result<ConnState> {
        let Some(conn) = self.connections.get_mut(conn_id) else {
            return Ok(ConnState::Closed);
        };

        conn.start_draining();

        loop {
            if conn.is_backpressured(self.max_pending_output) {
                debug!(
                    conn_id,
                    pending = conn.write_buf.len(),
                    "Output queue full, pausing reads"
                );
                conn.finish_draining();
                break;
            }

            match conn.stream.read(&mut self.read_buf) {
                Ok(0) => {
                    conn.close();
                    break;
                }
                Ok(n) => {
                    let input = &self.read_buf[..n];

                    match self.framing {
                        Framing::PerRead => {
                            log_message(conn_id, input);
                            chat::respond(input, &mut self.state, &mut conn.write_buf);
                        }
                        Framing::Line => {
                            conn.line_buf.extend_from_slice(input);
                            while let Some(line) =
                                parser::take_line(&mut conn.line_buf, self.max_line_length)
                            {
                                log_message(conn_id, &line);
                                chat::respond(&line, &mut self.state, &mut conn.write_buf);
                            }
                        }
                    }

                    conn.flush()?;
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                    conn.finish_draining();
                    break;
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(conn.state())
    }

    /// Watch for writability only while output is backed up.
    fn update_interest(&mut self, conn_id: usize) -> io::Result<ConnState> {
        let Some(conn) = self.connections.get_mut(conn_id) else {
            return Ok(ConnState::Closed);
        };

        let wanted = conn.wanted_interest(self.max_pending_output);
        if wanted != conn.interest {
            self.poll.registry().reregister(
                &mut conn.stream,
                Source::Client(conn_id).token(),
                wanted,
            )?;
            conn.interest = wanted;
        }

        Ok(conn.state())
    }

    fn close_connection(&mut self, conn_id: usize, error: Option<io::Error>) {
        let Some(mut conn) = self.connections.remove(conn_id) else {
            return;
        };

        if let Err(e) = self.poll.registry().deregister(&mut conn.stream) {
            debug!(conn_id, error = %e, "Deregister failed");
        }
        conn.close();
        self.state.connection_closed();

        let open = self.connections.len();
        match error {
            Some(e) => debug!(
                conn_id,
                peer = %conn.peer,
                open,
                error = %e,
                "Connection closed on error"
            ),
            None => debug!(conn_id, peer = %conn.peer, open, "Client disconnected"),
        }
    }
}

fn log_message(conn_id: usize, message: &[u8]) {
    debug!(
        conn_id,
        message = %String::from_utf8_lossy(parser::strip_newline(message)),
        "Received message"
    );
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, SetupError> {
    (host, port)
        .to_socket_addrs()
        .stage(SetupStage::Resolve)?
        .next()
        .ok_or_else(|| {
            SetupError::new(
                SetupStage::Resolve,
                io::Error::new(io::ErrorKind::InvalidInput, format!("no address for {host}")),
            )
        })
}

/// Create a non-blocking TCP listener with SO_REUSEADDR.
fn create_listener(addr: SocketAddr, backlog: u32) -> Result<std::net::TcpListener, SetupError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .stage(SetupStage::TcpSocket)?;

    socket.set_reuse_address(true).stage(SetupStage::TcpSocket)?;
    socket.set_nonblocking(true).stage(SetupStage::TcpSocket)?;
    socket.bind(&addr.into()).stage(SetupStage::TcpBind)?;
    socket
        .listen(i32::try_from(backlog).unwrap_or(i32::MAX))
        .stage(SetupStage::Listen)?;

    Ok(socket.into())
}

/// Create a non-blocking UDP socket.
fn create_datagram_socket(addr: SocketAddr) -> Result<std::net::UdpSocket, SetupError> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .stage(SetupStage::UdpSocket)?;

    socket.set_nonblocking(true).stage(SetupStage::UdpSocket)?;
    socket.bind(&addr.into()).stage(SetupStage::UdpBind)?;

    Ok(socket.into())
}

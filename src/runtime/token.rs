//! Poll token assignment and classification.
//!
//! Client connections use their registry slot as token. The two fixed
//! sockets take tokens from the top of the range, which slab keys never
//! reach.

use mio::Token;

/// Token of the TCP listening socket.
pub const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Token of the UDP socket.
pub const DATAGRAM_TOKEN: Token = Token(usize::MAX - 1);

/// Which socket a readiness event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// The TCP listener has pending connections.
    Listener,
    /// The UDP socket has pending datagrams.
    Datagram,
    /// A client connection, by registry slot.
    Client(usize),
}

impl Source {
    /// The poll token registered for this source.
    pub fn token(self) -> Token {
        match self {
            Source::Listener => LISTENER_TOKEN,
            Source::Datagram => DATAGRAM_TOKEN,
            Source::Client(conn_id) => Token(conn_id),
        }
    }
}

impl From<Token> for Source {
    fn from(token: Token) -> Self {
        match token {
            LISTENER_TOKEN => Source::Listener,
            DATAGRAM_TOKEN => Source::Datagram,
            Token(conn_id) => Source::Client(conn_id),
        }
    }
}

//! Process-wide server state: connection counters and the running flag.
//!
//! Owned by the reactor and lent to the command handlers by `&mut`, so
//! there is exactly one writer and no locking.

/// Aggregate connection counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Stream connections successfully registered since start.
    pub total_connections_accepted: u64,
    /// Stream connections currently registered.
    pub current_connections: u64,
}

/// State shared between the reactor and the protocol handlers.
#[derive(Debug)]
pub struct ServerState {
    stats: ServerStats,
    running: bool,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// Fresh state: zero counters, running.
    pub fn new() -> Self {
        Self {
            stats: ServerStats::default(),
            running: true,
        }
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    /// Record a newly registered stream connection.
    pub fn connection_opened(&mut self) {
        self.stats.total_connections_accepted += 1;
        self.stats.current_connections += 1;
    }

    /// Record a closed stream connection. Never drops below zero.
    pub fn connection_closed(&mut self) {
        self.stats.current_connections = self.stats.current_connections.saturating_sub(1);
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Ask the reactor to stop after the current event batch.
    pub fn request_shutdown(&mut self) {
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ServerState::new();
        assert!(state.is_running());
        assert_eq!(state.stats(), ServerStats::default());
    }

    #[test]
    fn test_open_close_accounting() {
        let mut state = ServerState::new();
        state.connection_opened();
        state.connection_opened();
        state.connection_opened();
        state.connection_closed();

        let stats = state.stats();
        assert_eq!(stats.total_connections_accepted, 3);
        assert_eq!(stats.current_connections, 2);
    }

    #[test]
    fn test_current_never_negative() {
        let mut state = ServerState::new();
        state.connection_opened();
        state.connection_closed();
        state.connection_closed();
        state.connection_closed();

        let stats = state.stats();
        assert_eq!(stats.current_connections, 0);
        assert_eq!(stats.total_connections_accepted, 1);
    }

    #[test]
    fn test_total_is_monotonic() {
        let mut state = ServerState::new();
        let mut last = 0;
        for i in 0..20 {
            if i % 3 == 0 {
                state.connection_closed();
            } else {
                state.connection_opened();
            }
            let total = state.stats().total_connections_accepted;
            assert!(total >= last);
            last = total;
        }
    }

    #[test]
    fn test_request_shutdown() {
        let mut state = ServerState::new();
        state.request_shutdown();
        assert!(!state.is_running());
    }
}

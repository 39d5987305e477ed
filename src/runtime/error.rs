//! Server setup errors.

use std::fmt;
use std::io;

/// Step of socket and poll setup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStage {
    Resolve,
    TcpSocket,
    TcpBind,
    Listen,
    UdpSocket,
    UdpBind,
    Poll,
    Register,
}

impl fmt::Display for SetupStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            SetupStage::Resolve => "resolve bind address",
            SetupStage::TcpSocket => "create TCP socket",
            SetupStage::TcpBind => "bind TCP socket",
            SetupStage::Listen => "listen on TCP socket",
            SetupStage::UdpSocket => "create UDP socket",
            SetupStage::UdpBind => "bind UDP socket",
            SetupStage::Poll => "create poll instance",
            SetupStage::Register => "register socket with poll",
        };
        f.write_str(what)
    }
}

/// A fatal error while bringing the server up.
#[derive(Debug)]
pub struct SetupError {
    pub stage: SetupStage,
    pub source: io::Error,
}

impl SetupError {
    pub fn new(stage: SetupStage, source: io::Error) -> Self {
        Self { stage, source }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Failed to {}: {}", self.stage, self.source)
    }
}

impl std::error::Error for SetupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Extension trait for tagging I/O results with their setup stage.
pub(crate) trait SetupResultExt<T> {
    fn stage(self, stage: SetupStage) -> Result<T, SetupError>;
}

impl<T> SetupResultExt<T> for io::Result<T> {
    fn stage(self, stage: SetupStage) -> Result<T, SetupError> {
        self.map_err(|e| SetupError::new(stage, e))
    }
}

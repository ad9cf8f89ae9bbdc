//! # Sessions
//!
//! One persistent byte stream per subsystem, carrying fixed-size records.
//!
//! ## Failure Model
//!
//! A zero-byte read, a record cut short, a failed write or any other I/O
//! error ends the session. There is no partial-record recovery and no
//! reconnection.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};

use bytemuck::Pod;
use thiserror::Error;

use crate::protocol::Role;

/// A bidirectional stream a session can run over.
pub trait Transport: Read + Write + Send {
    /// Shuts the stream down in both directions.
    fn close(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

#[cfg(unix)]
impl Transport for std::os::unix::net::UnixStream {
    fn close(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Both)
    }
}

/// Errors that end a session.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Connecting to the orchestrator failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Orchestrator address.
        addr: SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The peer closed the stream before a record started.
    #[error("{role} session disconnected")]
    Disconnected {
        /// Session role.
        role: Role,
    },

    /// The peer closed the stream in the middle of a record.
    #[error("{role} session sent a short record: {got} of {expected} bytes")]
    ShortRecord {
        /// Session role.
        role: Role,
        /// Bytes received.
        got: usize,
        /// Record size.
        expected: usize,
    },

    /// Writing a record failed.
    #[error("{role} session write failed: {source}")]
    WriteFailed {
        /// Session role.
        role: Role,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Reading a record failed.
    #[error("{role} session read failed: {source}")]
    ReadFailed {
        /// Session role.
        role: Role,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl SessionError {
    /// Role of the session that failed, if one was established.
    #[must_use]
    pub const fn role(&self) -> Option<Role> {
        match self {
            Self::Connect { .. } => None,
            Self::Disconnected { role }
            | Self::ShortRecord { role, .. }
            | Self::WriteFailed { role, .. }
            | Self::ReadFailed { role, .. } => Some(*role),
        }
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// An established channel to one subsystem.
#[derive(Debug)]
pub struct Session<T> {
    role: Role,
    stream: T,
}

impl<T: Transport> Session<T> {
    /// Wraps an already-identified stream.
    pub fn new(role: Role, stream: T) -> Self {
        Self { role, stream }
    }

    /// Role of the subsystem on the other end.
    #[inline]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Sends this session's role tag. Called once by the subsystem side.
    pub fn announce(&mut self) -> SessionResult<()> {
        let tag = self.role.tag();
        self.send(&tag)
    }

    /// Writes one record.
    pub fn send<R: Pod>(&mut self, record: &R) -> SessionResult<()> {
        let role = self.role;
        self.stream
            .write_all(bytemuck::bytes_of(record))
            .and_then(|()| self.stream.flush())
            .map_err(|source| SessionError::WriteFailed { role, source })
    }

    /// Reads exactly one record.
    pub fn recv<R: Pod>(&mut self) -> SessionResult<R> {
        let mut record = R::zeroed();
        let buf = bytemuck::bytes_of_mut(&mut record);
        let expected = buf.len();
        let mut filled = 0;

        while filled < expected {
            match self.stream.read(&mut buf[filled..]) {
                Ok(0) if filled == 0 => return Err(SessionError::Disconnected { role: self.role }),
                Ok(0) => {
                    return Err(SessionError::ShortRecord {
                        role: self.role,
                        got: filled,
                        expected,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(source) => {
                    return Err(SessionError::ReadFailed {
                        role: self.role,
                        source,
                    })
                }
            }
        }
        Ok(record)
    }

    /// Sends `request` and blocks for the reply.
    pub fn exchange<Req: Pod, Rep: Pod>(&mut self, request: &Req) -> SessionResult<Rep> {
        self.send(request)?;
        self.recv()
    }

    /// Closes the stream. Errors from an already-closed peer are ignored.
    pub fn close(&mut self) {
        if let Err(e) = self.stream.close() {
            tracing::debug!(role = %self.role, error = %e, "session close");
        }
    }
}

impl Session<TcpStream> {
    /// Connects to the orchestrator at `addr` and announces `role`.
    pub fn connect_tcp(addr: SocketAddr, role: Role) -> SessionResult<Self> {
        let stream =
            TcpStream::connect(addr).map_err(|source| SessionError::Connect { addr, source })?;
        stream
            .set_nodelay(true)
            .map_err(|source| SessionError::Connect { addr, source })?;

        let mut session = Self::new(role, stream);
        session.announce()?;
        tracing::info!(%role, %addr, "connected to orchestrator");
        Ok(session)
    }
}

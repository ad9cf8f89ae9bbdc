//! # Subsystem Registration
//!
//! Waits for exactly one session per role before the tick loop starts.
//!
//! ```text
//! accept ──► read role tag (bounded) ──► valid? ──► free slot? ──► register
//!                   │                      │            │
//!                   └── drop ◄─────────────┴── drop ◄───┘
//! ```
//!
//! The listener is polled non-blocking so a termination request can cancel
//! the wait.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

use drivetrain_core::ServerSettings;
use thiserror::Error;

use crate::protocol::{read_role_tag, Role};
use crate::session::{Session, Transport};
use crate::signal::ShutdownSignal;

/// Errors that abort registration.
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// The listening socket failed.
    #[error("listener failed: {0}")]
    Listener(#[from] io::Error),

    /// Termination was requested before all roles registered.
    #[error("registration cancelled")]
    Cancelled,
}

/// Result type for registration.
pub type RegistrationResult<T> = Result<T, RegistrationError>;

/// One registered session per role.
#[derive(Debug)]
pub struct SessionSet<T> {
    /// Engine session.
    pub engine: Session<T>,
    /// Transmission session.
    pub transmission: Session<T>,
    /// Fuel session.
    pub fuel: Session<T>,
}

impl<T: Transport> SessionSet<T> {
    /// Closes every session.
    pub fn close_all(&mut self) {
        self.engine.close();
        self.transmission.close();
        self.fuel.close();
    }

    /// The session for `role`.
    pub fn get_mut(&mut self, role: Role) -> &mut Session<T> {
        match role {
            Role::Engine => &mut self.engine,
            Role::Transmission => &mut self.transmission,
            Role::Fuel => &mut self.fuel,
        }
    }
}

/// Connection counts seen during registration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RegistrationStats {
    /// Sessions registered.
    pub registered: u32,
    /// Connections with a tag outside {1, 2, 3}.
    pub rejected_invalid: u32,
    /// Connections repeating an already registered role.
    pub rejected_duplicate: u32,
    /// Connections that closed or stalled before sending a tag.
    pub handshake_failures: u32,
}

/// Accepts subsystem connections until every role is registered.
#[derive(Debug)]
pub struct Registrar {
    handshake_timeout: Duration,
    poll_interval: Duration,
    stats: RegistrationStats,
}

impl Registrar {
    /// Creates a registrar.
    #[must_use]
    pub fn new(handshake_timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            handshake_timeout,
            poll_interval,
            stats: RegistrationStats::default(),
        }
    }

    /// Creates a registrar from the `[server]` settings.
    #[must_use]
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new(settings.handshake_timeout(), settings.accept_poll())
    }

    /// Counts so far.
    #[must_use]
    pub const fn stats(&self) -> &RegistrationStats {
        &self.stats
    }

    /// Accepts connections on `listener` until one session per role is
    /// registered, or `shutdown` is raised.
    pub fn accept(
        &mut self,
        listener: &TcpListener,
        shutdown: &ShutdownSignal,
    ) -> RegistrationResult<SessionSet<TcpStream>> {
        listener.set_nonblocking(true)?;
        let mut slots: [Option<Session<TcpStream>>; 3] = [None, None, None];

        loop {
            if shutdown.is_requested() {
                for session in slots.iter_mut().flatten() {
                    session.close();
                }
                tracing::info!("registration cancelled");
                return Err(RegistrationError::Cancelled);
            }

            match listener.accept() {
                Ok((stream, peer)) => {
                    if let Some(session) = self.identify(stream, peer, &slots) {
                        let role = session.role();
                        slots[role.index()] = Some(session);
                        self.stats.registered += 1;
                        tracing::info!(%role, %peer, "subsystem registered");
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    std::thread::sleep(self.poll_interval);
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RegistrationError::Listener(e)),
            }

            slots = match slots {
                [Some(engine), Some(transmission), Some(fuel)] => {
                    tracing::info!("all subsystems registered");
                    return Ok(SessionSet {
                        engine,
                        transmission,
                        fuel,
                    });
                }
                pending => pending,
            };
        }
    }

    /// Reads the role tag of a fresh connection. Returns `None` (dropping
    /// the connection) if the tag is missing, invalid or already taken.
    fn identify(
        &mut self,
        mut stream: TcpStream,
        peer: SocketAddr,
        slots: &[Option<Session<TcpStream>>; 3],
    ) -> Option<Session<TcpStream>> {
        let tag = stream
            .set_nonblocking(false)
            .and_then(|()| stream.set_read_timeout(Some(self.handshake_timeout)))
            .and_then(|()| read_role_tag(&mut stream))
            .and_then(|tag| stream.set_read_timeout(None).map(|()| tag));

        let tag = match tag {
            Ok(tag) => tag,
            Err(e) => {
                self.stats.handshake_failures += 1;
                tracing::warn!(%peer, error = %e, "no role tag, closing connection");
                return None;
            }
        };

        let Some(role) = Role::from_tag(tag) else {
            self.stats.rejected_invalid += 1;
            tracing::warn!(%peer, tag, "invalid role tag, closing connection");
            return None;
        };

        if slots[role.index()].is_some() {
            self.stats.rejected_duplicate += 1;
            tracing::warn!(%peer, %role, "role already registered, closing connection");
            return None;
        }

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "set_nodelay failed");
        }
        Some(Session::new(role, stream))
    }
}

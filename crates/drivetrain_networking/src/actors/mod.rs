//! # Subsystem Actors
//!
//! Each subsystem is a blocking serve loop around one model: read a request,
//! compute, write the reply. The actor never initiates an exchange.
//!
//! | Actor | Request | Reply |
//! |---|---|---|
//! | [`EngineActor`] | [`EngineRequest`](crate::protocol::EngineRequest) | [`EngineReply`](crate::protocol::EngineReply) |
//! | [`TransmissionActor`] | [`TransmissionRequest`](crate::protocol::TransmissionRequest) | [`TransmissionReply`](crate::protocol::TransmissionReply) |
//! | [`FuelActor`] | [`FuelRequest`](crate::protocol::FuelRequest) | [`FuelReply`](crate::protocol::FuelReply) |

mod engine;
mod fuel;
mod transmission;

use std::ops::ControlFlow;

use bytemuck::Pod;

use crate::protocol::Role;
use crate::session::{Session, SessionError, SessionResult, Transport};

pub use engine::{EngineActor, EngineClock};
pub use fuel::FuelActor;
pub use transmission::TransmissionActor;

/// One subsystem's request handler.
pub trait Subsystem {
    /// Role this subsystem registers as.
    const ROLE: Role;
    /// Record the orchestrator sends.
    type Request: Pod;
    /// Record sent back.
    type Reply: Pod;

    /// Computes the reply to one request, or breaks to end the session.
    fn handle(&mut self, request: &Self::Request) -> ControlFlow<(), Self::Reply>;
}

/// Why a serve loop returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorExit {
    /// The orchestrator closed the session.
    OrchestratorClosed,
    /// The subsystem chose to stop.
    Stopped,
}

/// Summary of a finished serve loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActorReport {
    /// Requests answered.
    pub exchanges: u64,
    /// Why the loop ended.
    pub exit: ActorExit,
}

/// Answers requests on `session` until either side stops.
///
/// A clean close by the orchestrator is a normal exit; any other session
/// failure is returned as an error.
pub fn serve<S, T>(mut subsystem: S, mut session: Session<T>) -> SessionResult<ActorReport>
where
    S: Subsystem,
    T: Transport,
{
    let mut exchanges = 0u64;

    let exit = loop {
        let request: S::Request = match session.recv() {
            Ok(request) => request,
            Err(SessionError::Disconnected { .. }) => break ActorExit::OrchestratorClosed,
            Err(e) => return Err(e),
        };

        match subsystem.handle(&request) {
            ControlFlow::Continue(reply) => {
                session.send(&reply)?;
                exchanges += 1;
            }
            ControlFlow::Break(()) => {
                session.close();
                break ActorExit::Stopped;
            }
        }
    };

    tracing::info!(role = %S::ROLE, exchanges, ?exit, "subsystem stopped");
    Ok(ActorReport { exchanges, exit })
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::protocol::TransmissionReply;
    use std::os::unix::net::UnixStream;

    /// Echoes the gear back plus one, stopping after `limit` requests.
    struct Counter {
        limit: u64,
        seen: u64,
    }

    impl Subsystem for Counter {
        const ROLE: Role = Role::Transmission;
        type Request = TransmissionReply;
        type Reply = TransmissionReply;

        fn handle(&mut self, request: &TransmissionReply) -> ControlFlow<(), TransmissionReply> {
            if self.seen == self.limit {
                return ControlFlow::Break(());
            }
            self.seen += 1;
            ControlFlow::Continue(TransmissionReply::new(request.updated_gear + 1))
        }
    }

    fn spawn(
        limit: u64,
    ) -> (
        Session<UnixStream>,
        std::thread::JoinHandle<SessionResult<ActorReport>>,
    ) {
        let (a, b) = UnixStream::pair().unwrap();
        let actor = Session::new(Role::Transmission, b);
        let handle = std::thread::spawn(move || serve(Counter { limit, seen: 0 }, actor));
        (Session::new(Role::Transmission, a), handle)
    }

    #[test]
    fn test_serve_until_orchestrator_closes() {
        let (mut orchestrator, handle) = spawn(u64::MAX);
        for gear in 0..3 {
            let reply: TransmissionReply = orchestrator
                .exchange(&TransmissionReply::new(gear))
                .unwrap();
            assert_eq!(reply.updated_gear, gear + 1);
        }
        orchestrator.close();

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.exchanges, 3);
        assert_eq!(report.exit, ActorExit::OrchestratorClosed);
    }

    #[test]
    fn test_serve_until_subsystem_stops() {
        let (mut orchestrator, handle) = spawn(1);
        let _: TransmissionReply = orchestrator.exchange(&TransmissionReply::new(0)).unwrap();

        let err = orchestrator
            .exchange::<_, TransmissionReply>(&TransmissionReply::new(0))
            .unwrap_err();
        assert!(matches!(err, SessionError::Disconnected { .. }));

        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.exchanges, 1);
        assert_eq!(report.exit, ActorExit::Stopped);
    }

    #[test]
    fn test_short_request_is_an_error() {
        use std::io::Write;

        let (a, b) = UnixStream::pair().unwrap();
        let handle = std::thread::spawn(move || {
            serve(
                Counter { limit: 1, seen: 0 },
                Session::new(Role::Transmission, b),
            )
        });
        let mut raw = a;
        raw.write_all(&[1, 2, 3]).unwrap();
        drop(raw);

        let err = handle.join().unwrap().unwrap_err();
        assert!(matches!(err, SessionError::ShortRecord { got: 3, .. }));
    }
}

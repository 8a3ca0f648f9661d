use crate::AdmissionError;
use serde::Serialize;
use std::fmt;

/// Lifecycle of one lab instance's capacity reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TicketState {
    /// Waiting in the FIFO queue for capacity.
    Queued,
    /// Capacity reserved; the lab may begin starting machines.
    Admitted,
    /// All machines started; the lab is doing work.
    Running,
    /// Reservation returned. Terminal, reached exactly once.
    Released,
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Admitted => "admitted",
            Self::Running => "running",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}

pub fn validate_transition(from: TicketState, to: TicketState) -> Result<(), AdmissionError> {
    let valid = matches!(
        (from, to),
        (TicketState::Queued, TicketState::Admitted)
            | (TicketState::Admitted, TicketState::Running)
            // Release is reachable from both admitted (startup failed) and
            // running (normal teardown).
            | (TicketState::Admitted | TicketState::Running, TicketState::Released)
    );

    if valid {
        Ok(())
    } else {
        Err(AdmissionError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

//! Memory-cost admission control for concurrent lab startups.
//!
//! The controller owns the only piece of shared mutable state in the core:
//! a committed-bytes counter guarded by one mutex. A startup request is
//! admitted when it is at the head of the FIFO queue and its estimated cost
//! fits under the ceiling; otherwise it blocks. Admission is never granted
//! out of arrival order, so early requesters cannot be starved by a stream
//! of small labs slipping past a large one.
//!
//! [`admit`](AdmissionController::admit) blocks with no internal timeout; a
//! hosting caller may impose one and must translate an abandoned wait into a
//! release (dropping the permit does this). Operational caveat: a forcibly
//! killed caller that never drops its permit leaks its reservation until the
//! process exits — there is no cancellation primitive beyond voluntary
//! release.

use crate::lifecycle::{validate_transition, TicketState};
use crate::telemetry::MemoryTelemetry;
use crate::AdmissionError;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, warn};

/// Reservation record for one lab instance.
#[derive(Debug, Clone)]
pub struct AdmissionTicket {
    /// FIFO sequence number, assigned at arrival.
    pub seq: u64,
    /// Estimated memory cost in bytes, fixed for the ticket's lifetime.
    pub cost: u64,
    pub queued_at: Instant,
    pub state: TicketState,
}

#[derive(Debug)]
struct QueueState {
    committed: u64,
    next_seq: u64,
    waiting: VecDeque<u64>,
}

#[derive(Debug)]
pub struct AdmissionController {
    ceiling: u64,
    state: Mutex<QueueState>,
    wakeup: Condvar,
}

impl AdmissionController {
    /// Controller with a fixed memory ceiling in bytes.
    pub fn new(ceiling_bytes: u64) -> Self {
        Self {
            ceiling: ceiling_bytes,
            state: Mutex::new(QueueState {
                committed: 0,
                next_seq: 0,
                waiting: VecDeque::new(),
            }),
            wakeup: Condvar::new(),
        }
    }

    /// Derive the ceiling from host telemetry, keeping a quarter of
    /// available memory as headroom. When telemetry is unavailable the
    /// static fallback is used instead; with no fallback configured the
    /// controller refuses to start rather than run unbounded.
    pub fn from_telemetry(
        telemetry: &dyn MemoryTelemetry,
        static_fallback_bytes: Option<u64>,
    ) -> Result<Self, AdmissionError> {
        match telemetry.available_bytes() {
            Some(available) => {
                let ceiling = available / 4 * 3;
                debug!("admission ceiling {ceiling} bytes (available {available})");
                Ok(Self::new(ceiling))
            }
            None => match static_fallback_bytes {
                Some(fallback) => {
                    warn!("memory telemetry unavailable, using static ceiling {fallback} bytes");
                    Ok(Self::new(fallback))
                }
                None => Err(AdmissionError::CapacityUnavailable),
            },
        }
    }

    pub fn ceiling(&self) -> u64 {
        self.ceiling
    }

    pub fn committed(&self) -> u64 {
        self.lock_state().committed
    }

    /// Number of requests currently waiting for capacity.
    pub fn queued(&self) -> usize {
        self.lock_state().waiting.len()
    }

    /// Reserve `cost` bytes, blocking until capacity is available.
    ///
    /// A request costing more than the ceiling is admitted once the
    /// controller is otherwise idle; rejecting it outright would make such
    /// a lab permanently unrunnable.
    pub fn admit(&self, cost: u64) -> AdmissionPermit<'_> {
        let queued_at = Instant::now();
        let mut state = self.lock_state();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.waiting.push_back(seq);
        debug!("admission request seq {seq} cost {cost} queued");

        loop {
            let at_head = state.waiting.front() == Some(&seq);
            if at_head && self.fits(&state, cost) {
                state.waiting.pop_front();
                state.committed += cost;
                debug!(
                    "admitted seq {seq}: committed {}/{} bytes",
                    state.committed, self.ceiling
                );
                // The next head may also fit; let it re-check.
                self.wakeup.notify_all();
                return AdmissionPermit {
                    controller: self,
                    ticket: AdmissionTicket {
                        seq,
                        cost,
                        queued_at,
                        state: TicketState::Admitted,
                    },
                    released: false,
                };
            }
            state = match self.wakeup.wait(state) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
    }

    /// Reserve `cost` bytes only if that is possible without waiting.
    pub fn try_admit(&self, cost: u64) -> Option<AdmissionPermit<'_>> {
        let mut state = self.lock_state();
        if !state.waiting.is_empty() || !self.fits(&state, cost) {
            return None;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.committed += cost;
        Some(AdmissionPermit {
            controller: self,
            ticket: AdmissionTicket {
                seq,
                cost,
                queued_at: Instant::now(),
                state: TicketState::Admitted,
            },
            released: false,
        })
    }

    fn fits(&self, state: &QueueState, cost: u64) -> bool {
        state.committed.saturating_add(cost) <= self.ceiling || state.committed == 0
    }

    fn release_cost(&self, seq: u64, cost: u64) {
        let mut state = self.lock_state();
        state.committed = state.committed.saturating_sub(cost);
        debug!(
            "released seq {seq}: committed {}/{} bytes",
            state.committed, self.ceiling
        );
        self.wakeup.notify_all();
    }

    fn lock_state(&self) -> MutexGuard<'_, QueueState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// A held capacity reservation. The reservation is returned exactly once:
/// on [`release`](AdmissionPermit::release), or on drop if the holder
/// unwinds or forgets — failure during startup still frees capacity.
pub struct AdmissionPermit<'a> {
    controller: &'a AdmissionController,
    ticket: AdmissionTicket,
    released: bool,
}

impl AdmissionPermit<'_> {
    pub fn ticket(&self) -> &AdmissionTicket {
        &self.ticket
    }

    /// Record that the lab's machines are all up.
    pub fn mark_running(&mut self) -> Result<(), AdmissionError> {
        validate_transition(self.ticket.state, TicketState::Running)?;
        self.ticket.state = TicketState::Running;
        Ok(())
    }

    /// Return the reservation. Equivalent to dropping, but explicit at
    /// call sites that want the release to be visible.
    pub fn release(self) {
        // Drop does the work.
    }

    fn do_release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.ticket.state = TicketState::Released;
        self.controller.release_cost(self.ticket.seq, self.ticket.cost);
    }
}

impl Drop for AdmissionPermit<'_> {
    fn drop(&mut self) {
        self.do_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::FixedTelemetry;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::thread;
    use std::time::Duration;

    fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn admits_within_ceiling_immediately() {
        let controller = AdmissionController::new(100);
        let a = controller.admit(40);
        let _b = controller.admit(40);
        assert_eq!(controller.committed(), 80);

        assert!(controller.try_admit(40).is_none());
        drop(a);
        assert_eq!(controller.committed(), 40);
        assert!(controller.try_admit(40).is_some());
    }

    #[test]
    fn third_request_waits_until_capacity_released() {
        let controller = Arc::new(AdmissionController::new(100));
        let a = controller.admit(40);
        let b = controller.admit(40);

        let worker = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let c = controller.admit(40);
                let committed = controller.committed();
                drop(c);
                committed
            })
        };

        wait_until(|| controller.queued() == 1);
        // C must not slip in while A and B hold 80 of 100.
        thread::sleep(Duration::from_millis(30));
        assert_eq!(controller.committed(), 80);

        drop(a);
        let committed_when_c_ran = worker.join().unwrap();
        assert_eq!(committed_when_c_ran, 80); // B's 40 + C's 40
        drop(b);
        assert_eq!(controller.committed(), 0);
    }

    #[test]
    fn admission_is_strictly_fifo() {
        let controller = Arc::new(AdmissionController::new(100));
        let order = Arc::new(StdMutex::new(Vec::new()));

        let a = controller.admit(59);

        let b_handle = {
            let (controller, order) = (Arc::clone(&controller), Arc::clone(&order));
            thread::spawn(move || {
                let permit = controller.admit(60);
                order.lock().unwrap().push("b");
                thread::sleep(Duration::from_millis(20));
                drop(permit);
            })
        };
        wait_until(|| controller.queued() == 1);

        // C's 41 bytes would fit beside A's 59, but B arrived first and is
        // still pending, so C must wait its turn.
        let c_handle = {
            let (controller, order) = (Arc::clone(&controller), Arc::clone(&order));
            thread::spawn(move || {
                let permit = controller.admit(41);
                order.lock().unwrap().push("c");
                drop(permit);
            })
        };
        wait_until(|| controller.queued() == 2);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(controller.committed(), 59, "no overtaking while queued");

        drop(a);
        b_handle.join().unwrap();
        c_handle.join().unwrap();
        assert_eq!(*order.lock().unwrap(), vec!["b", "c"]);
        assert_eq!(controller.committed(), 0);
    }

    #[test]
    fn failure_path_still_releases_exactly_once() {
        let controller = AdmissionController::new(100);

        fn failing_startup(controller: &AdmissionController) -> Result<(), &'static str> {
            let _permit = controller.admit(40);
            Err("image pull failed")
        }

        assert!(failing_startup(&controller).is_err());
        assert_eq!(controller.committed(), 0);
    }

    #[test]
    fn explicit_release_returns_capacity() {
        let controller = AdmissionController::new(100);
        let permit = controller.admit(70);
        assert_eq!(controller.committed(), 70);
        permit.release();
        assert_eq!(controller.committed(), 0);
    }

    #[test]
    fn oversized_lab_is_admitted_alone() {
        let controller = Arc::new(AdmissionController::new(50));
        let big = controller.admit(80);
        assert_eq!(controller.committed(), 80);

        let worker = {
            let controller = Arc::clone(&controller);
            thread::spawn(move || {
                let _p = controller.admit(10);
            })
        };
        wait_until(|| controller.queued() == 1);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(controller.committed(), 80, "nothing else admitted");

        drop(big);
        worker.join().unwrap();
        assert_eq!(controller.committed(), 0);
    }

    #[test]
    fn mark_running_transitions_once() {
        let controller = AdmissionController::new(100);
        let mut permit = controller.admit(10);
        assert_eq!(permit.ticket().state, TicketState::Admitted);
        permit.mark_running().unwrap();
        assert_eq!(permit.ticket().state, TicketState::Running);
        assert!(permit.mark_running().is_err());
    }

    #[test]
    fn ceiling_from_telemetry_keeps_headroom() {
        let telemetry = FixedTelemetry::new(16 << 30, 8 << 30);
        let controller = AdmissionController::from_telemetry(&telemetry, None).unwrap();
        assert_eq!(controller.ceiling(), (8_u64 << 30) / 4 * 3);
    }

    #[test]
    fn missing_telemetry_falls_back_to_static_ceiling() {
        let telemetry = FixedTelemetry::unavailable();
        let controller =
            AdmissionController::from_telemetry(&telemetry, Some(4 << 30)).unwrap();
        assert_eq!(controller.ceiling(), 4 << 30);
    }

    #[test]
    fn missing_telemetry_without_fallback_is_an_error() {
        let telemetry = FixedTelemetry::unavailable();
        let err = AdmissionController::from_telemetry(&telemetry, None).unwrap_err();
        assert!(matches!(err, AdmissionError::CapacityUnavailable));
    }
}

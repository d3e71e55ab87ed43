//! Interruption and route-change handling.
//!
//! System notifications arrive on a channel and are handled on a dedicated
//! background thread, so whoever delivers them never blocks on the audio
//! unit's start/stop.

use std::io;
use std::sync::Weak;
use std::thread;

use crossbeam_channel::{select, unbounded, Receiver, Sender};

use crate::models::events::{InterruptionKind, RouteChangeReason, SystemAudioEvent};
use crate::models::state::InterruptionState;
use crate::session::device_session::SessionCore;

/// Create the channel a session reads system audio notifications from.
pub fn event_channel() -> (Sender<SystemAudioEvent>, Receiver<SystemAudioEvent>) {
    unbounded()
}

/// Drives a session's unit through interruptions.
///
/// ```text
/// not interrupted ──began──→ interrupted   (stop unit, keep it allocated)
/// interrupted     ──ended──→ not interrupted (restart unit)
/// ```
/// Route changes are informational and never touch the unit.
pub(crate) struct InterruptionMonitor {
    session: Weak<SessionCore>,
    state: InterruptionState,
}

impl InterruptionMonitor {
    pub(crate) fn new(session: Weak<SessionCore>) -> Self {
        Self {
            session,
            state: InterruptionState::NotInterrupted,
        }
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> InterruptionState {
        self.state
    }

    /// Start the monitor thread for `session`.
    pub(crate) fn spawn(
        session: Weak<SessionCore>,
        events: Receiver<SystemAudioEvent>,
    ) -> io::Result<MonitorHandle> {
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let mut monitor = Self::new(session);

        let thread = thread::Builder::new()
            .name("mic-capture-events".into())
            .spawn(move || monitor.run(&events, &shutdown_rx))?;

        Ok(MonitorHandle {
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    fn run(&mut self, events: &Receiver<SystemAudioEvent>, shutdown: &Receiver<()>) {
        loop {
            select! {
                recv(events) -> event => match event {
                    Ok(event) => self.handle_event(event),
                    Err(_) => {
                        log::debug!("system audio event source closed");
                        break;
                    }
                },
                recv(shutdown) -> _ => break,
            }
        }
    }

    pub(crate) fn handle_event(&mut self, event: SystemAudioEvent) {
        let Some(session) = self.session.upgrade() else {
            return;
        };
        if session.state().is_disposed() {
            return;
        }

        match event {
            SystemAudioEvent::Interruption(kind) => match (kind, self.state) {
                (InterruptionKind::Began, InterruptionState::NotInterrupted) => {
                    log::debug!("interruption began");
                    self.state = InterruptionState::Interrupted;
                    session.suspend();
                }
                (InterruptionKind::Ended, InterruptionState::Interrupted) => {
                    log::debug!("interruption ended");
                    self.state = InterruptionState::NotInterrupted;
                    session.resume();
                }
                (kind, state) => {
                    log::debug!("ignoring interruption {:?} while {:?}", kind, state);
                }
            },
            SystemAudioEvent::RouteChange {
                reason,
                previous_route,
            } => Self::log_route_change(reason, previous_route.as_deref()),
        }
    }

    fn log_route_change(reason: RouteChangeReason, previous_route: Option<&str>) {
        log::debug!("route change: {}", reason);
        if reason == RouteChangeReason::RouteConfigurationChange {
            return;
        }
        if let Some(route) = previous_route {
            log::debug!("previous route: {}", route);
        }
    }
}

/// Subscription of a session to its monitor thread.
pub(crate) struct MonitorHandle {
    shutdown: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stop delivering events to the session. The thread exits on its next
    /// wakeup.
    pub(crate) fn unsubscribe(&mut self) {
        self.shutdown.take();
    }

    pub(crate) fn join(&mut self) {
        self.unsubscribe();
        if let Some(thread) = self.thread.take() {
            join_unless_current(thread);
        }
    }
}

/// Never join the current thread: the last session reference can be
/// dropped from the monitor thread itself.
fn join_unless_current(handle: thread::JoinHandle<()>) {
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        log::error!("audio session event thread panicked");
    }
}

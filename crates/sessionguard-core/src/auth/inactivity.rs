//! Idle logout.
//!
//! `InactivityMonitor` is a debounce timer over an [`ActivityBus`]: every
//! qualifying input event pushes the deadline out by the full timeout, and
//! if the deadline passes the callback runs once. `InactivityGuard` binds a
//! monitor to a [`SessionContext`] so it is armed exactly while a credential
//! is held and logs the session out on expiry.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::SessionContext;
use crate::models::AccessCredential;

/// Capacity of the activity broadcast channel.
/// Listeners only care that *something* happened, so lagging is harmless.
const ACTIVITY_CHANNEL_CAPACITY: usize = 64;

/// Input events a UI can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    PointerMove,
    PointerDown,
    KeyDown,
    TouchStart,
    Scroll,
    Focus,
    Resize,
}

impl InputEvent {
    /// Events that count as user activity
    pub const IDLE_RESETTING: [InputEvent; 5] = [
        InputEvent::PointerMove,
        InputEvent::PointerDown,
        InputEvent::KeyDown,
        InputEvent::TouchStart,
        InputEvent::Scroll,
    ];

    pub fn resets_idle(self) -> bool {
        Self::IDLE_RESETTING.contains(&self)
    }
}

/// Fan-out channel from input producers to activity listeners.
#[derive(Clone)]
pub struct ActivityBus {
    tx: broadcast::Sender<InputEvent>,
}

impl Default for ActivityBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(ACTIVITY_CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Report an input event. Events with no listener are dropped.
    pub fn publish(&self, event: InputEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InputEvent> {
        self.tx.subscribe()
    }

    /// Number of listeners currently registered
    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Callback run when the idle window expires
pub type TimeoutCallback = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct ArmedTimer {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Debounced idle timer. Inert until [`enable`](Self::enable)d.
///
/// While enabled it holds one listener on the bus and one pending deadline;
/// both are released on [`disable`](Self::disable), on a timeout change, and
/// on drop.
pub struct InactivityMonitor {
    bus: ActivityBus,
    timeout: Duration,
    on_timeout: TimeoutCallback,
    armed: Option<ArmedTimer>,
}

impl InactivityMonitor {
    pub fn new<F>(bus: ActivityBus, timeout: Duration, on_timeout: F) -> Self
    where
        F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        Self {
            bus,
            timeout,
            on_timeout: Arc::new(on_timeout),
            armed: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// True while a timer is pending. A timer that has fired no longer counts.
    pub fn is_enabled(&self) -> bool {
        self.armed
            .as_ref()
            .is_some_and(|armed| !armed.handle.is_finished())
    }

    /// Start listening and arm the timer. No-op if a timer is already pending.
    ///
    /// Must be called from within a tokio runtime.
    pub fn enable(&mut self) {
        if self.is_enabled() {
            return;
        }
        self.disable();
        debug!(timeout_secs = self.timeout.as_secs(), "Inactivity monitor armed");
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(watch_idle(
            self.bus.subscribe(),
            self.timeout,
            cancel.clone(),
            Arc::clone(&self.on_timeout),
        ));
        self.armed = Some(ArmedTimer { cancel, handle });
    }

    /// Stop listening and cancel any pending deadline.
    pub fn disable(&mut self) {
        if let Some(armed) = self.armed.take() {
            debug!("Inactivity monitor disarmed");
            armed.cancel.cancel();
            armed.handle.abort();
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }

    /// Change the idle window. An armed monitor restarts with a full window.
    pub fn set_timeout(&mut self, timeout: Duration) {
        if timeout == self.timeout {
            return;
        }
        self.timeout = timeout;
        if self.is_enabled() {
            self.restart();
        }
    }

    /// Drop any pending timer and arm a fresh one with a full window.
    pub fn restart(&mut self) {
        self.disable();
        self.enable();
    }
}

impl Drop for InactivityMonitor {
    fn drop(&mut self) {
        self.disable();
    }
}

async fn watch_idle(
    mut events: broadcast::Receiver<InputEvent>,
    timeout: Duration,
    cancel: CancellationToken,
    on_timeout: TimeoutCallback,
) {
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            () = &mut deadline => break,
            received = events.recv() => match received {
                Ok(event) if event.resets_idle() => {
                    deadline.as_mut().reset(Instant::now() + timeout);
                }
                Ok(_) => {}
                // Missed some events, but they were still activity
                Err(RecvError::Lagged(_)) => {
                    deadline.as_mut().reset(Instant::now() + timeout);
                }
                Err(RecvError::Closed) => {
                    if !wait_out(deadline.as_mut(), &cancel).await {
                        return;
                    }
                    break;
                }
            },
        }
    }

    info!(timeout_secs = timeout.as_secs(), "Idle timeout reached");
    // Detached so that whatever the callback tears down can't cancel it
    tokio::spawn(on_timeout());
}

/// Wait for the deadline with no listener left. False if cancelled first.
async fn wait_out(deadline: std::pin::Pin<&mut Sleep>, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        () = deadline => true,
    }
}

/// Keeps an inactivity monitor in step with a session.
///
/// Enabled while the session holds an access credential, with a fresh window
/// each time the credential changes; on expiry it calls
/// [`SessionContext::logout`]. Dropping the guard disarms everything.
pub struct InactivityGuard {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl InactivityGuard {
    pub fn spawn(session: &Arc<SessionContext>, bus: ActivityBus, timeout: Duration) -> Self {
        let weak = Arc::downgrade(session);
        let on_timeout = move || -> BoxFuture<'static, ()> {
            let weak = weak.clone();
            async move {
                if let Some(session) = weak.upgrade() {
                    info!("Logging out after inactivity");
                    session.logout().await;
                }
            }
            .boxed()
        };

        let mut monitor = InactivityMonitor::new(bus, timeout, on_timeout);
        let mut states = session.subscribe();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut watched: Option<AccessCredential> = None;
            loop {
                // Values, not presence: a logout and a login can coalesce into one change
                let current = states.borrow_and_update().access_token.clone();
                if current != watched {
                    match current {
                        Some(_) => monitor.restart(),
                        None => monitor.disable(),
                    }
                    watched = current;
                }

                tokio::select! {
                    _ = task_cancel.cancelled() => break,
                    changed = states.changed() => {
                        if changed.is_err() {
                            // Session dropped
                            break;
                        }
                    }
                }
            }
            monitor.disable();
        });

        Self { cancel, handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for InactivityGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

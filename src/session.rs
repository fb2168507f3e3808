use crate::error::ScopeError;
use crate::scope::{ScopeClient, Transport};
use crate::types::{AcquisitionMode, Capture};
use crate::utils::{PollError, poll_until};
use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Timing of the background trigger wait
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Pause between two `:TRIG:STAT?` queries
    pub poll_interval: Duration,
    /// Give up waiting for a trigger after this long, `None` waits until cancelled
    pub trigger_timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            trigger_timeout: None,
        }
    }
}

/// Output of a background acquisition
#[derive(Debug)]
pub enum AcquisitionEvent {
    Captured(Capture),
    /// The acquisition was aborted; any partial capture is dropped
    Failed(ScopeError),
    /// Always the last event of an acquisition. The session is Idle again.
    Finished { cancelled: bool },
}

#[derive(Debug, Default)]
struct SessionState {
    mode: AcquisitionMode,
    cancel_requested: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<SessionState>,
    wake: Condvar,
}

impl Shared {
    fn cancel(&self) {
        let mut state = self.state.lock();
        if state.mode != AcquisitionMode::Idle {
            state.cancel_requested = true;
            self.wake.notify_all();
        }
    }
}

/// Cloneable handle that cancels the session's in-flight acquisition,
/// e.g. from a signal handler
#[derive(Clone)]
pub struct CancelHandle {
    shared: Arc<Shared>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Whether an acquisition is in flight
    pub fn is_busy(&self) -> bool {
        self.shared.state.lock().mode != AcquisitionMode::Idle
    }
}

/// Drives captures on one scope, either synchronously or as a background
/// single-shot or free-running trigger loop.
///
/// At most one background acquisition runs at a time. Its captures are
/// delivered as [`AcquisitionEvent`]s on [`AcquisitionSession::events`].
///
/// # Examples
///
/// ```no_run
/// use ds1000z::{AcquisitionEvent, AcquisitionSession, ScopeClient, SessionConfig};
///
/// let client = ScopeClient::new("192.168.1.50", 5555)?;
/// let mut session = AcquisitionSession::new(client, SessionConfig::default());
///
/// session.trigger_single()?;
/// for event in session.events().iter() {
///     match event {
///         AcquisitionEvent::Captured(capture) => println!("{} samples", capture.sample_count()),
///         AcquisitionEvent::Failed(e) => eprintln!("{e}"),
///         AcquisitionEvent::Finished { .. } => break,
///     }
/// }
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct AcquisitionSession<T: Transport + 'static> {
    client: Arc<Mutex<ScopeClient<T>>>,
    shared: Arc<Shared>,
    config: SessionConfig,
    events_tx: Sender<AcquisitionEvent>,
    events_rx: Receiver<AcquisitionEvent>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Transport + 'static> AcquisitionSession<T> {
    pub fn new(client: ScopeClient<T>, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            client: Arc::new(Mutex::new(client)),
            shared: Arc::new(Shared::default()),
            config,
            events_tx,
            events_rx,
            worker: None,
        }
    }

    pub fn mode(&self) -> AcquisitionMode {
        self.shared.state.lock().mode
    }

    pub fn is_busy(&self) -> bool {
        self.mode() != AcquisitionMode::Idle
    }

    /// Receiver for captures and lifecycle events of background acquisitions
    pub fn events(&self) -> Receiver<AcquisitionEvent> {
        self.events_rx.clone()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run `f` on the client while no background acquisition is in flight
    pub fn with_client<R>(
        &self,
        f: impl FnOnce(&mut ScopeClient<T>) -> Result<R, ScopeError>,
    ) -> Result<R, ScopeError> {
        let state = self.shared.state.lock();
        if state.mode != AcquisitionMode::Idle {
            return Err(ScopeError::AcquisitionInFlight(state.mode));
        }
        let mut client = self.client.lock();
        drop(state);
        f(&mut client)
    }

    /// Capture every displayed channel right now, without arming a trigger
    pub fn capture_now(&self) -> Result<Capture, ScopeError> {
        self.with_client(|client| client.capture())
    }

    /// Arm one trigger in the background and deliver the resulting capture
    pub fn trigger_single(&mut self) -> Result<(), ScopeError> {
        self.start(AcquisitionMode::SingleInFlight)
    }

    /// Re-arm after every capture until cancelled or a transfer fails
    pub fn trigger_loop(&mut self) -> Result<(), ScopeError> {
        self.start(AcquisitionMode::LoopInFlight)
    }

    /// Request the in-flight acquisition to stop.
    ///
    /// A waiting trigger poll is woken immediately. A transfer already in
    /// progress runs to completion. Once this returns no further trigger is
    /// armed. Does nothing while Idle.
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Block until the background acquisition, if any, has finished
    pub fn wait(&mut self) -> Result<(), ScopeError> {
        match self.worker.take() {
            Some(handle) => handle.join().map_err(|_| ScopeError::TaskPanicked),
            None => Ok(()),
        }
    }

    /// Cancel any acquisition and hand back the client
    pub fn into_client(mut self) -> Option<ScopeClient<T>> {
        self.cancel();
        let _ = self.wait();
        let client = Arc::clone(&self.client);
        drop(self);
        Arc::try_unwrap(client).ok().map(Mutex::into_inner)
    }

    fn start(&mut self, mode: AcquisitionMode) -> Result<(), ScopeError> {
        {
            let state = self.shared.state.lock();
            if state.mode != AcquisitionMode::Idle {
                return Err(ScopeError::AcquisitionInFlight(state.mode));
            }
        }

        // A previous worker is Idle already and only has its last event to send
        self.wait()?;

        {
            let mut state = self.shared.state.lock();
            state.mode = mode;
            state.cancel_requested = false;
        }

        let worker = Worker {
            client: Arc::clone(&self.client),
            shared: Arc::clone(&self.shared),
            config: self.config.clone(),
            events: self.events_tx.clone(),
            repeat: mode == AcquisitionMode::LoopInFlight,
        };

        info!("Starting acquisition ({mode:?})");
        self.worker = Some(thread::spawn(move || worker.run()));
        Ok(())
    }
}

impl<T: Transport + 'static> Drop for AcquisitionSession<T> {
    fn drop(&mut self) {
        self.cancel();
        let _ = self.wait();
    }
}

enum Outcome {
    Completed,
    Cancelled,
}

struct Worker<T: Transport> {
    client: Arc<Mutex<ScopeClient<T>>>,
    shared: Arc<Shared>,
    config: SessionConfig,
    events: Sender<AcquisitionEvent>,
    repeat: bool,
}

impl<T: Transport> Worker<T> {
    fn run(self) {
        let result = self.acquire();

        self.shared.state.lock().mode = AcquisitionMode::Idle;

        let cancelled = match result {
            Ok(Outcome::Completed) => false,
            Ok(Outcome::Cancelled) => true,
            Err(e) => {
                error!("Acquisition aborted: {e}");
                let _ = self.events.send(AcquisitionEvent::Failed(e));
                false
            }
        };

        info!("Acquisition finished (cancelled: {cancelled})");
        let _ = self.events.send(AcquisitionEvent::Finished { cancelled });
    }

    fn acquire(&self) -> Result<Outcome, ScopeError> {
        loop {
            let Some(capture) = self.acquire_once()? else {
                return Ok(Outcome::Cancelled);
            };
            debug!(
                "Captured {} channel(s), {} samples",
                capture.channel_count(),
                capture.sample_count()
            );
            let _ = self.events.send(AcquisitionEvent::Captured(capture));

            if !self.repeat {
                return Ok(Outcome::Completed);
            }
        }
    }

    /// Arm, wait for the acquisition to stop, then transfer it.
    /// `None` when cancelled before the transfer started.
    fn acquire_once(&self) -> Result<Option<Capture>, ScopeError> {
        {
            let state = self.shared.state.lock();
            if state.cancel_requested {
                return Ok(None);
            }
            self.client.lock().single()?;
        }
        debug!("Armed, waiting for trigger");

        let stopped = poll_until(
            || {
                self.client
                    .lock()
                    .trigger_status()
                    .map(|status| status.is_stopped())
            },
            self.config.trigger_timeout,
            self.config.poll_interval,
            |interval| self.pause(interval),
        );

        match stopped {
            Ok(()) => {}
            Err(PollError::Cancelled) => return Ok(None),
            Err(PollError::Timeout) => return Err(ScopeError::Timeout),
            Err(PollError::ConditionError(e)) => return Err(e),
        }

        self.client.lock().capture().map(Some)
    }

    /// Sleep up to `interval`, returning early with `false` on cancellation
    fn pause(&self, interval: Duration) -> bool {
        let mut state = self.shared.state.lock();
        if state.cancel_requested {
            return false;
        }
        self.shared.wake.wait_for(&mut state, interval);
        !state.cancel_requested
    }
}

use std::time::{Duration, Instant};

/// Error type for polling operations
#[derive(Debug)]
pub enum PollError<E> {
    /// Operation timed out
    Timeout,
    /// The pause function asked to stop polling
    Cancelled,
    /// Error occurred in the condition function
    ConditionError(E),
}

impl<E> std::fmt::Display for PollError<E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::Timeout => write!(f, "Operation timed out"),
            PollError::Cancelled => write!(f, "Polling cancelled"),
            PollError::ConditionError(e) => write!(f, "Condition error: {}", e),
        }
    }
}

impl<E> std::error::Error for PollError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Timeout | PollError::Cancelled => None,
            PollError::ConditionError(e) => Some(e),
        }
    }
}

/// Poll a condition until it holds, times out, or is cancelled
///
/// Calls `condition` until it returns `Ok(true)`. Between calls `pause` is
/// invoked with `poll_interval`; it should block for at most that long and
/// return `false` to stop polling early.
///
/// # Arguments
/// * `condition` - Returns `Ok(true)` when complete, `Ok(false)` to keep polling
/// * `timeout` - Maximum duration to wait, `None` waits indefinitely
/// * `poll_interval` - Passed to `pause` between condition checks
/// * `pause` - Waits between checks, returns `false` to cancel
///
/// # Returns
/// * `Ok(())` when condition returns `Ok(true)`
/// * `Err(PollError::Timeout)` when timeout is reached
/// * `Err(PollError::Cancelled)` when `pause` returns `false`
/// * `Err(PollError::ConditionError(e))` when condition returns an error
///
/// # Example
/// ```
/// use std::time::Duration;
/// use ds1000z::utils::{poll_until, sleep_pause};
///
/// let mut attempts = 0;
/// poll_until(
///     || {
///         attempts += 1;
///         Ok::<bool, std::io::Error>(attempts >= 3)
///     },
///     Some(Duration::from_secs(1)),
///     Duration::from_millis(5),
///     sleep_pause,
/// )?;
/// assert_eq!(attempts, 3);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn poll_until<F, P, E>(
    mut condition: F,
    timeout: Option<Duration>,
    poll_interval: Duration,
    mut pause: P,
) -> Result<(), PollError<E>>
where
    F: FnMut() -> Result<bool, E>,
    P: FnMut(Duration) -> bool,
{
    let start = Instant::now();

    loop {
        if timeout.is_some_and(|limit| start.elapsed() >= limit) {
            return Err(PollError::Timeout);
        }

        match condition() {
            Ok(true) => return Ok(()),
            Ok(false) => {
                if !pause(poll_interval) {
                    return Err(PollError::Cancelled);
                }
            }
            Err(e) => return Err(PollError::ConditionError(e)),
        }
    }
}

/// Pause that simply sleeps and never cancels
pub fn sleep_pause(interval: Duration) -> bool {
    std::thread::sleep(interval);
    true
}

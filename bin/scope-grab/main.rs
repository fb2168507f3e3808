use chrono::Utc;
use clap::{Parser, ValueEnum};
use ds1000z::{
    AcquisitionEvent, AcquisitionSession, AppConfig, CancelHandle, Capture, CaptureHistory,
    CaptureLog, ScopeClient, TcpTransport, load_config_or_default, plot_capture,
};
use env_logger::Env;
use log::{LevelFilter, debug, error, info, warn};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::{fs, path::Path, path::PathBuf, process};

/// Conventional status for termination by SIGINT
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Transfer whatever is in acquisition memory right now
    Capture,
    /// Arm one trigger and transfer the result
    Single,
    /// Re-arm after every capture until Ctrl+C or --count is reached
    Loop,
}

/// DS1000Z waveform grabber
#[derive(Parser, Debug)]
#[command(name = "scope-grab")]
#[command(about = "Capture waveforms from a Rigol DS1000Z over the network", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Oscilloscope host name or IP address
    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    #[arg(short, long, value_enum, default_value_t = Mode::Capture)]
    mode: Mode,

    /// Stop the loop after this many captures
    #[arg(short = 'n', long)]
    count: Option<usize>,

    /// Directory for the capture log
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Preview the last capture in the terminal
    #[arg(long)]
    plot: bool,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = apply_overrides(load_config_or_default(args.config.as_deref()), &args);

    let log_level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.log_level.clone());
    initialize_logging(&log_level)?;
    log_startup_info(&config, args.mode);

    let client = ScopeClient::builder()
        .address(&config.scope.host)
        .port(config.scope.port)
        .config(config.scope.connection_config())
        .build()?;
    let mut session = AcquisitionSession::new(client, config.acquisition.session_config());
    setup_shutdown_handler(session.cancel_handle())?;

    let mut capture_log = match &config.output.directory {
        Some(dir) => Some(CaptureLog::new(
            create_log_file_path(dir)?,
            config.output.flush_every,
        )),
        None => None,
    };

    let mut history = CaptureHistory::new();
    let mut record = |capture: Capture| -> Result<(), ds1000z::ScopeError> {
        info!(
            "Capture {}: {} channel(s), {} samples",
            history.len() + 1,
            capture.channel_count(),
            capture.sample_count()
        );
        if let Some(log) = capture_log.as_mut() {
            log.add(capture.clone())?;
        }
        history.push(capture);
        Ok(())
    };

    let outcome = match args.mode {
        Mode::Capture => session.capture_now().and_then(&mut record),
        Mode::Single => session
            .trigger_single()
            .and_then(|()| drain_events(&mut session, None, &mut record)),
        Mode::Loop => session
            .trigger_loop()
            .and_then(|()| drain_events(&mut session, args.count, &mut record)),
    };
    drop(record);

    if config.acquisition.resume_after {
        if let Err(e) = session.with_client(|client| client.run()) {
            warn!("Could not resume acquisition: {e}");
        }
    }

    if let Some(log) = capture_log.as_mut() {
        log.flush()?;
        info!("Capture log: {}", log.path().display());
    }

    if args.plot {
        if let Some(capture) = history.active() {
            plot_capture(capture, None, None)?;
        }
    }

    report(&history, outcome)
}

/// Caps how many captures a run stores
#[derive(Debug)]
struct CaptureBudget {
    limit: Option<usize>,
    accepted: usize,
}

impl CaptureBudget {
    fn new(limit: Option<usize>) -> Self {
        Self { limit, accepted: 0 }
    }

    /// Take one slot; false once the limit has been reached
    fn accept(&mut self) -> bool {
        if self.exhausted() {
            return false;
        }
        self.accepted += 1;
        true
    }

    fn exhausted(&self) -> bool {
        self.limit.is_some_and(|n| self.accepted >= n)
    }
}

/// Forward session events to `record` until the acquisition finishes
fn drain_events(
    session: &mut AcquisitionSession<TcpTransport>,
    limit: Option<usize>,
    record: &mut impl FnMut(Capture) -> Result<(), ds1000z::ScopeError>,
) -> Result<(), ds1000z::ScopeError> {
    let mut budget = CaptureBudget::new(limit);
    let mut failure = None;

    for event in session.events().iter() {
        match event {
            AcquisitionEvent::Captured(capture) => {
                // A transfer running when the limit was hit still arrives
                if !budget.accept() {
                    debug!("Discarding capture beyond the requested count");
                    session.cancel();
                    continue;
                }
                if let Err(e) = record(capture) {
                    error!("Could not store capture: {e}");
                    session.cancel();
                    failure = Some(e);
                }
                if budget.exhausted() {
                    info!("Reached {} capture(s), stopping", budget.accepted);
                    session.cancel();
                }
            }
            AcquisitionEvent::Failed(e) => failure = Some(e),
            AcquisitionEvent::Finished { cancelled } => {
                if cancelled {
                    info!("Acquisition cancelled");
                }
                break;
            }
        }
    }

    session.wait()?;
    failure.map_or(Ok(()), Err)
}

fn apply_overrides(mut config: AppConfig, args: &Args) -> AppConfig {
    if let Some(host) = &args.host {
        config.scope.host = host.clone();
    }
    if let Some(port) = args.port {
        config.scope.port = port;
    }
    if let Some(output) = &args.output {
        config.output.directory = Some(output.clone());
    }
    config
}

fn log_startup_info(config: &AppConfig, mode: Mode) {
    info!("=== scope-grab ===");
    info!("Scope: {}:{}", config.scope.host, config.scope.port);
    info!("Mode: {mode:?}");
    info!(
        "Trigger poll interval: {} ms, end-of-block timeout: {} ms",
        config.acquisition.trigger_poll_interval_ms, config.scope.end_of_block_timeout_ms
    );
    match &config.output.directory {
        Some(dir) => info!("Capture log directory: {}", dir.display()),
        None => info!("Capture log disabled"),
    }
}

/// What a Ctrl+C should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancel,
    Exit,
}

/// First Ctrl+C during an acquisition cancels it; any other exits
fn interrupt_action(previous_interrupts: usize, busy: bool) -> Interrupt {
    if busy && previous_interrupts == 0 {
        Interrupt::Cancel
    } else {
        Interrupt::Exit
    }
}

fn setup_shutdown_handler(cancel: CancelHandle) -> Result<(), ctrlc::Error> {
    let interrupts = AtomicUsize::new(0);
    ctrlc::set_handler(move || {
        let previous = interrupts.fetch_add(1, Ordering::SeqCst);
        match interrupt_action(previous, cancel.is_busy()) {
            Interrupt::Cancel => {
                info!("Ctrl+C received - cancelling acquisition (press again to exit)...");
                cancel.cancel();
            }
            Interrupt::Exit => {
                warn!("Ctrl+C received - exiting");
                process::exit(INTERRUPTED_EXIT_CODE);
            }
        }
    })
}

fn report(
    history: &CaptureHistory,
    outcome: Result<(), ds1000z::ScopeError>,
) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        Ok(()) => {
            info!("✓ Finished with {} capture(s)", history.len());
            Ok(())
        }
        Err(e) => {
            error!("✗ Acquisition failed after {} capture(s): {e}", history.len());
            Err(e.into())
        }
    }
}

fn initialize_logging(log_level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{}', using 'info'", log_level);
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();

    Ok(())
}

fn create_log_file_path(dir: &Path) -> Result<PathBuf, Box<dyn std::error::Error>> {
    fs::create_dir_all(dir)?;
    let filename = format!("captures_{}.jsonl", Utc::now().format("%Y%m%d_%H%M%S"));
    Ok(dir.join(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_stops_at_limit() {
        let mut budget = CaptureBudget::new(Some(2));
        assert!(!budget.exhausted());
        assert!(budget.accept());
        assert!(budget.accept());
        assert!(budget.exhausted());

        // A capture delivered after the cancel is not stored
        assert!(!budget.accept());
        assert_eq!(budget.accepted, 2);
    }

    #[test]
    fn test_budget_without_limit() {
        let mut budget = CaptureBudget::new(None);
        for _ in 0..100 {
            assert!(budget.accept());
        }
        assert!(!budget.exhausted());
        assert_eq!(budget.accepted, 100);
    }

    #[test]
    fn test_budget_zero_limit() {
        let mut budget = CaptureBudget::new(Some(0));
        assert!(budget.exhausted());
        assert!(!budget.accept());
    }

    #[test]
    fn test_interrupt_action() {
        assert_eq!(interrupt_action(0, true), Interrupt::Cancel);
        assert_eq!(interrupt_action(1, true), Interrupt::Exit);
        assert_eq!(interrupt_action(0, false), Interrupt::Exit);
        assert_eq!(interrupt_action(3, false), Interrupt::Exit);
    }
}

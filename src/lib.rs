pub mod config;
pub mod error;
pub mod history;
pub mod logger;
pub mod plotting;
pub mod scope;
pub mod session;
pub mod types;
pub mod utils;

pub use config::{AppConfig, load_config, load_config_or_default};
pub use error::ScopeError;
pub use history::{CaptureHistory, HistoryChange};
pub use logger::{CaptureLog, read_captures};
pub use plotting::plot_capture;
pub use scope::{ConnectionConfig, Protocol, ScopeClient, ScopeClientBuilder, TcpTransport, Transport};
pub use session::{AcquisitionEvent, AcquisitionSession, CancelHandle, SessionConfig};
pub use types::{AcquisitionMode, Capture, Channel, SampleBuffer, TriggerStatus};

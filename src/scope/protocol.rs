use crate::error::ScopeError;
use crate::types::Channel;
use log::warn;

// Protocol constants
pub const DEFAULT_PORT: u16 = 5555;
pub const REPLY_READ_SIZE: usize = 1024;
pub const BLOCK_READ_SIZE: usize = 260_000;
pub const BLOCK_HEADER_LEN: usize = 11;
pub const CHUNK_SIZE: usize = 250_000;
/// Horizontal grid divisions of the DS1000Z display
pub const HORIZONTAL_DIVISIONS: f64 = 12.0;

pub const MEMORY_DEPTH_AUTO: &str = "AUTO";
pub const CHANNEL_DISPLAYED: &str = "1";

// Command vocabulary
pub const MEMORY_DEPTH_QUERY: &str = ":ACQ:MDEP?";
pub const SAMPLE_RATE_QUERY: &str = ":ACQ:SRAT?";
pub const TIMEBASE_SCALE_QUERY: &str = ":TIM:SCAL?";
pub const WAVEFORM_MODE_RAW: &str = ":WAV:MODE RAW";
pub const WAVEFORM_FORMAT_BYTE: &str = ":WAV:FORM BYTE";
pub const WAVEFORM_DATA_QUERY: &str = ":WAV:DATA?";
pub const SINGLE_TRIGGER: &str = ":SING";
pub const TRIGGER_STATUS_QUERY: &str = ":TRIG:STAT?";
pub const RUN: &str = ":RUN";
pub const STOP: &str = ":STOP";

/// Low-level protocol handling
pub struct Protocol;

impl Protocol {
    pub fn waveform_source(channel: Channel) -> String {
        format!(":WAV:SOUR {}", channel.as_str())
    }

    pub fn waveform_start(start: usize) -> String {
        format!(":WAV:STAR {start}")
    }

    pub fn waveform_stop(stop: usize) -> String {
        format!(":WAV:STOP {stop}")
    }

    pub fn channel_display_query(channel: Channel) -> String {
        format!(":{}:DISP?", channel.as_str())
    }

    /// Decode a single-line reply, dropping exactly its final byte (the line terminator)
    pub fn decode_reply(reply: &[u8]) -> Result<String, ScopeError> {
        let (_terminator, body) = reply
            .split_last()
            .ok_or_else(|| ScopeError::Protocol("Empty reply".to_string()))?;

        if !body.is_ascii() {
            return Err(ScopeError::Protocol(format!(
                "Reply is not ASCII: {:02x?}",
                &body[..body.len().min(32)]
            )));
        }

        Ok(String::from_utf8_lossy(body).into_owned())
    }

    /// Drop the fixed-width length header from the first read of a data block.
    ///
    /// The header is `#N` followed by N length digits; only the fixed width is
    /// relied upon here.
    pub fn strip_block_header(first_read: &[u8]) -> Result<&[u8], ScopeError> {
        if first_read.len() < BLOCK_HEADER_LEN {
            return Err(ScopeError::Protocol(format!(
                "Data block header truncated: got {} of {} bytes",
                first_read.len(),
                BLOCK_HEADER_LEN
            )));
        }
        if first_read[0] != b'#' {
            warn!(
                "Data block does not start with '#': {:02x?}",
                &first_read[..BLOCK_HEADER_LEN]
            );
        }
        Ok(&first_read[BLOCK_HEADER_LEN..])
    }

    /// 1-based inclusive transfer windows covering `[1, depth]`, at most
    /// [`CHUNK_SIZE`] samples each, in increasing order
    pub fn chunk_windows(depth: usize) -> Vec<(usize, usize)> {
        (0..depth)
            .step_by(CHUNK_SIZE)
            .map(|offset| (offset + 1, (offset + CHUNK_SIZE).min(depth)))
            .collect()
    }

    /// Depth for an `AUTO` memory depth setting, truncated toward zero
    pub fn auto_depth(sample_rate: f64, timebase_scale: f64) -> usize {
        let depth = HORIZONTAL_DIVISIONS * timebase_scale * sample_rate;
        if depth.is_finite() && depth > 0.0 {
            depth.trunc() as usize
        } else {
            0
        }
    }
}

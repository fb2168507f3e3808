use super::ScopeClient;
use crate::error::ScopeError;
use crate::scope::protocol::{
    MEMORY_DEPTH_AUTO, MEMORY_DEPTH_QUERY, Protocol, SAMPLE_RATE_QUERY, TIMEBASE_SCALE_QUERY,
};
use crate::scope::transport::Transport;
use log::debug;

impl<T: Transport> ScopeClient<T> {
    /// Get the current sample rate in Sa/s
    pub fn sample_rate(&mut self) -> Result<f64, ScopeError> {
        self.query_f64(SAMPLE_RATE_QUERY)
    }

    /// Get the horizontal scale in s/div
    pub fn timebase_scale(&mut self) -> Result<f64, ScopeError> {
        self.query_f64(TIMEBASE_SCALE_QUERY)
    }

    /// Number of samples stored per channel.
    ///
    /// When the instrument reports `AUTO`, the depth is derived from the
    /// sample rate and the timebase scale over the 12 horizontal divisions.
    pub fn memory_depth(&mut self) -> Result<usize, ScopeError> {
        let reply = self.command_with_reply(MEMORY_DEPTH_QUERY)?;

        let depth = if reply.trim() == MEMORY_DEPTH_AUTO {
            let sample_rate = self.sample_rate()?;
            let timebase_scale = self.timebase_scale()?;
            let depth = Protocol::auto_depth(sample_rate, timebase_scale);
            debug!(
                "Memory depth AUTO: {sample_rate} Sa/s x {timebase_scale} s/div -> {depth} samples"
            );
            depth
        } else {
            reply.trim().parse::<usize>().map_err(|_| {
                ScopeError::Protocol(format!(
                    "{MEMORY_DEPTH_QUERY}: expected an integer or AUTO, got {reply:?}"
                ))
            })?
        };

        Ok(depth)
    }
}

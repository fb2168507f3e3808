use super::ScopeClient;
use crate::error::ScopeError;
use crate::scope::protocol::{
    BLOCK_READ_SIZE, Protocol, WAVEFORM_DATA_QUERY, WAVEFORM_FORMAT_BYTE, WAVEFORM_MODE_RAW,
};
use crate::scope::transport::Transport;
use crate::types::{Capture, Channel, SampleBuffer};
use log::{debug, info, warn};

impl<T: Transport> ScopeClient<T> {
    /// Download the full acquisition memory of one channel.
    ///
    /// The memory is read in windows of at most 250 000 samples. Each window
    /// reply is a data block: an 11-byte length header, the samples, and one
    /// terminator byte. Only the first read of a block carries the header;
    /// further packets are appended until none arrive within
    /// [`ConnectionConfig::end_of_block_timeout`](super::ConnectionConfig).
    ///
    /// # Errors
    /// - [`ScopeError::Protocol`] if a block header is truncated or a block
    ///   carries no terminator
    /// - transport errors abort the download
    pub fn fetch_channel(&mut self, channel: Channel) -> Result<SampleBuffer, ScopeError> {
        self.command(&Protocol::waveform_source(channel))?;
        self.command(WAVEFORM_MODE_RAW)?;
        self.command(WAVEFORM_FORMAT_BYTE)?;

        let depth = self.memory_depth()?;
        let windows = Protocol::chunk_windows(depth);
        info!(
            "Fetching {channel}: {depth} samples in {} chunk(s)",
            windows.len()
        );

        let mut samples: SampleBuffer = Vec::with_capacity(depth + 1);
        for (start, stop) in windows {
            self.command(&Protocol::waveform_start(start))?;
            self.command(&Protocol::waveform_stop(stop))?;
            self.read_block_into(&mut samples)?;
            debug!("{channel} [{start}, {stop}]: {} samples so far", samples.len());
        }

        if samples.len() != depth {
            warn!(
                "{channel}: received {} samples, expected {depth}",
                samples.len()
            );
        }

        Ok(samples)
    }

    /// Request one data block and append its payload to `samples`
    fn read_block_into(&mut self, samples: &mut SampleBuffer) -> Result<(), ScopeError> {
        self.command(WAVEFORM_DATA_QUERY)?;

        let before = samples.len();
        let end_of_block_timeout = self.config().end_of_block_timeout;
        let transport = self.transport_mut();

        let first = transport.receive(BLOCK_READ_SIZE)?;
        samples.extend_from_slice(Protocol::strip_block_header(&first)?);

        while transport.has_more_available(end_of_block_timeout)? {
            samples.extend(transport.receive(BLOCK_READ_SIZE)?);
        }

        // The newest byte is this block's terminator
        if samples.len() == before {
            return Err(ScopeError::Protocol(
                "Data block ended without a terminator".to_string(),
            ));
        }
        samples.pop();

        Ok(())
    }

    /// Download every displayed channel, one after another
    pub fn capture(&mut self) -> Result<Capture, ScopeError> {
        let channels = self.active_channels()?;
        let mut buffers = Vec::with_capacity(channels.len());
        for channel in channels {
            let samples = self.fetch_channel(channel)?;
            buffers.push((channel, samples));
        }
        Ok(Capture::new(buffers))
    }
}

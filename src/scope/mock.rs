//! In-memory transport and a simulated DS1000Z for tests

use super::protocol::{self, Protocol};
use super::transport::Transport;
use crate::error::ScopeError;
use crate::types::Channel;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) type Responder = Box<dyn FnMut(&str) -> Vec<Vec<u8>> + Send>;

/// Shared view into a [`MockTransport`] that survives moving the transport
#[derive(Clone, Default)]
pub(crate) struct MockHandle {
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<AtomicUsize>,
    arms: Arc<AtomicUsize>,
}

impl MockHandle {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub fn count(&self, command: &str) -> usize {
        self.sent.lock().iter().filter(|c| c.as_str() == command).count()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.sent.lock().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn arms(&self) -> usize {
        self.arms.load(Ordering::SeqCst)
    }
}

/// Transport whose replies are produced by a closure, one packet per read
pub(crate) struct MockTransport {
    responder: Responder,
    pending: VecDeque<Vec<u8>>,
    handle: MockHandle,
    closed: bool,
}

impl MockTransport {
    pub fn new(responder: impl FnMut(&str) -> Vec<Vec<u8>> + Send + 'static) -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (Self::with_handle(Box::new(responder), handle.clone()), handle)
    }

    /// Reply to every command in `replies` with the given bytes, ignore the rest
    pub fn scripted(replies: &[(&str, &str)]) -> (Self, MockHandle) {
        let replies: Vec<(String, Vec<u8>)> = replies
            .iter()
            .map(|(cmd, reply)| (cmd.to_string(), reply.as_bytes().to_vec()))
            .collect();
        Self::new(move |sent| {
            replies
                .iter()
                .filter(|(cmd, _)| cmd == sent)
                .map(|(_, reply)| reply.clone())
                .take(1)
                .collect()
        })
    }

    fn with_handle(responder: Responder, handle: MockHandle) -> Self {
        Self {
            responder,
            pending: VecDeque::new(),
            handle,
            closed: false,
        }
    }
}

impl Transport for MockTransport {
    fn send_line(&mut self, line: &str) -> Result<(), ScopeError> {
        if self.closed {
            return Err(ScopeError::Closed);
        }
        self.handle.sent.lock().push(line.to_string());
        let packets = (self.responder)(line);
        self.pending.extend(packets.into_iter().filter(|p| !p.is_empty()));
        Ok(())
    }

    fn receive(&mut self, max_bytes: usize) -> Result<Vec<u8>, ScopeError> {
        if self.closed {
            return Err(ScopeError::Closed);
        }
        let mut packet = self.pending.pop_front().ok_or(ScopeError::Timeout)?;
        if packet.len() > max_bytes {
            let rest = packet.split_off(max_bytes);
            self.pending.push_front(rest);
        }
        Ok(packet)
    }

    fn has_more_available(&mut self, _timeout: Duration) -> Result<bool, ScopeError> {
        if self.closed {
            return Err(ScopeError::Closed);
        }
        Ok(!self.pending.is_empty())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.handle.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

/// Sample code the simulated scope stores at 1-based `index` of `channel`
pub(crate) fn sample_at(channel: Channel, index: usize) -> u8 {
    ((index * channel.number() as usize + 7) % 256) as u8
}

pub(crate) fn expected_samples(channel: Channel, depth: usize) -> Vec<u8> {
    (1..=depth).map(|i| sample_at(channel, i)).collect()
}

/// Command-level model of a DS1000Z, enough to drive transfers and triggers
pub(crate) struct SimulatedScope {
    pub memory_depth: String,
    pub sample_rate: String,
    pub timebase_scale: String,
    pub displayed: [bool; 4],
    /// Data replies are split into packets of this size
    pub packet_size: usize,
    /// Statuses reported after each `:SING`, in order
    pub statuses_after_arm: Vec<&'static str>,
    /// Reported once `statuses_after_arm` is exhausted
    pub settled_status: &'static str,
    /// Send a header shorter than 11 bytes on this data request (0-based)
    pub truncate_block: Option<usize>,
    /// Sleep this long before answering each data request
    pub data_delay: Duration,
}

impl Default for SimulatedScope {
    fn default() -> Self {
        Self {
            memory_depth: "12000".to_string(),
            sample_rate: "1.000000e+06".to_string(),
            timebase_scale: "1.000000e-03".to_string(),
            displayed: [true, false, true, false],
            packet_size: 4096,
            statuses_after_arm: vec!["WAIT", "WAIT", "TD"],
            settled_status: "STOP",
            truncate_block: None,
            data_delay: Duration::ZERO,
        }
    }
}

fn line(reply: &str) -> Vec<Vec<u8>> {
    vec![format!("{reply}\n").into_bytes()]
}

impl SimulatedScope {
    pub fn into_transport(self) -> (MockTransport, MockHandle) {
        let handle = MockHandle::default();
        let arms = handle.arms.clone();

        let mut source = Channel::Chan1;
        let mut start = 1usize;
        let mut stop = 1usize;
        let mut statuses: VecDeque<&'static str> = VecDeque::new();
        let mut data_requests = 0usize;

        let responder = move |cmd: &str| -> Vec<Vec<u8>> {
            match cmd {
                protocol::MEMORY_DEPTH_QUERY => line(&self.memory_depth),
                protocol::SAMPLE_RATE_QUERY => line(&self.sample_rate),
                protocol::TIMEBASE_SCALE_QUERY => line(&self.timebase_scale),
                protocol::SINGLE_TRIGGER => {
                    arms.fetch_add(1, Ordering::SeqCst);
                    statuses = self.statuses_after_arm.iter().copied().collect();
                    Vec::new()
                }
                protocol::TRIGGER_STATUS_QUERY => {
                    line(statuses.pop_front().unwrap_or(self.settled_status))
                }
                protocol::WAVEFORM_DATA_QUERY => {
                    let request = data_requests;
                    data_requests += 1;
                    if !self.data_delay.is_zero() {
                        std::thread::sleep(self.data_delay);
                    }
                    if self.truncate_block == Some(request) {
                        return vec![b"#90".to_vec()];
                    }

                    let count = stop.saturating_sub(start) + 1;
                    let mut block = format!("#9{count:09}").into_bytes();
                    block.extend((start..=stop).map(|i| sample_at(source, i)));
                    block.push(b'\n');
                    block
                        .chunks(self.packet_size.max(1))
                        .map(<[u8]>::to_vec)
                        .collect()
                }
                other => {
                    if let Some(name) = other.strip_prefix(":WAV:SOUR ") {
                        if let Ok(channel) = name.parse() {
                            source = channel;
                        }
                    } else if let Some(value) = other.strip_prefix(":WAV:STAR ") {
                        start = value.parse().unwrap_or(1);
                    } else if let Some(value) = other.strip_prefix(":WAV:STOP ") {
                        stop = value.parse().unwrap_or(1);
                    } else if let Some(channel) = Channel::ALL
                        .iter()
                        .find(|ch| Protocol::channel_display_query(**ch) == other)
                    {
                        let shown = self.displayed[(channel.number() - 1) as usize];
                        return line(if shown { "1" } else { "0" });
                    }
                    Vec::new()
                }
            }
        };

        (
            MockTransport::with_handle(Box::new(responder), handle.clone()),
            handle,
        )
    }
}

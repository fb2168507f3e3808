use super::ScopeClient;
use crate::error::ScopeError;
use crate::scope::protocol::{RUN, SINGLE_TRIGGER, STOP, TRIGGER_STATUS_QUERY};
use crate::scope::transport::Transport;
use crate::types::TriggerStatus;

impl<T: Transport> ScopeClient<T> {
    /// Arm a single-shot acquisition
    pub fn single(&mut self) -> Result<(), ScopeError> {
        self.command(SINGLE_TRIGGER)
    }

    pub fn trigger_status(&mut self) -> Result<TriggerStatus, ScopeError> {
        self.command_with_reply(TRIGGER_STATUS_QUERY)?.parse()
    }

    /// Resume continuous acquisition
    pub fn run(&mut self) -> Result<(), ScopeError> {
        self.command(RUN)
    }

    pub fn stop(&mut self) -> Result<(), ScopeError> {
        self.command(STOP)
    }
}

use super::ScopeClient;
use crate::error::ScopeError;
use crate::scope::protocol::{CHANNEL_DISPLAYED, Protocol};
use crate::scope::transport::Transport;
use crate::types::Channel;
use log::debug;

impl<T: Transport> ScopeClient<T> {
    /// Whether `channel` is currently shown on screen
    pub fn is_channel_displayed(&mut self, channel: Channel) -> Result<bool, ScopeError> {
        let reply = self.command_with_reply(&Protocol::channel_display_query(channel))?;
        Ok(reply.trim() == CHANNEL_DISPLAYED)
    }

    /// Displayed channels in ascending channel-number order.
    ///
    /// Queries every channel in turn; any reply other than `1` counts as
    /// not displayed.
    pub fn active_channels(&mut self) -> Result<Vec<Channel>, ScopeError> {
        let mut active = Vec::with_capacity(Channel::ALL.len());
        for channel in Channel::ALL {
            if self.is_channel_displayed(channel)? {
                active.push(channel);
            }
        }
        debug!("Active channels: {active:?}");
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::client::ConnectionConfig;
    use crate::scope::mock::{MockTransport, SimulatedScope};

    #[test]
    fn test_active_channels_in_order() {
        let (transport, handle) = SimulatedScope::default().into_transport();
        let mut client = ScopeClient::with_transport(transport, ConnectionConfig::default());

        assert_eq!(
            client.active_channels().unwrap(),
            vec![Channel::Chan1, Channel::Chan3]
        );
        assert_eq!(
            handle.sent(),
            vec![":CHAN1:DISP?", ":CHAN2:DISP?", ":CHAN3:DISP?", ":CHAN4:DISP?"]
        );
    }

    #[test]
    fn test_only_exact_one_counts_as_displayed() {
        let (transport, _) = MockTransport::scripted(&[
            (":CHAN1:DISP?", "0\n"),
            (":CHAN2:DISP?", "ON\n"),
            (":CHAN3:DISP?", "1\n"),
            (":CHAN4:DISP?", "11\n"),
        ]);
        let mut client = ScopeClient::with_transport(transport, ConnectionConfig::default());
        assert_eq!(client.active_channels().unwrap(), vec![Channel::Chan3]);
    }

    #[test]
    fn test_no_channels_displayed() {
        let scope = SimulatedScope {
            displayed: [false; 4],
            ..SimulatedScope::default()
        };
        let (transport, _) = scope.into_transport();
        let mut client = ScopeClient::with_transport(transport, ConnectionConfig::default());
        assert!(client.active_channels().unwrap().is_empty());
    }

    #[test]
    fn test_discovery_error_propagates() {
        let (transport, _) = MockTransport::scripted(&[(":CHAN1:DISP?", "1\n")]);
        let mut client = ScopeClient::with_transport(transport, ConnectionConfig::default());
        assert!(matches!(client.active_channels(), Err(ScopeError::Timeout)));
    }
}

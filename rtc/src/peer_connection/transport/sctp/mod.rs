//! Message transport interface.

use async_trait::async_trait;

use crate::data_channel::parameters::DataChannelParameters;
use shared::error::Result;

/// Message transport layered on the handshake transport.
///
/// Channels announced by the remote are reported on the transport event
/// channel as [`TransportEvent::DataChannelOpened`](super::TransportEvent::DataChannelOpened).
#[async_trait]
pub trait SctpTransport: Send + Sync {
    /// Starts reading from the handshake transport. It must be connected.
    async fn start(&self) -> Result<()>;

    /// Announces a locally created channel to the remote.
    async fn open_channel(&self, params: &DataChannelParameters) -> Result<()>;

    async fn stop(&self) -> Result<()>;
}

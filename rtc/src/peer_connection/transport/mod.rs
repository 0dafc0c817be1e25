//! Transport collaborators for ICE, DTLS, and SCTP.
//!
//! The connection drives three layered transports through traits and never
//! looks at packets itself:
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │      Data Channels                  │  SctpTransport
//! ├─────────────────────────────────────┤
//! │      Handshake (encryption)         │  DtlsTransport
//! ├─────────────────────────────────────┤
//! │      Connectivity (NAT traversal)   │  IceAgent
//! └─────────────────────────────────────┘
//! ```
//!
//! A [`TransportFactory`] builds one set of transports per connection. Every
//! asynchronous state change travels back on a single [`TransportEventSender`]
//! drained by the connection's event loop.
//!
//! The [`loopback`] module ships an in-process implementation bound to
//! `127.0.0.1`, used as the default factory.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::data_channel::parameters::DataChannelParameters;
use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::configuration::setting_engine::SettingEngine;
use shared::error::Result;

pub mod dtls;
pub mod ice;
pub mod loopback;
pub mod sctp;

pub use dtls::fingerprint::RTCDtlsFingerprint;
pub use dtls::role::RTCDtlsRole;
pub use dtls::state::RTCDtlsTransportState;
pub use dtls::{DTLSParameters, DtlsTransport, MatchFunc};
pub use ice::candidate::{RTCIceCandidate, RTCIceCandidateInit, RTCIceProtocol};
pub use ice::candidate_type::RTCIceCandidateType;
pub use ice::gatherer::RTCIceGathererState;
pub use ice::server::{RTCIceCredentialType, RTCIceServer, RTCOAuthCredential};
pub use ice::{IceAgent, RTCIceParameters, RTCIceRole};
pub use sctp::SctpTransport;

use crate::peer_connection::state::RTCIceConnectionState;

/// Asynchronous notifications from the transports to the connection.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    IceConnectionState(RTCIceConnectionState),
    DtlsState(RTCDtlsTransportState),
    /// The remote announced a data channel.
    DataChannelOpened(DataChannelParameters),
    /// A gathered local candidate; `None` ends the round.
    LocalCandidate(Option<RTCIceCandidate>),
    GathererState(RTCIceGathererState),
}

pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;

/// The transports owned by one connection.
#[derive(Clone)]
pub struct TransportBundle {
    pub ice: Arc<dyn IceAgent>,
    pub dtls: Arc<dyn DtlsTransport>,
    pub sctp: Arc<dyn SctpTransport>,
}

/// Builds the transports for a new connection.
pub trait TransportFactory: Send + Sync {
    /// `certificates` is never empty; the first one identifies the local
    /// endpoint in the handshake.
    fn create(
        &self,
        setting_engine: Arc<SettingEngine>,
        certificates: &[RTCCertificate],
        events: TransportEventSender,
    ) -> Result<TransportBundle>;
}

//! Handshake transport interface.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use shared::error::Result;

pub mod fingerprint;
pub mod role;
pub mod state;

use fingerprint::RTCDtlsFingerprint;
use role::RTCDtlsRole;
use state::RTCDtlsTransportState;

/// Predicate deciding whether an inbound packet reaches the handshake.
pub type MatchFunc = Arc<dyn Fn(&[u8]) -> bool + Send + Sync>;

/// What the remote advertised about its handshake endpoint.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DTLSParameters {
    pub role: RTCDtlsRole,
    pub fingerprints: Vec<RTCDtlsFingerprint>,
}

/// Handshake transport layered on the connectivity agent.
///
/// State changes are reported on the transport event channel the transport
/// was created with.
#[async_trait]
pub trait DtlsTransport: Send + Sync {
    /// Runs the handshake in `role` and verifies the remote certificate
    /// against `remote.fingerprints`. Returns once connected or failed.
    async fn start(&self, role: RTCDtlsRole, remote: DTLSParameters) -> Result<()>;

    fn state(&self) -> RTCDtlsTransportState;

    /// Replaces the inbound packet filter. A filter that rejects everything
    /// stalls the handshake.
    async fn set_inbound_matcher(&self, matcher: MatchFunc);

    /// Sends application data over the secured transport.
    async fn send(&self, data: Bytes) -> Result<usize>;

    /// Application data received after the handshake. Can be taken once.
    async fn take_inbound(&self) -> Option<mpsc::Receiver<Bytes>>;

    /// Aborts any handshake in flight and closes the transport.
    async fn stop(&self) -> Result<()>;
}

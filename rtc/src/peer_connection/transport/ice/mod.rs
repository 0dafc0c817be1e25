//! Connectivity agent interface and the value types it exchanges.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::peer_connection::configuration::ice_transport_policy::RTCIceTransportPolicy;
use shared::error::Result;

pub mod candidate;
pub mod candidate_type;
pub mod gatherer;
pub mod server;

use candidate::RTCIceCandidate;
use server::RTCIceServer;

/// Local or remote ICE credentials.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceParameters {
    pub username_fragment: String,
    pub password: String,
    pub ice_lite: bool,
}

/// Which side nominates candidate pairs.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCIceRole {
    #[default]
    Unspecified,
    Controlling,
    Controlled,
}

impl fmt::Display for RTCIceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCIceRole::Controlling => "controlling",
            RTCIceRole::Controlled => "controlled",
            RTCIceRole::Unspecified => crate::peer_connection::configuration::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Connectivity agent driven by the connection.
///
/// Connection state changes are reported on the transport event channel the
/// agent was created with, never returned from these calls.
#[async_trait]
pub trait IceAgent: Send + Sync {
    /// Starts candidate discovery. The returned channel yields each local
    /// candidate and closes when gathering is complete.
    async fn gather(
        &self,
        policy: RTCIceTransportPolicy,
        servers: &[RTCIceServer],
    ) -> Result<mpsc::Receiver<RTCIceCandidate>>;

    async fn local_parameters(&self) -> RTCIceParameters;

    /// Regenerates the local credentials.
    async fn restart(&self) -> Result<()>;

    /// Adds a remote candidate. `None` marks the end of remote candidates.
    async fn add_remote_candidate(&self, candidate: Option<RTCIceCandidate>) -> Result<()>;

    /// Runs connectivity checks against the remote candidates. Returns once a
    /// pair is selected or the checks fail.
    async fn start(&self, role: RTCIceRole, remote: RTCIceParameters) -> Result<()>;

    async fn send(&self, data: Bytes) -> Result<usize>;

    /// Non-connectivity packets received on the selected pair. Can be taken
    /// once.
    async fn take_inbound(&self) -> Option<mpsc::Receiver<Bytes>>;

    async fn stop(&self) -> Result<()>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_ice_role_string() {
        let tests = vec![
            (RTCIceRole::Unspecified, "Unspecified"),
            (RTCIceRole::Controlling, "controlling"),
            (RTCIceRole::Controlled, "controlled"),
        ];

        for (role, expected) in tests {
            assert_eq!(role.to_string(), expected);
        }
    }

    #[test]
    fn test_ice_parameters_json() {
        let params = RTCIceParameters {
            username_fragment: "ufrag".to_owned(),
            password: "pwd".to_owned(),
            ice_lite: false,
        };
        let data = serde_json::to_string(&params).unwrap();
        assert_eq!(
            data,
            r#"{"usernameFragment":"ufrag","password":"pwd","iceLite":false}"#
        );
    }
}

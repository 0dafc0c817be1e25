use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::peer_connection::state::RTCIceConnectionState;
use crate::peer_connection::transport::RTCDtlsTransportState;
use std::fmt;

/// Indicates the overall state of the peer connection, derived from the ICE
/// connection state and the DTLS transport state by
/// [`aggregate_connection_state`].
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCPeerConnectionState {
    #[default]
    Unspecified,

    /// Neither transport has started.
    New,

    /// ICE is checking or the DTLS handshake is in flight.
    Connecting,

    /// ICE found a pair and the DTLS handshake completed.
    Connected,

    /// ICE lost connectivity, or DTLS closed while ICE was still up.
    Disconnected,

    /// ICE or DTLS failed.
    Failed,

    /// `close()` was called.
    Closed,
}

const PEER_CONNECTION_STATE_NEW_STR: &str = "new";
const PEER_CONNECTION_STATE_CONNECTING_STR: &str = "connecting";
const PEER_CONNECTION_STATE_CONNECTED_STR: &str = "connected";
const PEER_CONNECTION_STATE_DISCONNECTED_STR: &str = "disconnected";
const PEER_CONNECTION_STATE_FAILED_STR: &str = "failed";
const PEER_CONNECTION_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCPeerConnectionState {
    fn from(raw: &str) -> Self {
        match raw {
            PEER_CONNECTION_STATE_NEW_STR => RTCPeerConnectionState::New,
            PEER_CONNECTION_STATE_CONNECTING_STR => RTCPeerConnectionState::Connecting,
            PEER_CONNECTION_STATE_CONNECTED_STR => RTCPeerConnectionState::Connected,
            PEER_CONNECTION_STATE_DISCONNECTED_STR => RTCPeerConnectionState::Disconnected,
            PEER_CONNECTION_STATE_FAILED_STR => RTCPeerConnectionState::Failed,
            PEER_CONNECTION_STATE_CLOSED_STR => RTCPeerConnectionState::Closed,
            _ => RTCPeerConnectionState::Unspecified,
        }
    }
}

impl From<u8> for RTCPeerConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => RTCPeerConnectionState::New,
            2 => RTCPeerConnectionState::Connecting,
            3 => RTCPeerConnectionState::Connected,
            4 => RTCPeerConnectionState::Disconnected,
            5 => RTCPeerConnectionState::Failed,
            6 => RTCPeerConnectionState::Closed,
            _ => RTCPeerConnectionState::Unspecified,
        }
    }
}

impl fmt::Display for RTCPeerConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCPeerConnectionState::New => PEER_CONNECTION_STATE_NEW_STR,
            RTCPeerConnectionState::Connecting => PEER_CONNECTION_STATE_CONNECTING_STR,
            RTCPeerConnectionState::Connected => PEER_CONNECTION_STATE_CONNECTED_STR,
            RTCPeerConnectionState::Disconnected => PEER_CONNECTION_STATE_DISCONNECTED_STR,
            RTCPeerConnectionState::Failed => PEER_CONNECTION_STATE_FAILED_STR,
            RTCPeerConnectionState::Closed => PEER_CONNECTION_STATE_CLOSED_STR,
            RTCPeerConnectionState::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// Derives the overall connection state, first matching rule wins:
///
/// 1. closed connection → `Closed`
/// 2. ICE or DTLS failed → `Failed`
/// 3. ICE connected/completed and DTLS connected → `Connected`
/// 4. ICE checking or DTLS connecting → `Connecting`
/// 5. ICE disconnected, or DTLS closed while ICE is up → `Disconnected`
/// 6. otherwise → `New`
pub fn aggregate_connection_state(
    is_closed: bool,
    ice_connection_state: RTCIceConnectionState,
    dtls_transport_state: RTCDtlsTransportState,
) -> RTCPeerConnectionState {
    let ice_up = matches!(
        ice_connection_state,
        RTCIceConnectionState::Connected | RTCIceConnectionState::Completed
    );

    if is_closed {
        RTCPeerConnectionState::Closed
    } else if ice_connection_state == RTCIceConnectionState::Failed
        || dtls_transport_state == RTCDtlsTransportState::Failed
    {
        RTCPeerConnectionState::Failed
    } else if ice_up && dtls_transport_state == RTCDtlsTransportState::Connected {
        RTCPeerConnectionState::Connected
    } else if ice_connection_state == RTCIceConnectionState::Checking
        || dtls_transport_state == RTCDtlsTransportState::Connecting
    {
        RTCPeerConnectionState::Connecting
    } else if ice_connection_state == RTCIceConnectionState::Disconnected
        || (ice_up && dtls_transport_state == RTCDtlsTransportState::Closed)
    {
        RTCPeerConnectionState::Disconnected
    } else {
        RTCPeerConnectionState::New
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const ICE_STATES: [RTCIceConnectionState; 8] = [
        RTCIceConnectionState::Unspecified,
        RTCIceConnectionState::New,
        RTCIceConnectionState::Checking,
        RTCIceConnectionState::Connected,
        RTCIceConnectionState::Completed,
        RTCIceConnectionState::Disconnected,
        RTCIceConnectionState::Failed,
        RTCIceConnectionState::Closed,
    ];

    const DTLS_STATES: [RTCDtlsTransportState; 6] = [
        RTCDtlsTransportState::Unspecified,
        RTCDtlsTransportState::New,
        RTCDtlsTransportState::Connecting,
        RTCDtlsTransportState::Connected,
        RTCDtlsTransportState::Closed,
        RTCDtlsTransportState::Failed,
    ];

    #[test]
    fn test_new_peer_connection_state() {
        let tests = vec![
            (UNSPECIFIED_STR, RTCPeerConnectionState::Unspecified),
            ("new", RTCPeerConnectionState::New),
            ("connecting", RTCPeerConnectionState::Connecting),
            ("connected", RTCPeerConnectionState::Connected),
            ("disconnected", RTCPeerConnectionState::Disconnected),
            ("failed", RTCPeerConnectionState::Failed),
            ("closed", RTCPeerConnectionState::Closed),
        ];

        for (state_string, expected_state) in tests {
            assert_eq!(RTCPeerConnectionState::from(state_string), expected_state);
            assert_eq!(expected_state.to_string(), state_string);
            assert_eq!(RTCPeerConnectionState::from(expected_state as u8), expected_state);
        }
    }

    #[test]
    fn test_aggregate_connection_state() {
        let tests = vec![
            (
                false,
                RTCIceConnectionState::New,
                RTCDtlsTransportState::New,
                RTCPeerConnectionState::New,
            ),
            (
                false,
                RTCIceConnectionState::Checking,
                RTCDtlsTransportState::New,
                RTCPeerConnectionState::Connecting,
            ),
            (
                false,
                RTCIceConnectionState::Connected,
                RTCDtlsTransportState::Connecting,
                RTCPeerConnectionState::Connecting,
            ),
            (
                false,
                RTCIceConnectionState::Connected,
                RTCDtlsTransportState::New,
                RTCPeerConnectionState::New,
            ),
            (
                false,
                RTCIceConnectionState::Completed,
                RTCDtlsTransportState::Connected,
                RTCPeerConnectionState::Connected,
            ),
            (
                false,
                RTCIceConnectionState::Disconnected,
                RTCDtlsTransportState::Connected,
                RTCPeerConnectionState::Disconnected,
            ),
            (
                false,
                RTCIceConnectionState::Connected,
                RTCDtlsTransportState::Closed,
                RTCPeerConnectionState::Disconnected,
            ),
            (
                false,
                RTCIceConnectionState::Failed,
                RTCDtlsTransportState::Connected,
                RTCPeerConnectionState::Failed,
            ),
            (
                false,
                RTCIceConnectionState::Checking,
                RTCDtlsTransportState::Failed,
                RTCPeerConnectionState::Failed,
            ),
            (
                true,
                RTCIceConnectionState::Failed,
                RTCDtlsTransportState::Failed,
                RTCPeerConnectionState::Closed,
            ),
        ];

        for (is_closed, ice, dtls, expected) in tests {
            assert_eq!(
                aggregate_connection_state(is_closed, ice, dtls),
                expected,
                "closed={is_closed} ice={ice} dtls={dtls}"
            );
        }
    }

    #[test]
    fn test_aggregate_failed_dominates() {
        for ice in ICE_STATES {
            for dtls in DTLS_STATES {
                let state = aggregate_connection_state(false, ice, dtls);
                let failed = ice == RTCIceConnectionState::Failed
                    || dtls == RTCDtlsTransportState::Failed;
                assert_eq!(
                    state == RTCPeerConnectionState::Failed,
                    failed,
                    "ice={ice} dtls={dtls}"
                );

                let connected = matches!(
                    ice,
                    RTCIceConnectionState::Connected | RTCIceConnectionState::Completed
                ) && dtls == RTCDtlsTransportState::Connected;
                assert_eq!(
                    state == RTCPeerConnectionState::Connected,
                    connected,
                    "ice={ice} dtls={dtls}"
                );

                assert_eq!(
                    aggregate_connection_state(true, ice, dtls),
                    RTCPeerConnectionState::Closed
                );
            }
        }
    }
}

//! Connection state types.
//!
//! A peer connection tracks several independent state machines:
//!
//! - **[`RTCSignalingState`]** - offer/answer negotiation progress
//! - **[`RTCIceGatheringState`]** - local candidate gathering progress
//! - **[`RTCIceConnectionState`]** - ICE connectivity as reported by the agent
//! - **[`RTCPeerConnectionState`]** - the overall state, aggregated from ICE and DTLS
//!
//! Every state is surfaced both through a getter on
//! [`RTCPeerConnection`](crate::peer_connection::RTCPeerConnection) and through
//! a change callback, which fires once per distinct new value.
//!
//! ```
//! use rtc_peer::peer_connection::state::{
//!     RTCIceConnectionState, RTCPeerConnectionState, RTCSignalingState,
//! };
//!
//! assert_eq!(RTCIceConnectionState::Connected.to_string(), "connected");
//!
//! let state: RTCPeerConnectionState = "connecting".into();
//! assert_eq!(state, RTCPeerConnectionState::Connecting);
//!
//! let state: RTCSignalingState = "have-local-offer".into();
//! assert_eq!(state, RTCSignalingState::HaveLocalOffer);
//! ```
//!
//! # Specifications
//!
//! - [W3C WebRTC Specification]
//! - [RFC 8445] - ICE: Interactive Connectivity Establishment
//!
//! [W3C WebRTC Specification]: https://w3c.github.io/webrtc-pc/
//! [RFC 8445]: https://datatracker.ietf.org/doc/html/rfc8445

pub(crate) mod ice_connection_state;
pub(crate) mod ice_gathering_state;
pub(crate) mod peer_connection_state;
pub(crate) mod signaling_state;

pub use ice_connection_state::RTCIceConnectionState;
pub use ice_gathering_state::RTCIceGatheringState;
pub use peer_connection_state::{RTCPeerConnectionState, aggregate_connection_state};
pub use signaling_state::RTCSignalingState;

//! # RTC Peer - WebRTC peer connection negotiation core
//!
//! An async implementation of the negotiation half of the
//! [WebRTC specification](https://www.w3.org/TR/webrtc/): the offer/answer
//! state machine, SDP generation and parsing, transceiver and data channel
//! bookkeeping, and the lifecycle of the ICE, DTLS, and SCTP transports that
//! carry the connection.
//!
//! The transports sit behind traits in
//! [`peer_connection::transport`]. The default
//! [`LoopbackTransportFactory`](peer_connection::transport::loopback::LoopbackTransportFactory)
//! connects peers over UDP on `127.0.0.1`, which is enough to negotiate and
//! open data channels between two connections in one process.
//!
//! ## Quick Start
//!
//! ```no_run
//! use rtc_peer::api::APIBuilder;
//! use rtc_peer::peer_connection::configuration::RTCConfigurationBuilder;
//! use rtc_peer::peer_connection::transport::RTCIceServer;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let api = APIBuilder::new().build()?;
//!
//! let config = RTCConfigurationBuilder::new()
//!     .with_ice_servers(vec![RTCIceServer {
//!         urls: vec!["stun:stun.l.google.com:19302".to_string()],
//!         ..Default::default()
//!     }])
//!     .build();
//! let pc = api.new_peer_connection(config).await?;
//!
//! pc.on_peer_connection_state_change(Box::new(|state| {
//!     println!("Peer connection state: {state}");
//!     Box::pin(async {})
//! }))
//! .await;
//!
//! let offer = pc.create_offer(None).await?;
//! pc.set_local_description(offer).await?;
//!
//! // Send pc.local_description() to the remote peer over your signaling
//! // channel, then apply its answer with set_remote_description.
//!
//! pc.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - **[`api`]** - Builder for the engines shared by peer connections
//! - **[`peer_connection`]** - The connection, its configuration, SDP, states and transports
//! - **[`data_channel`]** - Data channel handles and their parameters
//! - **[`rtp_transceiver`]** - Media transceivers and directions
//!
//! ## Specification Compliance
//!
//! - [W3C WebRTC 1.0] - Main WebRTC API specification
//! - [RFC 8829] - JSEP: JavaScript Session Establishment Protocol
//! - [RFC 8866] - SDP: Session Description Protocol
//! - [RFC 8842] - Offer/answer for DTLS over UDP
//!
//! [W3C WebRTC 1.0]: https://www.w3.org/TR/webrtc/
//! [RFC 8829]: https://datatracker.ietf.org/doc/html/rfc8829
//! [RFC 8866]: https://datatracker.ietf.org/doc/html/rfc8866
//! [RFC 8842]: https://datatracker.ietf.org/doc/html/rfc8842

#![doc(
    html_logo_url = "https://raw.githubusercontent.com/webrtc-rs/webrtc-rs.github.io/master/res/rtc.png"
)]
#![warn(rust_2018_idioms)]

pub use shared;

pub mod api;
pub mod data_channel;
pub mod peer_connection;
pub mod rtp_transceiver;

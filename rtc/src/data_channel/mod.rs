//! Data channels announced over the message transport.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use shared::error::{Error, Result};

pub mod init;
pub mod parameters;
pub mod state;

use init::RTCDataChannelInit;
use parameters::DataChannelParameters;
pub use state::RTCDataChannelState;

/// Identifier for a data channel within a particular peer connection
pub type RTCDataChannelId = u16;

/// Largest label or protocol accepted, in bytes.
const MAX_STRING_SIZE: usize = 65535;

/// DataChannel represents a WebRTC DataChannel
/// The DataChannel interface represents a network channel
/// which can be used for bidirectional peer-to-peer transfers of arbitrary data
///
/// Handles are cheap to clone; clones observe the same channel.
///
/// ## Specifications
///
/// * [MDN]
/// * [W3C]
///
/// [MDN]: https://developer.mozilla.org/en-US/docs/Web/API/RTCDataChannel
/// [W3C]: https://w3c.github.io/webrtc-pc/#dom-rtcdatachannel
#[derive(Clone)]
pub struct RTCDataChannel {
    inner: Arc<DataChannelInner>,
}

struct DataChannelInner {
    params: DataChannelParameters,
    ready_state: AtomicU8,
}

impl fmt::Debug for RTCDataChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RTCDataChannel")
            .field("params", &self.inner.params)
            .field("ready_state", &self.ready_state())
            .finish()
    }
}

impl RTCDataChannel {
    pub(crate) fn new(params: DataChannelParameters, state: RTCDataChannelState) -> Self {
        RTCDataChannel {
            inner: Arc::new(DataChannelInner {
                params,
                ready_state: AtomicU8::new(state as u8),
            }),
        }
    }

    /// label represents a label that can be used to distinguish this
    /// DataChannel object from other DataChannel objects.
    pub fn label(&self) -> &str {
        &self.inner.params.label
    }

    /// Ordered returns true if the DataChannel is ordered, and false if
    /// out-of-order delivery is allowed.
    pub fn ordered(&self) -> bool {
        self.inner.params.ordered
    }

    pub fn max_packet_life_time(&self) -> Option<u16> {
        self.inner.params.max_packet_life_time
    }

    pub fn max_retransmits(&self) -> Option<u16> {
        self.inner.params.max_retransmits
    }

    pub fn protocol(&self) -> &str {
        &self.inner.params.protocol
    }

    /// negotiated represents whether this DataChannel was negotiated by the
    /// application (true), or announced in-band (false).
    pub fn negotiated(&self) -> bool {
        self.inner.params.negotiated
    }

    pub fn id(&self) -> RTCDataChannelId {
        self.inner.params.id
    }

    /// ready_state represents the state of the DataChannel object.
    pub fn ready_state(&self) -> RTCDataChannelState {
        self.inner.ready_state.load(Ordering::SeqCst).into()
    }

    pub(crate) fn set_ready_state(&self, state: RTCDataChannelState) {
        self.inner.ready_state.store(state as u8, Ordering::SeqCst);
    }

    pub(crate) fn parameters(&self) -> &DataChannelParameters {
        &self.inner.params
    }
}

/// Checks `init` and builds the parameters of a new channel.
///
/// `next_id` picks an identifier for channels that are not negotiated by the
/// application; it returns `None` once every identifier is in use.
pub(crate) fn new_parameters(
    label: &str,
    init: Option<RTCDataChannelInit>,
    next_id: impl FnOnce() -> Option<RTCDataChannelId>,
) -> Result<DataChannelParameters> {
    let init = init.unwrap_or_default();

    if label.len() > MAX_STRING_SIZE {
        return Err(Error::ErrStringSizeLimit);
    }
    let protocol = init.protocol.unwrap_or_default();
    if protocol.len() > MAX_STRING_SIZE {
        return Err(Error::ErrProtocolTooLarge);
    }
    if init.max_packet_life_time.is_some() && init.max_retransmits.is_some() {
        return Err(Error::ErrRetransmitsOrPacketLifeTime);
    }

    let (id, negotiated) = match init.negotiated {
        Some(id) => (id, true),
        None => (next_id().ok_or(Error::ErrMaxDataChannelID)?, false),
    };

    Ok(DataChannelParameters {
        id,
        label: label.to_owned(),
        protocol,
        ordered: init.ordered.unwrap_or(true),
        max_packet_life_time: init.max_packet_life_time,
        max_retransmits: init.max_retransmits,
        negotiated,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_new_parameters() {
        let long = "a".repeat(MAX_STRING_SIZE + 1);
        let tests = vec![
            ("data", None, Ok((7, true, false))),
            (
                "data",
                Some(RTCDataChannelInit {
                    ordered: Some(false),
                    negotiated: Some(42),
                    ..Default::default()
                }),
                Ok((42, false, true)),
            ),
            (long.as_str(), None, Err(Error::ErrStringSizeLimit)),
            (
                "data",
                Some(RTCDataChannelInit {
                    protocol: Some(long.clone()),
                    ..Default::default()
                }),
                Err(Error::ErrProtocolTooLarge),
            ),
            (
                "data",
                Some(RTCDataChannelInit {
                    max_packet_life_time: Some(10),
                    max_retransmits: Some(3),
                    ..Default::default()
                }),
                Err(Error::ErrRetransmitsOrPacketLifeTime),
            ),
        ];

        for (label, init, expected) in tests {
            let actual = new_parameters(label, init, || Some(7));
            match expected {
                Ok((id, ordered, negotiated)) => {
                    let params = actual.unwrap();
                    assert_eq!(params.id, id);
                    assert_eq!(params.ordered, ordered);
                    assert_eq!(params.negotiated, negotiated);
                }
                Err(err) => assert_eq!(actual, Err(err)),
            }
        }

        assert_eq!(
            new_parameters("data", None, || None),
            Err(Error::ErrMaxDataChannelID)
        );
    }

    #[test]
    fn test_data_channel_handle() {
        let dc = RTCDataChannel::new(
            DataChannelParameters {
                id: 1,
                label: "chat".to_owned(),
                ordered: true,
                ..Default::default()
            },
            RTCDataChannelState::Connecting,
        );
        let other = dc.clone();
        other.set_ready_state(RTCDataChannelState::Open);

        assert_eq!(dc.label(), "chat");
        assert_eq!(dc.id(), 1);
        assert!(dc.ordered());
        assert!(!dc.negotiated());
        assert_eq!(dc.ready_state(), RTCDataChannelState::Open);
    }
}

use crate::rtp_transceiver::RTCRtpTransceiverSnapshot;

/// Delivered to `on_track` once the transports are up, for every negotiated
/// transceiver that receives media.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCTrackEvent {
    pub transceiver: RTCRtpTransceiverSnapshot,
}

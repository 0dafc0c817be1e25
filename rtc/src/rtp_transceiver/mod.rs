//! Transceivers and the matching of remote media lines against them.
//!
//! A transceiver is one negotiation unit for one media kind. The peer connection
//! owns its transceivers in an ordered list: the order decides the media-line
//! order of generated offers and the scan order of
//! [`satisfy_type_and_direction`].

use crate::peer_connection::configuration::UNSPECIFIED_STR;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use log::trace;
use serde::{Deserialize, Serialize};
use shared::error::{Error, Result};
use std::fmt;

pub mod direction;

/// The media kind of a transceiver.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RtpCodecKind {
    #[default]
    Unspecified = 0,

    #[serde(rename = "audio")]
    Audio = 1,

    #[serde(rename = "video")]
    Video = 2,
}

impl From<&str> for RtpCodecKind {
    fn from(raw: &str) -> Self {
        match raw {
            "audio" => RtpCodecKind::Audio,
            "video" => RtpCodecKind::Video,
            _ => RtpCodecKind::Unspecified,
        }
    }
}

impl fmt::Display for RtpCodecKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RtpCodecKind::Audio => "audio",
            RtpCodecKind::Video => "video",
            RtpCodecKind::Unspecified => UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// RTPTransceiverInit dictionary is used when calling add_transceiver_from_kind() to
/// provide configuration options for the new transceiver.
#[derive(Default, Debug, Clone)]
pub struct RTCRtpTransceiverInit {
    pub direction: RTCRtpTransceiverDirection,
}

/// A media negotiation unit pairing a send and/or receive capability for one kind.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpTransceiver {
    mid: Option<String>,
    kind: RtpCodecKind,
    direction: RTCRtpTransceiverDirection,
    current_direction: RTCRtpTransceiverDirection,
    stopped: bool,
}

/// A read-only copy of a transceiver's state, handed out by
/// [`RTCPeerConnection::get_transceivers`](crate::peer_connection::RTCPeerConnection::get_transceivers).
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpTransceiverSnapshot {
    pub mid: Option<String>,
    pub kind: RtpCodecKind,
    pub direction: RTCRtpTransceiverDirection,
    pub current_direction: RTCRtpTransceiverDirection,
    pub stopped: bool,
}

impl RTCRtpTransceiver {
    pub fn new(kind: RtpCodecKind, direction: RTCRtpTransceiverDirection) -> Self {
        Self {
            mid: None,
            kind,
            direction,
            current_direction: RTCRtpTransceiverDirection::Unspecified,
            stopped: false,
        }
    }

    /// mid gets the Transceiver's mid value. When not already set, this value will be set in
    /// create_offer or set_remote_description.
    pub fn mid(&self) -> Option<&str> {
        self.mid.as_deref()
    }

    pub fn kind(&self) -> RtpCodecKind {
        self.kind
    }

    pub fn direction(&self) -> RTCRtpTransceiverDirection {
        self.direction
    }

    pub fn set_direction(&mut self, direction: RTCRtpTransceiverDirection) {
        let previous_direction = self.direction;
        self.direction = direction;

        if direction != previous_direction {
            trace!("Changing direction of transceiver from {previous_direction} to {direction}");
        }
    }

    /// current_direction returns the direction as negotiated.
    ///
    /// If this transceiver has never been negotiated this returns
    /// [`RTCRtpTransceiverDirection::Unspecified`].
    pub fn current_direction(&self) -> RTCRtpTransceiverDirection {
        self.current_direction
    }

    pub(crate) fn set_current_direction(&mut self, d: RTCRtpTransceiverDirection) {
        let previous = self.current_direction;
        self.current_direction = d;

        if d != previous {
            trace!("Changing current direction of transceiver from {previous} to {d}");
        }
    }

    /// set_mid sets the mid. If it was already set to another value, returns an error.
    pub(crate) fn set_mid(&mut self, mid: String) -> Result<()> {
        match &self.mid {
            Some(current) if *current != mid => Err(Error::ErrRTPTransceiverCannotChangeMid),
            _ => {
                self.mid = Some(mid);
                Ok(())
            }
        }
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    /// stop irreversibly stops the transceiver
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.direction = RTCRtpTransceiverDirection::Inactive;
        self.current_direction = RTCRtpTransceiverDirection::Inactive;
    }

    pub fn snapshot(&self) -> RTCRtpTransceiverSnapshot {
        RTCRtpTransceiverSnapshot {
            mid: self.mid.clone(),
            kind: self.kind,
            direction: self.direction,
            current_direction: self.current_direction,
            stopped: self.stopped,
        }
    }
}

pub(crate) fn find_by_mid(mid: &str, local_transceivers: &[RTCRtpTransceiver]) -> Option<usize> {
    local_transceivers
        .iter()
        .position(|t| t.mid.as_deref() == Some(mid))
}

/// Given a remote kind+direction, plucks the first satisfying transceiver out of `pool`.
///
/// Local directions are tried in preference order for the remote direction:
///
/// | remote   | local, most preferred first |
/// |----------|-----------------------------|
/// | sendrecv | recvonly, sendrecv          |
/// | sendonly | recvonly                    |
/// | recvonly | sendonly, sendrecv          |
/// | inactive | none                        |
///
/// Within one preferred direction the first transceiver in pool order with a
/// matching kind and no mid wins; it is removed from the pool and returned
/// unchanged. When nothing satisfies the request a new inactive transceiver of
/// `remote_kind` is returned and the pool is left untouched.
pub fn satisfy_type_and_direction(
    remote_kind: RtpCodecKind,
    remote_direction: RTCRtpTransceiverDirection,
    pool: &mut Vec<RTCRtpTransceiver>,
) -> RTCRtpTransceiver {
    let preferred_directions: &[RTCRtpTransceiverDirection] = match remote_direction {
        RTCRtpTransceiverDirection::Sendrecv => &[
            RTCRtpTransceiverDirection::Recvonly,
            RTCRtpTransceiverDirection::Sendrecv,
        ],
        RTCRtpTransceiverDirection::Sendonly => &[RTCRtpTransceiverDirection::Recvonly],
        RTCRtpTransceiverDirection::Recvonly => &[
            RTCRtpTransceiverDirection::Sendonly,
            RTCRtpTransceiverDirection::Sendrecv,
        ],
        _ => &[],
    };

    for possible_direction in preferred_directions {
        if let Some(index) = pool.iter().position(|t| {
            t.mid.is_none() && t.kind == remote_kind && t.direction == *possible_direction
        }) {
            return pool.remove(index);
        }
    }

    RTCRtpTransceiver::new(remote_kind, RTCRtpTransceiverDirection::Inactive)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_satisfy_type_and_direction() {
        use RTCRtpTransceiverDirection::*;
        use RtpCodecKind::*;

        let tests = vec![
            (
                "Audio and Video Transceivers can not satisfy each other",
                vec![(Video, Sendrecv)],
                vec![RTCRtpTransceiver::new(Audio, Sendrecv)],
                vec![(Video, Inactive)],
                1,
            ),
            (
                "No local Transceivers, every remote should get an inactive",
                vec![
                    (Video, Sendrecv),
                    (Audio, Recvonly),
                    (Video, Sendonly),
                    (Video, Inactive),
                ],
                vec![],
                vec![
                    (Video, Inactive),
                    (Audio, Inactive),
                    (Video, Inactive),
                    (Video, Inactive),
                ],
                0,
            ),
            (
                "Local Recv can satisfy remote SendRecv",
                vec![(Video, Sendrecv)],
                vec![RTCRtpTransceiver::new(Video, Recvonly)],
                vec![(Video, Recvonly)],
                0,
            ),
            (
                "Don't satisfy a Sendonly with a SendRecv, the later SendRecv takes it",
                vec![(Video, Sendonly), (Video, Sendrecv)],
                vec![
                    RTCRtpTransceiver::new(Video, Sendrecv),
                    RTCRtpTransceiver::new(Video, Recvonly),
                ],
                vec![(Video, Recvonly), (Video, Sendrecv)],
                0,
            ),
        ];

        for (name, remotes, mut pool, want, remaining) in tests {
            let got: Vec<(RtpCodecKind, RTCRtpTransceiverDirection)> = remotes
                .into_iter()
                .map(|(kind, direction)| {
                    let t = satisfy_type_and_direction(kind, direction, &mut pool);
                    (t.kind(), t.direction())
                })
                .collect();

            assert_eq!(got, want, "{name}");
            assert_eq!(pool.len(), remaining, "{name}: remaining pool");
        }
    }

    #[test]
    fn test_satisfy_type_and_direction_skips_negotiated() {
        let mut negotiated =
            RTCRtpTransceiver::new(RtpCodecKind::Audio, RTCRtpTransceiverDirection::Recvonly);
        negotiated.set_mid("0".to_owned()).unwrap();
        let free =
            RTCRtpTransceiver::new(RtpCodecKind::Audio, RTCRtpTransceiverDirection::Recvonly);
        let mut pool = vec![negotiated.clone(), free.clone()];

        let got = satisfy_type_and_direction(
            RtpCodecKind::Audio,
            RTCRtpTransceiverDirection::Sendonly,
            &mut pool,
        );

        assert_eq!(got, free);
        assert_eq!(pool, vec![negotiated]);
    }

    #[test]
    fn test_find_by_mid() {
        let mut a =
            RTCRtpTransceiver::new(RtpCodecKind::Audio, RTCRtpTransceiverDirection::Sendrecv);
        a.set_mid("0".to_owned()).unwrap();
        let mut v =
            RTCRtpTransceiver::new(RtpCodecKind::Video, RTCRtpTransceiverDirection::Sendrecv);
        v.set_mid("1".to_owned()).unwrap();
        let transceivers = vec![a, v];

        assert_eq!(find_by_mid("1", &transceivers), Some(1));
        assert_eq!(find_by_mid("2", &transceivers), None);
    }

    #[test]
    fn test_transceiver_mid_is_immutable() {
        let mut t =
            RTCRtpTransceiver::new(RtpCodecKind::Video, RTCRtpTransceiverDirection::Sendonly);
        assert!(t.set_mid("0".to_owned()).is_ok());
        assert!(t.set_mid("0".to_owned()).is_ok());
        assert_eq!(
            t.set_mid("1".to_owned()),
            Err(Error::ErrRTPTransceiverCannotChangeMid)
        );

        t.stop();
        let snapshot = t.snapshot();
        assert!(snapshot.stopped);
        assert_eq!(snapshot.direction, RTCRtpTransceiverDirection::Inactive);
        assert_eq!(snapshot.mid.as_deref(), Some("0"));
    }
}

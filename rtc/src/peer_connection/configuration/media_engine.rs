//! Codecs offered on audio and video media sections.
//!
//! The negotiation core never touches media packets; the media engine only
//! decides which payload types and `a=rtpmap`/`a=fmtp` lines a generated media
//! section carries.
//!
//! ```
//! use rtc_peer::peer_connection::configuration::media_engine::MediaEngine;
//! use rtc_peer::rtp_transceiver::RtpCodecKind;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut media_engine = MediaEngine::default();
//! media_engine.register_default_codecs()?;
//! assert_eq!(media_engine.get_codecs_by_kind(RtpCodecKind::Audio)[0].payload_type, 111);
//! # Ok(())
//! # }
//! ```

use crate::rtp_transceiver::RtpCodecKind;
use shared::error::{Error, Result};

/// Opus audio codec MIME type.
///
/// Note: MIME type matching is case-insensitive.
pub const MIME_TYPE_OPUS: &str = "audio/opus";

/// VP8 video codec MIME type.
///
/// Note: MIME type matching is case-insensitive.
pub const MIME_TYPE_VP8: &str = "video/VP8";

pub type PayloadType = u8;

/// A codec as advertised in a media section.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpCodec {
    pub mime_type: String,
    pub clock_rate: u32,
    pub channels: u16,
    pub sdp_fmtp_line: String,
}

/// A codec bound to the payload type it is offered with.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct RTCRtpCodecParameters {
    pub rtp_codec: RTCRtpCodec,
    pub payload_type: PayloadType,
}

impl RTCRtpCodecParameters {
    /// `a=rtpmap` value, e.g. `111 opus/48000/2`.
    pub(crate) fn rtpmap(&self) -> String {
        let name = self
            .rtp_codec
            .mime_type
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.rtp_codec.mime_type);
        let mut value = format!("{} {}/{}", self.payload_type, name, self.rtp_codec.clock_rate);
        if self.rtp_codec.channels > 0 {
            value += &format!("/{}", self.rtp_codec.channels);
        }
        value
    }

    /// `a=fmtp` value, when the codec has one.
    pub(crate) fn fmtp(&self) -> Option<String> {
        if self.rtp_codec.sdp_fmtp_line.is_empty() {
            None
        } else {
            Some(format!("{} {}", self.payload_type, self.rtp_codec.sdp_fmtp_line))
        }
    }
}

/// Codecs available to generated descriptions.
#[derive(Default, Debug, Clone)]
pub struct MediaEngine {
    pub(crate) video_codecs: Vec<RTCRtpCodecParameters>,
    pub(crate) audio_codecs: Vec<RTCRtpCodecParameters>,
}

impl MediaEngine {
    /// Registers Opus (payload type 111) and VP8 (payload type 96).
    pub fn register_default_codecs(&mut self) -> Result<()> {
        self.register_codec(
            RTCRtpCodecParameters {
                rtp_codec: RTCRtpCodec {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 2,
                    sdp_fmtp_line: "minptime=10;useinbandfec=1".to_owned(),
                },
                payload_type: 111,
            },
            RtpCodecKind::Audio,
        )?;

        self.register_codec(
            RTCRtpCodecParameters {
                rtp_codec: RTCRtpCodec {
                    mime_type: MIME_TYPE_VP8.to_owned(),
                    clock_rate: 90000,
                    channels: 0,
                    sdp_fmtp_line: "".to_owned(),
                },
                payload_type: 96,
            },
            RtpCodecKind::Video,
        )
    }

    /// Adds a codec. Registering a payload type twice for the same kind
    /// replaces the earlier codec.
    pub fn register_codec(
        &mut self,
        codec: RTCRtpCodecParameters,
        typ: RtpCodecKind,
    ) -> Result<()> {
        let codecs = match typ {
            RtpCodecKind::Audio => &mut self.audio_codecs,
            RtpCodecKind::Video => &mut self.video_codecs,
            RtpCodecKind::Unspecified => return Err(Error::ErrCodecNotFound),
        };

        if let Some(existing) = codecs
            .iter_mut()
            .find(|c| c.payload_type == codec.payload_type)
        {
            *existing = codec;
        } else {
            codecs.push(codec);
        }
        Ok(())
    }

    pub fn get_codecs_by_kind(&self, typ: RtpCodecKind) -> &[RTCRtpCodecParameters] {
        match typ {
            RtpCodecKind::Audio => &self.audio_codecs,
            RtpCodecKind::Video => &self.video_codecs,
            RtpCodecKind::Unspecified => &[],
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_register_default_codecs() -> Result<()> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;

        let tests = vec![
            (RtpCodecKind::Audio, 111, "111 opus/48000/2", Some("111 minptime=10;useinbandfec=1")),
            (RtpCodecKind::Video, 96, "96 VP8/90000", None),
        ];

        for (kind, payload_type, rtpmap, fmtp) in tests {
            let codecs = m.get_codecs_by_kind(kind);
            assert_eq!(codecs.len(), 1, "{kind}");
            assert_eq!(codecs[0].payload_type, payload_type);
            assert_eq!(codecs[0].rtpmap(), rtpmap);
            assert_eq!(codecs[0].fmtp().as_deref(), fmtp);
        }

        Ok(())
    }

    #[test]
    fn test_register_codec_replaces_payload_type() -> Result<()> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        m.register_codec(
            RTCRtpCodecParameters {
                rtp_codec: RTCRtpCodec {
                    mime_type: MIME_TYPE_OPUS.to_owned(),
                    clock_rate: 48000,
                    channels: 1,
                    sdp_fmtp_line: "".to_owned(),
                },
                payload_type: 111,
            },
            RtpCodecKind::Audio,
        )?;

        let audio = m.get_codecs_by_kind(RtpCodecKind::Audio);
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].rtp_codec.channels, 1);

        assert_eq!(
            m.register_codec(RTCRtpCodecParameters::default(), RtpCodecKind::Unspecified),
            Err(Error::ErrCodecNotFound)
        );

        Ok(())
    }
}

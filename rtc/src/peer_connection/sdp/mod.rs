//! Session description types and the helpers that build and read them.
//!
//! Descriptions are generated and inspected through the `sdp` crate's model;
//! text conversion goes through an [`SdpCodec`] so a different grammar
//! implementation can be plugged into the [`API`](crate::api::API).

use std::collections::HashSet;
use std::io::Cursor;

use sdp::description::common::Attribute;
use sdp::description::media::MediaDescription;
use sdp::description::session::{Origin, SessionDescription};

pub mod sdp_type;
pub mod session_description;

pub use sdp_type::RTCSdpType;
pub use session_description::RTCSessionDescription;

use crate::peer_connection::configuration::media_engine::MediaEngine;
use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::ice::RTCIceParameters;
use crate::peer_connection::transport::ice::candidate::RTCIceCandidate;
use crate::rtp_transceiver::RtpCodecKind;
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use shared::error::{Error, Result};

pub(crate) const MEDIA_SECTION_APPLICATION: &str = "application";

pub(crate) const ATTR_KEY_MID: &str = "mid";
pub(crate) const ATTR_KEY_GROUP: &str = "group";
pub(crate) const ATTR_KEY_SETUP: &str = "setup";
pub(crate) const ATTR_KEY_FINGERPRINT: &str = "fingerprint";
pub(crate) const ATTR_KEY_ICE_UFRAG: &str = "ice-ufrag";
pub(crate) const ATTR_KEY_ICE_PWD: &str = "ice-pwd";
pub(crate) const ATTR_KEY_CANDIDATE: &str = "candidate";
pub(crate) const ATTR_KEY_END_OF_CANDIDATES: &str = "end-of-candidates";
pub(crate) const ATTR_KEY_RTCP_MUX: &str = "rtcp-mux";
pub(crate) const ATTR_KEY_SCTP_PORT: &str = "sctp-port";
pub(crate) const ATTR_KEY_RTPMAP: &str = "rtpmap";
pub(crate) const ATTR_KEY_FMTP: &str = "fmtp";

const BUNDLE_GROUP_PREFIX: &str = "BUNDLE";
const SCTP_PORT: &str = "5000";
const DATA_CHANNEL_FORMAT: &str = "webrtc-datachannel";
const APPLICATION_PROTOS: [&str; 3] = ["UDP", "DTLS", "SCTP"];
const MEDIA_PROTOS: [&str; 4] = ["UDP", "TLS", "RTP", "SAVPF"];

/// Text form of session descriptions.
pub trait SdpCodec: Send + Sync {
    fn encode(&self, desc: &SessionDescription) -> String;

    /// Parses `raw`. Grammar errors map to [`Error::OtherSdpErr`].
    fn decode(&self, raw: &str) -> Result<SessionDescription>;
}

/// [`SdpCodec`] backed by the `sdp` crate.
#[derive(Default, Debug, Clone, Copy)]
pub struct DefaultSdpCodec;

impl SdpCodec for DefaultSdpCodec {
    fn encode(&self, desc: &SessionDescription) -> String {
        desc.marshal()
    }

    fn decode(&self, raw: &str) -> Result<SessionDescription> {
        let mut reader = Cursor::new(raw.as_bytes());
        SessionDescription::unmarshal(&mut reader).map_err(|e| Error::OtherSdpErr(e.to_string()))
    }
}

fn attribute<'a>(attrs: &'a [Attribute], key: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| a.key == key)
        .map(|a| a.value.as_deref().unwrap_or_default())
}

fn attributes<'a>(attrs: &'a [Attribute], key: &'a str) -> impl Iterator<Item = &'a str> {
    attrs
        .iter()
        .filter(move |a| a.key == key)
        .map(|a| a.value.as_deref().unwrap_or_default())
}

fn value_attribute(key: &str, value: impl Into<String>) -> Attribute {
    Attribute {
        key: key.to_owned(),
        value: Some(value.into()),
    }
}

fn property_attribute(key: &str) -> Attribute {
    Attribute {
        key: key.to_owned(),
        value: None,
    }
}

pub(crate) fn get_mid_value(media: &MediaDescription) -> Option<&str> {
    attribute(&media.attributes, ATTR_KEY_MID)
}

/// The direction attribute of `media`. A line without one is `sendrecv`,
/// RFC 4566 section 6.
pub(crate) fn get_peer_direction(media: &MediaDescription) -> RTCRtpTransceiverDirection {
    for a in &media.attributes {
        let direction = RTCRtpTransceiverDirection::from(a.key.as_str());
        if direction != RTCRtpTransceiverDirection::Unspecified {
            return direction;
        }
    }
    RTCRtpTransceiverDirection::Sendrecv
}

pub(crate) fn get_by_mid<'a>(
    search_mid: &str,
    desc: &'a SessionDescription,
) -> Option<&'a MediaDescription> {
    desc.media_descriptions
        .iter()
        .find(|m| get_mid_value(m) == Some(search_mid))
}

/// Whether `desc` offers an `a=group:BUNDLE`.
pub(crate) fn has_bundle_group(desc: &SessionDescription) -> bool {
    attributes(&desc.attributes, ATTR_KEY_GROUP)
        .any(|v| v.split_whitespace().next() == Some(BUNDLE_GROUP_PREFIX))
}

/// Numeric mids of `desc`; non-numeric mids are ignored.
pub(crate) fn numeric_mids(desc: &SessionDescription) -> impl Iterator<Item = isize> + '_ {
    desc.media_descriptions
        .iter()
        .filter_map(get_mid_value)
        .filter_map(|mid| mid.parse::<isize>().ok())
}

/// The single fingerprint `desc` advertises, at session or media level.
pub(crate) fn extract_fingerprint(desc: &SessionDescription) -> Result<RTCDtlsFingerprint> {
    let session_level = attributes(&desc.attributes, ATTR_KEY_FINGERPRINT);
    let media_level = desc
        .media_descriptions
        .iter()
        .flat_map(|m| attributes(&m.attributes, ATTR_KEY_FINGERPRINT));

    let mut fingerprint: Option<RTCDtlsFingerprint> = None;
    for raw in session_level.chain(media_level) {
        let parsed = RTCDtlsFingerprint::parse(raw)?;
        match &fingerprint {
            None => fingerprint = Some(parsed),
            Some(existing) => {
                if existing.algorithm != parsed.algorithm
                    || !existing.value.eq_ignore_ascii_case(&parsed.value)
                {
                    return Err(Error::ErrSessionDescriptionConflictingFingerprints);
                }
            }
        }
    }

    fingerprint.ok_or(Error::ErrSessionDescriptionNoFingerprint)
}

/// Remote ICE credentials and every candidate `desc` carries.
pub(crate) fn extract_ice_details(
    desc: &SessionDescription,
) -> Result<(RTCIceParameters, Vec<RTCIceCandidate>)> {
    let mut ufrag = attribute(&desc.attributes, ATTR_KEY_ICE_UFRAG).map(ToOwned::to_owned);
    let mut pwd = attribute(&desc.attributes, ATTR_KEY_ICE_PWD).map(ToOwned::to_owned);
    let mut candidates = vec![];
    let mut seen = HashSet::new();

    for m in &desc.media_descriptions {
        if let Some(value) = attribute(&m.attributes, ATTR_KEY_ICE_UFRAG) {
            if ufrag.as_deref().is_some_and(|existing| existing != value) {
                return Err(Error::ErrSessionDescriptionConflictingIceUfrag);
            }
            ufrag = Some(value.to_owned());
        }
        if let Some(value) = attribute(&m.attributes, ATTR_KEY_ICE_PWD) {
            if pwd.as_deref().is_some_and(|existing| existing != value) {
                return Err(Error::ErrSessionDescriptionConflictingIcePwd);
            }
            pwd = Some(value.to_owned());
        }

        for raw in attributes(&m.attributes, ATTR_KEY_CANDIDATE) {
            let candidate = RTCIceCandidate::unmarshal(raw)?;
            if seen.insert(candidate.marshal()) {
                candidates.push(candidate);
            }
        }
    }

    let username_fragment = ufrag.ok_or(Error::ErrSessionDescriptionMissingIceUfrag)?;
    let password = pwd.ok_or(Error::ErrSessionDescriptionMissingIcePwd)?;

    Ok((
        RTCIceParameters {
            username_fragment,
            password,
            ice_lite: false,
        },
        candidates,
    ))
}

/// What an `m=` line to generate carries.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum MediaSectionKind {
    /// The data channel section.
    Application,
    Rtp(RtpCodecKind),
    /// A remote line of a media type this side does not handle. It is
    /// answered with port 0 and left out of the bundle group.
    Rejected {
        media: String,
        protos: Vec<String>,
        formats: Vec<String>,
    },
}

impl MediaSectionKind {
    /// The kind of answer line for a remote `m=` line.
    pub(crate) fn for_remote(media: &MediaDescription) -> Self {
        if media.media_name.media == MEDIA_SECTION_APPLICATION {
            return MediaSectionKind::Application;
        }
        match RtpCodecKind::from(media.media_name.media.as_str()) {
            RtpCodecKind::Unspecified => MediaSectionKind::Rejected {
                media: media.media_name.media.clone(),
                protos: media.media_name.protos.clone(),
                formats: media.media_name.formats.clone(),
            },
            kind => MediaSectionKind::Rtp(kind),
        }
    }
}

/// One `m=` line to generate.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MediaSection {
    pub(crate) mid: String,
    pub(crate) kind: MediaSectionKind,
    pub(crate) direction: RTCRtpTransceiverDirection,
}

pub(crate) struct PopulateSdpParams<'a> {
    pub(crate) media_description_fingerprint: bool,
    pub(crate) bundle: bool,
    /// `a=setup` value put on every media line.
    pub(crate) connection_role: &'static str,
    pub(crate) ice_params: &'a RTCIceParameters,
    pub(crate) fingerprints: &'a [RTCDtlsFingerprint],
    pub(crate) media_engine: &'a MediaEngine,
}

fn add_transport_attributes(
    media: &mut MediaDescription,
    section: &MediaSection,
    params: &PopulateSdpParams<'_>,
) {
    media
        .attributes
        .push(value_attribute(ATTR_KEY_MID, section.mid.clone()));
    media.attributes.push(value_attribute(
        ATTR_KEY_ICE_UFRAG,
        params.ice_params.username_fragment.clone(),
    ));
    media.attributes.push(value_attribute(
        ATTR_KEY_ICE_PWD,
        params.ice_params.password.clone(),
    ));
    media
        .attributes
        .push(value_attribute(ATTR_KEY_SETUP, params.connection_role));
    if params.media_description_fingerprint {
        for fingerprint in params.fingerprints {
            media.attributes.push(value_attribute(
                ATTR_KEY_FINGERPRINT,
                fingerprint.to_attribute_value(),
            ));
        }
    }
}

fn add_data_media_section(
    section: &MediaSection,
    params: &PopulateSdpParams<'_>,
) -> MediaDescription {
    let mut media = MediaDescription::new_jsep_media_description(
        MEDIA_SECTION_APPLICATION.to_owned(),
        vec![],
    );
    media.media_name.protos = APPLICATION_PROTOS.iter().map(|p| p.to_string()).collect();
    media.media_name.formats = vec![DATA_CHANNEL_FORMAT.to_owned()];

    add_transport_attributes(&mut media, section, params);
    media
        .attributes
        .push(value_attribute(ATTR_KEY_SCTP_PORT, SCTP_PORT));
    media
}

fn add_transceiver_media_section(
    section: &MediaSection,
    kind: RtpCodecKind,
    params: &PopulateSdpParams<'_>,
) -> Result<MediaDescription> {
    let codecs = params.media_engine.get_codecs_by_kind(kind);
    if codecs.is_empty() {
        return Err(Error::ErrCodecNotFound);
    }

    let mut media = MediaDescription::new_jsep_media_description(kind.to_string(), vec![]);
    media.media_name.protos = MEDIA_PROTOS.iter().map(|p| p.to_string()).collect();
    media.media_name.formats = codecs.iter().map(|c| c.payload_type.to_string()).collect();

    add_transport_attributes(&mut media, section, params);
    media.attributes.push(property_attribute(ATTR_KEY_RTCP_MUX));
    for codec in codecs {
        media
            .attributes
            .push(value_attribute(ATTR_KEY_RTPMAP, codec.rtpmap()));
        if let Some(fmtp) = codec.fmtp() {
            media.attributes.push(value_attribute(ATTR_KEY_FMTP, fmtp));
        }
    }
    media
        .attributes
        .push(property_attribute(&section.direction.to_string()));
    Ok(media)
}

fn add_rejected_media_section(
    section: &MediaSection,
    media_type: &str,
    protos: &[String],
    formats: &[String],
) -> MediaDescription {
    let mut media = MediaDescription::new_jsep_media_description(media_type.to_owned(), vec![]);
    media.media_name.port.value = 0;
    media.media_name.protos = protos.to_vec();
    media.media_name.formats = formats.to_vec();
    media
        .attributes
        .push(value_attribute(ATTR_KEY_MID, section.mid.clone()));
    media.attributes.push(property_attribute(
        &RTCRtpTransceiverDirection::Inactive.to_string(),
    ));
    media
}

/// Fills `d` with one media line per section, in order.
pub(crate) fn populate_sdp(
    mut d: SessionDescription,
    media_sections: &[MediaSection],
    params: PopulateSdpParams<'_>,
) -> Result<SessionDescription> {
    if params.fingerprints.is_empty() {
        return Err(Error::ErrNonCertificate);
    }

    let mut bundle_value = BUNDLE_GROUP_PREFIX.to_owned();
    let mut bundled = 0;
    for section in media_sections {
        let media = match &section.kind {
            MediaSectionKind::Application => add_data_media_section(section, &params),
            MediaSectionKind::Rtp(kind) => {
                add_transceiver_media_section(section, *kind, &params)?
            }
            MediaSectionKind::Rejected {
                media,
                protos,
                formats,
            } => {
                d.media_descriptions
                    .push(add_rejected_media_section(section, media, protos, formats));
                continue;
            }
        };
        bundle_value += " ";
        bundle_value += &section.mid;
        bundled += 1;
        d.media_descriptions.push(media);
    }

    if !params.media_description_fingerprint {
        for fingerprint in params.fingerprints {
            d.attributes.push(value_attribute(
                ATTR_KEY_FINGERPRINT,
                fingerprint.to_attribute_value(),
            ));
        }
    }
    if params.bundle && bundled > 0 {
        d.attributes.push(value_attribute(ATTR_KEY_GROUP, bundle_value));
    }

    Ok(d)
}

/// Keeps the session id stable across descriptions and bumps the version.
pub(crate) fn update_sdp_origin(origin: &mut Origin, d: &mut SessionDescription) {
    if origin.session_version == 0 {
        origin.session_id = d.origin.session_id;
        origin.session_version = d.origin.session_version;
    } else {
        origin.session_version += 1;
        d.origin.session_id = origin.session_id;
        d.origin.session_version = origin.session_version;
    }
}

/// Embeds local candidates on every media line, then `a=end-of-candidates`
/// once gathering is over.
pub(crate) fn add_candidates(
    d: &mut SessionDescription,
    candidates: &[RTCIceCandidate],
    complete: bool,
) {
    for m in d
        .media_descriptions
        .iter_mut()
        .filter(|m| m.media_name.port.value != 0)
    {
        for candidate in candidates {
            m.attributes
                .push(value_attribute(ATTR_KEY_CANDIDATE, candidate.marshal()));
        }
        if complete {
            m.attributes
                .push(property_attribute(ATTR_KEY_END_OF_CANDIDATES));
        }
    }
}

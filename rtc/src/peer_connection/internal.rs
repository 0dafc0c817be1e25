//! Negotiation state guarded by the connection's lock.
//!
//! Nothing in here awaits. The async handle in the parent module takes the
//! lock, asks this core to validate and promote descriptions or to generate
//! offers and answers, and then drives the transports outside of it.

use std::sync::Arc;

use sdp::description::session::{Origin, SessionDescription};

use super::configuration::RTCConfiguration;
use super::configuration::bundle_policy::RTCBundlePolicy;
use super::configuration::media_engine::MediaEngine;
use super::configuration::setting_engine::SettingEngine;
use super::sdp::sdp_type::RTCSdpType;
use super::sdp::session_description::RTCSessionDescription;
use super::sdp::{
    MEDIA_SECTION_APPLICATION, MediaSection, MediaSectionKind, PopulateSdpParams, SdpCodec,
    get_mid_value, get_peer_direction, has_bundle_group, numeric_mids, populate_sdp,
    update_sdp_origin,
};
use super::state::signaling_state::{StateChangeOp, check_next_signaling_state};
use super::state::RTCSignalingState;
use super::transport::dtls::role::{DEFAULT_DTLS_ROLE_OFFER, RTCDtlsRole};
use super::transport::{RTCDtlsFingerprint, RTCIceParameters, RTCIceRole};
use crate::data_channel::{RTCDataChannel, RTCDataChannelId};
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::{
    RTCRtpTransceiver, RtpCodecKind, find_by_mid, satisfy_type_and_direction,
};
use shared::error::{Error, Result};

pub(crate) struct PeerConnectionInternal {
    pub(super) configuration: RTCConfiguration,
    setting_engine: Arc<SettingEngine>,
    media_engine: Arc<MediaEngine>,
    sdp_codec: Arc<dyn SdpCodec>,

    pub(super) signaling_state: RTCSignalingState,
    pub(super) current_local_description: Option<RTCSessionDescription>,
    pub(super) pending_local_description: Option<RTCSessionDescription>,
    pub(super) current_remote_description: Option<RTCSessionDescription>,
    pub(super) pending_remote_description: Option<RTCSessionDescription>,

    pub(super) rtp_transceivers: Vec<RTCRtpTransceiver>,
    /// Transceivers as they were before the pending remote offer was applied.
    transceivers_before_remote_offer: Option<Vec<RTCRtpTransceiver>>,

    pub(super) data_channels: Vec<RTCDataChannel>,
    data_channel_mid: Option<String>,
    /// Set once the message transport runs; channels created afterwards are
    /// announced right away.
    pub(super) sctp_ready: bool,
    pub(super) transports_started: bool,

    sdp_origin: Origin,
    pub(super) last_offer: String,
    pub(super) last_answer: String,

    /// a value containing the last known greater mid value
    /// we internally generate mids as numbers. Needed since JSEP
    /// requires that when reusing a media section a new unique mid
    /// should be defined (see JSEP 3.4.1).
    greater_mid: isize,
}

impl PeerConnectionInternal {
    pub(super) fn new(
        configuration: RTCConfiguration,
        setting_engine: Arc<SettingEngine>,
        media_engine: Arc<MediaEngine>,
        sdp_codec: Arc<dyn SdpCodec>,
    ) -> Self {
        PeerConnectionInternal {
            configuration,
            setting_engine,
            media_engine,
            sdp_codec,
            signaling_state: RTCSignalingState::Stable,
            current_local_description: None,
            pending_local_description: None,
            current_remote_description: None,
            pending_remote_description: None,
            rtp_transceivers: vec![],
            transceivers_before_remote_offer: None,
            data_channels: vec![],
            data_channel_mid: None,
            sctp_ready: false,
            transports_started: false,
            sdp_origin: Origin::default(),
            last_offer: String::new(),
            last_answer: String::new(),
            greater_mid: -1,
        }
    }

    pub(super) fn local_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_local_description
            .as_ref()
            .or(self.current_local_description.as_ref())
    }

    pub(super) fn remote_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_remote_description
            .as_ref()
            .or(self.current_remote_description.as_ref())
    }

    pub(super) fn decode(&self, raw: &str) -> Result<SessionDescription> {
        self.sdp_codec.decode(raw)
    }

    /// DTLS role this side plays with the current remote description.
    ///
    /// An answerer follows the remote's explicit `a=setup` and otherwise the
    /// configured answering role. An offerer takes the complement of the
    /// remote answer. Before any remote description the offerer expects
    /// the default answerer to be the client.
    pub(super) fn local_dtls_role(&self) -> RTCDtlsRole {
        let Some(remote) = self.remote_description() else {
            return RTCDtlsRole::Server;
        };
        let remote_role = remote
            .parsed()
            .map(RTCDtlsRole::from)
            .unwrap_or(RTCDtlsRole::Auto);

        match remote.sdp_type {
            RTCSdpType::Offer => match remote_role {
                RTCDtlsRole::Client | RTCDtlsRole::Server => remote_role.complement(),
                _ => self.setting_engine.answering_dtls_role,
            },
            _ => remote_role.complement(),
        }
    }

    /// The offerer controls ICE.
    pub(super) fn local_ice_role(&self) -> RTCIceRole {
        match self.remote_description().map(|d| d.sdp_type) {
            Some(RTCSdpType::Offer) => RTCIceRole::Controlled,
            _ => RTCIceRole::Controlling,
        }
    }

    /// Picks the lowest free stream id with the parity of the DTLS role
    /// (RFC 8832 section 6): even for the client, odd for the server.
    pub(super) fn next_data_channel_id(&self) -> Option<RTCDataChannelId> {
        let mut id: RTCDataChannelId = match self.local_dtls_role() {
            RTCDtlsRole::Client => 0,
            _ => 1,
        };
        while id < RTCDataChannelId::MAX {
            if !self.data_channels.iter().any(|d| d.id() == id) {
                return Some(id);
            }
            id = id.checked_add(2)?;
        }
        None
    }

    /// Validates the transition for `sd` and promotes it into the
    /// description slots. Returns the new signaling state.
    ///
    /// Local offers and answers must be the text last generated by
    /// [`generate_offer`](Self::generate_offer) or
    /// [`generate_answer`](Self::generate_answer).
    pub(super) fn set_description(
        &mut self,
        sd: &mut RTCSessionDescription,
        op: StateChangeOp,
    ) -> Result<RTCSignalingState> {
        if sd.sdp_type == RTCSdpType::Unspecified {
            return Err(Error::ErrPeerConnSDPTypeInvalidValue);
        }

        if op == StateChangeOp::SetLocal {
            match sd.sdp_type {
                RTCSdpType::Offer if sd.sdp != self.last_offer => {
                    return Err(Error::ErrSDPDoesNotMatchOffer);
                }
                RTCSdpType::Answer | RTCSdpType::Pranswer if sd.sdp != self.last_answer => {
                    return Err(Error::ErrSDPDoesNotMatchAnswer);
                }
                _ => {}
            }
        }

        let next_state = check_next_signaling_state(self.signaling_state, op, sd.sdp_type)?;

        if sd.sdp_type.has_body() && sd.parsed.is_none() {
            sd.parsed = Some(self.sdp_codec.decode(&sd.sdp)?);
        }

        match (op, sd.sdp_type) {
            // stable->SetLocal(offer)->have-local-offer
            // have-remote-offer->SetLocal(pranswer)->have-local-pranswer
            (StateChangeOp::SetLocal, RTCSdpType::Offer | RTCSdpType::Pranswer) => {
                self.pending_local_description = Some(sd.clone());
            }
            // have-remote-offer->SetLocal(answer)->stable
            // have-local-pranswer->SetLocal(answer)->stable
            (StateChangeOp::SetLocal, RTCSdpType::Answer) => {
                let pending_remote_description = self.pending_remote_description.take();
                self.pending_local_description = None;

                self.current_local_description = Some(sd.clone());
                if pending_remote_description.is_some() {
                    self.current_remote_description = pending_remote_description;
                }
                self.transceivers_before_remote_offer = None;
            }
            (StateChangeOp::SetLocal, RTCSdpType::Rollback) => {
                self.pending_local_description = None;
            }
            // stable->SetRemote(offer)->have-remote-offer
            // have-local-offer->SetRemote(pranswer)->have-remote-pranswer
            (StateChangeOp::SetRemote, RTCSdpType::Offer | RTCSdpType::Pranswer) => {
                self.pending_remote_description = Some(sd.clone());
            }
            // have-local-offer->SetRemote(answer)->stable
            // have-remote-pranswer->SetRemote(answer)->stable
            (StateChangeOp::SetRemote, RTCSdpType::Answer) => {
                let pending_local_description = self.pending_local_description.take();
                self.pending_remote_description = None;

                self.current_remote_description = Some(sd.clone());
                if pending_local_description.is_some() {
                    self.current_local_description = pending_local_description;
                }
            }
            (StateChangeOp::SetRemote, RTCSdpType::Rollback) => {
                self.pending_remote_description = None;
                if let Some(transceivers) = self.transceivers_before_remote_offer.take() {
                    self.rtp_transceivers = transceivers;
                }
            }
            (_, RTCSdpType::Unspecified) => return Err(Error::ErrPeerConnSDPTypeInvalidValue),
        }

        if next_state != self.signaling_state {
            log::debug!(
                "signaling state {} -> {} ({} {})",
                self.signaling_state,
                next_state,
                op,
                sd.sdp_type
            );
        }
        self.signaling_state = next_state;
        Ok(next_state)
    }

    fn bundle_and_fingerprint_placement(&self, remote_bundles: Option<bool>) -> (bool, bool) {
        let media_level_fingerprints = self.setting_engine.sdp_media_level_fingerprints
            || self.configuration.bundle_policy == RTCBundlePolicy::MaxCompat;
        let bundle = match remote_bundles {
            Some(remote_bundles) => remote_bundles,
            None => self.configuration.bundle_policy.bundles(),
        };
        (bundle, media_level_fingerprints)
    }

    fn finish_description(
        &mut self,
        sdp_type: RTCSdpType,
        mut d: SessionDescription,
    ) -> RTCSessionDescription {
        update_sdp_origin(&mut self.sdp_origin, &mut d);
        let sdp = self.sdp_codec.encode(&d);
        RTCSessionDescription {
            sdp_type,
            sdp,
            parsed: Some(d),
        }
    }

    /// Assigns numeric mids to every transceiver that lacks one and builds an
    /// offer with one media line per transceiver, plus the data channel line.
    pub(super) fn generate_offer(
        &mut self,
        ice_params: &RTCIceParameters,
        fingerprints: &[RTCDtlsFingerprint],
    ) -> Result<RTCSessionDescription> {
        if !matches!(
            self.signaling_state,
            RTCSignalingState::Stable | RTCSignalingState::HaveLocalOffer
        ) {
            return Err(Error::ErrIncorrectSignalingState);
        }

        if let Some(parsed) = self
            .current_remote_description
            .as_ref()
            .and_then(|d| d.parsed())
        {
            if let Some(max) = numeric_mids(parsed).max() {
                self.greater_mid = self.greater_mid.max(max);
            }
        }

        for t in &self.rtp_transceivers {
            if let Some(numeric_mid) = t.mid().and_then(|mid| mid.parse::<isize>().ok()) {
                self.greater_mid = self.greater_mid.max(numeric_mid);
            }
        }
        for t in &mut self.rtp_transceivers {
            if t.mid().is_none() {
                self.greater_mid += 1;
                t.set_mid(self.greater_mid.to_string())?;
            }
        }

        let mut media_sections: Vec<MediaSection> = self
            .rtp_transceivers
            .iter()
            .filter_map(|t| {
                t.mid().map(|mid| MediaSection {
                    mid: mid.to_owned(),
                    kind: MediaSectionKind::Rtp(t.kind()),
                    direction: t.direction(),
                })
            })
            .collect();

        if !self.data_channels.is_empty() || self.data_channel_mid.is_some() {
            let mid = match &self.data_channel_mid {
                Some(mid) => mid.clone(),
                None => {
                    self.greater_mid += 1;
                    let mid = self.greater_mid.to_string();
                    self.data_channel_mid = Some(mid.clone());
                    mid
                }
            };
            media_sections.push(MediaSection {
                mid,
                kind: MediaSectionKind::Application,
                direction: RTCRtpTransceiverDirection::Unspecified,
            });
        }

        let (bundle, media_description_fingerprint) = self.bundle_and_fingerprint_placement(None);
        let d = populate_sdp(
            SessionDescription::new_jsep_session_description(false),
            &media_sections,
            PopulateSdpParams {
                media_description_fingerprint,
                bundle,
                connection_role: DEFAULT_DTLS_ROLE_OFFER.to_setup(),
                ice_params,
                fingerprints,
                media_engine: &self.media_engine,
            },
        )?;

        let offer = self.finish_description(RTCSdpType::Offer, d);
        self.last_offer = offer.sdp.clone();
        Ok(offer)
    }

    /// Builds an answer mirroring every media line of the remote offer.
    pub(super) fn generate_answer(
        &mut self,
        ice_params: &RTCIceParameters,
        fingerprints: &[RTCDtlsFingerprint],
    ) -> Result<RTCSessionDescription> {
        let remote = self
            .remote_description()
            .and_then(|d| d.parsed())
            .ok_or(Error::ErrNoRemoteDescription)?;

        if !matches!(
            self.signaling_state,
            RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveLocalPranswer
        ) {
            return Err(Error::ErrIncorrectSignalingState);
        }

        let mut media_sections = vec![];
        for (index, media) in remote.media_descriptions.iter().enumerate() {
            let mid = get_mid_value(media)
                .map(ToOwned::to_owned)
                .unwrap_or_else(|| index.to_string());

            let kind = MediaSectionKind::for_remote(media);
            let direction = match kind {
                MediaSectionKind::Application => RTCRtpTransceiverDirection::Unspecified,
                MediaSectionKind::Rejected { .. } => RTCRtpTransceiverDirection::Inactive,
                MediaSectionKind::Rtp(_) => {
                    let offered = get_peer_direction(media).reverse();
                    match find_by_mid(&mid, &self.rtp_transceivers) {
                        Some(i) => self.rtp_transceivers[i].direction().intersect(offered),
                        None => RTCRtpTransceiverDirection::Inactive,
                    }
                }
            };
            media_sections.push(MediaSection {
                mid,
                kind,
                direction,
            });
        }

        let (bundle, media_description_fingerprint) =
            self.bundle_and_fingerprint_placement(Some(has_bundle_group(remote)));
        let d = populate_sdp(
            SessionDescription::new_jsep_session_description(false),
            &media_sections,
            PopulateSdpParams {
                media_description_fingerprint,
                bundle,
                connection_role: self.local_dtls_role().to_setup(),
                ice_params,
                fingerprints,
                media_engine: &self.media_engine,
            },
        )?;

        let answer = self.finish_description(RTCSdpType::Answer, d);
        self.last_answer = answer.sdp.clone();
        Ok(answer)
    }

    /// Every non-application line of a remote offer must carry a mid.
    pub(super) fn check_remote_mids(parsed: &SessionDescription) -> Result<()> {
        for media in &parsed.media_descriptions {
            if media.media_name.media != MEDIA_SECTION_APPLICATION && get_mid_value(media).is_none()
            {
                return Err(Error::ErrPeerConnRemoteDescriptionWithoutMidValue);
            }
        }
        Ok(())
    }

    /// Binds the lines of a remote offer to local transceivers.
    ///
    /// Lines whose mid is already negotiated keep their transceiver. Every
    /// other line takes a transceiver out of the unnegotiated pool through
    /// [`satisfy_type_and_direction`]. The result is committed only when
    /// every line was handled.
    pub(super) fn apply_remote_offer(&mut self, parsed: &SessionDescription) -> Result<()> {
        let before = self.rtp_transceivers.clone();

        let (mut negotiated, mut pool): (Vec<_>, Vec<_>) = self
            .rtp_transceivers
            .iter()
            .cloned()
            .partition(|t| t.mid().is_some());

        for media in &parsed.media_descriptions {
            let Some(mid) = get_mid_value(media) else {
                if media.media_name.media != MEDIA_SECTION_APPLICATION {
                    return Err(Error::ErrPeerConnRemoteDescriptionWithoutMidValue);
                }
                continue;
            };

            if media.media_name.media == MEDIA_SECTION_APPLICATION {
                self.data_channel_mid = Some(mid.to_owned());
                continue;
            }

            let kind = RtpCodecKind::from(media.media_name.media.as_str());
            if kind == RtpCodecKind::Unspecified {
                log::debug!("ignoring remote media line {mid} of unknown kind");
                continue;
            }
            let direction = get_peer_direction(media);

            // the local direction is kept; the answer intersects it with the offer
            if find_by_mid(mid, &negotiated).is_none() {
                let mut t = satisfy_type_and_direction(kind, direction, &mut pool);
                t.set_mid(mid.to_owned())?;
                negotiated.push(t);
            }
        }

        negotiated.extend(pool);
        self.rtp_transceivers = negotiated;
        if self.transceivers_before_remote_offer.is_none() {
            self.transceivers_before_remote_offer = Some(before);
        }
        Ok(())
    }

    /// Records the directions a remote answer settled on.
    pub(super) fn apply_remote_answer(&mut self, parsed: &SessionDescription) {
        for media in &parsed.media_descriptions {
            let Some(mid) = get_mid_value(media) else {
                continue;
            };
            if media.media_name.media == MEDIA_SECTION_APPLICATION {
                self.data_channel_mid = Some(mid.to_owned());
                continue;
            }
            if let Some(i) = find_by_mid(mid, &self.rtp_transceivers) {
                let direction = get_peer_direction(media).reverse();
                self.rtp_transceivers[i].set_current_direction(direction);
            }
        }
    }

    /// Records the directions a local answer settled on.
    pub(super) fn apply_local_answer(&mut self, parsed: &SessionDescription) {
        for media in &parsed.media_descriptions {
            let Some(mid) = get_mid_value(media) else {
                continue;
            };
            if let Some(i) = find_by_mid(mid, &self.rtp_transceivers) {
                let direction = get_peer_direction(media);
                self.rtp_transceivers[i].set_current_direction(direction);
            }
        }
    }
}

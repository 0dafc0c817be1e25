//! The peer connection: offer/answer negotiation, transport lifecycle and
//! user callbacks.
//!
//! An [`RTCPeerConnection`] is a cheap handle; clones drive the same
//! connection. Negotiation state lives behind one async lock, while the
//! signaling, ICE, gathering, and overall states are mirrored in atomics so
//! the getters never wait.
//!
//! ```no_run
//! use rtc_peer::api::APIBuilder;
//! use rtc_peer::peer_connection::configuration::RTCConfiguration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let api = APIBuilder::new().build()?;
//! let offerer = api.new_peer_connection(RTCConfiguration::default()).await?;
//! let answerer = api.new_peer_connection(RTCConfiguration::default()).await?;
//!
//! offerer.create_data_channel("chat", None).await?;
//! let offer = offerer.create_offer(None).await?;
//! offerer.set_local_description(offer).await?;
//! let _ = offerer.gathering_complete_promise().await.recv().await;
//!
//! if let Some(offer) = offerer.local_description().await {
//!     answerer.set_remote_description(offer).await?;
//! }
//! let answer = answerer.create_answer(None).await?;
//! answerer.set_local_description(answer).await?;
//! let _ = answerer.gathering_complete_promise().await.recv().await;
//!
//! if let Some(answer) = answerer.local_description().await {
//!     offerer.set_remote_description(answer).await?;
//! }
//!
//! offerer.close().await?;
//! answerer.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod configuration;
pub mod event;
pub(crate) mod internal;
pub mod sdp;
pub mod state;
pub mod transport;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Weak};

use rcgen::KeyPair;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use self::certificate::RTCCertificate;
use self::configuration::RTCConfiguration;
use self::configuration::offer_answer_options::{RTCAnswerOptions, RTCOfferOptions};
use self::event::{
    OnDataChannelHdlrFn, OnICEConnectionStateChangeHdlrFn, OnIceCandidateHdlrFn,
    OnIceGatheringStateChangeHdlrFn, OnPeerConnectionStateChangeHdlrFn,
    OnSignalingStateChangeHdlrFn, OnTrackHdlrFn, PeerConnectionEventHandlers, RTCTrackEvent,
};
use self::internal::PeerConnectionInternal;
use self::sdp::{
    RTCSdpType, RTCSessionDescription, SdpCodec, add_candidates, extract_fingerprint,
    extract_ice_details, get_by_mid,
};
use self::state::signaling_state::StateChangeOp;
use self::state::{
    RTCIceConnectionState, RTCIceGatheringState, RTCPeerConnectionState, RTCSignalingState,
    aggregate_connection_state,
};
use self::transport::ice::candidate::CANDIDATE_PREFIX;
use self::transport::ice::gatherer::RTCIceGatherer;
use self::transport::{
    DTLSParameters, DtlsTransport, RTCDtlsFingerprint, RTCDtlsRole, RTCDtlsTransportState,
    RTCIceCandidate, RTCIceCandidateInit, RTCIceGathererState, RTCIceParameters, RTCIceRole,
    TransportBundle, TransportEvent,
};
use crate::api::API;
use crate::data_channel::init::RTCDataChannelInit;
use crate::data_channel::parameters::DataChannelParameters;
use crate::data_channel::{RTCDataChannel, RTCDataChannelState, new_parameters};
use crate::rtp_transceiver::direction::RTCRtpTransceiverDirection;
use crate::rtp_transceiver::{
    RTCRtpTransceiver, RTCRtpTransceiverInit, RTCRtpTransceiverSnapshot, RtpCodecKind,
};
use shared::error::{Error, Result, flatten_errs};

/// PeerConnection represents a WebRTC connection that establishes a
/// peer-to-peer communications with another PeerConnection instance in a
/// browser, or to another endpoint implementing the required protocols.
///
/// Created with [`API::new_peer_connection`]. After [`close`](Self::close)
/// every mutating call fails with [`Error::ErrConnectionClosed`].
#[derive(Clone)]
pub struct RTCPeerConnection {
    inner: Arc<PeerConnectionInner>,
}

struct PeerConnectionInner {
    sdp_codec: Arc<dyn SdpCodec>,
    internal: Mutex<PeerConnectionInternal>,

    is_closed: AtomicBool,
    signaling_state: AtomicU8,
    ice_connection_state: AtomicU8,
    ice_gathering_state: AtomicU8,
    peer_connection_state: AtomicU8,
    dtls_transport_state: AtomicU8,
    // held from aggregation until the change is queued
    connection_state_update: std::sync::Mutex<()>,

    ice_gatherer: RTCIceGatherer,
    transports: TransportBundle,
    start_transports_task: Mutex<Option<JoinHandle<()>>>,
    event_loop: Mutex<Option<JoinHandle<()>>>,

    handlers: PeerConnectionEventHandlers,
}

fn certificate_fingerprints(certificates: &[RTCCertificate]) -> Vec<RTCDtlsFingerprint> {
    certificates
        .iter()
        .flat_map(|c| c.get_fingerprints())
        .collect()
}

impl RTCPeerConnection {
    /// Validates `configuration`, resolves its defaults and builds the
    /// transports. Must run inside a tokio runtime.
    pub(crate) async fn new(api: &API, mut configuration: RTCConfiguration) -> Result<Self> {
        // https://www.w3.org/TR/webrtc/#constructor (step #3 and #4)
        configuration.validate()?;
        configuration.resolve_defaults();
        if configuration.certificates.is_empty() {
            let certificate = RTCCertificate::from_key_pair(KeyPair::generate()?)?;
            configuration.certificates = vec![certificate];
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let transports = api.transport_factory.create(
            Arc::clone(&api.setting_engine),
            &configuration.certificates,
            events_tx.clone(),
        )?;
        let ice_gatherer = RTCIceGatherer::new(
            Arc::clone(&transports.ice),
            api.setting_engine.trickle,
            events_tx,
        );

        let internal = PeerConnectionInternal::new(
            configuration,
            Arc::clone(&api.setting_engine),
            Arc::clone(&api.media_engine),
            Arc::clone(&api.sdp_codec),
        );

        let inner = Arc::new(PeerConnectionInner {
            sdp_codec: Arc::clone(&api.sdp_codec),
            internal: Mutex::new(internal),
            is_closed: AtomicBool::new(false),
            signaling_state: AtomicU8::new(RTCSignalingState::Stable as u8),
            ice_connection_state: AtomicU8::new(RTCIceConnectionState::New as u8),
            ice_gathering_state: AtomicU8::new(RTCIceGatheringState::New as u8),
            peer_connection_state: AtomicU8::new(RTCPeerConnectionState::New as u8),
            dtls_transport_state: AtomicU8::new(RTCDtlsTransportState::New as u8),
            connection_state_update: std::sync::Mutex::new(()),
            ice_gatherer,
            transports,
            start_transports_task: Mutex::new(None),
            event_loop: Mutex::new(None),
            handlers: PeerConnectionEventHandlers::new(),
        });

        let event_loop = tokio::spawn(PeerConnectionInner::run_event_loop(
            Arc::downgrade(&inner),
            events_rx,
        ));
        *inner.event_loop.lock().await = Some(event_loop);

        Ok(RTCPeerConnection { inner })
    }

    fn check_closed(&self) -> Result<()> {
        if self.inner.is_closed.load(Ordering::SeqCst) {
            Err(Error::ErrConnectionClosed)
        } else {
            Ok(())
        }
    }

    /// on_signaling_state_change sets an event handler which is invoked when the
    /// peer connection's signaling state changes
    pub async fn on_signaling_state_change(&self, f: OnSignalingStateChangeHdlrFn) {
        self.inner.handlers.on_signaling_state_change.set(f).await;
    }

    /// on_ice_candidate sets an event handler which is invoked when a new ICE
    /// candidate is found. A `None` candidate marks the end of gathering.
    pub async fn on_ice_candidate(&self, f: OnIceCandidateHdlrFn) {
        self.inner.handlers.on_ice_candidate.set(f).await;
    }

    /// on_ice_gathering_state_change sets an event handler which is invoked when the
    /// ICE candidate gathering state has changed.
    pub async fn on_ice_gathering_state_change(&self, f: OnIceGatheringStateChangeHdlrFn) {
        self.inner.handlers.on_ice_gathering_state_change.set(f).await;
    }

    /// on_ice_connection_state_change sets an event handler which is called
    /// when an ICE connection state is changed.
    pub async fn on_ice_connection_state_change(&self, f: OnICEConnectionStateChangeHdlrFn) {
        self.inner
            .handlers
            .on_ice_connection_state_change
            .set(f)
            .await;
    }

    /// on_peer_connection_state_change sets an event handler which is called
    /// when the PeerConnectionState has changed
    pub async fn on_peer_connection_state_change(&self, f: OnPeerConnectionStateChangeHdlrFn) {
        self.inner
            .handlers
            .on_peer_connection_state_change
            .set(f)
            .await;
    }

    /// on_data_channel sets an event handler which is invoked when a data
    /// channel message arrives from a remote peer.
    pub async fn on_data_channel(&self, f: OnDataChannelHdlrFn) {
        self.inner.handlers.on_data_channel.set(f).await;
    }

    /// on_track sets an event handler which is called once the transports are
    /// up for every negotiated transceiver that receives media.
    pub async fn on_track(&self, f: OnTrackHdlrFn) {
        self.inner.handlers.on_track.set(f).await;
    }

    /// set_configuration updates the configuration of this PeerConnection object.
    ///
    /// Fields left empty or unspecified keep their current value.
    pub async fn set_configuration(&self, configuration: RTCConfiguration) -> Result<()> {
        let mut internal = self.inner.internal.lock().await;
        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-setconfiguration (step #2)
        self.check_closed()?;

        let has_local_description = internal.local_description().is_some();
        configuration.validate_update(&internal.configuration, has_local_description)?;

        if internal.configuration.apply_update(configuration) {
            log::debug!("ICE servers changed, the next local description gathers again");
            self.inner.ice_gatherer.reset().await;
        }
        Ok(())
    }

    /// get_configuration returns a Configuration object representing the current
    /// configuration of this PeerConnection object.
    pub async fn get_configuration(&self) -> RTCConfiguration {
        self.inner.internal.lock().await.configuration.clone()
    }

    /// create_offer starts the PeerConnection and generates the localDescription
    /// <https://w3c.github.io/webrtc-pc/#dom-rtcpeerconnection-createoffer>
    pub async fn create_offer(
        &self,
        options: Option<RTCOfferOptions>,
    ) -> Result<RTCSessionDescription> {
        let mut internal = self.inner.internal.lock().await;
        self.check_closed()?;

        let can_offer = matches!(
            internal.signaling_state,
            RTCSignalingState::Stable | RTCSignalingState::HaveLocalOffer
        );
        if can_offer && options.is_some_and(|o| o.ice_restart) {
            self.inner.transports.ice.restart().await?;
        }

        let ice_params = self.inner.transports.ice.local_parameters().await;
        let fingerprints = certificate_fingerprints(&internal.configuration.certificates);
        internal.generate_offer(&ice_params, &fingerprints)
    }

    /// create_answer starts the PeerConnection and generates the localDescription
    pub async fn create_answer(
        &self,
        _options: Option<RTCAnswerOptions>,
    ) -> Result<RTCSessionDescription> {
        let mut internal = self.inner.internal.lock().await;
        self.check_closed()?;

        let ice_params = self.inner.transports.ice.local_parameters().await;
        let fingerprints = certificate_fingerprints(&internal.configuration.certificates);
        internal.generate_answer(&ice_params, &fingerprints)
    }

    /// set_local_description sets the SessionDescription of the local peer
    ///
    /// An empty `sdp` is replaced by the last created offer or answer. The
    /// first committed local description of a round starts candidate
    /// gathering.
    pub async fn set_local_description(&self, mut desc: RTCSessionDescription) -> Result<()> {
        let mut internal = self.inner.internal.lock().await;
        self.check_closed()?;

        // JSEP 5.4
        if desc.sdp.is_empty() && desc.sdp_type.has_body() {
            desc.sdp = if desc.sdp_type == RTCSdpType::Offer {
                internal.last_offer.clone()
            } else {
                internal.last_answer.clone()
            };
        }

        let next_state = internal.set_description(&mut desc, StateChangeOp::SetLocal)?;
        if desc.sdp_type == RTCSdpType::Answer {
            if let Some(parsed) = desc.parsed() {
                internal.apply_local_answer(parsed);
            }
        }
        self.inner.do_signaling_state_change(next_state);

        if desc.sdp_type == RTCSdpType::Rollback {
            return Ok(());
        }

        let policy = internal.configuration.ice_transport_policy;
        let ice_servers = internal.configuration.get_ice_servers();
        self.inner.ice_gatherer.gather(policy, &ice_servers).await?;

        if desc.sdp_type == RTCSdpType::Answer && internal.current_remote_description.is_some() {
            self.start_transports(&mut internal).await?;
        }
        Ok(())
    }

    /// set_remote_description sets the SessionDescription of the remote peer
    pub async fn set_remote_description(&self, mut desc: RTCSessionDescription) -> Result<()> {
        let mut internal = self.inner.internal.lock().await;
        self.check_closed()?;

        let mut remote_candidates = vec![];
        if desc.sdp_type.has_body() {
            let parsed = internal.decode(&desc.sdp)?;
            if desc.sdp_type == RTCSdpType::Offer {
                PeerConnectionInternal::check_remote_mids(&parsed)?;
            }
            let (_, candidates) = extract_ice_details(&parsed)?;
            extract_fingerprint(&parsed)?;
            remote_candidates = candidates;
            desc.parsed = Some(parsed);
        }

        let next_state = internal.set_description(&mut desc, StateChangeOp::SetRemote)?;
        if let Some(parsed) = desc.parsed() {
            match desc.sdp_type {
                RTCSdpType::Offer => internal.apply_remote_offer(parsed)?,
                RTCSdpType::Answer => internal.apply_remote_answer(parsed),
                _ => {}
            }
        }
        self.inner.do_signaling_state_change(next_state);

        for candidate in remote_candidates {
            log::trace!("adding remote candidate {candidate} from description");
            if let Err(err) = self
                .inner
                .transports
                .ice
                .add_remote_candidate(Some(candidate))
                .await
            {
                log::warn!("failed to add remote candidate: {err}");
            }
        }

        if desc.sdp_type == RTCSdpType::Answer && internal.current_local_description.is_some() {
            self.start_transports(&mut internal).await?;
        }
        Ok(())
    }

    /// Starts ICE, then DTLS, then SCTP in a background task. Runs once per
    /// connection; renegotiation reuses the running transports.
    async fn start_transports(&self, internal: &mut PeerConnectionInternal) -> Result<()> {
        if internal.transports_started {
            return Ok(());
        }

        let remote = internal
            .current_remote_description
            .as_ref()
            .and_then(|d| d.parsed())
            .ok_or(Error::ErrPeerConnRemoteDescriptionNil)?;
        let (remote_ice, _) = extract_ice_details(remote)?;
        let fingerprint = extract_fingerprint(remote)?;
        let ice_role = internal.local_ice_role();
        let dtls_role = internal.local_dtls_role();
        internal.transports_started = true;

        log::debug!("starting transports as ICE {ice_role}, DTLS {dtls_role}");
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            inner
                .run_transports(ice_role, remote_ice, dtls_role, fingerprint)
                .await;
        });

        let mut slot = self.inner.start_transports_task.lock().await;
        if self.inner.is_closed.load(Ordering::SeqCst) {
            task.abort();
        } else {
            *slot = Some(task);
        }
        Ok(())
    }

    /// add_ice_candidate accepts an ICE candidate string and adds it
    /// to the existing set of candidates.
    ///
    /// An empty candidate marks the end of remote candidates.
    pub async fn add_ice_candidate(&self, candidate: RTCIceCandidateInit) -> Result<()> {
        let remote_candidate = {
            let internal = self.inner.internal.lock().await;
            self.check_closed()?;

            let remote = internal
                .remote_description()
                .and_then(|d| d.parsed())
                .ok_or(Error::ErrNoRemoteDescription)?;

            match candidate.sdp_mid.as_deref().filter(|mid| !mid.is_empty()) {
                Some(mid) => {
                    if get_by_mid(mid, remote).is_none() {
                        return Err(Error::ErrIceCandidateMidNotFound);
                    }
                }
                None => {
                    if let Some(index) = candidate.sdp_mline_index {
                        if usize::from(index) >= remote.media_descriptions.len() {
                            return Err(Error::ErrIceCandidateMidNotFound);
                        }
                    }
                }
            }

            let raw = candidate.candidate.trim();
            let raw = raw.strip_prefix(CANDIDATE_PREFIX).unwrap_or(raw).trim();
            if raw.is_empty() {
                None
            } else {
                Some(RTCIceCandidate::unmarshal(raw)?)
            }
        };

        self.inner
            .transports
            .ice
            .add_remote_candidate(remote_candidate)
            .await
    }

    /// add_transceiver_from_kind Create a new RtpTransceiver and adds it to the set of transceivers.
    pub async fn add_transceiver_from_kind(
        &self,
        kind: RtpCodecKind,
        init: Option<RTCRtpTransceiverInit>,
    ) -> Result<RTCRtpTransceiverSnapshot> {
        let mut internal = self.inner.internal.lock().await;
        self.check_closed()?;

        if kind == RtpCodecKind::Unspecified {
            return Err(Error::ErrCodecNotFound);
        }
        let direction = match init.map(|i| i.direction) {
            None | Some(RTCRtpTransceiverDirection::Unspecified) => {
                RTCRtpTransceiverDirection::Sendrecv
            }
            Some(direction) => direction,
        };

        let t = RTCRtpTransceiver::new(kind, direction);
        let snapshot = t.snapshot();
        internal.rtp_transceivers.push(t);
        Ok(snapshot)
    }

    /// create_data_channel creates a new DataChannel object with the given label
    /// and optional DataChannelInit used to configure properties of the
    /// underlying channel such as data reliability.
    ///
    /// Channels created before the transports are up are announced once
    /// they connect.
    pub async fn create_data_channel(
        &self,
        label: &str,
        options: Option<RTCDataChannelInit>,
    ) -> Result<RTCDataChannel> {
        let (data_channel, ready) = {
            let mut internal = self.inner.internal.lock().await;
            // https://w3c.github.io/webrtc-pc/#peer-to-peer-data-api (Step #2)
            self.check_closed()?;

            let params = new_parameters(label, options, || internal.next_data_channel_id())?;
            let data_channel = RTCDataChannel::new(params, RTCDataChannelState::Connecting);
            internal.data_channels.push(data_channel.clone());
            (data_channel, internal.sctp_ready)
        };

        log::debug!(
            "created data channel {} ({})",
            data_channel.id(),
            data_channel.label()
        );
        if ready {
            self.inner.open_data_channel(&data_channel).await;
        }
        Ok(data_channel)
    }

    /// get_transceivers returns a copy of every transceiver, in negotiation order.
    pub async fn get_transceivers(&self) -> Vec<RTCRtpTransceiverSnapshot> {
        self.inner
            .internal
            .lock()
            .await
            .rtp_transceivers
            .iter()
            .map(RTCRtpTransceiver::snapshot)
            .collect()
    }

    /// local_description returns PendingLocalDescription if it is not null and
    /// otherwise it returns CurrentLocalDescription. This property is used to
    /// determine if set_local_description has already been called.
    ///
    /// The returned description embeds the candidates gathered so far.
    pub async fn local_description(&self) -> Option<RTCSessionDescription> {
        let desc = self
            .inner
            .internal
            .lock()
            .await
            .local_description()
            .cloned();
        self.with_local_candidates(desc).await
    }

    /// current_local_description represents the local description that was
    /// successfully negotiated the last time the PeerConnection transitioned
    /// into the stable state plus any local candidates that have been generated
    /// since the offer or answer was created.
    pub async fn current_local_description(&self) -> Option<RTCSessionDescription> {
        let desc = self
            .inner
            .internal
            .lock()
            .await
            .current_local_description
            .clone();
        self.with_local_candidates(desc).await
    }

    /// pending_local_description represents a local description that is in the
    /// process of being negotiated plus any local candidates that have been
    /// generated since the offer or answer was created.
    pub async fn pending_local_description(&self) -> Option<RTCSessionDescription> {
        let desc = self
            .inner
            .internal
            .lock()
            .await
            .pending_local_description
            .clone();
        self.with_local_candidates(desc).await
    }

    /// remote_description returns pending_remote_description if it is not null and
    /// otherwise it returns current_remote_description.
    pub async fn remote_description(&self) -> Option<RTCSessionDescription> {
        self.inner
            .internal
            .lock()
            .await
            .remote_description()
            .cloned()
    }

    pub async fn current_remote_description(&self) -> Option<RTCSessionDescription> {
        self.inner
            .internal
            .lock()
            .await
            .current_remote_description
            .clone()
    }

    pub async fn pending_remote_description(&self) -> Option<RTCSessionDescription> {
        self.inner
            .internal
            .lock()
            .await
            .pending_remote_description
            .clone()
    }

    async fn with_local_candidates(
        &self,
        desc: Option<RTCSessionDescription>,
    ) -> Option<RTCSessionDescription> {
        let mut desc = desc?;
        let candidates = self.inner.ice_gatherer.local_candidates().await;
        let complete = self.inner.ice_gatherer.state() == RTCIceGathererState::Complete;
        if candidates.is_empty() && !complete {
            return Some(desc);
        }

        let Some(mut parsed) = desc.parsed.take() else {
            return Some(desc);
        };
        add_candidates(&mut parsed, &candidates, complete);
        desc.sdp = self.inner.sdp_codec.encode(&parsed);
        desc.parsed = Some(parsed);
        Some(desc)
    }

    /// signaling_state attribute returns the signaling state of the
    /// PeerConnection instance.
    pub fn signaling_state(&self) -> RTCSignalingState {
        self.inner.signaling_state.load(Ordering::SeqCst).into()
    }

    /// ice_connection_state returns the ICE connection state of the
    /// PeerConnection instance.
    pub fn ice_connection_state(&self) -> RTCIceConnectionState {
        self.inner.ice_connection_state.load(Ordering::SeqCst).into()
    }

    /// ice_gathering_state attribute returns the ICE gathering state of the
    /// PeerConnection instance.
    pub fn ice_gathering_state(&self) -> RTCIceGatheringState {
        self.inner.ice_gathering_state.load(Ordering::SeqCst).into()
    }

    /// connection_state attribute returns the connection state of the
    /// PeerConnection instance.
    pub fn connection_state(&self) -> RTCPeerConnectionState {
        self.inner.peer_connection_state.load(Ordering::SeqCst).into()
    }

    /// gathering_complete_promise is a Pion specific helper function that returns a channel that is closed
    /// when gathering is complete.
    /// This function may be helpful in cases where you are unable to trickle your ICE Candidates.
    ///
    /// It is better to not use this function, and instead trickle candidates.
    /// If you use this function you will see longer connection startup times.
    /// When the call is connected you will see no impact however.
    pub async fn gathering_complete_promise(&self) -> mpsc::Receiver<()> {
        self.inner.ice_gatherer.gathering_complete_promise().await
    }

    /// The handshake transport, e.g. to swap its inbound packet matcher.
    pub fn dtls_transport(&self) -> Arc<dyn DtlsTransport> {
        Arc::clone(&self.inner.transports.dtls)
    }

    /// close ends the PeerConnection
    ///
    /// Never waits on a stalled handshake: the transport start task is
    /// aborted and the transports are stopped before anything else. Teardown
    /// errors are logged, and a second call returns `Ok(())`.
    pub async fn close(&self) -> Result<()> {
        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #1, #2)
        if self.inner.is_closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let mut close_errs = vec![];

        self.inner.ice_gatherer.close().await;

        // no transport may be started once teardown begins
        if let Some(task) = self.inner.start_transports_task.lock().await.take() {
            task.abort();
        }

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #6)
        if let Err(err) = self.inner.transports.sctp.stop().await {
            close_errs.push(err);
        }

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #7)
        if let Err(err) = self.inner.transports.dtls.stop().await {
            close_errs.push(err);
        }

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #8, #9, #10)
        if let Err(err) = self.inner.transports.ice.stop().await {
            close_errs.push(err);
        }

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #3, #4, #5)
        {
            let mut internal = self.inner.internal.lock().await;
            internal.signaling_state = RTCSignalingState::Closed;
            for t in &mut internal.rtp_transceivers {
                t.stop();
            }
            for d in &internal.data_channels {
                d.set_ready_state(RTCDataChannelState::Closed);
            }
        }
        self.inner
            .do_signaling_state_change(RTCSignalingState::Closed);

        // https://www.w3.org/TR/webrtc/#dom-rtcpeerconnection-close (step #11)
        self.inner
            .do_ice_connection_state_change(RTCIceConnectionState::Closed);
        self.inner.update_connection_state();

        if let Some(event_loop) = self.inner.event_loop.lock().await.take() {
            event_loop.abort();
        }

        if let Err(err) = flatten_errs(close_errs) {
            log::warn!("errors while closing peer connection: {err}");
        }
        Ok(())
    }
}

impl PeerConnectionInner {
    async fn run_event_loop(
        weak: Weak<PeerConnectionInner>,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        while let Some(event) = events.recv().await {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            inner.handle_transport_event(event).await;
        }
    }

    async fn handle_transport_event(&self, event: TransportEvent) {
        if self.is_closed.load(Ordering::SeqCst) {
            log::trace!("dropping transport event after close: {event:?}");
            return;
        }

        match event {
            TransportEvent::IceConnectionState(state) => {
                self.do_ice_connection_state_change(state);
                self.update_connection_state();
            }
            TransportEvent::DtlsState(state) => {
                log::debug!("DTLS transport state changed: {state}");
                self.dtls_transport_state
                    .store(state as u8, Ordering::SeqCst);
                self.update_connection_state();
            }
            TransportEvent::DataChannelOpened(params) => self.do_remote_data_channel(params).await,
            TransportEvent::LocalCandidate(candidate) => {
                self.handlers.on_ice_candidate.emit(candidate);
            }
            TransportEvent::GathererState(state) => {
                self.do_ice_gathering_state_change(state.into());
            }
        }
    }

    fn do_signaling_state_change(&self, state: RTCSignalingState) {
        self.signaling_state.store(state as u8, Ordering::SeqCst);
        log::info!("signaling state changed to {state}");
        self.handlers.on_signaling_state_change.emit(state);
    }

    fn do_ice_connection_state_change(&self, state: RTCIceConnectionState) {
        if self.ice_connection_state.swap(state as u8, Ordering::SeqCst) == state as u8 {
            return;
        }
        log::info!("ICE connection state changed: {state}");
        self.handlers.on_ice_connection_state_change.emit(state);
    }

    fn do_ice_gathering_state_change(&self, state: RTCIceGatheringState) {
        if self.ice_gathering_state.swap(state as u8, Ordering::SeqCst) == state as u8 {
            return;
        }
        log::info!("ICE gathering state changed: {state}");
        self.handlers.on_ice_gathering_state_change.emit(state);
    }

    /// Aggregates the ICE and DTLS states and reports only real changes.
    ///
    /// Aggregation and emission are serialized, so a state computed before
    /// `close()` can never be reported after `Closed`.
    fn update_connection_state(&self) {
        let _guard = self
            .connection_state_update
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let connection_state = aggregate_connection_state(
            self.is_closed.load(Ordering::SeqCst),
            self.ice_connection_state.load(Ordering::SeqCst).into(),
            self.dtls_transport_state.load(Ordering::SeqCst).into(),
        );

        if self
            .peer_connection_state
            .swap(connection_state as u8, Ordering::SeqCst)
            == connection_state as u8
        {
            return;
        }

        log::info!("peer connection state changed: {connection_state}");
        self.handlers
            .on_peer_connection_state_change
            .emit(connection_state);
    }

    async fn do_remote_data_channel(&self, params: DataChannelParameters) {
        let data_channel = {
            let mut internal = self.internal.lock().await;
            if internal.data_channels.iter().any(|d| d.id() == params.id) {
                log::debug!("data channel {} is already known", params.id);
                return;
            }
            let data_channel = RTCDataChannel::new(params, RTCDataChannelState::Open);
            internal.data_channels.push(data_channel.clone());
            data_channel
        };

        log::debug!(
            "remote opened data channel {} ({})",
            data_channel.id(),
            data_channel.label()
        );
        self.handlers.on_data_channel.emit(data_channel);
    }

    async fn open_data_channel(&self, data_channel: &RTCDataChannel) {
        if !data_channel.negotiated() {
            if let Err(err) = self
                .transports
                .sctp
                .open_channel(data_channel.parameters())
                .await
            {
                log::warn!(
                    "failed to announce data channel {}: {err}",
                    data_channel.id()
                );
                return;
            }
        }
        data_channel.set_ready_state(RTCDataChannelState::Open);
    }

    async fn run_transports(
        self: Arc<Self>,
        ice_role: RTCIceRole,
        remote_ice: RTCIceParameters,
        dtls_role: RTCDtlsRole,
        fingerprint: RTCDtlsFingerprint,
    ) {
        if let Err(err) = self.transports.ice.start(ice_role, remote_ice).await {
            log::warn!("Failed to start ICE agent: {err}");
            return;
        }

        let remote = DTLSParameters {
            role: dtls_role.complement(),
            fingerprints: vec![fingerprint],
        };
        if let Err(err) = self.transports.dtls.start(dtls_role, remote).await {
            log::warn!("Failed to start DTLS transport: {err}");
            return;
        }

        if let Err(err) = self.transports.sctp.start().await {
            log::warn!("Failed to start SCTP transport: {err}");
            return;
        }

        let (pending_channels, tracks) = {
            let mut internal = self.internal.lock().await;
            if self.is_closed.load(Ordering::SeqCst) {
                return;
            }
            internal.sctp_ready = true;

            let pending_channels: Vec<RTCDataChannel> = internal
                .data_channels
                .iter()
                .filter(|d| d.ready_state() == RTCDataChannelState::Connecting)
                .cloned()
                .collect();
            let tracks: Vec<RTCTrackEvent> = internal
                .rtp_transceivers
                .iter()
                .filter(|t| t.mid().is_some() && t.current_direction().has_recv())
                .map(|t| RTCTrackEvent {
                    transceiver: t.snapshot(),
                })
                .collect();
            (pending_channels, tracks)
        };

        for data_channel in &pending_channels {
            self.open_data_channel(data_channel).await;
        }
        for track in tracks {
            self.handlers.on_track.emit(track);
        }
    }
}

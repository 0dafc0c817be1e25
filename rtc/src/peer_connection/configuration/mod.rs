//! Connection configuration and its validation.
//!
//! An [`RTCConfiguration`] is checked once when the connection is created and
//! again, against the live configuration, on every
//! [`set_configuration`](crate::peer_connection::RTCPeerConnection::set_configuration).

pub mod bundle_policy;
pub mod ice_transport_policy;
pub mod media_engine;
pub mod offer_answer_options;
pub mod rtcp_mux_policy;
pub mod setting_engine;

use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::peer_connection::certificate::RTCCertificate;
use crate::peer_connection::transport::ice::server::RTCIceServer;
use bundle_policy::RTCBundlePolicy;
use ice_transport_policy::RTCIceTransportPolicy;
use rtcp_mux_policy::RTCRtcpMuxPolicy;
use shared::error::{Error, Result};

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// A Configuration defines how peer-to-peer communication via PeerConnection
/// is established or re-established.
///
/// Unspecified policies are resolved when the connection is created. When no
/// certificate is given an ECDSA P-256 certificate is generated.
///
/// ## Specifications
///
/// * [W3C]
///
/// [W3C]: https://w3c.github.io/webrtc-pc/#rtcconfiguration-dictionary
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCConfiguration {
    /// Servers available to ICE, such as STUN and TURN servers.
    #[serde(default)]
    pub(crate) ice_servers: Vec<RTCIceServer>,

    /// Which candidates the ICE agent is allowed to use.
    #[serde(default)]
    pub(crate) ice_transport_policy: RTCIceTransportPolicy,

    /// Which media-bundling policy to use when generating descriptions.
    #[serde(default)]
    pub(crate) bundle_policy: RTCBundlePolicy,

    /// Which rtcp-mux policy to use when gathering ICE candidates.
    #[serde(default)]
    pub(crate) rtcp_mux_policy: RTCRtcpMuxPolicy,

    /// Target peer identity. It cannot change once set.
    #[serde(default)]
    pub(crate) peer_identity: String,

    /// Certificates that authenticate the handshake transport. They are fixed
    /// when the connection is created.
    #[serde(skip)]
    pub(crate) certificates: Vec<RTCCertificate>,

    /// Size of the prefetched ICE pool.
    #[serde(default)]
    pub(crate) ice_candidate_pool_size: u8,
}

impl RTCConfiguration {
    pub fn ice_servers(&self) -> &[RTCIceServer] {
        &self.ice_servers
    }

    pub fn ice_transport_policy(&self) -> RTCIceTransportPolicy {
        self.ice_transport_policy
    }

    pub fn bundle_policy(&self) -> RTCBundlePolicy {
        self.bundle_policy
    }

    pub fn rtcp_mux_policy(&self) -> RTCRtcpMuxPolicy {
        self.rtcp_mux_policy
    }

    pub fn peer_identity(&self) -> &str {
        &self.peer_identity
    }

    pub fn certificates(&self) -> &[RTCCertificate] {
        &self.certificates
    }

    pub fn ice_candidate_pool_size(&self) -> u8 {
        self.ice_candidate_pool_size
    }

    /// Checks certificate expiry first, then every ICE server.
    pub(crate) fn validate(&self) -> Result<()> {
        let now = SystemTime::now();
        for certificate in &self.certificates {
            if certificate.is_expired(now) {
                return Err(Error::ErrCertificateExpired);
            }
        }

        for server in &self.ice_servers {
            server.validate()?;
        }

        Ok(())
    }

    /// Validates `self` as a replacement for `current`, following the W3C
    /// set-the-configuration steps. Nothing is modified.
    pub(crate) fn validate_update(
        &self,
        current: &RTCConfiguration,
        has_local_description: bool,
    ) -> Result<()> {
        self.validate()?;

        if !self.certificates.is_empty() && self.certificates != current.certificates {
            return Err(Error::ErrModifyingCertificates);
        }

        if !self.peer_identity.is_empty() && self.peer_identity != current.peer_identity {
            return Err(Error::ErrModifyingPeerIdentity);
        }

        if self.bundle_policy != RTCBundlePolicy::Unspecified
            && self.bundle_policy != current.bundle_policy
        {
            return Err(Error::ErrModifyingBundlePolicy);
        }

        if self.rtcp_mux_policy != RTCRtcpMuxPolicy::Unspecified
            && self.rtcp_mux_policy != current.rtcp_mux_policy
        {
            return Err(Error::ErrModifyingRTCPMuxPolicy);
        }

        if self.ice_candidate_pool_size != 0
            && self.ice_candidate_pool_size != current.ice_candidate_pool_size
            && has_local_description
        {
            return Err(Error::ErrModifyingICECandidatePoolSize);
        }

        Ok(())
    }

    /// Copies the specified fields of a validated `update` into `self`.
    /// Certificates are never replaced. Returns whether the ICE server list
    /// changed.
    pub(crate) fn apply_update(&mut self, update: RTCConfiguration) -> bool {
        if update.ice_transport_policy != RTCIceTransportPolicy::Unspecified {
            self.ice_transport_policy = update.ice_transport_policy;
        }
        if update.ice_candidate_pool_size != 0 {
            self.ice_candidate_pool_size = update.ice_candidate_pool_size;
        }
        if !update.peer_identity.is_empty() {
            self.peer_identity = update.peer_identity;
        }

        if !update.ice_servers.is_empty() && update.ice_servers != self.ice_servers {
            self.ice_servers = update.ice_servers;
            true
        } else {
            false
        }
    }

    /// Resolves unspecified policies to their W3C defaults.
    pub(crate) fn resolve_defaults(&mut self) {
        self.ice_transport_policy = self.ice_transport_policy.resolve();
        self.bundle_policy = self.bundle_policy.resolve();
        self.rtcp_mux_policy = self.rtcp_mux_policy.resolve();
    }

    /// get_ice_servers side-steps the strict parsing mode of the ice package
    /// (as defined in https://tools.ietf.org/html/rfc7064) by copying and then
    /// stripping any erroneous queries from "stun(s):" URLs before parsing.
    pub(crate) fn get_ice_servers(&self) -> Vec<RTCIceServer> {
        let mut ice_servers = self.ice_servers.clone();

        for ice_server in &mut ice_servers {
            for raw_url in &mut ice_server.urls {
                if raw_url.starts_with("stun") {
                    if let Some((stripped, _)) = raw_url.split_once('?') {
                        *raw_url = stripped.to_owned();
                    }
                }
            }
        }

        ice_servers
    }
}

#[derive(Default)]
pub struct RTCConfigurationBuilder {
    ice_servers: Vec<RTCIceServer>,
    ice_transport_policy: RTCIceTransportPolicy,
    bundle_policy: RTCBundlePolicy,
    rtcp_mux_policy: RTCRtcpMuxPolicy,
    peer_identity: String,
    certificates: Vec<RTCCertificate>,
    ice_candidate_pool_size: u8,
}

impl RTCConfigurationBuilder {
    pub fn new() -> Self {
        RTCConfigurationBuilder::default()
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<RTCIceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_ice_transport_policy(
        mut self,
        ice_transport_policy: RTCIceTransportPolicy,
    ) -> Self {
        self.ice_transport_policy = ice_transport_policy;
        self
    }

    pub fn with_bundle_policy(mut self, bundle_policy: RTCBundlePolicy) -> Self {
        self.bundle_policy = bundle_policy;
        self
    }

    pub fn with_rtcp_mux_policy(mut self, rtcp_mux_policy: RTCRtcpMuxPolicy) -> Self {
        self.rtcp_mux_policy = rtcp_mux_policy;
        self
    }

    pub fn with_peer_identity(mut self, peer_identity: String) -> Self {
        self.peer_identity = peer_identity;
        self
    }

    pub fn with_certificates(mut self, certificates: Vec<RTCCertificate>) -> Self {
        self.certificates = certificates;
        self
    }

    pub fn with_ice_candidate_pool_size(mut self, ice_candidate_pool_size: u8) -> Self {
        self.ice_candidate_pool_size = ice_candidate_pool_size;
        self
    }

    pub fn build(self) -> RTCConfiguration {
        RTCConfiguration {
            ice_servers: self.ice_servers,
            ice_transport_policy: self.ice_transport_policy,
            bundle_policy: self.bundle_policy,
            rtcp_mux_policy: self.rtcp_mux_policy,
            peer_identity: self.peer_identity,
            certificates: self.certificates,
            ice_candidate_pool_size: self.ice_candidate_pool_size,
        }
    }
}

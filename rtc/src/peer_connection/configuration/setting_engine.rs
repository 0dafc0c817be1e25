//! Non-standard knobs for a peer connection.
//!
//! A [`SettingEngine`] is handed to
//! [`APIBuilder::with_setting_engine`](crate::api::APIBuilder::with_setting_engine)
//! and is immutable from then on; every connection created by that API shares it.

use std::time::Duration;

use crate::peer_connection::transport::dtls::role::{DEFAULT_DTLS_ROLE_ANSWER, RTCDtlsRole};
use shared::error::{Error, Result};

pub(crate) const DEFAULT_ICE_DISCONNECTED_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const DEFAULT_ICE_FAILED_TIMEOUT: Duration = Duration::from_secs(25);
pub(crate) const DEFAULT_ICE_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(2);
pub(crate) const DEFAULT_DTLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection health and handshake timers.
#[derive(Default, Debug, Clone)]
pub struct Timeout {
    /// Duration without network activity before ICE is considered disconnected.
    /// Default: 5 seconds.
    pub ice_disconnected_timeout: Option<Duration>,

    /// Duration without network activity before ICE is considered failed.
    /// Also bounds the initial connectivity checks. Default: 25 seconds.
    pub ice_failed_timeout: Option<Duration>,

    /// How often ICE sends keepalive packets. Default: 2 seconds.
    pub ice_keepalive_interval: Option<Duration>,

    /// How long a DTLS handshake may run before the transport fails.
    /// Default: 30 seconds.
    pub dtls_handshake_timeout: Option<Duration>,
}

/// Candidate gathering configuration.
#[derive(Default, Debug, Clone)]
pub struct Candidates {
    /// Static ICE username fragment for reproducible sessions.
    pub username_fragment: String,

    /// Static ICE password for reproducible sessions.
    pub password: String,

    /// Allow gathering loopback candidates.
    /// Note: This is non-standard per RFC 8445.
    pub include_loopback_candidate: bool,
}

/// Fine-grained control over behavior the W3C API does not expose.
///
/// ```
/// use rtc_peer::peer_connection::configuration::setting_engine::SettingEngine;
/// use rtc_peer::peer_connection::transport::RTCDtlsRole;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut setting_engine = SettingEngine::default();
/// setting_engine.set_trickle(true);
/// setting_engine.set_answering_dtls_role(RTCDtlsRole::Server)?;
/// setting_engine.set_ice_timeouts(
///     Some(Duration::from_secs(10)),
///     Some(Duration::from_secs(30)),
///     Some(Duration::from_secs(3)),
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SettingEngine {
    pub(crate) timeout: Timeout,
    pub(crate) candidates: Candidates,
    pub(crate) trickle: bool,
    pub(crate) sdp_media_level_fingerprints: bool,
    pub(crate) answering_dtls_role: RTCDtlsRole,
}

impl Default for SettingEngine {
    fn default() -> Self {
        SettingEngine {
            timeout: Timeout::default(),
            candidates: Candidates::default(),
            trickle: false,
            sdp_media_level_fingerprints: false,
            answering_dtls_role: DEFAULT_DTLS_ROLE_ANSWER,
        }
    }
}

impl SettingEngine {
    /// Controls candidate delivery.
    ///
    /// When `true` every local candidate reaches `on_ice_candidate` as soon
    /// as it is found. When `false` (the default) nothing is delivered until
    /// gathering completes, and the local description embeds every candidate.
    pub fn set_trickle(&mut self, trickle: bool) {
        self.trickle = trickle;
    }

    /// Configures ICE timeout behavior for connection health monitoring.
    ///
    /// * `disconnected_timeout` - Duration without activity before considered disconnected (default: 5s)
    /// * `failed_timeout` - Duration without activity before considered failed (default: 25s)
    /// * `keep_alive_interval` - How often to send keepalives when idle (default: 2s)
    pub fn set_ice_timeouts(
        &mut self,
        disconnected_timeout: Option<Duration>,
        failed_timeout: Option<Duration>,
        keep_alive_interval: Option<Duration>,
    ) {
        self.timeout.ice_disconnected_timeout = disconnected_timeout;
        self.timeout.ice_failed_timeout = failed_timeout;
        self.timeout.ice_keepalive_interval = keep_alive_interval;
    }

    /// Bounds the DTLS handshake. A handshake still running when it elapses
    /// moves the transport to `failed`.
    pub fn set_dtls_handshake_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout.dtls_handshake_timeout = timeout;
    }

    /// Sets the DTLS role used when answering.
    ///
    /// Only [`RTCDtlsRole::Client`] (the default, `a=setup:active`) and
    /// [`RTCDtlsRole::Server`] (`a=setup:passive`) are accepted.
    ///
    /// - [RFC 8842 - DTLS for WebRTC](https://datatracker.ietf.org/doc/html/rfc8842)
    pub fn set_answering_dtls_role(&mut self, role: RTCDtlsRole) -> Result<()> {
        if role != RTCDtlsRole::Client && role != RTCDtlsRole::Server {
            return Err(Error::ErrSettingEngineSetAnsweringDTLSRole);
        }

        self.answering_dtls_role = role;
        Ok(())
    }

    /// Sets static ICE credentials instead of random ones.
    pub fn set_ice_credentials(&mut self, username_fragment: String, password: String) {
        self.candidates.username_fragment = username_fragment;
        self.candidates.password = password;
    }

    /// Allows loopback addresses among the gathered candidates.
    ///
    /// This is non-standard behavior per [RFC 8445 §5.1.1.1](https://www.rfc-editor.org/rfc/rfc8445#section-5.1.1.1).
    pub fn set_include_loopback_candidate(&mut self, allow_loopback: bool) {
        self.candidates.include_loopback_candidate = allow_loopback;
    }

    /// Puts the DTLS fingerprint on every media section instead of once at
    /// session level.
    pub fn set_sdp_media_level_fingerprints(&mut self, sdp_media_level_fingerprints: bool) {
        self.sdp_media_level_fingerprints = sdp_media_level_fingerprints;
    }

    pub(crate) fn ice_disconnected_timeout(&self) -> Duration {
        self.timeout
            .ice_disconnected_timeout
            .unwrap_or(DEFAULT_ICE_DISCONNECTED_TIMEOUT)
    }

    pub(crate) fn ice_failed_timeout(&self) -> Duration {
        self.timeout
            .ice_failed_timeout
            .unwrap_or(DEFAULT_ICE_FAILED_TIMEOUT)
    }

    pub(crate) fn ice_keepalive_interval(&self) -> Duration {
        self.timeout
            .ice_keepalive_interval
            .unwrap_or(DEFAULT_ICE_KEEPALIVE_INTERVAL)
    }

    pub(crate) fn dtls_handshake_timeout(&self) -> Duration {
        self.timeout
            .dtls_handshake_timeout
            .unwrap_or(DEFAULT_DTLS_HANDSHAKE_TIMEOUT)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_set_answering_dtls_role() {
        let tests = vec![
            (RTCDtlsRole::Unspecified, false),
            (RTCDtlsRole::Auto, false),
            (RTCDtlsRole::Client, true),
            (RTCDtlsRole::Server, true),
        ];

        for (role, ok) in tests {
            let mut s = SettingEngine::default();
            let result = s.set_answering_dtls_role(role);
            assert_eq!(result.is_ok(), ok, "{role}");
            if ok {
                assert_eq!(s.answering_dtls_role, role);
            } else {
                assert_eq!(result, Err(Error::ErrSettingEngineSetAnsweringDTLSRole));
                assert_eq!(s.answering_dtls_role, DEFAULT_DTLS_ROLE_ANSWER);
            }
        }
    }

    #[test]
    fn test_set_ice_timeouts() {
        let mut s = SettingEngine::default();
        assert_eq!(s.ice_disconnected_timeout(), DEFAULT_ICE_DISCONNECTED_TIMEOUT);
        assert_eq!(s.ice_failed_timeout(), DEFAULT_ICE_FAILED_TIMEOUT);
        assert_eq!(s.ice_keepalive_interval(), DEFAULT_ICE_KEEPALIVE_INTERVAL);

        s.set_ice_timeouts(
            Some(Duration::from_secs(1)),
            Some(Duration::from_secs(2)),
            Some(Duration::from_secs(3)),
        );
        assert_eq!(s.ice_disconnected_timeout(), Duration::from_secs(1));
        assert_eq!(s.ice_failed_timeout(), Duration::from_secs(2));
        assert_eq!(s.ice_keepalive_interval(), Duration::from_secs(3));

        s.set_dtls_handshake_timeout(Some(Duration::from_millis(500)));
        assert_eq!(s.dtls_handshake_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_defaults() {
        let s = SettingEngine::default();
        assert!(!s.trickle);
        assert!(!s.sdp_media_level_fingerprints);
        assert!(!s.candidates.include_loopback_candidate);
        assert_eq!(s.answering_dtls_role, RTCDtlsRole::Client);
    }
}

#![allow(dead_code)]

use std::io;
use std::num::ParseIntError;
use std::time::SystemTimeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: closed")]
    ErrBufferClosed,
    #[error("i/o timeout")]
    ErrTimeout,
    #[error("already closed")]
    ErrAlreadyClosed,

    // ICE
    #[error("invalid url")]
    ErrInvalidUrl,
    #[error("unknown scheme type")]
    ErrSchemeType,
    #[error("invalid hostname")]
    ErrHost,
    #[error("attribute not long enough to be ICE candidate")]
    ErrAttributeTooShortIceCandidate,
    #[error("could not parse component")]
    ErrParseComponent,
    #[error("could not parse priority")]
    ErrParsePriority,
    #[error("could not parse port")]
    ErrParsePort,
    #[error("could not parse related addresses")]
    ErrParseRelatedAddr,
    #[error("could not parse type")]
    ErrParseType,
    #[error("unknown candidate type")]
    ErrUnknownCandidateType,
    #[error("ICE agent is closed")]
    ErrIceAgentClosed,
    #[error("connectivity checks timed out")]
    ErrIceConnectivityTimeout,
    #[error("Max Data Channel ID")]
    ErrMaxDataChannelID,

    //RTC
    /// ErrConnectionClosed indicates an operation executed after connection
    /// has already been closed.
    #[error("connection closed")]
    ErrConnectionClosed,

    /// ErrDataChannelClosed indicates an operation executed when the data
    /// channel is not (yet) open or closed.
    #[error("data channel closed")]
    ErrDataChannelClosed,

    /// ErrCertificateExpired indicates that an x509 certificate has expired.
    #[error("x509Cert expired")]
    ErrCertificateExpired,

    /// ErrNoTurnCredentials indicates that a TURN server URL was provided
    /// without required credentials.
    #[error("turn server credentials required")]
    ErrNoTurnCredentials,

    /// ErrTurnCredentials indicates that provided TURN credentials are partial
    /// or malformed.
    #[error("invalid turn server credentials")]
    ErrTurnCredentials,

    /// ErrPrivateKeyType indicates that a particular private key encryption
    /// chosen to generate a certificate is not supported.
    #[error("private key type not supported")]
    ErrPrivateKeyType,

    /// ErrModifyingPeerIdentity indicates that an attempt to modify
    /// PeerIdentity was made after PeerConnection has been initialized.
    #[error("peerIdentity cannot be modified")]
    ErrModifyingPeerIdentity,

    /// ErrModifyingCertificates indicates that an attempt to modify
    /// Certificates was made after PeerConnection has been initialized.
    #[error("certificates cannot be modified")]
    ErrModifyingCertificates,

    /// ErrNonCertificate indicates that there is no certificate
    #[error("no certificate")]
    ErrNonCertificate,

    /// ErrModifyingBundlePolicy indicates that an attempt to modify
    /// BundlePolicy was made after PeerConnection has been initialized.
    #[error("bundle policy cannot be modified")]
    ErrModifyingBundlePolicy,

    /// ErrModifyingRTCPMuxPolicy indicates that an attempt to modify
    /// RTCPMuxPolicy was made after PeerConnection has been initialized.
    #[error("rtcp mux policy cannot be modified")]
    ErrModifyingRTCPMuxPolicy,

    /// ErrModifyingICECandidatePoolSize indicates that an attempt to modify
    /// ICECandidatePoolSize was made after PeerConnection has been initialized.
    #[error("ice candidate pool size cannot be modified")]
    ErrModifyingICECandidatePoolSize,

    /// ErrStringSizeLimit indicates that the character size limit of string is
    /// exceeded. The limit is hardcoded to 65535 according to specifications.
    #[error("data channel label exceeds size limit")]
    ErrStringSizeLimit,

    /// ErrNegotiatedWithoutID indicates that an attempt to create a data channel
    /// was made while setting the negotiated option to true without providing
    /// the negotiated channel ID.
    #[error("negotiated set without channel id")]
    ErrNegotiatedWithoutID,

    /// ErrRetransmitsOrPacketLifeTime indicates that an attempt to create a data
    /// channel was made with both options max_packet_life_time and max_retransmits
    /// set together.
    #[error("both max_packet_life_time and max_retransmits was set")]
    ErrRetransmitsOrPacketLifeTime,

    /// ErrCodecNotFound is returned when a codec search to the Media Engine fails
    #[error("codec not found")]
    ErrCodecNotFound,

    /// ErrNoRemoteDescription indicates that an operation was rejected because
    /// the remote description is not set
    #[error("remote description is not set")]
    ErrNoRemoteDescription,

    /// ErrIncorrectSignalingState indicates that the signaling state of PeerConnection is not correct
    #[error("operation can not be run in current signaling state")]
    ErrIncorrectSignalingState,

    /// ErrProtocolTooLarge indicates that value given for a DataChannelInit protocol is
    /// longer then 65535 bytes
    #[error("protocol is larger then 65535 bytes")]
    ErrProtocolTooLarge,

    /// ErrIceCandidateMidNotFound indicates that a remote candidate references
    /// a media section that the remote description does not contain.
    #[error("no media section matches the candidate sdp_mid")]
    ErrIceCandidateMidNotFound,

    #[error("the DTLS transport has not started yet")]
    ErrDtlsTransportNotStarted,
    #[error("attempted to start DTLSTransport that is not in new state")]
    ErrInvalidDTLSStart,
    #[error("remote certificate does not match any fingerprint")]
    ErrNoMatchingCertificateFingerprint,
    #[error("unsupported fingerprint algorithm")]
    ErrUnsupportedFingerprintAlgorithm,
    #[error("DTLS handshake timed out")]
    ErrDtlsHandshakeTimeout,
    #[error("ICE connection not started")]
    ErrICEConnectionNotStarted,
    #[error("unknown candidate type")]
    ErrICECandidateTypeUnknown,
    #[error("unknown ICE Role")]
    ErrICERoleUnknown,
    #[error("unknown protocol")]
    ErrICEProtocolUnknown,
    #[error("gatherer not started")]
    ErrICEGathererNotStarted,
    #[error("new sdp does not match previous offer")]
    ErrSDPDoesNotMatchOffer,
    #[error("new sdp does not match previous answer")]
    ErrSDPDoesNotMatchAnswer,
    #[error("provided value is not a valid enum value of type SDPType")]
    ErrPeerConnSDPTypeInvalidValue,
    #[error("invalid state change op")]
    ErrPeerConnStateChangeInvalid,
    #[error("unhandled state change op")]
    ErrPeerConnStateChangeUnhandled,
    #[error("remoteDescription contained media section without mid value")]
    ErrPeerConnRemoteDescriptionWithoutMidValue,
    #[error("remoteDescription has not been set yet")]
    ErrPeerConnRemoteDescriptionNil,
    #[error("localDescription has not been set yet")]
    ErrPeerConnLocalDescriptionNil,
    #[error("cannot find transceiver with mid")]
    ErrPeerConnTransceiverMidNil,
    #[error("cannot change the mid of a negotiated transceiver")]
    ErrRTPTransceiverCannotChangeMid,
    #[error("DTLS not established")]
    ErrSCTPTransportDTLS,
    #[error("set_answering_dtlsrole must DTLSRoleClient or DTLSRoleServer")]
    ErrSettingEngineSetAnsweringDTLSRole,
    #[error("can't rollback from stable state")]
    ErrSignalingStateCannotRollback,
    #[error("invalid proposed signaling state transition: {0}")]
    ErrSignalingStateProposedTransitionInvalid(String),
    #[error("ICETransport can only be called in ICETransportStateNew")]
    ErrICETransportNotInNew,
    #[error("remote description is missing a fingerprint")]
    ErrSessionDescriptionNoFingerprint,
    #[error("remote description has an invalid fingerprint")]
    ErrSessionDescriptionInvalidFingerprint,
    #[error("remote description has conflicting fingerprints")]
    ErrSessionDescriptionConflictingFingerprints,
    #[error("remote description is missing ice-ufrag")]
    ErrSessionDescriptionMissingIceUfrag,
    #[error("remote description is missing ice-pwd")]
    ErrSessionDescriptionMissingIcePwd,
    #[error("remote description has conflicting ice-ufrag values")]
    ErrSessionDescriptionConflictingIceUfrag,
    #[error("remote description has conflicting ice-pwd values")]
    ErrSessionDescriptionConflictingIcePwd,

    //Third Party Error
    #[error("{0}")]
    RcGen(#[from] rcgen::Error),
    #[error("parse int: {0}")]
    ParseInt(#[from] ParseIntError),
    #[error("{0}")]
    Io(#[source] IoError),
    #[error("url parse: {0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Std(#[source] StdError),

    //Other Errors
    #[error("Other ICE Err: {0}")]
    OtherIceErr(String),
    #[error("Other DTLS Err: {0}")]
    OtherDtlsErr(String),
    #[error("Other SCTP Err: {0}")]
    OtherSctpErr(String),
    #[error("Other SDP Err: {0}")]
    OtherSdpErr(String),
    #[error("Other PeerConnection Err: {0}")]
    OtherPeerConnectionErr(String),
    #[error("{0}")]
    Other(String),
}

/// ErrorKind groups errors by the DOMException name a W3C API would raise for them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or unsafe input, e.g. an expired certificate.
    InvalidAccess,
    /// An attempt to change a field that is immutable once the connection exists.
    InvalidModification,
    /// The operation is illegal in the current signaling or connection state.
    InvalidState,
    /// A referenced object does not exist.
    NotFound,
    /// Unparsable input.
    Syntax,
    /// A collaborator failed while performing the operation.
    Operation,
    Unknown,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ErrCertificateExpired
            | Error::ErrNoTurnCredentials
            | Error::ErrTurnCredentials
            | Error::ErrPrivateKeyType => ErrorKind::InvalidAccess,

            Error::ErrModifyingPeerIdentity
            | Error::ErrModifyingCertificates
            | Error::ErrModifyingBundlePolicy
            | Error::ErrModifyingRTCPMuxPolicy
            | Error::ErrModifyingICECandidatePoolSize => ErrorKind::InvalidModification,

            Error::ErrConnectionClosed
            | Error::ErrDataChannelClosed
            | Error::ErrNoRemoteDescription
            | Error::ErrIncorrectSignalingState
            | Error::ErrSDPDoesNotMatchOffer
            | Error::ErrSDPDoesNotMatchAnswer
            | Error::ErrPeerConnStateChangeInvalid
            | Error::ErrPeerConnStateChangeUnhandled
            | Error::ErrPeerConnRemoteDescriptionNil
            | Error::ErrPeerConnLocalDescriptionNil
            | Error::ErrSignalingStateCannotRollback
            | Error::ErrSignalingStateProposedTransitionInvalid(_)
            | Error::ErrDtlsTransportNotStarted
            | Error::ErrInvalidDTLSStart
            | Error::ErrICETransportNotInNew
            | Error::ErrICEConnectionNotStarted
            | Error::ErrICEGathererNotStarted
            | Error::ErrRTPTransceiverCannotChangeMid => ErrorKind::InvalidState,

            Error::ErrIceCandidateMidNotFound
            | Error::ErrPeerConnTransceiverMidNil
            | Error::ErrCodecNotFound => ErrorKind::NotFound,

            Error::ErrInvalidUrl
            | Error::ErrSchemeType
            | Error::ErrHost
            | Error::Url(_)
            | Error::ParseInt(_)
            | Error::ErrAttributeTooShortIceCandidate
            | Error::ErrParseComponent
            | Error::ErrParsePriority
            | Error::ErrParsePort
            | Error::ErrParseRelatedAddr
            | Error::ErrParseType
            | Error::ErrUnknownCandidateType
            | Error::ErrICECandidateTypeUnknown
            | Error::ErrICEProtocolUnknown
            | Error::ErrPeerConnSDPTypeInvalidValue
            | Error::ErrPeerConnRemoteDescriptionWithoutMidValue
            | Error::ErrSessionDescriptionNoFingerprint
            | Error::ErrSessionDescriptionInvalidFingerprint
            | Error::ErrSessionDescriptionConflictingFingerprints
            | Error::ErrSessionDescriptionMissingIceUfrag
            | Error::ErrSessionDescriptionMissingIcePwd
            | Error::ErrSessionDescriptionConflictingIceUfrag
            | Error::ErrSessionDescriptionConflictingIcePwd
            | Error::OtherSdpErr(_) => ErrorKind::Syntax,

            Error::ErrNonCertificate
            | Error::ErrStringSizeLimit
            | Error::ErrNegotiatedWithoutID
            | Error::ErrRetransmitsOrPacketLifeTime
            | Error::ErrProtocolTooLarge
            | Error::ErrMaxDataChannelID
            | Error::ErrSettingEngineSetAnsweringDTLSRole
            | Error::ErrNoMatchingCertificateFingerprint
            | Error::ErrUnsupportedFingerprintAlgorithm
            | Error::ErrDtlsHandshakeTimeout
            | Error::ErrSCTPTransportDTLS
            | Error::ErrIceAgentClosed
            | Error::ErrIceConnectivityTimeout
            | Error::RcGen(_)
            | Error::Io(_)
            | Error::OtherIceErr(_)
            | Error::OtherDtlsErr(_)
            | Error::OtherSctpErr(_) => ErrorKind::Operation,

            _ => ErrorKind::Unknown,
        }
    }

    pub fn from_std<T>(error: T) -> Self
    where
        T: std::error::Error + Send + Sync + 'static,
    {
        Error::Std(StdError(Box::new(error)))
    }

    pub fn downcast_ref<T: std::error::Error + 'static>(&self) -> Option<&T> {
        if let Error::Std(s) = self {
            return s.0.downcast_ref();
        }

        None
    }
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

/// An escape hatch to preserve the source of an error that has no variant of its own.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StdError(pub Box<dyn std::error::Error + Send + Sync>);

impl PartialEq for StdError {
    fn eq(&self, _: &Self) -> bool {
        false
    }
}

impl From<SystemTimeError> for Error {
    fn from(e: SystemTimeError) -> Self {
        Error::Other(e.to_string())
    }
}

/// flatten_errs flattens multiple errors into one
pub fn flatten_errs(errs: Vec<impl Into<Error>>) -> Result<()> {
    if errs.is_empty() {
        Ok(())
    } else {
        let errs_strs: Vec<String> = errs.into_iter().map(|e| e.into().to_string()).collect();
        Err(Error::Other(errs_strs.join("\n")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_error_kind() {
        let tests = vec![
            (Error::ErrCertificateExpired, ErrorKind::InvalidAccess),
            (Error::ErrNoTurnCredentials, ErrorKind::InvalidAccess),
            (Error::ErrModifyingCertificates, ErrorKind::InvalidModification),
            (Error::ErrModifyingBundlePolicy, ErrorKind::InvalidModification),
            (Error::ErrConnectionClosed, ErrorKind::InvalidState),
            (Error::ErrNoRemoteDescription, ErrorKind::InvalidState),
            (
                Error::ErrSignalingStateProposedTransitionInvalid("x".to_owned()),
                ErrorKind::InvalidState,
            ),
            (Error::ErrIceCandidateMidNotFound, ErrorKind::NotFound),
            (Error::ErrSchemeType, ErrorKind::Syntax),
            (Error::ErrDtlsHandshakeTimeout, ErrorKind::Operation),
            (Error::Other("x".to_owned()), ErrorKind::Unknown),
        ];

        for (err, expected) in tests {
            assert_eq!(err.kind(), expected, "{err}");
        }
    }

    #[test]
    fn test_flatten_errs() {
        assert_eq!(flatten_errs(Vec::<Error>::new()), Ok(()));

        let result = flatten_errs(vec![Error::ErrConnectionClosed, Error::ErrAlreadyClosed]);
        assert_eq!(
            result,
            Err(Error::Other("connection closed\nalready closed".to_owned()))
        );
    }

    #[test]
    fn test_io_error_eq_by_kind() {
        let a: Error = io::Error::new(io::ErrorKind::TimedOut, "a").into();
        let b: Error = io::Error::new(io::ErrorKind::TimedOut, "b").into();
        assert_eq!(a, b);
        assert_eq!(a.kind(), ErrorKind::Operation);
    }
}

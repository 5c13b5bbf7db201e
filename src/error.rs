use crate::asn1::constants::errors::KrbErrorCode;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KrbError {
    // =========================================================================================
    // IMPORTANT: Don't add variables to variants in this  enum - it's a potential security risk
    // as you can leak internal state in an error as these can end up in userfacing contexts!!!
    //
    // In other words, any extra information you add here is a potential CVE.
    //
    // If you want to debug the error, then use the error! macro at the error raise site to
    // report relevant information.
    //
    // The single exception is KdcError, which carries the error code the KDC already sent us
    // on the wire. Callers need it to tell a missing principal apart from an outage.
    // =========================================================================================
    InvalidHmacSha1Key,
    InvalidHmacMd5Key,
    MessageAuthenticationFailed,
    MessageEmpty,
    InsufficientData,
    PlaintextEmpty,
    CtsCiphertextInvalid,
    UnsupportedEncryption,
    UnsupportedChecksumType,

    // Token extraction
    MalformedToken,

    DerDecodeApReq,
    DerDecodeAuthenticator,
    DerDecodeEncTicketPart,
    DerDecodeEncKdcRepPart,
    DerDecodeKdcReply,
    DerDecodeKdcReqBody,
    DerDecodeTicket,
    DerEncodeApReq,
    DerEncodeAuthenticator,
    DerEncodeAny,
    DerEncodeOctetString,
    DerEncodeKdcReq,
    DerEncodeKdcReqBody,
    DerEncodeKerberosString,
    DerEncodeKerberosTime,
    DerEncodePaForUser,
    DerEncodeTicket,

    // Key resolution
    EmptyCredentialSet,
    NoMatchingKey,

    // Ticket validation
    ClockSkew,
    TicketExpired,
    TicketNotYetValid,
    AuthenticatorMismatch,
    InvalidTicketTimes,
    InvalidPvno,
    InvalidMessageType,
    SessionKeyEtypeMismatch,

    // KDC exchanges
    NoTgt,
    KdcError(KrbErrorCode),
    KdcErrorUnknown,
    KdcReplyNonceMismatch,
    KdcReplyUnexpected,
    DelegationNotPermitted,
    NetworkError,
    NetworkTimeout,
    RequestTooLarge,

    // Names
    PrincipalNameEmpty,
    PrincipalNameInvalidComponents,
    PrincipalNameInvalidRealm,

    // Storage
    CredentialCacheWrite,
    CredentialCacheRead,
    CredentialCachePathInvalid,
    UnsupportedCredentialCacheType,
    KeytabFileError,
    UnsupportedKeytabType,
    ConfigInvalid,

    /// No really, do you have a time machine? How did you go back to before 1970?
    DoYouHaveATimeMachine,
}

impl fmt::Display for KrbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KrbError::MalformedToken => write!(f, "negotiate token does not contain an AP-REQ"),
            KrbError::NoMatchingKey => write!(f, "no service key matches the ticket encryption"),
            KrbError::EmptyCredentialSet => write!(f, "the service credential set holds no keys"),
            KrbError::ClockSkew => write!(f, "authenticator is outside the allowed clock skew"),
            KrbError::TicketExpired => write!(f, "client ticket has expired"),
            KrbError::TicketNotYetValid => write!(f, "client ticket is not yet valid"),
            KrbError::AuthenticatorMismatch => write!(f, "authenticator failed verification"),
            KrbError::NoTgt => write!(f, "no ticket granting ticket is available"),
            KrbError::KdcError(code) => write!(f, "kdc rejected the request: {:?}", code),
            KrbError::DelegationNotPermitted => {
                write!(f, "kdc policy does not permit delegation to this service")
            }
            KrbError::NetworkError => write!(f, "unable to reach the kdc"),
            KrbError::NetworkTimeout => write!(f, "timed out waiting for the kdc"),
            KrbError::CredentialCacheWrite => write!(f, "unable to write credential cache"),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for KrbError {}

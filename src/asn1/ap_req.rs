use super::constants::KrbMessageType;
use super::{ap_options::ApOptions, encrypted_data::EncryptedData, tagged_ticket::TaggedTicket};
use der::Sequence;

/// ```text
/// AP-REQ          ::= [APPLICATION 14] SEQUENCE {
///            pvno            [0] INTEGER (5),
///            msg-type        [1] INTEGER (14),
///            ap-options      [2] APOptions,
///            ticket          [3] Ticket,
///            authenticator   [4] EncryptedData -- Authenticator
///    }
///```
#[derive(Debug, Clone, Eq, PartialEq, Sequence)]
pub(crate) struct ApReqInner {
    #[asn1(context_specific = "0")]
    pub(crate) pvno: u8,
    #[asn1(context_specific = "1")]
    pub(crate) msg_type: u8,
    #[asn1(context_specific = "2")]
    pub(crate) ap_options: ApOptions,
    #[asn1(context_specific = "3")]
    pub(crate) ticket: TaggedTicket,
    #[asn1(context_specific = "4")]
    pub(crate) authenticator: EncryptedData,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ApReq(pub(crate) ApReqInner);

application_tagged!(ApReq, ApReqInner, 14);

impl ApReq {
    pub fn new(ap_options: ApOptions, ticket: TaggedTicket, authenticator: EncryptedData) -> Self {
        Self(ApReqInner {
            pvno: 5,
            msg_type: KrbMessageType::KrbApReq.into(),
            ap_options,
            ticket,
            authenticator,
        })
    }
}

impl From<ApReq> for ApReqInner {
    fn from(value: ApReq) -> ApReqInner {
        value.0
    }
}

use crate::asn1::ap_options::ApOptions;
use crate::asn1::ap_req::{ApReq, ApReqInner};
use crate::asn1::constants::KrbMessageType;
use crate::asn1::encrypted_data::EncryptedData as KdcEncryptedData;
use crate::error::KrbError;
use crate::proto::EncTicket;
use base64::{engine::general_purpose::STANDARD, Engine};
use der::{Decode, SliceReader};
use tracing::{debug, error, trace};

/// RFC1964 TOK_ID of a krb5 AP-REQ inside a GSS-API initial context token.
const AP_REQ_MARKER: [u8; 2] = [0x01, 0x00];
/// [APPLICATION 14], the first byte of any DER encoded AP-REQ.
const AP_REQ_TAG: u8 = 0x6e;

/// An AP-REQ as the client sent it. Nothing in it is verified yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApRequest {
    pub(crate) ap_options: ApOptions,
    pub(crate) ticket: EncTicket,
    pub(crate) authenticator: KdcEncryptedData,
}

impl ApRequest {
    pub fn ticket(&self) -> &EncTicket {
        &self.ticket
    }

    /// The encryption type of the ticket, which selects the service key.
    pub fn etype(&self) -> i32 {
        self.ticket.etype()
    }

    pub fn kvno(&self) -> Option<u32> {
        self.ticket.kvno()
    }

    pub fn mutual_required(&self) -> bool {
        self.ap_options.contains(ApOptions::MutualRequired)
    }
}

impl TryFrom<ApReqInner> for ApRequest {
    type Error = KrbError;

    fn try_from(ap_req: ApReqInner) -> Result<Self, KrbError> {
        if ap_req.pvno != 5 {
            error!(pvno = %ap_req.pvno, "unsupported protocol version in ap-req");
            return Err(KrbError::InvalidPvno);
        }

        if ap_req.msg_type != u8::from(KrbMessageType::KrbApReq) {
            error!(msg_type = %ap_req.msg_type, "ap-req carries the wrong message type");
            return Err(KrbError::InvalidMessageType);
        }

        Ok(ApRequest {
            ap_options: ap_req.ap_options,
            ticket: EncTicket::from(ap_req.ticket),
            authenticator: ap_req.authenticator,
        })
    }
}

/// Find the AP-REQ inside a negotiate token and return every byte after the marker.
///
/// The envelope in front of the AP-REQ depends on the client, so the token is scanned
/// rather than parsed. A marker directly followed by an AP-REQ tag wins over one that
/// happens to appear earlier, eg inside a length field.
pub fn locate_ap_req(token: &[u8]) -> Result<&[u8], KrbError> {
    let mut fallback = None;

    for (idx, window) in token.windows(AP_REQ_MARKER.len()).enumerate() {
        if window != AP_REQ_MARKER {
            continue;
        }

        let body = &token[idx + AP_REQ_MARKER.len()..];
        if body.first() == Some(&AP_REQ_TAG) {
            trace!(offset = %idx, "found ap-req marker");
            return Ok(body);
        }

        if fallback.is_none() {
            fallback = Some(body);
        }
    }

    fallback.ok_or_else(|| {
        error!(token_len = %token.len(), "no ap-req marker in negotiate token");
        KrbError::MalformedToken
    })
}

/// Locate and decode the AP-REQ in a negotiate token. Bytes after the AP-REQ, such as
/// a mechListMIC, are ignored.
pub fn extract_ap_req(token: &[u8]) -> Result<ApRequest, KrbError> {
    let body = locate_ap_req(token)?;

    let mut reader = SliceReader::new(body).map_err(|err| {
        error!(?err, "unable to read ap-req");
        KrbError::DerDecodeApReq
    })?;

    let ap_req = ApReq::decode(&mut reader).map_err(|err| {
        error!(?err, "unable to decode ap-req");
        KrbError::DerDecodeApReq
    })?;

    let ap_req = ApRequest::try_from(ApReqInner::from(ap_req))?;
    debug!(etype = %ap_req.etype(), kvno = ?ap_req.kvno(), "extracted ap-req");
    Ok(ap_req)
}

/// Decode the value of an `Authorization: Negotiate <base64>` header.
pub fn decode_negotiate_header(value: &str) -> Result<Vec<u8>, KrbError> {
    let encoded = value
        .trim()
        .strip_prefix("Negotiate ")
        .unwrap_or(value)
        .trim();

    STANDARD.decode(encoded).map_err(|err| {
        error!(?err, "negotiate token is not valid base64");
        KrbError::MalformedToken
    })
}

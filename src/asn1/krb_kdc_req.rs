use super::kdc_req::KdcReq;
use super::{
    application_encoded_len, decode_application_tag, encode_application,
    unexpected_application_tag,
};
use der::Writer;

/// ```text
/// AS-REQ          ::= [APPLICATION 10] KDC-REQ
/// TGS-REQ         ::= [APPLICATION 12] KDC-REQ
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum KrbKdcReq {
    AsReq(KdcReq),
    TgsReq(KdcReq),
}

const AS_REQ: u32 = 10;
const TGS_REQ: u32 = 12;

impl<'a> ::der::Decode<'a> for KrbKdcReq {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        match decode_application_tag(decoder)? {
            (AS_REQ, _) => decoder.decode().map(KrbKdcReq::AsReq),
            (TGS_REQ, _) => decoder.decode().map(KrbKdcReq::TgsReq),
            (_, tag) => Err(unexpected_application_tag(tag)),
        }
    }
}

impl ::der::Encode for KrbKdcReq {
    fn encoded_len(&self) -> der::Result<der::Length> {
        match self {
            KrbKdcReq::AsReq(req) => application_encoded_len(AS_REQ, req),
            KrbKdcReq::TgsReq(req) => application_encoded_len(TGS_REQ, req),
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            KrbKdcReq::AsReq(req) => encode_application(AS_REQ, req, writer),
            KrbKdcReq::TgsReq(req) => encode_application(TGS_REQ, req, writer),
        }
    }
}

use super::kdc_rep::KdcRep;
use super::krb_error::KrbError;
use super::{
    application_encoded_len, decode_application_tag, encode_application,
    unexpected_application_tag,
};
use der::Writer;

/// ```text
/// AS-REP          ::= [APPLICATION 11] KDC-REP
/// TGS-REP         ::= [APPLICATION 13] KDC-REP
/// KRB-ERROR       ::= [APPLICATION 30] SEQUENCE
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
// For clarity and keeping to the RFC, we allow this warning.
#[allow(clippy::enum_variant_names)]
pub(crate) enum KrbKdcRep {
    AsRep(KdcRep),
    TgsRep(KdcRep),
    ErrRep(KrbError),
}

const AS_REP: u32 = 11;
const TGS_REP: u32 = 13;
const KRB_ERROR: u32 = 30;

impl<'a> ::der::Decode<'a> for KrbKdcRep {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        match decode_application_tag(decoder)? {
            (AS_REP, _) => decoder.decode().map(KrbKdcRep::AsRep),
            (TGS_REP, _) => decoder.decode().map(KrbKdcRep::TgsRep),
            (KRB_ERROR, _) => decoder.decode().map(KrbKdcRep::ErrRep),
            (_, tag) => Err(unexpected_application_tag(tag)),
        }
    }
}

impl ::der::Encode for KrbKdcRep {
    fn encoded_len(&self) -> der::Result<der::Length> {
        match self {
            KrbKdcRep::AsRep(rep) => application_encoded_len(AS_REP, rep),
            KrbKdcRep::TgsRep(rep) => application_encoded_len(TGS_REP, rep),
            KrbKdcRep::ErrRep(err) => application_encoded_len(KRB_ERROR, err),
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            KrbKdcRep::AsRep(rep) => encode_application(AS_REP, rep, writer),
            KrbKdcRep::TgsRep(rep) => encode_application(TGS_REP, rep, writer),
            KrbKdcRep::ErrRep(err) => encode_application(KRB_ERROR, err, writer),
        }
    }
}

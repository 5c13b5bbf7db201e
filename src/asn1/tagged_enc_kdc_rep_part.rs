use super::enc_kdc_rep_part::EncKdcRepPart;
use super::{
    application_encoded_len, decode_application_tag, encode_application,
    unexpected_application_tag,
};
use der::Writer;

/// ```text
///  EncASRepPart    ::= [APPLICATION 25] EncKDCRepPart
///  EncTGSRepPart   ::= [APPLICATION 26] EncKDCRepPart
/// ```
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum TaggedEncKdcRepPart {
    EncAsRepPart(EncKdcRepPart),
    EncTgsRepPart(EncKdcRepPart),
}

const ENC_AS_REP_PART: u32 = 25;
const ENC_TGS_REP_PART: u32 = 26;

impl TaggedEncKdcRepPart {
    // RFC4120 5.4.2: some implementations send the AS tag in a TGS-REP, so both are
    // accepted by the client.
    pub(crate) fn into_inner(self) -> EncKdcRepPart {
        match self {
            TaggedEncKdcRepPart::EncAsRepPart(part) | TaggedEncKdcRepPart::EncTgsRepPart(part) => {
                part
            }
        }
    }
}

impl<'a> ::der::Decode<'a> for TaggedEncKdcRepPart {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> der::Result<Self> {
        match decode_application_tag(decoder)? {
            (ENC_AS_REP_PART, _) => decoder.decode().map(TaggedEncKdcRepPart::EncAsRepPart),
            (ENC_TGS_REP_PART, _) => decoder.decode().map(TaggedEncKdcRepPart::EncTgsRepPart),
            (_, tag) => Err(unexpected_application_tag(tag)),
        }
    }
}

impl ::der::Encode for TaggedEncKdcRepPart {
    fn encoded_len(&self) -> der::Result<der::Length> {
        match self {
            TaggedEncKdcRepPart::EncAsRepPart(part) => {
                application_encoded_len(ENC_AS_REP_PART, part)
            }
            TaggedEncKdcRepPart::EncTgsRepPart(part) => {
                application_encoded_len(ENC_TGS_REP_PART, part)
            }
        }
    }

    fn encode(&self, writer: &mut impl Writer) -> der::Result<()> {
        match self {
            TaggedEncKdcRepPart::EncAsRepPart(part) => {
                encode_application(ENC_AS_REP_PART, part, writer)
            }
            TaggedEncKdcRepPart::EncTgsRepPart(part) => {
                encode_application(ENC_TGS_REP_PART, part, writer)
            }
        }
    }
}

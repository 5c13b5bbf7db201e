use der::{Encode, Length, Tag, TagNumber, Writer};

/// Most Kerberos messages are a SEQUENCE wrapped in an explicit `[APPLICATION n]` tag.
/// This implements the outer tag for a newtype around the inner sequence.
macro_rules! application_tagged {
    ($outer:ident, $inner:ty, $number:expr) => {
        impl der::FixedTag for $outer {
            const TAG: der::Tag = der::Tag::Application {
                constructed: true,
                number: der::TagNumber($number),
            };
        }

        impl<'a> der::DecodeValue<'a> for $outer {
            type Error = der::Error;

            fn decode_value<R: der::Reader<'a>>(
                reader: &mut R,
                _header: der::Header,
            ) -> der::Result<Self> {
                <$inner as der::Decode>::decode(reader).map(Self)
            }
        }

        impl der::EncodeValue for $outer {
            fn value_len(&self) -> der::Result<der::Length> {
                der::Encode::encoded_len(&self.0)
            }

            fn encode_value(&self, encoder: &mut impl der::Writer) -> der::Result<()> {
                der::Encode::encode(&self.0, encoder)
            }
        }
    };
}

pub(crate) mod ap_options;
pub(crate) mod ap_req;
pub(crate) mod authenticator;
pub(crate) mod authorization_data;
pub(crate) mod checksum;
pub(crate) mod constants;
pub(crate) mod enc_kdc_rep_part;
pub(crate) mod enc_ticket_part;
pub(crate) mod encrypted_data;
pub(crate) mod encryption_key;
pub(crate) mod host_address;
pub(crate) mod kdc_rep;
pub(crate) mod kdc_req;
pub(crate) mod kdc_req_body;
pub(crate) mod kerberos_flags;
pub(crate) mod kerberos_string;
pub(crate) mod kerberos_time;
pub(crate) mod krb_error;
pub(crate) mod krb_kdc_rep;
pub(crate) mod krb_kdc_req;
pub(crate) mod last_req;
pub(crate) mod microseconds;
pub(crate) mod pa_data;
pub(crate) mod pa_for_user;
pub(crate) mod principal_name;
pub(crate) mod realm;
pub(crate) mod tagged_enc_kdc_rep_part;
pub(crate) mod tagged_ticket;
pub(crate) mod ticket_flags;
pub(crate) mod transited_encoding;

pub(crate) use der::asn1::OctetString;

fn application_tag(number: u32) -> Tag {
    Tag::Application {
        constructed: true,
        number: TagNumber(number),
    }
}

/// Length of `inner` once wrapped in `[APPLICATION number]`. Used by the CHOICE style
/// messages that can't express their tag through `FixedTag`.
pub(crate) fn application_encoded_len<T: Encode>(number: u32, inner: &T) -> der::Result<Length> {
    let inner_len = inner.encoded_len()?;
    let len = (application_tag(number).encoded_len()? + inner_len.encoded_len()?)?;
    len + inner_len
}

pub(crate) fn encode_application<T: Encode>(
    number: u32,
    inner: &T,
    writer: &mut impl Writer,
) -> der::Result<()> {
    application_tag(number).encode(writer)?;
    inner.encoded_len()?.encode(writer)?;
    inner.encode(writer)
}

/// Read the outer application tag of a CHOICE style message, returning its number.
pub(crate) fn decode_application_tag<'a, R: der::Reader<'a>>(
    decoder: &mut R,
) -> der::Result<(u32, Tag)> {
    let tag: Tag = decoder.decode()?;
    let _len: Length = decoder.decode()?;
    match tag {
        Tag::Application {
            constructed: true,
            number,
        } => Ok((number.0, tag)),
        _ => Err(der::Error::from(der::ErrorKind::TagUnexpected {
            expected: None,
            actual: tag,
        })),
    }
}

pub(crate) fn unexpected_application_tag(tag: Tag) -> der::Error {
    der::Error::from(der::ErrorKind::TagUnexpected {
        expected: None,
        actual: tag,
    })
}

use super::kerberos_flags::{decode_flag_bits, encode_flag_bits, flag_bits_value_len};
use bitmask_enum::bitmask;
use der::{Decode, EncodeValue, Length, Result, Tagged, Writer};

/// ```text
/// APOptions       ::= KerberosFlags
///         -- reserved(0),
///         -- use-session-key(1),
///         -- mutual-required(2)
/// ```
#[bitmask(u32)]
pub enum ApFlags {
    Reserved = 1 << 0,
    UseSessionKey = 1 << 1,
    MutualRequired = 1 << 2,
}

pub type ApOptions = ApFlags;

impl ApFlags {
    fn from_bits(val: u32) -> Self {
        let mut af = ApFlags::none();
        af.bits = val;
        af
    }
}

impl<'a> Decode<'a> for ApFlags {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> Result<Self> {
        decode_flag_bits(decoder).map(ApFlags::from_bits)
    }
}

impl Tagged for ApFlags {
    fn tag(&self) -> der::Tag {
        der::Tag::BitString
    }
}

impl EncodeValue for ApFlags {
    fn value_len(&self) -> Result<Length> {
        flag_bits_value_len(self.bits())
    }
    fn encode_value(&self, encoder: &mut impl Writer) -> Result<()> {
        encode_flag_bits(self.bits(), encoder)
    }
}

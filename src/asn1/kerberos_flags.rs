use bitmask_enum::bitmask;
use der::asn1::BitStringRef;
use der::{Decode, EncodeValue, Length, Result, Tagged, Writer};

/// ```text
/// KerberosFlags   ::= BIT STRING (SIZE (32..MAX))
///                     -- minimum number of bits shall be sent,
///                     -- but no fewer than 32
///
/// KDCOptions      ::= KerberosFlags
/// ````
// NOTE: Can't use der::Flagset because it strips all leading zeros and RFC4120
// section 5.8.2 says at least 32 bit must be sent.
#[bitmask(u32)]
pub enum KerberosFlags {
    Reserved = 1 << 0,
    Forwardable = 1 << 1,
    Forwarded = 1 << 2,
    Proxiable = 1 << 3,
    Proxy = 1 << 4,
    AllowPostdate = 1 << 5,
    Postdated = 1 << 6,
    Unused7 = 1 << 7,
    Renewable = 1 << 8,
    Unused9 = 1 << 9,
    Unused10 = 1 << 10,
    OptHardwareAuth = 1 << 11,
    Unused12 = 1 << 12,
    Unused13 = 1 << 13,
    // MS-SFU 2.2.3, the additional ticket names the client for S4U2Proxy.
    CnameInAddlTkt = 1 << 14,
    Canonicalize = 1 << 15,
    // -- 26 was unused in 1510
    DisableTransitedCheck = 1 << 26,
    RenewableOk = 1 << 27,
    EncTktInSkey = 1 << 28,
    Unused29 = 1 << 29,
    Renew = 1 << 30,
    Validate = 1 << 31,
}

pub(crate) type KdcOptions = KerberosFlags;

impl KerberosFlags {
    pub(crate) fn from_bits(val: u32) -> Self {
        let mut kf = KerberosFlags::none();
        kf.bits = val;
        kf
    }
}

/// Kerberos numbers flags from the most significant bit of the first octet, so bit 0
/// on the wire is our lowest bit. Short bit strings are padded out to 32 bits.
pub(crate) fn decode_flag_bits<'a, R: der::Reader<'a>>(decoder: &mut R) -> Result<u32> {
    let bs = BitStringRef::decode(decoder)?;
    let mut bytes = [0u8; 4];
    for (dst, src) in bytes.iter_mut().zip(bs.raw_bytes()) {
        *dst = *src;
    }
    Ok(u32::from_be_bytes(bytes).reverse_bits())
}

pub(crate) fn flag_bits_value_len(bits: u32) -> Result<Length> {
    let buff = bits.reverse_bits().to_be_bytes();
    BitStringRef::from_bytes(&buff)?.value_len()
}

pub(crate) fn encode_flag_bits(bits: u32, encoder: &mut impl Writer) -> Result<()> {
    let buff = bits.reverse_bits().to_be_bytes();
    BitStringRef::from_bytes(&buff)?.encode_value(encoder)
}

impl<'a> Decode<'a> for KerberosFlags {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> Result<Self> {
        decode_flag_bits(decoder).map(KerberosFlags::from_bits)
    }
}

impl Tagged for KerberosFlags {
    fn tag(&self) -> der::Tag {
        der::Tag::BitString
    }
}

impl EncodeValue for KerberosFlags {
    fn value_len(&self) -> Result<Length> {
        flag_bits_value_len(self.bits())
    }
    fn encode_value(&self, encoder: &mut impl Writer) -> Result<()> {
        encode_flag_bits(self.bits(), encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::KerberosFlags;
    use der::{Decode, Encode};

    #[test]
    fn kdc_options_s4u2proxy_encoding() {
        let flags = KerberosFlags::Forwardable
            | KerberosFlags::Renewable
            | KerberosFlags::CnameInAddlTkt
            | KerberosFlags::Canonicalize;
        let der_bytes = flags.to_der().expect("Failed to encode");
        // forwardable(1) renewable(8) cname-in-addl-tkt(14) canonicalize(15)
        assert_eq!(der_bytes, [0x03, 0x05, 0x00, 0x40, 0x83, 0x00, 0x00]);

        let decoded = KerberosFlags::from_der(&der_bytes).expect("Failed to decode");
        assert_eq!(decoded, flags);
    }

    #[test]
    fn kdc_options_short_bitstring() {
        // Some clients send the minimum bits needed. Forwardable only.
        let der_bytes = [0x03, 0x02, 0x06, 0x40];
        let decoded = KerberosFlags::from_der(&der_bytes).expect("Failed to decode");
        assert_eq!(decoded, KerberosFlags::Forwardable);
    }
}

use super::kerberos_flags::{decode_flag_bits, encode_flag_bits, flag_bits_value_len};
use bitmask_enum::bitmask;
use der::{Decode, EncodeValue, Length, Result, Tagged, Writer};

/// ```text
/// TicketFlags     ::= KerberosFlags
///         -- reserved(0),
///         -- forwardable(1),
///         -- forwarded(2),
///         -- proxiable(3),
///         -- proxy(4),
///         -- may-postdate(5),
///         -- postdated(6),
///         -- invalid(7),
///         -- renewable(8),
///         -- initial(9),
///         -- pre-authent(10),
///         -- hw-authent(11),
///         -- transited-policy-checked(12),
///         -- ok-as-delegate(13)
/// ````
#[bitmask(u32)]
pub enum TicketFlags {
    Reserved = 1 << 0,
    Forwardable = 1 << 1,
    Forwarded = 1 << 2,
    Proxiable = 1 << 3,
    Proxy = 1 << 4,
    MayPostdate = 1 << 5,
    Postdated = 1 << 6,
    Invalid = 1 << 7,
    Renewable = 1 << 8,
    Initial = 1 << 9,
    PreAuthent = 1 << 10,
    HwAuthent = 1 << 11,
    TransitedPolicyChecked = 1 << 12,
    OkAsDelegate = 1 << 13,
    // MS-KILE 2.2.8, the ticket was issued through S4U2Self or S4U2Proxy.
    EncPaRep = 1 << 15,
    Anonymous = 1 << 16,
}

impl TicketFlags {
    pub(crate) fn from_bits(val: u32) -> Self {
        let mut tf = TicketFlags::none();
        tf.bits = val;
        tf
    }

    /// Pack a flag sequence, where index 0 is the first bit on the wire. Anything past
    /// the 32nd flag is dropped.
    pub fn from_flag_sequence(seq: &[bool]) -> Self {
        let bits = seq
            .iter()
            .take(32)
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(0u32, |acc, (i, _)| acc | (1 << i));
        TicketFlags::from_bits(bits)
    }

    /// The flags as they sit in the first 32 bits on the wire, most significant bit
    /// first. This is the order credential caches store them in.
    pub fn to_wire_bits(self) -> u32 {
        self.bits().reverse_bits()
    }

    pub fn from_wire_bits(val: u32) -> Self {
        TicketFlags::from_bits(val.reverse_bits())
    }
}

impl<'a> Decode<'a> for TicketFlags {
    type Error = der::Error;

    fn decode<R: der::Reader<'a>>(decoder: &mut R) -> Result<Self> {
        decode_flag_bits(decoder).map(TicketFlags::from_bits)
    }
}

impl Tagged for TicketFlags {
    fn tag(&self) -> der::Tag {
        der::Tag::BitString
    }
}

impl EncodeValue for TicketFlags {
    fn value_len(&self) -> Result<Length> {
        flag_bits_value_len(self.bits())
    }
    fn encode_value(&self, encoder: &mut impl Writer) -> Result<()> {
        encode_flag_bits(self.bits(), encoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use der::Encode;

    #[test]
    fn ticket_flags_min_encoded_length() {
        let flags = TicketFlags::none();
        let der_bytes = flags.to_der().expect("Failed to encode");
        assert_eq!(der_bytes, [0x03, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let flags = TicketFlags::Renewable;
        let der_bytes = flags.to_der().expect("Failed to encode");
        assert_eq!(der_bytes, [0x03, 0x05, 0x00, 0x00, 0x80, 0x00, 0x00]);

        let flags = TicketFlags::OkAsDelegate | TicketFlags::Renewable | TicketFlags::Forwardable;
        let der_bytes = flags.to_der().expect("Failed to encode");
        assert_eq!(der_bytes, [0x03, 0x05, 0x00, 0x40, 0x84, 0x00, 0x00]);

        let flags = TicketFlags::from_der(&der_bytes).expect("Failed to decode");
        assert!(flags.contains(TicketFlags::Renewable));
        assert!(flags.contains(TicketFlags::OkAsDelegate));
        assert!(flags.contains(TicketFlags::Forwardable));
    }

    #[test]
    fn ticket_flags_from_flag_sequence() {
        // forwardable, renewable, initial, pre-authent
        let mut seq = vec![false; 32];
        seq[1] = true;
        seq[8] = true;
        seq[9] = true;
        seq[10] = true;
        let flags = TicketFlags::from_flag_sequence(&seq);
        assert_eq!(
            flags,
            TicketFlags::Forwardable
                | TicketFlags::Renewable
                | TicketFlags::Initial
                | TicketFlags::PreAuthent
        );
        // MIT ccache value for the same ticket.
        assert_eq!(flags.to_wire_bits(), 0x40e0_0000);
        assert_eq!(TicketFlags::from_wire_bits(0x40e0_0000), flags);

        // Short sequences leave the remaining flags clear.
        assert_eq!(
            TicketFlags::from_flag_sequence(&[false, true]),
            TicketFlags::Forwardable
        );
    }
}

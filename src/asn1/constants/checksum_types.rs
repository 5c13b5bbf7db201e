use num_enum::{IntoPrimitive, TryFromPrimitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(i32)]
pub enum ChecksumType {
    RsaMd5 = 7,
    HmacSha196Aes128 = 15,
    HmacSha196Aes256 = 16,
    // MS-KILE 3.1.5.9, used by the PA-FOR-USER checksum.
    HmacMd5 = -138,
}

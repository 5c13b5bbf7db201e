pub mod checksum_types;
pub mod encryption_types;
pub mod errors;
pub mod message_types;
pub mod pa_data_types;
pub mod princ_name_types;

pub use self::checksum_types::ChecksumType;
pub use self::encryption_types::EncryptionType;
pub use self::message_types::KrbMessageType;
pub use self::pa_data_types::PaDataType;
pub use self::princ_name_types::PrincipalNameType;

#[cfg(test)]
mod tests {
    use super::errors::KrbErrorCode;
    use super::{EncryptionType, PaDataType};

    #[test]
    fn error_codes_from_wire() {
        assert_eq!(
            KrbErrorCode::try_from(52).expect("Unknown error code"),
            KrbErrorCode::KrbErrResponseTooBig
        );
        assert_eq!(
            KrbErrorCode::try_from(13).expect("Unknown error code"),
            KrbErrorCode::KdcErrBadoption
        );
        assert!(KrbErrorCode::try_from(30).is_err());
    }

    #[test]
    fn s4u_padata_types() {
        assert_eq!(u32::from(PaDataType::PaForUser), 129);
        assert_eq!(i32::from(EncryptionType::AES256_CTS_HMAC_SHA1_96), 18);
    }
}

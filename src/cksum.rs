use crate::asn1::checksum::Checksum as Asn1Checksum;
use crate::asn1::constants::ChecksumType;
use crate::asn1::OctetString;
use crate::constants::{KEY_USAGE_PA_FOR_USER_CKSUM, KEY_USAGE_TGS_REQ_AUTH_CKSUM};
use crate::crypto::checksum_hmac_md5;
use crate::error::KrbError;
use crate::proto::EncryptionKey;
use der::{asn1::Any, Encode};

/// Keyed checksums, always computed with the session key of the ticket the request
/// is authenticated by.
pub(crate) enum ChecksumBuilder<'a> {
    HmacSha196Aes256(&'a EncryptionKey),
    // RFC4757. MS-SFU requires this for PA-FOR-USER whatever the session key etype is.
    HmacMd5(&'a EncryptionKey),
}

impl ChecksumBuilder<'_> {
    fn value(&self) -> ChecksumType {
        match self {
            Self::HmacSha196Aes256(_) => ChecksumType::HmacSha196Aes256,
            Self::HmacMd5(_) => ChecksumType::HmacMd5,
        }
    }

    pub(crate) fn compute_kdc_req_body(&self, req_body: &Any) -> Result<Asn1Checksum, KrbError> {
        let req_body = req_body
            .to_der()
            .map_err(|_| KrbError::DerEncodeKdcReqBody)?;
        self.compute(req_body.as_slice(), KEY_USAGE_TGS_REQ_AUTH_CKSUM)
    }

    pub(crate) fn compute_pa_for_user(&self, data: &[u8]) -> Result<Asn1Checksum, KrbError> {
        self.compute(data, KEY_USAGE_PA_FOR_USER_CKSUM)
    }

    fn compute(&self, data: &[u8], key_usage: i32) -> Result<Asn1Checksum, KrbError> {
        let checksum = match self {
            Self::HmacSha196Aes256(k) => k.checksum(data, key_usage)?,
            Self::HmacMd5(k) => checksum_hmac_md5(data, k.as_bytes(), key_usage)?,
        };

        let checksum = OctetString::new(checksum).map_err(|_| KrbError::DerEncodeOctetString)?;
        Ok(Asn1Checksum {
            checksum_type: self.value().into(),
            checksum,
        })
    }
}

impl<'a> TryFrom<&'a EncryptionKey> for ChecksumBuilder<'a> {
    type Error = KrbError;

    fn try_from(key: &'a EncryptionKey) -> Result<Self, Self::Error> {
        match key {
            EncryptionKey::Aes256CtsHmacSha196 { .. } => Ok(ChecksumBuilder::HmacSha196Aes256(key)),
            EncryptionKey::Other { .. } => Err(KrbError::UnsupportedChecksumType),
        }
    }
}

mod reply;
mod request;
mod ticket;

pub use self::reply::KdcCredential;
pub(crate) use self::reply::{ErrorReply, KdcReply, TicketGrantReply};
pub(crate) use self::request::{TgsRequest, TgsRequestBuilder};
pub use self::ticket::ServiceTicket;
pub(crate) use self::ticket::TicketTimes;

use crate::asn1::constants::{EncryptionType, PrincipalNameType};
use crate::asn1::{
    encrypted_data::EncryptedData as KdcEncryptedData,
    encryption_key::EncryptionKey as KdcEncryptionKey,
    kerberos_string::KerberosString,
    kerberos_time::KerberosTime,
    principal_name::PrincipalName,
    realm::Realm,
    tagged_ticket::{TaggedTicket, Ticket},
    OctetString,
};
use crate::constants::AES_256_KEY_LEN;
use crate::crypto::{
    checksum_hmac_sha1_96_aes256, decrypt_aes256_cts_hmac_sha1_96,
    encrypt_aes256_cts_hmac_sha1_96,
};
use crate::error::KrbError;
use der::{Decode, Encode};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::error;

/// A principal name and its realm.
///
/// The name type is only a hint (RFC4120 6.2). MIT and AD disagree on which type a
/// service name should carry, so it takes no part in equality.
#[derive(Debug, Clone)]
pub struct Principal {
    name_type: PrincipalNameType,
    components: Vec<String>,
    realm: String,
}

impl PartialEq for Principal {
    fn eq(&self, other: &Self) -> bool {
        self.components == other.components && self.realm == other.realm
    }
}

impl Eq for Principal {}

impl Hash for Principal {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.components.hash(state);
        self.realm.hash(state);
    }
}

impl Principal {
    pub fn new<S: Into<String>>(components: Vec<S>, realm: &str) -> Result<Self, KrbError> {
        let components: Vec<String> = components.into_iter().map(Into::into).collect();

        if components.is_empty() {
            return Err(KrbError::PrincipalNameEmpty);
        }

        if components.iter().any(|c| c.is_empty() || c.contains('@')) {
            return Err(KrbError::PrincipalNameInvalidComponents);
        }

        if realm.is_empty() || realm.contains('@') || realm.contains('/') {
            return Err(KrbError::PrincipalNameInvalidRealm);
        }

        let name_type = if components.len() == 1 {
            PrincipalNameType::NtPrincipal
        } else {
            PrincipalNameType::NtSrvInst
        };

        Ok(Principal {
            name_type,
            components,
            realm: realm.to_string(),
        })
    }

    pub fn user(name: &str, realm: &str) -> Result<Self, KrbError> {
        Principal::new(vec![name], realm)
    }

    pub fn service(service: &str, instance: &str, realm: &str) -> Result<Self, KrbError> {
        Principal::new(vec![service, instance], realm)
    }

    pub fn krbtgt(realm: &str) -> Result<Self, KrbError> {
        Principal::new(vec!["krbtgt", realm], realm)
    }

    /// Parse `name[/instance...][@REALM]`, using `default_realm` when no realm is given.
    pub fn parse_with_default_realm(s: &str, default_realm: &str) -> Result<Self, KrbError> {
        let (name, realm) = match s.rsplit_once('@') {
            Some((name, realm)) => (name, realm),
            None => (s, default_realm),
        };

        if name.is_empty() {
            return Err(KrbError::PrincipalNameEmpty);
        }

        Principal::new(name.split('/').collect(), realm)
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn name_type(&self) -> PrincipalNameType {
        self.name_type
    }

    /// The name without its realm, eg `hdfs/node1`.
    pub fn name(&self) -> String {
        self.components.join("/")
    }

    pub fn is_krbtgt(&self) -> bool {
        self.components.len() == 2 && self.components[0] == "krbtgt"
    }

    pub(crate) fn with_name_type(mut self, name_type: PrincipalNameType) -> Self {
        self.name_type = name_type;
        self
    }
}

impl FromStr for Principal {
    type Err = KrbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((name, realm)) = s.rsplit_once('@') else {
            return Err(KrbError::PrincipalNameInvalidRealm);
        };
        Principal::parse_with_default_realm(name, realm)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.components.join("/"), self.realm)
    }
}

impl TryFrom<&Principal> for (PrincipalName, Realm) {
    type Error = KrbError;

    fn try_from(principal: &Principal) -> Result<Self, KrbError> {
        let name_string = principal
            .components
            .iter()
            .map(|c| KerberosString::from_str(c))
            .collect::<Result<Vec<_>, _>>()?;

        let realm = KerberosString::from_str(&principal.realm)?;

        Ok((
            PrincipalName {
                name_type: principal.name_type.into(),
                name_string,
            },
            realm,
        ))
    }
}

impl TryFrom<(&PrincipalName, &Realm)> for Principal {
    type Error = KrbError;

    fn try_from((name, realm): (&PrincipalName, &Realm)) -> Result<Self, KrbError> {
        let components: Vec<&str> = name.name_string.iter().map(|c| c.as_str()).collect();
        let principal = Principal::new(components, realm.as_str())?;

        // Unknown name types come from newer KDCs, keep going with the default.
        match PrincipalNameType::try_from(name.name_type) {
            Ok(name_type) => Ok(principal.with_name_type(name_type)),
            Err(_) => Ok(principal),
        }
    }
}

/// An encryption type plus the key bytes. Only AES256-CTS-HMAC-SHA1-96 can be used for
/// cryptography, other types are carried so that keytabs and caches round trip.
#[derive(Clone, PartialEq, Eq)]
pub enum EncryptionKey {
    Aes256CtsHmacSha196 { k: [u8; AES_256_KEY_LEN] },
    Other { etype: i32, k: Vec<u8> },
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("EncryptionKey");
        match self {
            EncryptionKey::Aes256CtsHmacSha196 { .. } => builder.field("k", &"Aes256"),
            EncryptionKey::Other { etype, .. } => builder.field("etype", etype),
        }
        .finish()
    }
}

impl EncryptionKey {
    pub fn new(etype: i32, key: &[u8]) -> Result<Self, KrbError> {
        match EncryptionType::try_from(etype) {
            Ok(EncryptionType::AES256_CTS_HMAC_SHA1_96) => {
                let mut k = [0u8; AES_256_KEY_LEN];
                if key.len() != k.len() {
                    error!(key_len = %key.len(), expected = %AES_256_KEY_LEN, "invalid aes256 key");
                    return Err(KrbError::UnsupportedEncryption);
                }
                k.copy_from_slice(key);
                Ok(EncryptionKey::Aes256CtsHmacSha196 { k })
            }
            _ => Ok(EncryptionKey::Other {
                etype,
                k: key.to_vec(),
            }),
        }
    }

    pub fn etype(&self) -> i32 {
        match self {
            EncryptionKey::Aes256CtsHmacSha196 { .. } => {
                EncryptionType::AES256_CTS_HMAC_SHA1_96.into()
            }
            EncryptionKey::Other { etype, .. } => *etype,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            EncryptionKey::Aes256CtsHmacSha196 { k } => k.as_slice(),
            EncryptionKey::Other { k, .. } => k.as_slice(),
        }
    }

    pub(crate) fn encrypt(
        &self,
        plaintext: &[u8],
        key_usage: i32,
    ) -> Result<KdcEncryptedData, KrbError> {
        match self {
            EncryptionKey::Aes256CtsHmacSha196 { k } => {
                let data = encrypt_aes256_cts_hmac_sha1_96(k, plaintext, key_usage)?;
                Ok(KdcEncryptedData {
                    etype: self.etype(),
                    kvno: None,
                    cipher: OctetString::new(data)
                        .map_err(|_| KrbError::DerEncodeOctetString)?,
                })
            }
            EncryptionKey::Other { .. } => Err(KrbError::UnsupportedEncryption),
        }
    }

    pub(crate) fn decrypt(
        &self,
        enc_data: &KdcEncryptedData,
        key_usage: i32,
    ) -> Result<Vec<u8>, KrbError> {
        if enc_data.etype != self.etype() {
            error!(
                key_etype = %self.etype(),
                data_etype = %enc_data.etype,
                "encryption type of key and data differ"
            );
            return Err(KrbError::UnsupportedEncryption);
        }

        match self {
            EncryptionKey::Aes256CtsHmacSha196 { k } => {
                decrypt_aes256_cts_hmac_sha1_96(k, enc_data.cipher.as_bytes(), key_usage)
            }
            EncryptionKey::Other { .. } => Err(KrbError::UnsupportedEncryption),
        }
    }

    pub(crate) fn checksum(&self, data: &[u8], key_usage: i32) -> Result<Vec<u8>, KrbError> {
        match self {
            EncryptionKey::Aes256CtsHmacSha196 { k } => {
                checksum_hmac_sha1_96_aes256(data, k, key_usage)
            }
            EncryptionKey::Other { .. } => Err(KrbError::UnsupportedChecksumType),
        }
    }
}

impl TryFrom<&KdcEncryptionKey> for EncryptionKey {
    type Error = KrbError;

    fn try_from(kdc_enc_key: &KdcEncryptionKey) -> Result<Self, KrbError> {
        EncryptionKey::new(kdc_enc_key.key_type, kdc_enc_key.key_value.as_bytes())
    }
}

impl TryFrom<&EncryptionKey> for KdcEncryptionKey {
    type Error = KrbError;

    fn try_from(key: &EncryptionKey) -> Result<Self, KrbError> {
        Ok(KdcEncryptionKey {
            key_type: key.etype(),
            key_value: OctetString::new(key.as_bytes())
                .map_err(|_| KrbError::DerEncodeOctetString)?,
        })
    }
}

/// A ticket as it travels on the wire. Only the holder of the service key can look
/// inside, so beyond the service name this is opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncTicket {
    pub(crate) tkt: TaggedTicket,
}

impl EncTicket {
    pub fn service(&self) -> Result<Principal, KrbError> {
        let Ticket { realm, sname, .. } = &self.tkt.0;
        Principal::try_from((sname, realm))
    }

    pub fn etype(&self) -> i32 {
        self.tkt.0.enc_part.etype
    }

    pub fn kvno(&self) -> Option<u32> {
        self.tkt.0.enc_part.kvno
    }

    pub fn to_der(&self) -> Result<Vec<u8>, KrbError> {
        self.tkt.to_der().map_err(|err| {
            error!(?err, "unable to encode ticket");
            KrbError::DerEncodeTicket
        })
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self, KrbError> {
        TaggedTicket::from_der(bytes)
            .map(EncTicket::from)
            .map_err(|err| {
                error!(?err, "unable to decode ticket");
                KrbError::DerDecodeTicket
            })
    }
}

impl From<TaggedTicket> for EncTicket {
    fn from(tkt: TaggedTicket) -> Self {
        EncTicket { tkt }
    }
}

/// KerberosTime carries no fractional seconds, so anything below a second is dropped.
pub(crate) fn kerberos_time(t: SystemTime) -> Result<KerberosTime, KrbError> {
    let since_epoch = t
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| KrbError::DoYouHaveATimeMachine)?;
    KerberosTime::from_unix_duration(Duration::from_secs(since_epoch.as_secs()))
        .map_err(|_| KrbError::DerEncodeKerberosTime)
}

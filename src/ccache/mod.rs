mod cc_file;

use crate::asn1::constants::PrincipalNameType;
use crate::asn1::ticket_flags::TicketFlags;
use crate::error::KrbError;
use crate::proto::{EncTicket, EncryptionKey, Principal, ServiceTicket, TicketTimes};
use binrw::{binread, binwrite};
use std::env;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, trace};
use uzers::get_current_uid;

/// Configuration entries live under this realm and carry no ticket.
const CACHE_CONF_REALM: &[u8] = b"X-CACHECONF:";

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct DataComponent {
    #[bw(try_calc(u32::try_from(value.len())))]
    value_len: u32,
    #[br(count = value_len)]
    value: Vec<u8>,
}

impl DataComponent {
    fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.value).to_string()
    }
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct PrincipalV4 {
    name_type: u32,
    #[bw(try_calc(u32::try_from(components.len())))]
    components_count: u32,
    realm: DataComponent,
    #[br(count = components_count)]
    components: Vec<DataComponent>,
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyBlockV4 {
    enc_type: u16,
    data: DataComponent,
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct Address {
    addr_type: u16,
    data: DataComponent,
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct Addresses {
    #[bw(try_calc(u32::try_from(addresses.len())))]
    count: u32,
    #[br(count = count)]
    addresses: Vec<Address>,
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct AuthDataComponent {
    ad_type: u16,
    data: DataComponent,
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct AuthData {
    #[bw(try_calc(u32::try_from(auth_data.len())))]
    count: u32,
    #[br(count = count)]
    auth_data: Vec<AuthDataComponent>,
}

#[binwrite]
#[bw(big)]
#[binread]
#[derive(Debug, Clone, PartialEq, Eq)]
struct CredentialV4 {
    client: PrincipalV4,
    server: PrincipalV4,
    keyblock: KeyBlockV4,
    authtime: u32,
    starttime: u32,
    endtime: u32,
    renew_till: u32,
    is_skey: u8,
    ticket_flags: u32,
    addresses: Addresses,
    authdata: AuthData,
    ticket: DataComponent,
    second_ticket: DataComponent,
}

impl CredentialV4 {
    fn is_cache_conf(&self) -> bool {
        self.server.realm.value == CACHE_CONF_REALM
    }
}

fn to_epoch_secs(t: SystemTime) -> Result<u32, KrbError> {
    let secs = t
        .duration_since(SystemTime::UNIX_EPOCH)
        .map_err(|_| KrbError::DoYouHaveATimeMachine)?
        .as_secs();
    // The v4 layout has 32 bit timestamps.
    u32::try_from(secs).map_err(|_| {
        error!(?secs, "timestamp does not fit a credential cache");
        KrbError::CredentialCacheWrite
    })
}

fn from_epoch_secs(secs: u32) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs as u64)
}

impl From<&Principal> for PrincipalV4 {
    fn from(principal: &Principal) -> Self {
        let name_type: i32 = principal.name_type().into();
        PrincipalV4 {
            name_type: name_type as u32,
            realm: DataComponent {
                value: principal.realm().as_bytes().to_vec(),
            },
            components: principal
                .components()
                .iter()
                .map(|c| DataComponent {
                    value: c.as_bytes().to_vec(),
                })
                .collect(),
        }
    }
}

impl TryFrom<&PrincipalV4> for Principal {
    type Error = KrbError;

    fn try_from(value: &PrincipalV4) -> Result<Self, Self::Error> {
        let components: Vec<String> = value
            .components
            .iter()
            .map(DataComponent::to_string_lossy)
            .collect();
        let principal = Principal::new(components, &value.realm.to_string_lossy())?;

        match i32::try_from(value.name_type)
            .ok()
            .and_then(|nt| PrincipalNameType::try_from(nt).ok())
        {
            Some(nt) => Ok(principal.with_name_type(nt)),
            None => Ok(principal),
        }
    }
}

impl TryFrom<&ServiceTicket> for CredentialV4 {
    type Error = KrbError;

    fn try_from(ticket: &ServiceTicket) -> Result<Self, Self::Error> {
        let times = ticket.times();
        let session_key = ticket.session_key();

        let enc_type = u16::try_from(session_key.etype()).map_err(|_| {
            error!(etype = %session_key.etype(), "encryption type does not fit a credential cache");
            KrbError::UnsupportedEncryption
        })?;

        Ok(CredentialV4 {
            client: ticket.client().into(),
            server: ticket.service().into(),
            keyblock: KeyBlockV4 {
                enc_type,
                data: DataComponent {
                    value: session_key.as_bytes().to_vec(),
                },
            },
            authtime: to_epoch_secs(times.auth_time)?,
            starttime: to_epoch_secs(times.start_time)?,
            endtime: to_epoch_secs(times.end_time)?,
            renew_till: match times.renew_until {
                Some(till) => to_epoch_secs(till)?,
                None => 0,
            },
            is_skey: 0,
            ticket_flags: ticket.flags().to_wire_bits(),
            addresses: Addresses { addresses: vec![] },
            authdata: AuthData { auth_data: vec![] },
            ticket: DataComponent {
                value: ticket.ticket().to_der()?,
            },
            second_ticket: DataComponent { value: vec![] },
        })
    }
}

impl TryFrom<&CredentialV4> for ServiceTicket {
    type Error = KrbError;

    fn try_from(cred: &CredentialV4) -> Result<Self, Self::Error> {
        let client = Principal::try_from(&cred.client)?;
        let service = Principal::try_from(&cred.server)?;
        let session_key =
            EncryptionKey::new(cred.keyblock.enc_type as i32, &cred.keyblock.data.value)?;

        let auth_time = from_epoch_secs(cred.authtime);
        // A zero start time means the ticket is valid from auth time.
        let start_time = match cred.starttime {
            0 => auth_time,
            secs => from_epoch_secs(secs),
        };
        let renew_until = match cred.renew_till {
            0 => None,
            secs => Some(from_epoch_secs(secs)),
        };

        let times = TicketTimes {
            auth_time,
            start_time,
            end_time: from_epoch_secs(cred.endtime),
            renew_until,
        };

        let ticket = EncTicket::from_der(&cred.ticket.value)?;

        ServiceTicket::new(
            client,
            service,
            session_key,
            times,
            TicketFlags::from_wire_bits(cred.ticket_flags),
            ticket,
        )
    }
}

fn parse_ccache_name(ccache: Option<&str>) -> String {
    let uid = get_current_uid().to_string();

    match ccache {
        Some(c) if c.split_once(':').is_some_and(|(kind, _)| !kind.contains('/')) => {
            c.to_string()
        }
        Some(c) => format!("FILE:{}", c),
        None => match env::var("KRB5CCNAME") {
            Ok(val) => val,
            _ => "FILE:/tmp/krb5cc_%{uid}".to_string(),
        },
    }
    .replace("%{uid}", uid.as_str())
}

/// Write a cache holding exactly `ticket`, with its client as the default principal.
/// The file is replaced atomically, a concurrent reader sees the old cache or the new
/// one.
pub fn store(
    ticket: &ServiceTicket,
    ccache_name: Option<&str>,
    clock_skew: Option<Duration>,
) -> Result<(), KrbError> {
    let ccache_name = parse_ccache_name(ccache_name);
    trace!(?ccache_name, "storing credential cache");

    if let Some(path) = ccache_name.strip_prefix("FILE:") {
        return store_at(ticket, Path::new(path), clock_skew);
    }

    error!(?ccache_name, "unsupported credential cache type");
    Err(KrbError::UnsupportedCredentialCacheType)
}

/// As [`store`], to a file cache at exactly `path`.
pub fn store_at(
    ticket: &ServiceTicket,
    path: &Path,
    clock_skew: Option<Duration>,
) -> Result<(), KrbError> {
    let cred = CredentialV4::try_from(ticket)?;
    cc_file::store(path, ticket.client().into(), cred, clock_skew)
}

/// Read every ticket from a cache. Configuration entries are skipped.
pub fn load(ccache_name: Option<&str>) -> Result<Vec<ServiceTicket>, KrbError> {
    let ccache_name = parse_ccache_name(ccache_name);
    trace!(?ccache_name, "loading credential cache");

    let Some(path) = ccache_name.strip_prefix("FILE:") else {
        error!(?ccache_name, "unsupported credential cache type");
        return Err(KrbError::UnsupportedCredentialCacheType);
    };

    let creds = cc_file::load(Path::new(path))?;
    let mut tickets = Vec::with_capacity(creds.len());
    for cred in creds.iter().filter(|c| !c.is_cache_conf()) {
        tickets.push(ServiceTicket::try_from(cred).map_err(|err| {
            error!(?err, "invalid credential in cache");
            KrbError::CredentialCacheRead
        })?);
    }
    debug!(tickets = %tickets.len(), "credential cache loaded");
    Ok(tickets)
}

/// The environment a Kerberos aware process needs to find the cache at `path`.
/// KRB5CCNAME is a string, a path that isn't UTF-8 can't be named by it.
pub fn env_var(path: &Path) -> Result<(&'static str, String), KrbError> {
    let Some(path) = path.to_str() else {
        error!(path = %path.display(), "credential cache path is not valid UTF-8");
        return Err(KrbError::CredentialCachePathInvalid);
    };
    Ok(("KRB5CCNAME", format!("FILE:{}", path)))
}

#[cfg(test)]
mod tests {
    use super::{env_var, parse_ccache_name};
    use crate::asn1::ticket_flags::TicketFlags;
    use crate::proto::Principal;
    use std::path::Path;
    use std::str::FromStr;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_ccache_name() {
        assert_eq!(parse_ccache_name(Some("/tmp/cc")), "FILE:/tmp/cc");
        assert_eq!(parse_ccache_name(Some("KEYRING:x")), "KEYRING:x");
        assert_eq!(parse_ccache_name(Some("/run/a:b/cc")), "FILE:/run/a:b/cc");
        assert_eq!(parse_ccache_name(Some("FILE:/run/a:b/cc")), "FILE:/run/a:b/cc");
        assert_eq!(
            env_var(Path::new("/run/alice/krb5cc")),
            Ok(("KRB5CCNAME", "FILE:/run/alice/krb5cc".to_string()))
        );
        assert!(super::load(Some("KEYRING:x")).is_err());
    }

    #[test]
    fn test_ccache_mit_tickets() {
        let _ = tracing_subscriber::fmt::try_init();

        let dir = tempfile::tempdir().expect("Failed to create temporary dir");
        let path = dir.path().join("krb5cc");
        std::fs::write(&path, super::cc_file::tests::mit_ccache()).expect("Failed to write");

        let tickets =
            super::load(Some(&path.to_string_lossy())).expect("Failed to load ccache");
        // The fast_avail configuration entry is not a ticket.
        assert_eq!(tickets.len(), 1);

        let tgt = &tickets[0];
        assert_eq!(
            tgt.client(),
            &Principal::from_str("testuser@EXAMPLE.COM").expect("Invalid name")
        );
        assert!(tgt.service().is_krbtgt());
        assert_eq!(tgt.session_key().etype(), 18);
        assert_eq!(
            tgt.auth_time(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(0x66a7815b)
        );
        assert_eq!(
            tgt.end_time(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(0x66a80dfb)
        );
        assert_eq!(
            tgt.renew_until(),
            Some(SystemTime::UNIX_EPOCH + Duration::from_secs(0x66b0bbdb))
        );
        assert_eq!(
            tgt.flags(),
            TicketFlags::Renewable | TicketFlags::Initial | TicketFlags::EncPaRep
        );
        assert_eq!(tgt.ticket().kvno(), Some(1));
    }
}

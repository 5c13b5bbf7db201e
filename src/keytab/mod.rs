mod kt_file;

use crate::error::KrbError;
use crate::proto::{EncryptionKey, Principal};
use std::env;
use tracing::trace;

/// One long-term key as the keytab stores it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeytabEntry {
    pub principal: Principal,
    pub kvno: u32,
    pub key: EncryptionKey,
    /// When the key was written to the keytab, seconds since the epoch.
    pub timestamp: u32,
}

pub type Keytab = Vec<KeytabEntry>;

fn parse_keytab_name(kt_name: Option<&str>) -> String {
    match kt_name {
        Some(c) if c.split_once(':').is_some_and(|(kind, _)| !kind.contains('/')) => {
            c.to_string()
        }
        // Bare paths are files, like MIT accepts them.
        Some(c) => format!("FILE:{}", c),
        None => match env::var("DEFKTNAME") {
            Ok(val) => val,
            _ => "FILE:/etc/krb5.keytab".to_string(),
        },
    }
}

pub fn store(kt_name: Option<&str>, kt: &Keytab) -> Result<(), KrbError> {
    let kt_name = parse_keytab_name(kt_name);
    if kt_name.starts_with("FILE:") {
        return kt_file::store(&kt_name, kt);
    }
    Err(KrbError::UnsupportedKeytabType)
}

pub fn load(kt_name: Option<&str>) -> Result<Keytab, KrbError> {
    let kt_name = parse_keytab_name(kt_name);
    trace!(?kt_name, "loading keytab");
    if kt_name.starts_with("FILE:") {
        return kt_file::load(&kt_name);
    }
    Err(KrbError::UnsupportedKeytabType)
}

#[cfg(test)]
mod tests {
    use super::parse_keytab_name;

    #[test]
    fn test_keytab_name() {
        assert_eq!(
            parse_keytab_name(Some("/etc/proxy.keytab")),
            "FILE:/etc/proxy.keytab"
        );
        assert_eq!(
            parse_keytab_name(Some("FILE:/etc/proxy.keytab")),
            "FILE:/etc/proxy.keytab"
        );
        assert_eq!(parse_keytab_name(Some("MEMORY:x")), "MEMORY:x");
        assert_eq!(
            parse_keytab_name(Some("/etc/a:b/proxy.keytab")),
            "FILE:/etc/a:b/proxy.keytab"
        );
        assert!(super::load(Some("MEMORY:x")).is_err());
    }
}

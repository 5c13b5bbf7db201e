use crate::constants::DEFAULT_CLOCK_SKEW;
use crate::credentials::{CredentialSet, ServiceKey};
use crate::delegation::KdcClientConfig;
use crate::error::KrbError;
use crate::proto::{EncryptionKey, Principal};
use serde::Deserialize;
use std::fs;
use std::io;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::error;

fn default_clock_skew_ms() -> u64 {
    DEFAULT_CLOCK_SKEW.as_millis() as u64
}

/// A raw long-term key of the service principal.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceKeyConfig {
    pub etype: i32,
    pub kvno: Option<u32>,
    #[serde(deserialize_with = "hex::serde::deserialize")]
    pub key: Vec<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BrokerConfig {
    pub realm: String,
    /// Our own principal, the realm may be left out.
    pub service_principal: String,
    pub keytab: Option<String>,
    pub tgt_ccache: Option<String>,
    #[serde(default)]
    pub service_keys: Vec<ServiceKeyConfig>,
    #[serde(default = "default_clock_skew_ms")]
    pub clock_skew_ms: u64,
    pub kdc: KdcClientConfig,
}

impl BrokerConfig {
    pub fn parse<P: AsRef<Path>>(path: P) -> io::Result<BrokerConfig> {
        let mut contents = String::new();
        let mut f = fs::File::open(&path)?;
        f.read_to_string(&mut contents)?;

        toml::from_str(&contents).map_err(|err| {
            error!(?err);
            io::Error::other("toml parse failure")
        })
    }

    pub fn principal(&self) -> Result<Principal, KrbError> {
        Principal::parse_with_default_realm(&self.service_principal, &self.realm).map_err(|err| {
            error!(?err, service_principal = %self.service_principal, "invalid service principal");
            KrbError::ConfigInvalid
        })
    }

    pub fn clock_skew(&self) -> Duration {
        Duration::from_millis(self.clock_skew_ms)
    }

    pub fn service_keys(&self) -> Result<Vec<ServiceKey>, KrbError> {
        self.service_keys
            .iter()
            .map(|sk| {
                EncryptionKey::new(sk.etype, &sk.key)
                    .map(|key| ServiceKey::new(None, sk.kvno, key))
                    .map_err(|err| {
                        error!(?err, etype = %sk.etype, "invalid service key");
                        KrbError::ConfigInvalid
                    })
            })
            .collect()
    }

    /// Load the keytab, configured keys and tgt this configuration names.
    pub fn load_credentials(&self) -> Result<CredentialSet, KrbError> {
        CredentialSet::load(
            self.principal()?,
            self.keytab.as_deref(),
            self.tgt_ccache.as_deref(),
            self.service_keys()?,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::BrokerConfig;
    use crate::error::KrbError;
    use crate::testkdc;
    use std::io::Write;
    use std::time::Duration;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("Failed to create config");
        f.write_all(contents.as_bytes())
            .expect("Failed to write config");
        f
    }

    #[test]
    fn test_parse_config() {
        let _ = tracing_subscriber::fmt::try_init();

        let f = write_config(
            r#"
realm = "EXAMPLE.COM"
service_principal = "HTTP/proxy.example.com"
keytab = "/etc/proxy.keytab"
clock_skew_ms = 120000

[[service_keys]]
etype = 18
kvno = 3
key = "0101010101010101010101010101010101010101010101010101010101010101"

[kdc]
address = "kdc.example.com"
timeout_ms = 1500
"#,
        );

        let config = BrokerConfig::parse(f.path()).expect("Failed to parse config");
        assert_eq!(config.principal(), Ok(testkdc::proxy_principal()));
        assert_eq!(config.keytab.as_deref(), Some("/etc/proxy.keytab"));
        assert_eq!(config.tgt_ccache, None);
        assert_eq!(config.clock_skew(), Duration::from_secs(120));
        assert_eq!(config.kdc.address(), "kdc.example.com:88");
        assert_eq!(config.kdc.timeout(), Duration::from_millis(1500));
        assert_eq!(config.kdc.etypes, vec![18]);

        let keys = config.service_keys().expect("Invalid keys");
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].kvno(), Some(3));
        assert_eq!(keys[0].key().as_bytes(), &[1u8; 32]);
    }

    #[test]
    fn test_parse_defaults_and_errors() {
        let f = write_config(
            r#"
realm = "EXAMPLE.COM"
service_principal = "HTTP/proxy.example.com@EXAMPLE.COM"

[kdc]
address = "127.0.0.1:88"
"#,
        );
        let config = BrokerConfig::parse(f.path()).expect("Failed to parse config");
        assert_eq!(config.clock_skew(), Duration::from_secs(300));
        assert!(config.service_keys.is_empty());
        assert_eq!(config.kdc.udp_preference_limit, 1465);

        // Missing kdc table.
        let f = write_config("realm = \"EXAMPLE.COM\"\nservice_principal = \"HTTP/proxy\"\n");
        assert!(BrokerConfig::parse(f.path()).is_err());

        // Short aes256 key.
        let f = write_config(
            r#"
realm = "EXAMPLE.COM"
service_principal = "HTTP/proxy.example.com"
service_keys = [ { etype = 18, key = "0102" } ]
kdc = { address = "kdc" }
"#,
        );
        let config = BrokerConfig::parse(f.path()).expect("Failed to parse config");
        assert_eq!(config.service_keys().err(), Some(KrbError::ConfigInvalid));
        assert_eq!(config.load_credentials().err(), Some(KrbError::ConfigInvalid));

        assert!(BrokerConfig::parse("/nonexistent/broker.toml").is_err());
    }
}

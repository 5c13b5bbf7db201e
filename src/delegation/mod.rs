mod transport;

pub use self::transport::{KdcTransport, NetworkTransport};

use crate::asn1::constants::errors::KrbErrorCode;
use crate::constants::{
    DEFAULT_KDC_PORT, DEFAULT_KDC_TIMEOUT, DEFAULT_TICKET_LIFETIME, DEFAULT_UDP_PREFERENCE_LIMIT,
};
use crate::credentials::SecurityContext;
use crate::error::KrbError;
use crate::proto::{
    KdcCredential, KdcReply, Principal, ServiceTicket, TgsRequest, TgsRequestBuilder,
};
use serde::Deserialize;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, instrument, warn};

fn default_timeout_ms() -> u64 {
    DEFAULT_KDC_TIMEOUT.as_millis() as u64
}

fn default_udp_preference_limit() -> usize {
    DEFAULT_UDP_PREFERENCE_LIMIT
}

fn default_etypes() -> Vec<i32> {
    // aes256-cts-hmac-sha1-96, the only type we can compute with.
    vec![18]
}

/// How to reach the KDC. Owned by the caller and handed to each [`DelegationClient`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KdcClientConfig {
    pub address: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_udp_preference_limit")]
    pub udp_preference_limit: usize,
    #[serde(default = "default_etypes")]
    pub etypes: Vec<i32>,
}

impl KdcClientConfig {
    pub fn new(address: &str) -> Self {
        KdcClientConfig {
            address: address.to_string(),
            timeout_ms: default_timeout_ms(),
            udp_preference_limit: default_udp_preference_limit(),
            etypes: default_etypes(),
        }
    }

    /// The KDC as `host:port`, port 88 when none was configured.
    pub fn address(&self) -> String {
        let has_port = match self.address.rsplit_once(':') {
            // A bare IPv6 address has colons but no port.
            Some((host, port)) => {
                port.parse::<u16>().is_ok() && (!host.contains(':') || host.ends_with(']'))
            }
            None => false,
        };

        if has_port {
            self.address.clone()
        } else if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, DEFAULT_KDC_PORT)
        } else {
            format!("{}:{}", self.address, DEFAULT_KDC_PORT)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Performs the S4U exchanges with the KDC as the service identity held in a
/// [`SecurityContext`]. Each call sends exactly one request, nothing is retried.
#[derive(Debug)]
pub struct DelegationClient<T: KdcTransport = NetworkTransport> {
    transport: T,
    etypes: Vec<i32>,
    lifetime: Duration,
}

impl DelegationClient<NetworkTransport> {
    pub fn new(config: &KdcClientConfig) -> Self {
        DelegationClient::with_transport(NetworkTransport::new(config), config.etypes.clone())
    }
}

impl<T: KdcTransport> DelegationClient<T> {
    pub fn with_transport(transport: T, etypes: Vec<i32>) -> Self {
        DelegationClient {
            transport,
            etypes,
            lifetime: DEFAULT_TICKET_LIFETIME,
        }
    }

    /// The encryption types requested for issued session keys.
    pub fn etypes(&self) -> &[i32] {
        &self.etypes
    }

    fn usable_tgt(ctx: &SecurityContext, now: SystemTime) -> Result<&ServiceTicket, KrbError> {
        let tgt = ctx.tgt()?;
        if !tgt.is_valid_at(now) {
            error!(
                client = %tgt.client(),
                end_time = ?tgt.end_time(),
                "tgt is not valid at the current time"
            );
            return Err(KrbError::NoTgt);
        }
        Ok(tgt)
    }

    async fn exchange(
        &self,
        tgt: &ServiceTicket,
        request: TgsRequest,
    ) -> Result<KdcCredential, KrbError> {
        let der = request.to_der()?;
        let reply = self.transport.send(der).await?;

        match KdcReply::from_der(&reply)? {
            KdcReply::TicketGrant(rep) => rep.decrypt(tgt.session_key(), request.nonce),
            KdcReply::Error(err) => Err(err.into_error()),
        }
    }

    /// S4U2Self, a ticket to ourself on behalf of `user`. A name without a realm is in
    /// the realm of our tgt.
    #[instrument(level = "debug", skip_all)]
    pub async fn s4u2self(
        &self,
        ctx: &SecurityContext,
        user: &str,
    ) -> Result<KdcCredential, KrbError> {
        let now = SystemTime::now();
        let tgt = Self::usable_tgt(ctx, now)?;
        let user = Principal::parse_with_default_realm(user, tgt.client().realm())?;

        debug!(%user, service = %tgt.client(), "requesting s4u2self ticket");

        let request = TgsRequestBuilder::new(tgt, tgt.client().clone())
            .etypes(&self.etypes)
            .lifetime(self.lifetime)
            .s4u2self(user.clone())
            .build(now)?;

        let cred = self.exchange(tgt, request).await?;

        if cred.client() != &user {
            warn!(requested = %user, issued = %cred.client(), "kdc issued ticket for a different client");
        }

        Ok(cred)
    }

    /// S4U2Proxy, a ticket to `backend` for the client of `client_ticket`. A name without
    /// a realm is in the realm of the client ticket's service.
    #[instrument(level = "debug", skip_all)]
    pub async fn s4u2proxy(
        &self,
        ctx: &SecurityContext,
        backend: &str,
        client_ticket: &ServiceTicket,
    ) -> Result<KdcCredential, KrbError> {
        let now = SystemTime::now();
        let tgt = Self::usable_tgt(ctx, now)?;
        let backend =
            Principal::parse_with_default_realm(backend, client_ticket.service().realm())?;

        debug!(%backend, client = %client_ticket.client(), "requesting s4u2proxy ticket");

        let request = TgsRequestBuilder::new(tgt, backend)
            .etypes(&self.etypes)
            .lifetime(self.lifetime)
            .s4u2proxy(client_ticket.ticket())
            .build(now)?;

        match self.exchange(tgt, request).await {
            Err(KrbError::KdcError(KrbErrorCode::KdcErrBadoption))
            | Err(KrbError::KdcError(KrbErrorCode::KdcErrPolicy)) => {
                error!(client = %client_ticket.client(), "kdc denied constrained delegation");
                Err(KrbError::DelegationNotPermitted)
            }
            Err(err) => Err(err),
            Ok(cred) => {
                if cred.client() != client_ticket.client() {
                    warn!(
                        requested = %client_ticket.client(),
                        issued = %cred.client(),
                        "kdc issued ticket for a different client"
                    );
                }
                Ok(cred)
            }
        }
    }
}

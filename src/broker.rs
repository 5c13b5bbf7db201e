use crate::assembler::assemble;
use crate::ccache;
use crate::config::BrokerConfig;
use crate::credentials::CredentialStore;
use crate::delegation::{DelegationClient, KdcTransport, NetworkTransport};
use crate::error::KrbError;
use crate::proto::{Principal, ServiceTicket};
use crate::token::extract_ap_req;
use crate::validator::ApReqValidator;
use std::path::Path;
use std::time::SystemTime;
use tracing::{debug, error, info, instrument};

/// Acts as the end user towards backend services, on the strength of the user's
/// negotiate token or on the proxy's word alone.
#[derive(Debug)]
pub struct DelegationBroker<T: KdcTransport = NetworkTransport> {
    store: CredentialStore,
    validator: ApReqValidator,
    client: DelegationClient<T>,
}

impl DelegationBroker<NetworkTransport> {
    pub fn from_config(config: &BrokerConfig) -> Result<Self, KrbError> {
        let set = config.load_credentials()?;
        Ok(DelegationBroker::new(
            CredentialStore::new(set),
            ApReqValidator::new(config.clock_skew()),
            DelegationClient::new(&config.kdc),
        ))
    }
}

impl<T: KdcTransport> DelegationBroker<T> {
    pub fn new(store: CredentialStore, validator: ApReqValidator, client: DelegationClient<T>) -> Self {
        DelegationBroker {
            store,
            validator,
            client,
        }
    }

    /// The store, for refreshing the credential set.
    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    /// Validate a negotiate token and return the user's ticket to us.
    #[instrument(level = "debug", skip_all)]
    pub fn proxy_service_ticket(&self, token: &[u8]) -> Result<ServiceTicket, KrbError> {
        let ap_req = extract_ap_req(token)?;
        if ap_req.mutual_required() {
            debug!("client asked for mutual authentication, no ap-rep is returned");
        }

        let key = {
            let ctx = self.store.acquire();
            ctx.resolve_key(ap_req.ticket())?
        };

        let verified = self.validator.validate(&ap_req, &key, SystemTime::now())?;
        info!(client = %verified.client(), "negotiate token validated");
        verified.into_service_ticket()
    }

    async fn delegate(
        &self,
        client_ticket: &ServiceTicket,
        backend: &str,
    ) -> Result<ServiceTicket, KrbError> {
        let backend = Principal::parse_with_default_realm(backend, client_ticket.service().realm())?;

        let cred = {
            let ctx = self.store.acquire();
            self.client
                .s4u2proxy(&ctx, &backend.to_string(), client_ticket)
                .await?
        };

        let ticket = assemble(cred, &backend, self.client.etypes())?;
        info!(client = %ticket.client(), service = %ticket.service(), "obtained delegated ticket");
        Ok(ticket)
    }

    /// Exchange a negotiate token for a ticket to `backend` in the name of its user.
    #[instrument(level = "debug", skip_all)]
    pub async fn backend_ticket(
        &self,
        token: &[u8],
        backend: &str,
    ) -> Result<ServiceTicket, KrbError> {
        let client_ticket = self.proxy_service_ticket(token)?;
        self.delegate(&client_ticket, backend).await
    }

    /// A ticket to ourself in the name of `user`, without any proof from the user.
    #[instrument(level = "debug", skip_all)]
    pub async fn impersonate(&self, user: &str) -> Result<ServiceTicket, KrbError> {
        let (cred, service) = {
            let ctx = self.store.acquire();
            let cred = self.client.s4u2self(&ctx, user).await?;
            (cred, ctx.principal().clone())
        };

        let ticket = assemble(cred, &service, self.client.etypes())?;
        info!(client = %ticket.client(), "obtained impersonation ticket");
        Ok(ticket)
    }

    /// Protocol transition, a ticket to `backend` in the name of `user`.
    #[instrument(level = "debug", skip_all)]
    pub async fn impersonate_backend(
        &self,
        user: &str,
        backend: &str,
    ) -> Result<ServiceTicket, KrbError> {
        let evidence = self.impersonate(user).await?;
        self.delegate(&evidence, backend).await
    }

    /// Write `ticket` as the only credential of the cache at `path`. Returns the
    /// environment variable that points a process at it.
    pub fn persist(
        &self,
        ticket: &ServiceTicket,
        path: &Path,
    ) -> Result<(&'static str, String), KrbError> {
        let (name, value) = ccache::env_var(path)?;
        ccache::store_at(ticket, path, None).map_err(|err| {
            error!(?err, path = %path.display(), "unable to persist delegated ticket");
            err
        })?;
        Ok((name, value))
    }
}

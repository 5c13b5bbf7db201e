use arc_swap::ArcSwap;
use crate::ccache;
use crate::error::KrbError;
use crate::keytab::{self, Keytab, KeytabEntry};
use crate::proto::{EncTicket, EncryptionKey, Principal, ServiceTicket};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// A long-term key of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceKey {
    principal: Option<Principal>,
    kvno: Option<u32>,
    key: EncryptionKey,
}

impl ServiceKey {
    /// A key without a principal is taken to belong to the credential set's own
    /// principal.
    pub fn new(principal: Option<Principal>, kvno: Option<u32>, key: EncryptionKey) -> Self {
        ServiceKey {
            principal,
            kvno,
            key,
        }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    pub fn kvno(&self) -> Option<u32> {
        self.kvno
    }

    pub fn key(&self) -> &EncryptionKey {
        &self.key
    }
}

impl From<KeytabEntry> for ServiceKey {
    fn from(entry: KeytabEntry) -> Self {
        ServiceKey {
            principal: Some(entry.principal),
            kvno: Some(entry.kvno),
            key: entry.key,
        }
    }
}

/// The kinds of credential a service can hold.
#[derive(Debug, Clone)]
pub enum Credential {
    Key(ServiceKey),
    KeyTab(Keytab),
    Ticket(ServiceTicket),
}

/// The keys and ticket granting ticket of one service identity. A set never changes
/// once built, see [`CredentialStore`] for replacing it.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    principal: Principal,
    keys: Vec<ServiceKey>,
    tgt: Option<ServiceTicket>,
}

impl CredentialSet {
    pub fn new(principal: Principal, credentials: Vec<Credential>) -> Self {
        let mut keys = Vec::new();
        let mut tgt: Option<ServiceTicket> = None;

        for credential in credentials {
            match credential {
                Credential::Key(key) => keys.push(key),
                Credential::KeyTab(kt) => keys.extend(kt.into_iter().map(ServiceKey::from)),
                Credential::Ticket(ticket) => {
                    if !ticket.service().is_krbtgt() || ticket.client() != &principal {
                        debug!(
                            client = %ticket.client(),
                            service = %ticket.service(),
                            "ignoring ticket that is not our tgt"
                        );
                        continue;
                    }
                    // Keep whichever tgt lasts longest.
                    if tgt
                        .as_ref()
                        .map(|t| t.end_time() < ticket.end_time())
                        .unwrap_or(true)
                    {
                        tgt = Some(ticket);
                    }
                }
            }
        }

        debug!(%principal, keys = %keys.len(), tgt = %tgt.is_some(), "credential set built");

        CredentialSet {
            principal,
            keys,
            tgt,
        }
    }

    /// Read the keytab and, when given, the ccache holding the service's tgt.
    pub fn load(
        principal: Principal,
        keytab: Option<&str>,
        tgt_ccache: Option<&str>,
        extra_keys: Vec<ServiceKey>,
    ) -> Result<Self, KrbError> {
        let mut credentials: Vec<Credential> =
            extra_keys.into_iter().map(Credential::Key).collect();

        match keytab::load(keytab) {
            Ok(kt) => credentials.push(Credential::KeyTab(kt)),
            // Configured keys are enough to validate tokens on their own.
            Err(err) if !credentials.is_empty() => {
                warn!(?err, "unable to load keytab, using configured keys only");
            }
            Err(err) => return Err(err),
        }

        match ccache::load(tgt_ccache) {
            Ok(tickets) => credentials.extend(tickets.into_iter().map(Credential::Ticket)),
            // Without a tgt only validation works, delegation will fail with NoTgt.
            Err(err) => warn!(?err, "unable to load tgt credential cache"),
        }

        Ok(CredentialSet::new(principal, credentials))
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    pub fn keys(&self) -> &[ServiceKey] {
        &self.keys
    }

    pub fn tgt(&self) -> Option<&ServiceTicket> {
        self.tgt.as_ref()
    }

    /// Find the key a ticket was encrypted with.
    ///
    /// Only keys of `etype` qualify. Among them, keys of `service` beat keys of other
    /// principals, an exact `kvno` beats other versions, and then the newest version
    /// wins.
    pub fn resolve_key(
        &self,
        etype: i32,
        kvno: Option<u32>,
        service: Option<&Principal>,
    ) -> Result<&EncryptionKey, KrbError> {
        if self.keys.is_empty() {
            error!(principal = %self.principal, "credential set holds no keys");
            return Err(KrbError::EmptyCredentialSet);
        }

        let principal_rank = |key: &ServiceKey| -> u8 {
            let owner = key.principal.as_ref().unwrap_or(&self.principal);
            match service {
                Some(s) if s == owner => 2,
                Some(_) if owner == &self.principal => 1,
                None if owner == &self.principal => 2,
                _ => 0,
            }
        };

        let selected = self
            .keys
            .iter()
            .filter(|k| k.key.etype() == etype)
            .max_by_key(|k| {
                (
                    principal_rank(k),
                    kvno.is_some() && k.kvno == kvno,
                    k.kvno.unwrap_or(0),
                )
            });

        match selected {
            Some(k) => {
                trace!(%etype, kvno = ?k.kvno, principal = ?k.principal, "resolved service key");
                Ok(&k.key)
            }
            None => {
                error!(%etype, ?kvno, "no service key for encryption type");
                Err(KrbError::NoMatchingKey)
            }
        }
    }
}

/// Holds the current credential set. Readers share an immutable snapshot, a refresh
/// swaps in a new one without waiting for them.
#[derive(Debug)]
pub struct CredentialStore {
    current: ArcSwap<CredentialSet>,
    active: Arc<AtomicUsize>,
}

impl CredentialStore {
    pub fn new(set: CredentialSet) -> Self {
        CredentialStore {
            current: ArcSwap::from_pointee(set),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn snapshot(&self) -> Arc<CredentialSet> {
        self.current.load_full()
    }

    pub fn refresh(&self, set: CredentialSet) {
        self.current.store(Arc::new(set));
        debug!("credential set refreshed");
    }

    /// Enter the security context of the service identity. The context is left when the
    /// returned guard drops.
    pub fn acquire(&self) -> SecurityContext {
        self.active.fetch_add(1, Ordering::SeqCst);
        SecurityContext {
            set: self.snapshot(),
            active: Arc::clone(&self.active),
        }
    }

    /// How many security contexts are currently held.
    pub fn active_contexts(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

/// The service identity acting on one request. Pins the credential set it was acquired
/// with, a refresh during the request does not change it.
#[derive(Debug)]
pub struct SecurityContext {
    set: Arc<CredentialSet>,
    active: Arc<AtomicUsize>,
}

impl SecurityContext {
    pub fn principal(&self) -> &Principal {
        self.set.principal()
    }

    pub fn credentials(&self) -> &CredentialSet {
        &self.set
    }

    /// Resolve the service key for `ticket`. The key is copied out so the caller can
    /// drop the context as soon as the lookup is done.
    pub fn resolve_key(&self, ticket: &EncTicket) -> Result<EncryptionKey, KrbError> {
        let service = ticket.service().ok();
        self.set
            .resolve_key(ticket.etype(), ticket.kvno(), service.as_ref())
            .cloned()
    }

    pub fn tgt(&self) -> Result<&ServiceTicket, KrbError> {
        self.set.tgt().ok_or_else(|| {
            error!(principal = %self.set.principal(), "no tgt in credential set");
            KrbError::NoTgt
        })
    }
}

impl Drop for SecurityContext {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

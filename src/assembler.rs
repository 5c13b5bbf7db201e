use crate::asn1::ticket_flags::TicketFlags;
use crate::error::KrbError;
use crate::proto::{EncryptionKey, KdcCredential, Principal, ServiceTicket, TicketTimes};
use tracing::{debug, error};

/// Turn a credential issued by the KDC into a [`ServiceTicket`].
///
/// `service` names the ticket, even when the KDC canonicalised the name it returned.
/// `negotiated` are the encryption types offered in the request, the session key must
/// use one of them.
pub fn assemble(
    cred: KdcCredential,
    service: &Principal,
    negotiated: &[i32],
) -> Result<ServiceTicket, KrbError> {
    let KdcCredential {
        client,
        server,
        ticket,
        key,
        flags,
        auth_time,
        start_time,
        end_time,
        renew_till,
    } = cred;

    if !negotiated.contains(&key.key_type) {
        error!(
            etype = %key.key_type,
            ?negotiated,
            "kdc issued a session key of an encryption type we did not ask for"
        );
        return Err(KrbError::SessionKeyEtypeMismatch);
    }
    let session_key = EncryptionKey::try_from(&key)?;

    if &server != service {
        debug!(%server, %service, "kdc returned a different service name");
    }

    let auth_time = auth_time.to_system_time();
    let times = TicketTimes {
        auth_time,
        start_time: start_time
            .map(|t| t.to_system_time())
            .unwrap_or(auth_time),
        end_time: end_time.to_system_time(),
        // Absent means the ticket can't be renewed.
        renew_until: renew_till.map(|t| t.to_system_time()),
    };

    ServiceTicket::new(
        client,
        service.clone(),
        session_key,
        times,
        TicketFlags::from_flag_sequence(&flags),
        ticket,
    )
}

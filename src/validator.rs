use crate::asn1::authenticator::{Authenticator, AuthenticatorInner};
use crate::asn1::enc_ticket_part::{EncTicketPart, TaggedEncTicketPart};
use crate::asn1::ticket_flags::TicketFlags;
use crate::constants::{DEFAULT_CLOCK_SKEW, KEY_USAGE_AP_REQ_AUTH, KEY_USAGE_TICKET};
use crate::error::KrbError;
use crate::proto::{EncTicket, EncryptionKey, Principal, ServiceTicket, TicketTimes};
use crate::token::ApRequest;
use der::Decode;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, trace};

/// Checks an AP-REQ against the service key. There is no replay cache, an authenticator
/// is accepted as long as it is inside the skew window.
#[derive(Debug, Clone, Copy)]
pub struct ApReqValidator {
    max_skew: Duration,
}

impl Default for ApReqValidator {
    fn default() -> Self {
        ApReqValidator {
            max_skew: DEFAULT_CLOCK_SKEW,
        }
    }
}

/// An AP-REQ that passed validation, with the ticket content that the service key
/// revealed.
#[derive(Debug)]
pub struct VerifiedApRequest {
    client: Principal,
    service: Principal,
    session_key: EncryptionKey,
    times: TicketTimes,
    flags: TicketFlags,
    ticket: EncTicket,
}

fn map_mac_failure(err: KrbError) -> KrbError {
    match err {
        KrbError::MessageAuthenticationFailed => KrbError::AuthenticatorMismatch,
        err => err,
    }
}

impl ApReqValidator {
    pub fn new(max_skew: Duration) -> Self {
        ApReqValidator { max_skew }
    }

    pub fn max_skew(&self) -> Duration {
        self.max_skew
    }

    pub fn validate(
        &self,
        ap_req: &ApRequest,
        service_key: &EncryptionKey,
        now: SystemTime,
    ) -> Result<VerifiedApRequest, KrbError> {
        let service = ap_req.ticket().service()?;

        let enc_ticket_part = service_key
            .decrypt(&ap_req.ticket().tkt.0.enc_part, KEY_USAGE_TICKET)
            .map_err(|err| {
                error!(?err, %service, "unable to decrypt ticket with service key");
                map_mac_failure(err)
            })?;

        let EncTicketPart {
            flags,
            key,
            crealm,
            cname,
            auth_time,
            start_time,
            end_time,
            renew_till,
            ..
        } = TaggedEncTicketPart::from_der(&enc_ticket_part)
            .map_err(|err| {
                error!(?err, "unable to decode enc-ticket-part");
                KrbError::DerDecodeEncTicketPart
            })?
            .into();

        let session_key = EncryptionKey::try_from(&key)?;
        let client = Principal::try_from((&cname, &crealm))?;

        let authenticator = session_key
            .decrypt(&ap_req.authenticator, KEY_USAGE_AP_REQ_AUTH)
            .map_err(|err| {
                error!(?err, %client, "unable to decrypt authenticator");
                map_mac_failure(err)
            })?;

        let authenticator: AuthenticatorInner = Authenticator::from_der(&authenticator)
            .map_err(|err| {
                error!(?err, "unable to decode authenticator");
                KrbError::DerDecodeAuthenticator
            })?
            .into();

        trace!(?authenticator.ctime, ?authenticator.cusec);

        let auth_client = Principal::try_from((&authenticator.cname, &authenticator.crealm))?;
        if auth_client != client {
            error!(%client, %auth_client, "authenticator was not made by the ticket holder");
            return Err(KrbError::AuthenticatorMismatch);
        }

        let ctime = authenticator.ctime.to_system_time()
            + Duration::from_micros(authenticator.cusec as u64);
        let skew = match now.duration_since(ctime) {
            Ok(behind) => behind,
            Err(ahead) => ahead.duration(),
        };
        if skew > self.max_skew {
            error!(?ctime, ?now, ?skew, "authenticator outside the clock skew window");
            return Err(KrbError::ClockSkew);
        }

        let auth_time = auth_time.to_system_time();
        let times = TicketTimes {
            auth_time,
            // RFC4120 5.3, an absent start time means the ticket is valid from auth time.
            start_time: start_time
                .map(|t| t.to_system_time())
                .unwrap_or(auth_time),
            end_time: end_time.to_system_time(),
            renew_until: renew_till.map(|t| t.to_system_time()),
        };

        if now + self.max_skew < times.start_time {
            error!(start_time = ?times.start_time, ?now, "client ticket is not yet valid");
            return Err(KrbError::TicketNotYetValid);
        }

        if times.end_time + self.max_skew < now {
            error!(end_time = ?times.end_time, ?now, "client ticket has expired");
            return Err(KrbError::TicketExpired);
        }

        debug!(%client, %service, "ap-req validated");

        Ok(VerifiedApRequest {
            client,
            service,
            session_key,
            times,
            flags,
            ticket: ap_req.ticket().clone(),
        })
    }
}

impl VerifiedApRequest {
    pub fn client(&self) -> &Principal {
        &self.client
    }

    pub fn service(&self) -> &Principal {
        &self.service
    }

    /// The client's ticket to us, ready to be used as S4U2Proxy evidence.
    pub fn into_service_ticket(self) -> Result<ServiceTicket, KrbError> {
        ServiceTicket::new(
            self.client,
            self.service,
            self.session_key,
            self.times,
            self.flags,
            self.ticket,
        )
    }
}

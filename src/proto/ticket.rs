use super::{EncTicket, EncryptionKey, Principal};
use crate::asn1::ticket_flags::TicketFlags;
use crate::error::KrbError;
use std::time::SystemTime;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TicketTimes {
    pub(crate) auth_time: SystemTime,
    pub(crate) start_time: SystemTime,
    pub(crate) end_time: SystemTime,
    pub(crate) renew_until: Option<SystemTime>,
}

/// A service ticket together with everything its holder knows about it. Tickets that
/// were validated from a client, issued by the KDC or read from a cache all end up in
/// this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTicket {
    client: Principal,
    service: Principal,
    session_key: EncryptionKey,
    times: TicketTimes,
    flags: TicketFlags,
    ticket: EncTicket,
}

impl ServiceTicket {
    pub(crate) fn new(
        client: Principal,
        service: Principal,
        session_key: EncryptionKey,
        times: TicketTimes,
        flags: TicketFlags,
        ticket: EncTicket,
    ) -> Result<Self, KrbError> {
        if times.end_time <= times.start_time {
            error!(
                start_time = ?times.start_time,
                end_time = ?times.end_time,
                "ticket ends before it starts"
            );
            return Err(KrbError::InvalidTicketTimes);
        }

        Ok(ServiceTicket {
            client,
            service,
            session_key,
            times,
            flags,
            ticket,
        })
    }

    pub fn client(&self) -> &Principal {
        &self.client
    }

    pub fn service(&self) -> &Principal {
        &self.service
    }

    pub fn session_key(&self) -> &EncryptionKey {
        &self.session_key
    }

    pub fn auth_time(&self) -> SystemTime {
        self.times.auth_time
    }

    pub fn start_time(&self) -> SystemTime {
        self.times.start_time
    }

    pub fn end_time(&self) -> SystemTime {
        self.times.end_time
    }

    /// `None` when the ticket is not renewable.
    pub fn renew_until(&self) -> Option<SystemTime> {
        self.times.renew_until
    }

    pub fn flags(&self) -> TicketFlags {
        self.flags
    }

    pub fn ticket(&self) -> &EncTicket {
        &self.ticket
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        self.times.start_time <= now && now < self.times.end_time
    }

    pub(crate) fn times(&self) -> &TicketTimes {
        &self.times
    }
}

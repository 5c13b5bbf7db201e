use super::{EncTicket, Principal};
use crate::asn1::{
    constants::errors::KrbErrorCode,
    enc_kdc_rep_part::EncKdcRepPart,
    encrypted_data::EncryptedData as KdcEncryptedData,
    encryption_key::EncryptionKey as KdcEncryptionKey,
    kdc_rep::KdcRep,
    kerberos_time::KerberosTime,
    krb_error::KrbError as KdcKrbError,
    krb_kdc_rep::KrbKdcRep,
    tagged_enc_kdc_rep_part::TaggedEncKdcRepPart,
};
use crate::constants::KEY_USAGE_TGS_REP_SESSION_KEY;
use crate::error::KrbError;
use crate::proto::EncryptionKey;
use der::Decode;
use tracing::{debug, error, trace};

/// What a KDC can answer to a TGS-REQ.
#[derive(Debug)]
pub(crate) enum KdcReply {
    TicketGrant(TicketGrantReply),
    Error(ErrorReply),
}

impl KdcReply {
    pub(crate) fn from_der(bytes: &[u8]) -> Result<Self, KrbError> {
        let rep = KrbKdcRep::from_der(bytes).map_err(|err| {
            error!(?err, "unable to decode kdc reply");
            KrbError::DerDecodeKdcReply
        })?;

        match rep {
            KrbKdcRep::TgsRep(kdc_rep) => {
                TicketGrantReply::try_from(kdc_rep).map(KdcReply::TicketGrant)
            }
            KrbKdcRep::ErrRep(err) => Ok(KdcReply::Error(ErrorReply::from(err))),
            KrbKdcRep::AsRep(_) => {
                error!("kdc answered a tgs-req with an as-rep");
                Err(KrbError::KdcReplyUnexpected)
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct TicketGrantReply {
    client: Principal,
    ticket: EncTicket,
    enc_part: KdcEncryptedData,
}

impl TryFrom<KdcRep> for TicketGrantReply {
    type Error = KrbError;

    fn try_from(rep: KdcRep) -> Result<Self, KrbError> {
        if rep.pvno != 5 {
            return Err(KrbError::InvalidPvno);
        }

        let client = Principal::try_from((&rep.cname, &rep.crealm))?;

        Ok(TicketGrantReply {
            client,
            ticket: EncTicket::from(rep.ticket),
            enc_part: rep.enc_part,
        })
    }
}

impl TicketGrantReply {
    /// Decrypt the reply with the session key of the ticket that authenticated the
    /// request, checking the nonce echoes ours.
    pub(crate) fn decrypt(
        self,
        session_key: &EncryptionKey,
        nonce: i32,
    ) -> Result<KdcCredential, KrbError> {
        // RFC4120 5.4.2, usage 8 for the TGS session key. We never send a sub-session
        // key so usage 9 doesn't apply.
        let data = session_key
            .decrypt(&self.enc_part, KEY_USAGE_TGS_REP_SESSION_KEY)
            .map_err(|err| {
                error!(?err, "unable to decrypt tgs-rep");
                err
            })?;

        let enc_kdc_rep_part = TaggedEncKdcRepPart::from_der(&data)
            .map_err(|err| {
                error!(?err, "unable to decode enc-tgs-rep-part");
                KrbError::DerDecodeEncKdcRepPart
            })?
            .into_inner();

        trace!(?enc_kdc_rep_part);

        if enc_kdc_rep_part.nonce != nonce {
            error!(
                expected = %nonce,
                received = %enc_kdc_rep_part.nonce,
                "kdc reply nonce does not match request"
            );
            return Err(KrbError::KdcReplyNonceMismatch);
        }

        let EncKdcRepPart {
            key,
            flags,
            auth_time,
            start_time,
            end_time,
            renew_till,
            server_realm,
            server_name,
            ..
        } = enc_kdc_rep_part;

        let server = Principal::try_from((&server_name, &server_realm))?;

        Ok(KdcCredential {
            client: self.client,
            server,
            ticket: self.ticket,
            key,
            flags: flags.bits().collect(),
            auth_time,
            start_time,
            end_time,
            renew_till,
        })
    }
}

/// The decrypted content of a TGS-REP, still in the shape the KDC sent it.
#[derive(Debug, Clone)]
pub struct KdcCredential {
    pub(crate) client: Principal,
    pub(crate) server: Principal,
    pub(crate) ticket: EncTicket,
    pub(crate) key: KdcEncryptionKey,
    /// Ticket flags, one boolean per bit in wire order.
    pub(crate) flags: Vec<bool>,
    pub(crate) auth_time: KerberosTime,
    pub(crate) start_time: Option<KerberosTime>,
    pub(crate) end_time: KerberosTime,
    pub(crate) renew_till: Option<KerberosTime>,
}

impl KdcCredential {
    pub fn client(&self) -> &Principal {
        &self.client
    }

    /// The service the KDC issued the ticket for, which may be canonicalised.
    pub fn server(&self) -> &Principal {
        &self.server
    }

    pub fn ticket(&self) -> &EncTicket {
        &self.ticket
    }
}

#[derive(Debug)]
pub(crate) struct ErrorReply {
    pub(crate) code: Result<KrbErrorCode, i32>,
    pub(crate) text: Option<String>,
}

impl From<KdcKrbError> for ErrorReply {
    fn from(err: KdcKrbError) -> Self {
        let code = KrbErrorCode::try_from(err.error_code).map_err(|_| err.error_code);
        let text = err.error_text.map(|t| t.as_str().to_string());
        ErrorReply { code, text }
    }
}

impl ErrorReply {
    pub(crate) fn into_error(self) -> KrbError {
        debug!(code = ?self.code, text = ?self.text, "kdc returned an error");
        match self.code {
            Ok(code) => KrbError::KdcError(code),
            Err(raw) => {
                error!(%raw, "kdc returned an unknown error code");
                KrbError::KdcErrorUnknown
            }
        }
    }
}

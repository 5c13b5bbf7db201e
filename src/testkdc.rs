//! An in-process KDC and ticket fixtures for tests.
//!
//! Tickets are sealed with real keys, so everything handed to the library decrypts
//! and verifies the way it would against a real realm. The realm knows two users,
//! the proxy service and one backend the proxy may delegate to.

use crate::asn1::{
    ap_options::ApFlags,
    ap_req::ApReq,
    authenticator::{Authenticator, AuthenticatorInner},
    checksum::Checksum,
    constants::{errors::KrbErrorCode, KrbMessageType, PaDataType},
    enc_kdc_rep_part::EncKdcRepPart,
    enc_ticket_part::{EncTicketPart, TaggedEncTicketPart},
    encrypted_data::EncryptedData as KdcEncryptedData,
    encryption_key::EncryptionKey as KdcEncryptionKey,
    kdc_rep::KdcRep,
    kdc_req_body::KdcReqBody,
    kerberos_flags::KerberosFlags,
    kerberos_string::KerberosString,
    krb_error::KrbError as KdcKrbError,
    krb_kdc_rep::KrbKdcRep,
    krb_kdc_req::KrbKdcReq,
    pa_for_user::PaForUser,
    principal_name::PrincipalName,
    tagged_enc_kdc_rep_part::TaggedEncKdcRepPart,
    tagged_ticket::{TaggedTicket, Ticket},
    ticket_flags::TicketFlags,
    transited_encoding::TransitedEncoding,
    OctetString,
};
use crate::cksum::ChecksumBuilder;
use crate::constants::{
    KEY_USAGE_AP_REQ_AUTH, KEY_USAGE_TGS_REP_SESSION_KEY, KEY_USAGE_TGS_REQ_AUTH,
    KEY_USAGE_TICKET, RFC_PKBDF2_SHA1_ITER,
};
use crate::crypto::derive_key_aes256_cts_hmac_sha1_96;
use crate::delegation::KdcTransport;
use crate::error::KrbError;
use crate::proto::{kerberos_time, EncTicket, EncryptionKey, Principal, ServiceTicket, TicketTimes};
use der::asn1::BitString;
use der::{Decode, Encode};
use rand::{rng, Rng};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};
use tracing::{debug, error};

pub(crate) const REALM: &str = "EXAMPLE.COM";
const PROXY_KVNO: u32 = 3;
const KRBTGT_KVNO: u32 = 1;
const BACKEND_KVNO: u32 = 7;
const HOUR: Duration = Duration::from_secs(3600);

const KNOWN_USERS: &[&str] = &["alice", "bob"];
/// msDS-AllowedToDelegateTo of the proxy.
const DELEGATION_ACL: &[&str] = &["hdfs/node1@EXAMPLE.COM"];

/// The current time without the sub-second part KerberosTime can't carry, fixed for
/// the whole test run.
pub(crate) fn test_now() -> SystemTime {
    static NOW: OnceLock<SystemTime> = OnceLock::new();
    *NOW.get_or_init(|| {
        let secs = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("Clock is before 1970")
            .as_secs();
        SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
    })
}

fn principal(s: &str) -> Principal {
    Principal::from_str(s).expect("Invalid principal")
}

pub(crate) fn proxy_principal() -> Principal {
    principal("HTTP/proxy.example.com@EXAMPLE.COM")
}

pub(crate) fn backend_principal() -> Principal {
    principal("hdfs/node1@EXAMPLE.COM")
}

pub(crate) fn proxy_service_key() -> EncryptionKey {
    static KEY: OnceLock<EncryptionKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let k = derive_key_aes256_cts_hmac_sha1_96(
            b"proxy service password",
            b"EXAMPLE.COMHTTPproxy.example.com",
            RFC_PKBDF2_SHA1_ITER,
        )
        .expect("Failed to derive key");
        EncryptionKey::new(18, &k).expect("Invalid key")
    })
    .clone()
}

fn krbtgt_key() -> EncryptionKey {
    let k = hex::decode("8a2f6b1c0e4d3a5f7b9c1d2e3f405162738495a6b7c8d9eafb0c1d2e3f405162")
        .expect("Invalid hex");
    EncryptionKey::new(18, &k).expect("Invalid key")
}

fn backend_key() -> EncryptionKey {
    EncryptionKey::new(18, &[0x5a; 32]).expect("Invalid key")
}

/// The long term key the KDC shares with `service`, and its version.
fn service_key(service: &Principal) -> Option<(EncryptionKey, u32)> {
    if service.is_krbtgt() && service.realm() == REALM {
        Some((krbtgt_key(), KRBTGT_KVNO))
    } else if service == &proxy_principal() {
        Some((proxy_service_key(), PROXY_KVNO))
    } else if service == &backend_principal() {
        Some((backend_key(), BACKEND_KVNO))
    } else if service == &principal("cifs/fileserver@EXAMPLE.COM") {
        // Known to the realm, but not a delegation target of the proxy.
        Some((EncryptionKey::new(18, &[0x3c; 32]).expect("Invalid key"), 1))
    } else {
        None
    }
}

fn random_session_key() -> EncryptionKey {
    let mut k = [0u8; 32];
    rng().fill(&mut k);
    EncryptionKey::new(18, &k).expect("Invalid key")
}

/// Encrypt a ticket for `service` carrying `times` and `flags`.
fn seal_ticket(
    client: &Principal,
    service: &Principal,
    session_key: &EncryptionKey,
    times: &TicketTimes,
    flags: TicketFlags,
) -> EncTicket {
    let (key, kvno) = service_key(service).expect("Unknown service");
    let (cname, crealm) = client.try_into().expect("Invalid client");
    let (sname, realm) = service.try_into().expect("Invalid service");

    let start_time = if times.start_time == times.auth_time {
        None
    } else {
        Some(kerberos_time(times.start_time).expect("Invalid time"))
    };

    let part = TaggedEncTicketPart(EncTicketPart {
        flags,
        key: KdcEncryptionKey::try_from(session_key).expect("Invalid key"),
        crealm,
        cname,
        transited: TransitedEncoding {
            tr_type: 1,
            contents: OctetString::new(vec![]).expect("Invalid octets"),
        },
        auth_time: kerberos_time(times.auth_time).expect("Invalid time"),
        start_time,
        end_time: kerberos_time(times.end_time).expect("Invalid time"),
        renew_till: times
            .renew_until
            .map(|t| kerberos_time(t).expect("Invalid time")),
        client_addresses: None,
        authorization_data: None,
    })
    .to_der()
    .expect("Failed to encode enc-ticket-part");

    let mut enc_part = key
        .encrypt(&part, KEY_USAGE_TICKET)
        .expect("Failed to encrypt ticket");
    enc_part.kvno = Some(kvno);

    EncTicket::from(TaggedTicket::new(Ticket {
        tkt_vno: 5,
        realm,
        sname,
        enc_part,
    }))
}

fn issue(
    client: &Principal,
    service: &Principal,
    times: TicketTimes,
    flags: TicketFlags,
) -> ServiceTicket {
    let session_key = random_session_key();
    let ticket = seal_ticket(client, service, &session_key, &times, flags);
    ServiceTicket::new(
        client.clone(),
        service.clone(),
        session_key,
        times,
        flags,
        ticket,
    )
    .expect("Invalid ticket")
}

/// The proxy's tgt, the same ticket for the whole test run.
pub(crate) fn proxy_tgt() -> ServiceTicket {
    static TGT: OnceLock<ServiceTicket> = OnceLock::new();
    TGT.get_or_init(|| {
        let now = test_now();
        issue(
            &proxy_principal(),
            &Principal::krbtgt(REALM).expect("Invalid realm"),
            TicketTimes {
                auth_time: now - HOUR,
                start_time: now - HOUR,
                end_time: now + 9 * HOUR,
                renew_until: Some(now + 7 * 24 * HOUR),
            },
            TicketFlags::Forwardable
                | TicketFlags::Renewable
                | TicketFlags::Initial
                | TicketFlags::PreAuthent,
        )
    })
    .clone()
}

pub(crate) fn expired_proxy_tgt() -> ServiceTicket {
    let now = test_now();
    issue(
        &proxy_principal(),
        &Principal::krbtgt(REALM).expect("Invalid realm"),
        TicketTimes {
            auth_time: now - 12 * HOUR,
            start_time: now - 12 * HOUR,
            end_time: now - 2 * HOUR,
            renew_until: None,
        },
        TicketFlags::Initial,
    )
}

/// A fresh ten hour ticket from `client` to `service`.
pub(crate) fn ticket_for(client: &str, service: &str) -> ServiceTicket {
    let now = test_now();
    issue(
        &principal(client),
        &principal(service),
        TicketTimes {
            auth_time: now,
            start_time: now,
            end_time: now + 10 * HOUR,
            renew_until: None,
        },
        TicketFlags::Forwardable | TicketFlags::Renewable | TicketFlags::PreAuthent,
    )
}

/// A user's ticket to the proxy, as a browser would hold it. Fields can be changed
/// before building a token to produce broken or forged requests.
#[derive(Debug, Clone)]
pub(crate) struct ClientTicket {
    pub(crate) client: Principal,
    pub(crate) service: Principal,
    pub(crate) session_key: EncryptionKey,
    pub(crate) flags: TicketFlags,
    pub(crate) auth_time: SystemTime,
    pub(crate) start_time: Option<SystemTime>,
    pub(crate) end_time: SystemTime,
    /// Who the authenticator claims to be, the client when unset.
    pub(crate) authenticator_client: Option<Principal>,
}

impl ClientTicket {
    pub(crate) fn alice_to_proxy() -> Self {
        let now = test_now();
        ClientTicket {
            client: principal("alice@EXAMPLE.COM"),
            service: proxy_principal(),
            session_key: random_session_key(),
            flags: TicketFlags::Forwardable | TicketFlags::PreAuthent,
            auth_time: now,
            start_time: None,
            end_time: now + 10 * HOUR,
            authenticator_client: None,
        }
    }

    fn times(&self) -> TicketTimes {
        TicketTimes {
            auth_time: self.auth_time,
            start_time: self.start_time.unwrap_or(self.auth_time),
            end_time: self.end_time,
            renew_until: None,
        }
    }

    pub(crate) fn enc_ticket(&self) -> EncTicket {
        seal_ticket(
            &self.client,
            &self.service,
            &self.session_key,
            &self.times(),
            self.flags,
        )
    }

    /// The ticket as the proxy sees it once the token validated.
    pub(crate) fn service_ticket(&self) -> ServiceTicket {
        ServiceTicket::new(
            self.client.clone(),
            self.service.clone(),
            self.session_key.clone(),
            self.times(),
            self.flags,
            self.enc_ticket(),
        )
        .expect("Invalid ticket")
    }

    /// The encoded AP-REQ with an authenticator made at `ctime`.
    pub(crate) fn ap_req(&self, ctime: SystemTime) -> Vec<u8> {
        let author = self.authenticator_client.as_ref().unwrap_or(&self.client);
        let (cname, crealm) = author.try_into().expect("Invalid client");

        // RFC4121 4.1.1 GSS checksum, no channel bindings, mutual and integrity flags.
        let mut gss_cksum = 16u32.to_le_bytes().to_vec();
        gss_cksum.extend_from_slice(&[0u8; 16]);
        gss_cksum.extend_from_slice(&0x22u32.to_le_bytes());

        let cusec = ctime
            .duration_since(SystemTime::UNIX_EPOCH)
            .expect("Clock is before 1970")
            .subsec_micros();

        let authenticator = Authenticator(AuthenticatorInner {
            authenticator_vno: 5,
            crealm,
            cname,
            cksum: Some(Checksum {
                checksum_type: 0x8003,
                checksum: OctetString::new(gss_cksum).expect("Invalid octets"),
            }),
            cusec,
            ctime: kerberos_time(ctime).expect("Invalid time"),
            subkey: None,
            seq_number: Some(rng().random_range(0..i32::MAX as u32)),
            authorization_data: None,
        })
        .to_der()
        .expect("Failed to encode authenticator");

        let authenticator = self
            .session_key
            .encrypt(&authenticator, KEY_USAGE_AP_REQ_AUTH)
            .expect("Failed to encrypt authenticator");

        ApReq::new(ApFlags::MutualRequired, self.enc_ticket().tkt, authenticator)
            .to_der()
            .expect("Failed to encode ap-req")
    }

    /// A SPNEGO negotiate token as a browser would send it.
    pub(crate) fn token(&self, ctime: SystemTime) -> Vec<u8> {
        spnego_wrap(&self.ap_req(ctime))
    }
}

/// An AP-REQ to the proxy with placeholder cipher text. Contains no `01 00` pair.
pub(crate) fn sample_ap_req() -> Vec<u8> {
    let (sname, realm) = (&proxy_principal()).try_into().expect("Invalid service");
    let ticket = TaggedTicket::new(Ticket {
        tkt_vno: 5,
        realm,
        sname,
        enc_part: KdcEncryptedData {
            etype: 18,
            kvno: Some(PROXY_KVNO),
            cipher: OctetString::new(vec![0xaa; 64]).expect("Invalid octets"),
        },
    });
    let authenticator = KdcEncryptedData {
        etype: 18,
        kvno: None,
        cipher: OctetString::new(vec![0xbb; 48]).expect("Invalid octets"),
    };

    ApReq::new(ApFlags::MutualRequired, ticket, authenticator)
        .to_der()
        .expect("Failed to encode ap-req")
}

fn tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .into_iter()
            .skip_while(|b| *b == 0)
            .collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend_from_slice(&bytes);
    }
    out.extend_from_slice(content);
    out
}

// 1.2.840.113554.1.2.2
const KRB5_OID: &str = "2a864886f712010202";
// 1.3.6.1.5.5.2
const SPNEGO_OID: &str = "2b0601050502";

/// RFC2743 3.1 InitialContextToken around a krb5 AP-REQ.
pub(crate) fn gss_wrap(ap_req: &[u8]) -> Vec<u8> {
    let mut inner = tlv(0x06, &hex::decode(KRB5_OID).expect("Invalid hex"));
    inner.extend_from_slice(&[0x01, 0x00]);
    inner.extend_from_slice(ap_req);
    tlv(0x60, &inner)
}

/// RFC4178 NegTokenInit offering krb5 with the AP-REQ as the mechToken.
pub(crate) fn spnego_wrap(ap_req: &[u8]) -> Vec<u8> {
    let mech_types = tlv(
        0xa0,
        &tlv(0x30, &tlv(0x06, &hex::decode(KRB5_OID).expect("Invalid hex"))),
    );
    let mech_token = tlv(0xa2, &tlv(0x04, &gss_wrap(ap_req)));

    let mut init = mech_types;
    init.extend_from_slice(&mech_token);

    let mut inner = tlv(0x06, &hex::decode(SPNEGO_OID).expect("Invalid hex"));
    inner.extend_from_slice(&tlv(0xa0, &tlv(0x30, &init)));
    tlv(0x60, &inner)
}

/// Answers TGS-REQs for the test realm. Clones share the request counter.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockKdc {
    requests: Arc<AtomicUsize>,
    delay: Option<Duration>,
    reject: Option<KrbErrorCode>,
    wrong_nonce: bool,
}

struct Tgt {
    client: Principal,
    session_key: EncryptionKey,
    end_time: SystemTime,
}

impl MockKdc {
    /// Hold every reply back for `delay`.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answer every request with `code`.
    pub(crate) fn rejecting(mut self, code: KrbErrorCode) -> Self {
        self.reject = Some(code);
        self
    }

    /// Echo a nonce other than the request's in otherwise valid replies.
    pub(crate) fn with_wrong_nonce(mut self) -> Self {
        self.wrong_nonce = true;
        self
    }

    pub(crate) fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn decrypt_ticket(tkt: &TaggedTicket) -> Result<EncTicketPart, KrbErrorCode> {
        let service = Principal::try_from((&tkt.0.sname, &tkt.0.realm))
            .map_err(|_| KrbErrorCode::KdcErrSPrincipalUnknown)?;
        let (key, _) = service_key(&service).ok_or(KrbErrorCode::KdcErrSPrincipalUnknown)?;
        let part = key
            .decrypt(&tkt.0.enc_part, KEY_USAGE_TICKET)
            .map_err(|_| KrbErrorCode::KrbApErrBadIntegrity)?;
        TaggedEncTicketPart::from_der(&part)
            .map(|t| t.0)
            .map_err(|_| KrbErrorCode::KrbErrGeneric)
    }

    /// Check the PA-TGS-REQ, RFC4120 3.3.3.
    fn verify_tgs_req(padata: &[u8], req_body: &der::asn1::Any) -> Result<Tgt, KrbErrorCode> {
        let ap_req = ApReq::from_der(padata).map_err(|_| KrbErrorCode::KrbErrGeneric)?;
        let tgt = Self::decrypt_ticket(&ap_req.0.ticket)?;
        let session_key =
            EncryptionKey::try_from(&tgt.key).map_err(|_| KrbErrorCode::KdcErrEtypeNosupp)?;
        let client = Principal::try_from((&tgt.cname, &tgt.crealm))
            .map_err(|_| KrbErrorCode::KrbErrGeneric)?;

        let authenticator = session_key
            .decrypt(&ap_req.0.authenticator, KEY_USAGE_TGS_REQ_AUTH)
            .map_err(|_| KrbErrorCode::KrbApErrBadIntegrity)?;
        let authenticator =
            Authenticator::from_der(&authenticator).map_err(|_| KrbErrorCode::KrbErrGeneric)?;

        let expect = ChecksumBuilder::HmacSha196Aes256(&session_key)
            .compute_kdc_req_body(req_body)
            .map_err(|_| KrbErrorCode::KrbErrGeneric)?;
        if authenticator.0.cksum != Some(expect) {
            error!("tgs-req body checksum mismatch");
            return Err(KrbErrorCode::KrbApErrModified);
        }

        Ok(Tgt {
            client,
            session_key,
            end_time: tgt.end_time.to_system_time(),
        })
    }

    /// MS-SFU 3.2.5.1.1, the impersonated user.
    fn verify_for_user(padata: &[u8], tgt: &Tgt) -> Result<Principal, KrbErrorCode> {
        let pa = PaForUser::from_der(padata).map_err(|_| KrbErrorCode::KrbErrGeneric)?;
        let data = PaForUser::checksum_data(&pa.user_name, &pa.user_realm, &pa.auth_package);
        let expect = ChecksumBuilder::HmacMd5(&tgt.session_key)
            .compute_pa_for_user(&data)
            .map_err(|_| KrbErrorCode::KrbErrGeneric)?;
        if pa.cksum != expect {
            error!("pa-for-user checksum mismatch");
            return Err(KrbErrorCode::KrbApErrModified);
        }

        let user = Principal::try_from((&pa.user_name, &pa.user_realm))
            .map_err(|_| KrbErrorCode::KrbErrGeneric)?;
        if user.realm() != REALM || !KNOWN_USERS.contains(&user.name().as_str()) {
            return Err(KrbErrorCode::KdcErrCPrincipalUnknown);
        }
        Ok(user)
    }

    fn process(&self, request: &[u8]) -> Result<Vec<u8>, KrbErrorCode> {
        if let Some(code) = self.reject {
            return Err(code);
        }

        let KrbKdcReq::TgsReq(req) =
            KrbKdcReq::from_der(request).map_err(|_| KrbErrorCode::KrbErrGeneric)?
        else {
            return Err(KrbErrorCode::KdcErrBadoption);
        };

        let body: KdcReqBody = req
            .req_body
            .decode_as()
            .map_err(|_| KrbErrorCode::KrbErrGeneric)?;
        let padata = req.padata.unwrap_or_default();

        let tgs_req = padata
            .iter()
            .find(|pa| pa.padata_type == u32::from(PaDataType::PaTgsReq))
            .ok_or(KrbErrorCode::KdcErrPadataTypeNosupp)?;
        let tgt = Self::verify_tgs_req(tgs_req.padata_value.as_bytes(), &req.req_body)?;

        let sname = body.sname.as_ref().ok_or(KrbErrorCode::KdcErrBadoption)?;
        let service = Principal::try_from((sname, &body.realm))
            .map_err(|_| KrbErrorCode::KdcErrSPrincipalUnknown)?;
        if service_key(&service).is_none() {
            return Err(KrbErrorCode::KdcErrSPrincipalUnknown);
        }

        if !body.etype.contains(&18) {
            return Err(KrbErrorCode::KdcErrEtypeNosupp);
        }

        let for_user = padata
            .iter()
            .find(|pa| pa.padata_type == u32::from(PaDataType::PaForUser));

        let (client, flags) = if let Some(pa) = for_user {
            // S4U2Self, only towards the requesting service itself.
            let user = Self::verify_for_user(pa.padata_value.as_bytes(), &tgt)?;
            if service != tgt.client {
                return Err(KrbErrorCode::KdcErrBadoption);
            }
            debug!(%user, %service, "s4u2self");
            (user, TicketFlags::Forwardable | TicketFlags::PreAuthent)
        } else if body.kdc_options.contains(KerberosFlags::CnameInAddlTkt) {
            // S4U2Proxy, the evidence must be a forwardable ticket to the requester.
            let evidence = body
                .additional_tickets
                .as_ref()
                .and_then(|t| t.first())
                .ok_or(KrbErrorCode::KdcErrBadoption)?;
            let evidence_service = Principal::try_from((&evidence.0.sname, &evidence.0.realm))
                .map_err(|_| KrbErrorCode::KrbErrGeneric)?;
            if evidence_service != tgt.client {
                return Err(KrbErrorCode::KdcErrBadoption);
            }
            let evidence = Self::decrypt_ticket(evidence)?;
            if !evidence.flags.contains(TicketFlags::Forwardable) {
                return Err(KrbErrorCode::KdcErrBadoption);
            }
            if !DELEGATION_ACL.contains(&service.to_string().as_str()) {
                debug!(%service, "delegation not in acl");
                return Err(KrbErrorCode::KdcErrBadoption);
            }
            let client = Principal::try_from((&evidence.cname, &evidence.crealm))
                .map_err(|_| KrbErrorCode::KrbErrGeneric)?;
            debug!(%client, %service, "s4u2proxy");
            (client, TicketFlags::Forwardable)
        } else {
            (tgt.client.clone(), TicketFlags::Forwardable)
        };

        let now = SystemTime::now();
        let till = body.till.to_system_time();
        let times = TicketTimes {
            auth_time: now,
            start_time: now,
            end_time: till.min(tgt.end_time),
            renew_until: None,
        };
        if times.end_time <= now {
            return Err(KrbErrorCode::KdcErrNeverValid);
        }

        let session_key = random_session_key();
        let ticket = seal_ticket(&client, &service, &session_key, &times, flags);

        let (server_name, server_realm) = (&service).try_into().map_err(|_| KrbErrorCode::KrbErrGeneric)?;
        let (cname, crealm) = (&client).try_into().map_err(|_| KrbErrorCode::KrbErrGeneric)?;

        let time = |t: SystemTime| kerberos_time(t).map_err(|_| KrbErrorCode::KrbErrGeneric);

        let enc_part = TaggedEncKdcRepPart::EncTgsRepPart(EncKdcRepPart {
            key: KdcEncryptionKey::try_from(&session_key)
                .map_err(|_| KrbErrorCode::KrbErrGeneric)?,
            last_req: vec![],
            nonce: if self.wrong_nonce {
                body.nonce.wrapping_add(1)
            } else {
                body.nonce
            },
            key_expiration: None,
            flags: BitString::new(0, flags.to_wire_bits().to_be_bytes())
                .map_err(|_| KrbErrorCode::KrbErrGeneric)?,
            auth_time: time(times.auth_time)?,
            start_time: Some(time(times.start_time)?),
            end_time: time(times.end_time)?,
            renew_till: None,
            server_realm,
            server_name,
            client_addresses: None,
        })
        .to_der()
        .map_err(|_| KrbErrorCode::KrbErrGeneric)?;

        let enc_part = tgt
            .session_key
            .encrypt(&enc_part, KEY_USAGE_TGS_REP_SESSION_KEY)
            .map_err(|_| KrbErrorCode::KrbErrGeneric)?;

        KrbKdcRep::TgsRep(KdcRep {
            pvno: 5,
            msg_type: KrbMessageType::KrbTgsRep.into(),
            padata: None,
            crealm,
            cname,
            ticket: ticket.tkt,
            enc_part,
        })
        .to_der()
        .map_err(|_| KrbErrorCode::KrbErrGeneric)
    }

    pub(crate) fn error_reply(code: KrbErrorCode) -> Vec<u8> {
        let (service_name, service_realm): (PrincipalName, _) =
            (&Principal::krbtgt(REALM).expect("Invalid realm"))
                .try_into()
                .expect("Invalid name");

        KrbKdcRep::ErrRep(KdcKrbError {
            pvno: 5,
            msg_type: KrbMessageType::KrbError.into(),
            ctime: None,
            cusec: None,
            stime: kerberos_time(SystemTime::now()).expect("Invalid time"),
            susec: 0,
            error_code: code.into(),
            crealm: None,
            cname: None,
            service_realm,
            service_name,
            error_text: Some(KerberosString::from_str(&format!("{:?}", code)).expect("Invalid text")),
            error_data: None,
        })
        .to_der()
        .expect("Failed to encode krb-error")
    }
}

impl KdcTransport for MockKdc {
    async fn send(&self, request: Vec<u8>) -> Result<Vec<u8>, KrbError> {
        self.requests.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        Ok(match self.process(&request) {
            Ok(reply) => reply,
            Err(code) => {
                debug!(?code, "mock kdc rejecting request");
                Self::error_reply(code)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{sample_ap_req, spnego_wrap, ClientTicket, MockKdc};
    use crate::asn1::constants::errors::KrbErrorCode;
    use crate::delegation::KdcTransport;
    use crate::error::KrbError;
    use crate::proto::KdcReply;

    #[test]
    fn test_fixtures_are_well_formed() {
        let ap_req = sample_ap_req();
        assert_eq!(ap_req[0], 0x6e);
        assert!(!ap_req.windows(2).any(|w| w == [0x01, 0x00]));

        let token = spnego_wrap(&ap_req);
        assert_eq!(&token[..2], &[0x60, 0x82]);
        assert!(token.ends_with(&ap_req));

        let ticket = ClientTicket::alice_to_proxy();
        assert_eq!(ticket.enc_ticket().kvno(), Some(3));
    }

    #[tokio::test]
    async fn test_mock_kdc_rejects_garbage() {
        let kdc = MockKdc::default();
        let reply = kdc.send(vec![0x30, 0x00]).await.expect("Transport failed");

        let KdcReply::Error(err) = KdcReply::from_der(&reply).expect("Invalid reply") else {
            unreachable!();
        };
        assert_eq!(
            err.into_error(),
            KrbError::KdcError(KrbErrorCode::KrbErrGeneric)
        );
        assert_eq!(kdc.requests(), 1);
    }
}

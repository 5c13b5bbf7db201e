use super::{kerberos_time, EncTicket, Principal, ServiceTicket};
use crate::asn1::{
    ap_options::{ApFlags, ApOptions},
    ap_req::ApReq,
    authenticator::{Authenticator, AuthenticatorInner},
    constants::{KrbMessageType, PaDataType},
    kdc_req::KdcReq,
    kdc_req_body::KdcReqBody,
    kerberos_flags::{KdcOptions, KerberosFlags},
    kerberos_string::KerberosString,
    krb_kdc_req::KrbKdcReq,
    pa_data::PaData,
    pa_for_user::PaForUser,
    OctetString,
};
use crate::cksum::ChecksumBuilder;
use crate::constants::{AUTH_PACKAGE_KERBEROS, DEFAULT_TICKET_LIFETIME, KEY_USAGE_TGS_REQ_AUTH};
use crate::error::KrbError;
use der::{asn1::Any, Encode};
use rand::{rng, Rng};
use std::str::FromStr;
use std::time::{Duration, SystemTime};
use tracing::{error, trace};

/// A TGS-REQ ready for the wire. The nonce is kept to check the reply.
#[derive(Debug)]
pub(crate) struct TgsRequest {
    pub(crate) nonce: i32,
    pub(crate) message: KrbKdcReq,
}

impl TgsRequest {
    pub(crate) fn to_der(&self) -> Result<Vec<u8>, KrbError> {
        self.message.to_der().map_err(|err| {
            error!(?err, "unable to encode tgs-req");
            KrbError::DerEncodeKdcReq
        })
    }
}

/// Builds a TGS-REQ authenticated by `tgt`. By default this asks for a plain ticket to
/// `service`; the S4U extensions are switched on with [`s4u2self`](Self::s4u2self) and
/// [`s4u2proxy`](Self::s4u2proxy).
#[derive(Debug)]
pub(crate) struct TgsRequestBuilder<'a> {
    tgt: &'a ServiceTicket,
    service: Principal,
    etypes: Vec<i32>,
    lifetime: Duration,
    for_user: Option<Principal>,
    evidence: Option<&'a EncTicket>,
}

impl<'a> TgsRequestBuilder<'a> {
    pub(crate) fn new(tgt: &'a ServiceTicket, service: Principal) -> Self {
        Self {
            tgt,
            service,
            etypes: Vec::new(),
            lifetime: DEFAULT_TICKET_LIFETIME,
            for_user: None,
            evidence: None,
        }
    }

    pub(crate) fn etypes(mut self, etypes: &[i32]) -> Self {
        self.etypes = etypes.to_vec();
        self
    }

    pub(crate) fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// MS-SFU 3.1.5.1.1.1: ask for a ticket to ourself on behalf of `user`.
    pub(crate) fn s4u2self(mut self, user: Principal) -> Self {
        self.for_user = Some(user);
        self
    }

    /// MS-SFU 3.1.5.2.1: present the client's ticket to us as evidence.
    pub(crate) fn s4u2proxy(mut self, evidence: &'a EncTicket) -> Self {
        self.evidence = Some(evidence);
        self
    }

    pub(crate) fn build(self, now: SystemTime) -> Result<TgsRequest, KrbError> {
        let TgsRequestBuilder {
            tgt,
            service,
            etypes,
            lifetime,
            for_user,
            evidence,
        } = self;

        if etypes.is_empty() {
            return Err(KrbError::UnsupportedEncryption);
        }

        // MIT rejects negative nonces.
        let nonce: i32 = rng().random_range(0..i32::MAX);

        let mut kdc_options: KdcOptions = KerberosFlags::none();
        kdc_options |= KerberosFlags::Forwardable;
        kdc_options |= KerberosFlags::Renewable;
        kdc_options |= KerberosFlags::Canonicalize;
        if evidence.is_some() {
            kdc_options |= KerberosFlags::CnameInAddlTkt;
        }

        let (sname, realm) = (&service).try_into()?;

        let req_body = KdcReqBody {
            kdc_options,
            cname: None,
            realm,
            sname: Some(sname),
            from: None,
            till: kerberos_time(now + lifetime)?,
            rtime: None,
            nonce,
            etype: etypes,
            addresses: None,
            enc_authorization_data: None,
            additional_tickets: evidence.map(|tkt| vec![tkt.tkt.clone()]),
        };

        trace!(?req_body);

        let req_body = Any::encode_from(&req_body).map_err(|_| KrbError::DerEncodeAny)?;

        let session_key = tgt.session_key();

        //  The checksum in the authenticator is to be computed over the KDC-REQ-BODY encoding.
        let checksum = ChecksumBuilder::try_from(session_key)?.compute_kdc_req_body(&req_body)?;

        let (cname, crealm) = tgt.client().try_into()?;
        let cusec = now
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(|_| KrbError::DoYouHaveATimeMachine)?
            .subsec_micros();

        let authenticator = Authenticator(AuthenticatorInner {
            authenticator_vno: 5,
            crealm,
            cname,
            cksum: Some(checksum),
            cusec,
            ctime: kerberos_time(now)?,
            subkey: None,
            seq_number: None,
            authorization_data: None,
        });

        let authenticator = authenticator
            .to_der()
            .map_err(|_| KrbError::DerEncodeAuthenticator)?;
        // RFC4120 5.5.1, key usage 7 in the PA-TGS-REQ of a TGS-REQ.
        let authenticator = session_key.encrypt(&authenticator, KEY_USAGE_TGS_REQ_AUTH)?;

        let ap_options: ApOptions = ApFlags::none();
        let ap_req = ApReq::new(ap_options, tgt.ticket().tkt.clone(), authenticator);
        let ap_req = ap_req.to_der().map_err(|_| KrbError::DerEncodeApReq)?;

        let mut padata = vec![PaData {
            padata_type: PaDataType::PaTgsReq.into(),
            padata_value: OctetString::new(ap_req).map_err(|_| KrbError::DerEncodeOctetString)?,
        }];

        if let Some(user) = for_user {
            let (user_name, user_realm) = (&user).try_into()?;
            let auth_package = KerberosString::from_str(AUTH_PACKAGE_KERBEROS)?;

            let data = PaForUser::checksum_data(&user_name, &user_realm, &auth_package);
            let cksum = ChecksumBuilder::HmacMd5(session_key).compute_pa_for_user(&data)?;

            let pa_for_user = PaForUser {
                user_name,
                user_realm,
                cksum,
                auth_package,
            }
            .to_der()
            .map_err(|_| KrbError::DerEncodePaForUser)?;

            padata.push(PaData {
                padata_type: PaDataType::PaForUser.into(),
                padata_value: OctetString::new(pa_for_user)
                    .map_err(|_| KrbError::DerEncodeOctetString)?,
            });
        }

        let message = KrbKdcReq::TgsReq(KdcReq {
            pvno: 5,
            msg_type: KrbMessageType::KrbTgsReq.into(),
            padata: Some(padata),
            req_body,
        });

        Ok(TgsRequest { nonce, message })
    }
}

#[cfg(test)]
mod tests {
    use super::TgsRequestBuilder;
    use crate::asn1::ap_req::ApReq;
    use crate::asn1::authenticator::Authenticator;
    use crate::asn1::constants::{ChecksumType, PaDataType};
    use crate::asn1::kdc_req_body::KdcReqBody;
    use crate::asn1::kerberos_flags::KerberosFlags;
    use crate::asn1::krb_kdc_req::KrbKdcReq;
    use crate::asn1::pa_for_user::PaForUser;
    use crate::cksum::ChecksumBuilder;
    use crate::proto::{EncTicket, Principal};
    use crate::testkdc::{proxy_tgt, test_now};
    use der::Decode;
    use std::str::FromStr;

    #[test]
    fn test_s4u2self_request() {
        let _ = tracing_subscriber::fmt::try_init();

        let tgt = proxy_tgt();
        let user = Principal::from_str("alice@EXAMPLE.COM").expect("Invalid name");

        let request = TgsRequestBuilder::new(&tgt, tgt.client().clone())
            .etypes(&[18])
            .s4u2self(user)
            .build(test_now())
            .expect("Failed to build request");

        assert!(request.nonce >= 0);

        let der = request.to_der().expect("Failed to encode");
        let KrbKdcReq::TgsReq(req) = KrbKdcReq::from_der(&der).expect("Failed to decode") else {
            unreachable!();
        };
        assert_eq!(req.pvno, 5);
        assert_eq!(req.msg_type, 12);

        let body: KdcReqBody = req.req_body.decode_as().expect("Invalid req-body");
        assert_eq!(body.nonce, request.nonce);
        assert_eq!(body.etype, vec![18]);
        assert!(body.additional_tickets.is_none());
        assert!(body.kdc_options.contains(KerberosFlags::Forwardable));
        assert!(!body.kdc_options.contains(KerberosFlags::CnameInAddlTkt));
        let sname = body.sname.expect("Missing sname");
        assert_eq!(sname.name_string[0].as_str(), "HTTP");

        let padata = req.padata.expect("Missing padata");
        assert_eq!(padata.len(), 2);
        assert_eq!(padata[0].padata_type, u32::from(PaDataType::PaTgsReq));
        assert_eq!(padata[1].padata_type, u32::from(PaDataType::PaForUser));

        // The authenticator must carry a valid checksum of the request body.
        let ap_req = ApReq::from_der(padata[0].padata_value.as_bytes()).expect("Invalid ap-req");
        let plain = tgt
            .session_key()
            .decrypt(&ap_req.0.authenticator, 7)
            .expect("Failed to decrypt authenticator");
        let auth = Authenticator::from_der(&plain).expect("Invalid authenticator");
        assert_eq!(auth.0.cname.name_string[1].as_str(), "proxy.example.com");
        let expect = ChecksumBuilder::HmacSha196Aes256(tgt.session_key())
            .compute_kdc_req_body(&req.req_body)
            .expect("Failed to checksum");
        assert_eq!(auth.0.cksum, Some(expect));

        let pa_for_user =
            PaForUser::from_der(padata[1].padata_value.as_bytes()).expect("Invalid pa-for-user");
        assert_eq!(pa_for_user.user_name.name_string[0].as_str(), "alice");
        assert_eq!(pa_for_user.user_realm.as_str(), "EXAMPLE.COM");
        assert_eq!(pa_for_user.auth_package.as_str(), "Kerberos");
        assert_eq!(
            pa_for_user.cksum.checksum_type,
            i32::from(ChecksumType::HmacMd5)
        );
    }

    #[test]
    fn test_s4u2proxy_request() {
        let tgt = proxy_tgt();
        let backend = Principal::from_str("hdfs/node1@EXAMPLE.COM").expect("Invalid name");
        // Any ticket works as evidence for the request shape.
        let evidence: EncTicket = tgt.ticket().clone();

        let request = TgsRequestBuilder::new(&tgt, backend)
            .etypes(&[18])
            .s4u2proxy(&evidence)
            .build(test_now())
            .expect("Failed to build request");

        let KrbKdcReq::TgsReq(req) = request.message else {
            unreachable!();
        };

        let body: KdcReqBody = req.req_body.decode_as().expect("Invalid req-body");
        assert!(body.kdc_options.contains(KerberosFlags::CnameInAddlTkt));
        assert!(body.kdc_options.contains(KerberosFlags::Canonicalize));
        let sname = body.sname.expect("Missing sname");
        assert_eq!(sname.name_string[0].as_str(), "hdfs");
        assert_eq!(sname.name_string[1].as_str(), "node1");

        let additional = body.additional_tickets.expect("Missing additional tickets");
        assert_eq!(additional.len(), 1);
        assert_eq!(additional[0], evidence.tkt);

        let padata = req.padata.expect("Missing padata");
        assert_eq!(padata.len(), 1);
    }

    #[test]
    fn test_request_requires_etypes() {
        let tgt = proxy_tgt();
        let backend = Principal::from_str("hdfs/node1@EXAMPLE.COM").expect("Invalid name");
        assert!(TgsRequestBuilder::new(&tgt, backend)
            .build(test_now())
            .is_err());
    }
}

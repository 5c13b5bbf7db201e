use crate::asn1::constants::errors::KrbErrorCode;
use crate::asn1::krb_kdc_rep::KrbKdcRep;
use crate::constants::DEFAULT_IO_MAX_SIZE;
use crate::error::KrbError;
use crate::KdcTcpCodec;
use bytes::Bytes;
use der::Decode;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio_util::codec::{BytesCodec, Framed};
use tokio_util::udp::UdpFramed;
use tracing::{debug, error, trace, warn};

use super::KdcClientConfig;

/// Carries one encoded request to a KDC and brings back the encoded reply.
pub trait KdcTransport: Send + Sync {
    fn send(&self, request: Vec<u8>) -> impl Future<Output = Result<Vec<u8>, KrbError>> + Send;
}

/// RFC4120 7.2, UDP for small messages and TCP for the rest.
#[derive(Debug, Clone)]
pub struct NetworkTransport {
    address: String,
    timeout: Duration,
    udp_preference_limit: usize,
}

impl NetworkTransport {
    pub fn new(config: &KdcClientConfig) -> Self {
        NetworkTransport {
            address: config.address(),
            timeout: config.timeout(),
            udp_preference_limit: config.udp_preference_limit,
        }
    }

    async fn resolve(&self) -> Result<SocketAddr, KrbError> {
        let mut addrs = lookup_host(self.address.as_str()).await.map_err(|err| {
            error!(?err, address = %self.address, "unable to resolve kdc address");
            KrbError::NetworkError
        })?;

        addrs.next().ok_or_else(|| {
            error!(address = %self.address, "kdc address resolved to nothing");
            KrbError::NetworkError
        })
    }

    async fn exchange_udp(addr: SocketAddr, request: Vec<u8>) -> Result<Vec<u8>, KrbError> {
        let bind: SocketAddr = if addr.is_ipv4() {
            ([0u8; 4], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let sock = UdpSocket::bind(bind).await.map_err(|err| {
            error!(?err, "unable to bind udp socket");
            KrbError::NetworkError
        })?;

        let mut framed = UdpFramed::new(sock, BytesCodec::new());
        framed
            .send((Bytes::from(request), addr))
            .await
            .map_err(|err| {
                error!(?err, %addr, "unable to send udp datagram");
                KrbError::NetworkError
            })?;

        // Anything that is not from the KDC is noise on the port.
        while let Some(reply) = framed.next().await {
            match reply {
                Ok((bytes, from)) if from == addr => return Ok(bytes.to_vec()),
                Ok((_, from)) => warn!(%from, "ignoring datagram from unexpected peer"),
                Err(err) => {
                    error!(?err, %addr, "unable to receive udp datagram");
                    return Err(KrbError::NetworkError);
                }
            }
        }

        error!(%addr, "udp socket closed before kdc replied");
        Err(KrbError::NetworkError)
    }

    async fn exchange_tcp(addr: SocketAddr, request: Vec<u8>) -> Result<Vec<u8>, KrbError> {
        let stream = TcpStream::connect(addr).await.map_err(|err| {
            error!(?err, %addr, "unable to connect to kdc");
            KrbError::NetworkError
        })?;

        let mut krb_stream = Framed::new(stream, KdcTcpCodec::default());

        krb_stream.send(request).await.map_err(|err| {
            error!(?err, %addr, "unable to transmit request");
            KrbError::NetworkError
        })?;

        match krb_stream.next().await {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(err)) => {
                error!(?err, %addr, "unable to read kdc reply");
                Err(KrbError::NetworkError)
            }
            None => {
                error!(%addr, "kdc closed the connection without replying");
                Err(KrbError::NetworkError)
            }
        }
    }

    async fn with_timeout<F>(&self, fut: F) -> Result<Vec<u8>, KrbError>
    where
        F: Future<Output = Result<Vec<u8>, KrbError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| {
                error!(timeout = ?self.timeout, address = %self.address, "kdc did not answer in time");
                KrbError::NetworkTimeout
            })?
    }
}

/// KRB_ERR_RESPONSE_TOO_BIG, the KDC wants us to retry over TCP.
fn is_response_too_big(reply: &[u8]) -> bool {
    match KrbKdcRep::from_der(reply) {
        Ok(KrbKdcRep::ErrRep(err)) => {
            err.error_code == i32::from(KrbErrorCode::KrbErrResponseTooBig)
        }
        _ => false,
    }
}

impl KdcTransport for NetworkTransport {
    async fn send(&self, request: Vec<u8>) -> Result<Vec<u8>, KrbError> {
        if request.len() > DEFAULT_IO_MAX_SIZE {
            error!(len = %request.len(), "request is too large to send");
            return Err(KrbError::RequestTooLarge);
        }

        let addr = self.resolve().await?;

        if request.len() > self.udp_preference_limit {
            debug!(%addr, len = %request.len(), "sending request over tcp");
            return self.with_timeout(Self::exchange_tcp(addr, request)).await;
        }

        trace!(%addr, len = %request.len(), "sending request over udp");
        let reply = self
            .with_timeout(Self::exchange_udp(addr, request.clone()))
            .await?;

        if is_response_too_big(&reply) {
            debug!(%addr, "reply too big for udp, retrying over tcp");
            return self.with_timeout(Self::exchange_tcp(addr, request)).await;
        }

        Ok(reply)
    }
}

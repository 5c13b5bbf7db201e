// #![deny(warnings)]

#![warn(unused_extern_crates)]
// Enable some groups of clippy lints.
#![deny(clippy::suspicious)]
#![deny(clippy::perf)]
// Specific lints to enforce.
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::disallowed_types)]
#![deny(clippy::manual_let_else)]
#![allow(clippy::unreachable)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod asn1;
pub mod assembler;
pub mod broker;
pub mod ccache;
pub(crate) mod cksum;
pub mod config;
pub mod constants;
pub mod credentials;
pub(crate) mod crypto;
pub mod delegation;
pub mod error;
pub mod keytab;
pub mod proto;
pub mod token;
pub mod validator;

#[cfg(test)]
pub(crate) mod testkdc;

pub use crate::asn1::constants::errors::KrbErrorCode;
pub use crate::asn1::ticket_flags::TicketFlags;

use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::constants::DEFAULT_IO_MAX_SIZE;

/// RFC4120 7.2.2 framing, every message is preceded by its length as a four byte big
/// endian integer.
pub struct KdcTcpCodec {
    max_size: usize,
}

impl Default for KdcTcpCodec {
    fn default() -> Self {
        KdcTcpCodec {
            max_size: DEFAULT_IO_MAX_SIZE,
        }
    }
}

impl KdcTcpCodec {
    pub fn new(max_size: usize) -> Self {
        KdcTcpCodec { max_size }
    }
}

impl Decoder for KdcTcpCodec {
    type Item = Vec<u8>;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if buf.len() < 4 {
            return Ok(None);
        }

        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&buf[..4]);
        let d_len = u32::from_be_bytes(len_bytes) as usize;

        // The high bit is reserved for extensions nobody implements, so it falls out here
        // as an oversized message.
        if d_len > self.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("message of {} bytes exceeds {}", d_len, self.max_size),
            ));
        }

        if buf.len() < 4 + d_len {
            buf.reserve(4 + d_len - buf.len());
            return Ok(None);
        }

        buf.advance(4);
        Ok(Some(buf.split_to(d_len).to_vec()))
    }
}

impl Encoder<Vec<u8>> for KdcTcpCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: Vec<u8>, buf: &mut BytesMut) -> io::Result<()> {
        if msg.len() > self.max_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("message of {} bytes exceeds {}", msg.len(), self.max_size),
            ));
        }

        buf.reserve(4 + msg.len());
        buf.put_u32(msg.len() as u32);
        buf.extend_from_slice(&msg);
        Ok(())
    }
}

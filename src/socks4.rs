//! The SOCKS4 / SOCKS4a client connection.
//!
//! A trivial linear state progression: `Initial` → (after `request`) →
//! `RequestSent` → (after one valid reply) → `Replied`. There is no
//! authentication sub-negotiation and no address-type byte on the wire;
//! IPv4 is the only address SOCKS4 natively understands, with SOCKS4a's
//! `0.0.0.x` sentinel used to smuggle a trailing domain name past
//! servers that only speak plain SOCKS4.

use byteorder::{BigEndian, ByteOrder};

use crate::error::ProtocolError;
use crate::utils::{self, AddressType};

const VERSION: u8 = 0x04;
const NULL_BYTE: u8 = 0x00;

/// Commands a SOCKS4 client may request of the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks4Command {
    Connect = 0x01,
    Bind = 0x02,
}

/// Reply codes a SOCKS4 server may return. Any other value is rejected
/// as `ProtocolError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks4ReplyCode {
    RequestGranted = 0x5A,
    RequestRejectedOrFailed = 0x5B,
    RequestRejectedNoIdentd = 0x5C,
    RequestRejectedUseridMismatch = 0x5D,
}

impl Socks4ReplyCode {
    fn from_wire_byte(byte: u8) -> Result<Socks4ReplyCode, ProtocolError> {
        match byte {
            0x5A => Ok(Socks4ReplyCode::RequestGranted),
            0x5B => Ok(Socks4ReplyCode::RequestRejectedOrFailed),
            0x5C => Ok(Socks4ReplyCode::RequestRejectedNoIdentd),
            0x5D => Ok(Socks4ReplyCode::RequestRejectedUseridMismatch),
            other => Err(ProtocolError::new(format!(
                "unknown SOCKS4 reply code: {:#04x}",
                other
            ))),
        }
    }
}

/// The event produced by a successfully parsed SOCKS4 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Reply {
    pub reply_code: Socks4ReplyCode,
    pub port: u16,
    pub addr: String,
}

/// The connection's externally observable progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks4State {
    Initial,
    RequestSent,
    Replied,
}

/// A SOCKS4 / SOCKS4a client protocol state machine.
///
/// Owns no socket; the caller drains `data_to_send()` to a transport and
/// feeds received bytes to `receive_data()`.
pub struct Socks4Connection {
    user_id: Vec<u8>,
    allow_domain_names: bool,
    state: Socks4State,
    send_buffer: Vec<u8>,
}

impl Socks4Connection {
    /// Creates a new connection in state `Initial`. `user_id` may be
    /// empty. `allow_domain_names` gates whether `request` is permitted
    /// to encode a domain name using the SOCKS4a sentinel.
    pub fn new(user_id: Vec<u8>, allow_domain_names: bool) -> Socks4Connection {
        Socks4Connection {
            user_id,
            allow_domain_names,
            state: Socks4State::Initial,
            send_buffer: Vec::new(),
        }
    }

    /// The connection's current state.
    pub fn state(&self) -> Socks4State {
        self.state
    }

    /// Drains and returns the pending outbound bytes. Returns an empty
    /// vector if nothing is pending.
    pub fn data_to_send(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.send_buffer)
    }

    /// Stages a SOCKS4/4a request frame and advances the state to
    /// `RequestSent`.
    ///
    /// Frame layout: `0x04 | command(1) | port(2 be) | dest-ip(4) |
    /// user_id | 0x00`, optionally extended with `addr-bytes | 0x00`
    /// when `addr` is a domain name and `allow_domain_names` is set.
    pub fn request(
        &mut self,
        command: Socks4Command,
        addr: &str,
        port: u16,
    ) -> Result<(), ProtocolError> {
        if self.user_id.contains(&NULL_BYTE) {
            return Err(ProtocolError::new("user_id must not contain a NUL byte"));
        }

        let (dest_ip, trailing_domain): ([u8; 4], Option<&str>) = match utils::classify(addr) {
            AddressType::IPv4 => (
                utils::pack_ipv4(addr)
                    .map_err(|_| ProtocolError::new("malformed IPv4 address"))?,
                None,
            ),
            AddressType::IPv6 => {
                return Err(ProtocolError::new("SOCKS4 has no IPv6 address encoding"));
            }
            AddressType::DomainName => {
                if !self.allow_domain_names {
                    return Err(ProtocolError::new(
                        "domain names are not allowed on this SOCKS4 connection (enable SOCKS4a)",
                    ));
                }
                ([0x00, 0x00, 0x00, 0x01], Some(addr))
            }
        };

        let mut frame = Vec::with_capacity(9 + self.user_id.len() + trailing_domain.map_or(0, |d| d.len() + 1));
        frame.push(VERSION);
        frame.push(command as u8);

        let mut port_bytes = [0u8; 2];
        BigEndian::write_u16(&mut port_bytes, port);
        frame.extend_from_slice(&port_bytes);

        frame.extend_from_slice(&dest_ip);
        frame.extend_from_slice(&self.user_id);
        frame.push(NULL_BYTE);

        if let Some(domain) = trailing_domain {
            frame.extend_from_slice(domain.as_bytes());
            frame.push(NULL_BYTE);
        }

        self.send_buffer.extend_from_slice(&frame);
        self.state = Socks4State::RequestSent;
        Ok(())
    }

    /// Parses one SOCKS4 reply frame (exactly 8 bytes:
    /// `null(1) | reply_code(1) | port(2) | ip(4)`), producing a
    /// `Socks4Reply` event and advancing the state to `Replied`.
    ///
    /// On any malformed input the state is left unchanged.
    pub fn receive_data(&mut self, data: &[u8]) -> Result<Socks4Reply, ProtocolError> {
        if data.len() != 8 {
            return Err(ProtocolError::new(format!(
                "expected an 8-byte SOCKS4 reply, got {} bytes",
                data.len()
            )));
        }
        if data[0] != NULL_BYTE {
            return Err(ProtocolError::new(format!(
                "expected a null first byte in a SOCKS4 reply, got {:#04x}",
                data[0]
            )));
        }

        let reply_code = Socks4ReplyCode::from_wire_byte(data[1])?;
        let port = BigEndian::read_u16(&data[2..4]);
        let mut ip = [0u8; 4];
        ip.copy_from_slice(&data[4..8]);
        let addr = utils::unpack_ipv4(ip);

        self.state = Socks4State::Replied;
        Ok(Socks4Reply {
            reply_code,
            port,
            addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_connect_to_loopback() {
        let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
        conn.request(Socks4Command::Connect, "127.0.0.1", 8080).unwrap();

        let data = conn.data_to_send();
        assert_eq!(
            data,
            vec![
                0x04, 0x01, 0x1F, 0x90, 0x7F, 0x00, 0x00, 0x01, 0x73, 0x6F, 0x63, 0x6B, 0x73, 0x00
            ]
        );
        assert_eq!(conn.state(), Socks4State::RequestSent);
    }

    #[test]
    fn bind_command_uses_correct_byte() {
        let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
        conn.request(Socks4Command::Bind, "127.0.0.1", 8080).unwrap();
        let data = conn.data_to_send();
        assert_eq!(data[1], 0x02);
    }

    #[test]
    fn s2_reply_parse() {
        let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
        let reply = conn
            .receive_data(&[0x00, 0x5A, 0x1F, 0x90, 0x7F, 0x00, 0x00, 0x01])
            .unwrap();

        assert_eq!(
            reply,
            Socks4Reply {
                reply_code: Socks4ReplyCode::RequestGranted,
                port: 8080,
                addr: "127.0.0.1".to_string(),
            }
        );
        assert_eq!(conn.state(), Socks4State::Replied);
    }

    #[test]
    fn every_defined_reply_code_round_trips() {
        for code in [
            Socks4ReplyCode::RequestGranted,
            Socks4ReplyCode::RequestRejectedOrFailed,
            Socks4ReplyCode::RequestRejectedNoIdentd,
            Socks4ReplyCode::RequestRejectedUseridMismatch,
        ] {
            let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
            let reply = conn
                .receive_data(&[0x00, code as u8, 0x1F, 0x90, 0x7F, 0x00, 0x00, 0x01])
                .unwrap();
            assert_eq!(reply.reply_code, code);
        }
    }

    #[test]
    fn s3_malformed_bad_leading_byte() {
        let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
        let result = conn.receive_data(&[0x0F, 0x5A, 0x1F, 0x90, 0x7F, 0x00, 0x00, 0x01]);
        assert!(result.is_err());
        assert_eq!(conn.state(), Socks4State::Initial);
    }

    #[test]
    fn rejects_wrong_length_reply() {
        let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
        assert!(conn.receive_data(&[0x00, 0x5A, 0x1F, 0x90, 0x7F, 0x00, 0x00]).is_err());
    }

    #[test]
    fn rejects_unknown_reply_code() {
        let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
        let result = conn.receive_data(&[0x00, 0xFF, 0x1F, 0x90, 0x7F, 0x00, 0x00, 0x01]);
        assert!(result.is_err());
    }

    #[test]
    fn socks4a_domain_name_uses_sentinel_and_trailer() {
        let mut conn = Socks4Connection::new(b"foo".to_vec(), true);
        conn.request(Socks4Command::Connect, "google.com", 80).unwrap();
        let data = conn.data_to_send();

        assert_eq!(&data[0..2], &[0x04, 0x01]);
        assert_eq!(&data[4..8], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(&data[8..11], b"foo");
        assert_eq!(data[11], 0x00);
        assert_eq!(&data[12..22], b"google.com");
        assert_eq!(data[22], 0x00);
    }

    #[test]
    fn domain_name_without_allow_domain_names_is_protocol_error() {
        let mut conn = Socks4Connection::new(b"foo".to_vec(), false);
        assert!(conn.request(Socks4Command::Connect, "google.com", 80).is_err());
    }

    #[test]
    fn ipv6_is_rejected() {
        let mut conn = Socks4Connection::new(Vec::new(), true);
        assert!(conn.request(Socks4Command::Connect, "::1", 80).is_err());
    }

    #[test]
    fn draining_twice_returns_empty_the_second_time() {
        let mut conn = Socks4Connection::new(b"socks".to_vec(), false);
        conn.request(Socks4Command::Connect, "127.0.0.1", 80).unwrap();
        let _ = conn.data_to_send();
        assert!(conn.data_to_send().is_empty());
    }
}

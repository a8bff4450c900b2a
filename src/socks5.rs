//! The SOCKS5 client connection.
//!
//! Threads negotiation → (optional username/password sub-authentication)
//! → request → reply through an explicit state enum and transition
//! table, rather than scattered conditionals; the table below is the
//! normative source for `receive_data`'s dispatch.
//!
//! ```text
//! CLIENT_INIT
//!   --authenticate(methods)-->                 CLIENT_AUTH_SENT
//! CLIENT_AUTH_SENT
//!   --receive_data (method reply)-->            CLIENT_AUTHENTICATED        (NO_AUTH_REQUIRED)
//!   --receive_data (method reply)-->            CLIENT_WAITING_FOR_USERNAME_PASSWORD (USERNAME_PASSWORD)
//!   --receive_data (method reply)-->            MUST_CLOSE                  (anything else)
//! CLIENT_WAITING_FOR_USERNAME_PASSWORD
//!   --authenticate_username_password(...)-->    CLIENT_AUTH_USERNAME_PASSWORD_SENT
//! CLIENT_AUTH_USERNAME_PASSWORD_SENT
//!   --receive_data (auth status)-->             CLIENT_AUTHENTICATED        (status == 0)
//!   --receive_data (auth status)-->             MUST_CLOSE                  (status != 0)
//! CLIENT_AUTHENTICATED
//!   --request(command, addr, port)-->           CLIENT_REQUEST_SENT
//! CLIENT_REQUEST_SENT
//!   --receive_data (request reply)-->           TUNNEL_READY                (rep == SUCCEEDED)
//!   --receive_data (request reply)-->           MUST_CLOSE                  (otherwise)
//! ```

use byteorder::{BigEndian, ByteOrder};

use crate::error::ProtocolError;
use crate::utils::{self, AddressType, SOCKS5AType};

const VERSION: u8 = 0x05;
const USERNAME_PASSWORD_SUBNEGOTIATION_VERSION: u8 = 0x01;
const RESERVED: u8 = 0x00;

/// Authentication methods a SOCKS5 client may offer, and a server may
/// choose among.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SOCKS5AuthMethod {
    NoAuthRequired = 0x00,
    Gssapi = 0x01,
    UsernamePassword = 0x02,
    NoAcceptableMethods = 0xFF,
}

impl SOCKS5AuthMethod {
    fn from_wire_byte(byte: u8) -> Result<SOCKS5AuthMethod, ProtocolError> {
        match byte {
            0x00 => Ok(SOCKS5AuthMethod::NoAuthRequired),
            0x01 => Ok(SOCKS5AuthMethod::Gssapi),
            0x02 => Ok(SOCKS5AuthMethod::UsernamePassword),
            0xFF => Ok(SOCKS5AuthMethod::NoAcceptableMethods),
            other => Err(ProtocolError::new(format!(
                "unknown SOCKS5 auth method: {:#04x}",
                other
            ))),
        }
    }
}

/// Commands a SOCKS5 client may request of the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SOCKS5Command {
    Connect = 0x01,
    Bind = 0x02,
    UdpAssociate = 0x03,
}

/// Reply codes a SOCKS5 server may return in a request reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SOCKS5ReplyCode {
    Succeeded = 0x00,
    GeneralServerFailure = 0x01,
    ConnectionNotAllowed = 0x02,
    NetworkUnreachable = 0x03,
    HostUnreachable = 0x04,
    ConnectionRefused = 0x05,
    TtlExpired = 0x06,
    CommandNotSupported = 0x07,
    AddressTypeNotSupported = 0x08,
}

impl SOCKS5ReplyCode {
    fn from_wire_byte(byte: u8) -> Result<SOCKS5ReplyCode, ProtocolError> {
        match byte {
            0x00 => Ok(SOCKS5ReplyCode::Succeeded),
            0x01 => Ok(SOCKS5ReplyCode::GeneralServerFailure),
            0x02 => Ok(SOCKS5ReplyCode::ConnectionNotAllowed),
            0x03 => Ok(SOCKS5ReplyCode::NetworkUnreachable),
            0x04 => Ok(SOCKS5ReplyCode::HostUnreachable),
            0x05 => Ok(SOCKS5ReplyCode::ConnectionRefused),
            0x06 => Ok(SOCKS5ReplyCode::TtlExpired),
            0x07 => Ok(SOCKS5ReplyCode::CommandNotSupported),
            0x08 => Ok(SOCKS5ReplyCode::AddressTypeNotSupported),
            other => Err(ProtocolError::new(format!(
                "unknown SOCKS5 reply code: {:#04x}",
                other
            ))),
        }
    }
}

/// The connection's externally observable progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks5State {
    ClientInit,
    ClientAuthSent,
    ClientWaitingForUsernamePassword,
    ClientAuthUsernamePasswordSent,
    ClientAuthenticated,
    ClientRequestSent,
    TunnelReady,
    MustClose,
}

/// The method the server chose, in reply to `authenticate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SOCKS5AuthReply {
    pub method: SOCKS5AuthMethod,
}

/// The status of a username/password sub-authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SOCKS5UsernamePasswordAuthReply {
    pub success: bool,
}

/// The server's reply to a `request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SOCKS5Reply {
    pub reply_code: SOCKS5ReplyCode,
    pub atype: SOCKS5AType,
    pub addr: String,
    pub port: u16,
}

/// The tagged union `receive_data` dispatches to, depending on the
/// state the connection was in when the bytes arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SOCKS5Event {
    Auth(SOCKS5AuthReply),
    UsernamePasswordAuth(SOCKS5UsernamePasswordAuthReply),
    Reply(SOCKS5Reply),
}

/// A SOCKS5 client protocol state machine.
///
/// Owns no socket; the caller drains `data_to_send()` to a transport and
/// feeds received bytes to `receive_data()`. Retains the method list
/// offered to `authenticate` so that the server's eventual choice can be
/// validated against it.
pub struct Socks5Connection {
    state: Socks5State,
    send_buffer: Vec<u8>,
    offered_methods: Vec<SOCKS5AuthMethod>,
}

impl Default for Socks5Connection {
    fn default() -> Self {
        Self::new()
    }
}

impl Socks5Connection {
    /// Creates a new connection in state `ClientInit`.
    pub fn new() -> Socks5Connection {
        Socks5Connection {
            state: Socks5State::ClientInit,
            send_buffer: Vec::new(),
            offered_methods: Vec::new(),
        }
    }

    /// The connection's current state.
    pub fn state(&self) -> Socks5State {
        self.state
    }

    /// Drains and returns the pending outbound bytes. Returns an empty
    /// vector if nothing is pending.
    pub fn data_to_send(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.send_buffer)
    }

    /// Stages the method-negotiation frame (`0x05 | count(1) | methods`)
    /// in the caller-supplied order, and advances the state to
    /// `ClientAuthSent`. Legal only in `ClientInit`.
    pub fn authenticate(&mut self, methods: &[SOCKS5AuthMethod]) -> Result<(), ProtocolError> {
        if self.state != Socks5State::ClientInit {
            return Err(ProtocolError::new(format!(
                "authenticate() is illegal in state {:?}",
                self.state
            )));
        }
        if methods.len() > 255 {
            return Err(ProtocolError::new("cannot offer more than 255 auth methods"));
        }

        let mut frame = Vec::with_capacity(2 + methods.len());
        frame.push(VERSION);
        frame.push(methods.len() as u8);
        frame.extend(methods.iter().map(|m| *m as u8));

        self.send_buffer.extend_from_slice(&frame);
        self.offered_methods = methods.to_vec();
        self.state = Socks5State::ClientAuthSent;
        Ok(())
    }

    /// Stages the username/password sub-negotiation frame (`0x01 |
    /// len(username) | username | len(password) | password`) and
    /// advances the state to `ClientAuthUsernamePasswordSent`. Legal
    /// only in `ClientWaitingForUsernamePassword`.
    pub fn authenticate_username_password(
        &mut self,
        username: &[u8],
        password: &[u8],
    ) -> Result<(), ProtocolError> {
        if self.state != Socks5State::ClientWaitingForUsernamePassword {
            return Err(ProtocolError::new(format!(
                "authenticate_username_password() is illegal in state {:?}",
                self.state
            )));
        }
        if username.len() > 255 {
            return Err(ProtocolError::new("username must be at most 255 bytes"));
        }
        if password.len() > 255 {
            return Err(ProtocolError::new("password must be at most 255 bytes"));
        }

        let mut frame = Vec::with_capacity(3 + username.len() + password.len());
        frame.push(USERNAME_PASSWORD_SUBNEGOTIATION_VERSION);
        frame.push(username.len() as u8);
        frame.extend_from_slice(username);
        frame.push(password.len() as u8);
        frame.extend_from_slice(password);

        self.send_buffer.extend_from_slice(&frame);
        self.state = Socks5State::ClientAuthUsernamePasswordSent;
        Ok(())
    }

    /// Stages a request frame (`0x05 | command(1) | 0x00 | atype(1) |
    /// address-payload | port(2 be)`) and advances the state to
    /// `ClientRequestSent`. Legal only in `ClientAuthenticated`.
    ///
    /// The address payload is chosen by classifying `addr`: IPv4 (4
    /// bytes), IPv6 (16 bytes), or domain name (a length-prefixed byte
    /// string, length must be at most 255).
    pub fn request(
        &mut self,
        command: SOCKS5Command,
        addr: &str,
        port: u16,
    ) -> Result<(), ProtocolError> {
        if self.state != Socks5State::ClientAuthenticated {
            return Err(ProtocolError::new(format!(
                "request() is illegal in state {:?}",
                self.state
            )));
        }

        let classification = utils::classify(addr);
        let atype = SOCKS5AType::from_address_type(classification);

        let mut address_payload = Vec::new();
        match classification {
            AddressType::IPv4 => {
                address_payload
                    .extend_from_slice(&utils::pack_ipv4(addr).map_err(|_| {
                        ProtocolError::new("malformed IPv4 address")
                    })?);
            }
            AddressType::IPv6 => {
                address_payload
                    .extend_from_slice(&utils::pack_ipv6(addr).map_err(|_| {
                        ProtocolError::new("malformed IPv6 address")
                    })?);
            }
            AddressType::DomainName => {
                if addr.len() > 255 {
                    return Err(ProtocolError::new("domain name must be at most 255 bytes"));
                }
                address_payload.push(addr.len() as u8);
                address_payload.extend_from_slice(addr.as_bytes());
            }
        }

        let mut frame = Vec::with_capacity(4 + address_payload.len() + 2);
        frame.push(VERSION);
        frame.push(command as u8);
        frame.push(RESERVED);
        frame.push(atype as u8);
        frame.extend_from_slice(&address_payload);

        let mut port_bytes = [0u8; 2];
        BigEndian::write_u16(&mut port_bytes, port);
        frame.extend_from_slice(&port_bytes);

        self.send_buffer.extend_from_slice(&frame);
        self.state = Socks5State::ClientRequestSent;
        Ok(())
    }

    /// Parses one reply frame appropriate to the current state and
    /// advances the state per the transition table in the module docs.
    ///
    /// On any malformed input (wrong length, bad version byte, unknown
    /// code) the state is left unchanged and a `ProtocolError` is
    /// raised.
    pub fn receive_data(&mut self, data: &[u8]) -> Result<SOCKS5Event, ProtocolError> {
        match self.state {
            Socks5State::ClientAuthSent => self.receive_auth_reply(data),
            Socks5State::ClientAuthUsernamePasswordSent => {
                self.receive_username_password_reply(data)
            }
            Socks5State::ClientRequestSent => self.receive_request_reply(data),
            other => Err(ProtocolError::new(format!(
                "receive_data() is illegal in state {:?}",
                other
            ))),
        }
    }

    fn receive_auth_reply(&mut self, data: &[u8]) -> Result<SOCKS5Event, ProtocolError> {
        if data.len() != 2 {
            return Err(ProtocolError::new(format!(
                "expected a 2-byte SOCKS5 auth reply, got {} bytes",
                data.len()
            )));
        }
        if data[0] != VERSION {
            return Err(ProtocolError::new(format!(
                "expected protocol version 0x05 in auth reply, got {:#04x}",
                data[0]
            )));
        }

        let method = SOCKS5AuthMethod::from_wire_byte(data[1])?;

        let (method, next_state) = if !self.offered_methods.contains(&method) {
            (SOCKS5AuthMethod::NoAcceptableMethods, Socks5State::MustClose)
        } else {
            match method {
                SOCKS5AuthMethod::NoAuthRequired => (method, Socks5State::ClientAuthenticated),
                SOCKS5AuthMethod::UsernamePassword => {
                    (method, Socks5State::ClientWaitingForUsernamePassword)
                }
                // GSSAPI is acknowledged as a method code but its
                // sub-protocol is not driven; anything else that somehow
                // made it past the "offered" check also has nowhere to
                // go but closed.
                _ => (method, Socks5State::MustClose),
            }
        };

        self.state = next_state;
        Ok(SOCKS5Event::Auth(SOCKS5AuthReply { method }))
    }

    fn receive_username_password_reply(&mut self, data: &[u8]) -> Result<SOCKS5Event, ProtocolError> {
        if data.len() != 1 {
            return Err(ProtocolError::new(format!(
                "expected a 1-byte username/password auth status, got {} bytes",
                data.len()
            )));
        }

        let success = data[0] == 0x00;
        self.state = if success {
            Socks5State::ClientAuthenticated
        } else {
            Socks5State::MustClose
        };

        Ok(SOCKS5Event::UsernamePasswordAuth(
            SOCKS5UsernamePasswordAuthReply { success },
        ))
    }

    fn receive_request_reply(&mut self, data: &[u8]) -> Result<SOCKS5Event, ProtocolError> {
        if data.len() < 7 {
            return Err(ProtocolError::new(format!(
                "SOCKS5 request reply too short: {} bytes",
                data.len()
            )));
        }
        if data[0] != VERSION {
            return Err(ProtocolError::new(format!(
                "expected protocol version 0x05 in request reply, got {:#04x}",
                data[0]
            )));
        }

        let reply_code = SOCKS5ReplyCode::from_wire_byte(data[1])?;
        let atype = SOCKS5AType::from_wire_byte(data[3])
            .map_err(|e| ProtocolError::new(e.to_string()))?;

        let (addr, expected_len) = match atype {
            SOCKS5AType::Ipv4Address => {
                if data.len() != 10 {
                    return Err(ProtocolError::new(format!(
                        "expected a 10-byte IPv4 request reply, got {} bytes",
                        data.len()
                    )));
                }
                let mut ip = [0u8; 4];
                ip.copy_from_slice(&data[4..8]);
                (utils::unpack_ipv4(ip), 10)
            }
            SOCKS5AType::Ipv6Address => {
                if data.len() != 22 {
                    return Err(ProtocolError::new(format!(
                        "expected a 22-byte IPv6 request reply, got {} bytes",
                        data.len()
                    )));
                }
                let mut ip = [0u8; 16];
                ip.copy_from_slice(&data[4..20]);
                (utils::unpack_ipv6(ip), 22)
            }
            SOCKS5AType::DomainName => {
                let domain_len = data[4] as usize;
                let expected = 7 + domain_len;
                if data.len() != expected {
                    return Err(ProtocolError::new(format!(
                        "expected a {}-byte domain request reply, got {} bytes",
                        expected,
                        data.len()
                    )));
                }
                let domain = String::from_utf8(data[5..5 + domain_len].to_vec())
                    .map_err(|_| ProtocolError::new("domain name is not valid UTF-8"))?;
                (domain, expected)
            }
        };

        let port = BigEndian::read_u16(&data[expected_len - 2..expected_len]);

        self.state = if reply_code == SOCKS5ReplyCode::Succeeded {
            Socks5State::TunnelReady
        } else {
            Socks5State::MustClose
        };

        Ok(SOCKS5Event::Reply(SOCKS5Reply {
            reply_code,
            atype,
            addr,
            port,
        }))
    }
}

use std::fmt;

/// Signals any protocol-level fault: an unexpected frame length, a bad
/// version byte, an unknown enumeration value, an illegal state for the
/// method invoked, a domain name supplied where forbidden, an IPv6
/// address supplied to a SOCKS4 connection, a length-prefix overflow.
///
/// The only correct response to a `ProtocolError` is to abandon the
/// connection; it carries no recovery handle. When it is raised from
/// `receive_data`, the connection's state and send buffer are left
/// untouched, so the host may simply close its socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError(String);

impl ProtocolError {
    pub(crate) fn new(message: impl Into<String>) -> ProtocolError {
        ProtocolError(message.into())
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ProtocolError {}

/// A programming error, distinct from `ProtocolError`: raised when a
/// caller asks for a wire representation of something outside the
/// conversion's defined domain (eg. an address classification tag that
/// does not correspond to any of IPv4/IPv6/domain).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressError(String);

impl AddressError {
    pub(crate) fn new(message: impl Into<String>) -> AddressError {
        AddressError(message.into())
    }
}

impl fmt::Display for AddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for AddressError {}

//! Address classification and the IPv4/IPv6 byte packing used by both
//! connection state machines.
//!
//! Classification tries IPv4 first, IPv6 second, and falls through to
//! treating the string as a domain name, so it never needs to guess: a
//! string is a domain unless it parses cleanly as one of the other two.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::AddressError;

/// The classification of a free-form address string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    IPv4,
    IPv6,
    DomainName,
}

/// Classifies `addr` as an IPv4 address, an IPv6 address, or (by
/// elimination) a domain name.
pub fn classify(addr: &str) -> AddressType {
    if addr.parse::<Ipv4Addr>().is_ok() {
        AddressType::IPv4
    } else if addr.parse::<Ipv6Addr>().is_ok() {
        AddressType::IPv6
    } else {
        AddressType::DomainName
    }
}

/// Packs a dotted-decimal IPv4 address string into its 4 wire bytes.
///
/// Callers are expected to have already classified `addr` as
/// `AddressType::IPv4`; a string that does not parse is a caller bug; we
/// surface it as a `ProtocolError` via the connection layer rather than
/// panicking here.
pub fn pack_ipv4(addr: &str) -> Result<[u8; 4], std::net::AddrParseError> {
    Ok(addr.parse::<Ipv4Addr>()?.octets())
}

/// Packs a colon-hextet IPv6 address string into its 16 wire bytes.
pub fn pack_ipv6(addr: &str) -> Result<[u8; 16], std::net::AddrParseError> {
    Ok(addr.parse::<Ipv6Addr>()?.octets())
}

/// Unpacks 4 wire bytes into the canonical dotted-decimal string.
pub fn unpack_ipv4(bytes: [u8; 4]) -> String {
    Ipv4Addr::from(bytes).to_string()
}

/// Unpacks 16 wire bytes into the canonical, shortest-form colon string
/// (eg. the loopback address decodes to `"::1"`, not
/// `"0:0:0:0:0:0:0:1"`).
pub fn unpack_ipv6(bytes: [u8; 16]) -> String {
    Ipv6Addr::from(bytes).to_string()
}

/// The SOCKS5 wire address-type tag, `0x01` / `0x03` / `0x04`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SOCKS5AType {
    Ipv4Address = 0x01,
    DomainName = 0x03,
    Ipv6Address = 0x04,
}

impl SOCKS5AType {
    /// Maps an address classification to its SOCKS5 wire tag. Total over
    /// the three `AddressType` variants.
    pub fn from_address_type(atype: AddressType) -> SOCKS5AType {
        match atype {
            AddressType::IPv4 => SOCKS5AType::Ipv4Address,
            AddressType::IPv6 => SOCKS5AType::Ipv6Address,
            AddressType::DomainName => SOCKS5AType::DomainName,
        }
    }

    /// Parses a raw wire byte into its `SOCKS5AType`, or an
    /// `AddressError` if it is not one of the three defined tags.
    pub fn from_wire_byte(byte: u8) -> Result<SOCKS5AType, AddressError> {
        match byte {
            0x01 => Ok(SOCKS5AType::Ipv4Address),
            0x03 => Ok(SOCKS5AType::DomainName),
            0x04 => Ok(SOCKS5AType::Ipv6Address),
            other => Err(AddressError::new(format!(
                "unknown SOCKS5 address type: {:#04x}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ipv4() {
        assert_eq!(classify("127.0.0.1"), AddressType::IPv4);
    }

    #[test]
    fn classifies_ipv6() {
        assert_eq!(classify("0:0:0:0:0:0:0:1"), AddressType::IPv6);
        assert_eq!(classify("::1"), AddressType::IPv6);
    }

    #[test]
    fn classifies_domain_name() {
        assert_eq!(classify("localhost"), AddressType::DomainName);
        assert_eq!(classify("example.com"), AddressType::DomainName);
    }

    #[test]
    fn packs_and_unpacks_ipv4() {
        let packed = pack_ipv4("127.0.0.1").unwrap();
        assert_eq!(packed, [0x7f, 0x00, 0x00, 0x01]);
        assert_eq!(unpack_ipv4(packed), "127.0.0.1");
    }

    #[test]
    fn ipv6_loopback_canonicalises_to_shortest_form() {
        let mut bytes = [0u8; 16];
        bytes[15] = 0x01;
        assert_eq!(unpack_ipv6(bytes), "::1");
    }

    #[test]
    fn packs_ipv6() {
        let packed = pack_ipv6("0:0:0:0:0:0:0:1").unwrap();
        let mut expected = [0u8; 16];
        expected[15] = 0x01;
        assert_eq!(packed, expected);
    }

    #[test]
    fn socks5atype_from_address_type_is_total() {
        assert_eq!(
            SOCKS5AType::from_address_type(AddressType::IPv4),
            SOCKS5AType::Ipv4Address
        );
        assert_eq!(
            SOCKS5AType::from_address_type(AddressType::IPv6),
            SOCKS5AType::Ipv6Address
        );
        assert_eq!(
            SOCKS5AType::from_address_type(AddressType::DomainName),
            SOCKS5AType::DomainName
        );
    }

    #[test]
    fn socks5atype_unknown_wire_byte_is_value_error() {
        assert!(SOCKS5AType::from_wire_byte(0xAB).is_err());
    }
}

//! A sans-I/O SOCKS proxy protocol engine.
//!
//! Two pure protocol state machines — one for SOCKS4/4a, one for
//! SOCKS5 — encode client-side requests into byte frames and decode
//! server reply frames into typed events. Neither state machine performs
//! any network I/O: the caller owns the socket, this crate owns the
//! bytes and the state.
//!
//! A typical exchange with either connection type looks like:
//!
//! ```text
//! conn.request(...);              // stages bytes, advances state
//! socket.write_all(&conn.data_to_send());
//! let n = socket.read(&mut buf)?;
//! let event = conn.receive_data(&buf[..n])?;
//! ```
//!
//! See [`socks4::Socks4Connection`] and [`socks5::Socks5Connection`].

/// Error kinds shared by both connection types.
pub mod error;

/// Address classification and IPv4/IPv6 byte packing shared by both
/// connection types.
pub mod utils;

/// The SOCKS4 / SOCKS4a client connection.
pub mod socks4;

/// The SOCKS5 client connection.
pub mod socks5;

pub use error::{AddressError, ProtocolError};

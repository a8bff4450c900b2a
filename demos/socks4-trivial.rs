//! Drives a `Socks4Connection` end to end against a fake in-process
//! server, standing in for a real socket. This demonstrates the
//! data-flow described in the crate docs: stage bytes, flush them to a
//! transport, parse whatever the transport reads back.

use socks_sansio::socks4::{Socks4Command, Socks4Connection, Socks4ReplyCode};

/// A stand-in for "the other end of the socket": replies to a SOCKS4
/// CONNECT with a canned `REQUEST_GRANTED` frame.
fn fake_socks4_server(_request: &[u8]) -> Vec<u8> {
    vec![0x00, 0x5A, 0x1F, 0x90, 0x7F, 0x00, 0x00, 0x01]
}

fn main() {
    let mut conn = Socks4Connection::new(b"socks".to_vec(), false);

    conn.request(Socks4Command::Connect, "127.0.0.1", 8080)
        .expect("staging a SOCKS4 CONNECT request should never fail for a valid IPv4 addr");

    let outbound = conn.data_to_send();
    println!("sending: {:02x?}", outbound);

    let inbound = fake_socks4_server(&outbound);
    println!("received: {:02x?}", inbound);

    let reply = conn
        .receive_data(&inbound)
        .expect("the fake server always answers with a well-formed SOCKS4 reply");
    println!("request reply: {:?}", reply);

    if reply.reply_code != Socks4ReplyCode::RequestGranted {
        eprintln!(
            "server could not connect to the remote host: {:?}",
            reply.reply_code
        );
        std::process::exit(1);
    }

    println!("tunnel to {}:{} is ready", reply.addr, reply.port);
}

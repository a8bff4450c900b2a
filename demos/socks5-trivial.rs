//! Drives a `Socks5Connection` through negotiation (no authentication
//! required) and a CONNECT request against a fake in-process server,
//! standing in for a real socket.

use socks_sansio::socks5::{
    SOCKS5AuthMethod, SOCKS5Command, SOCKS5Event, SOCKS5ReplyCode, Socks5Connection,
};

/// A stand-in for "the other end of the socket": chooses NO_AUTH_REQUIRED
/// and then replies SUCCEEDED to whatever CONNECT request follows.
fn fake_socks5_server(request: &[u8]) -> Vec<u8> {
    if request[0] == 0x05 && request.len() == 3 {
        // Method-negotiation frame: accept NO_AUTH_REQUIRED.
        vec![0x05, 0x00]
    } else {
        // Request frame: always succeed, echoing back an IPv4 bound
        // address of 0.0.0.0:0.
        vec![0x05, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]
    }
}

fn main() {
    let mut conn = Socks5Connection::new();

    conn.authenticate(&[SOCKS5AuthMethod::NoAuthRequired])
        .expect("authenticate() is always legal right after construction");
    let outbound = conn.data_to_send();
    println!("sending: {:02x?}", outbound);

    let inbound = fake_socks5_server(&outbound);
    println!("received: {:02x?}", inbound);

    let event = conn
        .receive_data(&inbound)
        .expect("the fake server always answers with a well-formed method reply");
    println!("auth reply: {:?}", event);

    conn.request(SOCKS5Command::Connect, "127.0.0.1", 1080)
        .expect("request() is legal once the server accepted NO_AUTH_REQUIRED");
    let outbound = conn.data_to_send();
    println!("sending: {:02x?}", outbound);

    let inbound = fake_socks5_server(&outbound);
    println!("received: {:02x?}", inbound);

    let event = conn
        .receive_data(&inbound)
        .expect("the fake server always answers with a well-formed request reply");
    println!("request reply: {:?}", event);

    match event {
        SOCKS5Event::Reply(reply) if reply.reply_code == SOCKS5ReplyCode::Succeeded => {
            println!("tunnel ready");
        }
        SOCKS5Event::Reply(reply) => {
            eprintln!("server refused the request: {:?}", reply.reply_code);
            std::process::exit(1);
        }
        other => unreachable!("unexpected event in CLIENT_REQUEST_SENT state: {:?}", other),
    }
}

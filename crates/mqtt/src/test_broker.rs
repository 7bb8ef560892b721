//! Minimal MQTT 3.1.1 peer for exercising the client against a real socket.
//!
//! Understands just enough framing to accept a session, acknowledge QoS 1
//! publishes and observe what the client sends.

use std::io;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
};

use crate::config::Config;

const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PacketKind {
    Connect,
    Publish,
    PingReq,
    Disconnect,
    Other(u8),
}

impl From<u8> for PacketKind {
    fn from(header: u8) -> Self {
        match header >> 4 {
            1 => PacketKind::Connect,
            3 => PacketKind::Publish,
            12 => PacketKind::PingReq,
            14 => PacketKind::Disconnect,
            other => PacketKind::Other(other),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RawPacket {
    pub kind: PacketKind,
    pub flags: u8,
    pub body: Vec<u8>,
}

impl RawPacket {
    pub fn retain(&self) -> bool {
        self.flags & 0x01 == 0x01
    }

    pub fn qos(&self) -> u8 {
        (self.flags >> 1) & 0x03
    }

    /// Topic, packet id and payload of a PUBLISH.
    pub fn publish_parts(&self) -> (String, Option<u16>, Vec<u8>) {
        let topic_len = u16::from_be_bytes([self.body[0], self.body[1]]) as usize;
        let topic = String::from_utf8_lossy(&self.body[2..2 + topic_len]).into_owned();
        let mut offset = 2 + topic_len;
        let pkid = if self.qos() > 0 {
            let id = u16::from_be_bytes([self.body[offset], self.body[offset + 1]]);
            offset += 2;
            Some(id)
        } else {
            None
        };
        (topic, pkid, self.body[offset..].to_vec())
    }
}

pub(crate) async fn bind() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// A local port nothing is listening on.
pub(crate) async fn closed_port() -> u16 {
    let (listener, port) = bind().await;
    drop(listener);
    port
}

pub(crate) fn config_for(port: u16) -> Config {
    Config {
        base_topic: "sensors/test-node".into(),
        host: "127.0.0.1".into(),
        port,
        client_id: "test-node_sensor_mqtt".into(),
        keep_alive: 60,
        connection_timeout: 5,
        reconnect_delay: 1,
        ..Default::default()
    }
}

pub(crate) async fn read_packet(stream: &mut TcpStream) -> io::Result<RawPacket> {
    let header = stream.read_u8().await?;

    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let byte = stream.read_u8().await?;
        remaining |= ((byte & 0x7f) as usize) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
    }

    let mut body = vec![0; remaining];
    stream.read_exact(&mut body).await?;

    Ok(RawPacket {
        kind: PacketKind::from(header),
        flags: header & 0x0f,
        body,
    })
}

/// Accepts one client, reads CONNECT and answers with an accepting CONNACK.
pub(crate) async fn accept_session(listener: &TcpListener) -> io::Result<(TcpStream, RawPacket)> {
    let (mut stream, _) = listener.accept().await?;
    let connect = read_packet(&mut stream).await?;
    assert_eq!(connect.kind, PacketKind::Connect);
    stream.write_all(&CONNACK_ACCEPTED).await?;
    Ok((stream, connect))
}

pub(crate) async fn puback(stream: &mut TcpStream, pkid: u16) -> io::Result<()> {
    let [hi, lo] = pkid.to_be_bytes();
    stream.write_all(&[0x40, 0x02, hi, lo]).await
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

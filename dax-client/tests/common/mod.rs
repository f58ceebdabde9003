//! Shared mock cluster node for integration tests.
//!
//! The mock speaks just enough of the wire protocol to script exchanges:
//! it decodes the client's self-delimited value stream and replies with
//! encoded error-descriptor/body pairs.

#![allow(dead_code)]

use dax_core::cbor::{encode, try_decode, CborValue};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Binds a loopback listener and returns it with its `dax://` URL.
pub async fn bind_node() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, format!("dax://127.0.0.1:{}", port))
}

/// One accepted client connection on the mock node.
pub struct NodeConn {
    socket: TcpStream,
    buffer: Vec<u8>,
}

impl NodeConn {
    /// Accepts the next connection.
    pub async fn accept(listener: &TcpListener) -> Self {
        let (socket, _) = listener.accept().await.unwrap();
        Self {
            socket,
            buffer: Vec::new(),
        }
    }

    /// Reads exactly `count` top-level values.
    pub async fn read_values(&mut self, count: usize) -> Vec<CborValue> {
        let mut values = Vec::new();
        loop {
            while values.len() < count {
                match try_decode(&self.buffer).unwrap() {
                    Some((value, consumed)) => {
                        values.push(value);
                        self.buffer.drain(..consumed);
                    }
                    None => break,
                }
            }
            if values.len() == count {
                return values;
            }

            let mut chunk = [0u8; 1024];
            let n = self.socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client closed the connection early");
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Consumes the five-value opening handshake, checking the magic.
    pub async fn expect_handshake(&mut self) {
        let values = self.read_values(5).await;
        assert_eq!(values[0], CborValue::text("J7yne5G"));
        assert_eq!(values[1], CborValue::Unsigned(0));
        assert!(values[2].as_text().is_some(), "session id must be text");
        assert!(values[3].get("UserAgent").is_some());
        assert_eq!(values[4], CborValue::Unsigned(0));
    }

    /// Consumes an authorize-connection frame and acknowledges it.
    pub async fn expect_auth(&mut self) -> Vec<CborValue> {
        let values = self.read_values(7).await;
        assert_eq!(values[0], CborValue::Unsigned(1));
        assert_eq!(values[1], CborValue::Unsigned(1489122155));
        self.reply_ok(CborValue::Null).await;
        values
    }

    /// Consumes a regular request, returning its method id and parameters.
    pub async fn expect_request(&mut self) -> (u64, CborValue) {
        let values = self.read_values(3).await;
        assert_eq!(values[0], CborValue::Unsigned(1), "service id");
        let method = values[1].as_unsigned().expect("method id");
        (method, values[2].clone())
    }

    /// Replies with an empty error descriptor and the given body.
    pub async fn reply_ok(&mut self, body: CborValue) {
        let mut bytes = encode(&CborValue::Array(vec![]));
        bytes.extend(encode(&body));
        self.socket.write_all(&bytes).await.unwrap();
    }

    /// Replies with a failing error descriptor; the body is a null.
    pub async fn reply_error(&mut self, status: u64, message: &str) {
        let mut bytes = encode(&CborValue::Array(vec![
            CborValue::Unsigned(status),
            CborValue::text(message),
        ]));
        bytes.extend(encode(&CborValue::Null));
        self.socket.write_all(&bytes).await.unwrap();
    }
}

/// A `DescribeTable` reply body with a hash + range schema.
pub fn describe_table_body(hash: &str, range: Option<&str>) -> CborValue {
    let mut elements = vec![CborValue::map([
        ("AttributeName", CborValue::text(hash)),
        ("KeyType", CborValue::text("HASH")),
        ("AttributeType", CborValue::text("S")),
    ])];
    if let Some(range) = range {
        elements.push(CborValue::map([
            ("AttributeName", CborValue::text(range)),
            ("KeyType", CborValue::text("RANGE")),
            ("AttributeType", CborValue::text("N")),
        ]));
    }
    CborValue::map([(
        "Table",
        CborValue::map([("KeySchema", CborValue::Array(elements))]),
    )])
}

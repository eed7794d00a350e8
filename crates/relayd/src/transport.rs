//! Newline-delimited JSON transport over pooled TCP connections
//!
//! The delivery stub behind the dispatch workers: one pooled TCP connection
//! per loan, records serialized as one JSON object per line. Connects and
//! writes with the per-family timeouts from config; a timed-out or broken
//! write surfaces as a transport error and the worker force-closes the
//! connection.

use std::io::Write;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use async_trait::async_trait;
use relay_pipeline::Transport;
use relay_pool::{BoxError, ConnFactory, PoolConn};
use serde::Serialize;

/// Pooled TCP connection carrying newline-delimited JSON
pub struct LineConn {
    name: String,
    stream: Option<TcpStream>,
}

impl LineConn {
    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.write_all(buf),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "connection already closed",
            )),
        }
    }
}

impl PoolConn for LineConn {
    fn name(&self) -> &str {
        &self.name
    }

    fn closed(&self) -> bool {
        self.stream.is_none()
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }
}

/// Connection factory for one backend address.
///
/// Dials with `conn_timeout`; the established stream carries `call_timeout`
/// as its write timeout. A failed dial leaves nothing behind - the factory
/// owns cleanup of partial connects, the pool only sees the error.
pub fn line_factory(
    address: &str,
    conn_timeout: Duration,
    call_timeout: Duration,
) -> ConnFactory<LineConn> {
    let address = address.to_string();
    Box::new(move |name: &str| {
        let addr = address.to_socket_addrs()?.next().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("cannot resolve '{address}'"),
            )
        })?;
        let stream = TcpStream::connect_timeout(&addr, conn_timeout)?;
        stream.set_write_timeout(Some(call_timeout))?;
        stream.set_nodelay(true)?;
        Ok(LineConn {
            name: name.to_string(),
            stream: Some(stream),
        })
    })
}

/// Serializes a batch as JSON lines and writes it through the loaned
/// connection
///
/// The write is a short blocking call (bounded by the stream's write
/// timeout) run via `block_in_place`, so it never parks the runtime.
pub struct LineTransport;

#[async_trait]
impl<R> Transport<R> for LineTransport
where
    R: Serialize + Send + Sync + 'static,
{
    type Conn = LineConn;

    async fn deliver(
        &self,
        conn: &mut LineConn,
        batch: &[R],
    ) -> std::result::Result<(), BoxError> {
        let mut buf = Vec::with_capacity(batch.len() * 128);
        for record in batch {
            serde_json::to_writer(&mut buf, record)?;
            buf.push(b'\n');
        }

        tokio::task::block_in_place(|| conn.write_all(&buf))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;

    use super::*;

    #[test]
    fn test_factory_connects_and_names() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let factory = line_factory(
            &address,
            Duration::from_millis(500),
            Duration::from_millis(500),
        );
        let mut conn = factory("test_0_0").unwrap();
        assert_eq!(conn.name(), "test_0_0");
        assert!(!conn.closed());
        conn.close();
        assert!(conn.closed());
        // idempotent
        conn.close();
    }

    #[test]
    fn test_factory_refused_propagates() {
        // a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let factory = line_factory(
            &address,
            Duration::from_millis(200),
            Duration::from_millis(200),
        );
        assert!(factory("test_0_0").is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deliver_writes_json_lines() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let reader = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut lines = Vec::new();
            for line in BufReader::new(stream).lines() {
                match line {
                    Ok(line) => lines.push(line),
                    Err(_) => break,
                }
            }
            lines
        });

        let factory = line_factory(
            &address,
            Duration::from_millis(500),
            Duration::from_millis(500),
        );
        let mut conn = factory("test_0_0").unwrap();

        let transport = LineTransport;
        let batch = vec![
            serde_json::json!({"metric": "cpu.idle", "value": 1.0}),
            serde_json::json!({"metric": "cpu.idle", "value": 2.0}),
        ];
        Transport::deliver(&transport, &mut conn, &batch)
            .await
            .unwrap();
        conn.close();

        let lines = reader.join().unwrap();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first["value"], 1.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deliver_on_closed_conn_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let factory = line_factory(
            &address,
            Duration::from_millis(500),
            Duration::from_millis(500),
        );
        let mut conn = factory("test_0_0").unwrap();
        conn.close();

        let transport = LineTransport;
        let batch = vec![serde_json::json!({"metric": "cpu.idle"})];
        assert!(Transport::deliver(&transport, &mut conn, &batch)
            .await
            .is_err());
    }
}

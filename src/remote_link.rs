// src/remote_link.rs
//
// Default RemoteLink transport: newline-delimited JSON envelopes over
// a plain TCP subscription.
//
//   {"channel":"frame","payload":"<base64 jpeg>"}
//   {"channel":"light","payload":{"light":"RED","countdown":9}}

use crate::ingest::{LinkEvent, RemoteLink};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct Envelope {
    channel: String,
    payload: serde_json::Value,
}

pub struct TcpJsonLink {
    addr: String,
    lines: Option<Lines<BufReader<TcpStream>>>,
}

impl TcpJsonLink {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            lines: None,
        }
    }
}

#[async_trait]
impl RemoteLink for TcpJsonLink {
    async fn connect(&mut self) -> Result<()> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("Failed to connect remote link {}", self.addr))?;
        self.lines = Some(BufReader::new(stream).lines());
        Ok(())
    }

    async fn recv(&mut self) -> Result<LinkEvent> {
        let lines = match self.lines.as_mut() {
            Some(lines) => lines,
            None => bail!("remote link not connected"),
        };

        // Junk lines and unknown channels are skipped, not fatal; the
        // connection only ends on a transport error or EOF.
        loop {
            let line = match lines.next_line().await? {
                Some(line) => line,
                None => bail!("remote link closed by peer"),
            };
            if line.trim().is_empty() {
                continue;
            }
            let envelope: Envelope = match serde_json::from_str(&line) {
                Ok(envelope) => envelope,
                Err(e) => {
                    debug!("Skipping malformed link line: {}", e);
                    continue;
                }
            };
            match envelope.channel.as_str() {
                "frame" => match envelope.payload.as_str() {
                    Some(text) => return Ok(LinkEvent::Frame(text.as_bytes().to_vec())),
                    None => debug!("Frame envelope without string payload"),
                },
                "light" => {
                    if let Ok(bytes) = serde_json::to_vec(&envelope.payload) {
                        return Ok(LinkEvent::Light(bytes));
                    }
                }
                other => debug!("Ignoring unknown link channel {:?}", other),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.lines = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn receives_frame_and_light_events() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket
                .write_all(b"{\"channel\":\"frame\",\"payload\":\"/9j/AAAA\"}\n")
                .await
                .unwrap();
            socket.write_all(b"not json\n").await.unwrap();
            socket
                .write_all(b"{\"channel\":\"telemetry\",\"payload\":1}\n")
                .await
                .unwrap();
            socket
                .write_all(b"{\"channel\":\"light\",\"payload\":{\"light\":\"GREEN\",\"countdown\":4}}\n")
                .await
                .unwrap();
        });

        let mut link = TcpJsonLink::new(addr.to_string());
        link.connect().await.unwrap();

        let first = link.recv().await.unwrap();
        assert_eq!(first, LinkEvent::Frame(b"/9j/AAAA".to_vec()));

        // The junk line and the unknown channel are skipped.
        let second = link.recv().await.unwrap();
        match second {
            LinkEvent::Light(bytes) => {
                let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
                assert_eq!(value["light"], "GREEN");
                assert_eq!(value["countdown"], 4);
            }
            other => panic!("expected light event, got {:?}", other),
        }

        // Peer hangup surfaces as an error so the ingest worker can
        // back off and reconnect.
        assert!(link.recv().await.is_err());
    }

    #[tokio::test]
    async fn connect_fails_when_peer_is_down() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut link = TcpJsonLink::new(addr.to_string());
        assert!(link.connect().await.is_err());
    }

    #[tokio::test]
    async fn recv_before_connect_is_an_error() {
        let mut link = TcpJsonLink::new("127.0.0.1:9");
        assert!(link.recv().await.is_err());
    }
}

// src/bus.rs
//
// Outbound HTTP fan-out: violation storage and the message bus.
// Every publish is fire-and-forget so a slow or dead endpoint can
// never stall the detection loop.

use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::PublishConfig;

pub const VIOLATION_TOPIC: &str = "traffic/ai/violation";
pub const CONTEXT_TOPIC: &str = "traffic/ai/context";

#[derive(Clone)]
pub struct BusClient {
    http: reqwest::Client,
    storage_url: String,
    bus_url: String,
}

impl BusClient {
    pub fn new(config: &PublishConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            storage_url: config.storage_url.clone(),
            bus_url: config.bus_url.clone(),
        })
    }

    /// POST the full violation record to the storage endpoint.
    pub fn send_to_storage(&self, body: Value) {
        self.post_detached(self.storage_url.clone(), body, "storage");
    }

    /// POST a message to a bus topic.
    pub fn send_to_bus(&self, topic: &str, body: Value) {
        self.post_detached(self.topic_url(topic), body, "bus");
    }

    fn topic_url(&self, topic: &str) -> String {
        format!("{}/{}", self.bus_url.trim_end_matches('/'), topic)
    }

    fn post_detached(&self, url: String, body: Value, target: &'static str) {
        let http = self.http.clone();
        tokio::spawn(async move {
            match http.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!("🌐 Delivered to {} ({})", target, url);
                }
                Ok(resp) => {
                    warn!("🌐 {} endpoint returned {} for {}", target, resp.status(), url);
                }
                Err(e) => {
                    warn!("🌐 Failed to reach {} at {}: {}", target, url, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_config(bus_url: &str) -> PublishConfig {
        PublishConfig {
            storage_url: "http://127.0.0.1:1/api/violations".to_string(),
            bus_url: bus_url.to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn topic_urls_join_cleanly() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let plain = BusClient::new(&test_config("http://bus:8081/publish")).unwrap();
        assert_eq!(
            plain.topic_url(VIOLATION_TOPIC),
            "http://bus:8081/publish/traffic/ai/violation"
        );

        let trailing = BusClient::new(&test_config("http://bus:8081/publish/")).unwrap();
        assert_eq!(
            trailing.topic_url(CONTEXT_TOPIC),
            "http://bus:8081/publish/traffic/ai/context"
        );
    }

    /// Minimal one-shot HTTP server: reads a full request, answers 200,
    /// and hands the raw request text back for inspection.
    async fn capture_one_request(listener: TcpListener) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "client hung up before sending a full request");
            raw.extend_from_slice(&chunk[..n]);
            if let Some(header_end) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&raw[..header_end]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if raw.len() >= header_end + 4 + body_len {
                    break;
                }
            }
        }
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\n\r\n")
            .await
            .unwrap();
        String::from_utf8_lossy(&raw).to_string()
    }

    #[tokio::test]
    async fn bus_publish_posts_json_to_the_topic_path() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(capture_one_request(listener));

        let client = BusClient::new(&test_config(&format!("http://{addr}/publish"))).unwrap();
        client.send_to_bus(VIOLATION_TOPIC, json!({"plate": "36F-8888"}));

        let request = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(request.starts_with("POST /publish/traffic/ai/violation HTTP/1.1"));
        assert!(request.contains("36F-8888"));
    }

    #[tokio::test]
    async fn storage_publish_posts_the_full_record() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(capture_one_request(listener));

        let mut config = test_config("http://127.0.0.1:1/publish");
        config.storage_url = format!("http://{addr}/api/violations");
        let client = BusClient::new(&config).unwrap();
        client.send_to_storage(json!({"plate": "29H1-2345", "image_b64": "abcd"}));

        let request = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(request.starts_with("POST /api/violations HTTP/1.1"));
        assert!(request.contains("image_b64"));
    }
}

use std::time::Duration;

use reqwest::Client;

use serde::Serialize;

use tracing::debug;

use crate::error::{Error, ErrorKind, Result};

fn telemetry_error(info: String) -> Error {
    Error::new(ErrorKind::TelemetryFailure, info)
}

/// A telemetry record, sent on every report slot.
///
/// Humidity and temperature are `null` until the first valid climate
/// measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    /// RFC 3339 timestamp.
    pub timestamp: String,
    /// Device identifier.
    #[serde(rename = "from")]
    pub device_id: String,
    /// Ambient luminosity.
    pub luminosity: f32,
    /// Lamp drive, as a percentage.
    pub lamp: f32,
    /// Current consigne.
    pub consigne: f32,
    /// Latest valid humidity.
    pub humidity: Option<f32>,
    /// Latest valid temperature.
    pub temperature: Option<f32>,
}

/// A destination for telemetry records.
pub trait TelemetrySink {
    /// Delivers a record.
    ///
    /// # Errors
    ///
    /// Delivery failures are reported as [`ErrorKind::TelemetryFailure`].
    /// Records are never retried.
    fn send(&mut self, record: &TelemetryRecord) -> impl Future<Output = Result<()>>;
}

/// Posts records as JSON to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    /// Creates an [`HttpSink`] for the given endpoint.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::new(ErrorKind::Configuration, format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// The endpoint records are posted to.
    #[must_use]
    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TelemetrySink for HttpSink {
    async fn send(&mut self, record: &TelemetryRecord) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .map_err(|e| telemetry_error(format!("Unable to reach {}: {e}", self.endpoint)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(telemetry_error(format!("Endpoint answered {status}: {body}")));
        }

        debug!(%status, "Telemetry record delivered");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use serde_json::json;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    pub(crate) fn record() -> TelemetryRecord {
        TelemetryRecord {
            timestamp: "2024-05-01T13:00:00Z".into(),
            device_id: "garden-1".into(),
            luminosity: 500.0,
            lamp: 100.0,
            consigne: 1000.0,
            humidity: None,
            temperature: None,
        }
    }

    /// Keeps every record sent, or fails them all.
    #[derive(Default)]
    pub(crate) struct MemorySink {
        pub(crate) records: Vec<TelemetryRecord>,
        pub(crate) failing: bool,
    }

    impl TelemetrySink for MemorySink {
        async fn send(&mut self, record: &TelemetryRecord) -> Result<()> {
            if self.failing {
                return Err(telemetry_error("Unreachable".into()));
            }
            self.records.push(record.clone());
            Ok(())
        }
    }

    // Answers a single request with `status` and returns the request body.
    async fn one_shot_server(status: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/api/log", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buffer = [0u8; 1024];
            loop {
                let read = stream.read(&mut buffer).await.unwrap();
                request.extend_from_slice(&buffer[..read]);
                if let Some(body) = complete_body(&request) {
                    let response = format!(
                        "HTTP/1.1 {status}\r\ncontent-length: 2\r\nconnection: close\r\n\r\nok"
                    );
                    stream.write_all(response.as_bytes()).await.unwrap();
                    stream.shutdown().await.unwrap();
                    return body;
                }
                if read == 0 {
                    return String::new();
                }
            }
        });

        (endpoint, handle)
    }

    fn complete_body(request: &[u8]) -> Option<String> {
        let text = std::str::from_utf8(request).ok()?;
        let (head, body) = text.split_once("\r\n\r\n")?;
        let length = head.lines().find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })?;
        (body.len() >= length).then(|| body.to_owned())
    }

    #[test]
    fn test_record_serialization() {
        let mut record = record();
        record.humidity = Some(60.0);
        record.temperature = Some(-10.5);

        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({
                "timestamp": "2024-05-01T13:00:00Z",
                "from": "garden-1",
                "luminosity": 500.0,
                "lamp": 100.0,
                "consigne": 1000.0,
                "humidity": 60.0,
                "temperature": -10.5,
            })
        );
    }

    #[test]
    fn test_missing_climate_is_null() {
        let value = serde_json::to_value(record()).unwrap();

        assert!(value["humidity"].is_null());
        assert!(value["temperature"].is_null());
    }

    #[tokio::test]
    async fn test_http_sink_posts_json() {
        let (endpoint, server) = one_shot_server("200 OK").await;
        let mut sink = HttpSink::new(endpoint, Duration::from_secs(2)).unwrap();

        sink.send(&record()).await.unwrap();

        let body: serde_json::Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(body["from"], "garden-1");
        assert_eq!(body["consigne"], 1000.0);
    }

    #[tokio::test]
    async fn test_http_sink_rejected_record() {
        let (endpoint, server) = one_shot_server("500 Internal Server Error").await;
        let mut sink = HttpSink::new(endpoint, Duration::from_secs(2)).unwrap();

        let err = sink.send(&record()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TelemetryFailure);
        assert!(err.info().contains("500"));
        let _ = server.await.unwrap();
    }

    #[tokio::test]
    async fn test_http_sink_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/api/log", listener.local_addr().unwrap());
        drop(listener);
        let mut sink = HttpSink::new(endpoint, Duration::from_millis(500)).unwrap();

        let err = sink.send(&record()).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TelemetryFailure);
    }
}

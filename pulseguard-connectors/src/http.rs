//! HTTP connector: direct delivery and remote schedule lookup
//!
//! ## Overview
//!
//! Both calls go to the same collector service and share one [`HttpClient`]
//! (one `ureq` agent, one connection pool):
//!
//! ```text
//! POST {base}/sensor                      201 = delivered
//!   Content-Type: application/json
//!   x-api-key: <key>
//!   {"device_id": "...", "data": {"bpm": 72.0, "spo2": 98.0}}
//!
//! GET  {base}/users/device/{device_id}    200 = schedule
//!   {"measurementInterval": 30, "startTime": "06:00", "endTime": "22:00"}
//! ```
//!
//! ## Connectivity
//!
//! HTTP has no session, so the client infers the link from the last request.
//! A network-level failure (DNS, refused, timeout) marks the link down. Clones
//! of one [`HttpClient`] share that state, so a failed publish also holds back
//! the schedule lookup and the other way round. While down, `is_connected`
//! reports `false`, the gateway fast-fails with `Unreachable` and
//! [`HttpConfigSource`] returns `ConfigError::Unreachable` without a request.
//! After `probe_interval` the next call goes out again. Any HTTP response, even
//! an error status, marks the link up.
//!
//! No retries happen here: one call is one request.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pulseguard_connectors::http::{HttpClient, HttpConfig, HttpConfigSource, HttpTransport};
//! use pulseguard_core::{ConfigSource, DeviceId};
//!
//! let config = HttpConfig::new("http://collector.local:3000")
//!     .api_key("3786bc99-d8f4-428c-80a3-33fd7afaf5de")
//!     .timeout_secs(10);
//!
//! let client = HttpClient::new(config)?;
//! let transport = HttpTransport::new(client.clone());
//! let mut schedule = HttpConfigSource::new(client);
//!
//! let config = schedule.fetch(&DeviceId::new("e00fce68d1b2c3a4f5e6d7c8"));
//! # let _ = (transport, config);
//! # Ok::<(), pulseguard_connectors::HttpError>(())
//! ```

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use pulseguard_core::{
    ConfigError, DeviceId, Reading, ScheduleConfig, Transport, TransportError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path of the direct delivery endpoint
pub const DIRECT_PATH: &str = "/sensor";

/// Path prefix of the schedule lookup; the device id is appended
pub const SCHEDULE_PATH_PREFIX: &str = "/users/device/";

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "x-api-key";

/// Status the collector answers a stored reading with
pub const STATUS_CREATED: u16 = 201;

/// Status of a successful schedule lookup
pub const STATUS_OK: u16 = 200;

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network-level failure, no response received
    #[error("Request failed: {0}")]
    Request(String),

    /// Server answered with an unexpected status
    #[error("Server returned status {status}")]
    Status {
        /// HTTP status code
        status: u16,
    },

    /// Body could not be encoded or read
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl HttpError {
    /// Delivery error as seen by the gateway
    pub fn transport_error(&self) -> TransportError {
        match self {
            HttpError::Status { status } => TransportError::Status(*status),
            HttpError::Request(_) => TransportError::Failed { reason: "request failed" },
            HttpError::Serialization(_) => TransportError::Failed { reason: "payload encoding failed" },
            HttpError::Config(_) => TransportError::Failed { reason: "misconfigured" },
        }
    }

    /// Lookup error as seen by the schedule policy
    pub fn config_error(&self) -> ConfigError {
        match self {
            HttpError::Status { status } => ConfigError::Status(*status),
            HttpError::Request(_) | HttpError::Config(_) => ConfigError::Unreachable,
            HttpError::Serialization(_) => ConfigError::Malformed("response body unreadable"),
        }
    }
}

/// HTTP configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the collector
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Value of the `x-api-key` header
    pub api_key: Option<String>,
    /// Custom headers
    pub headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
    /// How long a dead link is assumed dead before delivery is tried again
    pub probe_interval: Duration,
}

impl HttpConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            api_key: None,
            headers: HashMap::new(),
            user_agent: format!("PulseGuard/{}", env!("CARGO_PKG_VERSION")),
            probe_interval: Duration::from_secs(30),
        }
    }

    /// Set API key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set the dead-link probe interval in seconds
    pub fn probe_interval_secs(mut self, secs: u64) -> Self {
        self.probe_interval = Duration::from_secs(secs);
        self
    }

    /// Add custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Blocking JSON client shared by delivery and schedule lookup
///
/// Cheap to clone; clones share the agent and the link state.
#[derive(Clone)]
pub struct HttpClient {
    config: HttpConfig,
    agent: ureq::Agent,
    link: Rc<Cell<LinkState>>,
}

impl HttpClient {
    /// Create new client
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(HttpError::Config("Base URL must start with http:// or https://".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        let link = Rc::new(Cell::new(LinkState::new(config.probe_interval)));
        Ok(Self { config, agent, link })
    }

    /// Client configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Collector assumed reachable: no network failure within the probe interval
    pub fn is_link_up(&self) -> bool {
        self.link.get().is_up_at(Instant::now())
    }

    /// Record a network-level failure seen outside this client
    pub fn mark_link_down(&self) {
        self.update_link(|link| link.mark_down(Instant::now()));
    }

    /// POST a JSON body, returning the response status
    pub fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<u16, HttpError> {
        let json = serde_json::to_string(body).map_err(|e| HttpError::Serialization(e.to_string()))?;
        let request = self.build_request(self.agent.post(&self.url(path)));

        let result = request.send_string(&json).map(|resp| resp.status()).map_err(classify);
        self.observe(&result);
        result
    }

    /// GET a path, returning status and body text
    pub fn get_text(&self, path: &str) -> Result<(u16, String), HttpError> {
        let request = self.build_request(self.agent.get(&self.url(path)));
        let result = request.call().map_err(classify);
        self.observe(&result);

        let response = result?;
        let status = response.status();
        let text = response
            .into_string()
            .map_err(|e| HttpError::Serialization(e.to_string()))?;
        Ok((status, text))
    }

    fn observe<T>(&self, result: &Result<T, HttpError>) {
        match result {
            Err(HttpError::Request(_)) => self.mark_link_down(),
            _ => self.update_link(LinkState::mark_up),
        }
    }

    fn update_link(&self, f: impl FnOnce(&mut LinkState)) {
        let mut link = self.link.get();
        f(&mut link);
        self.link.set(link);
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Build request with authentication and headers
    fn build_request(&self, mut request: ureq::Request) -> ureq::Request {
        if let Some(key) = &self.config.api_key {
            request = request.set(API_KEY_HEADER, key);
        }

        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }

        request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
    }
}

fn classify(error: ureq::Error) -> HttpError {
    match error {
        ureq::Error::Status(status, _) => HttpError::Status { status },
        ureq::Error::Transport(e) => HttpError::Request(e.to_string()),
    }
}

/// Body of a direct delivery
#[derive(Debug, Serialize)]
pub struct SensorPayload<'a> {
    /// Sending device
    pub device_id: &'a str,
    /// The reading
    pub data: Reading,
}

/// Link state inferred from request outcomes
#[derive(Debug, Clone, Copy)]
struct LinkState {
    down_since: Option<Instant>,
    probe_interval: Duration,
}

impl LinkState {
    fn new(probe_interval: Duration) -> Self {
        Self { down_since: None, probe_interval }
    }

    fn is_up_at(&self, now: Instant) -> bool {
        self.down_since
            .map_or(true, |since| now.saturating_duration_since(since) >= self.probe_interval)
    }

    fn mark_down(&mut self, now: Instant) {
        if self.down_since.is_none() {
            log::warn!("collector unreachable; probing again in {:?}", self.probe_interval);
        }
        self.down_since = Some(now);
    }

    fn mark_up(&mut self) {
        if self.down_since.take().is_some() {
            log::info!("collector reachable again");
        }
    }
}

/// Direct delivery: one POST per reading
pub struct HttpTransport {
    client: HttpClient,
    path: String,
}

impl HttpTransport {
    /// Transport posting to [`DIRECT_PATH`]
    pub fn new(client: HttpClient) -> Self {
        Self {
            client,
            path: DIRECT_PATH.to_string(),
        }
    }

    /// Post to a different path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl Transport for HttpTransport {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn is_connected(&self) -> bool {
        self.client.is_link_up()
    }

    fn send(&mut self, device: &DeviceId, reading: &Reading) -> Result<(), TransportError> {
        let body = SensorPayload {
            device_id: device.as_str(),
            data: *reading,
        };

        match self.client.post_json(&self.path, &body) {
            Ok(STATUS_CREATED) => Ok(()),
            Ok(status) => {
                log::warn!("collector answered {} instead of {}", status, STATUS_CREATED);
                Err(TransportError::Status(status))
            }
            Err(e) => {
                log::warn!("direct delivery failed: {}", e);
                Err(e.transport_error())
            }
        }
    }
}

/// Schedule document served by the collector
///
/// Unknown fields are ignored; the lookup endpoint returns the whole user
/// record.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSchedule {
    /// Cadence in whole minutes
    pub measurement_interval: u32,
    /// Window start, `HH:MM`
    pub start_time: String,
    /// Window end, `HH:MM`
    pub end_time: String,
}

impl RemoteSchedule {
    /// Validate and convert
    pub fn into_config(self) -> Result<ScheduleConfig, ConfigError> {
        ScheduleConfig::from_remote(self.measurement_interval, &self.start_time, &self.end_time)
    }
}

/// Parse a schedule document
pub fn parse_schedule(body: &str) -> Result<ScheduleConfig, ConfigError> {
    let remote: RemoteSchedule = serde_json::from_str(body).map_err(|e| {
        log::warn!("schedule document rejected: {}", e);
        ConfigError::Malformed("unexpected schedule document")
    })?;
    remote.into_config()
}

/// Remote schedule lookup: `GET /users/device/{id}`
pub struct HttpConfigSource {
    client: HttpClient,
}

impl HttpConfigSource {
    /// New source over `client`
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

impl pulseguard_core::ConfigSource for HttpConfigSource {
    fn fetch(&mut self, device: &DeviceId) -> Result<ScheduleConfig, ConfigError> {
        if !self.client.is_link_up() {
            log::debug!("schedule lookup skipped, collector unreachable");
            return Err(ConfigError::Unreachable);
        }

        let path = format!("{}{}", SCHEDULE_PATH_PREFIX, device);
        let (status, body) = self.client.get_text(&path).map_err(|e| {
            log::warn!("schedule lookup failed: {}", e);
            e.config_error()
        })?;

        if status != STATUS_OK {
            return Err(ConfigError::Status(status));
        }

        parse_schedule(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HttpConfig::new("https://collector.example.com")
            .api_key("secret")
            .timeout_secs(5)
            .probe_interval_secs(60)
            .header("X-Custom", "value");

        assert_eq!(config.base_url, "https://collector.example.com");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.probe_interval, Duration::from_secs(60));
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert!(config.headers.contains_key("X-Custom"));
    }

    #[test]
    fn test_url_validation() {
        assert!(HttpClient::new(HttpConfig::new("not-a-url")).is_err());
        assert!(HttpClient::new(HttpConfig::new("http://collector.local:3000")).is_ok());
    }

    #[test]
    fn url_joins_without_double_slash() {
        let client = HttpClient::new(HttpConfig::new("http://collector.local:3000/")).unwrap();
        assert_eq!(client.url(DIRECT_PATH), "http://collector.local:3000/sensor");
    }

    #[test]
    fn payload_shape() {
        let body = SensorPayload {
            device_id: "e00fce68",
            data: Reading::new(72.0, 98.5),
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"device_id": "e00fce68", "data": {"bpm": 72.0, "spo2": 98.5}})
        );
    }

    #[test]
    fn schedule_document_parses() {
        let body = r#"{"email":"a@b.c","measurementInterval":15,"startTime":"07:30","endTime":"21:00"}"#;
        let config = parse_schedule(body).unwrap();
        assert_eq!(config, ScheduleConfig::from_remote(15, "07:30", "21:00").unwrap());
    }

    #[test]
    fn malformed_schedules_are_rejected() {
        assert!(matches!(parse_schedule("{}"), Err(ConfigError::Malformed(_))));
        assert!(matches!(parse_schedule("not json"), Err(ConfigError::Malformed(_))));
        assert!(matches!(
            parse_schedule(r#"{"measurementInterval":-5,"startTime":"06:00","endTime":"22:00"}"#),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            parse_schedule(r#"{"measurementInterval":0,"startTime":"06:00","endTime":"22:00"}"#),
            Err(ConfigError::Malformed(_))
        ));
        assert!(matches!(
            parse_schedule(r#"{"measurementInterval":30,"startTime":"6am","endTime":"22:00"}"#),
            Err(ConfigError::Malformed(_))
        ));
    }

    #[test]
    fn error_mapping() {
        let status = HttpError::Status { status: 503 };
        assert_eq!(status.transport_error(), TransportError::Status(503));
        assert_eq!(status.config_error(), ConfigError::Status(503));

        let network = HttpError::Request("connection refused".into());
        assert_eq!(network.config_error(), ConfigError::Unreachable);
        assert!(matches!(network.transport_error(), TransportError::Failed { .. }));
    }

    fn listening_client() -> (std::net::TcpListener, HttpClient) {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let client = HttpClient::new(HttpConfig::new(url).timeout_secs(1)).unwrap();
        (listener, client)
    }

    #[test]
    fn lookup_skips_the_request_while_link_is_down() {
        let (listener, client) = listening_client();
        let mut source = HttpConfigSource::new(client.clone());

        client.mark_link_down();
        let result = pulseguard_core::ConfigSource::fetch(&mut source, &DeviceId::new("e00fce68"));

        assert_eq!(result, Err(ConfigError::Unreachable));
        let accepted = listener.accept();
        assert!(matches!(accepted, Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock));
    }

    #[test]
    fn failed_post_holds_back_the_lookup() {
        let (listener, client) = listening_client();
        drop(listener);

        let mut transport = HttpTransport::new(client.clone());
        let source = HttpConfigSource::new(client);
        assert!(transport.is_connected());

        let sent = transport.send(&DeviceId::new("e00fce68"), &Reading::new(70.0, 98.0));
        assert!(matches!(sent, Err(TransportError::Failed { .. })));
        assert!(!transport.is_connected());
        assert!(!source.client.is_link_up());
    }

    #[test]
    fn link_goes_down_and_probes_again() {
        let start = Instant::now();
        let mut link = LinkState::new(Duration::from_secs(30));
        assert!(link.is_up_at(start));

        link.mark_down(start);
        assert!(!link.is_up_at(start + Duration::from_secs(29)));
        assert!(link.is_up_at(start + Duration::from_secs(30)));

        link.mark_up();
        assert!(link.is_up_at(start));
    }
}

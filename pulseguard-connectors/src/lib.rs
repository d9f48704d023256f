//! Network connectors for the PulseGuard control loop
//!
//! ## Overview
//!
//! `pulseguard-core` talks to the outside world through three traits:
//! [`Transport`], [`ConfigSource`] and the storage medium. This crate
//! implements the network side for hosts and gateways with a `std` runtime.
//!
//! | Path                | Module   | Feature | Success condition              |
//! |---------------------|----------|---------|--------------------------------|
//! | Direct delivery     | `http`   | `http`  | `POST /sensor` answers 201     |
//! | Remote schedule     | `http`   | `http`  | `GET /users/device/<id>` 200   |
//! | Cloud channel       | `mqtt`   | `cloud` | session up, 3 publishes queued |
//!
//! ## Transport Selection
//!
//! Which path is primary and which (if any) is the alternate comes from
//! [`AgentSettings`]. [`build_gateway`] turns the settings into a
//! [`DeliveryGateway`] over boxed transports, so the control loop type does
//! not change with the selection.
//! [`build_connectors`] builds the gateway together with the schedule lookup
//! on one HTTP client.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pulseguard_connectors::{build_gateway, AgentSettings};
//!
//! let settings = AgentSettings::load("pulseguard.json")?;
//! let gateway = build_gateway(&settings)?;
//! assert!(gateway.primary().name() == "direct" || gateway.primary().name() == "cloud");
//! # Ok::<(), pulseguard_connectors::ConnectorError>(())
//! ```

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "cloud")]
pub mod mqtt;

pub mod settings;

#[cfg(feature = "http")]
pub use http::{HttpClient, HttpConfig, HttpConfigSource, HttpError, HttpTransport};

#[cfg(feature = "cloud")]
pub use mqtt::{MqttConfig, MqttTransport};

pub use settings::{AgentSettings, SettingsError, TransportKind};

use pulseguard_core::{ConfigSource, DeliveryGateway, NoTransport, Transport};
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Settings could not be loaded
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// HTTP client could not be built
    #[cfg(feature = "http")]
    #[error(transparent)]
    Http(#[from] HttpError),

    /// Selected transport was not compiled in
    #[error("Transport not available: {0}")]
    Unsupported(&'static str),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Type-erased transport as held by [`build_gateway`]'s gateway
pub type DynTransport = Box<dyn Transport>;

/// Delivery gateway and configuration source of one deployment
///
/// Built together so the direct transport and the schedule lookup use one
/// HTTP client and agree on whether the collector is reachable.
pub struct Connectors {
    /// Primary and alternate delivery paths
    pub gateway: DeliveryGateway<DynTransport, DynTransport>,
    /// Remote schedule lookup
    pub config_source: Box<dyn ConfigSource>,
}

/// Build everything the control loop talks to from one settings document
pub fn build_connectors(settings: &AgentSettings) -> Result<Connectors, ConnectorError> {
    let mut clients = Clients::default();
    let gateway = gateway_with(settings, &mut clients)?;
    let config_source = config_source_with(settings, &mut clients)?;
    Ok(Connectors { gateway, config_source })
}

/// Build one transport of the given kind
pub fn build_transport(kind: TransportKind, settings: &AgentSettings) -> Result<DynTransport, ConnectorError> {
    transport_with(kind, settings, &mut Clients::default())
}

/// Build the delivery gateway the settings describe
///
/// Without an alternate path the secondary slot holds [`NoTransport`], which
/// is never connected.
pub fn build_gateway(settings: &AgentSettings) -> Result<DeliveryGateway<DynTransport, DynTransport>, ConnectorError> {
    gateway_with(settings, &mut Clients::default())
}

/// Build the remote configuration source
pub fn build_config_source(settings: &AgentSettings) -> Result<Box<dyn ConfigSource>, ConnectorError> {
    config_source_with(settings, &mut Clients::default())
}

/// Clients created so far, reused by later builders
#[derive(Default)]
struct Clients {
    #[cfg(feature = "http")]
    http: Option<HttpClient>,
}

impl Clients {
    #[cfg(feature = "http")]
    fn http(&mut self, settings: &AgentSettings) -> Result<HttpClient, ConnectorError> {
        if let Some(client) = &self.http {
            return Ok(client.clone());
        }
        let client = HttpClient::new(settings.http_config())?;
        self.http = Some(client.clone());
        Ok(client)
    }
}

fn transport_with(
    kind: TransportKind,
    settings: &AgentSettings,
    clients: &mut Clients,
) -> Result<DynTransport, ConnectorError> {
    match kind {
        TransportKind::Direct => direct(settings, clients),
        TransportKind::Cloud => cloud(settings),
    }
}

fn gateway_with(
    settings: &AgentSettings,
    clients: &mut Clients,
) -> Result<DeliveryGateway<DynTransport, DynTransport>, ConnectorError> {
    settings.validate()?;

    let primary = transport_with(settings.primary, settings, clients)?;
    let secondary = match settings.secondary {
        Some(kind) if kind == settings.primary => {
            return Err(ConnectorError::Config("secondary transport must differ from primary".into()));
        }
        Some(kind) => transport_with(kind, settings, clients)?,
        None => Box::new(NoTransport),
    };

    log::info!(
        "delivery via {} (alternate: {}) for device {}",
        primary.name(),
        secondary.name(),
        settings.device_id
    );

    Ok(DeliveryGateway::new(settings.device_id.as_str(), primary).with_secondary(secondary))
}

#[cfg(feature = "http")]
fn config_source_with(settings: &AgentSettings, clients: &mut Clients) -> Result<Box<dyn ConfigSource>, ConnectorError> {
    Ok(Box::new(HttpConfigSource::new(clients.http(settings)?)))
}

#[cfg(not(feature = "http"))]
fn config_source_with(_settings: &AgentSettings, _clients: &mut Clients) -> Result<Box<dyn ConfigSource>, ConnectorError> {
    Err(ConnectorError::Unsupported("remote configuration requires the `http` feature"))
}

#[cfg(feature = "http")]
fn direct(settings: &AgentSettings, clients: &mut Clients) -> Result<DynTransport, ConnectorError> {
    Ok(Box::new(HttpTransport::new(clients.http(settings)?)))
}

#[cfg(not(feature = "http"))]
fn direct(_settings: &AgentSettings, _clients: &mut Clients) -> Result<DynTransport, ConnectorError> {
    Err(ConnectorError::Unsupported("direct delivery requires the `http` feature"))
}

#[cfg(feature = "cloud")]
fn cloud(settings: &AgentSettings) -> Result<DynTransport, ConnectorError> {
    Ok(Box::new(MqttTransport::connect(settings.mqtt_config())))
}

#[cfg(not(feature = "cloud"))]
fn cloud(_settings: &AgentSettings) -> Result<DynTransport, ConnectorError> {
    Err(ConnectorError::Unsupported("cloud delivery requires the `cloud` feature"))
}

pub mod ice_server;

use std::time::Duration;

use qr::ErrorCorrection;
use serde::Deserialize;
use shared::error::{Error, Result};

pub use ice_server::RTCIceServer;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

pub const DEFAULT_ICE_SERVER: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_DATA_CHANNEL_LABEL: &str = "chat";
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_DESCRIPTION_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(120);
pub const DEFAULT_DISMISS_DELAY: Duration = Duration::from_secs(2);

/// PairingConfiguration holds the settings of a pairing session.
///
/// The bounded waits are a safety net against a peer that walks away in
/// the middle of an exchange, they are not tuned for correctness.
#[derive(Debug, Clone)]
pub struct PairingConfiguration {
    /// Servers handed to the transport provider for candidate gathering.
    pub(crate) ice_servers: Vec<RTCIceServer>,

    /// Label of the data channel the initiator opens.
    pub(crate) data_channel_label: String,

    /// How long a capture may run without yielding an acceptable scan.
    pub(crate) scan_timeout: Duration,

    /// How long the transport may take to produce a complete local description.
    pub(crate) description_timeout: Duration,

    /// How long the initiator waits for the data channel once the answer
    /// has been applied.
    pub(crate) connect_timeout: Duration,

    /// Grace period after connecting before the session dismisses itself,
    /// `None` keeps the session connected until closed.
    pub(crate) dismiss_delay: Option<Duration>,

    /// Redundancy of rendered codes.
    pub(crate) error_correction: ErrorCorrection,
}

impl Default for PairingConfiguration {
    fn default() -> Self {
        PairingConfigurationBuilder::new().build()
    }
}

impl PairingConfiguration {
    /// Parses a JSON configuration document, any missing field keeps its default.
    pub fn from_json(raw: &str) -> Result<Self> {
        let file: ConfigurationFile =
            serde_json::from_str(raw).map_err(|err| Error::Other(format!("config: {err}")))?;

        let mut builder = PairingConfigurationBuilder::new();
        if let Some(ice_servers) = file.ice_servers {
            builder = builder.with_ice_servers(ice_servers);
        }
        if let Some(label) = file.data_channel_label {
            builder = builder.with_data_channel_label(label);
        }
        if let Some(secs) = file.scan_timeout_secs {
            builder = builder.with_scan_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = file.description_timeout_secs {
            builder = builder.with_description_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = file.connect_timeout_secs {
            builder = builder.with_connect_timeout(Duration::from_secs(secs));
        }
        if let Some(millis) = file.dismiss_delay_millis {
            builder = builder.with_dismiss_delay(if millis == 0 {
                None
            } else {
                Some(Duration::from_millis(millis))
            });
        }
        if let Some(level) = file.error_correction {
            builder = builder.with_error_correction(ErrorCorrection::from(level.as_str()));
        }

        Ok(builder.build())
    }

    /// Returns the ice servers with any query stripped from stun urls.
    #[allow(clippy::assigning_clones)]
    pub fn get_ice_servers(&self) -> Vec<RTCIceServer> {
        let mut ice_servers = self.ice_servers.clone();

        for ice_server in &mut ice_servers {
            for raw_url in &mut ice_server.urls {
                if raw_url.starts_with("stun") {
                    // strip the query from "stun(s):" if present
                    let parts: Vec<&str> = raw_url.split('?').collect();
                    *raw_url = parts[0].to_owned();
                }
            }
        }

        ice_servers
    }

    pub fn validate(&self) -> Result<()> {
        for ice_server in &self.ice_servers {
            ice_server.validate()?;
        }
        if self.data_channel_label.is_empty() {
            return Err(Error::Other("config: empty data channel label".to_owned()));
        }
        Ok(())
    }

    pub fn data_channel_label(&self) -> &str {
        &self.data_channel_label
    }

    pub fn scan_timeout(&self) -> Duration {
        self.scan_timeout
    }

    pub fn description_timeout(&self) -> Duration {
        self.description_timeout
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    pub fn dismiss_delay(&self) -> Option<Duration> {
        self.dismiss_delay
    }

    pub fn error_correction(&self) -> ErrorCorrection {
        self.error_correction
    }
}

#[derive(Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigurationFile {
    ice_servers: Option<Vec<RTCIceServer>>,
    data_channel_label: Option<String>,
    scan_timeout_secs: Option<u64>,
    description_timeout_secs: Option<u64>,
    connect_timeout_secs: Option<u64>,
    dismiss_delay_millis: Option<u64>,
    error_correction: Option<String>,
}

pub struct PairingConfigurationBuilder {
    pub(crate) ice_servers: Vec<RTCIceServer>,
    pub(crate) data_channel_label: String,
    pub(crate) scan_timeout: Duration,
    pub(crate) description_timeout: Duration,
    pub(crate) connect_timeout: Duration,
    pub(crate) dismiss_delay: Option<Duration>,
    pub(crate) error_correction: ErrorCorrection,
}

impl Default for PairingConfigurationBuilder {
    fn default() -> Self {
        PairingConfigurationBuilder {
            ice_servers: vec![RTCIceServer::new(DEFAULT_ICE_SERVER)],
            data_channel_label: DEFAULT_DATA_CHANNEL_LABEL.to_owned(),
            scan_timeout: DEFAULT_SCAN_TIMEOUT,
            description_timeout: DEFAULT_DESCRIPTION_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            dismiss_delay: Some(DEFAULT_DISMISS_DELAY),
            error_correction: ErrorCorrection::default(),
        }
    }
}

impl PairingConfigurationBuilder {
    pub fn new() -> Self {
        PairingConfigurationBuilder::default()
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<RTCIceServer>) -> Self {
        self.ice_servers = ice_servers;
        self
    }

    pub fn with_data_channel_label(mut self, label: String) -> Self {
        self.data_channel_label = label;
        self
    }

    pub fn with_scan_timeout(mut self, scan_timeout: Duration) -> Self {
        self.scan_timeout = scan_timeout;
        self
    }

    pub fn with_description_timeout(mut self, description_timeout: Duration) -> Self {
        self.description_timeout = description_timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_dismiss_delay(mut self, dismiss_delay: Option<Duration>) -> Self {
        self.dismiss_delay = dismiss_delay;
        self
    }

    pub fn with_error_correction(mut self, error_correction: ErrorCorrection) -> Self {
        self.error_correction = error_correction;
        self
    }

    pub fn build(self) -> PairingConfiguration {
        PairingConfiguration {
            ice_servers: self.ice_servers,
            data_channel_label: self.data_channel_label,
            scan_timeout: self.scan_timeout,
            description_timeout: self.description_timeout,
            connect_timeout: self.connect_timeout,
            dismiss_delay: self.dismiss_delay,
            error_correction: self.error_correction,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_configuration_get_iceservers() {
        {
            let expected_server_str = "stun:stun.l.google.com:19302";
            let cfg = PairingConfigurationBuilder::new()
                .with_ice_servers(vec![RTCIceServer::new(expected_server_str)])
                .build();

            let parsed_urls = cfg.get_ice_servers();
            assert_eq!(parsed_urls[0].urls[0], expected_server_str);
        }

        {
            // ignore the fact that stun URLs shouldn't have a query
            let server_str = "stun:global.stun.twilio.com:3478?transport=udp";
            let expected_server_str = "stun:global.stun.twilio.com:3478";
            let cfg = PairingConfigurationBuilder::new()
                .with_ice_servers(vec![RTCIceServer::new(server_str)])
                .build();

            let parsed_urls = cfg.get_ice_servers();
            assert_eq!(parsed_urls[0].urls[0], expected_server_str);
        }
    }

    #[test]
    fn test_configuration_defaults() {
        let cfg = PairingConfiguration::default();
        assert_eq!(cfg.get_ice_servers()[0].urls[0], DEFAULT_ICE_SERVER);
        assert_eq!(cfg.data_channel_label(), "chat");
        assert_eq!(cfg.scan_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.description_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.dismiss_delay(), Some(Duration::from_secs(2)));
        assert_eq!(cfg.error_correction(), ErrorCorrection::Low);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_configuration_json() -> Result<()> {
        let j = r#"
            {
                "iceServers": [
                    {"url": "stun:stun.example.org:3478"},
                    {"urls": ["turn:turn.example.org"], "username": "jch", "credential": "topsecret"}
                ],
                "dataChannelLabel": "pairing",
                "scanTimeoutSecs": 60,
                "dismissDelayMillis": 0,
                "errorCorrection": "medium"
            }"#;

        let cfg = PairingConfiguration::from_json(j)?;
        assert_eq!(cfg.get_ice_servers().len(), 2);
        assert_eq!(cfg.get_ice_servers()[1].username, "jch");
        assert_eq!(cfg.data_channel_label(), "pairing");
        assert_eq!(cfg.scan_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.description_timeout(), DEFAULT_DESCRIPTION_TIMEOUT);
        assert_eq!(cfg.dismiss_delay(), None);
        assert_eq!(cfg.error_correction(), ErrorCorrection::Medium);
        assert!(cfg.validate().is_ok());

        Ok(())
    }

    #[test]
    fn test_configuration_json_malformed() {
        let result = PairingConfiguration::from_json("{\"iceServers\": 3}");
        assert!(matches!(result, Err(Error::Other(_))));
    }

    #[test]
    fn test_configuration_validate_rejects_bad_server() {
        let cfg = PairingConfigurationBuilder::new()
            .with_ice_servers(vec![RTCIceServer::new("turn:turn.example.org")])
            .build();
        assert!(matches!(
            cfg.validate(),
            Err(Error::ErrInvalidIceServerUrl(_))
        ));

        let cfg = PairingConfigurationBuilder::new()
            .with_data_channel_label(String::new())
            .build();
        assert!(cfg.validate().is_err());
    }
}

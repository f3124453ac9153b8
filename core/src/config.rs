//! Gateway configuration, read from a TOML file

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};
use crate::routing::DEFAULT_UNLINK_TG;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Gateway callsign, used on the YSF side and for Wires-X requests
    pub callsign: String,
    /// Gateway DMR ID, the source of YSF traffic with no known ID
    pub dmr_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DmrConfig {
    /// Address the Homebrew master listens on
    pub local_address: String,
    /// MMDVMHost address
    pub remote_address: String,
    pub slot: u8,
    pub color_code: u8,
    /// Talkgroup used for YSF traffic until a DMR call names one
    pub startup_tg: u32,
}

impl Default for DmrConfig {
    fn default() -> Self {
        Self {
            local_address: "127.0.0.1:62031".to_string(),
            remote_address: "127.0.0.1:62032".to_string(),
            slot: 2,
            color_code: 1,
            startup_tg: 9,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YsfConfig {
    pub local_address: String,
    /// Reflector or YSFGateway address
    pub remote_address: String,
    /// Appended to the callsign as `CALL-SUFFIX` on the YSF side
    pub suffix: String,
}

impl Default for YsfConfig {
    fn default() -> Self {
        Self {
            local_address: "0.0.0.0:42013".to_string(),
            remote_address: "127.0.0.1:42000".to_string(),
            suffix: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// `talkgroup;room` file; without one every talkgroup maps to the room of the same number
    pub file: Option<PathBuf>,
    pub unlink_tg: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            file: None,
            unlink_tg: DEFAULT_UNLINK_TG,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// DMR ID database
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub watchdog_ms: u64,
    pub dmr_period_ms: u64,
    pub ysf_period_ms: u64,
    pub link_timeout_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            watchdog_ms: 1500,
            dmr_period_ms: 55,
            ysf_period_ms: 90,
            link_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, `RUST_LOG` takes precedence
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub general: GeneralConfig,
    pub dmr: DmrConfig,
    pub ysf: YsfConfig,
    pub routing: RoutingConfig,
    pub lookup: LookupConfig,
    pub timing: TimingConfig,
    pub log: LogConfig,
}

fn socket_addr(what: &str, value: &str) -> Result<SocketAddr> {
    value
        .parse()
        .map_err(|e| GatewayError::Config(format!("{} `{}`: {}", what, value, e)))
}

impl GatewayConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| GatewayError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Parse and validate
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.callsign.trim().is_empty() {
            return Err(GatewayError::Config("general.callsign must be set".into()));
        }
        if !(1..=2).contains(&self.dmr.slot) {
            return Err(GatewayError::Config(format!(
                "dmr.slot must be 1 or 2, got {}",
                self.dmr.slot
            )));
        }
        if self.dmr.color_code > 15 {
            return Err(GatewayError::Config(format!(
                "dmr.color_code must be 0-15, got {}",
                self.dmr.color_code
            )));
        }
        if self.timing.dmr_period_ms == 0 || self.timing.ysf_period_ms == 0 {
            return Err(GatewayError::Config("pacing periods must be non-zero".into()));
        }
        self.dmr_local_addr()?;
        self.dmr_remote_addr()?;
        self.ysf_local_addr()?;
        self.ysf_remote_addr()?;
        Ok(())
    }

    pub fn dmr_local_addr(&self) -> Result<SocketAddr> {
        socket_addr("dmr.local_address", &self.dmr.local_address)
    }

    pub fn dmr_remote_addr(&self) -> Result<SocketAddr> {
        socket_addr("dmr.remote_address", &self.dmr.remote_address)
    }

    pub fn ysf_local_addr(&self) -> Result<SocketAddr> {
        socket_addr("ysf.local_address", &self.ysf.local_address)
    }

    pub fn ysf_remote_addr(&self) -> Result<SocketAddr> {
        socket_addr("ysf.remote_address", &self.ysf.remote_address)
    }

    /// Callsign presented to the YSF network
    pub fn ysf_callsign(&self) -> String {
        let callsign = self.general.callsign.trim().to_ascii_uppercase();
        match self.ysf.suffix.trim() {
            "" => callsign,
            suffix => format!("{}-{}", callsign, suffix.to_ascii_uppercase()),
        }
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_millis(self.timing.watchdog_ms)
    }

    pub fn dmr_period(&self) -> Duration {
        Duration::from_millis(self.timing.dmr_period_ms)
    }

    pub fn ysf_period(&self) -> Duration {
        Duration::from_millis(self.timing.ysf_period_ms)
    }

    pub fn link_timeout(&self) -> Duration {
        Duration::from_millis(self.timing.link_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = include_str!("../../crossmode.example.toml");

    #[test]
    fn test_example_config() {
        let config = GatewayConfig::parse(EXAMPLE).unwrap();
        assert_eq!(config.general.callsign, "M0ABC");
        assert_eq!(config.dmr.slot, 2);
        assert_eq!(config.routing.unlink_tg, 4000);
        assert_eq!(config.ysf_callsign(), "M0ABC-ND");
        assert_eq!(config.dmr_period(), Duration::from_millis(55));
    }

    #[test]
    fn test_missing_sections_default() {
        let config = GatewayConfig::parse("[general]\ncallsign = \"g4xyz\"\n").unwrap();
        assert_eq!(config.dmr.color_code, 1);
        assert_eq!(config.watchdog(), Duration::from_millis(1500));
        assert_eq!(config.ysf_period(), Duration::from_millis(90));
        assert_eq!(config.link_timeout(), Duration::from_secs(5));
        assert!(config.routing.file.is_none());
        assert_eq!(config.log.filter, "info");
        assert_eq!(config.ysf_callsign(), "G4XYZ");
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            "[general]\ncallsign = \"\"\n",
            "[general]\ncallsign = \"M0ABC\"\n[dmr]\nslot = 3\n",
            "[general]\ncallsign = \"M0ABC\"\n[dmr]\ncolor_code = 16\n",
            "[general]\ncallsign = \"M0ABC\"\n[ysf]\nremote_address = \"nowhere\"\n",
            "[general]\ncallsign = \"M0ABC\"\n[timing]\ndmr_period_ms = 0\n",
            "[general\n",
        ];
        for case in cases {
            assert!(
                matches!(GatewayConfig::parse(case), Err(GatewayError::Config(_))),
                "accepted: {}",
                case
            );
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            GatewayConfig::load("/nonexistent/crossmode.toml"),
            Err(GatewayError::Config(_))
        ));
    }
}

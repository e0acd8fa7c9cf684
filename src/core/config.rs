use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use super::{Error, NodeNames, Result, LONG_NAME_MAX, SHORT_NAME_MAX};
use crate::protocol::ARTNET_PORT;

/// Configuration for an Art-Net node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address advertised in poll replies
    pub address: Ipv4Addr,
    /// Network mask; when set, poll replies are broadcast
    pub subnet_mask: Option<Ipv4Addr>,
    /// Local address the service socket binds to
    pub bind_addr: SocketAddr,
    /// UDP port datagrams are sent to
    pub remote_port: u16,
    /// Combined subnet/universe byte
    pub universe: u8,
    /// Names reported in poll replies
    pub names: NodeNames,
    /// Firmware revision reported in poll replies
    pub firmware_version: u16,
    /// OEM code reported in poll replies
    pub oem_code: u16,
    /// ESTA manufacturer code reported in poll replies
    pub esta_code: u16,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            address: Ipv4Addr::UNSPECIFIED,
            subnet_mask: None,
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, ARTNET_PORT)),
            remote_port: ARTNET_PORT,
            universe: 0,
            names: NodeNames::default(),
            firmware_version: 0,
            oem_code: 0,
            esta_code: 0x1250,
        }
    }
}

impl NodeConfig {
    /// Checks that the names fit their wire fields
    pub fn validate(&self) -> Result<()> {
        if self.names.short.len() > SHORT_NAME_MAX {
            return Err(Error::config(format!(
                "short name is {} bytes, limit is {}",
                self.names.short.len(),
                SHORT_NAME_MAX
            )));
        }
        if self.names.long.len() > LONG_NAME_MAX {
            return Err(Error::config(format!(
                "long name is {} bytes, limit is {}",
                self.names.long.len(),
                LONG_NAME_MAX
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.bind_addr.port(), 6454);
        assert_eq!(config.remote_port, 6454);
        assert!(config.subnet_mask.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = NodeConfig {
            address: Ipv4Addr::new(2, 0, 0, 10),
            subnet_mask: Some(Ipv4Addr::new(255, 0, 0, 0)),
            universe: 0x12,
            ..Default::default()
        };

        let serialized = serde_json::to_string(&config).unwrap();
        let deserialized: NodeConfig = serde_json::from_str(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_partial_config() {
        let config: NodeConfig =
            serde_json::from_str(r#"{ "address": "10.0.0.7", "universe": 3 }"#).unwrap();
        assert_eq!(config.address, Ipv4Addr::new(10, 0, 0, 7));
        assert_eq!(config.universe, 3);
        assert_eq!(config.remote_port, 6454);
    }

    #[test]
    fn test_name_limits() {
        let mut config = NodeConfig::default();
        config.names.short = "x".repeat(18);
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.names.short = "x".repeat(17);
        config.names.long = "y".repeat(64);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}

//! Network definitions: peer-protocol network ids, address tags, ports.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Length of the peer-protocol network id
pub const NETWORK_ID_LENGTH: usize = 16;

/// Mainnet peer-protocol network id
pub const MAINNET_NETWORK_ID: [u8; NETWORK_ID_LENGTH] = [
    0x12, 0x30, 0xF1, 0x71, 0x61, 0x04, 0x41, 0x61, 0x17, 0x31, 0x00, 0x82, 0x16, 0xA1, 0xA1, 0x10,
];

/// Testnet peer-protocol network id
pub const TESTNET_NETWORK_ID: [u8; NETWORK_ID_LENGTH] = [
    0x12, 0x30, 0xF1, 0x71, 0x61, 0x04, 0x41, 0x61, 0x17, 0x31, 0x00, 0x82, 0x16, 0xA1, 0xA1, 0x11,
];

/// Stagenet peer-protocol network id
pub const STAGENET_NETWORK_ID: [u8; NETWORK_ID_LENGTH] = [
    0x12, 0x30, 0xF1, 0x71, 0x61, 0x04, 0x41, 0x61, 0x17, 0x31, 0x00, 0x82, 0x16, 0xA1, 0xA1, 0x12,
];

/// Network a peer or address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production network
    #[default]
    Mainnet,
    /// Public test network with worthless coins
    Testnet,
    /// Staging network mirroring mainnet rules
    Stagenet,
}

impl Network {
    /// All known networks
    pub const ALL: [Network; 3] = [Network::Mainnet, Network::Testnet, Network::Stagenet];

    /// Network id sent in `node_data` during the handshake
    #[must_use]
    pub const fn network_id(&self) -> [u8; NETWORK_ID_LENGTH] {
        match self {
            Self::Mainnet => MAINNET_NETWORK_ID,
            Self::Testnet => TESTNET_NETWORK_ID,
            Self::Stagenet => STAGENET_NETWORK_ID,
        }
    }

    /// Tag byte of standard addresses
    #[must_use]
    pub const fn address_prefix(&self) -> u8 {
        match self {
            Self::Mainnet => 18,
            Self::Testnet => 53,
            Self::Stagenet => 24,
        }
    }

    /// Tag byte of subaddresses
    #[must_use]
    pub const fn subaddress_prefix(&self) -> u8 {
        match self {
            Self::Mainnet => 42,
            Self::Testnet => 63,
            Self::Stagenet => 36,
        }
    }

    /// Tag byte of integrated addresses
    #[must_use]
    pub const fn integrated_prefix(&self) -> u8 {
        match self {
            Self::Mainnet => 19,
            Self::Testnet => 54,
            Self::Stagenet => 25,
        }
    }

    /// Default peer-to-peer port
    #[must_use]
    pub const fn default_p2p_port(&self) -> u16 {
        match self {
            Self::Mainnet => 18080,
            Self::Testnet => 28080,
            Self::Stagenet => 38080,
        }
    }

    /// Default daemon RPC port
    #[must_use]
    pub const fn default_rpc_port(&self) -> u16 {
        match self {
            Self::Mainnet => 18081,
            Self::Testnet => 28081,
            Self::Stagenet => 38081,
        }
    }

    /// Find the network whose id matches `id`
    #[must_use]
    pub fn from_network_id(id: &[u8]) -> Option<Self> {
        Self::ALL.into_iter().find(|n| n.network_id().as_slice() == id)
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet => write!(f, "testnet"),
            Self::Stagenet => write!(f, "stagenet"),
        }
    }
}

/// Error for an unrecognised network name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownNetwork;

impl fmt::Display for UnknownNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown network (expected mainnet, testnet or stagenet)")
    }
}

#[cfg(feature = "std")]
impl std::error::Error for UnknownNetwork {}

impl FromStr for Network {
    type Err = UnknownNetwork;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            x if x.eq_ignore_ascii_case("mainnet") || x.eq_ignore_ascii_case("main") => {
                Ok(Self::Mainnet)
            }
            x if x.eq_ignore_ascii_case("testnet") || x.eq_ignore_ascii_case("test") => {
                Ok(Self::Testnet)
            }
            x if x.eq_ignore_ascii_case("stagenet") || x.eq_ignore_ascii_case("stage") => {
                Ok(Self::Stagenet)
            }
            _ => Err(UnknownNetwork),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_ids_are_distinct() {
        assert_ne!(MAINNET_NETWORK_ID, TESTNET_NETWORK_ID);
        assert_ne!(MAINNET_NETWORK_ID, STAGENET_NETWORK_ID);
        assert_eq!(
            Network::from_network_id(&STAGENET_NETWORK_ID),
            Some(Network::Stagenet)
        );
        assert_eq!(Network::from_network_id(&[0u8; 16]), None);
    }

    #[test]
    fn test_parse_network() {
        assert_eq!("MainNet".parse::<Network>(), Ok(Network::Mainnet));
        assert_eq!(" stage ".parse::<Network>(), Ok(Network::Stagenet));
        assert!("regtest".parse::<Network>().is_err());
    }

    #[test]
    fn test_mainnet_prefixes() {
        assert_eq!(Network::Mainnet.address_prefix(), 0x12);
        assert_eq!(Network::Mainnet.subaddress_prefix(), 42);
        assert_eq!(Network::Mainnet.default_p2p_port(), 18080);
    }
}

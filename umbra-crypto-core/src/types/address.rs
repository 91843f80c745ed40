//! Address types and decoded-address layout

use serde::{Deserialize, Serialize};
use umbra_types::Network;

/// Length of a public key inside an address
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// Length of the trailing Keccak checksum
pub const CHECKSUM_LENGTH: usize = 4;

/// Length of the payment id carried by integrated addresses
pub const PAYMENT_ID_LENGTH: usize = 8;

/// Decoded length of standard addresses and subaddresses: tag + spend + view + checksum
pub const STANDARD_ADDRESS_DECODED_LENGTH: usize = 1 + 2 * PUBLIC_KEY_LENGTH + CHECKSUM_LENGTH;

/// Decoded length of integrated addresses
pub const INTEGRATED_ADDRESS_DECODED_LENGTH: usize =
    STANDARD_ADDRESS_DECODED_LENGTH + PAYMENT_ID_LENGTH;

/// Encoded length of standard addresses (95 base58 characters)
pub const STANDARD_ADDRESS_LENGTH: usize = 95;

/// Encoded length of integrated addresses (106 base58 characters)
pub const INTEGRATED_ADDRESS_LENGTH: usize = 106;

/// Kind of address, determined by the tag byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressType {
    /// Standard address
    Standard,
    /// Subaddress
    Subaddress,
    /// Standard address with an embedded 8-byte payment id
    Integrated,
}

impl AddressType {
    /// Tag byte for this kind on `network`
    #[must_use]
    pub const fn prefix(&self, network: Network) -> u8 {
        match self {
            Self::Standard => network.address_prefix(),
            Self::Subaddress => network.subaddress_prefix(),
            Self::Integrated => network.integrated_prefix(),
        }
    }

    /// Identify network and kind from a tag byte
    #[must_use]
    pub fn from_prefix(tag: u8) -> Option<(Network, AddressType)> {
        Network::ALL.into_iter().find_map(|network| {
            [Self::Standard, Self::Subaddress, Self::Integrated]
                .into_iter()
                .find(|kind| kind.prefix(network) == tag)
                .map(|kind| (network, kind))
        })
    }
}

/// Fully decoded and checksum-verified address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedAddress {
    /// Network the tag byte belongs to
    pub network: Network,
    /// Address kind
    pub address_type: AddressType,
    /// Public spend key `B`
    pub spend_public: [u8; PUBLIC_KEY_LENGTH],
    /// Public view key `A`
    pub view_public: [u8; PUBLIC_KEY_LENGTH],
    /// Payment id of integrated addresses
    pub payment_id: Option<[u8; PAYMENT_ID_LENGTH]>,
}

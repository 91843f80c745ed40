//! Admin commands: handshake, timed sync, ping.

use std::net::{Ipv4Addr, SocketAddrV4};

use umbra_types::{BlockHash, NETWORK_ID_LENGTH};

use super::Message;
use crate::error::WireResult;
use crate::levin::Command;
use crate::storage::{Array, Section, Value};

/// Address type tag for IPv4 peers
pub const ADDRESS_TYPE_IPV4: u8 = 1;
/// Status string of a successful ping
pub const PING_OK: &str = "OK";

/// Support flag: fluffy blocks
pub const SUPPORT_FLAG_FLUFFY_BLOCKS: u32 = 0x01;

/// Identity of the sending node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicNodeData {
    /// Network the node is on
    pub network_id: [u8; NETWORK_ID_LENGTH],
    /// Listening port, zero when not accepting connections
    pub my_port: u32,
    /// Public RPC port, zero when none
    pub rpc_port: u16,
    /// Random per-process id
    pub peer_id: u64,
    /// Feature bits
    pub support_flags: u32,
}

impl BasicNodeData {
    /// Encode as an entry tree.
    #[must_use]
    pub fn to_section(&self) -> Section {
        Section::new()
            .with("network_id", Value::String(self.network_id.to_vec()))
            .with("my_port", Value::U32(self.my_port))
            .with("rpc_port", Value::U16(self.rpc_port))
            .with("peer_id", Value::U64(self.peer_id))
            .with("support_flags", Value::U32(self.support_flags))
    }

    /// Decode from an entry tree.
    ///
    /// # Errors
    ///
    /// Missing or mistyped fields.
    pub fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            network_id: section.get_array_bytes("network_id")?,
            my_port: section.get_u32("my_port")?,
            rpc_port: section.optional("rpc_port", Section::get_u16)?.unwrap_or(0),
            peer_id: section.get_u64("peer_id")?,
            support_flags: section
                .optional("support_flags", Section::get_u32)?
                .unwrap_or(0),
        })
    }
}

/// Chain state advertised by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSyncData {
    /// Number of blocks in the chain
    pub current_height: u64,
    /// Total chain work
    pub cumulative_difficulty: u128,
    /// Id of the tip
    pub top_id: BlockHash,
    /// Major version of the tip
    pub top_version: u8,
    /// Pruning seed, zero for full nodes
    pub pruning_seed: u32,
}

impl CoreSyncData {
    /// Encode as an entry tree.
    #[must_use]
    pub fn to_section(&self) -> Section {
        let (low, high) = split_difficulty(self.cumulative_difficulty);
        Section::new()
            .with("current_height", Value::U64(self.current_height))
            .with("cumulative_difficulty", Value::U64(low))
            .with("cumulative_difficulty_top64", Value::U64(high))
            .with("top_id", Value::String(self.top_id.as_bytes().to_vec()))
            .with("top_version", Value::U8(self.top_version))
            .with("pruning_seed", Value::U32(self.pruning_seed))
    }

    /// Decode from an entry tree.
    ///
    /// # Errors
    ///
    /// Missing or mistyped fields.
    pub fn from_section(section: &Section) -> WireResult<Self> {
        let low = section.get_u64("cumulative_difficulty")?;
        let high = section
            .optional("cumulative_difficulty_top64", Section::get_u64)?
            .unwrap_or(0);
        Ok(Self {
            current_height: section.get_u64("current_height")?,
            cumulative_difficulty: join_difficulty(low, high),
            top_id: BlockHash::new(section.get_array_bytes("top_id")?),
            top_version: section.get_u8("top_version")?,
            pruning_seed: section
                .optional("pruning_seed", Section::get_u32)?
                .unwrap_or(0),
        })
    }
}

pub(crate) fn split_difficulty(value: u128) -> (u64, u64) {
    (value as u64, (value >> 64) as u64)
}

pub(crate) fn join_difficulty(low: u64, high: u64) -> u128 {
    (u128::from(high) << 64) | u128::from(low)
}

/// Network address of a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerAddress {
    /// IPv4 host and port
    Ipv4(SocketAddrV4),
    /// Address families we do not dial (IPv6, Tor, I2P)
    Other {
        /// Type tag
        address_type: u8,
    },
}

impl PeerAddress {
    fn to_section(&self) -> Section {
        match self {
            PeerAddress::Ipv4(addr) => Section::new()
                .with("type", Value::U8(ADDRESS_TYPE_IPV4))
                .with(
                    "addr",
                    Value::Section(
                        Section::new()
                            .with("m_ip", Value::U32(u32::from_le_bytes(addr.ip().octets())))
                            .with("m_port", Value::U16(addr.port())),
                    ),
                ),
            PeerAddress::Other { address_type } => {
                Section::new().with("type", Value::U8(*address_type))
            }
        }
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        let address_type = section.get_u8("type")?;
        if address_type != ADDRESS_TYPE_IPV4 {
            return Ok(PeerAddress::Other { address_type });
        }
        let addr = section.get_section("addr")?;
        let ip = Ipv4Addr::from(addr.get_u32("m_ip")?.to_le_bytes());
        Ok(PeerAddress::Ipv4(SocketAddrV4::new(ip, addr.get_u16("m_port")?)))
    }
}

/// One entry of a shared peer list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerlistEntry {
    /// Address
    pub adr: PeerAddress,
    /// Peer id
    pub id: u64,
    /// Unix time the sender last heard from the peer
    pub last_seen: Option<i64>,
    /// Pruning seed
    pub pruning_seed: u32,
    /// Public RPC port
    pub rpc_port: u16,
}

impl PeerlistEntry {
    fn to_section(&self) -> Section {
        let mut section = Section::new()
            .with("adr", Value::Section(self.adr.to_section()))
            .with("id", Value::U64(self.id));
        if let Some(last_seen) = self.last_seen {
            section.insert("last_seen", Value::I64(last_seen));
        }
        section
            .with("pruning_seed", Value::U32(self.pruning_seed))
            .with("rpc_port", Value::U16(self.rpc_port))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            adr: PeerAddress::from_section(section.get_section("adr")?)?,
            id: section.get_u64("id")?,
            last_seen: section.optional("last_seen", Section::get_i64)?,
            pruning_seed: section
                .optional("pruning_seed", Section::get_u32)?
                .unwrap_or(0),
            rpc_port: section.optional("rpc_port", Section::get_u16)?.unwrap_or(0),
        })
    }
}

fn peerlist_to_value(entries: &[PeerlistEntry]) -> Value {
    Value::Array(Array::Section(
        entries.iter().map(PeerlistEntry::to_section).collect(),
    ))
}

fn peerlist_from_section(section: &Section) -> WireResult<Vec<PeerlistEntry>> {
    section
        .get_sections("local_peerlist_new")?
        .iter()
        .map(PeerlistEntry::from_section)
        .collect()
}

/// Handshake request (1001).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Our identity
    pub node_data: BasicNodeData,
    /// Our chain state
    pub payload_data: CoreSyncData,
}

impl Message for HandshakeRequest {
    const COMMAND: Command = Command::Handshake;

    fn to_section(&self) -> Section {
        Section::new()
            .with("node_data", Value::Section(self.node_data.to_section()))
            .with("payload_data", Value::Section(self.payload_data.to_section()))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            node_data: BasicNodeData::from_section(section.get_section("node_data")?)?,
            payload_data: CoreSyncData::from_section(section.get_section("payload_data")?)?,
        })
    }
}

/// Handshake response (1001).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Peer identity
    pub node_data: BasicNodeData,
    /// Peer chain state
    pub payload_data: CoreSyncData,
    /// Peers the remote knows about
    pub local_peerlist_new: Vec<PeerlistEntry>,
}

impl Message for HandshakeResponse {
    const COMMAND: Command = Command::Handshake;

    fn to_section(&self) -> Section {
        Section::new()
            .with("node_data", Value::Section(self.node_data.to_section()))
            .with("payload_data", Value::Section(self.payload_data.to_section()))
            .with("local_peerlist_new", peerlist_to_value(&self.local_peerlist_new))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            node_data: BasicNodeData::from_section(section.get_section("node_data")?)?,
            payload_data: CoreSyncData::from_section(section.get_section("payload_data")?)?,
            local_peerlist_new: peerlist_from_section(section)?,
        })
    }
}

/// Timed sync request (1002).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedSyncRequest {
    /// Our chain state
    pub payload_data: CoreSyncData,
}

impl Message for TimedSyncRequest {
    const COMMAND: Command = Command::TimedSync;

    fn to_section(&self) -> Section {
        Section::new().with("payload_data", Value::Section(self.payload_data.to_section()))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            payload_data: CoreSyncData::from_section(section.get_section("payload_data")?)?,
        })
    }
}

/// Timed sync response (1002).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedSyncResponse {
    /// Peer chain state
    pub payload_data: CoreSyncData,
    /// Peers the remote knows about
    pub local_peerlist_new: Vec<PeerlistEntry>,
}

impl Message for TimedSyncResponse {
    const COMMAND: Command = Command::TimedSync;

    fn to_section(&self) -> Section {
        Section::new()
            .with("payload_data", Value::Section(self.payload_data.to_section()))
            .with("local_peerlist_new", peerlist_to_value(&self.local_peerlist_new))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            payload_data: CoreSyncData::from_section(section.get_section("payload_data")?)?,
            local_peerlist_new: peerlist_from_section(section)?,
        })
    }
}

/// Ping request (1003); empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PingRequest;

impl Message for PingRequest {
    const COMMAND: Command = Command::Ping;

    fn to_section(&self) -> Section {
        Section::new()
    }

    fn from_section(_section: &Section) -> WireResult<Self> {
        Ok(Self)
    }
}

/// Ping response (1003).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingResponse {
    /// `"OK"` on success
    pub status: String,
    /// Responder's peer id
    pub peer_id: u64,
}

impl Message for PingResponse {
    const COMMAND: Command = Command::Ping;

    fn to_section(&self) -> Section {
        Section::new()
            .with("status", Value::String(self.status.as_bytes().to_vec()))
            .with("peer_id", Value::U64(self.peer_id))
    }

    fn from_section(section: &Section) -> WireResult<Self> {
        Ok(Self {
            status: String::from_utf8_lossy(section.get_bytes("status")?).into_owned(),
            peer_id: section.get_u64("peer_id")?,
        })
    }
}

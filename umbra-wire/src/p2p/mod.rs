//! Typed peer messages
//!
//! Each message maps to and from a portable-storage [`Section`] with the
//! field names the network uses. [`Notification`] decodes any inbound
//! notification by command.

pub mod admin;
pub mod protocol;

use crate::error::WireResult;
use crate::levin::Command;
use crate::storage::{from_bytes, to_bytes, Section};

pub use admin::{
    BasicNodeData, CoreSyncData, HandshakeRequest, HandshakeResponse, PeerAddress,
    PeerlistEntry, PingRequest, PingResponse, TimedSyncRequest, TimedSyncResponse,
    ADDRESS_TYPE_IPV4, PING_OK, SUPPORT_FLAG_FLUFFY_BLOCKS,
};
pub use protocol::{
    BlockCompleteEntry, NewBlock, NewFluffyBlock, NewTransactions, RequestChain,
    RequestFluffyMissingTx, RequestGetObjects, ResponseChainEntry, ResponseGetObjects,
};

/// A message with a fixed command and an entry-tree encoding.
pub trait Message: Sized {
    /// Levin command carrying this message
    const COMMAND: Command;

    /// Encode as an entry tree.
    fn to_section(&self) -> Section;

    /// Decode from an entry tree.
    ///
    /// # Errors
    ///
    /// Missing or mistyped fields.
    fn from_section(section: &Section) -> WireResult<Self>;

    /// Encode as a portable-storage payload.
    ///
    /// # Errors
    ///
    /// Values the stream format cannot represent.
    fn to_payload(&self) -> WireResult<Vec<u8>> {
        to_bytes(&self.to_section())
    }

    /// Decode a portable-storage payload.
    ///
    /// # Errors
    ///
    /// Malformed streams or missing fields.
    fn from_payload(bytes: &[u8]) -> WireResult<Self> {
        Self::from_section(&from_bytes(bytes)?)
    }
}

/// Inbound notification, decoded by command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// 2001
    NewBlock(NewBlock),
    /// 2002
    NewTransactions(NewTransactions),
    /// 2006
    RequestChain(RequestChain),
    /// 2007
    ResponseChainEntry(ResponseChainEntry),
    /// 2008
    RequestGetObjects(RequestGetObjects),
    /// 2009
    ResponseGetObjects(ResponseGetObjects),
    /// 2010
    NewFluffyBlock(NewFluffyBlock),
    /// 2011
    RequestFluffyMissingTx(RequestFluffyMissingTx),
}

impl Notification {
    /// Decode a notification payload; `Ok(None)` for commands that are not
    /// notifications.
    ///
    /// # Errors
    ///
    /// Malformed streams or missing fields.
    pub fn decode(command: Command, payload: &[u8]) -> WireResult<Option<Self>> {
        Ok(Some(match command {
            Command::NewBlock => Notification::NewBlock(NewBlock::from_payload(payload)?),
            Command::NewTransactions => {
                Notification::NewTransactions(NewTransactions::from_payload(payload)?)
            }
            Command::RequestChain => {
                Notification::RequestChain(RequestChain::from_payload(payload)?)
            }
            Command::ResponseChainEntry => {
                Notification::ResponseChainEntry(ResponseChainEntry::from_payload(payload)?)
            }
            Command::RequestGetObjects => {
                Notification::RequestGetObjects(RequestGetObjects::from_payload(payload)?)
            }
            Command::ResponseGetObjects => {
                Notification::ResponseGetObjects(ResponseGetObjects::from_payload(payload)?)
            }
            Command::NewFluffyBlock => {
                Notification::NewFluffyBlock(NewFluffyBlock::from_payload(payload)?)
            }
            Command::RequestFluffyMissingTx => Notification::RequestFluffyMissingTx(
                RequestFluffyMissingTx::from_payload(payload)?,
            ),
            Command::Handshake | Command::TimedSync | Command::Ping | Command::Unknown(_) => {
                return Ok(None)
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_types::BlockHash;

    #[test]
    fn test_decode_by_command() {
        let request = RequestChain {
            block_ids: vec![BlockHash::new([1; 32])],
            prune: false,
        };
        let payload = request.to_payload().unwrap();
        assert_eq!(
            Notification::decode(Command::RequestChain, &payload).unwrap(),
            Some(Notification::RequestChain(request))
        );
        assert_eq!(Notification::decode(Command::Ping, &payload).unwrap(), None);
        assert_eq!(
            Notification::decode(Command::Unknown(4242), &payload).unwrap(),
            None
        );
    }

    #[test]
    fn test_wrong_payload_for_command() {
        let payload = PingRequest.to_payload().unwrap();
        assert!(Notification::decode(Command::NewBlock, &payload).is_err());
    }
}

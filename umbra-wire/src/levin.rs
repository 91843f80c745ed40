//! Levin framing.
//!
//! Every peer message is a fixed 33-byte header followed by a
//! portable-storage payload of the declared length:
//!
//! ```text
//! u64 LE  signature 0x0101010101012101
//! u64 LE  payload length
//! u8      expects response
//! u32 LE  command
//! i32 LE  return code
//! u32 LE  flags (1 = request, 2 = response)
//! u32 LE  protocol version (1)
//! ```

use crate::error::{WireError, WireResult};

/// Header signature
pub const LEVIN_SIGNATURE: u64 = 0x0101_0101_0101_2101;
/// Header length in bytes
pub const HEADER_LENGTH: usize = 33;
/// Protocol version we speak
pub const PROTOCOL_VERSION: u32 = 1;
/// Flag bit for requests and notifications
pub const FLAG_REQUEST: u32 = 1;
/// Flag bit for responses
pub const FLAG_RESPONSE: u32 = 2;
/// Default payload ceiling (100 MiB)
pub const DEFAULT_MAX_PAYLOAD: u64 = 100 * 1024 * 1024;
/// Return code of a successful response
pub const RETURN_OK: i32 = 1;

/// Peer-protocol commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// 1001
    Handshake,
    /// 1002
    TimedSync,
    /// 1003
    Ping,
    /// 2001
    NewBlock,
    /// 2002
    NewTransactions,
    /// 2006
    RequestChain,
    /// 2007
    ResponseChainEntry,
    /// 2008
    RequestGetObjects,
    /// 2009
    ResponseGetObjects,
    /// 2010
    NewFluffyBlock,
    /// 2011
    RequestFluffyMissingTx,
    /// Anything else; logged and ignored by the session
    Unknown(u32),
}

impl Command {
    /// Numeric command id.
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            Command::Handshake => 1001,
            Command::TimedSync => 1002,
            Command::Ping => 1003,
            Command::NewBlock => 2001,
            Command::NewTransactions => 2002,
            Command::RequestChain => 2006,
            Command::ResponseChainEntry => 2007,
            Command::RequestGetObjects => 2008,
            Command::ResponseGetObjects => 2009,
            Command::NewFluffyBlock => 2010,
            Command::RequestFluffyMissingTx => 2011,
            Command::Unknown(id) => id,
        }
    }

    /// Whether a request for this command waits for a response.
    ///
    /// Only the 100x admin commands do; chain and object requests are sent
    /// as notifications and answered by a separate notification.
    #[must_use]
    pub fn expects_response(self) -> bool {
        matches!(self, Command::Handshake | Command::TimedSync | Command::Ping)
    }
}

impl From<u32> for Command {
    fn from(id: u32) -> Self {
        match id {
            1001 => Command::Handshake,
            1002 => Command::TimedSync,
            1003 => Command::Ping,
            2001 => Command::NewBlock,
            2002 => Command::NewTransactions,
            2006 => Command::RequestChain,
            2007 => Command::ResponseChainEntry,
            2008 => Command::RequestGetObjects,
            2009 => Command::ResponseGetObjects,
            2010 => Command::NewFluffyBlock,
            2011 => Command::RequestFluffyMissingTx,
            other => Command::Unknown(other),
        }
    }
}

/// Decoded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevinHeader {
    /// Payload length
    pub length: u64,
    /// Sender waits for a response
    pub expects_response: bool,
    /// Command
    pub command: Command,
    /// Return code; negative on failure in responses
    pub return_code: i32,
    /// [`FLAG_REQUEST`] or [`FLAG_RESPONSE`]
    pub flags: u32,
    /// Protocol version
    pub protocol_version: u32,
}

impl LevinHeader {
    /// Header for a request. Whether a response is expected follows from
    /// the command.
    #[must_use]
    pub fn request(command: Command, length: u64) -> Self {
        Self {
            length,
            expects_response: command.expects_response(),
            command,
            return_code: 0,
            flags: FLAG_REQUEST,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Header for a response to `command`.
    #[must_use]
    pub fn response(command: Command, length: u64, return_code: i32) -> Self {
        Self {
            length,
            expects_response: false,
            command,
            return_code,
            flags: FLAG_RESPONSE,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// True for response frames.
    #[must_use]
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_RESPONSE != 0
    }

    /// Serialize to the fixed 33-byte form.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LENGTH] {
        let mut out = [0u8; HEADER_LENGTH];
        out[0..8].copy_from_slice(&LEVIN_SIGNATURE.to_le_bytes());
        out[8..16].copy_from_slice(&self.length.to_le_bytes());
        out[16] = u8::from(self.expects_response);
        out[17..21].copy_from_slice(&self.command.id().to_le_bytes());
        out[21..25].copy_from_slice(&self.return_code.to_le_bytes());
        out[25..29].copy_from_slice(&self.flags.to_le_bytes());
        out[29..33].copy_from_slice(&self.protocol_version.to_le_bytes());
        out
    }

    /// Parse a header and check its length against `max_payload`.
    ///
    /// # Errors
    ///
    /// - [`WireError::BadSignature`] for a wrong signature
    /// - [`WireError::FrameTooLarge`] when the length exceeds `max_payload`
    /// - [`WireError::UnsupportedVersion`] for a protocol version other than 1
    pub fn from_bytes(bytes: &[u8; HEADER_LENGTH], max_payload: u64) -> WireResult<Self> {
        let word = |range: core::ops::Range<usize>| {
            let mut buf = [0u8; 4];
            buf.copy_from_slice(&bytes[range]);
            buf
        };
        let mut sig = [0u8; 8];
        sig.copy_from_slice(&bytes[0..8]);
        let signature = u64::from_le_bytes(sig);
        if signature != LEVIN_SIGNATURE {
            return Err(WireError::BadSignature(format!("levin 0x{signature:016x}")));
        }

        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[8..16]);
        let length = u64::from_le_bytes(len);
        if length > max_payload {
            return Err(WireError::FrameTooLarge {
                length,
                max: max_payload,
            });
        }

        let protocol_version = u32::from_le_bytes(word(29..33));
        if protocol_version != PROTOCOL_VERSION {
            return Err(WireError::UnsupportedVersion(format!(
                "levin protocol {protocol_version}"
            )));
        }

        Ok(Self {
            length,
            expects_response: bytes[16] != 0,
            command: Command::from(u32::from_le_bytes(word(17..21))),
            return_code: i32::from_le_bytes(word(21..25)),
            flags: u32::from_le_bytes(word(25..29)),
            protocol_version,
        })
    }
}

/// Header plus payload, ready to write.
#[must_use]
pub fn frame(header: &LevinHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LENGTH + payload.len());
    out.extend_from_slice(&header.to_bytes());
    out.extend_from_slice(payload);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_with_length(length: u64) -> [u8; HEADER_LENGTH] {
        LevinHeader::request(Command::Handshake, length).to_bytes()
    }

    #[test]
    fn test_header_round_trip() {
        let header = LevinHeader::response(Command::TimedSync, 1234, -3);
        let decoded = LevinHeader::from_bytes(&header.to_bytes(), DEFAULT_MAX_PAYLOAD).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.is_response());
    }

    #[test]
    fn test_header_layout() {
        let bytes = LevinHeader::request(Command::Ping, 10).to_bytes();
        assert_eq!(&bytes[0..8], &[0x01, 0x21, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01]);
        assert_eq!(&bytes[8..16], &10u64.to_le_bytes());
        assert_eq!(bytes[16], 1);
        assert_eq!(&bytes[17..21], &1003u32.to_le_bytes());
        assert_eq!(&bytes[25..29], &FLAG_REQUEST.to_le_bytes());
        assert_eq!(&bytes[29..33], &1u32.to_le_bytes());
    }

    #[test]
    fn test_oversized_length_rejected() {
        let bytes = header_with_length(0x1_0000_0000_0001);
        assert_eq!(
            LevinHeader::from_bytes(&bytes, DEFAULT_MAX_PAYLOAD),
            Err(WireError::FrameTooLarge {
                length: 0x1_0000_0000_0001,
                max: DEFAULT_MAX_PAYLOAD
            })
        );
    }

    #[test]
    fn test_zero_length_accepted() {
        let header = LevinHeader::from_bytes(&header_with_length(0), DEFAULT_MAX_PAYLOAD).unwrap();
        assert_eq!(header.length, 0);
    }

    #[test]
    fn test_bad_signature_and_version() {
        let mut bytes = header_with_length(1);
        bytes[3] ^= 0xff;
        assert!(matches!(
            LevinHeader::from_bytes(&bytes, DEFAULT_MAX_PAYLOAD),
            Err(WireError::BadSignature(_))
        ));

        let mut bytes = header_with_length(1);
        bytes[29] = 2;
        assert!(matches!(
            LevinHeader::from_bytes(&bytes, DEFAULT_MAX_PAYLOAD),
            Err(WireError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_fire_and_forget_commands() {
        assert!(!LevinHeader::request(Command::RequestChain, 0).expects_response);
        assert!(!LevinHeader::request(Command::RequestGetObjects, 0).expects_response);
        assert!(LevinHeader::request(Command::Handshake, 0).expects_response);
    }

    #[test]
    fn test_command_ids_round_trip() {
        for id in [1001, 1002, 1003, 2001, 2002, 2006, 2007, 2008, 2009, 2010, 2011, 4242] {
            assert_eq!(Command::from(id).id(), id);
        }
        assert_eq!(Command::from(4242), Command::Unknown(4242));
    }
}

//! Block and transaction codec
//!
//! Consensus byte layout of blocks and transactions. Integers here are
//! LEB128 varints, unrelated to the portable-storage size varint.

pub mod block;
pub mod extra;
pub mod hash;
pub mod rct;
pub mod reader;
pub mod transaction;
pub mod varint;

// Re-export the types callers work with
pub use block::{Block, BlockHeader};
pub use extra::{Extra, ExtraField, Nonce};
pub use hash::{keccak256, keccak256_parts, tree_hash};
pub use rct::{
    BulletproofData, BulletproofPlusData, ClsagData, EcdhInfo, RangeProofs, RctBase, RctPrunable,
    RctType,
};
pub use reader::Reader;
pub use transaction::{
    clsag_message, relative_offsets, OutputTarget, Transaction, TransactionPrefix, TxIn, TxOut,
    TxSignatures,
};
pub use varint::{read_varint, write_varint};

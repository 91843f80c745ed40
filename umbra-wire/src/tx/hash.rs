//! Keccak-256 and the block Merkle root.

use sha3::{Digest, Keccak256};

/// Keccak-256 of one buffer.
#[must_use]
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Keccak-256 over concatenated parts.
#[must_use]
pub fn keccak256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn pair(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    keccak256_parts(&[left, right])
}

/// Merkle root over transaction hashes, `None` for an empty list.
///
/// For more than two leaves the tree is first reduced to the largest power
/// of two strictly below the leaf count: the leading leaves pass through
/// unchanged and the trailing ones are hashed in pairs.
#[must_use]
pub fn tree_hash(hashes: &[[u8; 32]]) -> Option<[u8; 32]> {
    match hashes.len() {
        0 => None,
        1 => Some(hashes[0]),
        2 => Some(pair(&hashes[0], &hashes[1])),
        count => {
            let mut width = 1usize;
            while width * 2 < count {
                width *= 2;
            }
            let passthrough = 2 * width - count;
            let mut level: Vec<[u8; 32]> = hashes[..passthrough].to_vec();
            level.extend(hashes[passthrough..].chunks_exact(2).map(|c| pair(&c[0], &c[1])));

            while level.len() > 2 {
                level = level.chunks_exact(2).map(|c| pair(&c[0], &c[1])).collect();
            }
            Some(pair(&level[0], &level[1]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> [u8; 32] {
        [n; 32]
    }

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_parts_match_concatenation() {
        assert_eq!(keccak256_parts(&[b"ab", b"cd"]), keccak256(b"abcd"));
    }

    #[test]
    fn test_tree_hash_small() {
        assert_eq!(tree_hash(&[]), None);
        assert_eq!(tree_hash(&[leaf(1)]), Some(leaf(1)));
        assert_eq!(tree_hash(&[leaf(1), leaf(2)]), Some(pair(&leaf(1), &leaf(2))));
    }

    #[test]
    fn test_tree_hash_three_leaves() {
        // first leaf passes through, last two are paired
        let expected = pair(&leaf(1), &pair(&leaf(2), &leaf(3)));
        assert_eq!(tree_hash(&[leaf(1), leaf(2), leaf(3)]), Some(expected));
    }

    #[test]
    fn test_tree_hash_four_and_five() {
        let four = pair(&pair(&leaf(1), &leaf(2)), &pair(&leaf(3), &leaf(4)));
        assert_eq!(tree_hash(&[leaf(1), leaf(2), leaf(3), leaf(4)]), Some(four));

        // width 4: three pass through, the last two collapse
        let five = pair(
            &pair(&leaf(1), &leaf(2)),
            &pair(&leaf(3), &pair(&leaf(4), &leaf(5))),
        );
        assert_eq!(
            tree_hash(&[leaf(1), leaf(2), leaf(3), leaf(4), leaf(5)]),
            Some(five)
        );
    }
}

//! Node list shared by all sessions.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;

use tokio::sync::Mutex;
use tracing::debug;
use umbra_wire::p2p::{PeerAddress, PeerlistEntry};

/// Cap on remembered addresses; peer lists beyond it are ignored.
pub const MAX_KNOWN_PEERS: usize = 1000;

/// Consecutive failed sessions before a peer is skipped.
pub const MAX_FAILURES: u32 = 3;

#[derive(Debug, Default)]
struct Inner {
    known: Vec<SocketAddr>,
    active: HashSet<SocketAddr>,
    failures: HashMap<SocketAddr, u32>,
}

/// Known, active and failing peers, under one mutex.
#[derive(Debug, Default)]
pub struct NodeList {
    inner: Mutex<Inner>,
}

/// IPv4 addresses from a shared peer list; other address types are skipped.
#[must_use]
pub fn peer_addrs(entries: &[PeerlistEntry]) -> Vec<SocketAddr> {
    entries
        .iter()
        .filter_map(|entry| match entry.adr {
            PeerAddress::Ipv4(addr) if addr.port() != 0 => Some(SocketAddr::V4(addr)),
            _ => None,
        })
        .collect()
}

impl NodeList {
    /// Empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `addrs`; returns how many were new.
    pub async fn add<I>(&self, addrs: I) -> usize
    where
        I: IntoIterator<Item = SocketAddr>,
    {
        let mut inner = self.inner.lock().await;
        let mut added = 0;
        for addr in addrs {
            if inner.known.len() >= MAX_KNOWN_PEERS {
                break;
            }
            if !inner.known.contains(&addr) {
                inner.known.push(addr);
                added += 1;
            }
        }
        added
    }

    /// Remember the addresses of a peer list received from a peer.
    pub async fn learn(&self, entries: &[PeerlistEntry]) -> usize {
        let added = self.add(peer_addrs(entries)).await;
        if added > 0 {
            debug!(added, "[NODES] Learned peers");
        }
        added
    }

    /// Claim the least-failed idle peer, preferring one other than `avoid`.
    pub async fn acquire(&self, avoid: Option<SocketAddr>) -> Option<SocketAddr> {
        let mut inner = self.inner.lock().await;
        let pick = |inner: &Inner, skip: Option<SocketAddr>| {
            inner
                .known
                .iter()
                .filter(|addr| !inner.active.contains(addr) && Some(**addr) != skip)
                .map(|addr| (*addr, inner.failures.get(addr).copied().unwrap_or(0)))
                .filter(|(_, failures)| *failures < MAX_FAILURES)
                .min_by_key(|(_, failures)| *failures)
                .map(|(addr, _)| addr)
        };
        let chosen = pick(&inner, avoid).or_else(|| pick(&inner, None))?;
        inner.active.insert(chosen);
        Some(chosen)
    }

    /// Return a peer claimed by [`NodeList::acquire`].
    pub async fn release(&self, addr: SocketAddr, healthy: bool) {
        let mut inner = self.inner.lock().await;
        inner.active.remove(&addr);
        if healthy {
            inner.failures.remove(&addr);
        } else {
            *inner.failures.entry(addr).or_insert(0) += 1;
        }
    }

    /// Give every failed peer another chance.
    pub async fn reset_failures(&self) {
        self.inner.lock().await.failures.clear();
    }

    /// Number of known peers.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.known.len()
    }

    /// True if no peer is known.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.known.is_empty()
    }

    /// Number of peers with a running session.
    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddrV4};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[tokio::test]
    async fn test_acquire_skips_active_and_avoided() {
        let nodes = NodeList::new();
        assert_eq!(nodes.add([addr(1), addr(2), addr(1)]).await, 2);

        assert_eq!(nodes.acquire(None).await, Some(addr(1)));
        assert_eq!(nodes.acquire(None).await, Some(addr(2)));
        assert_eq!(nodes.acquire(None).await, None);

        nodes.release(addr(1), true).await;
        nodes.release(addr(2), true).await;
        assert_eq!(nodes.acquire(Some(addr(1))).await, Some(addr(2)));
        // Only the avoided peer is idle; it is still handed out.
        assert_eq!(nodes.acquire(Some(addr(1))).await, Some(addr(1)));
        assert_eq!(nodes.active_count().await, 2);
    }

    #[tokio::test]
    async fn test_failing_peer_is_benched() {
        let nodes = NodeList::new();
        nodes.add([addr(1)]).await;
        for _ in 0..MAX_FAILURES {
            let peer = nodes.acquire(None).await.unwrap();
            nodes.release(peer, false).await;
        }
        assert_eq!(nodes.acquire(None).await, None);

        nodes.reset_failures().await;
        assert_eq!(nodes.acquire(None).await, Some(addr(1)));
    }

    #[tokio::test]
    async fn test_learn_keeps_ipv4_only() {
        let nodes = NodeList::new();
        let entries = vec![
            PeerlistEntry {
                adr: PeerAddress::Ipv4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 1), 18080)),
                id: 1,
                last_seen: None,
                pruning_seed: 0,
                rpc_port: 0,
            },
            PeerlistEntry {
                adr: PeerAddress::Other { address_type: 4 },
                id: 2,
                last_seen: None,
                pruning_seed: 0,
                rpc_port: 0,
            },
        ];
        assert_eq!(nodes.learn(&entries).await, 1);
        assert_eq!(nodes.len().await, 1);
    }
}

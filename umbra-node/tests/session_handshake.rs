//! Sessions against an in-process fake peer on a loopback listener.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use umbra_node::session::connection::{request_frame, response_frame};
use umbra_node::session::{read_frame, Session, SessionContext, SessionState};
use umbra_node::{MemoryDatabase, NodeConfig, NodeError, TracingNotifier};
use umbra_types::{BlockHash, Network};
use umbra_wire::p2p::{
    BasicNodeData, CoreSyncData, HandshakeRequest, HandshakeResponse, PeerAddress,
    PeerlistEntry, PingRequest, PingResponse, PING_OK,
};
use umbra_wire::{frame, Command, LevinHeader, Message, DEFAULT_MAX_PAYLOAD};

fn context(network: Network) -> Arc<SessionContext> {
    let config = NodeConfig {
        network,
        dial_timeout: Duration::from_secs(2),
        timed_sync_interval: Duration::from_secs(60),
        ..NodeConfig::default()
    };
    Arc::new(SessionContext::new(
        &config,
        None,
        Arc::new(MemoryDatabase::new()),
        Arc::new(TracingNotifier),
    ))
}

fn handshake_reply(network: Network, height: u64) -> HandshakeResponse {
    HandshakeResponse {
        node_data: BasicNodeData {
            network_id: network.network_id(),
            my_port: 18080,
            rpc_port: 0,
            peer_id: 77,
            support_flags: 1,
        },
        payload_data: CoreSyncData {
            current_height: height,
            cumulative_difficulty: 1,
            top_id: BlockHash::new([3; 32]),
            top_version: 16,
            pruning_seed: 0,
        },
        local_peerlist_new: vec![PeerlistEntry {
            adr: PeerAddress::Ipv4(SocketAddrV4::new(Ipv4Addr::new(10, 0, 0, 9), 18080)),
            id: 5,
            last_seen: Some(1_700_000_000),
            pruning_seed: 0,
            rpc_port: 0,
        }],
    }
}

/// Accept one connection and answer the handshake.
async fn accept_handshake(listener: &TcpListener, reply_network: Network) -> TcpStream {
    let (mut stream, _) = listener.accept().await.unwrap();
    let frame = read_frame(&mut stream, DEFAULT_MAX_PAYLOAD).await.unwrap();
    assert_eq!(frame.header.command, Command::Handshake);
    assert!(frame.header.expects_response);

    let request = HandshakeRequest::from_payload(&frame.payload).unwrap();
    assert_eq!(request.node_data.network_id, Network::Mainnet.network_id());
    assert_eq!(request.payload_data.current_height, 1);

    let reply = handshake_reply(reply_network, request.payload_data.current_height);
    stream
        .write_all(&response_frame(&reply).unwrap())
        .await
        .unwrap();
    stream
}

#[tokio::test]
async fn test_handshake_ping_and_protocol_failures() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let fake_peer = tokio::spawn(async move {
        let mut stream = accept_handshake(&listener, Network::Mainnet).await;

        stream
            .write_all(&request_frame(&PingRequest).unwrap())
            .await
            .unwrap();
        loop {
            let frame = read_frame(&mut stream, DEFAULT_MAX_PAYLOAD).await.unwrap();
            if frame.header.command == Command::Ping && frame.header.is_response() {
                let pong = PingResponse::from_payload(&frame.payload).unwrap();
                assert_eq!(pong.status, PING_OK);
                break;
            }
        }

        for _ in 0..3 {
            let failure = LevinHeader::response(Command::TimedSync, 0, -1);
            stream.write_all(&frame(&failure, &[])).await.unwrap();
        }
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    let ctx = context(Network::Mainnet);
    let session = Session::new(addr, Arc::clone(&ctx));
    let mut states = session.subscribe();
    assert_eq!(session.state(), SessionState::Disconnected);

    let report = tokio::time::timeout(Duration::from_secs(10), session.run())
        .await
        .unwrap();
    assert!(report.reached_ready);
    assert!(matches!(
        report.reason,
        NodeError::Protocol {
            return_code: -1,
            ..
        }
    ));
    assert_eq!(*states.borrow_and_update(), SessionState::Closed);
    assert_eq!(ctx.nodes.len().await, 1);

    fake_peer.await.unwrap();
}

#[tokio::test]
async fn test_network_mismatch_closes_before_ready() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let fake_peer = tokio::spawn(async move {
        let mut stream = accept_handshake(&listener, Network::Stagenet).await;
        let mut rest = Vec::new();
        let _ = stream.read_to_end(&mut rest).await;
    });

    let report = Session::new(addr, context(Network::Mainnet)).run().await;
    assert!(!report.reached_ready);
    assert!(matches!(report.reason, NodeError::InvalidState(_)));
    fake_peer.await.unwrap();
}

#[tokio::test]
async fn test_refused_dial_reports_io_error() {
    let addr: SocketAddr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let report = Session::new(addr, context(Network::Mainnet)).run().await;
    assert!(!report.reached_ready);
    assert_eq!(report.blocks_received, 0);
    assert!(matches!(report.reason, NodeError::Io(_)));
}

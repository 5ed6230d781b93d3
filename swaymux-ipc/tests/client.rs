use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use swaymux_ipc::client::{Client, ClientError};
use swaymux_ipc::codec::{ByteOrder, HEADER_LEN, Header};
use swaymux_ipc::message::{EventType, PayloadType};
use tempfile::{Builder, TempDir};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

struct MockServer {
    _dir: TempDir,
    bind_path: PathBuf,
    handle: JoinHandle<Result<()>>,
}

fn frame(payload_type: u32, payload: &[u8], order: ByteOrder) -> Vec<u8> {
    let header = Header {
        payload_len: payload.len() as u32,
        payload_type,
    };

    let mut raw = header.encode(order).to_vec();
    raw.extend_from_slice(payload);
    raw
}

async fn read_frame(
    stream: &mut UnixStream,
    order: ByteOrder,
) -> Result<(Header, Vec<u8>)> {
    let mut raw = [0u8; HEADER_LEN];
    stream.read_exact(&mut raw).await?;
    let header = Header::decode(&raw, order)?;

    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).await?;

    Ok((header, payload))
}

/// Binds a unix socket under a temp dir and serves `exchanges` round
/// trips: each expected request is answered with the paired reply frame.
fn mock_server(
    name: &str,
    order: ByteOrder,
    exchanges: Vec<(PayloadType, Vec<u8>, Vec<u8>)>,
) -> Result<MockServer> {
    let dir = Builder::new()
        .prefix(&format!("swaymux-ipc-{}", name))
        .rand_bytes(10)
        .tempdir()?;

    let bind_path = dir.path().join("ipc.sock");
    let bind = UnixListener::bind(&bind_path)?;

    let handle = tokio::spawn(async move {
        let (mut stream, _addr) = bind.accept().await?;

        for (expected_type, expected_payload, reply) in exchanges {
            let (header, payload) = read_frame(&mut stream, order).await?;
            assert_eq!(header.payload_type, expected_type as u32);
            assert_eq!(payload, expected_payload);

            stream.write_all(&reply).await?;
        }

        stream.shutdown().await?;
        Ok(())
    });

    Ok(MockServer {
        _dir: dir,
        bind_path,
        handle,
    })
}

#[tokio::test]
async fn version_round_trip_both_byte_orders() -> Result<()> {
    for order in [ByteOrder::Little, ByteOrder::Big] {
        let version = json!({
            "major": 1,
            "minor": 10,
            "patch": 0,
            "human_readable": "1.10",
            "loaded_config_file_name": "/etc/sway/config"
        });

        let server = mock_server(
            "version",
            order,
            vec![(
                PayloadType::GetVersion,
                Vec::new(),
                frame(
                    PayloadType::GetVersion as u32,
                    version.to_string().as_bytes(),
                    order,
                ),
            )],
        )?;

        let client = Client::connect_to(&server.bind_path, order).await?;
        let reply = client.version().await?;

        assert_eq!(reply.major, 1);
        assert_eq!(reply.minor, 10);
        assert_eq!(reply.human_readable, "1.10");
        assert_eq!(reply.loaded_config_file_name, "/etc/sway/config");

        server.handle.await??;
    }

    Ok(())
}

#[tokio::test]
async fn run_command_sends_payload_and_parses_statuses() -> Result<()> {
    let order = ByteOrder::Little;
    let server = mock_server(
        "run-command",
        order,
        vec![(
            PayloadType::RunCommand,
            b"[app_id=term] focus; exec alacritty".to_vec(),
            frame(
                PayloadType::RunCommand as u32,
                br#"[{"success":true},{"success":true}]"#,
                order,
            ),
        )],
    )?;

    let client = Client::connect_to(&server.bind_path, order).await?;
    let statuses = client
        .run_command("[app_id=term] focus; exec alacritty")
        .await?;

    assert_eq!(statuses.len(), 2);
    assert!(statuses.iter().all(|s| s.success));

    server.handle.await??;
    Ok(())
}

#[tokio::test]
async fn subscribe_marshals_event_names() -> Result<()> {
    let order = ByteOrder::Little;
    let server = mock_server(
        "subscribe",
        order,
        vec![(
            PayloadType::Subscribe,
            br#"["window","workspace"]"#.to_vec(),
            frame(
                PayloadType::Subscribe as u32,
                br#"{"success":true}"#,
                order,
            ),
        )],
    )?;

    let client = Client::connect_to(&server.bind_path, order).await?;
    let outcome = client
        .subscribe(&[EventType::Window, EventType::Workspace])
        .await?;

    assert!(outcome.success);

    server.handle.await??;
    Ok(())
}

#[tokio::test]
async fn raw_variant_returns_the_payload_string() -> Result<()> {
    let order = ByteOrder::Little;
    let raw_reply = r#"{"major":1,"minor":9,"patch":0}"#;

    let server = mock_server(
        "version-raw",
        order,
        vec![(
            PayloadType::GetVersion,
            Vec::new(),
            frame(PayloadType::GetVersion as u32, raw_reply.as_bytes(), order),
        )],
    )?;

    let client = Client::connect_to(&server.bind_path, order).await?;
    let reply = client.version_raw().await?;
    assert_eq!(reply, raw_reply);

    server.handle.await??;
    Ok(())
}

#[tokio::test]
async fn tree_parses_into_nodes() -> Result<()> {
    let order = ByteOrder::Little;
    let tree = json!({
        "id": 1,
        "type": "root",
        "nodes": [{
            "id": 2,
            "type": "output",
            "name": "eDP-1",
            "nodes": [{
                "id": 3,
                "type": "workspace",
                "nodes": [{"id": 4, "type": "con", "focused": true}]
            }]
        }]
    });

    let server = mock_server(
        "get-tree",
        order,
        vec![(
            PayloadType::GetTree,
            Vec::new(),
            frame(
                PayloadType::GetTree as u32,
                tree.to_string().as_bytes(),
                order,
            ),
        )],
    )?;

    let client = Client::connect_to(&server.bind_path, order).await?;
    let root = client.tree().await?;

    assert_eq!(root.id, 1);
    let focused = root
        .first(&swaymux_ipc::node::is_focused)
        .expect("focused node in the snapshot");
    assert_eq!(focused.id, 4);

    server.handle.await??;
    Ok(())
}

#[tokio::test]
async fn closed_connection_fails_the_call() -> Result<()> {
    let dir = Builder::new()
        .prefix("swaymux-ipc-closed")
        .rand_bytes(10)
        .tempdir()?;
    let bind_path = dir.path().join("ipc.sock");
    let bind = UnixListener::bind(&bind_path)?;

    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        let (mut stream, _addr) = bind.accept().await?;
        // Consume the request, then hang up without replying.
        read_frame(&mut stream, ByteOrder::Little).await?;
        stream.shutdown().await?;
        Ok(())
    });

    let client = Client::connect_to(&bind_path, ByteOrder::Little).await?;
    let result = client.version().await;

    assert!(
        matches!(result, Err(ClientError::ConnectionClosed)),
        "got: {:?}",
        result.err()
    );

    handle.await??;
    Ok(())
}

#[tokio::test]
async fn concurrent_calls_do_not_interleave() -> Result<()> {
    const CALLS: usize = 8;

    let order = ByteOrder::Little;
    let dir = Builder::new()
        .prefix("swaymux-ipc-concurrent")
        .rand_bytes(10)
        .tempdir()?;
    let bind_path = dir.path().join("ipc.sock");
    let bind = UnixListener::bind(&bind_path)?;

    // Echo server: one complete reply per complete request, in order.
    let handle: JoinHandle<Result<()>> = tokio::spawn(async move {
        let (mut stream, _addr) = bind.accept().await?;

        for _ in 0..CALLS {
            let (header, payload) = read_frame(&mut stream, order).await?;
            assert_eq!(header.payload_type, PayloadType::RunCommand as u32);
            let reply = frame(header.payload_type, &payload, order);
            stream.write_all(&reply).await?;
        }

        stream.shutdown().await?;
        Ok(())
    });

    let client = Arc::new(Client::connect_to(&bind_path, order).await?);

    let mut calls = Vec::new();
    for i in 0..CALLS {
        let client = Arc::clone(&client);
        calls.push(tokio::spawn(async move {
            let payload = format!("nop call-{}", i);
            let reply = client.run_command_raw(&payload).await?;
            Ok::<_, ClientError>((payload, reply))
        }));
    }

    for call in calls {
        let (sent, received) = call.await??;
        // Each call sees exactly its own reply; interleaved frames would
        // hand a reply to the wrong caller.
        assert_eq!(sent, received);
    }

    handle.await??;
    Ok(())
}

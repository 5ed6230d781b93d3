//! The request/reply side of the protocol.

use std::env;
use std::path::Path;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use log::{debug, trace};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::codec::Framed;

use crate::codec::{ByteOrder, Packet, PacketCodec, PacketCodecError};
use crate::message::{EventType, PayloadType};
use crate::node::Node;
use crate::reply::{
    BindingState, CommandOutcome, CommandStatus, Output, Version, Workspace,
};

/// Environment variable naming the sway IPC socket.
pub const SOCKET_ENV: &str = "SWAYSOCK";

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("SWAYSOCK is not set")]
    SocketNotSet,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] PacketCodecError),
    #[error("connection closed before the reply arrived")]
    ConnectionClosed,
    #[error("bad reply payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// A sway-ipc compatible rpc client.
///
/// Each operation is one complete round trip. Requests and replies are
/// correlated only by program order on the single stream, so calls are
/// serialized by the connection mutex; one call is in flight at a time.
pub struct Client<S> {
    conn: Mutex<Framed<S, PacketCodec>>,
}

impl Client<UnixStream> {
    /// Connects to the socket named by `SWAYSOCK`, little-endian header
    /// fields.
    pub async fn connect() -> Result<Self, ConnectError> {
        let path = env::var_os(SOCKET_ENV).ok_or(ConnectError::SocketNotSet)?;
        Self::connect_to(path, ByteOrder::Little).await
    }

    pub async fn connect_to(
        path: impl AsRef<Path>,
        order: ByteOrder,
    ) -> Result<Self, ConnectError> {
        debug!("connecting to {:?}", path.as_ref());
        let stream = UnixStream::connect(path).await?;

        Ok(Self::new(stream, order))
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, order: ByteOrder) -> Self {
        Client {
            conn: Mutex::new(Framed::new(stream, PacketCodec::new(order))),
        }
    }

    /// One full round trip: write the request frame, block reading exactly
    /// one reply frame. The lock is released on every path; there are no
    /// retries and no timeout - cancellation means closing the connection.
    async fn call(
        &self,
        payload_type: PayloadType,
        payload: &[u8],
    ) -> Result<Bytes, ClientError> {
        let mut conn = self.conn.lock().await;

        trace!("-> {:?}, {} payload bytes", payload_type, payload.len());
        conn.send(Packet {
            payload_type: payload_type as u32,
            payload: Bytes::copy_from_slice(payload),
        })
        .await?;

        match conn.next().await {
            Some(Ok(reply)) => {
                trace!(
                    "<- type {:#x}, {} payload bytes",
                    reply.payload_type,
                    reply.payload.len()
                );
                Ok(reply.payload)
            }
            Some(Err(err)) => Err(err.into()),
            None => Err(ClientError::ConnectionClosed),
        }
    }

    async fn call_typed<T: DeserializeOwned>(
        &self,
        payload_type: PayloadType,
        payload: &[u8],
    ) -> Result<T, ClientError> {
        let raw = self.call(payload_type, payload).await?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn call_raw(
        &self,
        payload_type: PayloadType,
        payload: &[u8],
    ) -> Result<String, ClientError> {
        let raw = self.call(payload_type, payload).await?;
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Implements the sway-ipc RUN_COMMAND message.
    pub async fn run_command(
        &self,
        cmd: &str,
    ) -> Result<Vec<CommandStatus>, ClientError> {
        self.call_typed(PayloadType::RunCommand, cmd.as_bytes()).await
    }

    /// RUN_COMMAND, returning the reply as a json string.
    pub async fn run_command_raw(
        &self,
        cmd: &str,
    ) -> Result<String, ClientError> {
        self.call_raw(PayloadType::RunCommand, cmd.as_bytes()).await
    }

    /// Implements the sway-ipc GET_WORKSPACES message.
    pub async fn workspaces(&self) -> Result<Vec<Workspace>, ClientError> {
        self.call_typed(PayloadType::GetWorkspaces, &[]).await
    }

    /// GET_WORKSPACES, returning the reply as a json string.
    pub async fn workspaces_raw(&self) -> Result<String, ClientError> {
        self.call_raw(PayloadType::GetWorkspaces, &[]).await
    }

    /// Implements the sway-ipc SUBSCRIBE message. A failed outcome does
    /// not close the connection; interpreting it is the caller's job.
    pub async fn subscribe(
        &self,
        events: &[EventType],
    ) -> Result<CommandOutcome, ClientError> {
        let payload = serde_json::to_vec(events)?;
        self.call_typed(PayloadType::Subscribe, &payload).await
    }

    /// Implements the sway-ipc GET_OUTPUTS message.
    pub async fn outputs(&self) -> Result<Vec<Output>, ClientError> {
        self.call_typed(PayloadType::GetOutputs, &[]).await
    }

    /// GET_OUTPUTS, returning the reply as a json string.
    pub async fn outputs_raw(&self) -> Result<String, ClientError> {
        self.call_raw(PayloadType::GetOutputs, &[]).await
    }

    /// Implements the sway-ipc GET_TREE message. Returns the root of a
    /// fresh tree snapshot.
    pub async fn tree(&self) -> Result<Node, ClientError> {
        self.call_typed(PayloadType::GetTree, &[]).await
    }

    /// GET_TREE, returning the reply as a json string.
    pub async fn tree_raw(&self) -> Result<String, ClientError> {
        self.call_raw(PayloadType::GetTree, &[]).await
    }

    /// Implements the sway-ipc GET_MARKS message.
    pub async fn marks(&self) -> Result<Vec<String>, ClientError> {
        self.call_typed(PayloadType::GetMarks, &[]).await
    }

    /// GET_MARKS, returning the reply as a json string.
    pub async fn marks_raw(&self) -> Result<String, ClientError> {
        self.call_raw(PayloadType::GetMarks, &[]).await
    }

    /// Implements the sway-ipc GET_VERSION message.
    pub async fn version(&self) -> Result<Version, ClientError> {
        self.call_typed(PayloadType::GetVersion, &[]).await
    }

    /// GET_VERSION, returning the reply as a json string.
    pub async fn version_raw(&self) -> Result<String, ClientError> {
        self.call_raw(PayloadType::GetVersion, &[]).await
    }

    /// Implements the sway-ipc GET_BINDING_MODES message.
    pub async fn binding_modes(&self) -> Result<Vec<String>, ClientError> {
        self.call_typed(PayloadType::GetBindingModes, &[]).await
    }

    /// GET_BINDING_MODES, returning the reply as a json string.
    pub async fn binding_modes_raw(&self) -> Result<String, ClientError> {
        self.call_raw(PayloadType::GetBindingModes, &[]).await
    }

    /// Implements the sway-ipc SEND_TICK message.
    pub async fn send_tick(
        &self,
        payload: &str,
    ) -> Result<CommandOutcome, ClientError> {
        self.call_typed(PayloadType::SendTick, payload.as_bytes()).await
    }

    /// SEND_TICK, returning the reply as a json string.
    pub async fn send_tick_raw(
        &self,
        payload: &str,
    ) -> Result<String, ClientError> {
        self.call_raw(PayloadType::SendTick, payload.as_bytes()).await
    }

    /// Implements the sway-ipc GET_BINDING_STATE message.
    pub async fn binding_state(&self) -> Result<BindingState, ClientError> {
        self.call_typed(PayloadType::GetBindingState, &[]).await
    }

    /// GET_BINDING_STATE, returning the reply as a json string.
    pub async fn binding_state_raw(&self) -> Result<String, ClientError> {
        self.call_raw(PayloadType::GetBindingState, &[]).await
    }
}

//! Binary WebSocket connection used by the host and participant roles.

use std::marker::PhantomData;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use scorecast_core::net::packets::{
    ClientboundHostPacket, ClientboundParticipantPacket, Packet, ServerboundHostPacket,
    ServerboundParticipantPacket,
};

use crate::error::TransportError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A duplex connection receiving `In` packets and sending `Out` packets,
/// one packet per binary frame.
pub struct DuplexConnection<In, Out> {
    stream: WsStream,
    _packets: PhantomData<fn(Out) -> In>,
}

pub type HostConnection = DuplexConnection<ClientboundHostPacket, ServerboundHostPacket>;
pub type ParticipantConnection =
    DuplexConnection<ClientboundParticipantPacket, ServerboundParticipantPacket>;

impl<In: Packet, Out: Packet + std::fmt::Debug> DuplexConnection<In, Out> {
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let (stream, _) = tokio_tungstenite::connect_async(url).await?;
        tracing::info!(url, "Duplex channel connected");
        Ok(Self {
            stream,
            _packets: PhantomData,
        })
    }

    pub async fn send(&mut self, packet: &Out) -> Result<(), TransportError> {
        tracing::debug!(?packet, "Sending packet");
        self.stream
            .send(Message::Binary(packet.to_bytes().into()))
            .await?;
        Ok(())
    }

    /// Next packet from the server, or `None` once the server closes.
    ///
    /// Cancel-safe: nothing is consumed unless a packet is returned.
    pub async fn recv(&mut self) -> Result<Option<In>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(len = data.len(), "Received frame");
                    return Ok(Some(In::from_bytes(&data)?));
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server closed duplex channel");
                    return Ok(None);
                },
                Some(Ok(Message::Text(text))) => {
                    tracing::debug!(len = text.len(), "Ignoring text frame");
                },
                Some(Ok(_)) => {},
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "Duplex channel already closed");
        }
    }
}

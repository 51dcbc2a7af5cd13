//! WebSocket adapters.
//!
//! Implements [`FrameSink`] / [`FrameStream`] for the split halves of an
//! axum `WebSocket` (server side) and of a tokio-tungstenite
//! `WebSocketStream` (standalone listeners and clients).

#[cfg(feature = "axum")]
mod axum_ws {
    use async_trait::async_trait;
    use axum::extract::ws::{Message, WebSocket};
    use bytes::Bytes;
    use futures_util::stream::{SplitSink, SplitStream};
    use futures_util::{SinkExt, StreamExt};

    use crate::traits::{FrameSink, FrameStream, Inbound, TransportError};

    #[async_trait]
    impl FrameSink for SplitSink<WebSocket, Message> {
        async fn send_text(&mut self, frame: Bytes) -> Result<(), TransportError> {
            let text = String::from_utf8(frame.to_vec())
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            self.send(Message::Text(text))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }

        async fn ping(&mut self) -> Result<(), TransportError> {
            self.send(Message::Ping(Vec::new()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            SinkExt::close(self)
                .await
                .map_err(|e| TransportError::SendFailed(format!("Failed to close: {}", e)))
        }
    }

    #[async_trait]
    impl FrameStream for SplitStream<WebSocket> {
        async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
            match self.next().await {
                Some(Ok(Message::Text(text))) => Ok(Some(Inbound::Data(text.len()))),
                Some(Ok(Message::Binary(data))) => Ok(Some(Inbound::Data(data.len()))),
                Some(Ok(Message::Ping(_))) => Ok(Some(Inbound::Ping)),
                Some(Ok(Message::Pong(_))) => Ok(Some(Inbound::Pong)),
                Some(Ok(Message::Close(_))) | None => Ok(None),
                Some(Err(e)) => Err(TransportError::ReceiveFailed(e.to_string())),
            }
        }
    }
}

#[cfg(feature = "tungstenite")]
mod tungstenite_ws {
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures_util::stream::{SplitSink, SplitStream};
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::{AsyncRead, AsyncWrite};
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};
    use tokio_tungstenite::WebSocketStream;

    use crate::traits::{FrameSink, FrameStream, Inbound, TransportError};

    #[async_trait]
    impl<S> FrameSink for SplitSink<WebSocketStream<S>, Message>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        async fn send_text(&mut self, frame: Bytes) -> Result<(), TransportError> {
            let text = String::from_utf8(frame.to_vec())
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            self.send(Message::Text(text))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }

        async fn ping(&mut self) -> Result<(), TransportError> {
            self.send(Message::Ping(Vec::new()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            match SinkExt::close(self).await {
                Ok(()) | Err(WsError::ConnectionClosed) | Err(WsError::AlreadyClosed) => Ok(()),
                Err(e) => Err(TransportError::SendFailed(format!("Failed to close: {}", e))),
            }
        }
    }

    #[async_trait]
    impl<S> FrameStream for SplitStream<WebSocketStream<S>>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        async fn recv(&mut self) -> Result<Option<Inbound>, TransportError> {
            loop {
                let inbound = match self.next().await {
                    Some(Ok(Message::Text(text))) => Inbound::Data(text.len()),
                    Some(Ok(Message::Binary(data))) => Inbound::Data(data.len()),
                    Some(Ok(Message::Ping(_))) => Inbound::Ping,
                    Some(Ok(Message::Pong(_))) => Inbound::Pong,
                    // Raw frame, ignore
                    Some(Ok(Message::Frame(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    Some(Err(WsError::ConnectionClosed)) => return Ok(None),
                    Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                };
                return Ok(Some(inbound));
            }
        }
    }
}

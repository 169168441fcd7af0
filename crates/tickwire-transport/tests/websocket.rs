//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tickwire_transport::{
        Listener, Transport, TransportError, WebSocketListener, WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds a listener, connects one client and returns both ends.
    async fn connected_pair() -> (WebSocketTransport, ClientWs) {
        let mut listener = WebSocketListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("bound address");

        let server = tokio::spawn(async move { listener.accept().await.expect("should accept") });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let (transport, _peer_addr) = server.await.expect("accept task");
        (transport, client)
    }

    #[tokio::test]
    async fn test_websocket_write_then_read_both_directions() {
        let (server, mut client) = connected_pair().await;
        assert!(server.id().into_inner() > 0);

        server.write(b"hello from server").await.expect("write");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        client
            .send(Message::Binary(b"hello from client".to_vec().into()))
            .await
            .unwrap();
        assert_eq!(server.read().await.expect("read"), b"hello from client");
    }

    #[tokio::test]
    async fn test_websocket_text_message_is_delivered_as_bytes() {
        let (server, mut client) = connected_pair().await;
        client.send(Message::Text("plain".into())).await.unwrap();
        assert_eq!(server.read().await.unwrap(), b"plain");
    }

    #[tokio::test]
    async fn test_websocket_read_after_client_close_is_terminal() {
        let (server, mut client) = connected_pair().await;
        client.send(Message::Close(None)).await.unwrap();

        let err = server.read().await.expect_err("closed peer");
        assert!(err.is_terminal(), "got {err}");
    }

    #[tokio::test]
    async fn test_websocket_write_not_blocked_by_pending_read() {
        let (server, mut client) = connected_pair().await;
        let server = Arc::new(server);

        // park a reader on the stream half
        let reader = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.read().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(2), server.write(b"while reading"))
            .await
            .expect("write must not wait for the reader")
            .expect("write");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"while reading");

        client
            .send(Message::Binary(b"unpark".to_vec().into()))
            .await
            .unwrap();
        assert_eq!(reader.await.unwrap().unwrap(), b"unpark");
    }

    #[tokio::test]
    async fn test_websocket_close_sends_code_and_reason() {
        let (server, mut client) = connected_pair().await;
        server.close(1000, "done").await.expect("close");

        match client.next().await {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 1000);
                assert_eq!(frame.reason.as_str(), "done");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_websocket_write_after_close_returns_shutdown() {
        let (server, _client) = connected_pair().await;
        server.close(1000, "").await.expect("close");

        assert!(matches!(
            server.write(b"late").await,
            Err(TransportError::Shutdown)
        ));
        assert!(matches!(
            server.close(1000, "").await,
            Err(TransportError::Shutdown)
        ));
    }
}

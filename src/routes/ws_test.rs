use super::*;
use crate::api::{ApiError, Bootstrap, OrderDetailsSource};
use crate::model::{BoxRecord, OrderDetails, RecordId};
use crate::realtime::{BoardOptions, RealtimeBoard};
use crate::transport::memory::MemoryTransport;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::time::{Duration, timeout};
use tokio_tungstenite::tungstenite;

struct NoDetails;

#[async_trait::async_trait]
impl OrderDetailsSource for NoDetails {
    async fn order_details(&self, _order_service_id: &RecordId) -> Result<OrderDetails, ApiError> {
        Err(ApiError::Request("unused".into()))
    }
}

async fn spawn_app(transport: Arc<MemoryTransport>) -> (String, Arc<RealtimeBoard>) {
    let bootstrap = Bootstrap::new(vec![BoxRecord::new(1_i64, "BOX-01")], Vec::new());
    let board = Arc::new(RealtimeBoard::start(transport, BoardOptions::default(), bootstrap).await);
    let app = crate::routes::app(AppState::new(Arc::clone(&board), Arc::new(NoDetails)));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("ws://{addr}/api/board/ws"), board)
}

async fn next_snapshot<S>(socket: &mut S) -> BoardSnapshot
where
    S: futures_util::Stream<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    loop {
        let message = timeout(Duration::from_secs(2), socket.next())
            .await
            .expect("ws receive timed out")
            .expect("ws closed")
            .expect("ws error");
        if let tungstenite::Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).expect("snapshot json");
        }
    }
}

#[tokio::test]
async fn pushes_snapshot_on_connect_and_on_change() {
    let transport = Arc::new(MemoryTransport::offline());
    let (url, board) = spawn_app(Arc::clone(&transport)).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();

    let first = next_snapshot(&mut socket).await;
    assert!(!first.connected);
    assert!(first.find("BOX-01").is_some());

    transport.go_online().await;
    let second = next_snapshot(&mut socket).await;
    assert!(second.connected);
    board.stop().await;
}

#[tokio::test]
async fn stopping_the_board_ends_the_stream() {
    let transport = Arc::new(MemoryTransport::new());
    let (url, board) = spawn_app(transport).await;
    let (mut socket, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
    next_snapshot(&mut socket).await;

    board.stop().await;
    let ended = timeout(Duration::from_secs(2), async {
        while let Some(Ok(message)) = socket.next().await {
            if message.is_close() {
                break;
            }
        }
    })
    .await;
    assert!(ended.is_ok(), "socket should close after the board stops");
}

use super::*;
use crate::model::{BoxRecord, OrderDetails, OrderEvent, OrderStatus, RecordId, StatusColor, TaskSummary};
use crate::transport::memory::{MemoryTransport, TransportCall};
use crate::transport::stomp::{StompConfig, StompTransport};
use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{Duration, timeout};

const BROADCAST: &str = "/topic/dashboard";

fn bootstrap() -> Bootstrap {
    Bootstrap::new(
        vec![BoxRecord::new(1_i64, "BOX-01"), BoxRecord::new(2_i64, "BOX-02")],
        vec![OrderEvent {
            order_service_id: Some(RecordId::from("o-1")),
            order_service_number: Some(7),
            status_color: Some(StatusColor::Green),
            ..OrderEvent::for_box("BOX-01")
        }],
    )
}

async fn wait_until(board: &RealtimeBoard, check: impl FnMut(&BoardSnapshot) -> bool) -> BoardSnapshot {
    let mut rx = board.subscribe();
    let snapshot = timeout(Duration::from_secs(2), rx.wait_for(check))
        .await
        .expect("snapshot wait timed out")
        .expect("board task ended")
        .clone();
    snapshot
}

struct FixedDetails(OrderDetails);

#[async_trait]
impl OrderDetailsSource for FixedDetails {
    async fn order_details(&self, _order_service_id: &RecordId) -> Result<OrderDetails, ApiError> {
        Ok(self.0.clone())
    }
}

struct FailingDetails;

#[async_trait]
impl OrderDetailsSource for FailingDetails {
    async fn order_details(&self, _order_service_id: &RecordId) -> Result<OrderDetails, ApiError> {
        Err(ApiError::Status { status: 500, body: "boom".into() })
    }
}

/// Blocks inside the fetch until released, so the board can change under it.
#[derive(Default)]
struct GatedDetails {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl OrderDetailsSource for GatedDetails {
    async fn order_details(&self, _order_service_id: &RecordId) -> Result<OrderDetails, ApiError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(OrderDetails::default())
    }
}

#[tokio::test]
async fn serves_bootstrap_then_goes_live() {
    let transport = Arc::new(MemoryTransport::offline());
    let board = RealtimeBoard::start(transport.clone(), BoardOptions::default(), bootstrap()).await;

    let snapshot = board.snapshot();
    assert!(!snapshot.connected);
    assert_eq!(snapshot.find("BOX-01").unwrap().status_color, StatusColor::Green);

    transport.go_online().await;
    wait_until(&board, |s| s.connected).await;
    assert_eq!(transport.subscriptions_on(BROADCAST), 1);
    assert_eq!(transport.subscriptions_on("/topic/dashboard/o-1"), 1);
    board.stop().await;
}

#[tokio::test]
async fn transport_start_failure_keeps_bootstrap_data() {
    let transport = Arc::new(StompTransport::new(StompConfig::new("http://not-a-broker")));
    let board = RealtimeBoard::start(transport, BoardOptions::default(), bootstrap()).await;

    let snapshot = board.snapshot();
    assert!(!snapshot.connected);
    assert_eq!(snapshot.find("BOX-01").unwrap().order_service_number, Some(7));
    board.stop().await;
}

#[tokio::test]
async fn broadcast_updates_reach_subscribers() {
    let transport = Arc::new(MemoryTransport::new());
    let board = RealtimeBoard::start(transport.clone(), BoardOptions::default(), bootstrap()).await;
    wait_until(&board, |s| s.connected).await;

    let body = r#"{"boxIdentifier":"BOX-02","orderServiceId":"o-2","statusColor":"RED","carPresent":true}"#;
    assert_eq!(transport.publish(BROADCAST, body).await, 1);

    let snapshot =
        wait_until(&board, |s| s.find("BOX-02").is_some_and(|b| b.status_color == StatusColor::Red)).await;
    assert!(snapshot.find("BOX-02").unwrap().car_present);
    assert_eq!(snapshot.tracked_boxes, 2);

    timeout(Duration::from_secs(2), async {
        while transport.subscriptions_on("/topic/dashboard/o-2") == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("order subscription");
    board.stop().await;
}

#[tokio::test]
async fn disconnect_is_visible_in_snapshot() {
    let transport = Arc::new(MemoryTransport::new());
    let board = RealtimeBoard::start(transport.clone(), BoardOptions::default(), bootstrap()).await;
    wait_until(&board, |s| s.connected).await;

    transport.drop_connection().await;
    let snapshot = wait_until(&board, |s| !s.connected).await;
    assert_eq!(snapshot.find("BOX-01").unwrap().status_color, StatusColor::Green);
    board.stop().await;
}

#[tokio::test]
async fn stop_is_idempotent_and_closes_transport() {
    let transport = Arc::new(MemoryTransport::new());
    let board = RealtimeBoard::start(transport.clone(), BoardOptions::default(), bootstrap()).await;
    wait_until(&board, |s| s.connected).await;

    board.stop().await;
    board.stop().await;
    assert!(board.is_stopped());
    assert!(!board.snapshot().connected);
    assert!(transport.active_topics().is_empty());
    let disconnects = transport.calls().iter().filter(|c| **c == TransportCall::Disconnect).count();
    assert_eq!(disconnects, 1);
    assert!(matches!(board.reset(bootstrap()).await, Err(BoardError::Stopped)));
}

#[tokio::test]
async fn reset_swaps_bootstrap() {
    let transport = Arc::new(MemoryTransport::new());
    let board = RealtimeBoard::start(transport.clone(), BoardOptions::default(), bootstrap()).await;
    wait_until(&board, |s| s.connected).await;

    board.reset(Bootstrap::new(vec![BoxRecord::new(5_i64, "BOX-05")], Vec::new())).await.unwrap();
    let snapshot = board.snapshot();
    assert!(snapshot.find("BOX-01").is_none());
    assert_eq!(snapshot.find("BOX-05").unwrap().status_color, StatusColor::Available);
    assert_eq!(transport.subscriptions_on("/topic/dashboard/o-1"), 0);
    assert_eq!(transport.subscriptions_on(BROADCAST), 1);
    board.stop().await;
}

#[tokio::test]
async fn drill_down_merges_live_state_over_details() {
    let transport = Arc::new(MemoryTransport::offline());
    let board = RealtimeBoard::start(transport, BoardOptions::default(), bootstrap()).await;
    let source = FixedDetails(OrderDetails {
        os_number: Some(99),
        vehicle_info: Some("VW Gol".into()),
        tasks: vec![
            TaskSummary { status: Some(OrderStatus::Completed), ..TaskSummary::default() },
            TaskSummary::default(),
        ],
        ..OrderDetails::default()
    });

    let drilldown = board.drill_down("BOX-01", &source).await.unwrap();
    assert_eq!(drilldown.order_service_id, RecordId::from("o-1"));
    assert_eq!(drilldown.order_service_number, Some(7));
    assert_eq!(drilldown.vehicle_info.as_deref(), Some("VW Gol"));
    assert_eq!(drilldown.progress.completed, 1);
    board.stop().await;
}

#[tokio::test]
async fn drill_down_reports_missing_order_and_failures() {
    let transport = Arc::new(MemoryTransport::offline());
    let board = RealtimeBoard::start(transport, BoardOptions::default(), bootstrap()).await;

    let err = board.drill_down("BOX-02", &FailingDetails).await.unwrap_err();
    assert!(matches!(err, BoardError::NoActiveOrder(_)));
    let err = board.drill_down("BOX-99", &FailingDetails).await.unwrap_err();
    assert!(matches!(err, BoardError::UnknownBox(_)));
    let err = board.drill_down("BOX-01", &FailingDetails).await.unwrap_err();
    assert_eq!(err.error_code(), "E_DETAIL_FETCH");

    // The board keeps running after a failed fetch.
    assert!(!board.is_stopped());
    board.stop().await;
}

#[tokio::test]
async fn drill_down_finishing_after_stop_is_discarded() {
    let transport = Arc::new(MemoryTransport::offline());
    let board = Arc::new(RealtimeBoard::start(transport, BoardOptions::default(), bootstrap()).await);
    let source = Arc::new(GatedDetails::default());

    let pending = tokio::spawn({
        let board = Arc::clone(&board);
        let source = Arc::clone(&source);
        async move { board.drill_down("BOX-01", source.as_ref()).await }
    });
    source.entered.notified().await;
    board.stop().await;
    source.release.notify_one();

    let result = timeout(Duration::from_secs(2), pending).await.unwrap().unwrap();
    assert!(matches!(result, Err(BoardError::Stopped)));
}

#[tokio::test]
async fn drill_down_finishing_after_reset_is_discarded() {
    let transport = Arc::new(MemoryTransport::offline());
    let board = Arc::new(RealtimeBoard::start(transport, BoardOptions::default(), bootstrap()).await);
    let source = Arc::new(GatedDetails::default());

    let pending = tokio::spawn({
        let board = Arc::clone(&board);
        let source = Arc::clone(&source);
        async move { board.drill_down("BOX-01", source.as_ref()).await }
    });
    source.entered.notified().await;
    board.reset(bootstrap()).await.unwrap();
    source.release.notify_one();

    let result = timeout(Duration::from_secs(2), pending).await.unwrap().unwrap();
    assert!(matches!(result, Err(BoardError::Stale)));
    board.stop().await;
}

#[tokio::test]
async fn drill_down_racing_a_reset_never_sees_the_old_board() {
    let transport = Arc::new(MemoryTransport::offline());
    let board = RealtimeBoard::start(transport, BoardOptions::default(), bootstrap()).await;
    let source = FixedDetails(OrderDetails::default());

    let only_box_02 = Bootstrap::new(vec![BoxRecord::new(2_i64, "BOX-02")], Vec::new());
    let (reset, drilldown) = tokio::join!(board.reset(only_box_02), board.drill_down("BOX-01", &source));
    reset.unwrap();
    assert!(matches!(drilldown, Err(BoardError::UnknownBox(_))));
    assert!(board.snapshot().find("BOX-01").is_none());
    board.stop().await;
}

#[tokio::test]
async fn drill_down_racing_a_reset_reads_the_new_order() {
    let transport = Arc::new(MemoryTransport::offline());
    let board = RealtimeBoard::start(transport, BoardOptions::default(), bootstrap()).await;
    let source = FixedDetails(OrderDetails::default());

    let reassigned = Bootstrap::new(
        vec![BoxRecord::new(1_i64, "BOX-01")],
        vec![OrderEvent { order_service_id: Some(RecordId::from("o-2")), ..OrderEvent::for_box("BOX-01") }],
    );
    let (reset, drilldown) = tokio::join!(board.reset(reassigned), board.drill_down("BOX-01", &source));
    reset.unwrap();
    assert_eq!(drilldown.unwrap().order_service_id, RecordId::from("o-2"));
    board.stop().await;
}

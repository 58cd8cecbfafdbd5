use super::*;

fn live_box() -> BoxStatus {
    BoxStatus {
        id: Some(RecordId::from(1_i64)),
        name: "BOX-01".into(),
        number: 1,
        status_color: StatusColor::Paused,
        order_service_id: Some(RecordId::from("o-9")),
        order_service_number: Some(42),
        status: Some(OrderStatus::Paused),
        time_status: Some(TimeStatus::Late),
        technician_name: Some("Ana".into()),
        current_task_name: Some("Freios".into()),
        task_elapsed_time: Some(12),
        task_estimated_time: Some(30),
        pause_reason: Some("Aguardando Peças".into()),
        car_present: true,
    }
}

fn task(name: &str, status: Option<OrderStatus>) -> TaskSummary {
    TaskSummary { name: Some(name.into()), status, ..TaskSummary::default() }
}

#[test]
fn progress_counts_completed_and_finished() {
    let tasks = vec![
        task("a", Some(OrderStatus::Completed)),
        task("b", Some(OrderStatus::Finished)),
        task("c", Some(OrderStatus::InProgress)),
        task("d", None),
    ];
    let progress = TaskProgress::of(&tasks);
    assert_eq!(progress, TaskProgress { completed: 2, total: 4 });
    assert_eq!(progress.percent(), 50);
    assert_eq!(TaskProgress::of(&[]).percent(), 0);
}

#[test]
fn live_fields_win_over_fetched_ones() {
    let details = OrderDetails {
        os_number: Some(7),
        status: Some(OrderStatus::InProgress),
        technician_name: Some("Bruno".into()),
        pause_reason: Some("Almoço".into()),
        vehicle_info: Some("Fiat Uno".into()),
        start_time: Some("2024-05-01T08:00:00".into()),
        tasks: vec![task("Troca de óleo", Some(OrderStatus::Completed)), task("Freios", None)],
        ..OrderDetails::default()
    };

    let drilldown = merge_details(&live_box(), RecordId::from("o-9"), details);
    assert_eq!(drilldown.order_service_number, Some(42));
    assert_eq!(drilldown.status, Some(OrderStatus::Paused));
    assert_eq!(drilldown.technician_name.as_deref(), Some("Ana"));
    assert_eq!(drilldown.pause_reason.as_deref(), Some("Aguardando Peças"));
    assert_eq!(drilldown.vehicle_info.as_deref(), Some("Fiat Uno"));
    assert_eq!(drilldown.start_time.as_deref(), Some("2024-05-01T08:00:00"));
    assert_eq!(drilldown.progress, TaskProgress { completed: 1, total: 2 });
}

#[test]
fn fetched_fields_fill_live_gaps() {
    let live = BoxStatus {
        order_service_number: None,
        status: None,
        technician_name: None,
        pause_reason: None,
        ..live_box()
    };
    let details = OrderDetails {
        os_number: Some(7),
        status: Some(OrderStatus::Delayed),
        technician_name: Some("Bruno".into()),
        ..OrderDetails::default()
    };

    let drilldown = merge_details(&live, RecordId::from("o-9"), details);
    assert_eq!(drilldown.order_service_number, Some(7));
    assert_eq!(drilldown.status, Some(OrderStatus::Delayed));
    assert_eq!(drilldown.technician_name.as_deref(), Some("Bruno"));
    assert_eq!(drilldown.pause_reason, None);
    assert_eq!(drilldown.box_name, "BOX-01");
}

//! End-to-end reconciliation through in-memory catalogs
//!
//! Run with: cargo test --test reconcile_flows

mod helpers;

use catalog_sync::config::DEFAULT_CLASSIFICATION_MESSAGE;
use catalog_sync::reconcile::{FailureStage, OutcomeStatus, ReconciliationDriver, UpdateKind};
use catalog_sync::{ReconcileConfig, SyncError, SyncFlow};
use catalog_types::{ColumnAsset, TableAsset};
use helpers::{column_record, column_tag, table_record, Call, RecordingBi, StubWarehouse};
use std::sync::Arc;

fn descriptions() -> ReconcileConfig {
    ReconcileConfig::new(SyncFlow::Descriptions, "PERSONAL", "PUBLIC")
}

fn labels() -> ReconcileConfig {
    ReconcileConfig::new(SyncFlow::Labels, "PERSONAL", "PUBLIC")
}

fn orders_and_customers() -> StubWarehouse {
    StubWarehouse {
        tables: vec![
            table_record("PUBLIC", "ORDERS", Some("Order header"), Some(500)),
            table_record("PUBLIC", "CUSTOMERS", Some("Customer master"), Some(10)),
        ],
        ..StubWarehouse::default()
    }
}

#[tokio::test]
async fn orders_match_and_customers_are_excluded() {
    let bi = Arc::new(RecordingBi::new(
        vec![TableAsset::new("t1", "ORDERS", "PUBLIC")],
        vec![],
    ));
    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(orders_and_customers()),
        descriptions(),
    );

    let summary = driver.run().await.unwrap();

    assert_eq!(summary.tables_matched, 1);
    assert_eq!(summary.tables_unmatched, 1);
    assert_eq!(
        bi.calls(),
        vec![Call::TableDescription {
            table_id: "t1".into(),
            text: "Order header\nTotal table rows is 500.".into(),
        }]
    );
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn column_descriptions_follow_catalog_order() {
    let bi = Arc::new(RecordingBi::new(
        vec![TableAsset::new("t1", "orders", "public")],
        vec![
            ColumnAsset::new("c2", "amount", "t1"),
            ColumnAsset::new("c1", "id", "t1"),
            ColumnAsset::new("c3", "legacy_flag", "t1"),
        ],
    ));
    let warehouse = StubWarehouse {
        columns: vec![
            column_record("ORDERS", "ID", Some("Order id")),
            column_record("ORDERS", "AMOUNT", Some("Gross amount")),
            column_record("ORDERS", "NOTES", None),
        ],
        ..orders_and_customers()
    };
    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(warehouse),
        descriptions().with_table_descriptions(false),
    );

    let summary = driver.run().await.unwrap();

    assert_eq!(
        bi.calls(),
        vec![
            Call::ColumnDescription {
                table_id: "t1".into(),
                column_id: "c2".into(),
                text: "Gross amount".into(),
            },
            Call::ColumnDescription {
                table_id: "t1".into(),
                column_id: "c1".into(),
                text: "Order id".into(),
            },
        ]
    );
    assert_eq!(summary.columns_matched, 2);
    // legacy_flag has no warehouse column, NOTES has no catalog column
    assert_eq!(summary.columns_unmatched, 2);
}

#[tokio::test]
async fn pii_tag_becomes_one_label_assignment() {
    let bi = Arc::new(RecordingBi::new(
        vec![TableAsset::new("t2", "CUSTOMERS", "PUBLIC")],
        vec![
            ColumnAsset::new("c9", "EMAIL", "t2"),
            ColumnAsset::new("c10", "CREATED_AT", "t2"),
        ],
    ));
    let warehouse = StubWarehouse {
        tags: vec![column_tag("CUSTOMERS", "EMAIL", "PII")],
        ..orders_and_customers()
    };
    let driver = ReconciliationDriver::new(bi.clone(), Arc::new(warehouse), labels());

    let summary = driver.run().await.unwrap();

    let assignments: Vec<Call> = bi
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::ColumnLabel { .. }))
        .collect();
    assert_eq!(
        assignments,
        vec![Call::ColumnLabel {
            column_id: "c9".into(),
            label_value: "PII".into(),
            message: DEFAULT_CLASSIFICATION_MESSAGE.into(),
        }]
    );
    assert_eq!(bi.calls()[0], Call::LabelValue { name: "PII".into() });
    assert_eq!(summary.updates_succeeded, 2);
}

#[tokio::test]
async fn label_value_failure_does_not_block_assignments() {
    let bi = Arc::new(
        RecordingBi::new(
            vec![TableAsset::new("t2", "CUSTOMERS", "PUBLIC")],
            vec![ColumnAsset::new("c9", "EMAIL", "t2")],
        )
        .fail_on("PII"),
    );
    let warehouse = StubWarehouse {
        tags: vec![column_tag("CUSTOMERS", "EMAIL", "PII")],
        ..orders_and_customers()
    };
    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(warehouse),
        labels().with_classification_message("Restricted"),
    );

    let summary = driver.run().await.unwrap();

    assert_eq!(bi.calls().len(), 2);
    assert_eq!(summary.updates_failed, 1);
    assert_eq!(summary.updates_succeeded, 1);
    assert_eq!(summary.failures[0].kind, Some(UpdateKind::LabelValue));
}

#[tokio::test]
async fn failed_update_does_not_stop_later_items() {
    let bi = Arc::new(
        RecordingBi::new(
            vec![
                TableAsset::new("t1", "ORDERS", "PUBLIC"),
                TableAsset::new("t2", "CUSTOMERS", "PUBLIC"),
            ],
            vec![
                ColumnAsset::new("c1", "ID", "t1"),
                ColumnAsset::new("c2", "EMAIL", "t2"),
            ],
        )
        .fail_on("c1"),
    );
    let warehouse = StubWarehouse {
        columns: vec![
            column_record("ORDERS", "ID", Some("Order id")),
            column_record("CUSTOMERS", "EMAIL", Some("Contact email")),
        ],
        ..orders_and_customers()
    };
    let driver = ReconciliationDriver::new(bi.clone(), Arc::new(warehouse), descriptions());

    let summary = driver.run().await.unwrap();

    // t1, c1 (fails), t2, c2: everything after the failure was still attempted
    assert_eq!(bi.calls().len(), 4);
    assert_eq!(summary.updates_succeeded, 3);
    assert_eq!(summary.updates_failed, 1);

    let failure = &summary.failures[0];
    assert_eq!(failure.stage, FailureStage::Update);
    assert_eq!(failure.key, "PUBLIC.ORDERS.ID (c1)");
    assert!(failure.cause.contains("403"));

    let statuses: Vec<OutcomeStatus> = summary.outcomes.iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            OutcomeStatus::Succeeded,
            OutcomeStatus::Failed,
            OutcomeStatus::Succeeded,
            OutcomeStatus::Succeeded,
        ]
    );
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn column_fetch_failure_is_isolated_to_its_table() {
    let bi = Arc::new(RecordingBi::new(
        vec![
            TableAsset::new("t1", "ORDERS", "PUBLIC"),
            TableAsset::new("t2", "CUSTOMERS", "PUBLIC"),
        ],
        vec![
            ColumnAsset::new("c1", "ID", "t1"),
            ColumnAsset::new("c2", "EMAIL", "t2"),
        ],
    ));
    let mut warehouse = StubWarehouse {
        columns: vec![
            column_record("ORDERS", "ID", Some("Order id")),
            column_record("CUSTOMERS", "EMAIL", Some("Contact email")),
        ],
        ..orders_and_customers()
    };
    warehouse.failing_tables.insert("ORDERS".into());
    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(warehouse),
        descriptions().with_table_descriptions(false),
    );

    let summary = driver.run().await.unwrap();

    assert_eq!(
        bi.calls(),
        vec![Call::ColumnDescription {
            table_id: "t2".into(),
            column_id: "c2".into(),
            text: "Contact email".into(),
        }]
    );
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].stage, FailureStage::Fetch);
    assert_eq!(summary.updates_failed, 0);
    assert_eq!(summary.exit_code(), 1);
}

#[tokio::test]
async fn expired_session_aborts_the_run() {
    let bi = Arc::new(
        RecordingBi::new(
            vec![
                TableAsset::new("t1", "ORDERS", "PUBLIC"),
                TableAsset::new("t2", "CUSTOMERS", "PUBLIC"),
            ],
            vec![],
        )
        .expire_on("t1"),
    );
    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(orders_and_customers()),
        descriptions().with_column_descriptions(false),
    );

    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, SyncError::Authentication(_)));
    assert_eq!(bi.calls().len(), 1);
}

#[tokio::test]
async fn expired_session_on_table_listing_aborts_before_matching() {
    let bi = Arc::new(
        RecordingBi::new(vec![TableAsset::new("t1", "ORDERS", "PUBLIC")], vec![])
            .with_expired_session(),
    );
    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(orders_and_customers()),
        descriptions(),
    );

    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, SyncError::Authentication(_)));
    assert!(err.is_fatal());
    assert!(bi.calls().is_empty());
}

#[tokio::test]
async fn warehouse_listing_failure_aborts_before_matching() {
    let bi = Arc::new(RecordingBi::new(
        vec![TableAsset::new("t1", "ORDERS", "PUBLIC")],
        vec![],
    ));
    let warehouse = StubWarehouse {
        tables_unavailable: true,
        ..orders_and_customers()
    };
    let driver = ReconciliationDriver::new(bi.clone(), Arc::new(warehouse), descriptions());

    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, SyncError::Fetch { .. }));
    assert!(bi.calls().is_empty());
}

#[tokio::test]
async fn schema_filter_and_duplicates_are_reported() {
    let bi = Arc::new(RecordingBi::new(
        vec![
            TableAsset::new("t1", "ORDERS", "PUBLIC"),
            TableAsset::new("t3", "ORDERS", "STAGING"),
        ],
        vec![],
    ));
    let warehouse = StubWarehouse {
        tables: vec![
            table_record("PUBLIC", "ORDERS", Some("First"), None),
            table_record("PUBLIC", "ORDERS", Some("Second"), None),
        ],
        ..StubWarehouse::default()
    };
    let driver = ReconciliationDriver::new(
        bi.clone(),
        Arc::new(warehouse),
        descriptions()
            .with_schema_filter("public")
            .with_column_descriptions(false),
    );

    let summary = driver.run().await.unwrap();

    assert_eq!(
        bi.calls(),
        vec![Call::TableDescription {
            table_id: "t1".into(),
            text: "First".into(),
        }]
    );
    assert_eq!(summary.warnings.len(), 1);
}

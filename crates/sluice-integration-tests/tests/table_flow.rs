//! End-to-end storage table lifecycle against the recording warehouse.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use sluice_core::client::TableDefinition;
use sluice_core::identity::Identity;
use sluice_core::operation::FailureKind;
use sluice_test_utils::{
    CallKind, DescriptorFactory, TEST_OWNER_ROLE, TestContext, assert_binding, assert_call_sequence,
    assert_no_writes, assert_not_deleted, assert_role_absent, assert_validation_failure,
    expect_failure, init_test_logging,
};

#[tokio::test]
async fn provision_creates_dataset_table_and_owner_bindings() {
    init_test_logging();
    let ctx = TestContext::new();
    let provisioner = ctx.provisioner();
    let table = ctx.table("orders", &[("id", "INT64"), ("amount", "NUMERIC")]);

    provisioner.validate(&table).await.unwrap();
    ctx.client.clear_operations();

    let result = provisioner
        .provision(&table, &DescriptorFactory::ownership())
        .await
        .unwrap();

    assert_call_sequence(
        &ctx.client.operations(),
        &[
            CallKind::GetDataset,
            CallKind::CreateDataset,
            CallKind::GetTable,
            CallKind::CreateTable,
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
        ],
    );

    let address = ctx.address("orders");
    let live = ctx.client.inner().table(&address).unwrap();
    assert_eq!(
        live.schema().unwrap().column_names().into_iter().collect::<Vec<_>>(),
        vec!["amount", "id"]
    );

    let policy = ctx.client.inner().policy(&address).unwrap();
    assert_binding(&policy, TEST_OWNER_ROLE, &Identity::user("jane.doe@example.com"));
    assert_binding(&policy, TEST_OWNER_ROLE, &Identity::group("data-team@example.com"));

    assert_eq!(result.get("project").unwrap().value, ctx.project);
    assert_eq!(result.get("dataset").unwrap().value, "sales");
    assert_eq!(result.get("table").unwrap().value, "orders");
    assert!(
        result
            .get("url")
            .unwrap()
            .href
            .as_deref()
            .unwrap()
            .ends_with("!3sorders")
    );
}

#[tokio::test]
async fn reprovision_replaces_schema_and_keeps_dataset() {
    let ctx = TestContext::new();
    let provisioner = ctx.provisioner();
    let owners = DescriptorFactory::ownership();

    provisioner
        .provision(&ctx.table("orders", &[("id", "INT64"), ("legacy", "STRING")]), &owners)
        .await
        .unwrap();
    ctx.client.clear_operations();

    provisioner
        .provision(&ctx.table("orders", &[("id", "INT64")]), &owners)
        .await
        .unwrap();

    assert_call_sequence(
        &ctx.client.operations(),
        &[
            CallKind::GetDataset,
            CallKind::GetTable,
            CallKind::UpdateTable,
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
        ],
    );
    let live = ctx.client.inner().table(&ctx.address("orders")).unwrap();
    assert!(matches!(live.definition, TableDefinition::Table { .. }));
    assert_eq!(
        live.schema().unwrap().column_names().into_iter().collect::<Vec<_>>(),
        vec!["id"]
    );
}

#[tokio::test]
async fn validate_rejects_unknown_project_without_writing() {
    let ctx = TestContext::new();
    let table = sluice_core::descriptor::Component::StorageTable(DescriptorFactory::table(
        "missing-project",
        "sales",
        "orders",
        &[("id", "INT64")],
    ));

    let result = ctx.provisioner().validate(&table).await;

    assert_validation_failure(
        &result,
        "The specified BigQuery project does not exist: missing-project",
    );
    assert_no_writes(&ctx.client.operations());
}

#[tokio::test]
async fn validate_rejects_live_columns_missing_from_declaration() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64"), ("extra", "STRING")]);
    let provisioner = ctx.provisioner();

    provisioner
        .validate(&ctx.table("orders", &[("id", "INT64"), ("extra", "STRING"), ("new", "DATE")]))
        .await
        .unwrap();

    let result = provisioner
        .validate(&ctx.table("orders", &[("id", "INT64")]))
        .await;
    assert_validation_failure(
        &result,
        &format!(
            "Detected schema mismatch: provided schema is not compatible with existing table: {}",
            ctx.address("orders")
        ),
    );
}

#[tokio::test]
async fn unknown_column_type_fails_before_any_write() {
    let ctx = TestContext::new();
    let result = ctx
        .provisioner()
        .provision(
            &ctx.table("orders", &[("id", "NOT_A_TYPE")]),
            &DescriptorFactory::ownership(),
        )
        .await;

    expect_failure(&result, FailureKind::Operation);
    let calls = ctx.client.operations();
    assert!(
        !calls
            .iter()
            .any(|c| matches!(c.kind(), CallKind::CreateTable | CallKind::UpdateTable))
    );
}

#[tokio::test]
async fn unprovision_without_remove_data_keeps_the_table() {
    let ctx = TestContext::new();
    let provisioner = ctx.provisioner();
    let table = ctx.table("orders", &[("id", "INT64")]);
    provisioner
        .provision(&table, &DescriptorFactory::ownership())
        .await
        .unwrap();
    ctx.client.clear_operations();

    provisioner.unprovision(&table, false).await.unwrap();

    let address = ctx.address("orders");
    assert_call_sequence(
        &ctx.client.operations(),
        &[CallKind::GetIamPolicy, CallKind::SetIamPolicy],
    );
    assert_not_deleted(&ctx.client.operations(), &address);
    assert!(ctx.client.inner().table(&address).is_some());
    assert_role_absent(&ctx.client.inner().policy(&address).unwrap(), TEST_OWNER_ROLE);
}

#[tokio::test]
async fn unprovision_with_remove_data_revokes_then_deletes() {
    let ctx = TestContext::new();
    let provisioner = ctx.provisioner();
    let table = ctx.table("orders", &[("id", "INT64")]);
    provisioner
        .provision(&table, &DescriptorFactory::ownership())
        .await
        .unwrap();
    ctx.client.clear_operations();

    let result = provisioner.unprovision(&table, true).await.unwrap();

    assert!(result.public_info.is_empty());
    assert_call_sequence(
        &ctx.client.operations(),
        &[
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
            CallKind::DeleteTable,
        ],
    );
    assert!(ctx.client.inner().table(&ctx.address("orders")).is_none());
}

#[tokio::test]
async fn unprovision_of_missing_table_succeeds() {
    let ctx = TestContext::new();
    let table = ctx.table("never_created", &[("id", "INT64")]);

    ctx.provisioner().unprovision(&table, true).await.unwrap();

    assert_call_sequence(
        &ctx.client.operations(),
        &[CallKind::GetIamPolicy, CallKind::DeleteTable],
    );
}

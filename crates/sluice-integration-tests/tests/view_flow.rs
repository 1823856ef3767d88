//! End-to-end output view lifecycle against the recording warehouse.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::BTreeSet;

use sluice_core::client::TableDefinition;
use sluice_core::config::{DEFAULT_VIEW_READ_ROLE, ProvisionerConfig};
use sluice_core::identity::{Identity, Subject};
use sluice_core::operation::FailureKind;
use sluice_core::schema::SchemaSnapshot;
use sluice_provision::identity::INVALID_USER_MESSAGE;
use sluice_test_utils::{
    CallKind, ClientCall, DescriptorFactory, TEST_GROUP_MAIL_DOMAIN, TestContext, assert_binding,
    assert_call_sequence, assert_role_absent, assert_validation_failure, expect_failure,
};

fn subjects(raw: &[&str]) -> BTreeSet<Subject> {
    raw.iter().copied().map(Subject::from).collect()
}

#[tokio::test]
async fn new_view_is_created_then_updated_exactly_once() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64"), ("amount", "NUMERIC"), ("pii", "STRING")]);
    let provisioner = ctx.provisioner();
    let view = ctx.view("orders", "orders_v", &[("id", "INT64"), ("amount", "NUMERIC")]);

    provisioner.validate(&view).await.unwrap();
    ctx.client.clear_operations();

    let result = provisioner
        .provision(&view, &DescriptorFactory::ownership())
        .await
        .unwrap();

    let calls = ctx.client.operations();
    assert_call_sequence(
        &calls,
        &[
            CallKind::GetTable,
            CallKind::CreateTable,
            CallKind::UpdateTable,
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
        ],
    );

    let expected_query = format!(
        "SELECT id, amount FROM `{}.sales.orders`",
        ctx.project
    );
    let ClientCall::CreateTable { table: created } = &calls[1] else {
        panic!("expected create, got {:?}", calls[1]);
    };
    assert_eq!(
        created.definition,
        TableDefinition::View {
            query: expected_query.clone(),
            schema: None,
            use_legacy_sql: false,
        }
    );
    assert_eq!(created.description.as_deref(), Some("Output port over orders"));

    let ClientCall::UpdateTable { table: updated } = &calls[2] else {
        panic!("expected update, got {:?}", calls[2]);
    };
    let TableDefinition::View { query, schema, .. } = &updated.definition else {
        panic!("expected a view definition");
    };
    assert_eq!(query, &expected_query);
    assert_eq!(schema.as_ref().unwrap().fields.len(), 2);

    let policy = ctx.client.inner().policy(&ctx.address("orders_v")).unwrap();
    assert_binding(&policy, DEFAULT_VIEW_READ_ROLE, &Identity::user("jane.doe@example.com"));
    assert_binding(&policy, DEFAULT_VIEW_READ_ROLE, &Identity::group("data-team@example.com"));

    assert_eq!(result.get("view").unwrap().value, "orders_v");
}

#[tokio::test]
async fn existing_view_is_only_updated() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64")]);
    let provisioner = ctx.provisioner();
    let view = ctx.view("orders", "orders_v", &[]);
    let owners = DescriptorFactory::ownership();

    provisioner.provision(&view, &owners).await.unwrap();
    ctx.client.clear_operations();
    provisioner.provision(&view, &owners).await.unwrap();

    let calls = ctx.client.operations();
    assert_call_sequence(
        &calls,
        &[
            CallKind::GetTable,
            CallKind::UpdateTable,
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
        ],
    );
    let ClientCall::UpdateTable { table } = &calls[1] else {
        panic!("expected update, got {:?}", calls[1]);
    };
    assert_eq!(
        table.definition,
        TableDefinition::View {
            query: format!("SELECT * FROM `{}.sales.orders`", ctx.project),
            schema: Some(SchemaSnapshot::default()),
            use_legacy_sql: false,
        }
    );
}

#[tokio::test]
async fn validate_requires_source_table() {
    let ctx = TestContext::new();
    let result = ctx
        .provisioner()
        .validate(&ctx.view("orders", "orders_v", &[("id", "INT64")]))
        .await;

    assert_validation_failure(
        &result,
        &format!(
            "The specified source table {} doesn't exist",
            ctx.address("orders")
        ),
    );
}

#[tokio::test]
async fn validate_rejects_columns_missing_from_source() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64")]);
    let view = ctx.view("orders", "orders_v", &[("id", "INT64"), ("ghost", "STRING")]);

    let result = ctx.provisioner().validate(&view).await;

    assert_validation_failure(
        &result,
        &format!(
            "View schema of component {} is not compatible with schema of the source table {}",
            view.id(),
            ctx.address("orders")
        ),
    );
}

#[tokio::test]
async fn custom_read_role_is_granted_and_revoked() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64")]);
    let mut config = ProvisionerConfig::new(TEST_GROUP_MAIL_DOMAIN);
    config.view_read_role = "roles/bigquery.metadataViewer".to_string();
    let provisioner = ctx.provisioner_with(config);
    let view = ctx.view("orders", "orders_v", &[]);

    provisioner
        .provision(&view, &DescriptorFactory::ownership())
        .await
        .unwrap();
    let address = ctx.address("orders_v");
    let policy = ctx.client.inner().policy(&address).unwrap();
    assert_binding(
        &policy,
        "roles/bigquery.metadataViewer",
        &Identity::group("data-team@example.com"),
    );
    assert_role_absent(&policy, DEFAULT_VIEW_READ_ROLE);

    provisioner.unprovision(&view, false).await.unwrap();
    let policy = ctx.client.inner().policy(&address).unwrap();
    assert_role_absent(&policy, "roles/bigquery.metadataViewer");
    assert!(ctx.client.inner().table(&address).is_some());
}

#[tokio::test]
async fn update_access_replaces_readers() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64")]);
    let provisioner = ctx.provisioner();
    let view = ctx.view("orders", "orders_v", &[]);
    provisioner
        .provision(&view, &DescriptorFactory::ownership())
        .await
        .unwrap();
    ctx.client.clear_operations();

    provisioner
        .update_access(&view, &subjects(&["user:new.reader_example.com", "group:analysts"]))
        .await
        .unwrap();

    assert_call_sequence(
        &ctx.client.operations(),
        &[
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
        ],
    );
    let policy = ctx.client.inner().policy(&ctx.address("orders_v")).unwrap();
    let readers = policy
        .members(&DEFAULT_VIEW_READ_ROLE.into())
        .unwrap()
        .clone();
    let expected: BTreeSet<Identity> = [
        Identity::user("new.reader@example.com"),
        Identity::group("analysts@example.com"),
    ]
    .into_iter()
    .collect();
    assert_eq!(readers, expected);
}

#[tokio::test]
async fn update_access_with_invalid_subject_leaves_no_readers() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64")]);
    let provisioner = ctx.provisioner();
    let view = ctx.view("orders", "orders_v", &[]);
    provisioner
        .provision(&view, &DescriptorFactory::ownership())
        .await
        .unwrap();
    ctx.client.clear_operations();

    let result = provisioner
        .update_access(&view, &subjects(&["group:analysts", "user:malformed"]))
        .await;

    let failure = expect_failure(&result, FailureKind::IdentityResolution);
    assert_eq!(failure.message, INVALID_USER_MESSAGE);
    assert_call_sequence(
        &ctx.client.operations(),
        &[CallKind::GetIamPolicy, CallKind::SetIamPolicy],
    );
    let policy = ctx.client.inner().policy(&ctx.address("orders_v")).unwrap();
    assert_role_absent(&policy, DEFAULT_VIEW_READ_ROLE);
}

#[tokio::test]
async fn update_access_with_no_subjects_clears_readers() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64")]);
    let provisioner = ctx.provisioner();
    let view = ctx.view("orders", "orders_v", &[]);
    provisioner
        .provision(&view, &DescriptorFactory::ownership())
        .await
        .unwrap();

    provisioner.update_access(&view, &BTreeSet::new()).await.unwrap();

    let policy = ctx.client.inner().policy(&ctx.address("orders_v")).unwrap();
    assert!(
        policy
            .members(&DEFAULT_VIEW_READ_ROLE.into())
            .is_none_or(BTreeSet::is_empty)
    );
}

#[tokio::test]
async fn unprovision_with_remove_data_deletes_view_but_not_source() {
    let ctx = TestContext::new();
    ctx.seed_table("orders", &[("id", "INT64")]);
    let provisioner = ctx.provisioner();
    let view = ctx.view("orders", "orders_v", &[]);
    provisioner
        .provision(&view, &DescriptorFactory::ownership())
        .await
        .unwrap();
    ctx.client.clear_operations();

    provisioner.unprovision(&view, true).await.unwrap();

    assert_call_sequence(
        &ctx.client.operations(),
        &[
            CallKind::GetIamPolicy,
            CallKind::SetIamPolicy,
            CallKind::DeleteTable,
        ],
    );
    assert!(ctx.client.inner().table(&ctx.address("orders_v")).is_none());
    assert!(ctx.client.inner().table(&ctx.address("orders")).is_some());
}

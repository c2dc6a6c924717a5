mod common;

use common::*;
use osb_broker_core::client::BackendError;
use osb_broker_core::error::{ErrorCategory, GenericError};
use osb_broker_core::models::{
    BackendTask, LastOperationState, OperationData, OperationType, ProvisionDetails, TaskState,
};
use osb_broker_core::orchestration::operation_token;
use osb_broker_core::test_helpers::{BackendCall, LogCapture};

fn token(data: &OperationData) -> String {
    operation_token::encode(data).unwrap()
}

#[tokio::test]
async fn test_task_states_map_to_last_operation_states() {
    let cases = [
        (TaskState::Queued, LastOperationState::InProgress),
        (TaskState::Processing, LastOperationState::InProgress),
        (TaskState::Cancelling, LastOperationState::InProgress),
        (TaskState::Done, LastOperationState::Succeeded),
        (TaskState::Error, LastOperationState::Failed),
        (TaskState::Cancelled, LastOperationState::Failed),
        (TaskState::Timeout, LastOperationState::Failed),
        (TaskState::Unrecognized, LastOperationState::Failed),
    ];

    for (task_state, expected) in cases {
        let harness = TestBroker::with_default_catalog();
        harness
            .backend
            .add_task(&harness.deployment_name("i1"), BackendTask::new(9, task_state));

        let op = harness
            .broker
            .last_operation(
                "i1",
                &token(&OperationData::new(OperationType::Update, 9)),
                &request_context(),
            )
            .await
            .unwrap();

        assert_eq!(op.state, expected, "task state {task_state}");
    }
}

#[tokio::test]
async fn test_descriptions_name_the_operation() {
    let cases = [
        (OperationType::Create, TaskState::Processing, "Instance provisioning in progress"),
        (OperationType::Upgrade, TaskState::Done, "Instance upgrade completed"),
        (OperationType::Recreate, TaskState::Done, "Instance recreate completed"),
        (OperationType::ForceDelete, TaskState::Queued, "Instance forced deletion in progress"),
    ];

    for (operation_type, task_state, expected) in cases {
        let harness = TestBroker::with_default_catalog();
        harness
            .backend
            .add_task(&harness.deployment_name("i1"), BackendTask::new(3, task_state));

        let op = harness
            .broker
            .last_operation(
                "i1",
                &token(&OperationData::new(operation_type, 3)),
                &request_context(),
            )
            .await
            .unwrap();

        assert_eq!(op.description, expected);
    }
}

#[tokio::test]
async fn test_failed_task_hides_backend_text() {
    let harness = TestBroker::with_default_catalog();
    let capture = LogCapture::new();
    let _guard = capture.install();
    harness.backend.add_task(
        &harness.deployment_name("i1"),
        BackendTask::new(77, TaskState::Error)
            .with_description("create deployment")
            .with_result("Error: AZ z1 has no capacity"),
    );

    let op = harness
        .broker
        .last_operation(
            "i1",
            &token(&OperationData::new(OperationType::Create, 77)),
            &request_context(),
        )
        .await
        .unwrap();

    let expected = GenericError {
        service_name: SERVICE_NAME.to_string(),
        instance_id: "i1".to_string(),
        request_id: "req-test".to_string(),
        operation_type: Some(OperationType::Create),
        task_id: Some(77),
        operator_message: String::new(),
    }
    .user_message();

    assert_eq!(op.state, LastOperationState::Failed);
    assert_eq!(op.description, format!("Instance provisioning failed: {expected}"));
    assert!(!op.description.contains("capacity"));
    assert!(capture.contains("AZ z1 has no capacity"));
}

#[tokio::test]
async fn test_empty_token_is_generic_error() {
    let harness = TestBroker::with_default_catalog();

    let err = harness
        .broker
        .last_operation("i1", "", &request_context())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Generic);
    assert!(err.operator_message().contains("missing"));
    assert!(harness.backend.calls().is_empty());
}

#[tokio::test]
async fn test_malformed_token_never_reveals_parse_error() {
    let harness = TestBroker::with_default_catalog();

    let err = harness
        .broker
        .last_operation("i1", "{not json", &request_context())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Generic);
    assert!(err.to_string().contains("broker-request-id: req-test"));
    assert!(err.operator_message().contains("malformed"));
    assert!(!err.to_string().contains("malformed"));
}

#[tokio::test]
async fn test_token_without_task_id_reports_operation_type() {
    let harness = TestBroker::with_default_catalog();

    let err = harness
        .broker
        .last_operation("i1", r#"{"OperationType":"upgrade"}"#, &request_context())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("operation: upgrade"));
}

#[tokio::test]
async fn test_unexpected_task_count_is_generic_with_task_id() {
    let harness = TestBroker::with_default_catalog();
    let name = harness.deployment_name("i1");
    for id in 1..=3 {
        harness
            .backend
            .add_task(&name, BackendTask::new(id, TaskState::Done).with_context("ctx"));
    }
    let data = OperationData::new(OperationType::Create, 1).with_context("ctx");

    let err = harness
        .broker
        .last_operation("i1", &token(&data), &request_context())
        .await
        .unwrap_err();

    assert_eq!(err.category(), ErrorCategory::Generic);
    assert!(err.to_string().contains("task-id: 1"));
    assert!(err.operator_message().contains("unexpected tasks found"));
}

#[tokio::test]
async fn test_backend_unreachable_while_polling_is_transient() {
    let harness = TestBroker::with_default_catalog();
    harness
        .backend
        .fail("get_task", BackendError::RequestFailed("timeout".to_string()));

    let err = harness
        .broker
        .last_operation(
            "i1",
            &token(&OperationData::new(OperationType::Delete, 4)),
            &request_context(),
        )
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(
        err.to_string(),
        "Currently unable to delete service instance, please try again later"
    );
}

#[tokio::test]
async fn test_poll_succeeds_once_backend_recovers() {
    let harness = TestBroker::with_default_catalog();
    harness
        .backend
        .add_task(&harness.deployment_name("i1"), BackendTask::new(4, TaskState::Processing));
    harness
        .backend
        .fail("get_task", BackendError::RequestFailed("timeout".to_string()));
    let operation_data = token(&OperationData::new(OperationType::Update, 4));

    let first = harness
        .broker
        .last_operation("i1", &operation_data, &request_context())
        .await;
    assert!(first.unwrap_err().is_retryable());

    harness.backend.clear_failure("get_task");
    let op = harness
        .broker
        .last_operation("i1", &operation_data, &request_context())
        .await
        .unwrap();

    assert_eq!(op.state, LastOperationState::InProgress);
    assert_eq!(op.description, "Instance update in progress");
}

#[tokio::test]
async fn test_post_deploy_errand_runs_once_across_polls() {
    let harness = TestBroker::with_default_catalog();
    harness.backend.set_submitted_task_state(TaskState::Done);
    let ctx = request_context();

    let spec = harness
        .broker
        .provision(
            "i1",
            ProvisionDetails {
                service_id: "redis-service-id".to_string(),
                plan_id: "with-errand".to_string(),
                ..Default::default()
            },
            true,
            &ctx,
        )
        .await
        .unwrap();

    for _ in 0..3 {
        let op = harness
            .broker
            .last_operation("i1", &spec.operation_data, &ctx)
            .await
            .unwrap();
        assert_eq!(op.state, LastOperationState::Succeeded);
    }

    let errands: Vec<_> = harness
        .backend
        .submissions()
        .into_iter()
        .filter(|call| matches!(call, BackendCall::SubmitErrand { .. }))
        .collect();
    assert_eq!(errands.len(), 1);
}

#[tokio::test]
async fn test_succeeded_delete_cleans_up_best_effort() {
    let harness = TestBroker::with_default_catalog();
    harness
        .backend
        .add_task(&harness.deployment_name("i1"), BackendTask::new(8, TaskState::Done));
    harness.backend.fail(
        "delete_configs",
        BackendError::RequestFailed("refused".to_string()),
    );

    let op = harness
        .broker
        .last_operation(
            "i1",
            &token(&OperationData::new(OperationType::Delete, 8)),
            &request_context(),
        )
        .await
        .unwrap();

    assert_eq!(op.state, LastOperationState::Succeeded);
    assert!(harness
        .backend
        .calls()
        .contains(&BackendCall::DeleteConfigs("service-instance_i1".to_string())));
}

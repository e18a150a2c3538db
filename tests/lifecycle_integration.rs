//! Pause/resume services, fan-out and the connector resume flow

mod common;

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{flaky_provider, in_memory_provider};
use task_reactor::commands::processor::DispatchOutcome;
use task_reactor::commands::CommandType;
use task_reactor::lifecycle::connector::{ROLLBACK_CODE, TASK_REACTOR_RESUME_FAILED_CODE};
use task_reactor::lifecycle::{
    ConnectorResponse, InstanceSelector, PauseTaskReactorService, ResumeConnectorCallback,
    ResumeConnectorHandler, ResumeConnectorStateValidator, ResumeTaskReactorService,
    TaskReactorInstanceActionExecutor,
};
use task_reactor::test_utils::provision_instance;
use task_reactor::TaskReactorError;

#[tokio::test]
async fn test_pause_all_reaches_every_existing_instance() {
    let provider = in_memory_provider();
    let a = provision_instance(&provider, "a", true, true).await.unwrap();
    let b = provision_instance(&provider, "b", true, true).await.unwrap();
    let c = provision_instance(&provider, "c", true, false).await.unwrap();

    let report = PauseTaskReactorService::new(provider.clone())
        .pause_all_instances()
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.total(), 3);

    for instance in [&a, &b, &c] {
        let queue = provider.commands_queue(instance);
        assert_eq!(queue.pending_count().await.unwrap(), 1, "{instance}");

        let next = queue.fetch_next().await.unwrap().unwrap();
        assert_eq!(next.command.command_type, CommandType::PauseInstance);
        assert!(next.command.payload.is_none());
    }
}

#[tokio::test]
async fn test_pause_all_with_no_instances_is_a_noop() {
    let provider = in_memory_provider();

    let report = PauseTaskReactorService::new(provider)
        .pause_all_instances()
        .await
        .unwrap();

    assert_eq!(report.total(), 0);
}

#[tokio::test]
async fn test_pause_all_collects_per_instance_failures() {
    let (provider, queue) = flaky_provider();
    let a = provision_instance(&provider, "a", true, true).await.unwrap();
    let b = provision_instance(&provider, "b", true, true).await.unwrap();
    let c = provision_instance(&provider, "c", true, true).await.unwrap();
    queue.set_down_for(&b);

    let report = PauseTaskReactorService::new(provider.clone())
        .pause_all_instances()
        .await
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, b);
    assert!(report.failed[0].1.is_transient());

    let mut succeeded = report.succeeded.clone();
    succeeded.sort();
    assert_eq!(succeeded, vec![a.clone(), c.clone()]);

    for instance in [&a, &c] {
        assert_eq!(
            provider.commands_queue(instance).pending_count().await.unwrap(),
            1
        );
    }
}

#[tokio::test]
async fn test_resume_all_reactivates_paused_instances() {
    let provider = in_memory_provider();
    let a = provision_instance(&provider, "a", true, false).await.unwrap();
    let b = provision_instance(&provider, "b", true, false).await.unwrap();

    let report = ResumeTaskReactorService::new(provider.clone())
        .resume_all_instances()
        .await
        .unwrap();
    assert_eq!(report.succeeded.len(), 2);

    for instance in [&a, &b] {
        let outcome = provider.dispatcher(instance).tick().await.unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Completed { command_type: CommandType::ResumeInstance, .. }
        ));
        assert!(provider.instance_registry().fetch(instance).await.unwrap().is_active);
    }
}

#[tokio::test]
async fn test_paused_instance_defers_work_until_resumed() {
    let provider = in_memory_provider();
    let instance = provision_instance(&provider, "ziemniaczek", true, true)
        .await
        .unwrap();
    let pause = PauseTaskReactorService::new(provider.clone());
    let resume = ResumeTaskReactorService::new(provider.clone());
    let dispatcher = provider.dispatcher(&instance);
    let queue = provider.commands_queue(&instance);

    pause.pause_instance(&instance).await.unwrap();
    dispatcher.tick().await.unwrap();

    queue
        .add_command_with_empty_payload(CommandType::CancelOngoingExecutions)
        .await
        .unwrap();
    assert_eq!(dispatcher.tick().await.unwrap(), DispatchOutcome::Inactive);

    let held = queue.dead_letters().await.unwrap();
    assert!(held.is_empty());
    assert_eq!(queue.pending_count().await.unwrap(), 1);

    resume.resume_instance(&instance).await.unwrap();
    let outcomes = dispatcher.drain().await.unwrap();

    let completed: Vec<CommandType> = outcomes
        .into_iter()
        .filter_map(|outcome| match outcome {
            DispatchOutcome::Completed { command_type, .. } => Some(command_type),
            _ => None,
        })
        .collect();
    assert_eq!(
        completed,
        vec![CommandType::ResumeInstance, CommandType::CancelOngoingExecutions]
    );
}

#[tokio::test]
async fn test_action_executor_active_only_selector() {
    let provider = in_memory_provider();
    let a = provision_instance(&provider, "a", true, true).await.unwrap();
    provision_instance(&provider, "b", true, false).await.unwrap();
    provision_instance(&provider, "c", false, false).await.unwrap();

    let calls = AtomicUsize::new(0);
    let report = TaskReactorInstanceActionExecutor::new(provider.instance_registry())
        .apply(InstanceSelector::ActiveOnly, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.succeeded, vec![a]);
}

struct FixedValidator(ConnectorResponse);

#[async_trait]
impl ResumeConnectorStateValidator for FixedValidator {
    async fn validate(&self) -> ConnectorResponse {
        self.0.clone()
    }
}

struct CountingCallback {
    response: ConnectorResponse,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ResumeConnectorCallback for CountingCallback {
    async fn execute(&self) -> ConnectorResponse {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.clone()
    }
}

fn handler(
    provider: &task_reactor::TaskReactorInstanceComponentProvider,
    validation: ConnectorResponse,
    callback: ConnectorResponse,
    calls: Arc<AtomicUsize>,
) -> ResumeConnectorHandler {
    ResumeConnectorHandler::new(
        Box::new(FixedValidator(validation)),
        Box::new(CountingCallback {
            response: callback,
            calls,
        }),
        ResumeTaskReactorService::new(provider.clone()),
    )
}

#[tokio::test]
async fn test_connector_resume_enqueues_resume_everywhere() {
    let provider = in_memory_provider();
    let a = provision_instance(&provider, "a", true, false).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let response = handler(
        &provider,
        ConnectorResponse::ok(),
        ConnectorResponse::ok(),
        calls.clone(),
    )
    .resume_connector()
    .await;

    assert!(response.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let next = provider.commands_queue(&a).fetch_next().await.unwrap().unwrap();
    assert_eq!(next.command.command_type, CommandType::ResumeInstance);
}

#[tokio::test]
async fn test_connector_resume_stops_on_invalid_state() {
    let provider = in_memory_provider();
    let a = provision_instance(&provider, "a", true, false).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let response = handler(
        &provider,
        ConnectorResponse::error("INVALID_CONNECTOR_STATUS", "connector is not paused"),
        ConnectorResponse::ok(),
        calls.clone(),
    )
    .resume_connector()
    .await;

    assert_eq!(response.response_code, "INVALID_CONNECTOR_STATUS");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(provider.commands_queue(&a).pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_connector_resume_stops_on_callback_rollback() {
    let provider = in_memory_provider();
    let a = provision_instance(&provider, "a", true, false).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let response = handler(
        &provider,
        ConnectorResponse::ok(),
        ConnectorResponse::rollback("resume undone"),
        calls.clone(),
    )
    .resume_connector()
    .await;

    assert_eq!(response.response_code, ROLLBACK_CODE);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(provider.commands_queue(&a).pending_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_connector_resume_reports_task_reactor_failures() {
    let (provider, queue) = flaky_provider();
    let a = provision_instance(&provider, "a", true, false).await.unwrap();
    queue.set_down_for(&a);

    let response = ResumeConnectorHandler::with_defaults(ResumeTaskReactorService::new(provider))
        .resume_connector()
        .await;

    assert_eq!(response.response_code, TASK_REACTOR_RESUME_FAILED_CODE);
    assert!(response
        .message
        .unwrap()
        .contains(&TaskReactorError::store_unavailable("commands_queue", "connection refused").to_string()));
}

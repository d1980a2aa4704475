//! Tests for status token handling.
//!
//! The poll loop is driven by in-memory transports so every request can be
//! inspected and time can be paused.

use async_trait::async_trait;
use mailstore_client::{
    has_token, ApiClient, ApiRequest, Arguments, CallOptions, CancellationToken, ClientConfig,
    Endpoint, MailStoreError, PollPolicy, ProgressCallback, Result as ApiResult, ServerClient,
    StatusCode, TaskResponse, Transport,
};
use mockall::mock;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Test Transports
// =============================================================================

/// Replays a fixed list of replies and records every request.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<ApiResult<Value>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<ApiResult<Value>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::default(),
        }
    }

    fn ok(replies: Vec<Value>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn count(&self, endpoint: &Endpoint) -> usize {
        self.requests()
            .iter()
            .filter(|r| &r.endpoint == endpoint)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn invoke(&self, request: &ApiRequest) -> ApiResult<Value> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected call to {}", request.endpoint.name()))
    }
}

/// A task that never finishes. Status refreshes take the full wait time.
#[derive(Default)]
struct EndlessTask {
    version: AtomicI64,
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for EndlessTask {
    async fn invoke(&self, request: &ApiRequest) -> ApiResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(wait) = request.long_poll {
            tokio::time::sleep(wait).await;
        }
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(running("T1", version))
    }
}

mock! {
    pub Remote {}

    #[async_trait]
    impl Transport for Remote {
        async fn invoke(&self, request: &ApiRequest) -> ApiResult<Value>;
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn envelope(token: &str, version: i64, status: &str) -> Value {
    json!({
        "error": null,
        "token": token,
        "statusVersion": version,
        "statusCode": status,
        "percentProgress": null,
        "statusText": null,
        "result": null,
        "logOutput": null
    })
}

fn running(token: &str, version: i64) -> Value {
    envelope(token, version, "running")
}

fn succeeded(token: &str, version: i64, result: Value) -> Value {
    let mut body = envelope(token, version, "succeeded");
    body["result"] = result;
    body
}

fn immediate(result: Value) -> Value {
    json!({
        "error": null,
        "token": null,
        "statusVersion": 2,
        "statusCode": "succeeded",
        "result": result
    })
}

fn client<T: Transport>(transport: T) -> ApiClient<T> {
    ApiClient::with_transport(ClientConfig::default(), transport)
}

/// Progress callback recording the status version of every observed state.
fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<i64>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress = ProgressCallback::new(move |task| {
        sink.lock()
            .unwrap()
            .push(task.status_version_number().unwrap_or(-1));
    });
    (progress, seen)
}

fn tracked(value: Value) -> TaskResponse {
    let response = TaskResponse::from_json(value);
    assert!(response.is_tracked());
    response
}

// =============================================================================
// Token Detection
// =============================================================================

mod token_detection {
    use super::*;

    proptest! {
        #[test]
        fn has_token_requires_token_and_version(
            token in prop::option::of("[a-f0-9]{0,16}"),
            token_key in any::<bool>(),
            version in prop::option::of(any::<i64>()),
            version_key in any::<bool>(),
        ) {
            let mut body = serde_json::Map::new();
            if token_key {
                body.insert("token".into(), token.clone().map_or(Value::Null, Value::from));
            }
            if version_key {
                body.insert("statusVersion".into(), version.map_or(Value::Null, Value::from));
            }
            body.insert("statusCode".into(), json!("running"));

            let expected = token_key && token.is_some() && version_key;
            prop_assert_eq!(has_token(&Value::Object(body.clone())), expected);
            prop_assert_eq!(TaskResponse::from_json(Value::Object(body)).is_tracked(), expected);
        }
    }

    #[test]
    fn test_null_version_still_counts_as_present() {
        assert!(has_token(&json!({"token": "T1", "statusVersion": null})));
    }
}

// =============================================================================
// Dispatch
// =============================================================================

mod dispatch {
    use super::*;

    #[tokio::test]
    async fn test_response_without_token_is_returned_after_one_call() {
        let mut remote = MockRemote::new();
        remote
            .expect_invoke()
            .withf(|request| request.endpoint == Endpoint::invoke("GetServerInfo"))
            .times(1)
            .returning(|_| Ok(immediate(json!({"version": "24.1"}))));

        let response = client(remote)
            .invoke("GetServerInfo", Arguments::new(), &CallOptions::new())
            .await
            .unwrap();

        assert!(!response.is_tracked());
        assert_eq!(response.result(), Some(&json!({"version": "24.1"})));
    }

    #[tokio::test]
    async fn test_auto_handle_disabled_returns_first_response_unchanged() {
        let initial = running("T1", 1);
        let transport = ScriptedTransport::ok(vec![initial.clone()]);
        let api = client(transport);
        let (progress, seen) = recorder();

        let response = api
            .invoke(
                "VerifyStore",
                Arguments::new().arg("id", 1),
                &CallOptions::new().auto_handle_token(false).progress(progress),
            )
            .await
            .unwrap();

        assert_eq!(response, TaskResponse::from_json(initial));
        assert_eq!(response.token(), Some("T1"));
        assert_eq!(api.transport().requests().len(), 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auto_handle_disabled_in_config() {
        let transport = ScriptedTransport::ok(vec![running("T1", 1)]);
        let api = ApiClient::with_transport(
            ClientConfig::default().with_auto_handle_token(false),
            transport,
        );

        let response = api
            .invoke("CompactStore", Arguments::new(), &CallOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status_code(), Some(StatusCode::Running));
        assert_eq!(api.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn test_per_call_option_overrides_config() {
        let transport = ScriptedTransport::ok(vec![running("T1", 1), succeeded("T1", 2, json!(1))]);
        let api = ApiClient::with_transport(
            ClientConfig::default().with_auto_handle_token(false),
            transport,
        );

        let response = api
            .invoke(
                "CompactStore",
                Arguments::new(),
                &CallOptions::new().auto_handle_token(true),
            )
            .await
            .unwrap();

        assert_eq!(response.status_code(), Some(StatusCode::Succeeded));
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 1);
    }

    #[tokio::test]
    async fn test_cancel_without_token_makes_no_call() {
        let mut remote = MockRemote::new();
        remote.expect_invoke().times(0);
        let api = client(remote);

        let response = TaskResponse::from_json(immediate(json!([])));
        match api.cancel_async(&response).await.unwrap_err() {
            MailStoreError::NoToken { .. } => {}
            e => panic!("Expected NoToken error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_get_status_without_token_makes_no_call() {
        let mut remote = MockRemote::new();
        remote.expect_invoke().times(0);
        let api = client(remote);

        let response = TaskResponse::from_json(json!({"token": "T1", "statusCode": "running"}));
        match api
            .get_status(&response, None, &CallOptions::new())
            .await
            .unwrap_err() {
            MailStoreError::NoToken { .. } => {}
            e => panic!("Expected NoToken error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_handle_token_without_token() {
        let mut remote = MockRemote::new();
        remote.expect_invoke().times(0);

        let result = client(remote)
            .handle_token(
                TaskResponse::from_json(immediate(json!(null))),
                &CallOptions::new(),
            )
            .await;
        assert!(matches!(result, Err(MailStoreError::NoToken { .. })));
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let mut remote = MockRemote::new();
        remote
            .expect_invoke()
            .times(1)
            .returning(|_| Err(MailStoreError::Parse("truncated body".into())));

        let result = client(remote)
            .invoke("GetUsers", Arguments::new(), &CallOptions::new())
            .await;
        assert!(matches!(result, Err(MailStoreError::Parse(_))));
    }
}

// =============================================================================
// Poll Loop
// =============================================================================

mod poll_loop {
    use super::*;

    #[tokio::test]
    async fn test_callback_sees_every_state_until_terminal() {
        let transport = ScriptedTransport::ok(vec![
            running("T1", 1),
            running("T1", 2),
            succeeded("T1", 3, json!({"id": 42})),
        ]);
        let api = client(transport);
        let (progress, seen) = recorder();

        let response = api
            .invoke(
                "CreateStore",
                Arguments::new().arg("name", "Messages 2024"),
                &CallOptions::new().progress(progress),
            )
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
        assert_eq!(response.status_code(), Some(StatusCode::Succeeded));
        assert_eq!(response.result().unwrap()["id"], 42);
        // No refresh after the terminal state
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 2);
    }

    #[tokio::test]
    async fn test_status_requests_carry_token_and_last_version() {
        let transport = ScriptedTransport::ok(vec![
            running("T1", 1),
            running("T1", 2),
            succeeded("T1", 3, json!(null)),
        ]);
        let api = client(transport);

        api.invoke("VerifyStore", Arguments::new(), &CallOptions::new())
            .await
            .unwrap();

        let requests = api.transport().requests();
        assert_eq!(requests[0].endpoint, Endpoint::invoke("VerifyStore"));
        assert_eq!(
            requests[1].arguments.encode(),
            "token=T1&millisecondsTimeout=1000&lastKnownStatusVersion=1"
        );
        assert_eq!(
            requests[2].arguments.encode(),
            "token=T1&millisecondsTimeout=1000&lastKnownStatusVersion=2"
        );
        assert_eq!(requests[1].long_poll, Some(Duration::from_millis(1000)));
    }

    #[tokio::test]
    async fn test_wait_time_override() {
        let transport = ScriptedTransport::ok(vec![running("T1", 1), succeeded("T1", 2, json!(1))]);
        let api = client(transport);

        api.invoke(
            "VerifyStore",
            Arguments::new(),
            &CallOptions::new().wait_time(Duration::from_millis(5000)),
        )
        .await
        .unwrap();

        let requests = api.transport().requests();
        assert_eq!(requests[1].arguments.get("millisecondsTimeout"), Some("5000"));
    }

    #[tokio::test]
    async fn test_config_progress_is_used_by_default() {
        let (progress, seen) = recorder();
        let transport = ScriptedTransport::ok(vec![running("T1", 1), succeeded("T1", 2, json!(1))]);
        let api =
            ApiClient::with_transport(ClientConfig::default().with_progress(progress), transport);

        api.invoke("RunProfile", Arguments::new().arg("id", 3), &CallOptions::new())
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_per_call_progress_replaces_config_progress() {
        let (default_progress, default_seen) = recorder();
        let (call_progress, call_seen) = recorder();
        let transport = ScriptedTransport::ok(vec![running("T1", 1), succeeded("T1", 2, json!(1))]);
        let api = ApiClient::with_transport(
            ClientConfig::default().with_progress(default_progress),
            transport,
        );

        api.invoke(
            "RunProfile",
            Arguments::new(),
            &CallOptions::new().progress(call_progress),
        )
        .await
        .unwrap();

        assert!(default_seen.lock().unwrap().is_empty());
        assert_eq!(*call_seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_channel_progress_receives_states_in_order() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let transport = ScriptedTransport::ok(vec![
            running("T1", 1),
            running("T1", 4),
            succeeded("T1", 9, json!(1)),
        ]);

        client(transport)
            .invoke(
                "MergeStore",
                Arguments::new(),
                &CallOptions::new().progress(ProgressCallback::channel(tx)),
            )
            .await
            .unwrap();

        let mut versions = Vec::new();
        while let Ok(task) = rx.try_recv() {
            versions.push(task.status_version_number().unwrap());
        }
        assert_eq!(versions, vec![1, 4, 9]);
    }

    #[tokio::test]
    async fn test_already_finished_task_is_not_refreshed() {
        let transport = ScriptedTransport::ok(vec![succeeded("T1", 5, json!(true))]);
        let api = client(transport);
        let (progress, seen) = recorder();

        let response = api
            .invoke("Ping", Arguments::new(), &CallOptions::new().progress(progress))
            .await
            .unwrap();

        assert!(response.is_tracked());
        assert_eq!(*seen.lock().unwrap(), vec![5]);
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 0);
    }

    #[tokio::test]
    async fn test_failed_task_is_terminal() {
        let mut failed = envelope("T1", 2, "failed");
        failed["error"] = json!({"message": "Store is locked", "details": null});
        let transport = ScriptedTransport::ok(vec![running("T1", 1), failed]);

        let response = client(transport)
            .invoke("CompactStore", Arguments::new(), &CallOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status_code(), Some(StatusCode::Failed));
        match response.into_result().unwrap_err() {
            MailStoreError::TaskFailed { message, .. } => assert_eq!(message, "Store is locked"),
            e => panic!("Expected TaskFailed error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_string_status_versions() {
        let transport = ScriptedTransport::ok(vec![
            json!({"token": "T1", "statusVersion": "9", "statusCode": "running"}),
            json!({"token": "T1", "statusVersion": "10", "statusCode": "completed"}),
        ]);
        let api = client(transport);

        let response = api
            .invoke("UpgradeStore", Arguments::new(), &CallOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status_code(), Some(StatusCode::Succeeded));
        let requests = api.transport().requests();
        assert_eq!(requests[1].arguments.get("lastKnownStatusVersion"), Some("9"));
    }
}

// =============================================================================
// Protocol Anomalies
// =============================================================================

mod anomalies {
    use super::*;

    async fn poll(replies: Vec<Value>, policy: PollPolicy) -> ApiResult<TaskResponse> {
        client(ScriptedTransport::ok(replies))
            .invoke(
                "VerifyStore",
                Arguments::new(),
                &CallOptions::new().poll_policy(policy),
            )
            .await
    }

    #[tokio::test]
    async fn test_unchanged_version_is_rejected() {
        let result = poll(
            vec![running("T1", 1), running("T1", 1)],
            PollPolicy::default(),
        )
        .await;
        match result.unwrap_err() {
            MailStoreError::ProtocolAnomaly(msg) => assert!(msg.contains("from 1 to 1")),
            e => panic!("Expected ProtocolAnomaly error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_decreasing_version_is_rejected() {
        let result = poll(
            vec![running("T1", 5), running("T1", 3)],
            PollPolicy::default().with_unchanged_version_allowed(true),
        )
        .await;
        assert!(matches!(result, Err(MailStoreError::ProtocolAnomaly(_))));
    }

    #[tokio::test]
    async fn test_unchanged_version_allowed_by_policy() {
        let response = poll(
            vec![running("T1", 1), running("T1", 1), succeeded("T1", 2, json!(1))],
            PollPolicy::default().with_unchanged_version_allowed(true),
        )
        .await
        .unwrap();
        assert_eq!(response.status_code(), Some(StatusCode::Succeeded));
    }

    #[tokio::test]
    async fn test_unknown_status_code() {
        let result = poll(
            vec![running("T1", 1), envelope("T1", 2, "paused")],
            PollPolicy::default(),
        )
        .await;
        match result.unwrap_err() {
            MailStoreError::ProtocolAnomaly(msg) => assert!(msg.contains("paused")),
            e => panic!("Expected ProtocolAnomaly error, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_token_lost_during_refresh() {
        let result = poll(
            vec![running("T1", 1), immediate(json!(null))],
            PollPolicy::default(),
        )
        .await;
        assert!(matches!(result, Err(MailStoreError::ProtocolAnomaly(_))));
    }

    #[tokio::test]
    async fn test_non_numeric_version() {
        let result = poll(
            vec![
                running("T1", 1),
                json!({"token": "T1", "statusVersion": "next", "statusCode": "running"}),
            ],
            PollPolicy::default(),
        )
        .await;
        assert!(matches!(result, Err(MailStoreError::ProtocolAnomaly(_))));
    }
}

// =============================================================================
// Manual Token Handling
// =============================================================================

mod manual {
    use super::*;

    #[tokio::test]
    async fn test_get_status_is_a_single_step() {
        let transport = ScriptedTransport::ok(vec![running("T1", 2)]);
        let api = client(transport);

        let next = api
            .get_status(
                &tracked(running("T1", 1)),
                Some(Duration::from_millis(250)),
                &CallOptions::new(),
            )
            .await
            .unwrap();

        assert_eq!(next.status_code(), Some(StatusCode::Running));
        assert_eq!(next.tracked().unwrap().status_version_number(), Some(2));
        let requests = api.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].endpoint, Endpoint::GetStatus);
        assert_eq!(requests[0].arguments.get("millisecondsTimeout"), Some("250"));
    }

    #[tokio::test]
    async fn test_get_status_checks_version() {
        let api = client(ScriptedTransport::ok(vec![running("T1", 1)]));
        let result = api
            .get_status(&tracked(running("T1", 1)), None, &CallOptions::new())
            .await;
        assert!(matches!(result, Err(MailStoreError::ProtocolAnomaly(_))));
    }

    #[tokio::test]
    async fn test_get_status_follows_call_options() {
        let transport = ScriptedTransport::ok(vec![running("T1", 1)]);
        let server = ServerClient::from_api(client(transport)).with_call_options(
            CallOptions::new()
                .wait_time(Duration::from_millis(5000))
                .poll_policy(PollPolicy::default().with_unchanged_version_allowed(true)),
        );

        let next = server
            .get_status(&tracked(running("T1", 1)), None)
            .await
            .unwrap();

        assert_eq!(next.tracked().unwrap().status_version_number(), Some(1));
        let requests = server.api().transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].arguments.get("millisecondsTimeout"), Some("5000"));
    }

    #[tokio::test]
    async fn test_explicit_wait_time_beats_call_options() {
        let api = client(ScriptedTransport::ok(vec![running("T1", 2)]));
        let options = CallOptions::new().wait_time(Duration::from_millis(5000));

        api.get_status(
            &tracked(running("T1", 1)),
            Some(Duration::from_millis(40)),
            &options,
        )
        .await
        .unwrap();

        let requests = api.transport().requests();
        assert_eq!(requests[0].arguments.get("millisecondsTimeout"), Some("40"));
    }

    #[tokio::test]
    async fn test_cancel_async_does_not_poll() {
        let transport = ScriptedTransport::ok(vec![running("T1", 3)]);
        let api = client(transport);

        let reply = api.cancel_async(&tracked(running("T1", 2))).await.unwrap();

        assert_eq!(reply.status_code(), Some(StatusCode::Running));
        let requests = api.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].endpoint, Endpoint::CancelAsync);
        assert_eq!(requests[0].arguments.encode(), "token=T1");
    }

    #[tokio::test]
    async fn test_handle_token_after_manual_invoke() {
        let transport = ScriptedTransport::ok(vec![
            running("T1", 1),
            running("T1", 2),
            succeeded("T1", 3, json!({"id": 42})),
        ]);
        let api = client(transport);
        let (progress, seen) = recorder();

        let first = api
            .invoke(
                "CreateStore",
                Arguments::new(),
                &CallOptions::new().auto_handle_token(false),
            )
            .await
            .unwrap();
        let done = api
            .handle_token(first, &CallOptions::new().progress(progress))
            .await
            .unwrap();

        #[derive(serde::Deserialize)]
        struct Created {
            id: u32,
        }
        let created: Created = done.result_as().unwrap();
        assert_eq!(created.id, 42);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
    }
}

// =============================================================================
// Deadlines, Retries and Cancellation
// =============================================================================

mod hardening {
    use super::*;

    fn unreachable() -> MailStoreError {
        MailStoreError::ServerUnreachable("connection refused".into())
    }

    fn http(status: u16) -> MailStoreError {
        MailStoreError::Http {
            status,
            message: "Service Unavailable".into(),
            url: "https://127.0.0.1:8463/api/get-status".into(),
            method: "POST".into(),
            data: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded() {
        let api = client(EndlessTask::default());
        let policy = PollPolicy::default().with_deadline(Duration::from_millis(3500));

        let result = api
            .invoke("VerifyStore", Arguments::new(), &CallOptions::new().poll_policy(policy))
            .await;

        match result.unwrap_err() {
            MailStoreError::DeadlineExceeded { token, elapsed } => {
                assert_eq!(token, "T1");
                assert!(elapsed >= Duration::from_millis(3500));
                assert!(elapsed < Duration::from_millis(4000));
            }
            e => panic!("Expected DeadlineExceeded error, got: {:?}", e),
        }
        // Initial call plus refreshes started at 0s, 1s, 2s and 3s
        assert_eq!(api.transport().calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_maximal_deadline_means_no_limit() {
        let transport = ScriptedTransport::ok(vec![
            running("T1", 1),
            running("T1", 2),
            succeeded("T1", 3, json!(null)),
        ]);
        let api = client(transport);
        let policy = PollPolicy::default().with_deadline(Duration::MAX);

        let response = api
            .invoke("VerifyStore", Arguments::new(), &CallOptions::new().poll_policy(policy))
            .await
            .unwrap();

        assert_eq!(response.status_code(), Some(StatusCode::Succeeded));
        let requests = api.transport().requests();
        assert_eq!(requests[1].arguments.get("millisecondsTimeout"), Some("1000"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried_with_backoff() {
        let transport = ScriptedTransport::new(vec![
            Ok(running("T1", 1)),
            Err(unreachable()),
            Err(http(503)),
            Ok(succeeded("T1", 2, json!(1))),
        ]);
        let api = client(transport);

        let started = tokio::time::Instant::now();
        let response = api
            .invoke("CompactStore", Arguments::new(), &CallOptions::new())
            .await
            .unwrap();

        assert_eq!(response.status_code(), Some(StatusCode::Succeeded));
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 3);
        // 250ms before the first retry, 500ms before the second
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(750));
        assert!(waited < Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let transport = ScriptedTransport::new(vec![
            Ok(running("T1", 1)),
            Err(unreachable()),
            Err(unreachable()),
        ]);
        let api = client(transport);
        let policy = PollPolicy::default().with_max_retries(1);

        let result = api
            .invoke("CompactStore", Arguments::new(), &CallOptions::new().poll_policy(policy))
            .await;

        assert!(matches!(result, Err(MailStoreError::ServerUnreachable(_))));
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 2);
    }

    #[tokio::test]
    async fn test_non_transient_failure_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(running("T1", 1)), Err(http(500))]);
        let api = client(transport);

        let result = api
            .invoke("CompactStore", Arguments::new(), &CallOptions::new())
            .await;

        match result.unwrap_err() {
            MailStoreError::Http { status, .. } => assert_eq!(status, 500),
            e => panic!("Expected Http error, got: {:?}", e),
        }
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 1);
    }

    #[tokio::test]
    async fn test_cancel_from_progress_callback_stops_polling() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let progress = ProgressCallback::new(move |task| {
            if task.status_version_number() == Some(2) {
                trigger.cancel();
            }
        });
        // A third reply would make the transport panic
        let transport = ScriptedTransport::ok(vec![running("T1", 1), running("T1", 2)]);
        let api = client(transport);

        let result = api
            .invoke(
                "VerifyStore",
                Arguments::new(),
                &CallOptions::new().progress(progress).cancel(cancel),
            )
            .await;

        match result.unwrap_err() {
            MailStoreError::PollCancelled {
                token,
                status_version,
            } => {
                assert_eq!(token, "T1");
                assert_eq!(status_version, "2");
            }
            e => panic!("Expected PollCancelled error, got: {:?}", e),
        }
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_refresh() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let api = client(ScriptedTransport::ok(vec![running("T1", 1)]));

        let result = api
            .invoke("VerifyStore", Arguments::new(), &CallOptions::new().cancel(cancel))
            .await;

        assert!(matches!(result, Err(MailStoreError::PollCancelled { .. })));
        assert_eq!(api.transport().count(&Endpoint::GetStatus), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_long_poll() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1500)).await;
            trigger.cancel();
        });
        let api = client(EndlessTask::default());

        let result = api
            .invoke("VerifyStore", Arguments::new(), &CallOptions::new().cancel(cancel))
            .await;

        match result.unwrap_err() {
            MailStoreError::PollCancelled { status_version, .. } => {
                assert_eq!(status_version, "2")
            }
            e => panic!("Expected PollCancelled error, got: {:?}", e),
        }
        // Initial call, the refresh finished at 1s and the one interrupted at 1.5s
        assert_eq!(api.transport().calls.load(Ordering::SeqCst), 3);
    }
}

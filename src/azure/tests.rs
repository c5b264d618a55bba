//! Tests for the ARM backend against a local HTTP responder.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use super::*;
use crate::backend::ServiceLevel;

const SUBSCRIPTION: &str = "sub-1";

#[derive(Clone, Debug)]
struct Canned {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Canned {
    fn json(status: u16, body: &str) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.to_owned(),
        }
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }
}

struct Exchange {
    queued: VecDeque<Canned>,
    requests: Vec<String>,
    token_requests: usize,
    token_lifetime_secs: u64,
}

impl Default for Exchange {
    fn default() -> Self {
        Self {
            queued: VecDeque::new(),
            requests: Vec::new(),
            token_requests: 0,
            token_lifetime_secs: 3599,
        }
    }
}

/// Minimal HTTP/1.1 responder that serves tokens on `/oauth2/` paths and
/// canned responses, in order, for everything else.
struct FakeArm {
    base: String,
    exchange: Arc<Mutex<Exchange>>,
}

impl FakeArm {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap_or_else(|err| panic!("bind responder: {err}"));
        let addr = listener
            .local_addr()
            .unwrap_or_else(|err| panic!("responder address: {err}"));
        let exchange = Arc::new(Mutex::new(Exchange::default()));
        let shared = Arc::clone(&exchange);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { serve(stream, &shared).await });
            }
        });
        Self {
            base: format!("http://{addr}"),
            exchange,
        }
    }

    fn push(&self, response: Canned) {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .queued
            .push_back(response);
    }

    fn requests(&self) -> Vec<String> {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }

    fn token_requests(&self) -> usize {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token_requests
    }

    fn issue_tokens_lasting(&self, secs: u64) {
        self.exchange
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .token_lifetime_secs = secs;
    }

    fn backend(&self) -> AzureBackend {
        self.backend_polling(Duration::ZERO, Duration::from_secs(5))
    }

    fn backend_polling(&self, interval: Duration, timeout: Duration) -> AzureBackend {
        let credentials = AzureCredentials::from_json(&format!(
            r#"{{
                "clientId": "client",
                "clientSecret": "secret",
                "subscriptionId": "{SUBSCRIPTION}",
                "tenantId": "tenant",
                "activeDirectoryEndpointUrl": "{base}",
                "resourceManagerEndpointUrl": "{base}/"
            }}"#,
            base = self.base
        ))
        .unwrap_or_else(|err| panic!("credentials: {err}"));
        AzureBackend::new(credentials, DEFAULT_API_VERSION)
            .unwrap_or_else(|err| panic!("backend: {err}"))
            .with_operation_polling(interval, timeout)
    }
}

async fn serve(mut stream: TcpStream, exchange: &Mutex<Exchange>) {
    let mut raw = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let Ok(read) = stream.read(&mut chunk).await else {
            return;
        };
        if read == 0 {
            return;
        }
        raw.extend_from_slice(&chunk[..read]);
        if let Some(pos) = raw.windows(4).position(|window| window == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..header_end]).into_owned();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while raw.len() < header_end + content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => raw.extend_from_slice(&chunk[..read]),
        }
    }

    let request_line = head.lines().next().unwrap_or_default().to_owned();
    let response = {
        let mut guard = exchange.lock().unwrap_or_else(PoisonError::into_inner);
        if request_line.contains("/oauth2/") {
            guard.token_requests += 1;
            let body = format!(
                r#"{{"access_token":"token-{}","expires_in":{}}}"#,
                guard.token_requests, guard.token_lifetime_secs
            );
            Canned::json(200, &body)
        } else {
            guard.requests.push(request_line);
            guard.queued.pop_front().unwrap_or_else(|| {
                Canned::json(
                    500,
                    r#"{"error":{"code":"Unscripted","message":"no canned response"}}"#,
                )
            })
        }
    };
    reply(stream, &response).await;
}

async fn reply(mut stream: TcpStream, response: &Canned) {
    let mut reply = format!(
        "HTTP/1.1 {} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n",
        response.status,
        response.body.len()
    );
    for (name, value) in &response.headers {
        reply.push_str(&format!("{name}: {value}\r\n"));
    }
    reply.push_str("\r\n");
    reply.push_str(&response.body);
    stream.write_all(reply.as_bytes()).await.ok();
    stream.shutdown().await.ok();
}

fn pool_key() -> ResourceKey<'static> {
    ResourceKey::Pool {
        resource_group: "anf01-rg",
        account: "acct",
        pool: "Pool01",
    }
}

fn pool_body() -> String {
    format!(
        r#"{{"id":"/subscriptions/{SUBSCRIPTION}/resourceGroups/anf01-rg/providers/Microsoft.NetApp/netAppAccounts/acct/capacityPools/Pool01","name":"acct/Pool01","location":"eastus","properties":{{"provisioningState":"Succeeded"}}}}"#
    )
}

fn pool_request() -> PoolRequest {
    PoolRequest {
        resource_group: String::from("anf01-rg"),
        account: String::from("acct"),
        name: String::from("Pool01"),
        location: String::from("eastus"),
        service_level: ServiceLevel::Standard,
        size_bytes: crate::backend::MIN_POOL_SIZE_BYTES,
        tags: crate::backend::Tags::new(),
    }
}

#[tokio::test]
async fn missing_resource_maps_to_not_found() {
    let arm = FakeArm::start().await;
    arm.push(Canned::json(
        404,
        r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#,
    ));

    let outcome = arm.backend().get(pool_key()).await;

    assert!(matches!(outcome, PollOutcome::NotFound), "{outcome:?}");
    let requests = arm.requests();
    assert_eq!(requests.len(), 1);
    assert!(
        requests.first().is_some_and(|line| line.starts_with(&format!(
            "GET /subscriptions/{SUBSCRIPTION}/resourceGroups/anf01-rg/providers/Microsoft.NetApp/netAppAccounts/acct/capacityPools/Pool01?api-version={DEFAULT_API_VERSION}"
        ))),
        "{requests:?}"
    );
}

#[tokio::test]
async fn present_resource_maps_to_found() {
    let arm = FakeArm::start().await;
    arm.push(Canned::json(200, &pool_body()));

    let outcome = arm.backend().get(pool_key()).await;

    let PollOutcome::Found(resource) = outcome else {
        panic!("expected Found, got {outcome:?}");
    };
    assert_eq!(resource.name, "acct/Pool01");
    assert_eq!(resource.provisioning_state.as_deref(), Some("Succeeded"));
    let locator = resource
        .locator()
        .unwrap_or_else(|err| panic!("locator: {err}"));
    assert_eq!(locator.pool().ok(), Some("Pool01"));
}

#[tokio::test]
async fn server_errors_are_transient_not_absent() {
    let arm = FakeArm::start().await;
    arm.push(Canned::json(
        500,
        r#"{"error":{"code":"InternalServerError","message":"try later"}}"#,
    ));

    let outcome = arm.backend().get(pool_key()).await;

    let PollOutcome::TransientError(err) = outcome else {
        panic!("expected TransientError, got {outcome:?}");
    };
    assert_eq!(err.status(), Some(500));
    assert!(
        matches!(&err, AzureBackendError::Http { code, message, .. }
            if code == "InternalServerError" && message == "try later"),
        "{err}"
    );
}

#[tokio::test]
async fn create_pool_follows_async_operation() {
    let arm = FakeArm::start().await;
    let operation = format!("{}/operations/op-1", arm.base);
    arm.push(Canned::json(201, &pool_body()).with_header("Azure-AsyncOperation", &operation));
    arm.push(Canned::json(200, r#"{"status":"InProgress"}"#));
    arm.push(Canned::json(200, r#"{"status":"Succeeded"}"#));
    arm.push(Canned::json(200, &pool_body()));

    let request = pool_request();
    let resource = arm
        .backend()
        .create_pool(&request)
        .await
        .unwrap_or_else(|err| panic!("create pool: {err}"));

    assert_eq!(resource.name, "acct/Pool01");
    let methods: Vec<String> = arm
        .requests()
        .iter()
        .map(|line| {
            let mut parts = line.split_whitespace();
            let method = parts.next().unwrap_or_default();
            let path = parts.next().unwrap_or_default();
            let path = path.split('?').next().unwrap_or_default();
            format!("{method} {}", leaf_segment(path))
        })
        .collect();
    assert_eq!(
        methods,
        ["PUT Pool01", "GET op-1", "GET op-1", "GET Pool01"]
    );
}

fn leaf_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

#[tokio::test]
async fn failed_operation_is_reported() {
    let arm = FakeArm::start().await;
    let operation = format!("{}/operations/op-2", arm.base);
    arm.push(Canned::json(201, &pool_body()).with_header("Azure-AsyncOperation", &operation));
    arm.push(Canned::json(
        200,
        r#"{"status":"Failed","error":{"code":"PoolSizeTooSmall","message":"pool too small"}}"#,
    ));

    let request = pool_request();
    let err = arm
        .backend()
        .create_pool(&request)
        .await
        .expect_err("failed operation should surface");

    assert!(
        matches!(&err, AzureBackendError::OperationFailed { status, message, .. }
            if status == "Failed" && message == "pool too small"),
        "{err}"
    );
}

#[tokio::test]
async fn delete_of_missing_resource_succeeds() {
    let arm = FakeArm::start().await;
    arm.push(Canned::json(
        404,
        r#"{"error":{"code":"ResourceNotFound","message":"gone"}}"#,
    ));

    arm.backend()
        .delete(pool_key())
        .await
        .unwrap_or_else(|err| panic!("delete should tolerate 404: {err}"));
}

#[tokio::test]
async fn delete_follows_location_header() {
    let arm = FakeArm::start().await;
    let location = format!("{}/operationResults/op-3", arm.base);
    arm.push(Canned::json(202, "").with_header("Location", &location));
    arm.push(Canned::json(202, ""));
    arm.push(Canned::json(204, ""));

    arm.backend()
        .delete(pool_key())
        .await
        .unwrap_or_else(|err| panic!("delete: {err}"));

    assert_eq!(arm.requests().len(), 3);
}

#[tokio::test]
async fn invalid_request_is_rejected_before_sending() {
    let arm = FakeArm::start().await;
    let mut request = pool_request();
    request.size_bytes = 1;

    let err = arm
        .backend()
        .create_pool(&request)
        .await
        .expect_err("undersized pool should fail validation");

    assert!(matches!(err, AzureBackendError::Validation(_)), "{err}");
    assert!(arm.requests().is_empty());
}

#[tokio::test]
async fn token_is_reused_while_fresh() {
    let arm = FakeArm::start().await;
    arm.push(Canned::json(200, &pool_body()));
    arm.push(Canned::json(200, &pool_body()));
    let backend = arm.backend();

    let first = backend.get(pool_key()).await;
    let second = backend.get(pool_key()).await;

    assert!(matches!(first, PollOutcome::Found(_)), "{first:?}");
    assert!(matches!(second, PollOutcome::Found(_)), "{second:?}");
    assert_eq!(arm.token_requests(), 1);
}

#[tokio::test]
async fn token_close_to_expiry_is_refreshed() {
    let arm = FakeArm::start().await;
    arm.issue_tokens_lasting(30);
    arm.push(Canned::json(200, &pool_body()));
    arm.push(Canned::json(200, &pool_body()));
    let backend = arm.backend();

    let first = backend.get(pool_key()).await;
    let second = backend.get(pool_key()).await;

    assert!(matches!(first, PollOutcome::Found(_)), "{first:?}");
    assert!(matches!(second, PollOutcome::Found(_)), "{second:?}");
    assert_eq!(arm.token_requests(), 2);
}

#[tokio::test]
async fn undecodable_body_is_transient() {
    let arm = FakeArm::start().await;
    arm.push(Canned::json(200, "<html>maintenance</html>"));

    let outcome = arm.backend().get(pool_key()).await;

    assert!(
        matches!(outcome, PollOutcome::TransientError(AzureBackendError::Decode { .. })),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn canceled_operation_is_reported() {
    let arm = FakeArm::start().await;
    let operation = format!("{}/operations/op-4", arm.base);
    arm.push(Canned::json(201, &pool_body()).with_header("Azure-AsyncOperation", &operation));
    arm.push(Canned::json(200, r#"{"status":"Canceled"}"#));

    let err = arm
        .backend()
        .create_pool(&pool_request())
        .await
        .expect_err("canceled operation should surface");

    assert!(
        matches!(&err, AzureBackendError::OperationFailed { status, .. } if status == "Canceled"),
        "{err}"
    );
}

#[tokio::test]
async fn operation_that_never_finishes_times_out() {
    let arm = FakeArm::start().await;
    let operation = format!("{}/operations/op-5", arm.base);
    arm.push(Canned::json(201, &pool_body()).with_header("Azure-AsyncOperation", &operation));
    for _ in 0..3 {
        arm.push(Canned::json(200, r#"{"status":"InProgress"}"#));
    }

    let err = arm
        .backend_polling(Duration::from_millis(20), Duration::from_millis(10))
        .create_pool(&pool_request())
        .await
        .expect_err("operation should time out");

    assert!(
        matches!(&err, AzureBackendError::Timeout { resource } if resource.ends_with("Pool01")),
        "{err}"
    );
}

//! Session, cache and error-classification behavior of `ApiClient`, driven
//! through scripted in-process transports.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use allawee_core::{
    ApiClient, ApiError, ClientConfig, ErrorKind, FileTokenStore, HttpMethod,
    LoanApplicationRequest, MemoryTokenStore, Payload, ProfileUpdate, RequestOptions,
    SessionToken, TokenStore,
};
use common::{
    harness, harness_with_tokens, ScriptedTransport, StalledTransport, UnreadableTokenStore,
    DASHBOARD_JSON, PROFILE_JSON, UPDATED_PROFILE_JSON,
};

fn logged_in(token: &str) -> MemoryTokenStore {
    MemoryTokenStore::with_token(SessionToken::new(token).unwrap())
}

// ---------------------------------------------------------------------------
// Token lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn login_stores_token_and_next_call_sends_it() {
    let h = harness();
    h.transport
        .reply(200, r#"{"token":"abc","user_id":1,"username":"jane"}"#)
        .reply(200, DASHBOARD_JSON);

    let session = h.client.login("jane@x.com", "secret123").await.unwrap();
    assert_eq!(session.token, "abc");
    assert_eq!(h.tokens.get().await.unwrap().unwrap().as_str(), "abc");

    h.client.get_dashboard().await.unwrap();

    let requests = h.transport.requests();
    let login = &requests[0];
    assert_eq!(login.method, HttpMethod::Post);
    assert_eq!(login.url, "http://backend.test/api/auth/login/");
    assert!(login.header("authorization").is_none());
    let body: serde_json::Value = serde_json::from_str(login.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["identifier"], "jane@x.com");
    assert_eq!(body["password"], "secret123");

    assert_eq!(requests[1].url, "http://backend.test/api/dashboard/");
    assert_eq!(requests[1].header("Authorization"), Some("Token abc"));
}

#[tokio::test]
async fn failed_login_stores_nothing() {
    let h = harness();
    h.transport.reply(401, r#"{"error":"Invalid credentials"}"#);

    let err = h.client.login("jane@x.com", "wrong").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(err.to_string().contains("Invalid credentials"));
    assert!(h.tokens.get().await.unwrap().is_none());
}

#[tokio::test]
async fn login_with_empty_token_is_rejected() {
    let h = harness();
    h.transport.reply(200, r#"{"token":""}"#);

    let err = h.client.login("jane@x.com", "secret123").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(!h.client.is_authenticated().await.unwrap());
}

#[tokio::test]
async fn register_starts_a_session() {
    let h = harness();
    h.transport.reply(
        201,
        r#"{"token":"fresh","user_id":7,"message":"Registration successful"}"#,
    );

    let request = allawee_core::RegisterRequest {
        username: "ada".to_string(),
        email: "ada@x.com".to_string(),
        password: "password1".to_string(),
        full_name: "Ada Obi".to_string(),
        nysc_state_code: None,
        phone_number: None,
    };
    let response = h.client.register(&request).await.unwrap();
    assert_eq!(response.user_id, 7);
    assert!(h.client.is_authenticated().await.unwrap());
}

#[tokio::test]
async fn unauthorized_response_clears_token() {
    let h = harness_with_tokens(logged_in("stale"));
    h.transport.reply(401, r#"{"detail":"Invalid token."}"#);

    let err = h.client.get_profile().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert_eq!(err.status(), Some(401));
    assert!(h.tokens.get().await.unwrap().is_none());
}

#[tokio::test]
async fn forbidden_response_from_a_mutation_also_clears_token() {
    let h = harness_with_tokens(logged_in("stale"));
    h.transport.reply(403, "");

    let err = h.client.approve_loan_application(4).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
    assert!(h.tokens.get().await.unwrap().is_none());
}

#[tokio::test]
async fn client_errors_keep_token() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport
        .reply(400, r#"{"detail":"Tenor must be between 1 and 24 months."}"#);

    let err = h
        .client
        .apply_for_loan(&LoanApplicationRequest {
            amount: 50000.0,
            tenor: 48,
            purpose: "Relocation".to_string(),
            loan_product: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Client);
    assert!(err.to_string().contains("Tenor must be between 1 and 24 months."));
    assert!(h.tokens.get().await.unwrap().is_some());
}

#[tokio::test]
async fn logout_clears_token_even_when_server_is_unreachable() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport.fail("connection refused");

    h.client.logout().await.unwrap();

    assert!(h.tokens.get().await.unwrap().is_none());
    assert_eq!(h.transport.request_count(), 1);
    assert_eq!(
        h.transport.requests()[0].header("authorization"),
        Some("Token abc")
    );
}

#[tokio::test]
async fn logout_without_session_skips_the_server() {
    let h = harness();
    h.client.logout().await.unwrap();
    h.client.logout().await.unwrap();
    assert_eq!(h.transport.request_count(), 0);
}

#[tokio::test]
async fn logout_clears_token_when_store_cannot_be_read() {
    let transport = ScriptedTransport::new();
    let tokens = Arc::new(UnreadableTokenStore::default());
    let client = ApiClient::new(
        ClientConfig::new("http://backend.test").unwrap(),
        transport.clone(),
        tokens.clone(),
    );

    client.logout().await.unwrap();
    assert_eq!(tokens.clears.load(Ordering::SeqCst), 1);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn corrupt_session_file_does_not_lock_the_user_out() {
    let path = std::env::temp_dir()
        .join(format!("allawee-session-{}", uuid::Uuid::new_v4()))
        .join("session.json");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, b"{not json").unwrap();

    let transport = ScriptedTransport::new();
    transport.reply(200, r#"{"token":"abc"}"#);
    let client = ApiClient::new(
        ClientConfig::new("http://backend.test").unwrap(),
        transport.clone(),
        Arc::new(FileTokenStore::new(&path)),
    );

    client.logout().await.unwrap();
    assert!(!path.exists());

    std::fs::write(&path, b"{not json").unwrap();
    client.login("jane@x.com", "secret123").await.unwrap();
    assert_eq!(transport.request_count(), 1);
    assert_eq!(
        FileTokenStore::new(&path).get().await.unwrap().unwrap().as_str(),
        "abc"
    );
    std::fs::remove_file(&path).unwrap();
}

#[tokio::test]
async fn logout_drops_cached_data() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport
        .reply(200, PROFILE_JSON)
        .reply(204, "")
        .reply(200, PROFILE_JSON);

    h.client.get_profile().await.unwrap();
    h.client.logout().await.unwrap();
    assert!(h.client.cache().is_empty());

    h.tokens.set(&SessionToken::new("other").unwrap()).await.unwrap();
    h.client.get_profile().await.unwrap();
    assert_eq!(h.transport.request_count(), 3);
}

// ---------------------------------------------------------------------------
// Cache behavior
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dashboard_is_served_from_cache_within_ttl() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport.reply(200, DASHBOARD_JSON).reply(200, DASHBOARD_JSON);

    let first = h.client.get_dashboard().await.unwrap();
    h.clock.advance(Duration::from_secs(10));
    let second = h.client.get_dashboard().await.unwrap();
    assert_eq!(first, second);
    assert_eq!(h.transport.request_count(), 1);

    h.clock.advance(Duration::from_secs(25));
    h.client.get_dashboard().await.unwrap();
    assert_eq!(h.transport.request_count(), 2);
}

#[tokio::test]
async fn failed_fetch_is_retried_on_next_call() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport.reply(503, "").reply(200, DASHBOARD_JSON);

    let err = h.client.get_dashboard().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert!(h.client.cache().peek("dashboard").is_none());

    h.client.get_dashboard().await.unwrap();
    assert_eq!(h.transport.request_count(), 2);
}

#[tokio::test]
async fn profile_update_invalidates_cached_profile() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport
        .reply(200, PROFILE_JSON)
        .reply(200, UPDATED_PROFILE_JSON)
        .reply(200, UPDATED_PROFILE_JSON);

    let before = h.client.get_profile().await.unwrap();
    assert_eq!(before.phone.as_deref(), Some("08011112222"));
    assert!(h.client.cache().peek("profile").is_some());

    let update = ProfileUpdate {
        phone: Some("0800000000".to_string()),
        ..Default::default()
    };
    h.client.update_profile(&update).await.unwrap();

    let after = h.client.get_profile().await.unwrap();
    assert_eq!(after.phone.as_deref(), Some("0800000000"));

    let requests = h.transport.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[1].method, HttpMethod::Patch);
    let body: serde_json::Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, serde_json::json!({ "phone": "0800000000" }));
    assert_eq!(requests[2].method, HttpMethod::Get);
}

#[tokio::test]
async fn failed_update_keeps_cached_profile() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport
        .reply(200, PROFILE_JSON)
        .reply(400, r#"{"detail":"Account number must be 10 digits."}"#);

    h.client.get_profile().await.unwrap();
    let update = ProfileUpdate {
        account_number: Some("12ab".to_string()),
        ..Default::default()
    };
    assert!(h.client.update_profile(&update).await.is_err());
    assert!(h.client.cache().peek("profile").is_some());
}

#[tokio::test]
async fn loan_application_invalidates_dashboard_and_loans() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport
        .reply(200, DASHBOARD_JSON)
        .reply(200, "[]")
        .reply(200, "[]")
        .reply(
            201,
            r#"{"id":101,"amount":150000,"tenor":12,"purpose":"Relocation","status":"pending"}"#,
        )
        .reply(200, DASHBOARD_JSON);

    h.client.get_dashboard().await.unwrap();
    h.client.list_loans().await.unwrap();
    h.client.list_loan_products().await.unwrap();

    let application = h
        .client
        .apply_for_loan(&LoanApplicationRequest {
            amount: 150000.0,
            tenor: 12,
            purpose: "Relocation".to_string(),
            loan_product: None,
        })
        .await
        .unwrap();
    assert_eq!(application.id, 101);

    assert!(h.client.cache().peek("dashboard").is_none());
    assert!(h.client.cache().peek("loans").is_none());
    assert!(h.client.cache().peek("loan-products").is_some());

    h.client.get_dashboard().await.unwrap();
    assert_eq!(h.transport.request_count(), 5);
}

#[tokio::test]
async fn paying_an_installment_invalidates_repayments() {
    let h = harness_with_tokens(logged_in("abc"));
    let repayments = r#"{
        "summary": {"outstanding": 15000, "next_due_date": "2026-11-01", "total_paid": 15000, "installments": 2},
        "repayments": [
            {"id": 1, "amount": 15000, "due_date": "2026-11-01", "status": "due"},
            {"id": 2, "amount": 15000, "due_date": "2026-10-01", "status": "paid"}
        ]
    }"#;
    h.transport
        .reply(200, repayments)
        .reply(200, r#"{"id":1,"amount":15000,"due_date":"2026-11-01","status":"paid"}"#)
        .reply(200, repayments);

    let dashboard = h.client.get_repayment_dashboard().await.unwrap();
    assert_eq!(dashboard.repayments.len(), 2);

    let paid = h.client.pay_installment(1).await.unwrap();
    assert_eq!(paid.status, allawee_core::RepaymentStatus::Paid);
    assert_eq!(
        h.transport.requests()[1].url,
        "http://backend.test/api/repayments/1/pay/"
    );

    h.client.get_repayment_dashboard().await.unwrap();
    assert_eq!(h.transport.request_count(), 3);
}

#[tokio::test]
async fn salary_verification_is_never_cached() {
    let h = harness_with_tokens(logged_in("abc"));
    let verified = r#"{"status":"success","salary_verified":true,"monthly_salary":33000,"employer":"NYSC"}"#;
    h.transport.reply(200, verified).reply(200, verified);

    let first = h.client.verify_salary().await.unwrap();
    let second = h.client.verify_salary().await.unwrap();
    assert_eq!(first, second);
    assert!(first.salary_verified);
    assert_eq!(h.transport.request_count(), 2);
}

// ---------------------------------------------------------------------------
// Failure classification
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn stalled_request_times_out_and_is_aborted() {
    let transport = Arc::new(StalledTransport::default());
    let aborted = Arc::clone(&transport.aborted);
    let tokens = logged_in("abc");
    let client = ApiClient::new(
        ClientConfig::new("http://backend.test").unwrap(),
        transport,
        Arc::new(tokens.clone()),
    );

    let started = tokio::time::Instant::now();
    let err = client
        .request(
            "/dashboard/",
            RequestOptions::get().timeout(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_millis(50)));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(elapsed >= Duration::from_millis(50));
    assert!(elapsed < Duration::from_millis(100));
    assert!(aborted.load(Ordering::SeqCst));
    assert!(client.cache().is_empty());
    assert!(tokens.get().await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn configured_default_timeout_applies() {
    let transport = Arc::new(StalledTransport::default());
    let config = ClientConfig::new("http://backend.test")
        .unwrap()
        .with_default_timeout(Duration::from_secs(2));
    let client = ApiClient::new(config, transport, Arc::new(MemoryTokenStore::new()));

    let err = client.get_profile().await.unwrap_err();
    assert!(matches!(err, ApiError::Timeout(d) if d == Duration::from_secs(2)));
}

#[tokio::test]
async fn connection_failure_is_a_network_error() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport.fail("dns error: no such host");

    let err = h.client.get_dashboard().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(h.tokens.get().await.unwrap().is_some());
}

#[tokio::test]
async fn non_json_success_is_malformed() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport.reply(200, "not json").reply(200, "not json");

    let err = h.client.get_dashboard().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedResponse);

    let err = h.client.request("/dashboard/", RequestOptions::get()).await.unwrap_err();
    assert!(matches!(err, ApiError::MalformedResponse { status: 200, .. }));
}

#[tokio::test]
async fn wrong_shape_is_a_decode_error() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport.reply(200, r#"{"total_applications":"three"}"#);

    let err = h.client.get_dashboard().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    assert!(h.client.cache().is_empty());
}

#[tokio::test]
async fn raw_request_distinguishes_no_content() {
    let h = harness();
    h.transport.reply(204, "").reply(200, "null");

    let empty = h.client.request("/ping/", RequestOptions::post()).await.unwrap();
    assert_eq!(empty, Payload::NoContent);
    let null = h.client.request("/ping/", RequestOptions::get()).await.unwrap();
    assert_eq!(null, Payload::Json(serde_json::Value::Null));
}

#[tokio::test]
async fn server_errors_pass_payload_through() {
    let h = harness_with_tokens(logged_in("abc"));
    h.transport.reply(500, r#"{"error":"database unavailable"}"#);

    let err = h.client.list_loan_products().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Server);
    assert_eq!(err.payload().unwrap()["error"], "database unavailable");
}

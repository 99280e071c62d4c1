#![allow(clippy::unwrap_used, clippy::expect_used)]

use bytes::Bytes;
use http::{Method, StatusCode};
use openapi_runtime::dispatcher::{
    Dispatcher, HandlerError, HandlerResponse, Operation, OperationBase,
};
use openapi_runtime::router::RouteTable;
use openapi_runtime::runtime_config::AdmissionConfig;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

mod common;
use common::bases::{Late, PathParams};
use common::tracing_init::init_test_tracing;

fn active_dispatcher(config: AdmissionConfig) -> Arc<Dispatcher> {
    init_test_tracing();
    let dispatcher = Arc::new(Dispatcher::default());
    dispatcher.activate(config).unwrap();
    dispatcher
}

#[test]
fn test_no_blocking_outside_register_on_start() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], 10));

    let start = Instant::now();
    let resp = dispatcher.handle(Method::GET, "/xyz/missing", Bytes::new());
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(start.elapsed() < Duration::from_secs(5));

    let snap = dispatcher.metrics().snapshot();
    assert_eq!(snap.not_found, 1);
    assert_eq!(snap.wait_started, 0);
}

#[test]
fn test_no_blocking_with_zero_delay() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], 0));

    let start = Instant::now();
    let resp = dispatcher.handle(Method::GET, "/abc/missing", Bytes::new());
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_bounded_blocking() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], 2));

    let start = Instant::now();
    let resp = dispatcher.handle(Method::GET, "/abc/late", Bytes::new());
    let elapsed = start.elapsed();

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(elapsed >= Duration::from_secs(2), "returned after {elapsed:?}");

    let snap = dispatcher.metrics().snapshot();
    assert_eq!(snap.wait_started, 1);
    assert_eq!(snap.wait_timed_out, 1);
    assert_eq!(snap.not_found, 1);
}

#[test]
fn test_wake_on_registration() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], 2));
    let late = Arc::new(Late::default());

    let registrar = {
        let dispatcher = Arc::clone(&dispatcher);
        let late = Arc::clone(&late);
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(1));
            dispatcher.add(&late).unwrap();
        })
    };

    let start = Instant::now();
    let resp = dispatcher.handle(Method::GET, "/abc/late", Bytes::new());
    let elapsed = start.elapsed();
    registrar.join().unwrap();

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.body, Bytes::from_static(b"late"));
    assert!(elapsed < Duration::from_secs(2), "returned after {elapsed:?}");
    assert!(late.was_visited());
    assert_eq!(dispatcher.metrics().snapshot().wait_woken, 1);
}

#[test]
fn test_wait_ignores_unrelated_registrations() {
    struct Other;
    impl OperationBase for Other {
        fn prefix(&self) -> &str {
            "/abc"
        }
        fn operations(&self) -> Vec<Operation> {
            vec![Operation::new(Method::GET, "/other", |_| Ok(HandlerResponse::ok()))]
        }
    }

    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], 2));
    let late = Arc::new(Late::default());

    let registrar = {
        let dispatcher = Arc::clone(&dispatcher);
        let late = Arc::clone(&late);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(300));
            dispatcher.add(&Arc::new(Other)).unwrap();
            thread::sleep(Duration::from_millis(700));
            dispatcher.add(&late).unwrap();
        })
    };

    let start = Instant::now();
    let resp = dispatcher.handle(Method::GET, "/abc/late", Bytes::new());
    registrar.join().unwrap();

    assert_eq!(resp.status, StatusCode::OK);
    assert!(start.elapsed() >= Duration::from_millis(900));
    assert!(start.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_path_parameter_order() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/api/v1"], 2));
    let base = Arc::new(PathParams::default());
    dispatcher.add(&base).unwrap();

    let requests: [(Method, &str, &str, &[&str]); 6] = [
        (Method::GET, "/api/v1/a/1", "get_a", &["1"]),
        (Method::DELETE, "/api/v1/a/1", "delete_a", &["1"]),
        (Method::PUT, "/api/v1/a/1/2", "put_a_b", &["1", "2"]),
        (Method::PUT, "/api/v1/a/1/foo/bar", "put_a_foo_bar", &["1"]),
        (Method::PUT, "/api/v1/a/1/bar/2", "put_a_bar_b", &["1", "2"]),
        (Method::PUT, "/api/v1/a/1/foo/2", "put_a_foo_b", &["1", "2"]),
    ];

    let start = Instant::now();
    for (method, path, expected_op, expected_params) in requests {
        let resp = dispatcher.handle(method.clone(), path, Bytes::new());
        assert_eq!(resp.status, StatusCode::OK, "{method} {path}");

        let calls = base.take_calls();
        assert_eq!(calls.len(), 1, "{method} {path}");
        let (op, params) = &calls[0];
        assert_eq!(*op, expected_op, "{method} {path}");
        assert_eq!(params, expected_params, "{method} {path}");
    }
    assert!(start.elapsed() < Duration::from_secs(2));
}

struct Failing;

impl OperationBase for Failing {
    fn operations(&self) -> Vec<Operation> {
        vec![
            Operation::new(Method::POST, "/fail/unavailable", |_| {
                Err(HandlerError::with_status(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "backend down",
                ))
            }),
            Operation::new(Method::POST, "/fail/bad-request", |_| {
                Err(HandlerError::with_status(StatusCode::BAD_REQUEST, "nope"))
            }),
            Operation::new(Method::POST, "/fail/anyhow", |_| {
                Err(anyhow::anyhow!("disk full").into())
            }),
            Operation::new(Method::POST, "/fail/panic", |_| panic!("handler exploded")),
        ]
    }
}

#[test]
fn test_handler_failures_map_to_5xx() {
    let dispatcher = active_dispatcher(AdmissionConfig::default());
    dispatcher.add(&Arc::new(Failing)).unwrap();

    let resp = dispatcher.handle(Method::POST, "/fail/unavailable", Bytes::new());
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(resp.json_body().unwrap()["error"], "backend down");

    let resp = dispatcher.handle(Method::POST, "/fail/bad-request", Bytes::new());
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);

    let resp = dispatcher.handle(Method::POST, "/fail/anyhow", Bytes::new());
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.json_body().unwrap()["error"], "disk full");

    let resp = dispatcher.handle(Method::POST, "/fail/panic", Bytes::new());
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);

    let snap = dispatcher.metrics().snapshot();
    assert_eq!(snap.handler_failures, 3);
    assert_eq!(snap.handler_panics, 1);
    assert_eq!(snap.matched, 4);

    // The dispatcher keeps serving after a panic
    let resp = dispatcher.handle(Method::POST, "/fail/unavailable", Bytes::new());
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn test_body_reaches_handler() {
    struct Echo;
    impl OperationBase for Echo {
        fn operations(&self) -> Vec<Operation> {
            vec![Operation::new(Method::POST, "/echo/{id}", |req| {
                let body: serde_json::Value = serde_json::from_slice(&req.body)
                    .map_err(|e| HandlerError::new(e.to_string()))?;
                Ok(HandlerResponse::json(
                    StatusCode::CREATED,
                    &serde_json::json!({
                        "id": req.get_path_param("id"),
                        "body": body,
                    }),
                ))
            })]
        }
    }

    let dispatcher = active_dispatcher(AdmissionConfig::default());
    dispatcher.add(&Arc::new(Echo)).unwrap();

    let resp = dispatcher.handle(
        Method::POST,
        "/echo/42",
        Bytes::from_static(br#"{"name":"rex"}"#),
    );
    assert_eq!(resp.status, StatusCode::CREATED);
    let json = resp.json_body().unwrap();
    assert_eq!(json["id"], "42");
    assert_eq!(json["body"]["name"], "rex");
}

#[test]
fn test_shutdown_releases_waiting_request() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], 10));

    let waiter = {
        let dispatcher = Arc::clone(&dispatcher);
        thread::spawn(move || {
            let start = Instant::now();
            let resp = dispatcher.handle(Method::GET, "/abc/never", Bytes::new());
            (resp.status, start.elapsed())
        })
    };

    thread::sleep(Duration::from_millis(300));
    dispatcher.shutdown();
    let (status, elapsed) = waiter.join().unwrap();

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(elapsed < Duration::from_secs(5));
    assert!(!dispatcher.is_active());

    let resp = dispatcher.handle(Method::GET, "/abc/never", Bytes::new());
    assert_eq!(resp.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[test]
fn test_reactivation_replaces_configuration() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], 2));
    dispatcher.shutdown();
    dispatcher.activate(AdmissionConfig::new(["/abc"], 0)).unwrap();

    let start = Instant::now();
    let resp = dispatcher.handle(Method::GET, "/abc/late", Bytes::new());
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_activate_rejects_relative_prefix() {
    init_test_tracing();
    let dispatcher = Dispatcher::default();
    assert!(dispatcher
        .activate(AdmissionConfig::new(["api/v1"], 2))
        .is_err());
    assert!(!dispatcher.is_active());
}

#[test]
fn test_remove_withdraws_all_operations() {
    let dispatcher = active_dispatcher(AdmissionConfig::default());
    let base = Arc::new(PathParams::default());
    dispatcher.add(&base).unwrap();
    assert_eq!(dispatcher.table().len(), 6);

    assert!(dispatcher.remove(&base));
    assert!(dispatcher.table().is_empty());
    let resp = dispatcher.handle(Method::GET, "/api/v1/a/1", Bytes::new());
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    // Removal is idempotent and the base can be mounted again
    assert!(!dispatcher.remove(&base));
    dispatcher.add(&base).unwrap();
    let resp = dispatcher.handle(Method::GET, "/api/v1/a/1", Bytes::new());
    assert_eq!(resp.status, StatusCode::OK);
}

#[test]
fn test_shutdown_does_not_affect_dispatcher_sharing_the_table() {
    init_test_tracing();
    let table = Arc::new(RouteTable::new());
    let stopped = Dispatcher::new(Arc::clone(&table));
    let running = Dispatcher::new(Arc::clone(&table));
    stopped.activate(AdmissionConfig::new(["/abc"], 1)).unwrap();
    running.activate(AdmissionConfig::new(["/abc"], 1)).unwrap();

    stopped.shutdown();

    let start = Instant::now();
    let resp = running.handle(Method::GET, "/abc/x", Bytes::new());
    let elapsed = start.elapsed();
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(elapsed >= Duration::from_secs(1), "returned after {elapsed:?}");
    assert!(running.is_active());
}

#[test]
fn test_shutdown_of_one_dispatcher_releases_only_its_waiters() {
    init_test_tracing();
    let table = Arc::new(RouteTable::new());
    let stopped = Arc::new(Dispatcher::new(Arc::clone(&table)));
    let running = Arc::new(Dispatcher::new(Arc::clone(&table)));
    stopped.activate(AdmissionConfig::new(["/abc"], 5)).unwrap();
    running.activate(AdmissionConfig::new(["/abc"], 5)).unwrap();

    let spawn_wait = |dispatcher: &Arc<Dispatcher>| {
        let dispatcher = Arc::clone(dispatcher);
        thread::spawn(move || dispatcher.handle(Method::GET, "/abc/late", Bytes::new()).status)
    };
    let stopped_wait = spawn_wait(&stopped);
    let running_wait = spawn_wait(&running);

    thread::sleep(Duration::from_millis(300));
    stopped.shutdown();
    assert_eq!(stopped_wait.join().unwrap(), StatusCode::SERVICE_UNAVAILABLE);

    // The other dispatcher's request is still parked and picks up the route
    let late = Arc::new(Late::default());
    running.add(&late).unwrap();
    assert_eq!(running_wait.join().unwrap(), StatusCode::OK);
    assert!(late.was_visited());
}

#[test]
fn test_huge_delay_does_not_panic() {
    let dispatcher = active_dispatcher(AdmissionConfig::new(["/abc"], u64::MAX));
    let late = Arc::new(Late::default());

    let registrar = {
        let dispatcher = Arc::clone(&dispatcher);
        let late = Arc::clone(&late);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            dispatcher.add(&late).unwrap();
        })
    };

    let resp = dispatcher.handle(Method::GET, "/abc/late", Bytes::new());
    registrar.join().unwrap();
    assert_eq!(resp.status, StatusCode::OK);
    assert!(late.was_visited());
}

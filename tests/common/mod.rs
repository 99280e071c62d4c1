#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod tracing_init {
    use std::sync::Once;

    static INIT: Once = Once::new();

    /// Route dispatch logs to the test harness writer (shown with `--nocapture`)
    pub fn init_test_tracing() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_test_writer()
                .try_init();
        });
    }
}

pub mod bases {
    use http::{Method, StatusCode};
    use openapi_runtime::dispatcher::{HandlerResponse, Operation, OperationBase};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// One recorded invocation: which operation ran and the values it received
    pub type Call = (&'static str, Vec<String>);

    fn recording(
        calls: &Arc<Mutex<Vec<Call>>>,
        method: Method,
        template: &'static str,
        name: &'static str,
    ) -> Operation {
        let calls = Arc::clone(calls);
        Operation::new(method, template, move |req| {
            let values: Vec<String> = req.param_values().iter().map(|v| v.to_string()).collect();
            calls.lock().push((name, values));
            Ok(HandlerResponse::ok())
        })
    }

    /// The six-operation parameter order fixture, mounted at `/api/v1`
    #[derive(Default)]
    pub struct PathParams {
        pub calls: Arc<Mutex<Vec<Call>>>,
    }

    impl PathParams {
        pub fn take_calls(&self) -> Vec<Call> {
            std::mem::take(&mut *self.calls.lock())
        }
    }

    impl OperationBase for PathParams {
        fn prefix(&self) -> &str {
            "/api/v1"
        }

        fn operations(&self) -> Vec<Operation> {
            vec![
                recording(&self.calls, Method::GET, "/a/{a}", "get_a"),
                recording(&self.calls, Method::DELETE, "/a/{a}", "delete_a"),
                recording(&self.calls, Method::PUT, "/a/{a}/{b}", "put_a_b"),
                recording(&self.calls, Method::PUT, "/a/{a}/foo/bar", "put_a_foo_bar"),
                recording(&self.calls, Method::PUT, "/a/{a}/bar/{b}", "put_a_bar_b"),
                recording(&self.calls, Method::PUT, "/a/{a}/foo/{b}", "put_a_foo_b"),
            ]
        }
    }

    /// Single `GET /abc/late` operation that records whether it ran
    #[derive(Default)]
    pub struct Late {
        pub visited: Arc<AtomicBool>,
    }

    impl Late {
        pub fn was_visited(&self) -> bool {
            self.visited.load(Ordering::SeqCst)
        }
    }

    impl OperationBase for Late {
        fn prefix(&self) -> &str {
            "/abc"
        }

        fn operations(&self) -> Vec<Operation> {
            let visited = Arc::clone(&self.visited);
            vec![Operation::new(Method::GET, "/late", move |_req| {
                visited.store(true, Ordering::SeqCst);
                Ok(HandlerResponse::text(StatusCode::OK, "late"))
            })]
        }
    }
}

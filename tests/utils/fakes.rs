/// Test doubles for the upstream and builders wiring them into the services
use async_trait::async_trait;
use mockall::mock;
use serde_json::Value;
use sofa_sync_lib::commands::ControlSurface;
use sofa_sync_lib::modules::catalog::MemoryEntityStore;
use sofa_sync_lib::modules::provider::{
    Endpoints, FetchGateway, PageRenderer, Payload, Resource, RetryPolicy, UpstreamTransport,
};
use sofa_sync_lib::shared::errors::{AppError, AppResult};
use sofa_sync_lib::shared::utils::{PacingPolicy, RecordingPacer};
use std::sync::{Arc, Mutex};

mock! {
    pub Transport {}

    #[async_trait]
    impl UpstreamTransport for Transport {
        async fn get_json(&self, url: &str) -> AppResult<Value>;
        async fn get_html(&self, url: &str) -> AppResult<String>;
    }
}

mock! {
    pub Renderer {}

    #[async_trait]
    impl PageRenderer for Renderer {
        async fn render(&self, resource: &Resource, url: &str) -> AppResult<Payload>;
    }
}

type Route = Box<dyn Fn(&str) -> AppResult<Value> + Send + Sync>;

/// Answers every JSON request from a routing function keyed on the path
/// after `/api/v1`, and remembers what was asked.
pub struct RoutedTransport {
    route: Route,
    calls: Mutex<Vec<String>>,
}

impl RoutedTransport {
    pub fn new(route: impl Fn(&str) -> AppResult<Value> + Send + Sync + 'static) -> Self {
        Self {
            route: Box::new(route),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls().iter().filter(|p| p.as_str() == path).count()
    }
}

#[async_trait]
impl UpstreamTransport for RoutedTransport {
    async fn get_json(&self, url: &str) -> AppResult<Value> {
        let path = api_path(url).to_string();
        self.calls.lock().unwrap().push(path.clone());
        (self.route)(&path)
    }

    async fn get_html(&self, url: &str) -> AppResult<String> {
        Err(AppError::NotFound(format!("no pages in tests: {}", url)))
    }
}

pub fn api_path(url: &str) -> &str {
    url.split_once("/api/v1").map(|(_, path)| path).unwrap_or(url)
}

pub fn not_found(path: &str) -> AppError {
    AppError::NotFound(format!("GET {} returned 404", path))
}

pub fn gateway(
    transport: Arc<dyn UpstreamTransport>,
    renderer: Option<Arc<dyn PageRenderer>>,
    pacer: Arc<RecordingPacer>,
) -> FetchGateway {
    let gateway = FetchGateway::new(
        transport,
        Endpoints::default(),
        RetryPolicy::default(),
        PacingPolicy::immediate(),
        pacer,
    );
    match renderer {
        Some(renderer) => gateway.with_renderer(renderer),
        None => gateway,
    }
}

/// A control surface over a routed fake upstream and an in-memory store.
pub struct Harness {
    pub surface: ControlSurface,
    pub store: Arc<MemoryEntityStore>,
    pub pacer: Arc<RecordingPacer>,
    pub transport: Arc<RoutedTransport>,
}

pub fn harness(route: impl Fn(&str) -> AppResult<Value> + Send + Sync + 'static) -> Harness {
    harness_with_pacing(route, PacingPolicy::immediate())
}

pub fn harness_with_pacing(
    route: impl Fn(&str) -> AppResult<Value> + Send + Sync + 'static,
    pacing: PacingPolicy,
) -> Harness {
    let transport = Arc::new(RoutedTransport::new(route));
    let pacer = Arc::new(RecordingPacer::new());
    let store = Arc::new(MemoryEntityStore::new());

    let gateway = Arc::new(FetchGateway::new(
        transport.clone(),
        Endpoints::default(),
        RetryPolicy::default(),
        pacing.clone(),
        pacer.clone(),
    ));
    let surface = ControlSurface::new(gateway, store.clone(), pacer.clone(), pacing);

    Harness {
        surface,
        store,
        pacer,
        transport,
    }
}

//! Resilient retrieval of one upstream resource.
//!
//! The structured API is tried first with bounded exponential backoff; when
//! it keeps failing, or answers with a payload of the wrong shape, the HTML
//! page is used instead and the result is marked degraded. A 404 ends the
//! fetch immediately on either path.

use crate::modules::provider::domain::{Fidelity, ParsedData, Payload, Resource};
use crate::modules::provider::infrastructure::http_client::{
    HttpTransport, RetryPolicy, UpstreamTransport,
};
use crate::modules::provider::infrastructure::sofascore::{
    Endpoints, HtmlPageRenderer, PageRenderer,
};
use crate::shared::config::AppConfig;
use crate::shared::errors::{AppError, AppResult};
use crate::shared::utils::{LogContext, Pacer, PacingPolicy, TimedOperation};
use crate::{log_debug, log_warn};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    Api,
    Page,
}

pub struct FetchGateway {
    transport: Arc<dyn UpstreamTransport>,
    renderer: Option<Arc<dyn PageRenderer>>,
    endpoints: Endpoints,
    retry_policy: RetryPolicy,
    pacing: PacingPolicy,
    pacer: Arc<dyn Pacer>,
}

impl FetchGateway {
    pub fn new(
        transport: Arc<dyn UpstreamTransport>,
        endpoints: Endpoints,
        retry_policy: RetryPolicy,
        pacing: PacingPolicy,
        pacer: Arc<dyn Pacer>,
    ) -> Self {
        Self {
            transport,
            renderer: None,
            endpoints,
            retry_policy,
            pacing,
            pacer,
        }
    }

    /// Production wiring: HTTP transport plus the HTML page fallback.
    pub fn from_config(config: &AppConfig, pacer: Arc<dyn Pacer>) -> AppResult<Self> {
        let transport: Arc<dyn UpstreamTransport> = Arc::new(HttpTransport::from_config(config)?);
        let renderer = HtmlPageRenderer::new(transport.clone());

        Ok(Self::new(
            transport,
            Endpoints::from_config(config),
            RetryPolicy::from_config(config),
            PacingPolicy::from_config(config),
            pacer,
        )
        .with_renderer(Arc::new(renderer)))
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Fetch and shape-check `resource`, falling back to its HTML page when possible.
    pub async fn fetch(&self, resource: &Resource) -> AppResult<ParsedData> {
        let timer = TimedOperation::new(&format!("fetch {}", resource));
        let url = self.endpoints.api_url(resource);

        let mut strategy = Strategy::Api;
        let mut attempt: u32 = 0;
        let mut primary_error: Option<AppError> = None;

        loop {
            match strategy {
                Strategy::Api => {
                    LogContext::upstream_call("api", &url, "start", None);
                    let outcome = match self.transport.get_json(&url).await {
                        Ok(value) => Payload::from_json(resource, value),
                        Err(e) => Err(e),
                    };

                    match outcome {
                        Ok(payload) => {
                            LogContext::upstream_call(
                                "api",
                                &url,
                                "ok",
                                Some(timer.elapsed_ms()),
                            );
                            self.settle().await;
                            return Ok(ParsedData {
                                resource: resource.clone(),
                                payload,
                                fidelity: Fidelity::Full,
                                api_attempts: attempt + 1,
                            });
                        }
                        Err(AppError::NotFound(message)) => {
                            log_debug!("{} does not exist upstream: {}", resource, message);
                            return Err(AppError::NotFound(format!("{}: {}", resource, message)));
                        }
                        Err(AppError::ParseError(message)) => {
                            log_warn!("{} failed shape validation: {}", resource, message);
                            primary_error = Some(AppError::ParseError(message));
                            strategy = Strategy::Page;
                        }
                        Err(error) if attempt < self.retry_policy.max_retries => {
                            let delay = self.retry_policy.calculate_delay(attempt);
                            log_warn!(
                                "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                                resource,
                                attempt + 1,
                                self.retry_policy.max_retries + 1,
                                error,
                                delay
                            );
                            self.pacer.pause(delay).await;
                            attempt += 1;
                        }
                        Err(error) => {
                            log_warn!(
                                "{} failed after {} attempts: {}",
                                resource,
                                attempt + 1,
                                error
                            );
                            primary_error = Some(error);
                            strategy = Strategy::Page;
                        }
                    }
                }
                Strategy::Page => {
                    let error = primary_error.take().unwrap_or_else(|| {
                        AppError::InternalError(format!("No primary outcome for {}", resource))
                    });
                    return self.fall_back(resource, error, attempt + 1).await;
                }
            }
        }
    }

    async fn fall_back(
        &self,
        resource: &Resource,
        primary_error: AppError,
        api_attempts: u32,
    ) -> AppResult<ParsedData> {
        let (renderer, page_url) = match (&self.renderer, self.endpoints.page_url(resource)) {
            (Some(renderer), Some(page_url)) if primary_error.triggers_fallback() => {
                (renderer, page_url)
            }
            _ => return Err(primary_error),
        };

        log_warn!("Falling back to page {} for {}", page_url, resource);
        match renderer.render(resource, &page_url).await {
            Ok(payload) => {
                LogContext::upstream_call("page", &page_url, "ok (degraded)", None);
                self.settle().await;
                Ok(ParsedData {
                    resource: resource.clone(),
                    payload,
                    fidelity: Fidelity::Degraded,
                    api_attempts,
                })
            }
            Err(AppError::NotFound(message)) => Err(AppError::NotFound(message)),
            Err(fallback_error) => {
                log_warn!(
                    "Page fallback for {} failed too: {}",
                    resource,
                    fallback_error
                );
                Err(primary_error)
            }
        }
    }

    /// Randomized pause after every successful fetch.
    async fn settle(&self) {
        self.pacer.pause(self.pacing.success_jitter.sample()).await;
    }
}

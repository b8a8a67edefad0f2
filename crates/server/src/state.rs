use std::sync::{Arc, RwLock};

use events::EventBus;
use orchestrator::{
    GeminiClient, LlmPlanner, ProjectStateStore, ReportAssembler, RetryPolicy, RunController,
    TavilyClient, TextGenerator, WebSearch, WorkerRegistry,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::routes::sse::{spawn_recorder, EventBuffer, SharedEventBuffer, DEFAULT_EVENT_BUFFER_SIZE};

/// Which external collaborators are configured.
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct ServicesStatus {
    /// Gemini model used for planning and the specialists, when a key is set.
    pub text_generation: Option<String>,
    pub web_search: bool,
}

impl ServicesStatus {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            text_generation: config
                .gemini
                .api_key
                .as_ref()
                .map(|_| config.gemini.model.clone()),
            web_search: config.tavily.api_key.is_some(),
        }
    }
}

fn text_generator(config: &AppConfig) -> Option<Arc<dyn TextGenerator>> {
    let key = config.gemini.api_key.as_ref()?;
    let mut client = GeminiClient::new(key.clone())
        .with_model(config.gemini.model.clone())
        .with_retry_policy(RetryPolicy::default().with_max_retries(config.gemini.max_retries));
    if let Some(url) = &config.gemini.base_url {
        client = client.with_base_url(url.clone());
    }
    Some(Arc::new(client))
}

fn web_search(config: &AppConfig) -> Option<Arc<dyn WebSearch>> {
    let key = config.tavily.api_key.as_ref()?;
    let mut client = TavilyClient::new(key.clone());
    if let Some(url) = &config.tavily.base_url {
        client = client.with_base_url(url.clone());
    }
    Some(Arc::new(client))
}

/// Wire the team from configuration. Without a Gemini key the controller has
/// no planner and no workers; runs then fail with a planner-unavailable error.
pub fn build_controller(config: &AppConfig, event_bus: &EventBus) -> RunController {
    let generator = text_generator(config);
    let search = web_search(config);

    let registry = generator
        .clone()
        .map(|generator| WorkerRegistry::specialists(generator, search))
        .unwrap_or_default();
    let store = ProjectStateStore::new().with_event_bus(event_bus.clone());

    let controller = RunController::new(registry, store)
        .with_reporter(ReportAssembler::new(generator.clone()))
        .with_event_bus(event_bus.clone());
    match generator {
        Some(generator) => controller.with_planner(Arc::new(LlmPlanner::new(generator))),
        None => {
            tracing::warn!("GEMINI_API_KEY not set, orchestration is disabled");
            controller
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<RunController>,
    pub event_bus: EventBus,
    pub event_buffer: SharedEventBuffer,
    pub config: Arc<AppConfig>,
    pub services: ServicesStatus,
    /// Cancelled on shutdown; every run gets a child token.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Self {
        let event_bus = EventBus::new();
        let controller = build_controller(&config, &event_bus);
        let services = ServicesStatus::from_config(&config);
        Self::new(controller, event_bus, config).with_services(services)
    }

    /// `controller` is expected to publish on `event_bus`.
    pub fn new(controller: RunController, event_bus: EventBus, config: AppConfig) -> Self {
        let event_buffer = Arc::new(RwLock::new(EventBuffer::new(DEFAULT_EVENT_BUFFER_SIZE)));
        spawn_recorder(&event_bus, Arc::clone(&event_buffer));

        Self {
            controller: Arc::new(controller),
            event_bus,
            event_buffer,
            config: Arc::new(config),
            services: ServicesStatus::default(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_services(mut self, services: ServicesStatus) -> Self {
        self.services = services;
        self
    }

    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn project(&self) -> &ProjectStateStore {
        self.controller.state()
    }
}

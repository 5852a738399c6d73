pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use reqwest::Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::database::{CandidateStore, PgCandidateStore};
use crate::error::Result;
use crate::services::{
    ai_service::{AiService, DisabledEnricher, Enricher},
    candidate_service::CandidateService,
    exam_score_service::ExamScoreService,
    field_extractor::FieldAliasMap,
    form_client::{SubmissionSource, TypeformClient},
    import_service::{ImportService, ImportSettings},
    ingestion_service::IngestionService,
    notification_service::{MessagingService, NoopNotifier, Notifier},
    resolver::CandidateResolver,
};

/// Secrets guarding the HTTP surface.
#[derive(Clone, Debug)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub webhook_secret: String,
    pub form_signature_secret: Option<String>,
}

/// External collaborators of the pipeline. Swapped for fakes in tests.
pub struct Collaborators {
    pub store: Arc<dyn CandidateStore>,
    pub enricher: Arc<dyn Enricher>,
    pub notifier: Arc<dyn Notifier>,
    pub source: Option<Arc<dyn SubmissionSource>>,
}

#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub name_scan_limit: usize,
    pub default_country_code: String,
    pub webhook_rps: u32,
    pub import: ImportSettings,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CandidateStore>,
    pub alias_map: Arc<FieldAliasMap>,
    pub ingestion_service: Arc<IngestionService>,
    pub candidate_service: Arc<CandidateService>,
    pub exam_score_service: Arc<ExamScoreService>,
    pub import_service: Option<Arc<ImportService>>,
    pub auth: AuthSettings,
    pub webhook_rps: u32,
}

impl AppState {
    pub fn new(pool: PgPool, config: &Config) -> Result<Self> {
        let http_client = Client::builder().timeout(config.request_timeout).build()?;

        let alias_map = match config.field_alias_map_path.as_deref() {
            Some(path) => {
                tracing::info!(path, "Loading field alias map");
                FieldAliasMap::from_json_file(path)?
            }
            None => FieldAliasMap::builtin(),
        };

        let enricher: Arc<dyn Enricher> = match config.openai_api_key.clone() {
            Some(key) => Arc::new(AiService::new(
                key,
                config.openai_model.clone(),
                http_client.clone(),
                config.request_timeout,
            )),
            None => {
                tracing::warn!("OPENAI_API_KEY not set, AI enrichment disabled");
                Arc::new(DisabledEnricher)
            }
        };

        let notifier: Arc<dyn Notifier> = match (&config.messaging_url, &config.messaging_token) {
            (Some(url), Some(token)) => Arc::new(MessagingService::new(
                http_client.clone(),
                url.clone(),
                token.clone(),
                config.request_timeout,
            )),
            _ => {
                tracing::warn!("Messaging provider not configured, notifications disabled");
                Arc::new(NoopNotifier)
            }
        };

        let source: Option<Arc<dyn SubmissionSource>> = config.typeform_token.clone().map(|token| {
            Arc::new(TypeformClient::new(
                http_client.clone(),
                config.typeform_base_url.clone(),
                token,
                config.page_size,
                config.upstream_max_retries,
                config.upstream_retry_backoff,
            )) as Arc<dyn SubmissionSource>
        });

        let collaborators = Collaborators {
            store: Arc::new(PgCandidateStore::new(pool, config.store_timeout)),
            enricher,
            notifier,
            source,
        };
        let auth = AuthSettings {
            jwt_secret: config.jwt_secret.clone(),
            webhook_secret: config.webhook_secret.clone(),
            form_signature_secret: config.typeform_webhook_secret.clone(),
        };
        let settings = PipelineSettings {
            name_scan_limit: config.name_scan_limit,
            default_country_code: config.default_country_code.clone(),
            webhook_rps: config.webhook_rps,
            import: ImportSettings {
                form_ids: config.application_form_ids.clone(),
                batch_size: config.batch_size,
                batch_delay: config.batch_delay,
                page_delay: config.page_delay,
            },
        };

        Ok(Self::assemble(collaborators, alias_map, auth, settings))
    }

    pub fn assemble(
        collaborators: Collaborators,
        alias_map: FieldAliasMap,
        auth: AuthSettings,
        settings: PipelineSettings,
    ) -> Self {
        let Collaborators {
            store,
            enricher,
            notifier,
            source,
        } = collaborators;
        let alias_map = Arc::new(alias_map);
        let resolver = CandidateResolver::new(settings.name_scan_limit);
        let webhook_rps = settings.webhook_rps;

        let ingestion_service = Arc::new(IngestionService::new(
            store.clone(),
            alias_map.clone(),
            resolver.clone(),
            enricher,
        ));
        let candidate_service = Arc::new(CandidateService::new(
            store.clone(),
            notifier,
            settings.default_country_code,
        ));
        let exam_score_service = Arc::new(ExamScoreService::new(
            store.clone(),
            alias_map.clone(),
            resolver,
        ));
        let import_service = source.map(|source| {
            Arc::new(ImportService::new(
                source,
                ingestion_service.clone(),
                settings.import,
            ))
        });

        Self {
            store,
            alias_map,
            ingestion_service,
            candidate_service,
            exam_score_service,
            import_service,
            auth,
            webhook_rps,
        }
    }
}

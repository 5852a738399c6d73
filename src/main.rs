use std::net::SocketAddr;

use recruitment_pipeline::{
    config::{get_config, init_config, Config},
    database::pool::{create_pool, run_migrations},
    routes, AppState,
};
use tokio::net::TcpListener;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn maybe_start_scheduler(config: &Config, state: &AppState) -> anyhow::Result<Option<JobScheduler>> {
    let Some(cron) = config.sync_cron.as_deref() else {
        return Ok(None);
    };
    let Some(import_service) = state.import_service.clone() else {
        tracing::warn!(cron, "SYNC_CRON set but TYPEFORM_TOKEN is missing, scheduled import disabled");
        return Ok(None);
    };

    let sched = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("creating scheduler: {}", e))?;
    let job = Job::new_async(cron, move |_uuid, _l| {
        let import_service = import_service.clone();
        Box::pin(async move {
            info!("Scheduled import triggered");
            import_service.run().await;
        })
    })
    .map_err(|e| anyhow::anyhow!("creating scheduler job for cron {}: {}", cron, e))?;
    sched
        .add(job)
        .await
        .map_err(|e| anyhow::anyhow!("adding scheduler job: {}", e))?;
    sched
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("starting scheduler: {}", e))?;
    info!(cron, "Scheduled import enabled");
    Ok(Some(sched))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config()?;
    let config = get_config()?;

    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;

    let app_state = AppState::new(pool, config)?;
    let _scheduler = maybe_start_scheduler(config, &app_state).await?;

    let app = routes::build_router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::sync::Arc;

use ugc_review::agents::OpenAiClassifier;
use ugc_review::config::{BlobBackend, Config};
use ugc_review::db::{self, PgStore};
use ugc_review::notify::{EmailApiNotifier, LogNotifier};
use ugc_review::pipeline::{Collaborators, Pipeline};
use ugc_review::routes;
use ugc_review::state::AppState;
use ugc_review::storage::{self, HttpObjectStore, LocalDiskStore};
use ugc_review::templates::Templates;
use ugc_review::traits::{BlobStore, Notifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ugc_review=info,validation=info,tower_http=info".into()),
        )
        .init();

    let config = Arc::new(Config::from_env()?);

    storage::ensure_dirs(&config.upload_folder)?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(pool.as_ref()).await?;
    let store = Arc::new(PgStore::new(pool));

    let timeout = config.pipeline.call_timeout;

    let classifier = OpenAiClassifier::new(
        config.openai_api_key.clone(),
        config.openai_model.clone(),
        timeout,
    )?;
    if config.openai_api_key.is_none() {
        tracing::warn!(
            "OPENAI_API_KEY not set, every image will take the {:?} fallback",
            config.pipeline.classifier_fallback
        );
    }

    let collaborators = Collaborators {
        classifier: Arc::new(classifier),
        blob_stores: blob_stores(&config)?,
        records: store.clone(),
        reward_pool: store,
        notifier: notifier(&config)?,
        templates: Arc::new(Templates::new()?),
    };

    let pipeline = Pipeline::new(config.pipeline.clone(), collaborators);
    tracing::info!(
        "Blob backends: {:?}, notifier: {}",
        pipeline.info().blob_backends,
        pipeline.info().notifier
    );

    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        config: config.clone(),
    });

    let app = routes::create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("UGC review service listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn blob_stores(
    config: &Config,
) -> Result<Vec<Arc<dyn BlobStore>>, Box<dyn std::error::Error + Send + Sync>> {
    let mut stores: Vec<Arc<dyn BlobStore>> = Vec::new();

    for backend in &config.blob_backends {
        match backend {
            BlobBackend::Http => match &config.blob_http_endpoint {
                Some(endpoint) => stores.push(Arc::new(HttpObjectStore::new(
                    endpoint.clone(),
                    config.blob_http_token.clone(),
                    config.blob_public_url.clone(),
                    config.pipeline.call_timeout,
                )?)),
                None => tracing::warn!("BLOB_HTTP_ENDPOINT not set, skipping http blob backend"),
            },
            BlobBackend::Local => stores.push(Arc::new(LocalDiskStore::new(
                config.upload_folder.clone(),
                config.public_base_url.clone(),
            ))),
        }
    }

    Ok(stores)
}

fn notifier(config: &Config) -> Result<Arc<dyn Notifier>, Box<dyn std::error::Error + Send + Sync>> {
    match &config.email_api_url {
        Some(url) => Ok(Arc::new(EmailApiNotifier::new(
            url.clone(),
            config.email_api_key.clone(),
            config.email_from.clone(),
            config.pipeline.call_timeout,
        )?)),
        None => {
            tracing::warn!("EMAIL_API_URL not set, reward emails will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

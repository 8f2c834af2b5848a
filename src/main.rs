use std::sync::Arc;

use niko_auth::config::AppConfig;
use niko_auth::services::cms_sync::{CmsSync, DisabledSync, EdgeFunctionSync};
use niko_auth::services::supabase::SupabaseClient;
use niko_auth::{routes, state};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env().expect("invalid configuration");
    let port = config.port;

    let accounts = SupabaseClient::new(&config.supabase).expect("identity provider client init failed");

    // CMS sync is optional: auth keeps working without it.
    let cms: Arc<dyn CmsSync> = if config.cms_sync_enabled {
        match EdgeFunctionSync::new(&config.supabase.url, &config.supabase.anon_key) {
            Ok(sync) => Arc::new(sync),
            Err(e) => {
                tracing::warn!(error = %e, "cms sync client init failed; sync disabled");
                Arc::new(DisabledSync)
            }
        }
    } else {
        tracing::info!("cms sync disabled by configuration");
        Arc::new(DisabledSync)
    };

    let state = state::AppState::new(config, Arc::new(accounts), cms);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "niko-auth listening");
    axum::serve(listener, app).await.expect("server failed");
}

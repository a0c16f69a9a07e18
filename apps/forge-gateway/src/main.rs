use anyhow::Result;
use axum::http::StatusCode;
use axum::routing::get;
use clap::Parser;

mod admin_ui;
mod cli;
mod data_dir;
mod dsn;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = cli::Cli::parse();
    let resolved_data_dir = data_dir::resolve_data_dir(&args.data_dir);
    let resolved_dsn = dsn::resolve_dsn(&args.dsn, &resolved_data_dir).map_err(|err| anyhow::anyhow!(err.to_string()))?;
    let redis_url = cli::redis_url(&args);

    let mut cli_patch = cli::cli_patch(&args);
    cli_patch.dsn = Some(resolved_dsn);
    let env_patch = cli::env_patch();

    let state = forge_core::bootstrap::bootstrap(cli_patch, env_patch, redis_url.as_deref()).await?;
    let bind = format!("{}:{}", state.config.host, state.config.port);

    let app = axum::Router::new()
        .merge(forge_router::proxy_router(state.clone()))
        .nest("/admin", forge_router::admin_router(state.clone()))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .fallback(admin_ui::ui_fallback);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "forge-gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

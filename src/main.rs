use std::sync::Arc;

use pagebase::{config, model::database, routing::RouteTables, templatetags, views};
use tera::Tera;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pagebase=info,tower_http=info")),
        )
        .init();

    let config_path = std::env::args()
        .nth(1)
        .ok_or("usage: pagebase <config.toml>")?;
    let config: config::Config = toml::from_str(&tokio::fs::read_to_string(&config_path).await?)?;
    debug!(?config, "loaded config");

    let pool = database::connect(&config.db.sqlite_file).await?;
    database::apply_schema(&pool).await?;
    let site = Arc::new(
        database::load_site(
            &pool,
            config.site.root_slug.as_deref(),
            &config.net.base_path,
        )
        .await?,
    );

    let tables = Arc::new(RouteTables::standard()?);
    let mut tera = Tera::new(&config.site.templates)?;
    templatetags::register(&mut tera, site.clone(), tables.clone(), &config.site);

    let state = views::AppState {
        site,
        tables,
        tera: Arc::new(tera),
        config: Arc::new(config.site),
        proto_host: config.net.proto_host.clone(),
    };
    let app = views::router(state).layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.net.bind).await?;
    info!(bind = %config.net.bind, base_path = %config.net.base_path, "serving");
    axum::serve(listener, app).await?;

    Ok(())
}

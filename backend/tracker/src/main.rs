//! Loan tracker entry point.
//!
//! Serves the installment schedule of a ten-part personal loan from SQLite
//! behind a PIN-gated session, and lets the borrower mark installments paid
//! strictly in order.

mod api;
mod config;
mod db;
mod errors;
mod session;
mod verifier;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::EnvFilter;

use api::ApiState;
use config::Config;
use db::SqliteInstallmentStore;
use session::SessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    let verifier = verifier::from_config(&config)?;

    let state = Arc::new(ApiState {
        store: Arc::new(SqliteInstallmentStore::new(pool.clone())),
        sessions: SessionRegistry::new(pool, verifier.clone()),
        verifier,
        loan_terms: config.loan_terms,
    });
    let app = api::router(state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::sync::Arc;

use backend::{
    catchers::{bad_request, conflict, internal_error, not_found, unauthorized, unavailable, unprocessable},
    config::Config,
    cors::Cors,
    pg_store::PgStore,
    routes::{
        all_options, cast_vote, cast_vote_direct, create_candidate, delete_candidate, get_candidate,
        get_results, update_candidate, AppState,
    },
};
use rocket::{catchers, routes};
use shuttle_runtime::CustomError;
use sqlx::PgPool;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[shuttle_runtime::main]
async fn rocket(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secret_store: shuttle_runtime::SecretStore,
) -> shuttle_rocket::ShuttleRocket {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .try_init();

    info!("🚀 Starting vote server");

    let config = Config::from_secrets(&secret_store).map_err(CustomError::new)?;
    info!("⚙️ {} shards, snapshot every {}s", config.shard_count, config.snapshot_interval.as_secs());

    let store = Arc::new(PgStore::new(pool));
    store.migrate().await.map_err(CustomError::new)?;
    info!("📋 Migrations complete");

    let state = AppState::new(Arc::clone(&store), &config);

    // Publish a first generation before serving reads.
    if let Err(e) = state.snapshots.refresh().await {
        error!("Initial snapshot failed: {}", e);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    state.spawn_workers(&config, shutdown_rx);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Stopping background workers");
            let _ = shutdown_tx.send(true);
        }
    });

    let rocket = rocket::build()
        .attach(Cors::new(config.allowed_origin.clone()))
        .manage(state)
        .mount(
            "/api",
            routes![
                cast_vote,
                cast_vote_direct,
                get_results,
                get_candidate,
                create_candidate,
                update_candidate,
                delete_candidate,
                all_options
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                conflict,
                unprocessable,
                internal_error,
                unavailable
            ],
        );

    Ok(rocket.into())
}

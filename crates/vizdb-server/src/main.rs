use std::net::SocketAddr;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

mod auth;
mod charts;
mod dashboards;
mod datasources;
mod error;
mod queries;
mod state;
#[cfg(test)]
mod testutil;
mod users;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let state = AppState::new();

    let app = Router::new()
        .route("/health", get(health))
        .route("/api/users/register", post(users::register))
        .route("/api/users/login", post(users::login))
        .route("/api/users/profile", get(users::profile))
        .route("/api/users/all", get(users::all_users))
        .route("/api/users/role", put(users::update_role))
        .route("/api/users/:user_id", delete(users::delete_user))
        .route("/api/data/upload", post(datasources::upload))
        .route("/api/data", get(datasources::list))
        .route("/api/data/preview/:id", get(datasources::preview))
        .route("/api/data/:id", delete(datasources::remove))
        .route("/api/queries/run", post(queries::run_query))
        .route("/api/queries/:id", get(queries::get_query))
        .route("/api/charts/create", post(charts::create_chart))
        .route("/api/charts/list", get(charts::list_charts))
        .route(
            "/api/charts/:chart_id",
            get(charts::get_chart)
                .put(charts::update_chart)
                .delete(charts::delete_chart),
        )
        .route("/api/dashboard/save", post(dashboards::save_dashboard))
        .route("/api/dashboard/list", get(dashboards::list_dashboards))
        .route(
            "/api/dashboard/:id",
            get(dashboards::get_dashboard)
                .put(dashboards::update_dashboard)
                .delete(dashboards::delete_dashboard),
        )
        .route(
            "/api/dashboard/:id/chart/:chart_id",
            delete(dashboards::remove_chart_from_dashboard),
        )
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr: SocketAddr = std::env::var("VIZDB_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        .parse()?;
    println!("vizdb-server listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

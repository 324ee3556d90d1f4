//! HTTP admin server: shard health and Prometheus metrics.

use std::sync::Arc;

use actix_web::{
    App, HttpResponse, HttpServer, Responder, dev::Server, get, http::header::ContentType,
    middleware::Logger, web,
};
use serde::Serialize;
use tracing::warn;

use crate::model::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShardStatus {
    index: usize,
    healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthStatus {
    healthy: bool,
    sessions: usize,
    shards: Vec<ShardStatus>,
}

/// Healthy only when every shard answers a ping.
#[get("/healthz")]
async fn healthz(data: web::Data<AppState>) -> impl Responder {
    let shards: Vec<ShardStatus> = data
        .router
        .ping_all()
        .await
        .into_iter()
        .map(|h| ShardStatus {
            index: h.index,
            healthy: h.healthy,
            error: h.error,
        })
        .collect();
    let healthy = shards.iter().all(|s| s.healthy);

    let status = HealthStatus {
        healthy,
        sessions: data.sessions.count(),
        shards,
    };

    if healthy {
        HttpResponse::Ok().json(status)
    } else {
        warn!("Health check failed: shard unreachable");
        HttpResponse::ServiceUnavailable().json(status)
    }
}

#[get("/metrics")]
async fn metrics(data: web::Data<AppState>) -> impl Responder {
    match data.metrics.as_ref() {
        Some(handle) => HttpResponse::Ok()
            .content_type(ContentType::plaintext())
            .body(handle.render()),
        None => HttpResponse::NotFound().body("metrics recorder not installed"),
    }
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(healthz).service(metrics);
}

/// Creates and binds the admin HTTP server.
pub fn admin_server(
    app_state: Arc<AppState>,
    address: String,
    port: u16,
) -> Result<Server, std::io::Error> {
    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .configure(routes)
    })
    .bind((address, port))?
    .disable_signals()
    .run())
}

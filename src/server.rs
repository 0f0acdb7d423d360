use anyhow::{anyhow, Result};
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{get, routes, Build, Rocket, State};
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::db::Database;
use crate::mailbox::MailboxClient;
use crate::models::PoRecord;
use crate::views;

/// How far back a request-triggered refresh looks.
const SYNC_WINDOW_DAYS: u32 = 30;

pub struct ServerState {
    db: Mutex<Database>,
    mailbox: Option<MailboxClient>,
}

impl ServerState {
    pub fn new(db: Database, mailbox: Option<MailboxClient>) -> Self {
        Self {
            db: Mutex::new(db),
            mailbox,
        }
    }
}

#[derive(Serialize)]
pub struct PoListResponse {
    pub count: usize,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
    pub items: Vec<PoRecord>,
}

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub detail: String,
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    records: usize,
}

fn server_error(summary: &str, err: &anyhow::Error) -> Custom<Json<ApiError>> {
    Custom(
        Status::InternalServerError,
        Json(ApiError {
            error: summary.to_string(),
            detail: format!("{err:#}"),
        }),
    )
}

#[get("/health")]
async fn health_check(
    state: &State<Arc<ServerState>>,
) -> Result<Json<Health>, Custom<Json<ApiError>>> {
    let state = state.inner().clone();
    let records = rocket::tokio::task::spawn_blocking(move || -> Result<usize> {
        let db = state.db.lock().map_err(|_| anyhow!("store lock poisoned"))?;
        db.count_records()
    })
    .await
    .map_err(|e| server_error("Health check failed", &anyhow!(e)))?
    .map_err(|e| server_error("Health check failed", &e))?;

    Ok(Json(Health {
        status: "ok",
        records,
    }))
}

/// The query endpoint: refresh from the mailbox when one is configured,
/// then return the filtered record set. Upstream failure surfaces as a
/// structured error at a server-error status; nothing else in the chain
/// can fail user-visibly.
#[get("/pos?<search>")]
async fn get_pos(
    state: &State<Arc<ServerState>>,
    search: Option<String>,
) -> Result<Json<PoListResponse>, Custom<Json<ApiError>>> {
    let state = state.inner().clone();
    let result = rocket::tokio::task::spawn_blocking(move || -> Result<PoListResponse> {
        let db = state.db.lock().map_err(|_| anyhow!("store lock poisoned"))?;
        if let Some(mailbox) = &state.mailbox {
            mailbox.sync(&db, SYNC_WINDOW_DAYS, false)?;
        }
        let records = db.list_records()?;
        let items = views::filter_records(&records, search.as_deref().unwrap_or(""));
        Ok(PoListResponse {
            count: items.len(),
            generated_at: chrono::Utc::now().to_rfc3339(),
            items,
        })
    })
    .await
    .map_err(|e| server_error("Failed to load purchase orders", &anyhow!(e)))?;

    match result {
        Ok(body) => Ok(Json(body)),
        Err(e) => Err(server_error("Failed to load purchase orders", &e)),
    }
}

pub fn build_rocket(state: ServerState, port: u16) -> Rocket<Build> {
    let figment = rocket::Config::figment().merge(("port", port));
    rocket::custom(figment)
        .manage(Arc::new(state))
        .mount("/api", routes![health_check, get_pos])
}

//! Call history handlers

use crate::dto::{ApiResponse, CallHistoryItem, LedgerEntryResponse, PaginationParams};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use therapay_core::traits::{CallRepository, LedgerRepository};
use therapay_core::AppError;
use therapay_db::{PgCallRepository, PgLedgerRepository};
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// List calls a user participated in, newest first
///
/// GET /api/v1/calls/history/{user_id}
#[instrument(skip(pool))]
pub async fn call_history(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let user_id = path.into_inner();
    debug!(%user_id, page = query.page, "Listing call history");

    let repo = PgCallRepository::new(pool.get_ref().clone());
    let (calls, total) = repo
        .list_for_user(user_id, query.limit(), query.offset())
        .await?;

    let items: Vec<CallHistoryItem> = calls.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(items, total)))
}

/// List the ledger entries settling one call
///
/// GET /api/v1/calls/{call_cid}/ledger
#[instrument(skip(pool))]
pub async fn call_ledger(
    pool: web::Data<PgPool>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let call_cid = path.into_inner();

    let calls = PgCallRepository::new(pool.get_ref().clone());
    if calls.find_by_cid(&call_cid).await?.is_none() {
        return Err(AppError::NotFound(format!("call {}", call_cid)));
    }

    let repo = PgLedgerRepository::new(pool.get_ref().clone());
    let entries = repo.list_for_call(&call_cid).await?;

    let items: Vec<LedgerEntryResponse> = entries.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(items)))
}

/// Configure call routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/calls")
            .route("/history/{user_id}", web::get().to(call_history))
            .route("/{call_cid}/ledger", web::get().to(call_ledger)),
    );
}

//! Wallet and withdrawal handlers

use crate::dto::{
    ApiResponse, LedgerEntryResponse, PaginationParams, TopUpRequest, TopUpResponse,
    WithdrawalCreateRequest, WithdrawalProcessRequest, WithdrawalRejectRequest,
    WithdrawalResponse,
};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use therapay_core::traits::{LedgerRepository, WithdrawalRepository};
use therapay_core::AppError;
use therapay_db::{PgLedgerRepository, PgWithdrawalRepository};
use therapay_services::WalletService;
use tracing::{debug, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Credit a client's balance after a purchase
///
/// POST /api/v1/wallet/{user_id}/topup
#[instrument(skip(wallet, req))]
pub async fn top_up(
    wallet: web::Data<WalletService>,
    path: web::Path<Uuid>,
    req: web::Json<TopUpRequest>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let req = req.into_inner();
    debug!(%user_id, amount = %req.amount, "Processing top-up");

    let new_balance = wallet
        .top_up(user_id, req.amount, req.payment_ref)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(TopUpResponse {
        credited: req.amount,
        new_balance,
    })))
}

/// List a user's ledger entries, newest first
///
/// GET /api/v1/wallet/{user_id}/ledger
#[instrument(skip(pool))]
pub async fn list_ledger(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let user_id = path.into_inner();

    let repo = PgLedgerRepository::new(pool.get_ref().clone());
    let (entries, total) = repo
        .list_for_user(user_id, query.limit(), query.offset())
        .await?;

    let items: Vec<LedgerEntryResponse> = entries.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(items, total)))
}

/// Open a withdrawal request for a therapist
///
/// POST /api/v1/withdrawals
#[instrument(skip(wallet, req))]
pub async fn create_withdrawal(
    wallet: web::Data<WalletService>,
    req: web::Json<WithdrawalCreateRequest>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    debug!(therapist_id = %req.therapist_id, amount = %req.amount, "Requesting withdrawal");

    let request = wallet
        .request_withdrawal(req.therapist_id, req.amount)
        .await?;

    Ok(HttpResponse::Created().json(ApiResponse::success(WithdrawalResponse::from(request))))
}

/// Get one withdrawal request
///
/// GET /api/v1/withdrawals/{id}
#[instrument(skip(pool))]
pub async fn get_withdrawal(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let withdrawal_id = path.into_inner();

    let repo = PgWithdrawalRepository::new(pool.get_ref().clone());
    let request = repo
        .find_by_id(withdrawal_id)
        .await?
        .ok_or_else(|| AppError::WithdrawalNotFound(withdrawal_id.to_string()))?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(WithdrawalResponse::from(request))))
}

/// List a therapist's withdrawal requests, newest first
///
/// GET /api/v1/withdrawals/therapist/{therapist_id}
#[instrument(skip(pool))]
pub async fn list_withdrawals(
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse, AppError> {
    query.validate().map_err(|e| {
        warn!("Pagination validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let therapist_id = path.into_inner();

    let repo = PgWithdrawalRepository::new(pool.get_ref().clone());
    let (requests, total) = repo
        .list_for_therapist(therapist_id, query.limit(), query.offset())
        .await?;

    let items: Vec<WithdrawalResponse> = requests.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(query.paginate(items, total)))
}

/// Mark a pending withdrawal as paid out
///
/// POST /api/v1/withdrawals/{id}/process
#[instrument(skip(wallet, req))]
pub async fn process_withdrawal(
    wallet: web::Data<WalletService>,
    path: web::Path<Uuid>,
    req: web::Json<WithdrawalProcessRequest>,
) -> Result<HttpResponse, AppError> {
    let withdrawal_id = path.into_inner();

    let request = wallet
        .process_withdrawal(withdrawal_id, req.into_inner().payment_ref)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        WithdrawalResponse::from(request),
        "Withdrawal processed",
    )))
}

/// Reject a pending withdrawal and refund the locked amount
///
/// POST /api/v1/withdrawals/{id}/reject
#[instrument(skip(wallet, req))]
pub async fn reject_withdrawal(
    wallet: web::Data<WalletService>,
    path: web::Path<Uuid>,
    req: web::Json<WithdrawalRejectRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Rejection validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let withdrawal_id = path.into_inner();

    let request = wallet
        .reject_withdrawal(withdrawal_id, req.into_inner().reason)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::with_message(
        WithdrawalResponse::from(request),
        "Withdrawal rejected and refunded",
    )))
}

/// Configure wallet routes
pub fn configure_wallet(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wallet")
            .route("/{user_id}/topup", web::post().to(top_up))
            .route("/{user_id}/ledger", web::get().to(list_ledger)),
    );
}

/// Configure withdrawal routes
pub fn configure_withdrawals(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/withdrawals")
            .route("", web::post().to(create_withdrawal))
            .route("/therapist/{therapist_id}", web::get().to(list_withdrawals))
            .route("/{id}", web::get().to(get_withdrawal))
            .route("/{id}/process", web::post().to(process_withdrawal))
            .route("/{id}/reject", web::post().to(reject_withdrawal)),
    );
}

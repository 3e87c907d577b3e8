//! Call invite handlers
//!
//! REST surface over the in-memory invite staging store: the caller's app
//! stages an invite while the platform rings, the therapist's app polls for
//! it and clears it by id once handled.

use crate::dto::{ApiResponse, ClearInviteResponse, InviteResponse, StageInviteRequest};
use actix_web::{web, HttpResponse};
use sqlx::PgPool;
use therapay_core::traits::UserRepository;
use therapay_core::AppError;
use therapay_db::PgUserRepository;
use therapay_services::{constants::DEFAULT_RATE_PER_MINUTE, NotificationStage};
use tracing::{debug, instrument, warn};
use validator::Validate;

/// Stage a call invite for a therapist
///
/// POST /api/v1/notifications/invites
#[instrument(skip(pool, stage, req))]
pub async fn stage_invite(
    pool: web::Data<PgPool>,
    stage: web::Data<NotificationStage>,
    req: web::Json<StageInviteRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Invite validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let repo = PgUserRepository::new(pool.get_ref().clone());
    let therapist = repo
        .find_by_platform_id(&req.therapist_platform_id)
        .await?
        .ok_or_else(|| AppError::UserNotFound(req.therapist_platform_id.clone()))?;

    if !therapist.is_therapist() {
        return Err(AppError::Validation(
            "Invites can only target therapists".to_string(),
        ));
    }

    let rate = therapist.rate_per_minute.unwrap_or(DEFAULT_RATE_PER_MINUTE);

    let invite = stage.stage(
        &req.call_cid,
        req.call_mode,
        &req.caller_name,
        &req.caller_platform_id,
        &req.therapist_platform_id,
        rate,
    );

    debug!(invite_id = %invite.id, "Invite staged");
    Ok(HttpResponse::Created().json(ApiResponse::success(InviteResponse::from(invite))))
}

/// Fetch the pending invite for a therapist, if any
///
/// GET /api/v1/notifications/invites/{therapist_platform_id}
#[instrument(skip(stage))]
pub async fn pending_invite(
    stage: web::Data<NotificationStage>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let therapist_platform_id = path.into_inner();

    let invite = stage
        .pending_for(&therapist_platform_id)
        .map(InviteResponse::from);

    Ok(HttpResponse::Ok().json(ApiResponse::success(invite)))
}

/// Clear a handled invite by id
///
/// DELETE /api/v1/notifications/invites/{therapist_platform_id}/{invite_id}
///
/// The id must match the currently staged invite; a stale clear for a
/// superseded invite reports `cleared: false` and leaves the newer one alone.
#[instrument(skip(stage))]
pub async fn clear_invite(
    stage: web::Data<NotificationStage>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, AppError> {
    let (therapist_platform_id, invite_id) = path.into_inner();

    let cleared = stage.clear(&therapist_platform_id, &invite_id);

    Ok(HttpResponse::Ok().json(ApiResponse::success(ClearInviteResponse { cleared })))
}

/// Configure notification routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .route("/invites", web::post().to(stage_invite))
            .route("/invites/{therapist_platform_id}", web::get().to(pending_invite))
            .route(
                "/invites/{therapist_platform_id}/{invite_id}",
                web::delete().to(clear_invite),
            ),
    );
}

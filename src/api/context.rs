use std::collections::HashSet;

use actix_web::{HttpMessage, HttpRequest, web};

use crate::{
    api::middleware::CorrelationId,
    app_state::AppState,
    database::models::{session, user},
    errors::AppError,
    services::{
        auth::{self, SESSION_COOKIE},
        permissions::{self, Permission},
    },
};

/// The logged-in user behind the current request.
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub session: session::Model,
    pub user: user::Model,
    pub permissions: HashSet<String>,
}

impl SessionContext {
    pub fn user_id(&self) -> i64 {
        self.user.id
    }

    pub fn is_verified(&self) -> bool {
        self.user.email_verified_at.is_some()
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.permissions.contains(permission.as_str())
    }
}

/// Session id from the cookie, if the request carries one.
pub fn session_id(req: &HttpRequest) -> Option<String> {
    req.cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|value| !value.is_empty())
}

pub async fn resolve_session_context(
    req: &HttpRequest,
    app_state: &web::Data<AppState>,
) -> Result<SessionContext, AppError> {
    let session_id = session_id(req).ok_or(AppError::Unauthenticated)?;

    let (session, user) = auth::find_active_session(&app_state.db, &session_id)
        .await?
        .ok_or(AppError::Unauthenticated)?;

    let permissions = permissions::permissions_for_user(&app_state.db, user.id).await?;

    Ok(SessionContext {
        session,
        user,
        permissions,
    })
}

/// Resolves the session only when one is present and still valid.
pub async fn optional_session_context(
    req: &HttpRequest,
    app_state: &web::Data<AppState>,
) -> Result<Option<SessionContext>, AppError> {
    match resolve_session_context(req, app_state).await {
        Ok(ctx) => Ok(Some(ctx)),
        Err(AppError::Unauthenticated) => Ok(None),
        Err(e) => Err(e),
    }
}

pub fn ensure_verified(ctx: &SessionContext) -> Result<(), AppError> {
    if ctx.is_verified() {
        Ok(())
    } else {
        Err(AppError::Unverified)
    }
}

pub fn ensure_permission(ctx: &SessionContext, permission: Permission) -> Result<(), AppError> {
    if ctx.can(permission) {
        Ok(())
    } else {
        log::warn!(
            "user {} denied permission {}",
            ctx.user.id,
            permission
        );
        Err(AppError::Forbidden(format!(
            "Permission `{}` required",
            permission
        )))
    }
}

pub async fn resolve_verified_context(
    req: &HttpRequest,
    app_state: &web::Data<AppState>,
) -> Result<SessionContext, AppError> {
    let ctx = resolve_session_context(req, app_state).await?;
    ensure_verified(&ctx)?;
    Ok(ctx)
}

/// Authenticated, verified, and holding `permission`.
pub async fn authorize(
    req: &HttpRequest,
    app_state: &web::Data<AppState>,
    permission: Permission,
) -> Result<SessionContext, AppError> {
    let ctx = resolve_verified_context(req, app_state).await?;
    if let Err(e) = ensure_permission(&ctx, permission) {
        if let Some(CorrelationId(id)) = req.extensions().get::<CorrelationId>() {
            log::warn!("request_id={} {} {} forbidden", id, req.method(), req.path());
        }
        return Err(e);
    }
    Ok(ctx)
}

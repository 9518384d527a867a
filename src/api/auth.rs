//! Login, registration, logout and email verification pages.

use actix_web::{HttpRequest, HttpResponse, get, http::StatusCode, post, web};
use sea_orm::TransactionTrait;
use serde::Deserialize;

use crate::{
    api::{
        context::{optional_session_context, resolve_session_context},
        helpers::{expired_session_cookie, redirect, see_other, session_cookie},
        validation::{FieldErrors, normalize_email, password_rules, require_email, require_string},
    },
    app_state::AppState,
    errors::AppError,
    services::auth::{self, NewUser},
    views::{self, auth as pages},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

fn app_name(data: &AppState) -> &str {
    data.config.effective_app_name()
}

/// Starts a session for `user_id` and sends the browser to the dashboard.
async fn log_in(data: &AppState, user_id: i64) -> Result<HttpResponse, AppError> {
    let session = auth::start_session(&data.db, user_id, data.config.effective_session_ttl()).await?;
    let mut response = see_other("/dashboard");
    response
        .add_cookie(&session_cookie(&session.id, &data.config))
        .map_err(|e| {
            log::error!("could not set session cookie: {}", e);
            AppError::Internal
        })?;
    Ok(response)
}

#[get("/login")]
async fn login_form(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    if optional_session_context(&req, &data).await?.is_some() {
        return Ok(redirect("/dashboard"));
    }
    Ok(views::html(
        StatusCode::OK,
        pages::login_page(app_name(&data), "", &FieldErrors::new()),
    ))
}

#[post("/login")]
async fn login(data: web::Data<AppState>, form: web::Form<LoginForm>) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let email = normalize_email(&form.email);

    let mut errors = FieldErrors::new();
    require_email(&mut errors, "email", &email);
    if form.password.is_empty() {
        errors.add("password", "The password field is required.");
    }

    if errors.is_empty() {
        match auth::find_user_by_email(&data.db, &email).await? {
            Some(account) if auth::verify_password(&form.password, &account.password_hash) => {
                log::info!("user {} logged in", account.id);
                return log_in(&data, account.id).await;
            }
            _ => {
                log::warn!("failed login for {}", email);
                errors.add("email", "These credentials do not match our records.");
            }
        }
    }

    Ok(views::html(
        StatusCode::UNPROCESSABLE_ENTITY,
        pages::login_page(app_name(&data), &email, &errors),
    ))
}

#[get("/register")]
async fn register_form(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    if optional_session_context(&req, &data).await?.is_some() {
        return Ok(redirect("/dashboard"));
    }
    Ok(views::html(
        StatusCode::OK,
        pages::register_page(app_name(&data), "", "", &FieldErrors::new()),
    ))
}

#[post("/register")]
async fn register(data: web::Data<AppState>, form: web::Form<RegisterForm>) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let name = form.name.trim().to_string();
    let email = normalize_email(&form.email);

    let mut errors = FieldErrors::new();
    require_string(&mut errors, "name", &name);
    require_email(&mut errors, "email", &email);
    if !errors.has("email") && auth::email_taken(&data.db, &email, None).await? {
        errors.add("email", "The email has already been taken.");
    }
    password_rules(&mut errors, "password", &form.password, &form.password_confirmation);

    if !errors.is_empty() {
        return Ok(views::html(
            StatusCode::UNPROCESSABLE_ENTITY,
            pages::register_page(app_name(&data), &name, &email, &errors),
        ));
    }

    let password_hash = auth::hash_password(&form.password)?;
    let txn = data.db.begin().await?;
    let account = auth::create_user(
        &txn,
        NewUser {
            name: &name,
            email: &email,
            password: &form.password,
            verified: false,
        },
        password_hash,
    )
    .await?;
    let account_id = account.id;
    auth::issue_verification_token(&txn, account).await?;
    txn.commit().await?;

    log::info!("user {} registered", account_id);
    log_in(&data, account_id).await
}

#[post("/logout")]
async fn logout(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let ctx = resolve_session_context(&req, &data).await?;
    auth::end_session(&data.db, &ctx.session.id).await?;
    log::info!("user {} logged out", ctx.user_id());

    let mut response = see_other("/");
    response
        .add_removal_cookie(&expired_session_cookie())
        .map_err(|e| {
            log::error!("could not clear session cookie: {}", e);
            AppError::Internal
        })?;
    Ok(response)
}

#[get("/verify-email")]
async fn verification_notice(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_session_context(&req, &data).await?;
    if ctx.is_verified() {
        return Ok(redirect("/dashboard"));
    }
    Ok(views::html(
        StatusCode::OK,
        pages::verify_notice_page(app_name(&data), &ctx.user, query.status.as_deref()),
    ))
}

#[get("/verify-email/{id}/{token}")]
async fn verify_email(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(i64, String)>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_session_context(&req, &data).await?;
    let (id, token) = path.into_inner();
    if ctx.user_id() != id {
        return Err(AppError::Forbidden("Verification link belongs to another user".into()));
    }

    let user_id = ctx.user_id();
    if !auth::verify_email(&data.db, ctx.user, &token).await? {
        log::warn!("user {} used an invalid verification link", user_id);
        return Err(AppError::Forbidden("Invalid verification link".into()));
    }

    log::info!("user {} verified their email", user_id);
    Ok(see_other("/dashboard?verified=1"))
}

#[post("/email/verification-notification")]
async fn resend_verification(req: HttpRequest, data: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let ctx = resolve_session_context(&req, &data).await?;
    if ctx.is_verified() {
        return Ok(see_other("/dashboard"));
    }
    auth::issue_verification_token(&data.db, ctx.user).await?;
    Ok(see_other("/verify-email?status=verification-link-sent"))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(login_form)
        .service(login)
        .service(register_form)
        .service(register)
        .service(logout)
        .service(verification_notice)
        .service(verify_email)
        .service(resend_verification);
}

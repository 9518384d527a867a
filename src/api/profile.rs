//! The signed-in user's own account: details, password and deletion.

use actix_web::{HttpRequest, HttpResponse, delete, get, http::StatusCode, patch, put, web};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, ModelTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::Deserialize;

use crate::{
    api::{
        auth::StatusQuery,
        context::{SessionContext, resolve_session_context},
        helpers::{expired_session_cookie, see_other},
        validation::{FieldErrors, normalize_email, password_rules, require_email, require_string},
    },
    app_state::AppState,
    database::models::{reporte, user_role},
    errors::AppError,
    services::auth,
    views::{
        self,
        profile::{ProfilePage, profile_page},
    },
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PasswordForm {
    pub current_password: String,
    pub password: String,
    pub password_confirmation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeleteAccountForm {
    pub password: String,
}

/// Normalizes the submitted profile fields and validates them against the
/// other accounts. Returns the cleaned name and email with any errors found.
pub async fn validate_profile<C>(
    db: &C,
    user_id: i64,
    form: &ProfileForm,
) -> Result<(String, String, FieldErrors), AppError>
where
    C: sea_orm::ConnectionTrait,
{
    let name = form.name.trim().to_string();
    let email = normalize_email(&form.email);

    let mut errors = FieldErrors::new();
    require_string(&mut errors, "name", &name);
    require_email(&mut errors, "email", &email);
    if !errors.has("email") && auth::email_taken(db, &email, Some(user_id)).await? {
        errors.add("email", "The email has already been taken.");
    }
    Ok((name, email, errors))
}

fn render(data: &AppState, page: &ProfilePage<'_>, status: StatusCode) -> HttpResponse {
    views::html(status, profile_page(data.config.effective_app_name(), page))
}

#[get("/profile")]
async fn edit_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<StatusQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_session_context(&req, &data).await?;
    let empty = FieldErrors::new();
    let page = ProfilePage::for_account(&ctx.user, query.status.as_deref(), &empty);
    Ok(render(&data, &page, StatusCode::OK))
}

#[patch("/profile")]
async fn update_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse, AppError> {
    let SessionContext { user: account, .. } = resolve_session_context(&req, &data).await?;
    let (name, email, errors) = validate_profile(&data.db, account.id, &form).await?;

    if !errors.is_empty() {
        let empty = FieldErrors::new();
        let page = ProfilePage {
            name: &name,
            email: &email,
            profile_errors: &errors,
            ..ProfilePage::for_account(&account, None, &empty)
        };
        return Ok(render(&data, &page, StatusCode::UNPROCESSABLE_ENTITY));
    }

    let email_changed = email != account.email;
    let user_id = account.id;
    let mut active = account.into_active_model();
    active.name = Set(name);
    active.email = Set(email);
    if email_changed {
        active.email_verified_at = Set(None);
        active.verification_token = Set(None);
    }
    active.updated_at = Set(Utc::now());
    active.update(&data.db).await?;

    log::info!("user {} updated their profile (email changed: {})", user_id, email_changed);
    Ok(see_other("/profile?status=profile-updated"))
}

#[put("/password")]
async fn update_password(
    req: HttpRequest,
    data: web::Data<AppState>,
    form: web::Form<PasswordForm>,
) -> Result<HttpResponse, AppError> {
    let SessionContext { user: account, .. } = resolve_session_context(&req, &data).await?;
    let form = form.into_inner();

    let mut errors = FieldErrors::new();
    if form.current_password.is_empty() {
        errors.add("current_password", "The current_password field is required.");
    } else if !auth::verify_password(&form.current_password, &account.password_hash) {
        errors.add("current_password", "The password is incorrect.");
    }
    password_rules(&mut errors, "password", &form.password, &form.password_confirmation);

    if !errors.is_empty() {
        let empty = FieldErrors::new();
        let page = ProfilePage {
            password_errors: &errors,
            ..ProfilePage::for_account(&account, None, &empty)
        };
        return Ok(render(&data, &page, StatusCode::UNPROCESSABLE_ENTITY));
    }

    let user_id = account.id;
    let mut active = account.into_active_model();
    active.password_hash = Set(auth::hash_password(&form.password)?);
    active.updated_at = Set(Utc::now());
    active.update(&data.db).await?;

    log::info!("user {} changed their password", user_id);
    Ok(see_other("/profile?status=password-updated"))
}

#[delete("/profile")]
async fn destroy_profile(
    req: HttpRequest,
    data: web::Data<AppState>,
    form: web::Form<DeleteAccountForm>,
) -> Result<HttpResponse, AppError> {
    let SessionContext { user: account, .. } = resolve_session_context(&req, &data).await?;

    if !auth::verify_password(&form.password, &account.password_hash) {
        let mut errors = FieldErrors::new();
        errors.add("password", "The password is incorrect.");
        let empty = FieldErrors::new();
        let page = ProfilePage {
            deletion_errors: &errors,
            ..ProfilePage::for_account(&account, None, &empty)
        };
        return Ok(render(&data, &page, StatusCode::UNPROCESSABLE_ENTITY));
    }

    let user_id = account.id;
    let txn = data.db.begin().await?;
    auth::end_all_sessions(&txn, user_id).await?;
    user_role::Entity::delete_many()
        .filter(user_role::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;
    reporte::Entity::delete_many()
        .filter(reporte::Column::GeneratedBy.eq(user_id))
        .exec(&txn)
        .await?;
    account.delete(&txn).await?;
    txn.commit().await?;

    log::info!("user {} deleted their account", user_id);
    let mut response = see_other("/");
    response
        .add_removal_cookie(&expired_session_cookie())
        .map_err(|e| {
            log::error!("could not clear session cookie: {}", e);
            AppError::Internal
        })?;
    Ok(response)
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(edit_profile)
        .service(update_profile)
        .service(update_password)
        .service(destroy_profile);
}

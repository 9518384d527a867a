use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, QueryFilter, Set,
    sea_query::{Expr, Func},
};
use uuid::Uuid;

use crate::{
    api::validation::normalize_email,
    database::models::{session, user},
    errors::AppError,
};

pub const SESSION_COOKIE: &str = "session_id";

pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password: &'a str,
    pub verified: bool,
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash_password_with_cost(password, bcrypt::DEFAULT_COST)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, cost)?)
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// True when another user already owns `email`, compared case-insensitively.
pub async fn email_taken<C>(db: &C, email: &str, except_user_id: Option<i64>) -> Result<bool, AppError>
where
    C: ConnectionTrait,
{
    let mut query = user::Entity::find()
        .filter(Expr::expr(Func::lower(Expr::col(user::Column::Email))).eq(normalize_email(email)));
    if let Some(id) = except_user_id {
        query = query.filter(user::Column::Id.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

pub async fn find_user_by_email<C>(db: &C, email: &str) -> Result<Option<user::Model>, AppError>
where
    C: ConnectionTrait,
{
    Ok(user::Entity::find()
        .filter(Expr::expr(Func::lower(Expr::col(user::Column::Email))).eq(normalize_email(email)))
        .one(db)
        .await?)
}

pub async fn create_user<C>(db: &C, new_user: NewUser<'_>, password_hash: String) -> Result<user::Model, AppError>
where
    C: ConnectionTrait,
{
    let email = normalize_email(new_user.email);
    if email_taken(db, &email, None).await? {
        return Err(AppError::Conflict(format!("User with email {} already exists", email)));
    }

    let now = Utc::now();
    let created = user::ActiveModel {
        name: Set(new_user.name.trim().to_string()),
        email: Set(email),
        password_hash: Set(password_hash),
        email_verified_at: Set(new_user.verified.then_some(now)),
        verification_token: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    log::info!("user {} created (id={})", created.email, created.id);
    Ok(created)
}

pub async fn start_session<C>(db: &C, user_id: i64, ttl: chrono::Duration) -> Result<session::Model, AppError>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let model = session::Model {
        id: Uuid::new_v4().to_string(),
        user_id,
        created_at: now,
        last_used_at: Some(now),
        expires_at: now + ttl,
    };

    session::Entity::insert(session::ActiveModel {
        id: Set(model.id.clone()),
        user_id: Set(model.user_id),
        created_at: Set(model.created_at),
        last_used_at: Set(model.last_used_at),
        expires_at: Set(model.expires_at),
    })
    .exec_without_returning(db)
    .await?;

    Ok(model)
}

/// Resolves a live session to its user and touches `last_used_at`.
pub async fn find_active_session<C>(db: &C, session_id: &str) -> Result<Option<(session::Model, user::Model)>, AppError>
where
    C: ConnectionTrait,
{
    let Some(found) = session::Entity::find_by_id(session_id.to_string())
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    let now = Utc::now();
    if found.expires_at <= now {
        log::debug!("session {} expired", found.id);
        session::Entity::delete_by_id(found.id.clone()).exec(db).await?;
        return Ok(None);
    }

    let Some(owner) = user::Entity::find_by_id(found.user_id).one(db).await? else {
        return Ok(None);
    };

    let mut active = found.into_active_model();
    active.last_used_at = Set(Some(now));
    let touched = active.update(db).await?;

    Ok(Some((touched, owner)))
}

pub async fn end_session<C>(db: &C, session_id: &str) -> Result<(), AppError>
where
    C: ConnectionTrait,
{
    session::Entity::delete_by_id(session_id.to_string())
        .exec(db)
        .await?;
    Ok(())
}

pub async fn end_all_sessions<C>(db: &C, user_id: i64) -> Result<u64, AppError>
where
    C: ConnectionTrait,
{
    let result = session::Entity::delete_many()
        .filter(session::Column::UserId.eq(user_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Stores a fresh verification token and logs the link in place of sending mail.
pub async fn issue_verification_token<C>(db: &C, account: user::Model) -> Result<String, AppError>
where
    C: ConnectionTrait,
{
    let token = Uuid::new_v4().simple().to_string();
    let user_id = account.id;
    let email = account.email.clone();

    let mut active = account.into_active_model();
    active.verification_token = Set(Some(token.clone()));
    active.update(db).await?;

    log::info!(
        "verification link for {}: /verify-email/{}/{}",
        email,
        user_id,
        token
    );
    Ok(token)
}

/// Marks the address verified when `token` matches the stored one.
pub async fn verify_email<C>(db: &C, account: user::Model, token: &str) -> Result<bool, AppError>
where
    C: ConnectionTrait,
{
    if account.email_verified_at.is_some() {
        return Ok(true);
    }
    match account.verification_token.as_deref() {
        Some(stored) if stored == token => {
            let mut active = account.into_active_model();
            let now = Utc::now();
            active.email_verified_at = Set(Some(now));
            active.verification_token = Set(None);
            active.updated_at = Set(now);
            active.update(db).await?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

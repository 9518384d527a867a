use actix_web::{
    HttpResponse,
    cookie::{Cookie, SameSite, time::Duration as CookieDuration},
    http::header,
};
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{config::Config, errors::AppError, services::auth::SESSION_COOKIE};

pub const DEFAULT_PER_PAGE: u64 = 15;
pub const MAX_PER_PAGE: u64 = 100;

/// 303 to `location`, the answer to a successful form post.
pub fn see_other(location: &str) -> HttpResponse {
    HttpResponse::SeeOther()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn redirect(location: &str) -> HttpResponse {
    HttpResponse::Found()
        .insert_header((header::LOCATION, location))
        .finish()
}

pub fn session_cookie(session_id: &str, config: &Config) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, session_id.to_string())
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure_cookies.unwrap_or(false))
        .max_age(CookieDuration::minutes(
            config.effective_session_ttl().num_minutes(),
        ))
        .finish()
}

pub fn expired_session_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build(SESSION_COOKIE, "").path("/").finish();
    cookie.make_removal();
    cookie
}

/// For `Option<Option<T>>` update fields: a present key, even `null`, becomes `Some`.
/// Pair with `#[serde(default)]` so a missing key stays `None`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    /// Page number (default: 1)
    pub page: Option<u64>,
    /// Items per page (default: 15, max: 100)
    pub per_page: Option<u64>,
    /// Substring search on the main text columns
    pub search: Option<String>,
}

impl ListQuery {
    /// `(page, per_page)` with page starting at 1.
    pub fn pagination(&self) -> Result<(u64, u64), AppError> {
        let page = self.page.unwrap_or(1);
        let per_page = self.per_page.unwrap_or(DEFAULT_PER_PAGE);
        if page == 0 || per_page == 0 || per_page > MAX_PER_PAGE {
            return Err(AppError::InvalidInput("Invalid pagination parameters".into()));
        }
        // The row offset must fit the SQL BIGINT the database binds it as.
        let offset = (page - 1).checked_mul(per_page);
        if offset.is_none_or(|offset| offset > i64::MAX as u64) {
            return Err(AppError::InvalidInput("Page number is out of range".into()));
        }
        Ok((page, per_page))
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// One page of an index listing.
#[derive(Debug, Serialize, ToSchema)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

pub fn last_page(total: u64, per_page: u64) -> u64 {
    total.div_ceil(per_page).max(1)
}

pub async fn paginate<'db, C, E>(
    db: &'db C,
    select: Select<E>,
    page: u64,
    per_page: u64,
) -> Result<Paginated<E::Model>, AppError>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Send + Sync + 'db,
{
    let paginator = select.paginate(db, per_page);
    let total = paginator.num_items().await?;
    let data = paginator.fetch_page(page - 1).await?;
    Ok(Paginated {
        data,
        page,
        per_page,
        total,
        last_page: last_page(total, per_page),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_bounds() {
        let query = ListQuery { page: None, per_page: None, search: Some("  ".into()) };
        assert_eq!(query.pagination().unwrap(), (1, DEFAULT_PER_PAGE));
        assert_eq!(query.search_term(), None);

        let query = ListQuery { page: Some(0), per_page: None, search: None };
        assert!(query.pagination().is_err());

        let query = ListQuery { page: Some(2), per_page: Some(101), search: None };
        assert!(query.pagination().is_err());
    }

    #[test]
    fn huge_page_numbers_are_rejected() {
        let query = ListQuery { page: Some(u64::MAX), per_page: Some(100), search: None };
        assert!(matches!(query.pagination(), Err(AppError::InvalidInput(_))));

        let last_fitting = i64::MAX as u64 / 100 + 1;
        let query = ListQuery { page: Some(last_fitting), per_page: Some(100), search: None };
        assert_eq!(query.pagination().unwrap(), (last_fitting, 100));
    }

    #[test]
    fn last_page_is_never_zero() {
        assert_eq!(last_page(0, 15), 1);
        assert_eq!(last_page(15, 15), 1);
        assert_eq!(last_page(16, 15), 2);
    }

    #[test]
    fn removal_cookie_clears_the_session() {
        let cookie = expired_session_cookie();
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}

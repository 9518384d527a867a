use actix_web::{HttpRequest, HttpResponse, delete, get, post, route, web};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, IntoActiveModel,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    api::{
        context::authorize,
        helpers::{ListQuery, Paginated, paginate},
        validation::{FieldErrors, clean_opt, non_negative, require_string},
    },
    app_state::AppState,
    database::models::{orden_trabajo, servicio},
    errors::AppError,
    services::permissions::Permission,
};

// --- DTOs ---

#[derive(Deserialize, ToSchema, Clone)]
pub struct CreateServicioDto {
    pub name: String,
    pub description: Option<String>,
    #[schema(value_type = String, example = "120.00")]
    pub price: Decimal,
    #[schema(value_type = String, example = "1.50")]
    pub duration_hours: Decimal,
    pub status: Option<bool>,
}

#[derive(Deserialize, ToSchema, Clone, Default)]
pub struct UpdateServicioDto {
    pub name: Option<String>,
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[schema(value_type = Option<String>)]
    pub duration_hours: Option<Decimal>,
    pub status: Option<bool>,
}

pub(crate) async fn find_servicio<C: ConnectionTrait>(db: &C, id: i64) -> Result<servicio::Model, AppError> {
    servicio::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Servicio with id {} not found", id)))
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/servicios",
    tag = "Servicios",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated services", body = Paginated<servicio::Model>),
        (status = 403, description = "Missing servicios.ver")
    )
)]
#[get("")]
async fn list_servicios(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ServiciosVer).await?;
    let (page, per_page) = query.pagination()?;

    let mut select = servicio::Entity::find().order_by_asc(servicio::Column::Name);
    if let Some(term) = query.search_term() {
        select = select.filter(
            Condition::any()
                .add(servicio::Column::Name.contains(term))
                .add(servicio::Column::Description.contains(term)),
        );
    }

    Ok(HttpResponse::Ok().json(paginate(&data.db, select, page, per_page).await?))
}

#[utoipa::path(
    post,
    path = "/servicios",
    tag = "Servicios",
    request_body = CreateServicioDto,
    responses(
        (status = 201, description = "Service created", body = servicio::Model),
        (status = 422, description = "Validation failed")
    )
)]
#[post("")]
async fn create_servicio(
    req: HttpRequest,
    data: web::Data<AppState>,
    dto: web::Json<CreateServicioDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ServiciosCrear).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let name = dto.name.trim().to_string();
    require_string(&mut errors, "name", &name);
    non_negative(&mut errors, "price", dto.price);
    non_negative(&mut errors, "duration_hours", dto.duration_hours);
    errors.into_result()?;

    let now = Utc::now();
    let created = servicio::ActiveModel {
        name: Set(name),
        description: Set(clean_opt(dto.description)),
        price: Set(dto.price.round_dp(2)),
        duration_hours: Set(dto.duration_hours.round_dp(2)),
        status: Set(dto.status.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&data.db)
    .await?;

    log::info!("servicio {} created", created.id);
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/servicios/{servicio}",
    tag = "Servicios",
    params(("servicio" = i64, Path, description = "Service ID")),
    responses(
        (status = 200, description = "Service found", body = servicio::Model),
        (status = 404, description = "Service not found")
    )
)]
#[get("/{servicio}")]
async fn get_servicio(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ServiciosVer).await?;
    let found = find_servicio(&data.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    method(put, patch),
    path = "/servicios/{servicio}",
    tag = "Servicios",
    params(("servicio" = i64, Path, description = "Service ID")),
    request_body = UpdateServicioDto,
    responses(
        (status = 200, description = "Service updated", body = servicio::Model),
        (status = 404, description = "Service not found"),
        (status = 422, description = "Validation failed")
    )
)]
#[route("/{servicio}", method = "PUT", method = "PATCH")]
async fn update_servicio(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<UpdateServicioDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ServiciosEditar).await?;
    let existing = find_servicio(&data.db, path.into_inner()).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let mut active = existing.into_active_model();

    if let Some(name) = dto.name {
        let name = name.trim().to_string();
        require_string(&mut errors, "name", &name);
        active.name = Set(name);
    }
    if dto.description.is_some() {
        active.description = Set(clean_opt(dto.description));
    }
    if let Some(price) = dto.price {
        non_negative(&mut errors, "price", price);
        active.price = Set(price.round_dp(2));
    }
    if let Some(hours) = dto.duration_hours {
        non_negative(&mut errors, "duration_hours", hours);
        active.duration_hours = Set(hours.round_dp(2));
    }
    if let Some(status) = dto.status {
        active.status = Set(status);
    }
    errors.into_result()?;

    active.updated_at = Set(Utc::now());
    let updated = active.update(&data.db).await?;
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/servicios/{servicio}",
    tag = "Servicios",
    params(("servicio" = i64, Path, description = "Service ID")),
    responses(
        (status = 204, description = "Service deleted"),
        (status = 404, description = "Service not found"),
        (status = 409, description = "Service is referenced by work orders")
    )
)]
#[delete("/{servicio}")]
async fn delete_servicio(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ServiciosEliminar).await?;
    let found = find_servicio(&data.db, path.into_inner()).await?;

    let orders = found.find_related(orden_trabajo::Entity).count(&data.db).await?;
    if orders > 0 {
        return Err(AppError::Conflict(format!(
            "Servicio {} is used by {} work orders",
            found.id, orders
        )));
    }

    let id = found.id;
    found.delete(&data.db).await?;
    log::info!("servicio {} deleted", id);
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/servicios")
            .service(list_servicios)
            .service(create_servicio)
            .service(get_servicio)
            .service(update_servicio)
            .service(delete_servicio),
    );
}

use actix_web::{HttpRequest, HttpResponse, delete, get, post, route, web};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, IntoActiveModel, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::{
    api::{
        context::authorize,
        helpers::{ListQuery, Paginated, nullable, paginate},
        validation::{FieldErrors, clean_opt, non_negative},
    },
    app_state::AppState,
    database::{
        models::{cliente, empleado, orden_trabajo, servicio, vehiculo},
        types::WorkOrderStatus,
    },
    errors::AppError,
    services::permissions::Permission,
};

// --- DTOs ---

#[derive(Deserialize, ToSchema, Clone)]
pub struct CreateOrdenDto {
    pub cliente_id: i64,
    pub vehiculo_id: i64,
    pub empleado_id: i64,
    pub servicio_id: i64,
    pub description: Option<String>,
    /// Defaults to `pendiente`
    #[schema(example = "pendiente")]
    pub status: Option<String>,
    /// Defaults to the service price
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<Decimal>,
    #[schema(value_type = String, format = Date)]
    pub start_date: NaiveDate,
    #[schema(value_type = Option<String>, format = Date)]
    pub end_date: Option<NaiveDate>,
}

#[derive(Deserialize, ToSchema, Clone, Default)]
pub struct UpdateOrdenDto {
    pub cliente_id: Option<i64>,
    pub vehiculo_id: Option<i64>,
    pub empleado_id: Option<i64>,
    pub servicio_id: Option<i64>,
    pub description: Option<String>,
    pub status: Option<String>,
    #[schema(value_type = Option<String>)]
    pub total_amount: Option<Decimal>,
    #[schema(value_type = Option<String>, format = Date)]
    pub start_date: Option<NaiveDate>,
    /// Absent keeps the stored date, `null` clears it (reopening the order).
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>, format = Date)]
    pub end_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrdenListQuery {
    /// Page number (default: 1)
    pub page: Option<u64>,
    /// Items per page (default: 15, max: 100)
    pub per_page: Option<u64>,
    /// Substring search on the description
    pub search: Option<String>,
    /// One of pendiente, en_proceso, completada, cancelada
    pub status: Option<String>,
}

/// Foreign keys of an order once the update is merged over the stored row.
struct OrderLinks {
    cliente_id: i64,
    vehiculo_id: i64,
    empleado_id: i64,
    servicio_id: i64,
}

fn parse_status(errors: &mut FieldErrors, raw: Option<&str>) -> Option<WorkOrderStatus> {
    let raw = raw?;
    match raw.parse::<WorkOrderStatus>() {
        Ok(status) => Some(status),
        Err(_) => {
            errors.add("status", "The selected status is invalid.");
            None
        }
    }
}

fn check_dates(errors: &mut FieldErrors, start: NaiveDate, end: Option<NaiveDate>) {
    if let Some(end) = end {
        if end < start {
            errors.add(
                "end_date",
                "The end_date field must be a date after or equal to start_date.",
            );
        }
    }
}

/// Every referenced row must exist and the vehicle must belong to the client.
/// Returns the service so its price can serve as the default total.
async fn check_links<C: ConnectionTrait>(
    db: &C,
    errors: &mut FieldErrors,
    links: &OrderLinks,
) -> Result<Option<servicio::Model>, AppError> {
    if cliente::Entity::find_by_id(links.cliente_id).one(db).await?.is_none() {
        errors.add("cliente_id", "The selected cliente_id is invalid.");
    }
    match vehiculo::Entity::find_by_id(links.vehiculo_id).one(db).await? {
        None => errors.add("vehiculo_id", "The selected vehiculo_id is invalid."),
        Some(v) if v.cliente_id != links.cliente_id => {
            errors.add("vehiculo_id", "The selected vehicle does not belong to the client.")
        }
        Some(_) => {}
    }
    if empleado::Entity::find_by_id(links.empleado_id).one(db).await?.is_none() {
        errors.add("empleado_id", "The selected empleado_id is invalid.");
    }
    let service = servicio::Entity::find_by_id(links.servicio_id).one(db).await?;
    if service.is_none() {
        errors.add("servicio_id", "The selected servicio_id is invalid.");
    }
    Ok(service)
}

async fn find_orden<C: ConnectionTrait>(db: &C, id: i64) -> Result<orden_trabajo::Model, AppError> {
    orden_trabajo::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Orden with id {} not found", id)))
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/ordenes",
    tag = "Ordenes",
    params(OrdenListQuery),
    responses(
        (status = 200, description = "Paginated work orders, newest first", body = Paginated<orden_trabajo::Model>),
        (status = 403, description = "Missing ordenes.ver"),
        (status = 422, description = "Unknown status filter")
    )
)]
#[get("")]
async fn list_ordenes(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<OrdenListQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::OrdenesVer).await?;
    let query = query.into_inner();
    let list = ListQuery {
        page: query.page,
        per_page: query.per_page,
        search: query.search,
    };
    let (page, per_page) = list.pagination()?;

    let mut errors = FieldErrors::new();
    let status = parse_status(&mut errors, query.status.as_deref().filter(|s| !s.trim().is_empty()));
    errors.into_result()?;

    let mut select = orden_trabajo::Entity::find()
        .order_by_desc(orden_trabajo::Column::StartDate)
        .order_by_desc(orden_trabajo::Column::Id);
    if let Some(status) = status {
        select = select.filter(orden_trabajo::Column::Status.eq(status.as_str()));
    }
    if let Some(term) = list.search_term() {
        select = select.filter(orden_trabajo::Column::Description.contains(term));
    }

    Ok(HttpResponse::Ok().json(paginate(&data.db, select, page, per_page).await?))
}

#[utoipa::path(
    post,
    path = "/ordenes",
    tag = "Ordenes",
    request_body = CreateOrdenDto,
    responses(
        (status = 201, description = "Work order created", body = orden_trabajo::Model),
        (status = 422, description = "Validation failed")
    )
)]
#[post("")]
async fn create_orden(
    req: HttpRequest,
    data: web::Data<AppState>,
    dto: web::Json<CreateOrdenDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::OrdenesCrear).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let links = OrderLinks {
        cliente_id: dto.cliente_id,
        vehiculo_id: dto.vehiculo_id,
        empleado_id: dto.empleado_id,
        servicio_id: dto.servicio_id,
    };
    let service = check_links(&data.db, &mut errors, &links).await?;
    let status = parse_status(&mut errors, dto.status.as_deref()).unwrap_or_default();
    check_dates(&mut errors, dto.start_date, dto.end_date);
    if let Some(total) = dto.total_amount {
        non_negative(&mut errors, "total_amount", total);
    }
    errors.into_result()?;

    let total_amount = dto
        .total_amount
        .or_else(|| service.map(|s| s.price))
        .unwrap_or(Decimal::ZERO)
        .round_dp(2);

    let now = Utc::now();
    let created = orden_trabajo::ActiveModel {
        cliente_id: Set(links.cliente_id),
        vehiculo_id: Set(links.vehiculo_id),
        empleado_id: Set(links.empleado_id),
        servicio_id: Set(links.servicio_id),
        description: Set(clean_opt(dto.description)),
        status: Set(status.as_str().to_string()),
        total_amount: Set(total_amount),
        start_date: Set(dto.start_date),
        end_date: Set(dto.end_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&data.db)
    .await?;

    log::info!(
        "orden {} created for vehiculo {} ({})",
        created.id,
        created.vehiculo_id,
        created.status
    );
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/ordenes/{orden}",
    tag = "Ordenes",
    params(("orden" = i64, Path, description = "Work order ID")),
    responses(
        (status = 200, description = "Work order found", body = orden_trabajo::Model),
        (status = 404, description = "Work order not found")
    )
)]
#[get("/{orden}")]
async fn get_orden(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::OrdenesVer).await?;
    let found = find_orden(&data.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    method(put, patch),
    path = "/ordenes/{orden}",
    tag = "Ordenes",
    params(("orden" = i64, Path, description = "Work order ID")),
    request_body = UpdateOrdenDto,
    responses(
        (status = 200, description = "Work order updated", body = orden_trabajo::Model),
        (status = 404, description = "Work order not found"),
        (status = 422, description = "Validation failed")
    )
)]
#[route("/{orden}", method = "PUT", method = "PATCH")]
async fn update_orden(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<UpdateOrdenDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::OrdenesEditar).await?;
    let existing = find_orden(&data.db, path.into_inner()).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let links = OrderLinks {
        cliente_id: dto.cliente_id.unwrap_or(existing.cliente_id),
        vehiculo_id: dto.vehiculo_id.unwrap_or(existing.vehiculo_id),
        empleado_id: dto.empleado_id.unwrap_or(existing.empleado_id),
        servicio_id: dto.servicio_id.unwrap_or(existing.servicio_id),
    };
    let links_changed = dto.cliente_id.is_some()
        || dto.vehiculo_id.is_some()
        || dto.empleado_id.is_some()
        || dto.servicio_id.is_some();
    if links_changed {
        check_links(&data.db, &mut errors, &links).await?;
    }
    let status = parse_status(&mut errors, dto.status.as_deref());
    let start_date = dto.start_date.unwrap_or(existing.start_date);
    let end_date = dto.end_date.unwrap_or(existing.end_date);
    check_dates(&mut errors, start_date, end_date);
    if let Some(total) = dto.total_amount {
        non_negative(&mut errors, "total_amount", total);
    }
    errors.into_result()?;

    let mut active = existing.into_active_model();
    active.cliente_id = Set(links.cliente_id);
    active.vehiculo_id = Set(links.vehiculo_id);
    active.empleado_id = Set(links.empleado_id);
    active.servicio_id = Set(links.servicio_id);
    if dto.description.is_some() {
        active.description = Set(clean_opt(dto.description));
    }
    if let Some(status) = status {
        active.status = Set(status.as_str().to_string());
    }
    if let Some(total) = dto.total_amount {
        active.total_amount = Set(total.round_dp(2));
    }
    active.start_date = Set(start_date);
    active.end_date = Set(end_date);
    active.updated_at = Set(Utc::now());

    let updated = active.update(&data.db).await?;
    log::info!("orden {} updated ({})", updated.id, updated.status);
    Ok(HttpResponse::Ok().json(updated))
}

#[utoipa::path(
    delete,
    path = "/ordenes/{orden}",
    tag = "Ordenes",
    params(("orden" = i64, Path, description = "Work order ID")),
    responses(
        (status = 204, description = "Work order deleted"),
        (status = 404, description = "Work order not found")
    )
)]
#[delete("/{orden}")]
async fn delete_orden(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::OrdenesEliminar).await?;
    let found = find_orden(&data.db, path.into_inner()).await?;
    let id = found.id;
    found.delete(&data.db).await?;
    log::info!("orden {} deleted", id);
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/ordenes")
            .service(list_ordenes)
            .service(create_orden)
            .service(get_orden)
            .service(update_orden)
            .service(delete_orden),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_status_is_a_field_error() {
        let mut errors = FieldErrors::new();
        assert_eq!(parse_status(&mut errors, Some("en_proceso")), Some(WorkOrderStatus::EnProceso));
        assert_eq!(parse_status(&mut errors, None), None);
        assert!(errors.is_empty());

        assert_eq!(parse_status(&mut errors, Some("archivada")), None);
        assert!(errors.has("status"));
    }

    #[test]
    fn end_date_distinguishes_absent_from_null() {
        let absent: UpdateOrdenDto = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.end_date, None);

        let cleared: UpdateOrdenDto = serde_json::from_str(r#"{"end_date": null}"#).unwrap();
        assert_eq!(cleared.end_date, Some(None));

        let set: UpdateOrdenDto = serde_json::from_str(r#"{"end_date": "2024-05-11"}"#).unwrap();
        assert_eq!(set.end_date, Some(NaiveDate::from_ymd_opt(2024, 5, 11)));
    }

    #[test]
    fn end_date_cannot_precede_start() {
        let start = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let mut errors = FieldErrors::new();
        check_dates(&mut errors, start, NaiveDate::from_ymd_opt(2024, 5, 10));
        assert!(errors.is_empty());
        check_dates(&mut errors, start, NaiveDate::from_ymd_opt(2024, 5, 9));
        assert!(errors.has("end_date"));
    }
}

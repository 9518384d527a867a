use actix_web::{HttpRequest, HttpResponse, delete, get, post, route, web};
use chrono::{Datelike, Utc};
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
        validation::{FieldErrors, clean_opt, optional_string, require_string},
    },
    app_state::AppState,
    database::models::{cliente, orden_trabajo, vehiculo},
    errors::AppError,
    services::permissions::Permission,
};

const MIN_YEAR: i32 = 1900;

// --- DTOs ---

#[derive(Deserialize, ToSchema, Clone)]
pub struct CreateVehiculoDto {
    pub cliente_id: i64,
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub license_plate: String,
    pub vin: Option<String>,
    pub color: Option<String>,
    pub status: Option<bool>,
}

#[derive(Deserialize, ToSchema, Clone, Default)]
pub struct UpdateVehiculoDto {
    pub cliente_id: Option<i64>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub license_plate: Option<String>,
    pub vin: Option<String>,
    pub color: Option<String>,
    pub status: Option<bool>,
}

/// Plates are stored upper-case without surrounding blanks.
fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

fn check_year(errors: &mut FieldErrors, year: i32) {
    let max = Utc::now().year() + 1;
    if !(MIN_YEAR..=max).contains(&year) {
        errors.add(
            "year",
            format!("The year field must be between {} and {}.", MIN_YEAR, max),
        );
    }
}

async fn check_owner<C: ConnectionTrait>(db: &C, errors: &mut FieldErrors, cliente_id: i64) -> Result<(), AppError> {
    if cliente::Entity::find_by_id(cliente_id).one(db).await?.is_none() {
        errors.add("cliente_id", "The selected cliente_id is invalid.");
    }
    Ok(())
}

async fn check_unique<C: ConnectionTrait>(
    db: &C,
    errors: &mut FieldErrors,
    column: vehiculo::Column,
    field: &str,
    value: &str,
    except_id: Option<i64>,
) -> Result<(), AppError> {
    let mut query = vehiculo::Entity::find().filter(column.eq(value));
    if let Some(id) = except_id {
        query = query.filter(vehiculo::Column::Id.ne(id));
    }
    if query.one(db).await?.is_some() {
        errors.add(field, format!("The {} has already been taken.", field));
    }
    Ok(())
}

pub(crate) async fn find_vehiculo<C: ConnectionTrait>(db: &C, id: i64) -> Result<vehiculo::Model, AppError> {
    vehiculo::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Vehiculo with id {} not found", id)))
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/vehiculos",
    tag = "Vehiculos",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated vehicles", body = Paginated<vehiculo::Model>),
        (status = 403, description = "Missing vehiculos.ver")
    )
)]
#[get("")]
async fn list_vehiculos(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::VehiculosVer).await?;
    let (page, per_page) = query.pagination()?;

    let mut select = vehiculo::Entity::find().order_by_asc(vehiculo::Column::LicensePlate);
    if let Some(term) = query.search_term() {
        select = select.filter(
            Condition::any()
                .add(vehiculo::Column::LicensePlate.contains(term.to_uppercase()))
                .add(vehiculo::Column::Brand.contains(term))
                .add(vehiculo::Column::Model.contains(term)),
        );
    }

    Ok(HttpResponse::Ok().json(paginate(&data.db, select, page, per_page).await?))
}

#[utoipa::path(
    post,
    path = "/vehiculos",
    tag = "Vehiculos",
    request_body = CreateVehiculoDto,
    responses(
        (status = 201, description = "Vehicle created", body = vehiculo::Model),
        (status = 422, description = "Validation failed")
    )
)]
#[post("")]
async fn create_vehiculo(
    req: HttpRequest,
    data: web::Data<AppState>,
    dto: web::Json<CreateVehiculoDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::VehiculosCrear).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let brand = dto.brand.trim().to_string();
    let model = dto.model.trim().to_string();
    let plate = normalize_plate(&dto.license_plate);
    let vin = clean_opt(dto.vin).map(|v| v.to_uppercase());
    let color = clean_opt(dto.color);

    check_owner(&data.db, &mut errors, dto.cliente_id).await?;
    require_string(&mut errors, "brand", &brand);
    require_string(&mut errors, "model", &model);
    check_year(&mut errors, dto.year);
    require_string(&mut errors, "license_plate", &plate);
    optional_string(&mut errors, "vin", vin.as_deref());
    optional_string(&mut errors, "color", color.as_deref());
    if !plate.is_empty() {
        check_unique(&data.db, &mut errors, vehiculo::Column::LicensePlate, "license_plate", &plate, None).await?;
    }
    if let Some(vin) = vin.as_deref() {
        check_unique(&data.db, &mut errors, vehiculo::Column::Vin, "vin", vin, None).await?;
    }
    errors.into_result()?;

    let now = Utc::now();
    let created = vehiculo::ActiveModel {
        cliente_id: Set(dto.cliente_id),
        brand: Set(brand),
        model: Set(model),
        year: Set(dto.year),
        license_plate: Set(plate),
        vin: Set(vin),
        color: Set(color),
        status: Set(dto.status.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&data.db)
    .await?;

    log::info!("vehiculo {} created for cliente {}", created.id, created.cliente_id);
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/vehiculos/{vehiculo}",
    tag = "Vehiculos",
    params(("vehiculo" = i64, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Vehicle found", body = vehiculo::Model),
        (status = 404, description = "Vehicle not found")
    )
)]
#[get("/{vehiculo}")]
async fn get_vehiculo(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::VehiculosVer).await?;
    let found = find_vehiculo(&data.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    method(put, patch),
    path = "/vehiculos/{vehiculo}",
    tag = "Vehiculos",
    params(("vehiculo" = i64, Path, description = "Vehicle ID")),
    request_body = UpdateVehiculoDto,
    responses(
        (status = 200, description = "Vehicle updated", body = vehiculo::Model),
        (status = 404, description = "Vehicle not found"),
        (status = 409, description = "New owner would not match the vehicle's work orders"),
        (status = 422, description = "Validation failed")
    )
)]
#[route("/{vehiculo}", method = "PUT", method = "PATCH")]
async fn update_vehiculo(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<UpdateVehiculoDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::VehiculosEditar).await?;
    let id = path.into_inner();
    let existing = find_vehiculo(&data.db, id).await?;
    let dto = dto.into_inner();

    if let Some(cliente_id) = dto.cliente_id.filter(|owner| *owner != existing.cliente_id) {
        // Work orders record the owner at the time; they must keep matching the vehicle.
        let orders = orden_trabajo::Entity::find()
            .filter(orden_trabajo::Column::VehiculoId.eq(id))
            .filter(orden_trabajo::Column::ClienteId.ne(cliente_id))
            .count(&data.db)
            .await?;
        if orders > 0 {
            return Err(AppError::Conflict(format!(
                "Vehiculo {} has {} work orders for its current owner",
                id, orders
            )));
        }
    }

    let mut errors = FieldErrors::new();
    let mut active = existing.into_active_model();

    if let Some(cliente_id) = dto.cliente_id {
        check_owner(&data.db, &mut errors, cliente_id).await?;
        active.cliente_id = Set(cliente_id);
    }
    if let Some(brand) = dto.brand {
        let brand = brand.trim().to_string();
        require_string(&mut errors, "brand", &brand);
        active.brand = Set(brand);
    }
    if let Some(model) = dto.model {
        let model = model.trim().to_string();
        require_string(&mut errors, "model", &model);
        active.model = Set(model);
    }
    if let Some(year) = dto.year {
        check_year(&mut errors, year);
        active.year = Set(year);
    }
    if let Some(plate) = dto.license_plate {
        let plate = normalize_plate(&plate);
        require_string(&mut errors, "license_plate", &plate);
        if !plate.is_empty() {
            check_unique(&data.db, &mut errors, vehiculo::Column::LicensePlate, "license_plate", &plate, Some(id)).await?;
        }
        active.license_plate = Set(plate);
    }
    if dto.vin.is_some() {
        let vin = clean_opt(dto.vin).map(|v| v.to_uppercase());
        optional_string(&mut errors, "vin", vin.as_deref());
        if let Some(vin) = vin.as_deref() {
            check_unique(&data.db, &mut errors, vehiculo::Column::Vin, "vin", vin, Some(id)).await?;
        }
        active.vin = Set(vin);
    }
    if dto.color.is_some() {
        let color = clean_opt(dto.color);
        optional_string(&mut errors, "color", color.as_deref());
        active.color = Set(color);
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
    path = "/vehiculos/{vehiculo}",
    tag = "Vehiculos",
    params(("vehiculo" = i64, Path, description = "Vehicle ID")),
    responses(
        (status = 204, description = "Vehicle deleted"),
        (status = 404, description = "Vehicle not found"),
        (status = 409, description = "Vehicle still has work orders")
    )
)]
#[delete("/{vehiculo}")]
async fn delete_vehiculo(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::VehiculosEliminar).await?;
    let found = find_vehiculo(&data.db, path.into_inner()).await?;

    let orders = found.find_related(orden_trabajo::Entity).count(&data.db).await?;
    if orders > 0 {
        return Err(AppError::Conflict(format!(
            "Vehiculo {} still has {} work orders",
            found.id, orders
        )));
    }

    let id = found.id;
    found.delete(&data.db).await?;
    log::info!("vehiculo {} deleted", id);
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/vehiculos/{vehiculo}/ordenes",
    tag = "Vehiculos",
    params(("vehiculo" = i64, Path, description = "Vehicle ID")),
    responses(
        (status = 200, description = "Work orders of the vehicle, newest first", body = [orden_trabajo::Model]),
        (status = 404, description = "Vehicle not found")
    )
)]
#[get("/{vehiculo}/ordenes")]
async fn vehiculo_ordenes(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::VehiculosVer).await?;
    let found = find_vehiculo(&data.db, path.into_inner()).await?;
    let orders = found
        .find_related(orden_trabajo::Entity)
        .order_by_desc(orden_trabajo::Column::StartDate)
        .order_by_desc(orden_trabajo::Column::Id)
        .all(&data.db)
        .await?;
    Ok(HttpResponse::Ok().json(orders))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/vehiculos")
            .service(list_vehiculos)
            .service(create_vehiculo)
            .service(vehiculo_ordenes)
            .service(get_vehiculo)
            .service(update_vehiculo)
            .service(delete_vehiculo),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plates_are_upper_cased_and_trimmed() {
        assert_eq!(normalize_plate("  abc-123 "), "ABC-123");
    }

    #[test]
    fn year_must_be_plausible() {
        let mut errors = FieldErrors::new();
        check_year(&mut errors, 1899);
        assert!(errors.has("year"));

        let mut errors = FieldErrors::new();
        check_year(&mut errors, 2015);
        assert!(errors.is_empty());
    }
}

use actix_web::{HttpRequest, HttpResponse, delete, get, post, route, web};
use chrono::{NaiveDate, Utc};
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
        validation::{
            FieldErrors, clean_opt, non_negative, optional_email, optional_phone, require_string,
        },
    },
    app_state::AppState,
    database::models::{empleado, orden_trabajo},
    errors::AppError,
    services::permissions::Permission,
};

// --- DTOs ---

#[derive(Deserialize, ToSchema, Clone)]
pub struct CreateEmpleadoDto {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: String,
    #[schema(value_type = String, example = "1800000.00")]
    pub salary: Decimal,
    #[schema(value_type = String, format = Date)]
    pub hire_date: NaiveDate,
    pub status: Option<bool>,
}

#[derive(Deserialize, ToSchema, Clone, Default)]
pub struct UpdateEmpleadoDto {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub position: Option<String>,
    #[schema(value_type = Option<String>)]
    pub salary: Option<Decimal>,
    #[schema(value_type = Option<String>, format = Date)]
    pub hire_date: Option<NaiveDate>,
    pub status: Option<bool>,
}

fn check_hire_date(errors: &mut FieldErrors, hire_date: NaiveDate) {
    if hire_date > Utc::now().date_naive() {
        errors.add("hire_date", "The hire_date field must be a date before or equal to today.");
    }
}

pub(crate) async fn find_empleado<C: ConnectionTrait>(db: &C, id: i64) -> Result<empleado::Model, AppError> {
    empleado::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Empleado with id {} not found", id)))
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/empleados",
    tag = "Empleados",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated employees", body = Paginated<empleado::Model>),
        (status = 403, description = "Missing empleados.ver")
    )
)]
#[get("")]
async fn list_empleados(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::EmpleadosVer).await?;
    let (page, per_page) = query.pagination()?;

    let mut select = empleado::Entity::find().order_by_asc(empleado::Column::Name);
    if let Some(term) = query.search_term() {
        select = select.filter(
            Condition::any()
                .add(empleado::Column::Name.contains(term))
                .add(empleado::Column::Position.contains(term))
                .add(empleado::Column::Email.contains(term)),
        );
    }

    Ok(HttpResponse::Ok().json(paginate(&data.db, select, page, per_page).await?))
}

#[utoipa::path(
    post,
    path = "/empleados",
    tag = "Empleados",
    request_body = CreateEmpleadoDto,
    responses(
        (status = 201, description = "Employee created", body = empleado::Model),
        (status = 422, description = "Validation failed")
    )
)]
#[post("")]
async fn create_empleado(
    req: HttpRequest,
    data: web::Data<AppState>,
    dto: web::Json<CreateEmpleadoDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::EmpleadosCrear).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let name = dto.name.trim().to_string();
    let position = dto.position.trim().to_string();
    require_string(&mut errors, "name", &name);
    require_string(&mut errors, "position", &position);
    let email = clean_opt(dto.email).map(|e| e.to_lowercase());
    optional_email(&mut errors, "email", email.as_deref());
    let phone = optional_phone(&mut errors, "phone", dto.phone);
    non_negative(&mut errors, "salary", dto.salary);
    check_hire_date(&mut errors, dto.hire_date);
    errors.into_result()?;

    let now = Utc::now();
    let created = empleado::ActiveModel {
        name: Set(name),
        email: Set(email),
        phone: Set(phone),
        position: Set(position),
        salary: Set(dto.salary.round_dp(2)),
        hire_date: Set(dto.hire_date),
        status: Set(dto.status.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&data.db)
    .await?;

    log::info!("empleado {} created", created.id);
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/empleados/{empleado}",
    tag = "Empleados",
    params(("empleado" = i64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = empleado::Model),
        (status = 404, description = "Employee not found")
    )
)]
#[get("/{empleado}")]
async fn get_empleado(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::EmpleadosVer).await?;
    let found = find_empleado(&data.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    method(put, patch),
    path = "/empleados/{empleado}",
    tag = "Empleados",
    params(("empleado" = i64, Path, description = "Employee ID")),
    request_body = UpdateEmpleadoDto,
    responses(
        (status = 200, description = "Employee updated", body = empleado::Model),
        (status = 404, description = "Employee not found"),
        (status = 422, description = "Validation failed")
    )
)]
#[route("/{empleado}", method = "PUT", method = "PATCH")]
async fn update_empleado(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<UpdateEmpleadoDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::EmpleadosEditar).await?;
    let existing = find_empleado(&data.db, path.into_inner()).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let mut active = existing.into_active_model();

    if let Some(name) = dto.name {
        let name = name.trim().to_string();
        require_string(&mut errors, "name", &name);
        active.name = Set(name);
    }
    if let Some(position) = dto.position {
        let position = position.trim().to_string();
        require_string(&mut errors, "position", &position);
        active.position = Set(position);
    }
    if dto.email.is_some() {
        let email = clean_opt(dto.email).map(|e| e.to_lowercase());
        optional_email(&mut errors, "email", email.as_deref());
        active.email = Set(email);
    }
    if dto.phone.is_some() {
        active.phone = Set(optional_phone(&mut errors, "phone", dto.phone));
    }
    if let Some(salary) = dto.salary {
        non_negative(&mut errors, "salary", salary);
        active.salary = Set(salary.round_dp(2));
    }
    if let Some(hire_date) = dto.hire_date {
        check_hire_date(&mut errors, hire_date);
        active.hire_date = Set(hire_date);
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
    path = "/empleados/{empleado}",
    tag = "Empleados",
    params(("empleado" = i64, Path, description = "Employee ID")),
    responses(
        (status = 204, description = "Employee deleted"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Employee is assigned to work orders")
    )
)]
#[delete("/{empleado}")]
async fn delete_empleado(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::EmpleadosEliminar).await?;
    let found = find_empleado(&data.db, path.into_inner()).await?;

    let orders = found.find_related(orden_trabajo::Entity).count(&data.db).await?;
    if orders > 0 {
        return Err(AppError::Conflict(format!(
            "Empleado {} is assigned to {} work orders",
            found.id, orders
        )));
    }

    let id = found.id;
    found.delete(&data.db).await?;
    log::info!("empleado {} deleted", id);
    Ok(HttpResponse::NoContent().finish())
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/empleados")
            .service(list_empleados)
            .service(create_empleado)
            .service(get_empleado)
            .service(update_empleado)
            .service(delete_empleado),
    );
}

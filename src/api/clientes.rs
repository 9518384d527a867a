use actix_web::{HttpRequest, HttpResponse, delete, get, post, route, web};
use chrono::Utc;
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
            FieldErrors, clean_opt, optional_email, optional_phone, optional_string,
            require_string,
        },
    },
    app_state::AppState,
    database::models::{cliente, orden_trabajo, vehiculo},
    errors::AppError,
    services::permissions::Permission,
};

// --- DTOs ---

#[derive(Deserialize, ToSchema, Clone)]
pub struct CreateClienteDto {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub document_number: String,
    pub status: Option<bool>,
}

/// Partial update: absent fields keep their stored value.
#[derive(Deserialize, ToSchema, Clone, Default)]
pub struct UpdateClienteDto {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub document_number: Option<String>,
    pub status: Option<bool>,
}

async fn document_taken<C: ConnectionTrait>(
    db: &C,
    document_number: &str,
    except_id: Option<i64>,
) -> Result<bool, AppError> {
    let mut query = cliente::Entity::find()
        .filter(cliente::Column::DocumentNumber.eq(document_number));
    if let Some(id) = except_id {
        query = query.filter(cliente::Column::Id.ne(id));
    }
    Ok(query.one(db).await?.is_some())
}

pub(crate) async fn find_cliente<C: ConnectionTrait>(db: &C, id: i64) -> Result<cliente::Model, AppError> {
    cliente::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Cliente with id {} not found", id)))
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/clientes",
    tag = "Clientes",
    params(ListQuery),
    responses(
        (status = 200, description = "Paginated clients", body = Paginated<cliente::Model>),
        (status = 403, description = "Missing clientes.ver")
    )
)]
#[get("")]
async fn list_clientes(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ClientesVer).await?;
    let (page, per_page) = query.pagination()?;

    let mut select = cliente::Entity::find().order_by_asc(cliente::Column::Name);
    if let Some(term) = query.search_term() {
        select = select.filter(
            Condition::any()
                .add(cliente::Column::Name.contains(term))
                .add(cliente::Column::DocumentNumber.contains(term))
                .add(cliente::Column::Email.contains(term)),
        );
    }

    Ok(HttpResponse::Ok().json(paginate(&data.db, select, page, per_page).await?))
}

#[utoipa::path(
    post,
    path = "/clientes",
    tag = "Clientes",
    request_body = CreateClienteDto,
    responses(
        (status = 201, description = "Client created", body = cliente::Model),
        (status = 422, description = "Validation failed")
    )
)]
#[post("")]
async fn create_cliente(
    req: HttpRequest,
    data: web::Data<AppState>,
    dto: web::Json<CreateClienteDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ClientesCrear).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let name = dto.name.trim().to_string();
    let document_number = dto.document_number.trim().to_string();
    require_string(&mut errors, "name", &name);
    require_string(&mut errors, "document_number", &document_number);
    let email = clean_opt(dto.email).map(|e| e.to_lowercase());
    optional_email(&mut errors, "email", email.as_deref());
    let phone = optional_phone(&mut errors, "phone", dto.phone);
    let address = clean_opt(dto.address);
    optional_string(&mut errors, "address", address.as_deref());
    if !document_number.is_empty() && document_taken(&data.db, &document_number, None).await? {
        errors.add("document_number", "The document_number has already been taken.");
    }
    errors.into_result()?;

    let now = Utc::now();
    let created = cliente::ActiveModel {
        name: Set(name),
        email: Set(email),
        phone: Set(phone),
        address: Set(address),
        document_number: Set(document_number),
        status: Set(dto.status.unwrap_or(true)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&data.db)
    .await?;

    log::info!("cliente {} created", created.id);
    Ok(HttpResponse::Created().json(created))
}

#[utoipa::path(
    get,
    path = "/clientes/{cliente}",
    tag = "Clientes",
    params(("cliente" = i64, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Client found", body = cliente::Model),
        (status = 404, description = "Client not found")
    )
)]
#[get("/{cliente}")]
async fn get_cliente(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ClientesVer).await?;
    let found = find_cliente(&data.db, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(found))
}

#[utoipa::path(
    method(put, patch),
    path = "/clientes/{cliente}",
    tag = "Clientes",
    params(("cliente" = i64, Path, description = "Client ID")),
    request_body = UpdateClienteDto,
    responses(
        (status = 200, description = "Client updated", body = cliente::Model),
        (status = 404, description = "Client not found"),
        (status = 422, description = "Validation failed")
    )
)]
#[route("/{cliente}", method = "PUT", method = "PATCH")]
async fn update_cliente(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    dto: web::Json<UpdateClienteDto>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ClientesEditar).await?;
    let id = path.into_inner();
    let existing = find_cliente(&data.db, id).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let mut active = existing.into_active_model();

    if let Some(name) = dto.name {
        let name = name.trim().to_string();
        require_string(&mut errors, "name", &name);
        active.name = Set(name);
    }
    if let Some(document_number) = dto.document_number {
        let document_number = document_number.trim().to_string();
        require_string(&mut errors, "document_number", &document_number);
        if !document_number.is_empty() && document_taken(&data.db, &document_number, Some(id)).await? {
            errors.add("document_number", "The document_number has already been taken.");
        }
        active.document_number = Set(document_number);
    }
    if dto.email.is_some() {
        let email = clean_opt(dto.email).map(|e| e.to_lowercase());
        optional_email(&mut errors, "email", email.as_deref());
        active.email = Set(email);
    }
    if dto.phone.is_some() {
        active.phone = Set(optional_phone(&mut errors, "phone", dto.phone));
    }
    if dto.address.is_some() {
        let address = clean_opt(dto.address);
        optional_string(&mut errors, "address", address.as_deref());
        active.address = Set(address);
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
    path = "/clientes/{cliente}",
    tag = "Clientes",
    params(("cliente" = i64, Path, description = "Client ID")),
    responses(
        (status = 204, description = "Client deleted"),
        (status = 404, description = "Client not found"),
        (status = 409, description = "Client still has vehicles or work orders")
    )
)]
#[delete("/{cliente}")]
async fn delete_cliente(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ClientesEliminar).await?;
    let found = find_cliente(&data.db, path.into_inner()).await?;

    let vehicles = found.find_related(vehiculo::Entity).count(&data.db).await?;
    let orders = found.find_related(orden_trabajo::Entity).count(&data.db).await?;
    if vehicles > 0 || orders > 0 {
        return Err(AppError::Conflict(format!(
            "Cliente {} still has {} vehicles and {} work orders",
            found.id, vehicles, orders
        )));
    }

    let id = found.id;
    found.delete(&data.db).await?;
    log::info!("cliente {} deleted", id);
    Ok(HttpResponse::NoContent().finish())
}

#[utoipa::path(
    get,
    path = "/clientes/{cliente}/vehiculos",
    tag = "Clientes",
    params(("cliente" = i64, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Vehicles owned by the client", body = [vehiculo::Model]),
        (status = 404, description = "Client not found")
    )
)]
#[get("/{cliente}/vehiculos")]
async fn cliente_vehiculos(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ClientesVer).await?;
    let found = find_cliente(&data.db, path.into_inner()).await?;
    let vehicles = found
        .find_related(vehiculo::Entity)
        .order_by_asc(vehiculo::Column::Id)
        .all(&data.db)
        .await?;
    Ok(HttpResponse::Ok().json(vehicles))
}

#[utoipa::path(
    get,
    path = "/clientes/{cliente}/ordenes",
    tag = "Clientes",
    params(("cliente" = i64, Path, description = "Client ID")),
    responses(
        (status = 200, description = "Work orders of the client, newest first", body = [orden_trabajo::Model]),
        (status = 404, description = "Client not found")
    )
)]
#[get("/{cliente}/ordenes")]
async fn cliente_ordenes(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ClientesVer).await?;
    let found = find_cliente(&data.db, path.into_inner()).await?;
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
        web::scope("/clientes")
            .service(list_clientes)
            .service(create_cliente)
            .service(cliente_vehiculos)
            .service(cliente_ordenes)
            .service(get_cliente)
            .service(update_cliente)
            .service(delete_cliente),
    );
}

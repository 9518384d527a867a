use actix_web::{
    HttpRequest, HttpResponse, get,
    http::header::{ContentDisposition, DispositionParam, DispositionType},
    post, web,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

use crate::{
    api::{
        context::authorize,
        helpers::{ListQuery, Paginated, paginate},
        validation::{FieldErrors, require_string},
    },
    app_state::AppState,
    database::{
        models::{reporte, user},
        types::ReportType,
    },
    errors::AppError,
    services::{
        permissions::Permission,
        report_service::{self, ReportFilters, ReportTable},
    },
};

// --- DTOs ---

#[derive(Deserialize, ToSchema, Clone)]
pub struct GenerarReporteDto {
    pub name: String,
    /// clientes, vehiculos, empleados, servicios, ordenes or ingresos
    #[serde(rename = "type")]
    #[schema(example = "ordenes")]
    pub report_type: String,
    /// Optional object; recognised keys: desde, hasta, status, cliente_id, empleado_id
    #[schema(value_type = Option<Object>)]
    pub filters: Option<JsonValue>,
}

#[derive(Serialize, ToSchema)]
pub struct GeneratedReport {
    pub report: reporte::Model,
    pub table: ReportTable,
}

// --- Route Handlers ---

#[utoipa::path(
    get,
    path = "/reportes",
    tag = "Reportes",
    params(ListQuery),
    responses(
        (status = 200, description = "Generated reports, newest first", body = Paginated<reporte::Model>),
        (status = 403, description = "Missing reportes.ver")
    )
)]
#[get("")]
async fn list_reportes(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ReportesVer).await?;
    let (page, per_page) = query.pagination()?;

    let mut select = reporte::Entity::find()
        .order_by_desc(reporte::Column::GeneratedAt)
        .order_by_desc(reporte::Column::Id);
    if let Some(term) = query.search_term() {
        select = select.filter(reporte::Column::Name.contains(term));
    }

    Ok(HttpResponse::Ok().json(paginate(&data.db, select, page, per_page).await?))
}

#[utoipa::path(
    post,
    path = "/reportes/generar",
    tag = "Reportes",
    request_body = GenerarReporteDto,
    responses(
        (status = 201, description = "Report stored and computed", body = GeneratedReport),
        (status = 403, description = "Missing reportes.generar"),
        (status = 422, description = "Validation failed")
    )
)]
#[post("/generar")]
async fn generar_reporte(
    req: HttpRequest,
    data: web::Data<AppState>,
    dto: web::Json<GenerarReporteDto>,
) -> Result<HttpResponse, AppError> {
    let ctx = authorize(&req, &data, Permission::ReportesGenerar).await?;
    let dto = dto.into_inner();

    let mut errors = FieldErrors::new();
    let name = dto.name.trim().to_string();
    require_string(&mut errors, "name", &name);

    let kind = match dto.report_type.parse::<ReportType>() {
        Ok(kind) => Some(kind),
        Err(_) => {
            errors.add("type", "The selected type is invalid.");
            None
        }
    };

    let raw_filters = match dto.filters {
        None | Some(JsonValue::Null) => JsonValue::Object(Default::default()),
        Some(value) => value,
    };
    let filters = match kind.map(|kind| ReportFilters::parse(kind, &raw_filters)) {
        Some(Ok(filters)) => Some(filters),
        Some(Err(filter_errors)) => {
            for field in filter_errors.fields() {
                if let Some(message) = filter_errors.first(field) {
                    errors.add(field, message);
                }
            }
            None
        }
        None => None,
    };
    errors.into_result()?;

    let (Some(kind), Some(filters)) = (kind, filters) else {
        return Err(AppError::Internal);
    };

    let table = report_service::build_table(&data.db, kind, &filters).await?;
    let report = reporte::ActiveModel {
        name: Set(name),
        r#type: Set(kind.as_str().to_string()),
        filters: Set(raw_filters),
        generated_by: Set(ctx.user_id()),
        generated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&data.db)
    .await?;

    log::info!(
        "reporte {} ({}) generated by user {} with {} rows",
        report.id,
        report.r#type,
        ctx.user_id(),
        table.count
    );
    Ok(HttpResponse::Created().json(GeneratedReport { report, table }))
}

#[utoipa::path(
    get,
    path = "/reportes/exportar/{id}",
    tag = "Reportes",
    params(("id" = i64, Path, description = "Report ID")),
    responses(
        (status = 200, description = "PDF rendering of the report", content_type = "application/pdf", body = Vec<u8>),
        (status = 403, description = "Missing reportes.exportar"),
        (status = 404, description = "Report not found")
    )
)]
#[get("/exportar/{id}")]
async fn exportar_reporte(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    authorize(&req, &data, Permission::ReportesExportar).await?;
    let id = path.into_inner();
    let report = reporte::Entity::find_by_id(id)
        .one(&data.db)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Reporte with id {} not found", id)))?;

    let kind = report.r#type.parse::<ReportType>().map_err(|e| {
        log::error!("reporte {} has an unreadable type: {}", report.id, e);
        AppError::Internal
    })?;
    let filters = ReportFilters::parse(kind, &report.filters).map_err(AppError::Validation)?;
    let table = report_service::build_table(&data.db, kind, &filters).await?;
    let author = report.find_related(user::Entity).one(&data.db).await?;
    let tz = data.config.get_timezone().unwrap_or(chrono_tz::UTC);

    let bytes = report_service::render_pdf(&report, author.as_ref(), &table, tz);
    log::info!("reporte {} exported ({} bytes)", report.id, bytes.len());

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(format!("reporte-{}.pdf", report.id))],
        })
        .body(bytes))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reportes")
            .service(list_reportes)
            .service(generar_reporte)
            .service(exportar_reporte),
    );
}

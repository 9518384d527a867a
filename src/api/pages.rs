use actix_web::{HttpRequest, HttpResponse, get, http::StatusCode, web};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Deserialize;

use crate::{
    api::{context::resolve_verified_context, helpers::redirect},
    app_state::AppState,
    database::{
        models::{cliente, empleado, orden_trabajo, reporte, servicio, vehiculo},
        types::WorkOrderStatus,
    },
    errors::AppError,
    views::{self, dashboard::DashboardCounts},
};

#[derive(Debug, Default, Deserialize)]
pub struct DashboardQuery {
    pub verified: Option<u8>,
}

#[get("/")]
async fn home() -> HttpResponse {
    redirect("/login")
}

#[get("/test")]
async fn test_route() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Ruta de prueba funcionando")
}

pub async fn dashboard_counts<C: ConnectionTrait>(db: &C) -> Result<DashboardCounts, AppError> {
    let open = [WorkOrderStatus::Pendiente, WorkOrderStatus::EnProceso].map(|s| s.as_str());
    Ok(DashboardCounts {
        clientes: cliente::Entity::find().count(db).await?,
        vehiculos: vehiculo::Entity::find().count(db).await?,
        empleados: empleado::Entity::find().count(db).await?,
        servicios: servicio::Entity::find().count(db).await?,
        ordenes_abiertas: orden_trabajo::Entity::find()
            .filter(orden_trabajo::Column::Status.is_in(open))
            .count(db)
            .await?,
        reportes: reporte::Entity::find().count(db).await?,
    })
}

#[get("/dashboard")]
async fn dashboard(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<DashboardQuery>,
) -> Result<HttpResponse, AppError> {
    let ctx = resolve_verified_context(&req, &data).await?;
    let counts = dashboard_counts(&data.db).await?;
    Ok(views::html(
        StatusCode::OK,
        views::dashboard::dashboard_page(
            data.config.effective_app_name(),
            &ctx.user,
            &counts,
            query.verified == Some(1),
        ),
    ))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home).service(test_route).service(dashboard);
}

pub mod auth;
pub mod clientes;
pub mod context;
pub mod empleados;
pub mod helpers;
pub mod middleware;
pub mod ordenes;
pub mod pages;
pub mod profile;
pub mod reportes;
pub mod servicios;
pub mod validation;
pub mod vehiculos;

use actix_web::{
    middleware::{NormalizePath, TrailingSlash},
    web,
};
use utoipa::OpenApi;

use crate::{
    database::{
        models::{cliente, empleado, orden_trabajo, reporte, servicio, vehiculo},
        types::{ReportType, WorkOrderStatus},
    },
    services::report_service::ReportTable,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Clientes
        clientes::list_clientes,
        clientes::create_cliente,
        clientes::get_cliente,
        clientes::update_cliente,
        clientes::delete_cliente,
        clientes::cliente_vehiculos,
        clientes::cliente_ordenes,
        // Vehiculos
        vehiculos::list_vehiculos,
        vehiculos::create_vehiculo,
        vehiculos::get_vehiculo,
        vehiculos::update_vehiculo,
        vehiculos::delete_vehiculo,
        vehiculos::vehiculo_ordenes,
        // Servicios
        servicios::list_servicios,
        servicios::create_servicio,
        servicios::get_servicio,
        servicios::update_servicio,
        servicios::delete_servicio,
        // Empleados
        empleados::list_empleados,
        empleados::create_empleado,
        empleados::get_empleado,
        empleados::update_empleado,
        empleados::delete_empleado,
        // Ordenes
        ordenes::list_ordenes,
        ordenes::create_orden,
        ordenes::get_orden,
        ordenes::update_orden,
        ordenes::delete_orden,
        // Reportes
        reportes::list_reportes,
        reportes::generar_reporte,
        reportes::exportar_reporte,
    ),
    components(
        schemas(
            // --- Models ---
            cliente::Model,
            vehiculo::Model,
            empleado::Model,
            servicio::Model,
            orden_trabajo::Model,
            reporte::Model,
            WorkOrderStatus,
            ReportType,

            // --- DTOs & API Structs ---
            clientes::CreateClienteDto,
            clientes::UpdateClienteDto,
            vehiculos::CreateVehiculoDto,
            vehiculos::UpdateVehiculoDto,
            servicios::CreateServicioDto,
            servicios::UpdateServicioDto,
            empleados::CreateEmpleadoDto,
            empleados::UpdateEmpleadoDto,
            ordenes::CreateOrdenDto,
            ordenes::UpdateOrdenDto,
            reportes::GenerarReporteDto,
            reportes::GeneratedReport,
            ReportTable,
        )
    ),
    tags(
        (name = "Clientes", description = "Client records and their vehicles and work orders"),
        (name = "Vehiculos", description = "Vehicles owned by clients"),
        (name = "Servicios", description = "Service catalogue"),
        (name = "Empleados", description = "Shop staff"),
        (name = "Ordenes", description = "Work orders"),
        (name = "Reportes", description = "Report generation and PDF export")
    )
)]
pub struct ApiDoc;

/// Registers every route of the application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.configure(pages::init_routes)
        .configure(auth::init_routes)
        .configure(profile::init_routes)
        .configure(clientes::init_routes)
        .configure(vehiculos::init_routes)
        .configure(servicios::init_routes)
        .configure(empleados::init_routes)
        .configure(ordenes::init_routes)
        .configure(reportes::init_routes);
}

/// `/clientes/` and `/clientes` reach the same handler; repeated slashes collapse.
pub fn normalize_path() -> NormalizePath {
    NormalizePath::new(TrailingSlash::Trim)
}

/// Body extractor settings: size limit from the config, failures in the JSON error format.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| crate::errors::AppError::InvalidInput(err.to_string()).into())
}

pub fn form_config(limit: usize) -> web::FormConfig {
    web::FormConfig::default()
        .limit(limit)
        .error_handler(|err, _req| crate::errors::AppError::InvalidInput(err.to_string()).into())
}

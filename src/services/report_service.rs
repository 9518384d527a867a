//! Report generation: interprets the stored filters, queries the shop data
//! and lays the result out as a table, either as JSON or as a PDF document.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use utoipa::ToSchema;

use crate::{
    api::validation::FieldErrors,
    database::{
        models::{cliente, empleado, orden_trabajo, reporte, servicio, user, vehiculo},
        types::{ReportType, WorkOrderStatus},
    },
    errors::AppError,
    services::pdf::PdfBuilder,
};

/// Recognised keys of a report's `filters` payload. Unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportFilters {
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
    pub active: Option<bool>,
    pub order_status: Option<WorkOrderStatus>,
    pub cliente_id: Option<i64>,
    pub empleado_id: Option<i64>,
}

impl ReportFilters {
    /// Reads the filters for `kind`; `null` means no filtering.
    pub fn parse(kind: ReportType, raw: &JsonValue) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::new();
        let empty = Map::new();
        let obj = match raw {
            JsonValue::Null => &empty,
            JsonValue::Object(map) => map,
            _ => {
                errors.add("filters", "The filters field must be an object.");
                return Err(errors);
            }
        };

        let mut filters = ReportFilters {
            desde: parse_date(&mut errors, obj, "desde"),
            hasta: parse_date(&mut errors, obj, "hasta"),
            cliente_id: parse_id(&mut errors, obj, "cliente_id"),
            empleado_id: parse_id(&mut errors, obj, "empleado_id"),
            ..Default::default()
        };

        match (obj.get("status"), kind) {
            (None | Some(JsonValue::Null), _) => {}
            (Some(JsonValue::String(s)), ReportType::Ordenes | ReportType::Ingresos) => {
                match s.parse::<WorkOrderStatus>() {
                    Ok(status) => filters.order_status = Some(status),
                    Err(e) => errors.add("filters.status", e),
                }
            }
            (Some(JsonValue::Bool(flag)), ReportType::Clientes | ReportType::Vehiculos | ReportType::Empleados | ReportType::Servicios) => {
                filters.active = Some(*flag);
            }
            (Some(_), _) => errors.add("filters.status", "The status filter has the wrong type for this report."),
        }

        if let (Some(desde), Some(hasta)) = (filters.desde, filters.hasta) {
            if hasta < desde {
                errors.add("filters.hasta", "The hasta date must be a date after or equal to desde.");
            }
        }

        errors.into_result().map(|_| filters)
    }
}

fn parse_date(errors: &mut FieldErrors, obj: &Map<String, JsonValue>, key: &str) -> Option<NaiveDate> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => None,
        Some(JsonValue::String(s)) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                errors.add(&format!("filters.{}", key), "The date must use the YYYY-MM-DD format.");
                None
            }
        },
        Some(_) => {
            errors.add(&format!("filters.{}", key), "The date must use the YYYY-MM-DD format.");
            None
        }
    }
}

fn parse_id(errors: &mut FieldErrors, obj: &Map<String, JsonValue>, key: &str) -> Option<i64> {
    match obj.get(key) {
        None | Some(JsonValue::Null) => None,
        Some(value) => match value.as_i64() {
            Some(id) if id > 0 => Some(id),
            _ => {
                errors.add(&format!("filters.{}", key), "The id must be a positive integer.");
                None
            }
        },
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportTable {
    pub title: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub count: usize,
    #[schema(value_type = Option<String>)]
    pub total: Option<Decimal>,
}

impl ReportTable {
    fn new(title: &str, columns: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
            count: 0,
            total: None,
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
        self.count = self.rows.len();
    }
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

fn flag(active: bool) -> String {
    if active { "activo" } else { "inactivo" }.to_string()
}

fn day_start(date: NaiveDate) -> chrono::DateTime<chrono::Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

pub async fn build_table<C>(db: &C, kind: ReportType, filters: &ReportFilters) -> Result<ReportTable, AppError>
where
    C: ConnectionTrait,
{
    match kind {
        ReportType::Clientes => clientes_table(db, filters).await,
        ReportType::Vehiculos => vehiculos_table(db, filters).await,
        ReportType::Empleados => empleados_table(db, filters).await,
        ReportType::Servicios => servicios_table(db, filters).await,
        ReportType::Ordenes => ordenes_table(db, filters).await,
        ReportType::Ingresos => ingresos_table(db, filters).await,
    }
}

async fn clientes_table<C: ConnectionTrait>(db: &C, filters: &ReportFilters) -> Result<ReportTable, AppError> {
    let mut query = cliente::Entity::find().order_by_asc(cliente::Column::Name);
    if let Some(active) = filters.active {
        query = query.filter(cliente::Column::Status.eq(active));
    }
    if let Some(desde) = filters.desde {
        query = query.filter(cliente::Column::CreatedAt.gte(day_start(desde)));
    }
    if let Some(hasta) = filters.hasta.and_then(|d| d.succ_opt()) {
        query = query.filter(cliente::Column::CreatedAt.lt(day_start(hasta)));
    }

    let mut table = ReportTable::new(
        ReportType::Clientes.title(),
        &["ID", "Nombre", "Documento", "Email", "Telefono", "Estado"],
    );
    for c in query.all(db).await? {
        table.push(vec![
            c.id.to_string(),
            c.name,
            c.document_number,
            c.email.unwrap_or_default(),
            c.phone.unwrap_or_default(),
            flag(c.status),
        ]);
    }
    Ok(table)
}

async fn vehiculos_table<C: ConnectionTrait>(db: &C, filters: &ReportFilters) -> Result<ReportTable, AppError> {
    let mut query = vehiculo::Entity::find()
        .find_also_related(cliente::Entity)
        .order_by_asc(vehiculo::Column::LicensePlate);
    if let Some(active) = filters.active {
        query = query.filter(vehiculo::Column::Status.eq(active));
    }
    if let Some(cliente_id) = filters.cliente_id {
        query = query.filter(vehiculo::Column::ClienteId.eq(cliente_id));
    }

    let mut table = ReportTable::new(
        ReportType::Vehiculos.title(),
        &["ID", "Placa", "Marca", "Modelo", "Año", "Cliente", "Estado"],
    );
    for (v, owner) in query.all(db).await? {
        table.push(vec![
            v.id.to_string(),
            v.license_plate,
            v.brand,
            v.model,
            v.year.to_string(),
            owner.map(|c| c.name).unwrap_or_default(),
            flag(v.status),
        ]);
    }
    Ok(table)
}

async fn empleados_table<C: ConnectionTrait>(db: &C, filters: &ReportFilters) -> Result<ReportTable, AppError> {
    let mut query = empleado::Entity::find().order_by_asc(empleado::Column::Name);
    if let Some(active) = filters.active {
        query = query.filter(empleado::Column::Status.eq(active));
    }
    if let Some(desde) = filters.desde {
        query = query.filter(empleado::Column::HireDate.gte(desde));
    }
    if let Some(hasta) = filters.hasta {
        query = query.filter(empleado::Column::HireDate.lte(hasta));
    }

    let mut table = ReportTable::new(
        ReportType::Empleados.title(),
        &["ID", "Nombre", "Cargo", "Salario", "Ingreso", "Estado"],
    );
    let mut total = Decimal::ZERO;
    for e in query.all(db).await? {
        total += e.salary;
        table.push(vec![
            e.id.to_string(),
            e.name,
            e.position,
            money(e.salary),
            e.hire_date.to_string(),
            flag(e.status),
        ]);
    }
    table.total = Some(total);
    Ok(table)
}

async fn servicios_table<C: ConnectionTrait>(db: &C, filters: &ReportFilters) -> Result<ReportTable, AppError> {
    let mut query = servicio::Entity::find().order_by_asc(servicio::Column::Name);
    if let Some(active) = filters.active {
        query = query.filter(servicio::Column::Status.eq(active));
    }

    let mut table = ReportTable::new(
        ReportType::Servicios.title(),
        &["ID", "Nombre", "Precio", "Duracion (h)", "Estado"],
    );
    for s in query.all(db).await? {
        table.push(vec![
            s.id.to_string(),
            s.name,
            money(s.price),
            format!("{:.2}", s.duration_hours),
            flag(s.status),
        ]);
    }
    Ok(table)
}

async fn filtered_orders<C: ConnectionTrait>(db: &C, filters: &ReportFilters) -> Result<Vec<orden_trabajo::Model>, AppError> {
    let mut query = orden_trabajo::Entity::find().order_by_asc(orden_trabajo::Column::StartDate);
    if let Some(desde) = filters.desde {
        query = query.filter(orden_trabajo::Column::StartDate.gte(desde));
    }
    if let Some(hasta) = filters.hasta {
        query = query.filter(orden_trabajo::Column::StartDate.lte(hasta));
    }
    if let Some(status) = filters.order_status {
        query = query.filter(orden_trabajo::Column::Status.eq(status.as_str()));
    }
    if let Some(cliente_id) = filters.cliente_id {
        query = query.filter(orden_trabajo::Column::ClienteId.eq(cliente_id));
    }
    if let Some(empleado_id) = filters.empleado_id {
        query = query.filter(orden_trabajo::Column::EmpleadoId.eq(empleado_id));
    }
    Ok(query.all(db).await?)
}

async fn ordenes_table<C: ConnectionTrait>(db: &C, filters: &ReportFilters) -> Result<ReportTable, AppError> {
    let mut table = ReportTable::new(
        ReportType::Ordenes.title(),
        &["ID", "Inicio", "Fin", "Cliente", "Vehiculo", "Empleado", "Estado", "Total"],
    );
    let mut total = Decimal::ZERO;
    for o in filtered_orders(db, filters).await? {
        total += o.total_amount;
        table.push(vec![
            o.id.to_string(),
            o.start_date.to_string(),
            o.end_date.map(|d| d.to_string()).unwrap_or_default(),
            o.cliente_id.to_string(),
            o.vehiculo_id.to_string(),
            o.empleado_id.to_string(),
            o.status,
            money(o.total_amount),
        ]);
    }
    table.total = Some(total);
    Ok(table)
}

/// Billed amount per service. Cancelled orders only count when asked for explicitly.
async fn ingresos_table<C: ConnectionTrait>(db: &C, filters: &ReportFilters) -> Result<ReportTable, AppError> {
    let names: BTreeMap<i64, String> = servicio::Entity::find()
        .all(db)
        .await?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect();

    let mut per_service: BTreeMap<i64, (usize, Decimal)> = BTreeMap::new();
    for o in filtered_orders(db, filters).await? {
        if filters.order_status.is_none() && o.status == WorkOrderStatus::Cancelada.as_str() {
            continue;
        }
        let entry = per_service.entry(o.servicio_id).or_insert((0, Decimal::ZERO));
        entry.0 += 1;
        entry.1 += o.total_amount;
    }

    let mut table = ReportTable::new(ReportType::Ingresos.title(), &["Servicio", "Ordenes", "Total"]);
    let mut total = Decimal::ZERO;
    for (servicio_id, (orders, amount)) in per_service {
        total += amount;
        table.push(vec![
            names
                .get(&servicio_id)
                .cloned()
                .unwrap_or_else(|| format!("#{}", servicio_id)),
            orders.to_string(),
            money(amount),
        ]);
    }
    table.total = Some(total);
    Ok(table)
}

/// Renders a stored report and its freshly built table as a PDF document.
pub fn render_pdf(report: &reporte::Model, author: Option<&user::Model>, table: &ReportTable, tz: Tz) -> Vec<u8> {
    let mut pdf = PdfBuilder::new(report.name.clone());
    pdf.heading(report.name.clone())
        .line(format!("Tipo: {}", table.title))
        .line(format!(
            "Generado: {}",
            report.generated_at.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z")
        ))
        .line(format!(
            "Generado por: {}",
            author.map(|u| u.name.as_str()).unwrap_or("-")
        ));

    if let Some(obj) = report.filters.as_object().filter(|o| !o.is_empty()) {
        let rendered: Vec<String> = obj.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        pdf.line(format!("Filtros: {}", rendered.join(", ")));
    }

    pdf.blank().subheading(table.columns.join(" | "));
    if table.rows.is_empty() {
        pdf.line("Sin registros");
    }
    for row in &table.rows {
        pdf.line(row.join(" | "));
    }
    pdf.blank().line(format!("Registros: {}", table.count));
    if let Some(total) = table.total {
        pdf.subheading(format!("Total: {}", money(total)));
    }
    pdf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_filters_mean_no_filtering() {
        let filters = ReportFilters::parse(ReportType::Clientes, &JsonValue::Null).unwrap();
        assert_eq!(filters, ReportFilters::default());
    }

    #[test]
    fn parses_order_filters() {
        let raw = json!({"desde": "2024-01-01", "hasta": "2024-01-31", "status": "completada", "empleado_id": 3, "extra": "x"});
        let filters = ReportFilters::parse(ReportType::Ordenes, &raw).unwrap();
        assert_eq!(filters.desde, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filters.order_status, Some(WorkOrderStatus::Completada));
        assert_eq!(filters.empleado_id, Some(3));
    }

    #[test]
    fn rejects_inverted_ranges_and_bad_values() {
        let raw = json!({"desde": "2024-02-01", "hasta": "2024-01-01", "cliente_id": -4});
        let errors = ReportFilters::parse(ReportType::Ordenes, &raw).unwrap_err();
        assert!(errors.has("filters.hasta"));
        assert!(errors.has("filters.cliente_id"));

        let errors = ReportFilters::parse(ReportType::Clientes, &json!({"status": "completada"})).unwrap_err();
        assert!(errors.has("filters.status"));

        let errors = ReportFilters::parse(ReportType::Clientes, &json!([1, 2])).unwrap_err();
        assert!(errors.has("filters"));
    }

    #[test]
    fn renders_report_header_and_rows() {
        let report = reporte::Model {
            id: 1,
            name: "Ordenes enero".to_string(),
            r#type: "ordenes".to_string(),
            filters: json!({"status": "completada"}),
            generated_by: 1,
            generated_at: chrono::Utc::now(),
        };
        let mut table = ReportTable::new("Ordenes de trabajo", &["ID", "Total"]);
        table.push(vec!["7".to_string(), "150.00".to_string()]);
        table.total = Some(Decimal::new(15000, 2));

        let bytes = render_pdf(&report, None, &table, chrono_tz::UTC);
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("(Ordenes enero) Tj"));
        assert!(text.contains("(7 | 150.00) Tj"));
        assert!(text.contains("(Total: 150.00) Tj"));
    }
}

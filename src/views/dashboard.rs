use crate::database::models::user;

use super::{escape, layout};

/// Record counts shown on the dashboard.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DashboardCounts {
    pub clientes: u64,
    pub vehiculos: u64,
    pub empleados: u64,
    pub servicios: u64,
    pub ordenes_abiertas: u64,
    pub reportes: u64,
}

pub fn dashboard_page(app_name: &str, account: &user::Model, counts: &DashboardCounts, just_verified: bool) -> String {
    let banner = if just_verified {
        r#"<p class="status" data-status="verified">Tu correo fue verificado.</p>"#
    } else {
        ""
    };

    let rows = [
        ("Clientes", "clientes", counts.clientes),
        ("Vehículos", "vehiculos", counts.vehiculos),
        ("Empleados", "empleados", counts.empleados),
        ("Servicios", "servicios", counts.servicios),
        ("Órdenes abiertas", "ordenes", counts.ordenes_abiertas),
        ("Reportes", "reportes", counts.reportes),
    ]
    .iter()
    .map(|(label, key, count)| {
        format!(
            r#"<tr><th>{}</th><td data-count="{}">{}</td></tr>"#,
            label, key, count
        )
    })
    .collect::<Vec<_>>()
    .join("\n");

    let body = format!(
        "<p>Hola, {name}.</p>\n{banner}\n<table>\n{rows}\n</table>",
        name = escape(&account.name),
        banner = banner,
        rows = rows
    );
    layout(app_name, "Dashboard", Some(account), &body)
}

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Work order status ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    #[default]
    Pendiente,
    EnProceso,
    Completada,
    Cancelada,
}

impl WorkOrderStatus {
    pub const ALL: [WorkOrderStatus; 4] = [
        WorkOrderStatus::Pendiente,
        WorkOrderStatus::EnProceso,
        WorkOrderStatus::Completada,
        WorkOrderStatus::Cancelada,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Pendiente => "pendiente",
            WorkOrderStatus::EnProceso => "en_proceso",
            WorkOrderStatus::Completada => "completada",
            WorkOrderStatus::Cancelada => "cancelada",
        }
    }
}

impl std::fmt::Display for WorkOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WorkOrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkOrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown work order status: {}", s))
    }
}

// --- Report types ---
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    Clientes,
    Vehiculos,
    Empleados,
    Servicios,
    Ordenes,
    Ingresos,
}

impl ReportType {
    pub const ALL: [ReportType; 6] = [
        ReportType::Clientes,
        ReportType::Vehiculos,
        ReportType::Empleados,
        ReportType::Servicios,
        ReportType::Ordenes,
        ReportType::Ingresos,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Clientes => "clientes",
            ReportType::Vehiculos => "vehiculos",
            ReportType::Empleados => "empleados",
            ReportType::Servicios => "servicios",
            ReportType::Ordenes => "ordenes",
            ReportType::Ingresos => "ingresos",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ReportType::Clientes => "Clientes",
            ReportType::Vehiculos => "Vehiculos",
            ReportType::Empleados => "Empleados",
            ReportType::Servicios => "Servicios",
            ReportType::Ordenes => "Ordenes de trabajo",
            ReportType::Ingresos => "Ingresos por servicio",
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| format!("Unknown report type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_its_column_value() {
        for status in WorkOrderStatus::ALL {
            assert_eq!(status.as_str().parse::<WorkOrderStatus>(), Ok(status));
        }
        assert!("terminada".parse::<WorkOrderStatus>().is_err());
        assert_eq!(WorkOrderStatus::default().to_string(), "pendiente");
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&WorkOrderStatus::EnProceso).unwrap();
        assert_eq!(json, "\"en_proceso\"");
    }

    #[test]
    fn report_type_parses_known_names_only() {
        assert_eq!("ingresos".parse::<ReportType>(), Ok(ReportType::Ingresos));
        assert!("ventas".parse::<ReportType>().is_err());
    }
}

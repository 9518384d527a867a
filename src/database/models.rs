use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// --- Clientes ---
pub mod cliente {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel, ToSchema)]
    #[schema(as = Cliente)]
    #[sea_orm(table_name = "clientes")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub address: Option<String>,
        #[sea_orm(unique)]
        pub document_number: String,
        pub status: bool,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::vehiculo::Entity")]
        Vehiculo,
        #[sea_orm(has_many = "super::orden_trabajo::Entity")]
        OrdenTrabajo,
    }

    impl Related<super::vehiculo::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Vehiculo.def()
        }
    }

    impl Related<super::orden_trabajo::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::OrdenTrabajo.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Empleados ---
pub mod empleado {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel, ToSchema)]
    #[schema(as = Empleado)]
    #[sea_orm(table_name = "empleados")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub email: Option<String>,
        pub phone: Option<String>,
        pub position: String,
        #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
        #[schema(value_type = String)]
        pub salary: Decimal,
        #[schema(value_type = String, format = Date)]
        pub hire_date: Date,
        pub status: bool,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::orden_trabajo::Entity")]
        OrdenTrabajo,
    }

    impl Related<super::orden_trabajo::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::OrdenTrabajo.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Vehiculos ---
pub mod vehiculo {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel, ToSchema)]
    #[schema(as = Vehiculo)]
    #[sea_orm(table_name = "vehiculos")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub cliente_id: i64,
        pub brand: String,
        pub model: String,
        pub year: i32,
        #[sea_orm(unique)]
        pub license_plate: String,
        pub vin: Option<String>,
        pub color: Option<String>,
        pub status: bool,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::cliente::Entity",
            from = "Column::ClienteId",
            to = "super::cliente::Column::Id"
        )]
        Cliente,
        #[sea_orm(has_many = "super::orden_trabajo::Entity")]
        OrdenTrabajo,
    }

    impl Related<super::cliente::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Cliente.def()
        }
    }

    impl Related<super::orden_trabajo::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::OrdenTrabajo.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Servicios ---
pub mod servicio {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel, ToSchema)]
    #[schema(as = Servicio)]
    #[sea_orm(table_name = "servicios")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub description: Option<String>,
        #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
        #[schema(value_type = String)]
        pub price: Decimal,
        #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
        #[schema(value_type = String)]
        pub duration_hours: Decimal,
        pub status: bool,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::orden_trabajo::Entity")]
        OrdenTrabajo,
    }

    impl Related<super::orden_trabajo::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::OrdenTrabajo.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Ordenes de trabajo ---
pub mod orden_trabajo {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel, ToSchema)]
    #[schema(as = OrdenTrabajo)]
    #[sea_orm(table_name = "ordenes_trabajo")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub cliente_id: i64,
        pub vehiculo_id: i64,
        pub empleado_id: i64,
        pub servicio_id: i64,
        pub description: Option<String>,
        /// One of `database::types::WorkOrderStatus`
        pub status: String,
        #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
        #[schema(value_type = String)]
        pub total_amount: Decimal,
        #[schema(value_type = String, format = Date)]
        pub start_date: Date,
        #[schema(value_type = Option<String>, format = Date)]
        pub end_date: Option<Date>,
        #[schema(value_type = String, format = DateTime)]
        pub created_at: DateTimeUtc,
        #[schema(value_type = String, format = DateTime)]
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::cliente::Entity",
            from = "Column::ClienteId",
            to = "super::cliente::Column::Id"
        )]
        Cliente,
        #[sea_orm(
            belongs_to = "super::vehiculo::Entity",
            from = "Column::VehiculoId",
            to = "super::vehiculo::Column::Id"
        )]
        Vehiculo,
        #[sea_orm(
            belongs_to = "super::empleado::Entity",
            from = "Column::EmpleadoId",
            to = "super::empleado::Column::Id"
        )]
        Empleado,
        #[sea_orm(
            belongs_to = "super::servicio::Entity",
            from = "Column::ServicioId",
            to = "super::servicio::Column::Id"
        )]
        Servicio,
    }

    impl Related<super::cliente::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Cliente.def()
        }
    }

    impl Related<super::vehiculo::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Vehiculo.def()
        }
    }

    impl Related<super::empleado::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Empleado.def()
        }
    }

    impl Related<super::servicio::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Servicio.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Reportes ---
pub mod reporte {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel, ToSchema)]
    #[schema(as = Reporte)]
    #[sea_orm(table_name = "reportes")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        pub r#type: String,
        #[schema(value_type = Object)]
        pub filters: Json,
        pub generated_by: i64,
        #[schema(value_type = String, format = DateTime)]
        pub generated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::user::Entity",
            from = "Column::GeneratedBy",
            to = "super::user::Column::Id"
        )]
        User,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Users ---
pub mod user {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub name: String,
        #[sea_orm(unique)]
        pub email: String,
        #[serde(skip_serializing)]
        pub password_hash: String,
        pub email_verified_at: Option<DateTimeUtc>,
        #[serde(skip_serializing)]
        pub verification_token: Option<String>,
        pub created_at: DateTimeUtc,
        pub updated_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::session::Entity")]
        Session,
        #[sea_orm(has_many = "super::reporte::Entity")]
        Reporte,
        #[sea_orm(has_many = "super::user_role::Entity")]
        UserRole,
    }

    impl Related<super::session::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Session.def()
        }
    }

    impl Related<super::reporte::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Reporte.def()
        }
    }

    impl Related<super::role::Entity> for Entity {
        fn to() -> RelationDef {
            super::user_role::Relation::Role.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::user_role::Relation::User.def().rev())
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Sessions ---
pub mod session {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel)]
    #[sea_orm(table_name = "sessions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: String,
        pub user_id: i64,
        pub created_at: DateTimeUtc,
        pub last_used_at: Option<DateTimeUtc>,
        pub expires_at: DateTimeUtc,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::user::Entity",
            from = "Column::UserId",
            to = "super::user::Column::Id"
        )]
        User,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Roles ---
pub mod role {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel)]
    #[sea_orm(table_name = "roles")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        #[sea_orm(unique)]
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::role_permission::Entity")]
        RolePermission,
        #[sea_orm(has_many = "super::user_role::Entity")]
        UserRole,
    }

    impl Related<super::permission::Entity> for Entity {
        fn to() -> RelationDef {
            super::role_permission::Relation::Permission.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::role_permission::Relation::Role.def().rev())
        }
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            super::user_role::Relation::User.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::user_role::Relation::Role.def().rev())
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- Permissions ---
pub mod permission {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel)]
    #[sea_orm(table_name = "permissions")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        #[sea_orm(unique)]
        pub name: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(has_many = "super::role_permission::Entity")]
        RolePermission,
    }

    impl Related<super::role::Entity> for Entity {
        fn to() -> RelationDef {
            super::role_permission::Relation::Role.def()
        }

        fn via() -> Option<RelationDef> {
            Some(super::role_permission::Relation::Permission.def().rev())
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- RolePermission ---
pub mod role_permission {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel)]
    #[sea_orm(table_name = "role_permissions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub role_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub permission_id: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::role::Entity",
            from = "Column::RoleId",
            to = "super::role::Column::Id"
        )]
        Role,
        #[sea_orm(
            belongs_to = "super::permission::Entity",
            from = "Column::PermissionId",
            to = "super::permission::Column::Id"
        )]
        Permission,
    }

    impl Related<super::role::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Role.def()
        }
    }

    impl Related<super::permission::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Permission.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

// --- UserRole ---
pub mod user_role {
    use super::*;
    #[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, DeriveEntityModel)]
    #[sea_orm(table_name = "user_roles")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub user_id: i64,
        #[sea_orm(primary_key, auto_increment = false)]
        pub role_id: i64,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "super::user::Entity",
            from = "Column::UserId",
            to = "super::user::Column::Id"
        )]
        User,
        #[sea_orm(
            belongs_to = "super::role::Entity",
            from = "Column::RoleId",
            to = "super::role::Column::Id"
        )]
        Role,
    }

    impl Related<super::user::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::User.def()
        }
    }

    impl Related<super::role::Entity> for Entity {
        fn to() -> RelationDef {
            Relation::Role.def()
        }
    }

    impl ActiveModelBehavior for ActiveModel {}
}

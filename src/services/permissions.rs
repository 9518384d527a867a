//! Permission tokens, role presets and the lookups behind route authorization.

use std::collections::HashSet;

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};

use crate::database::models::{permission, role, role_permission, user_role};

/// Named capability checked before a handler touches any data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Permission {
    ClientesVer,
    ClientesCrear,
    ClientesEditar,
    ClientesEliminar,
    VehiculosVer,
    VehiculosCrear,
    VehiculosEditar,
    VehiculosEliminar,
    ServiciosVer,
    ServiciosCrear,
    ServiciosEditar,
    ServiciosEliminar,
    EmpleadosVer,
    EmpleadosCrear,
    EmpleadosEditar,
    EmpleadosEliminar,
    OrdenesVer,
    OrdenesCrear,
    OrdenesEditar,
    OrdenesEliminar,
    ReportesVer,
    ReportesGenerar,
    ReportesExportar,
}

impl Permission {
    pub const ALL: [Permission; 23] = [
        Permission::ClientesVer,
        Permission::ClientesCrear,
        Permission::ClientesEditar,
        Permission::ClientesEliminar,
        Permission::VehiculosVer,
        Permission::VehiculosCrear,
        Permission::VehiculosEditar,
        Permission::VehiculosEliminar,
        Permission::ServiciosVer,
        Permission::ServiciosCrear,
        Permission::ServiciosEditar,
        Permission::ServiciosEliminar,
        Permission::EmpleadosVer,
        Permission::EmpleadosCrear,
        Permission::EmpleadosEditar,
        Permission::EmpleadosEliminar,
        Permission::OrdenesVer,
        Permission::OrdenesCrear,
        Permission::OrdenesEditar,
        Permission::OrdenesEliminar,
        Permission::ReportesVer,
        Permission::ReportesGenerar,
        Permission::ReportesExportar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ClientesVer => "clientes.ver",
            Permission::ClientesCrear => "clientes.crear",
            Permission::ClientesEditar => "clientes.editar",
            Permission::ClientesEliminar => "clientes.eliminar",
            Permission::VehiculosVer => "vehiculos.ver",
            Permission::VehiculosCrear => "vehiculos.crear",
            Permission::VehiculosEditar => "vehiculos.editar",
            Permission::VehiculosEliminar => "vehiculos.eliminar",
            Permission::ServiciosVer => "servicios.ver",
            Permission::ServiciosCrear => "servicios.crear",
            Permission::ServiciosEditar => "servicios.editar",
            Permission::ServiciosEliminar => "servicios.eliminar",
            Permission::EmpleadosVer => "empleados.ver",
            Permission::EmpleadosCrear => "empleados.crear",
            Permission::EmpleadosEditar => "empleados.editar",
            Permission::EmpleadosEliminar => "empleados.eliminar",
            Permission::OrdenesVer => "ordenes.ver",
            Permission::OrdenesCrear => "ordenes.crear",
            Permission::OrdenesEditar => "ordenes.editar",
            Permission::OrdenesEliminar => "ordenes.eliminar",
            Permission::ReportesVer => "reportes.ver",
            Permission::ReportesGenerar => "reportes.generar",
            Permission::ReportesExportar => "reportes.exportar",
        }
    }
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_RECEPCION: &str = "recepcion";
pub const ROLE_MECANICO: &str = "mecanico";

/// Permissions granted by each seeded role.
pub fn role_preset(role_name: &str) -> Vec<Permission> {
    use Permission::*;
    match role_name {
        ROLE_ADMIN => Permission::ALL.to_vec(),
        ROLE_RECEPCION => vec![
            ClientesVer,
            ClientesCrear,
            ClientesEditar,
            VehiculosVer,
            VehiculosCrear,
            VehiculosEditar,
            ServiciosVer,
            EmpleadosVer,
            OrdenesVer,
            OrdenesCrear,
            OrdenesEditar,
            ReportesVer,
        ],
        ROLE_MECANICO => vec![ClientesVer, VehiculosVer, ServiciosVer, OrdenesVer, OrdenesEditar],
        _ => Vec::new(),
    }
}

/// Names of every permission the user holds through any of their roles.
pub async fn permissions_for_user<C>(db: &C, user_id: i64) -> Result<HashSet<String>, DbErr>
where
    C: ConnectionTrait,
{
    let role_ids: Vec<i64> = user_role::Entity::find()
        .filter(user_role::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.role_id)
        .collect();

    if role_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let permission_ids: Vec<i64> = role_permission::Entity::find()
        .filter(role_permission::Column::RoleId.is_in(role_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|link| link.permission_id)
        .collect();

    if permission_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let names = permission::Entity::find()
        .filter(permission::Column::Id.is_in(permission_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|p| p.name)
        .collect();

    Ok(names)
}

/// Inserts the permission catalogue and the preset roles. Safe to run repeatedly.
pub async fn seed_roles<C>(db: &C) -> Result<(), DbErr>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;

    for perm in Permission::ALL {
        find_or_create_permission(&txn, perm.as_str()).await?;
    }

    for role_name in [ROLE_ADMIN, ROLE_RECEPCION, ROLE_MECANICO] {
        let role = find_or_create_role(&txn, role_name).await?;
        for perm in role_preset(role_name) {
            let permission = find_or_create_permission(&txn, perm.as_str()).await?;
            let existing = role_permission::Entity::find_by_id((role.id, permission.id))
                .one(&txn)
                .await?;
            if existing.is_none() {
                role_permission::Entity::insert(role_permission::ActiveModel {
                    role_id: Set(role.id),
                    permission_id: Set(permission.id),
                })
                .exec_without_returning(&txn)
                .await?;
            }
        }
        log::info!("seeded role {}", role_name);
    }

    txn.commit().await?;
    Ok(())
}

/// Links the user to the named role. Unknown roles are an error.
pub async fn assign_role<C>(db: &C, user_id: i64, role_name: &str) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    let role = role::Entity::find()
        .filter(role::Column::Name.eq(role_name))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("role {}", role_name)))?;

    let existing = user_role::Entity::find_by_id((user_id, role.id))
        .one(db)
        .await?;
    if existing.is_none() {
        user_role::Entity::insert(user_role::ActiveModel {
            user_id: Set(user_id),
            role_id: Set(role.id),
        })
        .exec_without_returning(db)
        .await?;
    }
    Ok(())
}

async fn find_or_create_role<C>(db: &C, name: &str) -> Result<role::Model, DbErr>
where
    C: ConnectionTrait,
{
    if let Some(existing) = role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await?
    {
        return Ok(existing);
    }
    role::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

async fn find_or_create_permission<C>(db: &C, name: &str) -> Result<permission::Model, DbErr>
where
    C: ConnectionTrait,
{
    if let Some(existing) = permission::Entity::find()
        .filter(permission::Column::Name.eq(name))
        .one(db)
        .await?
    {
        return Ok(existing);
    }
    permission::ActiveModel {
        name: Set(name.to_string()),
        ..Default::default()
    }
    .insert(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_namespaced() {
        let names: HashSet<&str> = Permission::ALL.iter().map(|p| p.as_str()).collect();
        assert_eq!(names.len(), Permission::ALL.len());
        assert!(names.iter().all(|name| name.contains('.')));
    }

    #[test]
    fn admin_holds_everything_and_mecanico_cannot_delete() {
        assert_eq!(role_preset(ROLE_ADMIN).len(), Permission::ALL.len());
        assert!(
            role_preset(ROLE_MECANICO)
                .iter()
                .all(|p| !p.as_str().ends_with(".eliminar"))
        );
        assert!(role_preset("invitado").is_empty());
    }
}

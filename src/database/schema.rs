//! Table creation straight from the entity definitions.

use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Schema, sea_query::Table};

use super::connector::DB;
use super::models::{
    cliente, empleado, orden_trabajo, permission, reporte, role, role_permission, servicio,
    session, user, user_role, vehiculo,
};

/// Creates every table that doesn't exist yet, parents before children.
pub async fn create_tables(db: &DB) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(session::Entity),
        schema.create_table_from_entity(role::Entity),
        schema.create_table_from_entity(permission::Entity),
        schema.create_table_from_entity(role_permission::Entity),
        schema.create_table_from_entity(user_role::Entity),
        schema.create_table_from_entity(cliente::Entity),
        schema.create_table_from_entity(empleado::Entity),
        schema.create_table_from_entity(servicio::Entity),
        schema.create_table_from_entity(vehiculo::Entity),
        schema.create_table_from_entity(orden_trabajo::Entity),
        schema.create_table_from_entity(reporte::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    log::info!("schema ready ({} tables)", statements.len());
    Ok(())
}

/// Drops every table, children before parents.
pub async fn drop_tables(db: &DB) -> Result<(), DbErr> {
    let backend = db.get_database_backend();

    drop_table(db, backend, reporte::Entity).await?;
    drop_table(db, backend, orden_trabajo::Entity).await?;
    drop_table(db, backend, vehiculo::Entity).await?;
    drop_table(db, backend, servicio::Entity).await?;
    drop_table(db, backend, empleado::Entity).await?;
    drop_table(db, backend, cliente::Entity).await?;
    drop_table(db, backend, user_role::Entity).await?;
    drop_table(db, backend, role_permission::Entity).await?;
    drop_table(db, backend, permission::Entity).await?;
    drop_table(db, backend, role::Entity).await?;
    drop_table(db, backend, session::Entity).await?;
    drop_table(db, backend, user::Entity).await?;

    Ok(())
}

async fn drop_table<E>(db: &DB, backend: sea_orm::DatabaseBackend, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let name = entity.table_name().to_string();
    let statement = Table::drop().table(entity).if_exists().to_owned();
    db.execute(backend.build(&statement)).await?;
    log::info!("dropped table {}", name);
    Ok(())
}

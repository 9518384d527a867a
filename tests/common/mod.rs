#![allow(dead_code)]

use actix_web::{cookie::Cookie, web};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use taller::{
    AppState,
    config::{Config, DatabaseSettings},
    database::{
        self, DB,
        models::{cliente, empleado, orden_trabajo, servicio, user, vehiculo},
        schema,
    },
    services::{
        auth::{self, NewUser, SESSION_COOKIE},
        permissions,
    },
};

pub const PASSWORD: &str = "password123";

/// Fresh in-memory database with the schema and the preset roles.
pub async fn setup_db() -> DB {
    let settings = DatabaseSettings::for_url("sqlite::memory:");
    let db = database::connect_with_settings(&settings)
        .await
        .expect("in-memory sqlite");
    schema::create_tables(&db).await.expect("schema");
    permissions::seed_roles(&db).await.expect("roles");
    db
}

pub fn app_state(db: &DB) -> web::Data<AppState> {
    web::Data::new(AppState {
        db: db.clone(),
        config: Config::default(),
    })
}

/// Builds the application the way the server does, minus logging.
macro_rules! init_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(taller::api::middleware::MethodOverride)
                .wrap(taller::api::middleware::RequestId)
                .wrap(taller::api::normalize_path())
                .app_data($state.clone())
                .app_data(taller::api::json_config(2 * 1024 * 1024))
                .app_data(taller::api::form_config(2 * 1024 * 1024))
                .configure(taller::api::configure),
        )
        .await
    };
}
pub(crate) use init_app;

/// Creates a user whose password is [`PASSWORD`], optionally with a role.
pub async fn create_user(db: &DB, name: &str, email: &str, verified: bool, role: Option<&str>) -> user::Model {
    let hash = auth::hash_password_with_cost(PASSWORD, 4).expect("hash");
    let account = auth::create_user(
        db,
        NewUser {
            name,
            email,
            password: PASSWORD,
            verified,
        },
        hash,
    )
    .await
    .expect("user");
    if let Some(role) = role {
        permissions::assign_role(db, account.id, role).await.expect("role");
    }
    account
}

pub async fn admin(db: &DB) -> user::Model {
    create_user(db, "Admin", "admin@taller.test", true, Some(permissions::ROLE_ADMIN)).await
}

/// Session cookie for an already logged-in `user_id`.
pub async fn login(db: &DB, user_id: i64) -> Cookie<'static> {
    let session = auth::start_session(db, user_id, chrono::Duration::minutes(30))
        .await
        .expect("session");
    Cookie::new(SESSION_COOKIE, session.id)
}

pub async fn seed_cliente(db: &DB, name: &str, document_number: &str) -> cliente::Model {
    let now = Utc::now();
    cliente::ActiveModel {
        name: Set(name.to_string()),
        email: Set(None),
        phone: Set(None),
        address: Set(None),
        document_number: Set(document_number.to_string()),
        status: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("cliente")
}

pub async fn seed_vehiculo(db: &DB, cliente_id: i64, plate: &str) -> vehiculo::Model {
    let now = Utc::now();
    vehiculo::ActiveModel {
        cliente_id: Set(cliente_id),
        brand: Set("Toyota".to_string()),
        model: Set("Corolla".to_string()),
        year: Set(2018),
        license_plate: Set(plate.to_string()),
        vin: Set(None),
        color: Set(Some("Rojo".to_string())),
        status: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("vehiculo")
}

pub async fn seed_empleado(db: &DB, name: &str) -> empleado::Model {
    let now = Utc::now();
    empleado::ActiveModel {
        name: Set(name.to_string()),
        email: Set(None),
        phone: Set(None),
        position: Set("Mecánico".to_string()),
        salary: Set(Decimal::new(150000000, 2)),
        hire_date: Set(chrono::NaiveDate::from_ymd_opt(2022, 3, 1).expect("date")),
        status: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("empleado")
}

pub async fn seed_servicio(db: &DB, name: &str, price: Decimal) -> servicio::Model {
    let now = Utc::now();
    servicio::ActiveModel {
        name: Set(name.to_string()),
        description: Set(None),
        price: Set(price),
        duration_hours: Set(Decimal::new(150, 2)),
        status: Set(true),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("servicio")
}

/// Pending work order started on 2024-05-10, priced at the service's price.
pub async fn seed_orden(
    db: &DB,
    owner: &cliente::Model,
    car: &vehiculo::Model,
    mechanic: &empleado::Model,
    service: &servicio::Model,
) -> orden_trabajo::Model {
    let now = Utc::now();
    orden_trabajo::ActiveModel {
        cliente_id: Set(owner.id),
        vehiculo_id: Set(car.id),
        empleado_id: Set(mechanic.id),
        servicio_id: Set(service.id),
        description: Set(None),
        status: Set("pendiente".to_string()),
        total_amount: Set(service.price),
        start_date: Set(chrono::NaiveDate::from_ymd_opt(2024, 5, 10).expect("date")),
        end_date: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("orden")
}

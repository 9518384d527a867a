use actix_web::{App, HttpServer, middleware, web};
use dotenvy::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use taller::{
    AppState,
    api::{
        self, ApiDoc,
        middleware::{MethodOverride, RequestId},
    },
    config::Config,
    database::{self, schema},
};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let db = database::connect().await?;

    if config.auto_migrate.unwrap_or(false) {
        schema::create_tables(&db)
            .await
            .map_err(|e| std::io::Error::other(format!("Failed to create tables: {}", e)))?;
    }

    let host = config.host.clone();
    let port = config.port;
    let workers = config.effective_workers();
    let body_limit = config.effective_max_body_bytes();

    log::info!(
        "Starting {} at http://{}:{} ({} workers)",
        config.effective_app_name(),
        host,
        port,
        workers
    );
    log::info!("Swagger UI available at http://{}:{}/swagger-ui/index.html", host, port);

    let state = web::Data::new(AppState { db, config });

    HttpServer::new(move || {
        App::new()
            .wrap(MethodOverride)
            .wrap(RequestId)
            .wrap(api::normalize_path())
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .app_data(api::json_config(body_limit))
            .app_data(api::form_config(body_limit))
            .configure(api::configure)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}

mod common;

use actix_web::{
    http::{StatusCode, header},
    test,
};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, PaginatorTrait, Set};
use serde_json::{Value, json};
use taller::{database::models::{cliente, reporte}, services::permissions::ROLE_RECEPCION};

use common::{admin, app_state, create_user, init_app, login, seed_cliente, setup_db};

#[actix_web::test]
async fn generating_a_report_stores_it_and_returns_the_table() {
    let db = setup_db().await;
    let cookie = login(&db, admin(&db).await.id).await;
    seed_cliente(&db, "Ana", "111").await;
    let inactive = seed_cliente(&db, "Luis", "222").await;
    let mut active = inactive.into_active_model();
    active.status = Set(false);
    active.update(&db).await.unwrap();
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/reportes/generar")
        .cookie(cookie)
        .set_json(json!({
            "name": "Clientes activos",
            "type": "clientes",
            "filters": {"status": true}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["report"]["type"], "clientes");
    assert_eq!(body["table"]["count"], 1);
    assert_eq!(body["table"]["rows"].as_array().unwrap().len(), 1);
    assert_eq!(reporte::Entity::find().count(&db).await.unwrap(), 1);
    assert_eq!(cliente::Entity::find().count(&db).await.unwrap(), 2);
}

#[actix_web::test]
async fn unknown_report_type_is_rejected() {
    let db = setup_db().await;
    let cookie = login(&db, admin(&db).await.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/reportes/generar")
        .cookie(cookie.clone())
        .set_json(json!({"name": "Inventario", "type": "repuestos"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["type"].is_array());

    let req = test::TestRequest::post()
        .uri("/reportes/generar")
        .cookie(cookie)
        .set_json(json!({
            "name": "Órdenes",
            "type": "ordenes",
            "filters": {"desde": "2024-06-01", "hasta": "2024-05-01"}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]["filters.hasta"].is_array());
    assert_eq!(reporte::Entity::find().count(&db).await.unwrap(), 0);
}

#[actix_web::test]
async fn reports_export_as_pdf() {
    let db = setup_db().await;
    let cookie = login(&db, admin(&db).await.id).await;
    seed_cliente(&db, "Ana", "111").await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/reportes/generar")
        .cookie(cookie.clone())
        .set_json(json!({"name": "Todos los clientes", "type": "clientes"}))
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let id = created["report"]["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/reportes/exportar/{}", id))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get(header::CONTENT_TYPE).unwrap(), "application/pdf");
    let disposition = resp
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment"));
    assert!(disposition.contains(&format!("reporte-{}.pdf", id)));

    let bytes = test::read_body(resp).await;
    assert!(bytes.starts_with(b"%PDF-"));
    assert!(bytes.ends_with(b"%%EOF\n"));

    let req = test::TestRequest::get()
        .uri("/reportes/exportar/9999")
        .cookie(cookie)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn recepcion_can_list_but_not_generate() {
    let db = setup_db().await;
    let clerk = create_user(&db, "Recepción", "recepcion@taller.test", true, Some(ROLE_RECEPCION)).await;
    let cookie = login(&db, clerk.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::get()
        .uri("/reportes")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page: Value = test::read_body_json(resp).await;
    assert_eq!(page["total"], 0);
    assert_eq!(page["last_page"], 1);

    let req = test::TestRequest::post()
        .uri("/reportes/generar")
        .cookie(cookie)
        .set_json(json!({"name": "Clientes", "type": "clientes"}))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);
}

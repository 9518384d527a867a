mod common;

use actix_web::{
    http::{StatusCode, header},
    test,
};
use sea_orm::EntityTrait;
use taller::database::models::{session, user};

use common::{PASSWORD, app_state, create_user, init_app, login, setup_db};

fn location<B>(resp: &actix_web::dev::ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

async fn body_text<B: actix_web::body::MessageBody>(resp: actix_web::dev::ServiceResponse<B>) -> String {
    String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
}

#[actix_web::test]
async fn profile_page_is_displayed() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::get().uri("/profile").cookie(cookie).to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains(r#"value="Test User""#));
    assert!(html.contains(r#"value="test@example.com""#));
    assert!(html.contains(r#"action="/password?_method=PUT""#));
}

#[actix_web::test]
async fn profile_information_can_be_updated() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", "Nuevo Nombre"), ("email", "nuevo@example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/profile?status=profile-updated");

    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.name, "Nuevo Nombre");
    assert_eq!(stored.email, "nuevo@example.com");
    assert!(stored.email_verified_at.is_none());
}

#[actix_web::test]
async fn verification_status_is_kept_when_email_is_unchanged() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", "Test User"), ("email", "test@example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert!(stored.email_verified_at.is_some());
}

#[actix_web::test]
async fn name_is_required() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", ""), ("email", "test@example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(resp).await;
    assert!(html.contains(r#"data-error="name""#));
    assert!(!html.contains(r#"data-error="email""#));

    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.name, "Test User");
}

#[actix_web::test]
async fn email_is_required() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", "Test User"), ("email", "   ")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(resp).await;
    assert!(html.contains(r#"data-error="email""#));
    assert!(html.contains("The email field is required."));
}

#[actix_web::test]
async fn email_must_be_well_formed() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", "Test User"), ("email", "not-an-email")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(resp).await;
    assert!(html.contains("The email field must be a valid email address."));
}

#[actix_web::test]
async fn email_must_be_unique_ignoring_case() {
    let db = setup_db().await;
    create_user(&db, "Other", "taken@example.com", true, None).await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", "Test User"), ("email", "TAKEN@Example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(resp).await;
    assert!(html.contains("The email has already been taken."));

    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.email, "test@example.com");
}

#[actix_web::test]
async fn name_longer_than_255_characters_is_rejected() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let long_name = "a".repeat(256);
    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", long_name.as_str()), ("email", "test@example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(resp).await;
    assert!(html.contains("The name field must not be greater than 255 characters."));
}

#[actix_web::test]
async fn email_is_saved_in_lowercase() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::patch()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("name", "Test User"), ("email", "TEST@EXAMPLE.COM")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.email, "test@example.com");
    // Same address once normalized, so still verified.
    assert!(stored.email_verified_at.is_some());
}

#[actix_web::test]
async fn guests_are_sent_to_login() {
    let db = setup_db().await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::get().uri("/profile").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");

    let req = test::TestRequest::patch()
        .uri("/profile")
        .set_form([("name", "Intruso"), ("email", "intruso@example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");
}

#[actix_web::test]
async fn html_forms_reach_patch_through_method_override() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/profile?_method=PATCH")
        .cookie(cookie)
        .set_form([("name", "Por Formulario"), ("email", "test@example.com")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert_eq!(stored.name, "Por Formulario");
}

#[actix_web::test]
async fn password_can_be_changed() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::put()
        .uri("/password")
        .cookie(cookie.clone())
        .set_form([
            ("current_password", "wrong-password"),
            ("password", "nueva-clave-1"),
            ("password_confirmation", "nueva-clave-1"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(resp).await;
    assert!(html.contains(r#"data-error="updatePassword.current_password""#));

    let req = test::TestRequest::put()
        .uri("/password")
        .cookie(cookie)
        .set_form([
            ("current_password", PASSWORD),
            ("password", "nueva-clave-1"),
            ("password_confirmation", "nueva-clave-1"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/profile?status=password-updated");

    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert!(taller::services::auth::verify_password("nueva-clave-1", &stored.password_hash));
}

#[actix_web::test]
async fn account_deletion_requires_the_password() {
    let db = setup_db().await;
    let account = create_user(&db, "Test User", "test@example.com", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::delete()
        .uri("/profile")
        .cookie(cookie.clone())
        .set_form([("password", "wrong-password")])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let html = body_text(resp).await;
    assert!(html.contains(r#"data-error="userDeletion.password""#));
    assert!(user::Entity::find_by_id(account.id).one(&db).await.unwrap().is_some());

    let req = test::TestRequest::delete()
        .uri("/profile")
        .cookie(cookie)
        .set_form([("password", PASSWORD)])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");

    assert!(user::Entity::find_by_id(account.id).one(&db).await.unwrap().is_none());
    assert!(session::Entity::find().all(&db).await.unwrap().is_empty());
}

mod common;

use actix_web::{
    cookie::Cookie,
    dev::ServiceResponse,
    http::{StatusCode, header},
    test,
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use taller::{
    database::models::{session, user},
    services::auth::SESSION_COOKIE,
};

use common::{PASSWORD, app_state, create_user, init_app, login, setup_db};

fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.into_owned())
}

async fn body_text<B: actix_web::body::MessageBody>(resp: ServiceResponse<B>) -> String {
    String::from_utf8(test::read_body(resp).await.to_vec()).unwrap()
}

#[actix_web::test]
async fn login_page_is_rendered_for_guests() {
    let db = setup_db().await;
    let app = init_app!(app_state(&db));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/login").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = body_text(resp).await;
    assert!(html.contains(r#"name="email""#));
    assert!(html.contains(r#"name="password""#));
}

#[actix_web::test]
async fn users_can_log_in_with_valid_credentials() {
    let db = setup_db().await;
    let account = create_user(&db, "Ana", "ana@taller.test", true, None).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("email", "ANA@taller.test"), ("password", PASSWORD)])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");
    let cookie = session_cookie(&resp).expect("session cookie");
    assert!(cookie.http_only().unwrap_or(false));

    let stored = session::Entity::find_by_id(cookie.value().to_string())
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.user_id, account.id);
}

#[actix_web::test]
async fn wrong_password_is_rejected() {
    let db = setup_db().await;
    create_user(&db, "Ana", "ana@taller.test", true, None).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/login")
        .set_form([("email", "ana@taller.test"), ("password", "incorrecta")])
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(session_cookie(&resp).is_none());
    let html = body_text(resp).await;
    assert!(html.contains("These credentials do not match our records."));
    assert!(session::Entity::find().all(&db).await.unwrap().is_empty());
}

#[actix_web::test]
async fn registration_then_email_verification() {
    let db = setup_db().await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/register")
        .set_form([
            ("name", "Nueva Usuaria"),
            ("email", "nueva@taller.test"),
            ("password", "clave-segura"),
            ("password_confirmation", "clave-segura"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard");
    let cookie = session_cookie(&resp).expect("session cookie");

    let account = user::Entity::find()
        .filter(user::Column::Email.eq("nueva@taller.test"))
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert!(account.email_verified_at.is_none());
    let token = account.verification_token.clone().expect("token issued");

    // Unverified accounts wait on the notice page.
    let req = test::TestRequest::get()
        .uri("/dashboard")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/verify-email");

    let req = test::TestRequest::get()
        .uri(&format!("/verify-email/{}/not-the-token", account.id))
        .cookie(cookie.clone())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::FORBIDDEN);

    let req = test::TestRequest::get()
        .uri(&format!("/verify-email/{}/{}", account.id, token))
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/dashboard?verified=1");

    let req = test::TestRequest::get()
        .uri("/dashboard")
        .cookie(cookie)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn registration_validates_the_form() {
    let db = setup_db().await;
    create_user(&db, "Ana", "ana@taller.test", true, None).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/register")
        .set_form([
            ("name", ""),
            ("email", "Ana@Taller.test"),
            ("password", "corta"),
            ("password_confirmation", "distinta"),
        ])
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let html = body_text(resp).await;
    assert!(html.contains(r#"data-error="name""#));
    assert!(html.contains("The email has already been taken."));
    assert!(html.contains("The password field must be at least 8 characters."));
}

#[actix_web::test]
async fn verification_link_can_be_resent() {
    let db = setup_db().await;
    let account = create_user(&db, "Ana", "ana@taller.test", false, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/email/verification-notification")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/verify-email?status=verification-link-sent");

    let stored = user::Entity::find_by_id(account.id).one(&db).await.unwrap().unwrap();
    assert!(stored.verification_token.is_some());

    let req = test::TestRequest::get()
        .uri("/verify-email?status=verification-link-sent")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_text(resp).await.contains(r#"data-status="verification-link-sent""#));
}

#[actix_web::test]
async fn logout_ends_the_session() {
    let db = setup_db().await;
    let account = create_user(&db, "Ana", "ana@taller.test", true, None).await;
    let cookie = login(&db, account.id).await;
    let app = init_app!(app_state(&db));

    let req = test::TestRequest::post()
        .uri("/logout")
        .cookie(cookie.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&resp), "/");
    assert!(session::Entity::find().all(&db).await.unwrap().is_empty());

    let req = test::TestRequest::get()
        .uri("/profile")
        .cookie(cookie)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");
}

use crate::{api::validation::FieldErrors, database::models::user};

use super::{escape, field_error, layout, text_input};

pub fn login_page(app_name: &str, email: &str, errors: &FieldErrors) -> String {
    let body = format!(
        r#"<form method="POST" action="/login">
{email}
{email_error}
{password}
{password_error}
<button type="submit">Ingresar</button>
</form>
<p><a href="/register">Crear una cuenta</a></p>"#,
        email = text_input("email", "email", "Email", email),
        email_error = field_error(errors, "email", "email"),
        password = text_input("password", "password", "Contraseña", ""),
        password_error = field_error(errors, "password", "password"),
    );
    layout(app_name, "Ingresar", None, &body)
}

pub fn register_page(app_name: &str, name: &str, email: &str, errors: &FieldErrors) -> String {
    let body = format!(
        r#"<form method="POST" action="/register">
{name}
{name_error}
{email}
{email_error}
{password}
{password_error}
{confirmation}
<button type="submit">Registrarse</button>
</form>
<p><a href="/login">¿Ya tienes cuenta?</a></p>"#,
        name = text_input("text", "name", "Nombre", name),
        name_error = field_error(errors, "name", "name"),
        email = text_input("email", "email", "Email", email),
        email_error = field_error(errors, "email", "email"),
        password = text_input("password", "password", "Contraseña", ""),
        password_error = field_error(errors, "password", "password"),
        confirmation = text_input("password", "password_confirmation", "Confirmar contraseña", ""),
    );
    layout(app_name, "Registro", None, &body)
}

pub fn verify_notice_page(app_name: &str, account: &user::Model, status: Option<&str>) -> String {
    let notice = match status {
        Some("verification-link-sent") => {
            r#"<p class="status" data-status="verification-link-sent">Se envió un nuevo enlace de verificación a tu correo.</p>"#
        }
        _ => "",
    };
    let body = format!(
        r#"<p>Gracias por registrarte. Antes de continuar, verifica tu dirección de correo <strong>{email}</strong> con el enlace que te enviamos.</p>
{notice}
<form method="POST" action="/email/verification-notification">
<button type="submit">Reenviar enlace de verificación</button>
</form>"#,
        email = escape(&account.email),
        notice = notice,
    );
    layout(app_name, "Verificar correo", Some(account), &body)
}

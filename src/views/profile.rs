use crate::{api::validation::FieldErrors, database::models::user};

use super::{field_error, layout, text_input};

/// Everything the profile page shows. The three forms keep separate error bags
/// so a failed password change doesn't mark the profile fields.
pub struct ProfilePage<'a> {
    pub account: &'a user::Model,
    pub name: &'a str,
    pub email: &'a str,
    pub status: Option<&'a str>,
    pub profile_errors: &'a FieldErrors,
    pub password_errors: &'a FieldErrors,
    pub deletion_errors: &'a FieldErrors,
}

impl<'a> ProfilePage<'a> {
    /// The page as first shown, filled from the stored account.
    pub fn for_account(account: &'a user::Model, status: Option<&'a str>, empty: &'a FieldErrors) -> Self {
        Self {
            account,
            name: &account.name,
            email: &account.email,
            status,
            profile_errors: empty,
            password_errors: empty,
            deletion_errors: empty,
        }
    }
}

fn status_notice(status: Option<&str>) -> &'static str {
    match status {
        Some("profile-updated") => r#"<p class="status" data-status="profile-updated">Perfil actualizado.</p>"#,
        Some("password-updated") => r#"<p class="status" data-status="password-updated">Contraseña actualizada.</p>"#,
        Some("verification-link-sent") => {
            r#"<p class="status" data-status="verification-link-sent">Se envió un nuevo enlace de verificación.</p>"#
        }
        _ => "",
    }
}

pub fn profile_page(app_name: &str, page: &ProfilePage<'_>) -> String {
    let unverified = if page.account.email_verified_at.is_none() {
        r#"<p>Tu correo no está verificado.</p>
<form method="POST" action="/email/verification-notification"><button type="submit">Reenviar enlace</button></form>"#
    } else {
        ""
    };

    let body = format!(
        r#"{notice}
<section id="profile-information">
<h2>Información del perfil</h2>
<form method="POST" action="/profile?_method=PATCH">
{name}
{name_error}
{email}
{email_error}
<button type="submit">Guardar</button>
</form>
{unverified}
</section>

<section id="update-password">
<h2>Actualizar contraseña</h2>
<form method="POST" action="/password?_method=PUT">
{current}
{current_error}
{password}
{password_error}
{confirmation}
<button type="submit">Guardar</button>
</form>
</section>

<section id="delete-account">
<h2>Eliminar cuenta</h2>
<p>Una vez eliminada la cuenta, todos sus datos se borrarán de forma permanente.</p>
<form method="POST" action="/profile?_method=DELETE">
{delete_password}
{delete_error}
<button type="submit">Eliminar cuenta</button>
</form>
</section>"#,
        notice = status_notice(page.status),
        name = text_input("text", "name", "Nombre", page.name),
        name_error = field_error(page.profile_errors, "name", "name"),
        email = text_input("email", "email", "Email", page.email),
        email_error = field_error(page.profile_errors, "email", "email"),
        unverified = unverified,
        current = text_input("password", "current_password", "Contraseña actual", ""),
        current_error = field_error(
            page.password_errors,
            "current_password",
            "updatePassword.current_password"
        ),
        password = text_input("password", "password", "Nueva contraseña", ""),
        password_error = field_error(page.password_errors, "password", "updatePassword.password"),
        confirmation = text_input("password", "password_confirmation", "Confirmar contraseña", ""),
        delete_password = text_input("password", "password", "Contraseña", ""),
        delete_error = field_error(page.deletion_errors, "password", "userDeletion.password"),
    );

    layout(
        app_name,
        &format!("Perfil de {}", page.account.name),
        Some(page.account),
        &body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn account() -> user::Model {
        user::Model {
            id: 1,
            name: "Ana <Admin>".to_string(),
            email: "ana@taller.test".to_string(),
            password_hash: String::new(),
            email_verified_at: Some(Utc::now()),
            verification_token: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn renders_three_forms_with_escaped_values() {
        let account = account();
        let empty = FieldErrors::new();
        let page = ProfilePage::for_account(&account, Some("profile-updated"), &empty);
        let html = profile_page("Taller", &page);

        assert!(html.contains(r#"action="/profile?_method=PATCH""#));
        assert!(html.contains(r#"action="/password?_method=PUT""#));
        assert!(html.contains(r#"action="/profile?_method=DELETE""#));
        assert!(html.contains("Ana &lt;Admin&gt;"));
        assert!(html.contains(r#"data-status="profile-updated""#));
    }

    #[test]
    fn password_errors_stay_in_their_form() {
        let account = account();
        let empty = FieldErrors::new();
        let mut password_errors = FieldErrors::new();
        password_errors.add("password", "The password field must be at least 8 characters.");
        let page = ProfilePage {
            password_errors: &password_errors,
            ..ProfilePage::for_account(&account, None, &empty)
        };
        let html = profile_page("Taller", &page);

        assert!(html.contains(r#"data-error="updatePassword.password""#));
        assert!(!html.contains(r#"data-error="userDeletion.password""#));
        assert!(!html.contains(r#"data-error="name""#));
    }
}

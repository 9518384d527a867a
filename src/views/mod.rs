//! Server-rendered pages. Markup is built with `format!` and every
//! user-supplied value goes through [`escape`].

pub mod auth;
pub mod dashboard;
pub mod profile;

use actix_web::{HttpResponse, http::StatusCode};

use crate::{api::validation::FieldErrors, database::models::user};

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}

/// Wraps a page body with the shared head and navigation.
pub fn layout(app_name: &str, title: &str, current_user: Option<&user::Model>, body: &str) -> String {
    let nav = match current_user {
        Some(account) => format!(
            r#"<nav>
  <a href="/dashboard">Dashboard</a>
  <a href="/profile">{name}</a>
  <form method="POST" action="/logout" class="inline"><button type="submit">Cerrar sesión</button></form>
</nav>"#,
            name = escape(&account.name)
        ),
        None => r#"<nav><a href="/login">Ingresar</a> <a href="/register">Registrarse</a></nav>"#
            .to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="es">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{title} - {app}</title>
</head>
<body>
<header><strong>{app}</strong> {nav}</header>
<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
        app = escape(app_name),
        nav = nav,
        body = body
    )
}

/// The first message recorded for `field`, tagged so it can be located in the page.
pub fn field_error(errors: &FieldErrors, field: &str, marker: &str) -> String {
    match errors.first(field) {
        Some(message) => format!(
            r#"<p class="error" data-error="{}">{}</p>"#,
            escape(marker),
            escape(message)
        ),
        None => String::new(),
    }
}

pub fn text_input(kind: &str, name: &str, label: &str, value: &str) -> String {
    format!(
        r#"<label for="{name}">{label}</label>
<input id="{name}" type="{kind}" name="{name}" value="{value}">"#,
        kind = kind,
        name = escape(name),
        label = escape(label),
        value = escape(value)
    )
}

pub fn html(status: StatusCode, page: String) -> HttpResponse {
    HttpResponse::build(status)
        .content_type("text/html; charset=utf-8")
        .body(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<a href="x">O'Neil & co</a>"#),
            "&lt;a href=&quot;x&quot;&gt;O&#x27;Neil &amp; co&lt;/a&gt;"
        );
    }

    #[test]
    fn field_error_renders_only_recorded_fields() {
        let mut errors = FieldErrors::new();
        errors.add("email", "The email field is required.");
        assert!(field_error(&errors, "email", "email").contains(r#"data-error="email""#));
        assert!(field_error(&errors, "name", "name").is_empty());
    }
}

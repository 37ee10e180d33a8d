use actix_web::{http::header, web::Data, HttpRequest, HttpResponse};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use monobank_exporter_domain::config::BasicAuthCredentials;
use tracing::warn;

use crate::state::AppState;

use super::ApiError;

pub async fn metrics_handler(
    req: HttpRequest,
    state: Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    authorize(&req, state.basic_auth())?;
    let body = state.telemetry().render_metrics();
    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

/// Open when credentials are not configured.
fn authorize(req: &HttpRequest, credentials: &BasicAuthCredentials) -> Result<(), ApiError> {
    if !credentials.is_enabled() {
        return Ok(());
    }

    let (username, password) = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_auth)
        .ok_or(ApiError::Unauthorized)?;

    if credentials.matches(&username, &password) {
        Ok(())
    } else {
        warn!(username = %username, "rejected metrics scrape with wrong credentials");
        Err(ApiError::Unauthorized)
    }
}

fn parse_basic_auth(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::parse_basic_auth;

    #[test]
    fn parses_basic_header() {
        // "user:p:ss" keeps colons in the password.
        assert_eq!(
            parse_basic_auth("Basic dXNlcjpwOnNz"),
            Some(("user".to_string(), "p:ss".to_string()))
        );
        assert_eq!(
            parse_basic_auth("basic dXNlcjpwOnNz"),
            Some(("user".to_string(), "p:ss".to_string()))
        );
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        assert_eq!(parse_basic_auth("Bearer dXNlcjpwOnNz"), None);
        assert_eq!(parse_basic_auth("Basic !!!"), None);
        // "nocolon"
        assert_eq!(parse_basic_auth("Basic bm9jb2xvbg=="), None);
        assert_eq!(parse_basic_auth(""), None);
    }
}

//! OIDC login exchange and session minting (§6 `POST /auth`), replacing
//! the bearer/device-token style of auth with a browser-facing
//! session-cookie flow.
//!
//! Full OIDC verification (nonce replay, discovery) is intentionally out
//! of scope, mirroring `original_source/endpoint_auth.go::handleAuth`'s
//! own scope — this is the thinnest layer that turns a posted `id_token`
//! into a `(userId, name, email, yearGroup)` tuple plus a session cookie.

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use cca_protocol::YearGroup;
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{decode, decode_header, DecodingKey, Validation};
use rand::RngCore;
use serde::Deserialize;

use crate::config::ServerConfig;
use crate::state::AppState;

const SESSION_TOKEN_BYTES: usize = 20;

#[derive(Debug, Deserialize)]
struct AuthForm {
    error: Option<String>,
    error_description: Option<String>,
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MsClaims {
    name: String,
    email: String,
    oid: String,
    #[serde(default)]
    groups: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AuthError::Db(e) => {
                tracing::error!(error = %e, "database error during authentication");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response()
            }
        }
    }
}

/// The redirect target for unauthenticated visitors, grounded on
/// `endpoint_auth.go::generateAuthorizationURL`.
pub fn generate_authorization_url(config: &ServerConfig) -> String {
    let nonce = random_token();
    format!(
        "{}?client_id={}&response_type=id_token&redirect_uri={}/auth&response_mode=form_post&scope=openid+profile+email&nonce={}",
        config.auth.authorize, config.auth.client, config.url, nonce
    )
}

fn random_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

async fn fetch_jwks(jwks_url: &str) -> Result<JwkSet, AuthError> {
    reqwest::get(jwks_url)
        .await
        .map_err(|e| AuthError::BadRequest(format!("fetching JWKS: {e}")))?
        .json::<JwkSet>()
        .await
        .map_err(|e| AuthError::BadRequest(format!("parsing JWKS: {e}")))
}

fn verify_id_token(id_token: &str, jwks: &JwkSet) -> Result<MsClaims, AuthError> {
    let header = decode_header(id_token).map_err(|e| AuthError::BadRequest(format!("malformed JWT: {e}")))?;
    let kid = header
        .kid
        .ok_or_else(|| AuthError::BadRequest("JWT is missing a key id".to_owned()))?;
    let jwk = jwks
        .find(&kid)
        .ok_or_else(|| AuthError::BadRequest("unknown signing key".to_owned()))?;
    let key = DecodingKey::from_jwk(jwk).map_err(|e| AuthError::BadRequest(format!("unusable signing key: {e}")))?;

    let mut validation = Validation::new(header.alg);
    validation.validate_aud = false;

    let data = decode::<MsClaims>(id_token, &key, &validation)
        .map_err(|e| AuthError::BadRequest(format!("invalid JWT: {e}")))?;
    Ok(data.claims)
}

/// Maps an Azure AD group claim, or a per-user override, to a year group
/// label. Grounded on
/// `endpoint_auth.go::getDepartmentByGroups`/`getDepartmentByUserIDOverride`;
/// the override takes priority, as in the original.
fn year_group_for_claims(config: &ServerConfig, oid: &str, groups: &[String]) -> Option<YearGroup> {
    if let Some(label) = config.auth.udepts.get(oid) {
        return YearGroup::parse(label);
    }
    groups
        .iter()
        .find_map(|g| config.auth.depts.get(g))
        .and_then(|label| YearGroup::parse(label))
}

/// `GET /auth` — the link an unauthenticated visitor follows to start the
/// login flow; redirects to the IdP's `authorize` endpoint, which posts
/// back to `POST /auth` with the id token.
pub async fn begin_auth(State(state): State<AppState>) -> Response {
    let url = generate_authorization_url(&state.config);
    (StatusCode::SEE_OTHER, [(header::LOCATION, url)]).into_response()
}

pub async fn handle_auth(State(state): State<AppState>, Form(form): Form<AuthForm>) -> Result<Response, AuthError> {
    if let Some(err) = form.error.filter(|e| !e.is_empty()) {
        let detail = form.error_description.unwrap_or_default();
        return Err(AuthError::BadRequest(format!("{err}: {detail}")));
    }
    let id_token = form
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::BadRequest("missing id_token".to_owned()))?;

    let jwks = fetch_jwks(&state.config.auth.jwks).await?;
    let claims = verify_id_token(&id_token, &jwks)?;

    let year_group = year_group_for_claims(&state.config, &claims.oid, &claims.groups)
        .ok_or_else(|| AuthError::BadRequest("unknown department".to_owned()))?;

    crate::repo::users::upsert(
        &state.pool,
        &claims.oid,
        &claims.name,
        &claims.email,
        year_group.as_str(),
    )
    .await?;

    let cookie_value = random_token();
    let expr = now_epoch() + state.config.auth.expr as i64;
    crate::repo::sessions::create(&state.pool, &claims.oid, &cookie_value, expr).await?;

    let secure = if state.config.prod { "; Secure" } else { "" };
    let cookie_name = &state.config.auth.token;
    let cookie = format!(
        "{cookie_name}={cookie_value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{secure}",
        state.config.auth.expr
    );

    Ok((
        StatusCode::SEE_OTHER,
        [(header::LOCATION, "/".to_owned()), (header::SET_COOKIE, cookie)],
    )
        .into_response())
}

/// Picks a single named cookie's value out of the request's `Cookie`
/// header, grounded on the plain `net/http` cookie jar
/// `endpoint_auth.go` relies on — no dependency on a cookie-jar crate.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|kv| {
        let (k, v) = kv.trim().split_once('=')?;
        (k == name).then(|| v.to_owned())
    })
}

/// Resolves a session cookie value to its owning user, used by the
/// WebSocket upgrade path (§4.5 step 1).
pub async fn resolve_session(
    pool: &sqlx::PgPool,
    cookie_value: &str,
) -> Result<Option<(String, YearGroup)>, sqlx::Error> {
    let Some(session) = crate::repo::sessions::resolve(pool, cookie_value).await? else {
        return Ok(None);
    };
    if session.expr <= now_epoch() {
        return Ok(None);
    }
    let Some(user) = crate::repo::users::get(pool, &session.user_id).await? else {
        return Ok(None);
    };
    let Some(year_group) = YearGroup::parse(&user.department) else {
        return Ok(None);
    };
    Ok(Some((user.id, year_group)))
}

fn now_epoch() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample_config(depts: HashMap<String, String>, udepts: HashMap<String, String>) -> ServerConfig {
        crate::config::load_config_from_str(&format!(
            r#"
            url = "https://cca.example.edu"
            prod = false
            [listen]
            addr = "0.0.0.0:8080"
            [db]
            type = "postgres"
            conn = "postgres://localhost/cca"
            [auth]
            client = "c"
            authorize = "https://login.example.edu/authorize"
            jwks = "https://login.example.edu/jwks"
            token = "session"
            expr = 604800
            {}
            [req.Y9]
            sport = 1
            non_sport = 1
            [req.Y10]
            sport = 1
            non_sport = 1
            [req.Y11]
            sport = 1
            non_sport = 1
            [req.Y12]
            sport = 1
            non_sport = 1
            "#,
            toml_table("auth.depts", &depts) + &toml_table("auth.udepts", &udepts)
        ))
        .expect("valid config")
    }

    fn toml_table(name: &str, map: &HashMap<String, String>) -> String {
        if map.is_empty() {
            return String::new();
        }
        let mut out = format!("[{name}]\n");
        for (k, v) in map {
            out.push_str(&format!("\"{k}\" = \"{v}\"\n"));
        }
        out
    }

    #[test]
    fn random_token_is_url_safe_and_nonempty() {
        let token = random_token();
        assert!(!token.is_empty());
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn authorization_url_embeds_client_and_redirect() {
        let config = sample_config(HashMap::new(), HashMap::new());
        let url = generate_authorization_url(&config);
        assert!(url.starts_with(&config.auth.authorize));
        assert!(url.contains("client_id=c"));
        assert!(url.contains(&format!("redirect_uri={}/auth", config.url)));
    }

    #[test]
    fn year_group_resolves_from_group_claim() {
        let mut depts = HashMap::new();
        depts.insert("group-y9".to_owned(), "Y9".to_owned());
        let config = sample_config(depts, HashMap::new());
        assert_eq!(
            year_group_for_claims(&config, "some-oid", &["group-y9".to_owned()]),
            Some(YearGroup::Y9)
        );
    }

    #[test]
    fn per_user_override_takes_priority_over_group_claim() {
        let mut depts = HashMap::new();
        depts.insert("group-y9".to_owned(), "Y9".to_owned());
        let mut udepts = HashMap::new();
        udepts.insert("staff-oid".to_owned(), "Staff".to_owned());
        let config = sample_config(depts, udepts);
        assert_eq!(
            year_group_for_claims(&config, "staff-oid", &["group-y9".to_owned()]),
            Some(YearGroup::Staff)
        );
    }

    #[test]
    fn unknown_group_claim_resolves_to_none() {
        let config = sample_config(HashMap::new(), HashMap::new());
        assert_eq!(year_group_for_claims(&config, "oid", &["unmapped".to_owned()]), None);
    }
}

//! Cookie sessions and the principal extractors handlers ask for.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use libris_authz::{hash_password, verify_password, Principal, PrincipalKind};
use libris_http::error::AppError;

use super::models::{Admin, Reader};
use super::store;
use crate::state::AppState;
use crate::utils::internal;

/// Signed-in, active reader.
pub struct CurrentReader(pub Reader);

/// Reader when a reader session is present; anonymous otherwise.
pub struct OptionalReader(pub Option<Reader>);

/// Signed-in, active admin.
pub struct CurrentAdmin(pub Admin);

/// Admin when an admin session is present. Used where the first admin
/// bootstraps the system without one.
pub struct MaybeAdmin(pub Option<Admin>);

async fn principal(parts: &Parts, state: &AppState) -> Result<Option<Principal>, AppError> {
    let jar = CookieJar::from_headers(&parts.headers);
    let Some(cookie) = jar.get(&state.settings.auth.session_cookie) else {
        return Ok(None);
    };
    state.sessions.resolve(cookie.value()).await.map_err(internal)
}

async fn session_reader(parts: &Parts, state: &AppState) -> Result<Option<Reader>, AppError> {
    match principal(parts, state).await? {
        Some(Principal {
            kind: PrincipalKind::Reader,
            id,
        }) => Ok(store::find_reader(&state.db, id)
            .await?
            .filter(|reader| reader.is_active)),
        _ => Ok(None),
    }
}

async fn session_admin(parts: &Parts, state: &AppState) -> Result<Option<Admin>, AppError> {
    match principal(parts, state).await? {
        Some(Principal {
            kind: PrincipalKind::Admin,
            id,
        }) => Ok(store::find_admin(&state.db, id).await?),
        _ => Ok(None),
    }
}

impl FromRequestParts<AppState> for CurrentReader {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        session_reader(parts, state)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::unauthorized("reader login required"))
    }
}

impl FromRequestParts<AppState> for OptionalReader {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        Ok(Self(session_reader(parts, state).await?))
    }
}

impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let admin = session_admin(parts, state)
            .await?
            .ok_or_else(|| AppError::unauthorized("admin login required"))?;
        if !admin.is_active {
            return Err(AppError::forbidden("admin account is disabled"));
        }
        Ok(Self(admin))
    }
}

impl FromRequestParts<AppState> for MaybeAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        Ok(Self(session_admin(parts, state).await?))
    }
}

/// Open a session and attach its cookie.
pub async fn sign_in(
    state: &AppState,
    jar: CookieJar,
    principal: Principal,
) -> Result<CookieJar, AppError> {
    let token = state.sessions.create(principal).await.map_err(internal)?;
    let cookie = Cookie::build((state.settings.auth.session_cookie.clone(), token))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax);
    Ok(jar.add(cookie))
}

/// Drop the session behind the cookie, if any, and clear the cookie.
pub async fn sign_out(state: &AppState, jar: CookieJar) -> Result<CookieJar, AppError> {
    let name = state.settings.auth.session_cookie.clone();
    if let Some(cookie) = jar.get(&name) {
        state.sessions.destroy(cookie.value()).await.map_err(internal)?;
    }
    Ok(jar.remove(Cookie::build(name).path("/")))
}

/// bcrypt is CPU-bound; keep it off the async workers.
pub async fn hash(state: &AppState, plain: &str) -> Result<String, AppError> {
    let plain = plain.to_string();
    let cost = state.settings.auth.bcrypt_cost;
    tokio::task::spawn_blocking(move || hash_password(&plain, cost))
        .await
        .map_err(internal)?
        .map_err(internal)
}

pub async fn verify(plain: &str, hash: &str) -> Result<bool, AppError> {
    let plain = plain.to_string();
    let hash = hash.to_string();
    tokio::task::spawn_blocking(move || verify_password(&plain, &hash))
        .await
        .map_err(internal)
}

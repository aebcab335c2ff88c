//! HTTP handlers for sign-up, login, profiles and reader administration.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::cookie::CookieJar;
use libris_authz::Principal;
use libris_http::error::AppError;
use serde_json::{json, Value};

use super::models::{
    Admin, AdminDashboard, AdminLogin, AdminProfileUpdate, AdminRegistration, NewReader,
    PasswordChange, ProfileUpdate, Reader, ReaderDetails, ReaderForm, ReaderLogin, ReaderProfile,
    ReaderRegistration, ReaderUpdate,
};
use super::session::{hash, sign_in, sign_out, verify, CurrentAdmin, CurrentReader, MaybeAdmin};
use super::store;
use crate::modules::catalog::store as catalog;
use crate::modules::circulation::service as circulation;
use crate::modules::notifications::store as notifications;
use crate::state::AppState;
use crate::utils::{self, Page, PageParams};

const LOW_STOCK_LIMIT: i64 = 8;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/readers/register", post(register_reader))
        .route("/readers/login", post(login_reader))
        .route("/admins/register", post(register_admin))
        .route("/admins/login", post(login_admin))
        .route("/logout", post(logout))
        .route("/me", get(my_profile).put(update_my_profile).delete(delete_me))
        .route("/me/password", post(change_my_password))
        .route(
            "/admins/me",
            get(admin_profile).put(update_admin_profile).delete(delete_admin_me),
        )
        .route("/admins/me/password", post(change_admin_password))
        .route("/admins/dashboard", get(admin_dashboard))
        .route("/readers", get(list_readers).post(create_reader))
        .route(
            "/readers/{id}",
            get(view_reader).put(edit_reader).delete(delete_reader),
        )
        .route("/readers/{id}/toggle-active", post(toggle_reader))
        .route("/readers/{id}/reset-password", post(reset_reader_password))
}

fn logged(event: &str, principal: &str, id: i64) {
    tracing::info!(target: "libris.accounts", principal, id, "{event}");
}

async fn register_reader(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<ReaderRegistration>,
) -> Result<(StatusCode, CookieJar, Json<Reader>), AppError> {
    form.validate()?;
    let password_hash = hash(&state, &form.password).await?;
    let reader = store::insert_reader(
        &state.db,
        &NewReader {
            reader_id: form.reader_id,
            name: form.name,
            date_of_birth: form.date_of_birth,
            phone_number: form.phone_number,
            address: form.address,
            is_staff_member: form.is_staff_member,
            password_hash,
        },
    )
    .await?;

    logged("reader registered", "reader", reader.id);
    let jar = sign_in(&state, jar, Principal::reader(reader.id)).await?;
    Ok((StatusCode::CREATED, jar, Json(reader)))
}

async fn login_reader(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<ReaderLogin>,
) -> Result<(CookieJar, Json<Reader>), AppError> {
    let invalid = || AppError::unauthorized("Invalid reader ID or password.");
    let reader = store::find_reader_by_code(&state.db, &form.reader_id)
        .await?
        .ok_or_else(invalid)?;
    if !verify(&form.password, &reader.password_hash).await? {
        return Err(invalid());
    }
    if !reader.is_active {
        return Err(AppError::forbidden("This reader account is inactive."));
    }

    logged("reader logged in", "reader", reader.id);
    let jar = sign_in(&state, jar, Principal::reader(reader.id)).await?;
    Ok((jar, Json(reader)))
}

async fn register_admin(
    State(state): State<AppState>,
    MaybeAdmin(caller): MaybeAdmin,
    Json(form): Json<AdminRegistration>,
) -> Result<(StatusCode, Json<Admin>), AppError> {
    form.validate()?;
    let password_hash = hash(&state, &form.password).await?;

    let mut tx = state.db.begin().await?;
    let first = store::count_admins(&mut *tx).await? == 0;
    if !first {
        match caller {
            None => return Err(AppError::unauthorized("admin login required")),
            Some(admin) if !admin.is_active || !admin.is_superuser => {
                return Err(AppError::forbidden("Only superusers can register new admins."))
            }
            Some(_) => {}
        }
        let max = state.rules().max_active_admins;
        if store::count_active_staff_admins(&mut *tx).await? >= max {
            return Err(AppError::conflict(
                vec![],
                format!("Maximum of {max} active admins reached."),
            ));
        }
    }
    let admin =
        store::insert_admin(&mut *tx, &form.admin_id, &form.name, &password_hash, first).await?;
    tx.commit().await?;

    logged("admin registered", "admin", admin.id);
    Ok((StatusCode::CREATED, Json(admin)))
}

async fn login_admin(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(form): Json<AdminLogin>,
) -> Result<(CookieJar, Json<Admin>), AppError> {
    let invalid = || AppError::unauthorized("Invalid admin ID or password.");
    let admin = store::find_admin_by_code(&state.db, &form.admin_id)
        .await?
        .ok_or_else(invalid)?;
    if !verify(&form.password, &admin.password_hash).await? {
        return Err(invalid());
    }
    if !admin.is_active {
        return Err(AppError::forbidden("This admin account is inactive."));
    }

    logged("admin logged in", "admin", admin.id);
    let jar = sign_in(&state, jar, Principal::admin(admin.id)).await?;
    Ok((jar, Json(admin)))
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    let jar = sign_out(&state, jar).await?;
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn my_profile(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
) -> Result<Json<ReaderProfile>, AppError> {
    let unread_notifications = notifications::unread_count(&state.db, reader.id).await?;
    Ok(Json(ReaderProfile {
        reader,
        unread_notifications,
    }))
}

async fn update_my_profile(
    State(state): State<AppState>,
    CurrentReader(mut reader): CurrentReader,
    Json(form): Json<ProfileUpdate>,
) -> Result<Json<Reader>, AppError> {
    ReaderUpdate::from(form).apply(&mut reader)?;
    Ok(Json(store::save_reader(&state.db, &reader).await?))
}

async fn change_my_password(
    State(state): State<AppState>,
    CurrentReader(mut reader): CurrentReader,
    Json(form): Json<PasswordChange>,
) -> Result<StatusCode, AppError> {
    if !verify(&form.current_password, &reader.password_hash).await? {
        return Err(AppError::field("current_password", "Current password is incorrect."));
    }
    form.validate()?;
    reader.password_hash = hash(&state, &form.new_password).await?;
    store::save_reader(&state.db, &reader).await?;
    logged("reader changed password", "reader", reader.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_me(
    State(state): State<AppState>,
    CurrentReader(reader): CurrentReader,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    if store::has_open_issues(&state.db, reader.id).await? {
        return Err(AppError::conflict(
            vec![],
            "You cannot delete your account while you have unreturned books.",
        ));
    }
    state
        .sessions
        .destroy_all(Principal::reader(reader.id))
        .await
        .map_err(utils::internal)?;
    store::delete_reader(&state.db, reader.id).await?;
    logged("reader deleted own account", "reader", reader.id);
    let jar = sign_out(&state, jar).await?;
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn admin_profile(CurrentAdmin(admin): CurrentAdmin) -> Json<Admin> {
    Json(admin)
}

async fn update_admin_profile(
    State(state): State<AppState>,
    CurrentAdmin(mut admin): CurrentAdmin,
    Json(form): Json<AdminProfileUpdate>,
) -> Result<Json<Admin>, AppError> {
    if form.name.trim().is_empty() {
        return Err(AppError::field("name", "required"));
    }
    admin.name = form.name.trim().to_string();
    Ok(Json(store::save_admin(&state.db, &admin).await?))
}

async fn change_admin_password(
    State(state): State<AppState>,
    CurrentAdmin(mut admin): CurrentAdmin,
    Json(form): Json<PasswordChange>,
) -> Result<StatusCode, AppError> {
    if !verify(&form.current_password, &admin.password_hash).await? {
        return Err(AppError::field("current_password", "Current password is incorrect."));
    }
    form.validate()?;
    admin.password_hash = hash(&state, &form.new_password).await?;
    store::save_admin(&state.db, &admin).await?;
    logged("admin changed password", "admin", admin.id);
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_admin_me(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    if admin.is_superuser {
        return Err(AppError::forbidden("Superuser accounts cannot be deleted."));
    }
    state
        .sessions
        .destroy_all(Principal::admin(admin.id))
        .await
        .map_err(utils::internal)?;
    store::delete_admin(&state.db, admin.id).await?;
    logged("admin deleted own account", "admin", admin.id);
    let jar = sign_out(&state, jar).await?;
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn admin_dashboard(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
) -> Result<Json<AdminDashboard>, AppError> {
    Ok(Json(AdminDashboard {
        admin,
        total_books: catalog::count_books(&state.db).await?,
        total_readers: store::count_readers(&state.db).await?,
        low_stock_books: catalog::low_stock(&state.db, LOW_STOCK_LIMIT).await?,
    }))
}

async fn list_readers(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Reader>>, AppError> {
    let page = store::list_readers(&state.db, &params, state.rules().page_size).await?;
    Ok(Json(page))
}

async fn create_reader(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Json(form): Json<ReaderForm>,
) -> Result<(StatusCode, Json<Reader>), AppError> {
    form.validate()?;
    let password = match form.password.as_deref() {
        Some(password) if !password.is_empty() => password.to_string(),
        _ => state.rules().temporary_password.clone(),
    };
    let password_hash = hash(&state, &password).await?;
    let reader = store::insert_reader(
        &state.db,
        &NewReader {
            reader_id: form.reader_id,
            name: form.name,
            date_of_birth: form.date_of_birth,
            phone_number: form.phone_number,
            address: form.address,
            is_staff_member: form.is_staff_member,
            password_hash,
        },
    )
    .await?;
    tracing::info!(target: "libris.accounts", admin = admin.id, reader = reader.id, "reader created");
    Ok((StatusCode::CREATED, Json(reader)))
}

async fn load_reader(state: &AppState, id: i64) -> Result<Reader, AppError> {
    store::find_reader(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("reader {id} not found")))
}

async fn view_reader(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<Json<ReaderDetails>, AppError> {
    let reader = load_reader(&state, id).await?;
    let issues = circulation::reader_issues(&state.db, reader.id, utils::today()).await?;
    Ok(Json(ReaderDetails { reader, issues }))
}

async fn edit_reader(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
    Json(form): Json<ReaderUpdate>,
) -> Result<Json<Reader>, AppError> {
    let mut reader = load_reader(&state, id).await?;
    form.apply(&mut reader)?;
    Ok(Json(store::save_reader(&state.db, &reader).await?))
}

async fn delete_reader(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    let reader = load_reader(&state, id).await?;
    if store::has_open_issues(&state.db, reader.id).await? {
        return Err(AppError::conflict(
            vec![],
            "Reader still has unreturned books.",
        ));
    }
    state
        .sessions
        .destroy_all(Principal::reader(reader.id))
        .await
        .map_err(utils::internal)?;
    store::delete_reader(&state.db, reader.id).await?;
    tracing::info!(target: "libris.accounts", admin = admin.id, reader = reader.id, "reader deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_reader(
    State(state): State<AppState>,
    _admin: CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Reader>, AppError> {
    let mut reader = load_reader(&state, id).await?;
    reader.is_active = !reader.is_active;
    let reader = store::save_reader(&state.db, &reader).await?;
    if !reader.is_active {
        state
            .sessions
            .destroy_all(Principal::reader(reader.id))
            .await
            .map_err(utils::internal)?;
    }
    Ok(Json(reader))
}

async fn reset_reader_password(
    State(state): State<AppState>,
    CurrentAdmin(admin): CurrentAdmin,
    Path(id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let mut reader = load_reader(&state, id).await?;
    let temporary = state.rules().temporary_password.clone();
    reader.password_hash = hash(&state, &temporary).await?;
    store::save_reader(&state.db, &reader).await?;
    tracing::info!(target: "libris.accounts", admin = admin.id, reader = reader.id, "reader password reset");
    Ok(Json(json!({
        "reader_id": reader.reader_id,
        "temporary_password": temporary,
    })))
}

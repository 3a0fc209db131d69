use std::collections::HashMap;

use axum::{
    extract::{DefaultBodyLimit, FromRef, Multipart, Path, Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{
    auth::{JwtKeys, StaffUser},
    changelist::{self, ChangeList, ChangeListParams},
    site::{self, ChangeForm},
    Row,
};
use crate::{
    error::{AppError, StoreError},
    state::AppState,
    storage::object_key,
    users::{password::verify_password, repo_types::User},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/login", post(login))
        .route("/admin/", get(index))
        .route("/admin/:model/", get(list).post(create))
        .route(
            "/admin/:model/:id",
            get(change_form).put(update).delete(remove),
        )
        .route(
            "/admin/:model/:id/photo",
            get(photo_redirect)
                .post(upload_photo)
                .layer(DefaultBodyLimit::max(20 * 1024 * 1024)),
        )
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ModelEntry {
    pub model: &'static str,
    pub verbose_name: &'static str,
    pub url: String,
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let invalid = || AppError::Unauthorized("invalid credentials".into());

    let Some(user) = state.store.find_user_by_username(&payload.username).await? else {
        warn!(username = %payload.username, "login unknown username");
        return Err(invalid());
    };
    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(invalid());
    }
    if !(user.is_staff || user.is_superuser) {
        warn!(user_id = user.id, "login by non-staff account");
        return Err(AppError::Forbidden("staff account required".into()));
    }

    let access_token = JwtKeys::from_ref(&state).sign(user.id)?;
    info!(user_id = user.id, "admin logged in");
    Ok(Json(LoginResponse {
        access_token,
        token_type: "Bearer",
        user,
    }))
}

#[instrument(skip(state, _staff))]
pub async fn index(
    State(state): State<AppState>,
    _staff: StaffUser,
) -> Json<Vec<ModelEntry>> {
    let models = state
        .admin
        .models()
        .map(|m| ModelEntry {
            model: m.model,
            verbose_name: m.verbose_name,
            url: format!("/admin/{}/", m.model),
        })
        .collect();
    Json(models)
}

#[instrument(skip(state, _staff))]
pub async fn list(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path(model): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<ChangeList>, AppError> {
    let resource = state.admin.get(&model)?;
    let params = ChangeListParams::parse(resource.admin(), query)?;
    let rows = resource.rows(state.store.as_ref()).await?;
    Ok(Json(changelist::build(resource.admin(), rows, &params)?))
}

#[instrument(skip(state, _staff))]
pub async fn change_form(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path((model, id)): Path<(String, i64)>,
) -> Result<Json<ChangeForm>, AppError> {
    let resource = state.admin.get(&model)?;
    let form = site::change_form(resource.as_ref(), state.store.as_ref(), id).await?;
    Ok(Json(form))
}

#[instrument(skip(state, staff, form))]
pub async fn create(
    State(state): State<AppState>,
    staff: StaffUser,
    Path(model): Path<String>,
    Json(mut form): Json<Value>,
) -> Result<(StatusCode, HeaderMap, Json<Row>), AppError> {
    let resource = state.admin.get(&model)?;
    site::strip_readonly(resource.admin(), &mut form);
    let row = resource.create(state.store.as_ref(), form).await?;

    let id = row.get("id").and_then(Value::as_i64).unwrap_or_default();
    info!(%model, id, staff = staff.0.id, "admin record created");
    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/admin/{model}/{id}")) {
        headers.insert(LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(row)))
}

#[instrument(skip(state, staff, form))]
pub async fn update(
    State(state): State<AppState>,
    staff: StaffUser,
    Path((model, id)): Path<(String, i64)>,
    Json(mut form): Json<Value>,
) -> Result<Json<Row>, AppError> {
    let resource = state.admin.get(&model)?;
    site::strip_readonly(resource.admin(), &mut form);
    let row = resource.update(state.store.as_ref(), id, form).await?;
    info!(%model, id, staff = staff.0.id, "admin record updated");
    Ok(Json(row))
}

#[instrument(skip(state, staff))]
pub async fn remove(
    State(state): State<AppState>,
    staff: StaffUser,
    Path((model, id)): Path<(String, i64)>,
) -> Result<StatusCode, AppError> {
    let resource = state.admin.get(&model)?;
    resource.delete(state.store.as_ref(), id).await?;
    info!(%model, id, staff = staff.0.id, "admin record deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Multipart field `photo`; the stored object key replaces the record's photo.
#[instrument(skip(state, staff, mp))]
pub async fn upload_photo(
    State(state): State<AppState>,
    staff: StaffUser,
    Path((model, id)): Path<(String, i64)>,
    mut mp: Multipart,
) -> Result<Json<Row>, AppError> {
    let resource = state.admin.get(&model)?;
    let prefix = resource
        .upload_to()
        .ok_or_else(|| AppError::BadRequest(format!("{model} has no photo field")))?;
    // fail before uploading anything
    let previous = photo_key(&resource.record(state.store.as_ref(), id).await?);

    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("photo") {
            continue;
        }
        let key = object_key(prefix, field.file_name());
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if body.is_empty() {
            return Err(AppError::BadRequest("photo is empty".into()));
        }

        state.storage.put_object(&key, body, &content_type).await?;
        let row = match resource.set_photo(state.store.as_ref(), id, &key).await {
            Ok(row) => row,
            Err(e) => {
                if let Err(err) = state.storage.delete_object(&key).await {
                    warn!(error = %err, %key, "failed to delete unreferenced photo");
                }
                return Err(e);
            }
        };
        info!(%model, id, %key, staff = staff.0.id, "photo uploaded");
        if let Some(old) = previous.filter(|old| *old != key) {
            if let Err(e) = state.storage.delete_object(&old).await {
                warn!(error = %e, key = %old, "failed to delete replaced photo");
            }
        }
        return Ok(Json(row));
    }
    Err(AppError::BadRequest("photo is required".into()))
}

fn photo_key(record: &Row) -> Option<String> {
    record
        .get("photo")
        .and_then(Value::as_str)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
}

/// Redirects to a short-lived URL for the record's photo.
#[instrument(skip(state, _staff))]
pub async fn photo_redirect(
    State(state): State<AppState>,
    _staff: StaffUser,
    Path((model, id)): Path<(String, i64)>,
) -> Result<Redirect, AppError> {
    let resource = state.admin.get(&model)?;
    if resource.upload_to().is_none() {
        return Err(AppError::BadRequest(format!("{model} has no photo field")));
    }
    let record = resource.record(state.store.as_ref(), id).await?;
    let key = photo_key(&record).ok_or(StoreError::not_found("photo", id))?;
    let url = state.storage.presign_get(&key, 600).await?;
    Ok(Redirect::temporary(&url))
}

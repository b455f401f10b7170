use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Redirect,
    routing::get,
};

use crate::{
    dto::users::{
        CreateUserRequest, EmailDomainQuery, EmailsByDomain, UpdateUserRequest, UserList,
        UserResponse,
    },
    error::AppResult,
    response::ApiResponse,
    routes::params::Pagination,
    services::user_service,
    state::AppState,
    store::DocumentId,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user", get(list_users).post(create_user))
        .route("/user/", get(list_users).post(create_user))
        .route("/user/emails", get(get_emails_by_domain))
        .route("/user/emails/", get(get_emails_by_domain))
        .route("/user/name/{user_name}", get(get_users_by_name))
        .route(
            "/user/{id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route(
            "/user/{id}/",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[utoipa::path(
    post,
    path = "/user/",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = ApiResponse<UserResponse>),
        (status = 422, description = "Invalid or duplicate email"),
    ),
    tag = "Users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    let resp = user_service::create_user(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/user/",
    params(Pagination),
    responses(
        (status = 200, description = "List users", body = ApiResponse<UserList>)
    ),
    tag = "Users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::list_users(&state, pagination).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/user/{user_id}",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Get user", body = ApiResponse<UserResponse>),
        (status = 404, description = "User not found"),
    ),
    tag = "Users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let resp = user_service::get_user(&state, &DocumentId::from(user_id)).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/user/name/{user_name}",
    params(("user_name" = String, Path, description = "Exact user name")),
    responses(
        (status = 200, description = "Users with that name", body = ApiResponse<UserList>)
    ),
    tag = "Users"
)]
pub async fn get_users_by_name(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = user_service::get_users_by_name(&state, &user_name).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/user/emails/",
    params(("domain_name" = String, Query, description = "Domain such as @example.com")),
    responses(
        (status = 200, description = "Emails under the domain", body = ApiResponse<EmailsByDomain>),
        (status = 422, description = "Malformed domain"),
    ),
    tag = "Users"
)]
pub async fn get_emails_by_domain(
    State(state): State<AppState>,
    Query(query): Query<EmailDomainQuery>,
) -> AppResult<Json<ApiResponse<EmailsByDomain>>> {
    let resp = user_service::get_emails_by_domain(&state, &query.domain_name).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    put,
    path = "/user/{user_id}",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UpdateUserRequest,
    responses(
        (status = 303, description = "Updated, redirects to the user"),
        (status = 404, description = "User not found"),
    ),
    tag = "Users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> AppResult<Redirect> {
    user_service::update_user(&state, &DocumentId::from(user_id.as_str()), payload).await?;
    Ok(Redirect::to(&format!("/user/{user_id}/")))
}

#[utoipa::path(
    delete,
    path = "/user/{user_id}",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 303, description = "Deleted together with the active cart"),
        (status = 404, description = "User not found"),
    ),
    tag = "Users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Redirect> {
    user_service::delete_user(&state, &DocumentId::from(user_id)).await?;
    Ok(Redirect::to("/user/"))
}

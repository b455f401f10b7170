use std::sync::LazyLock;

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use password_hash::rand_core::OsRng;
use regex::Regex;

use crate::{
    dto::users::{CreateUserRequest, EmailsByDomain, UpdateUserRequest, UserList, UserResponse},
    error::{AppError, AppResult},
    models::User,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::cascade::{self, CascadeMode},
    state::AppState,
    store::{DocumentId, Filter, FindOptions, StoreError, Update},
};

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([\da-zA-Z]+){3,}@[\da-zA-Z]+\.[a-zA-Z]+(\.[a-zA-Z]+)?$")
        .expect("static regex should not panic")
});

static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@[a-zA-Z]+\.[a-zA-Z]{1,3}$").expect("static regex should not panic")
});

const MAX_LISTED_USERS: u64 = 100;

fn check_email(email: &str) -> AppResult<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AppError::Validation(format!("Invalid email address: {email}")))
    }
}

fn hash_password(pwd: &str) -> AppResult<String> {
    if pwd.is_empty() {
        return Err(AppError::Validation("Password must not be empty".to_string()));
    }
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(pwd.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

fn email_taken(err: StoreError) -> AppError {
    match err {
        StoreError::DuplicateKey { .. } => {
            AppError::Validation("Email is already taken".to_string())
        }
        other => other.into(),
    }
}

async fn find_user(state: &AppState, user_id: &DocumentId) -> AppResult<User> {
    state
        .repo
        .find_one(&Filter::new().id("_id", user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

pub async fn create_user(
    state: &AppState,
    payload: CreateUserRequest,
) -> AppResult<ApiResponse<UserResponse>> {
    let CreateUserRequest {
        name,
        email,
        pwd,
        address,
    } = payload;
    if name.trim().is_empty() {
        return Err(AppError::Validation("Name must not be empty".to_string()));
    }
    check_email(&email)?;

    let exist: Option<User> = state
        .repo
        .find_one(&Filter::new().eq("email", email.as_str()))
        .await?;
    if exist.is_some() {
        return Err(AppError::Validation("Email is already taken".to_string()));
    }

    let user = User {
        id: DocumentId::generate(),
        name,
        email,
        pwd: hash_password(&pwd)?,
        address,
        version: 0,
    };
    let id = state.repo.insert(&user).await.map_err(email_taken)?;
    tracing::info!(user_id = %id, "user created");

    let user = find_user(state, &id).await?;
    Ok(ApiResponse::success("User created", user.into(), None))
}

/// Without a page the first hundred users come back in one go.
pub async fn list_users(
    state: &AppState,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    let (options, meta) = if pagination.page.is_none() && pagination.per_page.is_none() {
        (FindOptions::limit(MAX_LISTED_USERS), None)
    } else {
        let (page, per_page, offset) = pagination.normalize();
        let options = FindOptions {
            skip: offset as u64,
            limit: Some(per_page as u64),
        };
        let meta = Meta {
            page: Some(page),
            per_page: Some(per_page),
            total: None,
        };
        (options, Some(meta))
    };

    let users: Vec<User> = state.repo.find_many(&Filter::new(), options).await?;
    let items = users.into_iter().map(UserResponse::from).collect();
    Ok(ApiResponse::success("Users", UserList { items }, meta))
}

pub async fn get_user(
    state: &AppState,
    user_id: &DocumentId,
) -> AppResult<ApiResponse<UserResponse>> {
    let user = find_user(state, user_id).await?;
    Ok(ApiResponse::success("User", user.into(), None))
}

pub async fn get_users_by_name(state: &AppState, name: &str) -> AppResult<ApiResponse<UserList>> {
    let users: Vec<User> = state
        .repo
        .find_many(
            &Filter::new().eq("name", name),
            FindOptions::limit(MAX_LISTED_USERS),
        )
        .await?;
    let items = users.into_iter().map(UserResponse::from).collect();
    Ok(ApiResponse::success("Users", UserList { items }, None))
}

/// Emails of every user whose address ends with `domain` (e.g. `@example.com`),
/// compared case-insensitively.
pub async fn get_emails_by_domain(
    state: &AppState,
    domain: &str,
) -> AppResult<ApiResponse<EmailsByDomain>> {
    if !DOMAIN_RE.is_match(domain) {
        return Err(AppError::Validation(format!(
            "Invalid domain {domain:?}, expected something like @example.com"
        )));
    }
    let suffix = domain.to_ascii_lowercase();

    let users: Vec<User> = state
        .repo
        .find_many(&Filter::new(), FindOptions::default())
        .await?;
    let emails_list: Vec<String> = users
        .into_iter()
        .map(|user| user.email)
        .filter(|email| email.to_ascii_lowercase().ends_with(&suffix))
        .collect();

    let data = EmailsByDomain {
        emails_count: emails_list.len(),
        emails_list,
    };
    Ok(ApiResponse::success("Emails", data, None))
}

pub async fn update_user(
    state: &AppState,
    user_id: &DocumentId,
    payload: UpdateUserRequest,
) -> AppResult<()> {
    let user = find_user(state, user_id).await?;

    let mut update = Update::new();
    if let Some(name) = payload.name {
        if name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        update = update.set("name", name);
    }
    if let Some(email) = payload.email {
        check_email(&email)?;
        let holder: Option<User> = state
            .repo
            .find_one(&Filter::new().eq("email", email.as_str()))
            .await?;
        if holder.is_some_and(|other| other.id != user.id) {
            return Err(AppError::Validation("Email is already taken".to_string()));
        }
        update = update.set("email", email);
    }
    if let Some(pwd) = payload.pwd {
        update = update.set("pwd", hash_password(&pwd)?);
    }
    if update.is_empty() {
        return Ok(());
    }

    let result = state
        .repo
        .update_one::<User>(&Filter::new().eq("_id", user.id.as_str()), &update)
        .await
        .map_err(email_taken)?;
    if result.matched == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = %user.id, "user updated");
    Ok(())
}

/// Deletes the user after cascading away their active cart.
pub async fn delete_user(state: &AppState, user_id: &DocumentId) -> AppResult<()> {
    let user = find_user(state, user_id).await?;

    if let Some(done) = cascade::cascade_delete(state, &user.id, CascadeMode::User).await? {
        tracing::debug!(user_id = %user.id, msg = %done.msg, "user cart removed");
    }

    let deleted = state
        .repo
        .delete_one::<User>(&Filter::new().eq("_id", user.id.as_str()))
        .await?;
    if deleted == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user_id = %user.id, "user deleted");
    Ok(())
}

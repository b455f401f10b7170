use crate::{
    dto::users::AddressList,
    error::{AppError, AppResult},
    models::{Address, User},
    response::ApiResponse,
    state::AppState,
    store::{DocumentId, Filter, Update},
};

const MAX_ADDRESS_ATTEMPTS: usize = 8;

async fn find_user(state: &AppState, user_id: &DocumentId) -> AppResult<User> {
    state
        .repo
        .find_one(&Filter::new().id("_id", user_id))
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Applies `edit` to the user's address list and writes it back against the
/// version it was read at, rereading on a lost race.
async fn edit_addresses<F>(state: &AppState, user_id: &DocumentId, mut edit: F) -> AppResult<User>
where
    F: FnMut(&mut Vec<Address>) -> AppResult<()>,
{
    for attempt in 1..=MAX_ADDRESS_ATTEMPTS {
        let mut user = find_user(state, user_id).await?;
        let guard = Filter::new()
            .eq("_id", user.id.as_str())
            .eq("version", user.version);
        edit(&mut user.address)?;
        user.version += 1;

        let update = Update::pick(&user, &["address", "version"])?;
        let result = state.repo.update_one::<User>(&guard, &update).await?;
        if result.matched == 1 {
            return Ok(user);
        }
        tracing::debug!(user_id = %user.id, attempt, "address list moved, retrying");
        tokio::task::yield_now().await;
    }

    Err(AppError::ConflictOrNoop(
        "Addresses are being modified concurrently, try again".to_string(),
    ))
}

pub async fn add_address(
    state: &AppState,
    user_id: &DocumentId,
    address: Address,
) -> AppResult<()> {
    let user = edit_addresses(state, user_id, |stored| {
        if stored.contains(&address) {
            return Err(AppError::Validation(
                "Address already registered for this user".to_string(),
            ));
        }
        stored.push(address.clone());
        Ok(())
    })
    .await?;
    tracing::info!(user_id = %user.id, count = user.address.len(), "address added");
    Ok(())
}

pub async fn list_addresses(
    state: &AppState,
    user_id: &DocumentId,
) -> AppResult<ApiResponse<AddressList>> {
    let user = find_user(state, user_id).await?;
    Ok(ApiResponse::success(
        "Addresses",
        AddressList {
            items: user.address,
        },
        None,
    ))
}

/// Removes every stored entry equal to `address`.
pub async fn delete_address(
    state: &AppState,
    user_id: &DocumentId,
    address: Address,
) -> AppResult<()> {
    let mut removed = 0;
    let user = edit_addresses(state, user_id, |stored| {
        let before = stored.len();
        stored.retain(|entry| *entry != address);
        removed = before - stored.len();
        if removed == 0 {
            return Err(AppError::NotFound("Address not found".to_string()));
        }
        Ok(())
    })
    .await?;
    tracing::info!(user_id = %user.id, removed, "address deleted");
    Ok(())
}

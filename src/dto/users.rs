use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Address, User};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub pwd: String,
    #[serde(default)]
    pub address: Vec<Address>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub pwd: Option<String>,
}

/// Public view of a user; the password hash stays server-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub email: String,
    pub address: Vec<Address>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name,
            email: user.email,
            address: user.address,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<UserResponse>)]
    pub items: Vec<UserResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailDomainQuery {
    pub domain_name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmailsByDomain {
    pub emails_count: usize,
    pub emails_list: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct AddressList {
    #[schema(value_type = Vec<Address>)]
    pub items: Vec<Address>,
}

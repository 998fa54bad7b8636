//! Request and response bodies of the HTTP API.

use serde::{Deserialize, Serialize};

use crate::models::{Role, User};

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub external_id: String,
    pub full_name: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub external_id: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in_seconds: i64,
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub external_id: String,
    pub full_name: String,
    pub password: String,
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePeriodRequest {
    pub name: String,
    /// `YYYY-MM-DD`
    pub start_date: String,
    /// `YYYY-MM-DD`
    pub end_date: String,
    #[serde(default)]
    pub make_current: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub user_id: i64,
    pub period_id: i64,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub career: String,
    #[serde(default)]
    pub semester: String,
    pub can_access: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEnrollmentRequest {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub career: Option<String>,
    pub semester: Option<String>,
    pub can_access: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategoryRequest {
    pub name: String,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReviewRequest {
    pub parent_id: Option<i64>,
    pub rating: Option<i64>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadBookResponse {
    pub url: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FavoriteResponse {
    pub book_id: i64,
    pub favorite: bool,
}

/// `{"items": [...]}` wrapper for unpaginated listings.
#[derive(Debug, Clone, Serialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Items<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

use axum::{
    extract::{Extension, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use time::Duration;
use validator::Validate;

use crate::{
    config::AppConfig,
    middleware::{
        error_handling::{AppError, Result},
        Claims, JwtService,
    },
    models::user::{AuthResponse, LoginRequest, RegisterRequest, UserResponse},
    repositories::UserRepository,
};

fn create_auth_cookie(token: String, is_production: bool) -> Cookie<'static> {
    Cookie::build(("auth_token", token))
        .path("/")
        .max_age(Duration::days(1))
        .http_only(true)
        .secure(is_production)
        .same_site(SameSite::Strict)
        .build()
}

fn create_logout_cookie() -> Cookie<'static> {
    Cookie::build(("auth_token", ""))
        .path("/")
        .max_age(Duration::ZERO)
        .http_only(true)
        .build()
}

fn is_production() -> bool {
    std::env::var("TLS_ENABLED")
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false)
}

fn with_auth_cookie(body: AuthResponse, cookie: Cookie<'static>) -> Result<Response> {
    let mut response = Json(body).into_response();
    let value = cookie
        .to_string()
        .parse()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("cookie header: {e}")))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

/// Creates a new organization with its first admin user.
pub async fn register(
    State(config): State<AppConfig>,
    Json(request): Json<RegisterRequest>,
) -> Result<Response> {
    request.validate().map_err(AppError::Validation)?;

    let user_repo = UserRepository::new(config.database_pool.clone());
    if user_repo.find_by_email(&request.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password hash: {e}")))?;

    let user = user_repo
        .create_organization_with_admin(
            &request.organization_name,
            &request.email,
            &password_hash,
            &request.full_name,
        )
        .await?;

    let jwt = JwtService::new(&config.jwt_secret);
    let token = jwt
        .generate_token(user.id, user.organization_id, &user.email, user.role())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token generation: {e}")))?;

    let cookie = create_auth_cookie(token.clone(), is_production());
    with_auth_cookie(
        AuthResponse {
            token,
            user: user.into(),
        },
        cookie,
    )
}

pub async fn login(
    State(config): State<AppConfig>,
    Json(request): Json<LoginRequest>,
) -> Result<Response> {
    request.validate().map_err(AppError::Validation)?;

    let user_repo = UserRepository::new(config.database_pool.clone());
    let user = user_repo
        .find_by_email(&request.email)
        .await?
        .ok_or(AppError::Unauthorized("Invalid credentials".to_string()))?;

    let valid = bcrypt::verify(&request.password, &user.password_hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("password verify: {e}")))?;
    if !valid {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let jwt = JwtService::new(&config.jwt_secret);
    let token = jwt
        .generate_token(user.id, user.organization_id, &user.email, user.role())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("token generation: {e}")))?;

    let cookie = create_auth_cookie(token.clone(), is_production());
    with_auth_cookie(
        AuthResponse {
            token,
            user: user.into(),
        },
        cookie,
    )
}

pub async fn logout() -> Result<Response> {
    let cookie = create_logout_cookie();
    let mut response = Json(serde_json::json!({ "message": "Logged out" })).into_response();
    let value = cookie
        .to_string()
        .parse()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("cookie header: {e}")))?;
    response.headers_mut().insert(header::SET_COOKIE, value);
    Ok(response)
}

pub async fn profile(
    State(config): State<AppConfig>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>> {
    let user_repo = UserRepository::new(config.database_pool.clone());
    let user = user_repo
        .find_by_id(claims.user_id)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user.into()))
}

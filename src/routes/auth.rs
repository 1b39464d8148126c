/// Authentication Routes
///
/// Thin HTTP adapter over `AuthService`: registration, login, logout, session
/// introspection and password reset.

use actix_web::{http::header::USER_AGENT, web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth::{AuthService, VerifiedToken};
use crate::error::{AppError, ErrorContext};
use crate::middleware::bearer_token;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Deserialize)]
pub struct PasswordResetConfirmation {
    pub token: String,
    pub new_password: String,
}

/// POST /auth/register
///
/// # Errors
/// - 400: invalid email or weak password (body lists every violation)
/// - 409: email already registered
pub async fn register(
    form: web::Json<RegisterRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("account_registration");

    let account = auth
        .register(&form.email, &form.password)
        .await
        .map_err(|e| context.record(e))?;

    Ok(HttpResponse::Created().json(account))
}

/// POST /auth/login
///
/// # Errors
/// - 401: invalid credentials (same response for unknown email and wrong password)
/// - 423: account locked, body carries `remaining_minutes`
pub async fn login(
    req: HttpRequest,
    form: web::Json<LoginRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("account_login");

    let client = req
        .headers()
        .get(USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let session = auth
        .login(&form.email, &form.password, client)
        .await
        .map_err(|e| context.record(e))?;

    Ok(HttpResponse::Ok().json(session))
}

/// POST /auth/logout
///
/// Idempotent: an unknown or already revoked token still yields 204.
///
/// # Errors
/// - 401: missing bearer token
pub async fn logout(
    req: HttpRequest,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(req.headers())?;
    auth.logout(&token).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /auth/session
///
/// **Requires a valid session token**; the identity is injected by
/// `SessionMiddleware`.
pub async fn current_session(verified: web::ReqData<VerifiedToken>) -> HttpResponse {
    HttpResponse::Ok().json(verified.into_inner())
}

/// POST /auth/password-reset
///
/// Always 202 so the response does not reveal whether the email exists.
/// Delivering the token to the account holder happens outside this service.
pub async fn request_password_reset(
    form: web::Json<PasswordResetRequest>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.request_password_reset(&form.email).await?;
    Ok(HttpResponse::Accepted().finish())
}

/// POST /auth/password-reset/confirm
///
/// # Errors
/// - 400: weak password, or reset token invalid, used or expired
pub async fn confirm_password_reset(
    form: web::Json<PasswordResetConfirmation>,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, AppError> {
    auth.reset_password(&form.token, &form.new_password).await?;
    Ok(HttpResponse::NoContent().finish())
}

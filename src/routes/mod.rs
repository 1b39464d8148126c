mod auth;
mod health_check;

pub use auth::{
    confirm_password_reset, current_session, login, logout, register, request_password_reset,
};
pub use health_check::health_check;

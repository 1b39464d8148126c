use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::AuthService;
use crate::logger::RequestLogger;
use crate::middleware::SessionMiddleware;
use crate::routes::{
    confirm_password_reset, current_session, health_check, login, logout, register,
    request_password_reset,
};

pub fn run(listener: TcpListener, auth: Arc<AuthService>) -> Result<Server, std::io::Error> {
    let auth = web::Data::from(auth);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            .app_data(auth.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/register", web::post().to(register))
            .route("/auth/login", web::post().to(login))
            .route("/auth/logout", web::post().to(logout))
            .route("/auth/password-reset", web::post().to(request_password_reset))
            .route(
                "/auth/password-reset/confirm",
                web::post().to(confirm_password_reset),
            )
            // Routes requiring a live session
            .service(
                web::scope("/auth/session")
                    .wrap(SessionMiddleware::new(auth.clone()))
                    .route("", web::get().to(current_session)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}

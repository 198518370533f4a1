//! Route table
//!
//! Everything under `/api` sits behind the base [`AuthGate`]; its whitelist
//! decides what is public. Account administration is additionally wrapped in
//! a `super_admin` gate derived from the base one.

use actix_middleware::AuthGate;
use actix_web::{error, guard, web};
use error_types::ServiceError;

use crate::handlers;
use crate::models::SUPER_ADMIN;

/// Malformed JSON bodies go through the shared error table as 400s.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(64 * 1024)
        .error_handler(|err, _req| bad_request(err))
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default().error_handler(|err, _req| bad_request(err))
}

pub fn path_config() -> web::PathConfig {
    web::PathConfig::default().error_handler(|err, _req| bad_request(err))
}

fn bad_request(err: impl std::fmt::Display) -> actix_web::Error {
    error::Error::from(ServiceError::BadRequest(err.to_string()))
}

pub fn configure(cfg: &mut web::ServiceConfig, gate: AuthGate) {
    let admin_only = gate.require_roles([SUPER_ADMIN]);

    cfg.service(
        web::scope("/api")
            .wrap(gate)
            .app_data(json_config())
            .app_data(query_config())
            .app_data(path_config())
            .route("/health", web::get().to(handlers::health))
            .service(
                web::scope("/auth")
                    .route("/login", web::post().to(handlers::login))
                    .route("/logout", web::post().to(handlers::logout))
                    .route("/me", web::get().to(handlers::current_user))
                    .route("/roles", web::get().to(handlers::list_roles)),
            )
            .service(
                web::scope("/users")
                    .service(
                        web::resource("")
                            .guard(guard::Post())
                            .wrap(admin_only.clone())
                            .route(web::post().to(handlers::create_user)),
                    )
                    .service(web::resource("").route(web::get().to(handlers::list_users)))
                    .service(
                        web::resource("/{id}/password")
                            .route(web::put().to(handlers::change_password)),
                    )
                    .service(
                        web::resource("/{id}")
                            .guard(guard::Any(guard::Put()).or(guard::Delete()))
                            .wrap(admin_only)
                            .route(web::put().to(handlers::update_user))
                            .route(web::delete().to(handlers::delete_user)),
                    )
                    .service(web::resource("/{id}").route(web::get().to(handlers::get_user))),
            ),
    );
}

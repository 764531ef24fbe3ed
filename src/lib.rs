pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::handlers::{
    auth::{login, logout, profile, register},
    email_threads::{
        assign_orphan, get_thread, list_orphaned, list_threads, merge_threads, reparse_thread,
    },
    maintenance::{create_record, list_for_vehicle},
    orders::{get_order, list_orders},
    parts::{create_part, get_part, list_parts, update_part},
    quote_requests::{
        activity_feed, approve_quote_request, cancel_quote_request, convert_to_order,
        create_quote_request, get_quote_request, list_quote_requests, price_comparison,
        refresh_thread_statuses, reopen_quote_request, reply_status, send_quote_request,
        sync_threads,
    },
    suppliers::{create_supplier, get_supplier, list_suppliers, update_supplier},
    vehicles::{create_vehicle, delete_vehicle, get_vehicle, list_vehicles, update_vehicle},
    webhooks::{inbound_email, inbound_email_batch},
};
use crate::middleware::{auth_middleware, manager_middleware};

pub fn create_app(config: AppConfig) -> Router {
    let cors = build_cors(&config);

    // Workflow mutations that move money or state require the manager role;
    // reads and drafting are open to any authenticated user.
    let quote_workflow = Router::new()
        .route("/:id/send", post(send_quote_request))
        .route("/:id/approve", post(approve_quote_request))
        .route("/:id/cancel", post(cancel_quote_request))
        .route("/:id/reopen", post(reopen_quote_request))
        .route("/:id/convert", post(convert_to_order))
        .route("/:id/sync-threads", post(sync_threads))
        .layer(axum_middleware::from_fn(manager_middleware));

    let quote_requests = Router::new()
        .route("/", post(create_quote_request))
        .route("/", get(list_quote_requests))
        .route("/:id", get(get_quote_request))
        .route("/:id/reply-status", get(reply_status))
        .route("/:id/refresh-statuses", post(refresh_thread_statuses))
        .route("/:id/comparison", get(price_comparison))
        .route("/:id/activity", get(activity_feed))
        .merge(quote_workflow);

    let email_threads = Router::new()
        .route("/", get(list_threads))
        .route("/orphaned", get(list_orphaned))
        .route("/:id", get(get_thread))
        .route("/:id/reparse", post(reparse_thread))
        .merge(
            Router::new()
                .route("/:id/assign", post(assign_orphan))
                .route("/:id/merge", post(merge_threads))
                .layer(axum_middleware::from_fn(manager_middleware)),
        );

    Router::new()
        .nest(
            "/api/auth",
            Router::new()
                .route("/register", post(register))
                .route("/login", post(login))
                .route("/logout", post(logout))
                .route(
                    "/profile",
                    get(profile).layer(axum_middleware::from_fn_with_state(
                        config.clone(),
                        auth_middleware,
                    )),
                ),
        )
        .nest(
            "/api/vehicles",
            Router::new()
                .route("/", post(create_vehicle))
                .route("/", get(list_vehicles))
                .route("/:id", get(get_vehicle))
                .route("/:id", put(update_vehicle))
                .route("/:id", delete(delete_vehicle))
                .route("/:id/maintenance", get(list_for_vehicle))
                .layer(axum_middleware::from_fn_with_state(
                    config.clone(),
                    auth_middleware,
                )),
        )
        .nest(
            "/api/parts",
            Router::new()
                .route("/", post(create_part))
                .route("/", get(list_parts))
                .route("/:id", get(get_part))
                .route("/:id", put(update_part))
                .layer(axum_middleware::from_fn_with_state(
                    config.clone(),
                    auth_middleware,
                )),
        )
        .nest(
            "/api/suppliers",
            Router::new()
                .route("/", post(create_supplier))
                .route("/", get(list_suppliers))
                .route("/:id", get(get_supplier))
                .route("/:id", put(update_supplier))
                .layer(axum_middleware::from_fn_with_state(
                    config.clone(),
                    auth_middleware,
                )),
        )
        .nest(
            "/api/maintenance",
            Router::new()
                .route("/", post(create_record))
                .layer(axum_middleware::from_fn_with_state(
                    config.clone(),
                    auth_middleware,
                )),
        )
        .nest(
            "/api/quote-requests",
            quote_requests.layer(axum_middleware::from_fn_with_state(
                config.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/api/email-threads",
            email_threads.layer(axum_middleware::from_fn_with_state(
                config.clone(),
                auth_middleware,
            )),
        )
        .nest(
            "/api/orders",
            Router::new()
                .route("/", get(list_orders))
                .route("/:id", get(get_order))
                .layer(axum_middleware::from_fn_with_state(
                    config.clone(),
                    auth_middleware,
                )),
        )
        .nest(
            "/api/webhooks",
            // Authenticated by HMAC signature, not by user token.
            Router::new()
                .route("/email/inbound", post(inbound_email))
                .route("/email/inbound/batch", post(inbound_email_batch)),
        )
        .route("/health", get(|| async { "ok" }))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(config)
}

fn build_cors(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
    }
}

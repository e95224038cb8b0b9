use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use log::info;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use conversation_service::state::AppState;
use conversation_service::{auth, conversation, integration, message, participant};

#[tokio::main]
async fn main() {
    let config = integration::Config::default();

    let state = match AppState::init(&config).await {
        Ok(state) => state,
        Err(e) => panic!("Failed to initialize app state: {e}"),
    };

    let cors = CorsLayer::new()
        .allow_origin(config.env.allow_origin())
        .allow_methods(config.env.allow_methods())
        .allow_headers(config.env.allow_headers());

    let api = Router::new()
        .merge(conversation::api(state.clone()))
        .merge(participant::api(state.clone()))
        .merge(message::api(state))
        .layer(axum::middleware::from_fn(auth::identity));

    let app = Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = config.env.addr();
    info!("Listening on {addr}");

    let served = match config.env.ssl_config() {
        Some(ssl) => {
            axum_server::bind_openssl(addr, ssl)
                .serve(app.into_make_service())
                .await
        }
        None => {
            axum_server::bind(addr)
                .serve(app.into_make_service())
                .await
        }
    };

    if let Err(e) = served {
        panic!("Failed to start the server: {e}")
    }
}

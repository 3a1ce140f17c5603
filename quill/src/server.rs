use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use axum::{middleware, Extension, Router};
use quill_core::Store;
use tokio::net::TcpListener;

use crate::auth::Identity;
use crate::config::Config;
use crate::graphql::{build_schema, QuillSchema};
use crate::rest;
use crate::state::AppState;
use crate::ServerError;

/// The full application: REST under `/api`, GraphQL at `/graphql`.
pub fn router(state: AppState) -> Router {
    let schema = build_schema(state.clone());
    Router::new()
        .route("/health", get(rest::health))
        .nest("/api", rest::routes())
        .route("/graphql", get(graphql_playground).post(graphql_handler))
        .layer(Extension(schema))
        .layer(middleware::from_fn(rest::log_request))
        .with_state(state)
}

async fn graphql_handler(
    State(state): State<AppState>,
    Extension(schema): Extension<QuillSchema>,
    headers: HeaderMap,
    request: GraphQLRequest,
) -> GraphQLResponse {
    // A bad token makes the caller anonymous here; resolvers then answer
    // with their own login errors.
    let actor = match state.identify(&headers).await {
        Ok(actor) => actor,
        Err(err) => {
            log::debug!("graphql caller not identified: {err}");
            None
        }
    };
    let request = request.into_inner().data(Identity(actor));
    schema.execute(request).await.into()
}

async fn graphql_playground() -> impl IntoResponse {
    Html(playground_source(GraphQLPlaygroundConfig::new("/graphql")))
}

/// Open the database, apply pending migrations and serve until ctrl-c.
pub async fn serve(config: Config) -> Result<(), ServerError> {
    config.validate()?;
    let store = Store::open(config.database.clone(), config.pool_size)?;
    let applied = store.migrate()?;
    if applied > 0 {
        log::info!("applied {applied} migrations");
    }
    let state = AppState::new(store, &config)?;
    let listener = TcpListener::bind(&config.bind).await?;
    log::info!("Quill listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    log::info!("Quill stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("cannot listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
}

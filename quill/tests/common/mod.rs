#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use quill::auth::TokenService;
use quill::config::{Config, JwtConfig};
use quill::{router, Actor, AppState};
use quill_core::db::Connection;
use serde_json::Value;
use tower::ServiceExt;

pub fn test_config() -> Config {
    Config {
        jwt: JwtConfig {
            secret: "test-secret".to_string(),
            ..JwtConfig::default()
        },
        ..Config::default()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = quill_test_helper::setup_store();
        let state = AppState::new(store, &config).unwrap();
        let router = router(state.clone());
        TestApp { state, router }
    }

    /// Run `f` on the store's connection. The connection goes back to the
    /// pool before this returns.
    pub fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> T) -> T {
        let mut conn = self.state.store.get().unwrap();
        f(&mut *conn)
    }

    pub fn user(&self, username: &str) -> Actor {
        self.with_conn(|conn| quill_test_helper::user(conn, username))
    }

    pub fn superuser(&self, username: &str) -> Actor {
        self.with_conn(|conn| quill_test_helper::superuser(conn, username))
    }

    pub fn token(&self, actor: &Actor) -> String {
        self.tokens().issue_pair(actor).unwrap().access
    }

    pub fn tokens(&self) -> &TokenService {
        &self.state.tokens
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Execute a GraphQL document and return the response body.
    pub async fn graphql(&self, token: Option<&str>, query: &str) -> Value {
        let body = serde_json::json!({ "query": query });
        let (status, json) = self.send(Method::POST, "/graphql", token, Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{json}");
        json
    }
}

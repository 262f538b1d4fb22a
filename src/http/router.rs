//! Axum router setup.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use super::auth::auth_middleware;
use super::handlers;
use super::state::AppState;

pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    // Authenticated routes
    let letters = Router::new()
        .route(
            "/api/letters",
            get(handlers::list_letters).post(handlers::create_letter),
        )
        .route(
            "/api/letters/{id}",
            get(handlers::get_letter)
                .put(handlers::update_letter)
                .delete(handlers::delete_letter),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Unauthenticated routes
    let public = Router::new().route("/health", get(handlers::health));

    Router::new()
        .merge(letters)
        .merge(public)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        // The extractors' own 2 MiB cap is off; `max_body_bytes` is the only limit.
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::letters::{
        LetterStore, LetterSummary, ListFilter, NewFile, OwnershipPolicy, StoreError,
    };
    use crate::core::letters::LetterService;
    use crate::infra::firebase::test_tokens;
    use crate::infra::letters::InMemoryLetterStore;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Counts every call that reaches the storage backend.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryLetterStore,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn hit(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl LetterStore for CountingStore {
        async fn list(&self, filter: &ListFilter) -> Result<Vec<LetterSummary>, StoreError> {
            self.hit();
            self.inner.list(filter).await
        }
        async fn fetch(&self, id: &str) -> Result<Vec<u8>, StoreError> {
            self.hit();
            self.inner.fetch(id).await
        }
        async fn create(&self, file: NewFile) -> Result<String, StoreError> {
            self.hit();
            self.inner.create(file).await
        }
        async fn overwrite(&self, id: &str, body: Vec<u8>) -> Result<(), StoreError> {
            self.hit();
            self.inner.overwrite(id, body).await
        }
        async fn remove(&self, id: &str) -> Result<(), StoreError> {
            self.hit();
            self.inner.remove(id).await
        }
        async fn owner_of(&self, id: &str) -> Result<Option<String>, StoreError> {
            self.hit();
            self.inner.owner_of(id).await
        }
    }

    fn app_with(store: Arc<CountingStore>) -> Router {
        app_with_limit(store, 1024 * 1024)
    }

    fn app_with_limit(store: Arc<CountingStore>, max_body_bytes: usize) -> Router {
        let service = LetterService::new(store as Arc<dyn LetterStore>, OwnershipPolicy::Backend);
        let state = AppState::new(service, Arc::new(test_tokens::verifier()));
        build_router(state, max_body_bytes)
    }

    fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, value)
    }

    fn draft(text: &str) -> Value {
        json!({
            "blocks": [{"key": "k1", "text": text, "type": "unstyled", "depth": 0,
                        "inlineStyleRanges": [], "entityRanges": [], "data": {}}],
            "entityMap": {}
        })
    }

    #[tokio::test]
    async fn test_create_then_read_scenario() {
        let app = app_with(Arc::default());
        let token = test_tokens::id_token("alice");

        let (status, created) = send(
            &app,
            request(
                Method::POST,
                "/api/letters",
                Some(&token),
                Some(json!({"title": "Mom", "content": draft("Dear Mom")})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let id = created["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            request(Method::GET, &format!("/api/letters/{}", id), Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"title": "Mom", "content": draft("Dear Mom")}));
    }

    #[tokio::test]
    async fn test_update_replaces_body() {
        let app = app_with(Arc::default());
        let token = test_tokens::id_token("alice");

        let (_, created) = send(
            &app,
            request(
                Method::POST,
                "/api/letters",
                Some(&token),
                Some(json!({"title": "Mom", "content": draft("first")})),
            ),
        )
        .await;
        let uri = format!("/api/letters/{}", created["id"].as_str().unwrap());

        let (status, updated) = send(
            &app,
            request(
                Method::PUT,
                &uri,
                Some(&token),
                Some(json!({"title": "Mom", "content": draft("second")})),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated, json!({"success": true}));

        let (_, body) = send(&app, request(Method::GET, &uri, Some(&token), None)).await;
        assert_eq!(body["content"], draft("second"));
    }

    #[tokio::test]
    async fn test_delete_then_list() {
        let app = app_with(Arc::default());
        let token = test_tokens::id_token("alice");

        let (_, created) = send(
            &app,
            request(
                Method::POST,
                "/api/letters",
                Some(&token),
                Some(json!({"title": "Mom", "content": draft("hi")})),
            ),
        )
        .await;
        let id = created["id"].as_str().unwrap().to_string();

        let (_, listed) = send(&app, request(Method::GET, "/api/letters", Some(&token), None)).await;
        assert_eq!(listed[0]["id"], json!(id));
        assert_eq!(listed[0]["name"], json!("Mom"));
        assert!(listed[0]["modifiedTime"].is_string());

        let (status, deleted) = send(
            &app,
            request(Method::DELETE, &format!("/api/letters/{}", id), Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deleted, json!({"success": true}));

        let (_, listed) = send(&app, request(Method::GET, "/api/letters", Some(&token), None)).await;
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_expired_token_is_unauthorized_and_never_reaches_store() {
        let store = Arc::new(CountingStore::default());
        let app = app_with(store.clone());
        let token = test_tokens::expired_id_token("alice");

        let (status, body) = send(&app, request(Method::GET, "/api/letters", Some(&token), None)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Unauthorized"}));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized_on_every_route() {
        let store = Arc::new(CountingStore::default());
        let app = app_with(store.clone());
        let body = Some(json!({"title": "x", "content": null}));

        let requests = vec![
            request(Method::GET, "/api/letters", None, None),
            request(Method::POST, "/api/letters", None, body.clone()),
            request(Method::GET, "/api/letters/abc", None, None),
            request(Method::PUT, "/api/letters/abc", None, body),
            request(Method::DELETE, "/api/letters/abc", None, None),
        ];
        for req in requests {
            let (status, body) = send(&app, req).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(body, json!({"error": "Unauthorized"}));
        }
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_failure_is_generic_500() {
        let app = app_with(Arc::default());
        let token = test_tokens::id_token("alice");

        let (status, body) = send(
            &app,
            request(Method::GET, "/api/letters/does-not-exist", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to fetch letter"}));

        let (status, body) = send(
            &app,
            request(Method::DELETE, "/api/letters/does-not-exist", Some(&token), None),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to delete letter"}));
    }

    #[tokio::test]
    async fn test_body_limit_follows_configuration() {
        let token = test_tokens::id_token("alice");
        let long_letter = json!({"title": "Long", "content": "a".repeat(3 * 1024 * 1024)});

        let roomy = app_with_limit(Arc::default(), 8 * 1024 * 1024);
        let (status, created) = send(
            &roomy,
            request(Method::POST, "/api/letters", Some(&token), Some(long_letter.clone())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(created["id"].is_string());

        let store = Arc::new(CountingStore::default());
        let tight = app_with_limit(store.clone(), 1024 * 1024);
        let (status, _) = send(
            &tight,
            request(Method::POST, "/api/letters", Some(&token), Some(long_letter)),
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_health_needs_no_token() {
        let app = app_with(Arc::default());
        let (status, body) = send(&app, request(Method::GET, "/health", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("ok"));
    }
}

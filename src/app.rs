use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{ai, auth, recipes, state::AppState, vision};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(recipes::router())
                .merge(ai::router())
                .merge(vision::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!(
                        "http_request",
                        %method,
                        uri = %uri,
                        status = tracing::field::Empty
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use base64ct::{Base64, Encoding};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{
        ai::client::UpstreamError,
        testing::{FakeChat, FakeModel, FakeModelLoader},
        vision::{model::Prediction, preprocess::tests::png_bytes, ClassifierService},
    };

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register(app: &Router, username: &str) -> String {
        let (status, body) = send(
            app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "username": username, "password": "s3cret-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    fn omelette() -> Value {
        json!({
            "name": "Cheese Omelette",
            "ingredients": "eggs, Cheddar, butter",
            "instructions": "Beat the eggs, cook gently, fold over the cheese.",
            "prep_time": 5,
            "cook_time": 5,
            "servings": 1
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = build_app(AppState::fake());
        let req = Request::get("/api/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn recipe_lifecycle_end_to_end() {
        let app = build_app(AppState::fake());
        register(&app, "julia").await;

        let (status, login) = send(
            &app,
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "Julia", "password": "s3cret-pass" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = login["token"].as_str().unwrap().to_string();

        let (status, me) = send(&app, Method::GET, "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["username"], "julia");

        let (status, created) =
            send(&app, Method::POST, "/api/recipes", Some(&token), Some(omelette())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["user_id"], me["id"]);

        let (status, found) =
            send(&app, Method::GET, "/api/recipes/search?ingredient=cheddar", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["recipes"][0]["id"], id.as_str());

        let (status, got) = send(&app, Method::GET, &format!("/api/recipes/{id}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(got["name"], "Cheese Omelette");

        let uri = format!("/api/recipes/{id}");
        let (status, _) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, found) =
            send(&app, Method::GET, "/api/recipes/search?ingredient=cheddar", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["recipes"], json!([]));

        let (_, page) = send(&app, Method::GET, "/api/recipes", None, None).await;
        assert_eq!(page["total"], 0);

        let (status, err) = send(&app, Method::DELETE, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(err["error"].is_string());
    }

    #[tokio::test]
    async fn duplicate_registration_is_bad_request() {
        let app = build_app(AppState::fake());
        register(&app, "julia").await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "email": "JULIA", "password": "other-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Username already taken");
    }

    #[tokio::test]
    async fn login_does_not_reveal_which_part_was_wrong() {
        let app = build_app(AppState::fake());
        register(&app, "julia").await;
        let attempt = |username: &'static str, password: &'static str| {
            let app = app.clone();
            async move {
                send(
                    &app,
                    Method::POST,
                    "/api/auth/login",
                    None,
                    Some(json!({ "username": username, "password": password })),
                )
                .await
            }
        };
        let (s1, b1) = attempt("nobody", "s3cret-pass").await;
        let (s2, b2) = attempt("julia", "wrong-password").await;
        assert_eq!(s1, StatusCode::UNAUTHORIZED);
        assert_eq!(s2, StatusCode::UNAUTHORIZED);
        assert_eq!(b1, b2);
    }

    #[tokio::test]
    async fn non_owner_cannot_delete() {
        let app = build_app(AppState::fake());
        let owner = register(&app, "owner").await;
        let stranger = register(&app, "stranger").await;

        let (_, created) =
            send(&app, Method::POST, "/api/recipes", Some(&owner), Some(omelette())).await;
        let uri = format!("/api/recipes/{}", created["id"].as_str().unwrap());

        let (status, _) = send(&app, Method::DELETE, &uri, Some(&stranger), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn protected_routes_need_a_valid_token() {
        let app = build_app(AppState::fake());
        let (status, body) = send(&app, Method::POST, "/api/recipes", None, Some(omelette())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) =
            send(&app, Method::POST, "/api/recipes", Some("not.a.jwt"), Some(omelette())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(&app, Method::GET, "/api/auth/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn bad_input_is_reported_as_json_400() {
        let app = build_app(AppState::fake());
        let token = register(&app, "julia").await;

        for uri in ["/api/recipes/search", "/api/recipes/search?ingredient="] {
            let (status, body) = send(&app, Method::GET, uri, None, None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string());
        }

        let (status, _) = send(&app, Method::GET, "/api/recipes?page=abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::GET, "/api/recipes/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let req = Request::post("/api/recipes")
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/recipes",
            Some(&token),
            Some(json!({ "name": "ok name", "ingredients": "x" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn list_reports_total_pages() {
        let app = build_app(AppState::fake());
        let token = register(&app, "julia").await;
        for _ in 0..3 {
            send(&app, Method::POST, "/api/recipes", Some(&token), Some(omelette())).await;
        }
        let (status, page) = send(&app, Method::GET, "/api/recipes?page=2&limit=2", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(page["recipes"].as_array().unwrap().len(), 1);
        assert_eq!(page["total_pages"], 2);
        assert_eq!(page["page"], 2);
    }

    #[tokio::test]
    async fn ai_requests_are_rate_limited() {
        let fake = Arc::new(FakeChat::replying("openai", "Make an omelette."));
        let mut state = AppState::fake();
        state.ai = fake.clone();
        let app = build_app(state);

        let capacity = 3;
        for _ in 0..capacity {
            let (status, body) = send(
                &app,
                Method::POST,
                "/api/ai/ask-ai",
                None,
                Some(json!({ "prompt": "what goes with eggs?" })),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["response"], "Make an omelette.");
        }
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ai/search-recipes",
            None,
            Some(json!({ "ingredients": ["eggs"] })),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body["error"].as_str().unwrap().contains("high demand"));
        assert_eq!(fake.calls(), capacity);
    }

    #[tokio::test]
    async fn ai_validates_before_spending_tokens() {
        let fake = Arc::new(FakeChat::replying("openai", "unused"));
        let mut state = AppState::fake();
        state.ai = fake.clone();
        let app = build_app(state);

        let (status, _) =
            send(&app, Method::POST, "/api/ai/ask-ai", None, Some(json!({ "prompt": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/ai/search-recipes",
            None,
            Some(json!({ "ingredients": " , " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(fake.calls(), 0);
    }

    #[tokio::test]
    async fn suggestion_prompt_reaches_upstream() {
        let fake = Arc::new(FakeChat::replying("openai", "Shakshuka"));
        let mut state = AppState::fake();
        state.ai = fake.clone();
        let app = build_app(state);

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/ai/search-recipes",
            None,
            Some(json!({ "ingredients": "eggs, tomato" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Shakshuka");
        let sent = serde_json::to_string(&fake.sent.lock().unwrap()[0]).unwrap();
        assert!(sent.contains("eggs, tomato"));
    }

    #[tokio::test]
    async fn upstream_failures_map_to_gateway_statuses() {
        let cases: [(fn() -> UpstreamError, StatusCode); 3] = [
            (|| UpstreamError::Timeout, StatusCode::GATEWAY_TIMEOUT),
            (
                || UpstreamError::RateLimited { retry_after_secs: Some(5) },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (|| UpstreamError::Unauthorized(401), StatusCode::BAD_GATEWAY),
        ];
        for (make, expected) in cases {
            let mut state = AppState::fake();
            state.ai = Arc::new(FakeChat::failing("openai", make));
            let app = build_app(state);
            let (status, body) = send(
                &app,
                Method::POST,
                "/api/ai/ask-ai",
                None,
                Some(json!({ "prompt": "hello" })),
            )
            .await;
            assert_eq!(status, expected);
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn predict_maps_classes_to_ingredients() {
        let app = build_app(AppState::fake());
        let image = Base64::encode_string(&png_bytes(8, 8, [120, 200, 80]));
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/predict/predict",
            None,
            Some(json!({ "image": format!("data:image/png;base64,{image}") })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ingredients"], json!(["apple"]));
    }

    #[tokio::test]
    async fn predict_with_nothing_recognized_is_empty() {
        let mut state = AppState::fake();
        state.classifier = Arc::new(ClassifierService::new(
            Arc::new(FakeModelLoader::new(FakeModel::new(vec![Prediction {
                class_name: "laptop, laptop computer".into(),
                score: 0.9,
            }]))),
            5,
            0.05,
        ));
        let app = build_app(state);
        let image = Base64::encode_string(&png_bytes(4, 4, [0, 0, 0]));
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/predict/predict",
            None,
            Some(json!({ "image": image })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ingredients"], json!([]));
    }

    #[tokio::test]
    async fn predict_rejects_bad_images() {
        let app = build_app(AppState::fake());
        let not_an_image = Base64::encode_string(b"hello world");
        for image in ["", "***", not_an_image.as_str()] {
            let (status, body) = send(
                &app,
                Method::POST,
                "/api/predict/predict",
                None,
                Some(json!({ "image": image })),
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{image}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn predict_reports_unavailable_model() {
        let mut state = AppState::fake();
        state.classifier = Arc::new(ClassifierService::new(
            Arc::new(FakeModelLoader::failing_first(usize::MAX, FakeModel::new(vec![]))),
            5,
            0.05,
        ));
        let app = build_app(state);
        let image = Base64::encode_string(&png_bytes(4, 4, [0, 0, 0]));
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/predict/predict",
            None,
            Some(json!({ "image": image })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn analyze_image_forwards_a_data_url() {
        let fake = Arc::new(FakeChat::replying("openrouter", "eggs, tomato"));
        let mut state = AppState::fake();
        state.vision_ai = fake.clone();
        let app = build_app(state);

        let image = Base64::encode_string(&png_bytes(4, 4, [10, 20, 30]));
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/openrouter/analyze-image",
            None,
            Some(json!({ "image": image })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "eggs, tomato");
        let sent = serde_json::to_value(&fake.sent.lock().unwrap()[0]).unwrap();
        let url = sent[0]["content"][1]["image_url"]["url"].as_str().unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
    }
}

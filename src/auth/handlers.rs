use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, GithubLoginRequest, LoginRequest, RegisterRequest, UpdateProfileRequest,
            UserResponse,
        },
        extractors::CurrentUser,
        services::{self, AuthSession},
    },
    error::AppResult,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/github", post(github_login))
        .route("/auth/me", get(me))
        .route("/auth/update", put(update_profile))
}

fn auth_response(session: AuthSession, message: &'static str) -> Json<AuthResponse> {
    Json(AuthResponse {
        success: true,
        message,
        user: session.user,
        token: session.token,
    })
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let session = services::login(&state, &payload.email, &payload.password).await?;
    Ok(auth_response(session, "Login successful"))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let session = services::register(
        &state,
        &payload.name,
        &payload.email,
        &payload.password,
        payload.avatar,
    )
    .await?;
    Ok((StatusCode::CREATED, auth_response(session, "Registration successful")))
}

#[instrument(skip(state, payload))]
pub async fn github_login(
    State(state): State<AppState>,
    Json(payload): Json<GithubLoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let session = services::github_login(&state, &payload.code).await?;
    Ok(auth_response(session, "GitHub login successful"))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse {
        success: true,
        message: None,
        user,
    })
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let user = services::update_profile(&state, user, &payload.name).await?;
    Ok(Json(UserResponse {
        success: true,
        message: Some("Profile updated"),
        user,
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn send(app: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_then_me() {
        let app = build_app(AppState::fake());
        let (status, body) = send(
            app.clone(),
            post_json(
                "/api/auth/register",
                json!({"name": "Ann", "email": "ann@example.com", "password": "secret1"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["email"], "ann@example.com");
        assert!(body["user"].get("password_hash").is_none());
        let token = body["token"].as_str().unwrap().to_string();

        let (status, body) = send(
            app,
            Request::get("/api/auth/me")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["name"], "Ann");
        assert_eq!(body["user"]["role"], "user");
    }

    #[tokio::test]
    async fn me_requires_token() {
        let app = build_app(AppState::fake());
        let (status, body) = send(
            app.clone(),
            Request::get("/api/auth/me").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);

        let (status, _) = send(
            app,
            Request::get("/api/auth/me")
                .header(header::AUTHORIZATION, "Bearer not.a.jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn login_with_bad_email_is_bad_request() {
        let app = build_app(AppState::fake());
        let (status, body) = send(
            app,
            post_json("/api/auth/login", json!({"email": "nope", "password": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["message"].is_string());
    }
}

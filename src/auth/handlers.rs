use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::{cookie::CookieJar, WithRejection};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, FederatedSignInRequest, MessageResponse, SignInRequest, SignUpRequest},
        services::{self, cleared_session_cookie, session_cookie, FederatedIdentity, Session},
    },
    error::{AppError, AppResult},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(sign_up))
        .route("/auth/signin", post(sign_in))
        .route("/auth/google", post(google))
        .route("/auth/signout", get(sign_out))
}

fn start_session(state: &AppState, jar: CookieJar, session: Session) -> (CookieJar, Json<AuthResponse>) {
    let cookie = session_cookie(session.token, state.jwt.ttl, state.config.production);
    (
        jar.add(cookie),
        Json(AuthResponse {
            success: true,
            user: session.user.into(),
        }),
    )
}

#[instrument(skip(state, payload))]
pub async fn sign_up(
    State(state): State<AppState>,
    WithRejection(Json(payload), _): WithRejection<Json<SignUpRequest>, AppError>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    services::sign_up(
        state.users.as_ref(),
        &payload.username,
        &payload.email,
        &payload.password,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("User created successfully!")),
    ))
}

#[instrument(skip(state, jar, payload))]
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<SignInRequest>, AppError>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let session = services::sign_in(
        state.users.as_ref(),
        &state.jwt,
        &payload.email,
        &payload.password,
    )
    .await?;
    Ok(start_session(&state, jar, session))
}

#[instrument(skip(state, jar, payload))]
pub async fn google(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(payload), _): WithRejection<Json<FederatedSignInRequest>, AppError>,
) -> AppResult<(CookieJar, Json<AuthResponse>)> {
    let identity = FederatedIdentity {
        email: payload.email,
        display_name: payload.name,
        avatar_url: payload.photo,
    };
    let session = services::sign_in_federated(state.users.as_ref(), &state.jwt, identity).await?;
    Ok(start_session(&state, jar, session))
}

#[instrument(skip(jar))]
pub async fn sign_out(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    info!("session cookie cleared");
    (
        jar.add(cleared_session_cookie()),
        Json(MessageResponse::ok("User has been logged out!")),
    )
}

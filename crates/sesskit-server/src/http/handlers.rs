//! Route handlers. Each request opens the visitor's session, acts on it, and saves it.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json as AxumJson, Response},
};
use serde::Deserialize;
use serde_json::{json, Value};

use sesskit::{Assignment, FileBackend, Flash, Session};

use super::cookie;
use super::ServerState;
use crate::types::{IdBody, ServerError, ServerResult, ValueBody};

#[derive(Debug, Deserialize)]
pub struct GetQuery {
    #[serde(default)]
    sub: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DestroyQuery {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    prefix: Option<bool>,
}

/// Resume the visitor's session from the cookie, or start a fresh one.
fn open(state: &ServerState, headers: &HeaderMap) -> ServerResult<Session<FileBackend>> {
    let config = &state.config;
    let id = cookie::read_session_id(headers, &config.cookie_name);
    let session = Session::start(config.open_backend(id.as_deref()), config.prefix.clone());
    if !session.is_started() {
        return Err(ServerError::SessionUnavailable(
            config.save_path.display().to_string(),
        ));
    }
    Ok(session)
}

/// Save the session and attach the session cookie to `response`.
///
/// A session that was never written gets no cookie, so read-only visits
/// leave nothing behind.
fn finish(
    mut session: Session<FileBackend>,
    state: &ServerState,
    response: impl IntoResponse,
) -> ServerResult<Response> {
    session.save()?;

    let name = &state.config.cookie_name;
    let cookie = match session.id() {
        Some(id) if session.backend().is_persisted() => Some(cookie::session_cookie(name, id)),
        Some(_) => None,
        None => Some(cookie::expired_cookie(name)),
    };

    let mut response = response.into_response();
    if let Some(cookie) = cookie {
        let cookie =
            HeaderValue::from_str(&cookie).map_err(|e| ServerError::Transport(e.to_string()))?;
        response.headers_mut().insert(header::SET_COOKIE, cookie);
    }
    Ok(response)
}

fn value_body(key: String, value: Value) -> Response {
    AxumJson(ValueBody { key, value }).into_response()
}

/// Health check endpoint.
pub async fn health() -> AxumJson<Value> {
    AxumJson(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /session` — the raw store, every key.
pub async fn display(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let session = open(&state, &headers)?;
    let body = AxumJson(Value::Object(session.display().clone()));
    finish(session, &state, body)
}

/// `POST /session` — write every field of a JSON object.
pub async fn set_many(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    AxumJson(body): AxumJson<Value>,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;

    let response = match body {
        Value::Object(map) => {
            let written = map.len();
            session.apply(Assignment::bulk_from_object(Value::Object(map)));
            AxumJson(json!({ "written": written })).into_response()
        }
        _ => ServerError::InvalidBody("expected a JSON object".to_string()).into_response(),
    };
    finish(session, &state, response)
}

/// `DELETE /session[?key=..][&prefix=true]`
pub async fn destroy(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(query): Query<DestroyQuery>,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;
    session.destroy(
        query.key.as_deref().unwrap_or(""),
        query.prefix.unwrap_or(false),
    )?;
    finish(session, &state, StatusCode::NO_CONTENT)
}

/// `GET /session/:key[?sub=..]`
pub async fn get_key(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Query(query): Query<GetQuery>,
) -> ServerResult<Response> {
    let session = open(&state, &headers)?;
    let response = match session.get(&key, query.sub.as_deref()).cloned() {
        Some(value) => value_body(key, value),
        None => ServerError::KeyNotFound(key).into_response(),
    };
    finish(session, &state, response)
}

/// `PUT /session/:key`
pub async fn set_key(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
    AxumJson(value): AxumJson<Value>,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;
    session.set(&key, value.clone());
    finish(session, &state, value_body(key, value))
}

/// `DELETE /session/:key`
pub async fn forget_key(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;
    session.forget(&key)?;
    finish(session, &state, StatusCode::NO_CONTENT)
}

/// `POST /session/:key/pull`
pub async fn pull_key(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;
    let response = match session.pull(&key) {
        Some(value) => value_body(key, value),
        None => ServerError::KeyNotFound(key).into_response(),
    };
    finish(session, &state, response)
}

/// `GET /id`
pub async fn session_id(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let session = open(&state, &headers)?;
    let body = AxumJson(IdBody {
        id: session.id().map(str::to_string),
    });
    finish(session, &state, body)
}

/// `POST /id/regenerate`
pub async fn regenerate(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;
    let id = session.regenerate()?;
    finish(session, &state, AxumJson(IdBody { id: Some(id) }))
}

/// `POST /flash/:name` — body is a JSON string or `{"type", "text"}`.
pub async fn set_flash(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    AxumJson(flash): AxumJson<Flash>,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;
    session.flash(&name, flash);
    finish(session, &state, StatusCode::NO_CONTENT)
}

/// `GET /flash/:name` — the rendered alert, once; 204 when there is none.
pub async fn message(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    let mut session = open(&state, &headers)?;
    let response = match session.message(&name) {
        Some(html) => Html(html).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    finish(session, &state, response)
}

use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, combinators::BoxBody};
use hyper::body::Incoming as IncomingBody;
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{error, info};

use crate::AppState;
use crate::commands::{self, AutocompleteField, CommandError};
use crate::handlers::http::utils::{
    deliver_error_json, deliver_serialized_json, deliver_success_json,
};
use shared::types::{DeleteCharacterRequest, EditCharacterRequest, NewCharacter};

type HttpResponse = Response<BoxBody<Bytes, Infallible>>;

/// `GET /api/characters`: every public record, as a bare array.
pub async fn handle_list_characters(
    _req: Request<IncomingBody>,
    state: AppState,
) -> Result<HttpResponse> {
    match commands::list_characters(&state).await {
        Ok(characters) => deliver_serialized_json(&characters, StatusCode::OK),
        Err(e) => command_error(e),
    }
}

/// `POST /api/characters`
pub async fn handle_create_character(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<HttpResponse> {
    let new: NewCharacter = match read_json(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    info!("Creating character '{}'", new.name);
    match commands::create_character(&state, new).await {
        Ok(view) => deliver_success_json(&view, StatusCode::CREATED),
        Err(e) => command_error(e),
    }
}

/// `GET /api/characters/:name`
pub async fn handle_show_character(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<HttpResponse> {
    let Some(name) = path_param(&req, 3) else {
        return bad_path();
    };

    match commands::show_character(&state, &name).await {
        Ok(sheet) => deliver_success_json(&sheet, StatusCode::OK),
        Err(e) => command_error(e),
    }
}

/// `PATCH /api/characters/:name`
pub async fn handle_edit_character(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<HttpResponse> {
    let Some(name) = path_param(&req, 3) else {
        return bad_path();
    };
    let edit: EditCharacterRequest = match read_json(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    match commands::edit_character(&state, &name, &edit.password, edit.changes).await {
        Ok(view) => deliver_success_json(&view, StatusCode::OK),
        Err(e) => command_error(e),
    }
}

/// `DELETE /api/characters/:name`
pub async fn handle_delete_character(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<HttpResponse> {
    let Some(name) = path_param(&req, 3) else {
        return bad_path();
    };
    let delete: DeleteCharacterRequest = match read_json(req).await? {
        Ok(body) => body,
        Err(response) => return Ok(response),
    };

    match commands::delete_character(&state, &name, &delete.password).await {
        Ok(()) => deliver_success_json(&json!({ "name": name }), StatusCode::OK),
        Err(e) => command_error(e),
    }
}

/// `GET /api/autocomplete/:field?q=prefix`
pub async fn handle_autocomplete(
    req: Request<IncomingBody>,
    state: AppState,
) -> Result<HttpResponse> {
    let Some(field) = path_param(&req, 3) else {
        return bad_path();
    };
    let field: AutocompleteField = match field.parse() {
        Ok(field) => field,
        Err(e) => return command_error(e),
    };

    let prefix = req
        .uri()
        .query()
        .and_then(|query| {
            form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == "q")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default();

    match commands::autocomplete(&state, field, &prefix).await {
        Ok(suggestions) => deliver_success_json(&suggestions, StatusCode::OK),
        Err(e) => command_error(e),
    }
}

/// `GET /api/directory`
pub async fn handle_directory(
    _req: Request<IncomingBody>,
    state: AppState,
) -> Result<HttpResponse> {
    deliver_success_json(
        &json!({ "url": commands::directory_link(&state) }),
        StatusCode::OK,
    )
}

/// Percent-decoded path segment at `index` (`/api/characters/:name` has the
/// name at index 3).
fn path_param<B>(req: &Request<B>, index: usize) -> Option<String> {
    let segment = req.uri().path().split('/').nth(index)?;
    let decoded = urlencoding::decode(segment).ok()?.into_owned();
    if decoded.is_empty() {
        return None;
    }
    Some(decoded)
}

/// Collect and parse a JSON body. A malformed body becomes a ready 400.
async fn read_json<T: DeserializeOwned>(
    req: Request<IncomingBody>,
) -> Result<std::result::Result<T, HttpResponse>> {
    let body = req
        .collect()
        .await
        .context("Failed to read request body")?
        .to_bytes();

    match serde_json::from_slice(&body) {
        Ok(parsed) => Ok(Ok(parsed)),
        Err(e) => Ok(Err(deliver_error_json(
            "INVALID_INPUT",
            &format!("Invalid request body: {}", e),
            StatusCode::BAD_REQUEST,
        )?)),
    }
}

fn command_error(e: CommandError) -> Result<HttpResponse> {
    match &e {
        CommandError::Database(source) => error!("Database error: {}", source),
        CommandError::Task(source) => error!("Command task failed: {}", source),
        _ => {}
    }
    deliver_error_json(e.code(), &e.to_string(), e.status())
}

fn bad_path() -> Result<HttpResponse> {
    deliver_error_json("BAD_REQUEST", "Invalid path parameter", StatusCode::BAD_REQUEST)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(uri: &str) -> Request<()> {
        Request::builder().uri(uri).body(()).unwrap()
    }

    #[test]
    fn path_param_is_percent_decoded() {
        let req = get("/api/characters/Iris%20Vale");
        assert_eq!(path_param(&req, 3).as_deref(), Some("Iris Vale"));
    }

    #[test]
    fn missing_path_param_is_none() {
        assert!(path_param(&get("/api/characters/"), 3).is_none());
        assert!(path_param(&get("/api/characters"), 3).is_none());
    }

    #[test]
    fn path_param_ignores_query() {
        let req = get("/api/autocomplete/house?q=a");
        assert_eq!(path_param(&req, 3).as_deref(), Some("house"));
    }
}

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::debug;

use userapi_core::user::{User, UserInput, UserRepository};

use super::response::ApiError;
use crate::users::UserService;

pub(super) type ServiceState<R> = State<Arc<UserService<R>>>;

fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::bad_request("Invalid user ID")),
    }
}

fn parse_body(body: Result<Json<UserInput>, JsonRejection>) -> Result<UserInput, ApiError> {
    match body {
        Ok(Json(input)) => Ok(input),
        Err(rejection) => {
            debug!("Rejected request body: {}", rejection);
            Err(ApiError::bad_request("Invalid request body"))
        }
    }
}

pub(super) async fn create_user<R: UserRepository>(
    State(service): ServiceState<R>,
    body: Result<Json<UserInput>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let input = parse_body(body)?;
    let user = service.create(&input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(super) async fn get_user<R: UserRepository>(
    State(service): ServiceState<R>,
    Path(id): Path<String>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(service.get(id).await?))
}

pub(super) async fn update_user<R: UserRepository>(
    State(service): ServiceState<R>,
    Path(id): Path<String>,
    body: Result<Json<UserInput>, JsonRejection>,
) -> Result<Json<User>, ApiError> {
    let id = parse_id(&id)?;
    let input = parse_body(body)?;
    Ok(Json(service.update(id, &input).await?))
}

pub(super) async fn delete_user<R: UserRepository>(
    State(service): ServiceState<R>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub(super) async fn not_found() -> ApiError {
    ApiError::not_found("Endpoint not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_id() {
        assert_eq!(parse_id("42").unwrap(), 42);
        for bad in ["0", "-1", "abc", "", "1.5"] {
            let err = parse_id(bad).unwrap_err();
            assert_eq!(err.status, StatusCode::BAD_REQUEST);
            assert_eq!(err.body.error, "Invalid user ID");
        }
    }
}

// handlers/signup.rs - POST /signup handler

use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};

use super::AppState;
use crate::api::format::{account_response, user_account_response, user_response, TimeFormats};
use crate::context::Context;
use crate::error::ApiError;
use crate::services::SignupRequest;

/**
 * POST /signup - Create an account, its first user and their admin membership
 *
 * Expected Input:
 * ```json
 * {
 *   "account": { "name": "Acme", "address1": "...", "city": "...", "region": "...", "country": "...", "zipcode": "..." },
 *   "user": { "first_name": "...", "last_name": "...", "email": "a@x", "password": "...", "password_confirm": "..." }
 * }
 * ```
 *
 * @returns 201 with the created records, 400 with field errors on validation failure
 */
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let ctx = Context::new();
    let result = state.signup.signup(&ctx, &req, state.clock.now()).await?;

    let formats = TimeFormats::default();
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": {
                "account": account_response(&result.account, &formats),
                "user": user_response(&result.user, &formats),
                "membership": user_account_response(&result.membership, &formats),
            }
        })),
    ))
}

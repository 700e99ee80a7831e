use axum::{extract::State, response::Json};
use axum_valid::Valid;
use model::entities::{category::TransactionType, transaction::TransactionStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, trace};
use utoipa::ToSchema;

use crate::auth::ApiKeyUser;
use crate::error::ApiResult;
use crate::schemas::{ApiResponse, AppState};
use crate::sms::{ProcessOutcome, SmsMessage, SmsProcessor};

/// What was read from the SMS
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedData {
    #[schema(value_type = String, example = "35.50")]
    pub amount: Decimal,
    pub merchant: Option<String>,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

/// Result returned to the iOS shortcut
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookResult {
    pub transaction_id: i32,
    pub status: TransactionStatus,
    /// The SMS had already been recorded
    pub duplicate: bool,
    pub parsed_data: ParsedData,
}

impl From<ProcessOutcome> for WebhookResult {
    fn from(outcome: ProcessOutcome) -> Self {
        let transaction = outcome.transaction;
        Self {
            transaction_id: transaction.id,
            status: transaction.status,
            duplicate: outcome.duplicate,
            parsed_data: ParsedData {
                amount: transaction.amount,
                merchant: transaction.merchant,
                transaction_type: transaction.transaction_type,
            },
        }
    }
}

/// Receive a bank SMS forwarded by the iOS shortcut
///
/// Authenticated with the user's API key as a bearer token.
#[utoipa::path(
    post,
    path = "/api/webhook/sms",
    tag = "webhook",
    request_body = SmsMessage,
    responses(
        (status = 200, description = "SMS recorded", body = ApiResponse<WebhookResult>),
        (status = 400, description = "Empty SMS"),
        (status = 401, description = "Missing or unknown API key", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, user, message), fields(user_id = user.id))]
pub async fn receive_sms(
    State(state): State<AppState>,
    ApiKeyUser(user): ApiKeyUser,
    Valid(Json(message)): Valid<Json<SmsMessage>>,
) -> ApiResult<Json<ApiResponse<WebhookResult>>> {
    trace!("Entering receive_sms function");

    let outcome = SmsProcessor::from_state(&state)
        .process(&user, &message)
        .await?;

    let text = if outcome.duplicate {
        "重复短信，账单已存在"
    } else {
        "账单已记录"
    };
    info!(
        "SMS handled: transaction {}, status {:?}",
        outcome.transaction.id, outcome.parse_status
    );

    Ok(Json(ApiResponse::ok(WebhookResult::from(outcome), text)))
}

//! `/jenkins/result`: job callback, relayed to the user as a chat message

use axum::{
    body::Bytes,
    extract::State as AxumState,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, info, warn};

use crate::SharedState;
use crate::jenkins::JobResult;
use crate::slack::result_message;

/// POST /jenkins/result - post the result to the user. Answers 200 once the post was attempted.
pub async fn receive_result(AxumState(state): AxumState<SharedState>, body: Bytes) -> Response {
    let result = match JobResult::from_slice(&body) {
        Ok(result) => result,
        Err(e) => {
            warn!("Rejected Jenkins callback: {}", e);
            return e.into_response();
        }
    };

    let message = result_message(&result.bmi);
    match state.client.post_message(&result.user_id, &message).await {
        Ok(()) => info!("Posted BMI result to user {}", result.user_id),
        Err(e) => error!("Failed to post BMI result to user {}: {}", result.user_id, e),
    }

    StatusCode::OK.into_response()
}

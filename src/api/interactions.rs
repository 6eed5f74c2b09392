//! `/slack/interactions`: form submissions

use axum::{
    Form, Json,
    extract::{State as AxumState, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::SharedState;
use crate::error::ClientInputError;
use crate::form::{BMI_FORM, FormSubmission, InteractionPayload};

#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    #[serde(default)]
    pub payload: Option<String>,
}

/// POST /slack/interactions - dispatch the CI job and close the form
pub async fn handle_interaction(
    AxumState(state): AxumState<SharedState>,
    form: Result<Form<InteractionForm>, FormRejection>,
) -> Response {
    match process_interaction(&state, form) {
        Ok(response) => response,
        Err(e) => {
            warn!("Rejected interaction: {}", e);
            e.into_response()
        }
    }
}

fn process_interaction(
    state: &SharedState,
    form: Result<Form<InteractionForm>, FormRejection>,
) -> Result<Response, ClientInputError> {
    let Form(form) = form.map_err(|e| ClientInputError::InvalidForm(e.body_text()))?;
    let raw = form
        .payload
        .ok_or_else(|| ClientInputError::MissingField("payload".to_string()))?;
    let payload = InteractionPayload::parse(&raw)?;

    if !payload.is_view_submission() {
        debug!("Ignoring {} interaction", payload.kind);
        return Ok(StatusCode::OK.into_response());
    }
    if !payload.targets(&BMI_FORM) {
        debug!("Ignoring submission of another view");
        return Ok(StatusCode::OK.into_response());
    }

    let submission = FormSubmission::from_payload(&payload, &BMI_FORM)?;

    let errors = submission.field_errors(&BMI_FORM);
    if !errors.is_empty() {
        info!(
            "BMI form from user {} has invalid values: {:?}",
            submission.user_id, errors
        );
        return Ok(Json(json!({
            "response_action": "errors",
            "errors": errors,
        }))
        .into_response());
    }

    let user_id = submission.user_id.clone();
    let dispatch_id = state.dispatcher.dispatch_job(submission.into());
    info!(
        "Accepted BMI form from user {} (dispatch {})",
        user_id, dispatch_id
    );

    Ok(Json(json!({ "response_action": "clear" })).into_response())
}

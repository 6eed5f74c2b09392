//! `/bmi` slash command: open the BMI form

use axum::{
    Form,
    extract::{State as AxumState, rejection::FormRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::SharedState;
use crate::form::BMI_FORM;

/// Fields of a slash command request this relay cares about
#[derive(Debug, Deserialize)]
pub struct SlashCommand {
    #[serde(default)]
    pub trigger_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// POST /bmi - open the form, then answer 200 whatever Slack said about it
pub async fn open_bmi_form(
    AxumState(state): AxumState<SharedState>,
    form: Result<Form<SlashCommand>, FormRejection>,
) -> Response {
    let command = match form {
        Ok(Form(command)) => command,
        Err(e) => {
            warn!("Could not parse slash command body: {}", e);
            return (StatusCode::BAD_REQUEST, "Invalid form body").into_response();
        }
    };

    let Some(trigger_id) = command
        .trigger_id
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        warn!("Slash command without trigger_id");
        return (StatusCode::BAD_REQUEST, "Missing trigger_id").into_response();
    };

    match state
        .client
        .open_form(trigger_id, &BMI_FORM.modal_view())
        .await
    {
        Ok(()) => info!(
            "Opened BMI form for user {}",
            command.user_id.as_deref().unwrap_or("(unknown)")
        ),
        Err(e) => error!("Failed to open BMI form: {}", e),
    }

    StatusCode::OK.into_response()
}

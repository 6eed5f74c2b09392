//! Slack Web API calls: `views.open` and `chat.postMessage`

use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::SlackSettings;
use crate::error::{Upstream, UpstreamError, UpstreamResult, read_body, truncate};
use crate::form::ModalView;

pub const VIEWS_OPEN: &str = "views.open";
pub const CHAT_POST_MESSAGE: &str = "chat.postMessage";

#[derive(Debug, Serialize)]
struct OpenViewRequest<'a> {
    trigger_id: &'a str,
    view: &'a ModalView,
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

/// Slack answers 200 even for failed calls; the outcome is in `ok`/`error`
#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Clone)]
pub struct SlackClient {
    http: Client,
    api_base: Url,
    bot_token: String,
}

impl SlackClient {
    pub fn new(http: Client, settings: &SlackSettings) -> Self {
        Self {
            http,
            api_base: settings.api_base.clone(),
            bot_token: settings.bot_token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base.as_str().trim_end_matches('/'), method)
    }

    /// Open the modal `view` in the context identified by `trigger_id`
    pub async fn open_view(
        &self,
        trigger_id: &str,
        view: &ModalView,
        timeout: Duration,
    ) -> UpstreamResult<()> {
        self.call(
            VIEWS_OPEN,
            &OpenViewRequest { trigger_id, view },
            Some(timeout),
        )
        .await
    }

    /// Post `text` to `channel`; a user id as channel delivers it as a direct message
    pub async fn post_message(&self, channel: &str, text: &str) -> UpstreamResult<()> {
        self.call(CHAT_POST_MESSAGE, &PostMessageRequest { channel, text }, None)
            .await
    }

    async fn call<B: Serialize>(
        &self,
        method: &str,
        body: &B,
        timeout: Option<Duration>,
    ) -> UpstreamResult<()> {
        let mut request = self
            .http
            .post(self.method_url(method))
            .bearer_auth(&self.bot_token)
            .json(body);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let response = request
            .send()
            .await
            .map_err(|source| UpstreamError::Unavailable {
                service: Upstream::Slack,
                source,
            })?;

        let status = response.status();
        let text = read_body(Upstream::Slack, response).await;
        if !status.is_success() {
            return Err(UpstreamError::Rejected {
                service: Upstream::Slack,
                status: status.as_u16(),
                body: truncate(&text),
            });
        }

        debug!("{} response: {}", method, text);
        match serde_json::from_str::<SlackApiResponse>(&text) {
            Ok(SlackApiResponse { ok: true, .. }) => Ok(()),
            Ok(SlackApiResponse { error, .. }) => Err(UpstreamError::SlackApi {
                method: method.to_string(),
                error: error.unwrap_or_else(|| "unknown_error".to_string()),
            }),
            Err(e) => Err(UpstreamError::SlackApi {
                method: method.to_string(),
                error: format!("unreadable response: {}", e),
            }),
        }
    }
}

/// Reply text sent once the CI job reports a result
pub fn result_message(bmi: &str) -> String {
    format!("Your BMI is *{}*", bmi)
}

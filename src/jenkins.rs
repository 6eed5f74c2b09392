//! Jenkins parameterized-build trigger

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use crate::config::JenkinsSettings;
use crate::error::{
    ClientInputError, Upstream, UpstreamError, UpstreamResult, read_body, truncate,
};
use crate::form::FormSubmission;

/// Build parameters, sent as `HEIGHT`, `WEIGHT` and `USER` query parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobParameters {
    #[serde(rename = "HEIGHT")]
    pub height: String,
    #[serde(rename = "WEIGHT")]
    pub weight: String,
    #[serde(rename = "USER")]
    pub user: String,
}

impl From<FormSubmission> for JobParameters {
    fn from(submission: FormSubmission) -> Self {
        Self {
            height: submission.height,
            weight: submission.weight,
            user: submission.user_id,
        }
    }
}

#[derive(Clone)]
pub struct JenkinsClient {
    http: Client,
    trigger_url: Url,
    user: String,
    token: String,
}

impl JenkinsClient {
    pub fn new(http: Client, settings: &JenkinsSettings) -> Self {
        Self {
            http,
            trigger_url: settings.trigger_url.clone(),
            user: settings.user.clone(),
            token: settings.token.clone(),
        }
    }

    /// Queue a build. Jenkins answers 201 Created when the build is queued.
    pub async fn trigger(&self, params: &JobParameters) -> UpstreamResult<()> {
        let response = self
            .http
            .post(self.trigger_url.clone())
            .basic_auth(&self.user, Some(&self.token))
            .query(params)
            .send()
            .await
            .map_err(|source| UpstreamError::Unavailable {
                service: Upstream::Jenkins,
                source,
            })?;

        let status = response.status();
        if status == StatusCode::CREATED {
            return Ok(());
        }

        let body = read_body(Upstream::Jenkins, response).await;
        Err(UpstreamError::JobTriggerFailed {
            status: status.as_u16(),
            body: truncate(&body),
        })
    }
}

/// The computed value; Jenkins jobs may send it as a string or as a bare number
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultValue {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Deserialize)]
struct JobResultPayload {
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bmi: Option<ResultValue>,
}

/// Callback body sent by the Jenkins job when it finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub user_id: String,
    /// Rendered exactly as received
    pub bmi: String,
}

impl JobResult {
    pub fn from_slice(body: &[u8]) -> Result<Self, ClientInputError> {
        let payload: JobResultPayload = serde_json::from_slice(body)
            .map_err(|e| ClientInputError::MalformedPayload(e.to_string()))?;

        let user_id = payload
            .user
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ClientInputError::MissingField("user".to_string()))?;
        let bmi = match payload.bmi {
            Some(ResultValue::Text(text)) => Some(text),
            Some(ResultValue::Number(number)) => Some(number.to_string()),
            None => None,
        }
        .filter(|b| !b.trim().is_empty())
        .ok_or_else(|| ClientInputError::MissingField("bmi".to_string()))?;

        Ok(Self { user_id, bmi })
    }
}

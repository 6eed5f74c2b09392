//! Outbound side of the relay, as seen by the HTTP handlers

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use crate::config::RelayConfig;
use crate::error::UpstreamResult;
use crate::form::ModalView;
use crate::jenkins::{JenkinsClient, JobParameters};
use crate::slack::SlackClient;

/// The three outbound operations. Each is a single call with a bounded timeout and no retry.
#[async_trait]
pub trait RelayClient: Send + Sync {
    async fn open_form(&self, trigger_id: &str, view: &ModalView) -> UpstreamResult<()>;

    async fn trigger_job(&self, params: &JobParameters) -> UpstreamResult<()>;

    async fn post_message(&self, user_id: &str, text: &str) -> UpstreamResult<()>;
}

/// Production client talking to Slack and Jenkins over HTTP
#[derive(Clone)]
pub struct HttpRelayClient {
    slack: SlackClient,
    jenkins: JenkinsClient,
    open_form_timeout: Duration,
}

impl HttpRelayClient {
    pub fn new(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(config.http_timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            slack: SlackClient::new(http.clone(), &config.slack),
            jenkins: JenkinsClient::new(http, &config.jenkins),
            open_form_timeout: config.open_form_timeout,
        })
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    async fn open_form(&self, trigger_id: &str, view: &ModalView) -> UpstreamResult<()> {
        self.slack
            .open_view(trigger_id, view, self.open_form_timeout)
            .await
    }

    async fn trigger_job(&self, params: &JobParameters) -> UpstreamResult<()> {
        self.jenkins.trigger(params).await
    }

    async fn post_message(&self, user_id: &str, text: &str) -> UpstreamResult<()> {
        self.slack.post_message(user_id, text).await
    }
}

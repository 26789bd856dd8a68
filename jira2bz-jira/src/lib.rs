use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use jira2bz_config::Jira2BzConfig;
use reqwest::blocking::{Client, RequestBuilder};
use tracing::debug;

pub mod export;

const REQUEST_TIMEOUT_SECS: u64 = 120;

#[derive(Clone, Debug, PartialEq, Eq)]
enum AuthMode {
    Basic { user: String, password: String },
    Bearer { token: String },
}

/// Downloads issue exports and attachments from a JIRA server.
pub struct JiraClient {
    server: String,
    http: Client,
    auth_mode: AuthMode,
}

impl JiraClient {
    pub fn from_config(config: &Jira2BzConfig) -> Result<Self> {
        let server = config
            .jira_server
            .as_deref()
            .ok_or_else(|| anyhow!("jira_server not configured"))?;
        let auth_mode = parse_auth_mode(config)?;

        let http = Client::builder()
            .danger_accept_invalid_certs(config.insecure)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .with_context(|| "failed to build Jira HTTP client")?;

        Ok(Self {
            server: server.to_string(),
            http,
            auth_mode,
        })
    }

    pub fn issue_xml_url(&self, key: &str) -> String {
        format!(
            "{}/si/jira.issueviews:issue-xml/{key}/{key}.xml",
            self.server
        )
    }

    pub fn attachment_url(&self, id: &str, file_name: &str) -> String {
        format!(
            "{}/secure/attachment/{}/{}",
            self.server,
            urlencoding::encode(id),
            urlencoding::encode(file_name)
        )
    }

    /// Fetches the XML export of one issue.
    ///
    /// The body is returned byte for byte whatever the HTTP status: JIRA
    /// answers an unknown key with an HTML page that is detected later by
    /// [`export::is_missing_issue`].
    pub fn fetch_issue_xml(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .with_auth(self.http.get(self.issue_xml_url(key)))
            .send()
            .with_context(|| format!("failed to fetch issue export for {}", key))?;

        debug!(key, status = %response.status(), "issue export response");

        let body = response
            .bytes()
            .with_context(|| format!("failed to read issue export body for {}", key))?;
        Ok(body.to_vec())
    }

    /// Fetches the raw bytes of an attachment, or `None` when the server refuses it.
    pub fn fetch_attachment(&self, id: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .with_auth(self.http.get(self.attachment_url(id, file_name)))
            .send()
            .with_context(|| format!("failed to fetch attachment {} ({})", id, file_name))?;

        let status = response.status();
        debug!(id, file_name, status = %status, "attachment response");
        if !status.is_success() {
            return Ok(None);
        }

        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read attachment body {} ({})", id, file_name))?;
        Ok(Some(bytes.to_vec()))
    }

    fn with_auth(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_mode {
            AuthMode::Basic { user, password } => request.basic_auth(user, Some(password)),
            AuthMode::Bearer { token } => request.bearer_auth(token),
        }
    }
}

fn parse_auth_mode(config: &Jira2BzConfig) -> Result<AuthMode> {
    let secret = config
        .jira_password
        .as_deref()
        .ok_or_else(|| anyhow!("jira_password not configured (set JIRA2BZ_PASSWORD)"))?;

    match config.auth_method() {
        "basic" => {
            let user = config
                .jira_user
                .as_deref()
                .ok_or_else(|| anyhow!("jira_user not configured for basic auth"))?;
            Ok(AuthMode::Basic {
                user: user.to_string(),
                password: secret.to_string(),
            })
        }
        "bearer" => Ok(AuthMode::Bearer {
            token: secret.to_string(),
        }),
        other => bail!("unsupported auth method '{}'", other),
    }
}

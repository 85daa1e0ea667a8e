//! JIRA REST adapter

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use super::{TicketAdapter, TicketError};
use crate::config::{JiraConfig, TicketSystem};
use crate::domain::{Card, TicketData};
use crate::flow::start_of_day;

#[derive(Debug, Clone, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraFields,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraFields {
    summary: Option<String>,
    status: Option<Named>,
    issuetype: Option<Named>,
    assignee: Option<JiraUser>,
    reporter: Option<JiraUser>,
    description: Option<String>,
    duedate: Option<String>,
    #[serde(default)]
    fix_versions: Vec<Named>,
    /// Custom fields, looked up by id
    #[serde(flatten)]
    extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
struct Named {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUser {
    name: Option<String>,
    display_name: Option<String>,
}

impl JiraUser {
    fn username(self) -> Option<String> {
        self.name.or(self.display_name)
    }
}

/// Connection state shared by every JIRA lookup. Issues are never kept
/// between fetches; every refresh sees the tracker's current payload.
pub struct JiraSession {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    service_class_field: Option<String>,
}

impl JiraSession {
    pub fn new(config: &JiraConfig) -> Result<Self, TicketError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("kardboard/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            service_class_field: config.service_class_field.clone(),
        })
    }

    pub fn browse_url(&self, key: &str) -> String {
        format!("{}/browse/{}", self.base_url, key)
    }

    pub async fn get_issue(&self, key: &str) -> Result<TicketData, TicketError> {
        tracing::info!("Fetching JIRA data for {}", key);
        let url = format!("{}/rest/api/2/issue/{}", self.base_url, key);
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Accept", "application/json")
            .send()
            .await?;

        let issue: JiraIssue = handle_response(response, key).await?;
        Ok(issue_to_ticket(issue, self.service_class_field.as_deref()))
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    key: &str,
) -> Result<T, TicketError> {
    let status = response.status();

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(TicketError::NotFound(key.to_string()));
    }

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(TicketError::AuthRequired);
    }

    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(TicketError::ApiError {
            status: status.as_u16(),
            message: error_text,
        });
    }

    response
        .json()
        .await
        .map_err(|e| TicketError::ParseError(e.to_string()))
}

fn issue_to_ticket(issue: JiraIssue, service_class_field: Option<&str>) -> TicketData {
    let JiraIssue { key, fields } = issue;

    let service_class = service_class_field
        .and_then(|field| fields.extra.get(field))
        .and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Object(o) => o.get("value")?.as_str().map(str::to_string),
            _ => None,
        });

    let due_date = fields.duedate.as_deref().and_then(|d| {
        NaiveDate::parse_from_str(d, "%Y-%m-%d")
            .map(start_of_day)
            .map_err(|e| tracing::warn!("Unparseable due date '{}' on {}: {}", d, key, e))
            .ok()
    });

    TicketData {
        key: Some(key),
        summary: fields.summary,
        status: fields.status.map(|s| s.name),
        service_class,
        assignee: fields.assignee.and_then(JiraUser::username),
        reporter: fields.reporter.and_then(JiraUser::username),
        description: fields.description,
        due_date,
        version: fields.fix_versions.into_iter().next().map(|v| v.name),
        ticket_type: fields.issuetype.map(|t| t.name),
        qaers: Vec::new(),
        developers: Vec::new(),
    }
}

pub struct JiraAdapter {
    session: Arc<JiraSession>,
}

impl JiraAdapter {
    pub fn new(session: Arc<JiraSession>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Arc<JiraSession> {
        &self.session
    }
}

#[async_trait]
impl TicketAdapter for JiraAdapter {
    fn kind(&self) -> TicketSystem {
        TicketSystem::Jira
    }

    fn ticket_url(&self, key: &str) -> Option<String> {
        Some(self.session.browse_url(key))
    }

    async fn fetch(&self, card: &Card) -> Result<Option<TicketData>, TicketError> {
        self.session.get_issue(&card.key).await.map(Some)
    }
}

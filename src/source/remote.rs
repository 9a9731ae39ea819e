//! Client for the ad-platform reporting (Graph-style) API.
//!
//! HTTP goes through the [`Transport`] trait so the pagination and shaping
//! logic can be exercised against canned replies. [`HttpTransport`] is the
//! real implementation on top of `reqwest`'s blocking client.

use std::{collections::HashSet, time::Duration};

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

use crate::{
    config::RemoteConfig,
    data::format_number,
    source::{RawTable, actions},
};

const INSIGHT_FIELDS: &[&str] = &[
    "campaign_id",
    "campaign_name",
    "adset_id",
    "adset_name",
    "ad_id",
    "ad_name",
    "date_start",
    "date_stop",
    "spend",
    "impressions",
    "clicks",
    "actions",
    "action_values",
    "objective",
];

/// Columns of the table produced for each partition, in output order.
pub const SHAPED_COLUMNS: &[&str] = &[
    "account_id",
    "campaign_id",
    "campaign_name",
    "date",
    "spend",
    "impressions",
    "clicks",
    "purchases",
    "revenue",
    "ad_id",
    "ad_name",
    "objective",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SourceError {
    #[error("access token rejected: {0}")]
    Unauthorized(String),
    #[error("access token is missing required permissions: {}", .0.join(", "))]
    MissingScopes(Vec<String>),
    #[error("request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("network error: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("pagination returned an already visited page: {0}")]
    PaginationLoop(String),
    #[error("all {0} account(s) failed to return data")]
    AllPartitionsFailed(usize),
}

impl SourceError {
    /// True for credential problems, as opposed to transient or upstream failures.
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            SourceError::Unauthorized(_) | SourceError::MissingScopes(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn json(&self) -> Result<Value, SourceError> {
        serde_json::from_str(&self.body).map_err(|err| SourceError::Malformed(err.to_string()))
    }
}

pub trait Transport {
    /// Issues a GET. An empty `query` means `url` already carries every
    /// parameter, as pagination cursors do.
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpReply, SourceError>;
}

pub struct HttpTransport {
    http: reqwest::blocking::Client,
    token: String,
}

impl HttpTransport {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        Ok(Self {
            http,
            token: token.into(),
        })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpReply, SourceError> {
        let mut request = self.http.get(url).bearer_auth(&self.token);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request
            .send()
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| SourceError::Transport(err.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub since: NaiveDate,
    pub until: NaiveDate,
}

impl DateRange {
    fn to_query_value(&self) -> String {
        json!({
            "since": self.since.format("%Y-%m-%d").to_string(),
            "until": self.until.format("%Y-%m-%d").to_string(),
        })
        .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenOwner {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdAccount {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub account_status: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Permission {
    permission: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct Listing<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug)]
pub struct PartitionFailure {
    pub account_id: String,
    pub error: SourceError,
}

/// Result of fetching several accounts: whatever succeeded, plus what did not.
#[derive(Debug, Default)]
pub struct FetchReport {
    pub table: RawTable,
    pub failures: Vec<PartitionFailure>,
}

pub struct GraphClient<T: Transport> {
    transport: T,
    base_url: String,
    action_type: String,
    required_scopes: Vec<String>,
}

impl<T: Transport> GraphClient<T> {
    pub fn new(transport: T, config: &RemoteConfig) -> Self {
        Self {
            transport,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            action_type: config.action_type.clone(),
            required_scopes: config.required_scopes.clone(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Confirms the token is accepted and carries every required scope.
    pub fn validate_token(&self) -> Result<TokenOwner, SourceError> {
        let reply = self.transport.get(
            &format!("{}/me", self.base_url),
            &[("fields".to_string(), "id,name".to_string())],
        )?;
        if !reply.is_success() {
            return Err(SourceError::Unauthorized(reply.body));
        }
        let owner: TokenOwner = serde_json::from_value(reply.json()?)
            .map_err(|err| SourceError::Malformed(err.to_string()))?;

        let reply = self
            .transport
            .get(&format!("{}/me/permissions", self.base_url), &[])?;
        if !reply.is_success() {
            return Err(SourceError::Unauthorized(format!(
                "cannot verify permissions: {}",
                reply.body
            )));
        }
        let listing: Listing<Permission> = serde_json::from_value(reply.json()?)
            .map_err(|err| SourceError::Malformed(err.to_string()))?;
        let missing = self
            .required_scopes
            .iter()
            .filter(|scope| {
                !listing
                    .data
                    .iter()
                    .any(|p| &p.permission == *scope && p.status == "granted")
            })
            .cloned()
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(SourceError::MissingScopes(missing));
        }
        info!(
            "Token valid for {}",
            owner.name.as_deref().unwrap_or(owner.id.as_str())
        );
        Ok(owner)
    }

    pub fn ad_accounts(&self) -> Result<Vec<AdAccount>, SourceError> {
        let reply = self.transport.get(
            &format!("{}/me/adaccounts", self.base_url),
            &[(
                "fields".to_string(),
                "id,name,currency,account_status".to_string(),
            )],
        )?;
        if !reply.is_success() {
            return Err(SourceError::Status {
                status: reply.status,
                body: reply.body,
            });
        }
        let listing: Listing<AdAccount> = serde_json::from_value(reply.json()?)
            .map_err(|err| SourceError::Malformed(err.to_string()))?;
        Ok(listing.data)
    }

    /// Fetches every page of daily ad-level insights for one account, in
    /// cursor order, and shapes them into a raw table.
    pub fn insights(&self, account_id: &str, range: &DateRange) -> Result<RawTable, SourceError> {
        let mut url = format!("{}/{}/insights", self.base_url, account_id);
        let mut query = vec![
            ("fields".to_string(), INSIGHT_FIELDS.join(",")),
            ("time_range".to_string(), range.to_query_value()),
            ("time_increment".to_string(), "1".to_string()),
            ("level".to_string(), "ad".to_string()),
        ];
        let mut objects = Vec::new();
        let mut pages = 0usize;
        let mut visited = HashSet::new();
        loop {
            let reply = self.transport.get(&url, &query)?;
            if !reply.is_success() {
                return Err(SourceError::Status {
                    status: reply.status,
                    body: reply.body,
                });
            }
            let body = reply.json()?;
            let Some(data) = body.get("data").and_then(Value::as_array) else {
                debug!("Page without data for {account_id}; stopping pagination");
                break;
            };
            pages += 1;
            objects.extend(data.iter().filter_map(Value::as_object).cloned());
            match body
                .get("paging")
                .and_then(|paging| paging.get("next"))
                .and_then(Value::as_str)
            {
                Some(next) => {
                    if !visited.insert(next.to_string()) {
                        return Err(SourceError::PaginationLoop(next.to_string()));
                    }
                    url = next.to_string();
                    query.clear();
                }
                None => break,
            }
        }
        debug!(
            "Fetched {} insight row(s) across {} page(s) for {}",
            objects.len(),
            pages,
            account_id
        );
        Ok(self.shape(account_id, &objects))
    }

    /// Fetches each account in turn. A failing account is recorded and the
    /// rest continue; only a total failure is an error.
    pub fn fetch_accounts(
        &self,
        account_ids: &[String],
        range: &DateRange,
    ) -> Result<FetchReport, SourceError> {
        let mut report = FetchReport::default();
        for account_id in account_ids {
            match self.insights(account_id, range) {
                Ok(table) => {
                    info!("Fetched {} record(s) from {}", table.len(), account_id);
                    report.table.append(table);
                }
                Err(error) => {
                    warn!("Fetching {account_id} failed: {error}");
                    report.failures.push(PartitionFailure {
                        account_id: account_id.clone(),
                        error,
                    });
                }
            }
        }
        if !account_ids.is_empty() && report.failures.len() == account_ids.len() {
            return Err(SourceError::AllPartitionsFailed(account_ids.len()));
        }
        Ok(report)
    }

    fn shape(&self, account_id: &str, objects: &[Map<String, Value>]) -> RawTable {
        let headers = SHAPED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let rows = objects
            .iter()
            .map(|object| {
                SHAPED_COLUMNS
                    .iter()
                    .map(|column| match *column {
                        "account_id" => account_id.to_string(),
                        "date" => scalar_text(object.get("date_start")),
                        "purchases" => format_number(actions::action_value(
                            object.get("actions"),
                            &self.action_type,
                        )),
                        "revenue" => format_number(actions::action_value(
                            object.get("action_values"),
                            &self.action_type,
                        )),
                        other => scalar_text(object.get(other)),
                    })
                    .collect()
            })
            .collect();
        RawTable::new(headers, rows)
    }
}

fn scalar_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, collections::HashMap};

    #[derive(Default)]
    struct CannedTransport {
        replies: HashMap<String, HttpReply>,
        calls: RefCell<Vec<String>>,
    }

    impl CannedTransport {
        fn reply(mut self, url: &str, status: u16, body: Value) -> Self {
            self.replies.insert(
                url.to_string(),
                HttpReply {
                    status,
                    body: body.to_string(),
                },
            );
            self
        }
    }

    impl Transport for CannedTransport {
        fn get(&self, url: &str, _query: &[(String, String)]) -> Result<HttpReply, SourceError> {
            self.calls.borrow_mut().push(url.to_string());
            self.replies
                .get(url)
                .cloned()
                .ok_or_else(|| SourceError::Transport(format!("connection refused: {url}")))
        }
    }

    fn config() -> RemoteConfig {
        RemoteConfig {
            base_url: "https://graph.test/v18.0".to_string(),
            ..RemoteConfig::default()
        }
    }

    #[test]
    fn validate_token_reports_missing_scopes() {
        let transport = CannedTransport::default()
            .reply(
                "https://graph.test/v18.0/me",
                200,
                json!({"id": "1", "name": "Ana"}),
            )
            .reply(
                "https://graph.test/v18.0/me/permissions",
                200,
                json!({"data": [
                    {"permission": "ads_read", "status": "granted"},
                    {"permission": "read_insights", "status": "declined"}
                ]}),
            );
        let client = GraphClient::new(transport, &config());
        let err = client.validate_token().unwrap_err();
        assert_eq!(err, SourceError::MissingScopes(vec!["read_insights".into()]));
        assert!(err.is_validation_failure());
    }

    #[test]
    fn network_failure_is_not_a_validation_failure() {
        let client = GraphClient::new(CannedTransport::default(), &config());
        let err = client.validate_token().unwrap_err();
        assert!(matches!(err, SourceError::Transport(_)));
        assert!(!err.is_validation_failure());
    }

    #[test]
    fn rejected_token_is_unauthorized() {
        let transport = CannedTransport::default().reply(
            "https://graph.test/v18.0/me",
            401,
            json!({"error": {"message": "Invalid OAuth access token"}}),
        );
        let client = GraphClient::new(transport, &config());
        assert!(matches!(
            client.validate_token(),
            Err(SourceError::Unauthorized(_))
        ));
    }

    #[test]
    fn shape_extracts_purchase_actions() {
        let transport = CannedTransport::default().reply(
            "https://graph.test/v18.0/act_1/insights",
            200,
            json!({"data": [{
                "campaign_id": "c1",
                "campaign_name": "Spring",
                "date_start": "2024-03-01",
                "spend": "12.50",
                "impressions": "1000",
                "clicks": "20",
                "actions": [{"action_type": "purchase", "value": "2"}],
                "action_values": [{"action_type": "purchase", "value": "300.5"}]
            }]}),
        );
        let client = GraphClient::new(transport, &config());
        let range = DateRange {
            since: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            until: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        };
        let table = client.insights("act_1", &range).expect("insights");
        let row = &table.rows[0];
        let get = |name: &str| row[table.column_index(name).unwrap()].as_str();
        assert_eq!(get("account_id"), "act_1");
        assert_eq!(get("date"), "2024-03-01");
        assert_eq!(get("purchases"), "2");
        assert_eq!(get("revenue"), "300.5");
        assert_eq!(get("ad_id"), "");
    }
}

//! Single-shot HTTP calls against a Dashing server

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

use crate::error::DashingError;

/// Message returned when neither the call nor the config names a server
pub const NO_DASHING_URL: &str = "No Dashing URL found.";

/// Result of a Dashing call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashingResponse {
    /// Whether the call succeeded
    pub res: bool,

    /// HTTP status, when a request was made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Response body, JSON when it parses, text otherwise
    #[serde(default)]
    pub data: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DashingResponse {
    fn no_url() -> Self {
        Self {
            res: false,
            status: None,
            data: Value::String(String::new()),
            message: Some(NO_DASHING_URL.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashingClient {
    http: Client,
    url: Option<String>,
    token: Option<String>,
}

impl DashingClient {
    /// Client with configured fallbacks for the server URL and token
    pub fn new(url: Option<String>, token: Option<String>) -> Result<Self, DashingError> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self { http, url, token })
    }

    /// Post data to a widget: `POST <url>/widgets/<widget>`.
    ///
    /// The body is `{"auth_token": token}` updated with `widget_data`.
    pub async fn widget_post(
        &self,
        dashing_url: Option<&str>,
        token: Option<&str>,
        widget: &str,
        widget_data: &Map<String, Value>,
    ) -> Result<DashingResponse, DashingError> {
        let Some(url) = self.resolve_url(dashing_url) else {
            error!("{}", NO_DASHING_URL);
            return Ok(DashingResponse::no_url());
        };
        let token = self.resolve_token(token);

        let mut body = Map::new();
        body.insert("auth_token".to_string(), json!(token));
        body.extend(widget_data.iter().map(|(k, v)| (k.clone(), v.clone())));

        let function = format!("widgets/{}", widget);
        self.query(&function, url, token, Method::POST, Some(Value::Object(body)))
            .await
    }

    /// Ask every connected dashboard to reload: `POST <url>/dashboards/*`
    pub async fn dashboard_reload(
        &self,
        dashing_url: Option<&str>,
        token: Option<&str>,
    ) -> Result<DashingResponse, DashingError> {
        let Some(url) = self.resolve_url(dashing_url) else {
            error!("{}", NO_DASHING_URL);
            return Ok(DashingResponse::no_url());
        };
        let token = self.resolve_token(token);

        let body = json!({"auth_token": token, "event": "reload"});
        self.query("dashboards/*", url, token, Method::POST, Some(body))
            .await
    }

    /// Call `function` relative to `dashing_url`. GET requests carry no body.
    pub async fn query(
        &self,
        function: &str,
        dashing_url: &str,
        token: Option<&str>,
        method: Method,
        data: Option<Value>,
    ) -> Result<DashingResponse, DashingError> {
        let url = Url::parse(dashing_url)?.join(function)?;
        debug!(%method, %url, "Dashing request");

        let mut request = self
            .http
            .request(method.clone(), url)
            .header("Content-Type", "application/json");
        if let Some(token) = token {
            request = request.header("auth_token", token);
        }
        if method != Method::GET {
            request = request.json(&data.unwrap_or_else(|| json!({})));
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        let data = serde_json::from_str(&text).unwrap_or(Value::String(text));

        debug!(status = status.as_u16(), "Dashing response");

        Ok(DashingResponse {
            res: status.is_success(),
            status: Some(status.as_u16()),
            data,
            message: (!status.is_success()).then(|| format!("Dashing returned {}", status)),
        })
    }

    fn resolve_url<'a>(&'a self, url: Option<&'a str>) -> Option<&'a str> {
        url.filter(|u| !u.is_empty())
            .or(self.url.as_deref())
            .filter(|u| !u.is_empty())
    }

    fn resolve_token<'a>(&'a self, token: Option<&'a str>) -> Option<&'a str> {
        token.filter(|t| !t.is_empty()).or(self.token.as_deref())
    }
}

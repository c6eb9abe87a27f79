//! Minimal REST client helpers for the auth and table endpoints.

use super::endpoints as ep;
use super::*;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use reqwest::StatusCode;

const PREFER_UPSERT: &str = "resolution=merge-duplicates,return=minimal";
const PREFER_MINIMAL: &str = "return=minimal";

#[derive(Debug, thiserror::Error)]
pub enum RestError {
    #[error("http: {0}")]
    Http(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("serde: {0}")]
    Serde(String),
}

impl RestError {
    /// Human readable message for alerts: the backend's own message when it sent one.
    pub fn message(&self) -> String {
        match self {
            RestError::Status { status, body } => {
                backend_message(body).unwrap_or_else(|| format!("HTTP {status}"))
            }
            other => other.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            RestError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// PostgREST sends `message`, the auth service `msg` or `error_description`.
fn backend_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .tcp_keepalive(Some(Duration::from_secs(180)))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(180))
        // Bound request duration
        .timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build HTTP client")
});

fn mk_client() -> Result<reqwest::Client, RestError> {
    Ok(HTTP_CLIENT.clone())
}

fn request(
    project: &Project,
    method: reqwest::Method,
    url: String,
    bearer: &str,
) -> Result<reqwest::RequestBuilder, RestError> {
    let client = mk_client()?;
    Ok(client
        .request(method, url)
        .header("apikey", &project.anon_key)
        .bearer_auth(bearer))
}

async fn send(builder: reqwest::RequestBuilder) -> Result<reqwest::Response, RestError> {
    builder
        .send()
        .await
        .map_err(|e| RestError::Http(e.to_string()))
}

async fn handle_json<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, RestError> {
    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(RestError::Status {
            status: status.as_u16(),
            body,
        });
    }
    res.json::<T>()
        .await
        .map_err(|e| RestError::Serde(e.to_string()))
}

async fn handle_empty(res: reqwest::Response) -> Result<(), RestError> {
    if res.status().is_success() {
        Ok(())
    } else {
        let status = res.status().as_u16();
        let body = res.text().await.unwrap_or_default();
        Err(RestError::Status { status, body })
    }
}

pub async fn sign_in_with_password(
    project: &Project,
    req: &PasswordGrantReq,
) -> Result<AuthSessionResp, RestError> {
    let url = ep::auth_password_grant(&project.url);
    let res = send(request(project, reqwest::Method::POST, url, &project.anon_key)?.json(req)).await?;
    handle_json(res).await
}

pub async fn refresh_session(
    project: &Project,
    refresh_token: &str,
) -> Result<AuthSessionResp, RestError> {
    let url = ep::auth_refresh_grant(&project.url);
    let body = RefreshGrantReq {
        refresh_token: refresh_token.to_string(),
    };
    let res =
        send(request(project, reqwest::Method::POST, url, &project.anon_key)?.json(&body)).await?;
    handle_json(res).await
}

pub async fn sign_up(project: &Project, req: &PasswordGrantReq) -> Result<SignUpResp, RestError> {
    let url = ep::auth_signup(&project.url);
    let res = send(request(project, reqwest::Method::POST, url, &project.anon_key)?.json(req)).await?;
    handle_json(res).await
}

pub async fn sign_out(project: &Project, bearer: &str) -> Result<(), RestError> {
    let url = ep::auth_logout(&project.url);
    let res = send(request(project, reqwest::Method::POST, url, bearer)?).await?;
    handle_empty(res).await
}

pub async fn select<T: DeserializeOwned>(
    project: &Project,
    bearer: &str,
    table: &str,
    columns: &str,
    order: Option<&str>,
) -> Result<Vec<T>, RestError> {
    let url = ep::select(&project.url, table, columns, order);
    let res = send(request(project, reqwest::Method::GET, url, bearer)?).await?;
    handle_json(res).await
}

/// At most one row; `None` when the filter matched nothing.
pub async fn select_one<T: DeserializeOwned>(
    project: &Project,
    bearer: &str,
    table: &str,
    columns: &str,
    id: &str,
) -> Result<Option<T>, RestError> {
    let url = ep::select_by_id(&project.url, table, columns, id);
    let res = send(request(project, reqwest::Method::GET, url, bearer)?).await?;
    let rows: Vec<T> = handle_json(res).await?;
    Ok(rows.into_iter().next())
}

pub async fn upsert<B: Serialize + ?Sized>(
    project: &Project,
    bearer: &str,
    table: &str,
    body: &B,
) -> Result<(), RestError> {
    let url = ep::table(&project.url, table);
    let builder = request(project, reqwest::Method::POST, url, bearer)?
        .header("Prefer", PREFER_UPSERT)
        .json(body);
    handle_empty(send(builder).await?).await
}

pub async fn insert<B: Serialize + ?Sized>(
    project: &Project,
    bearer: &str,
    table: &str,
    body: &B,
) -> Result<(), RestError> {
    let url = ep::table(&project.url, table);
    let builder = request(project, reqwest::Method::POST, url, bearer)?
        .header("Prefer", PREFER_MINIMAL)
        .json(body);
    handle_empty(send(builder).await?).await
}

pub async fn update_by_id<B: Serialize + ?Sized>(
    project: &Project,
    bearer: &str,
    table: &str,
    id: &str,
    body: &B,
) -> Result<(), RestError> {
    let url = ep::table_by_id(&project.url, table, id);
    let builder = request(project, reqwest::Method::PATCH, url, bearer)?
        .header("Prefer", PREFER_MINIMAL)
        .json(body);
    handle_empty(send(builder).await?).await
}

pub async fn delete_by_id(
    project: &Project,
    bearer: &str,
    table: &str,
    id: &str,
) -> Result<(), RestError> {
    let url = ep::table_by_id(&project.url, table, id);
    let res = send(request(project, reqwest::Method::DELETE, url, bearer)?).await?;
    handle_empty(res).await
}

pub async fn delete_all(project: &Project, bearer: &str, table: &str) -> Result<(), RestError> {
    let url = ep::table_filtered(&project.url, table, ALL_ROWS_FILTER);
    let res = send(request(project, reqwest::Method::DELETE, url, bearer)?).await?;
    handle_empty(res).await
}

/// Calls a remote procedure; its return value is ignored.
pub async fn rpc<B: Serialize + ?Sized>(
    project: &Project,
    bearer: &str,
    function: &str,
    body: &B,
) -> Result<(), RestError> {
    let url = ep::rpc(&project.url, function);
    let res = send(request(project, reqwest::Method::POST, url, bearer)?.json(body)).await?;
    handle_empty(res).await
}

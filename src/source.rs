use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use reqwest::header::USER_AGENT;
use serde_json::Value;
use thiserror::Error;

static CLIENT: OnceCell<Client> = OnceCell::new();

/// Where exports and media live: a static HTTP server or a local directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Http { base: String },
    Dir { root: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatasetError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("parse error: {0}")]
    Parse(String),
}

impl DataSource {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            DataSource::Http {
                base: raw.trim_end_matches('/').to_string(),
            }
        } else {
            DataSource::Dir {
                root: PathBuf::from(raw),
            }
        }
    }

    /// Location string for a relative resource name or a `/media/...` path.
    pub fn resolve(&self, name: &str) -> String {
        let name = name.trim_start_matches('/');
        match self {
            DataSource::Http { base } => format!("{base}/{name}"),
            DataSource::Dir { root } => root.join(name).to_string_lossy().into_owned(),
        }
    }
}

pub fn http_client(timeout: Duration) -> Result<&'static Client, DatasetError> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DatasetError::Transport(format!("failed to build http client: {err}")))
    })
}

/// Fetch and parse one JSON export. `location` is the output of [`DataSource::resolve`].
pub fn fetch_json(
    source: &DataSource,
    location: &str,
    timeout: Duration,
) -> Result<Value, DatasetError> {
    let body = match source {
        DataSource::Http { .. } => {
            let client = http_client(timeout)?;
            let resp = client
                .get(location)
                .header(USER_AGENT, "f1_report/0.1")
                .send()
                .map_err(|err| DatasetError::Transport(format!("request failed: {err}")))?;
            let status = resp.status();
            if !status.is_success() {
                return Err(DatasetError::Transport(format!("http {status}")));
            }
            resp.text()
                .map_err(|err| DatasetError::Transport(format!("failed reading body: {err}")))?
        }
        DataSource::Dir { .. } => fs::read_to_string(location)
            .map_err(|err| DatasetError::Transport(format!("failed reading {location}: {err}")))?,
    };
    parse_json_body(&body)
}

pub fn parse_json_body(body: &str) -> Result<Value, DatasetError> {
    serde_json::from_str(body.trim()).map_err(|err| DatasetError::Parse(format!("invalid json: {err}")))
}

/// True when the candidate at `location` can be loaded.
pub fn can_load(source: &DataSource, location: &str, timeout: Duration) -> bool {
    match source {
        DataSource::Http { .. } => {
            let Ok(client) = http_client(timeout) else {
                return false;
            };
            client
                .head(location)
                .header(USER_AGENT, "f1_report/0.1")
                .send()
                .map(|resp| resp.status().is_success())
                .unwrap_or(false)
        }
        DataSource::Dir { .. } => fs::metadata(location)
            .map(|meta| meta.is_file())
            .unwrap_or(false),
    }
}

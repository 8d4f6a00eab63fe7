//! Microsoft Graph drive (OneDrive / SharePoint) over REST.
//!
//! Expects a bearer token that was acquired elsewhere; token acquisition is
//! not handled here.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::debug;

use caselake_core::config::SourceConfig;
use caselake_core::retry::RetryPolicy;
use caselake_core::traits::FileStore;
use caselake_core::types::DocumentRef;
use caselake_core::{Error, Result};
use caselake_embed::openai::{api_key_from_env, http_client, is_retryable_status, transport_error};

const PROVIDER: &str = "graph";

#[derive(Debug, Deserialize)]
struct ChildrenPage {
    value: Vec<DriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
    name: String,
    folder: Option<serde_json::Value>,
    file: Option<FileFacet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileFacet {
    mime_type: Option<String>,
}

pub struct GraphDriveStore {
    client: Client,
    base_url: String,
    drive_id: String,
    token: String,
    retry: RetryPolicy,
}

impl GraphDriveStore {
    pub fn new(base_url: &str, drive_id: &str, token: String, timeout: Duration, retry: RetryPolicy) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
            drive_id: drive_id.to_string(),
            token,
            retry,
        })
    }

    pub fn from_config(config: &SourceConfig, retry: RetryPolicy) -> Result<Self> {
        let drive_id = config
            .drive_id
            .as_deref()
            .ok_or_else(|| Error::InvalidConfig("source.drive_id is required for the graph source".into()))?;
        let token = api_key_from_env(&config.token_env)?;
        Self::new(&config.graph_base_url, drive_id, token, Duration::from_secs(config.timeout_secs), retry)
    }

    fn drive_url(&self, path: &str) -> String {
        format!("{}/drives/{}/{}", self.base_url, self.drive_id, path)
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        self.retry.run("graph request", || {
            let res = self.client.get(url).bearer_auth(&self.token).send().map_err(|e| transport_error(PROVIDER, &e))?;
            let status = res.status();
            if !status.is_success() {
                let detail: String = res.text().unwrap_or_default().chars().take(512).collect();
                return Err(Error::provider(PROVIDER, format!("HTTP {} for {}: {}", status, url, detail), is_retryable_status(status)));
            }
            Ok(res)
        })
    }

    /// Every child of a drive item, following `@odata.nextLink`.
    fn children(&self, first_url: String) -> Result<Vec<DriveItem>> {
        let mut items = Vec::new();
        let mut next = Some(first_url);
        while let Some(url) = next {
            let page: ChildrenPage = self
                .get(&url)?
                .json()
                .map_err(|e| Error::provider(PROVIDER, format!("invalid listing body: {}", e), false))?;
            debug!(items = page.value.len(), more = page.next_link.is_some(), "graph listing page");
            items.extend(page.value);
            next = page.next_link;
        }
        Ok(items)
    }
}

impl FileStore for GraphDriveStore {
    fn resolve_folder(&self, name: &str) -> Result<String> {
        self.children(self.drive_url("root/children"))?
            .into_iter()
            .find(|item| item.name == name && item.folder.is_some())
            .map(|item| item.id)
            .ok_or_else(|| Error::FolderNotFound(name.to_string()))
    }

    fn list_documents(&self, folder_id: &str) -> Result<Vec<DocumentRef>> {
        Ok(self
            .children(self.drive_url(&format!("items/{}/children", folder_id)))?
            .into_iter()
            .filter_map(|item| {
                let mime_type = item.file?.mime_type.unwrap_or_default();
                Some(DocumentRef { id: item.id, name: item.name, mime_type })
            })
            .collect())
    }

    fn fetch_content(&self, id: &str) -> Result<Vec<u8>> {
        let res = self.get(&self.drive_url(&format!("items/{}/content", id)))?;
        let bytes = res.bytes().map_err(|e| transport_error(PROVIDER, &e))?;
        Ok(bytes.to_vec())
    }
}

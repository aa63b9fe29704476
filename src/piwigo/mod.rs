//! Piwigo web-service client.
//!
//! Talks to `<base>/ws.php?format=json` over a single cookie-bearing session.
//! Every call is one request/response exchange; nothing is retried.

pub mod models;

use std::io::Read;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::GalleryConfig;
use crate::error::{Error, Result};
use crate::transfer::RemoteGallery;
use models::ApiResponse;

pub use models::{RemoteCategory, RemoteImage};

/// Longest body excerpt quoted in a malformed-response error.
const BODY_EXCERPT_LEN: usize = 100;

pub struct PiwigoClient {
    base_url: String,
    username: String,
    password: String,
    timeout: Option<Duration>,
    agent: ureq::Agent,
    logged_in: bool,
}

impl PiwigoClient {
    pub fn new(base_url: &str, username: &str, password: &str) -> Self {
        Self::with_timeout(base_url, username, password, None)
    }

    pub fn from_config(config: &GalleryConfig) -> Self {
        Self::with_timeout(
            &config.url,
            &config.username,
            &config.password,
            config.timeout_secs.map(Duration::from_secs),
        )
    }

    fn with_timeout(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            timeout,
            agent: build_agent(timeout),
            logged_in: false,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in
    }

    fn ws_url(&self) -> String {
        format!("{}/ws.php", self.base_url)
    }

    /// Submit the credentials. `Ok(false)` means the service gave no verdict.
    pub fn login(&mut self) -> Result<bool> {
        let url = self.ws_url();
        debug!("Logging in to {} as {}", url, self.username);

        let response = self
            .agent
            .post(&url)
            .query("format", "json")
            .send_form(&[
                ("method", "pwg.session.login"),
                ("username", self.username.as_str()),
                ("password", self.password.as_str()),
            ])
            .map_err(|e| Error::transport(&url, e))?;
        let body = read_json_body(response, &url)?;
        let api: ApiResponse = serde_json::from_str(&body)?;

        if api.is_fail() {
            return Err(Error::Authentication(api.error_message()));
        }

        if api.is_ok() {
            self.logged_in = true;
            info!("Logged in to Piwigo at {}", self.base_url);
            return Ok(true);
        }

        Ok(false)
    }

    /// Every category, recursively, with full display names.
    pub fn categories(&self) -> Result<Vec<RemoteCategory>> {
        let api = self.call(
            "pwg.categories.getList",
            &[("recursive", "true"), ("fullname", "true")],
        )?;
        let categories = models::decode_categories(api.result.as_ref());
        debug!("Received {} categories", categories.len());
        Ok(categories)
    }

    /// One page of images in a category. An empty page marks the end.
    pub fn images_in_category(
        &self,
        category_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteImage>> {
        let cat_id = category_id.to_string();
        let per_page = per_page.to_string();
        let page_str = page.to_string();
        let api = self.call(
            "pwg.categories.getImages",
            &[
                ("cat_id", cat_id.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page_str.as_str()),
            ],
        )?;
        let images = models::decode_images(api.result.as_ref());
        debug!(
            "Category {} page {}: {} images",
            category_id,
            page,
            images.len()
        );
        Ok(images)
    }

    /// Fetch the raw bytes behind an image URL using the session cookies.
    pub fn download(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| Error::transport(url, e))?;

        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| Error::transport(url, e))?;

        debug!("Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes)
    }

    /// End the session. Network errors are ignored; local state is always reset.
    pub fn logout(&mut self) {
        if !self.logged_in {
            return;
        }

        if let Err(e) = self.call("pwg.session.logout", &[]) {
            warn!("Ignoring logout error: {}", e);
        }

        self.logged_in = false;
        self.agent = build_agent(self.timeout);
        info!("Logged out of Piwigo");
    }

    fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<ApiResponse> {
        if !self.logged_in {
            return Err(Error::NotLoggedIn);
        }

        let url = self.ws_url();
        let mut request = self
            .agent
            .get(&url)
            .query("format", "json")
            .query("method", method);
        for (key, value) in params {
            request = request.query(key, value);
        }

        debug!("Calling {}", method);
        let response = request.call().map_err(|e| Error::transport(&url, e))?;
        let body = read_json_body(response, &url)?;
        let api: ApiResponse = serde_json::from_str(&body)?;

        if api.is_fail() {
            return Err(Error::Protocol {
                message: api.error_message(),
                code: api.err.clone(),
            });
        }

        Ok(api)
    }
}

fn build_agent(timeout: Option<Duration>) -> ureq::Agent {
    let mut builder =
        ureq::AgentBuilder::new().user_agent(concat!("piwigo-digikam/", env!("CARGO_PKG_VERSION")));
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build()
}

fn read_json_body(response: ureq::Response, url: &str) -> Result<String> {
    let body = response
        .into_string()
        .map_err(|e| Error::transport(url, e))?;
    check_json_body(&body)?;
    Ok(body)
}

/// Reject bodies that cannot be JSON before handing them to the parser.
/// An error page from the web server should not look like an API error.
fn check_json_body(body: &str) -> Result<()> {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return Err(Error::MalformedResponse("empty response".to_string()));
    }

    if !trimmed.starts_with('{') && !trimmed.starts_with('[') {
        let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
        return Err(Error::MalformedResponse(format!(
            "invalid JSON response: {}",
            excerpt
        )));
    }

    Ok(())
}

impl RemoteGallery for PiwigoClient {
    fn login(&mut self) -> Result<bool> {
        PiwigoClient::login(self)
    }

    fn categories(&mut self) -> Result<Vec<RemoteCategory>> {
        PiwigoClient::categories(self)
    }

    fn images_in_category(
        &mut self,
        category_id: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RemoteImage>> {
        PiwigoClient::images_in_category(self, category_id, page, per_page)
    }

    fn download(&mut self, url: &str) -> Result<Vec<u8>> {
        PiwigoClient::download(self, url)
    }

    fn logout(&mut self) {
        PiwigoClient::logout(self)
    }
}

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use log::{debug, info};
use reqwest::{
    cookie::Jar,
    header::{
        HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, REFERER, UPGRADE_INSECURE_REQUESTS,
        USER_AGENT,
    },
    redirect::Policy,
    Client, StatusCode, Url,
};
use serde::de::DeserializeOwned;

use crate::{
    error::{Result, SboError},
    models::{BookInfo, Chapter, ChaptersResponse},
};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.212 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_REDIRECTS: usize = 10;
const EXPIRED_MARKER: &str = r#"user_type":"Expired""#;

pub struct Unauthenticated;
pub struct Authenticated;

/// Raw response, never interpreted by the session.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct OreillyClient<State = Unauthenticated> {
    client: Client,
    base_url: Url,
    _state: PhantomData<State>,
}

impl<State> OreillyClient<State> {
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn make_url(&self, endpoint: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(endpoint)
            .with_context(|| format!("invalid endpoint: {}", endpoint))?)
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        Ok(Response {
            status,
            content_type,
            body,
        })
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(SboError::Upstream(format!(
                "unexpected status {} for {}",
                response.status, url
            )));
        }

        serde_json::from_slice(&response.body)
            .map_err(|err| SboError::Upstream(format!("invalid response from {}: {}", url, err)))
    }
}

impl OreillyClient<Unauthenticated> {
    /// Builds a session that sends every cookie on `/` of the base url host.
    pub fn new(cookies: &HashMap<String, String>, base_url: Url, user_agent: &str) -> Result<Self> {
        let jar = Jar::default();
        for (name, value) in cookies {
            jar.add_cookie_str(&format!("{}={}; Path=/", name, value), &base_url);
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,image/apng,*/*;q=0.8"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).context("invalid user agent")?,
        );
        let referer = base_url
            .join("login/unified/?next=/home/")
            .context("invalid base url")?;
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer.as_str()).context("invalid referer")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .cookie_provider(Arc::new(jar))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            _state: PhantomData,
        })
    }

    /// Probes the profile page, the session is usable only if it is reachable
    /// and the account is not expired.
    pub async fn check_login(self) -> Result<OreillyClient<Authenticated>> {
        let url = self.make_url("profile/")?;
        let response = self
            .get(url.as_str())
            .await
            .map_err(|err| SboError::AuthenticationFailed(err.to_string()))?;

        if !response.is_success() {
            return Err(SboError::AuthenticationFailed(format!(
                "profile request returned {}, make sure your cookies are fresh",
                response.status
            )));
        }

        if response.text().contains(EXPIRED_MARKER) {
            return Err(SboError::SubscriptionExpired);
        }

        info!("Session is valid");
        Ok(OreillyClient {
            client: self.client,
            base_url: self.base_url,
            _state: PhantomData,
        })
    }
}

/// Moves cover chapters to the front, keeping relative order on both sides.
pub(crate) fn promote_covers(page: Vec<Chapter>) -> impl Iterator<Item = Chapter> {
    let (covers, rest): (Vec<_>, Vec<_>) = page.into_iter().partition(Chapter::is_cover);
    covers.into_iter().chain(rest)
}

impl OreillyClient<Authenticated> {
    pub async fn fetch_book_details(&self, book_id: &str) -> Result<BookInfo> {
        let url = self.make_url(&format!("api/v1/book/{}/", book_id))?;
        self.get_json::<BookInfo>(url.as_str())
            .await
            .map_err(|err| SboError::Upstream(format!("unable to retrieve book info: {}", err)))
    }

    pub async fn fetch_book_chapters(&self, book_id: &str) -> Result<Vec<Chapter>> {
        info!("Loading chapter information");
        let mut page_url = Some(
            self.make_url(&format!("api/v1/book/{}/chapter/?page=1", book_id))?
                .to_string(),
        );
        let mut chapters: Vec<Chapter> = Vec::new();

        // Pages are walked in order, cover promotion must not cross page boundaries

        while let Some(url) = page_url.take() {
            let page = self.get_json::<ChaptersResponse>(&url).await?;
            if page.results.is_empty() {
                if chapters.is_empty() {
                    return Err(SboError::Upstream(
                        "unable to retrieve book chapters: empty chapter list".to_string(),
                    ));
                }
                break;
            }
            debug!(
                "Chapter page {} returned {} of {} chapters",
                url,
                page.results.len(),
                page.count
            );
            chapters.extend(promote_covers(page.results));
            page_url = page.next.filter(|next| !next.is_empty());
        }

        info!("Found {} chapters", chapters.len());
        Ok(chapters)
    }
}

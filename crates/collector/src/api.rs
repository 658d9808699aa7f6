//! Authenticated JSON client for the REST API a collector reads from.

use {
    reqwest::{Client, Response, header::HeaderMap},
    secrecy::{ExposeSecret, Secret},
    serde::{Serialize, de::DeserializeOwned},
    tracing::{debug, warn},
    url::Url,
};

use crate::{Error, Result};

/// Upper bound on pages followed by [`ApiClient::get_paginated`].
const MAX_PAGES: usize = 1000;

/// REST API handle with a bearer token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    token: Secret<String>,
    max_pages: usize,
}

impl ApiClient {
    /// `base_url` is the API root, e.g. `https://canvas.example.edu/api/v1`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            token: Secret::new(token.into()),
            max_pages: MAX_PAGES,
        })
    }

    /// Use a preconfigured HTTP client (timeouts, proxies).
    #[must_use]
    pub fn with_http_client(mut self, http: Client) -> Self {
        self.http = http;
        self
    }

    /// Cap on pages followed by [`ApiClient::get_paginated`].
    #[must_use]
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` against the API root. Absolute URLs are used as-is.
    fn url(&self, path: &str) -> Result<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    async fn send_get(&self, url: Url, query: &[(&str, &str)]) -> Result<Response> {
        debug!(url = %url, "GET");
        let resp = self
            .http
            .get(url)
            .query(query)
            .bearer_auth(self.token.expose_secret())
            .header("Accept", "application/json")
            .send()
            .await?;
        check_status(resp).await
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let resp = self.send_get(self.url(path)?, query).await?;
        Ok(resp.json().await?)
    }

    /// Fetch every page of a list endpoint, following `Link: <...>;
    /// rel="next"` headers.
    ///
    /// Next links must stay on the API's origin. Reaching the page cap with
    /// more pages left is an error.
    pub async fn get_paginated<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut resp = self.send_get(self.url(path)?, query).await?;
        let mut pages = 1;
        loop {
            let next = next_link(resp.headers())
                .map(|next| resp.url().join(&next))
                .transpose()?;
            let page: Vec<T> = resp.json().await?;
            items.extend(page);
            let Some(next) = next else {
                return Ok(items);
            };
            if next.origin() != self.base_url.origin() {
                warn!(next = %next, "refusing to follow next link to another origin");
                return Err(Error::Pagination(format!(
                    "next link {next} leaves {}",
                    self.base_url.origin().ascii_serialization()
                )));
            }
            if pages >= self.max_pages {
                warn!(pages, path, "page limit reached");
                return Err(Error::Pagination(format!(
                    "more than {pages} pages at {path}"
                )));
            }
            // The next link already carries the query.
            resp = self.send_get(next, &[]).await?;
            pages += 1;
        }
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        debug!(url = %url, "POST");
        let resp = self
            .http
            .post(url)
            .bearer_auth(self.token.expose_secret())
            .json(body)
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::api(status.as_u16(), body))
}

/// The `rel="next"` target of a `Link` header, if any.
fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(reqwest::header::LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let mut parts = link.split(';');
            let target = parts.next()?.trim();
            let is_next = parts.any(|param| {
                let param = param.trim();
                param == "rel=\"next\"" || param == "rel=next"
            });
            is_next.then(|| {
                target
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string()
            })
        })
}

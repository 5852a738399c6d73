use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::submission::Submission;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionPage {
    pub items: Vec<Submission>,
    pub has_more: bool,
}

/// Paginated listing of form responses. Pages start at 1.
#[async_trait]
pub trait SubmissionSource: Send + Sync {
    async fn list_submissions(&self, form_id: &str, page: u32) -> Result<SubmissionPage>;
}

#[derive(Debug, Deserialize)]
struct ResponsesPage {
    #[serde(default)]
    page_count: Option<u32>,
    #[serde(default)]
    items: Vec<Submission>,
}

impl ResponsesPage {
    fn into_page(self, form_id: &str, page: u32, page_size: usize) -> SubmissionPage {
        let has_more = match self.page_count {
            Some(count) => page < count,
            None => self.items.len() >= page_size,
        } && self.items.len() >= page_size;

        let items = self
            .items
            .into_iter()
            .map(|mut item| {
                if item.form_id.is_empty() {
                    item.form_id = form_id.to_string();
                }
                item
            })
            .collect();
        SubmissionPage { items, has_more }
    }
}

/// Typeform responses API, retried with a fixed backoff.
#[derive(Clone)]
pub struct TypeformClient {
    client: Client,
    base_url: String,
    token: String,
    page_size: usize,
    max_retries: u32,
    backoff: Duration,
}

impl TypeformClient {
    pub fn new(
        client: Client,
        base_url: String,
        token: String,
        page_size: usize,
        max_retries: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            page_size,
            max_retries,
            backoff,
        }
    }

    async fn fetch_page(&self, form_id: &str, page: u32) -> Result<SubmissionPage> {
        let url = format!("{}/forms/{}/responses", self.base_url, form_id);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("page_size", self.page_size.to_string()), ("page", page.to_string())])
            .send()
            .await?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "Form provider returned {} for {} page {}: {}",
                status, form_id, page, text
            )));
        }

        let body: ResponsesPage = res.json().await?;
        Ok(body.into_page(form_id, page, self.page_size))
    }
}

#[async_trait]
impl SubmissionSource for TypeformClient {
    async fn list_submissions(&self, form_id: &str, page: u32) -> Result<SubmissionPage> {
        with_retries(self.max_retries, self.backoff, form_id, page, || {
            self.fetch_page(form_id, page)
        })
        .await
    }
}

/// Runs `op` once plus up to `max_retries` more times, sleeping `backoff`
/// between tries. The last error is wrapped in [`Error::Upstream`].
async fn with_retries<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    form_id: &str,
    page: u32,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_retries => {
                attempt += 1;
                tracing::warn!(
                    form_id,
                    page,
                    attempt,
                    max_retries,
                    "Listing failed, retrying: {}",
                    e
                );
                tokio::time::sleep(backoff).await;
            }
            Err(e) => {
                return Err(Error::Upstream(format!(
                    "Listing {} page {} failed after {} retries: {}",
                    form_id, page, max_retries, e
                )))
            }
        }
    }
}

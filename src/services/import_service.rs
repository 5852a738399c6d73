use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::services::form_client::SubmissionSource;
use crate::services::ingestion_service::{IngestOptions, IngestOutcome, IngestionService};
use crate::models::submission::Submission;

#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub form_ids: Vec<String>,
    pub batch_size: usize,
    pub batch_delay: Duration,
    pub page_delay: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageError {
    pub form_id: String,
    pub page: u32,
    pub error: String,
}

/// End-of-run counts. `processed` is every submission handed to ingestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImportSummary {
    pub processed: usize,
    pub created: usize,
    pub merged: usize,
    pub skipped_duplicate: usize,
    pub already_analyzed: usize,
    pub failed: usize,
    pub page_errors: Vec<PageError>,
}

impl ImportSummary {
    fn record(&mut self, outcome: &IngestOutcome) {
        self.processed += 1;
        match outcome {
            IngestOutcome::Created => self.created += 1,
            IngestOutcome::Merged { .. } => self.merged += 1,
            IngestOutcome::DuplicateSkipped { .. } => self.skipped_duplicate += 1,
            IngestOutcome::AlreadyAnalyzed => self.already_analyzed += 1,
            IngestOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Pulls every response of the configured forms and feeds them through
/// ingestion, one at a time, in rate-limited batches.
pub struct ImportService {
    source: Arc<dyn SubmissionSource>,
    ingestion: Arc<IngestionService>,
    settings: ImportSettings,
}

impl ImportService {
    pub fn new(
        source: Arc<dyn SubmissionSource>,
        ingestion: Arc<IngestionService>,
        settings: ImportSettings,
    ) -> Self {
        Self {
            source,
            ingestion,
            settings,
        }
    }

    pub async fn run(&self) -> ImportSummary {
        let mut summary = ImportSummary::default();
        for form_id in &self.settings.form_ids {
            let submissions = self.collect_form(form_id, &mut summary).await;
            tracing::info!(form_id = %form_id, count = submissions.len(), "Form responses listed");
            self.process(&submissions, &mut summary).await;
        }
        tracing::info!(
            processed = summary.processed,
            created = summary.created,
            merged = summary.merged,
            skipped_duplicate = summary.skipped_duplicate,
            already_analyzed = summary.already_analyzed,
            failed = summary.failed,
            page_errors = summary.page_errors.len(),
            "Import finished"
        );
        summary
    }

    /// Lists all pages of one form. A page that still fails after retries is
    /// recorded and ends the listing of that form.
    async fn collect_form(&self, form_id: &str, summary: &mut ImportSummary) -> Vec<Submission> {
        let mut submissions = Vec::new();
        let mut page = 1;
        loop {
            match self.source.list_submissions(form_id, page).await {
                Ok(listed) => {
                    submissions.extend(listed.items);
                    if !listed.has_more {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(form_id, page, "Page listing failed: {}", e);
                    summary.page_errors.push(PageError {
                        form_id: form_id.to_string(),
                        page,
                        error: e.to_string(),
                    });
                    break;
                }
            }
            page += 1;
            tokio::time::sleep(self.settings.page_delay).await;
        }
        submissions
    }

    async fn process(&self, submissions: &[Submission], summary: &mut ImportSummary) {
        let options = IngestOptions { skip_analyzed: true };
        let batch_size = self.settings.batch_size.max(1);
        for (index, batch) in submissions.chunks(batch_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.batch_delay).await;
            }
            for submission in batch {
                let report = self.ingestion.ingest(submission, options).await;
                summary.record(&report.outcome);
            }
        }
    }
}

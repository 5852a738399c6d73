use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::database::CandidateStore;
use crate::error::Result;
use crate::models::candidate::{Candidate, UNIDENTIFIED_NAME};
use crate::models::submission::Submission;
use crate::services::ai_service::Enricher;
use crate::services::field_extractor::{ExtractedFields, FieldAliasMap};
use crate::services::requirements_service;
use crate::services::resolver::{CandidateResolver, MatchedBy, Resolution};
use crate::utils::normalize::digits_or_none;
use crate::utils::time::now;

/// Per-submission pipeline states, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Received,
    FieldsExtracted,
    IdentityResolved,
    Persisted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IngestOutcome {
    Created,
    Merged { matched_by: MatchedBy },
    DuplicateSkipped {
        existing_submission_id: String,
        matched_by: MatchedBy,
    },
    AlreadyAnalyzed,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    pub submission_id: Option<String>,
    #[serde(flatten)]
    pub outcome: IngestOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Skip submissions whose record already carries an AI analysis.
    pub skip_analyzed: bool,
}

/// What to do with a submission once its identity is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Create,
    Merge {
        into: Box<Candidate>,
        matched_by: MatchedBy,
    },
    Duplicate {
        existing_submission_id: String,
        matched_by: MatchedBy,
    },
    AlreadyAnalyzed,
}

/// Branching rule after resolution.
///
/// Re-deliveries of a known submission merge into their own record. Another
/// record carrying the same CPF means the person applied twice: that is a
/// duplicate. A match by weaker identifiers without a confirming CPF merges.
pub fn decide(
    resolution: Option<Resolution>,
    inbound_cpf: Option<&str>,
    options: IngestOptions,
) -> Decision {
    let Some(Resolution {
        candidate,
        matched_by,
        ..
    }) = resolution
    else {
        return Decision::Create;
    };

    if matched_by == MatchedBy::SubmissionId {
        if options.skip_analyzed && candidate.analysis.is_some() {
            return Decision::AlreadyAnalyzed;
        }
        return Decision::Merge {
            into: Box::new(candidate),
            matched_by,
        };
    }

    let inbound = digits_or_none(inbound_cpf);
    let stored = digits_or_none(candidate.cpf.as_deref());
    match (inbound, stored) {
        (Some(a), Some(b)) if a == b => Decision::Duplicate {
            existing_submission_id: candidate.submission_id,
            matched_by,
        },
        (Some(_), Some(_)) => Decision::Create,
        _ => Decision::Merge {
            into: Box::new(candidate),
            matched_by,
        },
    }
}

fn fill<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if slot.is_none() {
        slot.clone_from(value);
    }
}

/// Writes extracted fields into blank slots of `candidate`; present values win.
pub fn merge_fields(candidate: &mut Candidate, fields: &ExtractedFields) {
    if candidate.has_placeholder_name() {
        if let Some(name) = fields.name.as_deref().filter(|n| !n.is_empty()) {
            candidate.name = name.to_string();
        }
    }
    fill(&mut candidate.cpf, &fields.cpf);
    fill(&mut candidate.phone, &fields.phone);
    fill(&mut candidate.email, &fields.email);
    fill(&mut candidate.birth_date, &fields.birth_date);
    fill(&mut candidate.resume_url, &fields.resume_url);
}

/// Drives one submission from receipt to persistence.
pub struct IngestionService {
    store: Arc<dyn CandidateStore>,
    alias_map: Arc<FieldAliasMap>,
    resolver: CandidateResolver,
    enricher: Arc<dyn Enricher>,
}

impl IngestionService {
    pub fn new(
        store: Arc<dyn CandidateStore>,
        alias_map: Arc<FieldAliasMap>,
        resolver: CandidateResolver,
        enricher: Arc<dyn Enricher>,
    ) -> Self {
        Self {
            store,
            alias_map,
            resolver,
            enricher,
        }
    }

    /// Never fails as a whole: every error ends up in the report's outcome.
    pub async fn ingest(&self, submission: &Submission, options: IngestOptions) -> IngestReport {
        let Some(submission_id) = submission.submission_id().map(str::to_string) else {
            return IngestReport {
                submission_id: None,
                outcome: IngestOutcome::Failed {
                    error: "submission has neither response id nor token".to_string(),
                },
                candidate_id: None,
            };
        };

        match self.run(&submission_id, submission, options).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(
                    submission_id = %submission_id,
                    form_id = %submission.form_id,
                    "Ingestion failed: {:?}",
                    e
                );
                IngestReport {
                    submission_id: Some(submission_id),
                    outcome: IngestOutcome::Failed {
                        error: e.to_string(),
                    },
                    candidate_id: None,
                }
            }
        }
    }

    async fn run(
        &self,
        submission_id: &str,
        submission: &Submission,
        options: IngestOptions,
    ) -> Result<IngestReport> {
        let form_id = submission.form_id.as_str();
        tracing::debug!(submission_id, form_id, stage = ?IngestionStage::Received);

        let fields = ExtractedFields::from_submission(&self.alias_map, submission);
        tracing::debug!(submission_id, form_id, stage = ?IngestionStage::FieldsExtracted, ?fields);

        let ids = fields.identifiers(Some(submission_id));
        let resolution = self.resolver.resolve(self.store.as_ref(), &ids).await?;
        tracing::debug!(
            submission_id,
            form_id,
            stage = ?IngestionStage::IdentityResolved,
            matched_by = ?resolution.as_ref().map(|r| r.matched_by)
        );

        let report = |outcome: IngestOutcome, candidate_id: Option<Uuid>| IngestReport {
            submission_id: Some(submission_id.to_string()),
            outcome,
            candidate_id,
        };

        let mut decision = decide(resolution, fields.cpf.as_deref(), options);
        if let Decision::Merge { into, matched_by } = &decision {
            // A CPF copied into a record that had none must not already belong
            // to someone else.
            if *matched_by != MatchedBy::SubmissionId && into.cpf.is_none() {
                if let Some(cpf) = fields.cpf.as_deref() {
                    if let Some(owner) = self.cpf_owner(cpf, Some(into.as_ref())).await? {
                        tracing::warn!(
                            submission_id,
                            form_id,
                            merge_target = %into.submission_id,
                            matched_by = matched_by.as_str(),
                            existing_submission_id = %owner,
                            "CPF belongs to another candidate, merge refused"
                        );
                        decision = Decision::Duplicate {
                            existing_submission_id: owner,
                            matched_by: MatchedBy::Cpf,
                        };
                    }
                }
            }
        }

        let (mut candidate, matched_by) = match decision {
            Decision::AlreadyAnalyzed => {
                tracing::info!(submission_id, form_id, "Already analyzed, skipped");
                return Ok(report(IngestOutcome::AlreadyAnalyzed, None));
            }
            Decision::Duplicate {
                existing_submission_id,
                matched_by,
            } => {
                tracing::info!(
                    submission_id,
                    form_id,
                    existing_submission_id = %existing_submission_id,
                    matched_by = matched_by.as_str(),
                    "Duplicate application skipped"
                );
                return Ok(report(
                    IngestOutcome::DuplicateSkipped {
                        existing_submission_id,
                        matched_by,
                    },
                    None,
                ));
            }
            Decision::Merge { into, matched_by } => (*into, Some(matched_by)),
            Decision::Create => {
                if let Some(cpf) = fields.cpf.as_deref() {
                    if let Some(existing_submission_id) = self.cpf_owner(cpf, None).await? {
                        tracing::info!(
                            submission_id,
                            form_id,
                            existing_submission_id = %existing_submission_id,
                            "CPF already registered, duplicate skipped"
                        );
                        return Ok(report(
                            IngestOutcome::DuplicateSkipped {
                                existing_submission_id,
                                matched_by: MatchedBy::Cpf,
                            },
                            None,
                        ));
                    }
                }
                (
                    Candidate::new(submission_id, Some(form_id.to_string()), now()),
                    None,
                )
            }
        };

        let before = candidate.clone();
        candidate.link_submission(submission_id);
        if candidate.submission_id == submission_id || candidate.raw_data.is_none() {
            candidate.raw_data = Some(serde_json::to_value(submission)?);
        }
        if candidate.form_id.is_none() && !form_id.is_empty() {
            candidate.form_id = Some(form_id.to_string());
        }
        merge_fields(&mut candidate, &fields);
        self.enrich(&mut candidate, submission, &fields).await;
        if candidate.has_placeholder_name() {
            candidate.name = UNIDENTIFIED_NAME.to_string();
        }
        if candidate != before {
            candidate.updated_at = now();
        }

        let saved = self.store.upsert(&candidate).await?;
        tracing::debug!(submission_id, form_id, stage = ?IngestionStage::Persisted);

        let outcome = match matched_by {
            Some(matched_by) => {
                tracing::info!(
                    submission_id,
                    form_id,
                    candidate_submission_id = %saved.submission_id,
                    matched_by = matched_by.as_str(),
                    "Submission merged into existing candidate"
                );
                IngestOutcome::Merged { matched_by }
            }
            None => {
                tracing::info!(submission_id, form_id, "Candidate created");
                IngestOutcome::Created
            }
        };
        Ok(report(outcome, Some(saved.id)))
    }

    /// Oldest record holding `cpf`, other than `except`.
    async fn cpf_owner(&self, cpf: &str, except: Option<&Candidate>) -> Result<Option<String>> {
        Ok(self
            .store
            .find_by_cpf(cpf)
            .await?
            .into_iter()
            .find(|c| except.map_or(true, |e| c.id != e.id))
            .map(|c| c.submission_id))
    }

    /// Structures and scores the record when those blocks are missing, and
    /// falls back to the profile name when no name was extracted.
    async fn enrich(&self, candidate: &mut Candidate, submission: &Submission, fields: &ExtractedFields) {
        if candidate.profile.is_none() {
            if let Some(mut profile) = self.enricher.structure(&submission.answers).await {
                let role = profile
                    .professional
                    .role
                    .clone()
                    .filter(|r| !r.trim().is_empty())
                    .or_else(|| fields.role.clone());
                if let Some(role) = role {
                    let requirements = requirements_service::lookup(self.store.as_ref(), &role).await;
                    requirements_service::apply_snapshot(&mut profile, &role, requirements.as_ref());
                }
                candidate.profile = Some(profile);
            }
        }

        if candidate.analysis.is_none() {
            if let Some(profile) = candidate.profile.as_ref() {
                let role = profile.professional.role_title.as_deref().or(fields.role.as_deref());
                let requirements = match role {
                    Some(role) => requirements_service::lookup(self.store.as_ref(), role).await,
                    None => None,
                };
                candidate.analysis = self
                    .enricher
                    .score(profile, requirements.as_ref())
                    .await
                    .map(|analysis| analysis.normalized());
            }
        }

        if candidate.has_placeholder_name() {
            if let Some(name) = candidate.profile.as_ref().and_then(|p| p.usable_name()) {
                candidate.name = name.to_string();
            }
        }
    }
}

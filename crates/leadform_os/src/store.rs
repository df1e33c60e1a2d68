#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::fmt;

use leadform_engines::hasher::{DigestFunction, Hasher, HashingFailure, Sha256Digest};
use leadform_engines::identity::{
    CookieSource, IdentifierResolver, IdentifierSource, UrlParamSource,
};
use leadform_kernel_contracts::event::{TrackingEvent, TrackingEventKind};
use leadform_kernel_contracts::form::{FormField, FormRecord, TrackingIdentifier};
use leadform_kernel_contracts::{ContractViolation, ReasonCodeId, Validate};
use tracing::{debug, info, warn};

use crate::config::LeadFormConfig;
use crate::notifier::{DeliveryReport, EventNotifier, TrackingSink};

pub mod reason_codes {
    use leadform_kernel_contracts::ReasonCodeId;

    pub const FORM_SUBMIT_OK: ReasonCodeId = ReasonCodeId(0x4C46_0001);
    pub const FORM_SUBMIT_HASHING_FAILED: ReasonCodeId = ReasonCodeId(0x4C46_00F1);
    pub const FORM_SUBMIT_CONTRACT_VALIDATION_FAILED: ReasonCodeId = ReasonCodeId(0x4C46_00F2);
    pub const FORM_SUBMIT_SERIALIZATION_FAILED: ReasonCodeId = ReasonCodeId(0x4C46_00F3);
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    Contract(ContractViolation),
    Hashing(HashingFailure),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contract(v) => write!(f, "contract violation: {v}"),
            Self::Hashing(h) => write!(f, "hashing failure: {h}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<ContractViolation> for StoreError {
    fn from(v: ContractViolation) -> Self {
        StoreError::Contract(v)
    }
}

impl From<HashingFailure> for StoreError {
    fn from(h: HashingFailure) -> Self {
        StoreError::Hashing(h)
    }
}

/// Hash work captured at the moment the email was committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashJob {
    email_version: u64,
    email: String,
}

impl HashJob {
    pub fn email_version(&self) -> u64 {
        self.email_version
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

/// A finished computation waiting to be committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashResult {
    email_version: u64,
    email_hash: String,
}

impl HashResult {
    pub fn email_version(&self) -> u64 {
        self.email_version
    }

    pub fn email_hash(&self) -> &str {
        &self.email_hash
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashCommit {
    Applied(DeliveryReport),
    DiscardedStale {
        job_version: u64,
        current_version: u64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldCommit {
    pub field: FormField,
    /// Set for email edits; the snapshot goes out once this job commits.
    pub pending_hash: Option<HashJob>,
    pub delivery: Option<DeliveryReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierSkip {
    AlreadyResolved,
    NotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentifierResolution {
    Resolved {
        identifier: TrackingIdentifier,
        source: IdentifierSource,
        delivery: DeliveryReport,
    },
    Skipped(IdentifierSkip),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResetMode {
    /// Identifier guard stays set; defaults never re-trigger resolution.
    KeepIdentifierGuard,
    RearmIdentifierGuard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubmissionStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub reason_code: ReasonCodeId,
    pub message: String,
    pub snapshot: TrackingEvent,
    pub delivery: DeliveryReport,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitFailureCause {
    Hashing(HashingFailure),
    Contract(ContractViolation),
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitFailure {
    pub reason_code: ReasonCodeId,
    pub message: String,
    pub cause: SubmitFailureCause,
}

impl SubmitFailure {
    fn new(cause: SubmitFailureCause) -> Self {
        let (reason_code, detail) = match &cause {
            SubmitFailureCause::Hashing(h) => {
                (reason_codes::FORM_SUBMIT_HASHING_FAILED, h.to_string())
            }
            SubmitFailureCause::Contract(v) => (
                reason_codes::FORM_SUBMIT_CONTRACT_VALIDATION_FAILED,
                v.to_string(),
            ),
            SubmitFailureCause::Serialization(e) => {
                (reason_codes::FORM_SUBMIT_SERIALIZATION_FAILED, e.clone())
            }
        };
        Self {
            reason_code,
            message: format!("Error submitting form: {detail}"),
            cause,
        }
    }
}

impl fmt::Display for SubmitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for SubmitFailure {}

/// Owner of the form record. Every mutation goes through here.
#[derive(Debug)]
pub struct FormStateStore<D = Sha256Digest>
where
    D: DigestFunction,
{
    config: LeadFormConfig,
    defaults: FormRecord,
    record: FormRecord,
    hasher: Hasher<D>,
    resolver: IdentifierResolver,
    notifier: EventNotifier,
    identifier_resolved: bool,
    email_version: u64,
    hashed_version: Option<u64>,
    pending: VecDeque<HashJob>,
    last_submission: Option<SubmissionStatus>,
}

impl FormStateStore<Sha256Digest> {
    pub fn reference_v1(config: LeadFormConfig) -> Result<Self, ContractViolation> {
        Self::new(config, FormRecord::reference_defaults_v1(), Sha256Digest)
    }
}

impl<D> FormStateStore<D>
where
    D: DigestFunction,
{
    /// Defaults whose hash matches their email start settled; otherwise the first job is queued.
    pub fn new(
        config: LeadFormConfig,
        defaults: FormRecord,
        digest: D,
    ) -> Result<Self, ContractViolation> {
        config.validate()?;
        defaults.validate()?;
        let resolver = IdentifierResolver::new(config.identity_config())?;
        let notifier = EventNotifier::new(config.max_sinks);
        let mut store = Self {
            config,
            record: defaults.clone(),
            defaults,
            hasher: Hasher::new(digest),
            resolver,
            notifier,
            identifier_resolved: false,
            email_version: 0,
            hashed_version: None,
            pending: VecDeque::new(),
            last_submission: None,
        };
        store.load_defaults();
        Ok(store)
    }

    pub fn register_sink(&mut self, sink: Box<dyn TrackingSink>) -> Result<(), ContractViolation> {
        self.notifier.register(sink)
    }

    pub fn record(&self) -> &FormRecord {
        &self.record
    }

    pub fn config(&self) -> &LeadFormConfig {
        &self.config
    }

    pub fn email_version(&self) -> u64 {
        self.email_version
    }

    pub fn identifier_resolved(&self) -> bool {
        self.identifier_resolved
    }

    pub fn last_submission(&self) -> Option<SubmissionStatus> {
        self.last_submission
    }

    pub fn pending_hash_jobs(&self) -> usize {
        self.pending.len()
    }

    /// No hash work outstanding and the hash belongs to the current email.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty() && self.hashed_version == Some(self.email_version)
    }

    pub fn set_field(&mut self, name: &str, value: &str) -> Result<FieldCommit, ContractViolation> {
        let field = FormField::parse(name).ok_or_else(|| ContractViolation::UnknownField {
            name: name.to_string(),
        })?;
        if !field.is_user_editable() {
            return Err(ContractViolation::InvalidValue {
                field: "form_state_store.set_field",
                reason: "field is read-only",
            });
        }
        if value.len() > self.config.max_field_len {
            return Err(ContractViolation::InvalidValue {
                field: "form_state_store.set_field",
                reason: "value exceeds max_field_len",
            });
        }

        self.record.replace(field, value.to_string());

        if field == FormField::Email {
            let job = self.enqueue_email_hash();
            debug!(
                field = field.as_str(),
                version = job.email_version,
                "email committed; hash pending"
            );
            return Ok(FieldCommit {
                field,
                pending_hash: Some(job),
                delivery: None,
            });
        }

        let delivery =
            self.notifier
                .notify(TrackingEventKind::FieldCommitted, Some(field), &self.record)?;
        Ok(FieldCommit {
            field,
            pending_hash: None,
            delivery: Some(delivery),
        })
    }

    /// `set_field` followed by `settle`.
    pub fn set_field_and_settle(&mut self, name: &str, value: &str) -> Result<(), StoreError> {
        self.set_field(name, value)?;
        self.settle()?;
        Ok(())
    }

    /// Runs the digest for `job` without touching state.
    pub fn compute_hash(&self, job: &HashJob) -> Result<HashResult, HashingFailure> {
        let email_hash = self.hasher.hash_canonical(&job.email)?;
        Ok(HashResult {
            email_version: job.email_version,
            email_hash,
        })
    }

    /// Applies `result` only if its email version is still the current one.
    pub fn commit_hash(&mut self, result: HashResult) -> Result<HashCommit, ContractViolation> {
        self.pending
            .retain(|job| job.email_version != result.email_version);
        if result.email_version != self.email_version {
            debug!(
                job_version = result.email_version,
                current_version = self.email_version,
                "discarding stale email hash"
            );
            return Ok(HashCommit::DiscardedStale {
                job_version: result.email_version,
                current_version: self.email_version,
            });
        }
        self.record.email_hash = result.email_hash;
        self.hashed_version = Some(result.email_version);
        let delivery = self
            .notifier
            .notify(TrackingEventKind::HashCommitted, None, &self.record)?;
        Ok(HashCommit::Applied(delivery))
    }

    pub fn complete_hash_job(&mut self, job: &HashJob) -> Result<HashCommit, StoreError> {
        let result = match self.compute_hash(job) {
            Ok(result) => result,
            Err(err) => {
                self.pending
                    .retain(|pending| pending.email_version != job.email_version);
                return Err(err.into());
            }
        };
        Ok(self.commit_hash(result)?)
    }

    /// Drains pending hash jobs oldest first. Returns how many were applied.
    pub fn settle(&mut self) -> Result<usize, StoreError> {
        let mut applied = 0;
        while let Some(job) = self.pending.front().cloned() {
            if let HashCommit::Applied(_) = self.complete_hash_job(&job)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Commits the tracking id on the first successful resolution of the session.
    pub fn resolve_identifier_once(
        &mut self,
        url_params: &dyn UrlParamSource,
        cookies: &dyn CookieSource,
    ) -> Result<IdentifierResolution, ContractViolation> {
        if self.identifier_resolved {
            return Ok(IdentifierResolution::Skipped(IdentifierSkip::AlreadyResolved));
        }
        let Some(resolved) = self
            .resolver
            .resolve_with_source(url_params, cookies, self.identifier_resolved)
        else {
            return Ok(IdentifierResolution::Skipped(IdentifierSkip::NotFound));
        };

        self.record.identifier = resolved.identifier.as_str().to_string();
        self.identifier_resolved = true;
        info!(
            identifier_key = self.resolver.identifier_key(),
            source = ?resolved.source,
            "tracking identifier resolved"
        );
        let delivery =
            self.notifier
                .notify(TrackingEventKind::IdentifierResolved, None, &self.record)?;
        Ok(IdentifierResolution::Resolved {
            identifier: resolved.identifier,
            source: resolved.source,
            delivery,
        })
    }

    pub fn reset(&mut self, mode: ResetMode) -> Result<DeliveryReport, ContractViolation> {
        self.record = self.defaults.clone();
        self.email_version = self.email_version.saturating_add(1);
        self.pending.clear();
        self.load_defaults();
        self.last_submission = None;
        if mode == ResetMode::RearmIdentifierGuard {
            self.identifier_resolved = false;
        }
        self.notifier
            .notify(TrackingEventKind::Reset, None, &self.record)
    }

    /// Re-hashes the current email, commits, and emits the submit snapshot.
    ///
    /// The re-hash runs even when the email is unchanged so the emitted hash always
    /// belongs to the email as it is at submission time. On failure the record is left
    /// untouched and nothing is emitted.
    pub fn submit(&mut self) -> Result<SubmitReceipt, SubmitFailure> {
        match self.try_submit() {
            Ok(receipt) => {
                self.last_submission = Some(SubmissionStatus::Success);
                info!(
                    sequence = receipt.snapshot.sequence,
                    delivered = receipt.delivery.delivered.len(),
                    failed_sinks = receipt.delivery.failures.len(),
                    "form submitted"
                );
                Ok(receipt)
            }
            Err(cause) => {
                let failure = SubmitFailure::new(cause);
                self.last_submission = Some(SubmissionStatus::Error);
                warn!(reason_code = failure.reason_code.0, error = %failure, "form submit failed");
                Err(failure)
            }
        }
    }

    fn try_submit(&mut self) -> Result<SubmitReceipt, SubmitFailureCause> {
        let email_hash = self
            .hasher
            .hash_canonical(&self.record.email)
            .map_err(SubmitFailureCause::Hashing)?;

        let mut next = self.record.clone();
        next.email_hash = email_hash;
        next.validate().map_err(SubmitFailureCause::Contract)?;
        let rendered = serde_json::to_string_pretty(&next)
            .map_err(|e| SubmitFailureCause::Serialization(e.to_string()))?;

        self.record = next;
        self.hashed_version = Some(self.email_version);
        self.pending.clear();

        let delivery = self
            .notifier
            .notify(TrackingEventKind::Submit, None, &self.record)
            .map_err(SubmitFailureCause::Contract)?;
        Ok(SubmitReceipt {
            reason_code: reason_codes::FORM_SUBMIT_OK,
            message: format!("Form submitted successfully : {rendered}"),
            snapshot: delivery.event.clone(),
            delivery,
        })
    }

    fn enqueue_email_hash(&mut self) -> HashJob {
        self.email_version = self.email_version.saturating_add(1);
        let job = HashJob {
            email_version: self.email_version,
            email: self.record.email.clone(),
        };
        self.pending.push_back(job.clone());
        job
    }

    /// Defaults are settled only when their hash matches their email; anything else queues a job.
    fn load_defaults(&mut self) {
        let consistent = !self.record.email_hash.is_empty()
            && self
                .hasher
                .hash_canonical(&self.record.email)
                .is_ok_and(|expected| expected == self.record.email_hash);
        if consistent {
            self.hashed_version = Some(self.email_version);
            return;
        }
        if !self.record.email_hash.is_empty() {
            debug!(
                version = self.email_version,
                "default email hash does not match default email; rehash queued"
            );
        }
        self.hashed_version = None;
        self.pending.push_back(HashJob {
            email_version: self.email_version,
            email: self.record.email.clone(),
        });
    }
}

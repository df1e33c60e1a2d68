#![forbid(unsafe_code)]

use leadform_engines::hasher::{sha256_hex, DigestFunction, HashingFailure};
use leadform_kernel_contracts::event::{TrackingEvent, TrackingEventKind};
use leadform_kernel_contracts::form::FormRecord;
use leadform_os::config::LeadFormConfig;
use leadform_os::notifier::{RecordingSink, SinkDeliveryFailure, SinkRejection, TrackingSink};
use leadform_os::store::{
    reason_codes, FormStateStore, SubmissionStatus, SubmitFailureCause,
};

struct FlakySink;

impl TrackingSink for FlakySink {
    fn sink_id(&self) -> &str {
        "flaky"
    }

    fn deliver(&mut self, _event: &TrackingEvent) -> Result<(), SinkRejection> {
        Err(SinkRejection::new("beacon rejected"))
    }
}

struct ExplodingSink;

impl TrackingSink for ExplodingSink {
    fn sink_id(&self) -> &str {
        "exploding"
    }

    fn deliver(&mut self, _event: &TrackingEvent) -> Result<(), SinkRejection> {
        panic!("analytics sdk not loaded");
    }
}

struct BrokenDigest;

impl DigestFunction for BrokenDigest {
    fn digest(&self, _bytes: &[u8]) -> Result<Vec<u8>, HashingFailure> {
        Err(HashingFailure::DigestUnavailable {
            reason: "crypto.subtle is undefined".to_string(),
        })
    }
}

fn store() -> FormStateStore {
    FormStateStore::reference_v1(LeadFormConfig::mvp_v1()).unwrap()
}

#[test]
fn at_submit_wiring_01_default_record_submits_consistent_hash() {
    let mut s = store();
    let (sink, events) = RecordingSink::new("rec");
    s.register_sink(Box::new(sink)).unwrap();

    let receipt = s.submit().unwrap();
    assert_eq!(receipt.reason_code, reason_codes::FORM_SUBMIT_OK);
    assert_eq!(
        receipt.snapshot.email_hash,
        sha256_hex(&s.record().email.to_lowercase())
    );
    let last = events.last().unwrap();
    assert_eq!(last.kind, TrackingEventKind::Submit);
    assert_eq!(last.first_name, "John");
    assert_eq!(last.partner_ids.lead_id, "12345678");
}

#[test]
fn at_submit_wiring_02_failing_sinks_do_not_fail_submit() {
    let mut s = store();
    let (first, first_events) = RecordingSink::new("first");
    let (last, last_events) = RecordingSink::new("last");
    s.register_sink(Box::new(first)).unwrap();
    s.register_sink(Box::new(FlakySink)).unwrap();
    s.register_sink(Box::new(ExplodingSink)).unwrap();
    s.register_sink(Box::new(last)).unwrap();

    let receipt = s.submit().unwrap();
    assert_eq!(first_events.len(), 1);
    assert_eq!(last_events.len(), 1);
    assert_eq!(receipt.delivery.delivered, vec!["first", "last"]);
    assert_eq!(receipt.delivery.failures.len(), 2);
    assert!(matches!(
        receipt.delivery.failures[1],
        SinkDeliveryFailure::Panicked { .. }
    ));
    assert_eq!(s.last_submission(), Some(SubmissionStatus::Success));
}

#[test]
fn at_submit_wiring_03_submit_uses_email_at_submission_time() {
    let mut s = store();
    s.set_field("email", "Old@Example.com").unwrap();
    s.set_field("email", "New@Example.com").unwrap();
    let receipt = s.submit().unwrap();
    assert_eq!(receipt.snapshot.email_hash, sha256_hex("new@example.com"));
    assert!(s.is_settled());
    assert_eq!(s.pending_hash_jobs(), 0);
}

#[test]
fn at_submit_wiring_04_message_carries_record_json() {
    let mut s = store();
    s.set_field("company", "Initech").unwrap();
    let receipt = s.submit().unwrap();
    let json = receipt
        .message
        .strip_prefix("Form submitted successfully : ")
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
    assert_eq!(parsed["company"], "Initech");
    assert_eq!(parsed["hashEmail"], receipt.snapshot.email_hash);
}

#[test]
fn at_submit_wiring_05_hashing_failure_is_structured() {
    let mut s = FormStateStore::new(
        LeadFormConfig::mvp_v1(),
        FormRecord::reference_defaults_v1(),
        BrokenDigest,
    )
    .unwrap();
    let failure = s.submit().unwrap_err();
    assert_eq!(failure.reason_code, reason_codes::FORM_SUBMIT_HASHING_FAILED);
    assert_eq!(
        failure.cause,
        SubmitFailureCause::Hashing(HashingFailure::DigestUnavailable {
            reason: "crypto.subtle is undefined".to_string(),
        })
    );
    assert_eq!(
        failure.to_string(),
        "Error submitting form: digest unavailable: crypto.subtle is undefined"
    );
    assert_eq!(s.last_submission(), Some(SubmissionStatus::Error));
}

#[test]
fn at_submit_wiring_06_resubmit_after_reset_uses_defaults() {
    let mut s = store();
    s.set_field_and_settle("email", "x@y.com").unwrap();
    s.submit().unwrap();
    s.reset(leadform_os::store::ResetMode::KeepIdentifierGuard)
        .unwrap();
    assert_eq!(s.last_submission(), None);
    let receipt = s.submit().unwrap();
    assert_eq!(
        receipt.snapshot.email_hash,
        "836f82db99121b3481011f16b49dfa5fbc714a0d1b1b9f784a1ebbbf5b39577f"
    );
}

#![forbid(unsafe_code)]

use leadform_engines::canonical::canonicalize;
use leadform_engines::hasher::{sha256_hex, Hasher, Sha256Digest};
use leadform_kernel_contracts::event::TrackingEventKind;
use leadform_os::config::LeadFormConfig;
use leadform_os::notifier::RecordingSink;
use leadform_os::store::{FormStateStore, HashCommit};

fn store() -> FormStateStore {
    FormStateStore::reference_v1(LeadFormConfig::mvp_v1()).unwrap()
}

fn expected(email: &str) -> String {
    Hasher::new(Sha256Digest)
        .hash(&canonicalize(email))
        .unwrap()
}

#[test]
fn at_email_hash_wiring_01_known_vector() {
    assert_eq!(canonicalize("JohnDoe@Example.com"), "johndoe@example.com");
    assert_eq!(
        expected("JohnDoe@Example.com"),
        "836f82db99121b3481011f16b49dfa5fbc714a0d1b1b9f784a1ebbbf5b39577f"
    );
}

#[test]
fn at_email_hash_wiring_02_superseded_email_never_wins() {
    let mut s = store();
    let a = s.set_field("email", "a@x.com").unwrap().pending_hash.unwrap();
    let b = s.set_field("email", "b@y.com").unwrap().pending_hash.unwrap();

    // The older computation finishes last.
    let rb = s.compute_hash(&b).unwrap();
    let ra = s.compute_hash(&a).unwrap();
    assert!(matches!(s.commit_hash(rb).unwrap(), HashCommit::Applied(_)));
    assert!(matches!(
        s.commit_hash(ra).unwrap(),
        HashCommit::DiscardedStale { .. }
    ));
    assert_eq!(s.record().email_hash, expected("b@y.com"));
}

#[test]
fn at_email_hash_wiring_03_superseded_email_finishing_first_is_also_discarded() {
    let mut s = store();
    let a = s.set_field("email", "a@x.com").unwrap().pending_hash.unwrap();
    let b = s.set_field("email", "b@y.com").unwrap().pending_hash.unwrap();

    let ra = s.compute_hash(&a).unwrap();
    assert!(matches!(
        s.commit_hash(ra).unwrap(),
        HashCommit::DiscardedStale { .. }
    ));
    assert!(!s.is_settled());
    s.complete_hash_job(&b).unwrap();
    assert_eq!(s.record().email_hash, expected("b@y.com"));
    assert!(s.is_settled());
}

#[test]
fn at_email_hash_wiring_04_every_keystroke_settles_to_last_value() {
    let mut s = store();
    let (sink, events) = RecordingSink::new("rec");
    s.register_sink(Box::new(sink)).unwrap();

    let typed = "Jane.Roe@Example.ORG";
    for end in 1..=typed.len() {
        s.set_field("email", &typed[..end]).unwrap();
    }
    assert_eq!(s.pending_hash_jobs(), typed.len());
    assert_eq!(s.settle().unwrap(), 1);

    assert_eq!(s.record().email, typed);
    assert_eq!(s.record().email_hash, expected(typed));
    assert_eq!(s.record().email_hash, sha256_hex("jane.roe@example.org"));
    let hash_events: Vec<_> = events
        .snapshot()
        .into_iter()
        .filter(|e| e.kind == TrackingEventKind::HashCommitted)
        .collect();
    assert_eq!(hash_events.len(), 1);
    assert_eq!(hash_events[0].email_hash, expected(typed));
}

#[test]
fn at_email_hash_wiring_05_rehash_of_same_value_is_idempotent() {
    let mut s = store();
    s.set_field_and_settle("email", "Same@Example.com").unwrap();
    let first = s.record().email_hash.clone();
    s.set_field_and_settle("email", "Same@Example.com").unwrap();
    assert_eq!(s.record().email_hash, first);
}

#[test]
fn at_email_hash_wiring_06_sinks_never_see_raw_email() {
    let mut s = store();
    let (sink, events) = RecordingSink::new("rec");
    s.register_sink(Box::new(sink)).unwrap();
    s.set_field_and_settle("email", "secret.person@example.com").unwrap();
    s.set_field("company", "Initech").unwrap();
    s.submit().unwrap();
    for event in events.snapshot() {
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("secret.person"));
    }
}

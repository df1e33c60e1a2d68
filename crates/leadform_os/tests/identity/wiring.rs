#![forbid(unsafe_code)]

use leadform_engines::identity::{
    CookieJar, CookieSource, IdentifierSource, QueryString, UrlParamSource,
};
use leadform_kernel_contracts::event::TrackingEventKind;
use leadform_os::config::LeadFormConfig;
use leadform_os::notifier::RecordingSink;
use leadform_os::store::{FormStateStore, IdentifierResolution, IdentifierSkip, ResetMode};

/// Stands in for a page whose URL changes between re-renders.
struct FixedParam(Option<&'static str>);

impl UrlParamSource for FixedParam {
    fn param(&self, key: &str) -> Option<String> {
        (key == "li_fat_id").then(|| self.0.map(str::to_string)).flatten()
    }
}

struct NoCookies;

impl CookieSource for NoCookies {
    fn cookie(&self, _key: &str) -> Option<String> {
        None
    }
}

fn store() -> FormStateStore {
    FormStateStore::reference_v1(LeadFormConfig::mvp_v1()).unwrap()
}

#[test]
fn at_identity_wiring_01_url_param_beats_cookie() {
    let mut s = store();
    let out = s
        .resolve_identifier_once(
            &QueryString::parse("https://example.com/lp?li_fat_id=ABC"),
            &CookieJar::new("li_fat_id=XYZ"),
        )
        .unwrap();
    match out {
        IdentifierResolution::Resolved { identifier, source, .. } => {
            assert_eq!(identifier.as_str(), "ABC");
            assert_eq!(source, IdentifierSource::UrlParam);
        }
        other => panic!("expected resolution, got {other:?}"),
    }
    assert_eq!(s.record().identifier, "ABC");
}

#[test]
fn at_identity_wiring_02_cookie_only() {
    let mut s = store();
    s.resolve_identifier_once(&QueryString::empty(), &CookieJar::new("_ga=1; li_fat_id=XYZ"))
        .unwrap();
    assert_eq!(s.record().identifier, "XYZ");
}

#[test]
fn at_identity_wiring_03_neither_source_leaves_identifier_empty() {
    let mut s = store();
    let out = s
        .resolve_identifier_once(&QueryString::parse("?utm=1"), &CookieJar::new("_ga=1"))
        .unwrap();
    assert_eq!(out, IdentifierResolution::Skipped(IdentifierSkip::NotFound));
    assert_eq!(s.record().identifier, "");
}

#[test]
fn at_identity_wiring_04_repeated_invocations_apply_first_result_only() {
    let mut s = store();
    let (sink, events) = RecordingSink::new("rec");
    s.register_sink(Box::new(sink)).unwrap();

    s.resolve_identifier_once(&FixedParam(Some("FIRST")), &NoCookies)
        .unwrap();
    s.resolve_identifier_once(&FixedParam(Some("SECOND")), &NoCookies)
        .unwrap();

    assert_eq!(s.record().identifier, "FIRST");
    let resolved: Vec<_> = events
        .snapshot()
        .into_iter()
        .filter(|e| e.kind == TrackingEventKind::IdentifierResolved)
        .collect();
    assert_eq!(resolved.len(), 1);
    assert_eq!(resolved[0].identifier, "FIRST");
}

#[test]
fn at_identity_wiring_05_reset_clears_identifier_but_keeps_guard() {
    let mut s = store();
    s.resolve_identifier_once(&FixedParam(Some("FIRST")), &NoCookies)
        .unwrap();
    s.reset(ResetMode::KeepIdentifierGuard).unwrap();
    assert_eq!(s.record().identifier, "");
    s.resolve_identifier_once(&FixedParam(Some("AGAIN")), &NoCookies)
        .unwrap();
    assert_eq!(s.record().identifier, "");
}

#[test]
fn at_identity_wiring_06_configured_key_drives_lookup() {
    let config = LeadFormConfig::from_lookup(|name| {
        (name == "LEADFORM_IDENTIFIER_KEY").then(|| "partner_click_id".to_string())
    })
    .unwrap();
    let mut s = FormStateStore::reference_v1(config).unwrap();
    s.resolve_identifier_once(
        &QueryString::parse("li_fat_id=IGNORED"),
        &CookieJar::new("partner_click_id=P-1"),
    )
    .unwrap();
    assert_eq!(s.record().identifier, "P-1");
}

#![forbid(unsafe_code)]

use leadform_kernel_contracts::form::TrackingIdentifier;
use leadform_kernel_contracts::ContractViolation;
use tracing::debug;
use url::Url;

use crate::cookie::CookieReader;

pub const DEFAULT_IDENTIFIER_KEY: &str = "li_fat_id";

/// Page URL query lookup.
pub trait UrlParamSource {
    fn param(&self, key: &str) -> Option<String>;
}

/// Browser cookie lookup.
pub trait CookieSource {
    fn cookie(&self, key: &str) -> Option<String>;
}

/// Parsed query string. Lookup returns the first occurrence, like `URLSearchParams::get`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryString {
    pairs: Vec<(String, String)>,
}

impl QueryString {
    /// Accepts a full URL, a `?`-prefixed search string, or a bare query.
    pub fn parse(raw: &str) -> Self {
        // `utm:src=1&..` parses as an opaque `utm:` URL; only hierarchical URLs carry a query.
        if let Some(url) = Url::parse(raw).ok().filter(|url| !url.cannot_be_a_base()) {
            return Self {
                pairs: url.query_pairs().into_owned().collect(),
            };
        }
        let query = raw.split('#').next().unwrap_or_default();
        let query = query.strip_prefix('?').unwrap_or(query);
        Self {
            pairs: url::form_urlencoded::parse(query.as_bytes())
                .into_owned()
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl UrlParamSource for QueryString {
    fn param(&self, key: &str) -> Option<String> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }
}

/// Raw `document.cookie`-style header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    raw: String,
}

impl CookieJar {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

impl CookieSource for CookieJar {
    fn cookie(&self, key: &str) -> Option<String> {
        match CookieReader::try_read(&self.raw, key) {
            Ok(value) => value,
            Err(err) => {
                debug!(cookie_key = key, error = %err, "ignoring malformed cookie entry");
                None
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentifierSource {
    UrlParam,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentifier {
    pub identifier: TrackingIdentifier,
    pub source: IdentifierSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub identifier_key: String,
}

impl IdentityConfig {
    pub fn mvp_v1() -> Self {
        Self {
            identifier_key: DEFAULT_IDENTIFIER_KEY.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IdentifierResolver {
    config: IdentityConfig,
}

impl IdentifierResolver {
    pub fn new(config: IdentityConfig) -> Result<Self, ContractViolation> {
        if config.identifier_key.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "identity_config.identifier_key",
                reason: "must not be empty",
            });
        }
        if config.identifier_key.len() > 128 {
            return Err(ContractViolation::InvalidValue {
                field: "identity_config.identifier_key",
                reason: "must be <= 128 chars",
            });
        }
        Ok(Self { config })
    }

    pub fn identifier_key(&self) -> &str {
        &self.config.identifier_key
    }

    /// URL parameter, then cookie, then nothing. Empty values count as absent.
    pub fn resolve(
        &self,
        url_params: &dyn UrlParamSource,
        cookies: &dyn CookieSource,
        already_resolved: bool,
    ) -> Option<TrackingIdentifier> {
        self.resolve_with_source(url_params, cookies, already_resolved)
            .map(|r| r.identifier)
    }

    pub fn resolve_with_source(
        &self,
        url_params: &dyn UrlParamSource,
        cookies: &dyn CookieSource,
        already_resolved: bool,
    ) -> Option<ResolvedIdentifier> {
        if already_resolved {
            return None;
        }
        let key = self.config.identifier_key.as_str();
        let from_url = url_params
            .param(key)
            .and_then(|v| TrackingIdentifier::new(v).ok())
            .map(|identifier| ResolvedIdentifier {
                identifier,
                source: IdentifierSource::UrlParam,
            });
        if from_url.is_some() {
            return from_url;
        }
        cookies
            .cookie(key)
            .and_then(|v| TrackingIdentifier::new(v).ok())
            .map(|identifier| ResolvedIdentifier {
                identifier,
                source: IdentifierSource::Cookie,
            })
    }
}

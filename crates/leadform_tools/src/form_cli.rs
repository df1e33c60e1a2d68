#![forbid(unsafe_code)]

use leadform_engines::canonical::canonicalize;
use leadform_engines::hasher::{Hasher, Sha256Digest};
use leadform_engines::identity::{CookieJar, IdentifierResolver, QueryString};
use leadform_kernel_contracts::form::FormField;
use leadform_os::config::LeadFormConfig;
use leadform_os::notifier::LogSink;
use leadform_os::store::FormStateStore;

const USAGE: &str = "usage: leadform <hash|resolve|submit> [args]\n  \
    leadform hash <text>\n  \
    leadform resolve [--url <url-or-query>] [--cookie <header>]\n  \
    leadform submit [--url <url-or-query>] [--cookie <header>] [--set <field>=<value>]...";

#[derive(Debug, Default)]
struct FormArgs {
    url: Option<String>,
    cookie: Option<String>,
    sets: Vec<(String, String)>,
}

pub fn execute_form_command(config: &LeadFormConfig, args: &[String]) -> Result<String, String> {
    let (subcommand, rest) = args.split_first().ok_or_else(|| USAGE.to_string())?;
    match subcommand.as_str() {
        "hash" => {
            let [text] = rest else {
                return Err("usage: leadform hash <text>".to_string());
            };
            let canonical = canonicalize(text);
            let digest = Hasher::new(Sha256Digest)
                .hash(&canonical)
                .map_err(|e| format!("failed to hash: {e}"))?;
            Ok(format!("canonical: {canonical}\nsha256: {digest}"))
        }
        "resolve" => {
            let parsed = parse_form_args(rest, false)?;
            let resolver = IdentifierResolver::new(config.identity_config())
                .map_err(|e| format!("invalid configuration: {e}"))?;
            let resolved = resolver.resolve(
                &query_of(&parsed),
                &cookies_of(&parsed),
                false,
            );
            Ok(resolved
                .map(|id| id.into_string())
                .unwrap_or_else(|| "NONE".to_string()))
        }
        "submit" => {
            let parsed = parse_form_args(rest, true)?;
            let mut store = FormStateStore::reference_v1(config.clone())
                .map_err(|e| format!("invalid configuration: {e}"))?;
            store
                .register_sink(Box::new(LogSink::new("log")))
                .map_err(|e| format!("failed to register sink: {e}"))?;
            store
                .resolve_identifier_once(&query_of(&parsed), &cookies_of(&parsed))
                .map_err(|e| format!("failed to resolve identifier: {e}"))?;
            for (field, value) in &parsed.sets {
                store
                    .set_field_and_settle(field, value)
                    .map_err(|e| format!("failed to set {field}: {e}"))?;
            }
            store
                .submit()
                .map(|receipt| receipt.message)
                .map_err(|failure| failure.message)
        }
        _ => Err(format!(
            "unknown subcommand: {subcommand}. expected one of: hash, resolve, submit"
        )),
    }
}

fn parse_form_args(args: &[String], allow_set: bool) -> Result<FormArgs, String> {
    let mut parsed = FormArgs::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let value = iter
            .next()
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag.as_str() {
            "--url" => parsed.url = Some(value.clone()),
            "--cookie" => parsed.cookie = Some(value.clone()),
            "--set" if allow_set => {
                let (field, v) = value
                    .split_once('=')
                    .ok_or_else(|| format!("expected <field>=<value>, got '{value}'"))?;
                if FormField::parse(field).is_none() {
                    let allowed = FormField::editable_field_names().join(", ");
                    return Err(format!("unknown field '{field}'. allowed: {allowed}"));
                }
                parsed.sets.push((field.to_string(), v.to_string()));
            }
            _ => return Err(format!("unknown option: {flag}\n{USAGE}")),
        }
    }
    Ok(parsed)
}

fn query_of(args: &FormArgs) -> QueryString {
    args.url
        .as_deref()
        .map(QueryString::parse)
        .unwrap_or_default()
}

fn cookies_of(args: &FormArgs) -> CookieJar {
    args.cookie.clone().map(CookieJar::new).unwrap_or_default()
}

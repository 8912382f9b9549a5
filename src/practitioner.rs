//! Practitioner lookup: resolves a specialty to real registered practitioners.
//!
//! Implementations:
//! - [`RestResolver`]: queries the backend's `practitioners` table (joined with
//!   `profiles`) over its REST API, newest first.
//! - [`StaticResolver`]: ordered in-memory list, for local runs and tests.
//! - [`DisabledResolver`]: never finds anyone.
//!
//! An empty result means "no match"; errors are reserved for failed lookups.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};

use crate::config::{ResolverConfig, ResolverKind};
use crate::error::ResolverError;

/// Specialty queried when no reference doctor scores at all.
pub const GENERAL_PRACTITIONER: &str = "General Practitioner";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: String,
    pub name: String,
    pub specialty: String,
}

#[async_trait]
pub trait PractitionerResolver: Send + Sync {
    async fn search(&self, specialty: &str) -> Result<Vec<Practitioner>, ResolverError>;
    fn name(&self) -> &'static str;
}

pub type DynResolver = Arc<dyn PractitionerResolver>;

/// Search through `resolver`, recording lookup count, latency and failures.
pub async fn lookup(
    resolver: &dyn PractitionerResolver,
    specialty: &str,
) -> Result<Vec<Practitioner>, ResolverError> {
    let t0 = Instant::now();
    let res = resolver.search(specialty).await;
    let ms = t0.elapsed().as_secs_f64() * 1_000.0;

    counter!("triage_resolver_lookups_total", "resolver" => resolver.name()).increment(1);
    histogram!("triage_resolver_latency_ms").record(ms);
    match &res {
        Ok(found) => {
            tracing::debug!(resolver = resolver.name(), specialty, found = found.len(), "practitioner lookup");
        }
        Err(e) => {
            counter!("triage_resolver_errors_total", "resolver" => resolver.name()).increment(1);
            tracing::warn!(error = %e, resolver = resolver.name(), specialty, "practitioner lookup failed");
        }
    }
    res
}

/// Build the resolver described by `cfg`.
pub fn build_resolver(cfg: &ResolverConfig) -> anyhow::Result<DynResolver> {
    let resolver: DynResolver = match cfg.kind {
        ResolverKind::Rest => {
            let base_url = cfg
                .base_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| anyhow!("resolver kind `rest` requires `base_url`"))?;
            Arc::new(RestResolver::new(
                base_url,
                cfg.api_key.clone().unwrap_or_default(),
                Duration::from_secs(cfg.timeout_secs),
            )?)
        }
        ResolverKind::Static => match cfg.static_path.as_deref() {
            Some(path) => Arc::new(StaticResolver::load_from_file(path)?),
            None => Arc::new(StaticResolver::new(Vec::new())),
        },
        ResolverKind::Disabled => Arc::new(DisabledResolver),
    };
    tracing::info!(resolver = resolver.name(), "practitioner resolver ready");
    Ok(resolver)
}

/* ----------------------------
REST backend
---------------------------- */

pub struct RestResolver {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestResolver {
    pub fn new(
        base_url: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, ResolverError> {
        let http = reqwest::Client::builder()
            .user_agent("symptom-triage/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/practitioners", self.base_url)
    }
}

#[async_trait]
impl PractitionerResolver for RestResolver {
    async fn search(&self, specialty: &str) -> Result<Vec<Practitioner>, ResolverError> {
        let filter = format!("eq.{specialty}");
        let mut req = self.http.get(self.endpoint()).query(&[
            ("select", "*,profiles(*)"),
            ("specialty", filter.as_str()),
            ("order", "created_at.desc"),
        ]);
        if !self.api_key.is_empty() {
            req = req.header("apikey", &self.api_key).bearer_auth(&self.api_key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ResolverError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        parse_rows(&body)
    }

    fn name(&self) -> &'static str {
        "rest"
    }
}

#[derive(Debug, Deserialize)]
struct PractitionerRow {
    id: String,
    specialty: String,
    #[serde(default)]
    profiles: Option<ProfileRow>,
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    #[serde(default)]
    full_name: Option<String>,
}

/// Map backend rows to practitioners, dropping rows without a profile name.
fn parse_rows(body: &str) -> Result<Vec<Practitioner>, ResolverError> {
    let rows: Vec<PractitionerRow> =
        serde_json::from_str(body).map_err(|e| ResolverError::Decode(e.to_string()))?;
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            let name = row
                .profiles
                .and_then(|p| p.full_name)
                .filter(|n| !n.trim().is_empty());
            match name {
                Some(name) => Some(Practitioner {
                    id: row.id,
                    name,
                    specialty: row.specialty,
                }),
                None => {
                    tracing::debug!(id = %row.id, "skipping practitioner without profile name");
                    None
                }
            }
        })
        .collect())
}

/* ----------------------------
In-memory + disabled
---------------------------- */

#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    practitioners: Vec<Practitioner>,
}

impl StaticResolver {
    pub fn new(practitioners: Vec<Practitioner>) -> Self {
        Self { practitioners }
    }

    /// Load a JSON array of `{id, name, specialty}` records.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading practitioners from {}", path.display()))?;
        let practitioners: Vec<Practitioner> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing practitioners in {}", path.display()))?;
        Ok(Self::new(practitioners))
    }
}

#[async_trait]
impl PractitionerResolver for StaticResolver {
    async fn search(&self, specialty: &str) -> Result<Vec<Practitioner>, ResolverError> {
        Ok(self
            .practitioners
            .iter()
            .filter(|p| p.specialty == specialty)
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

pub struct DisabledResolver;

#[async_trait]
impl PractitionerResolver for DisabledResolver {
    async fn search(&self, _specialty: &str) -> Result<Vec<Practitioner>, ResolverError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(id: &str, name: &str, specialty: &str) -> Practitioner {
        Practitioner {
            id: id.into(),
            name: name.into(),
            specialty: specialty.into(),
        }
    }

    #[tokio::test]
    async fn static_resolver_matches_exact_specialty_in_order() {
        let r = StaticResolver::new(vec![
            p("1", "Dr. A", "Cardiologist"),
            p("2", "Dr. B", "Neurologist"),
            p("3", "Dr. C", "Cardiologist"),
        ]);
        let found = r.search("Cardiologist").await.unwrap();
        assert_eq!(found.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["1", "3"]);
        assert!(r.search("cardiologist").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn disabled_resolver_finds_nobody() {
        assert!(DisabledResolver.search(GENERAL_PRACTITIONER).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lookup_passes_results_through() {
        let r = StaticResolver::new(vec![p("1", "Dr. A", GENERAL_PRACTITIONER)]);
        let found = lookup(&r, GENERAL_PRACTITIONER).await.unwrap();
        assert_eq!(found, vec![p("1", "Dr. A", GENERAL_PRACTITIONER)]);
    }

    #[test]
    fn rows_map_profile_name_and_skip_incomplete() {
        let body = r#"[
            { "id": "a1", "specialty": "Cardiologist", "created_at": "2024-05-01",
              "profiles": { "id": "a1", "full_name": "Dr. Ada Heart", "role": "practitioner" } },
            { "id": "b2", "specialty": "Cardiologist", "profiles": null },
            { "id": "c3", "specialty": "Cardiologist", "profiles": { "full_name": "  " } }
        ]"#;
        let out = parse_rows(body).unwrap();
        assert_eq!(out, vec![p("a1", "Dr. Ada Heart", "Cardiologist")]);
    }

    #[test]
    fn malformed_rows_are_decode_errors() {
        let err = parse_rows(r#"{"message":"oops"}"#).unwrap_err();
        assert!(matches!(err, ResolverError::Decode(_)));
    }

    #[test]
    fn rest_kind_requires_base_url() {
        let cfg = ResolverConfig {
            kind: ResolverKind::Rest,
            ..ResolverConfig::default()
        };
        assert!(build_resolver(&cfg).is_err());
    }

    #[test]
    fn static_resolver_loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("practitioners.json");
        fs::write(
            &path,
            r#"[{ "id": "9", "name": "Dr. Nine", "specialty": "Dermatologist" }]"#,
        )
        .unwrap();
        let cfg = ResolverConfig {
            kind: ResolverKind::Static,
            static_path: Some(path.display().to_string()),
            ..ResolverConfig::default()
        };
        let r = build_resolver(&cfg).unwrap();
        assert_eq!(r.name(), "static");
    }
}

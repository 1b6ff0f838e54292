#![deny(missing_docs)]

//! # Document Loader
//!
//! Fetches root documents and every document they transitively reference.
//!
//! Fetches run concurrently as blocking tasks on a `JoinSet`. The set of
//! in-flight tasks is the barrier: scanning a finished document may claim and
//! spawn more work before the finished unit is retired, so the set only drains
//! once every discovered document has both started and finished. A location is
//! claimed before its fetch is spawned, so each canonical location is fetched
//! at most once per load. The first failure settles the whole load.

use crate::document::{major_version, Document, LoadedSpecs, ReferenceRegistry};
use crate::error::{LoadError, LoadResult};
use crate::location::Location;
use crate::sanitize::strip_injection;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;

/// Raw body returned by a `Fetcher`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    /// Document text.
    pub body: String,
    /// `Content-Type` header for remote documents.
    pub content_type: Option<String>,
}

/// Transport used to retrieve document bodies.
///
/// Implementations are called from blocking worker threads.
pub trait Fetcher: Send + Sync {
    /// Retrieves the body stored at `location`.
    fn fetch(&self, location: &Location) -> LoadResult<Fetched>;
}

/// Reads files from disk and remote documents over HTTP(S).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFetcher;

impl Fetcher for DefaultFetcher {
    fn fetch(&self, location: &Location) -> LoadResult<Fetched> {
        if location.is_remote() {
            return fetch_remote(location);
        }

        let path = location
            .to_file_path()
            .ok_or_else(|| LoadError::InvalidLocation {
                location: location.key(),
                reason: "not a file path".into(),
            })?;
        let body = std::fs::read_to_string(&path).map_err(|e| LoadError::Fetch {
            location: location.key(),
            reason: e.to_string(),
        })?;
        Ok(Fetched {
            body,
            content_type: None,
        })
    }
}

fn fetch_remote(location: &Location) -> LoadResult<Fetched> {
    let fetch_err = |e: ureq::Error| LoadError::Fetch {
        location: location.key(),
        reason: e.to_string(),
    };

    let mut response = match ureq::get(location.url().as_str()).call() {
        Ok(response) => response,
        Err(ureq::Error::StatusCode(status)) => return Err(status_error(location, status)),
        Err(e) => return Err(fetch_err(e)),
    };
    check_status(location, response.status().as_u16())?;

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.body_mut().read_to_string().map_err(fetch_err)?;

    Ok(Fetched { body, content_type })
}

/// Only `200` is accepted from a remote location.
fn check_status(location: &Location, status: u16) -> LoadResult<()> {
    if status == 200 {
        Ok(())
    } else {
        Err(status_error(location, status))
    }
}

fn status_error(location: &Location, status: u16) -> LoadError {
    LoadError::Status {
        location: location.key(),
        status,
    }
}

/// Loader behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Scan keys and string values against the injection blocklist.
    pub sanitize: bool,
    /// On a blocklist hit, strip the offending content and continue instead of
    /// failing the load.
    pub allow_injection: bool,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            sanitize: true,
            allow_injection: false,
        }
    }
}

/// Fetches and caches root and transitively referenced documents.
pub struct Loader {
    fetcher: Arc<dyn Fetcher>,
    options: LoaderOptions,
    poison_detected: Arc<AtomicBool>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl Loader {
    /// Creates a loader using the filesystem/HTTP fetcher.
    pub fn new() -> Self {
        Self::with_fetcher(Arc::new(DefaultFetcher))
    }

    /// Creates a loader using a custom transport.
    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            options: LoaderOptions::default(),
            poison_detected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Replaces the loader options.
    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// Whether a suspected injection has been seen by this loader instance.
    pub fn poison_detected(&self) -> bool {
        self.poison_detected.load(Ordering::SeqCst)
    }

    /// Loads one or more root documents and everything they reference.
    ///
    /// Roots are validated for an `openapi`/`swagger` marker >= 2 and are
    /// returned in the order requested.
    ///
    /// # Errors
    ///
    /// Any fetch, parse, version or injection failure rejects the whole load.
    pub async fn load<I, S>(&self, locations: I) -> LoadResult<LoadedSpecs>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roots = locations
            .into_iter()
            .map(|raw| Location::parse(raw.as_ref()))
            .collect::<LoadResult<Vec<_>>>()?;
        if roots.is_empty() {
            return Err(LoadError::NoLocations);
        }

        let mut barrier = FetchBarrier::new();
        for root in &roots {
            if barrier.claim(root) {
                self.spawn(&mut barrier, root.clone(), true);
            }
        }

        let mut top: BTreeMap<String, Arc<Document>> = BTreeMap::new();
        let mut sub: BTreeMap<String, Arc<Document>> = BTreeMap::new();

        while let Some(unit) = barrier.next().await {
            let unit = unit?;
            for discovered in &unit.discovered {
                // Roots were all claimed up front, so anything new is a subdocument.
                if barrier.claim(discovered) {
                    tracing::debug!(
                        from = %unit.location,
                        location = %discovered,
                        "discovered reference"
                    );
                    self.spawn(&mut barrier, discovered.clone(), false);
                }
            }

            let key = unit.location.key();
            let doc = Arc::new(Document::new(key.clone(), unit.content));
            if unit.is_root {
                top.insert(key, doc);
            } else {
                sub.insert(key, doc);
            }
        }

        let mut registry = ReferenceRegistry::new();
        let mut ordered_roots = Vec::with_capacity(roots.len());
        for root in &roots {
            let key = root.key();
            if let Some(doc) = top.get(&key) {
                if !registry.top.contains_key(&key) {
                    registry.top.insert(key, Arc::clone(doc));
                    ordered_roots.push(Arc::clone(doc));
                }
            }
        }
        registry.sub = sub.into_iter().collect::<IndexMap<_, _>>();

        Ok(LoadedSpecs {
            roots: ordered_roots,
            references: Arc::new(registry),
        })
    }

    fn spawn(&self, barrier: &mut FetchBarrier, location: Location, is_root: bool) {
        let worker = FetchWorker {
            fetcher: Arc::clone(&self.fetcher),
            options: self.options,
            poison_detected: Arc::clone(&self.poison_detected),
        };
        barrier
            .in_flight
            .spawn_blocking(move || worker.run(location, is_root));
    }
}

/// Claim set plus the in-flight fetches of one `load` call.
struct FetchBarrier {
    claimed: HashSet<String>,
    in_flight: JoinSet<LoadResult<FetchedUnit>>,
}

impl FetchBarrier {
    fn new() -> Self {
        Self {
            claimed: HashSet::new(),
            in_flight: JoinSet::new(),
        }
    }

    /// Records the location; `false` when it was already claimed.
    fn claim(&mut self, location: &Location) -> bool {
        self.claimed.insert(location.key())
    }

    async fn next(&mut self) -> Option<LoadResult<FetchedUnit>> {
        let joined = self.in_flight.join_next().await?;
        Some(joined.unwrap_or_else(|e| {
            Err(LoadError::Task {
                reason: e.to_string(),
            })
        }))
    }
}

/// One fetched, parsed and scanned document.
struct FetchedUnit {
    location: Location,
    is_root: bool,
    content: Value,
    discovered: Vec<Location>,
}

struct FetchWorker {
    fetcher: Arc<dyn Fetcher>,
    options: LoaderOptions,
    poison_detected: Arc<AtomicBool>,
}

impl FetchWorker {
    fn run(&self, location: Location, is_root: bool) -> LoadResult<FetchedUnit> {
        tracing::info!(location = %location, "loading document");

        let fetched = self.fetcher.fetch(&location)?;
        let mut content = parse_body(&location, &fetched)?;

        if is_root && !major_version(&content).is_some_and(|v| v >= 2) {
            return Err(LoadError::Version {
                location: location.key(),
            });
        }

        let mut discovered = Vec::new();
        self.scan(&mut content, &location, &mut discovered)?;

        Ok(FetchedUnit {
            location,
            is_root,
            content,
            discovered,
        })
    }

    /// Checks strings against the blocklist and rewrites external pointers to
    /// canonical locations, collecting them in `discovered`.
    fn scan(
        &self,
        node: &mut Value,
        location: &Location,
        discovered: &mut Vec<Location>,
    ) -> LoadResult<()> {
        match node {
            Value::Object(map) => {
                for (key, value) in map.iter_mut() {
                    if self.options.sanitize {
                        self.check(key, location)?;
                    }
                    if key == "$ref" {
                        if let Value::String(reference) = value {
                            if self.options.sanitize {
                                if let Some(cleaned) = self.check(reference, location)? {
                                    *reference = cleaned;
                                }
                            }
                            if !reference.starts_with('#') {
                                let (canonical, target) = canonicalize(reference, location)?;
                                *reference = canonical;
                                discovered.push(target);
                            }
                            continue;
                        }
                    }
                    self.scan(value, location, discovered)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.scan(item, location, discovered)?;
                }
            }
            Value::String(text) => {
                if self.options.sanitize {
                    if let Some(cleaned) = self.check(text, location)? {
                        *text = cleaned;
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Returns the stripped value on a blocklist hit when injection is
    /// allowed, fails the load otherwise.
    fn check(&self, value: &str, location: &Location) -> LoadResult<Option<String>> {
        let Some(cleaned) = strip_injection(value) else {
            return Ok(None);
        };

        if !self.poison_detected.swap(true, Ordering::SeqCst) {
            tracing::warn!(
                location = %location,
                "detected a potentially poisoned specification; check it for code injection attacks"
            );
        }
        tracing::warn!(location = %location, value, "suspected injection");

        if self.options.allow_injection {
            Ok(Some(cleaned))
        } else {
            Err(LoadError::Injection {
                location: location.key(),
                value: value.to_string(),
            })
        }
    }
}

/// Rewrites an external pointer to `<canonical location>[#fragment]`.
fn canonicalize(reference: &str, base: &Location) -> LoadResult<(String, Location)> {
    let (external, fragment) = match reference.split_once('#') {
        Some((external, fragment)) => (external, Some(fragment)),
        None => (reference, None),
    };
    let target = base.join(external)?;
    let canonical = match fragment {
        Some(fragment) => format!("{}#{}", target.key(), fragment),
        None => target.key(),
    };
    Ok((canonical, target))
}

fn parse_body(location: &Location, fetched: &Fetched) -> LoadResult<Value> {
    let parse_err = |reason: String| LoadError::Parse {
        location: location.key(),
        reason,
    };
    if location.is_yaml(fetched.content_type.as_deref()) {
        serde_yaml::from_str(&fetched.body).map_err(|e| parse_err(e.to_string()))
    } else {
        serde_json::from_str(&fetched.body).map_err(|e| parse_err(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_keeps_fragment() {
        let base = Location::parse("/specs/api.yaml").unwrap();
        let (canonical, target) = canonicalize("parameters.yaml#/tagsParam", &base).unwrap();
        assert_eq!(canonical, "/specs/parameters.yaml#/tagsParam");
        assert_eq!(target.key(), "/specs/parameters.yaml");

        let (canonical, _) = canonicalize("../pet.yaml", &base).unwrap();
        assert_eq!(canonical, "/pet.yaml");
    }

    #[test]
    fn test_only_200_is_accepted() {
        let location = Location::parse("https://example.com/api").unwrap();
        assert!(check_status(&location, 200).is_ok());
        assert_eq!(
            check_status(&location, 204).unwrap_err(),
            LoadError::Status {
                location: "https://example.com/api".into(),
                status: 204
            }
        );
    }

    #[test]
    fn test_parse_body_by_content_type() {
        let location = Location::parse("https://example.com/api").unwrap();
        let fetched = Fetched {
            body: "openapi: 3.0.0\n".into(),
            content_type: Some("application/x-yaml; charset=utf-8".into()),
        };
        assert_eq!(parse_body(&location, &fetched).unwrap()["openapi"], "3.0.0");

        let fetched = Fetched {
            content_type: Some("application/json".into()),
            ..fetched
        };
        assert!(matches!(
            parse_body(&location, &fetched),
            Err(LoadError::Parse { .. })
        ));
    }

    #[test]
    fn test_parse_body_by_extension() {
        let yaml = Location::parse("/specs/api.yaml").unwrap();
        let fetched = Fetched {
            body: "swagger: '2.0'\n".into(),
            content_type: None,
        };
        assert_eq!(parse_body(&yaml, &fetched).unwrap()["swagger"], "2.0");

        let json = Location::parse("/specs/api.json").unwrap();
        assert!(matches!(
            parse_body(&json, &fetched),
            Err(LoadError::Parse { .. })
        ));
    }
}

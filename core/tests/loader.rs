use oaspipe_core::{Fetched, Fetcher, LoadError, LoadResult, Loader, LoaderOptions, Location};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

fn key(dir: &Path, name: &str) -> String {
    dir.join(name).to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_chained_references_are_registered_once() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("api.yaml"),
        r#"
swagger: '2.0'
info: { title: Chain, version: '1' }
paths: {}
definitions:
  A:
    $ref: 'b.yaml#/definitions/B'
"#,
    )
    .unwrap();
    fs::create_dir(dir.path().join("models")).unwrap();
    fs::write(
        dir.path().join("b.yaml"),
        r#"
definitions:
  B:
    properties:
      c:
        $ref: 'models/c.yaml'
"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("models").join("c.yaml"),
        r#"
type: object
properties:
  back:
    $ref: '../b.yaml#/definitions/B'
"#,
    )
    .unwrap();

    let api = key(dir.path(), "api.yaml");
    let specs = Loader::new().load([api.as_str()]).await.unwrap();

    let top: Vec<&String> = specs.references.top.keys().collect();
    assert_eq!(top, vec![&api]);

    let b = key(dir.path(), "b.yaml");
    let c = dir
        .path()
        .join("models")
        .join("c.yaml")
        .to_string_lossy()
        .into_owned();
    let sub: Vec<&String> = specs.references.sub.keys().collect();
    assert_eq!(sub, vec![&b, &c]);

    // Pointers are rewritten to canonical locations.
    assert_eq!(
        specs.root().root["definitions"]["A"]["$ref"],
        format!("{}#/definitions/B", b)
    );
    let c_doc = specs.references.get(&c).unwrap();
    assert_eq!(
        c_doc.root["properties"]["back"]["$ref"],
        format!("{}#/definitions/B", b)
    );
}

/// Serves documents from memory and counts fetches per location.
struct MemoryFetcher {
    documents: HashMap<String, String>,
    fetches: Mutex<HashMap<String, usize>>,
}

impl MemoryFetcher {
    fn new(documents: &[(&str, &str)]) -> Self {
        Self {
            documents: documents
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            fetches: Mutex::new(HashMap::new()),
        }
    }

    fn count(&self, location: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .get(location)
            .copied()
            .unwrap_or(0)
    }
}

impl Fetcher for MemoryFetcher {
    fn fetch(&self, location: &Location) -> LoadResult<Fetched> {
        let key = location.key();
        *self.fetches.lock().unwrap().entry(key.clone()).or_default() += 1;
        let body = self
            .documents
            .get(&key)
            .cloned()
            .ok_or_else(|| LoadError::Fetch {
                location: key,
                reason: "not found".into(),
            })?;
        Ok(Fetched {
            body,
            content_type: None,
        })
    }
}

#[tokio::test]
async fn test_shared_reference_is_fetched_once() {
    let fetcher = Arc::new(MemoryFetcher::new(&[
        (
            "/mem/api.yaml",
            r#"
swagger: '2.0'
paths:
  /pets:
    $ref: 'pets.yaml'
responses:
  Error:
    schema:
      $ref: 'common.yaml#/Error'
"#,
        ),
        (
            "/mem/pets.yaml",
            r#"
get:
  responses:
    default:
      schema:
        $ref: './common.yaml#/Error'
"#,
        ),
        ("/mem/common.yaml", "Error: { type: object }\n"),
    ]));

    let specs = Loader::with_fetcher(fetcher.clone())
        .load(["/mem/api.yaml"])
        .await
        .unwrap();

    assert_eq!(fetcher.count("/mem/common.yaml"), 1);
    assert_eq!(fetcher.count("/mem/pets.yaml"), 1);
    assert_eq!(fetcher.count("/mem/api.yaml"), 1);
    assert_eq!(specs.references.len(), 3);
}

#[tokio::test]
async fn test_roots_keep_input_order() {
    let fetcher = Arc::new(MemoryFetcher::new(&[
        ("/mem/one.json", r#"{ "swagger": "2.0", "paths": {} }"#),
        ("/mem/two.json", r#"{ "openapi": "3.0.3", "paths": {} }"#),
    ]));
    let specs = Loader::with_fetcher(fetcher)
        .load(["/mem/two.json", "/mem/one.json"])
        .await
        .unwrap();

    let roots: Vec<&str> = specs.roots.iter().map(|d| d.location.as_str()).collect();
    assert_eq!(roots, vec!["/mem/two.json", "/mem/one.json"]);
    assert!(specs.references.sub.is_empty());
}

#[tokio::test]
async fn test_root_without_version_is_rejected() {
    let fetcher = Arc::new(MemoryFetcher::new(&[
        ("/mem/api.yaml", "info: { title: nothing }\n"),
        ("/mem/old.yaml", "swagger: '1.2'\n"),
    ]));
    let loader = Loader::with_fetcher(fetcher);

    let err = loader.load(["/mem/api.yaml"]).await.unwrap_err();
    assert_eq!(
        err,
        LoadError::Version {
            location: "/mem/api.yaml".into()
        }
    );
    let err = loader.load(["/mem/old.yaml"]).await.unwrap_err();
    assert!(matches!(err, LoadError::Version { .. }));
}

#[tokio::test]
async fn test_missing_reference_fails_the_load() {
    let fetcher = Arc::new(MemoryFetcher::new(&[(
        "/mem/api.yaml",
        "swagger: '2.0'\ndefinitions:\n  A:\n    $ref: 'gone.yaml#/A'\n",
    )]));
    let err = Loader::with_fetcher(fetcher)
        .load(["/mem/api.yaml"])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LoadError::Fetch {
            location: "/mem/gone.yaml".into(),
            reason: "not found".into()
        }
    );
}

#[tokio::test]
async fn test_injection_is_rejected_by_default() {
    let docs = [(
        "/mem/api.yaml",
        "swagger: '2.0'\ninfo:\n  description: 'hello <script>alert(1)'\n",
    )];

    let loader = Loader::with_fetcher(Arc::new(MemoryFetcher::new(&docs)));
    let err = loader.load(["/mem/api.yaml"]).await.unwrap_err();
    assert!(matches!(err, LoadError::Injection { .. }));
    assert!(loader.poison_detected());

    let loader = Loader::with_fetcher(Arc::new(MemoryFetcher::new(&docs))).options(LoaderOptions {
        sanitize: true,
        allow_injection: true,
    });
    let specs = loader.load(["/mem/api.yaml"]).await.unwrap();
    let description = specs.root().root["info"]["description"].as_str().unwrap();
    assert!(!description.contains("<script>"));

    let loader = Loader::with_fetcher(Arc::new(MemoryFetcher::new(&docs))).options(LoaderOptions {
        sanitize: false,
        allow_injection: false,
    });
    assert!(loader.load(["/mem/api.yaml"]).await.is_ok());
    assert!(!loader.poison_detected());
}

#[tokio::test]
async fn test_no_locations() {
    let err = Loader::new().load(Vec::<String>::new()).await.unwrap_err();
    assert_eq!(err, LoadError::NoLocations);
}

/// Answers like an HTTP server: YAML by content type, 404 for anything else.
struct RemoteFetcher;

impl Fetcher for RemoteFetcher {
    fn fetch(&self, location: &Location) -> LoadResult<Fetched> {
        let body = match location.key().as_str() {
            "https://api.example.com/spec" => {
                "swagger: '2.0'\npaths:\n  /pets:\n    $ref: 'pets'\n"
            }
            "https://api.example.com/pets" => "get:\n  responses: {}\n",
            "https://api.example.com/broken" => "swagger: '2.0'\nx-link:\n  $ref: 'gone#/A'\n",
            key => {
                return Err(LoadError::Status {
                    location: key.to_string(),
                    status: 404,
                })
            }
        };
        Ok(Fetched {
            body: body.to_string(),
            content_type: Some("text/yaml; charset=utf-8".into()),
        })
    }
}

#[tokio::test]
async fn test_remote_documents_parse_by_content_type() {
    let loader = Loader::with_fetcher(Arc::new(RemoteFetcher));
    let specs = loader.load(["https://api.example.com/spec"]).await.unwrap();

    assert_eq!(specs.root().root["swagger"], "2.0");
    assert_eq!(
        specs.root().root["paths"]["/pets"]["$ref"],
        "https://api.example.com/pets"
    );
    let pets = specs.references.get("https://api.example.com/pets").unwrap();
    assert!(pets.root["get"]["responses"].is_object());

    let err = loader
        .load(["https://api.example.com/broken"])
        .await
        .unwrap_err();
    assert_eq!(
        err,
        LoadError::Status {
            location: "https://api.example.com/gone".into(),
            status: 404
        }
    );
}

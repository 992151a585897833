#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tempfile::TempDir;
use vidgate::{
    app,
    config::Config,
    error::{AppError, Result},
    models::upload::UniquenessRecord,
    repositories::uniqueness::UniquenessIndex,
    services::sessions::SessionStore,
    state::AppState,
};

pub const TEMPLATE: &str = "<html><body data-videos=\"{{VIDEO_LIST}}\"></body></html>";

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with_test_writer()
        .try_init();
});

/// In-memory stand-in for the PostgreSQL index with the same conflict rule.
#[derive(Default)]
pub struct MemoryIndex {
    rows: Mutex<HashMap<String, UniquenessRecord>>,
}

impl MemoryIndex {
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn hashes(&self) -> Vec<String> {
        self.rows.lock().keys().cloned().collect()
    }
}

impl UniquenessIndex for MemoryIndex {
    fn find<'a>(&'a self, content_hash: &'a str) -> BoxFuture<'a, Result<Option<UniquenessRecord>>> {
        Box::pin(async move { Ok(self.rows.lock().get(content_hash).cloned()) })
    }

    fn insert<'a>(&'a self, record: &'a UniquenessRecord) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut rows = self.rows.lock();
            if rows.contains_key(&record.content_hash) {
                return Err(AppError::Conflict("duplicate hash".into()));
            }
            rows.insert(record.content_hash.clone(), record.clone());
            Ok(())
        })
    }
}

pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub root: TempDir,
    pub index: Arc<MemoryIndex>,
    pub sessions: Arc<SessionStore>,
    pub config: Config,
}

impl TestApp {
    pub fn media_root(&self) -> &Path {
        &self.config.media_root
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// A client that keeps cookies, like a browser.
    pub fn browser(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .unwrap()
    }

    /// Opens the gallery so `client` holds a session cookie.
    pub async fn open_session(&self, client: &reqwest::Client) {
        let response = client.get(self.url("/")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
    }

    pub fn same_host_referer(&self) -> String {
        self.url("/")
    }

    pub async fn upload(
        &self,
        client: &reqwest::Client,
        filename: &str,
        bytes: Vec<u8>,
    ) -> reqwest::Response {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new().part("multimedia-upload", part);
        client
            .post(self.url("/upload"))
            .header("Referer", self.same_host_referer())
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub fn stored_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.media_root())
            .map(|entries| {
                entries
                    .filter_map(|entry| entry.ok())
                    .map(|entry| entry.path())
                    .filter(|path| path.is_file())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Starts a server on an ephemeral port with overrides on top of test defaults.
pub async fn spawn_app_with(overrides: &[(&str, &str)]) -> TestApp {
    Lazy::force(&TRACING);

    let root = TempDir::new().unwrap();
    let template_path = root.path().join("templates/index.html");
    std::fs::create_dir_all(template_path.parent().unwrap()).unwrap();
    std::fs::write(&template_path, TEMPLATE).unwrap();
    std::fs::create_dir_all(root.path().join("styles")).unwrap();
    std::fs::write(root.path().join("styles/site.css"), "body {}").unwrap();

    let mut values: HashMap<String, String> = HashMap::from([
        ("DATABASE_URL".to_string(), "postgres://unused/test".to_string()),
        ("BIND_ADDR".to_string(), "127.0.0.1:0".to_string()),
        ("MEDIA_ROOT".to_string(), root.path().join("static").display().to_string()),
        ("STYLES_DIR".to_string(), root.path().join("styles").display().to_string()),
        ("TEMPLATE_PATH".to_string(), template_path.display().to_string()),
        ("STAGING_DIR".to_string(), root.path().join("staging").display().to_string()),
        ("THUMBNAIL_TOOL".to_string(), "/nonexistent/thumbnailer".to_string()),
    ]);
    for (key, value) in overrides {
        values.insert(key.to_string(), value.to_string());
    }

    let config = Config::from_lookup(|key| values.get(key).cloned()).unwrap();
    std::fs::create_dir_all(&config.media_root).unwrap();

    let index = Arc::new(MemoryIndex::default());
    let sessions = Arc::new(SessionStore::new(config.session_ttl));
    let state = AppState::with_parts(&config, sessions.clone(), index.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app::router(state)).await.unwrap();
    });

    TestApp {
        addr,
        base_url: format!("http://{}", addr),
        root,
        index,
        sessions,
        config,
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(&[]).await
}

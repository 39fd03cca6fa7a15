//! Style Compiler
//!
//! Runs page stylesheets through one long-lived embedded Dart Sass process.
//!
//! ## Session Invariants
//!
//! 1. **One Process**: [`StyleCompiler::init`] starts the Sass process once and
//!    verifies the handshake with an empty probe compile. Every compile reuses it.
//! 2. **Serialized**: the session is owned by a single thread; compile requests
//!    queue in its mailbox, so no two compiles touch the process at once.
//! 3. **Bounded Wait**: callers wait at most `CompilerOptions::timeout_ms` for a
//!    reply and get `CompileError::Timeout` otherwise. A timeout marks the
//!    session dead: the hung session thread is detached and every later compile
//!    fails fast with `NotInitialized` until a new compiler is initialized.
//! 4. **Virtual Imports**: `@import 'x'` is canonicalized to `embed:///x`, the
//!    name in the URL path so its case and characters survive; loading strips
//!    the scheme, percent-decodes and matches only the last path segment against
//!    the logical import names. Directories are flattened on purpose.
//! 5. **Output**: compressed CSS, no source maps.

use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use sass_embedded::{
    Exception, Importer, ImporterOptions, ImporterResult, OutputStyle, Sass,
    StringOptionsBuilder, Syntax,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use url::Url;

use crate::cache::CompileCache;
use crate::error::{CompileError, Result, StyleError};

pub const EMBED_SCHEME: &str = "embed://";

/// Overrides the Sass executable when `CompilerOptions::sass_path` is unset.
pub const SASS_PATH_ENV: &str = "SASS_EMBEDDED_PATH";

const DEFAULT_SASS_PATH: &str = "sass";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    /// Path to the Dart Sass executable that speaks the embedded protocol.
    #[serde(default)]
    pub sass_path: Option<PathBuf>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            sass_path: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl CompilerOptions {
    pub fn resolve_sass_path(&self) -> PathBuf {
        if let Some(path) = &self.sass_path {
            return path.clone();
        }
        std::env::var_os(SASS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SASS_PATH))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSyntax {
    Scss,
    Sass,
    Css,
}

impl ImportSyntax {
    /// `.sass` is the indented syntax, `.css` plain CSS, anything else SCSS.
    pub fn from_filename(filename: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");
        match extension {
            "sass" => ImportSyntax::Sass,
            "css" => ImportSyntax::Css,
            _ => ImportSyntax::Scss,
        }
    }
}

impl From<ImportSyntax> for Syntax {
    fn from(syntax: ImportSyntax) -> Self {
        match syntax {
            ImportSyntax::Scss => Syntax::Scss,
            ImportSyntax::Sass => Syntax::Indented,
            ImportSyntax::Css => Syntax::Css,
        }
    }
}

/// A named in-memory source fragment available to `@import`/`@use`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SassImport {
    pub filename: String,
    pub content: String,
}

impl SassImport {
    pub fn new(filename: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }

    /// Logical import name: the filename without directories or extension.
    /// `styles/_theme.scss` → `_theme`.
    pub fn name(&self) -> &str {
        let base = self
            .filename
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(&self.filename);
        match base.rfind('.') {
            Some(dot) if dot > 0 => &base[..dot],
            _ => base,
        }
    }

    pub fn syntax(&self) -> ImportSyntax {
        ImportSyntax::from_filename(&self.filename)
    }
}

/// Answers the compiler's canonicalize/load callbacks from an import table.
/// The first unresolved name is recorded so the caller can report it.
#[derive(Debug)]
pub(crate) struct EmbeddedImportResolver {
    imports: Vec<SassImport>,
    missing: Arc<Mutex<Option<String>>>,
}

impl EmbeddedImportResolver {
    pub(crate) fn new(imports: Vec<SassImport>, missing: Arc<Mutex<Option<String>>>) -> Self {
        Self { imports, missing }
    }

    pub(crate) fn canonicalize_url(url: &str) -> String {
        format!("{EMBED_SCHEME}/{url}")
    }

    pub(crate) fn resolve(&self, canonical_url: &str) -> std::result::Result<&SassImport, CompileError> {
        let Some(path) = canonical_url.strip_prefix(EMBED_SCHEME) else {
            return Err(CompileError::Sass {
                message: format!("invalid import url {canonical_url}"),
            });
        };

        let segment = path.rsplit('/').next().unwrap_or(path);
        let name = percent_decode_str(segment).decode_utf8_lossy();
        self.imports
            .iter()
            .find(|import| import.name() == name)
            .ok_or_else(|| CompileError::ImportNotFound {
                name: name.to_string(),
            })
    }

    fn record_missing(&self, err: &CompileError) {
        if let CompileError::ImportNotFound { name } = err {
            let mut missing = self.missing.lock();
            if missing.is_none() {
                *missing = Some(name.clone());
            }
        }
    }
}

impl Importer for EmbeddedImportResolver {
    fn canonicalize(
        &self,
        url: &str,
        _options: &ImporterOptions,
    ) -> sass_embedded::Result<Option<Url>> {
        let canonical = Self::canonicalize_url(url);
        Url::parse(&canonical).map(Some).map_err(|e| {
            Box::new(Exception::new(format!(
                "invalid import url {canonical}: {e}"
            )))
        })
    }

    fn load(&self, canonical_url: &Url) -> sass_embedded::Result<Option<ImporterResult>> {
        match self.resolve(canonical_url.as_str()) {
            Ok(import) => {
                tracing::trace!(name = import.name(), "loaded virtual import");
                Ok(Some(ImporterResult {
                    contents: import.content.clone(),
                    source_map_url: None,
                    syntax: import.syntax().into(),
                }))
            }
            Err(err) => {
                self.record_missing(&err);
                Err(Box::new(Exception::new(err.to_string())))
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════════════

type Reply = std::result::Result<String, CompileError>;

enum SessionRequest {
    Compile {
        source: String,
        imports: Vec<SassImport>,
        reply: mpsc::Sender<Reply>,
    },
    Shutdown,
}

/// Handle to the shared Sass session. Construct once at startup and share by
/// reference; `compile` takes `&self` and is safe to call from many threads.
#[derive(Debug)]
pub struct StyleCompiler {
    mailbox: Mutex<Option<mpsc::Sender<SessionRequest>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl StyleCompiler {
    /// Start the Sass process and wait for the handshake.
    pub fn init(options: &CompilerOptions) -> Result<Self> {
        let sass_path = options.resolve_sass_path();
        let sass_display = sass_path.display().to_string();
        let timeout = options.timeout();

        let (ready_tx, ready_rx) = mpsc::channel();
        let (mailbox_tx, mailbox_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("scss-session".to_string())
            .spawn(move || {
                let mut sass = match start_session(&sass_path) {
                    Ok(sass) => {
                        let _ = ready_tx.send(Ok(()));
                        sass
                    }
                    Err(message) => {
                        let _ = ready_tx.send(Err(message));
                        return;
                    }
                };
                run_session(&mut sass, mailbox_rx);
            })
            .map_err(|e| StyleError::init(format!("failed to spawn session thread: {e}")))?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {}
            Ok(Err(message)) => return Err(StyleError::init(message)),
            Err(RecvTimeoutError::Timeout) => {
                return Err(StyleError::init(format!(
                    "no handshake from sass within {}ms",
                    timeout.as_millis()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(StyleError::init("sass session exited before handshake"))
            }
        }

        tracing::debug!(sass = %sass_display, "scss session started");
        Ok(Self::with_session(mailbox_tx, Some(worker), timeout))
    }

    fn with_session(
        mailbox: mpsc::Sender<SessionRequest>,
        worker: Option<JoinHandle<()>>,
        timeout: Duration,
    ) -> Self {
        Self {
            mailbox: Mutex::new(Some(mailbox)),
            worker: Mutex::new(worker),
            timeout,
        }
    }

    /// Compile SCSS `source` to compressed CSS with `imports` resolvable by name.
    pub fn compile(&self, source: &str, imports: &[SassImport]) -> Result<String> {
        let (reply_tx, reply_rx) = mpsc::channel();
        {
            let mailbox = self.mailbox.lock();
            let sender = mailbox.as_ref().ok_or(CompileError::NotInitialized)?;
            sender
                .send(SessionRequest::Compile {
                    source: source.to_string(),
                    imports: imports.to_vec(),
                    reply: reply_tx,
                })
                .map_err(|_| CompileError::NotInitialized)?;
        }

        let result = match reply_rx.recv_timeout(self.timeout) {
            Ok(reply) => reply,
            Err(RecvTimeoutError::Timeout) => {
                self.abandon_session();
                Err(CompileError::Timeout {
                    after: self.timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(CompileError::NotInitialized),
        };

        result.map_err(|err| {
            tracing::debug!(error = %err, imports = imports.len(), "scss compile failed");
            StyleError::Compile(err)
        })
    }

    /// Like [`compile`](Self::compile), reusing output for a source and import
    /// table compiled before.
    pub fn compile_cached(
        &self,
        cache: &CompileCache,
        source: &str,
        imports: &[SassImport],
    ) -> Result<String> {
        let key = CompileCache::compute_hash(source, imports);
        if let Some(css) = cache.get(&key) {
            return Ok(css);
        }
        let css = self.compile(source, imports)?;
        cache.set(key, css.clone());
        Ok(css)
    }

    /// The session thread is stuck inside Sass; stop queueing work behind it.
    /// Its handle is dropped rather than joined so shutdown cannot block on it.
    fn abandon_session(&self) {
        if self.mailbox.lock().take().is_some() {
            tracing::warn!(
                timeout_ms = self.timeout.as_millis() as u64,
                "scss session unresponsive, marking it dead"
            );
        }
        drop(self.worker.lock().take());
    }

    pub fn is_running(&self) -> bool {
        self.mailbox.lock().is_some()
    }

    /// Stop the Sass process. Later compiles fail with `NotInitialized`.
    pub fn shutdown(&self) {
        if let Some(sender) = self.mailbox.lock().take() {
            let _ = sender.send(SessionRequest::Shutdown);
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                tracing::warn!("scss session thread panicked");
            }
        }
    }
}

impl Drop for StyleCompiler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn start_session(sass_path: &Path) -> std::result::Result<Sass, String> {
    let mut sass = Sass::new(sass_path)
        .map_err(|e| format!("{}: {}", sass_path.display(), e))?;
    sass.compile_string(String::new(), StringOptionsBuilder::default().build())
        .map_err(|e| format!("{}: handshake failed: {}", sass_path.display(), e))?;
    Ok(sass)
}

fn run_session(sass: &mut Sass, mailbox: mpsc::Receiver<SessionRequest>) {
    for request in mailbox {
        match request {
            SessionRequest::Compile {
                source,
                imports,
                reply,
            } => {
                let _ = reply.send(compile_in_session(sass, source, imports));
            }
            SessionRequest::Shutdown => break,
        }
    }
    tracing::debug!("scss session stopped");
}

fn compile_in_session(sass: &mut Sass, source: String, imports: Vec<SassImport>) -> Reply {
    let missing = Arc::new(Mutex::new(None));
    let options = StringOptionsBuilder::default()
        .syntax(Syntax::Scss)
        .style(OutputStyle::Compressed)
        .source_map(false)
        .importer(EmbeddedImportResolver::new(imports, Arc::clone(&missing)))
        .build();

    match sass.compile_string(source, options) {
        Ok(result) => Ok(result.css),
        Err(err) => match missing.lock().take() {
            Some(name) => Err(CompileError::ImportNotFound { name }),
            None => Err(CompileError::Sass {
                message: err.to_string(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(imports: Vec<SassImport>) -> EmbeddedImportResolver {
        EmbeddedImportResolver::new(imports, Arc::new(Mutex::new(None)))
    }

    #[test]
    fn test_import_name_strips_directory_and_extension() {
        assert_eq!(SassImport::new("theme.scss", "").name(), "theme");
        assert_eq!(SassImport::new("styles/_vars.sass", "").name(), "_vars");
        assert_eq!(SassImport::new("a\\b\\reset.css", "").name(), "reset");
        assert_eq!(SassImport::new("theme", "").name(), "theme");
        assert_eq!(SassImport::new("colors.min.scss", "").name(), "colors.min");
        assert_eq!(SassImport::new(".hidden", "").name(), ".hidden");
    }

    #[test]
    fn test_syntax_inferred_from_extension() {
        assert_eq!(SassImport::new("a.sass", "").syntax(), ImportSyntax::Sass);
        assert_eq!(SassImport::new("a.css", "").syntax(), ImportSyntax::Css);
        assert_eq!(SassImport::new("a.scss", "").syntax(), ImportSyntax::Scss);
        assert_eq!(SassImport::new("a", "").syntax(), ImportSyntax::Scss);
        assert_eq!(SassImport::new("sass.txt", "").syntax(), ImportSyntax::Scss);
    }

    #[test]
    fn test_canonicalize_puts_name_in_path() {
        assert_eq!(
            EmbeddedImportResolver::canonicalize_url("theme"),
            "embed:///theme"
        );

        let url = Url::parse(&EmbeddedImportResolver::canonicalize_url("darkTheme")).unwrap();
        assert_eq!(url.path(), "/darkTheme");
    }

    #[test]
    fn test_canonical_url_round_trips_unusual_names() {
        let resolver = resolver(vec![
            SassImport::new("darkTheme.scss", "$mode: dark;"),
            SassImport::new("my theme.scss", "$c: red;"),
            SassImport::new("thème.scss", "$c: blue;"),
        ]);

        for (name, content) in [
            ("darkTheme", "$mode: dark;"),
            ("my theme", "$c: red;"),
            ("thème", "$c: blue;"),
        ] {
            let url = Url::parse(&EmbeddedImportResolver::canonicalize_url(name)).unwrap();
            assert_eq!(resolver.resolve(url.as_str()).unwrap().content, content);
        }
    }

    #[test]
    fn test_resolve_matches_last_segment_only() {
        let resolver = resolver(vec![SassImport::new("partials/theme.scss", "$c: red;")]);
        assert_eq!(resolver.resolve("embed:///theme").unwrap().content, "$c: red;");
        assert_eq!(
            resolver.resolve("embed:///any/dir/theme").unwrap().content,
            "$c: red;"
        );
    }

    #[test]
    fn test_resolve_is_case_sensitive() {
        let resolver = resolver(vec![SassImport::new("theme.scss", "")]);
        assert_eq!(
            resolver.resolve("embed:///Theme").unwrap_err(),
            CompileError::ImportNotFound {
                name: "Theme".into()
            }
        );
    }

    #[test]
    fn test_resolve_rejects_foreign_scheme() {
        let resolver = resolver(vec![SassImport::new("theme.scss", "")]);
        assert!(matches!(
            resolver.resolve("file:///theme"),
            Err(CompileError::Sass { .. })
        ));
    }

    #[test]
    fn test_missing_import_is_recorded_once() {
        let missing = Arc::new(Mutex::new(None));
        let resolver = EmbeddedImportResolver::new(vec![], Arc::clone(&missing));
        for name in ["first", "second"] {
            let url = EmbeddedImportResolver::canonicalize_url(name);
            let err = resolver.resolve(&url).unwrap_err();
            resolver.record_missing(&err);
        }
        assert_eq!(missing.lock().as_deref(), Some("first"));
    }

    #[test]
    fn test_options_defaults() {
        let options: CompilerOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, CompilerOptions::default());
        assert_eq!(options.timeout(), Duration::from_secs(10));

        let options: CompilerOptions =
            serde_json::from_str(r#"{"sassPath": "/opt/sass", "timeoutMs": 250}"#).unwrap();
        assert_eq!(options.resolve_sass_path(), PathBuf::from("/opt/sass"));
        assert_eq!(options.timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_timeout_marks_session_dead() {
        // Nothing ever answers this mailbox, like a session stuck inside Sass.
        let (mailbox_tx, mailbox_rx) = mpsc::channel();
        let compiler =
            StyleCompiler::with_session(mailbox_tx, None, Duration::from_millis(20));
        assert!(compiler.is_running());

        let err = compiler.compile(".a{b:c}", &[]).unwrap_err();
        assert!(matches!(
            err,
            StyleError::Compile(CompileError::Timeout { .. })
        ));
        assert!(!compiler.is_running());

        let err = compiler.compile(".a{b:c}", &[]).unwrap_err();
        assert!(matches!(
            err,
            StyleError::Compile(CompileError::NotInitialized)
        ));

        // Only the first request reached the dead session.
        assert_eq!(mailbox_rx.try_iter().count(), 1);
    }

    #[test]
    fn test_init_with_missing_binary_is_init_error() {
        let options = CompilerOptions {
            sass_path: Some(PathBuf::from("/nonexistent/sass-embedded-binary")),
            timeout_ms: 5_000,
        };
        let err = StyleCompiler::init(&options).unwrap_err();
        assert!(matches!(err, StyleError::Init { .. }), "{err}");
    }
}

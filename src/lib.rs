//! # Page Style Engine
//!
//! Components declare SCSS/CSS snippets next to their markup; the engine hands
//! back a class name for each and collects one stylesheet per rendered page.
//!
//! ## Naming Invariants
//!
//! 1. **Content Addressed**: a class name is the base-52 XXH64 of the snippet's
//!    exact bytes. No whitespace normalization: `color:red` and `color: red`
//!    are two styles.
//! 2. **One Entry Per Snippet**: registering the same snippet twice in a scope
//!    returns the same class and records it once.
//! 3. **Scope Owned**: every render gets its own registry from
//!    [`StyleContext::begin_scope`]; renders never see each other's styles.
//! 4. **Words Optional**: with a vocabulary, hashes are swapped for words that
//!    are stable per hash and unique across the whole context.
//! 5. **Stylesheet Order**: [`RenderScope::flush`] emits `.class{snippet}` in
//!    first-registration order.
//!
//! ## Degradation
//!
//! Styling is best-effort: registration failures log and yield an empty class.
//! Compilation failures are returned to the caller.
//!
//! ```
//! use pagestyle_native::{scss, page_styles, StyleContext};
//!
//! let scope = StyleContext::new().begin_scope_named("/");
//! let html = scope.enter(|| {
//!     let class = scss("display: flex; gap: 8px;");
//!     format!("<div class=\"{class}\"></div>")
//! });
//! let styles = scope.flush();
//! assert!(styles.starts_with('.'));
//! assert!(html.contains(&styles[1..styles.find('{').unwrap()]));
//! assert_eq!(page_styles(), "");
//! ```

mod cache;
mod compile;
mod config;
mod discovery;
mod error;
mod hash;
mod registry;
mod scope;
mod words;

#[cfg(feature = "napi")]
mod bindings;


pub use cache::CompileCache;
pub use compile::{
    CompilerOptions, ImportSyntax, SassImport, StyleCompiler, EMBED_SCHEME, SASS_PATH_ENV,
};
pub use config::{EngineConfig, WordsConfig};
pub use discovery::discover_imports;
pub use error::{CompileError, Result, StyleError};
pub use hash::{encode_base52, hash_bytes, hash_str};
pub use registry::{StyleEntry, StyleRegistry};
pub use scope::{page_styles, scss, try_page_styles, try_scss, RenderScope, StyleContext};
pub use words::{normalize_word, WordAssigner, WordVocabulary};

#[cfg(feature = "napi")]
pub use bindings::{
    compile_scss_native, hash_snippet_native, init_compiler_native, normalize_words_native,
    page_styles_native, shutdown_compiler_native,
};

//! Render-Scope Carrier
//!
//! A [`StyleContext`] is configured once per site (optionally with a shared
//! [`WordAssigner`]) and hands out one [`RenderScope`] per page render. Each
//! scope owns its own [`StyleRegistry`]; scopes never share one.
//!
//! Components either receive `&RenderScope` and call [`RenderScope::register`],
//! or run inside [`RenderScope::enter`] and call the free [`scss`] function,
//! which finds the innermost entered scope on the current thread.

use rayon::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use crate::error::{Result, StyleError};
use crate::registry::StyleRegistry;
use crate::words::{WordAssigner, WordVocabulary};

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Carrier hierarchy configuration shared by every render.
#[derive(Debug, Clone, Default)]
pub struct StyleContext {
    words: Option<Arc<WordAssigner>>,
}

impl StyleContext {
    /// Scopes from this context name classes with raw hashes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scopes from this context name classes with words from `vocabulary`.
    pub fn with_words(vocabulary: WordVocabulary) -> Self {
        Self::with_assigner(Arc::new(WordAssigner::new(vocabulary)))
    }

    pub fn with_assigner(assigner: Arc<WordAssigner>) -> Self {
        Self {
            words: Some(assigner),
        }
    }

    pub fn words(&self) -> Option<&Arc<WordAssigner>> {
        self.words.as_ref()
    }

    pub fn begin_scope(&self) -> RenderScope {
        RenderScope::new(None, 0, self.words.clone())
    }

    /// Like [`begin_scope`](Self::begin_scope), with a label (usually the
    /// request path) attached to log output.
    pub fn begin_scope_named(&self, label: impl Into<String>) -> RenderScope {
        RenderScope::new(Some(label.into()), 0, self.words.clone())
    }

    /// Render a batch of pages in parallel, each in its own entered scope.
    /// Returns `(output, stylesheet)` per page, in input order.
    pub fn render_many<P, T, F>(&self, pages: Vec<P>, render: F) -> Vec<(T, String)>
    where
        P: Send,
        T: Send,
        F: Fn(&RenderScope, P) -> T + Sync,
    {
        pages
            .into_par_iter()
            .map(|page| {
                let scope = self.begin_scope();
                let output = scope.enter(|| render(&scope, page));
                let styles = scope.flush();
                (output, styles)
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct ScopeState {
    label: Option<String>,
    depth: usize,
    words: Option<Arc<WordAssigner>>,
    registry: RefCell<StyleRegistry>,
}

/// One render's style accumulator. Not `Send`: a render stays on its thread.
#[derive(Debug)]
pub struct RenderScope {
    state: Rc<ScopeState>,
}

impl RenderScope {
    fn new(label: Option<String>, depth: usize, words: Option<Arc<WordAssigner>>) -> Self {
        Self {
            state: Rc::new(ScopeState {
                label,
                depth,
                words,
                registry: RefCell::new(StyleRegistry::new()),
            }),
        }
    }

    /// New scope that inherits this scope's label and word configuration but
    /// starts with an empty registry.
    pub fn child(&self) -> RenderScope {
        RenderScope::new(
            self.state.label.clone(),
            self.state.depth + 1,
            self.state.words.clone(),
        )
    }

    pub fn label(&self) -> Option<&str> {
        self.state.label.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.state.depth
    }

    /// Register a snippet, logging and returning an empty class on failure so
    /// the page still renders.
    pub fn register(&self, snippet: &str) -> String {
        register_tolerant(&self.state, snippet)
    }

    pub fn try_register(&self, snippet: &str) -> Result<String> {
        self.state.register(snippet)
    }

    /// Register each snippet and join the non-empty classes with a space,
    /// ready for a `class` attribute.
    pub fn classes(&self, snippets: &[&str]) -> String {
        let mut classes = Vec::with_capacity(snippets.len());
        for snippet in snippets {
            let class = self.register(snippet);
            if !class.is_empty() {
                classes.push(class);
            }
        }
        classes.join(" ")
    }

    pub fn flush(&self) -> String {
        self.state.registry.borrow().flush()
    }

    pub fn len(&self) -> usize {
        self.state.registry.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.registry.borrow().is_empty()
    }

    /// Make this scope the ambient one for the duration of `f`.
    /// Entering nests; the innermost scope wins.
    pub fn enter<R>(&self, f: impl FnOnce() -> R) -> R {
        let _span = tracing::debug_span!(
            "render_scope",
            scope = self.label().unwrap_or(""),
            depth = self.depth()
        )
        .entered();

        ACTIVE.with(|active| active.borrow_mut().push(Rc::clone(&self.state)));
        let _guard = EnterGuard;
        f()
    }
}

impl ScopeState {
    fn register(&self, snippet: &str) -> Result<String> {
        self.registry
            .borrow_mut()
            .register(snippet, self.words.as_deref())
    }
}

fn register_tolerant(state: &ScopeState, snippet: &str) -> String {
    match state.register(snippet) {
        Ok(class) => class,
        Err(err) => {
            tracing::error!(
                scope = state.label.as_deref().unwrap_or(""),
                error = %err,
                "failed to register style"
            );
            String::new()
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// AMBIENT SCOPE
// ═══════════════════════════════════════════════════════════════════════════════

thread_local! {
    static ACTIVE: RefCell<Vec<Rc<ScopeState>>> = const { RefCell::new(Vec::new()) };
}

struct EnterGuard;

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let _ = ACTIVE.try_with(|active| active.borrow_mut().pop());
    }
}

fn active_scope() -> Result<Rc<ScopeState>> {
    ACTIVE
        .with(|active| active.borrow().last().cloned())
        .ok_or(StyleError::NoActiveScope)
}

/// Register a snippet with the ambient scope and return its class name.
/// Outside any scope this logs and returns an empty class.
pub fn scss(snippet: &str) -> String {
    if snippet.is_empty() {
        return String::new();
    }
    match active_scope() {
        Ok(state) => register_tolerant(&state, snippet),
        Err(err) => {
            tracing::error!(error = %err, "failed to get page styles from scope");
            String::new()
        }
    }
}

pub fn try_scss(snippet: &str) -> Result<String> {
    if snippet.is_empty() {
        return Ok(String::new());
    }
    active_scope()?.register(snippet)
}

/// Stylesheet source of the ambient scope. Outside any scope this logs and
/// returns an empty string.
pub fn page_styles() -> String {
    match try_page_styles() {
        Ok(source) => source,
        Err(err) => {
            tracing::error!(error = %err, "failed to get page styles from scope");
            String::new()
        }
    }
}

pub fn try_page_styles() -> Result<String> {
    Ok(active_scope()?.registry.borrow().flush())
}

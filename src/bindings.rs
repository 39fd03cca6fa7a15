//! Node bindings, built with the `napi` feature.
//!
//! Node callers have nowhere to keep a Rust handle between calls, so the
//! compiler session lives in a process-wide slot here. Rust callers should
//! construct and own a [`StyleCompiler`] instead.

use lazy_static::lazy_static;
use napi_derive::napi;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use crate::compile::{CompilerOptions, SassImport, StyleCompiler};
use crate::error::{CompileError, StyleError};
use crate::hash::hash_str;
use crate::scope::StyleContext;
use crate::words::WordVocabulary;

lazy_static! {
    static ref SESSION: Mutex<Option<Arc<StyleCompiler>>> = Mutex::new(None);
}

fn to_napi(err: StyleError) -> napi::Error {
    napi::Error::from_reason(err.to_string())
}

#[napi]
pub fn hash_snippet_native(snippet: String) -> String {
    hash_str(&snippet)
}

#[napi]
pub fn normalize_words_native(words: Vec<String>) -> Vec<String> {
    WordVocabulary::new(words, "").words().to_vec()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PageStyles {
    classes: Vec<String>,
    stylesheet: String,
}

/// Register `snippets` in a fresh scope; returns their classes and the
/// flushed stylesheet source.
#[napi]
pub fn page_styles_native(snippets: Vec<String>) -> napi::Result<serde_json::Value> {
    let scope = StyleContext::new().begin_scope();
    let classes = snippets
        .iter()
        .map(|snippet| scope.try_register(snippet))
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_napi)?;
    let page = PageStyles {
        classes,
        stylesheet: scope.flush(),
    };
    serde_json::to_value(page).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[napi]
pub fn init_compiler_native(options: Option<serde_json::Value>) -> napi::Result<()> {
    let options: CompilerOptions = match options {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| napi::Error::from_reason(e.to_string()))?
        }
        None => CompilerOptions::default(),
    };

    let mut session = SESSION.lock();
    if session.is_some() {
        return Ok(());
    }
    *session = Some(Arc::new(StyleCompiler::init(&options).map_err(to_napi)?));
    Ok(())
}

#[napi]
pub fn compile_scss_native(
    source: String,
    imports: Option<serde_json::Value>,
) -> napi::Result<String> {
    let imports: Vec<SassImport> = match imports {
        Some(value) => {
            serde_json::from_value(value).map_err(|e| napi::Error::from_reason(e.to_string()))?
        }
        None => Vec::new(),
    };

    let compiler = SESSION
        .lock()
        .clone()
        .ok_or_else(|| to_napi(CompileError::NotInitialized.into()))?;
    compiler.compile(&source, &imports).map_err(to_napi)
}

#[napi]
pub fn shutdown_compiler_native() {
    if let Some(compiler) = SESSION.lock().take() {
        compiler.shutdown();
    }
}

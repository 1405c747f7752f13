//! Configuration resolution
//!
//! Folds the chain collection root → folders → request into a
//! [`ResolvedRequest`]: merged headers, effective auth, the three variable
//! scopes and the concatenated scripts. The collection is only read; every
//! merge produces fresh values.

use indexmap::IndexMap;

use crate::collection::{
    Auth, Body, Collection, Folder, FolderRoot, KeyValue, Param, RequestItem, RequestSettings,
    ScriptFlow,
};
use crate::errors::{Result, RunnerError};

/// Fully merged, pre-interpolation view of a request
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub name: String,
    pub path: String,
    pub method: String,
    pub url: String,
    pub params: Vec<Param>,
    /// Enabled headers, outer scopes first, inner values win
    pub headers: IndexMap<String, String>,
    pub auth: Auth,
    pub body: Body,

    /// Pre-request variables of the collection root
    pub collection_vars: IndexMap<String, String>,
    /// Pre-request variables of all folders, innermost wins
    pub folder_vars: IndexMap<String, String>,
    /// Pre-request variables of the request itself
    pub request_vars: IndexMap<String, String>,
    /// Post-response assignments, outer scopes first, inner values win
    pub post_response_vars: IndexMap<String, String>,

    pub pre_request_script: String,
    pub post_response_script: String,
    pub tests: String,

    pub assertions: Vec<KeyValue>,
    pub timeout_ms: Option<u64>,
    pub settings: RequestSettings,
}

/// Resolve one request of the collection
pub fn resolve(collection: &Collection, item: &RequestItem) -> Result<ResolvedRequest> {
    let chain = collection
        .ancestors(&item.path)
        .ok_or_else(|| RunnerError::PathNotFound(item.path.clone()))?;

    if let Some(broken) = chain.iter().find(|f| f.error.is_some()) {
        return Err(RunnerError::Collection(format!(
            "{}: {}",
            broken.path,
            broken.error.as_deref().unwrap_or_default()
        )));
    }
    if let Some(error) = &item.error {
        return Err(RunnerError::Collection(format!("{}: {}", item.path, error)));
    }

    let root = &collection.root;
    let folder_roots: Vec<&FolderRoot> = chain.iter().filter_map(|f| f.root.as_ref()).collect();
    let request = &item.request;

    Ok(ResolvedRequest {
        name: item.name.clone(),
        path: item.path.clone(),
        method: request.method.to_uppercase(),
        url: request.url.clone(),
        params: request.params.clone(),
        headers: merge_headers(root, &folder_roots, &request.headers),
        auth: merge_auth(root, &chain, &request.auth),
        body: request.body.clone(),
        collection_vars: enabled_map(&root.request.vars.req),
        folder_vars: folder_roots
            .iter()
            .fold(IndexMap::new(), |mut acc, folder| {
                acc.extend(enabled_map(&folder.request.vars.req));
                acc
            }),
        request_vars: enabled_map(&request.vars.req),
        post_response_vars: merge_post_response_vars(root, &folder_roots, &request.vars.res),
        pre_request_script: merge_scripts(
            &root.request.script.req,
            folder_roots.iter().map(|f| f.request.script.req.as_str()),
            &request.script.req,
            ScriptFlow::Sequential,
        ),
        post_response_script: merge_scripts(
            &root.request.script.res,
            folder_roots.iter().map(|f| f.request.script.res.as_str()),
            &request.script.res,
            collection.script_flow,
        ),
        tests: merge_scripts(
            &root.request.tests,
            folder_roots.iter().map(|f| f.request.tests.as_str()),
            &request.tests,
            collection.script_flow,
        ),
        assertions: request.assertions.clone(),
        timeout_ms: request.timeout_ms,
        settings: request.settings.clone(),
    })
}

fn enabled_map(pairs: &[KeyValue]) -> IndexMap<String, String> {
    pairs
        .iter()
        .filter(|kv| kv.enabled)
        .map(|kv| (kv.name.clone(), kv.value.clone()))
        .collect()
}

/// Outer → inner insertion into an order-preserving map: inner scopes
/// overwrite values, first-seen names keep their position
pub fn merge_headers(
    root: &FolderRoot,
    folders: &[&FolderRoot],
    request_headers: &[KeyValue],
) -> IndexMap<String, String> {
    let scopes = std::iter::once(root.request.headers.as_slice())
        .chain(folders.iter().map(|f| f.request.headers.as_slice()))
        .chain(std::iter::once(request_headers));

    scopes.fold(IndexMap::new(), |mut merged, headers| {
        merged.extend(
            headers
                .iter()
                .filter(|h| h.enabled)
                .map(|h| (h.name.clone(), h.value.clone())),
        );
        merged
    })
}

/// Collection auth is the default, the closest folder with a concrete mode
/// overrides it, and the request's own auth wins unless it is `inherit`
pub fn merge_auth(root: &FolderRoot, chain: &[&Folder], request_auth: &Auth) -> Auth {
    if !matches!(request_auth, Auth::Inherit) {
        return request_auth.clone();
    }

    let collection_auth = root.request.auth.clone().unwrap_or(Auth::None);

    chain
        .iter()
        .filter_map(|folder| folder.root.as_ref()?.request.auth.as_ref())
        .fold(collection_auth, |effective, folder_auth| {
            if folder_auth.is_concrete() {
                folder_auth.clone()
            } else {
                effective
            }
        })
}

fn merge_post_response_vars(
    root: &FolderRoot,
    folders: &[&FolderRoot],
    request_vars: &[KeyValue],
) -> IndexMap<String, String> {
    let mut merged = enabled_map(&root.request.vars.res);
    for folder in folders {
        merged.extend(enabled_map(&folder.request.vars.res));
    }
    merged.extend(enabled_map(request_vars));
    merged
}

/// Wrap a script segment in its own async closure so segments cannot see
/// each other's declarations and an early `return` only leaves its own
/// segment
pub fn wrap_segment(script: &str) -> Option<String> {
    if script.trim().is_empty() {
        None
    } else {
        Some(format!("await (async () => {{\n{}\n}})();", script))
    }
}

/// Concatenate root, folder and leaf segments.
///
/// `Sequential` runs root → folders (outer first) → leaf. `Sandwich` runs
/// leaf → folders (inner first) → root. Pre-request scripts are always
/// merged with `Sequential`.
pub fn merge_scripts<'a>(
    root: &'a str,
    folders: impl DoubleEndedIterator<Item = &'a str>,
    leaf: &'a str,
    flow: ScriptFlow,
) -> String {
    let segments: Vec<&str> = match flow {
        ScriptFlow::Sequential => std::iter::once(root)
            .chain(folders)
            .chain(std::iter::once(leaf))
            .collect(),
        ScriptFlow::Sandwich => std::iter::once(leaf)
            .chain(folders.rev())
            .chain(std::iter::once(root))
            .collect(),
    };

    segments
        .into_iter()
        .filter_map(wrap_segment)
        .collect::<Vec<_>>()
        .join("\n\n")
}

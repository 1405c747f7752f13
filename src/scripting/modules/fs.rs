//! Filesystem access for developer-mode scripts
//!
//! Relative paths resolve against the collection directory. Failures
//! surface to scripts as `undefined` or `false` rather than exceptions.

use std::path::{Path, PathBuf};

use rquickjs::{Ctx, Function, Object};

use crate::errors::Result;

pub fn register(ctx: &Ctx<'_>, base_dir: PathBuf) -> Result<()> {
    let fs = Object::new(ctx.clone())?;

    let base = base_dir.clone();
    fs.set(
        "resolve",
        Function::new(ctx.clone(), move |path: String| -> String {
            resolve(&base, &path).to_string_lossy().into_owned()
        })?,
    )?;

    let base = base_dir.clone();
    fs.set(
        "resolveModule",
        Function::new(ctx.clone(), move |path: String| -> Option<String> {
            resolve_module(&base, &path).map(|p| p.to_string_lossy().into_owned())
        })?,
    )?;

    let base = base_dir.clone();
    fs.set(
        "readFile",
        Function::new(ctx.clone(), move |path: String| -> Option<String> {
            std::fs::read_to_string(resolve(&base, &path)).ok()
        })?,
    )?;

    let base = base_dir.clone();
    fs.set(
        "writeFile",
        Function::new(ctx.clone(), move |path: String, content: String| -> bool {
            std::fs::write(resolve(&base, &path), content).is_ok()
        })?,
    )?;

    let base = base_dir.clone();
    fs.set(
        "exists",
        Function::new(ctx.clone(), move |path: String| -> bool {
            resolve(&base, &path).exists()
        })?,
    )?;

    let base = base_dir.clone();
    fs.set(
        "isFile",
        Function::new(ctx.clone(), move |path: String| -> bool {
            resolve(&base, &path).is_file()
        })?,
    )?;

    let base = base_dir.clone();
    fs.set(
        "isDir",
        Function::new(ctx.clone(), move |path: String| -> bool {
            resolve(&base, &path).is_dir()
        })?,
    )?;

    let base = base_dir;
    fs.set(
        "list",
        Function::new(ctx.clone(), move |path: String| -> Vec<String> {
            list(&resolve(&base, &path))
        })?,
    )?;

    fs.set("basename", Function::new(ctx.clone(), basename)?)?;
    fs.set("dirname", Function::new(ctx.clone(), dirname)?)?;
    fs.set("extension", Function::new(ctx.clone(), extension)?)?;
    fs.set("join", Function::new(ctx.clone(), join)?)?;

    ctx.globals().set("__fs", fs)?;
    Ok(())
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let candidate = Path::new(path);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        base.join(candidate)
    }
}

/// Locate a module file, trying the path as given and then with `.js`
fn resolve_module(base: &Path, path: &str) -> Option<PathBuf> {
    let direct = resolve(base, path);
    if direct.is_file() {
        return Some(direct);
    }
    let with_ext = resolve(base, &format!("{}.js", path));
    with_ext.is_file().then_some(with_ext)
}

fn list(dir: &Path) -> Vec<String> {
    let mut entries: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter_map(|e| e.file_name().into_string().ok())
                .collect()
        })
        .unwrap_or_default();
    entries.sort();
    entries
}

fn basename(path: String) -> Option<String> {
    Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .map(String::from)
}

fn dirname(path: String) -> Option<String> {
    Path::new(&path)
        .parent()
        .and_then(|p| p.to_str())
        .map(String::from)
}

fn extension(path: String) -> Option<String> {
    Path::new(&path)
        .extension()
        .and_then(|e| e.to_str())
        .map(String::from)
}

fn join(base: String, path: String) -> String {
    Path::new(&base).join(&path).to_string_lossy().into_owned()
}

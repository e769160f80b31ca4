//! Variable preprocessor for Less and Scss sources.
//!
//! Supported subset: same-dialect `@import` inlining, `//` comments, variable
//! declarations (`@name: value;` / `$name: value [!default];`), references,
//! interpolation (`@{name}` / `#{$name}`) and Less escapes (`~"..."`).
//! Theme overrides replace any declared value. Mixins, functions and
//! operations are left in place for the CSS parser to accept or reject.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use kiln_config::StyleDialect;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

const MAX_DEPTH: usize = 32;

static LESS_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"@import\s*(?:\([^)]*\)\s*)?(["'])([^"']+)["']\s*;"#).expect("valid regex")
});
static SCSS_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"@import\s+(["'])([^"']+)["']\s*;"#).expect("valid regex"));
static LESS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@([A-Za-z_][\w-]*)\s*:\s*([^;{}]*?)\s*;").expect("valid regex")
});
static SCSS_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][\w-]*)\s*:\s*([^;{}]*?)\s*(!default)?\s*(?:!global)?\s*;")
        .expect("valid regex")
});

/// Preprocessed stylesheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preprocessed {
    pub css: String,
    /// Every file inlined through `@import`, in inclusion order
    pub included: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PreprocessError {
    pub message: String,
    /// File the problem was found in
    pub file: PathBuf,
}

struct Context<'a> {
    dialect: StyleDialect,
    root: &'a Path,
    included: Vec<PathBuf>,
    seen: FxHashSet<PathBuf>,
}

/// Compile a Less or Scss source to plain CSS.
///
/// `overrides` keys may carry the `@`/`$` sigil or not.
pub fn preprocess(
    source: &str,
    path: &Path,
    dialect: StyleDialect,
    overrides: &BTreeMap<String, String>,
    root: &Path,
) -> Result<Preprocessed, PreprocessError> {
    if dialect == StyleDialect::Css {
        return Ok(Preprocessed {
            css: source.to_string(),
            included: Vec::new(),
        });
    }

    let mut ctx = Context {
        dialect,
        root,
        included: Vec::new(),
        seen: FxHashSet::default(),
    };
    ctx.seen.insert(path.to_path_buf());
    let inlined = inline_imports(&strip_comments(source), path, &mut ctx, 0)?;

    let (body, declared) = collect_declarations(&inlined, dialect);
    let mut vars: FxHashMap<String, String> = declared;
    for (name, value) in overrides {
        let name = name.trim_start_matches(['@', '$']);
        vars.insert(name.to_string(), value.clone());
    }

    let css = substitute(&body, &vars, dialect, 0).map_err(|message| PreprocessError {
        message,
        file: path.to_path_buf(),
    })?;

    Ok(Preprocessed {
        css,
        included: ctx.included,
    })
}

/// Remove `//` and `/* */` comments outside strings and unquoted `url()`.
/// `/*! ... */` comments are kept.
pub fn strip_comments(src: &str) -> String {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                let end = string_end(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            '/' if chars.get(i + 1) == Some(&'/') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                let keep = chars.get(i + 2) == Some(&'!');
                let start = i;
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
                if keep {
                    out.extend(&chars[start..i]);
                }
            }
            'u' | 'U' if is_unquoted_url(&chars, i) => {
                while i < chars.len() && chars[i] != ')' {
                    out.push(chars[i]);
                    i += 1;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

/// Index just past the string starting at `start`.
fn string_end(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            '\n' => return i,
            _ => i += 1,
        }
    }
    chars.len()
}

fn is_unquoted_url(chars: &[char], i: usize) -> bool {
    let word: String = chars.iter().skip(i).take(4).collect();
    if !word.eq_ignore_ascii_case("url(") {
        return false;
    }
    if i > 0 && (chars[i - 1].is_alphanumeric() || chars[i - 1] == '-') {
        return false;
    }
    let next = chars[i + 4..].iter().find(|c| !c.is_whitespace());
    !matches!(next, Some('"' | '\''))
}

fn inline_imports(
    src: &str,
    path: &Path,
    ctx: &mut Context<'_>,
    depth: usize,
) -> Result<String, PreprocessError> {
    if depth > MAX_DEPTH {
        return Err(PreprocessError {
            message: "@import nesting is too deep".to_string(),
            file: path.to_path_buf(),
        });
    }
    let pattern = match ctx.dialect {
        StyleDialect::Scss => &*SCSS_IMPORT,
        _ => &*LESS_IMPORT,
    };

    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for caps in pattern.captures_iter(src) {
        let (Some(whole), Some(request)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        let request = request.as_str();
        if is_css_import(request) {
            continue;
        }
        out.push_str(&src[last..whole.start()]);
        last = whole.end();

        let target = resolve_import(request, path, ctx).ok_or_else(|| PreprocessError {
            message: format!("Can't resolve '@import \"{request}\"'"),
            file: path.to_path_buf(),
        })?;
        if !ctx.seen.insert(target.clone()) {
            continue;
        }
        let content = fs::read_to_string(&target).map_err(|e| PreprocessError {
            message: format!("Failed to read {}: {e}", target.display()),
            file: path.to_path_buf(),
        })?;
        ctx.included.push(target.clone());
        let nested = inline_imports(&strip_comments(&content), &target, ctx, depth + 1)?;
        out.push_str(&nested);
        out.push('\n');
    }
    out.push_str(&src[last..]);
    Ok(out)
}

/// Imports the CSS parser keeps (`.css` files and remote sheets).
fn is_css_import(request: &str) -> bool {
    request.ends_with(".css")
        || request.starts_with("http:")
        || request.starts_with("https:")
        || request.starts_with("//")
}

fn resolve_import(request: &str, importer: &Path, ctx: &Context<'_>) -> Option<PathBuf> {
    let base = match request.strip_prefix('~') {
        Some(package) => ctx.root.join("node_modules").join(package),
        None => importer.parent()?.join(request),
    };
    let ext = match ctx.dialect {
        StyleDialect::Scss => "scss",
        _ => "less",
    };

    let mut candidates = vec![base.clone(), base.with_extension(ext)];
    if base.extension().is_some_and(|e| e != ext) {
        candidates.pop();
        candidates.push(PathBuf::from(format!("{}.{ext}", base.display())));
    }
    if ctx.dialect == StyleDialect::Scss {
        if let (Some(dir), Some(name)) = (base.parent(), base.file_name()) {
            let partial = dir.join(format!("_{}", name.to_string_lossy()));
            candidates.push(partial.with_extension(ext));
            candidates.push(partial);
        }
    }
    candidates.into_iter().find(|p| p.is_file())
}

/// Split declarations out of `src`. Returns the remaining body and the
/// declared values (last wins for Less, first `!default` loses for Scss).
fn collect_declarations(src: &str, dialect: StyleDialect) -> (String, FxHashMap<String, String>) {
    let pattern = match dialect {
        StyleDialect::Scss => &*SCSS_DECL,
        _ => &*LESS_DECL,
    };

    let mut vars = FxHashMap::default();
    let mut body = String::with_capacity(src.len());
    let mut last = 0;
    for caps in pattern.captures_iter(src) {
        let (Some(whole), Some(name), Some(value)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            continue;
        };
        if !at_statement_start(&src[..whole.start()]) {
            continue;
        }
        let is_default = caps.get(3).is_some();
        if !(is_default && vars.contains_key(name.as_str())) {
            vars.insert(name.as_str().to_string(), value.as_str().trim().to_string());
        }
        body.push_str(&src[last..whole.start()]);
        last = whole.end();
    }
    body.push_str(&src[last..]);
    (body, vars)
}

fn at_statement_start(before: &str) -> bool {
    matches!(
        before.trim_end().chars().last(),
        None | Some(';' | '{' | '}')
    )
}

fn lookup(
    name: &str,
    vars: &FxHashMap<String, String>,
    dialect: StyleDialect,
    depth: usize,
) -> Result<String, String> {
    let sigil = if dialect == StyleDialect::Scss { '$' } else { '@' };
    if depth > MAX_DEPTH {
        return Err(format!("Recursive variable definition for {sigil}{name}"));
    }
    match vars.get(name) {
        Some(value) => substitute(value, vars, dialect, depth + 1),
        None => Err(format!("Undefined variable {sigil}{name}")),
    }
}

fn ident_end(chars: &[char], start: usize) -> usize {
    let mut i = start;
    while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '-' || chars[i] == '_') {
        i += 1;
    }
    i
}

fn unquote(value: &str) -> &str {
    let v = value.trim();
    if v.len() >= 2
        && ((v.starts_with('"') && v.ends_with('"')) || (v.starts_with('\'') && v.ends_with('\'')))
    {
        &v[1..v.len() - 1]
    } else {
        v
    }
}

/// Replace variable references and interpolations in `src`.
fn substitute(
    src: &str,
    vars: &FxHashMap<String, String>,
    dialect: StyleDialect,
    depth: usize,
) -> Result<String, String> {
    let chars: Vec<char> = src.chars().collect();
    let mut out = String::with_capacity(src.len());
    let mut i = 0;
    let mut quote: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];

        // interpolation works inside and outside strings
        if dialect == StyleDialect::Less && c == '@' && chars.get(i + 1) == Some(&'{') {
            if let Some(close) = chars[i..].iter().position(|&ch| ch == '}') {
                let name: String = chars[i + 2..i + close].iter().collect();
                out.push_str(unquote(&lookup(name.trim(), vars, dialect, depth)?));
                i += close + 1;
                continue;
            }
        }
        if dialect == StyleDialect::Scss && c == '#' && chars.get(i + 1) == Some(&'{') {
            if let Some(close) = chars[i..].iter().position(|&ch| ch == '}') {
                let inner: String = chars[i + 2..i + close].iter().collect();
                let inner = inner.trim();
                match inner.strip_prefix('$') {
                    Some(name) => out.push_str(unquote(&lookup(name, vars, dialect, depth)?)),
                    None => out.push_str(unquote(inner)),
                }
                i += close + 1;
                continue;
            }
        }

        if let Some(q) = quote {
            out.push(c);
            if c == '\\' {
                if let Some(next) = chars.get(i + 1) {
                    out.push(*next);
                    i += 1;
                }
            } else if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '"' | '\'' => {
                quote = Some(c);
                out.push(c);
                i += 1;
            }
            '~' if dialect == StyleDialect::Less && matches!(chars.get(i + 1), Some('"' | '\'')) => {
                let end = string_end(&chars, i + 1);
                let inner: String = chars[i + 2..end.saturating_sub(1).max(i + 2)].iter().collect();
                out.push_str(&substitute(&inner, vars, dialect, depth)?);
                i = end;
            }
            '@' if dialect == StyleDialect::Less => {
                let end = ident_end(&chars, i + 1);
                let name: String = chars[i + 1..end].iter().collect();
                if name.is_empty() || (!vars.contains_key(&name) && at_statement_start(&out)) {
                    // at-rule such as @media or @font-face
                    out.push(c);
                    i += 1;
                } else {
                    out.push_str(&lookup(&name, vars, dialect, depth)?);
                    i = end;
                }
            }
            '$' if dialect == StyleDialect::Scss => {
                let end = ident_end(&chars, i + 1);
                let name: String = chars[i + 1..end].iter().collect();
                if name.is_empty() {
                    out.push(c);
                    i += 1;
                } else {
                    out.push_str(&lookup(&name, vars, dialect, depth)?);
                    i = end;
                }
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    Ok(out)
}

//! Transformation rule dispatch.
//!
//! A [`RuleSet`] is an ordered list of predicate/category pairs. Rules are
//! evaluated in order and the first match wins, so a file is claimed by
//! exactly one handler. The default order is:
//!
//! 1. images (`bmp`, `gif`, `jpg`, `jpeg`, `png`, `svg`)
//! 2. scripts (`js`, `jsx`, `mjs`, `ts`, `tsx`)
//! 3. styles, per the configured extension table
//! 4. JSON
//! 5. any other file except `html`, emitted as a media file

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use kiln_config::{StyleConfig, StyleDialect};

pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpg", "jpeg", "png", "svg"];
pub const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "mjs", "ts", "tsx"];
/// Never treated as plain files, neither imported nor copied.
pub const FILE_EXCLUDED_EXTENSIONS: &[&str] = &["js", "mjs", "html", "json"];

/// Handler category a file is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Image,
    Script,
    Style(StyleDialect),
    Json,
    File,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Image => f.write_str("image"),
            Category::Script => f.write_str("script"),
            Category::Style(dialect) => write!(f, "style ({dialect})"),
            Category::Json => f.write_str("json"),
            Category::File => f.write_str("file"),
        }
    }
}

type Predicate = Arc<dyn Fn(&Path) -> Option<Category> + Send + Sync>;

/// One named entry of a [`RuleSet`].
#[derive(Clone)]
pub struct Rule {
    name: &'static str,
    predicate: Predicate,
}

impl Rule {
    pub fn new(
        name: &'static str,
        predicate: impl Fn(&Path) -> Option<Category> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            predicate: Arc::new(predicate),
        }
    }

    /// Rule claiming files whose extension is in `extensions`.
    pub fn extensions(name: &'static str, extensions: &'static [&'static str], category: Category) -> Self {
        Self::new(name, move |path| {
            extension_of(path)
                .filter(|ext| extensions.contains(&ext.as_str()))
                .map(|_| category)
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn matches(&self, path: &Path) -> Option<Category> {
        (self.predicate)(path)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule").field("name", &self.name).finish()
    }
}

/// Ordered rules; first match wins.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// The default rule order with the style table taken from config.
    pub fn from_config(styles: &StyleConfig) -> Self {
        let styles = styles.clone();
        Self::new(vec![
            Rule::extensions("images", IMAGE_EXTENSIONS, Category::Image),
            Rule::extensions("scripts", SCRIPT_EXTENSIONS, Category::Script),
            Rule::new("styles", move |path| {
                extension_of(path)
                    .and_then(|ext| styles.dialect_for(&ext))
                    .map(Category::Style)
            }),
            Rule::extensions("json", &["json"], Category::Json),
            Rule::new("files", |path| match extension_of(path).as_deref() {
                Some(ext) if FILE_EXCLUDED_EXTENSIONS.contains(&ext) => None,
                _ => Some(Category::File),
            }),
        ])
    }

    /// Category of the first rule claiming `path`.
    pub fn classify(&self, path: &Path) -> Option<Category> {
        self.rules.iter().find_map(|rule| rule.matches(path))
    }

    /// Name of the first rule claiming `path`.
    pub fn rule_for(&self, path: &Path) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matches(path).is_some())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }
}

impl Default for RuleSet {
    fn default() -> Self {
        Self::from_config(&StyleConfig::default())
    }
}

pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

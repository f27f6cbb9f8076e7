use anyhow::{Context, Result};
use hourglass_storage::{AppCategory, CategoryRecord};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Category for every app no rule matches
pub const DEFAULT_CATEGORY: &str = "Other";

/// Color given to categories that do not declare one
pub const DEFAULT_COLOR: &str = "#9CA3AF";

/// Classification result with metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification<'a> {
    pub category: &'a str,
    pub pattern: Option<&'a str>,
    pub source: ClassificationSource,
}

/// Which step of the resolution order produced the category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationSource {
    /// The lowercased app name is itself a pattern
    Exact,
    /// A pattern occurs inside the lowercased app name
    Substring,
    /// No match, using default
    Default,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    categories: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CategoryDef {
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    apps: Vec<String>,
}

/// Immutable view of the category rules, built once per pipeline run.
///
/// Priority: exact app name > first contained pattern in rule file order >
/// `Other`.
#[derive(Debug, Clone)]
pub struct CategorySnapshot {
    categories: Vec<CategoryRecord>,
    exact: HashMap<String, String>,
    substrings: Vec<(String, String)>,
}

impl Default for CategorySnapshot {
    fn default() -> Self {
        Self::from_categories(Vec::new(), &[])
    }
}

impl CategorySnapshot {
    /// Snapshot with no patterns; everything is `Other`
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a rule file body
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON or any category entry is malformed
    pub fn from_json_str(content: &str) -> Result<Self> {
        let file: RuleFile = serde_json::from_str(content).context("Invalid category rule JSON")?;

        let mut categories = Vec::with_capacity(file.categories.len());
        let mut patterns = Vec::new();
        for (name, value) in file.categories {
            let def: CategoryDef = serde_json::from_value(value)
                .with_context(|| format!("Invalid definition for category '{name}'"))?;
            for app in def.apps {
                patterns.push((app, name.clone()));
            }
            categories.push(CategoryRecord {
                name,
                color: def.color.unwrap_or_else(|| String::from(DEFAULT_COLOR)),
                description: def.description.unwrap_or_default(),
            });
        }

        Ok(Self::from_categories(categories, &patterns))
    }

    /// Build from categories and `(pattern, category)` pairs in declaration order
    #[must_use]
    pub fn from_categories(mut categories: Vec<CategoryRecord>, patterns: &[(String, String)]) -> Self {
        if !categories.iter().any(|c| c.name == DEFAULT_CATEGORY) {
            categories.push(CategoryRecord {
                name: String::from(DEFAULT_CATEGORY),
                color: String::from(DEFAULT_COLOR),
                description: String::from("Uncategorized applications"),
            });
        }

        let mut exact: HashMap<String, String> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for (pattern, category) in patterns {
            let key = pattern.trim().to_lowercase();
            if key.is_empty() {
                log::warn!("Ignoring empty app pattern in category '{category}'");
                continue;
            }
            match exact.insert(key.clone(), category.clone()) {
                None => order.push(key),
                Some(previous) if previous != *category => {
                    log::debug!("Pattern '{key}' moved from '{previous}' to '{category}'");
                }
                Some(_) => {}
            }
        }

        // A redeclared pattern keeps its first position but takes the later category
        let substrings: Vec<(String, String)> = order
            .into_iter()
            .map(|key| {
                let category = exact[&key].clone();
                (key, category)
            })
            .collect();

        Self {
            categories,
            exact,
            substrings,
        }
    }

    /// Classify an application name
    #[must_use]
    pub fn classify(&self, app_name: &str) -> &str {
        self.classify_full(app_name).category
    }

    /// Classify a possibly absent application name
    #[must_use]
    pub fn classify_optional(&self, app_name: Option<&str>) -> &str {
        app_name.map_or(DEFAULT_CATEGORY, |name| self.classify(name))
    }

    /// Classify with full result metadata
    #[must_use]
    pub fn classify_full(&self, app_name: &str) -> Classification<'_> {
        let default = Classification {
            category: DEFAULT_CATEGORY,
            pattern: None,
            source: ClassificationSource::Default,
        };
        if app_name.is_empty() {
            return default;
        }

        let lowered = app_name.to_lowercase();

        // 1. Exact pattern
        if let Some((pattern, category)) = self.exact.get_key_value(&lowered) {
            return Classification {
                category: category.as_str(),
                pattern: Some(pattern.as_str()),
                source: ClassificationSource::Exact,
            };
        }

        // 2. First contained pattern
        if let Some((pattern, category)) = self
            .substrings
            .iter()
            .find(|(pattern, _)| lowered.contains(pattern.as_str()))
        {
            return Classification {
                category: category.as_str(),
                pattern: Some(pattern.as_str()),
                source: ClassificationSource::Substring,
            };
        }

        // 3. Default category
        default
    }

    /// Declared categories, `Other` included
    #[must_use]
    pub fn categories(&self) -> &[CategoryRecord] {
        &self.categories
    }

    /// Flattened pattern map, sorted by pattern
    #[must_use]
    pub fn mappings(&self) -> Vec<AppCategory> {
        let mut mappings: Vec<AppCategory> = self
            .exact
            .iter()
            .map(|(app_name, category)| AppCategory {
                app_name: app_name.clone(),
                category: category.clone(),
            })
            .collect();
        mappings.sort_by(|a, b| a.app_name.cmp(&b.app_name));
        mappings
    }

    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.exact.len()
    }
}

/// Loads category snapshots from the rule file
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    path: PathBuf,
}

impl CategoryResolver {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current rule set.
    ///
    /// Never fails: a missing or malformed file yields an empty snapshot so
    /// that aggregation keeps running with every app in `Other`.
    #[must_use]
    pub fn load(&self) -> CategorySnapshot {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!("Categories file not found: {}", self.path.display());
                return CategorySnapshot::empty();
            }
            Err(e) => {
                log::error!("Error reading categories {}: {e}", self.path.display());
                return CategorySnapshot::empty();
            }
        };

        match CategorySnapshot::from_json_str(&content) {
            Ok(snapshot) => {
                log::info!(
                    "Loaded {} app mappings across {} categories",
                    snapshot.pattern_count(),
                    snapshot.categories().len()
                );
                snapshot
            }
            Err(e) => {
                log::error!("Error loading categories {}: {e:#}", self.path.display());
                CategorySnapshot::empty()
            }
        }
    }
}

#[cfg(test)]
mod tests;

/// Extension-based file categorization.
///
/// A [`CategoryMap`] is an ordered table of category names, each with a set of
/// lowercase extensions (leading dot included). Classification looks at the
/// file name only; content is never inspected.
///
/// # Examples
///
/// ```
/// use dirsort::category::CategoryMap;
///
/// let map = CategoryMap::default();
/// assert_eq!(map.classify("photo.JPG").map(|c| c.name()), Some("图片"));
/// assert_eq!(map.classify("notes.txt").map(|c| c.name()), Some("文档"));
/// assert!(map.classify("README").is_none());
/// ```
use crate::config::ConfigError;
use serde::Serialize;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Component, Path};

/// Built-in category table, in classification order.
const DEFAULT_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "图片",
        &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".webp"],
    ),
    (
        "文档",
        &[
            ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".txt",
        ],
    ),
    ("音频", &[".mp3", ".wav", ".aac", ".flac", ".ogg"]),
    ("视频", &[".mp4", ".avi", ".mov", ".mkv", ".flv"]),
    ("压缩包", &[".zip", ".rar", ".7z", ".tar", ".gz"]),
    (
        "程序",
        &[
            ".exe", ".msi", ".bat", ".sh", ".py", ".js", ".html", ".css",
        ],
    ),
];

/// A named bucket of extensions with a destination folder of the same name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    name: String,
    extensions: BTreeSet<String>,
}

impl Category {
    /// Creates a category, normalizing its extensions.
    ///
    /// Returns an error if `name` cannot be used as a single folder name.
    pub fn new<I, S>(name: &str, extensions: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        validate_name(name)?;
        let extensions = extensions
            .into_iter()
            .filter_map(|ext| normalize_extension(ext.as_ref()))
            .collect();

        Ok(Self {
            name: name.to_string(),
            extensions,
        })
    }

    /// The category name, which is also its folder name under the root.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The normalized extensions of this category, sorted.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.extensions.iter().map(String::as_str)
    }

    /// Returns true if `ext` (lowercase, with leading dot) belongs to this category.
    pub fn contains(&self, ext: &str) -> bool {
        self.extensions.contains(ext)
    }
}

/// Ordered mapping from category name to its extension set.
///
/// Extensions may overlap between categories; the category defined first wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryMap {
    categories: Vec<Category>,
}

impl CategoryMap {
    /// Builds a map from categories in classification order.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateCategory` if two categories share a name.
    pub fn new(categories: Vec<Category>) -> Result<Self, ConfigError> {
        for (i, category) in categories.iter().enumerate() {
            if categories[..i].iter().any(|c| c.name == category.name) {
                return Err(ConfigError::DuplicateCategory(category.name.clone()));
            }
        }
        Ok(Self { categories })
    }

    /// Categories in classification order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Looks up a category by name.
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Returns the first category whose extension set contains the extension
    /// of `file_name`, or `None` if the name has no extension or no match.
    ///
    /// # Examples
    ///
    /// ```
    /// use dirsort::category::CategoryMap;
    ///
    /// let map = CategoryMap::default();
    /// assert_eq!(map.classify("song.mp3").map(|c| c.name()), Some("音频"));
    /// assert!(map.classify(".bashrc").is_none());
    /// assert!(map.classify("data.xyz").is_none());
    /// ```
    pub fn classify(&self, file_name: impl AsRef<OsStr>) -> Option<&Category> {
        let (_, ext) = split_extension(file_name.as_ref());
        // Extensions that are not valid UTF-8 cannot match a configured one.
        let ext = format!(".{}", ext?.to_str()?.to_lowercase());
        self.categories.iter().find(|c| c.contains(&ext))
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        let categories = DEFAULT_CATEGORIES
            .iter()
            .map(|(name, exts)| Category {
                name: (*name).to_string(),
                extensions: exts.iter().map(|e| (*e).to_string()).collect(),
            })
            .collect();
        Self { categories }
    }
}

/// Splits a file name into its base and extension (extension without the dot).
///
/// Leading dots belong to the base, so `.bashrc` has no extension. A trailing
/// dot yields no extension. Names need not be valid UTF-8.
///
/// # Examples
///
/// ```
/// use dirsort::category::split_extension;
/// use std::ffi::OsStr;
///
/// assert_eq!(
///     split_extension(OsStr::new("archive.tar.gz")),
///     (OsStr::new("archive.tar"), Some(OsStr::new("gz")))
/// );
/// assert_eq!(split_extension(OsStr::new(".bashrc")), (OsStr::new(".bashrc"), None));
/// assert_eq!(split_extension(OsStr::new("Makefile")), (OsStr::new("Makefile"), None));
/// ```
pub fn split_extension(file_name: &OsStr) -> (&OsStr, Option<&OsStr>) {
    let bytes = file_name.as_encoded_bytes();
    let leading = bytes.iter().take_while(|&&b| b == b'.').count();
    let has_extension = bytes[leading..]
        .iter()
        .rposition(|&b| b == b'.')
        .is_some_and(|idx| leading + idx + 1 < bytes.len());
    if !has_extension {
        return (file_name, None);
    }

    // With at least one non-dot byte before the last dot and one after it,
    // `Path` splits at the same place.
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(base), Some(ext)) => (base, Some(ext)),
        _ => (file_name, None),
    }
}

fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().to_lowercase();
    match ext.as_str() {
        "" | "." => None,
        e if e.starts_with('.') => Some(ext),
        _ => Some(format!(".{}", ext)),
    }
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let mut components = Path::new(name).components();
    let single_normal = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none();

    if name.trim().is_empty() || !single_normal || name.contains(['/', '\\']) {
        return Err(ConfigError::InvalidCategoryName(name.to_string()));
    }
    Ok(())
}

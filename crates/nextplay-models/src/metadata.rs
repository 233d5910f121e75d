//! Post metadata: categories, visibility and the committed upload snapshot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::media::CoverImage;
use crate::validation::ValidationError;

/// Maximum title length, counted in characters.
pub const MAX_TITLE_CHARS: usize = 80;

/// Maximum number of distinct tags on a post.
pub const MAX_TAGS: usize = 5;

/// Post categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Sports,
    Dance,
    Art,
    Comedy,
    Stem,
    Gaming,
    Music,
    Fitness,
}

impl Category {
    pub const ALL: &'static [Category] = &[
        Category::Sports,
        Category::Dance,
        Category::Art,
        Category::Comedy,
        Category::Stem,
        Category::Gaming,
        Category::Music,
        Category::Fitness,
    ];

    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Sports => "sports",
            Category::Dance => "dance",
            Category::Art => "art",
            Category::Comedy => "comedy",
            Category::Stem => "stem",
            Category::Gaming => "gaming",
            Category::Music => "music",
            Category::Fitness => "fitness",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Sports => "Sports",
            Category::Dance => "Dance",
            Category::Art => "Art",
            Category::Comedy => "Comedy",
            Category::Stem => "STEM",
            Category::Gaming => "Gaming",
            Category::Music => "Music",
            Category::Fitness => "Fitness",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

/// Who can see the published post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata as typed by the user, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataDraft {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: Option<Category>,
    #[serde(default)]
    pub visibility: Visibility,
}

#[derive(Validate)]
struct NormalizedFields {
    #[validate(length(min = 1, max = 80))]
    title: String,
    #[validate(length(max = 5))]
    tags: Vec<String>,
}

impl MetadataDraft {
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Validate and freeze the draft into an upload snapshot.
    pub fn commit(
        &self,
        duration_seconds: f64,
        cover: Option<CoverImage>,
    ) -> Result<UploadMetadata, ValidationError> {
        let fields = NormalizedFields {
            title: self.title.trim().to_string(),
            tags: normalize_tags(&self.tags),
        };
        if let Err(errors) = fields.validate() {
            let failed = errors.field_errors();
            if failed.contains_key("title") {
                return Err(if fields.title.is_empty() {
                    ValidationError::MissingTitle
                } else {
                    ValidationError::TitleTooLong {
                        max: MAX_TITLE_CHARS,
                    }
                });
            }
            if failed.contains_key("tags") {
                return Err(ValidationError::TooManyTags { max: MAX_TAGS });
            }
        }

        let category = self.category.ok_or(ValidationError::MissingCategory)?;

        if !(duration_seconds.is_finite() && duration_seconds > 0.0) {
            return Err(ValidationError::InvalidDuration(duration_seconds));
        }

        Ok(UploadMetadata {
            title: fields.title,
            tags: fields.tags,
            category,
            visibility: self.visibility,
            duration_seconds,
            cover,
        })
    }
}

/// Trim, strip a leading `#`, drop empties, de-duplicate ignoring case.
pub fn normalize_tags(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|t| t.trim().trim_start_matches('#').trim().to_string())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

/// Immutable metadata snapshot taken when the user commits to upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    title: String,
    tags: Vec<String>,
    category: Category,
    visibility: Visibility,
    duration_seconds: f64,
    #[serde(skip)]
    cover: Option<CoverImage>,
}

impl UploadMetadata {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn cover(&self) -> Option<&CoverImage> {
        self.cover.as_ref()
    }

    pub fn has_cover(&self) -> bool {
        self.cover.is_some()
    }
}

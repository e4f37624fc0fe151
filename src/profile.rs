use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::background::BackgroundSpec;
use crate::error::{BannerError, ValidationErrors};
use crate::theme::{LayoutChoice, LayoutKind, Theme, Variant};

pub const MAX_STACK_SELECTIONS: usize = 5;

/// The form-state payload the layout resolver reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BannerProfile {
    pub name: String,
    pub field: String,
    pub twitter: String,
    pub github: String,
    pub background: Option<BackgroundSpec>,
    pub profile_picture: Option<String>,
    pub show_profile_picture: Option<bool>,
}

impl BannerProfile {
    /// `name` and `field` must be present before a banner may be generated.
    pub fn validate(&self) -> Result<(), BannerError> {
        let mut errors = ValidationErrors::default();
        if self.name.trim().is_empty() {
            errors.push("name", "is required");
        }
        if self.field.trim().is_empty() {
            errors.push("field", "is required");
        }
        errors.into_result()
    }

    /// Uppercased first letter of the name, empty for an empty name.
    pub fn initial(&self) -> String {
        self.name
            .trim()
            .chars()
            .next()
            .map(|ch| ch.to_uppercase().collect())
            .unwrap_or_default()
    }

    pub fn picture(&self) -> Option<&str> {
        self.profile_picture
            .as_deref()
            .map(str::trim)
            .filter(|picture| !picture.is_empty())
    }
}

/// Ordered, duplicate-free technology identifiers, capped at
/// [`MAX_STACK_SELECTIONS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StackSelection {
    ids: Vec<String>,
}

impl StackSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds each id in turn; duplicates and overflow are ignored.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut selection = Self::new();
        for id in ids {
            selection.add(id.as_ref());
        }
        selection
    }

    /// Returns whether the id was added. Adding a duplicate or adding to a full
    /// selection leaves it unchanged.
    pub fn add(&mut self, id: &str) -> bool {
        let id = id.trim();
        if id.is_empty() || self.contains(id) || self.is_full() {
            return false;
        }
        self.ids.push(id.to_owned());
        true
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id.trim());
        self.ids.len() != before
    }

    /// Deselects a selected id, otherwise tries to select it. Returns whether
    /// the id is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.remove(id) {
            false
        } else {
            self.add(id)
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= MAX_STACK_SELECTIONS
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProfileDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    field: String,
    #[serde(default)]
    twitter: String,
    #[serde(default)]
    github: String,
    #[serde(default)]
    background: Option<String>,
    #[serde(default)]
    profile_picture: Option<String>,
    #[serde(default)]
    show_profile_picture: Option<bool>,
    #[serde(default)]
    stack: Vec<String>,
    #[serde(default)]
    layout: Option<String>,
    #[serde(default)]
    theme: Option<String>,
    #[serde(default)]
    variant: Option<String>,
}

/// A profile document as saved by the form: profile, stack and the visual
/// choice it was last previewed with.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile {
    pub profile: BannerProfile,
    pub stack: StackSelection,
    pub choice: LayoutChoice,
}

/// Parses a profile document. Required-field validation is left to the
/// caller so an incomplete draft can still be previewed.
pub fn load_profile(path: &Path) -> Result<LoadedProfile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read profile {}", path.display()))?;
    parse_profile(&contents).map_err(|error| anyhow!("{}: {error:#}", path.display()))
}

pub fn parse_profile(contents: &str) -> Result<LoadedProfile> {
    let document: ProfileDocument = serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!("failed to parse profile yaml at {}: {}", location, error)
    })?;

    let background = document
        .background
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .and_then(explicit_background);

    let mut stack = StackSelection::new();
    for id in &document.stack {
        if !stack.add(id) {
            log::warn!(
                "ignoring stack entry '{}' (duplicate or over the limit of {})",
                id,
                MAX_STACK_SELECTIONS
            );
        }
    }

    let choice = LayoutChoice {
        variant: document
            .variant
            .as_deref()
            .map(Variant::from_keyword)
            .transpose()?
            .unwrap_or_default(),
        layout: document
            .layout
            .as_deref()
            .map(LayoutKind::from_keyword)
            .transpose()?
            .unwrap_or_default(),
        theme: document
            .theme
            .as_deref()
            .map(Theme::from_keyword)
            .transpose()?
            .unwrap_or_default(),
    };

    Ok(LoadedProfile {
        profile: BannerProfile {
            name: document.name,
            field: document.field,
            twitter: document.twitter,
            github: document.github,
            background,
            profile_picture: document.profile_picture,
            show_profile_picture: document.show_profile_picture,
        },
        stack,
        choice,
    })
}

/// Only the `default` keyword pins the built-in gradient; any other
/// unrecognised value is left unset so the theme's background applies.
fn explicit_background(raw: &str) -> Option<BackgroundSpec> {
    match BackgroundSpec::classify(raw) {
        BackgroundSpec::DefaultGradient if !raw.trim().eq_ignore_ascii_case("default") => {
            log::warn!("ignoring unrecognised background '{}'", raw.trim());
            None
        }
        spec => Some(spec),
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_profile, BannerProfile, StackSelection, MAX_STACK_SELECTIONS};
    use crate::background::BackgroundSpec;
    use crate::error::BannerError;
    use crate::layout::resolve_background;
    use crate::theme::{LayoutKind, Theme, Variant};

    #[test]
    fn adding_past_the_maximum_is_a_noop() {
        let mut selection = StackSelection::from_ids(["a", "b", "c", "d", "e"]);
        assert!(selection.is_full());
        let before = selection.clone();

        assert!(!selection.add("f"));
        assert_eq!(selection, before);

        assert!(selection.remove("c"));
        assert!(selection.add("f"));
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["a", "b", "d", "e", "f"]);
        assert_eq!(selection.len(), MAX_STACK_SELECTIONS);
    }

    #[test]
    fn toggle_selects_and_deselects() {
        let mut selection = StackSelection::new();
        assert!(selection.toggle("rust"));
        assert!(selection.contains("rust"));
        assert!(!selection.toggle("rust"));
        assert!(selection.is_empty());
    }

    #[test]
    fn duplicates_are_ignored() {
        let selection = StackSelection::from_ids(["go", "go", "rust"]);
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec!["go", "rust"]);
    }

    #[test]
    fn empty_name_fails_validation_on_name_only() {
        let profile = BannerProfile {
            name: String::new(),
            field: "Systems Engineer".to_owned(),
            ..BannerProfile::default()
        };
        match profile.validate() {
            Err(BannerError::Validation(errors)) => {
                assert!(errors.has_field("name"));
                assert!(!errors.has_field("field"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_only_fields_are_missing() {
        let profile = BannerProfile {
            name: "   ".to_owned(),
            field: "\t".to_owned(),
            ..BannerProfile::default()
        };
        let Err(BannerError::Validation(errors)) = profile.validate() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.errors.len(), 2);
    }

    #[test]
    fn initial_falls_back_to_empty() {
        let mut profile = BannerProfile::default();
        assert_eq!(profile.initial(), "");
        profile.name = "ada".to_owned();
        assert_eq!(profile.initial(), "A");
    }

    #[test]
    fn parses_a_full_document() {
        let loaded = parse_profile(
            r#"
name: Ada Lovelace
field: Systems Engineer
twitter: ada
github: adalovelace
background: "radial-gradient(circle, #ff0000, #0000ff)"
stack: [python, rust, python]
layout: centered
theme: neon
variant: mobile
"#,
        )
        .expect("profile should parse");

        assert_eq!(loaded.profile.name, "Ada Lovelace");
        assert!(matches!(
            loaded.profile.background,
            Some(BackgroundSpec::CssGradient { .. })
        ));
        assert_eq!(loaded.stack.iter().collect::<Vec<_>>(), vec!["python", "rust"]);
        assert_eq!(loaded.choice.layout, LayoutKind::Centered);
        assert_eq!(loaded.choice.theme, Theme::Neon);
        assert_eq!(loaded.choice.variant, Variant::Mobile);
    }

    #[test]
    fn blank_background_means_unset() {
        let loaded = parse_profile("name: A\nfield: B\nbackground: \"  \"\n").unwrap();
        assert_eq!(loaded.profile.background, None);
    }

    #[test]
    fn unrecognised_background_defers_to_the_theme() {
        let loaded = parse_profile("name: A\nfield: B\nbackground: blue\ntheme: neon\n").unwrap();
        assert_eq!(loaded.profile.background, None);
        assert_eq!(
            resolve_background(&loaded.profile, loaded.choice.theme),
            Theme::Neon.default_background().unwrap()
        );

        let pinned = parse_profile("name: A\nfield: B\nbackground: Default\ntheme: neon\n").unwrap();
        assert_eq!(pinned.profile.background, Some(BackgroundSpec::DefaultGradient));
        assert_eq!(
            resolve_background(&pinned.profile, pinned.choice.theme),
            BackgroundSpec::DefaultGradient
        );
    }

    #[test]
    fn parse_errors_carry_a_location() {
        let error = parse_profile("name: A\nunknown_key: 1\n").unwrap_err();
        assert!(error.to_string().contains("line"), "{error}");
    }
}

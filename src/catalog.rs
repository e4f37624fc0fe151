//! Technology catalog: identifier → display name + icon reference.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::color::Rgba;
use crate::profile::StackSelection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechCatalogEntry {
    pub id: String,
    pub name: String,
    /// Path relative to the icon directory, or an https URL.
    pub icon: String,
    pub accent: Rgba,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogDocument {
    entries: Vec<CatalogEntryDocument>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogEntryDocument {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    accent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechCatalog {
    entries: Vec<TechCatalogEntry>,
}

const BUILTIN: &[(&str, &str, Rgba)] = &[
    ("javascript", "JavaScript", Rgba::rgb(247, 223, 30)),
    ("typescript", "TypeScript", Rgba::rgb(49, 120, 198)),
    ("python", "Python", Rgba::rgb(55, 118, 171)),
    ("rust", "Rust", Rgba::rgb(222, 165, 132)),
    ("go", "Go", Rgba::rgb(0, 173, 216)),
    ("java", "Java", Rgba::rgb(237, 139, 0)),
    ("kotlin", "Kotlin", Rgba::rgb(127, 82, 255)),
    ("swift", "Swift", Rgba::rgb(240, 81, 56)),
    ("c", "C", Rgba::rgb(85, 85, 170)),
    ("cpp", "C++", Rgba::rgb(0, 89, 156)),
    ("csharp", "C#", Rgba::rgb(104, 33, 122)),
    ("php", "PHP", Rgba::rgb(119, 123, 180)),
    ("ruby", "Ruby", Rgba::rgb(204, 52, 45)),
    ("dart", "Dart", Rgba::rgb(1, 117, 194)),
    ("html", "HTML", Rgba::rgb(227, 79, 38)),
    ("css", "CSS", Rgba::rgb(21, 114, 182)),
    ("react", "React", Rgba::rgb(97, 218, 251)),
    ("vue", "Vue", Rgba::rgb(65, 184, 131)),
    ("angular", "Angular", Rgba::rgb(221, 0, 49)),
    ("svelte", "Svelte", Rgba::rgb(255, 62, 0)),
    ("nextjs", "Next.js", Rgba::rgb(0, 0, 0)),
    ("nodejs", "Node.js", Rgba::rgb(51, 153, 51)),
    ("tailwindcss", "Tailwind CSS", Rgba::rgb(56, 189, 248)),
    ("flutter", "Flutter", Rgba::rgb(2, 86, 155)),
    ("docker", "Docker", Rgba::rgb(36, 150, 237)),
    ("kubernetes", "Kubernetes", Rgba::rgb(50, 108, 229)),
    ("postgresql", "PostgreSQL", Rgba::rgb(51, 103, 145)),
    ("mongodb", "MongoDB", Rgba::rgb(71, 162, 72)),
    ("git", "Git", Rgba::rgb(240, 80, 50)),
    ("figma", "Figma", Rgba::rgb(242, 78, 30)),
];

impl TechCatalog {
    pub fn new(entries: Vec<TechCatalogEntry>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if entry.id.trim().is_empty() {
                bail!("catalog entry id cannot be empty");
            }
            if !seen.insert(entry.id.as_str()) {
                bail!("duplicate catalog entry '{}'", entry.id);
            }
        }
        Ok(Self { entries })
    }

    /// The catalog shipped with the binary. Icons are looked up as
    /// `<id>.png` in the configured icon directory.
    pub fn builtin() -> Self {
        let entries = BUILTIN
            .iter()
            .map(|&(id, name, accent)| TechCatalogEntry {
                id: id.to_owned(),
                name: name.to_owned(),
                icon: format!("{id}.png"),
                accent,
            })
            .collect();
        Self { entries }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        let document: CatalogDocument = serde_yaml::from_str(&contents)
            .map_err(|error| anyhow!("failed to parse catalog {}: {error}", path.display()))?;

        let entries = document
            .entries
            .into_iter()
            .map(|entry| {
                let accent = match entry.accent.as_deref() {
                    Some(raw) => Rgba::parse(raw).ok_or_else(|| {
                        anyhow!("catalog entry '{}' has invalid accent '{raw}'", entry.id)
                    })?,
                    None => Rgba::rgb(107, 114, 128),
                };
                Ok(TechCatalogEntry {
                    name: entry.name.unwrap_or_else(|| entry.id.clone()),
                    icon: entry.icon.unwrap_or_else(|| format!("{}.png", entry.id)),
                    id: entry.id,
                    accent,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(entries).with_context(|| format!("invalid catalog {}", path.display()))
    }

    pub fn get(&self, id: &str) -> Option<&TechCatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn entries(&self) -> &[TechCatalogEntry] {
        &self.entries
    }

    /// Case-insensitive substring match on id or display name, in catalog
    /// order. An empty term returns everything.
    pub fn search(&self, term: &str) -> Vec<&TechCatalogEntry> {
        let needle = term.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|entry| {
                needle.is_empty()
                    || entry.id.to_lowercase().contains(&needle)
                    || entry.name.to_lowercase().contains(&needle)
            })
            .collect()
    }

    /// The subsequence of the selection that resolves against the catalog,
    /// in selection order. Unknown identifiers are dropped without a trace.
    pub fn resolve_icons<'a>(&'a self, selection: &StackSelection) -> Vec<&'a TechCatalogEntry> {
        selection.iter().filter_map(|id| self.get(id)).collect()
    }
}

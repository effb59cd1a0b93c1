use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const MANIFEST_FILE: &str = "Spindle.toml";

/// The parsed Spindle.toml manifest.
#[derive(Debug, Clone)]
pub struct SpindleManifest {
    pub project: ProjectSection,
    pub actors: ActorsSection,
    /// The directory containing the Spindle.toml file.
    pub root_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default)]
    pub locales: Vec<String>,
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            name: None,
            default_locale: default_locale(),
            locales: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActorsSection {
    /// Actor that speaks every player choice.
    #[serde(default = "default_player")]
    pub player: String,
    /// Actor for lines without a `Speaker:` prefix.
    #[serde(default = "default_actor", rename = "default")]
    pub default_actor: String,
}

impl Default for ActorsSection {
    fn default() -> Self {
        Self {
            player: default_player(),
            default_actor: default_actor(),
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}
fn default_player() -> String {
    "Player".to_string()
}
fn default_actor() -> String {
    "NPC".to_string()
}

impl SpindleManifest {
    /// Manifest used when no Spindle.toml exists.
    pub fn defaults(root_dir: PathBuf) -> Self {
        Self {
            project: ProjectSection::default(),
            actors: ActorsSection::default(),
            root_dir,
        }
    }

    /// Every configured locale, with the default locale first.
    pub fn all_locales(&self) -> Vec<String> {
        let mut locales = vec![self.project.default_locale.clone()];
        for locale in &self.project.locales {
            if !locales.contains(locale) {
                locales.push(locale.clone());
            }
        }
        locales
    }
}

/// Raw TOML structure for deserialization.
#[derive(Deserialize)]
struct RawManifest {
    #[serde(default)]
    project: ProjectSection,
    #[serde(default)]
    actors: ActorsSection,
}

/// Errors that can occur when loading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("no Spindle.toml found (searched from {0})")]
    NotFound(String),
    #[error("failed to read Spindle.toml: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid Spindle.toml: {0}")]
    ParseError(String),
    #[error("invalid Spindle.toml: [actors] player and default actor are both '{0}'")]
    SharedActorName(String),
    #[error("invalid Spindle.toml: actor name in [actors] must not be empty")]
    EmptyActorName,
    #[error("invalid Spindle.toml: default_locale '{0}' is not listed in locales")]
    UnknownDefaultLocale(String),
}

/// Walk up from `start_dir` looking for `Spindle.toml`.
/// Returns the path to the manifest file if found.
pub fn find_manifest(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let candidate = current.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Load and validate a Spindle.toml manifest from a file path.
pub fn load_manifest(path: &Path) -> Result<SpindleManifest, ManifestError> {
    let content = std::fs::read_to_string(path)?;
    let root_dir = path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    parse_manifest(&content, root_dir)
}

/// Parse and validate a Spindle.toml manifest from a string.
pub fn parse_manifest(content: &str, root_dir: PathBuf) -> Result<SpindleManifest, ManifestError> {
    let raw: RawManifest =
        toml::from_str(content).map_err(|e| ManifestError::ParseError(e.to_string()))?;

    validate_actors(&raw.actors)?;

    let project = &raw.project;
    if !project.locales.is_empty() && !project.locales.contains(&project.default_locale) {
        return Err(ManifestError::UnknownDefaultLocale(
            project.default_locale.clone(),
        ));
    }

    Ok(SpindleManifest {
        project: raw.project,
        actors: raw.actors,
        root_dir,
    })
}

/// Find and load the manifest starting from an input file's directory.
pub fn find_and_load_manifest(input_file: &Path) -> Result<SpindleManifest, ManifestError> {
    let start_dir = input_file.parent().unwrap_or_else(|| Path::new("."));
    let manifest_path = find_manifest(start_dir)
        .ok_or_else(|| ManifestError::NotFound(start_dir.display().to_string()))?;
    load_manifest(&manifest_path)
}

fn validate_actors(actors: &ActorsSection) -> Result<(), ManifestError> {
    if actors.player.trim().is_empty() || actors.default_actor.trim().is_empty() {
        return Err(ManifestError::EmptyActorName);
    }
    if actors.player == actors.default_actor {
        return Err(ManifestError::SharedActorName(actors.player.clone()));
    }
    Ok(())
}

//! Assembled-video profiles and their on-disk store.
//!
//! A profile ties one source media file to its full transition set. On
//! disk it is a JSON document holding `[mediaPath, volume]`, the ordered
//! marker-keys and one map per category whose values are the delimited
//! transition records.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use cueline_common::CuelineError;
use serde::{Deserialize, Serialize};

use crate::allocator::TimestampAllocator;
use crate::registry::{EncodedRecords, TransitionRegistry};
use crate::transition::{Category, DEFAULT_SENTINEL};

/// Current profile schema version.
pub const PROFILE_VERSION: &str = "1.0";

const PROFILE_EXTENSION: &str = "json";

/// One assembled video.
#[derive(Debug, Clone)]
pub struct Profile {
    /// Display name; spaces become underscores in the file name.
    pub name: String,

    /// Primary media file.
    pub media_path: PathBuf,

    /// Primary volume in `[0.0, 1.0]`.
    pub volume: f64,

    /// Every transition of this video.
    pub registry: TransitionRegistry,

    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,

    /// Set when the name, media or volume changed since the last save.
    properties_dirty: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProfileDocument {
    version: String,
    name: String,
    /// `[mediaPath, volume]`
    video_properties: Vec<String>,
    marker_events: Vec<String>,
    #[serde(default)]
    text_transitions: BTreeMap<String, String>,
    #[serde(default)]
    image_transitions: BTreeMap<String, String>,
    #[serde(default)]
    ff_transitions: BTreeMap<String, String>,
    #[serde(default)]
    cut_transitions: BTreeMap<String, String>,
    #[serde(default)]
    audio_transitions: BTreeMap<String, String>,
    #[serde(default)]
    video_transitions: BTreeMap<String, String>,
    created_at: DateTime<Utc>,
    modified_at: DateTime<Utc>,
}

impl Profile {
    /// Create an empty profile for a source file.
    pub fn new(name: impl Into<String>, media_path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            media_path: media_path.into(),
            volume: 1.0,
            registry: TransitionRegistry::default(),
            created_at: now,
            modified_at: now,
            properties_dirty: true,
        }
    }

    pub fn set_volume(&mut self, volume: f64) {
        let volume = volume.clamp(0.0, 1.0);
        if volume != self.volume {
            self.volume = volume;
            self.properties_dirty = true;
        }
    }

    pub fn set_media_path(&mut self, media_path: impl Into<PathBuf>) {
        self.media_path = media_path.into();
        self.properties_dirty = true;
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.properties_dirty = true;
    }

    /// Whether anything changed since the profile was loaded or saved.
    pub fn is_dirty(&self) -> bool {
        self.properties_dirty || self.registry.is_dirty()
    }

    /// Drop every transition and reset the media, as when the operator
    /// navigates away from a video.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.media_path = PathBuf::new();
        self.volume = 1.0;
        self.properties_dirty = true;
    }

    /// Media files referenced by this profile that do not exist.
    ///
    /// The primary media is checked first, then every secondary path in
    /// operator order. Unset (`_DEFAULT`) paths are not reported.
    pub fn missing_media(&self) -> Vec<PathBuf> {
        let mut missing = Vec::new();
        if !self.media_path.exists() {
            missing.push(self.media_path.clone());
        }
        for (_, transition) in self.registry.iter() {
            if let Some(path) = transition.media_path() {
                if !path.exists() && !missing.iter().any(|m| m == path) {
                    missing.push(path.to_path_buf());
                }
            }
        }
        missing
    }

    /// Load a profile from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ProfileError> {
        Self::load_with(path, TimestampAllocator::default())
    }

    /// Load a profile, installing `allocator` on its registry.
    pub fn load_with(
        path: impl AsRef<Path>,
        allocator: TimestampAllocator,
    ) -> Result<Self, ProfileError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ProfileError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let doc: ProfileDocument =
            serde_json::from_str(&json).map_err(|e| ProfileError::ParseError {
                path: path.to_path_buf(),
                source: e,
            })?;

        let malformed = |reason: String| ProfileError::Malformed {
            path: path.to_path_buf(),
            source: CuelineError::malformed("profile", reason),
        };

        let (media_path, volume) = match doc.video_properties.as_slice() {
            [media] => (media.clone(), 1.0),
            [media, volume, ..] => {
                let volume = volume
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| malformed(format!("invalid volume '{volume}'")))?;
                (media.clone(), volume)
            }
            [] => return Err(malformed("missing video properties".to_string())),
        };

        let mut records = EncodedRecords::new();
        records.insert(Category::Text, doc.text_transitions);
        records.insert(Category::Image, doc.image_transitions);
        records.insert(Category::FastForward, doc.ff_transitions);
        records.insert(Category::Cut, doc.cut_transitions);
        records.insert(Category::Audio, doc.audio_transitions);
        records.insert(Category::Video, doc.video_transitions);

        let registry = TransitionRegistry::decode_records(&doc.marker_events, &records, allocator)
            .map_err(|e| ProfileError::Malformed {
                path: path.to_path_buf(),
                source: e,
            })?;

        let collisions = registry.collisions();
        if !collisions.is_empty() {
            tracing::warn!(
                profile = %doc.name,
                count = collisions.len(),
                "Profile has colliding timestamps"
            );
        }

        tracing::info!(
            profile = %doc.name,
            transitions = registry.len(),
            "Profile loaded"
        );

        Ok(Self {
            name: doc.name,
            media_path: PathBuf::from(media_path),
            volume: volume.clamp(0.0, 1.0),
            registry,
            created_at: doc.created_at,
            modified_at: doc.modified_at,
            properties_dirty: false,
        })
    }

    /// Save the profile to a JSON file and clear the dirty flag.
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<(), ProfileError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProfileError::IoError {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let media = self.media_path.to_str().ok_or_else(|| ProfileError::Malformed {
            path: path.to_path_buf(),
            source: CuelineError::malformed("profile", "media path is not valid UTF-8"),
        })?;

        let mut records = self
            .registry
            .encode_records()
            .map_err(|e| ProfileError::Malformed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let mut take = |c: Category| records.remove(&c).unwrap_or_default();

        let modified_at = Utc::now();
        let doc = ProfileDocument {
            version: PROFILE_VERSION.to_string(),
            name: self.name.clone(),
            video_properties: vec![media.to_string(), self.volume.to_string()],
            marker_events: self.registry.ordered_keys().to_vec(),
            text_transitions: take(Category::Text),
            image_transitions: take(Category::Image),
            ff_transitions: take(Category::FastForward),
            cut_transitions: take(Category::Cut),
            audio_transitions: take(Category::Audio),
            video_transitions: take(Category::Video),
            created_at: self.created_at,
            modified_at,
        };

        let json = serde_json::to_string_pretty(&doc).map_err(|e| ProfileError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ProfileError::IoError {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.modified_at = modified_at;
        self.properties_dirty = false;
        self.registry.mark_clean();
        tracing::info!(profile = %self.name, path = %path.display(), "Profile saved");
        Ok(())
    }
}

/// Directory of saved profiles.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
    allocator: TimestampAllocator,
}

impl ProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            allocator: TimestampAllocator::default(),
        }
    }

    /// Registries of profiles loaded from this store use `allocator`.
    pub fn with_allocator(mut self, allocator: TimestampAllocator) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a profile name.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, ProfileError> {
        Ok(self
            .dir
            .join(format!("{}.{PROFILE_EXTENSION}", file_stem_for(name)?)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).is_ok_and(|path| path.exists())
    }

    /// Names of every saved profile, sorted.
    pub fn list(&self) -> Result<Vec<String>, ProfileError> {
        list_stems(&self.dir)
    }

    pub fn load(&self, name: &str) -> Result<Profile, ProfileError> {
        let path = self.path_for(name)?;
        if !path.exists() {
            return Err(ProfileError::NotFound {
                name: name.to_string(),
            });
        }
        Profile::load_with(path, self.allocator)
    }

    pub fn save(&self, profile: &mut Profile) -> Result<PathBuf, ProfileError> {
        let path = self.path_for(&profile.name)?;
        profile.save(&path)?;
        Ok(path)
    }

    pub fn delete(&self, name: &str) -> Result<(), ProfileError> {
        let path = self.path_for(name)?;
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ProfileError::NotFound {
                name: name.to_string(),
            },
            _ => ProfileError::IoError { path, source: e },
        })
    }
}

/// Profile names map to file stems with spaces replaced by underscores.
/// Names that could resolve outside the store directory are rejected.
pub fn file_stem_for(name: &str) -> Result<String, ProfileError> {
    let invalid = |reason: &str| ProfileError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    };
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(invalid("name is empty"));
    }
    if trimmed.contains(['/', '\\', ':', '\0']) {
        return Err(invalid("name contains a path separator"));
    }
    if trimmed.starts_with('.') {
        return Err(invalid("name starts with '.'"));
    }
    Ok(trimmed.replace(' ', "_"))
}

/// Sorted file stems of the JSON documents in `dir`. A missing directory
/// lists as empty.
pub(crate) fn list_stems(dir: &Path) -> Result<Vec<String>, ProfileError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(ProfileError::IoError {
                path: dir.to_path_buf(),
                source: e,
            })
        }
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ProfileError::IoError {
            path: dir.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let is_doc = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(PROFILE_EXTENSION));
        if !is_doc {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if stem != DEFAULT_SENTINEL {
                names.push(stem.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

/// Errors that can occur when reading or writing profiles.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid profile {path}: {source}")]
    Malformed { path: PathBuf, source: CuelineError },

    #[error("No saved profile named '{name}'")]
    NotFound { name: String },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}

impl From<ProfileError> for CuelineError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Malformed { source, .. } => source,
            other => CuelineError::profile(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::{Stop, Transition};

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "cueline-profile-{label}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn sample_profile() -> Profile {
        let mut profile = Profile::new("Morning Show", "/media/show.mp4");
        profile.set_volume(0.8);
        let reg = &mut profile.registry;
        reg.add_default(Category::Text).unwrap();
        reg.set_start("Text00", 1000).unwrap();
        reg.set_stop("Text00", Stop::At(5000)).unwrap();
        reg.set_message("Text00", "Hello").unwrap();
        reg.add_default(Category::Cut).unwrap();
        reg.set_start("Cut1", 7000).unwrap();
        reg.set_stop("Cut1", Stop::Open).unwrap();
        profile
    }

    #[test]
    fn test_save_and_load_profile() {
        let dir = temp_dir("roundtrip");
        let store = ProfileStore::new(&dir);
        let mut profile = sample_profile();
        assert!(profile.is_dirty());

        let path = store.save(&mut profile).unwrap();
        assert!(path.ends_with("Morning_Show.json"));
        assert!(!profile.is_dirty());

        let loaded = store.load("Morning Show").unwrap();
        assert_eq!(loaded.name, "Morning Show");
        assert_eq!(loaded.media_path, PathBuf::from("/media/show.mp4"));
        assert_eq!(loaded.volume, 0.8);
        assert_eq!(loaded.registry.ordered_keys(), ["Text00", "Cut1"]);
        assert_eq!(
            loaded.registry.get("Cut1").unwrap().stop(),
            Stop::At(7010)
        );
        assert!(!loaded.is_dirty());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_list_profiles_sorted() {
        let dir = temp_dir("list");
        let store = ProfileStore::new(&dir);
        store.save(&mut Profile::new("b", "/b.mp4")).unwrap();
        store.save(&mut Profile::new("a", "/a.mp4")).unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
        assert_eq!(store.list().unwrap(), vec!["a", "b"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_store_lists_empty() {
        let store = ProfileStore::new(temp_dir("absent"));
        assert!(store.list().unwrap().is_empty());
        assert!(matches!(
            store.load("nope"),
            Err(ProfileError::NotFound { .. })
        ));
    }

    #[test]
    fn test_names_cannot_leave_store() {
        let dir = temp_dir("names");
        let store = ProfileStore::new(&dir);
        for name in ["../escape", "a/b", "a\\b", "..", ".hidden", "  ", "C:evil"] {
            let err = store.path_for(name).unwrap_err();
            assert!(matches!(err, ProfileError::InvalidName { .. }), "{name}");
            assert!(!store.exists(name));
        }

        let mut profile = Profile::new("../../etc/cueline", "/media/show.mp4");
        let err = store.save(&mut profile).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidName { .. }));
        assert!(!dir.exists());
        assert!(CuelineError::from(err).is_operator_facing());

        assert!(matches!(
            store.load("../profiles/x"),
            Err(ProfileError::InvalidName { .. })
        ));
        assert_eq!(
            store.path_for(" Late Show ").unwrap(),
            dir.join("Late_Show.json")
        );
    }

    #[test]
    fn test_malformed_record_fails_load() {
        let dir = temp_dir("malformed");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(
            &path,
            r#"{
                "version": "1.0",
                "name": "bad",
                "video_properties": ["/m.mp4", "1.0"],
                "marker_events": ["Cut1"],
                "cut_transitions": {"Cut1": "100,*"},
                "created_at": "2024-01-01T00:00:00Z",
                "modified_at": "2024-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        let err = Profile::load(&path).unwrap_err();
        assert!(matches!(err, ProfileError::Malformed { .. }));
        let err: CuelineError = err.into();
        assert!(matches!(err, CuelineError::MalformedRecord { .. }));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_missing_media_skips_default_paths() {
        let dir = temp_dir("media");
        std::fs::create_dir_all(&dir).unwrap();
        let main = dir.join("main.mp4");
        std::fs::write(&main, b"").unwrap();

        let mut profile = Profile::new("media", &main);
        profile.registry.add_default(Category::Image).unwrap();
        let key = profile.registry.add_default(Category::Audio).unwrap();
        let mut audio = Transition::default_for(Category::Audio);
        if let Transition::Audio(a) = &mut audio {
            a.path = Some(dir.join("missing.wav"));
        }
        profile.registry.update(&key, audio).unwrap();

        assert_eq!(profile.missing_media(), vec![dir.join("missing.wav")]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_clear_empties_registry() {
        let mut profile = sample_profile();
        profile.clear();
        assert!(profile.registry.is_empty());
        assert!(profile.is_dirty());
    }
}

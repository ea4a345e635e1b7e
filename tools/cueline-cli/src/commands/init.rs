//! Create a new profile.

use std::path::PathBuf;

use cueline_common::AppConfig;
use cueline_project_model::{file_stem_for, Profile};

use super::{save_profile, store};

pub fn run(config: &AppConfig, name: String, media: PathBuf, volume: f64) -> anyhow::Result<()> {
    file_stem_for(&name)?;
    let store = store(config);
    if store.exists(&name) {
        anyhow::bail!(
            "Profile '{}' already exists at {}",
            name,
            store.path_for(&name)?.display()
        );
    }

    println!("Creating profile '{}' for {}", name, media.display());
    if !media.exists() {
        println!("  [WARN] Media file does not exist yet");
    }

    let mut profile = Profile::new(name, media);
    profile.set_volume(volume);
    save_profile(&store, &mut profile)?;
    println!("  Volume: {:.2}", profile.volume);

    Ok(())
}

//! Rename a transition.

use cueline_common::AppConfig;

use super::{load_profile, save_profile, store};

pub fn run(config: &AppConfig, profile: String, old: String, new: String) -> anyhow::Result<()> {
    let store = store(config);
    let mut profile = load_profile(&store, &profile)?;
    profile.registry.rename(&old, &new)?;
    println!("Renamed {old} -> {new}");
    save_profile(&store, &mut profile)
}

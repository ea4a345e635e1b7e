//! Delete a transition.

use cueline_common::AppConfig;

use super::{load_profile, save_profile, store};

pub fn run(config: &AppConfig, profile: String, key: String) -> anyhow::Result<()> {
    let store = store(config);
    let mut profile = load_profile(&store, &profile)?;
    let removed = profile.registry.remove(&key)?;
    println!("Removed {} {}", removed.category(), key);
    save_profile(&store, &mut profile)
}

//! Check a profile's media files and timestamps.

use cueline_common::AppConfig;
use cueline_project_model::MarkerTable;

use super::{load_profile, store};

pub fn run(config: &AppConfig, profile: String) -> anyhow::Result<()> {
    let store = store(config);
    let profile = load_profile(&store, &profile)?;
    println!("Validating profile '{}'", profile.name);

    let mut problems = 0;

    let missing = profile.missing_media();
    if missing.is_empty() {
        println!("  [OK] All media files exist");
    }
    for path in &missing {
        println!("  [ERR] Missing media: {}", path.display());
        problems += 1;
    }

    let collisions = profile.registry.collisions();
    if collisions.is_empty() {
        println!("  [OK] All timestamps are unique");
    }
    for (at_ms, keys) in &collisions {
        println!("  [ERR] {}ms is used by {}", at_ms, keys.join(", "));
        problems += 1;
    }

    let unscheduled: Vec<&str> = profile
        .registry
        .iter()
        .filter(|(_, t)| t.start_ms().is_none())
        .map(|(key, _)| key)
        .collect();
    if !unscheduled.is_empty() {
        println!("  [WARN] No start yet: {}", unscheduled.join(", "));
    }

    let table = MarkerTable::build(&profile.registry);
    println!("  {} markers would be installed", table.len());

    if problems > 0 {
        anyhow::bail!("{problems} problem(s) found");
    }
    println!("Profile is valid");
    Ok(())
}

//! Set a transition's start and stop.

use cueline_common::AppConfig;

use super::{load_profile, parse_stop, save_profile, store};

pub fn run(
    config: &AppConfig,
    profile: String,
    key: String,
    start: Option<u64>,
    stop: Option<String>,
) -> anyhow::Result<()> {
    if start.is_none() && stop.is_none() {
        anyhow::bail!("Nothing to set: pass --start and/or --stop");
    }
    let store = store(config);
    let mut profile = load_profile(&store, &profile)?;

    if let Some(start) = start {
        let accepted = profile.registry.set_start(&key, start)?;
        println!("{key}: start {accepted}ms (requested {start}ms)");
    }
    if let Some(stop) = stop {
        let requested = parse_stop(&stop)?;
        let accepted = profile.registry.set_stop(&key, requested)?;
        println!("{key}: stop {accepted} (requested {requested})");
    }

    save_profile(&store, &mut profile)
}

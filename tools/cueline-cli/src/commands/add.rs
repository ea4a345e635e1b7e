//! Add a transition to a profile.

use cueline_common::AppConfig;
use cueline_project_model::{Category, Transition};

use super::{load_profile, parse_stop, save_profile, store};

pub fn run(
    config: &AppConfig,
    profile: String,
    category: String,
    record: Option<String>,
    start: Option<u64>,
    stop: Option<String>,
) -> anyhow::Result<()> {
    let store = store(config);
    let mut profile = load_profile(&store, &profile)?;
    let category: Category = category.parse()?;

    let decoded = record
        .as_deref()
        .map(|r| Transition::decode(category, r))
        .transpose()?;

    let key = profile.registry.add_default(category)?;
    let (mut start, mut stop) = (start, stop.as_deref().map(parse_stop).transpose()?);
    if let Some(transition) = decoded {
        start = start.or(transition.start_ms());
        if stop.is_none() && !transition.stop().is_open() {
            stop = Some(transition.stop());
        }
        profile.registry.update(&key, transition)?;
    }
    if let Some(start) = start {
        let accepted = profile.registry.set_start(&key, start)?;
        if accepted != start {
            println!("  Start {start}ms was taken, moved to {accepted}ms");
        }
    }
    if let Some(stop) = stop {
        let accepted = profile.registry.set_stop(&key, stop)?;
        if accepted != stop {
            println!("  Stop {stop} adjusted to {accepted}");
        }
    }

    let transition = profile.registry.require(&key)?;
    println!("Added {} {}: {}", category, key, transition.encode()?);
    save_profile(&store, &mut profile)
}

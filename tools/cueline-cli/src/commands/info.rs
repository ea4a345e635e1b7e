//! Show a profile's transitions and marker table.

use cueline_common::{format_clock, AppConfig, MediaTime};
use cueline_project_model::MarkerTable;
use serde_json::json;

use super::{load_profile, store};

pub fn run(config: &AppConfig, profile: String, json: bool) -> anyhow::Result<()> {
    let store = store(config);
    let profile = load_profile(&store, &profile)?;
    let table = MarkerTable::build(&profile.registry);

    if json {
        let mut transitions = Vec::new();
        for (key, transition) in profile.registry.iter() {
            transitions.push(json!({
                "key": key,
                "category": transition.category(),
                "record": transition.encode()?,
            }));
        }
        let markers: Vec<_> = table
            .iter()
            .map(|m| json!({ "at_ms": m.at_ms, "marker": m.key.to_string() }))
            .collect();
        let doc = json!({
            "name": profile.name,
            "media": profile.media_path,
            "volume": profile.volume,
            "transitions": transitions,
            "markers": markers,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("Profile: {}", profile.name);
    println!("  Media:    {}", profile.media_path.display());
    println!("  Volume:   {:.2}", profile.volume);
    println!("  Created:  {}", profile.created_at.format("%Y-%m-%d %H:%M"));
    println!("  Modified: {}", profile.modified_at.format("%Y-%m-%d %H:%M"));
    println!();

    println!("Transitions ({}):", profile.registry.len());
    for (key, transition) in profile.registry.iter() {
        println!(
            "  {:<6} {:<12} {:>8} -> {:<8} {}",
            transition.category().label(),
            key,
            transition
                .start_ms()
                .map(|ms| ms.to_string())
                .unwrap_or_else(|| "-".to_string()),
            transition.stop().to_string(),
            transition.encode()?
        );
    }
    println!();

    println!("Markers ({}):", table.len());
    for marker in table.iter() {
        println!(
            "  {} {:>8}ms  {}",
            format_clock(MediaTime::from_ms(marker.at_ms).whole_secs()),
            marker.at_ms,
            marker.key
        );
    }

    Ok(())
}

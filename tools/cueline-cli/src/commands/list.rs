//! List saved profiles and text styles.

use cueline_common::AppConfig;
use cueline_project_model::TextStyleStore;

use super::store;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let profiles = store(config).list()?;
    println!("Profiles ({}):", config.profiles_dir.display());
    if profiles.is_empty() {
        println!("  (none)");
    }
    for name in &profiles {
        println!("  {name}");
    }
    println!();

    let styles = TextStyleStore::new(&config.text_styles_dir);
    println!("Text styles ({}):", styles.dir().display());
    for name in styles.list()? {
        let style = styles.load_or_default(Some(&name));
        println!(
            "  {:<20} {} {} {} {:.0}pt",
            name,
            style.font_family,
            style.font_weight,
            style.font_color,
            style.font_size
        );
    }

    Ok(())
}

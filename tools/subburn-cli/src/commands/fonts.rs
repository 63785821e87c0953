//! List fonts available to styles.

use std::path::PathBuf;

use subburn_caption_model::FontCatalog;
use subburn_common::config::AppConfig;

pub fn run(font_dir: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<()> {
    let catalog = FontCatalog::new(font_dir.unwrap_or_else(|| config.font_dir.clone()));
    let fonts = catalog.list()?;

    println!("Fonts in {}", catalog.dir().display());
    if fonts.is_empty() {
        println!("  (none)");
    }
    for name in &fonts {
        println!("  {name}");
    }
    Ok(())
}

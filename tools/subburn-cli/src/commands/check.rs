//! Check that ffmpeg and ffprobe can be executed.

use subburn_common::config::AppConfig;
use subburn_render_engine::ffmpeg::command_runs;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("Subburn System Check");
    println!("{}", "=".repeat(50));

    let tools = [("ffmpeg", &config.tools.ffmpeg), ("ffprobe", &config.tools.ffprobe)];
    let mut all_ok = true;
    for (label, binary) in tools {
        if command_runs(binary) {
            println!("[OK] {label}: {}", binary.display());
        } else {
            println!("[MISSING] {label}: {} is not runnable", binary.display());
            all_ok = false;
        }
    }
    println!("[INFO] Font directory: {}", config.font_dir.display());
    println!("[INFO] Default renderer: {}", config.default_renderer);
    println!("[INFO] Default mode: {}", config.default_mode);

    println!();
    if all_ok {
        println!("All external tools are available. Subburn is ready.");
        Ok(())
    } else {
        anyhow::bail!("Some external tools are missing. Install ffmpeg or set tools.ffmpeg/tools.ffprobe in the config.")
    }
}

use std::path::Path;

use anyhow::Result;

use pagectl_core::PageConfig;

pub fn run(config: &PageConfig, explicit: Option<&Path>, path_only: bool) -> Result<()> {
    if path_only {
        let path = explicit.map_or_else(PageConfig::config_path, Path::to_path_buf);
        println!("{}", path.display());
        return Ok(());
    }

    print!("{}", config.to_toml_string()?);
    Ok(())
}

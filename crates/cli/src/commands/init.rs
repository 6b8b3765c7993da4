//! `repolens init` — Write a default config file.

use anyhow::Context;
use repolens_config::AppConfig;
use std::path::Path;

pub fn run(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let default_path = AppConfig::config_dir().join("config.toml");
    let path = config_path.unwrap_or(&default_path);

    println!("RepoLens setup");
    println!("==============\n");

    if path.exists() && !force {
        println!("  Config already exists at: {}", path.display());
        println!("  Edit it manually or re-run with --force.\n");
        return Ok(());
    }

    write_default_config(path)?;
    println!("  Wrote {}", path.display());
    println!("\n  Next steps:");
    println!("    1. Set REPOLENS_API_KEY or add provider.api_key to the file");
    println!("    2. repolens ingest <repo> --workspace <name>");
    println!("    3. repolens analyze \"how does X work?\" --workspace <name>\n");

    Ok(())
}

fn write_default_config(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml())
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run(Some(&path), false).unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.gateway.port, AppConfig::default().gateway.port);
    }

    #[test]
    fn keeps_existing_file_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway]\nport = 9999\n").unwrap();

        run(Some(&path), false).unwrap();
        assert_eq!(AppConfig::load_from(&path).unwrap().gateway.port, 9999);

        run(Some(&path), true).unwrap();
        assert_eq!(
            AppConfig::load_from(&path).unwrap().gateway.port,
            AppConfig::default().gateway.port
        );
    }
}

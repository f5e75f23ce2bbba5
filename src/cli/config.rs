// src/cli/config.rs — Show the resolved configuration

use crate::infra::config::Config;
use crate::infra::paths;

pub fn show_config(config: &Config, explicit_path: Option<&str>) -> anyhow::Result<()> {
    let source = match explicit_path {
        Some(p) => p.to_string(),
        None if paths::config_file_path().exists() => {
            paths::config_file_path().display().to_string()
        }
        None => "(defaults)".to_string(),
    };
    println!("# source:     {source}");
    println!("# history:    {}", paths::history_path().display());
    println!("# evidence:   {}", paths::evidence_dir().display());
    println!("# references: {}", paths::references_dir().display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(text.contains("[iteration]"));
        assert!(text.contains("max_auto_iterations = 3"));
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.evidence.max_attached_images, 1);
    }
}

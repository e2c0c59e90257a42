use crate::config::{AnalysisConfig, Protocol};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Load and parse the analysis configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<AnalysisConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    let config: AnalysisConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    config.validate()?;

    Ok(config)
}

/// CLI arguments that override YAML settings
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub output_dir: Option<PathBuf>,
    pub protocols: Option<Vec<Protocol>>,
    pub threads: Option<usize>,
    pub strict_timeline: bool,
}

/// Apply CLI overrides to a loaded configuration
pub fn apply_overrides(config: &mut AnalysisConfig, overrides: &CliOverrides) -> Result<()> {
    if let Some(output_dir) = &overrides.output_dir {
        info!("Output directory overridden: {:?}", output_dir);
        config.output_dir = Some(output_dir.clone());
    }

    if let Some(protocols) = &overrides.protocols {
        info!(
            "Protocol selection overridden: {}",
            protocols.iter().map(|p| p.id()).collect::<Vec<_>>().join(",")
        );
        config.protocols = protocols.clone();
    }

    if let Some(threads) = overrides.threads {
        config.threads = threads;
    }

    if overrides.strict_timeline {
        config.strict_timeline = true;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let yaml = r#"
experiment: "kill_percent"
base_dir: "/data/experiments"
protocols: [hi, fu]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.experiment, "kill_percent");
        assert_eq!(config.protocols.len(), 2);
    }

    #[test]
    fn test_load_invalid_config() {
        let yaml = r#"
experiment: ""
base_dir: "/data/experiments"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        assert!(load_config(temp_file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        assert!(load_config(Path::new("/nonexistent/analysis.yaml")).is_err());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = AnalysisConfig::new("exp", "/data");

        let overrides = CliOverrides {
            output_dir: Some(PathBuf::from("/tmp/analysis")),
            protocols: Some(vec![Protocol::DigestDiffusion]),
            threads: Some(2),
            strict_timeline: true,
        };

        apply_overrides(&mut config, &overrides).unwrap();
        assert_eq!(config.output_dir(), PathBuf::from("/tmp/analysis"));
        assert_eq!(config.protocols, vec![Protocol::DigestDiffusion]);
        assert_eq!(config.threads, 2);
        assert!(config.strict_timeline);
    }

    #[test]
    fn test_overrides_are_revalidated() {
        let mut config = AnalysisConfig::new("exp", "/data");
        let overrides = CliOverrides {
            protocols: Some(Vec::new()),
            ..Default::default()
        };
        assert!(apply_overrides(&mut config, &overrides).is_err());
    }
}

//! Configuration document loading.
//!
//! Parsing is fail-fast: an unknown key, an unknown action or a structural
//! mistake anywhere in the document rejects the whole run before any
//! browser work starts.

use std::path::Path;
use thiserror::Error;
use webharvest_core_types::{ConfigError, RunConfig};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

pub fn load(path: &Path) -> Result<RunConfig, ConfigLoadError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: RunConfig = serde_yaml::from_str(&raw).map_err(|source| ConfigLoadError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use webharvest_core_types::Step;

    fn write_config(yaml: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();
        file
    }

    #[test]
    fn minimal_document_gets_defaults() {
        let file = write_config(
            r#"
scrapers:
  - name: books
    url: https://example.com/books
    steps:
      - action: navigate
        url: https://example.com/books
      - action: extract
        selector: .book
        fields:
          - name: title
            selector: h3
"#,
        );
        let config = load(file.path()).unwrap();
        assert_eq!(config.concurrency, 5);
        assert_eq!(config.output_dir, std::path::PathBuf::from("./results"));
        assert_eq!(config.jobs.len(), 1);
        assert!(matches!(config.jobs[0].steps[1], Step::Extract { .. }));
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let file = write_config(
            r#"
scrapers: []
paralellism: 3
"#,
        );
        assert!(matches!(
            load(file.path()),
            Err(ConfigLoadError::Parse { .. })
        ));
    }

    #[test]
    fn unknown_action_is_rejected() {
        let file = write_config(
            r#"
scrapers:
  - name: bad
    url: https://example.com
    steps:
      - action: teleport
        url: https://example.com
"#,
        );
        assert!(matches!(
            load(file.path()),
            Err(ConfigLoadError::Parse { .. })
        ));
    }

    #[test]
    fn zero_concurrency_is_rejected_after_parse() {
        let file = write_config(
            r#"
concurrency: 0
scrapers:
  - name: ok
    url: https://example.com
    steps:
      - action: navigate
        url: https://example.com
"#,
        );
        assert!(matches!(
            load(file.path()),
            Err(ConfigLoadError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let err = load(Path::new("/nonexistent/run.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/run.yaml"));
    }
}

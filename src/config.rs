use std::fs;
use std::path::{Path, PathBuf};

use camino::Utf8PathBuf;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::batch::SpeciesSource;
use crate::domain::GeneName;
use crate::error::GeneFetchError;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_OUTPUT_DIR: &str = "output";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species_file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gene: Option<String>,
}

/// Values given on the command line; each one wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub species: Option<String>,
    pub species_file: Option<String>,
    pub output_dir: Option<String>,
    pub gene: Option<String>,
}

/// Fully resolved inputs for one batch run.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub source: SpeciesSource,
    pub gene: GeneName,
    pub output_dir: Utf8PathBuf,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the config at `path` (which must exist), or the first of
    /// `./config.json` and the per-user config file that does. With neither
    /// present an empty config is returned.
    pub fn load(path: Option<&str>) -> Result<Config, GeneFetchError> {
        if let Some(path) = path {
            let path = PathBuf::from(path);
            if !path.exists() {
                return Err(GeneFetchError::MissingConfig(path));
            }
            return Self::read(&path);
        }

        match Self::candidates().into_iter().find(|path| path.exists()) {
            Some(path) => Self::read(&path),
            None => Ok(Config::default()),
        }
    }

    pub fn read(path: &Path) -> Result<Config, GeneFetchError> {
        let content =
            fs::read_to_string(path).map_err(|_| GeneFetchError::ConfigRead(path.to_path_buf()))?;
        serde_json::from_str(&content).map_err(|err| GeneFetchError::ConfigParse(err.to_string()))
    }

    pub fn save(path: &Path, config: &Config) -> Result<(), GeneFetchError> {
        let write_error = |message: String| GeneFetchError::ConfigWrite {
            path: path.to_path_buf(),
            message,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| write_error(err.to_string()))?;
        }
        let mut json =
            serde_json::to_string_pretty(config).map_err(|err| write_error(err.to_string()))?;
        json.push('\n');
        fs::write(path, json).map_err(|err| write_error(err.to_string()))
    }

    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "genefetch").map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
    }

    /// Applies `overrides` on top of `config`. A species file takes
    /// precedence over a single species name.
    pub fn resolve(config: Config, overrides: Overrides) -> Result<RunPlan, GeneFetchError> {
        let gene = overrides
            .gene
            .or(config.gene)
            .filter(|gene| !gene.trim().is_empty())
            .ok_or(GeneFetchError::MissingGene)?
            .parse::<GeneName>()?;

        let species_file = overrides
            .species_file
            .or(config.species_file)
            .filter(|file| !file.trim().is_empty());
        let species = overrides.species.filter(|name| !name.trim().is_empty());
        let source = match (species_file, species) {
            (Some(file), _) => SpeciesSource::File(PathBuf::from(file)),
            (None, Some(name)) => SpeciesSource::Single(name),
            (None, None) => return Err(GeneFetchError::MissingSpecies),
        };

        let output_dir = overrides
            .output_dir
            .or(config.output_dir)
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_OUTPUT_DIR.to_string());

        Ok(RunPlan {
            source,
            gene,
            output_dir: Utf8PathBuf::from(output_dir),
        })
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
        if let Some(path) = Self::user_config_path() {
            paths.push(path);
        }
        paths
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn overrides_win_over_config() {
        let config = Config {
            species_file: None,
            output_dir: Some("from-config".to_string()),
            gene: Some("matK".to_string()),
        };
        let overrides = Overrides {
            species: Some("Abies alba".to_string()),
            gene: Some("rbcL".to_string()),
            ..Overrides::default()
        };

        let plan = ConfigLoader::resolve(config, overrides).unwrap();
        assert_eq!(plan.gene.as_str(), "rbcL");
        assert_eq!(plan.output_dir, Utf8PathBuf::from("from-config"));
        assert_eq!(plan.source, SpeciesSource::Single("Abies alba".to_string()));
    }

    #[test]
    fn species_file_takes_precedence() {
        let config = Config {
            species_file: Some("species.txt".to_string()),
            ..Config::default()
        };
        let overrides = Overrides {
            species: Some("Abies alba".to_string()),
            gene: Some("rbcL".to_string()),
            ..Overrides::default()
        };
        let plan = ConfigLoader::resolve(config, overrides).unwrap();
        assert_eq!(plan.source, SpeciesSource::File(PathBuf::from("species.txt")));
        assert_eq!(plan.output_dir, Utf8PathBuf::from(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn gene_is_required() {
        let overrides = Overrides {
            species: Some("Abies alba".to_string()),
            ..Overrides::default()
        };
        let err = ConfigLoader::resolve(Config::default(), overrides).unwrap_err();
        assert_matches!(err, GeneFetchError::MissingGene);
    }

    #[test]
    fn species_is_required() {
        let overrides = Overrides {
            gene: Some("rbcL".to_string()),
            species: Some("   ".to_string()),
            ..Overrides::default()
        };
        let err = ConfigLoader::resolve(Config::default(), overrides).unwrap_err();
        assert_matches!(err, GeneFetchError::MissingSpecies);
    }
}

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_BATCH_SIZE: usize = 8_000;
pub const ENV_PREFIX: &str = "CYCLENET";

/// Run settings shared by both tools.
///
/// Sources in increasing precedence: defaults, the optional YAML file,
/// `CYCLENET_*` environment variables, then command line flags (applied by
/// the caller).
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RunSettings {
    /// Record only way members of route relations instead of every member.
    pub way_members_only: bool,
    /// Worker threads for block decoding and tagging; all cores when unset.
    pub threads: Option<usize>,
    /// Entities per batch when reading OPL input.
    pub batch_size: usize,
    /// Draw the progress counter on stderr.
    pub progress: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            way_members_only: false,
            threads: None,
            batch_size: DEFAULT_BATCH_SIZE,
            progress: true,
        }
    }
}

impl RunSettings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path));
        }
        let settings = builder
            .add_source(::config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

/// Dataset formats the tools can read.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum InputFormat {
    #[value(name = "pbf")]
    Pbf,
    #[value(name = "opl")]
    Opl,
}

/// Dataset formats the tagger can write.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum OutputFormat {
    #[value(name = "opl")]
    Opl,
    #[value(name = "jsonl", alias = "json")]
    Jsonl,
}

fn extension_of(path: &Path) -> Option<String> {
    Some(path.extension()?.to_str()?.to_lowercase())
}

pub fn detect_input_format(path: &Path) -> Option<InputFormat> {
    match extension_of(path)?.as_str() {
        "pbf" => Some(InputFormat::Pbf),
        "opl" => Some(InputFormat::Opl),
        _ => None,
    }
}

pub fn detect_output_format(path: &Path) -> Option<OutputFormat> {
    match extension_of(path)?.as_str() {
        "opl" => Some(OutputFormat::Opl),
        "jsonl" | "json" => Some(OutputFormat::Jsonl),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let settings = RunSettings::load(None).unwrap();
        assert_eq!(settings.batch_size, DEFAULT_BATCH_SIZE);
        assert!(settings.progress);
    }

    #[test]
    fn yaml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::with_suffix(".yaml").unwrap();
        writeln!(file, "way_members_only: true\nthreads: 3\nprogress: false").unwrap();
        let settings = RunSettings::load(Some(file.path())).unwrap();
        assert_eq!(
            settings,
            RunSettings {
                way_members_only: true,
                threads: Some(3),
                batch_size: DEFAULT_BATCH_SIZE,
                progress: false,
            }
        );
    }

    #[test]
    fn formats_follow_extensions() {
        assert_eq!(
            detect_input_format(Path::new("germany-latest.osm.pbf")),
            Some(InputFormat::Pbf)
        );
        assert_eq!(detect_input_format(Path::new("x.OPL")), Some(InputFormat::Opl));
        assert_eq!(detect_input_format(Path::new("x.osm")), None);
        assert_eq!(detect_output_format(Path::new("out.jsonl")), Some(OutputFormat::Jsonl));
        assert_eq!(detect_output_format(Path::new("out.osm.pbf")), None);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(RunSettings::load(Some(Path::new("/nonexistent/cyclenet.yaml"))).is_err());
    }
}

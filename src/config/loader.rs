use crate::config::schema::{MonitorConfig, OutputConfig};
use crate::error::{Error, Result};
use crate::output::{ViewSink, console::ConsoleOutput, csv::CsvOutput, json::JsonOutput};
use config::{Config, Environment, File, FileFormat};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use validator::Validate;

/// Environment variables with this prefix override file values, e.g.
/// `CRAWL_MONITOR_BASE_URL` or `CRAWL_MONITOR_RETRY__MAX_RETRIES`.
pub const ENV_PREFIX: &str = "CRAWL_MONITOR";

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<MonitorConfig> {
        Self::resolve(Some(path.as_ref()), None)
    }

    /// Builds the effective config: file (with inheritance) or defaults,
    /// then environment overrides, then an explicit `--url`.
    pub fn resolve(path: Option<&Path>, url: Option<&str>) -> Result<MonitorConfig> {
        let base = match path {
            Some(path) => {
                let mut visited = HashSet::new();
                Self::load_with_inheritance(path, &mut visited)?
            }
            None => MonitorConfig::default(),
        };

        let mut config = Self::apply_env(base)?;
        if let Some(url) = url {
            config.base_url = url.to_string();
        }

        if config.base_url.is_empty() {
            return Err(Error::Config(format!(
                "No base URL: pass --url, set base_url in a config file or {}_BASE_URL",
                ENV_PREFIX
            )));
        }

        config.validate()?;
        Ok(config)
    }

    fn load_with_inheritance(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<MonitorConfig> {
        let document = Self::load_document(path, visited)?;
        Ok(serde_json::from_value(document)?)
    }

    /// Reads `path` and every ancestor it `extends`, child keys laid over
    /// parent keys. Only keys a file actually sets take part in the merge.
    fn load_document(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<Value> {
        let path = fs::canonicalize(path).map_err(|e| {
            Error::Config(format!("{}: {}", path.display(), e))
        })?;

        if !visited.insert(path.clone()) {
            return Err(Error::Config(format!(
                "Circular inheritance detected involving {}",
                path.display()
            )));
        }

        let mut document = Self::load_file(&path)?;
        if !document.is_object() {
            return Err(Error::Config(format!(
                "{}: expected a mapping at the top level",
                path.display()
            )));
        }

        let extends = match document.get("extends") {
            None | Some(Value::Null) => None,
            Some(Value::String(parent)) => Some(parent.clone()),
            Some(other) => {
                return Err(Error::Config(format!(
                    "{}: extends must be a path, got {}",
                    path.display(),
                    other
                )));
            }
        };

        if let Some(obj) = document.as_object_mut() {
            obj.remove("extends");
        }

        match extends {
            Some(parent_path_str) => {
                let parent_path = path
                    .parent()
                    .ok_or_else(|| Error::Config(format!(
                        "Cannot determine parent directory for {}",
                        path.display()
                    )))?
                    .join(parent_path_str);

                let parent = Self::load_document(&parent_path, visited)?;
                Ok(Self::merge_documents(parent, document))
            }
            None => Ok(document),
        }
    }

    fn load_file(path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(serde_json::from_str(&content)?),
            Some("yaml") | Some("yml") => Ok(serde_yaml::from_str(&content)?),
            Some("toml") => Ok(toml::from_str(&content)?),
            _ => Err(Error::Config(format!(
                "Unsupported file extension: {}",
                path.display()
            ))),
        }
    }

    /// Nested tables such as `retry` merge key by key. `output` is replaced
    /// whole since its keys depend on the sink type.
    fn merge_documents(parent: Value, child: Value) -> Value {
        match (parent, child) {
            (Value::Object(mut parent_map), Value::Object(child_map)) => {
                for (key, child_value) in child_map {
                    let merged = match parent_map.remove(&key) {
                        Some(parent_value) if key != "output" => {
                            Self::merge_documents(parent_value, child_value)
                        }
                        _ => child_value,
                    };
                    parent_map.insert(key, merged);
                }
                Value::Object(parent_map)
            }
            (_, child) => child,
        }
    }

    fn apply_env(config: MonitorConfig) -> Result<MonitorConfig> {
        let env = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        Self::overlay(config, env)
    }

    /// Layers `env` over `config`.
    pub fn overlay(config: MonitorConfig, env: Environment) -> Result<MonitorConfig> {
        let base = serde_json::to_string(&config)?;
        let merged = Config::builder()
            .add_source(File::from_str(&base, FileFormat::Json))
            .add_source(env)
            .build()?;
        Ok(merged.try_deserialize()?)
    }

    /// Builds the sinks views are rendered to. The live console is included
    /// whenever a progress display is available.
    pub fn create_sinks(
        config: &MonitorConfig,
        multi: Option<Arc<indicatif::MultiProgress>>,
    ) -> Result<Vec<Box<dyn ViewSink>>> {
        let mut sinks: Vec<Box<dyn ViewSink>> = Vec::new();

        let wants_console = multi.is_some() || matches!(config.output, Some(OutputConfig::Console));
        if wants_console {
            sinks.push(Box::new(ConsoleOutput::new(multi)?));
        }

        match &config.output {
            Some(OutputConfig::Json { path }) => {
                sinks.push(Box::new(JsonOutput::new(PathBuf::from(path))?));
            }
            Some(OutputConfig::Csv { path }) => {
                sinks.push(Box::new(CsvOutput::new(PathBuf::from(path))?));
            }
            Some(OutputConfig::Console) | None => {}
        }

        Ok(sinks)
    }
}

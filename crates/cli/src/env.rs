use crate::error::CliError;
use std::{collections::HashMap, fs, path::Path};

const PREFIX: &str = "BATCH_";
const SENSITIVE: [&str; 5] = ["URL", "PASSWORD", "SECRET", "TOKEN", "KEY"];

/// `BATCH_*` variables from the process environment, optionally overlaid
/// with a dotenv-style file.
#[derive(Debug, Clone, Default)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars()
                .filter(|(k, _)| k.starts_with(PREFIX))
                .collect(),
        }
    }

    /// Values from the file win over the process environment.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {e}", path.display()))
        })?;
        self.parse(&content)
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }

    /// Loaded keys with values of connection strings and secrets masked.
    pub fn describe(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .vars
            .iter()
            .map(|(k, v)| {
                if SENSITIVE.iter().any(|s| k.contains(s)) {
                    format!("{k}=***")
                } else {
                    format!("{k}={v}")
                }
            })
            .collect();
        out.sort();
        out
    }

    fn parse(&mut self, content: &str) -> Result<(), CliError> {
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);

            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "env file line {}: expected KEY=VALUE",
                    idx + 1
                )));
            };
            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!("env file line {}: empty key", idx + 1)));
            }

            self.vars.insert(key.to_string(), unquote(value.trim()).to_string());
        }
        Ok(())
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

pub const REPO_NAME_CONTEXT: &str = "repo_name";
pub const HOSTED_ZONE_NAME_ENV: &str = "HOSTED_ZONE_NAME";
pub const HOSTED_ZONE_ID_ENV: &str = "HOSTED_ZONE_ID";
pub const DOMAIN_NAME_ENV: &str = "DOMAIN_NAME";
pub const ACCOUNT_ENV: &str = "CDK_DEFAULT_ACCOUNT";
pub const REGION_ENV: &str = "CDK_DEFAULT_REGION";

/// read from the working directory when no context file is given.
pub const DEFAULT_CONTEXT_FILE: &str = "cdk.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing context value '{0}'. Pass it with -c {0}=<value>")]
    MissingContext(&'static str),
    #[error("Missing environment variable {0}")]
    MissingEnv(&'static str),
    #[error("Invalid context argument '{0}'. Expected key=value")]
    InvalidContextArg(String),
    #[error("Failed to read context file {path:?}")]
    ContextFile { path: PathBuf, #[source] source: std::io::Error },
    #[error("Failed to parse context file {path:?}")]
    ContextJson { path: PathBuf, #[source] source: serde_json::Error },
    #[error(transparent)]
    Dotenv(#[from] dotenv_reader::Error),
}

/// key/value pairs given to the app at synth time.
pub type Context = BTreeMap<String, String>;

/// parses one `-c key=value` argument.
pub fn parse_context_arg(arg: &str) -> Result<(String, String), ConfigError> {
    match arg.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(ConfigError::InvalidContextArg(arg.to_string())),
    }
}

fn context_value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// reads the `context` object of a json file like
/// `{ "context": { "repo_name": "blog" } }`. A file without one yields an empty context.
pub fn read_context_file(path: &Path) -> Result<Context, ConfigError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::ContextFile { path: path.to_path_buf(), source })?;
    let value: Value = serde_json::from_str(&contents)
        .map_err(|source| ConfigError::ContextJson { path: path.to_path_buf(), source })?;
    let mut context = Context::new();
    if let Some(Value::Object(map)) = value.get("context") {
        for (key, val) in map {
            context.insert(key.clone(), context_value_to_string(val));
        }
    }
    debug!(path = %path.display(), keys = context.len(), "read context file");
    Ok(context)
}

/// builds the context from an optional context file and `key=value` arguments.
/// arguments override values from the file. Without an explicit file,
/// `cdk.json` in the working directory is used when it exists.
pub fn load_context<S: AsRef<str>>(context_file: Option<&Path>, args: &[S]) -> Result<Context, ConfigError> {
    let mut context = match context_file {
        Some(path) => read_context_file(path)?,
        None => {
            let default = Path::new(DEFAULT_CONTEXT_FILE);
            if default.is_file() {
                read_context_file(default)?
            } else {
                Context::new()
            }
        }
    };
    for arg in args {
        let (key, value) = parse_context_arg(arg.as_ref())?;
        context.insert(key, value);
    }
    Ok(context)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

fn repo_name(context: &Context) -> Result<String, ConfigError> {
    non_empty(context.get(REPO_NAME_CONTEXT).cloned()).ok_or(ConfigError::MissingContext(REPO_NAME_CONTEXT))
}

/// Locates an already deployed stack. Unlike `StaticSiteProps`, no hosted zone is needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackTarget {
    pub repo_name: String,
    pub region: Option<String>,
}

impl StackTarget {
    pub fn from_sources<F>(context: &Context, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            repo_name: repo_name(context)?,
            region: non_empty(env(REGION_ENV)),
        })
    }

    pub fn from_env(context: &Context, dotenv_path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv_reader::load_dotenv(dotenv_path)?;
        Self::from_sources(context, dotenv_reader::non_empty_var)
    }
}

/// Everything the static site stack needs to know about where it is deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSiteProps {
    pub repo_name: String,
    /// eg: example.com
    pub hosted_zone_name: String,
    pub hosted_zone_id: String,
    /// overrides the default `<repo_name>.<hosted_zone_name>`
    pub domain_name: Option<String>,
    pub account: Option<String>,
    pub region: Option<String>,
}

impl StaticSiteProps {
    /// empty values count as missing. `env` is any lookup, usually the process environment.
    pub fn from_sources<F>(context: &Context, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| non_empty(env(key)).ok_or(ConfigError::MissingEnv(key));
        Ok(Self {
            repo_name: repo_name(context)?,
            hosted_zone_name: required(HOSTED_ZONE_NAME_ENV)?,
            hosted_zone_id: required(HOSTED_ZONE_ID_ENV)?,
            domain_name: non_empty(env(DOMAIN_NAME_ENV)),
            account: non_empty(env(ACCOUNT_ENV)),
            region: non_empty(env(REGION_ENV)),
        })
    }

    /// reads the process environment, after loading a .env file if one is available.
    pub fn from_env(context: &Context, dotenv_path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenv_reader::load_dotenv(dotenv_path)?;
        Self::from_sources(context, dotenv_reader::non_empty_var)
    }
}

//! Command-line arguments
//!
//! ```text
//! asm [--config FILE] [--manifest FILE] [--templates DIR] [--data FILE]
//!     [--blueprint NS:VIEW] [--user-agent UA] [--records] [PATH]
//! ```
//!
//! Without `--blueprint`, `PATH` (default `/`) is routed through the
//! manifest's `[[routes]]`.

use std::path::PathBuf;

use thiserror::Error;

pub const USAGE: &str = "usage: asm [--config FILE] [--manifest FILE] [--templates DIR] [--data FILE] \
[--blueprint NS:VIEW] [--user-agent UA] [--records] [PATH]";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgsError {
    #[error("{0} expects a value")]
    MissingValue(String),

    #[error("Unknown flag: {0}")]
    UnknownFlag(String),

    #[error("Unexpected argument: {0}")]
    Unexpected(String),

    #[error("help requested")]
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config: Option<PathBuf>,
    pub manifest: PathBuf,
    pub templates: PathBuf,
    /// JSON object whose top-level keys seed every request's data store
    pub data: Option<PathBuf>,
    pub blueprint: Option<String>,
    pub user_agent: Option<String>,
    /// Print hydration records as JSON after the markup
    pub records: bool,
    pub path: String,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            config: None,
            manifest: PathBuf::from("components.toml"),
            templates: PathBuf::from("templates"),
            data: None,
            blueprint: None,
            user_agent: None,
            records: false,
            path: "/".to_string(),
        }
    }
}

impl Args {
    /// Parse arguments, excluding the program name
    pub fn parse<I>(args: I) -> Result<Self, ArgsError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut path = None;
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |flag: &str| args.next().ok_or_else(|| ArgsError::MissingValue(flag.to_string()));
            match arg.as_str() {
                "--config" => parsed.config = Some(value(&arg)?.into()),
                "--manifest" => parsed.manifest = value(&arg)?.into(),
                "--templates" => parsed.templates = value(&arg)?.into(),
                "--data" => parsed.data = Some(value(&arg)?.into()),
                "--blueprint" => parsed.blueprint = Some(value(&arg)?),
                "--user-agent" => parsed.user_agent = Some(value(&arg)?),
                "--records" => parsed.records = true,
                "-h" | "--help" => return Err(ArgsError::Help),
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownFlag(flag.to_string())),
                other if path.is_none() => path = Some(other.to_string()),
                other => return Err(ArgsError::Unexpected(other.to_string())),
            }
        }

        if let Some(path) = path {
            parsed.path = path;
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Args, ArgsError> {
        Args::parse(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn test_defaults() {
        let args = parse(&[]).unwrap();
        assert_eq!(args, Args::default());
        assert_eq!(args.path, "/");
    }

    #[test]
    fn test_flags_and_path() {
        let args = parse(&[
            "--manifest",
            "demo/components.toml",
            "--templates",
            "demo/templates",
            "--records",
            "/product/42",
        ])
        .unwrap();
        assert_eq!(args.manifest, PathBuf::from("demo/components.toml"));
        assert_eq!(args.templates, PathBuf::from("demo/templates"));
        assert!(args.records);
        assert_eq!(args.path, "/product/42");
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(&["--config"]), Err(ArgsError::MissingValue("--config".into())));
        assert_eq!(parse(&["--verbose"]), Err(ArgsError::UnknownFlag("--verbose".into())));
        assert_eq!(parse(&["/a", "/b"]), Err(ArgsError::Unexpected("/b".into())));
        assert_eq!(parse(&["-h"]), Err(ArgsError::Help));
    }
}

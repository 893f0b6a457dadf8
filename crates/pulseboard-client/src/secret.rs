//! Secret references in `config.toml`.
//!
//! A credential value may point somewhere else instead of holding the secret:
//! `pass::path/in/store` reads the first line of `pass show`, `env::VAR`
//! reads the environment. Anything else is the literal value.

use std::process::Command;

/// A parsed credential value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretRef<'a> {
    Pass(&'a str),
    Env(&'a str),
    Plain(&'a str),
}

impl<'a> SecretRef<'a> {
    pub fn parse(value: &'a str) -> Self {
        if let Some(path) = value.strip_prefix("pass::") {
            Self::Pass(path)
        } else if let Some(var) = value.strip_prefix("env::") {
            Self::Env(var)
        } else {
            Self::Plain(value)
        }
    }

    pub fn resolve(self) -> Result<String, String> {
        match self {
            Self::Pass(path) => pass_show(path),
            Self::Env(var) => std::env::var(var)
                .map_err(|_| format!("environment variable `{}` is not set", var)),
            Self::Plain(value) => Ok(value.to_string()),
        }
    }
}

/// Resolves a credential value that may be a secret reference.
pub fn resolve(value: &str) -> Result<String, String> {
    SecretRef::parse(value).resolve()
}

fn pass_show(path: &str) -> Result<String, String> {
    let output = Command::new("pass")
        .args(["show", path])
        .output()
        .map_err(|e| format!("failed to run `pass show {}`: {}", path, e))?;

    if !output.status.success() {
        return Err(format!(
            "`pass show {}` failed ({}): {}",
            path,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|line| line.trim_end().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| format!("`pass show {}` produced no output", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixes() {
        assert_eq!(SecretRef::parse("pass::pulse/google"), SecretRef::Pass("pulse/google"));
        assert_eq!(SecretRef::parse("env::PB_SECRET"), SecretRef::Env("PB_SECRET"));
        assert_eq!(SecretRef::parse("abc"), SecretRef::Plain("abc"));
        assert_eq!(SecretRef::parse("envy::x"), SecretRef::Plain("envy::x"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(resolve("my-client-secret").unwrap(), "my-client-secret");
        assert_eq!(resolve("").unwrap(), "");
    }

    #[test]
    fn env_reference() {
        unsafe {
            std::env::set_var("_PULSEBOARD_TEST_SECRET", "my-secret-value");
        }
        assert_eq!(
            resolve("env::_PULSEBOARD_TEST_SECRET").unwrap(),
            "my-secret-value"
        );
        unsafe {
            std::env::remove_var("_PULSEBOARD_TEST_SECRET");
        }
    }

    #[test]
    fn missing_env_reference() {
        let err = resolve("env::_PULSEBOARD_NONEXISTENT_VAR_12345").unwrap_err();
        assert!(err.contains("_PULSEBOARD_NONEXISTENT_VAR_12345"));
    }
}

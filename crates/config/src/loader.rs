use std::{fmt::Write, path::Path, sync::OnceLock};

use anyhow::bail;
use indoc::indoc;
use regex::Regex;
use serde::Deserialize;
use toml::Value;

use crate::{Config, Error};

/// Matches `{{ env.VAR_NAME }}` (whitespace around the identifier is
/// optional) anywhere inside a TOML string value.
fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{\s*env\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap())
}

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(Error::ConfigOpen)?;
    let mut raw: Value = toml::from_str(&content).map_err(Error::ConfigParse)?;

    expand_env_vars(&mut Vec::new(), &mut raw)?;

    let config = Config::deserialize(raw)?;
    validate_has_downstreams(&config)?;

    Ok(config)
}

fn expand_env_vars(path: &mut Vec<Result<String, usize>>, value: &mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => {
            if let Some(expanded) = substitute(s)? {
                *s = expanded;
            }
        }
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_env_vars(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.clone()));
                expand_env_vars(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }
    Ok(())
}

/// Returns `Some(expanded)` when the string contained at least one
/// `{{ env.VAR }}` placeholder, `None` when it contained none (left
/// untouched by the caller), and an error when a referenced variable is
/// unset.
fn substitute(s: &str) -> anyhow::Result<Option<String>> {
    if !s.contains("{{") {
        return Ok(None);
    }

    let mut out = String::with_capacity(s.len());
    let mut last = 0;

    for capture in env_var_pattern().captures_iter(s) {
        let whole = capture.get(0).unwrap();
        let name = &capture[1];

        out.push_str(&s[last..whole.start()]);

        let value = std::env::var(name).map_err(|_| {
            anyhow::anyhow!(Error::EnvVarSubstitution {
                path: String::new(),
                reason: format!("environment variable `{name}` is not set"),
            })
        })?;

        out.push_str(&value);
        last = whole.end();
    }

    out.push_str(&s[last..]);
    Ok(Some(out))
}

fn validate_has_downstreams(config: &Config) -> anyhow::Result<()> {
    if !config.mcp.has_servers() && !config.llm.has_providers() {
        bail!(indoc! {r#"
            No downstream servers configured. Bifrost requires at least one MCP server or LLM provider to function.

            For MCP servers:

              [mcp.servers.example]
              cmd = ["path/to/mcp-server"]

            For LLM providers:

              [llm.providers.openai]
              type = "openai"

              [[llm.providers.openai.accounts]]
              api_key = "{{ env.OPENAI_API_KEY }}"
        "#});
    }

    for (name, provider) in &config.llm.providers {
        for target in provider.fallback() {
            if !config.llm.providers.contains_key(&target.provider) {
                bail!("provider `{name}` declares a fallback to unknown provider `{}`", target.provider);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_single_variable() {
        unsafe { std::env::set_var("BIFROST_TEST_VAR_A", "secret-value") };
        let result = substitute("{{ env.BIFROST_TEST_VAR_A }}").unwrap();
        assert_eq!(result.as_deref(), Some("secret-value"));
        unsafe { std::env::remove_var("BIFROST_TEST_VAR_A") };
    }

    #[test]
    fn leaves_plain_strings_untouched() {
        assert_eq!(substitute("sk-literal-key").unwrap(), None);
    }

    #[test]
    fn errors_on_missing_variable() {
        unsafe { std::env::remove_var("BIFROST_TEST_VAR_MISSING") };
        let err = substitute("{{ env.BIFROST_TEST_VAR_MISSING }}").unwrap_err();
        assert!(err.to_string().contains("BIFROST_TEST_VAR_MISSING"));
    }

    #[test]
    fn substitutes_within_surrounding_text() {
        unsafe { std::env::set_var("BIFROST_TEST_VAR_B", "example.com") };
        let result = substitute("https://{{ env.BIFROST_TEST_VAR_B }}/v1").unwrap();
        assert_eq!(result.as_deref(), Some("https://example.com/v1"));
        unsafe { std::env::remove_var("BIFROST_TEST_VAR_B") };
    }
}

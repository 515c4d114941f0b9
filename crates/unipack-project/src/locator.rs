use anyhow::{bail, Result};

/// Where a package comes from, as accepted by the project's package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Registry { id: String, version: Option<String> },
    Git { url: String },
    Local { path: String },
}

pub fn parse_locator(raw: &str) -> Result<Locator> {
    let value = raw.trim();
    if value.is_empty() {
        bail!("package locator must not be empty");
    }
    if value.chars().any(char::is_whitespace) {
        bail!("malformed package locator '{raw}': whitespace is not allowed");
    }

    if let Some(path) = value.strip_prefix("file:") {
        if path.is_empty() {
            bail!("malformed package locator '{raw}': missing file path");
        }
        return Ok(Locator::Local {
            path: value.to_string(),
        });
    }
    if value.contains("://") || value.starts_with("git@") || value.ends_with(".git") {
        return Ok(Locator::Git {
            url: value.to_string(),
        });
    }

    let (id, version) = match value.split_once('@') {
        Some((id, version)) => {
            if version.is_empty() {
                bail!("malformed package locator '{raw}': missing version after '@'");
            }
            (id, Some(version.to_string()))
        }
        None => (value, None),
    };
    if let Err(err) = validate_package_id(id) {
        bail!("malformed package locator '{raw}': {err}");
    }
    Ok(Locator::Registry {
        id: id.to_string(),
        version,
    })
}

fn validate_package_id(id: &str) -> Result<()> {
    if id.is_empty() {
        bail!("missing package id");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_'))
    {
        bail!("package id '{id}' may only contain lowercase letters, digits, '.', '-' and '_'");
    }
    if id.starts_with('.') || id.ends_with('.') {
        bail!("package id '{id}' must not start or end with '.'");
    }
    Ok(())
}

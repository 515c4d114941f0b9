use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("package name cannot be empty")]
    EmptyName,
    #[error("package locator cannot be empty (package '{0}')")]
    EmptyLocator(String),
}

/// A package waiting in the install queue: what to call it and where to get it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    name: String,
    locator: String,
}

impl InstallRequest {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Result<Self, RequestError> {
        let name = name.into();
        let locator = locator.into();
        if name.trim().is_empty() {
            return Err(RequestError::EmptyName);
        }
        if locator.trim().is_empty() {
            return Err(RequestError::EmptyLocator(name));
        }
        Ok(Self { name, locator })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }
}

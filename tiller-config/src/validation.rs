//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate a database URL, restricted to the given schemes
pub fn validate_url(url: &str, schemes: &[&str], field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(url, field_name, domain)?;

    let parsed = url::Url::parse(url).map_err(|e| ConfigError::DomainError {
        domain: domain.to_string(),
        message: format!("{} has invalid URL format: {}", field_name, e),
    })?;

    if !schemes.contains(&parsed.scheme()) {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} scheme '{}' not supported (expected one of: {})",
                field_name,
                parsed.scheme(),
                schemes.join(", ")
            ),
        });
    }

    Ok(())
}

/// Reject two flags that are both set
pub fn validate_exclusive(a: (bool, &str), b: (bool, &str), domain: &str) -> ConfigResult<()> {
    if a.0 && b.0 {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} and {} cannot be combined", a.1, b.1),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url_schemes() {
        assert!(validate_url("postgres://localhost/app", &["postgres", "postgresql"], "url", "database").is_ok());
        assert!(validate_url("mysql://localhost/app", &["postgres"], "url", "database").is_err());
        assert!(validate_url("not a url", &["postgres"], "url", "database").is_err());
        assert!(validate_url("", &["postgres"], "url", "database").is_err());
    }

    #[test]
    fn test_validate_exclusive() {
        assert!(validate_exclusive((true, "dry"), (false, "dry_complete"), "run").is_ok());
        let err = validate_exclusive((true, "dry"), (true, "dry_complete"), "run").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Domain configuration error in run: dry and dry_complete cannot be combined"
        );
    }

    #[test]
    fn test_validate_positive() {
        assert!(validate_positive(5u64, "connect_timeout", "database").is_ok());
        assert!(validate_positive(0u64, "connect_timeout", "database").is_err());
    }
}

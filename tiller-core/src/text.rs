//! Text normalization helpers

/// Normalize a free-text migration description.
///
/// Every line is trimmed and blank lines are dropped.
pub fn normalize_description(description: &str) -> String {
    description
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Quote an SQL identifier, doubling embedded quotes
pub fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_description() {
        let raw = "\n    Creates the users table.\n\n      Grants read access to the service role.   \n";
        assert_eq!(
            normalize_description(raw),
            "Creates the users table.\nGrants read access to the service role."
        );
        assert_eq!(normalize_description("   \n\t\n"), "");
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("tiller"), "\"tiller\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
    }
}

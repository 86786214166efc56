//! Identifier validation and quoting for dynamically built SQL.
//!
//! Table and column names come from entity declarations and record keys and
//! are spliced into statements, so every one is checked before use.

use assetvault_core::{Error, Result};

/// Validate a PostgreSQL table or column name.
///
/// Identifiers must:
/// - Not be empty
/// - Not exceed 63 characters (PostgreSQL identifier limit)
/// - Contain only lowercase ASCII letters, digits and underscores
/// - Not start with a digit
///
/// # Examples
///
/// ```
/// use assetvault_db::validate_identifier;
///
/// assert!(validate_identifier("status_history").is_ok());
/// assert!(validate_identifier("item; DROP TABLE item").is_err());
/// assert!(validate_identifier("1item").is_err());
/// ```
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput("Identifier cannot be empty".to_string()));
    }

    if name.len() > 63 {
        return Err(Error::InvalidInput(format!(
            "Identifier exceeds 63 character limit: {} characters",
            name.len()
        )));
    }

    if let Some(first) = name.chars().next() {
        if !first.is_ascii_lowercase() && first != '_' {
            return Err(Error::InvalidInput(format!(
                "Identifier must start with a lowercase letter or underscore, found: '{}'",
                first
            )));
        }
    }

    for ch in name.chars() {
        if !ch.is_ascii_lowercase() && !ch.is_ascii_digit() && ch != '_' {
            return Err(Error::InvalidInput(format!(
                "Identifier '{}' contains invalid character: '{}'",
                name, ch
            )));
        }
    }

    Ok(())
}

/// Validate and double-quote an identifier.
pub fn quote_identifier(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name))
}

/// Validate and quote a list of column names, joined with `, `.
pub fn quote_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let quoted = columns
        .into_iter()
        .map(quote_identifier)
        .collect::<Result<Vec<_>>>()?;
    if quoted.is_empty() {
        return Err(Error::InvalidInput("Column list cannot be empty".to_string()));
    }
    Ok(quoted.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_valid() {
        assert!(validate_identifier("item").is_ok());
        assert!(validate_identifier("archived_status_history").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("col2").is_ok());
    }

    #[test]
    fn test_validate_identifier_empty() {
        match validate_identifier("") {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("empty")),
            _ => panic!("Expected InvalidInput error"),
        }
    }

    #[test]
    fn test_validate_identifier_too_long() {
        let long = "a".repeat(64);
        assert!(validate_identifier(&long).is_err());
        assert!(validate_identifier(&"a".repeat(63)).is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_injection() {
        assert!(validate_identifier("item\"; DROP TABLE item; --").is_err());
        assert!(validate_identifier("Item").is_err());
        assert!(validate_identifier("item-name").is_err());
        assert!(validate_identifier("9lives").is_err());
    }

    #[test]
    fn test_quote_columns() {
        assert_eq!(
            quote_columns(["id", "item_id"]).unwrap(),
            "\"id\", \"item_id\""
        );
        assert!(quote_columns(Vec::<&str>::new()).is_err());
        assert!(quote_columns(["id", "bad col"]).is_err());
    }
}

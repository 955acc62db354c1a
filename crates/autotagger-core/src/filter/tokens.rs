//! Comma-separated token list parsing.

use crate::error::FieldError;

/// Split a comma-separated list into trimmed, non-empty tokens.
///
/// Order is preserved and duplicates are kept; callers that need a set
/// build one themselves.
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a user-supplied token list, rejecting tokens a tags file could not hold.
pub fn parse_list(raw: &str) -> Result<Vec<String>, FieldError> {
    let tokens = split_tokens(raw);
    if let Some(bad) = tokens.iter().find(|t| t.chars().any(char::is_control)) {
        return Err(FieldError::ControlCharacter { token: bad.clone() });
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_trims_and_drops_empty() {
        assert_eq!(
            split_tokens(" smile, ,solo ,, long hair "),
            vec!["smile", "solo", "long hair"]
        );
    }

    #[test]
    fn test_split_empty_string() {
        assert!(split_tokens("").is_empty());
        assert!(split_tokens(" , ").is_empty());
    }

    #[test]
    fn test_split_keeps_order_and_duplicates() {
        assert_eq!(split_tokens("b,a,b"), vec!["b", "a", "b"]);
    }

    #[test]
    fn test_parse_rejects_control_characters() {
        let err = parse_list("smile, bad\ttoken").unwrap_err();
        assert_eq!(
            err,
            FieldError::ControlCharacter {
                token: "bad\ttoken".to_string()
            }
        );
    }
}

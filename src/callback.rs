//! Encoding of inline-button action tokens.
//!
//! A token is the action name followed by its stringified arguments, joined
//! with `;`. Arguments are integers and fixed enum strings by construction,
//! so no escaping is needed.

/// Reserved token for decorative buttons. Every transition function treats
/// it as "no state change, no result".
pub const IGNORE: &str = "IGNORE";

const DELIMITER: char = ';';

pub fn encode(action: &str, args: &[String]) -> String {
    let mut parts = vec![action.to_string()];
    parts.extend_from_slice(args);
    parts.join(&DELIMITER.to_string())
}

pub fn decode(token: &str) -> Vec<&str> {
    token.split(DELIMITER).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_joins_action_and_args() {
        let token = encode("DAY", &["2024".to_string(), "6".to_string(), "15".to_string()]);
        assert_eq!(token, "DAY;2024;6;15");
    }

    #[test]
    fn encode_without_args_is_the_bare_action() {
        assert_eq!(encode("TIME_OK", &[]), "TIME_OK");
    }

    #[test]
    fn decode_splits_back_into_fields() {
        assert_eq!(decode("HOUR_UP;9;30;am"), vec!["HOUR_UP", "9", "30", "am"]);
        assert_eq!(decode(IGNORE), vec![IGNORE]);
    }
}

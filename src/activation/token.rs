//! Token format: `ECO-XXXX-XXXX-XXXX`, upper-case hexadecimal groups.

use uuid::Uuid;

pub const TOKEN_PREFIX: &str = "ECO";

pub fn generate_token() -> String {
    let hex = Uuid::new_v4().simple().to_string().to_ascii_uppercase();
    format!(
        "{}-{}-{}-{}",
        TOKEN_PREFIX,
        &hex[0..4],
        &hex[8..12],
        &hex[12..16]
    )
}

pub fn is_valid_token(token: &str) -> bool {
    let mut groups = token.split('-');
    if groups.next() != Some(TOKEN_PREFIX) {
        return false;
    }
    let rest: Vec<&str> = groups.collect();
    rest.len() == 3
        && rest.iter().all(|g| {
            g.len() == 4
                && g
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_tokens_are_well_formed() {
        for _ in 0..50 {
            let t = generate_token();
            assert!(is_valid_token(&t), "bad token {t}");
            assert_eq!(t.len(), 18);
        }
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(!is_valid_token("ECO-12AB-34CD"));
        assert!(!is_valid_token("ABC-12AB-34CD-56EF"));
        assert!(!is_valid_token("ECO-12ab-34CD-56EF"));
        assert!(is_valid_token("ECO-12AB-34CD-56EF"));
    }
}

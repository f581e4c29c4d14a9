use certreg_shared::auth::unix_now;

/// Get current Unix timestamp in seconds
pub fn get_timestamp() -> i64 {
    unix_now()
}

/// Hash a password using Argon2id
pub fn hash_password(password: &str) -> anyhow::Result<String> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHasher, SaltString},
    };
    use rand::rngs::OsRng;

    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))
}

/// Verify a password against its stored PHC hash
pub fn verify_password(hash: &str, password: &str) -> anyhow::Result<bool> {
    use argon2::{
        Argon2,
        password_hash::{PasswordHash, PasswordVerifier},
    };

    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Failed to parse password hash: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Argon2id hash with the default cost parameters that no password matches.
pub const DUMMY_PASSWORD_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$dH5XY2U+H6T9jFNjEpjOPA$3KLBd2lcxewxzxmeKY7x9qCrE2Tgyub7kzCyTAGAVQI";

/// Spend one full password verification on a hash nothing matches, so a
/// login for an unknown account costs the same as a wrong password.
pub fn burn_password_check(password: &str) {
    let _ = verify_password(DUMMY_PASSWORD_HASH, password);
}

/// Basic shape check for an email address
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Strip NUL bytes and surrounding whitespace from user-supplied text
pub fn sanitize_string(input: &str) -> String {
    input.replace('\0', "").trim().to_string()
}

/// Build a `LIKE` pattern matching `term` anywhere, with `%`, `_` and `\`
/// escaped. Use with `ESCAPE '\'`.
pub fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp() {
        assert!(get_timestamp() > 1_600_000_000);
    }

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, password).unwrap());
        assert!(!verify_password(&hash, "wrong_password").unwrap());
    }

    #[test]
    fn same_password_hashes_differently() {
        let a = hash_password("secret").unwrap();
        let b = hash_password("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("not-a-phc-string", "x").is_err());
    }

    #[test]
    fn dummy_hash_parses_and_never_matches() {
        assert!(!verify_password(DUMMY_PASSWORD_HASH, "").unwrap());
        assert!(!verify_password(DUMMY_PASSWORD_HASH, "root-password-1").unwrap());
    }

    #[test]
    fn dummy_hash_uses_same_cost_as_real_hashes() {
        let real = hash_password("anything").unwrap();
        let header = |h: &str| h.split('$').take(4).collect::<Vec<_>>().join("$");
        assert_eq!(header(&real), header(DUMMY_PASSWORD_HASH));
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("invalid"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("user@localhost"));
        assert!(!is_valid_email("user@.com"));
        assert!(!is_valid_email("us er@example.com"));
    }

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_string("  test  "), "test");
        assert_eq!(sanitize_string("test\0null"), "testnull");
    }

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ann"), "%ann%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}

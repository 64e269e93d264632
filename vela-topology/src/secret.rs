//! Generated secret material
//!
//! The database password is generated once, on the first apply, and reused
//! from the recorded state on every later apply so re-applying an unchanged
//! declaration produces zero churn.

use rand::Rng;

/// Characters allowed in generated passwords.
///
/// Restricted to characters that survive unquoted shell interpolation and
/// SQL literal syntax: no quotes, backslash, `$`, backtick, whitespace,
/// `;`, `&`, `|`, redirects, or glob characters.
pub const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_%+.";

/// Length of generated passwords
pub const PASSWORD_LENGTH: usize = 32;

/// Secret values fed into the topology
#[derive(Debug, Clone, PartialEq)]
pub struct SecretMaterial {
    /// Database master password
    pub password: String,
}

impl SecretMaterial {
    /// Generate fresh material
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let password: String = (0..PASSWORD_LENGTH)
            .map(|_| PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())] as char)
            .collect();

        Self { password }
    }

    /// Reuse the password recorded by a previous apply, or generate a fresh
    /// one when none exists
    pub fn reuse_or_generate(existing_password: Option<&str>) -> Self {
        match existing_password {
            Some(password) => Self {
                password: password.to_string(),
            },
            None => {
                log::debug!("no recorded database password, generating fresh material");
                Self::generate()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_password_has_expected_length() {
        let material = SecretMaterial::generate();
        assert_eq!(material.password.len(), PASSWORD_LENGTH);
    }

    #[test]
    fn generated_password_stays_inside_charset() {
        for _ in 0..100 {
            let material = SecretMaterial::generate();
            for b in material.password.bytes() {
                assert!(
                    PASSWORD_CHARSET.contains(&b),
                    "unexpected character {:?}",
                    b as char
                );
            }
        }
    }

    #[test]
    fn charset_has_no_quoting_hazards() {
        for forbidden in br#"'"\$` ;&|<>()*?[]#~!"# {
            assert!(
                !PASSWORD_CHARSET.contains(forbidden),
                "charset contains {:?}",
                *forbidden as char
            );
        }
    }

    #[test]
    fn reuse_keeps_existing_password() {
        let material = SecretMaterial::reuse_or_generate(Some("kept-from-state"));
        assert_eq!(material.password, "kept-from-state");
    }

    #[test]
    fn missing_password_generates_fresh() {
        let material = SecretMaterial::reuse_or_generate(None);
        assert_eq!(material.password.len(), PASSWORD_LENGTH);
    }
}

use std::collections::HashSet;

use crate::config::PolicyConfig;

/// Organizational sign-in policy: an email domain suffix plus an allow-list
/// of account-suffix tokens.
///
/// Pure validation over configuration loaded at startup; no state, no I/O.
#[derive(Debug, Clone)]
pub struct PolicyGate {
    domain_suffix: String,
    allowed_accounts: HashSet<String>,
}

impl PolicyGate {
    pub fn new(config: &PolicyConfig) -> Self {
        Self {
            domain_suffix: config.domain_suffix.clone(),
            // Membership is case-insensitive: normalize once at load.
            allowed_accounts: config
                .allowed_accounts
                .iter()
                .map(|t| t.to_uppercase())
                .collect(),
        }
    }

    /// True only if the email carries the organizational domain suffix
    /// (literal, case-sensitive match) and its account token is allow-listed.
    pub fn validate(&self, email: &str) -> bool {
        if !email.ends_with(&self.domain_suffix) {
            return false;
        }
        let token = Self::account_token(email);
        // A local part shorter than 4 characters extracts the empty token,
        // which is never in the allow-list, so malformed emails fail closed.
        self.allowed_accounts.contains(&token)
    }

    /// The last 4 characters of the local part, upper-cased; empty when the
    /// local part is shorter than 4 characters.
    ///
    /// Surfaced in rejection messages so operators can audit attempted
    /// unauthorized accounts.
    pub fn account_token(email: &str) -> String {
        let local = email.split('@').next().unwrap_or("");
        let chars: Vec<char> = local.chars().collect();
        if chars.len() < 4 {
            return String::new();
        }
        chars[chars.len() - 4..]
            .iter()
            .collect::<String>()
            .to_uppercase()
    }
}

//! Account / key selector: picks a credential among a provider's
//! configured accounts whose capability filter covers the requested
//! operation, weighted-random among the qualifying set (Open Question:
//! "exact semantics of key selection when multiple keys qualify" is
//! resolved here as weighted-random, proportional to `AccountConfig::weight`).

use config::{AccountConfig, RequestKind};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use schema::{ErrorCategory, ErrorField};

/// A selected credential, ready to be used for exactly one dispatch
/// attempt. Carries the key rather than a reference so a BYOK override
/// (caller-supplied key via [`context::RequestContext::api_key_override`])
/// can be substituted transparently by the caller.
#[derive(Clone)]
pub struct SelectedAccount {
    pub api_key: SecretString,
}

impl SelectedAccount {
    pub fn expose(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Picks an account from `accounts` whose `allowed_requests` (when set)
/// includes `kind`, weighted by `AccountConfig::weight`. Accounts with
/// weight zero are disabled without needing to be removed from
/// configuration. Returns `authentication` (non-retryable-on-other-
/// provider in the sense that no other account on *this* provider exists,
/// though the dispatcher may still fall back to another provider) when no
/// account qualifies.
pub fn select(accounts: &[AccountConfig], kind: RequestKind) -> Result<SelectedAccount, ErrorField> {
    let candidates: Vec<&AccountConfig> = accounts
        .iter()
        .filter(|account| account.weight > 0)
        .filter(|account| {
            account
                .allowed_requests
                .as_ref()
                .map(|allowed| allowed.contains(&kind))
                .unwrap_or(true)
        })
        .collect();

    if candidates.is_empty() {
        return Err(ErrorField::new(
            ErrorCategory::Authentication,
            "no configured account has a capability filter covering this operation",
        ));
    }

    let total_weight: u64 = candidates.iter().map(|account| account.weight as u64).sum();
    let mut pick = rand::rng().random_range(0..total_weight);

    for account in &candidates {
        let weight = account.weight as u64;
        if pick < weight {
            return Ok(SelectedAccount {
                api_key: account.api_key.clone(),
            });
        }
        pick -= weight;
    }

    // Unreachable given the loop invariant above, but avoids a panic if
    // floating-point-free integer arithmetic somehow still falls through.
    Ok(SelectedAccount {
        api_key: candidates[0].api_key.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn account(key: &str, weight: u32, allowed: Option<Vec<RequestKind>>) -> AccountConfig {
        AccountConfig {
            api_key: SecretString::from(key.to_string()),
            weight,
            allowed_requests: allowed,
        }
    }

    #[test]
    fn skips_accounts_whose_filter_excludes_the_operation() {
        let accounts = vec![
            account("sk-batch-only", 10, Some(vec![RequestKind::Batch])),
            account("sk-chat-ok", 1, Some(vec![RequestKind::Chat])),
        ];

        let selected = select(&accounts, RequestKind::Chat).unwrap();
        assert_eq!(selected.expose(), "sk-chat-ok");
    }

    #[test]
    fn zero_weight_account_is_never_selected() {
        let accounts = vec![account("sk-disabled", 0, None), account("sk-enabled", 1, None)];

        for _ in 0..20 {
            let selected = select(&accounts, RequestKind::Chat).unwrap();
            assert_eq!(selected.expose(), "sk-enabled");
        }
    }

    #[test]
    fn no_qualifying_account_is_authentication_error() {
        let accounts = vec![account("sk-batch-only", 1, Some(vec![RequestKind::Batch]))];
        let error = select(&accounts, RequestKind::Chat).unwrap_err();
        assert_eq!(error.category, ErrorCategory::Authentication);
    }

    #[test]
    fn empty_accounts_is_authentication_error() {
        let error = select(&[], RequestKind::Chat).unwrap_err();
        assert_eq!(error.category, ErrorCategory::Authentication);
    }
}

/*
 * Responsibility
 * - 「本人として session に載せてよいか」の判定 (pure function)
 * - 判定条件は TrustPolicy として Config から注入する
 */
use crate::services::auth::Claims;

/// Conditions a caller must satisfy to keep their real identity in the
/// backend session document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    email_suffix: String,
    subject_prefix: String,
}

impl TrustPolicy {
    /// Returns `None` when either condition is empty: an empty suffix or prefix
    /// would match every caller.
    pub fn new(email_suffix: impl Into<String>, subject_prefix: impl Into<String>) -> Option<Self> {
        let email_suffix = email_suffix.into();
        let subject_prefix = subject_prefix.into();
        if email_suffix.is_empty() || subject_prefix.is_empty() {
            return None;
        }
        Some(Self {
            email_suffix,
            subject_prefix,
        })
    }
}

/// Trusted iff the email is verified, belongs to the organisation and the
/// subject came from the expected federated connection.
pub fn is_trusted(policy: &TrustPolicy, claims: &Claims) -> bool {
    claims.email_verified
        && claims
            .email
            .as_deref()
            .is_some_and(|email| email.ends_with(&policy.email_suffix))
        && claims.sub.starts_with(&policy.subject_prefix)
}

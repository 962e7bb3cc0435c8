//! Test fixtures

/// Credential the scripted identity resolver accepts for an identity id.
#[must_use]
pub fn token_for(identity_id: &str) -> String {
    format!("valid-{identity_id}")
}

/// A credential the resolver always rejects.
#[must_use]
pub fn bad_token() -> String {
    "expired-token".to_string()
}

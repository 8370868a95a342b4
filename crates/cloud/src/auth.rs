//! Credentials for the remote compute service.

use crate::error::{CloudError, Result};

/// Supplies the authentication headers attached to every request.
pub trait CloudAuth: Send + Sync {
    /// Headers for a `method` request to `url`.
    fn headers(&self, method: &str, url: &str) -> Result<Vec<(String, String)>>;
}

/// Sends no credentials, for local or proxied endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAuth;

impl CloudAuth for NoAuth {
    fn headers(&self, _method: &str, _url: &str) -> Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

/// Sends `Authorization: Bearer <token>`.
pub struct BearerToken {
    token: String,
}

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

impl CloudAuth for BearerToken {
    fn headers(&self, _method: &str, _url: &str) -> Result<Vec<(String, String)>> {
        let token = self.token.trim();
        if token.is_empty() {
            return Err(CloudError::Auth("empty bearer token".to_string()));
        }
        Ok(vec![("Authorization".to_string(), format!("Bearer {token}"))])
    }
}

/// Bearer auth when a non-blank token is given, otherwise none.
pub fn from_token(token: Option<&str>) -> Box<dyn CloudAuth> {
    match token.map(str::trim) {
        Some(t) if !t.is_empty() => Box::new(BearerToken::new(t)),
        _ => Box::new(NoAuth),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header() {
        let headers = BearerToken::new("abc").headers("POST", "https://x").unwrap();
        assert_eq!(headers, vec![("Authorization".to_string(), "Bearer abc".to_string())]);
    }

    #[test]
    fn test_empty_token_rejected() {
        assert!(BearerToken::new(" ").headers("POST", "https://x").is_err());
    }

    #[test]
    fn test_from_token() {
        assert!(from_token(None).headers("GET", "u").unwrap().is_empty());
        assert!(from_token(Some("  ")).headers("GET", "u").unwrap().is_empty());
        assert_eq!(from_token(Some("t")).headers("GET", "u").unwrap().len(), 1);
    }
}

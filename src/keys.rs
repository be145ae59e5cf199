//! Credential store.
//!
//! Holds the two optional secrets the tool uses: the generation-API key and
//! a GitHub token. Loaded once and injected into the clients that need
//! them, so the streaming core stays free of ambient global lookups.

use secrecy::SecretString;

/// The two secrets the tool works with. Both optional; the Gemini client
/// fails fast when the API key is absent, the GitHub client just sends
/// unauthenticated requests without a token.
#[derive(Default)]
pub struct KeyStore {
    api_key: Option<SecretString>,
    github_token: Option<SecretString>,
}

impl KeyStore {
    /// Load keys from the environment, sourcing `.env` first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            api_key: env_secret("GEMINI_API_KEY"),
            github_token: env_secret("GITHUB_TOKEN"),
        }
    }

    /// A store with no secrets at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn github_token(&self) -> Option<&SecretString> {
        self.github_token.as_ref()
    }

    pub fn set_api_key(&mut self, key: String) {
        self.api_key = Some(SecretString::from(key));
    }

    pub fn set_github_token(&mut self, token: String) {
        self.github_token = Some(SecretString::from(token));
    }

    /// Drop both secrets.
    pub fn clear(&mut self) {
        self.api_key = None;
        self.github_token = None;
    }
}

/// Read an env var as a secret, treating empty/whitespace values as unset.
fn env_secret(name: &str) -> Option<SecretString> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

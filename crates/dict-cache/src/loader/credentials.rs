use git2::{Cred, CredentialType, RemoteCallbacks};
use log::debug;

const TOKEN_DEFAULT_USER: &str = "oauth2";

/// Authentication material for the remote repository.
#[derive(Clone, Default)]
pub struct GitCredentials {
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl std::fmt::Debug for GitCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCredentials")
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl GitCredentials {
    /// Username/secret pair to present, or `None` for anonymous access.
    ///
    /// A personal access token must be presented with the account's real
    /// username; `oauth2` is only correct for OAuth tokens and is used when
    /// no username is configured.
    pub fn user_pass(&self) -> Option<(String, String)> {
        if let Some(token) = non_empty(self.token.as_deref()) {
            let user = non_empty(self.username.as_deref()).unwrap_or(TOKEN_DEFAULT_USER);
            return Some((user.to_string(), token.to_string()));
        }
        let user = non_empty(self.username.as_deref())?;
        let password = self.password.as_deref().unwrap_or("");
        Some((user.to_string(), password.to_string()))
    }

    /// Remote callbacks that answer the credential challenge once. A second
    /// challenge means the credentials were rejected; failing it stops libgit2
    /// from retrying the same pair forever.
    pub(crate) fn callbacks(&self) -> RemoteCallbacks<'static> {
        let pair = self.user_pass();
        let mut attempts = 0u32;
        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(move |_url, _username_from_url, allowed| {
            attempts += 1;
            if attempts > 1 {
                return Err(git2::Error::new(
                    git2::ErrorCode::Auth,
                    git2::ErrorClass::Http,
                    "credentials rejected by remote",
                ));
            }
            match &pair {
                Some((user, secret)) if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) => {
                    debug!("Presenting credentials for user {user}");
                    Cred::userpass_plaintext(user, secret)
                }
                _ => Cred::default(),
            }
        });
        callbacks
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_uses_configured_username() {
        let creds = GitCredentials {
            token: Some("glpat-123".into()),
            username: Some("alice".into()),
            password: Some("ignored".into()),
        };
        assert_eq!(
            creds.user_pass(),
            Some(("alice".to_string(), "glpat-123".to_string()))
        );
    }

    #[test]
    fn token_without_username_falls_back_to_oauth2() {
        let creds = GitCredentials {
            token: Some("tok".into()),
            username: Some("  ".into()),
            password: None,
        };
        assert_eq!(
            creds.user_pass(),
            Some(("oauth2".to_string(), "tok".to_string()))
        );
    }

    #[test]
    fn username_password_without_token() {
        let creds = GitCredentials {
            token: None,
            username: Some("bob".into()),
            password: Some("secret".into()),
        };
        assert_eq!(
            creds.user_pass(),
            Some(("bob".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn nothing_configured_is_anonymous() {
        assert_eq!(GitCredentials::default().user_pass(), None);
    }

    #[test]
    fn debug_output_masks_secrets() {
        let creds = GitCredentials {
            token: Some("glpat-secret".into()),
            username: Some("alice".into()),
            password: Some("hunter2".into()),
        };
        let printed = format!("{creds:?}");
        assert!(!printed.contains("glpat-secret"));
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("alice"));
    }
}

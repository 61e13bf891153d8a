use serde_json::Value;

use crate::client::{decode, KasaClient, Reply};
use crate::error::{Error, Result};
use crate::types::{LoginResponse, ServiceRequest};

/// Extract the session token from a successful login reply.
pub(crate) fn token_from_response(body: &Value) -> Result<String> {
    let response: LoginResponse = decode(body)?;
    Ok(response.result.token)
}

impl KasaClient {
    /// Log in with the stored credentials and replace the session token.
    ///
    /// Login requests are never retried: a token-expiry reply here is
    /// reported as [`Error::Token`].
    pub async fn authenticate(&mut self) -> Result<()> {
        self.logger.debug(&format!(
            "Getting token for user: {}",
            self.credentials().login
        ));

        let request =
            ServiceRequest::login(&self.credentials().login, &self.credentials().password);

        let body = match self.post_once(&request, false).await? {
            Reply::Success(body) => body,
            Reply::TokenExpired => {
                self.logger.warning("Token expired reply to login request");
                return Err(Error::Token);
            }
        };

        let token = token_from_response(&body).map_err(|err| {
            self.logger.error("Login response carries no token");
            err
        })?;
        self.set_token(token);

        self.logger.debug("Authentication successful");
        Ok(())
    }
}

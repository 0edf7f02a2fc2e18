use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument};

use super::FirebaseBackend;
use crate::backend::{AccountInfo, BackendError, IdentityAccount, IdentityProvider, ProfileChanges};

/// Response of `signUp` and `signInWithPassword`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    local_id: String,
    #[serde(default)]
    email: String,
    id_token: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LookupUser {
    local_id: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    email_verified: bool,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<LookupUser>,
}

impl FirebaseBackend {
    async fn accounts_call(&self, operation: &str, body: Value) -> Result<Value, BackendError> {
        let url = format!("{}:{}", self.identity_base, operation);
        self.execute(self.client.post(url).json(&body)).await
    }
}

fn parse<T: for<'de> Deserialize<'de>>(value: Value) -> Result<T, BackendError> {
    serde_json::from_value(value).map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

impl From<AuthResponse> for IdentityAccount {
    fn from(response: AuthResponse) -> Self {
        IdentityAccount {
            uid: response.local_id,
            email: response.email,
            id_token: response.id_token,
            display_name: response.display_name.filter(|name| !name.is_empty()),
        }
    }
}

#[async_trait]
impl IdentityProvider for FirebaseBackend {
    #[instrument(skip(self, password))]
    async fn create_account(&self, email: &str, password: &str) -> Result<IdentityAccount, BackendError> {
        let response = self
            .accounts_call(
                "signUp",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        let account: AuthResponse = parse(response)?;
        debug!(uid = %account.local_id, "Created identity account");
        Ok(account.into())
    }

    #[instrument(skip(self, password))]
    async fn sign_in(&self, email: &str, password: &str) -> Result<IdentityAccount, BackendError> {
        let response = self
            .accounts_call(
                "signInWithPassword",
                json!({ "email": email, "password": password, "returnSecureToken": true }),
            )
            .await?;
        Ok(parse::<AuthResponse>(response)?.into())
    }

    #[instrument(skip_all)]
    async fn lookup(&self, id_token: &str) -> Result<AccountInfo, BackendError> {
        let response = self.accounts_call("lookup", json!({ "idToken": id_token })).await?;
        let user = parse::<LookupResponse>(response)?
            .users
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::Rejected("USER_NOT_FOUND".to_string()))?;

        Ok(AccountInfo {
            uid: user.local_id,
            email: user.email,
            email_verified: user.email_verified,
            display_name: user.display_name.filter(|name| !name.is_empty()),
        })
    }

    #[instrument(skip_all)]
    async fn send_email_verification(&self, id_token: &str) -> Result<(), BackendError> {
        self.accounts_call(
            "sendOobCode",
            json!({ "requestType": "VERIFY_EMAIL", "idToken": id_token }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn send_password_reset(&self, email: &str) -> Result<(), BackendError> {
        self.accounts_call(
            "sendOobCode",
            json!({ "requestType": "PASSWORD_RESET", "email": email }),
        )
        .await?;
        Ok(())
    }

    #[instrument(skip(self, id_token))]
    async fn update_profile(&self, id_token: &str, changes: &ProfileChanges) -> Result<Option<String>, BackendError> {
        let mut body = json!({ "idToken": id_token, "returnSecureToken": true });
        if let Some(name) = &changes.display_name {
            body["displayName"] = json!(name);
        }
        if let Some(email) = &changes.email {
            body["email"] = json!(email);
        }

        let response = self.accounts_call("update", body).await?;
        Ok(response
            .get("idToken")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn sign_out(&self, _id_token: &str) -> Result<(), BackendError> {
        // Identity tokens are stateless; the session cookie is what gets dropped
        debug!("Identity sign-out is local only");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_account(&self, uid: &str) -> Result<(), BackendError> {
        if self.access_token.is_none() {
            return Err(BackendError::Unavailable(
                "deleting accounts requires a service access token".to_string(),
            ));
        }

        match self.accounts_call("delete", json!({ "localId": uid })).await {
            Ok(_) => Ok(()),
            Err(BackendError::Rejected(code)) if code == "USER_NOT_FOUND" => {
                Err(BackendError::NotFound(format!("account {}", uid)))
            }
            Err(e) => Err(e),
        }
    }
}

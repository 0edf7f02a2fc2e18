use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::SessionConfig;
use crate::models::SessionUser;

/// Encrypted cookie payload; expiry is checked on every read
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    user: SessionUser,
    expires_at: i64,
}

/// Signed-in user from the session cookie, if present and not expired
pub fn read_session(jar: &PrivateCookieJar, config: &SessionConfig) -> Option<SessionUser> {
    let cookie = jar.get(&config.cookie_name)?;
    let stored: StoredSession = serde_json::from_str(cookie.value()).ok()?;

    if stored.expires_at <= Utc::now().timestamp() {
        return None;
    }
    Some(stored.user)
}

pub fn store_session(
    jar: PrivateCookieJar,
    config: &SessionConfig,
    user: &SessionUser,
) -> Result<PrivateCookieJar, serde_json::Error> {
    let stored = StoredSession {
        user: user.clone(),
        expires_at: Utc::now().timestamp() + config.max_age_seconds,
    };
    let value = serde_json::to_string(&stored)?;

    Ok(jar.add(
        Cookie::build((config.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(config.secure)
            .same_site(SameSite::Lax),
    ))
}

pub fn clear_session(jar: PrivateCookieJar, config: &SessionConfig) -> PrivateCookieJar {
    jar.remove(Cookie::build((config.cookie_name.clone(), "")).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use axum_extra::extract::cookie::Key;

    fn user() -> SessionUser {
        SessionUser {
            uid: "u1".to_string(),
            email: "ana@x.com".to_string(),
            name: "Ana".to_string(),
            role: Role::Admin,
            id_token: "token".to_string(),
        }
    }

    #[test]
    fn test_session_round_trip_and_clear() {
        let config = SessionConfig::default();
        let jar = PrivateCookieJar::new(Key::generate());

        let jar = store_session(jar, &config, &user()).unwrap();
        assert_eq!(read_session(&jar, &config), Some(user()));

        let jar = clear_session(jar, &config);
        assert_eq!(read_session(&jar, &config), None);
    }

    #[test]
    fn test_expired_session_is_ignored() {
        let config = SessionConfig {
            max_age_seconds: -1,
            ..SessionConfig::default()
        };
        let jar = store_session(PrivateCookieJar::new(Key::generate()), &config, &user()).unwrap();

        assert_eq!(read_session(&jar, &config), None);
    }
}

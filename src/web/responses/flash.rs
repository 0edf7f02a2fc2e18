use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

impl FlashKind {
    fn as_str(&self) -> &'static str {
        match self {
            FlashKind::Success => "success",
            FlashKind::Error => "error",
        }
    }
}

/// One-shot message shown on the next rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn new(kind: FlashKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Success, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Error, message)
    }

    /// Cookie value `kind:message`; the jar percent-encodes it on the way out
    fn encode(&self) -> String {
        format!("{}:{}", self.kind.as_str(), self.message)
    }

    fn decode(value: &str) -> Option<Self> {
        let (kind, message) = value.split_once(':')?;
        let kind = match kind {
            "success" => FlashKind::Success,
            "error" => FlashKind::Error,
            _ => return None,
        };
        Some(Self::new(kind, message))
    }
}

/// Queue a flash message for the next request
pub fn set_flash(jar: CookieJar, flash: &Flash) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, flash.encode()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax),
    )
}

/// Read the pending flash message, if any, and drop it from the jar
pub fn take_flash(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    match jar.get(FLASH_COOKIE).map(|cookie| Flash::decode(cookie.value())) {
        Some(flash) => (jar.remove(Cookie::build((FLASH_COOKIE, "")).path("/")), flash),
        None => (jar, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_stored_verbatim() {
        let flash = Flash::error("Correo ya registrado: ana@x.com; intente otro");
        let jar = set_flash(CookieJar::new(), &flash);

        let value = jar.get(FLASH_COOKIE).unwrap().value().to_string();
        assert_eq!(value, "error:Correo ya registrado: ana@x.com; intente otro");
        assert_eq!(Flash::decode(&value), Some(flash));
    }

    #[test]
    fn test_take_removes_the_message() {
        let jar = set_flash(CookieJar::new(), &Flash::success("Usuario creado"));

        let (jar, flash) = take_flash(jar);
        assert_eq!(flash, Some(Flash::success("Usuario creado")));
        assert!(jar.get(FLASH_COOKIE).is_none());

        let (_, again) = take_flash(jar);
        assert_eq!(again, None);
    }

    #[test]
    fn test_garbage_cookie_is_ignored() {
        assert_eq!(Flash::decode("bogus"), None);
        assert_eq!(Flash::decode("warning:hola"), None);
    }
}

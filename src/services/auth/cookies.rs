//! Minimal cookie helpers for the session and login-verification cookies.
//!
//! Every cookie is `HttpOnly; Path=/; SameSite=Lax`. The provider returns to
//! `/callback` with a top-level GET, which Lax cookies survive.
use axum::http::{HeaderMap, header};

/// Read a cookie value from all `Cookie` headers.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Build a `Set-Cookie` value.
pub fn set_cookie(name: &str, value: &str, max_age: i64, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; Max-Age={}; SameSite=Lax",
        name,
        value,
        max_age.max(0)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

pub fn clear_cookie(name: &str, secure: bool) -> String {
    set_cookie(name, "", 0, secure)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn reads_cookie_among_many() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1; appSession=tok.en.sig"));
        headers.append(header::COOKIE, HeaderValue::from_static("b=2"));

        assert_eq!(read_cookie(&headers, "appSession").as_deref(), Some("tok.en.sig"));
        assert_eq!(read_cookie(&headers, "b").as_deref(), Some("2"));
        assert_eq!(read_cookie(&headers, "missing"), None);
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("appSession="));

        assert_eq!(read_cookie(&headers, "appSession"), None);
    }

    #[test]
    fn builds_set_cookie() {
        assert_eq!(
            set_cookie("appSession", "v", 30, false),
            "appSession=v; Path=/; HttpOnly; Max-Age=30; SameSite=Lax"
        );
        assert_eq!(
            set_cookie("auth_verification", "n", -5, true),
            "auth_verification=n; Path=/; HttpOnly; Max-Age=0; SameSite=Lax; Secure"
        );
        assert_eq!(
            clear_cookie("appSession", true),
            "appSession=; Path=/; HttpOnly; Max-Age=0; SameSite=Lax; Secure"
        );
    }
}

use crate::utils::error::{MonitorError, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use url::Url;

/// Browser storage state as exported by Playwright (`storage_state.json`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Unix seconds, `-1` for a session cookie.
    #[serde(default = "session_expiry")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub same_site: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<NameValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn session_expiry() -> f64 {
    -1.0
}

fn cdp_same_site(value: &str) -> Option<&'static str> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Some("Strict"),
        "lax" => Some("Lax"),
        "none" => Some("None"),
        _ => None,
    }
}

impl StoredCookie {
    pub fn is_expired(&self, now_secs: f64) -> bool {
        self.expires > 0.0 && self.expires <= now_secs
    }

    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let domain = self.domain.to_ascii_lowercase();

        let domain_ok = match domain.strip_prefix('.') {
            Some(bare) => host == bare || host.ends_with(&domain),
            None => host == domain,
        };
        let secure_ok = !self.secure || url.scheme() == "https";

        domain_ok && secure_ok && url.path().starts_with(&self.path)
    }

    /// `Set-Cookie` style line, used to seed a cookie jar.
    pub fn to_set_cookie(&self) -> String {
        let mut line = format!("{}={}; Path={}", self.name, self.value, self.path);
        if self.domain.starts_with('.') {
            line.push_str("; Domain=");
            line.push_str(&self.domain);
        }
        if self.secure {
            line.push_str("; Secure");
        }
        if self.http_only {
            line.push_str("; HttpOnly");
        }
        line
    }

    /// DevTools `Network.CookieParam` shape, so the browser scopes the cookie
    /// to its own domain and path.
    pub fn to_browser_cookie(&self) -> Value {
        let mut param = json!({
            "name": self.name,
            "value": self.value,
            "domain": self.domain,
            "path": self.path,
            "secure": self.secure,
            "httpOnly": self.http_only,
        });
        if let Some(same_site) = self.same_site.as_deref().and_then(cdp_same_site) {
            param["sameSite"] = json!(same_site);
        }
        if self.expires > 0.0 {
            param["expires"] = json!(self.expires);
        }
        param
    }

    /// URL the cookie belongs to, for cookie jars keyed by origin.
    pub fn origin_url(&self) -> Option<Url> {
        let scheme = if self.secure { "https" } else { "http" };
        Url::parse(&format!(
            "{}://{}{}",
            scheme,
            self.domain.trim_start_matches('.'),
            self.path
        ))
        .ok()
    }
}

impl SessionState {
    /// Reads the storage state file; a missing or unreadable file is fatal.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let label = path.display().to_string();
        if !path.exists() {
            return Err(MonitorError::SessionError {
                path: label,
                message: "session file not found".to_string(),
            });
        }
        let bytes = std::fs::read(path).map_err(|e| MonitorError::SessionError {
            path: label.clone(),
            message: e.to_string(),
        })?;
        Self::from_slice(&bytes, &label)
    }

    pub fn from_slice(bytes: &[u8], label: &str) -> Result<Self> {
        let state: SessionState =
            serde_json::from_slice(bytes).map_err(|e| MonitorError::SessionError {
                path: label.to_string(),
                message: format!("invalid storage state: {}", e),
            })?;
        tracing::debug!(
            "Session loaded from {}: {} cookies, {} origins",
            label,
            state.cookies.len(),
            state.origins.len()
        );
        Ok(state)
    }

    /// Cookies not yet expired.
    pub fn live_cookies(&self) -> impl Iterator<Item = &StoredCookie> {
        let now = Utc::now().timestamp() as f64;
        self.cookies.iter().filter(move |c| !c.is_expired(now))
    }

    /// Live cookies a browser would send to `url`.
    pub fn cookies_for(&self, url: &str) -> Vec<&StoredCookie> {
        let Ok(url) = Url::parse(url) else {
            return Vec::new();
        };
        self.live_cookies().filter(|c| c.matches(&url)).collect()
    }

    /// Script restoring `origins[].localStorage` for whichever origin the
    /// page is on. Keys the site already holds are left alone. Evaluates to
    /// `true` when it wrote anything.
    pub fn local_storage_script(&self) -> Option<String> {
        let entries: Map<String, Value> = self
            .origins
            .iter()
            .filter(|o| !o.local_storage.is_empty())
            .map(|o| {
                let items: Vec<Value> = o
                    .local_storage
                    .iter()
                    .map(|item| json!([item.name, item.value]))
                    .collect();
                (o.origin.trim_end_matches('/').to_string(), Value::Array(items))
            })
            .collect();
        if entries.is_empty() {
            return None;
        }

        Some(format!(
            "(() => {{ const items = ({})[window.location.origin]; \
             if (!items) return false; \
             let changed = false; \
             for (const [k, v] of items) {{ \
             if (window.localStorage.getItem(k) === null) {{ \
             window.localStorage.setItem(k, v); changed = true; }} }} \
             return changed; }})()",
            Value::Object(entries)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const STATE: &str = r#"{
        "cookies": [
            {"name": "sid", "value": "abc", "domain": ".altered.gg", "path": "/",
             "expires": -1, "httpOnly": true, "secure": true, "sameSite": "Lax"},
            {"name": "www_only", "value": "1", "domain": "www.altered.gg", "path": "/fr-fr",
             "expires": 4102444800, "httpOnly": false, "secure": false, "sameSite": "None"},
            {"name": "old", "value": "x", "domain": ".altered.gg", "path": "/",
             "expires": 946684800, "httpOnly": false, "secure": false, "sameSite": "Lax"}
        ],
        "origins": [
            {"origin": "https://www.altered.gg", "localStorage": [{"name": "lang", "value": "fr"}]}
        ]
    }"#;

    #[test]
    fn test_parse_storage_state() {
        let state = SessionState::from_slice(STATE.as_bytes(), "test").unwrap();
        assert_eq!(state.cookies.len(), 3);
        assert_eq!(state.origins[0].local_storage[0].name, "lang");
        assert!(state.cookies[0].http_only);
        assert_eq!(state.live_cookies().count(), 2);
    }

    fn names(cookies: Vec<&StoredCookie>) -> Vec<&str> {
        cookies.into_iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_cookie_matching() {
        let state = SessionState::from_slice(STATE.as_bytes(), "test").unwrap();

        assert_eq!(
            names(state.cookies_for("https://www.altered.gg/fr-fr/cards/market")),
            vec!["sid", "www_only"]
        );
        // 子網域只拿到 domain cookie
        assert_eq!(
            names(state.cookies_for("https://auth.altered.gg/login")),
            vec!["sid"]
        );
        // secure cookie 不送到 http
        assert!(state.cookies_for("http://altered.gg/").is_empty());
        assert!(state.cookies_for("https://cdn.example.com/app.js").is_empty());
        assert!(state.cookies_for("not a url").is_empty());
    }

    #[test]
    fn test_browser_cookie_params() {
        let state = SessionState::from_slice(STATE.as_bytes(), "test").unwrap();

        let sid = state.cookies[0].to_browser_cookie();
        assert_eq!(sid["domain"], ".altered.gg");
        assert_eq!(sid["httpOnly"], true);
        assert_eq!(sid["secure"], true);
        assert_eq!(sid["sameSite"], "Lax");
        // session cookie 不帶 expires
        assert!(sid.get("expires").is_none());

        let www = state.cookies[1].to_browser_cookie();
        assert_eq!(www["path"], "/fr-fr");
        assert_eq!(www["expires"], 4102444800.0);
        assert_eq!(www["sameSite"], "None");
    }

    #[test]
    fn test_local_storage_script() {
        let state = SessionState::from_slice(STATE.as_bytes(), "test").unwrap();
        let script = state.local_storage_script().unwrap();
        assert!(script.contains(r#"{"https://www.altered.gg":[["lang","fr"]]}"#));
        assert!(script.contains("window.location.origin"));
        assert!(script.contains("localStorage.setItem(k, v)"));

        let quoted = SessionState::from_slice(
            br#"{"origins": [{"origin": "https://auth.altered.gg/",
                 "localStorage": [{"name": "oidc.user", "value": "{\"token\":\"a'b\"}"}]},
                {"origin": "https://empty.example", "localStorage": []}]}"#,
            "test",
        )
        .unwrap();
        let script = quoted.local_storage_script().unwrap();
        assert!(script.contains(r#""https://auth.altered.gg":[["oidc.user","{\"token\":\"a'b\"}"]]"#));
        assert!(!script.contains("empty.example"));

        assert!(SessionState::default().local_storage_script().is_none());
    }

    #[test]
    fn test_missing_file_is_session_error() {
        let err = SessionState::from_file("/nonexistent/storage_state.json").unwrap_err();
        assert!(matches!(err, MonitorError::SessionError { .. }));
    }

    #[test]
    fn test_invalid_json_is_session_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        let err = SessionState::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("invalid storage state"));
    }

    #[test]
    fn test_set_cookie_line() {
        let state = SessionState::from_slice(STATE.as_bytes(), "test").unwrap();
        assert_eq!(
            state.cookies[0].to_set_cookie(),
            "sid=abc; Path=/; Domain=.altered.gg; Secure; HttpOnly"
        );
        assert_eq!(
            state.cookies[1].origin_url().unwrap().as_str(),
            "http://www.altered.gg/fr-fr"
        );
    }
}

//! Cookie helpers
//!
//! Parse the `Cookie` request header and serialize `Set-Cookie` values.

use smallvec::SmallVec;
use std::collections::HashMap;

/// Cookie SameSite attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// HTTP Cookie
#[derive(Debug, Clone, PartialEq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub path: Option<String>,
    pub domain: Option<String>,
    pub max_age: Option<i64>, // Seconds
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: None,
            domain: None,
            max_age: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = Some(seconds);
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Serialize to Set-Cookie header value
    ///
    /// A negative max-age is sent as `Max-Age=0` (delete now); zero or absent
    /// omits the attribute.
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if let Some(ref path) = self.path {
            parts.push(format!("Path={}", path));
        }
        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={}", domain));
        }
        match self.max_age {
            Some(age) if age > 0 => parts.push(format!("Max-Age={}", age)),
            Some(age) if age < 0 => parts.push("Max-Age=0".to_string()),
            _ => {}
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={}", same_site.as_str()));
        }

        parts.join("; ")
    }

    /// Create a deletion cookie
    pub fn delete(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age(-1)
    }
}

/// Cookies sent by the client
#[derive(Debug, Default, Clone)]
pub struct CookieJar {
    cookies: HashMap<String, Cookie>,
    order: SmallVec<[String; 4]>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse cookies from a Cookie header. The first cookie of a given name wins.
    pub fn parse(header: &str) -> Self {
        let mut jar = Self::new();

        for part in header.split(';') {
            let part = part.trim();
            if let Some((name, value)) = part.split_once('=') {
                let name = name.trim();
                if name.is_empty() || jar.cookies.contains_key(name) {
                    continue;
                }
                let value = value.trim().trim_matches('"');
                jar.order.push(name.to_string());
                jar.cookies.insert(name.to_string(), Cookie::new(name, value));
            }
        }

        jar
    }

    /// Get a cookie by name
    pub fn get(&self, name: &str) -> Option<&Cookie> {
        self.cookies.get(name)
    }

    /// Get cookie value by name
    pub fn get_value(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|c| c.value.as_str())
    }

    /// Check if jar has a cookie
    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Cookie names in header order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_serialize() {
        let cookie = Cookie::new("session", "abc123")
            .path("/")
            .domain("example.com")
            .max_age(3600)
            .secure(true)
            .http_only(true)
            .same_site(SameSite::Strict);

        assert_eq!(
            cookie.to_header_value(),
            "session=abc123; Path=/; Domain=example.com; Max-Age=3600; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn test_cookie_jar_parse() {
        let jar = CookieJar::parse("session=abc123; theme=\"dark\"; lang=en; session=dup");

        assert_eq!(jar.get_value("session"), Some("abc123"));
        assert_eq!(jar.get_value("theme"), Some("dark"));
        assert_eq!(jar.get_value("lang"), Some("en"));
        assert_eq!(jar.get_value("missing"), None);
        assert_eq!(jar.names().collect::<Vec<_>>(), vec!["session", "theme", "lang"]);
    }

    #[test]
    fn test_cookie_delete() {
        let cookie = Cookie::delete("session");
        assert!(cookie.to_header_value().contains("Max-Age=0"));
    }
}

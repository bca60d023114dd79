//! Session cookies picked up from `Set-Cookie` and sent back on later requests.

use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    value: String,
    path: Option<String>,
    domain: Option<String>,
}

impl Cookie {
    fn matches(&self, host: &str, path: &str) -> bool {
        let path_ok = self
            .path
            .as_deref()
            .is_none_or(|prefix| path.starts_with(prefix));
        let domain_ok = self.domain.as_deref().is_none_or(|domain| {
            let domain = domain.trim_start_matches('.');
            host.eq_ignore_ascii_case(domain)
                || host
                    .to_ascii_lowercase()
                    .ends_with(&format!(".{}", domain.to_ascii_lowercase()))
        });
        path_ok && domain_ok
    }
}

#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: IndexMap<String, Cookie>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a cookie for every later request, or remove it with `None`.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                self.cookies.insert(
                    name.to_string(),
                    Cookie {
                        value: value.to_string(),
                        path: None,
                        domain: None,
                    },
                );
            }
            None => {
                self.cookies.shift_remove(name);
            }
        }
    }

    /// Apply one `Set-Cookie` header value.
    pub fn absorb(&mut self, set_cookie: &str) {
        let mut parts = set_cookie.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        let mut cookie = Cookie {
            value: value.trim().trim_matches('"').to_string(),
            path: None,
            domain: None,
        };
        let mut expired = false;
        for attr in parts {
            let (key, val) = attr.split_once('=').unwrap_or((attr, ""));
            let val = val.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "path" if !val.is_empty() => cookie.path = Some(val.to_string()),
                "domain" if !val.is_empty() => cookie.domain = Some(val.to_string()),
                "max-age" => expired = val.parse::<i64>().is_ok_and(|age| age <= 0),
                _ => {}
            }
        }

        if expired {
            trace!(cookie = name, "server expired cookie");
            self.cookies.shift_remove(name);
        } else {
            trace!(cookie = name, "stored cookie");
            self.cookies.insert(name.to_string(), cookie);
        }
    }

    /// `name=value` pairs applicable to a request for `host` and `path`.
    pub fn pairs_for(&self, host: &str, path: &str) -> Vec<(String, String)> {
        self.cookies
            .iter()
            .filter(|(_, cookie)| cookie.matches(host, path))
            .map(|(name, cookie)| (name.clone(), cookie.value.clone()))
            .collect()
    }

    /// Name to `[value, path?, domain?]`.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<String>> {
        self.cookies
            .iter()
            .map(|(name, cookie)| {
                let mut entry = vec![cookie.value.clone()];
                entry.extend(cookie.path.clone());
                entry.extend(cookie.domain.clone());
                (name.clone(), entry)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }
}

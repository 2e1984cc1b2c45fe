//! Request-target decomposition.

use url::Url;

/// Components of a request target.
///
/// Origin-form targets (`/tunnel?x=1`) fill only path/query/fragment;
/// absolute-form targets (`http://user@host:8080/tunnel`) fill the rest too.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    /// The target exactly as received.
    pub full: String,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: String,
    pub fragment: String,
    pub userinfo: String,
}

impl UrlParts {
    /// Split a request target; `None` if it is neither origin- nor
    /// absolute-form (or `*`).
    pub fn parse(target: &str) -> Option<Self> {
        if target.is_empty() {
            return None;
        }
        if target == "*" {
            return Some(Self {
                full: target.to_string(),
                path: target.to_string(),
                ..Self::default()
            });
        }
        if target.starts_with('/') {
            return Some(Self::origin_form(target));
        }

        let url = Url::parse(target).ok()?;
        let userinfo = match (url.username(), url.password()) {
            ("", None) => String::new(),
            (user, None) => user.to_string(),
            (user, Some(pass)) => format!("{}:{}", user, pass),
        };
        Some(Self {
            full: target.to_string(),
            host: url.host_str().unwrap_or_default().to_string(),
            port: url.port(),
            path: url.path().to_string(),
            query: url.query().unwrap_or_default().to_string(),
            fragment: url.fragment().unwrap_or_default().to_string(),
            userinfo,
        })
    }

    fn origin_form(target: &str) -> Self {
        let (rest, fragment) = match target.split_once('#') {
            Some((rest, fragment)) => (rest, fragment),
            None => (target, ""),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, query),
            None => (rest, ""),
        };
        Self {
            full: target.to_string(),
            path: path.to_string(),
            query: query.to_string(),
            fragment: fragment.to_string(),
            ..Self::default()
        }
    }
}

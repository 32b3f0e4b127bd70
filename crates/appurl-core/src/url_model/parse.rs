//! Raw URL decomposition and its exact inverse.
//!
//! Grammar: `[ext+]scheme:[//[user[:password]@]host[:port]][path][?query][#fragment]`.
//! A string without a scheme is a `file` path. Nothing is percent-decoded, so
//! serializing the parts and parsing them again yields equal parts.

use std::fmt;

use super::fragment::Fragment;
use crate::error::{Error, Result};

/// Decomposed address, before a variant is attached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UrlParts {
    /// Transport scheme, lowercased (`http` in `socrata+http`).
    pub scheme: String,
    /// Application prefix before `+`, lowercased (`socrata` in `socrata+http`).
    pub scheme_extension: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
    pub fragment: Fragment,
}

impl UrlParts {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::AppUrl("cannot parse an empty URL".to_string()));
        }

        let (rest, fragment) = match raw.split_once('#') {
            Some((before, frag)) => (before, Fragment::parse(frag)),
            None => (raw, Fragment::default()),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((before, q)) => (before, Some(q.to_string())),
            None => (rest, None),
        };

        let mut parts = UrlParts {
            query,
            fragment,
            ..Default::default()
        };

        let rest = match split_scheme(rest) {
            Some((token, after)) => {
                let token = token.to_ascii_lowercase();
                match token.rsplit_once('+') {
                    Some((ext, scheme)) if !ext.is_empty() && !scheme.is_empty() => {
                        parts.scheme_extension = Some(ext.to_string());
                        parts.scheme = scheme.to_string();
                    }
                    _ => parts.scheme = token,
                }
                after
            }
            None => {
                parts.scheme = "file".to_string();
                rest
            }
        };

        match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find('/').unwrap_or(after.len());
                parse_authority(&after[..end], raw, &mut parts)?;
                parts.path = after[end..].to_string();
            }
            None => parts.path = rest.to_string(),
        }

        Ok(parts)
    }

    /// `scheme_extension` when present, otherwise `scheme`.
    pub fn proto(&self) -> &str {
        self.scheme_extension.as_deref().unwrap_or(&self.scheme)
    }

    fn has_authority(&self) -> bool {
        !self.host.is_empty()
            || self.username.is_some()
            || self.password.is_some()
            || self.port.is_some()
            || self.path.starts_with('/')
    }

    /// Writes the URL; the fragment and scheme extension are optional so the
    /// same routine yields both the logical and the transport form.
    pub(crate) fn write_to(
        &self,
        f: &mut impl fmt::Write,
        with_extension: bool,
        with_fragment: bool,
    ) -> fmt::Result {
        if with_extension {
            if let Some(ext) = &self.scheme_extension {
                write!(f, "{}+", ext)?;
            }
        }
        write!(f, "{}:", self.scheme)?;
        if self.has_authority() {
            f.write_str("//")?;
            if self.username.is_some() || self.password.is_some() {
                f.write_str(self.username.as_deref().unwrap_or(""))?;
                if let Some(password) = &self.password {
                    write!(f, ":{}", password)?;
                }
                f.write_char('@')?;
            }
            f.write_str(&self.host)?;
            if let Some(port) = self.port {
                write!(f, ":{}", port)?;
            }
        }
        f.write_str(&self.path)?;
        if let Some(query) = &self.query {
            write!(f, "?{}", query)?;
        }
        if with_fragment && !self.fragment.is_empty() {
            write!(f, "#{}", self.fragment)?;
        }
        Ok(())
    }

    pub(crate) fn to_url_string(&self, with_extension: bool, with_fragment: bool) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_to(&mut out, with_extension, with_fragment);
        out
    }
}

impl fmt::Display for UrlParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_to(f, true, true)
    }
}

/// Splits `scheme:rest`. Single-letter prefixes are not schemes (drive letters).
fn split_scheme(s: &str) -> Option<(&str, &str)> {
    let (token, rest) = s.split_once(':')?;
    let mut chars = token.chars();
    let first = chars.next()?;
    if token.len() < 2 || !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some((token, rest))
}

fn parse_authority(authority: &str, raw: &str, parts: &mut UrlParts) -> Result<()> {
    let hostport = match authority.rsplit_once('@') {
        Some((userinfo, hostport)) => {
            let (user, password) = match userinfo.split_once(':') {
                Some((u, p)) => (u, Some(p.to_string())),
                None => (userinfo, None),
            };
            parts.username = (!user.is_empty()).then(|| user.to_string());
            parts.password = password;
            hostport
        }
        None => authority,
    };

    // Bracketed IPv6 literals keep their colons.
    let port_sep = if hostport.starts_with('[') {
        hostport
            .find(']')
            .and_then(|end| hostport[end..].find(':').map(|i| end + i))
    } else {
        hostport.rfind(':')
    };

    match port_sep {
        Some(i) => {
            let port = &hostport[i + 1..];
            parts.port = Some(port.parse::<u16>().map_err(|_| {
                Error::AppUrl(format!("invalid port '{}' in URL '{}'", port, raw))
            })?);
            parts.host = hostport[..i].to_string();
        }
        None => parts.host = hostport.to_string(),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(raw: &str) -> UrlParts {
        let parts = UrlParts::parse(raw).unwrap();
        let again = UrlParts::parse(&parts.to_string()).unwrap();
        assert_eq!(parts, again, "round trip of {}", raw);
        parts
    }

    #[test]
    fn http_with_everything() {
        let p = roundtrip("HTTP://user:pw@example.com:8080/a/b.zip?x=1&y=2#file.xlsx;0");
        assert_eq!(p.scheme, "http");
        assert_eq!(p.username.as_deref(), Some("user"));
        assert_eq!(p.password.as_deref(), Some("pw"));
        assert_eq!(p.host, "example.com");
        assert_eq!(p.port, Some(8080));
        assert_eq!(p.path, "/a/b.zip");
        assert_eq!(p.query.as_deref(), Some("x=1&y=2"));
        assert_eq!(p.fragment.target_file.as_deref(), Some("file.xlsx"));
        assert_eq!(p.fragment.target_segment.as_deref(), Some("0"));
    }

    #[test]
    fn scheme_extension() {
        let p = roundtrip("socrata+http://example.com/foo/archive.zip");
        assert_eq!(p.scheme, "http");
        assert_eq!(p.scheme_extension.as_deref(), Some("socrata"));
        assert_eq!(p.proto(), "socrata");
        assert_eq!(p.to_string(), "socrata+http://example.com/foo/archive.zip");
    }

    #[test]
    fn bare_and_file_paths() {
        let rel = roundtrip("data/a.csv");
        assert_eq!(rel.scheme, "file");
        assert_eq!(rel.path, "data/a.csv");
        assert_eq!(rel.to_string(), "file:data/a.csv");

        let abs = roundtrip("file:///srv/data/a.csv");
        assert_eq!(abs.host, "");
        assert_eq!(abs.path, "/srv/data/a.csv");
        assert_eq!(abs.to_string(), "file:///srv/data/a.csv");

        let bare_abs = roundtrip("/srv/data/a.csv");
        assert_eq!(bare_abs.scheme, "file");
        assert_eq!(bare_abs.path, "/srv/data/a.csv");
    }

    #[test]
    fn sql_query_in_fragment() {
        let p = roundtrip("sql://mydsn#select * from t where a = 'x?'");
        assert_eq!(p.scheme, "sql");
        assert_eq!(p.host, "mydsn");
        assert_eq!(p.query, None);
        assert_eq!(
            p.fragment.target_file.as_deref(),
            Some("select * from t where a = 'x?'")
        );
    }

    #[test]
    fn ipv6_host_and_bad_port() {
        let p = roundtrip("http://[::1]:9000/x");
        assert_eq!(p.host, "[::1]");
        assert_eq!(p.port, Some(9000));
        assert!(UrlParts::parse("http://host:notaport/x").is_err());
    }

    #[test]
    fn empty_is_an_error() {
        assert!(matches!(UrlParts::parse("  "), Err(Error::AppUrl(_))));
    }
}

//! `Link` value object (§3). Derivation rules are taken from the original
//! implementation's link model: a link's domain/flags come from itself when
//! it is absolute, or are inherited from its parent when it is relative.

/// An extracted link, with flags derived at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Lowercased URL, absolutised against `parent` if it was relative.
    pub url: String,
    pub parent: Option<String>,
    pub is_full: bool,
    pub is_secure: bool,
    pub is_external: bool,
    pub is_subdomain: bool,
}

/// Strips a leading `www.` (or other single subdomain label) to get the
/// "base domain" two links are compared by.
fn base_domain(domain: &str) -> &str {
    match domain.split_once('.') {
        Some((_first, rest)) if domain.starts_with("www") => rest,
        _ => domain,
    }
}

fn split_scheme_domain(url: &str) -> Option<(String, String)> {
    let (scheme, rest) = url.split_once("://")?;
    if scheme != "http" && scheme != "https" {
        return None;
    }
    let domain = match rest.find('/') {
        Some(i) => &rest[..i],
        None => rest,
    };
    Some((scheme.to_string(), domain.to_string()))
}

impl Link {
    /// Builds a `Link` from a raw extracted URL string and its parent page
    /// URL, absolutising and deriving flags as needed.
    ///
    /// # Panics
    /// Panics if `url` is relative and `parent` is `None` ("a relative URL
    /// is useless without a parent", matching the original's behavior).
    pub fn new(url: &str, parent: Option<&str>) -> Self {
        let lowered = url.to_lowercase();
        let self_parts = split_scheme_domain(&lowered);
        let is_full = self_parts.is_some();

        let parent_lower = parent.map(str::to_lowercase);
        let parent_parts = parent_lower.as_deref().and_then(split_scheme_domain);

        let (is_secure, domain) = if let Some((scheme, domain)) = &self_parts {
            (scheme == "https", domain.clone())
        } else if let Some((p_scheme, p_domain)) = &parent_parts {
            (p_scheme == "https", p_domain.clone())
        } else {
            panic!("relative URL is useless without parent");
        };
        let base = base_domain(&domain).to_string();

        let (is_external, is_subdomain) = match &parent_parts {
            Some((_p_scheme, p_domain)) => {
                let parent_base = base_domain(p_domain);
                let external = parent_base != base;
                let subdomain = external && base.contains(parent_base);
                (external, subdomain)
            }
            None => (is_full, false),
        };

        let absolutised = if is_full {
            lowered
        } else {
            let path = if lowered.starts_with('/') {
                lowered
            } else {
                format!("/{lowered}")
            };
            format!("{}://{}{}", if is_secure { "https" } else { "http" }, domain, path)
        };

        Self {
            url: absolutised,
            parent: parent.map(str::to_string),
            is_full,
            is_secure,
            is_external,
            is_subdomain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_link_has_no_external_flag_without_parent() {
        let l = Link::new("HTTP://Example.com/Page", None);
        assert_eq!(l.url, "http://example.com/page");
        assert!(l.is_full);
        assert!(l.is_external);
        assert!(!l.is_subdomain);
        assert!(!l.is_secure);
    }

    #[test]
    fn relative_link_inherits_parent_domain_and_scheme() {
        let l = Link::new("/about", Some("https://example.com/"));
        assert_eq!(l.url, "https://example.com/about");
        assert!(!l.is_full);
        assert!(l.is_secure);
        assert!(!l.is_external);
    }

    #[test]
    fn relative_link_without_leading_slash_gets_one() {
        let l = Link::new("about", Some("http://example.com/x/"));
        assert_eq!(l.url, "http://example.com/about");
    }

    #[test]
    fn subdomain_link_is_external_and_subdomain() {
        let l = Link::new("http://blog.example.com/post", Some("http://example.com/"));
        assert!(l.is_external);
        assert!(l.is_subdomain);
    }

    #[test]
    #[should_panic(expected = "useless without parent")]
    fn relative_link_without_parent_panics() {
        Link::new("/about", None);
    }
}

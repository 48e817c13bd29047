//! Url helpers shared by the chapter transformer, the fetcher and the packager.

use url::Url;

lazy_static! {
    // Url does not support relative urls, use dummy host to convert to absolute
    static ref DUMMY_BASE: Url = Url::parse("https://example.net/").expect("valid dummy base url");
}

/// Resolves `href` against `base`, leaving it untouched when that is not possible.
pub fn resolve_url(base: &str, href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{}", rest);
    }
    if href.starts_with("http://") || href.starts_with("https://") || base.is_empty() {
        return href.to_string();
    }

    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// True when the link has both a scheme and a host.
pub fn is_absolute_url(link: &str) -> bool {
    Url::parse(link).map(|url| url.has_host()).unwrap_or(false)
}

pub fn strip_query_fragment(link: &str) -> &str {
    match link.find(['?', '#']) {
        Some(idx) => &link[..idx],
        None => link,
    }
}

/// Last path segment of the link with query and fragment removed.
pub fn base_name(link: &str) -> &str {
    let clean = strip_query_fragment(link).trim_end_matches('/');
    match clean.rsplit('/').next() {
        Some(".") | None => "",
        Some(name) => name,
    }
}

/// Filename of the resource the link points to, relative links included.
pub fn filename_from_url(link: &str) -> String {
    if link.is_empty() {
        return String::new();
    }

    let url = match Url::parse(link) {
        Ok(url) => url,
        Err(_) => match DUMMY_BASE.join(link) {
            Ok(url) => url,
            Err(_) => return base_name(link).to_string(),
        },
    };

    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .unwrap_or_default();
    // Url keeps segments percent-encoded, files are saved under the decoded name
    match urlencoding::decode(segment) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => segment.to_string(),
    }
}

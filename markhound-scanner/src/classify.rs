use url::Url;

/// Host plus explicit port, lowercased. Empty for URLs without a host.
pub fn netloc(url: &Url) -> String {
    let host = url.host_str().unwrap_or("").to_lowercase();
    match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    }
}

/// Network location of a raw URL string, or an empty string when it does
/// not parse as an absolute URL.
pub fn netloc_of(url: &str) -> String {
    Url::parse(url).map(|u| netloc(&u)).unwrap_or_default()
}

/// True when `candidate` is the main site or one of its subdomains.
/// A leading `www.` is ignored on both sides.
pub fn is_same_site(candidate_netloc: &str, main_netloc: &str) -> bool {
    let main = strip_www(main_netloc);
    let candidate = strip_www(candidate_netloc);
    if candidate.is_empty() {
        return false;
    }
    candidate == main || candidate.ends_with(&format!(".{}", main))
}

fn strip_www(netloc: &str) -> String {
    let lower = netloc.to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

/// Resolve `href` against `base`, keeping query and fragment as written.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let base_url = Url::parse(base).ok()?;
    base_url.join(href).ok().map(|u| u.to_string())
}

/// Only http(s) URLs take part in redirect resolution.
pub fn is_http_url(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

//! Redirect handling (SPEC_FULL §4.10): resolve the target URL for a redirect response and
//! decide whether the method/body carry over.

use url::Url;

use crate::error::{NetfetchError, Result, UrlError};

use super::options::{BodyVariant, Method};

pub struct RedirectOutcome {
    pub url: Url,
    pub method: Method,
    pub drop_body: bool,
}

/// `None` if `status` isn't a redirect status netfetch follows, or the response carries no
/// `Location` header.
pub fn plan_redirect(status: u16, location: Option<&str>, current_url: &Url, method: Method) -> Result<Option<RedirectOutcome>> {
    if !matches!(status, 301 | 302 | 303 | 307 | 308) {
        return Ok(None);
    }
    let Some(location) = location else { return Ok(None) };

    let target = current_url
        .join(location)
        .map_err(|e| NetfetchError::Url(UrlError::Malformed(e.to_string())))?;

    let (next_method, drop_body) = match status {
        307 | 308 => (method, false),
        // 301/302/303: browsers (and most HTTP clients) rewrite non-GET/HEAD to GET and drop
        // the body; GET/HEAD are preserved as-is.
        _ => {
            if matches!(method, Method::Get | Method::Head) {
                (method, false)
            } else {
                (Method::Get, true)
            }
        }
    };

    Ok(Some(RedirectOutcome { url: target, method: next_method, drop_body }))
}

pub fn apply_body_drop(body: &mut BodyVariant, drop_body: bool) {
    if drop_body {
        *body = BodyVariant::None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn non_redirect_status_yields_no_outcome() {
        let outcome = plan_redirect(200, Some("https://example.com/x"), &url("https://example.com"), Method::Get).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn missing_location_yields_no_outcome() {
        let outcome = plan_redirect(301, None, &url("https://example.com"), Method::Get).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn get_is_preserved_across_301() {
        let outcome = plan_redirect(301, Some("/new"), &url("https://example.com/old"), Method::Get)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.method, Method::Get);
        assert!(!outcome.drop_body);
        assert_eq!(outcome.url.as_str(), "https://example.com/new");
    }

    #[test]
    fn post_is_rewritten_to_get_and_body_dropped_on_302() {
        let outcome = plan_redirect(302, Some("/new"), &url("https://example.com/old"), Method::Post)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.method, Method::Get);
        assert!(outcome.drop_body);
    }

    #[test]
    fn post_method_and_body_are_preserved_on_307_and_308() {
        for status in [307, 308] {
            let outcome = plan_redirect(status, Some("/new"), &url("https://example.com/old"), Method::Post)
                .unwrap()
                .unwrap();
            assert_eq!(outcome.method, Method::Post);
            assert!(!outcome.drop_body);
        }
    }

    #[test]
    fn relative_location_resolves_against_current_url() {
        let outcome = plan_redirect(301, Some("next"), &url("https://example.com/a/b"), Method::Get)
            .unwrap()
            .unwrap();
        assert_eq!(outcome.url.as_str(), "https://example.com/a/next");
    }
}

//! `User-Agent` header parsing.
//!
//! Recognizes the browsers, operating systems, and device classes that show
//! up in ordinary web traffic by scanning for well-known product tokens.
//! Anything unrecognized is reported as `unknown` rather than guessed.
//! Tables are ordered: the first match wins, so more specific tokens (Edge,
//! Opera) come before the generic ones they embed (Chrome, Safari).

use tally_types::UserAgentInfo;

/// Reported for attributes that could not be recognized.
pub const UNKNOWN: &str = "unknown";

/// Lowercase substrings that mark automated clients.
///
/// Crawlers that name themselves `...bot/<version>` are caught by
/// [`has_bot_product`] instead, so a device or app whose name merely
/// contains "bot" is not misreported.
const BOT_MARKERS: &[&str] = &[
    "crawler",
    "spider",
    "slurp",
    "slackbot",
    "curl/",
    "wget/",
    "python-requests",
    "go-http-client",
    "headlesschrome",
    "facebookexternalhit",
    "phantomjs",
];

/// A browser recognized by the product token preceding its version.
struct BrowserRule {
    name: &'static str,
    token: &'static str,
    /// Another token that must also be present.
    requires: Option<&'static str>,
}

impl BrowserRule {
    const fn new(name: &'static str, token: &'static str) -> Self {
        Self {
            name,
            token,
            requires: None,
        }
    }

    const fn requiring(self, required: &'static str) -> Self {
        Self {
            requires: Some(required),
            ..self
        }
    }
}

const BROWSERS: &[BrowserRule] = &[
    BrowserRule::new("Edge", "Edg/"),
    BrowserRule::new("Edge", "EdgA/"),
    BrowserRule::new("Edge", "EdgiOS/"),
    BrowserRule::new("Edge", "Edge/"),
    BrowserRule::new("Opera Mini", "Opera Mini/"),
    BrowserRule::new("Opera", "OPR/"),
    BrowserRule::new("Opera", "Opera/"),
    BrowserRule::new("Vivaldi", "Vivaldi/"),
    BrowserRule::new("Yandex", "YaBrowser/"),
    BrowserRule::new("UC Browser", "UCBrowser/"),
    BrowserRule::new("Samsung Internet", "SamsungBrowser/"),
    BrowserRule::new("Silk", "Silk/"),
    BrowserRule::new("Chrome", "CriOS/"),
    BrowserRule::new("Chrome", "Chrome/"),
    BrowserRule::new("Firefox", "FxiOS/"),
    BrowserRule::new("Firefox", "Firefox/"),
    BrowserRule::new("IE", "MSIE "),
    BrowserRule::new("IE", "rv:").requiring("Trident/"),
    BrowserRule::new("Safari", "Version/").requiring("Safari/"),
];

/// `(name, token)` pairs for operating systems, first match wins.
const OPERATING_SYSTEMS: &[(&str, &str)] = &[
    ("Windows Phone", "Windows Phone"),
    ("Windows 10", "Windows NT 10.0"),
    ("Windows 8.1", "Windows NT 6.3"),
    ("Windows 8", "Windows NT 6.2"),
    ("Windows 7", "Windows NT 6.1"),
    ("Windows Vista", "Windows NT 6.0"),
    ("Windows XP", "Windows NT 5.1"),
    ("Windows 2000", "Windows NT 5.0"),
    ("Windows", "Windows"),
    ("iOS", "iPhone OS"),
    ("iOS", "CPU OS"),
    ("iOS", "iPhone"),
    ("iOS", "iPad"),
    ("OS X", "Mac OS X"),
    ("Android", "Android"),
    ("Chrome OS", "CrOS"),
    ("Linux", "Linux"),
];

/// `(name, token)` pairs for platforms, first match wins.
const PLATFORMS: &[(&str, &str)] = &[
    ("Microsoft Windows", "Windows"),
    ("iPhone", "iPhone"),
    ("iPad", "iPad"),
    ("iPod", "iPod"),
    ("Android", "Android"),
    ("Apple Mac", "Macintosh"),
    ("Chrome OS", "CrOS"),
    ("Linux", "Linux"),
];

/// Parse a raw `User-Agent` header.
///
/// Blank input yields [`UserAgentInfo::default`], with every attribute
/// `None`. Surrounding whitespace and stray quotes are ignored.
pub fn parse(raw: &str) -> UserAgentInfo {
    let ua = raw.trim().trim_matches('"').trim();
    if ua.is_empty() {
        return UserAgentInfo::default();
    }

    let lower = ua.to_ascii_lowercase();
    let is_bot = has_bot_product(ua) || BOT_MARKERS.iter().any(|marker| lower.contains(marker));
    let is_tablet = ua.contains("iPad")
        || ua.contains("Tablet")
        || (ua.contains("Android") && !ua.contains("Mobile"));
    let is_mobile = !is_tablet
        && (ua.contains("Mobile")
            || ua.contains("iPhone")
            || ua.contains("iPod")
            || ua.contains("Windows Phone")
            || ua.contains("Opera Mini")
            || lower.contains("blackberry"));

    let (browser, version) = detect_browser(ua);

    UserAgentInfo {
        is_mobile: Some(is_mobile),
        is_desktop: Some(!is_mobile && !is_tablet && !is_bot),
        is_bot: Some(is_bot),
        browser: Some(browser.to_owned()),
        version: Some(version.unwrap_or(UNKNOWN).to_owned()),
        os: Some(first_match(ua, OPERATING_SYSTEMS).to_owned()),
        platform: Some(first_match(ua, PLATFORMS).to_owned()),
    }
}

/// Parse an optional header; `None` behaves like blank input.
pub fn parse_opt(raw: Option<&str>) -> UserAgentInfo {
    raw.map(parse).unwrap_or_default()
}

fn detect_browser(ua: &str) -> (&'static str, Option<&str>) {
    for rule in BROWSERS {
        if rule.requires.is_some_and(|required| !ua.contains(required)) {
            continue;
        }
        if let Some(version) = version_after(ua, rule.token) {
            return (rule.name, Some(version).filter(|v| !v.is_empty()));
        }
    }
    (UNKNOWN, None)
}

/// Whether any `product/version` token names a product ending in "bot",
/// as in `Googlebot/2.1` or `AhrefsBot/7.0`.
fn has_bot_product(ua: &str) -> bool {
    ua.split(|c: char| c.is_whitespace() || matches!(c, ';' | '(' | ')' | ','))
        .filter_map(|token| token.split_once('/'))
        .any(|(product, _)| product.to_ascii_lowercase().ends_with("bot"))
}

/// The run of digits and dots immediately following `token`, if present.
fn version_after<'a>(ua: &'a str, token: &str) -> Option<&'a str> {
    let (_, rest) = ua.split_once(token)?;
    let end = rest
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(rest.len());
    rest.get(..end)
}

fn first_match(ua: &str, table: &[(&'static str, &str)]) -> &'static str {
    table
        .iter()
        .find(|(_, token)| ua.contains(token))
        .map_or(UNKNOWN, |&(name, _)| name)
}

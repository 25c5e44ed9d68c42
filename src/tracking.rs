//! Visitor details recorded on chat sessions for usage analytics.
//!
//! Nothing identifying is stored unless the visitor accepted tracking
//! (cookie `tracking_consent=accepted`). With consent, the client address,
//! user agent, preferred language, country (from the `CF-IPCountry` CDN
//! header), device/browser/OS parsed from the user agent, and the
//! timezone/screen size reported by the frontend are kept.

use axum::http::HeaderMap;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;

use crate::auth::cookie_value;

pub const CONSENT_COOKIE: &str = "tracking_consent";
pub const CONSENT_HEADER: &str = "x-tracking-consent";

/// Headers checked, in order, for the client address behind proxies.
const IP_HEADERS: [&str; 6] = [
    "cf-connecting-ip",
    "x-real-ip",
    "x-forwarded-for",
    "x-forwarded",
    "forwarded-for",
    "forwarded",
];

/// Extra details the frontend may send when opening a session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClientData {
    pub timezone: Option<String>,
    pub screen_width: Option<Value>,
    pub screen_height: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingData {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub country: Option<String>,
    pub country_name: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub operating_system: Option<String>,
    pub platform: Option<String>,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_desktop: bool,
    pub language: Option<String>,
    pub timezone: Option<String>,
    pub screen_width: Option<i64>,
    pub screen_height: Option<i64>,
}

impl Default for TrackingData {
    /// Neutral values stored without consent.
    fn default() -> Self {
        Self {
            ip_address: None,
            user_agent: None,
            country: None,
            country_name: None,
            city: None,
            device_type: None,
            browser: None,
            browser_version: None,
            operating_system: None,
            platform: None,
            is_mobile: false,
            is_tablet: false,
            is_desktop: true,
            language: None,
            timezone: None,
            screen_width: None,
            screen_height: None,
        }
    }
}

pub fn has_consent(headers: &HeaderMap) -> bool {
    cookie_value(headers, CONSENT_COOKIE).as_deref() == Some("accepted")
}

pub fn collect(headers: &HeaderMap, peer: Option<SocketAddr>, client: &ClientData) -> TrackingData {
    if !has_consent(headers) {
        return TrackingData::default();
    }

    let user_agent = header_str(headers, "user-agent").map(str::to_string);
    let agent = parse_user_agent(user_agent.as_deref().unwrap_or_default());
    let (country, country_name) = country_from_headers(headers);

    TrackingData {
        ip_address: Some(client_ip(headers, peer)),
        user_agent,
        country,
        country_name,
        city: None,
        device_type: Some(agent.device_type.to_string()),
        browser: agent.browser.map(str::to_string),
        browser_version: agent.browser_version,
        platform: agent.operating_system.map(normalize_platform),
        operating_system: agent.operating_system.map(str::to_string),
        is_mobile: agent.is_mobile,
        is_tablet: agent.is_tablet,
        is_desktop: agent.is_desktop,
        language: header_str(headers, "accept-language").and_then(primary_language),
        timezone: client.timezone.clone().filter(|t| !t.is_empty()),
        screen_width: client.screen_width.as_ref().and_then(as_int),
        screen_height: client.screen_height.as_ref().and_then(as_int),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

// ============ Client address ============

/// First public address found in the proxy headers, else the socket peer,
/// else `127.0.0.1`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    for name in IP_HEADERS {
        let Some(raw) = header_str(headers, name) else {
            continue;
        };
        let first = raw.split(',').next().unwrap_or_default().trim();
        let candidate = first
            .strip_prefix("for=")
            .unwrap_or(first)
            .trim_matches('"');
        if let Ok(ip) = candidate.parse::<IpAddr>() {
            if is_public(&ip) {
                return ip.to_string();
            }
        }
    }

    peer.map(|p| p.ip().to_string())
        .unwrap_or_else(|| "127.0.0.1".to_string())
}

/// Excludes private, loopback, link-local and reserved ranges.
pub fn is_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                || octets[0] == 0
                || octets[0] >= 240
                || (octets[0] == 100 && (64..128).contains(&octets[1])))
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

// ============ Language and country ============

fn language_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([a-zA-Z]{2}(-[a-zA-Z]{2})?)").unwrap())
}

/// First language tag of an `Accept-Language` header (`fr-FR`, `en`...).
pub fn primary_language(accept_language: &str) -> Option<String> {
    language_re()
        .captures(accept_language)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn country_from_headers(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    let Some(code) = header_str(headers, "cf-ipcountry") else {
        return (None, None);
    };
    let code = code.to_ascii_uppercase();
    if code.len() != 2 || code == "XX" || code == "T1" {
        return (None, None);
    }
    let name = country_name(&code).map(str::to_string);
    (Some(code), name)
}

pub fn country_name(code: &str) -> Option<&'static str> {
    let name = match code {
        "CI" => "Côte d'Ivoire",
        "BF" => "Burkina Faso",
        "ML" => "Mali",
        "GN" => "Guinée",
        "LR" => "Liberia",
        "GH" => "Ghana",
        "SN" => "Sénégal",
        "TG" => "Togo",
        "BJ" => "Bénin",
        "NE" => "Niger",
        "NG" => "Nigeria",
        "CM" => "Cameroun",
        "GA" => "Gabon",
        "CG" => "Congo",
        "CD" => "République démocratique du Congo",
        "MA" => "Maroc",
        "TN" => "Tunisie",
        "DZ" => "Algérie",
        "FR" => "France",
        "BE" => "Belgique",
        "CH" => "Suisse",
        "CA" => "Canada",
        "US" => "États-Unis",
        "GB" => "Royaume-Uni",
        "DE" => "Allemagne",
        "ES" => "Espagne",
        "IT" => "Italie",
        "CN" => "Chine",
        "LB" => "Liban",
        _ => return None,
    };
    Some(name)
}

// ============ User agent ============

#[derive(Debug, Clone, PartialEq)]
pub struct AgentInfo {
    pub device_type: &'static str,
    pub is_mobile: bool,
    pub is_tablet: bool,
    pub is_desktop: bool,
    pub browser: Option<&'static str>,
    pub browser_version: Option<String>,
    pub operating_system: Option<&'static str>,
}

/// Device class, browser and OS from a user-agent string. Tablets also count
/// as mobile.
pub fn parse_user_agent(ua: &str) -> AgentInfo {
    let lower = ua.to_lowercase();

    let is_tablet = lower.contains("ipad")
        || lower.contains("tablet")
        || (lower.contains("android") && !lower.contains("mobile"));
    let is_phone = !is_tablet
        && (lower.contains("iphone")
            || lower.contains("ipod")
            || lower.contains("mobi")
            || lower.contains("windows phone"));
    let is_mobile = is_phone || is_tablet;

    let device_type = if is_tablet {
        "tablet"
    } else if is_mobile {
        "mobile"
    } else {
        "desktop"
    };

    let (browser, browser_version) = detect_browser(ua, &lower);

    AgentInfo {
        device_type,
        is_mobile,
        is_tablet,
        is_desktop: !is_mobile,
        browser,
        browser_version,
        operating_system: detect_os(&lower),
    }
}

fn detect_browser(ua: &str, lower: &str) -> (Option<&'static str>, Option<String>) {
    // Order matters: Edge and Opera also announce Chrome, Chrome announces Safari.
    let candidates: [(&str, &[&str]); 7] = [
        ("Edge", &["edg/", "edge/", "edga/", "edgios/"]),
        ("Opera", &["opr/", "opera/"]),
        ("Samsung Internet", &["samsungbrowser/"]),
        ("Chrome", &["chrome/", "crios/"]),
        ("Firefox", &["firefox/", "fxios/"]),
        ("Safari", &["version/"]),
        ("IE", &["msie ", "trident/"]),
    ];

    for (name, tokens) in candidates {
        for token in tokens {
            if let Some(pos) = lower.find(token) {
                if name == "Safari" && !lower.contains("safari") {
                    continue;
                }
                let version = if *token == "trident/" {
                    version_after(ua, lower, "rv:")
                } else {
                    version_at(ua, pos + token.len())
                };
                return (Some(name), version);
            }
        }
    }
    (None, None)
}

fn version_after(ua: &str, lower: &str, token: &str) -> Option<String> {
    lower.find(token).and_then(|pos| version_at(ua, pos + token.len()))
}

fn version_at(ua: &str, start: usize) -> Option<String> {
    let version: String = ua
        .get(start..)?
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if version.is_empty() {
        None
    } else {
        Some(version)
    }
}

fn detect_os(lower: &str) -> Option<&'static str> {
    if lower.contains("windows") {
        Some("Windows")
    } else if lower.contains("android") {
        Some("AndroidOS")
    } else if lower.contains("iphone") || lower.contains("ipad") || lower.contains("ipod") {
        Some("iOS")
    } else if lower.contains("mac os x") || lower.contains("macintosh") {
        Some("OS X")
    } else if lower.contains("cros") {
        Some("ChromeOS")
    } else if lower.contains("linux") {
        Some("Linux")
    } else {
        None
    }
}

/// Folds OS names into the platforms used by analytics.
pub fn normalize_platform(os: &str) -> String {
    let lower = os.to_lowercase();
    if lower.contains("windows") {
        "Windows".into()
    } else if lower.contains("mac") || lower.contains("os x") {
        "macOS".into()
    } else if lower.contains("linux") {
        "Linux".into()
    } else if lower.contains("ios") {
        "iOS".into()
    } else if lower.contains("android") {
        "Android".into()
    } else {
        let mut chars = lower.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::strings::StringMatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IocKind {
    Ipv4,
    Ipv6,
    Email,
    Url,
}

/// An indicator of compromise found inside one extracted string. The offset
/// is absolute in the source, derived from the string's start plus the
/// match position scaled by the string's encoding width.
#[derive(Debug, Clone, Serialize)]
pub struct IocMatch {
    pub kind: IocKind,
    pub value: String,
    pub offset: u64,
}

static IPV4_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").expect("ipv4 regex")
});
static IPV6_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9a-fA-F]{1,4}:){2,7}[0-9a-fA-F]{1,4}\b").expect("ipv6 regex")
});
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("email regex")
});
static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:https?|ftp)://[^\s"'<>]+"#).expect("url regex")
});

/// Stateless per-string pattern matcher. A string may yield any number of
/// hits; deduplication across strings is a consumer concern.
#[derive(Debug, Clone, Copy, Default)]
pub struct IocMatcher;

impl IocMatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn matches(&self, string: &StringMatch) -> Vec<IocMatch> {
        let width = string.encoding.unit_width();
        let text = string.text.as_str();
        let mut out = Vec::new();

        for m in URL_RE.find_iter(text) {
            out.push(IocMatch {
                kind: IocKind::Url,
                value: m.as_str().to_string(),
                offset: string.offset + m.start() as u64 * width,
            });
        }
        for m in EMAIL_RE.find_iter(text) {
            if valid_domain_labels(m.as_str()) {
                out.push(IocMatch {
                    kind: IocKind::Email,
                    value: m.as_str().to_string(),
                    offset: string.offset + m.start() as u64 * width,
                });
            }
        }
        for m in IPV4_RE.find_iter(text) {
            if valid_octets(m.as_str()) {
                out.push(IocMatch {
                    kind: IocKind::Ipv4,
                    value: m.as_str().to_string(),
                    offset: string.offset + m.start() as u64 * width,
                });
            }
        }
        for m in IPV6_RE.find_iter(text) {
            out.push(IocMatch {
                kind: IocKind::Ipv6,
                value: m.as_str().to_string(),
                offset: string.offset + m.start() as u64 * width,
            });
        }
        out
    }
}

fn valid_octets(candidate: &str) -> bool {
    candidate
        .split('.')
        .all(|octet| octet.parse::<u16>().map_or(false, |v| v <= 255))
}

fn valid_domain_labels(candidate: &str) -> bool {
    let Some((_, domain)) = candidate.rsplit_once('@') else {
        return false;
    };
    domain.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    })
}

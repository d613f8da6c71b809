//! HTML sandbox preparation
//!
//! Untrusted HTML is rewritten before it reaches a surface: every resource
//! reference whose origin is not allow-listed is replaced with
//! `about:blank`. Fragments are then wrapped in a minimal document shell.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// Replacement for blocked references
pub const BLOCKED_REFERENCE: &str = "about:blank";

/// `sandbox` attribute value for the hosting frame
pub const SANDBOX_ATTRIBUTES: &str = "allow-scripts";

const SHELL_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<style>
* { box-sizing: border-box; }
html, body { margin: 0; padding: 0; width: 100%; overflow-x: auto; overflow-y: auto; }
body { max-width: 100%; word-wrap: break-word; overflow-wrap: break-word; }
pre { overflow-x: auto; max-width: 100%; }
img, video, iframe { max-width: 100%; height: auto; }
table { max-width: 100%; overflow-x: auto; display: block; }
</style>
</head>
<body>
"#;

const SHELL_TAIL: &str = "\n</body>\n</html>\n";

// Attribute names that carry a fetchable reference. A match may start after
// whitespace, `/` or a closing quote, and may carry a namespace (`xlink:`).
// Quoted values are matched without their closing quote so it can separate
// the next attribute.
const RESOURCE_NAMES: &str = "data-src|src|href|action|formaction|poster|data|background|\
     imagesrcset|srcset|ping|cite|longdesc|manifest|codebase|archive|icon|lowsrc|dynsrc";

fn attribute_regex(names: &str) -> Regex {
    Regex::new(&format!(
        r#"(?i)(^|[\s/"'])((?:[\w-]+:)?(?:{names}))(\s*=\s*)(?:"([^"]*)|'([^']*)|([^\s"'>]+))"#
    ))
    .expect("attribute regex must compile")
}

static RESOURCE_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| attribute_regex(RESOURCE_NAMES));

static CONTENT_ATTRIBUTE: Lazy<Regex> = Lazy::new(|| attribute_regex("content"));

static META_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<meta\b[^>]*>").expect("meta tag regex must compile"));

static REFRESH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)http-equiv\s*=\s*["']?\s*refresh"#).expect("refresh regex must compile")
});

static CSS_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:"([^"]*)"|'([^']*)'|([^)"'\s]*))\s*\)"#)
        .expect("css url regex must compile")
});

static CSS_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)@import\s*(?:"([^"]*)"|'([^']*)')"#).expect("css import regex must compile")
});

// One level of nested parentheses, enough for `url(...)` candidates
static IMAGE_SET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(image-set\()((?:[^()]|\([^()]*\))*)\)").expect("image-set regex must compile")
});

static CSS_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""([^"]*)"|'([^']*)'"#).expect("css string regex must compile")
});

// Any quoted absolute or protocol-relative URL; namespace declarations are
// captured separately and kept.
static QUOTED_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(xmlns(?::[\w-]+)?\s*=\s*)?(["'])((?:[a-z][a-z0-9+.-]*:)?//[^"'\s<>]+)"#,
    )
    .expect("quoted url regex must compile")
});

/// Origins a sandboxed document may load from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowList {
    /// Hosts matched exactly, ignoring case
    pub hosts: Vec<String>,
    /// Root-relative path prefixes of the host application
    pub asset_prefixes: Vec<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self {
            hosts: vec!["cdnjs.cloudflare.com".to_string()],
            asset_prefixes: vec!["/api/placeholder/".to_string()],
        }
    }
}

impl AllowList {
    /// Allow-list that blocks every network reference
    #[must_use]
    pub fn deny_all() -> Self {
        Self {
            hosts: Vec::new(),
            asset_prefixes: Vec::new(),
        }
    }

    /// Add an allowed host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.hosts.push(host.into());
        self
    }

    /// Add an allowed asset prefix
    #[must_use]
    pub fn with_asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.asset_prefixes.push(prefix.into());
        self
    }

    /// Whether a single reference may survive into the sandbox
    #[must_use]
    pub fn permits(&self, reference: &str) -> bool {
        let reference = reference.trim();
        if reference.is_empty() || reference.starts_with('#') {
            return true;
        }
        if has_scheme(reference, "data:") || has_scheme(reference, "blob:") {
            return true;
        }

        let authority = ["https://", "http://", "//"]
            .iter()
            .find(|prefix| has_scheme(reference, prefix))
            .map(|prefix| &reference[prefix.len()..]);
        if let Some(rest) = authority {
            return host_of(rest).is_some_and(|host| {
                self.hosts.iter().any(|h| h.eq_ignore_ascii_case(host))
            });
        }

        if reference.starts_with('/') {
            return self
                .asset_prefixes
                .iter()
                .any(|prefix| reference.starts_with(prefix.as_str()));
        }
        false
    }

    /// `srcset` passes only when every candidate URL passes
    #[must_use]
    pub fn permits_srcset(&self, srcset: &str) -> bool {
        srcset
            .split(',')
            .filter_map(|candidate| candidate.split_whitespace().next())
            .all(|url| self.permits(url))
    }
}

/// Result of rewriting a document's resource references
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedHtml {
    /// Rewritten markup
    pub html: String,
    /// References that were replaced, grouped by the pass that found them
    pub blocked: Vec<String>,
}

/// Document ready to hand to a sandbox surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedDocument {
    /// Full HTML document
    pub html: String,
    /// References that were replaced
    pub blocked: Vec<String>,
    /// Input already was a full document
    pub standalone: bool,
}

/// Whether `html` is a complete document rather than a fragment
#[must_use]
pub fn is_standalone_document(html: &str) -> bool {
    let head = html.trim_start();
    starts_with_ignore_case(head, "<!doctype html") || starts_with_ignore_case(head, "<html")
}

/// Replace every non-allow-listed resource reference with `about:blank`
///
/// Covers resource attributes, meta refresh targets, CSS `url()`,
/// `@import` and `image-set()`. A final pass blocks any quoted absolute
/// URL the earlier passes did not classify.
#[must_use]
pub fn sanitize(html: &str, allow: &AllowList) -> SanitizedHtml {
    let mut blocked = Vec::new();

    let html = RESOURCE_ATTRIBUTE.replace_all(html, |caps: &Captures<'_>| {
        let value = first_group(caps, 4..=6);
        if attribute_permitted(allow, &caps[2], value) {
            caps[0].to_string()
        } else {
            blocked.push(value.to_string());
            replace_attribute_value(caps, BLOCKED_REFERENCE)
        }
    });

    let html = META_TAG.replace_all(&html, |tag: &Captures<'_>| {
        if !REFRESH.is_match(&tag[0]) {
            return tag[0].to_string();
        }
        CONTENT_ATTRIBUTE
            .replace_all(&tag[0], |caps: &Captures<'_>| {
                match refresh_target(first_group(caps, 4..=6)) {
                    Some(target) if !allow.permits(target) => {
                        blocked.push(target.to_string());
                        replace_attribute_value(caps, &format!("0;url={BLOCKED_REFERENCE}"))
                    }
                    _ => caps[0].to_string(),
                }
            })
            .into_owned()
    });

    let html = CSS_URL.replace_all(&html, |caps: &Captures<'_>| {
        let value = first_group(caps, 1..=3);
        if allow.permits(value) {
            caps[0].to_string()
        } else {
            blocked.push(value.to_string());
            format!("url({BLOCKED_REFERENCE})")
        }
    });

    let html = CSS_IMPORT.replace_all(&html, |caps: &Captures<'_>| {
        let value = first_group(caps, 1..=2);
        if allow.permits(value) {
            caps[0].to_string()
        } else {
            blocked.push(value.to_string());
            let quote = css_quote(caps);
            format!("@import {quote}{BLOCKED_REFERENCE}{quote}")
        }
    });

    let html = IMAGE_SET.replace_all(&html, |caps: &Captures<'_>| {
        let candidates = CSS_STRING.replace_all(&caps[2], |string: &Captures<'_>| {
            let value = first_group(string, 1..=2);
            if allow.permits(value) {
                string[0].to_string()
            } else {
                blocked.push(value.to_string());
                let quote = css_quote(string);
                format!("{quote}{BLOCKED_REFERENCE}{quote}")
            }
        });
        format!("{}{candidates})", &caps[1])
    });

    let html = QUOTED_URL.replace_all(&html, |caps: &Captures<'_>| {
        let value = &caps[3];
        if caps.get(1).is_some() || allow.permits(value) {
            caps[0].to_string()
        } else {
            blocked.push(value.to_string());
            format!("{}{BLOCKED_REFERENCE}", &caps[2])
        }
    });

    let html = html.into_owned();
    if !blocked.is_empty() {
        tracing::warn!(count = blocked.len(), first = %blocked[0], "blocked sandbox resources");
    }
    SanitizedHtml { html, blocked }
}

/// Quote of a `"..."` / `'...'` alternation in groups 1 and 2
fn css_quote(caps: &Captures<'_>) -> char {
    if caps.get(1).is_some() {
        '"'
    } else {
        '\''
    }
}

fn attribute_permitted(allow: &AllowList, name: &str, value: &str) -> bool {
    let local = name.rsplit_once(':').map_or(name, |(_, local)| local);
    let local = local.to_ascii_lowercase();
    match local.as_str() {
        "srcset" | "imagesrcset" => allow.permits_srcset(value),
        "ping" | "archive" => value.split_whitespace().all(|url| allow.permits(url)),
        _ => allow.permits(value),
    }
}

/// Rebuild an attribute match with a new value, keeping its quote style
///
/// Quoted matches end before the closing quote, which stays in the text.
fn replace_attribute_value(caps: &Captures<'_>, value: &str) -> String {
    let head = format!("{}{}{}", &caps[1], &caps[2], &caps[3]);
    if caps.get(4).is_some() {
        format!(r#"{head}"{value}"#)
    } else if caps.get(5).is_some() {
        format!("{head}'{value}")
    } else {
        format!(r#"{head}"{value}""#)
    }
}

/// URL a meta refresh `content` value navigates to, if any
///
/// Accepts `N;url=X`, `N, URL = 'X'` and `N X`.
fn refresh_target(content: &str) -> Option<&str> {
    let rest = content
        .trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.')
        .trim_start();
    let rest = rest
        .strip_prefix(|c: char| c == ';' || c == ',')
        .unwrap_or(rest)
        .trim_start();
    let rest = match rest.get(..3) {
        Some(head) if head.eq_ignore_ascii_case("url") => rest[3..]
            .trim_start()
            .strip_prefix('=')
            .map_or(rest, str::trim_start),
        _ => rest,
    };
    let target = rest.trim_matches(|c: char| c == '"' || c == '\'').trim();
    (!target.is_empty()).then_some(target)
}

/// Sanitize and, for fragments, wrap in the baseline document shell
#[must_use]
pub fn prepare_document(html: &str, allow: &AllowList) -> PreparedDocument {
    let SanitizedHtml { html, blocked } = sanitize(html, allow);
    let standalone = is_standalone_document(&html);
    let html = if standalone {
        html
    } else {
        let mut doc = String::with_capacity(SHELL_HEAD.len() + html.len() + SHELL_TAIL.len());
        doc.push_str(SHELL_HEAD);
        doc.push_str(&html);
        doc.push_str(SHELL_TAIL);
        doc
    };
    PreparedDocument {
        html,
        blocked,
        standalone,
    }
}

fn first_group<'t>(caps: &Captures<'t>, groups: std::ops::RangeInclusive<usize>) -> &'t str {
    groups
        .filter_map(|i| caps.get(i))
        .next()
        .map_or("", |m| m.as_str())
}

fn has_scheme(reference: &str, scheme: &str) -> bool {
    starts_with_ignore_case(reference, scheme)
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Host part of `authority[/path...]`, without userinfo or port
fn host_of(rest: &str) -> Option<&str> {
    let end = rest
        .find(|c| matches!(c, '/' | '?' | '#' | '\\'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    let host = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    let host = host.split_once(':').map_or(host, |(h, _)| h);
    (!host.is_empty()).then_some(host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn allow() -> AllowList {
        AllowList::default()
    }

    #[test]
    fn permits_rules() {
        let allow = allow();
        assert!(allow.permits("https://cdnjs.cloudflare.com/ajax/libs/d3/7.0.0/d3.min.js"));
        assert!(allow.permits("//CDNJS.cloudflare.com/x.css"));
        assert!(allow.permits("/api/placeholder/400/300"));
        assert!(allow.permits("#section"));
        assert!(allow.permits("data:image/png;base64,AAAA"));
        assert!(allow.permits("blob:https://x/1"));

        assert!(!allow.permits("https://evil.example/x.js"));
        assert!(!allow.permits("https://cdnjs.cloudflare.com.evil.example/x.js"));
        assert!(!allow.permits("https://cdnjs.cloudflare.com@evil.example/x.js"));
        assert!(!allow.permits("/etc/passwd"));
        assert!(!allow.permits("images/cat.png"));
        assert!(!allow.permits("javascript:alert(1)"));
    }

    #[test]
    fn port_does_not_defeat_host_match() {
        assert!(allow().permits("https://cdnjs.cloudflare.com:443/x.js"));
    }

    #[test]
    fn blocks_foreign_src_and_keeps_allowed() {
        let input = r#"<img src="https://evil.example/a.png"><script src="https://cdnjs.cloudflare.com/lib.js"></script>"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<img src="about:blank"><script src="https://cdnjs.cloudflare.com/lib.js"></script>"#
        );
        assert_eq!(out.blocked, vec!["https://evil.example/a.png".to_string()]);
    }

    #[test]
    fn covers_other_attributes_and_quote_styles() {
        let input = r#"<a href='https://x.test'>x</a><form action=https://x.test/post></form><video poster="http://x.test/p.jpg"></video>"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<a href='about:blank'>x</a><form action="about:blank"></form><video poster="about:blank"></video>"#
        );
        assert_eq!(out.blocked.len(), 3);
    }

    #[test]
    fn lazy_loading_data_src_is_checked() {
        let out = sanitize(r#"<img data-src="https://x.test/a.png">"#, &allow());
        assert_eq!(out.html, r#"<img data-src="about:blank">"#);
    }

    #[test]
    fn srcset_needs_every_candidate() {
        let input = r#"<img srcset="/api/placeholder/1 1x, https://x.test/2.png 2x">"#;
        let out = sanitize(input, &allow());
        assert_eq!(out.html, r#"<img srcset="about:blank">"#);

        let ok = r#"<img srcset="/api/placeholder/1 1x, /api/placeholder/2 2x">"#;
        assert_eq!(sanitize(ok, &allow()).html, ok);
    }

    #[test]
    fn css_urls_and_imports() {
        let input = r#"<style>@import "https://fonts.example/f.css"; body { background: url('https://x.test/bg.png') } .ok { background: url(/api/placeholder/1) }</style>"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<style>@import "about:blank"; body { background: url(about:blank) } .ok { background: url(/api/placeholder/1) }</style>"#
        );
        assert_eq!(out.blocked.len(), 2);
    }

    #[test]
    fn attribute_names_inside_words_are_left_alone() {
        let input = r#"<div data-href="x" mysrc="y">text</div>"#;
        assert_eq!(sanitize(input, &allow()).html, input);
    }

    #[test]
    fn slash_separates_attribute_from_tag_name() {
        let out = sanitize(r#"<img/src="https://evil.example/a.png">"#, &allow());
        assert_eq!(out.html, r#"<img/src="about:blank">"#);
        assert_eq!(out.blocked, vec!["https://evil.example/a.png".to_string()]);
    }

    #[test]
    fn attribute_glued_to_previous_quote() {
        let input = r#"<img alt="x"src="https://evil.example/a.png"><a href='https://evil.example/1'ping='https://evil.example/2'>"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<img alt="x"src="about:blank"><a href='about:blank'ping='about:blank'>"#
        );
        assert_eq!(out.blocked.len(), 3);
    }

    #[test]
    fn namespaced_href() {
        let input = r#"<svg><image xlink:href="https://evil.example/a.png"/><use XLINK:HREF=https://evil.example/b#x /></svg>"#;
        assert_eq!(
            sanitize(input, &allow()).html,
            r#"<svg><image xlink:href="about:blank"/><use XLINK:HREF="about:blank" /></svg>"#
        );
    }

    #[test]
    fn import_without_whitespace() {
        let input = r#"<style>@import"https://evil.example/a.css";@import'https://evil.example/b.css';</style>"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<style>@import "about:blank";@import 'about:blank';</style>"#
        );
        assert_eq!(out.blocked.len(), 2);
    }

    #[test]
    fn image_set_candidates_are_checked() {
        let input = r#"<div style="background: image-set('https://evil.example/a.png' 1x, url(/api/placeholder/2) 2x)"></div>"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<div style="background: image-set('about:blank' 1x, url(/api/placeholder/2) 2x)"></div>"#
        );
        assert_eq!(out.blocked, vec!["https://evil.example/a.png".to_string()]);
    }

    #[test]
    fn meta_refresh_target_is_blocked() {
        let input = r#"<meta http-equiv="refresh" content="0;url=https://evil.example/"><meta name="author" content="Ada">"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<meta http-equiv="refresh" content="0;url=about:blank"><meta name="author" content="Ada">"#
        );
        assert_eq!(out.blocked, vec!["https://evil.example/".to_string()]);

        let local = r#"<meta http-equiv=REFRESH content="5; URL='/api/placeholder/next'">"#;
        assert_eq!(sanitize(local, &allow()).html, local);
    }

    #[test]
    fn refresh_content_forms() {
        assert_eq!(refresh_target("0;url=https://x/"), Some("https://x/"));
        assert_eq!(refresh_target(" 5, URL = 'https://x/' "), Some("https://x/"));
        assert_eq!(refresh_target("1 https://x/"), Some("https://x/"));
        assert_eq!(refresh_target("30"), None);
    }

    #[test]
    fn ping_needs_every_url() {
        let input = r##"<a href="#top" ping="/api/placeholder/t https://evil.example/t">x</a>"##;
        let out = sanitize(input, &allow());
        assert_eq!(out.html, r##"<a href="#top" ping="about:blank">x</a>"##);
    }

    #[test]
    fn unclassified_quoted_urls_are_blocked() {
        let input = r#"<script>fetch("https://evil.example/beacon"); load('//cdnjs.cloudflare.com/x.js')</script>"#;
        let out = sanitize(input, &allow());
        assert_eq!(
            out.html,
            r#"<script>fetch("about:blank"); load('//cdnjs.cloudflare.com/x.js')</script>"#
        );
        assert_eq!(out.blocked, vec!["https://evil.example/beacon".to_string()]);
    }

    #[test]
    fn namespace_declarations_are_kept() {
        let input = r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink"></svg>"#;
        let out = sanitize(input, &allow());
        assert_eq!(out.html, input);
        assert!(out.blocked.is_empty());
    }

    #[test]
    fn fragment_gets_shell() {
        let doc = prepare_document("<p>hi</p>", &allow());
        assert!(!doc.standalone);
        assert!(doc.html.starts_with("<!DOCTYPE html>"));
        assert!(doc.html.contains(r#"<meta name="viewport""#));
        assert!(doc.html.contains("box-sizing: border-box"));
        assert!(doc.html.contains("<body>\n<p>hi</p>\n</body>"));
    }

    #[test]
    fn standalone_document_is_used_as_is() {
        let input = "  <!doctype HTML><html><body><img src=\"x.png\"></body></html>";
        let doc = prepare_document(input, &allow());
        assert!(doc.standalone);
        assert_eq!(
            doc.html,
            "  <!doctype HTML><html><body><img src=\"about:blank\"></body></html>"
        );
    }

    #[test]
    fn html_root_counts_as_standalone() {
        assert!(is_standalone_document("<HTML lang=\"en\"></HTML>"));
        assert!(!is_standalone_document("<div><html></html></div>"));
    }
}

//! C4: Directive & tag parser. Parses `//encore:...` doc-comment directives
//! and Go struct tags (spec.md §4.4 / §4.8).

use crate::endpoint::{HttpMethod, Visibility};

/// A parsed `//encore:api <access> [raw] [path=...] [method=GET,POST]`
/// directive (spec.md §4.8).
#[derive(Debug, Clone)]
pub struct ApiDirective {
    pub visibility: Visibility,
    pub raw: bool,
    pub methods: Vec<HttpMethod>,
    pub path: String,
}

/// Parses the doc-comment lines of a function looking for an `encore:api`
/// directive. Returns `None` when absent. `encore:authhandler` is a
/// distinct directive (spec.md §4.10 item 1 needs to tell "declares the
/// app's auth handler" apart from "is itself an `auth`-visibility
/// endpoint") — see [`parse_auth_handler_directive`].
#[must_use]
pub fn parse_api_directive(doc: &str) -> Option<ApiDirective> {
    for line in doc.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("encore:api ") {
            return Some(parse_api_tokens(rest));
        }
        if trimmed == "encore:api" {
            return Some(parse_api_tokens(""));
        }
    }
    None
}

/// Whether a function's doc comment carries an `//encore:authhandler`
/// directive, declaring it as the app's single auth handler (spec.md §4.10
/// item 1).
#[must_use]
pub fn parse_auth_handler_directive(doc: &str) -> bool {
    doc.lines().any(|line| {
        let trimmed = line.trim();
        trimmed == "encore:authhandler" || trimmed.starts_with("encore:authhandler ")
    })
}

fn parse_api_tokens(rest: &str) -> ApiDirective {
    let mut visibility = Visibility::Private;
    let mut raw = false;
    let mut methods = Vec::new();
    let mut path = String::new();

    for tok in rest.split_whitespace() {
        match tok {
            "public" => visibility = Visibility::Public,
            "private" => visibility = Visibility::Private,
            "auth" => visibility = Visibility::Auth,
            "raw" => raw = true,
            _ => {
                if let Some(v) = tok.strip_prefix("path=") {
                    path = v.to_string();
                } else if let Some(v) = tok.strip_prefix("method=") {
                    methods = v.split(',').filter_map(HttpMethod::parse).collect();
                }
            }
        }
    }

    ApiDirective {
        visibility,
        raw,
        methods,
        path,
    }
}

/// `//encore:cron <name> <schedule> [title="..."]` directive body (the
/// schedule grammar itself lives in [`crate::resources::cron`]).
#[derive(Debug, Clone)]
pub struct CronDirective {
    pub name: String,
    pub schedule: String,
    pub title: Option<String>,
}

#[must_use]
pub fn parse_cron_directive(doc: &str) -> Option<CronDirective> {
    for line in doc.lines() {
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("encore:cron ") {
            let mut parts = rest.splitn(2, ' ');
            let name = parts.next()?.to_string();
            let remainder = parts.next().unwrap_or("").trim();
            let (schedule, title) = if let Some(idx) = remainder.find("title=") {
                let schedule = remainder[..idx].trim().to_string();
                let title_raw = remainder[idx + "title=".len()..].trim();
                (schedule, Some(unquote_simple(title_raw)))
            } else {
                (remainder.to_string(), None)
            };
            return Some(CronDirective { name, schedule, title });
        }
    }
    None
}

fn unquote_simple(s: &str) -> String {
    s.trim_matches('"').to_string()
}

/// Decoded struct tag keys relevant to schema extraction (spec.md §4.4 /
/// §4.5): `json`, `qs` (query string), `header`, and the Encore-specific
/// `encore:"sensitive"`/`encore:"optional"` markers.
#[derive(Debug, Clone, Default)]
pub struct StructTag {
    pub json: Option<String>,
    pub qs: Option<String>,
    pub header: Option<String>,
    pub sensitive: bool,
    pub optional: bool,
}

/// Parses a raw Go struct tag body (backtick contents already stripped) of
/// the form `key:"value,opt1,opt2" key2:"value2"`.
#[must_use]
pub fn parse_struct_tag(raw: &str) -> StructTag {
    let mut tag = StructTag::default();
    for (key, value) in iter_tag_entries(raw) {
        let mut parts = value.split(',');
        let name = parts.next().unwrap_or("");
        match key {
            "json" => tag.json = Some(name.to_string()),
            "qs" => tag.qs = Some(name.to_string()),
            "header" => tag.header = Some(name.to_string()),
            "encore" => {
                if name == "sensitive" || parts.clone().any(|p| p == "sensitive") {
                    tag.sensitive = true;
                }
                if name == "optional" || parts.any(|p| p == "optional") {
                    tag.optional = true;
                }
            }
            _ => {}
        }
    }
    tag
}

fn iter_tag_entries(raw: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        let key_start = i;
        while i < bytes.len() && bytes[i] != b':' && bytes[i] != b' ' {
            i += 1;
        }
        if i >= bytes.len() || bytes[i] != b':' {
            break;
        }
        let key = &raw[key_start..i];
        i += 1;
        if i >= bytes.len() || bytes[i] != b'"' {
            break;
        }
        i += 1;
        let value_start = i;
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        let value = &raw[value_start..i];
        out.push((key, value));
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_public_get_with_path() {
        let d = parse_api_directive("encore:api public method=GET path=/items/:id").unwrap();
        assert_eq!(d.visibility, Visibility::Public);
        assert_eq!(d.path, "/items/:id");
        assert_eq!(d.methods, vec![HttpMethod::Get]);
    }

    #[test]
    fn defaults_to_private_with_no_access_keyword() {
        let d = parse_api_directive("encore:api method=POST path=/x").unwrap();
        assert_eq!(d.visibility, Visibility::Private);
    }

    #[test]
    fn raw_flag_detected() {
        let d = parse_api_directive("encore:api public raw path=/hook").unwrap();
        assert!(d.raw);
    }

    #[test]
    fn parses_cron_directive_with_title() {
        let d = parse_cron_directive("encore:cron daily-report \"0 9 * * *\" title=\"Daily report\"").unwrap();
        assert_eq!(d.name, "daily-report");
        assert_eq!(d.title.as_deref(), Some("Daily report"));
    }

    #[test]
    fn struct_tag_extracts_json_and_sensitive() {
        let tag = parse_struct_tag(r#"json:"email" encore:"sensitive""#);
        assert_eq!(tag.json.as_deref(), Some("email"));
        assert!(tag.sensitive);
    }

    #[test]
    fn struct_tag_json_dash_means_omit() {
        let tag = parse_struct_tag(r#"json:"-""#);
        assert_eq!(tag.json.as_deref(), Some("-"));
    }
}

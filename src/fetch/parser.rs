//! Chart page parsing.
//!
//! Two strategies, tried in order:
//! 1. The Next.js `__NEXT_DATA__` payload, which carries structured track
//!    objects (title, mix, artists, remixers).
//! 2. Document order of `/track/<slug>/<id>` links, which only yields titles.

use crate::chart::{ChartEntry, TrackId};
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;
use thiserror::Error;

pub const BASE_URL: &str = "https://www.beatport.com";

/// A list must have at least this many track-like objects to be taken as the chart.
const MIN_TRACKISH_ITEMS: usize = 20;
/// Stop scanning further roots once a list this good is found.
const GOOD_ENOUGH_TRACKISH: usize = 50;
const TRACK_OBJECT_HINT_KEYS: &[&str] = &[
    "slug",
    "bpm",
    "genre",
    "image",
    "artists",
    "release_date",
    "encoded_date",
    "current_status",
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ChartParseError(String);

fn track_href_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/track/[^/]+/(\d+)").expect("valid regex"))
}

fn next_data_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.*?)</script>"#).expect("valid regex")
    })
}

fn track_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<a\b[^>]*\bhref="([^"]*/track/[^"/]+/\d+[^"]*)"[^>]*>(.*?)</a>"#)
            .expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

/// Parses a chart page into at most `limit` ranked entries.
///
/// Returns an empty list for hype charts whose genre is not part of the
/// hype program; the caller decides what an empty chart means.
pub fn parse_chart(html: &str, limit: usize) -> Result<Vec<ChartEntry>, ChartParseError> {
    let next_data = extract_next_data(html);

    if html.contains("hype=true") {
        if let Some(data) = &next_data {
            if genre_supports_hype(data) == Some(false) {
                return Ok(Vec::new());
            }
        }
    }

    if let Some(data) = &next_data {
        let entries = parse_next_data(data, limit);
        if !entries.is_empty() {
            return Ok(entries);
        }
    }

    let entries = parse_link_order(html, limit);
    if !entries.is_empty() {
        return Ok(entries);
    }

    Err(ChartParseError(
        "No valid chart entries could be parsed from HTML".to_string(),
    ))
}

fn extract_next_data(html: &str) -> Option<Value> {
    let raw = next_data_re().captures(html)?.get(1)?.as_str();
    serde_json::from_str(raw).ok()
}

fn genre_supports_hype(next_data: &Value) -> Option<bool> {
    let queries = next_data
        .pointer("/props/pageProps/dehydratedState/queries")?
        .as_array()?;
    queries
        .iter()
        .filter_map(|q| q.pointer("/state/data/is_included_in_hype"))
        .find_map(Value::as_bool)
}

fn collect_lists<'a>(value: &'a Value, out: &mut Vec<&'a Vec<Value>>) {
    match value {
        Value::Array(items) => {
            out.push(items);
            for item in items {
                collect_lists(item, out);
            }
        }
        Value::Object(map) => {
            for v in map.values() {
                collect_lists(v, out);
            }
        }
        _ => {}
    }
}

fn is_track_like(item: &Value) -> bool {
    let Some(obj) = item.as_object() else {
        return false;
    };
    match obj.get("id") {
        Some(Value::Number(_)) | Some(Value::String(_)) => {}
        _ => return false,
    }
    let has_name = obj
        .get("name")
        .or_else(|| obj.get("title"))
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty());
    if !has_name {
        return false;
    }
    TRACK_OBJECT_HINT_KEYS
        .iter()
        .filter(|k| obj.contains_key(**k))
        .count()
        >= 2
}

fn best_track_list(next_data: &Value) -> Option<&Vec<Value>> {
    let mut page_props = next_data.pointer("/props/pageProps");
    if let Some(inner) = page_props.and_then(|p| p.get("pageProps")) {
        if inner.is_object() {
            page_props = Some(inner);
        }
    }

    let mut best: Option<(&Vec<Value>, usize)> = None;
    for root in page_props.into_iter().chain(std::iter::once(next_data)) {
        let mut lists = Vec::new();
        collect_lists(root, &mut lists);
        for list in lists {
            if list.len() < MIN_TRACKISH_ITEMS {
                continue;
            }
            let trackish = list.iter().take(250).filter(|i| is_track_like(i)).count();
            if trackish < MIN_TRACKISH_ITEMS || trackish * 2 < list.len() {
                continue;
            }
            let better = match best {
                None => true,
                Some((current, score)) => {
                    trackish > score || (trackish == score && list.len() > current.len())
                }
            };
            if better {
                best = Some((list, trackish));
            }
        }
        if best.is_some_and(|(_, score)| score >= GOOD_ENOUGH_TRACKISH) {
            break;
        }
    }
    best.map(|(list, _)| list)
}

fn track_href(obj: &serde_json::Map<String, Value>) -> Option<String> {
    for key in ["url", "href", "path", "canonicalUrl", "canonical_url"] {
        if let Some(v) = obj.get(key).and_then(Value::as_str) {
            if v.contains("/track/") {
                return Some(v.to_string());
            }
        }
    }
    let slug = obj.get("slug").and_then(Value::as_str)?.trim();
    let id = obj.get("id").map(json_scalar)?;
    if slug.is_empty() {
        return None;
    }
    Some(format!("/track/{}/{}", slug, id))
}

fn json_scalar(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn people(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|p| p.get("name").or_else(|| p.get("title")))
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn absolute_url(href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        format!("{}/{}", BASE_URL, href.trim_start_matches('/'))
    }
}

fn parse_next_data(next_data: &Value, limit: usize) -> Vec<ChartEntry> {
    let Some(list) = best_track_list(next_data) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for item in list {
        if out.len() >= limit {
            break;
        }
        let Some(obj) = item.as_object().filter(|_| is_track_like(item)) else {
            continue;
        };
        let Some(href) = track_href(obj) else {
            continue;
        };
        let source_id = track_href_re()
            .captures(&href)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .or_else(|| obj.get("id").map(json_scalar))
            .unwrap_or_default();
        if source_id.is_empty() || !seen.insert(source_id.clone()) {
            continue;
        }

        let title = obj
            .get("name")
            .or_else(|| obj.get("title"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("track-{}", source_id));
        let mix_name = ["mix", "mix_name", "mixName"]
            .iter()
            .filter_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .find(|m| !m.is_empty());

        let entry = ChartEntry::new(
            out.len() as u32 + 1,
            &title,
            mix_name,
            people(obj.get("artists")),
            people(obj.get("remixers")),
        )
        .with_url(absolute_url(&href));
        out.push(entry);
    }
    out
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

fn parse_link_order(html: &str, limit: usize) -> Vec<ChartEntry> {
    // Links inside <main> avoid nav/footer noise when the page has one.
    let scope = match (html.find("<main"), html.rfind("</main>")) {
        (Some(start), Some(end)) if start < end => &html[start..end],
        _ => html,
    };

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for caps in track_link_re().captures_iter(scope) {
        if out.len() >= limit {
            break;
        }
        let href = &caps[1];
        let Some(source_id) = track_href_re().captures(href).map(|c| c[1].to_string()) else {
            continue;
        };
        if !seen.insert(source_id.clone()) {
            continue;
        }
        let text = decode_entities(tag_re().replace_all(&caps[2], " ").trim());
        let title = if text.trim().is_empty() {
            format!("track-{}", source_id)
        } else {
            text.split_whitespace().collect::<Vec<_>>().join(" ")
        };
        out.push(
            ChartEntry::new(out.len() as u32 + 1, &title, None, vec![], vec![])
                .with_track_id(TrackId::from_source(&source_id))
                .with_url(absolute_url(href)),
        );
    }
    out
}

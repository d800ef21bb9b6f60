use md5::compute as md5_digest;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use tracing::warn;
use url::form_urlencoded;

use crate::cache::Caches;
use crate::value::Val;

/// First argument that is not a value, if any
fn first_non_value(args: &[&Val]) -> Option<Val> {
    args.iter().find(|v| !v.is_value()).map(|v| (*v).clone())
}

fn text(val: &Val) -> String {
    val.as_string().unwrap_or_default()
}

/// Concatenate every argument. Nulls contribute nothing; errors propagate.
pub fn concat(args: &[Val]) -> Val {
    if let Some(err) = args.iter().find(|v| v.is_err()) {
        return err.clone();
    }
    Val::String(args.iter().filter_map(Val::as_string).collect())
}

pub fn length(val: &Val) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    let len = text(val).chars().count();
    Val::Integer(i32::try_from(len).unwrap_or(i32::MAX))
}

/// Apply `f` to the string form of `val`, passing non-values through.
pub fn map_string(val: &Val, f: impl FnOnce(String) -> String) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    Val::String(f(text(val)))
}

/// Characters from `start` (inclusive) to `end` (exclusive), clamped to the
/// string.
pub fn substring(val: &Val, start: &Val, end: &Val) -> Val {
    if let Some(v) = first_non_value(&[val, start, end]) {
        return v;
    }
    let (Some(start), Some(end)) = (start.as_integer(), end.as_integer()) else {
        return Val::err("substring positions must be numbers");
    };
    if start < 0 {
        return Val::err(format!("substring start {start} must not be negative"));
    }

    let chars: Vec<char> = text(val).chars().collect();
    let end = usize::try_from(end).unwrap_or(0).min(chars.len());
    let start = (start as usize).min(end);
    Val::String(chars[start..end].iter().collect())
}

pub fn substring_before(val: &Val, delimiter: &Val) -> Val {
    if let Some(v) = first_non_value(&[val, delimiter]) {
        return v;
    }
    let s = text(val);
    match s.find(&text(delimiter)) {
        Some(i) => Val::String(s[..i].to_string()),
        None => Val::string(""),
    }
}

pub fn substring_after(val: &Val, delimiter: &Val) -> Val {
    if let Some(v) = first_non_value(&[val, delimiter]) {
        return v;
    }
    let s = text(val);
    let d = text(delimiter);
    match s.find(&d) {
        Some(i) => Val::String(s[i + d.len()..].to_string()),
        None => Val::string(""),
    }
}

/// Character position of `sub` in `val`, or -1.
pub fn index_of(val: &Val, sub: &Val, last: bool) -> Val {
    if let Some(v) = first_non_value(&[val, sub]) {
        return v;
    }
    let s = text(val);
    let sub = text(sub);
    let found = if last { s.rfind(&sub) } else { s.find(&sub) };
    let index = match found {
        Some(byte) => s[..byte].chars().count() as i64,
        None => -1,
    };
    Val::Integer(i32::try_from(index).unwrap_or(i32::MAX))
}

fn compile(caches: &Caches, pattern: &Val, full_match: bool) -> Result<regex::Regex, Val> {
    let pattern = text(pattern);
    if pattern.is_empty() {
        return Err(Val::err("Empty regex pattern"));
    }
    caches.regex(&pattern, full_match).map_err(|e| {
        warn!(pattern, error = %e, "failed to compile regex");
        Val::err(format!("Invalid regex '{pattern}': {e}"))
    })
}

/// Replace every match of `pattern` with `replacement`. `$1` style group
/// references are expanded.
pub fn replace(caches: &Caches, val: &Val, pattern: &Val, replacement: &Val) -> Val {
    if let Some(v) = first_non_value(&[val, pattern, replacement]) {
        return v;
    }
    match compile(caches, pattern, false) {
        Ok(re) => Val::String(re.replace_all(&text(val), text(replacement).as_str()).into_owned()),
        Err(e) => e,
    }
}

/// Whether the whole of `val` matches `pattern`.
pub fn matches(caches: &Caches, val: &Val, pattern: &Val) -> Val {
    if let Some(v) = first_non_value(&[val, pattern]) {
        return v;
    }
    match compile(caches, pattern, true) {
        Ok(re) => Val::Boolean(re.is_match(&text(val))),
        Err(e) => e,
    }
}

/// `decode(value, pattern1, result1, ..., default)`
pub fn decode(caches: &Caches, args: &[Val]) -> Val {
    let Some((value, rest)) = args.split_first() else {
        return Val::Null;
    };
    if !value.is_value() {
        return value.clone();
    }
    let Some((default, pairs)) = rest.split_last() else {
        return Val::Null;
    };

    let s = text(value);
    for pair in pairs.chunks(2) {
        let [pattern, result] = pair else {
            break;
        };
        match compile(caches, pattern, true) {
            Ok(re) if re.is_match(&s) => return result.clone(),
            Ok(_) => {}
            Err(e) => return e,
        }
    }
    default.clone()
}

/// The value when it matches any pattern (`include`) or none of them
/// (`exclude`), otherwise null.
pub fn include(caches: &Caches, args: &[Val], include: bool) -> Val {
    let Some((value, patterns)) = args.split_first() else {
        return Val::Null;
    };
    if !value.is_value() {
        return value.clone();
    }

    let s = text(value);
    let mut matched = false;
    for pattern in patterns {
        match compile(caches, pattern, true) {
            Ok(re) if re.is_match(&s) => {
                matched = true;
                break;
            }
            Ok(_) => {}
            Err(e) => return e,
        }
    }
    if matched == include {
        value.clone()
    } else {
        Val::Null
    }
}

/// Digest algorithms accepted by `hash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Md5,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgorithm {
    /// Parse names such as `SHA-256`, `sha256` or `MD5`.
    pub fn parse(name: &str) -> Option<HashAlgorithm> {
        let normalized: String = name
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_ascii_uppercase();
        match normalized.as_str() {
            "MD5" => Some(HashAlgorithm::Md5),
            "SHA224" => Some(HashAlgorithm::Sha224),
            "SHA256" => Some(HashAlgorithm::Sha256),
            "SHA384" => Some(HashAlgorithm::Sha384),
            "SHA512" => Some(HashAlgorithm::Sha512),
            _ => None,
        }
    }

    pub fn hex_digest(self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Md5 => format!("{:x}", md5_digest(bytes)),
            HashAlgorithm::Sha224 => hex::encode(Sha224::digest(bytes)),
            HashAlgorithm::Sha256 => hex::encode(Sha256::digest(bytes)),
            HashAlgorithm::Sha384 => hex::encode(Sha384::digest(bytes)),
            HashAlgorithm::Sha512 => hex::encode(Sha512::digest(bytes)),
        }
    }
}

/// `hash(value, algorithm = 'SHA-256', salt)`: hex digest of the salt
/// followed by the value.
pub fn hash(args: &[Val]) -> Val {
    let Some(value) = args.first() else {
        return Val::Null;
    };
    if !value.is_value() {
        return value.clone();
    }
    let algorithm = args.get(1).and_then(Val::as_string).unwrap_or_else(|| "SHA-256".to_string());
    let Some(algorithm_kind) = HashAlgorithm::parse(&algorithm) else {
        return Val::err(format!("Unknown hash algorithm '{algorithm}'"));
    };

    let mut input = args.get(2).and_then(Val::as_string).unwrap_or_default();
    input.push_str(&text(value));
    Val::String(algorithm_kind.hex_digest(input.as_bytes()))
}

/// Form-encode `s` (spaces become `+`).
pub fn encode_url(s: &str) -> String {
    form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

pub fn decode_url(val: &Val) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    let s = text(val).replace('+', " ");
    match urlencoding::decode(&s) {
        Ok(decoded) => Val::String(decoded.into_owned()),
        Err(e) => Val::err(format!("Unable to decode '{s}': {e}")),
    }
}

fn make_link(text: &str, url: &str, link_type: Option<&str>) -> Val {
    let mut out = format!("[{}]({})", encode_url(text), encode_url(url));
    if let Some(t) = link_type.filter(|t| !t.is_empty()) {
        out.push('{');
        out.push_str(&encode_url(t));
        out.push('}');
    }
    Val::String(out)
}

/// `link(text, url, type)`. With a single argument it is both the text and
/// the url.
pub fn link(args: &[Val]) -> Val {
    let Some(first) = args.first() else {
        return Val::Null;
    };
    if !first.is_value() {
        return first.clone();
    }
    let label = text(first);
    let url = args.get(1).map(text).unwrap_or_else(|| label.clone());
    let link_type = args.get(2).and_then(Val::as_string);
    make_link(&label, &url, link_type.as_deref())
}

/// Build `?key=value&...` from the non-empty values.
fn query(pairs: &[(&str, Option<&Val>)]) -> String {
    let parts: Vec<String> = pairs
        .iter()
        .filter_map(|(key, val)| {
            let value = val.and_then(Val::as_string).filter(|v| !v.is_empty())?;
            Some(format!("{key}={}", encode_url(&value)))
        })
        .collect();
    format!("?{}", parts.join("&"))
}

/// `dashboard(text, uuid, params)`
pub fn dashboard(args: &[Val]) -> Val {
    let Some(first) = args.first() else {
        return Val::Null;
    };
    if !first.is_value() {
        return first.clone();
    }
    let url = query(&[("uuid", args.get(1)), ("params", args.get(2))]);
    make_link(&text(first), &url, Some("dashboard"))
}

const ANNOTATION_KEYS: [&str; 8] = [
    "annotationId",
    "streamId",
    "eventId",
    "title",
    "subject",
    "status",
    "assignedTo",
    "comment",
];

/// `annotation(text, annotationId, streamId, eventId, title, subject,
/// status, assignedTo, comment)`
pub fn annotation(args: &[Val]) -> Val {
    let Some(first) = args.first() else {
        return Val::Null;
    };
    if !first.is_value() {
        return first.clone();
    }
    let pairs: Vec<(&str, Option<&Val>)> = ANNOTATION_KEYS
        .iter()
        .enumerate()
        .map(|(i, key)| (*key, args.get(i + 1)))
        .collect();
    make_link(&text(first), &query(&pairs), Some("annotation"))
}

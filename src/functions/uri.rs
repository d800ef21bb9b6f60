use url::{Position, Url};

use crate::value::Val;

/// Component returned by the `extract*FromUri` functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriPart {
    Authority,
    Fragment,
    Host,
    Path,
    Port,
    Query,
    Scheme,
    SchemeSpecificPart,
    UserInfo,
}

fn non_empty(s: &str) -> Val {
    if s.is_empty() { Val::Null } else { Val::string(s) }
}

/// Extract `part` from a URI. Text that does not parse as an absolute URI,
/// and components that are absent, give null.
pub fn extract(val: &Val, part: UriPart) -> Val {
    if !val.is_value() {
        return val.clone();
    }
    let Ok(url) = Url::parse(&val.as_string().unwrap_or_default()) else {
        return Val::Null;
    };

    match part {
        UriPart::Authority => non_empty(&url[Position::BeforeUsername..Position::AfterPort]),
        UriPart::Fragment => url.fragment().map(Val::string).unwrap_or(Val::Null),
        UriPart::Host => url.host_str().map(Val::string).unwrap_or(Val::Null),
        UriPart::Path => non_empty(url.path()),
        UriPart::Port => url.port().map(|p| Val::Integer(i32::from(p))).unwrap_or(Val::Null),
        UriPart::Query => url.query().map(Val::string).unwrap_or(Val::Null),
        UriPart::Scheme => Val::string(url.scheme()),
        UriPart::SchemeSpecificPart => {
            let rest = &url[Position::AfterScheme..Position::AfterQuery];
            non_empty(rest.strip_prefix(':').unwrap_or(rest))
        }
        UriPart::UserInfo => {
            let user = url.username();
            match url.password() {
                Some(password) => Val::String(format!("{user}:{password}")),
                None => non_empty(user),
            }
        }
    }
}

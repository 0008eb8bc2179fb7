//! Route information table shared by path builders, route binding and path
//! resolution.

use axum::http::Method;
use serde::Serialize;
use std::fmt;

/// Request methods a resource can bind views to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl RequestMethod {
    pub const ALL: [RequestMethod; 4] = [
        RequestMethod::Get,
        RequestMethod::Post,
        RequestMethod::Put,
        RequestMethod::Delete,
    ];

    pub fn from_method(method: &Method) -> Option<Self> {
        RequestMethod::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == method.as_str())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMethod::Get => "GET",
            RequestMethod::Post => "POST",
            RequestMethod::Put => "PUT",
            RequestMethod::Delete => "DELETE",
        }
    }

    /// Suffix of the model permission a verb view requires
    pub fn permission_suffix(&self) -> &'static str {
        match self {
            RequestMethod::Post => "create",
            RequestMethod::Get => "read",
            RequestMethod::Put => "update",
            RequestMethod::Delete => "delete",
        }
    }
}

impl fmt::Display for RequestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Collection,
    Member,
    Related,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::Collection => "collection",
            RouteType::Member => "member",
            RouteType::Related => "related",
        }
    }

    pub fn info(&self) -> &'static RouteInfo {
        match self {
            RouteType::Collection => &REST_ROUTE_INFO[0],
            RouteType::Member => &REST_ROUTE_INFO[1],
            RouteType::Related => &REST_ROUTE_INFO[2],
        }
    }
}

#[derive(Debug)]
pub struct RouteInfo {
    pub route_type: RouteType,
    pub route_name: &'static str,
    pub pattern: &'static str,
    pub methods: &'static [RequestMethod],
    /// Pattern for action calls on this route, when actions are supported
    pub action_pattern: Option<&'static str>,
}

impl RouteInfo {
    pub fn allows(&self, method: RequestMethod) -> bool {
        self.methods.contains(&method)
    }
}

pub static REST_ROUTE_INFO: [RouteInfo; 3] = [
    // GET: List all items
    // POST: Create new item(s)
    // PUT: Update item(s)
    // DELETE: Delete items
    RouteInfo {
        route_type: RouteType::Collection,
        route_name: "api.rest.collection",
        pattern: "/{member}/",
        methods: &RequestMethod::ALL,
        action_pattern: Some("/{member}/@{action}"),
    },
    // GET: Get a single item
    // PUT: Update a single item
    // DELETE: Delete a single item
    RouteInfo {
        route_type: RouteType::Member,
        route_name: "api.rest.member",
        pattern: "/{member}/{pk}/",
        methods: &[RequestMethod::Get, RequestMethod::Put, RequestMethod::Delete],
        action_pattern: Some("/{member}/{pk}/@{action}"),
    },
    // GET: List all related items
    // PUT: Append related item(s)
    // DELETE: Remove related item(s)
    RouteInfo {
        route_type: RouteType::Related,
        route_name: "api.rest.related",
        pattern: "/{member}/{pk}/{related_name}/",
        methods: &[RequestMethod::Get, RequestMethod::Put, RequestMethod::Delete],
        action_pattern: None,
    },
];

/// Substitute placeholders of a route pattern
pub fn route_path(pattern: &str, member: &str, pk: Option<i64>, related_name: Option<&str>) -> String {
    let mut path = pattern.replace("{member}", member);
    if let Some(pk) = pk {
        path = path.replace("{pk}", &pk.to_string());
    }
    if let Some(related_name) = related_name {
        path = path.replace("{related_name}", related_name);
    }
    path
}

/// A path matched against the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRoute {
    pub member: String,
    pub route_type: RouteType,
    pub pk: Option<i64>,
    pub related_name: Option<String>,
    pub action: Option<String>,
}

impl ResolvedRoute {
    /// Resolve the segments following the member name.
    ///
    /// Returns `None` when the segments match no route, including a `pk` that
    /// is not an integer.
    pub fn from_segments(member: &str, segments: &[&str]) -> Option<Self> {
        let mut resolved = ResolvedRoute {
            member: member.to_string(),
            route_type: RouteType::Collection,
            pk: None,
            related_name: None,
            action: None,
        };

        match segments {
            [] => {}
            [action] if action.starts_with('@') => {
                resolved.action = Some(parse_action(action)?);
            }
            [pk] => {
                resolved.route_type = RouteType::Member;
                resolved.pk = Some(parse_pk(pk)?);
            }
            [pk, action] if action.starts_with('@') => {
                resolved.route_type = RouteType::Member;
                resolved.pk = Some(parse_pk(pk)?);
                resolved.action = Some(parse_action(action)?);
            }
            [pk, related_name] => {
                resolved.route_type = RouteType::Related;
                resolved.pk = Some(parse_pk(pk)?);
                resolved.related_name = Some(related_name.to_string());
            }
            _ => return None,
        }

        Some(resolved)
    }

    /// Resolve a path relative to an API version root, e.g. `/projects/5/`
    pub fn resolve(path: &str) -> Option<Self> {
        let mut segments = path.split('/').filter(|s| !s.is_empty());
        let member = segments.next()?;
        let rest: Vec<&str> = segments.collect();
        Self::from_segments(member, &rest)
    }
}

fn parse_pk(value: &str) -> Option<i64> {
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn parse_action(value: &str) -> Option<String> {
    let name = value.strip_prefix('@')?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_string())
}

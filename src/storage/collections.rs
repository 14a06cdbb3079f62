//! Collection names and query building.

use serde_json::Value;
use std::fmt;

/// A named document collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Agents,
    AgentMemory,
    Posts,
    Comments,
    GovernanceLogs,
    PendingReactions,
    Financials,
    SiteConfig,
    NetworkStatus,
    NetworkStatusHistory,
    ActivityLog,
    CeoDirectives,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::Agents,
        Collection::AgentMemory,
        Collection::Posts,
        Collection::Comments,
        Collection::GovernanceLogs,
        Collection::PendingReactions,
        Collection::Financials,
        Collection::SiteConfig,
        Collection::NetworkStatus,
        Collection::NetworkStatusHistory,
        Collection::ActivityLog,
        Collection::CeoDirectives,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agents => "agents",
            Self::AgentMemory => "agent_memory",
            Self::Posts => "posts",
            Self::Comments => "comments",
            Self::GovernanceLogs => "governance_logs",
            Self::PendingReactions => "pending_reactions",
            Self::Financials => "financials",
            Self::SiteConfig => "site_config",
            Self::NetworkStatus => "network_status",
            Self::NetworkStatusHistory => "network_status_history",
            Self::ActivityLog => "activity_log",
            Self::CeoDirectives => "ceo_directives",
        }
    }

    /// Parse a collection name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }

    /// Whether creating a document in this collection records a change event.
    pub fn fires_on_create(&self) -> bool {
        matches!(self, Self::Posts | Self::GovernanceLogs)
    }

    /// Whether any write to this collection records a change event.
    pub fn fires_on_write(&self) -> bool {
        matches!(self, Self::NetworkStatus)
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Id of the singleton documents in `financials` and `site_config`.
pub const MAIN: &str = "main";

/// Id of the singleton document in `network_status`.
pub const CURRENT: &str = "current";

/// Comparison operator for a field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn sql(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Filter {
    pub field: String,
    pub op: Op,
    pub value: Value,
}

/// An equality/range query over one collection.
///
/// Timestamp fields compare as strings, so pass values formatted with
/// [`crate::models::timestamp::format`].
#[derive(Debug, Clone)]
pub struct Query {
    pub(crate) collection: Collection,
    pub(crate) filters: Vec<Filter>,
    pub(crate) order: Option<(String, bool)>,
    pub(crate) limit: Option<usize>,
}

impl Query {
    pub fn new(collection: Collection) -> Self {
        Self {
            collection,
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }

    fn filter(mut self, field: &str, op: Op, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, Op::Eq, value)
    }

    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, Op::Lt, value)
    }

    pub fn le(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, Op::Le, value)
    }

    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, Op::Gt, value)
    }

    pub fn ge(self, field: &str, value: impl Into<Value>) -> Self {
        self.filter(field, Op::Ge, value)
    }

    /// Newest first by `createdAt`.
    pub fn newest_first(self) -> Self {
        self.order_by("createdAt", true)
    }

    pub fn order_by(mut self, field: &str, descending: bool) -> Self {
        self.order = Some((field.to_string(), descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Render the WHERE/ORDER/LIMIT tail and its bound parameters.
    ///
    /// The first parameter is always the collection name.
    pub(crate) fn to_sql(&self) -> (String, Vec<rusqlite::types::Value>) {
        let mut sql = String::from(" WHERE collection = ?");
        let mut params = vec![rusqlite::types::Value::Text(
            self.collection.as_str().to_string(),
        )];

        for filter in &self.filters {
            sql.push_str(&format!(" AND json_extract(body, ?) {} ?", filter.op.sql()));
            params.push(rusqlite::types::Value::Text(json_path(&filter.field)));
            params.push(sql_value(&filter.value));
        }

        match &self.order {
            Some((field, descending)) => {
                let dir = if *descending { "DESC" } else { "ASC" };
                sql.push_str(&format!(" ORDER BY json_extract(body, ?) {dir}, seq {dir}"));
                params.push(rusqlite::types::Value::Text(json_path(field)));
            }
            None => sql.push_str(" ORDER BY seq ASC"),
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, params)
    }
}

fn json_path(field: &str) -> String {
    format!("$.{}", field)
}

/// Map a JSON scalar onto the SQL type `json_extract` yields for it.
fn sql_value(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;
    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Sql::Integer(i),
            None => Sql::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Sql::Text(s.clone()),
        other => Sql::Text(other.to_string()),
    }
}

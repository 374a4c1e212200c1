use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A PostgREST-style column filter, e.g. `status=eq.active`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub column: String,
    pub expr: String,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Display) -> Self {
        Self {
            column: column.into(),
            expr: format!("eq.{}", value),
        }
    }

    pub fn in_list<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Display,
    {
        let joined = values
            .into_iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Self {
            column: column.into(),
            expr: format!("in.({})", joined),
        }
    }

    /// Match when any of the `(column, value)` equalities holds
    pub fn any_eq<I, C, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Display,
        V: Display,
    {
        let joined = pairs
            .into_iter()
            .map(|(c, v)| format!("{}.eq.{}", c, v))
            .collect::<Vec<_>>()
            .join(",");
        Self {
            column: "or".to_string(),
            expr: format!("({})", joined),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let direction = if self.descending { "desc" } else { "asc" };
        write!(f, "{}.{}", self.column, direction)
    }
}

/// Parameters for a `select` against one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    /// Column list, may embed relations (`*, listing_images(*)`)
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl Default for SelectQuery {
    fn default() -> Self {
        Self {
            columns: "*".to_string(),
            filters: Vec::new(),
            order: None,
            limit: None,
        }
    }
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = Some(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Query-string pairs in the order the store expects them
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];
        params.extend(
            self.filters
                .iter()
                .map(|f| (f.column.clone(), f.expr.clone())),
        );
        if let Some(order) = &self.order {
            params.push(("order".to_string(), order.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }
}

/// Encode a bare filter list for `delete`
pub fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), f.expr.clone()))
        .collect()
}

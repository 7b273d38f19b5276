//! Listing parameters shared by the collection endpoints.
//!
//! A listing request carries `page`, `limit`, `sort` (comma separated, `-`
//! prefix for descending), `fields` (comma separated projection) and any
//! number of free-text filters keyed by column name. Column names are resolved
//! against the entity, so unknown names are rejected instead of reaching SQL.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use sea_orm::{
    ColumnTrait, ColumnType, ConnectionTrait, DbErr, EntityTrait, Iterable, Order,
    PaginatorTrait, PrimaryKeyToColumn, QueryFilter, QueryOrder, QuerySelect, Select,
    sea_query::{Alias, Expr},
};
use serde_json::Value as JsonValue;

use crate::error::RepositoryError;

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const PAGINATION_ERROR: &str = "Page and limit must be greater than 0";
pub const PAGINATION_RANGE_ERROR: &str = "Page and limit are out of range";

/// Upper bound for `page * limit`; the database binds offsets as signed 64-bit.
const MAX_ROW_SPAN: u64 = i64::MAX as u64;

const RESERVED_KEYS: [&str; 4] = ["page", "limit", "sort", "fields"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub descending: bool,
}

/// Parsed listing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: u64,
    pub limit: u64,
    pub sort: Vec<SortKey>,
    pub fields: Vec<String>,
    pub filters: BTreeMap<String, String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort: Vec::new(),
            fields: Vec::new(),
            filters: BTreeMap::new(),
        }
    }
}

/// One page of results plus the number of rows matching the filters.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
        }
    }
}

fn parse_positive(raw: Option<String>, default: u64) -> Result<u64, RepositoryError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some(value) => value
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| RepositoryError::validation_error(PAGINATION_ERROR)),
    }
}

fn split_list(raw: Option<String>) -> Vec<String> {
    raw.map(|value| {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

impl ListQuery {
    /// Builds a query from raw query-string pairs. Keys other than the
    /// reserved ones become filters; empty filter values are ignored.
    pub fn from_params(mut params: HashMap<String, String>) -> Result<Self, RepositoryError> {
        let page = parse_positive(params.remove("page"), DEFAULT_PAGE)?;
        let limit = parse_positive(params.remove("limit"), DEFAULT_LIMIT)?;
        page.checked_mul(limit)
            .filter(|span| *span <= MAX_ROW_SPAN)
            .ok_or_else(|| RepositoryError::validation_error(PAGINATION_RANGE_ERROR))?;

        let sort = split_list(params.remove("sort"))
            .into_iter()
            .filter_map(|key| {
                let (column, descending) = match key.strip_prefix('-') {
                    Some(rest) => (rest.trim().to_string(), true),
                    None => (key, false),
                };
                (!column.is_empty()).then_some(SortKey { column, descending })
            })
            .collect();

        let fields = split_list(params.remove("fields"));

        let filters = params
            .into_iter()
            .filter(|(key, value)| !RESERVED_KEYS.contains(&key.as_str()) && !value.is_empty())
            .collect();

        Ok(Self {
            page,
            limit,
            sort,
            fields,
            filters,
        })
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    /// Removes and returns a filter that the caller handles itself.
    pub fn take_filter(&mut self, key: &str) -> Option<String> {
        self.filters.remove(key)
    }
}

/// Resolves a column of `E` by its field name.
pub fn column<E>(name: &str) -> Result<E::Column, RepositoryError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    E::Column::from_str(name)
        .map_err(|_| RepositoryError::validation_error(format!("Unknown field '{name}'")))
}

fn is_textual(column_type: &ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::String(_) | ColumnType::Text | ColumnType::Char(_)
    )
}

/// Adds a `LIKE '%value%'` condition per filter. Non-text columns are cast to
/// text first so the comparison is valid on every backend.
pub fn apply_like_filters<E>(
    mut select: Select<E>,
    filters: &BTreeMap<String, String>,
) -> Result<Select<E>, RepositoryError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    for (key, value) in filters {
        let col = column::<E>(key)?;
        let pattern = format!("%{value}%");
        let condition = if is_textual(col.def().get_column_type()) {
            col.like(pattern)
        } else {
            Expr::expr(Expr::col((E::default(), col)).cast_as(Alias::new("TEXT"))).like(pattern)
        };
        select = select.filter(condition);
    }
    Ok(select)
}

/// Applies the requested ordering followed by the primary key, so pages are stable.
pub fn apply_sort<E>(mut select: Select<E>, sort: &[SortKey]) -> Result<Select<E>, RepositoryError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    for key in sort {
        let col = column::<E>(&key.column)?;
        let order = if key.descending {
            Order::Desc
        } else {
            Order::Asc
        };
        select = select.order_by(col, order);
    }

    for pk in E::PrimaryKey::iter() {
        select = select.order_by(pk.into_column(), Order::Asc);
    }

    Ok(select)
}

/// Resolves the `fields` projection.
pub fn projection<E>(fields: &[String]) -> Result<Vec<E::Column>, RepositoryError>
where
    E: EntityTrait,
    E::Column: FromStr,
{
    fields.iter().map(|field| column::<E>(field)).collect()
}

/// Counts the filtered rows, then fetches the requested page.
pub async fn fetch_page<E, C>(
    db: &C,
    select: Select<E>,
    query: &ListQuery,
) -> Result<Page<E::Model>, DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let total = select.clone().count(db).await?;
    let items = select
        .offset(query.offset())
        .limit(query.limit)
        .all(db)
        .await?;
    Ok(Page { items, total })
}

/// Like [`fetch_page`], but returns only `columns` as JSON objects.
pub async fn fetch_projected_page<E, C>(
    db: &C,
    select: Select<E>,
    columns: Vec<E::Column>,
    query: &ListQuery,
) -> Result<Page<JsonValue>, DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
{
    let total = select.clone().count(db).await?;
    let items = select
        .select_only()
        .columns(columns)
        .offset(query.offset())
        .limit(query.limit)
        .into_json()
        .all(db)
        .await?;
    Ok(Page { items, total })
}

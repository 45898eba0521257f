//! SQL text and parameters for store operations
//!
//! All statements use positional `?` placeholders; parameters are collected in
//! the order their placeholders appear. Prefix matches go through `LIKE`
//! with `\` as the escape character, so `%` and `_` in keys match literally.

use crate::dialect::{Dialect, TABLE_NAME};
use jsondb_core::filter::{ChildFilter, Filter, LogicalOp};
use jsondb_core::key::{self, SEPARATOR};
use jsondb_core::options::GetOptions;
use jsondb_core::{Error, Result};
use rusqlite::types::Value;

/// A statement and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    /// Statement text
    pub sql: String,
    /// Parameters in placeholder order
    pub params: Vec<Value>,
}

impl SqlQuery {
    fn new(sql: impl Into<String>) -> Self {
        SqlQuery {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    fn text(mut self, value: impl Into<String>) -> Self {
        self.params.push(Value::Text(value.into()));
        self
    }

    fn integer(mut self, value: usize) -> Self {
        self.params.push(Value::Integer(value as i64));
        self
    }
}

/// Escape `\`, `%` and `_` for a `LIKE ... ESCAPE '\'` pattern
pub fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Pattern matching `prefix` and everything below it
pub fn like_prefix(prefix: &str) -> String {
    let mut pattern = like_escape(prefix);
    pattern.push('%');
    pattern
}

fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Number of rows at or below a path
pub fn count_below(db_path: &str) -> SqlQuery {
    SqlQuery::new(format!(
        "SELECT COUNT(*) FROM {} WHERE path LIKE ? ESCAPE '\\'",
        TABLE_NAME
    ))
    .text(like_prefix(db_path))
}

/// Remove a path and everything below it
pub fn delete_below(db_path: &str) -> SqlQuery {
    SqlQuery::new(format!(
        "DELETE FROM {} WHERE path LIKE ? ESCAPE '\\'",
        TABLE_NAME
    ))
    .text(like_prefix(db_path))
}

/// Remove rows at exactly these paths
pub fn delete_exact(paths: &[String]) -> Option<SqlQuery> {
    if paths.is_empty() {
        return None;
    }
    let placeholders = vec!["?"; paths.len()].join(", ");
    let query = SqlQuery::new(format!(
        "DELETE FROM {} WHERE path IN ({})",
        TABLE_NAME, placeholders
    ));
    Some(paths.iter().fold(query, |q, p| q.text(p.as_str())))
}

/// Any one row strictly below a path, enough to tell an array container
/// from an object container. Selects `path`.
pub fn any_child(db_path: &str) -> SqlQuery {
    SqlQuery::new(format!(
        "SELECT path FROM {} WHERE path LIKE ? ESCAPE '\\' AND path <> ? LIMIT 1",
        TABLE_NAME
    ))
    .text(like_prefix(db_path))
    .text(db_path)
}

/// Rows of the subtree at `db_path`, filtered, bounded and ordered per
/// `options`. Selects `path, value, ovalue`.
///
/// `positions` tells whether all-digit bound keys name array positions.
pub fn select_subtree(db_path: &str, options: &GetOptions, positions: bool) -> Result<SqlQuery> {
    let mut query = SqlQuery::new(format!(
        "SELECT j.path, j.value, j.ovalue FROM {} j",
        TABLE_NAME
    ));

    if let Some(filter) = &options.filter {
        let mut alias = 0;
        let sub = compile_filter(filter, db_path, &mut alias)?;
        query.sql.push_str(" INNER JOIN (");
        query.sql.push_str(&sub.sql);
        query
            .sql
            .push_str(") f ON substr(j.path, 1, length(f.match_path)) = f.match_path");
        query.params.extend(sub.params);
    }

    query.sql.push_str(" WHERE j.path LIKE ? ESCAPE '\\'");
    query = query.text(like_prefix(db_path));

    if let Some(k) = &options.start_at {
        query.sql.push_str(" AND j.path >= ?");
        query = query.text(format!("{}{}", db_path, key::child_token(k, positions)?));
    }
    if let Some(k) = &options.start_after {
        query.sql.push_str(" AND j.path >= ?");
        let token = key::child_token(k, positions)?;
        query = query.text(format!("{}{}", db_path, key::successor(&token)));
    }
    if let Some(k) = &options.end_at {
        query.sql.push_str(" AND j.path < ?");
        let token = key::child_token(k, positions)?;
        query = query.text(format!("{}{}", db_path, key::successor(&token)));
    }
    if let Some(k) = &options.end_before {
        query.sql.push_str(" AND j.path < ?");
        query = query.text(format!("{}{}", db_path, key::child_token(k, positions)?));
    }

    query.sql.push_str(" ORDER BY j.path ");
    query.sql.push_str(options.order.as_sql());
    Ok(query)
}

/// Sub-query yielding the distinct `match_path` of every direct child of
/// `db_path` that satisfies `filter`
pub fn compile_filter(filter: &Filter, db_path: &str, alias: &mut usize) -> Result<SqlQuery> {
    match filter {
        Filter::Child(child) => compile_child(child, db_path),
        Filter::Logical(logical) => {
            let combinator = match logical.op() {
                LogicalOp::And => " INTERSECT ",
                LogicalOp::Or => " UNION ",
            };
            let mut query = SqlQuery::new("");
            for (i, sub) in logical.filters().iter().enumerate() {
                let compiled = compile_filter(sub, db_path, alias)?;
                *alias += 1;
                if i > 0 {
                    query.sql.push_str(combinator);
                }
                query.sql.push_str(&format!(
                    "SELECT match_path FROM ({}) AS s{}",
                    compiled.sql, alias
                ));
                query.params.extend(compiled.params);
            }
            Ok(query)
        }
    }
}

fn compile_child(filter: &ChildFilter, db_path: &str) -> Result<SqlQuery> {
    let field = filter.field();
    let suffix = format!("{}{}", like_escape(field), SEPARATOR);
    let mut query = SqlQuery::new(format!(
        "SELECT DISTINCT substr(path, 1, length(path) - ?) AS match_path FROM {} \
         WHERE path LIKE ? ESCAPE '\\' AND path NOT LIKE ? ESCAPE '\\' AND value {} ?",
        TABLE_NAME,
        filter.op().as_sql()
    ))
    .integer(field.chars().count() + 1)
    .text(format!("{}%/{}", like_escape(db_path), suffix))
    .text(format!("{}%/%/{}", like_escape(db_path), suffix))
    .text(filter.encoded_value()?);

    if filter.op().is_ordering() {
        if let Some((low, high)) = filter.type_range() {
            query.sql.push_str(" AND value >= ? AND value < ?");
            query = query.text(low).text(high);
        }
    }
    Ok(query)
}

/// Index lookup: paths of indexed rows with this key and value
pub fn index_lookup(index_key: &str, encoded_value: &str) -> SqlQuery {
    SqlQuery::new(format!(
        "SELECT path FROM {} WHERE idx = ? AND value = ?",
        TABLE_NAME
    ))
    .text(index_key)
    .text(encoded_value)
}

/// Full-scan lookup of the direct children of `db_container` whose `field`
/// holds `encoded_value`. Selects the child token.
pub fn scan_lookup(
    dialect: Dialect,
    db_container: &str,
    field: &str,
    encoded_value: &str,
) -> Result<SqlQuery> {
    if dialect.has_native_regex() {
        let pattern = format!(
            "^{}([^/]+)/{}/$",
            regex_escape(db_container),
            regex_escape(field)
        );
        let sql = match dialect {
            Dialect::H2 => format!(
                "SELECT REGEXP_REPLACE(path, ?, '$1') FROM {} WHERE REGEXP_LIKE(path, ?) AND value = ?",
                TABLE_NAME
            ),
            _ => format!(
                "SELECT regexp_replace(path, ?, '\\1') FROM {} WHERE path ~ ? AND value = ?",
                TABLE_NAME
            ),
        };
        Ok(SqlQuery::new(sql)
            .text(pattern.clone())
            .text(pattern)
            .text(encoded_value))
    } else if dialect.needs_helper_functions() {
        let start = db_container.chars().count() + 1;
        let suffix = format!("/{}/", field);
        Ok(SqlQuery::new(format!(
            "SELECT trim_suffix(substr(path, ?), ?) FROM {} \
             WHERE value = ? AND path LIKE ? ESCAPE '\\' \
             AND split_part(substr(path, ?), '/', 1) = trim_suffix(substr(path, ?), ?)",
            TABLE_NAME
        ))
        .integer(start)
        .text(suffix.clone())
        .text(encoded_value)
        .text(format!("{}%/{}/", like_escape(db_container), like_escape(field)))
        .integer(start)
        .integer(start)
        .text(suffix))
    } else {
        Err(Error::unsupported(format!(
            "{} has neither regular expressions nor helper functions for property scans",
            dialect
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsondb_core::filter::Op;
    use jsondb_core::SortOrder;
    use serde_json::json;

    fn text(v: &Value) -> &str {
        match v {
            Value::Text(s) => s,
            other => panic!("not text: {:?}", other),
        }
    }

    #[test]
    fn like_escape_special_chars() {
        assert_eq!(like_escape("a_b%c\\d"), "a\\_b\\%c\\\\d");
        assert_eq!(like_prefix("/a_b/"), "/a\\_b/%");
    }

    #[test]
    fn count_and_delete_use_escaped_prefix() {
        let q = count_below("/x_y/");
        assert!(q.sql.contains("ESCAPE"));
        assert_eq!(text(&q.params[0]), "/x\\_y/%");
        assert_eq!(delete_below("/a/").params.len(), 1);
    }

    #[test]
    fn delete_exact_builds_in_list() {
        assert!(delete_exact(&[]).is_none());
        let q = delete_exact(&["/".to_string(), "/a/".to_string()]).unwrap();
        assert!(q.sql.ends_with("IN (?, ?)"));
        assert_eq!(q.params.len(), 2);
    }

    #[test]
    fn any_child_excludes_the_path_itself() {
        let q = any_child("/a_b/");
        assert!(q.sql.ends_with("LIMIT 1"));
        assert_eq!(text(&q.params[0]), "/a\\_b/%");
        assert_eq!(text(&q.params[1]), "/a_b/");
    }

    #[test]
    fn digit_bounds_follow_container_kind() {
        let options = GetOptions::new().start_at("3");
        let q = select_subtree("/a/", &options, true).unwrap();
        assert_eq!(text(&q.params[1]), format!("/a/{}/", key::array_token(3)));
        let q = select_subtree("/a/", &options, false).unwrap();
        assert_eq!(text(&q.params[1]), "/a/3/");
        assert!(select_subtree("/a/", &GetOptions::new().end_at("a.b"), true).is_err());
    }

    #[test]
    fn range_bounds_use_successor() {
        let options = GetOptions::new()
            .start_after("b")
            .end_at("d")
            .order(SortOrder::Desc);
        let q = select_subtree("/a/", &options, true).unwrap();
        assert!(q.sql.ends_with("ORDER BY j.path DESC"));
        assert_eq!(text(&q.params[0]), "/a/%");
        assert_eq!(text(&q.params[1]), "/a/b0");
        assert_eq!(text(&q.params[2]), "/a/d0");

        let q = select_subtree("/a/", &GetOptions::new().start_at("b").end_before("d"), true).unwrap();
        assert_eq!(text(&q.params[1]), "/a/b/");
        assert_eq!(text(&q.params[2]), "/a/d/");
    }

    #[test]
    fn filter_join_params_come_first() {
        let filter = Filter::child("age", Op::Gt, json!(30)).unwrap();
        let q = select_subtree("/users/", &GetOptions::new().filter(filter), true).unwrap();
        assert!(q.sql.contains("INNER JOIN"));
        assert_eq!(q.params[0], Value::Integer(4));
        assert_eq!(text(&q.params[1]), "/users/%/age/");
        assert_eq!(text(&q.params[2]), "/users/%/%/age/");
        assert_eq!(text(&q.params[3]), "=:230");
        assert_eq!(text(&q.params[4]), "<");
        assert_eq!(text(&q.params[5]), ">");
        assert_eq!(text(&q.params[6]), "/users/%");
    }

    #[test]
    fn logical_filters_compile_to_set_operations() {
        let filter = Filter::or(vec![
            Filter::equals("a", json!(1)).unwrap(),
            Filter::and(vec![
                Filter::equals("b", json!("x")).unwrap(),
                Filter::equals("c", json!(true)).unwrap(),
            ])
            .unwrap(),
        ])
        .unwrap();
        let mut alias = 0;
        let q = compile_filter(&filter, "/", &mut alias).unwrap();
        assert_eq!(q.sql.matches(" UNION ").count(), 1);
        assert_eq!(q.sql.matches(" INTERSECT ").count(), 1);
        assert_eq!(q.params.len(), 12);
        assert_eq!(alias, 4);
    }

    #[test]
    fn scan_lookup_per_dialect() {
        let sqlite = scan_lookup(Dialect::SQLite, "/users/", "name", "`ann").unwrap();
        assert!(sqlite.sql.contains("split_part"));
        assert_eq!(sqlite.params[0], Value::Integer(8));
        assert_eq!(text(&sqlite.params[3]), "/users/%/name/");

        let pg = scan_lookup(Dialect::PostgreSQL, "/users/", "name", "`ann").unwrap();
        assert!(pg.sql.contains("path ~ ?"));
        assert_eq!(text(&pg.params[0]), "^/users/([^/]+)/name/$");

        let h2 = scan_lookup(Dialect::H2, "/a+b/", "f", "N").unwrap();
        assert!(h2.sql.contains("REGEXP_LIKE"));
        assert_eq!(text(&h2.params[0]), "^/a\\+b/([^/]+)/f/$");
    }
}

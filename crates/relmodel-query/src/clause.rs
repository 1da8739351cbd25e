//! Predicate rendering.
//!
//! Turns a [`Where`] into parameterized SQL. Rules per predicate, first match
//! wins:
//!
//! 1. list under a comma-separated key: one `(a, b) = (?, ?)` per tuple,
//!    OR-ed together;
//! 2. list under a single key: `col IN (?, ...)`, capped at the limit;
//! 3. strict text: `col = ?`;
//! 4. operator: `>`, `>=`, `<`, `<=`, `!=`, `col & ? != 0`, `col & ? = ?`;
//! 5. NULL: `col IS NULL`;
//! 6. text: `col LIKE ?` with the value wrapped in `%`;
//! 7. anything else: `col = ?`.

use crate::options::{Cond, Divider, Operator, Where};
use relmodel_core::{Error, Result, Value, is_valid_identifier, is_valid_identifier_list};

/// A rendered SQL fragment and its parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Fragment {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Join fragments with AND, parenthesizing each one that contains an OR.
pub fn and_all(parts: Vec<Fragment>) -> Option<Fragment> {
    if parts.is_empty() {
        return None;
    }
    let multiple = parts.len() > 1;
    let mut out = Fragment::default();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            out.sql.push_str(" AND ");
        }
        if multiple && part.sql.contains(" OR ") {
            out.sql.push('(');
            out.sql.push_str(&part.sql);
            out.sql.push(')');
        } else {
            out.sql.push_str(&part.sql);
        }
        out.params.extend(part.params);
    }
    Some(out)
}

/// Render `filter` joined by `divider`.
///
/// More than one predicate without a divider is a configuration error. A
/// positive `limit` caps the number of values in a single-column `IN` list.
pub fn render_where(
    table: &str,
    filter: &Where,
    divider: Option<Divider>,
    limit: u64,
) -> Result<Option<Fragment>> {
    if filter.is_empty() {
        return Ok(None);
    }
    let divider = match divider {
        Some(d) => d,
        None if filter.len() == 1 => Divider::And,
        None => {
            return Err(Error::config(
                table,
                format!(
                    "{} predicates given without a divider; set AND or OR",
                    filter.len()
                ),
            ));
        }
    };

    let mut out = Fragment::default();
    for (i, (key, cond)) in filter.iter().enumerate() {
        let part = render_predicate(table, key, cond, limit)?;
        if i > 0 {
            out.sql.push_str(divider.as_sql());
        }
        out.sql.push_str(&part.sql);
        out.params.extend(part.params);
    }
    Ok(Some(out))
}

fn render_predicate(table: &str, key: &str, cond: &Cond, limit: u64) -> Result<Fragment> {
    if key.contains(',') {
        if !is_valid_identifier_list(key) {
            return Err(Error::config(
                table,
                format!("predicate key {key:?} is not a column list"),
            ));
        }
        let Cond::List(values) = cond else {
            return Err(Error::config(
                table,
                format!("predicate key {key:?} lists several columns and needs a list value"),
            ));
        };
        let columns: Vec<&str> = key.split(',').map(str::trim).collect();
        return key_match(table, &columns, values);
    }

    if !is_valid_identifier(key) {
        return Err(Error::config(
            table,
            format!("predicate key {key:?} is not a valid column name"),
        ));
    }

    Ok(match cond {
        Cond::List(values) => {
            let capped: Vec<Value> = match usize::try_from(limit) {
                Ok(n) if n > 0 => values.iter().take(n).cloned().collect(),
                _ => values.clone(),
            };
            return key_match(table, &[key], &capped);
        }
        Cond::StrictText(text) => {
            Fragment::new(format!("{key} = ?"), vec![Value::Text(text.clone())])
        }
        Cond::Op { op, value } => {
            let value = value.clone().normalized();
            match op {
                Operator::Gt => Fragment::new(format!("{key} > ?"), vec![value]),
                Operator::Ge => Fragment::new(format!("{key} >= ?"), vec![value]),
                Operator::Lt => Fragment::new(format!("{key} < ?"), vec![value]),
                Operator::Le => Fragment::new(format!("{key} <= ?"), vec![value]),
                Operator::Ne => Fragment::new(format!("{key} != ?"), vec![value]),
                Operator::BitAnd => Fragment::new(format!("{key} & ? != 0"), vec![value]),
                Operator::BitAndExact => {
                    Fragment::new(format!("{key} & ? = ?"), vec![value.clone(), value])
                }
            }
        }
        Cond::Value(Value::Null) => Fragment::new(format!("{key} IS NULL"), Vec::new()),
        Cond::Value(Value::Text(text)) => {
            Fragment::new(format!("{key} LIKE ?"), vec![Value::Text(format!("%{text}%"))])
        }
        Cond::Value(value) => Fragment::new(format!("{key} = ?"), vec![value.clone().normalized()]),
    })
}

/// Match `columns` against a flat list of key values.
///
/// One column renders `col IN (?, ...)`. Several columns consume the values
/// in groups and render `((a, b) = (?, ?) OR ...)`. No values renders a
/// predicate that matches nothing.
pub fn key_match(table: &str, columns: &[&str], values: &[Value]) -> Result<Fragment> {
    if values.is_empty() {
        return Ok(Fragment::new("1 = 0", Vec::new()));
    }
    let params: Vec<Value> = values.iter().cloned().map(Value::normalized).collect();
    match columns {
        [] => Err(Error::config(table, "key match without columns")),
        [column] => Ok(Fragment::new(
            format!("{column} IN ({})", placeholders(values.len())),
            params,
        )),
        _ => {
            let width = columns.len();
            if values.len() % width != 0 {
                return Err(Error::config(
                    table,
                    format!(
                        "{} values cannot be split into tuples of {} for ({})",
                        values.len(),
                        width,
                        columns.join(", ")
                    ),
                ));
            }
            let tuple = format!("({}) = ({})", columns.join(", "), placeholders(width));
            let rows = values.len() / width;
            let sql = vec![tuple; rows].join(" OR ");
            let sql = if rows > 1 { format!("({sql})") } else { sql };
            Ok(Fragment::new(sql, params))
        }
    }
}

/// `?, ?, ?`
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(filter: &Where, divider: Option<Divider>, limit: u64) -> Fragment {
        render_where("t", filter, divider, limit).unwrap().unwrap()
    }

    #[test]
    fn test_value_rules() {
        let filter = Where::new()
            .with("name", "bob")
            .with("title", Cond::strict("Dr"))
            .with("deleted_at", Value::Null)
            .with("age", 30);
        let frag = render(&filter, Some(Divider::And), 0);
        assert_eq!(
            frag.sql,
            "name LIKE ? AND title = ? AND deleted_at IS NULL AND age = ?"
        );
        assert_eq!(
            frag.params,
            vec![
                Value::Text("%bob%".into()),
                Value::Text("Dr".into()),
                Value::Integer(30),
            ]
        );
    }

    #[test]
    fn test_operators() {
        let filter = Where::new()
            .with("a", Cond::gt(1))
            .with("b", Cond::ge(2))
            .with("c", Cond::lt(3))
            .with("d", Cond::le(4))
            .with("e", Cond::ne(5))
            .with("f", Cond::bit_and(6))
            .with("g", Cond::bit_and_exact(7));
        let frag = render(&filter, Some(Divider::Or), 0);
        assert_eq!(
            frag.sql,
            "a > ? OR b >= ? OR c < ? OR d <= ? OR e != ? OR f & ? != 0 OR g & ? = ?"
        );
        assert_eq!(frag.params.len(), 8);
        assert_eq!(frag.params[6], Value::Integer(7));
        assert_eq!(frag.params[7], Value::Integer(7));
    }

    #[test]
    fn test_in_list_is_capped_by_limit() {
        let filter = Where::new().with("id", Cond::list([1, 2, 3, 4]));
        let frag = render(&filter, None, 2);
        assert_eq!(frag.sql, "id IN (?, ?)");
        assert_eq!(frag.params, vec![Value::Integer(1), Value::Integer(2)]);

        let frag = render(&filter, None, 0);
        assert_eq!(frag.sql, "id IN (?, ?, ?, ?)");
    }

    #[test]
    fn test_tuple_keys() {
        let filter = Where::new().with("first_id,second_id", Cond::list([1, 2, 2, 1]));
        let frag = render(&filter, None, 0);
        assert_eq!(
            frag.sql,
            "((first_id, second_id) = (?, ?) OR (first_id, second_id) = (?, ?))"
        );
        assert_eq!(frag.params.len(), 4);

        let bad = Where::new().with("a,b", Cond::list([1, 2, 3]));
        assert!(render_where("t", &bad, None, 0).is_err());

        let scalar = Where::new().with("a,b", 1);
        assert!(render_where("t", &scalar, None, 0).is_err());
    }

    #[test]
    fn test_divider_required_for_several_predicates() {
        let filter = Where::new().with("a", 1).with("b", 2);
        let err = render_where("t", &filter, None, 0).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(render_where("t", &Where::new().with("a", 1), None, 0).is_ok());
    }

    #[test]
    fn test_rejects_unsafe_keys() {
        let filter = Where::new().with("a = 1 OR 1", 1);
        assert!(render_where("t", &filter, None, 0).is_err());
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let filter = Where::new().with("id", Cond::List(Vec::new()));
        assert_eq!(render(&filter, None, 0).sql, "1 = 0");
    }

    #[test]
    fn test_and_all_wraps_or_groups() {
        let joined = and_all(vec![
            Fragment::new("a = ? OR b = ?", vec![Value::Integer(1), Value::Integer(2)]),
            Fragment::new("c = ?", vec![Value::Integer(3)]),
        ])
        .unwrap();
        assert_eq!(joined.sql, "(a = ? OR b = ?) AND c = ?");
        assert_eq!(joined.params.len(), 3);
        assert!(and_all(Vec::new()).is_none());
    }
}

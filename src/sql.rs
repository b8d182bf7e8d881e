use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use sqlparser::ast::{self, Expr, ObjectNamePart, SetExpr, Statement, TableFactor, TableObject, Value, ValueWithSpan};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use ulid::Ulid;

use crate::model::*;

/// Which reservations a SELECT asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationFilter {
    All,
    Id(Ulid),
    Resource(Ulid),
}

/// Parsed command from SQL input.
#[derive(Debug, PartialEq)]
pub enum Command {
    InsertUser {
        id: Option<Ulid>,
        name: String,
        contact: String,
        role: UserRole,
    },
    InsertResource {
        id: Option<Ulid>,
        host_id: Ulid,
        name: String,
        location: String,
        capacity: u32,
        daily_rate: f64,
        status: AvailabilityState,
        amenities: Vec<String>,
        photos: Vec<String>,
    },
    /// Without `guest_id` the server picks the current guest.
    InsertReservation {
        guest_id: Option<Ulid>,
        resource_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    SelectUsers {
        id: Option<Ulid>,
    },
    SelectResources {
        id: Option<Ulid>,
    },
    SelectReservations {
        filter: ReservationFilter,
    },
    SelectQuote {
        resource_id: Ulid,
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
}

pub fn parse_sql(sql: &str) -> Result<Command, SqlError> {
    let dialect = PostgreSqlDialect {};
    let stmts = Parser::parse_sql(&dialect, sql).map_err(|e| SqlError::Parse(e.to_string()))?;
    if stmts.is_empty() {
        return Err(SqlError::Empty);
    }
    if stmts.len() > 1 {
        return Err(SqlError::Unsupported("multiple statements".into()));
    }

    match &stmts[0] {
        Statement::Insert(insert) => parse_insert(insert),
        Statement::Query(query) => parse_select(query),
        other => Err(SqlError::Unsupported(format!("{other}"))),
    }
}

/// Column name → value expression for a single-row INSERT.
type Columns = HashMap<String, Expr>;

fn parse_insert(insert: &ast::Insert) -> Result<Command, SqlError> {
    let table = insert_table_name(insert)?;
    let row = extract_insert_row(insert, &table)?;

    match table.as_str() {
        "users" => Ok(Command::InsertUser {
            id: optional(&row, "id", parse_ulid_or_null)?.flatten(),
            name: parse_string(required(&row, "name")?)?,
            contact: parse_string(required(&row, "contact")?)?,
            role: parse_enum(required(&row, "role")?)?,
        }),
        "resources" => Ok(Command::InsertResource {
            id: optional(&row, "id", parse_ulid_or_null)?.flatten(),
            host_id: parse_ulid(required(&row, "host_id")?)?,
            name: parse_string(required(&row, "name")?)?,
            location: parse_string(required(&row, "location")?)?,
            capacity: parse_u32(required(&row, "capacity")?)?,
            daily_rate: parse_f64(required(&row, "daily_rate")?)?,
            status: optional(&row, "status", parse_enum)?.unwrap_or_default(),
            amenities: optional(&row, "amenities", parse_list)?.unwrap_or_default(),
            photos: optional(&row, "photos", parse_list)?.unwrap_or_default(),
        }),
        "reservations" => Ok(Command::InsertReservation {
            guest_id: optional(&row, "guest_id", parse_ulid_or_null)?.flatten(),
            resource_id: parse_ulid(required(&row, "resource_id")?)?,
            start_date: parse_date(required(&row, "start_date")?)?,
            end_date: parse_date(required(&row, "end_date")?)?,
        }),
        _ => Err(SqlError::UnknownTable(table)),
    }
}

fn parse_select(query: &ast::Query) -> Result<Command, SqlError> {
    let select = match query.body.as_ref() {
        SetExpr::Select(s) => s,
        _ => return Err(SqlError::Unsupported("non-SELECT query".into())),
    };

    if select.from.is_empty() {
        return Err(SqlError::Parse("SELECT without FROM".into()));
    }
    let table = table_factor_name(&select.from[0].relation)?;

    let mut filters = Columns::new();
    if let Some(selection) = &select.selection {
        extract_eq_filters(selection, &mut filters)?;
    }

    let allowed: &[&str] = match table.as_str() {
        "users" | "resources" => &["id"],
        "reservations" => &["id", "resource_id"],
        "quotes" => &["resource_id", "start_date", "end_date"],
        _ => return Err(SqlError::UnknownTable(table)),
    };
    if let Some(col) = filters.keys().find(|c| !allowed.contains(&c.as_str())) {
        return Err(SqlError::Unsupported(format!("filter on {table}.{col}")));
    }

    match table.as_str() {
        "users" => Ok(Command::SelectUsers {
            id: optional(&filters, "id", parse_ulid)?,
        }),
        "resources" => Ok(Command::SelectResources {
            id: optional(&filters, "id", parse_ulid)?,
        }),
        "reservations" => {
            let id = optional(&filters, "id", parse_ulid)?;
            let resource_id = optional(&filters, "resource_id", parse_ulid)?;
            let filter = match (id, resource_id) {
                (Some(_), Some(_)) => {
                    return Err(SqlError::Unsupported(
                        "filter on both id and resource_id".into(),
                    ));
                }
                (Some(id), None) => ReservationFilter::Id(id),
                (None, Some(rid)) => ReservationFilter::Resource(rid),
                (None, None) => ReservationFilter::All,
            };
            Ok(Command::SelectReservations { filter })
        }
        _ => Ok(Command::SelectQuote {
            resource_id: parse_ulid(filters.get("resource_id").ok_or(SqlError::MissingFilter("resource_id"))?)?,
            start_date: parse_date(filters.get("start_date").ok_or(SqlError::MissingFilter("start_date"))?)?,
            end_date: parse_date(filters.get("end_date").ok_or(SqlError::MissingFilter("end_date"))?)?,
        }),
    }
}

/// Collect `col = value` terms joined by AND.
fn extract_eq_filters(expr: &Expr, filters: &mut Columns) -> Result<(), SqlError> {
    match expr {
        Expr::BinaryOp { left, op, right } => match op {
            ast::BinaryOperator::And => {
                extract_eq_filters(left, filters)?;
                extract_eq_filters(right, filters)
            }
            ast::BinaryOperator::Eq => {
                let col = expr_column_name(left)
                    .ok_or_else(|| SqlError::Parse(format!("expected column, got {left}")))?;
                filters.insert(col, right.as_ref().clone());
                Ok(())
            }
            other => Err(SqlError::Unsupported(format!("operator {other}"))),
        },
        Expr::Nested(inner) => extract_eq_filters(inner, filters),
        other => Err(SqlError::Unsupported(format!("filter {other}"))),
    }
}

// ── Helpers ───────────────────────────────────────────────────

fn object_name_last(name: &ast::ObjectName) -> Option<String> {
    name.0.last().and_then(|part| match part {
        ObjectNamePart::Identifier(ident) => Some(ident.value.to_lowercase()),
        _ => None,
    })
}

fn insert_table_name(insert: &ast::Insert) -> Result<String, SqlError> {
    match &insert.table {
        TableObject::TableName(name) => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("unsupported table object in INSERT".into())),
    }
}

fn table_factor_name(tf: &TableFactor) -> Result<String, SqlError> {
    match tf {
        TableFactor::Table { name, .. } => {
            object_name_last(name).ok_or_else(|| SqlError::Parse("empty table name".into()))
        }
        _ => Err(SqlError::Parse("complex table expression".into())),
    }
}

fn extract_insert_row(insert: &ast::Insert, table: &str) -> Result<Columns, SqlError> {
    let body = insert
        .source
        .as_ref()
        .ok_or(SqlError::Parse("no VALUES".into()))?;
    let values = match body.body.as_ref() {
        SetExpr::Values(values) => values,
        _ => return Err(SqlError::Parse("expected VALUES".into())),
    };
    match values.rows.len() {
        0 => return Err(SqlError::Parse("empty VALUES".into())),
        1 => {}
        _ => return Err(SqlError::Unsupported("multi-row INSERT".into())),
    }
    if insert.columns.is_empty() {
        return Err(SqlError::Parse(format!("{table}: column list required")));
    }
    let row = &values.rows[0];
    if row.len() != insert.columns.len() {
        return Err(SqlError::WrongArity(
            table.to_string(),
            insert.columns.len(),
            row.len(),
        ));
    }
    Ok(insert
        .columns
        .iter()
        .map(|c| c.value.to_lowercase())
        .zip(row.iter().cloned())
        .collect())
}

fn required<'a>(row: &'a Columns, col: &'static str) -> Result<&'a Expr, SqlError> {
    row.get(col).ok_or(SqlError::MissingColumn(col))
}

fn optional<T>(
    row: &Columns,
    col: &'static str,
    parse: impl Fn(&Expr) -> Result<T, SqlError>,
) -> Result<Option<T>, SqlError> {
    row.get(col).map(parse).transpose()
}

fn expr_column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_lowercase()),
        _ => None,
    }
}

fn extract_value(expr: &Expr) -> Option<&Value> {
    match expr {
        Expr::Value(ValueWithSpan { value, .. }) => Some(value),
        _ => None,
    }
}

fn parse_string(expr: &Expr) -> Result<String, SqlError> {
    match extract_value(expr) {
        Some(Value::SingleQuotedString(s)) => Ok(s.clone()),
        Some(value) => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        None => Err(SqlError::Parse(format!("expected value, got {expr:?}"))),
    }
}

fn parse_ulid(expr: &Expr) -> Result<Ulid, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::SingleQuotedString(s) | Value::Number(s, _) => {
                Ulid::from_string(s).map_err(|e| SqlError::Parse(format!("bad ULID: {e}")))
            }
            _ => Err(SqlError::Parse(format!("expected string, got {value:?}"))),
        }
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_ulid_or_null(expr: &Expr) -> Result<Option<Ulid>, SqlError> {
    match extract_value(expr) {
        Some(Value::Null) => Ok(None),
        _ => parse_ulid(expr).map(Some),
    }
}

fn parse_date(expr: &Expr) -> Result<NaiveDate, SqlError> {
    let s = parse_string(expr)?;
    NaiveDate::parse_from_str(&s, "%Y-%m-%d")
        .map_err(|e| SqlError::Parse(format!("bad date {s:?} (expected YYYY-MM-DD): {e}")))
}

fn parse_i64(expr: &Expr) -> Result<i64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad integer: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_i64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_u32(expr: &Expr) -> Result<u32, SqlError> {
    let v = parse_i64(expr)?;
    u32::try_from(v).map_err(|_| SqlError::Parse(format!("{v} out of u32 range")))
}

fn parse_f64(expr: &Expr) -> Result<f64, SqlError> {
    if let Some(value) = extract_value(expr) {
        match value {
            Value::Number(s, _) | Value::SingleQuotedString(s) => s
                .parse()
                .map_err(|e| SqlError::Parse(format!("bad number: {e}"))),
            _ => Err(SqlError::Parse(format!("expected number, got {value:?}"))),
        }
    } else if let Expr::UnaryOp {
        op: ast::UnaryOperator::Minus,
        expr,
    } = expr
    {
        Ok(-parse_f64(expr)?)
    } else {
        Err(SqlError::Parse(format!("expected value, got {expr:?}")))
    }
}

fn parse_enum<T: FromStr<Err = String>>(expr: &Expr) -> Result<T, SqlError> {
    parse_string(expr)?.parse().map_err(SqlError::Parse)
}

/// Comma-separated text, e.g. `'wifi, kitchen'`.
fn parse_list(expr: &Expr) -> Result<Vec<String>, SqlError> {
    Ok(parse_string(expr)?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum SqlError {
    Parse(String),
    Empty,
    Unsupported(String),
    UnknownTable(String),
    WrongArity(String, usize, usize),
    MissingColumn(&'static str),
    MissingFilter(&'static str),
}

impl std::fmt::Display for SqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlError::Parse(s) => write!(f, "parse error: {s}"),
            SqlError::Empty => write!(f, "empty query"),
            SqlError::Unsupported(s) => write!(f, "unsupported: {s}"),
            SqlError::UnknownTable(t) => write!(f, "unknown table: {t}"),
            SqlError::WrongArity(t, expected, got) => {
                write!(f, "{t}: expected {expected} values, got {got}")
            }
            SqlError::MissingColumn(col) => write!(f, "missing column: {col}"),
            SqlError::MissingFilter(col) => write!(f, "missing filter: {col}"),
        }
    }
}

impl std::error::Error for SqlError {}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "01ARZ3NDEKTSV4RRFFQ69G5FAV";

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parse_insert_user() {
        let sql = "INSERT INTO users (name, contact, role) VALUES ('Guest Bob', 'guest@example.com', 'guest')";
        let cmd = parse_sql(sql).unwrap();
        assert_eq!(
            cmd,
            Command::InsertUser {
                id: None,
                name: "Guest Bob".into(),
                contact: "guest@example.com".into(),
                role: UserRole::Guest,
            }
        );
    }

    #[test]
    fn parse_insert_user_with_id_any_column_order() {
        let sql = format!("INSERT INTO users (role, id, contact, name) VALUES ('HOST', '{ID}', 'a@b', 'Alice')");
        match parse_sql(&sql).unwrap() {
            Command::InsertUser { id, role, name, .. } => {
                assert_eq!(id.map(|i| i.to_string()).as_deref(), Some(ID));
                assert_eq!(role, UserRole::Host);
                assert_eq!(name, "Alice");
            }
            cmd => panic!("expected InsertUser, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_user_bad_role() {
        let sql = "INSERT INTO users (name, contact, role) VALUES ('x', 'y', 'admin')";
        assert!(matches!(parse_sql(sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_insert_resource_defaults() {
        let sql = format!(
            "INSERT INTO resources (host_id, name, location, capacity, daily_rate) VALUES ('{ID}', 'Cozy Camper', 'Seoul', 4, 150.0)"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertResource {
                id,
                capacity,
                daily_rate,
                status,
                amenities,
                ..
            } => {
                assert_eq!(id, None);
                assert_eq!(capacity, 4);
                assert_eq!(daily_rate, 150.0);
                assert_eq!(status, AvailabilityState::Available);
                assert!(amenities.is_empty());
            }
            cmd => panic!("expected InsertResource, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_resource_full() {
        let sql = format!(
            "INSERT INTO resources (host_id, name, location, capacity, daily_rate, status, amenities, photos) \
             VALUES ('{ID}', 'Land-Yacht', 'Busan', 6, 250, 'maintenance', 'wifi, kitchen', '')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertResource {
                status,
                amenities,
                photos,
                daily_rate,
                ..
            } => {
                assert_eq!(status, AvailabilityState::Maintenance);
                assert_eq!(amenities, vec!["wifi".to_string(), "kitchen".to_string()]);
                assert!(photos.is_empty());
                assert_eq!(daily_rate, 250.0);
            }
            cmd => panic!("expected InsertResource, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_resource_missing_rate() {
        let sql = format!(
            "INSERT INTO resources (host_id, name, location, capacity) VALUES ('{ID}', 'x', 'y', 1)"
        );
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::MissingColumn("daily_rate"))
        ));
    }

    #[test]
    fn parse_insert_reservation() {
        let sql = format!(
            "INSERT INTO reservations (resource_id, start_date, end_date) VALUES ('{ID}', '2030-06-10', '2030-06-15')"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::InsertReservation {
                guest_id: None,
                resource_id: Ulid::from_string(ID).unwrap(),
                start_date: date("2030-06-10"),
                end_date: date("2030-06-15"),
            }
        );
    }

    #[test]
    fn parse_insert_reservation_with_guest() {
        let sql = format!(
            "INSERT INTO reservations (guest_id, resource_id, start_date, end_date) VALUES ('{ID}', '{ID}', '2030-06-10', '2030-06-15')"
        );
        match parse_sql(&sql).unwrap() {
            Command::InsertReservation { guest_id, .. } => assert!(guest_id.is_some()),
            cmd => panic!("expected InsertReservation, got {cmd:?}"),
        }
    }

    #[test]
    fn parse_insert_reservation_bad_date() {
        let sql = format!(
            "INSERT INTO reservations (resource_id, start_date, end_date) VALUES ('{ID}', '10/06/2030', '2030-06-15')"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_insert_arity_mismatch() {
        let sql = format!("INSERT INTO reservations (resource_id, start_date, end_date) VALUES ('{ID}', '2030-06-10')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::WrongArity(_, 3, 2))));
    }

    #[test]
    fn parse_insert_without_column_list() {
        let sql = format!("INSERT INTO reservations VALUES ('{ID}', '2030-06-10', '2030-06-15')");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Parse(_))));
    }

    #[test]
    fn parse_multi_row_insert_rejected() {
        let sql = format!(
            "INSERT INTO reservations (resource_id, start_date, end_date) VALUES ('{ID}', '2030-06-10', '2030-06-15'), ('{ID}', '2030-07-10', '2030-07-15')"
        );
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_select_resources() {
        assert_eq!(
            parse_sql("SELECT * FROM resources").unwrap(),
            Command::SelectResources { id: None }
        );
        let sql = format!("SELECT * FROM resources WHERE id = '{ID}'");
        assert!(matches!(
            parse_sql(&sql).unwrap(),
            Command::SelectResources { id: Some(_) }
        ));
    }

    #[test]
    fn parse_select_reservations_by_resource() {
        let sql = format!("SELECT * FROM reservations WHERE resource_id = '{ID}'");
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectReservations {
                filter: ReservationFilter::Resource(Ulid::from_string(ID).unwrap()),
            }
        );
        assert_eq!(
            parse_sql("SELECT * FROM reservations").unwrap(),
            Command::SelectReservations {
                filter: ReservationFilter::All,
            }
        );
    }

    #[test]
    fn parse_select_unknown_filter_rejected() {
        let sql = "SELECT * FROM resources WHERE name = 'Cozy Camper'";
        assert!(matches!(parse_sql(sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_select_quote() {
        let sql = format!(
            "SELECT * FROM quotes WHERE resource_id = '{ID}' AND start_date = '2030-06-10' AND end_date = '2030-06-15'"
        );
        assert_eq!(
            parse_sql(&sql).unwrap(),
            Command::SelectQuote {
                resource_id: Ulid::from_string(ID).unwrap(),
                start_date: date("2030-06-10"),
                end_date: date("2030-06-15"),
            }
        );
    }

    #[test]
    fn parse_select_quote_missing_filter() {
        let sql = format!("SELECT * FROM quotes WHERE resource_id = '{ID}'");
        assert!(matches!(
            parse_sql(&sql),
            Err(SqlError::MissingFilter("start_date"))
        ));
    }

    #[test]
    fn parse_unknown_table_errors() {
        assert!(matches!(
            parse_sql("SELECT * FROM payments"),
            Err(SqlError::UnknownTable(_))
        ));
    }

    #[test]
    fn parse_delete_unsupported() {
        let sql = format!("DELETE FROM reservations WHERE id = '{ID}'");
        assert!(matches!(parse_sql(&sql), Err(SqlError::Unsupported(_))));
    }

    #[test]
    fn parse_empty_errors() {
        assert!(matches!(parse_sql(""), Err(SqlError::Empty)));
    }
}

/// PostgreSQL Backend
///
/// Driven through the synchronous `postgres` client. Statements are written
/// with `?` markers everywhere in this crate; they are renumbered to `$n`
/// here before being sent to the server.

use crate::core::db::connection::{non_empty, Backend, BackendKind, ConnectOptions};
use crate::core::db::query::QueryResult;
use crate::core::db::schema::{CatalogQueries, POSTGRES_CATALOG};
use crate::core::db::value::{Row, Value};
use crate::core::{DbClientError, Result};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use postgres::types::{to_sql_checked, Format, FromSql, IsNull, ToSql, Type};
use postgres::{Client, NoTls};
use std::error::Error as StdError;
use tracing::{debug, info};
use uuid::Uuid;

type BoxError = Box<dyn StdError + Sync + Send>;

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Index just past the closing `quote` of the literal opening at `start`.
fn quoted_end(chars: &[char], start: usize, quote: char, backslash_escapes: bool) -> usize {
    let mut j = start + 1;
    while j < chars.len() {
        if backslash_escapes && chars[j] == '\\' {
            j += 2;
            continue;
        }
        if chars[j] == quote {
            return j + 1;
        }
        j += 1;
    }
    chars.len()
}

/// Index just past a (possibly nested) `/* ... */` comment opening at `start`.
fn block_comment_end(chars: &[char], start: usize) -> usize {
    let mut depth = 0usize;
    let mut j = start;
    while j + 1 < chars.len() {
        match (chars[j], chars[j + 1]) {
            ('/', '*') => {
                depth += 1;
                j += 2;
            }
            ('*', '/') => {
                depth -= 1;
                j += 2;
                if depth == 0 {
                    return j;
                }
            }
            _ => j += 1,
        }
    }
    chars.len()
}

/// Length of a `$tag$` delimiter opening at `start`, if there is one.
fn dollar_tag_len(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    while j < chars.len() && is_ident_char(chars[j]) {
        j += 1;
    }
    let starts_with_digit = chars.get(start + 1).map_or(false, |c| c.is_ascii_digit());
    if j < chars.len() && chars[j] == '$' && !starts_with_digit {
        Some(j + 1 - start)
    } else {
        None
    }
}

/// Rewrites `?` markers to `$1`, `$2`, ...
///
/// Quoted literals and identifiers (including `E'...'` escape strings and
/// `$tag$...$tag$` bodies) and comments are copied unchanged.
pub fn numbered_placeholders(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut n = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let end = match c {
            '\'' => {
                let escape_string = i > 0
                    && matches!(chars[i - 1], 'E' | 'e')
                    && (i < 2 || !is_ident_char(chars[i - 2]));
                quoted_end(&chars, i, '\'', escape_string)
            }
            '"' => quoted_end(&chars, i, '"', false),
            '-' if next == Some('-') => chars[i..]
                .iter()
                .position(|&ch| ch == '\n')
                .map_or(chars.len(), |p| i + p + 1),
            '/' if next == Some('*') => block_comment_end(&chars, i),
            '$' if i == 0 || !is_ident_char(chars[i - 1]) => match dollar_tag_len(&chars, i) {
                Some(len) => {
                    let body = i + len;
                    chars[body..]
                        .windows(len)
                        .position(|w| w == &chars[i..i + len])
                        .map_or(chars.len(), |p| body + p + len)
                }
                None => i + 1,
            },
            '?' => {
                n += 1;
                out.push('$');
                out.push_str(&n.to_string());
                i += 1;
                continue;
            }
            _ => i + 1,
        };
        out.extend(&chars[i..end]);
        i = end;
    }

    out
}

fn is_text_type(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

/// Types whose binary wire format `Value` writes itself. Every other type is
/// sent in text format and parsed by the server.
fn is_binary_bound(ty: &Type) -> bool {
    is_text_type(ty)
        || matches!(
            *ty,
            Type::INT2
                | Type::INT4
                | Type::INT8
                | Type::OID
                | Type::FLOAT4
                | Type::FLOAT8
                | Type::BOOL
                | Type::BYTEA
        )
}

fn parse_bool(s: &str) -> std::result::Result<bool, BoxError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(true),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("invalid boolean literal '{}'", other).into()),
    }
}

fn integer_to_sql(v: i64, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => i16::try_from(v)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(v)?.to_sql(ty, out),
        Type::INT8 => v.to_sql(ty, out),
        Type::OID => u32::try_from(v)?.to_sql(ty, out),
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => (v as f64).to_sql(ty, out),
        Type::BOOL => (v != 0).to_sql(ty, out),
        _ => v.to_string().to_sql(ty, out),
    }
}

fn real_to_sql(v: f64, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::FLOAT4 => (v as f32).to_sql(ty, out),
        Type::FLOAT8 => v.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            if v.fract() != 0.0 || !v.is_finite() {
                return Err(format!("cannot bind {} to an integer column", v).into());
            }
            integer_to_sql(v as i64, ty, out)
        }
        Type::BOOL => (v != 0.0).to_sql(ty, out),
        _ => format!("{:?}", v).to_sql(ty, out),
    }
}

/// Text parameters bound to non-text columns are parsed client-side, so CSV
/// imports work against typed tables.
fn text_to_sql(s: &str, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
    match *ty {
        Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
        Type::OID => s.trim().parse::<u32>()?.to_sql(ty, out),
        Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::BOOL => parse_bool(s)?.to_sql(ty, out),
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ => s.to_sql(ty, out),
    }
}

/// Writes the text-format representation used for server-parsed types.
fn text_format_to_sql(value: &Value, out: &mut BytesMut) -> IsNull {
    match value {
        Value::Null => return IsNull::Yes,
        Value::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Value::Real(f) => out.extend_from_slice(format!("{:?}", f).as_bytes()),
        Value::Text(s) => out.extend_from_slice(s.as_bytes()),
        Value::Blob(b) => out.extend_from_slice(b),
    }
    IsNull::No
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        if !is_binary_bound(ty) {
            return Ok(text_format_to_sql(self, out));
        }
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Integer(i) => integer_to_sql(*i, ty, out),
            Value::Real(f) => real_to_sql(*f, ty, out),
            Value::Text(s) => text_to_sql(s, ty, out),
            Value::Blob(b) => b.as_slice().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    fn encode_format(&self, ty: &Type) -> Format {
        if is_binary_bound(ty) {
            Format::Binary
        } else {
            Format::Text
        }
    }

    to_sql_checked!();
}

/// NUMERIC rendered exactly, as the server would print it.
struct NumericText(String);

impl<'a> FromSql<'a> for NumericText {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        numeric_to_string(raw).map(NumericText)
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

fn be_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([raw[at], raw[at + 1]])
}

/// Decodes the binary NUMERIC layout: digit count, weight, sign and display
/// scale, then base-10000 digits.
fn numeric_to_string(raw: &[u8]) -> std::result::Result<String, BoxError> {
    if raw.len() < 8 {
        return Err("truncated NUMERIC value".into());
    }
    let ndigits = usize::from(be_u16(raw, 0));
    let weight = i32::from(be_u16(raw, 2) as i16);
    let sign = be_u16(raw, 4);
    let dscale = usize::from(be_u16(raw, 6));
    if raw.len() != 8 + 2 * ndigits {
        return Err("malformed NUMERIC value".into());
    }

    match sign {
        0x0000 | 0x4000 => {}
        0xC000 => return Ok("NaN".to_string()),
        0xD000 => return Ok("Infinity".to_string()),
        0xF000 => return Ok("-Infinity".to_string()),
        other => return Err(format!("invalid NUMERIC sign {:#x}", other).into()),
    }

    let digits: Vec<u16> = (0..ndigits).map(|k| be_u16(raw, 8 + 2 * k)).collect();
    let digit_at = |index: i32| -> u16 {
        usize::try_from(index)
            .ok()
            .and_then(|k| digits.get(k).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == 0x4000 {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        text.push_str(&digit_at(0).to_string());
        for index in 1..=weight {
            text.push_str(&format!("{:04}", digit_at(index)));
        }
    }

    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut index = weight + 1;
        while fraction.len() < dscale {
            fraction.push_str(&format!("{:04}", digit_at(index)));
            index += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    Ok(text)
}

fn decode_cell(row: &postgres::Row, idx: usize) -> Result<Value> {
    let column = &row.columns()[idx];
    let ty = column.type_();
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::OID => row.try_get::<_, Option<u32>>(idx)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(Value::from),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(Value::from),
        Type::NUMERIC => row
            .try_get::<_, Option<NumericText>>(idx)?
            .map(|n| Value::Text(n.0)),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::Text(d.to_string())),
        Type::TIME => row
            .try_get::<_, Option<NaiveTime>>(idx)?
            .map(|t| Value::Text(t.to_string())),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|ts| Value::Text(ts.to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|ts| Value::Text(ts.to_rfc3339())),
        Type::JSON | Type::JSONB => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|json| Value::Text(json.to_string())),
        Type::UUID => row
            .try_get::<_, Option<Uuid>>(idx)?
            .map(|id| Value::Text(id.to_string())),
        _ if is_text_type(ty) => row.try_get::<_, Option<String>>(idx)?.map(Value::from),
        _ => {
            return Err(DbClientError::Decode(format!(
                "column '{}' has type {} (cast it to text in the query)",
                column.name(),
                ty
            )))
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn bind(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

pub struct PostgresBackend {
    client: Client,
}

impl PostgresBackend {
    pub fn connect(options: &ConnectOptions) -> Result<Self> {
        let host = non_empty(&options.host).unwrap_or("localhost");

        let mut config = postgres::Config::new();
        config.host(host);
        if options.port != 0 {
            config.port(options.port);
        }
        if let Some(dbname) = non_empty(&options.database) {
            config.dbname(dbname);
        }
        if let Some(user) = non_empty(&options.user) {
            config.user(user);
        }
        if !options.password.is_empty() {
            config.password(&options.password);
        }

        let client = config.connect(NoTls)?;
        info!(
            "Connected to PostgreSQL at {}:{} (database {:?})",
            host, options.port, options.database
        );
        Ok(Self::from_client(client))
    }

    /// Connects with a libpq-style connection string or URL.
    pub fn connect_url(url: &str) -> Result<Self> {
        let client = Client::connect(url, NoTls)?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: Client) -> Self {
        PostgresBackend { client }
    }
}

impl Backend for PostgresBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::PostgreSql
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        let sql = numbered_placeholders(sql);
        debug!("postgres execute: {}", sql);
        Ok(self.client.execute(sql.as_str(), &bind(params))?)
    }

    fn execute_many(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<u64> {
        let sql = numbered_placeholders(sql);
        debug!("postgres execute_many ({} rows): {}", rows.len(), sql);
        let stmt = self.client.prepare(&sql)?;
        let mut changed = 0u64;
        for row in rows {
            changed += self.client.execute(&stmt, &bind(row))?;
        }
        Ok(changed)
    }

    fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let sql = numbered_placeholders(sql);
        debug!("postgres query: {}", sql);
        let stmt = self.client.prepare(&sql)?;
        let columns: Vec<String> = stmt.columns().iter().map(|c| c.name().to_string()).collect();

        let rows = self
            .client
            .query(&stmt, &bind(params))?
            .iter()
            .map(|row| (0..row.len()).map(|i| decode_cell(row, i)).collect::<Result<Row>>())
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryResult::new(columns, rows))
    }

    fn run_script(&mut self, script: &str) -> Result<()> {
        debug!("postgres script ({} bytes)", script.len());
        self.client.batch_execute(script)?;
        Ok(())
    }

    fn catalog(&self) -> &'static CatalogQueries {
        &POSTGRES_CATALOG
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.client.close()?;
        info!("Closed PostgreSQL connection");
        Ok(())
    }
}

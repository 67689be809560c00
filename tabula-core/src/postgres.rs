//! PostgreSQL driver built on sqlx

use crate::driver::{command_tag, Connection, Driver, QueryOutcome};
use crate::{Result, Row, Value};
use futures::TryStreamExt;
use sqlx::encode::IsNull;
use sqlx::postgres::types::Oid;
use sqlx::postgres::{PgArgumentBuffer, PgArguments, PgConnection, PgRow, PgTypeInfo};
use sqlx::{Column as _, Connection as _, Either, Postgres, Row as _, TypeInfo as _, ValueRef as _};

/// Opens one `PgConnection` per call to `connect`
#[derive(Debug, Clone)]
pub struct PgDriver {
    url: String,
}

impl PgDriver {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Driver for PgDriver {
    type Connection = PgConn;

    async fn connect(&self) -> Result<PgConn> {
        let inner = PgConnection::connect(&self.url).await?;
        Ok(PgConn { inner })
    }
}

pub struct PgConn {
    inner: PgConnection,
}

impl Connection for PgConn {
    async fn query(&mut self, sql: &str, params: &[Value]) -> Result<QueryOutcome> {
        let query = bind_values_to_query(sqlx::query(sql), params);
        let mut stream = query.fetch_many(&mut self.inner);

        let mut rows = Vec::new();
        let mut affected = 0;
        while let Some(item) = stream.try_next().await? {
            match item {
                Either::Left(done) => affected += done.rows_affected(),
                Either::Right(row) => rows.push(row_to_json(&row)?),
            }
        }

        let row_count = if rows.is_empty() {
            affected
        } else {
            rows.len() as u64
        };
        Ok(QueryOutcome {
            rows,
            row_count,
            command_tag: command_tag(sql),
        })
    }

    async fn end(self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }
}

/// NULL sent with an unspecified parameter type, so the server infers it
/// from the target column instead of rejecting a typed integer NULL
#[derive(Debug, Clone, Copy)]
struct UntypedNull;

impl sqlx::Type<Postgres> for UntypedNull {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_oid(Oid(0))
    }
}

impl<'q> sqlx::Encode<'q, Postgres> for UntypedNull {
    fn encode_by_ref(&self, _buf: &mut PgArgumentBuffer) -> IsNull {
        IsNull::Yes
    }
}

fn bind_values_to_query<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [Value],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            Value::Null => query.bind(UntypedNull),
            Value::Bool(b) => query.bind(*b),
            Value::I32(i) => query.bind(*i),
            Value::I64(i) => query.bind(*i),
            Value::F32(f) => query.bind(*f),
            Value::F64(f) => query.bind(*f),
            Value::String(s) => query.bind(s.as_str()),
            Value::Bytes(b) => query.bind(b.as_slice()),
            Value::Json(j) => query.bind(j),
            #[cfg(feature = "uuid-support")]
            Value::Uuid(u) => query.bind(*u),
            #[cfg(feature = "datetime-support")]
            Value::Timestamp(t) => query.bind(*t),
            #[cfg(feature = "decimal-support")]
            Value::Decimal(d) => query.bind(*d),
        };
    }
    query
}

/// Decode a row into column-keyed JSON, in column order
fn row_to_json(row: &PgRow) -> Result<Row> {
    let mut out = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = if row.try_get_raw(index)?.is_null() {
            serde_json::Value::Null
        } else {
            decode_column(row, index, column.type_info().name())?
        };
        out.insert(column.name().to_string(), value);
    }
    Ok(out)
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Result<serde_json::Value> {
    use serde_json::Value as Json;

    let value = match type_name {
        "BOOL" => Json::Bool(row.try_get(index)?),
        "INT2" => Json::from(row.try_get::<i16, _>(index)?),
        "INT4" => Json::from(row.try_get::<i32, _>(index)?),
        "INT8" => Json::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => float(row.try_get::<f32, _>(index)? as f64),
        "FLOAT8" => float(row.try_get::<f64, _>(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CHAR" => Json::String(row.try_get(index)?),
        "JSON" | "JSONB" => row.try_get::<Json, _>(index)?,
        "BYTEA" => Json::from(row.try_get::<Vec<u8>, _>(index)?),
        #[cfg(feature = "uuid-support")]
        "UUID" => Json::String(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        #[cfg(feature = "datetime-support")]
        "TIMESTAMP" => Json::String(row.try_get::<chrono::NaiveDateTime, _>(index)?.to_string()),
        #[cfg(feature = "datetime-support")]
        "TIMESTAMPTZ" => Json::String(
            row.try_get::<chrono::DateTime<chrono::Utc>, _>(index)?
                .to_rfc3339(),
        ),
        #[cfg(feature = "datetime-support")]
        "DATE" => Json::String(row.try_get::<chrono::NaiveDate, _>(index)?.to_string()),
        #[cfg(feature = "datetime-support")]
        "TIME" => Json::String(row.try_get::<chrono::NaiveTime, _>(index)?.to_string()),
        #[cfg(feature = "decimal-support")]
        "NUMERIC" => Json::String(row.try_get::<rust_decimal::Decimal, _>(index)?.to_string()),
        other => {
            tracing::warn!(column = index, type_name = other, "Unsupported column type, reading as null");
            Json::Null
        }
    };
    Ok(value)
}

fn float(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

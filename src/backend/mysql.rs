//! MySQL backend built on the `mysql` client crate.

use std::collections::VecDeque;

use ::mysql::consts::ColumnType;
use ::mysql::prelude::Queryable;
use ::mysql::{Column, Conn, OptsBuilder, Row, Value};
use bytes::Bytes;

use super::{
    Backend, BackendError, Completion, ConnectParams, Execution, ResultCursor, Session,
    CR_CONN_HOST_ERROR, CR_SERVER_LOST, CR_UNKNOWN_ERROR,
};
use crate::protocol::{Cell, FieldDescriptor, SessionInfo};

/// Classic client/server protocol version reported by MySQL servers.
const MYSQL_PROTOCOL_VERSION: &str = "10";

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlBackend;

impl MysqlBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Backend for MysqlBackend {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, BackendError> {
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(params.host.as_str()))
            .tcp_port(params.port)
            .user(Some(params.login.as_str()))
            .pass(Some(params.password.as_str()));

        let conn = Conn::new(opts).map_err(|e| driver_error(&e, CR_CONN_HOST_ERROR))?;
        tracing::debug!("Connected to MySQL at {}:{}", params.host, params.port);

        Ok(Box::new(MysqlSession {
            conn: Some(conn),
            host: params.host.clone(),
        }))
    }
}

fn driver_error(err: &::mysql::Error, transport_code: u32) -> BackendError {
    match err {
        ::mysql::Error::MySqlError(server) => {
            BackendError::new(u32::from(server.code), server.message.clone())
        }
        ::mysql::Error::IoError(_) => BackendError::new(transport_code, err.to_string()),
        _ => BackendError::new(CR_UNKNOWN_ERROR, err.to_string()),
    }
}

/// First failure among the rows of a result set.
fn first_error<R>(
    rows: impl IntoIterator<Item = Result<R, ::mysql::Error>>,
) -> Option<BackendError> {
    rows.into_iter()
        .find_map(Result::err)
        .map(|e| driver_error(&e, CR_SERVER_LOST))
}

pub struct MysqlSession {
    conn: Option<Conn>,
    host: String,
}

impl MysqlSession {
    fn conn(&mut self) -> Result<&mut Conn, BackendError> {
        self.conn
            .as_mut()
            .ok_or_else(|| BackendError::new(CR_SERVER_LOST, "MySQL session already closed"))
    }
}

impl Session for MysqlSession {
    fn set_charset(&mut self, charset: &str) -> Result<(), BackendError> {
        if charset.is_empty()
            || !charset
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(BackendError::new(
                CR_UNKNOWN_ERROR,
                format!("invalid charset name '{}'", charset),
            ));
        }
        self.conn()?
            .query_drop(format!("SET NAMES {}", charset))
            .map_err(|e| driver_error(&e, CR_SERVER_LOST))
    }

    fn select_database(&mut self, name: &str) -> Result<(), BackendError> {
        self.conn()?
            .query_drop(format!("USE `{}`", name.replace('`', "``")))
            .map_err(|e| driver_error(&e, CR_SERVER_LOST))
    }

    fn session_info(&mut self) -> SessionInfo {
        let host_info = format!("{} via TCP/IP", self.host);
        let server_version = match self.conn() {
            Ok(conn) => match conn.query_first::<String, _>("SELECT VERSION()") {
                Ok(Some(version)) => version,
                _ => {
                    let (major, minor, patch) = conn.server_version();
                    format!("{}.{}.{}", major, minor, patch)
                }
            },
            Err(_) => String::new(),
        };

        SessionInfo {
            host_info,
            protocol_version: MYSQL_PROTOCOL_VERSION.to_string(),
            server_version,
        }
    }

    fn execute(&mut self, sql: &str) -> Execution<'_> {
        let conn = match self.conn() {
            Ok(conn) => conn,
            Err(e) => return Execution::Failed(e),
        };

        let mut result = match conn.query_iter(sql) {
            Ok(result) => result,
            Err(e) => return Execution::Failed(driver_error(&e, CR_SERVER_LOST)),
        };

        let fields: Vec<FieldDescriptor> =
            result.columns().as_ref().iter().map(describe_column).collect();

        let outcome = if fields.is_empty() {
            Execution::Completed(Completion {
                affected_rows: result.affected_rows(),
                insert_id: result.last_insert_id().unwrap_or(0),
                info: result.info_str().into_owned(),
            })
        } else {
            // The row count travels ahead of the rows, so the first result set is stored
            // client side. Values are rendered one row at a time by the cursor.
            let mut rows = VecDeque::new();
            for row in result.by_ref() {
                match row {
                    Ok(row) => rows.push_back(row),
                    Err(e) => return Execution::Failed(driver_error(&e, CR_SERVER_LOST)),
                }
            }
            Execution::Rows(Box::new(MysqlCursor {
                row_count: rows.len() as u64,
                fields,
                rows,
            }))
        };

        // A single entry may hold several statements. Only the first result is reported,
        // but a failure in any later one fails the entry.
        while let Some(set) = result.iter() {
            if let Some(err) = first_error(set) {
                tracing::debug!("Trailing statement failed ({}): {}", err.code, err.message);
                return Execution::Failed(err);
            }
        }

        outcome
    }

    fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            drop(conn);
            tracing::debug!("Closed MySQL session to {}", self.host);
        }
    }
}

impl Drop for MysqlSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn describe_column(column: &Column) -> FieldDescriptor {
    FieldDescriptor {
        name: column.name_str().into_owned(),
        table: column.table_str().into_owned(),
        type_code: column.column_type() as u32,
        flags: u32::from(column.flags().bits()),
        length: column.column_length(),
    }
}

struct MysqlCursor {
    fields: Vec<FieldDescriptor>,
    rows: VecDeque<Row>,
    row_count: u64,
}

impl ResultCursor for MysqlCursor {
    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn next_row(&mut self) -> Option<Vec<Cell>> {
        let row = self.rows.pop_front()?;
        let cells = self
            .fields
            .iter()
            .enumerate()
            .map(|(idx, field)| match row.as_ref(idx) {
                Some(value) => render_value(value, field.type_code),
                None => Cell::Null,
            })
            .collect();
        Some(cells)
    }
}

/// Render a driver value the way the MySQL text protocol would show it.
fn render_value(value: &Value, type_code: u32) -> Cell {
    match value {
        Value::NULL => Cell::Null,
        Value::Bytes(bytes) => Cell::Bytes(Bytes::copy_from_slice(bytes)),
        Value::Int(n) => Cell::text(n.to_string()),
        Value::UInt(n) => Cell::text(n.to_string()),
        Value::Float(n) => Cell::text(n.to_string()),
        Value::Double(n) => Cell::text(n.to_string()),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let date = format!("{:04}-{:02}-{:02}", year, month, day);
            if type_code == ColumnType::MYSQL_TYPE_DATE as u32
                || type_code == ColumnType::MYSQL_TYPE_NEWDATE as u32
            {
                Cell::text(date)
            } else if *micros > 0 {
                Cell::text(format!(
                    "{} {:02}:{:02}:{:02}.{:06}",
                    date, hour, minute, second, micros
                ))
            } else {
                Cell::text(format!("{} {:02}:{:02}:{:02}", date, hour, minute, second))
            }
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            let hours = u64::from(*days) * 24 + u64::from(*hours);
            let mut text = format!("{}{:02}:{:02}:{:02}", sign, hours, minutes, seconds);
            if *micros > 0 {
                text.push_str(&format!(".{:06}", micros));
            }
            Cell::text(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATETIME: u32 = ColumnType::MYSQL_TYPE_DATETIME as u32;

    #[test]
    fn test_render_scalars() {
        assert_eq!(render_value(&Value::NULL, 3), Cell::Null);
        assert_eq!(render_value(&Value::Int(-42), 8), Cell::text("-42"));
        assert_eq!(render_value(&Value::UInt(7), 8), Cell::text("7"));
        assert_eq!(render_value(&Value::Double(1.5), 5), Cell::text("1.5"));
        assert_eq!(
            render_value(&Value::Bytes(b"\x00\xFFraw".to_vec()), 252),
            Cell::Bytes(Bytes::from_static(b"\x00\xFFraw"))
        );
    }

    #[test]
    fn test_render_temporal_values() {
        let date = Value::Date(2024, 2, 29, 0, 0, 0, 0);
        assert_eq!(
            render_value(&date, ColumnType::MYSQL_TYPE_DATE as u32),
            Cell::text("2024-02-29")
        );
        assert_eq!(render_value(&date, DATETIME), Cell::text("2024-02-29 00:00:00"));

        let precise = Value::Date(2024, 2, 29, 13, 5, 9, 120);
        assert_eq!(
            render_value(&precise, DATETIME),
            Cell::text("2024-02-29 13:05:09.000120")
        );

        let time = Value::Time(true, 1, 2, 3, 4, 0);
        assert_eq!(
            render_value(&time, ColumnType::MYSQL_TYPE_TIME as u32),
            Cell::text("-26:03:04")
        );
    }

    #[test]
    fn test_driver_error_keeps_server_code() {
        let err = ::mysql::Error::MySqlError(::mysql::MySqlError {
            state: "28000".into(),
            message: "Access denied".into(),
            code: 1045,
        });
        assert_eq!(
            driver_error(&err, CR_CONN_HOST_ERROR),
            BackendError::new(1045, "Access denied")
        );

        let io = ::mysql::Error::IoError(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(driver_error(&io, CR_CONN_HOST_ERROR).code, CR_CONN_HOST_ERROR);
    }

    #[test]
    fn test_trailing_result_set_error_is_reported() {
        let syntax = ::mysql::Error::MySqlError(::mysql::MySqlError {
            state: "42000".into(),
            message: "You have an error in your SQL syntax".into(),
            code: 1064,
        });
        let rows: Vec<Result<(), ::mysql::Error>> = vec![Ok(()), Err(syntax), Ok(())];
        assert_eq!(
            first_error(rows),
            Some(BackendError::new(1064, "You have an error in your SQL syntax"))
        );

        let clean: Vec<Result<(), ::mysql::Error>> = vec![Ok(()), Ok(())];
        assert_eq!(first_error(clean), None);
    }
}

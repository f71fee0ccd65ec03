//! Common test utilities for tunnel tests
//!
//! Provides:
//! - A scripted in-memory backend that records every call made against it
//! - A reader that splits a binary response back into its frames

#![allow(dead_code)]

use bytes::Buf;
use sqltunnel::backend::{
    Backend, BackendError, Completion, ConnectParams, Execution, ResultCursor, Session,
};
use sqltunnel::protocol::codec::{read_cell, read_u8};
use sqltunnel::protocol::{
    read_block, Cell, FieldDescriptor, ResponseHeader, ResultSetHeader, SessionInfo,
};
use sqltunnel::{Dispatcher, TunnelConfig, TunnelForm};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

pub const SYNTAX_ERROR: u32 = 1064;

#[derive(Debug, Clone)]
pub enum Scripted {
    Rows {
        fields: Vec<FieldDescriptor>,
        rows: Vec<Vec<Option<Vec<u8>>>>,
    },
    Done(Completion),
    Error(BackendError),
}

/// Backend answering from a fixed script instead of a database.
#[derive(Default)]
pub struct ScriptedBackend {
    script: HashMap<String, Scripted>,
    databases: Vec<String>,
    connect_error: Option<BackendError>,
    unavailable: bool,
    events: Arc<Mutex<Vec<String>>>,
}

pub fn field(name: &str, table: &str, type_code: u32) -> FieldDescriptor {
    FieldDescriptor {
        name: name.to_string(),
        table: table.to_string(),
        type_code,
        flags: 0,
        length: 11,
    }
}

impl ScriptedBackend {
    /// Knows `SELECT 1` out of the box.
    pub fn new() -> Self {
        Self::default().with_rows(
            "SELECT 1",
            vec![field("1", "", 8)],
            vec![vec![Some(b"1".to_vec())]],
        )
    }

    pub fn with_rows(
        mut self,
        sql: &str,
        fields: Vec<FieldDescriptor>,
        rows: Vec<Vec<Option<Vec<u8>>>>,
    ) -> Self {
        self.script
            .insert(sql.to_string(), Scripted::Rows { fields, rows });
        self
    }

    pub fn with_done(mut self, sql: &str, affected_rows: u64, insert_id: u64, info: &str) -> Self {
        self.script.insert(
            sql.to_string(),
            Scripted::Done(Completion {
                affected_rows,
                insert_id,
                info: info.to_string(),
            }),
        );
        self
    }

    pub fn with_error(mut self, sql: &str, code: u32, message: &str) -> Self {
        self.script
            .insert(sql.to_string(), Scripted::Error(BackendError::new(code, message)));
        self
    }

    pub fn with_database(mut self, name: &str) -> Self {
        self.databases.push(name.to_string());
        self
    }

    pub fn refuse_connections(mut self, code: u32, message: &str) -> Self {
        self.connect_error = Some(BackendError::new(code, message));
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Calls recorded so far, in order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Backend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn is_available(&self) -> bool {
        !self.unavailable
    }

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Session>, BackendError> {
        self.record(format!(
            "connect {}@{}:{}",
            params.login, params.host, params.port
        ));
        if let Some(err) = &self.connect_error {
            return Err(err.clone());
        }
        Ok(Box::new(ScriptedSession {
            script: self.script.clone(),
            databases: self.databases.clone(),
            events: self.events.clone(),
            closed: false,
        }))
    }
}

struct ScriptedSession {
    script: HashMap<String, Scripted>,
    databases: Vec<String>,
    events: Arc<Mutex<Vec<String>>>,
    closed: bool,
}

impl ScriptedSession {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl Session for ScriptedSession {
    fn set_charset(&mut self, charset: &str) -> Result<(), BackendError> {
        self.record(format!("charset {}", charset));
        Ok(())
    }

    fn select_database(&mut self, name: &str) -> Result<(), BackendError> {
        self.record(format!("use {}", name));
        if self.databases.iter().any(|db| db == name) {
            Ok(())
        } else {
            Err(BackendError::new(
                1049,
                format!("Unknown database '{}'", name),
            ))
        }
    }

    fn session_info(&mut self) -> SessionInfo {
        SessionInfo {
            host_info: "scripted via TCP/IP".to_string(),
            protocol_version: "10".to_string(),
            server_version: "8.0.36-scripted".to_string(),
        }
    }

    fn execute(&mut self, sql: &str) -> Execution<'_> {
        self.record(format!("exec {}", sql));
        match self.script.get(sql).cloned() {
            Some(Scripted::Rows { fields, rows }) => Execution::Rows(Box::new(ScriptedCursor {
                row_count: rows.len() as u64,
                fields,
                rows: rows
                    .into_iter()
                    .map(|row| row.into_iter().map(Cell::from).collect())
                    .collect(),
            })),
            Some(Scripted::Done(done)) => Execution::Completed(done),
            Some(Scripted::Error(err)) => Execution::Failed(err),
            None => Execution::Failed(BackendError::new(
                SYNTAX_ERROR,
                "You have an error in your SQL syntax",
            )),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.record("close".to_string());
        }
    }
}

struct ScriptedCursor {
    fields: Vec<FieldDescriptor>,
    rows: VecDeque<Vec<Cell>>,
    row_count: u64,
}

impl ResultCursor for ScriptedCursor {
    fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn next_row(&mut self) -> Option<Vec<Cell>> {
        self.rows.pop_front()
    }
}

pub fn dispatcher(backend: &Arc<ScriptedBackend>) -> Dispatcher {
    Dispatcher::new(TunnelConfig::default(), backend.clone())
}

pub fn query_form(statements: &[&str]) -> TunnelForm {
    let mut pairs = vec![
        ("actn", "Q"),
        ("host", "db.test"),
        ("port", "3306"),
        ("login", "root"),
        ("password", "pw"),
    ];
    for sql in statements {
        pairs.push(("q[]", sql));
    }
    TunnelForm::from_pairs(pairs)
}

/// Run a request through the dispatcher and return the raw body.
pub fn run(dispatcher: &Dispatcher, form: TunnelForm) -> Vec<u8> {
    let mut body = Vec::new();
    dispatcher.handle(form, &mut body).unwrap();
    body
}

/// One statement's share of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub header: ResultSetHeader,
    /// Error or informational block, when no rows were sent.
    pub message: Option<String>,
    pub fields: Vec<FieldDescriptor>,
    pub rows: Vec<Vec<Option<Vec<u8>>>>,
    pub separator: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub header: ResponseHeader,
    /// Block following a nonzero response header.
    pub error: Option<String>,
    pub session_info: Option<SessionInfo>,
    pub segments: Vec<Segment>,
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Split a connection-test response.
pub fn decode_connection_test(body: &[u8]) -> Decoded {
    let mut cursor = body;
    let header = ResponseHeader::decode(&mut cursor).unwrap();
    let mut decoded = Decoded {
        header,
        error: None,
        session_info: None,
        segments: Vec::new(),
    };
    if header.error_code != 0 {
        decoded.error = Some(text(&read_block(&mut cursor).unwrap()));
    } else {
        decoded.session_info = Some(SessionInfo::decode(&mut cursor).unwrap());
    }
    assert!(!cursor.has_remaining(), "trailing bytes after response");
    decoded
}

/// Split a statement-batch response, asserting it is well formed and fully consumed.
pub fn decode_batch(body: &[u8]) -> Decoded {
    let mut cursor = body;
    let header = ResponseHeader::decode(&mut cursor).unwrap();
    let mut decoded = Decoded {
        header,
        error: None,
        session_info: None,
        segments: Vec::new(),
    };

    if header.error_code != 0 {
        decoded.error = Some(text(&read_block(&mut cursor).unwrap()));
        assert!(!cursor.has_remaining(), "trailing bytes after error block");
        return decoded;
    }

    while cursor.has_remaining() {
        let header = ResultSetHeader::decode(&mut cursor).unwrap();
        let mut segment = Segment {
            header,
            message: None,
            fields: Vec::new(),
            rows: Vec::new(),
            separator: 0,
        };

        if header.error_code != 0 || header.field_count == 0 {
            segment.message = Some(text(&read_block(&mut cursor).unwrap()));
        } else {
            for _ in 0..header.field_count {
                segment
                    .fields
                    .push(FieldDescriptor::decode(&mut cursor).unwrap());
            }
            for _ in 0..header.row_count {
                let row = (0..header.field_count)
                    .map(|_| read_cell(&mut cursor).unwrap().map(|b| b.to_vec()))
                    .collect();
                segment.rows.push(row);
            }
        }

        segment.separator = read_u8(&mut cursor).unwrap();
        let last = segment.separator == 0;
        decoded.segments.push(segment);
        if last {
            break;
        }
    }

    assert!(!cursor.has_remaining(), "trailing bytes after last segment");
    decoded
}

use std::io::Write;
use std::sync::Arc;

use crate::backend::{Backend, Execution, ResultCursor, Session, CR_UNKNOWN_ERROR};
use crate::config::{RuntimeVersion, TunnelConfig};
use crate::error::{TunnelError, TunnelResult};
use crate::protocol::{Cell, ResultSetHeader};

use super::request::{Action, QueryBatch, TunnelForm, TunnelRequest};
use super::stream::ResponseWriter;

/// Affected-row count reported for a failed statement (the driver's `-1`).
pub const AFFECTED_ROWS_ON_ERROR: u64 = u32::MAX as u64;

/// Drives one tunnel request from form fields to the last response byte.
pub struct Dispatcher {
    config: Arc<TunnelConfig>,
    backend: Arc<dyn Backend>,
    runtime: RuntimeVersion,
}

impl Dispatcher {
    pub fn new(config: TunnelConfig, backend: Arc<dyn Backend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
            runtime: RuntimeVersion::current(),
        }
    }

    /// Override the runtime version checked against `min_runtime_version`.
    pub fn with_runtime(mut self, runtime: RuntimeVersion) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn runtime(&self) -> RuntimeVersion {
        self.runtime
    }

    pub fn runtime_supported(&self) -> bool {
        self.runtime >= self.config.min_runtime_version
    }

    /// Whether the request should get the HTML test page instead of the binary protocol.
    pub fn wants_test_page(&self, form: &TunnelForm) -> bool {
        self.config.allow_test_menu && self.runtime_supported() && !form.has_required_fields()
    }

    /// Run the request, streaming the binary response into `out`.
    ///
    /// Every client-visible failure is written to `out`. An `Err` means the output itself
    /// failed, typically because the client went away.
    pub fn handle<W: Write>(&self, form: TunnelForm, out: W) -> TunnelResult<()> {
        let mut out = ResponseWriter::new(out);

        let request = match self.validate(form) {
            Ok(request) => request,
            Err(err) => return self.reject(err, &mut out),
        };
        tracing::debug!(
            "Tunnel request {:?} for {}@{} with {} statement(s)",
            request.action,
            request.connection.login,
            request.connection.host,
            request.batch.len()
        );

        let params = request.connection.connect_params(self.config.default_db_port);
        let mut session = match self.backend.connect(&params) {
            Ok(session) => session,
            Err(err) => return self.reject(TunnelError::Connect(err), &mut out),
        };

        let result = self.serve(session.as_mut(), &request, &mut out);
        session.close();
        result
    }

    fn validate(&self, form: TunnelForm) -> TunnelResult<TunnelRequest> {
        if !self.runtime_supported() {
            return Err(TunnelError::UnsupportedRuntime(
                self.config.min_runtime_version,
            ));
        }
        let request = form.into_request()?;
        if !self.backend.is_available() {
            return Err(TunnelError::BackendUnavailable);
        }
        Ok(request)
    }

    fn reject<W: Write>(&self, err: TunnelError, out: &mut ResponseWriter<W>) -> TunnelResult<()> {
        match err.wire_code() {
            Some(code) => {
                tracing::warn!("Tunnel request rejected ({}): {}", code, err);
                out.failure(nonzero(code), &err.to_string())?;
                Ok(())
            }
            None => Err(err),
        }
    }

    fn serve<W: Write>(
        &self,
        session: &mut dyn Session,
        request: &TunnelRequest,
        out: &mut ResponseWriter<W>,
    ) -> TunnelResult<()> {
        if let Err(err) = session.set_charset(&self.config.charset) {
            tracing::warn!("Could not set charset '{}': {}", self.config.charset, err);
        }

        if let Some(database) = request.connection.database.as_deref() {
            if let Err(err) = session.select_database(database) {
                tracing::debug!("Selecting database '{}' failed: {}", database, err);
                out.failure(nonzero(err.code), &err.message)?;
                return Ok(());
            }
        }

        out.header(0)?;
        match request.action {
            Action::ConnectionTest => out.session_info(&session.session_info())?,
            Action::Execute => self.execute_batch(session, &request.batch, out)?,
        }
        Ok(())
    }

    fn execute_batch<W: Write>(
        &self,
        session: &mut dyn Session,
        batch: &QueryBatch,
        out: &mut ResponseWriter<W>,
    ) -> TunnelResult<()> {
        if batch.is_empty() {
            tracing::debug!("Statement batch is empty");
            return Ok(());
        }

        let total = batch.len();
        for (idx, sql) in batch.statements().enumerate() {
            tracing::debug!("Executing statement {}/{}", idx + 1, total);
            self.execute_statement(session, sql, out)?;
            out.separator(idx + 1 < total)?;
        }
        Ok(())
    }

    fn execute_statement<W: Write>(
        &self,
        session: &mut dyn Session,
        sql: &str,
        out: &mut ResponseWriter<W>,
    ) -> TunnelResult<()> {
        match session.execute(sql) {
            Execution::Failed(err) => {
                tracing::debug!("Statement failed ({}): {}", err.code, err.message);
                out.result_set_header(&ResultSetHeader {
                    error_code: nonzero(err.code),
                    affected_rows: AFFECTED_ROWS_ON_ERROR,
                    ..Default::default()
                })?;
                out.block(err.message.as_bytes())?;
            }
            Execution::Completed(done) => {
                out.result_set_header(&ResultSetHeader {
                    error_code: 0,
                    affected_rows: done.affected_rows,
                    insert_id: done.insert_id,
                    field_count: 0,
                    row_count: 0,
                })?;
                out.block(done.info.as_bytes())?;
            }
            Execution::Rows(mut cursor) => stream_rows(cursor.as_mut(), out)?,
        }
        Ok(())
    }
}

fn stream_rows<W: Write>(
    cursor: &mut dyn ResultCursor,
    out: &mut ResponseWriter<W>,
) -> TunnelResult<()> {
    let field_count = cursor.fields().len();
    out.result_set_header(&ResultSetHeader {
        error_code: 0,
        affected_rows: cursor.affected_rows(),
        insert_id: cursor.insert_id(),
        field_count: field_count as u32,
        row_count: cursor.row_count(),
    })?;

    if field_count == 0 {
        out.block(b"")?;
        return Ok(());
    }

    out.fields(cursor.fields())?;
    while let Some(mut row) = cursor.next_row() {
        if row.len() != field_count {
            tracing::warn!(
                "Driver returned {} values for {} fields",
                row.len(),
                field_count
            );
            row.resize(field_count, Cell::Null);
        }
        out.row(&row)?;
    }
    Ok(())
}

/// Error codes of zero would read as success on the client.
fn nonzero(code: u32) -> u32 {
    if code == 0 {
        CR_UNKNOWN_ERROR
    } else {
        code
    }
}

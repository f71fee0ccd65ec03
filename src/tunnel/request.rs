//! Inbound form fields and the request model built from them.

use std::str::FromStr;

use base64::{engine::general_purpose, Engine as _};

use crate::backend::ConnectParams;
use crate::error::{TunnelError, TunnelResult};

pub const FIELD_ACTION: &str = "actn";
pub const FIELD_HOST: &str = "host";
pub const FIELD_PORT: &str = "port";
pub const FIELD_LOGIN: &str = "login";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_DATABASE: &str = "db";
pub const FIELD_QUERY: &str = "q[]";
pub const FIELD_QUERY_PLAIN: &str = "q";
pub const FIELD_ENCODE_BASE64: &str = "encodeBase64";

const REQUIRED_FIELDS: [&str; 4] = [FIELD_ACTION, FIELD_HOST, FIELD_PORT, FIELD_LOGIN];

/// What the client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// `C`: connect and report session details.
    ConnectionTest,
    /// `Q`: run the statement batch.
    Execute,
}

impl FromStr for Action {
    type Err = TunnelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "C" => Ok(Action::ConnectionTest),
            "Q" => Ok(Action::Execute),
            other => Err(TunnelError::InvalidAction(other.to_string())),
        }
    }
}

/// Form fields in the order they were posted. Repeated keys are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TunnelForm {
    pairs: Vec<(String, String)>,
}

impl TunnelForm {
    /// Parse an `application/x-www-form-urlencoded` body.
    pub fn parse(body: &[u8]) -> TunnelResult<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(body)
            .map_err(|e| TunnelError::InvalidParameters(e.to_string()))?;
        Ok(Self { pairs })
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// First value posted under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `actn`, `host`, `port` and `login` are all present (possibly empty).
    pub fn has_required_fields(&self) -> bool {
        REQUIRED_FIELDS.iter().all(|field| self.get(field).is_some())
    }

    /// Validate the fields and build the request.
    pub fn into_request(self) -> TunnelResult<TunnelRequest> {
        if !self.has_required_fields() {
            return Err(TunnelError::MissingParameters);
        }

        let action: Action = self.get(FIELD_ACTION).unwrap_or_default().parse()?;
        let connection = ConnectionRequest::from_form(&self)?;

        let raw: Vec<&str> = self
            .get_all(FIELD_QUERY)
            .chain(self.get_all(FIELD_QUERY_PLAIN))
            .collect();
        let batch = if self.get(FIELD_ENCODE_BASE64) == Some("1") {
            QueryBatch::decode_base64(&raw)?
        } else {
            QueryBatch::new(raw)
        };

        Ok(TunnelRequest {
            action,
            connection,
            batch,
        })
    }
}

/// Where and as whom to connect.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    pub host: String,
    /// `None` when the client left the port empty.
    pub port: Option<u16>,
    pub login: String,
    pub password: String,
    /// Database to select after connecting, if any.
    pub database: Option<String>,
}

impl std::fmt::Debug for ConnectionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("login", &self.login)
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl ConnectionRequest {
    fn from_form(form: &TunnelForm) -> TunnelResult<Self> {
        let host = form.get(FIELD_HOST).unwrap_or_default().trim();
        if host.is_empty() {
            return Err(TunnelError::InvalidParameters("host is empty".to_string()));
        }

        let port = match form.get(FIELD_PORT).map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<u16>() {
                Ok(port) if port > 0 => Some(port),
                _ => {
                    return Err(TunnelError::InvalidParameters(format!(
                        "invalid port '{}'",
                        raw
                    )))
                }
            },
        };

        Ok(Self {
            host: host.to_string(),
            port,
            login: form.get(FIELD_LOGIN).unwrap_or_default().to_string(),
            password: form.get(FIELD_PASSWORD).unwrap_or_default().to_string(),
            database: form
                .get(FIELD_DATABASE)
                .filter(|db| !db.is_empty())
                .map(str::to_string),
        })
    }

    pub fn connect_params(&self, default_port: u16) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port.unwrap_or(default_port),
            login: self.login.clone(),
            password: self.password.clone(),
        }
    }
}

/// Statements of one request, in posting order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBatch {
    statements: Vec<String>,
}

impl QueryBatch {
    pub fn new<S: Into<String>>(statements: impl IntoIterator<Item = S>) -> Self {
        Self {
            statements: statements.into_iter().map(Into::into).collect(),
        }
    }

    /// Decode every statement from standard base64.
    pub fn decode_base64<S: AsRef<str>>(encoded: &[S]) -> TunnelResult<Self> {
        let mut statements = Vec::with_capacity(encoded.len());
        for (idx, raw) in encoded.iter().enumerate() {
            let bytes = general_purpose::STANDARD
                .decode(raw.as_ref().trim())
                .map_err(|e| {
                    TunnelError::InvalidParameters(format!(
                        "statement {} is not valid base64: {}",
                        idx + 1,
                        e
                    ))
                })?;
            let sql = String::from_utf8(bytes).map_err(|_| {
                TunnelError::InvalidParameters(format!(
                    "statement {} is not valid UTF-8",
                    idx + 1
                ))
            })?;
            statements.push(sql);
        }
        Ok(Self { statements })
    }

    /// Statements that will run; empty ones are skipped.
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .map(String::as_str)
            .filter(|sql| !sql.is_empty())
    }

    /// Number of statements that will run.
    pub fn len(&self) -> usize {
        self.statements().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A validated tunnel request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelRequest {
    pub action: Action,
    pub connection: ConnectionRequest,
    pub batch: QueryBatch,
}

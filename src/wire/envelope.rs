//! Envelope encoding and validation.
//!
//! Every line on the wire is one JSON object in one of three shapes:
//!
//! | Shape    | Fields                          |
//! |----------|---------------------------------|
//! | Request  | `id`, `method`, `self`, `args`  |
//! | Response | `id`, `result`                  |
//! | Error    | `id`, `error`                   |
//!
//! Values inside `args`, `result` and `error` are [`Ser`]: JSON scalars,
//! arrays, and [`MarshallRef`] tokens standing in for live objects.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number};

use crate::{AppError, Result};

/// Method token meaning "invoke `self` as a function".
pub const CALL_METHOD: &str = "()";

/// Wire token standing in for a live object.
///
/// `remote: true` means the sender owns the object and is exposing it;
/// `remote: false` means the receiver owns it and is getting it back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarshallRef {
    /// Identifier in the owner's exposed table.
    pub id: String,
    /// Ownership sense relative to the sender.
    pub remote: bool,
}

/// Serialized value as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Ser {
    /// `null`.
    Null,
    /// Boolean.
    Bool(bool),
    /// Number.
    Number(Number),
    /// String.
    String(String),
    /// Live object reference.
    Ref(MarshallRef),
    /// Array of serialized values.
    Array(Vec<Ser>),
}

/// Invoke `method` on the object identified by `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Correlation id chosen by the sender.
    pub id: String,
    /// Member name, or [`CALL_METHOD`].
    pub method: String,
    /// The object being invoked.
    #[serde(rename = "self")]
    pub target: MarshallRef,
    /// Serialized arguments.
    pub args: Vec<Ser>,
}

/// Successful reply to the request with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Id of the request being answered.
    pub id: String,
    /// Serialized return value.
    pub result: Ser,
}

/// Failed reply to the request with the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Id of the request being answered.
    pub id: String,
    /// Serialized error value.
    pub error: Ser,
}

/// One decoded line.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Envelope {
    /// Method invocation.
    Request(Request),
    /// Successful reply.
    Response(Response),
    /// Failed reply.
    Error(ErrorReply),
}

impl Envelope {
    /// Correlation id carried by the envelope.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Request(request) => &request.id,
            Self::Response(response) => &response.id,
            Self::Error(error) => &error.id,
        }
    }
}

/// Why a line could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Not JSON, or not a JSON object. Treated as noise and dropped.
    Parse(String),
    /// A JSON object that fits none of the shapes. `id` is the string id
    /// salvaged from the object, if it had one.
    Validation {
        /// Salvaged correlation id.
        id: Option<String>,
        /// Human-readable cause.
        reason: String,
    },
}

enum Shape {
    Request,
    Response,
    Error,
}

/// Decode one line into an [`Envelope`].
///
/// An object containing `method` is a request; otherwise `result` marks a
/// response and `error` an error reply.
///
/// # Errors
///
/// - [`DecodeFailure::Parse`] for invalid JSON or a non-object value.
/// - [`DecodeFailure::Validation`] for missing or mistyped fields.
pub fn decode(line: &str) -> std::result::Result<Envelope, DecodeFailure> {
    let raw: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| DecodeFailure::Parse(format!("malformed json: {e}")))?;

    let serde_json::Value::Object(fields) = raw else {
        return Err(DecodeFailure::Parse("expect object message".into()));
    };

    let id = fields
        .get("id")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);

    let Some(shape) = shape_of(&fields) else {
        return Err(DecodeFailure::Validation {
            id,
            reason: "expect method, result or error".into(),
        });
    };

    let object = serde_json::Value::Object(fields);
    let decoded = match shape {
        Shape::Request => serde_json::from_value(object).map(Envelope::Request),
        Shape::Response => serde_json::from_value(object).map(Envelope::Response),
        Shape::Error => serde_json::from_value(object).map(Envelope::Error),
    };

    decoded.map_err(|e| DecodeFailure::Validation {
        id,
        reason: format!("invalid message: {e}"),
    })
}

/// Encode an envelope as a single JSON line, without the terminator.
///
/// # Errors
///
/// Returns [`AppError::Fatal`] if serialization fails or the result
/// contains a literal newline.
pub fn encode(envelope: &Envelope) -> Result<String> {
    let line = serde_json::to_string(envelope)
        .map_err(|e| AppError::Fatal(format!("failed to serialise envelope: {e}")))?;
    if line.contains('\n') {
        return Err(AppError::Fatal("json contains newline".into()));
    }
    Ok(line)
}

fn shape_of(fields: &Map<String, serde_json::Value>) -> Option<Shape> {
    if fields.contains_key("method") {
        Some(Shape::Request)
    } else if fields.contains_key("result") {
        Some(Shape::Response)
    } else if fields.contains_key("error") {
        Some(Shape::Error)
    } else {
        None
    }
}

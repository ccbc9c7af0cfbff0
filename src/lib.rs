//! jscan: high-throughput callback-driven JSON scanning
//!
//! One buffer in, an ordered stream of structural events out. The scanner
//! validates JSON as it goes, slices string and number payloads out of the
//! input without copying whenever it can, and lets the callback steer the
//! parse: keep going, cancel, or skip a whole subtree.
//!
//! ```
//! use jscan::{Action, Event, Parser};
//!
//! let mut parser = Parser::new();
//! let mut keys = Vec::new();
//! parser
//!     .parse(br#"{"name":"lloyd","age":42}"#, |_event, key, _value| {
//!         if let Some(key) = key {
//!             keys.push(String::from_utf8_lossy(key).into_owned());
//!         }
//!         Action::Continue
//!     })
//!     .unwrap();
//! assert_eq!(keys, ["name", "age"]);
//! ```
//!
//! For callers that would rather slice the input themselves there is an
//! offset mode reporting `(start, end)` extents instead of decoded bytes,
//! and [`read_json_nl`] scans newline-delimited records from any reader
//! with a single reused parser.

use std::fmt;

mod json_nl;
mod offset_parse;
mod parser;
mod scan;

pub use json_nl::{read_json_nl, ReadError};
pub use parser::Parser;

/// A structural event delivered to the parse callback.
///
/// Numbers are classified lexically: [`Event::Integer`] holds only digits,
/// [`Event::NegInteger`] is an integer with a leading minus, and
/// [`Event::Float`] contains a fraction or an exponent. The payload is the
/// exact literal text; nothing is converted to a numeric type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    String,
    Integer,
    NegInteger,
    Float,
    True,
    False,
    Null,
    Array,
    ArrayEnd,
    Object,
    ObjectEnd,
    /// The raw extent of a subtree the callback asked to skip.
    SkippedData,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::String => "string",
            Event::Integer => "integer",
            Event::NegInteger => "negative integer",
            Event::Float => "float",
            Event::True => "true",
            Event::False => "false",
            Event::Null => "null",
            Event::Array => "array",
            Event::ArrayEnd => "array end",
            Event::Object => "object",
            Event::ObjectEnd => "object end",
            Event::SkippedData => "skipped data",
        };
        f.write_str(name)
    }
}

/// The callback's instruction back to the parser.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Action {
    /// Keep parsing.
    #[default]
    Continue,
    /// Stop; the parse returns [`Error::Cancelled`].
    Cancel,
    /// Consume the subtree that just opened without emitting its events,
    /// then deliver one [`Event::SkippedData`] with its raw extent. Only
    /// meaningful on [`Event::Object`] and [`Event::Array`]; elsewhere it
    /// acts like [`Action::Continue`].
    Skip,
}

/// Errors surfaced by [`Parser::parse`] and [`Parser::offset_parse`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The buffer is not a single well-formed JSON document.
    Syntax(SyntaxError),
    /// The callback returned [`Action::Cancel`]. The only non-malformation
    /// error the parser produces, kept as a unit variant so callers can
    /// test for it cheaply.
    Cancelled,
}

/// A malformation diagnosis: what went wrong and where.
///
/// `Display` on [`Error`] gives the short message; [`SyntaxError::verbose`]
/// adds a snippet of the input at the failure point and the parser state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyntaxError {
    message: &'static str,
    offset: usize,
    context: String,
    state: &'static str,
}

impl SyntaxError {
    pub(crate) fn at(
        message: &'static str,
        buf: &[u8],
        offset: usize,
        state: &'static str,
    ) -> Self {
        let tail = &buf[offset.min(buf.len())..];
        let shown = &tail[..tail.len().min(20)];
        let mut context = String::from_utf8_lossy(shown).into_owned();
        if tail.len() > 20 {
            context.push_str("...");
        }
        SyntaxError {
            message,
            offset,
            context,
            state,
        }
    }

    /// The short diagnostic message.
    pub fn message(&self) -> &'static str {
        self.message
    }

    /// Byte offset in the input where scanning was positioned.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Full rendering: message, up to 20 bytes of input context, state tag.
    pub fn verbose(&self) -> String {
        format!("{} at '{}' ({})", self.message, self.context, self.state)
    }
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Syntax(err) => err.fmt(f),
            Error::Cancelled => f.write_str("client cancelled parse"),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names() {
        assert_eq!(Event::NegInteger.to_string(), "negative integer");
        assert_eq!(Event::ObjectEnd.to_string(), "object end");
        assert_eq!(Event::SkippedData.to_string(), "skipped data");
    }

    #[test]
    fn syntax_error_rendering() {
        let buf = b"xyzzy this is quite a long tail of garbage";
        let err = SyntaxError::at("trailing garbage", buf, 0, "value end");
        assert_eq!(err.to_string(), "trailing garbage");
        assert_eq!(
            err.verbose(),
            "trailing garbage at 'xyzzy this is quite ...' (value end)"
        );
    }

    #[test]
    fn syntax_error_short_context_has_no_ellipsis() {
        let err = SyntaxError::at("number expected", b"12,", 2, "value");
        assert_eq!(err.verbose(), "number expected at ',' (value)");
        assert_eq!(err.offset(), 2);
    }

    #[test]
    fn cancellation_is_distinguishable() {
        let err = Error::Cancelled;
        assert_eq!(err, Error::Cancelled);
        assert_ne!(
            err,
            Error::Syntax(SyntaxError::at("number expected", b"", 0, "value"))
        );
        assert_eq!(err.to_string(), "client cancelled parse");
    }
}

//! The scanning state machine and the lexers it drives.
//!
//! A [`Parser`] is created once and reused across documents; each call to
//! [`Parser::parse`] resets its scratch state, binds the scanner family for
//! the buffer, and drives a small explicit state machine over the bytes.
//! String and number payloads are handed to the callback as slices of the
//! input whenever possible; only strings containing escapes are decoded
//! into a reusable scratch buffer.

use smallvec::SmallVec;

use crate::scan::{self, ScanFn, ScanTable};
use crate::{Action, Error, Event, SyntaxError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum State {
    Value,
    ValueEnd,
    Object,
    Array,
    End,
    Cancelled,
    SkippingObject,
    SkippingArray,
}

impl State {
    pub(crate) fn name(self) -> &'static str {
        match self {
            State::Value => "value",
            State::ValueEnd => "value end",
            State::Object => "object",
            State::Array => "array",
            State::End => "end",
            State::Cancelled => "cancelled",
            State::SkippingObject => "skipping object",
            State::SkippingArray => "skipping array",
        }
    }
}

/// A decoded object key stashed until its value is parsed.
///
/// Escape-free keys are ranges into the input buffer. Keys that needed
/// decoding are copied out of the cooked buffer at push time, because the
/// value parse that follows may overwrite it. Cooked keys are rare enough
/// that the copy does not matter.
pub(crate) enum KeySlot {
    Raw(usize, usize),
    Copied(Vec<u8>),
}

impl KeySlot {
    pub(crate) fn bytes<'a>(&'a self, buf: &'a [u8]) -> &'a [u8] {
        match self {
            KeySlot::Raw(start, end) => &buf[*start..*end],
            KeySlot::Copied(key) => key,
        }
    }
}

/// Where a decoded string payload lives.
pub(crate) enum StrSpan {
    /// No escapes: the bytes between the quotes, in the input buffer.
    Raw(usize, usize),
    /// Escapes were decoded into the parser's cooked buffer.
    Cooked,
}

/// A reusable callback-driven JSON scanner.
///
/// One `parse` call consumes one complete document. The parser owns only
/// scratch state (container stack, pending keys, the cooked string buffer),
/// all of it reset per call, so a single instance can scan millions of
/// newline-delimited records without reallocating. It is not meant to be
/// shared across threads; create one parser per thread instead.
pub struct Parser {
    pub(crate) i: usize,
    pub(crate) s: State,
    pub(crate) states: SmallVec<[State; 8]>,
    pub(crate) key_stack: SmallVec<[KeySlot; 4]>,
    pub(crate) cooked: Vec<u8>,
    pub(crate) scan: ScanTable,
    pub(crate) skip_start: usize,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    /// Create a parser. One instance can be reused across any number of
    /// documents.
    pub fn new() -> Self {
        Parser {
            i: 0,
            s: State::Value,
            states: SmallVec::new(),
            key_stack: SmallVec::new(),
            cooked: Vec::new(),
            scan: scan::scalar_table(),
            skip_start: 0,
        }
    }

    /// Scan one complete JSON document, invoking `cb` once per structural
    /// event.
    ///
    /// `key` is `Some` only for events directly inside an object (container
    /// end events never carry a key). `value` is the decoded string, the
    /// number literal, or the raw bytes of a skipped subtree; it is `None`
    /// for `true`/`false`/`null` and for container events. Both slices are
    /// valid only for the duration of the callback.
    ///
    /// Returns `Ok(())` when the buffer held exactly one document followed
    /// only by whitespace.
    pub fn parse<F>(&mut self, buf: &[u8], mut cb: F) -> Result<(), Error>
    where
        F: FnMut(Event, Option<&[u8]>, Option<&[u8]>) -> Action,
    {
        self.reset(buf);

        while self.i < buf.len() {
            match self.s {
                State::ValueEnd => match self.states.last().copied() {
                    None => break,
                    Some(State::Object) => {
                        self.skip_space(buf);
                        if self.i >= buf.len() {
                            return Err(self.fail(buf, "premature EOF"));
                        }
                        match buf[self.i] {
                            b',' => {
                                self.i += 1;
                                self.skip_space(buf);
                                if self.i < buf.len() && buf[self.i] == b'}' {
                                    return Err(self.fail(
                                        buf,
                                        "after key and value, inside map, I expect ',' or '}'",
                                    ));
                                }
                                self.s = State::Object;
                            }
                            b'}' => {
                                self.i += 1;
                                self.pop_state();
                                self.s = State::ValueEnd;
                                let action = cb(Event::ObjectEnd, None, None);
                                self.apply(action, Event::ObjectEnd);
                            }
                            _ => {
                                return Err(self.fail(
                                    buf,
                                    "after key and value, inside map, I expect ',' or '}'",
                                ))
                            }
                        }
                    }
                    Some(State::Array) => {
                        self.skip_space(buf);
                        if self.i >= buf.len() {
                            return Err(self.fail(buf, "premature EOF"));
                        }
                        match buf[self.i] {
                            b',' => {
                                self.i += 1;
                                self.s = State::Value;
                            }
                            b']' => {
                                self.i += 1;
                                self.pop_state();
                                self.s = State::ValueEnd;
                                let action = cb(Event::ArrayEnd, None, None);
                                self.apply(action, Event::ArrayEnd);
                            }
                            _ => {
                                return Err(self.fail(
                                    buf,
                                    "after a value, inside an array, I expect ',' or ']'",
                                ))
                            }
                        }
                    }
                    Some(_) => unreachable!("container stack holds only object/array markers"),
                },
                State::Value => {
                    self.skip_space(buf);
                    if self.i >= buf.len() {
                        return Err(self.fail(buf, "unexpected end of buffer"));
                    }
                    match buf[self.i] {
                        b'{' => {
                            self.i += 1;
                            let key = self.take_key();
                            let action =
                                cb(Event::Object, key.as_ref().map(|k| k.bytes(buf)), None);
                            self.apply(action, Event::Object);
                            match self.s {
                                State::SkippingObject => self.skip_start = self.i - 1,
                                State::Cancelled => {}
                                _ => self.push_state(State::Object),
                            }
                        }
                        b'[' => {
                            self.i += 1;
                            let key = self.take_key();
                            let action =
                                cb(Event::Array, key.as_ref().map(|k| k.bytes(buf)), None);
                            self.apply(action, Event::Array);
                            match self.s {
                                State::SkippingArray => self.skip_start = self.i - 1,
                                State::Cancelled => {}
                                _ => self.push_state(State::Array),
                            }
                        }
                        b'"' => {
                            let span = self.read_string(buf)?;
                            self.restore_state();
                            let key = self.take_key();
                            let value = match span {
                                StrSpan::Raw(start, end) => &buf[start..end],
                                StrSpan::Cooked => self.cooked.as_slice(),
                            };
                            let action = cb(
                                Event::String,
                                key.as_ref().map(|k| k.bytes(buf)),
                                Some(value),
                            );
                            self.apply(action, Event::String);
                            if self.s != State::Cancelled {
                                self.s = State::ValueEnd;
                            }
                        }
                        b'-' | b'0'..=b'9' => {
                            let (start, end, t) = self.read_number(buf)?;
                            self.restore_state();
                            let key = self.take_key();
                            let action =
                                cb(t, key.as_ref().map(|k| k.bytes(buf)), Some(&buf[start..end]));
                            self.apply(action, t);
                            if self.s != State::Cancelled {
                                self.s = State::ValueEnd;
                            }
                        }
                        b'n' => self.literal(buf, b"null", Event::Null, &mut cb)?,
                        b't' => self.literal(buf, b"true", Event::True, &mut cb)?,
                        b'f' => self.literal(buf, b"false", Event::False, &mut cb)?,
                        _ => {
                            return Err(
                                self.fail(buf, "unallowed token at this point in JSON text")
                            )
                        }
                    }
                }
                State::Object => {
                    self.skip_space(buf);
                    if self.i >= buf.len() {
                        return Err(self.fail(buf, "premature EOF"));
                    }
                    if buf[self.i] == b'}' {
                        self.i += 1;
                        self.pop_state();
                        self.s = State::ValueEnd;
                        let action = cb(Event::ObjectEnd, None, None);
                        self.apply(action, Event::ObjectEnd);
                    } else {
                        let span = self.read_string(buf)?;
                        self.skip_space(buf);
                        if self.i >= buf.len() || buf[self.i] != b':' {
                            return Err(self.fail(buf, "expected ':' to separate key and value"));
                        }
                        self.i += 1;
                        let slot = match span {
                            StrSpan::Raw(start, end) => KeySlot::Raw(start, end),
                            StrSpan::Cooked => KeySlot::Copied(self.cooked.clone()),
                        };
                        self.key_stack.push(slot);
                        self.s = State::Value;
                    }
                }
                State::Array => {
                    self.skip_space(buf);
                    if self.i >= buf.len() {
                        return Err(self.fail(buf, "premature EOF"));
                    }
                    if buf[self.i] == b']' {
                        self.i += 1;
                        self.pop_state();
                        self.s = State::ValueEnd;
                        let action = cb(Event::ArrayEnd, None, None);
                        self.apply(action, Event::ArrayEnd);
                    } else {
                        self.s = State::Value;
                    }
                }
                State::Cancelled => return Err(Error::Cancelled),
                State::SkippingObject => {
                    self.skip_object(buf)?;
                    let action = cb(
                        Event::SkippedData,
                        None,
                        Some(&buf[self.skip_start..self.i]),
                    );
                    self.apply(action, Event::SkippedData);
                    if self.s != State::Cancelled {
                        self.s = State::ValueEnd;
                    }
                }
                State::SkippingArray => {
                    self.skip_array(buf)?;
                    let action = cb(
                        Event::SkippedData,
                        None,
                        Some(&buf[self.skip_start..self.i]),
                    );
                    self.apply(action, Event::SkippedData);
                    if self.s != State::Cancelled {
                        self.s = State::ValueEnd;
                    }
                }
                State::End => return Err(self.fail(buf, "hit unimplemented state")),
            }
        }

        self.skip_space(buf);
        if self.i < buf.len() {
            return Err(self.fail(buf, "trailing garbage"));
        }
        if !self.states.is_empty() {
            return Err(self.fail(buf, "premature EOF"));
        }
        Ok(())
    }

    fn literal<F>(
        &mut self,
        buf: &[u8],
        lit: &'static [u8],
        event: Event,
        cb: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(Event, Option<&[u8]>, Option<&[u8]>) -> Action,
    {
        if buf.len() - self.i < lit.len() || &buf[self.i..self.i + lit.len()] != lit {
            return Err(self.fail(buf, "invalid string in json text."));
        }
        self.i += lit.len();
        self.restore_state();
        let key = self.take_key();
        let action = cb(event, key.as_ref().map(|k| k.bytes(buf)), None);
        self.apply(action, event);
        if self.s != State::Cancelled {
            self.s = State::ValueEnd;
        }
        Ok(())
    }

    pub(crate) fn reset(&mut self, buf: &[u8]) {
        self.i = 0;
        self.s = State::Value;
        self.states.clear();
        self.key_stack.clear();
        self.cooked.clear();
        self.scan = scan::select(buf);
        self.skip_start = 0;
    }

    pub(crate) fn fail(&self, buf: &[u8], message: &'static str) -> Error {
        Error::Syntax(SyntaxError::at(message, buf, self.i, self.s.name()))
    }

    pub(crate) fn skip_space(&mut self, buf: &[u8]) {
        let mut i = self.i;
        while i < buf.len() {
            match buf[i] {
                b' ' | b'\t' | b'\n' => i += 1,
                _ => break,
            }
        }
        self.i = i;
    }

    pub(crate) fn push_state(&mut self, next: State) {
        self.states.push(next);
        self.s = next;
    }

    pub(crate) fn pop_state(&mut self) {
        self.s = self.states.pop().unwrap_or(State::End);
    }

    pub(crate) fn restore_state(&mut self) {
        self.s = self.states.last().copied().unwrap_or(State::End);
    }

    /// Pop the pending key when the value being emitted sits directly
    /// inside an object.
    pub(crate) fn take_key(&mut self) -> Option<KeySlot> {
        if self.states.last() == Some(&State::Object) {
            self.key_stack.pop()
        } else {
            None
        }
    }

    pub(crate) fn apply(&mut self, action: Action, event: Event) {
        match action {
            Action::Continue => {}
            Action::Cancel => self.s = State::Cancelled,
            Action::Skip => match event {
                Event::Object => self.s = State::SkippingObject,
                Event::Array => self.s = State::SkippingArray,
                _ => {}
            },
        }
    }

    /// Read the quoted string at the cursor, decoding escapes into the
    /// cooked buffer as needed, and leave the cursor past the closing
    /// quote.
    pub(crate) fn read_string(&mut self, buf: &[u8]) -> Result<StrSpan, Error> {
        if buf.get(self.i) != Some(&b'"') {
            return Err(self.fail(buf, "string expected '\"'"));
        }
        self.i += 1;
        self.cooked.clear();
        let mut start = self.i;
        loop {
            self.i += (self.scan.string_chars)(buf, self.i);
            if self.i >= buf.len() {
                return Err(self.fail(buf, "unterminated string found"));
            }
            match buf[self.i] {
                b'"' => {
                    let end = self.i;
                    self.i += 1;
                    if self.cooked.is_empty() {
                        return Ok(StrSpan::Raw(start, end));
                    }
                    self.cooked.extend_from_slice(&buf[start..end]);
                    return Ok(StrSpan::Cooked);
                }
                b'\\' => {
                    start = self.decode_escape(buf, start)?;
                }
                c if c < 0x20 => {
                    return Err(self.fail(buf, "invalid character inside string"));
                }
                _ => unreachable!("scanner stopped on a non-special byte"),
            }
        }
    }

    /// Decode the escape at the cursor (which points at the backslash),
    /// first flushing the pending ordinary run `[start, cursor)` into the
    /// cooked buffer. Returns the new run start.
    fn decode_escape(&mut self, buf: &[u8], start: usize) -> Result<usize, Error> {
        let i = self.i;
        let esc = match buf.get(i + 1) {
            Some(&b) => b,
            None => return Err(self.fail(buf, "unterminated string found")),
        };
        self.cooked.extend_from_slice(&buf[start..i]);
        match esc {
            b'"' | b'\\' | b'/' => {
                self.cooked.push(esc);
                self.i = i + 2;
            }
            b't' => {
                self.cooked.push(b'\t');
                self.i = i + 2;
            }
            b'n' => {
                self.cooked.push(b'\n');
                self.i = i + 2;
            }
            b'r' => {
                self.cooked.push(b'\r');
                self.i = i + 2;
            }
            b'b' => {
                self.cooked.push(0x08);
                self.i = i + 2;
            }
            b'f' => {
                self.cooked.push(0x0c);
                self.i = i + 2;
            }
            b'u' => {
                if buf.len() < i + 6 {
                    return Err(self.fail(buf, "unexpected EOF after '\\u'"));
                }
                let hi = match hex4(&buf[i + 2..i + 6]) {
                    Some(v) => v,
                    None => {
                        return Err(
                            self.fail(buf, "invalid (non-hex) character occurs after '\\u'")
                        )
                    }
                };
                let mut cp = hi;
                let mut next = i + 6;
                if hi & 0xFC00 == 0xD800 {
                    // high surrogate: pair it with a following low
                    // surrogate, or substitute '?'. A malformed follower is
                    // left in place so the next round reports it.
                    cp = u32::from(b'?');
                    if buf.len() >= i + 12 && buf[i + 6] == b'\\' && buf[i + 7] == b'u' {
                        if let Some(lo) = hex4(&buf[i + 8..i + 12]) {
                            if lo & 0xFC00 == 0xDC00 {
                                cp = ((hi & 0x3F) << 10)
                                    | ((((hi >> 6) & 0xF) + 1) << 16)
                                    | (lo & 0x3FF);
                                next = i + 12;
                            }
                        }
                    }
                } else if hi & 0xFC00 == 0xDC00 {
                    cp = u32::from(b'?');
                }
                push_utf8(cp, &mut self.cooked);
                self.i = next;
            }
            _ => {
                return Err(self.fail(
                    buf,
                    "inside a string, '\\' occurs before a character which it may not",
                ))
            }
        }
        Ok(self.i)
    }

    /// Traverse a string without decoding it; used by the subtree skipper
    /// and the offset front-end. Leaves the cursor past the closing quote.
    pub(crate) fn skip_string(&mut self, buf: &[u8]) -> Result<(), Error> {
        if buf.get(self.i) != Some(&b'"') {
            return Err(self.fail(buf, "string expected '\"'"));
        }
        self.i += 1;
        loop {
            self.i += (self.scan.string_chars)(buf, self.i);
            if self.i >= buf.len() {
                return Err(self.fail(buf, "unterminated string found"));
            }
            match buf[self.i] {
                b'"' => {
                    self.i += 1;
                    return Ok(());
                }
                b'\\' => {
                    if self.i + 1 >= buf.len() {
                        return Err(self.fail(buf, "unterminated string found"));
                    }
                    self.i += 2;
                }
                c if c < 0x20 => {
                    return Err(self.fail(buf, "invalid character inside string"));
                }
                _ => unreachable!("scanner stopped on a non-special byte"),
            }
        }
    }

    /// Lex the number at the cursor, returning its extent and lexical
    /// classification.
    pub(crate) fn read_number(&mut self, buf: &[u8]) -> Result<(usize, usize, Event), Error> {
        let start = self.i;
        let mut t = Event::Integer;
        if self.i < buf.len() {
            match buf[self.i] {
                b'-' => {
                    t = Event::NegInteger;
                    self.i += 1;
                    let run = (self.scan.digits)(buf, self.i);
                    if run == 0 {
                        return Err(self.fail(
                            buf,
                            "malformed number, a digit is required after the minus sign",
                        ));
                    }
                    self.i += run;
                }
                b'0' => self.i += 1,
                b'1'..=b'9' => self.i += (self.scan.digits)(buf, self.i),
                _ => {}
            }
            if self.i == start {
                return Err(self.fail(buf, "number expected"));
            }
            if self.i < buf.len() && buf[self.i] == b'.' {
                t = Event::Float;
                self.i += 1;
                let run = (self.scan.digits)(buf, self.i);
                if run == 0 {
                    return Err(self.fail(buf, "digit expected after decimal point"));
                }
                self.i += run;
            }
            if self.i < buf.len() && (buf[self.i] == b'e' || buf[self.i] == b'E') {
                t = Event::Float;
                self.i += 1;
                if self.i < buf.len() && (buf[self.i] == b'-' || buf[self.i] == b'+') {
                    self.i += 1;
                }
                let run = (self.scan.digits)(buf, self.i);
                if run == 0 {
                    return Err(self.fail(buf, "digits expected after exponent marker (e)"));
                }
                self.i += run;
            }
        }
        Ok((start, self.i, t))
    }

    pub(crate) fn skip_object(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.skip_section(buf, b'{', b'}', self.scan.braces)
    }

    pub(crate) fn skip_array(&mut self, buf: &[u8]) -> Result<(), Error> {
        self.skip_section(buf, b'[', b']', self.scan.brackets)
    }

    /// Consume a subtree from just past its opening delimiter through the
    /// matching close, honouring nested containers of the same kind and
    /// strings. Anything else inside goes unvalidated.
    fn skip_section(
        &mut self,
        buf: &[u8],
        open: u8,
        close: u8,
        scan: ScanFn,
    ) -> Result<(), Error> {
        let mut depth = 1usize;
        loop {
            self.i += scan(buf, self.i);
            if self.i >= buf.len() {
                return Err(self.fail(buf, "premature EOF"));
            }
            let b = buf[self.i];
            if b == open {
                depth += 1;
                self.i += 1;
            } else if b == close {
                depth -= 1;
                self.i += 1;
                if depth == 0 {
                    return Ok(());
                }
            } else {
                self.skip_string(buf)?;
            }
        }
    }
}

fn hex4(bytes: &[u8]) -> Option<u32> {
    let mut v = 0u32;
    for &b in &bytes[..4] {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return None,
        };
        v = v << 4 | u32::from(digit);
    }
    Some(v)
}

fn push_utf8(cp: u32, out: &mut Vec<u8>) {
    if cp < 0x80 {
        out.push(cp as u8);
    } else if cp < 0x800 {
        out.push(0xC0 | (cp >> 6) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else if cp < 0x10000 {
        out.push(0xE0 | (cp >> 12) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    } else {
        out.push(0xF0 | (cp >> 18) as u8);
        out.push(0x80 | ((cp >> 12) & 0x3F) as u8);
        out.push(0x80 | ((cp >> 6) & 0x3F) as u8);
        out.push(0x80 | (cp & 0x3F) as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt_event(t: Event, k: Option<&[u8]>, v: Option<&[u8]>) -> String {
        let mut s = t.to_string();
        if let Some(k) = k {
            s.push_str(" k=");
            s.push_str(&String::from_utf8_lossy(k));
        }
        if let Some(v) = v {
            s.push_str(" v=");
            s.push_str(&String::from_utf8_lossy(v));
        }
        s
    }

    // Events emitted before a failure matter as much as the failure
    // itself, so the collector hands both back.
    fn collect_events(json: &[u8]) -> (Vec<String>, Result<(), Error>) {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        let result = parser.parse(json, |t, k, v| {
            out.push(fmt_event(t, k, v));
            Action::Continue
        });
        (out, result)
    }

    fn events(json: &[u8]) -> Result<Vec<String>, Error> {
        let (out, result) = collect_events(json);
        result.map(|()| out)
    }

    fn syntax_message(err: Error) -> &'static str {
        match err {
            Error::Syntax(e) => e.message(),
            Error::Cancelled => panic!("expected a syntax error, got cancellation"),
        }
    }

    #[test]
    fn scans_flat_object() {
        assert_eq!(
            events(br#"{"name":"lloyd","age":42}"#).unwrap(),
            [
                "object",
                "string k=name v=lloyd",
                "integer k=age v=42",
                "object end"
            ]
        );
    }

    #[test]
    fn scans_scalars_in_array() {
        assert_eq!(
            events(b"[true,false,null,-1,1.5,2e10]").unwrap(),
            [
                "array",
                "true",
                "false",
                "null",
                "negative integer v=-1",
                "float v=1.5",
                "float v=2e10",
                "array end"
            ]
        );
    }

    #[test]
    fn scans_nested_containers() {
        assert_eq!(
            events(br#"{"a":{"b":[1,2]}}"#).unwrap(),
            [
                "object",
                "object k=a",
                "array k=b",
                "integer v=1",
                "integer v=2",
                "array end",
                "object end",
                "object end"
            ]
        );
    }

    #[test]
    fn decodes_escapes_in_top_level_string() {
        assert_eq!(
            events(br#""hi\n\u00e9""#).unwrap(),
            ["string v=hi\n\u{e9}"]
        );
    }

    #[test]
    fn decodes_all_single_character_escapes() {
        let got = events(br#""\t\\\"\/\b\f\r\n""#).unwrap();
        assert_eq!(got, ["string v=\t\\\"/\u{8}\u{c}\r\n"]);
    }

    #[test]
    fn decodes_surrogate_pair() {
        assert_eq!(
            events(br#""\ud83d\udc8b""#).unwrap(),
            ["string v=\u{1F48B}"]
        );
    }

    #[test]
    fn surrogate_combining_matches_utf16_decoding() {
        for (hi, lo) in [
            (0xD800u32, 0xDC00u32),
            (0xD801, 0xDC37),
            (0xD83D, 0xDC8B),
            (0xDBFF, 0xDFFF),
        ] {
            let json = format!("\"\\u{hi:04x}\\u{lo:04x}\"");
            let expected = char::from_u32(0x10000 + ((hi - 0xD800) << 10) + (lo - 0xDC00))
                .unwrap()
                .to_string();
            assert_eq!(
                events(json.as_bytes()).unwrap(),
                [format!("string v={expected}")],
                "pair {hi:04x}/{lo:04x}"
            );
        }
    }

    #[test]
    fn unpaired_surrogates_become_question_marks() {
        assert_eq!(events(br#""a\ud800z""#).unwrap(), ["string v=a?z"]);
        assert_eq!(events(br#""\udc00x""#).unwrap(), ["string v=?x"]);
        assert_eq!(events(br#""\ud800A""#).unwrap(), ["string v=?A"]);
        // high surrogate followed by a non-surrogate escape: the follower
        // decodes on its own
        assert_eq!(events(br#""\ud800\u0041""#).unwrap(), ["string v=?A"]);
    }

    #[test]
    fn unescaped_strings_do_not_touch_the_cooked_buffer() {
        let buf = br#"{"plain":"payload"}"#.to_vec();
        let mut parser = Parser::new();
        let mut seen = Vec::new();
        parser
            .parse(&buf, |t, _k, v| {
                if t == Event::String {
                    let v = v.unwrap();
                    // zero-copy: the slice aliases the input buffer
                    let buf_range = buf.as_ptr() as usize..buf.as_ptr() as usize + buf.len();
                    assert!(buf_range.contains(&(v.as_ptr() as usize)));
                    seen.push(v.to_vec());
                }
                Action::Continue
            })
            .unwrap();
        assert_eq!(seen, [b"payload".to_vec()]);
    }

    #[test]
    fn cooked_key_survives_value_decode() {
        // both the key and the value need the cooked buffer; the key must
        // be copied out before the value overwrites it
        assert_eq!(
            events(br#"{"a\tb":"x\ny"}"#).unwrap(),
            ["object", "string k=a\tb v=x\ny", "object end"]
        );
    }

    #[test]
    fn string_error_cases() {
        assert_eq!(syntax_message(events(br#""abc"#).unwrap_err()), "unterminated string found");
        assert_eq!(
            syntax_message(events(br#""\q""#).unwrap_err()),
            "inside a string, '\\' occurs before a character which it may not"
        );
        assert_eq!(
            syntax_message(events(br#""\uZZZZ""#).unwrap_err()),
            "invalid (non-hex) character occurs after '\\u'"
        );
        assert_eq!(
            syntax_message(events(br#""\u00"#).unwrap_err()),
            "unexpected EOF after '\\u'"
        );
        assert_eq!(
            syntax_message(events(b"\"a\x01b\"").unwrap_err()),
            "invalid character inside string"
        );
    }

    #[test]
    fn number_error_cases() {
        assert_eq!(
            syntax_message(events(b"-x").unwrap_err()),
            "malformed number, a digit is required after the minus sign"
        );
        assert_eq!(
            syntax_message(events(b"1.").unwrap_err()),
            "digit expected after decimal point"
        );
        assert_eq!(
            syntax_message(events(b"1e").unwrap_err()),
            "digits expected after exponent marker (e)"
        );
        assert_eq!(
            syntax_message(events(b"1e+").unwrap_err()),
            "digits expected after exponent marker (e)"
        );
    }

    #[test]
    fn number_classification_edge_cases() {
        assert_eq!(events(b"-0").unwrap(), ["negative integer v=-0"]);
        assert_eq!(events(b"-0123").unwrap(), ["negative integer v=-0123"]);
        assert_eq!(events(b"0").unwrap(), ["integer v=0"]);
        assert_eq!(events(b"1e-2").unwrap(), ["float v=1e-2"]);
        assert_eq!(events(b"1E+2").unwrap(), ["float v=1E+2"]);
        assert_eq!(events(b"-1.5e3").unwrap(), ["float v=-1.5e3"]);
    }

    #[test]
    fn leading_zero_reads_as_trailing_garbage() {
        let (seen, result) = collect_events(b"0123");
        assert_eq!(seen, ["integer v=0"]);
        assert_eq!(syntax_message(result.unwrap_err()), "trailing garbage");
    }

    #[test]
    fn document_level_errors() {
        assert_eq!(
            syntax_message(events(br#"{"a":1,}"#).unwrap_err()),
            "after key and value, inside map, I expect ',' or '}'"
        );
        assert_eq!(
            syntax_message(events(br#"{"a":1 "b":2}"#).unwrap_err()),
            "after key and value, inside map, I expect ',' or '}'"
        );
        assert_eq!(syntax_message(events(br#"{"a":1"#).unwrap_err()), "premature EOF");
        assert_eq!(syntax_message(events(b"[1,2").unwrap_err()), "premature EOF");
        // the first value is delivered before the garbage is noticed
        let (seen, result) = collect_events(b"1 2");
        assert_eq!(seen, ["integer v=1"]);
        assert_eq!(syntax_message(result.unwrap_err()), "trailing garbage");
        assert_eq!(
            syntax_message(events(b"[1 2]").unwrap_err()),
            "after a value, inside an array, I expect ',' or ']'"
        );
        assert_eq!(
            syntax_message(events(br#"{"a" 1}"#).unwrap_err()),
            "expected ':' to separate key and value"
        );
        assert_eq!(
            syntax_message(events(b"[1,]").unwrap_err()),
            "unallowed token at this point in JSON text"
        );
        assert_eq!(
            syntax_message(events(b"#").unwrap_err()),
            "unallowed token at this point in JSON text"
        );
    }

    #[test]
    fn literal_matching_is_strict_and_bounded() {
        assert_eq!(events(b"null").unwrap(), ["null"]);
        assert_eq!(events(b"true").unwrap(), ["true"]);
        assert_eq!(events(b"false").unwrap(), ["false"]);
        let bad_literals: &[&[u8]] = &[b"nul", b"tru", b"fals", b"nulL", b"truthy", b"n"];
        for bad in bad_literals {
            assert_eq!(
                syntax_message(events(bad).unwrap_err()),
                "invalid string in json text.",
                "{}",
                String::from_utf8_lossy(bad)
            );
        }
    }

    #[test]
    fn whitespace_is_space_tab_newline_only() {
        assert_eq!(
            events(b" \t\n{ \"a\" :\n1 }\n").unwrap(),
            ["object", "integer k=a v=1", "object end"]
        );
        // carriage return is not whitespace here
        assert_eq!(
            syntax_message(events(b"[1,\r2]").unwrap_err()),
            "unallowed token at this point in JSON text"
        );
        assert_eq!(syntax_message(events(b"1\r").unwrap_err()), "trailing garbage");
    }

    #[test]
    fn empty_containers() {
        assert_eq!(events(b"{}").unwrap(), ["object", "object end"]);
        assert_eq!(events(b"[]").unwrap(), ["array", "array end"]);
        assert_eq!(
            events(b"[[],{}]").unwrap(),
            ["array", "array", "array end", "object", "object end", "array end"]
        );
    }

    #[test]
    fn empty_input_is_accepted_whitespace_only_is_not() {
        assert_eq!(events(b"").unwrap(), Vec::<String>::new());
        assert_eq!(
            syntax_message(events(b"   ").unwrap_err()),
            "unexpected end of buffer"
        );
    }

    #[test]
    fn keys_accompany_values_only_inside_objects() {
        let mut parser = Parser::new();
        let mut checks = Vec::new();
        parser
            .parse(br#"{"a":[1,{"b":2}],"c":3}"#, |t, k, _v| {
                checks.push((t, k.map(|k| k.to_vec())));
                Action::Continue
            })
            .unwrap();
        let expected: Vec<(Event, Option<Vec<u8>>)> = vec![
            (Event::Object, None),
            (Event::Array, Some(b"a".to_vec())),
            (Event::Integer, None),
            (Event::Object, None),
            (Event::Integer, Some(b"b".to_vec())),
            (Event::ObjectEnd, None),
            (Event::ArrayEnd, None),
            (Event::Integer, Some(b"c".to_vec())),
            (Event::ObjectEnd, None),
        ];
        assert_eq!(checks, expected);
    }

    #[test]
    fn skip_elides_subtree_and_reports_its_bytes() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser
            .parse(br#"{"a":{"skip":true},"b":1}"#, |t, k, v| {
                out.push(fmt_event(t, k, v));
                if t == Event::Object && k == Some(&b"a"[..]) {
                    Action::Skip
                } else {
                    Action::Continue
                }
            })
            .unwrap();
        assert_eq!(
            out,
            [
                "object",
                "object k=a",
                "skipped data v={\"skip\":true}",
                "integer k=b v=1",
                "object end"
            ]
        );
    }

    #[test]
    fn skip_array_subtree() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser
            .parse(br#"{"a":[1,[2,3]],"b":4}"#, |t, k, v| {
                out.push(fmt_event(t, k, v));
                if t == Event::Array {
                    Action::Skip
                } else {
                    Action::Continue
                }
            })
            .unwrap();
        assert_eq!(
            out,
            [
                "object",
                "array k=a",
                "skipped data v=[1,[2,3]]",
                "integer k=b v=4",
                "object end"
            ]
        );
    }

    #[test]
    fn skip_respects_braces_inside_strings() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser
            .parse(br#"{"a":{"s":"}{"},"b":1}"#, |t, k, v| {
                out.push(fmt_event(t, k, v));
                if t == Event::Object && k.is_some() {
                    Action::Skip
                } else {
                    Action::Continue
                }
            })
            .unwrap();
        assert_eq!(
            out,
            [
                "object",
                "object k=a",
                "skipped data v={\"s\":\"}{\"}",
                "integer k=b v=1",
                "object end"
            ]
        );
    }

    #[test]
    fn skip_whole_document() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser
            .parse(b"[1,2]", |t, k, v| {
                out.push(fmt_event(t, k, v));
                if t == Event::Array {
                    Action::Skip
                } else {
                    Action::Continue
                }
            })
            .unwrap();
        assert_eq!(out, ["array", "skipped data v=[1,2]"]);
    }

    #[test]
    fn skip_on_scalar_acts_like_continue() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        parser
            .parse(b"[1,2]", |t, k, v| {
                out.push(fmt_event(t, k, v));
                Action::Skip
            })
            .unwrap();
        // the array start's skip elides everything; a skip returned from
        // the SkippedData event itself is a no-op
        assert_eq!(out, ["array", "skipped data v=[1,2]"]);
        let mut out = Vec::new();
        parser
            .parse(b"17", |t, k, v| {
                out.push(fmt_event(t, k, v));
                Action::Skip
            })
            .unwrap();
        assert_eq!(out, ["integer v=17"]);
    }

    #[test]
    fn unterminated_skip_is_premature_eof() {
        let mut parser = Parser::new();
        let err = parser
            .parse(br#"{"a":{"x":1"#, |t, _k, _v| {
                if t == Event::Object {
                    Action::Skip
                } else {
                    Action::Continue
                }
            })
            .unwrap_err();
        assert_eq!(syntax_message(err), "premature EOF");
    }

    #[test]
    fn cancel_mid_document_returns_sentinel() {
        let mut parser = Parser::new();
        let mut out = Vec::new();
        let err = parser
            .parse(b"[1,2,3]", |t, k, v| {
                out.push(fmt_event(t, k, v));
                if v == Some(&b"2"[..]) {
                    Action::Cancel
                } else {
                    Action::Continue
                }
            })
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);
        assert_eq!(out, ["array", "integer v=1", "integer v=2"]);
    }

    #[test]
    fn cancel_on_container_start_is_not_lost() {
        let mut parser = Parser::new();
        let mut count = 0;
        let err = parser
            .parse(br#"{"a":{"b":1}}"#, |t, k, _v| {
                count += 1;
                if t == Event::Object && k.is_some() {
                    Action::Cancel
                } else {
                    Action::Continue
                }
            })
            .unwrap_err();
        assert_eq!(err, Error::Cancelled);
        assert_eq!(count, 2);
    }

    #[test]
    fn cancel_on_final_event_of_complete_document() {
        // nothing follows the last event, so the loop never observes the
        // cancelled state; the complete document reads as a success
        let mut parser = Parser::new();
        parser
            .parse(br#"{"a":1}"#, |t, _k, _v| {
                if t == Event::ObjectEnd {
                    Action::Cancel
                } else {
                    Action::Continue
                }
            })
            .unwrap();
    }

    #[test]
    fn parser_reuse_across_documents_and_errors() {
        let mut parser = Parser::new();
        let count = |parser: &mut Parser, json: &[u8]| -> Result<usize, Error> {
            let mut n = 0;
            parser.parse(json, |_, _, _| {
                n += 1;
                Action::Continue
            })?;
            Ok(n)
        };
        assert_eq!(count(&mut parser, br#"{"a":[1,2]}"#).unwrap(), 6);
        assert!(count(&mut parser, b"[1,").is_err());
        assert_eq!(count(&mut parser, b"true").unwrap(), 1);
        assert_eq!(count(&mut parser, br#"{"x":"A"}"#).unwrap(), 3);
    }

    #[test]
    fn deeply_nested_arrays() {
        let depth = 64;
        let mut doc = Vec::new();
        doc.extend(std::iter::repeat(b'[').take(depth));
        doc.push(b'1');
        doc.extend(std::iter::repeat(b']').take(depth));
        let got = events(&doc).unwrap();
        assert_eq!(got.len(), depth * 2 + 1);
        assert_eq!(got[depth], "integer v=1");
    }

    // Rebuild JSON text from decoded events, reparse it, and require the
    // same event sequence. Key order is preserved by the parser, so the
    // sequences must match exactly.
    #[test]
    fn reserialised_documents_replay_the_same_events() {
        let docs: &[&[u8]] = &[
            br#"{"name":"lloyd","age":42}"#,
            br#"{"a":{"b":[1,2]},"c":[true,false,null],"d":-1.5}"#,
            b"[[],{},[0]]",
        ];
        for doc in docs {
            let mut text = Vec::new();
            let mut needs_comma = false;
            Parser::new()
                .parse(doc, |t, k, v| {
                    if needs_comma && !matches!(t, Event::ArrayEnd | Event::ObjectEnd) {
                        text.push(b',');
                    }
                    if let Some(k) = k {
                        text.push(b'"');
                        text.extend_from_slice(k);
                        text.extend_from_slice(b"\":");
                    }
                    match t {
                        Event::Object => text.push(b'{'),
                        Event::Array => text.push(b'['),
                        Event::ObjectEnd => text.push(b'}'),
                        Event::ArrayEnd => text.push(b']'),
                        Event::String => {
                            text.push(b'"');
                            text.extend_from_slice(v.unwrap());
                            text.push(b'"');
                        }
                        Event::Integer | Event::NegInteger | Event::Float => {
                            text.extend_from_slice(v.unwrap())
                        }
                        Event::True => text.extend_from_slice(b"true"),
                        Event::False => text.extend_from_slice(b"false"),
                        Event::Null => text.extend_from_slice(b"null"),
                        Event::SkippedData => unreachable!("nothing is skipped here"),
                    }
                    needs_comma = !matches!(t, Event::Object | Event::Array);
                    Action::Continue
                })
                .unwrap();
            assert_eq!(events(doc).unwrap(), events(&text).unwrap());
        }
    }

    #[test]
    fn long_payloads_cross_chunk_boundaries() {
        let long_string: String = "abcdefgh".repeat(100);
        let long_digits = "9".repeat(500);
        let json = format!(r#"{{"s":"{long_string}","n":{long_digits}}}"#);
        assert_eq!(
            events(json.as_bytes()).unwrap(),
            [
                "object".to_string(),
                format!("string k=s v={long_string}"),
                format!("integer k=n v={long_digits}"),
                "object end".to_string()
            ]
        );
    }
}

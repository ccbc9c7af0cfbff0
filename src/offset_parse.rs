//! Offset-mode front-end: the same machine as [`Parser::parse`], but value
//! payloads are reported as `(start, end)` extents into the caller's buffer
//! instead of decoded bytes. Callers that only need a few fields can slice
//! the buffer themselves and leave everything else untouched.
//!
//! Conventions: value events carry `[start, end)` of the lexical extent,
//! with string extents excluding the surrounding quotes. Container starts
//! carry `(start_of_delimiter, -1)`; container ends carry
//! `(-1, end_past_delimiter)`. Keys are still decoded, because consumers
//! usually dispatch on them.

use crate::parser::{KeySlot, State, StrSpan};
use crate::{Action, Error, Event, Parser};

impl Parser {
    /// Scan one complete JSON document, reporting lexical extents.
    ///
    /// ```
    /// use jscan::{Action, Parser};
    ///
    /// let buf = br#"[1,"two"]"#;
    /// let mut parser = Parser::new();
    /// let mut spans = Vec::new();
    /// parser
    ///     .offset_parse(buf, |_event, _key, start, end| {
    ///         if start >= 0 && end >= 0 {
    ///             spans.push(buf[start as usize..end as usize].to_vec());
    ///         }
    ///         Action::Continue
    ///     })
    ///     .unwrap();
    /// assert_eq!(spans, [b"1".to_vec(), b"two".to_vec()]);
    /// ```
    pub fn offset_parse<F>(&mut self, buf: &[u8], mut cb: F) -> Result<(), Error>
    where
        F: FnMut(Event, Option<&[u8]>, isize, isize) -> Action,
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
                                let action = cb(Event::ObjectEnd, None, -1, self.i as isize);
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
                                let action = cb(Event::ArrayEnd, None, -1, self.i as isize);
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
                            let action = cb(
                                Event::Object,
                                key.as_ref().map(|k| k.bytes(buf)),
                                (self.i - 1) as isize,
                                -1,
                            );
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
                            let action = cb(
                                Event::Array,
                                key.as_ref().map(|k| k.bytes(buf)),
                                (self.i - 1) as isize,
                                -1,
                            );
                            self.apply(action, Event::Array);
                            match self.s {
                                State::SkippingArray => self.skip_start = self.i - 1,
                                State::Cancelled => {}
                                _ => self.push_state(State::Array),
                            }
                        }
                        b'"' => {
                            let (start, end) = self.read_string_offset(buf)?;
                            self.restore_state();
                            let key = self.take_key();
                            let action = cb(
                                Event::String,
                                key.as_ref().map(|k| k.bytes(buf)),
                                start as isize,
                                end as isize,
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
                            let action = cb(
                                t,
                                key.as_ref().map(|k| k.bytes(buf)),
                                start as isize,
                                end as isize,
                            );
                            self.apply(action, t);
                            if self.s != State::Cancelled {
                                self.s = State::ValueEnd;
                            }
                        }
                        b'n' => self.literal_offset(buf, b"null", Event::Null, &mut cb)?,
                        b't' => self.literal_offset(buf, b"true", Event::True, &mut cb)?,
                        b'f' => self.literal_offset(buf, b"false", Event::False, &mut cb)?,
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
                        let action = cb(Event::ObjectEnd, None, -1, self.i as isize);
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
                        let action = cb(Event::ArrayEnd, None, -1, self.i as isize);
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
                        self.skip_start as isize,
                        self.i as isize,
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
                        self.skip_start as isize,
                        self.i as isize,
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

    fn literal_offset<F>(
        &mut self,
        buf: &[u8],
        lit: &'static [u8],
        event: Event,
        cb: &mut F,
    ) -> Result<(), Error>
    where
        F: FnMut(Event, Option<&[u8]>, isize, isize) -> Action,
    {
        if buf.len() - self.i < lit.len() || &buf[self.i..self.i + lit.len()] != lit {
            return Err(self.fail(buf, "invalid string in json text."));
        }
        self.i += lit.len();
        self.restore_state();
        let key = self.take_key();
        let action = cb(
            event,
            key.as_ref().map(|k| k.bytes(buf)),
            (self.i - lit.len()) as isize,
            self.i as isize,
        );
        self.apply(action, event);
        if self.s != State::Cancelled {
            self.s = State::ValueEnd;
        }
        Ok(())
    }

    /// Locate the string at the cursor without decoding it. The returned
    /// extent excludes the quotes.
    fn read_string_offset(&mut self, buf: &[u8]) -> Result<(usize, usize), Error> {
        let open = self.i;
        self.skip_string(buf)?;
        Ok((open + 1, self.i - 1))
    }
}

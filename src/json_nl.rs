//! Newline-delimited JSON convenience reader.
//!
//! Splits a byte stream on `\n`, scanning each line as an independent
//! complete document with a single reused [`Parser`]. The line number is
//! threaded through to the callback so consumers can tell records apart.

use std::fmt;
use std::io::{BufRead, BufReader, Read};

use crate::{Action, Error, Event, Parser};

const BUF_SIZE: usize = 4 * 1024 * 1024;

/// Failures from [`read_json_nl`]: either the stream broke or a record was
/// malformed.
#[derive(Debug)]
pub enum ReadError {
    Io(std::io::Error),
    Parse(Error),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::Io(err) => write!(f, "read failed: {err}"),
            ReadError::Parse(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReadError::Io(err) => Some(err),
            ReadError::Parse(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ReadError {
    fn from(err: std::io::Error) -> Self {
        ReadError::Io(err)
    }
}

impl From<Error> for ReadError {
    fn from(err: Error) -> Self {
        ReadError::Parse(err)
    }
}

/// Read and scan newline-separated JSON from `reader`, invoking `cb` with
/// every structural event plus the record's line number.
///
/// Each line must hold one complete document (the line terminator counts as
/// trailing whitespace). Stops at the first malformed record or callback
/// cancellation. A final line without a terminator is scanned too, unless
/// it is empty.
///
/// ```
/// use std::io::Cursor;
/// use jscan::{read_json_nl, Action};
///
/// let data = "{\"a\":1}\n{\"a\":2}\n";
/// let mut lines = Vec::new();
/// read_json_nl(Cursor::new(data), |_event, _key, _value, line| {
///     lines.push(line);
///     Action::Continue
/// })
/// .unwrap();
/// assert_eq!(lines, [0, 0, 0, 1, 1, 1]);
/// ```
pub fn read_json_nl<R, F>(reader: R, mut cb: F) -> Result<(), ReadError>
where
    R: Read,
    F: FnMut(Event, Option<&[u8]>, Option<&[u8]>, u64) -> Action,
{
    let mut reader = BufReader::with_capacity(BUF_SIZE, reader);
    let mut parser = Parser::new();
    let mut line = Vec::new();
    let mut line_number = 0u64;
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(());
        }
        parser.parse(&line, |t, k, v| cb(t, k, v, line_number))?;
        line_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn collect(data: &str) -> Result<Vec<(u64, Event, Option<Vec<u8>>)>, ReadError> {
        let mut out = Vec::new();
        read_json_nl(Cursor::new(data.to_owned()), |t, _k, v, line| {
            out.push((line, t, v.map(|v| v.to_vec())));
            Action::Continue
        })?;
        Ok(out)
    }

    #[test]
    fn numbers_lines_monotonically() {
        let got = collect("1\n\"two\"\n[3]\n").unwrap();
        assert_eq!(
            got,
            vec![
                (0, Event::Integer, Some(b"1".to_vec())),
                (1, Event::String, Some(b"two".to_vec())),
                (2, Event::Array, None),
                (2, Event::Integer, Some(b"3".to_vec())),
                (2, Event::ArrayEnd, None),
            ]
        );
    }

    #[test]
    fn final_line_without_terminator_is_scanned() {
        let got = collect("{\"a\":1}\n42").unwrap();
        assert_eq!(got.last().unwrap(), &(1, Event::Integer, Some(b"42".to_vec())));
    }

    #[test]
    fn stops_at_first_malformed_record() {
        let err = collect("1\n[1,\n3\n").unwrap_err();
        match err {
            ReadError::Parse(Error::Syntax(e)) => {
                assert_eq!(e.message(), "unexpected end of buffer")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn cancellation_propagates() {
        let err = read_json_nl(Cursor::new("1\n2\n".to_owned()), |_t, _k, _v, line| {
            if line == 1 {
                Action::Cancel
            } else {
                Action::Continue
            }
        })
        .unwrap_err();
        match err {
            ReadError::Parse(Error::Cancelled) => {}
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_stream_is_fine() {
        assert!(collect("").unwrap().is_empty());
    }
}

//! Byte-class scanners for the parser's hot loops.
//!
//! Every scanner takes `(buf, offset)` and returns how many bytes past
//! `offset` belong to the run: digits, ordinary string bytes (anything but
//! `"`, `\` and control bytes), or bulk subtree content (anything but the
//! container delimiters and `"`). A scanner never reports a stop position
//! past `buf.len()`; when the run reaches the end of the buffer it returns
//! `buf.len() - offset`.
//!
//! Two families exist. The scalar family is a plain byte loop. The vector
//! family walks 16-byte chunks with SSE2 compares and classifies a whole
//! chunk per iteration; its final chunk may load up to 15 bytes past the
//! end of the buffer, which is only sound when that load cannot cross into
//! the next (possibly unmapped) page. [`select`] binds one family per parse
//! call: vector when [`near_page_end`] clears the buffer, scalar otherwise
//! and on non-x86_64 targets.

use std::sync::OnceLock;

pub(crate) type ScanFn = fn(&[u8], usize) -> usize;

/// Scanner bindings for one parse call.
#[derive(Clone, Copy)]
pub(crate) struct ScanTable {
    pub(crate) digits: ScanFn,
    pub(crate) string_chars: ScanFn,
    pub(crate) braces: ScanFn,
    pub(crate) brackets: ScanFn,
}

pub(crate) fn scalar_table() -> ScanTable {
    ScanTable {
        digits: digits_scalar,
        string_chars: string_chars_scalar,
        braces: braces_scalar,
        brackets: brackets_scalar,
    }
}

/// Pick the scanner family for one parse call over `buf`.
pub(crate) fn select(buf: &[u8]) -> ScanTable {
    #[cfg(target_arch = "x86_64")]
    {
        if !near_page_end(buf) {
            return ScanTable {
                digits: sse::digits,
                string_chars: sse::string_chars,
                braces: sse::braces,
                brackets: sse::brackets,
            };
        }
    }
    scalar_table()
}

/// True when the final byte of `buf` lies within 15 bytes of the next page
/// boundary, i.e. a 16-byte load anywhere in the buffer could touch the
/// following page.
pub(crate) fn near_page_end(buf: &[u8]) -> bool {
    if buf.is_empty() {
        return true;
    }
    let page = page_size();
    let last = buf.as_ptr() as usize + buf.len() - 1;
    last % page >= page - 15
}

/// OS page size, read once per process.
pub(crate) fn page_size() -> usize {
    static PAGE: OnceLock<usize> = OnceLock::new();
    *PAGE.get_or_init(|| {
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    })
}

pub(crate) fn digits_scalar(buf: &[u8], offset: usize) -> usize {
    let mut x = 0;
    while offset + x < buf.len() && buf[offset + x].is_ascii_digit() {
        x += 1;
    }
    x
}

pub(crate) fn string_chars_scalar(buf: &[u8], offset: usize) -> usize {
    let mut x = 0;
    while offset + x < buf.len() {
        let b = buf[offset + x];
        if b == b'"' || b == b'\\' || b < 0x20 {
            break;
        }
        x += 1;
    }
    x
}

fn delimiters_scalar(buf: &[u8], offset: usize, open: u8, close: u8) -> usize {
    let mut x = 0;
    while offset + x < buf.len() {
        let b = buf[offset + x];
        if b == open || b == close || b == b'"' {
            break;
        }
        x += 1;
    }
    x
}

pub(crate) fn braces_scalar(buf: &[u8], offset: usize) -> usize {
    delimiters_scalar(buf, offset, b'{', b'}')
}

pub(crate) fn brackets_scalar(buf: &[u8], offset: usize) -> usize {
    delimiters_scalar(buf, offset, b'[', b']')
}

#[cfg(target_arch = "x86_64")]
pub(crate) mod sse {
    //! 16-byte chunk scanners. SSE2 is part of the x86_64 baseline, so the
    //! intrinsics need no runtime detection; what needs guarding is the
    //! chunk load itself, which may touch up to 15 bytes past the buffer.
    //! [`super::select`] hands these out only when the page-boundary guard
    //! shows the tail load stays inside the buffer's final page.

    use core::arch::x86_64::*;

    /// Walk 16-byte chunks from `offset`, using `stop_mask` to flag bytes
    /// that end the run. Mask bits belonging to bytes past `buf.len()` are
    /// ignored, which keeps the never-past-the-end contract even though the
    /// load itself was wider.
    #[inline]
    fn run(buf: &[u8], offset: usize, stop_mask: unsafe fn(*const u8) -> u32) -> usize {
        let mut i = offset;
        while i < buf.len() {
            // SAFETY: the caller got this table from `select`, which proved
            // that a 16-byte load at any in-buffer position cannot cross
            // the page holding the final byte.
            let mask = unsafe { stop_mask(buf.as_ptr().add(i)) };
            let stop = if mask == 0 {
                16
            } else {
                mask.trailing_zeros() as usize
            };
            let remaining = buf.len() - i;
            if stop >= remaining {
                return buf.len() - offset;
            }
            if stop < 16 {
                return i + stop - offset;
            }
            i += 16;
        }
        buf.len() - offset
    }

    unsafe fn non_digit_mask(p: *const u8) -> u32 {
        let chunk = _mm_loadu_si128(p as *const __m128i);
        // signed compares: bytes >= 0x80 come out negative, land below '0'
        // and stop the run, which is what a non-digit should do
        let below = _mm_cmplt_epi8(chunk, _mm_set1_epi8(b'0' as i8));
        let above = _mm_cmpgt_epi8(chunk, _mm_set1_epi8(b'9' as i8));
        _mm_movemask_epi8(_mm_or_si128(below, above)) as u32
    }

    unsafe fn string_stop_mask(p: *const u8) -> u32 {
        let chunk = _mm_loadu_si128(p as *const __m128i);
        let quote = _mm_cmpeq_epi8(chunk, _mm_set1_epi8(b'"' as i8));
        let backslash = _mm_cmpeq_epi8(chunk, _mm_set1_epi8(b'\\' as i8));
        // a signed `< 0x20` alone would also flag 0xA0..0xFF UTF-8 bytes,
        // so control detection is restricted to non-negative lanes
        let below_space = _mm_cmplt_epi8(chunk, _mm_set1_epi8(0x20));
        let ascii = _mm_cmpgt_epi8(chunk, _mm_set1_epi8(-1));
        let control = _mm_and_si128(below_space, ascii);
        _mm_movemask_epi8(_mm_or_si128(_mm_or_si128(quote, backslash), control)) as u32
    }

    #[inline(always)]
    unsafe fn delimiter_mask(p: *const u8, open: u8, close: u8) -> u32 {
        let chunk = _mm_loadu_si128(p as *const __m128i);
        let opens = _mm_cmpeq_epi8(chunk, _mm_set1_epi8(open as i8));
        let closes = _mm_cmpeq_epi8(chunk, _mm_set1_epi8(close as i8));
        let quote = _mm_cmpeq_epi8(chunk, _mm_set1_epi8(b'"' as i8));
        _mm_movemask_epi8(_mm_or_si128(_mm_or_si128(opens, closes), quote)) as u32
    }

    unsafe fn brace_mask(p: *const u8) -> u32 {
        delimiter_mask(p, b'{', b'}')
    }

    unsafe fn bracket_mask(p: *const u8) -> u32 {
        delimiter_mask(p, b'[', b']')
    }

    pub(crate) fn digits(buf: &[u8], offset: usize) -> usize {
        run(buf, offset, non_digit_mask)
    }

    pub(crate) fn string_chars(buf: &[u8], offset: usize) -> usize {
        run(buf, offset, string_stop_mask)
    }

    pub(crate) fn braces(buf: &[u8], offset: usize) -> usize {
        run(buf, offset, brace_mask)
    }

    pub(crate) fn brackets(buf: &[u8], offset: usize) -> usize {
        run(buf, offset, bracket_mask)
    }
}

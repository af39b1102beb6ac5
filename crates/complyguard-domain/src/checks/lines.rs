use crate::{CancelToken, EvalError};
use complyguard_types::RepoPath;
use std::io::{BufRead, BufReader, Read};
use std::ops::ControlFlow;

/// Cancellation is polled once per this many lines.
pub(crate) const CANCEL_CHECK_LINES: u32 = 256;

/// Feed every line of `reader` to `visit` as `(1-based line number, text)`.
///
/// Text is decoded lossily and has its line terminator stripped. Stops early when `visit`
/// breaks; fails with [`EvalError::Cancelled`] once the token fires.
pub(crate) fn scan_lines<R, F>(
    reader: R,
    path: &RepoPath,
    cancel: &CancelToken,
    mut visit: F,
) -> Result<(), EvalError>
where
    R: Read,
    F: FnMut(u32, &str) -> ControlFlow<()>,
{
    let mut reader = BufReader::with_capacity(64 * 1024, reader);
    let mut buf = Vec::with_capacity(256);
    let mut line_no: u32 = 0;

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| EvalError::io(path.as_str(), e))?;
        if n == 0 {
            return Ok(());
        }
        line_no = line_no.saturating_add(1);
        if line_no % CANCEL_CHECK_LINES == 0 && cancel.is_cancelled() {
            return Err(EvalError::Cancelled);
        }

        let text = String::from_utf8_lossy(&buf);
        let text = text.trim_end_matches(['\n', '\r']);
        if visit(line_no, text).is_break() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(input: &[u8]) -> Vec<(u32, String)> {
        let mut out = Vec::new();
        scan_lines(input, &RepoPath::new("f"), &CancelToken::new(), |n, t| {
            out.push((n, t.to_string()));
            ControlFlow::Continue(())
        })
        .expect("scan");
        out
    }

    #[test]
    fn numbers_lines_and_strips_terminators() {
        assert_eq!(
            collect(b"a\r\nb\nc"),
            vec![(1, "a".into()), (2, "b".into()), (3, "c".into())]
        );
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let lines = collect(b"ok\n\xff\xfe password\n");
        assert_eq!(lines[1].1, "\u{fffd}\u{fffd} password");
    }

    #[test]
    fn cancelled_token_stops_long_inputs() {
        let token = CancelToken::new();
        token.cancel();
        let input = "x\n".repeat(CANCEL_CHECK_LINES as usize * 2);
        let err = scan_lines(input.as_bytes(), &RepoPath::new("f"), &token, |_, _| {
            ControlFlow::Continue(())
        })
        .unwrap_err();
        assert!(matches!(err, EvalError::Cancelled));
    }
}

//! An ordered, append-only diagnostic sink.
//!
//! Every compile-time error the toolchain reports — lexical, syntactic,
//! semantic, or link-time — goes through a [`Log`]. There is no severity
//! distinction between a user-facing diagnostic and a `"Bug: ..."`-prefixed
//! invariant violation; both are records, and it is the caller's job to
//! decide what a non-empty log means for the run.

use crate::position::Span;

/// A single logged diagnostic, with control characters in the message
/// escaped for safe single-line display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub message: String,
    pub span: Span,
}

impl LogRecord {
    fn new(message: &str, span: Span) -> Self {
        let mut escaped = String::with_capacity(message.len());
        for ch in message.chars() {
            match ch {
                '\t' => escaped.push_str("\\t"),
                '\n' => escaped.push_str("\\n"),
                '\r' => escaped.push_str("\\r"),
                other => escaped.push(other),
            }
        }

        Self {
            message: escaped,
            span,
        }
    }

    /// Whether `self` sorts after `other` in the log's insertion order.
    ///
    /// Records are ordered by module name, then by ascending start offset;
    /// ties at the same start offset put the *narrower* span last, so the
    /// most specific diagnostic at a location prints closest to the end of
    /// the block that triggered it.
    fn comes_after(&self, other: &LogRecord) -> bool {
        use std::cmp::Ordering::*;

        match self.span.start.module.cmp(&other.span.start.module) {
            Greater => true,
            Less => false,
            Equal => {
                if self.span.start.offset == other.span.start.offset {
                    self.span.end.offset <= other.span.end.offset
                } else {
                    self.span.start.offset >= other.span.start.offset
                }
            }
        }
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.span.start.offset < 0 {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.span, self.message)
        }
    }
}

/// A sorted log of [`LogRecord`]s.
#[derive(Debug, Default)]
pub struct Log {
    records: Vec<LogRecord>,
}

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Insert a diagnostic at the span `span`, keeping the log sorted.
    pub fn log_at(&mut self, message: impl AsRef<str>, span: Span) {
        let record = LogRecord::new(message.as_ref(), span);

        let mut index = self.records.len();
        while index > 0 {
            if record.comes_after(&self.records[index - 1]) {
                break;
            }
            index -= 1;
        }

        self.records.insert(index, record);
    }

    /// Insert a diagnostic with no specific source location.
    pub fn log(&mut self, message: impl AsRef<str>, module: impl Into<std::rc::Rc<str>>) {
        self.log_at(message, Span::unlocated(module));
    }

    /// Log a compiler-invariant violation. Kept as a distinct entry point
    /// so call sites read as intent ("this should never happen") rather
    /// than as an ordinary diagnostic, even though it shares the same sink.
    pub fn log_bug(&mut self, message: impl std::fmt::Display, module: impl Into<std::rc::Rc<str>>) {
        self.log(format!("Bug: {message}"), module);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span_at(module: &str, start: i64, end: i64) -> Span {
        let mut span = Span::unlocated(module);
        span.start.offset = start;
        span.end.offset = end;
        span
    }

    #[test]
    fn records_insert_sorted_by_start_offset() {
        let mut log = Log::new();
        log.log_at("second", span_at("m", 10, 10));
        log.log_at("first", span_at("m", 5, 5));
        log.log_at("third", span_at("m", 20, 20));

        let messages: Vec<_> = log.records().iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["first", "second", "third"]);
    }

    #[test]
    fn ties_put_narrower_span_last() {
        let mut log = Log::new();
        log.log_at("wide", span_at("m", 0, 10));
        log.log_at("narrow", span_at("m", 0, 2));

        let messages: Vec<_> = log.records().iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, ["wide", "narrow"]);
    }

    #[test]
    fn control_characters_are_escaped() {
        let mut log = Log::new();
        log.log_at("line1\nline2\ttabbed", span_at("m", 0, 0));
        assert_eq!(log.records()[0].message, "line1\\nline2\\ttabbed");
    }

    #[test]
    fn unlocated_diagnostic_prints_message_only() {
        let mut log = Log::new();
        log.log("oops", "m");
        assert_eq!(log.records()[0].to_string(), "oops");
    }
}

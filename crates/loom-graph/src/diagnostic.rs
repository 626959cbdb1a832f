//! Diagnostic rendering for graph errors against the markup they came from.

use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};
use loom_names::NameErrorKind;
use loom_node::LineInfo;

use crate::{GraphError, GraphErrorKind};

impl GraphError {
    /// Render this error with ariadne against `source`, the text the node
    /// stream was parsed from.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| format!("{}", self))
    }

    /// Write the error report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let report = self.build_report(filename, source);
        let _ = report
            .finish()
            .write((filename, Source::from(source)), writer);
    }

    fn build_report<'a>(
        &self,
        filename: &'a str,
        source: &str,
    ) -> ariadne::ReportBuilder<'static, (&'a str, Range<usize>)> {
        let range = self
            .line_info
            .map(|at| byte_range(source, at))
            .unwrap_or(0..0);
        let (label, help) = describe(&self.kind);
        let mut report = Report::build(ReportKind::Error, (filename, range.clone()))
            .with_message(self.kind.to_string());
        if self.line_info.is_some() {
            report = report.with_label(
                Label::new((filename, range))
                    .with_message(label)
                    .with_color(Color::Red),
            );
        }
        if let Some(help) = help {
            report = report.with_help(help);
        }
        report
    }
}

fn describe(kind: &GraphErrorKind) -> (&'static str, Option<&'static str>) {
    match kind {
        GraphErrorKind::Name(NameErrorKind::DuplicateName(_)) => (
            "name already in use",
            Some("a name can be registered only once per scope"),
        ),
        GraphErrorKind::Name(NameErrorKind::InvalidName(_)) => (
            "invalid name",
            Some("names start with a letter or underscore, followed by letters, digits or underscores"),
        ),
        GraphErrorKind::UnresolvedReferences(_) => (
            "referenced here",
            Some("give the referenced object a Name in this document"),
        ),
        GraphErrorKind::DuplicateMember(_) => (
            "set again here",
            Some("a member can be set only once per object"),
        ),
        GraphErrorKind::UnknownMember { .. } => (
            "unknown member",
            Some("members must be declared on the object's type or one of its bases"),
        ),
        GraphErrorKind::UnclosedObject(_) => ("input ends here", Some("close every object that is opened")),
        GraphErrorKind::Conversion { .. } => ("value written here", None),
        _ => ("here", None),
    }
}

/// Byte range of the token starting at `at` (1-based line and column).
fn byte_range(source: &str, at: LineInfo) -> Range<usize> {
    let mut offset = 0;
    for (index, line) in source.split_inclusive('\n').enumerate() {
        if index + 1 == at.line as usize {
            let text = line.trim_end_matches(['\n', '\r']);
            let column = at.column.saturating_sub(1) as usize;
            let start = text
                .char_indices()
                .nth(column)
                .map_or(text.len(), |(byte, _)| byte);
            let rest = &text[start..];
            let len = rest
                .find(|c: char| c.is_whitespace() || matches!(c, '<' | '>' | '/' | '=' | '"'))
                .unwrap_or(rest.len());
            let len = if len == 0 {
                rest.chars().next().map_or(0, char::len_utf8)
            } else {
                len
            };
            return offset + start..offset + start + len;
        }
        offset += line.len();
    }
    source.len()..source.len()
}

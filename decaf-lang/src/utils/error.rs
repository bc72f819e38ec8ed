use ariadne::{ColorGenerator, Label, Report, ReportKind, Source};

use super::metadata::{Location, Span, ANONYMOUS_SOURCE};

pub trait ReportableError: std::error::Error {
    /// message is used for reporting verbose message for ariadne.
    fn get_message(&self) -> String {
        self.to_string()
    }
    /// label is used for indicating error with the specific position for ariadne.
    /// Errors that are not tied to the source text (runtime faults) return no labels.
    fn get_labels(&self) -> Vec<(Span, String)>;
}

#[derive(Debug, Clone)]
pub struct SimpleError {
    pub message: String,
    pub span: Span,
}
impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}
impl std::error::Error for SimpleError {}
impl ReportableError for SimpleError {
    fn get_labels(&self) -> Vec<(Span, String)> {
        vec![(self.span.clone(), self.message.clone())]
    }
}

struct FileCache {
    src: Source<String>,
}

impl ariadne::Cache<String> for FileCache {
    type Storage = String;

    fn fetch(&mut self, _id: &String) -> Result<&Source<Self::Storage>, Box<dyn std::fmt::Debug + '_>> {
        Ok(&self.src)
    }

    fn display<'a>(&self, id: &'a String) -> Option<Box<dyn std::fmt::Display + 'a>> {
        Some(Box::new(id.clone()))
    }
}

fn build_report(path: &str, e: &dyn ReportableError) -> Report<'static, Location> {
    let mut colors = ColorGenerator::new();
    let rawlabels = e.get_labels();
    let offset = rawlabels.first().map_or(0, |(span, _)| span.start);
    let labels = rawlabels.into_iter().map(|(span, message)| {
        Label::new(Location::new(span, path))
            .with_message(message)
            .with_color(colors.next())
    });
    Report::build(ReportKind::Error, path.to_string(), offset)
        .with_message(e.get_message())
        .with_labels(labels)
        .finish()
}

pub fn report(src: &str, path: Option<&str>, errs: &[Box<dyn ReportableError>]) {
    let path = path.unwrap_or(ANONYMOUS_SOURCE);
    for e in errs {
        let cache = FileCache {
            src: Source::from(src.to_string()),
        };
        if let Err(ioerr) = build_report(path, e.as_ref()).eprint(cache) {
            log::error!("failed to print a report: {ioerr}");
        }
    }
}

pub fn dump_to_string(errs: &[Box<dyn ReportableError>]) -> String {
    errs.iter()
        .map(|e| e.get_message())
        .collect::<Vec<_>>()
        .join("\n")
}

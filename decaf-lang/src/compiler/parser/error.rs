use crate::utils::{error::ReportableError, metadata::Span};
use chumsky::error::{Simple, SimpleReason};
use std::fmt;
use std::hash::Hash;

/// Lexing (`T = char`) and parsing (`T = Token`) failures.
#[derive(Debug)]
pub struct ParseError<T>(pub Simple<T>)
where
    T: Hash + Eq + fmt::Debug + fmt::Display;

impl<T> From<ParseError<T>> for Simple<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    fn from(e: ParseError<T>) -> Self {
        e.0
    }
}

impl<T> fmt::Display for ParseError<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_message())
    }
}

impl<T> std::error::Error for ParseError<T> where T: Hash + Eq + fmt::Debug + fmt::Display {}

impl<T> ParseError<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    fn label(&self) -> String {
        match self.0.reason() {
            SimpleReason::Custom(msg) => msg.clone(),
            _ => format!(
                "Unexpected {}",
                self.0
                    .found()
                    .map(|c| format!("token {c}"))
                    .unwrap_or_else(|| "end of input".to_string())
            ),
        }
    }
    pub fn span(&self) -> Span {
        self.0.span()
    }
}

impl<T> ReportableError for ParseError<T>
where
    T: Hash + Eq + fmt::Debug + fmt::Display,
{
    fn get_message(&self) -> String {
        match self.0.reason() {
            SimpleReason::Unexpected | SimpleReason::Unclosed { .. } => {
                let mut expected = self
                    .0
                    .expected()
                    .map(|expected| match expected {
                        Some(expected) => expected.to_string(),
                        None => "end of input".to_string(),
                    })
                    .collect::<Vec<_>>();
                // the set is unordered
                expected.sort();
                format!(
                    "{}{}, expected {}",
                    if self.0.found().is_some() {
                        "unexpected token"
                    } else {
                        "unexpected end of input"
                    },
                    if let Some(label) = self.0.label() {
                        format!(" while parsing {label}")
                    } else {
                        String::new()
                    },
                    if expected.is_empty() {
                        "something else".to_string()
                    } else {
                        expected.join(", ")
                    }
                )
            }
            SimpleReason::Custom(msg) => msg.clone(),
        }
    }
    fn get_labels(&self) -> Vec<(Span, String)> {
        vec![(self.span(), self.label())]
    }
}

#![allow(clippy::module_inception)]

use std::{fmt::Write, path::Path, rc::Rc};

use crate::errors::errors::{Error, ErrorTip};

pub mod ast;
pub mod builtins;
pub mod diagnostics;
pub mod errors;
pub mod lexer;
pub mod macros;
pub mod namespace;
pub mod parser;
pub mod recursion;
pub mod type_checker;
pub mod types;

extern crate regex;

/// A location in a source file.
///
/// `offset` is a byte offset, `line` is 1-based and `column` is 0-based.
#[derive(Debug, Clone)]
pub struct Position {
    pub offset: u32,
    pub line: u32,
    pub column: u32,
    pub file: Rc<String>,
}

impl Position {
    pub fn new(offset: u32, line: u32, column: u32, file: Rc<String>) -> Self {
        Position {
            offset,
            line,
            column,
            file,
        }
    }

    pub fn null() -> Self {
        Position::new(0, 0, 0, Rc::new(String::from("<null>")))
    }
}

#[derive(Debug, Clone)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn null() -> Self {
        Span {
            start: Position::null(),
            end: Position::null(),
        }
    }

    pub fn line(&self) -> u32 {
        self.start.line
    }
}

/// Finds the line containing a byte offset.
///
/// # Returns
///
/// `(line_number, line_text, offset_within_line)`, or `None` when the
/// offset lies outside of the source.
pub fn get_line_at_position(source: &str, position: u32) -> Option<(usize, String, usize)> {
    let pos = position as usize;

    if pos > source.len() {
        return None;
    }

    let mut start = 0;
    let mut line_number = 1;

    for line in source.split_inclusive('\n') {
        let end = start + line.len();

        if (start..end).contains(&pos) {
            return Some((line_number, line.to_string(), pos - start));
        }

        start = end;
        line_number += 1;
    }

    // Offset of the trailing EOF token
    let last = source.lines().last().unwrap_or("").to_string();
    Some((line_number.max(2) - 1, last.clone(), last.len()))
}

/// Renders a front-end error with the offending line and a caret.
pub fn format_error(error: &Error, file: &Path, source: &str) -> String {
    /*
        Error: UnexpectedToken (...)
        -> main.py
           |
        20 | x = (1 +
           | ---------^
    */
    let mut out = String::new();

    if let ErrorTip::None = error.get_tip() {
        let _ = writeln!(out, "Error: {}", error.get_error_name());
    } else {
        let _ = writeln!(out, "Error: {} ({})", error.get_error_name(), error.get_tip());
    }
    let _ = writeln!(out, "-> {}", file.as_os_str().to_string_lossy());

    let Some((line, line_text, line_pos)) = get_line_at_position(source, error.get_position().offset)
    else {
        return out;
    };

    let line_string = line.to_string();
    let padding = line_string.len() + 2;

    let _ = writeln!(out, "{:>padding$}", "|");

    let (line_text_removed, removed_whitespace) = remove_starting_whitespace(&line_text);
    let _ = writeln!(out, "{} | {}", line_string, line_text_removed.trim_end());

    let arrows = line_pos.saturating_sub(removed_whitespace) + 1;

    let _ = writeln!(out, "{:>padding$} {:->arrows$}", "|", "^");
    out
}

pub fn display_error(error: &Error, file: &Path, source: &str) {
    eprint!("{}", format_error(error, file, source));
}

fn remove_starting_whitespace(string: &str) -> (String, usize) {
    let start = string.chars().take_while(|c| *c == ' ').count();

    (String::from(&string[start..]), start)
}

#[cfg(test)]
mod tests {
    use std::{path::PathBuf, rc::Rc};

    use crate::{
        errors::errors::{Error, ErrorImpl},
        Position,
    };

    #[test]
    fn test_get_line_at_position() {
        let source = "Hello, world!\nsecond\n\nTesting { }\n";
        let (line_number, line, line_pos) = super::get_line_at_position(source, 10).unwrap();
        assert_eq!(line_number, 1);
        assert_eq!(line, "Hello, world!\n");
        assert_eq!(line_pos, 10);

        let (line_number, line, line_pos) = super::get_line_at_position(source, 30).unwrap();
        assert_eq!(line_number, 4);
        assert_eq!(line, "Testing { }\n");
        assert_eq!(line_pos, 8);
    }

    #[test]
    fn test_get_line_out_of_range() {
        assert!(super::get_line_at_position("abc", 10).is_none());
    }

    #[test]
    fn test_format_error_points_at_column() {
        let source = "x = 1\ny = $\n";
        let error = Error::new(
            ErrorImpl::UnrecognisedToken {
                token: "$".to_string(),
            },
            Position::new(10, 2, 4, Rc::new("main.py".to_string())),
        );
        let rendered = super::format_error(&error, &PathBuf::from("main.py"), source);

        assert!(rendered.starts_with("Error: UnrecognisedToken"));
        assert!(rendered.contains("2 | y = $"));
        assert!(rendered.contains("| ----^"));
    }
}

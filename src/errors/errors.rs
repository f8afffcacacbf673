use std::fmt::Display;

use thiserror::Error;

use crate::Position;

#[derive(Debug, Clone)]
pub struct Error {
    internal_error: ErrorImpl,
    position: Position,
}

impl Error {
    pub fn new(error_impl: ErrorImpl, position: Position) -> Self {
        Error {
            internal_error: error_impl,
            position,
        }
    }

    pub fn get_position(&self) -> &Position {
        &self.position
    }

    pub fn get_error_name(&self) -> &str {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => "UnrecognisedToken",
            ErrorImpl::UnexpectedToken { .. } => "UnexpectedToken",
            ErrorImpl::UnexpectedTokenDetailed { .. } => "UnexpectedTokenDetailed",
            ErrorImpl::NumberParseError { .. } => "NumberParseError",
            ErrorImpl::InconsistentDedent { .. } => "InconsistentDedent",
            ErrorImpl::UnterminatedString => "UnterminatedString",
            ErrorImpl::UnsupportedTarget { .. } => "UnsupportedTarget",
            ErrorImpl::UnsupportedConstruct { .. } => "UnsupportedConstruct",
            ErrorImpl::CantSetAttribute { .. } => "CantSetAttribute",
        }
    }

    pub fn get_tip(&self) -> ErrorTip {
        match &self.internal_error {
            ErrorImpl::UnrecognisedToken { .. } => ErrorTip::None,
            ErrorImpl::UnexpectedToken { token } => ErrorTip::Suggestion(format!(
                "Unexpected token: `{}`, is a bracket or colon missing?",
                token
            )),
            ErrorImpl::UnexpectedTokenDetailed { token, message } => {
                ErrorTip::Suggestion(format!("Unexpected token: `{}`, {}", token, message))
            }
            ErrorImpl::NumberParseError { token } => {
                ErrorTip::Suggestion(format!("Invalid number literal: `{}`", token))
            }
            ErrorImpl::InconsistentDedent { width } => ErrorTip::Suggestion(format!(
                "Dedent to column {} does not match any outer indentation level",
                width
            )),
            ErrorImpl::UnterminatedString => {
                ErrorTip::Suggestion(String::from("String literal is never closed"))
            }
            ErrorImpl::UnsupportedTarget { target } => {
                ErrorTip::Suggestion(format!("Cannot assign to `{}`", target))
            }
            ErrorImpl::UnsupportedConstruct { construct } => {
                ErrorTip::Suggestion(format!("`{}` is not modelled by the checker", construct))
            }
            ErrorImpl::CantSetAttribute { attribute, type_ } => ErrorTip::Suggestion(format!(
                "Attribute `{}` cannot be written on builtin type `{}`",
                attribute, type_
            )),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} at {}:{}:{}",
            self.internal_error, self.position.file, self.position.line, self.position.column
        )
    }
}

pub enum ErrorTip {
    None,
    Suggestion(String),
}

impl Display for ErrorTip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorTip::None => write!(f, ""),
            ErrorTip::Suggestion(suggestion) => write!(f, "{}", suggestion),
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ErrorImpl {
    #[error("unrecognised token: {token:?}")]
    UnrecognisedToken { token: String },
    #[error("unexpected token: {token:?}")]
    UnexpectedToken { token: String },
    #[error("unexpected token ({message:?}): {token:?}")]
    UnexpectedTokenDetailed { token: String, message: String },
    #[error("error parsing number: {token:?}")]
    NumberParseError { token: String },
    #[error("inconsistent dedent to width {width}")]
    InconsistentDedent { width: usize },
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unsupported assignment target {target:?}")]
    UnsupportedTarget { target: String },
    #[error("unsupported construct {construct:?}")]
    UnsupportedConstruct { construct: String },
    #[error("can't set attribute {attribute:?} of builtin type {type_}")]
    CantSetAttribute { attribute: String, type_: String },
}

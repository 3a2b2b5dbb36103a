//! Line templates of the formatters.
//!
//! A template is a plain string with `{time}`, `{level}`, `{target}` and `{message}`
//! placeholders. Literal braces are written as `{{` and `}}`. The template is parsed once, when
//! the configuration is built, so a broken one is refused before it can be installed.

use std::fmt::{Arguments, Display, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use log::Record;

use crate::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
enum Piece {
    Literal(String),
    Time,
    Level,
    Target,
    Message,
}

/// A parsed formatter: the line template together with the date format for `{time}`.
#[derive(Clone, Debug)]
pub(crate) struct Template {
    pieces: Vec<Piece>,
    datefmt: String,
}

impl Template {
    pub(crate) fn parse(format: &str, datefmt: &str) -> Result<Self, Error> {
        let bad_format = |reason: &str| Error::Format {
            format: format.to_owned(),
            reason: reason.to_owned(),
        };
        if StrftimeItems::new(datefmt).any(|item| matches!(item, Item::Error)) {
            return Err(Error::DateFormat(datefmt.to_owned()));
        }

        let mut pieces = Vec::new();
        let mut literal = String::new();
        let mut chars = format.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => return Err(bad_format("unclosed placeholder")),
                        }
                    }
                    let piece = match name.as_str() {
                        "time" => Piece::Time,
                        "level" => Piece::Level,
                        "target" => Piece::Target,
                        "message" => Piece::Message,
                        _ => return Err(bad_format(&format!("unknown placeholder {{{}}}", name))),
                    };
                    if !literal.is_empty() {
                        pieces.push(Piece::Literal(literal.split_off(0)));
                    }
                    pieces.push(piece);
                }
                '}' => return Err(bad_format("unmatched }")),
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        Ok(Self {
            pieces,
            datefmt: datefmt.to_owned(),
        })
    }

    pub(crate) fn render(&self, message: &Arguments, record: &Record) -> String {
        self.render_with(message, &record.level(), record.target())
    }

    fn render_with(&self, message: &dyn Display, level: &dyn Display, target: &str) -> String {
        let mut line = String::new();
        for piece in &self.pieces {
            // Writing into a String can't fail.
            let _ = match piece {
                Piece::Literal(text) => write!(line, "{}", text),
                Piece::Time => write!(line, "{}", Local::now().format(&self.datefmt)),
                Piece::Level => write!(line, "{}", level),
                Piece::Target => write!(line, "{}", target),
                Piece::Message => write!(line, "{}", message),
            };
        }
        line
    }
}

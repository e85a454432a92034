//! Parser for the marsh pipeline grammar.
//!
//! Builds a [`Line`] from the token stream:
//!
//! ```text
//! line     := pipeline { (';' | '&') pipeline }
//! pipeline := stage { '|' stage }
//! stage    := ( word | redirect )*
//! redirect := ('<' | '>' | '>>') word
//! ```
//!
//! `&` marks the pipeline it terminates as background. A stage with no
//! words is representable (it stands for a leading or trailing pipe
//! placeholder); [`check_line`] rejects a multi-stage pipeline containing
//! one, before anything is executed.

use marsh_types::ast::{Command, Line, Pipeline, Redirect, RedirectKind};

use crate::error::KernelError;
use crate::lexer::{tokenize, Token};

/// Parse one input line into pipelines.
///
/// Segments that contain nothing at all (`;;`, a trailing `;` or `&`, a
/// blank line) are dropped rather than represented as empty pipelines.
pub fn parse_line(input: &str) -> Result<Line, KernelError> {
    let tokens = tokenize(input)?;

    let mut pipelines = Vec::new();
    let mut stages: Vec<Command> = Vec::new();
    let mut current = Command::default();
    let mut it = tokens.into_iter();

    while let Some(token) = it.next() {
        match token {
            Token::Word(word) => {
                current.argv.push(word);
            }
            Token::RedirectIn | Token::RedirectOut | Token::Append => {
                let kind = match token {
                    Token::RedirectIn => RedirectKind::Input,
                    Token::RedirectOut => RedirectKind::Output,
                    _ => RedirectKind::Append,
                };
                let Some(Token::Word(target)) = it.next() else {
                    return Err(KernelError::Syntax);
                };
                current.redirects.push(Redirect::new(kind, target));
            }
            Token::Pipe => {
                stages.push(std::mem::take(&mut current));
            }
            Token::Semi | Token::Amp => {
                stages.push(std::mem::take(&mut current));
                let segment = std::mem::take(&mut stages);
                if let Some(pipeline) = finish_segment(segment, token == Token::Amp) {
                    pipelines.push(pipeline);
                }
            }
        }
    }

    stages.push(current);
    if let Some(pipeline) = finish_segment(stages, false) {
        pipelines.push(pipeline);
    }

    Ok(Line { pipelines })
}

/// Turn an accumulated segment into a pipeline, or `None` if the segment
/// held nothing (a single stage with no words and no redirections).
fn finish_segment(commands: Vec<Command>, background: bool) -> Option<Pipeline> {
    if commands.len() == 1 && commands[0].argv.is_empty() && commands[0].redirects.is_empty() {
        return None;
    }
    Some(Pipeline {
        commands,
        background,
    })
}

/// Pre-execution well-formedness check.
///
/// A multi-stage pipeline containing a syntactically-empty stage (for
/// example `a | | b` or `a |`) is malformed; the whole line is rejected
/// and nothing on it is executed. A single empty stage is fine — the
/// engine skips it.
pub fn check_line(line: &Line) -> bool {
    line.pipelines
        .iter()
        .all(|pl| pl.commands.len() <= 1 || pl.commands.iter().all(|c| !c.is_empty()))
}

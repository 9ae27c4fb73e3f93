//! Parser for the compact schedule language.
//!
//! A schedule is a whitespace-separated list of terms:
//!
//! ```text
//! r1(TB1.P1.TU1) w2(TB1.P1.TU1) u3(TB2) c1 c2 c3
//! ```
//!
//! `r`/`w`/`u` take a transaction id and a parenthesised resource; `c`
//! takes only a transaction id.  The parser produces typed
//! [`Operation`](crate::scheduler::Operation) values and knows nothing
//! about the locking core.

use crate::scheduler::{OpKind, Operation};

// ---------------------------------------------------------------------------
//  Parser
// ---------------------------------------------------------------------------

/// Parse a schedule string into its ordered operation sequence.
pub fn parse_schedule(input: &str) -> Result<Vec<Operation>, ParseError> {
    input.split_whitespace().map(parse_term).collect()
}

fn parse_term(term: &str) -> Result<Operation, ParseError> {
    let mut chars = term.chars();
    let kind = match chars.next() {
        Some('r') => OpKind::Read,
        Some('w') => OpKind::Write,
        Some('u') => OpKind::Update,
        Some('c') => OpKind::Commit,
        _ => {
            return Err(ParseError::UnknownOperation {
                term: term.to_string(),
            })
        }
    };

    let rest = &term[1..];
    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return Err(ParseError::MissingTransactionId {
            term: term.to_string(),
        });
    }
    let tx: u64 = rest[..digits_end]
        .parse()
        .map_err(|_| ParseError::InvalidTransactionId {
            term: term.to_string(),
        })?;

    let tail = &rest[digits_end..];
    let resource = if tail.is_empty() {
        None
    } else {
        let inner = tail
            .strip_prefix('(')
            .and_then(|t| t.strip_suffix(')'))
            .filter(|t| !t.is_empty() && !t.contains('('))
            .ok_or_else(|| ParseError::MalformedResource {
                term: term.to_string(),
            })?;
        Some(inner.to_string())
    };

    match (kind, &resource) {
        (OpKind::Commit, Some(_)) => Err(ParseError::UnexpectedResource {
            term: term.to_string(),
        }),
        (OpKind::Commit, None) => Ok(Operation::commit(tx)),
        (_, None) => Err(ParseError::MissingResource {
            term: term.to_string(),
        }),
        (_, Some(_)) => Ok(Operation { kind, tx, resource }),
    }
}

// ---------------------------------------------------------------------------
//  Errors
// ---------------------------------------------------------------------------

/// Errors from parsing a schedule string.
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum ParseError {
    /// The term does not start with `r`, `w`, `u`, or `c`.
    #[error("unknown operation in '{term}'")]
    UnknownOperation { term: String },
    /// No transaction id follows the operation letter.
    #[error("missing transaction id in '{term}'")]
    MissingTransactionId { term: String },
    /// The transaction id does not fit a u64.
    #[error("invalid transaction id in '{term}'")]
    InvalidTransactionId { term: String },
    /// The resource part is not a well-formed `(name)` group.
    #[error("malformed resource in '{term}'")]
    MalformedResource { term: String },
    /// A read/update/write term without a resource.
    #[error("missing resource in '{term}'")]
    MissingResource { term: String },
    /// A commit term with a resource.
    #[error("unexpected resource in '{term}'")]
    UnexpectedResource { term: String },
}

// ---------------------------------------------------------------------------
//  Tests
// ---------------------------------------------------------------------------

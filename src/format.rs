//! Parsing of the Spinel type-language format strings (spec §3) into a
//! small AST, precompiled once per property rather than re-scanned on
//! every decode (see spec §9, "Recursive format parsing -> precompile").

use crate::error::{SpinelError, SpinelResult};

/// One element of a parsed format string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FormatElem {
    /// `b`
    Bool,
    /// `C`
    U8,
    /// `c`
    I8,
    /// `S`
    U16,
    /// `s`
    I16,
    /// `L`
    U32,
    /// `l`
    I32,
    /// `X`
    U64,
    /// `i`
    Varint,
    /// `6`
    Ipv6,
    /// `E`
    Eui64,
    /// `e`
    Eui48,
    /// `U`
    Utf8,
    /// `D`
    Remainder,
    /// `d`
    Data,
    /// `t(...)`
    Struct(Format),
    /// `A(...)`
    Array(Format),
}

/// A parsed format string: an ordered sequence of elements.
pub type Format = Vec<FormatElem>;

/// A precompiled format descriptor, cached by the property registry so
/// the grammar is parsed once rather than on every decode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    elems: Format,
}

impl FormatDescriptor {
    /// Parses `fmt` into a descriptor, validating the structural
    /// constraint that `D` and `A(...)` may only appear last in any
    /// enclosing scope.
    pub fn parse(fmt: &str) -> SpinelResult<Self> {
        let mut chars = fmt.chars().peekable();
        let elems = parse_sequence(&mut chars, false)?;
        if chars.peek().is_some() {
            return Err(SpinelError::BadFormat("unbalanced parentheses in format string"));
        }
        Ok(Self { elems })
    }

    /// Borrows the parsed element sequence.
    pub fn elems(&self) -> &[FormatElem] {
        &self.elems
    }
}

fn parse_sequence(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    in_parens: bool,
) -> SpinelResult<Format> {
    let mut seq = Format::new();
    loop {
        match chars.peek() {
            None => {
                if in_parens {
                    return Err(SpinelError::BadFormat("unbalanced parentheses in format string"));
                }
                break;
            }
            Some(')') => {
                if in_parens {
                    chars.next();
                    break;
                }
                return Err(SpinelError::BadFormat("unbalanced parentheses in format string"));
            }
            Some(_) => seq.push(parse_one(chars)?),
        }
    }
    validate_last_only(&seq)?;
    Ok(seq)
}

fn parse_one(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> SpinelResult<FormatElem> {
    let c = chars.next().expect("peeked Some above");
    Ok(match c {
        'b' => FormatElem::Bool,
        'C' => FormatElem::U8,
        'c' => FormatElem::I8,
        'S' => FormatElem::U16,
        's' => FormatElem::I16,
        'L' => FormatElem::U32,
        'l' => FormatElem::I32,
        'X' => FormatElem::U64,
        'i' => FormatElem::Varint,
        '6' => FormatElem::Ipv6,
        'E' => FormatElem::Eui64,
        'e' => FormatElem::Eui48,
        'U' => FormatElem::Utf8,
        'D' => FormatElem::Remainder,
        'd' => FormatElem::Data,
        't' => {
            expect_open(chars)?;
            FormatElem::Struct(parse_sequence(chars, true)?)
        }
        'A' => {
            expect_open(chars)?;
            FormatElem::Array(parse_sequence(chars, true)?)
        }
        _ => return Err(SpinelError::BadFormat("unknown format code")),
    })
}

fn expect_open(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> SpinelResult<()> {
    match chars.next() {
        Some('(') => Ok(()),
        _ => Err(SpinelError::BadFormat("expected '(' after 't' or 'A'")),
    }
}

/// `D` and `A(...)` consume to end-of-scope, so they are only meaningful
/// as the last element of their enclosing format.
fn validate_last_only(seq: &[FormatElem]) -> SpinelResult<()> {
    let last = seq.len().saturating_sub(1);
    for (i, elem) in seq.iter().enumerate() {
        if i == last {
            continue;
        }
        if matches!(elem, FormatElem::Remainder | FormatElem::Array(_)) {
            return Err(SpinelError::BadFormat(
                "'D' or 'A(...)' must be the last element of their enclosing format",
            ));
        }
    }
    Ok(())
}

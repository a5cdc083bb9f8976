//! The instruction grammar (spec.md §6) and a small, forgiving line parser.
//!
//! This plays the role the teacher's `lexer`/`parser` modules play for SQL,
//! scaled to the much smaller grammar here: eight instruction kinds instead
//! of a SQL dialect.

use crate::error::{RepCrecError, Result};
use crate::site::SiteId;
use crate::transaction::TranId;
use crate::variable::VarId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Begin(TranId),
    BeginRO(TranId),
    Read(TranId, VarId),
    Write(TranId, VarId, i64),
    End(TranId),
    Fail(SiteId),
    Recover(SiteId),
    Dump,
}

/// Parse one instruction line.
///
/// Returns `Ok(None)` for blank lines and `#`-prefixed comments — a
/// convenience beyond spec.md §6, useful for hand-written test fixtures.
/// Whitespace inside the parens is ignored, per spec.md §6.
pub fn parse_line(line: &str) -> Result<Option<Instruction>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let open = line
        .find('(')
        .ok_or_else(|| RepCrecError::Parse(format!("missing '(': {}", line)))?;
    let close = line
        .rfind(')')
        .ok_or_else(|| RepCrecError::Parse(format!("missing ')': {}", line)))?;
    if close < open {
        return Err(RepCrecError::Parse(format!("malformed instruction: {}", line)));
    }

    let name = line[..open].trim();
    let args: Vec<&str> = line[open + 1..close]
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    match name {
        "begin" => Ok(Some(Instruction::Begin(parse_tran(arg(&args, 0, name)?)?))),
        "beginRO" => Ok(Some(Instruction::BeginRO(parse_tran(arg(&args, 0, name)?)?))),
        "R" => Ok(Some(Instruction::Read(
            parse_tran(arg(&args, 0, name)?)?,
            parse_var(arg(&args, 1, name)?)?,
        ))),
        "W" => Ok(Some(Instruction::Write(
            parse_tran(arg(&args, 0, name)?)?,
            parse_var(arg(&args, 1, name)?)?,
            arg(&args, 2, name)?
                .parse::<i64>()
                .map_err(|_| RepCrecError::Parse(format!("bad value in: {}", line)))?,
        ))),
        "end" => Ok(Some(Instruction::End(parse_tran(arg(&args, 0, name)?)?))),
        "fail" => Ok(Some(Instruction::Fail(parse_site(arg(&args, 0, name)?)?))),
        "recover" => Ok(Some(Instruction::Recover(parse_site(arg(&args, 0, name)?)?))),
        "dump" => Ok(Some(Instruction::Dump)),
        other => Err(RepCrecError::Parse(format!("unknown instruction: {}", other))),
    }
}

fn arg<'a>(args: &[&'a str], idx: usize, name: &str) -> Result<&'a str> {
    args.get(idx)
        .copied()
        .ok_or_else(|| RepCrecError::Parse(format!("{} missing argument {}", name, idx)))
}

fn parse_tran(s: &str) -> Result<TranId> {
    let s = s.strip_prefix('T').unwrap_or(s);
    s.parse::<TranId>()
        .map_err(|_| RepCrecError::Parse(format!("bad transaction id: {}", s)))
}

fn parse_var(s: &str) -> Result<VarId> {
    let s = s.strip_prefix('x').unwrap_or(s);
    s.parse::<VarId>()
        .map_err(|_| RepCrecError::Parse(format!("bad variable id: {}", s)))
}

fn parse_site(s: &str) -> Result<SiteId> {
    s.parse::<SiteId>()
        .map_err(|_| RepCrecError::Parse(format!("bad site id: {}", s)))
}

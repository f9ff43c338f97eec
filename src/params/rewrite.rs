use crate::error::MssqlExecError;
use crate::types::Parameter;

/// Rewrite named `@placeholder` markers to the driver's positional `@PN`
/// form, and return the parameter order the rewritten statement expects.
///
/// Scanning is quote- and comment-aware: placeholders inside string literals,
/// `[bracketed]` identifiers, `--` line comments, and (nested) `/* */` block
/// comments are left alone, as are `@@` system variables.
///
/// Every named placeholder must have exactly one matching parameter entry.
/// Parameters the statement never references are appended after the
/// referenced ones in declaration order, so positional stored-procedure calls
/// work with the same request shape.
///
/// # Errors
///
/// Returns `MssqlExecError::ParameterError` when a placeholder has no
/// matching parameter.
pub fn rewrite_named(
    statement: &str,
    params: &[Parameter],
) -> Result<(String, Vec<usize>), MssqlExecError> {
    let bytes = statement.as_bytes();
    let mut out = String::with_capacity(statement.len());
    let mut order: Vec<usize> = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;
    // Start of the span not yet flushed to `out`. Everything except the
    // placeholders themselves is copied through as untouched slices, so
    // multi-byte text survives byte for byte.
    let mut copied = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'[' => state = State::Bracketed,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                    state = State::LineComment;
                    idx += 1;
                }
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'@' if bytes.get(idx + 1) == Some(&b'@') => {
                    // system variable like @@ROWCOUNT
                    idx += 1;
                }
                b'@' => {
                    let name_end = scan_identifier(bytes, idx + 1);
                    if name_end > idx + 1 {
                        let name = &statement[idx + 1..name_end];
                        let position = resolve_placeholder(name, params, &mut order)?;
                        out.push_str(&statement[copied..idx]);
                        out.push_str("@P");
                        out.push_str(&position.to_string());
                        copied = name_end;
                        idx = name_end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    if bytes.get(idx + 1) == Some(&b']') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
        }
        idx += 1;
    }
    out.push_str(&statement[copied..]);

    // Parameters never referenced by the statement still bind, in
    // declaration order after the referenced ones.
    for (i, _) in params.iter().enumerate() {
        if !order.contains(&i) {
            order.push(i);
        }
    }

    Ok((out, order))
}

enum State {
    Normal,
    SingleQuoted,
    Bracketed,
    LineComment,
    BlockComment(u32),
}

fn scan_identifier(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    while idx < bytes.len() {
        let b = bytes[idx];
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b == b'#' {
            idx += 1;
        } else {
            break;
        }
    }
    idx
}

fn resolve_placeholder(
    name: &str,
    params: &[Parameter],
    order: &mut Vec<usize>,
) -> Result<usize, MssqlExecError> {
    let param_idx = params
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            MssqlExecError::ParameterError(format!("no parameter supplied for placeholder '@{name}'"))
        })?;

    // Repeated references to one name reuse its position.
    let position = match order.iter().position(|&i| i == param_idx) {
        Some(existing) => existing + 1,
        None => {
            order.push(param_idx);
            order.len()
        }
    };
    Ok(position)
}

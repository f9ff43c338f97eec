/// The two execution paths an `Auto`-kind call can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementShape {
    /// Drains a result set (Reader semantics).
    Rows,
    /// Reports an affected-row count (NonQuery semantics).
    Mutation,
}

/// Classify a statement by its first significant keyword, skipping
/// whitespace, `--` line comments, and (nested) `/* */` block comments.
///
/// SELECT and WITH take the Reader path; INSERT/UPDATE/DELETE/MERGE/TRUNCATE
/// take the NonQuery path. Everything else (EXEC, DECLARE, multi-statement
/// batches, OUTPUT clauses) takes the Reader path, which degrades gracefully
/// to an empty result set when nothing is produced.
#[must_use]
pub fn classify_statement(sql: &str) -> StatementShape {
    match leading_keyword(sql).as_deref() {
        Some("INSERT" | "UPDATE" | "DELETE" | "MERGE" | "TRUNCATE") => StatementShape::Mutation,
        _ => StatementShape::Rows,
    }
}

/// Whether the statement carries an `OUTPUT` clause outside literals,
/// bracketed identifiers, and comments. Mutations with one produce a result
/// set and must stay on the query path.
#[must_use]
pub fn has_output_clause(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        match bytes[idx] {
            b'\'' => {
                idx += 1;
                while idx < bytes.len() {
                    if bytes[idx] == b'\'' {
                        if bytes.get(idx + 1) == Some(&b'\'') {
                            idx += 2;
                            continue;
                        }
                        break;
                    }
                    idx += 1;
                }
            }
            b'[' => {
                while idx < bytes.len() && bytes[idx] != b']' {
                    idx += 1;
                }
            }
            b'-' if bytes.get(idx + 1) == Some(&b'-') => {
                while idx < bytes.len() && bytes[idx] != b'\n' {
                    idx += 1;
                }
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                idx += 2;
                while idx < bytes.len() {
                    if bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                        idx += 1;
                        break;
                    }
                    idx += 1;
                }
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = idx;
                while idx < bytes.len()
                    && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_')
                {
                    idx += 1;
                }
                if sql[start..idx].eq_ignore_ascii_case("OUTPUT") {
                    return true;
                }
                continue;
            }
            _ => {}
        }
        idx += 1;
    }
    false
}

fn leading_keyword(sql: &str) -> Option<String> {
    let bytes = sql.as_bytes();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        if b.is_ascii_whitespace() || b == b';' {
            idx += 1;
        } else if b == b'-' && bytes.get(idx + 1) == Some(&b'-') {
            while idx < bytes.len() && bytes[idx] != b'\n' {
                idx += 1;
            }
        } else if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
            let mut depth = 1u32;
            idx += 2;
            while idx < bytes.len() && depth > 0 {
                if bytes[idx] == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                    depth += 1;
                    idx += 2;
                } else if bytes[idx] == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    depth -= 1;
                    idx += 2;
                } else {
                    idx += 1;
                }
            }
        } else {
            break;
        }
    }

    let start = idx;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphabetic() || bytes[idx] == b'_') {
        idx += 1;
    }
    if idx == start {
        None
    } else {
        Some(sql[start..idx].to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_statements_classify() {
        assert_eq!(classify_statement("SELECT * FROM t"), StatementShape::Rows);
        assert_eq!(
            classify_statement("with x as (select 1) select * from x"),
            StatementShape::Rows
        );
        assert_eq!(
            classify_statement("INSERT INTO t VALUES (1)"),
            StatementShape::Mutation
        );
        assert_eq!(
            classify_statement("update t set a = 1"),
            StatementShape::Mutation
        );
        assert_eq!(classify_statement("DELETE FROM t"), StatementShape::Mutation);
        assert_eq!(
            classify_statement("MERGE t USING s ON 1=0 WHEN NOT MATCHED THEN INSERT DEFAULT VALUES;"),
            StatementShape::Mutation
        );
    }

    #[test]
    fn comments_and_padding_are_skipped() {
        assert_eq!(
            classify_statement("  -- comment\n /* insert */ SELECT 1"),
            StatementShape::Rows
        );
        assert_eq!(
            classify_statement("/* outer /* nested */ still */ DELETE FROM t"),
            StatementShape::Mutation
        );
    }

    #[test]
    fn output_clauses_are_detected_outside_literals() {
        assert!(has_output_clause(
            "INSERT INTO t (a) OUTPUT INSERTED.id VALUES (@a)"
        ));
        assert!(has_output_clause("delete from t output deleted.* where x = 1"));
        assert!(!has_output_clause("UPDATE t SET a = 'OUTPUT' WHERE x = 1"));
        assert!(!has_output_clause("DELETE FROM [output] WHERE x = 1"));
        assert!(!has_output_clause("UPDATE t SET a = 1 -- OUTPUT\nWHERE x = 1"));
        assert!(!has_output_clause("/* OUTPUT */ UPDATE t SET a = 1"));
        assert!(!has_output_clause("UPDATE t SET output_total = 1"));
    }

    #[test]
    fn unknown_shapes_take_the_reader_path() {
        assert_eq!(classify_statement("EXEC dbo.report"), StatementShape::Rows);
        assert_eq!(classify_statement("DECLARE @x INT"), StatementShape::Rows);
        assert_eq!(classify_statement(""), StatementShape::Rows);
    }
}

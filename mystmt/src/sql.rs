//! Sql string operation.

/// Returns `true` if the text holds more than one statement.
///
/// A `;` counts as a separator when it is outside quotes, backticks and
/// comments, and is followed by anything other than blanks, comments or
/// more `;`.
pub(crate) fn is_multi_statement(sql: &str) -> bool {
    let sql = sql.as_bytes();
    let mut separated = false;
    let mut i = 0;

    while let Some(&b) = sql.get(i) {
        match b {
            b'\'' | b'"' | b'`' => {
                if separated {
                    return true;
                }
                i = skip_quoted(sql, i);
                continue;
            }
            b'#' => {
                i = skip_line(sql, i);
                continue;
            }
            b'-' if sql.get(i + 1) == Some(&b'-')
                && sql.get(i + 2).is_none_or(|b| b.is_ascii_whitespace() || b.is_ascii_control()) =>
            {
                i = skip_line(sql, i);
                continue;
            }
            b'/' if sql.get(i + 1) == Some(&b'*') => {
                i = skip_block(sql, i);
                continue;
            }
            b';' => separated = true,
            b if b.is_ascii_whitespace() => { },
            _ if separated => return true,
            _ => { },
        }
        i += 1;
    }

    false
}

/// Index after the closing quote.
fn skip_quoted(sql: &[u8], start: usize) -> usize {
    let quote = sql[start];
    let mut i = start + 1;
    while let Some(&b) = sql.get(i) {
        match b {
            b'\\' if quote != b'`' => i += 2,
            // doubled quote is an escaped quote
            b if b == quote && sql.get(i + 1) == Some(&quote) => i += 2,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    sql.len()
}

fn skip_line(sql: &[u8], start: usize) -> usize {
    match sql[start..].iter().position(|&b| b == b'\n') {
        Some(end) => start + end + 1,
        None => sql.len(),
    }
}

fn skip_block(sql: &[u8], start: usize) -> usize {
    match sql[start + 2..].windows(2).position(|w| w == b"*/") {
        Some(end) => start + 2 + end + 2,
        None => sql.len(),
    }
}

#[cfg(test)]
mod test {
    use super::is_multi_statement as multi;

    #[test]
    fn single_statement() {
        assert!(!multi("SELECT 1"));
        assert!(!multi("SELECT 1;"));
        assert!(!multi("SELECT 1 ;  \n ;"));
        assert!(!multi("SELECT ';' FROM t"));
        assert!(!multi("SELECT `a;b` FROM t -- ; DROP"));
        assert!(!multi("SELECT 1; /* trailing */ # done"));
        assert!(!multi("SELECT 'it''s; fine', \"x\\\";\""));
    }

    #[test]
    fn multiple_statements() {
        assert!(multi("SELECT 1; SELECT 2"));
        assert!(multi("DROP TABLE t;DROP TABLE u"));
        assert!(multi("SELECT 1; 'x'"));
        assert!(multi("SELECT 1; /* c */ SELECT 2"));
    }
}

//! Splitting SQL scripts into individual statements.
//!
//! Statements end at a top-level `;`. Semicolons inside string literals,
//! quoted identifiers, dollar-quoted bodies and comments do not count.
//! Statements that contain nothing but whitespace and comments are dropped.

/// Splits `sql` into trimmed statements without their terminating `;`.
pub fn split_statements(sql: &str) -> Vec<&str> {
    let bytes = sql.as_bytes();
    let mut statements = Vec::new();
    let mut start = 0;
    let mut has_code = false;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(bytes.len(), |n| i + n + 1);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = skip_block_comment(bytes, i);
                continue;
            }
            b'\'' => {
                let escapes = i > 0
                    && matches!(bytes[i - 1], b'E' | b'e')
                    && (i < 2 || !is_ident(bytes[i - 2]));
                i = skip_quoted(bytes, i, b'\'', escapes);
                has_code = true;
                continue;
            }
            b'"' => {
                i = skip_quoted(bytes, i, b'"', false);
                has_code = true;
                continue;
            }
            b'$' => {
                if let Some(tag_end) = dollar_tag_end(bytes, i) {
                    let tag = &sql[i..=tag_end];
                    let body = tag_end + 1;
                    i = sql[body..].find(tag).map_or(bytes.len(), |n| body + n + tag.len());
                    has_code = true;
                    continue;
                }
                has_code = true;
            }
            b';' => {
                if has_code {
                    statements.push(sql[start..i].trim());
                }
                start = i + 1;
                has_code = false;
            }
            c if !c.is_ascii_whitespace() => has_code = true,
            _ => {}
        }
        i += 1;
    }

    if has_code {
        statements.push(sql[start..].trim());
    }
    statements
}

fn is_ident(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_' || c == b'$'
}

/// Returns the index just past the closing quote. A doubled quote is an
/// escaped quote; with `escapes`, so is a backslash-prefixed one.
fn skip_quoted(bytes: &[u8], open: usize, quote: u8, escapes: bool) -> usize {
    let mut j = open + 1;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' if escapes => j += 2,
            c if c == quote => {
                if bytes.get(j + 1) == Some(&quote) {
                    j += 2;
                } else {
                    return j + 1;
                }
            }
            _ => j += 1,
        }
    }
    bytes.len()
}

/// Block comments nest.
fn skip_block_comment(bytes: &[u8], open: usize) -> usize {
    let mut depth = 0usize;
    let mut j = open;
    while j + 1 < bytes.len() {
        match (bytes[j], bytes[j + 1]) {
            (b'/', b'*') => {
                depth += 1;
                j += 2;
            }
            (b'*', b'/') => {
                depth -= 1;
                j += 2;
                if depth == 0 {
                    return j;
                }
            }
            _ => j += 1,
        }
    }
    bytes.len()
}

/// If a dollar-quote tag (`$$` or `$name$`) opens at `open`, returns the
/// index of its closing `$`. Positional parameters like `$1` are not tags.
fn dollar_tag_end(bytes: &[u8], open: usize) -> Option<usize> {
    if open > 0 && is_ident(bytes[open - 1]) {
        return None;
    }
    let mut j = open + 1;
    if bytes.get(j).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    while let Some(&c) = bytes.get(j) {
        match c {
            b'$' => return Some(j),
            c if c.is_ascii_alphanumeric() || c == b'_' => j += 1,
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_top_level_semicolons() {
        let sql = "CREATE TABLE a (id int);\n\nINSERT INTO a VALUES (1);\nSELECT 1";
        assert_eq!(
            split_statements(sql),
            ["CREATE TABLE a (id int)", "INSERT INTO a VALUES (1)", "SELECT 1"]
        );
    }

    #[test]
    fn drops_empty_and_comment_only_statements() {
        let sql = ";;\n-- nothing here;\n/* or; here */;\nSELECT 1;\n-- trailing";
        assert_eq!(split_statements(sql), ["SELECT 1"]);
    }

    #[test]
    fn ignores_semicolons_in_literals_and_identifiers() {
        let sql = r#"INSERT INTO "odd;name" VALUES ('a;b', 'it''s;'); SELECT E'x\';y'; SELECT 2"#;
        assert_eq!(
            split_statements(sql),
            [
                r#"INSERT INTO "odd;name" VALUES ('a;b', 'it''s;')"#,
                r"SELECT E'x\';y'",
                "SELECT 2",
            ]
        );
    }

    #[test]
    fn keeps_dollar_quoted_bodies_whole() {
        let sql = "CREATE FUNCTION f() RETURNS int AS $$ SELECT 1; $$ LANGUAGE sql;\n\
                   DO $body$ BEGIN PERFORM 1; END $body$;\n\
                   PREPARE p AS SELECT $1::int;";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 3);
        assert!(statements[0].ends_with("LANGUAGE sql"));
        assert_eq!(statements[1], "DO $body$ BEGIN PERFORM 1; END $body$");
        assert_eq!(statements[2], "PREPARE p AS SELECT $1::int");
    }

    #[test]
    fn block_comments_nest() {
        let sql = "/* outer /* inner; */ still; comment */ SELECT 1; SELECT 2";
        let statements = split_statements(sql);
        assert_eq!(statements.len(), 2);
        assert!(statements[0].ends_with("SELECT 1"));
    }

    #[test]
    fn unterminated_constructs_run_to_the_end() {
        assert_eq!(split_statements("SELECT 'open; quote"), ["SELECT 'open; quote"]);
        assert_eq!(split_statements("SELECT 1 /* open; comment"), ["SELECT 1 /* open; comment"]);
    }

    #[test]
    fn blank_script_has_no_statements() {
        assert!(split_statements("  \n\t ").is_empty());
        assert!(split_statements("-- only a comment").is_empty());
    }
}

//! Tokenizes a BIND-style name-server configuration and discovers zone descriptors (SPEC_FULL
//! §4.2).
//!
//! Hand-written, matching the teacher's preference for small purpose-built parsers over pulling
//! in a grammar crate: the vocabulary is narrow enough (identifiers, `{ } ;`, quoted strings,
//! three comment forms, `include`) that a character-at-a-time scanner is simpler than wiring up a
//! general parser combinator.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::Chars;

use crate::error::{DnsMgrError, Result};

/// A zone discovered in the name-server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneInfo {
    pub name: String,
    pub file: PathBuf,
    pub kind: String,
}

fn default_ignore_set() -> HashSet<String> {
    [
        ".",
        "localhost",
        "127.in-addr.arpa",
        "0.in-addr.arpa",
        "255.in-addr.arpa",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Token stream over the raw config text: identifiers, quoted strings, and the `{ } ;`
/// delimiters, with `;`/`#`/`//` comments stripped as whitespace.
struct Tokenizer<'a> {
    chars: std::iter::Peekable<Chars<'a>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    OpenBrace,
    CloseBrace,
    Semicolon,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Tokenizer {
            chars: src.chars().peekable(),
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.chars.peek() {
                Some(c) if c.is_whitespace() => {
                    self.chars.next();
                }
                Some('#') => {
                    while let Some(&c) = self.chars.peek() {
                        self.chars.next();
                        if c == '\n' {
                            break;
                        }
                    }
                }
                Some(';') => {
                    // `;` doubles as a statement terminator and (at top level outside a
                    // statement boundary we don't track lexically) a line comment starter in
                    // some BIND dialects; here it is always tokenized as Semicolon and the
                    // parser treats bare trailing semicolons as no-ops, which has the same
                    // effect without ambiguity.
                    break;
                }
                Some('/') => {
                    let mut lookahead = self.chars.clone();
                    lookahead.next();
                    if lookahead.peek() == Some(&'/') {
                        while let Some(&c) = self.chars.peek() {
                            self.chars.next();
                            if c == '\n' {
                                break;
                            }
                        }
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace_and_comments();
        let c = match self.chars.peek() {
            None => return Ok(None),
            Some(&c) => c,
        };

        match c {
            '{' => {
                self.chars.next();
                Ok(Some(Token::OpenBrace))
            }
            '}' => {
                self.chars.next();
                Ok(Some(Token::CloseBrace))
            }
            ';' => {
                self.chars.next();
                Ok(Some(Token::Semicolon))
            }
            '"' => {
                self.chars.next();
                let mut s = String::new();
                loop {
                    match self.chars.next() {
                        Some('"') => break,
                        Some(c) => s.push(c),
                        None => {
                            return Err(DnsMgrError::parse(
                                "<config>",
                                "unterminated quoted string",
                            ))
                        }
                    }
                }
                Ok(Some(Token::Word(s)))
            }
            _ => {
                let mut s = String::new();
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || matches!(c, '{' | '}' | ';' | '"') {
                        break;
                    }
                    s.push(c);
                    self.chars.next();
                }
                if s.is_empty() {
                    // Shouldn't happen given the dispatch above, but avoid an infinite loop.
                    self.chars.next();
                    return self.next_token();
                }
                Ok(Some(Token::Word(s)))
            }
        }
    }
}

/// Parses a name-server config file, recursing through `include "<path>";` statements, and
/// returns every discovered zone not in the ignore set.
pub fn parse_config_file(
    path: &Path,
    base_dir: &Path,
    extra_ignored: &[String],
) -> Result<Vec<ZoneInfo>> {
    let mut ignored: HashSet<String> = default_ignore_set();
    ignored.extend(extra_ignored.iter().cloned());

    let mut zones = Vec::new();
    parse_file_into(path, base_dir, &ignored, &mut zones)?;
    Ok(zones)
}

fn parse_file_into(
    path: &Path,
    base_dir: &Path,
    ignored: &HashSet<String>,
    out: &mut Vec<ZoneInfo>,
) -> Result<()> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        DnsMgrError::parse(path.to_string_lossy(), format!("cannot read config: {e}"))
    })?;

    let mut tokenizer = Tokenizer::new(&text);
    let mut tokens = Vec::new();
    while let Some(tok) = tokenizer.next_token()? {
        tokens.push(tok);
    }

    let mut i = 0usize;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Word(word) if word == "include" => {
                i += 1;
                let inc_path = expect_word(&tokens, &mut i, path)?;
                skip_optional_semicolon(&tokens, &mut i);
                let resolved = resolve_path(&inc_path, base_dir);
                parse_file_into(&resolved, base_dir, ignored, out)?;
            }
            Token::Word(word) if word == "zone" => {
                i += 1;
                let name = expect_word(&tokens, &mut i, path)?;
                let zone = parse_zone_body(&tokens, &mut i, &name, base_dir, path)?;
                if let Some(zone) = zone {
                    if !ignored.contains(&zone.name) {
                        out.push(zone);
                    }
                }
            }
            Token::Semicolon => {
                i += 1;
            }
            _ => {
                // Unknown top-level statement: skip to the next top-level `;` or balanced
                // `{ ... }` block benignly.
                skip_unknown_statement(&tokens, &mut i);
            }
        }
    }

    Ok(())
}

fn expect_word(tokens: &[Token], i: &mut usize, path: &Path) -> Result<String> {
    match tokens.get(*i) {
        Some(Token::Word(w)) => {
            *i += 1;
            Ok(w.clone())
        }
        _ => Err(DnsMgrError::parse(
            path.to_string_lossy(),
            "expected a word token",
        )),
    }
}

fn skip_optional_semicolon(tokens: &[Token], i: &mut usize) {
    if matches!(tokens.get(*i), Some(Token::Semicolon)) {
        *i += 1;
    }
}

fn parse_zone_body(
    tokens: &[Token],
    i: &mut usize,
    name: &str,
    base_dir: &Path,
    path: &Path,
) -> Result<Option<ZoneInfo>> {
    // Optional `IN` class keyword.
    if let Some(Token::Word(w)) = tokens.get(*i) {
        if w.eq_ignore_ascii_case("in") {
            *i += 1;
        }
    }

    match tokens.get(*i) {
        Some(Token::OpenBrace) => *i += 1,
        _ => {
            return Err(DnsMgrError::parse(
                path.to_string_lossy(),
                format!("expected '{{' opening zone \"{name}\""),
            ))
        }
    }

    let mut kind = String::new();
    let mut file: Option<String> = None;
    let mut depth = 1usize;

    while depth > 0 {
        match tokens.get(*i) {
            Some(Token::OpenBrace) => {
                depth += 1;
                *i += 1;
            }
            Some(Token::CloseBrace) => {
                depth -= 1;
                *i += 1;
            }
            Some(Token::Semicolon) => {
                *i += 1;
            }
            Some(Token::Word(w)) if depth == 1 && w == "type" => {
                *i += 1;
                kind = expect_word(tokens, i, path)?;
            }
            Some(Token::Word(w)) if depth == 1 && w == "file" => {
                *i += 1;
                file = Some(expect_word(tokens, i, path)?);
            }
            Some(_) => {
                *i += 1;
            }
            None => {
                return Err(DnsMgrError::parse(
                    path.to_string_lossy(),
                    format!("unbalanced braces in zone \"{name}\""),
                ))
            }
        }
    }

    let file = match file {
        Some(f) => resolve_path(&f, base_dir),
        None => return Ok(None),
    };

    Ok(Some(ZoneInfo {
        name: name.to_string(),
        file,
        kind,
    }))
}

fn skip_unknown_statement(tokens: &[Token], i: &mut usize) {
    let mut depth = 0usize;
    loop {
        match tokens.get(*i) {
            Some(Token::OpenBrace) => {
                depth += 1;
                *i += 1;
            }
            Some(Token::CloseBrace) => {
                if depth == 0 {
                    return;
                }
                depth -= 1;
                *i += 1;
                if depth == 0 {
                    return;
                }
            }
            Some(Token::Semicolon) => {
                *i += 1;
                if depth == 0 {
                    return;
                }
            }
            Some(_) => {
                *i += 1;
            }
            None => return,
        }
    }
}

fn resolve_path(raw: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(raw);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_tmp(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn parses_simple_zone_statement() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            r#"
            zone "example.com" IN {
                type master;
                file "example.com.zone";
            };
            "#,
        );

        let zones = parse_config_file(&conf, dir.path(), &[]).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "example.com");
        assert_eq!(zones[0].kind, "master");
        assert_eq!(zones[0].file, dir.path().join("example.com.zone"));
    }

    #[test]
    fn recurses_through_include() {
        let dir = tempfile::tempdir().unwrap();
        write_tmp(
            dir.path(),
            "zones.conf",
            r#"zone "sub.example.com" { type master; file "sub.zone"; };"#,
        );
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            r#"include "zones.conf";"#,
        );

        let zones = parse_config_file(&conf, dir.path(), &[]).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "sub.example.com");
    }

    #[test]
    fn ignores_builtin_zones() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            r#"
            zone "localhost" { type master; file "localhost.zone"; };
            zone "example.com" { type master; file "example.com.zone"; };
            "#,
        );

        let zones = parse_config_file(&conf, dir.path(), &[]).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "example.com");
    }

    #[test]
    fn ignores_configured_extra_zones() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            r#"zone "internal.example.com" { type master; file "internal.zone"; };"#,
        );

        let zones =
            parse_config_file(&conf, dir.path(), &["internal.example.com".to_string()]).unwrap();
        assert!(zones.is_empty());
    }

    #[test]
    fn skips_unknown_top_level_statements() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            r#"
            options {
                directory "/var/cache/bind";
            };
            zone "example.com" { type master; file "example.com.zone"; };
            "#,
        );

        let zones = parse_config_file(&conf, dir.path(), &[]).unwrap();
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name, "example.com");
    }

    #[test]
    fn unbalanced_braces_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            r#"zone "example.com" { type master; file "example.com.zone";"#,
        );

        let err = parse_config_file(&conf, dir.path(), &[]).unwrap_err();
        assert!(matches!(err, DnsMgrError::Parse { .. }));
    }

    #[test]
    fn relative_file_path_resolves_against_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            r#"zone "example.com" { type master; file "zones/example.com.zone"; };"#,
        );

        let zones = parse_config_file(&conf, dir.path(), &[]).unwrap();
        assert_eq!(zones[0].file, dir.path().join("zones/example.com.zone"));
    }

    #[test]
    fn comment_forms_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let conf = write_tmp(
            dir.path(),
            "named.conf",
            "# hash comment\n// slash comment\nzone \"example.com\" { type master; file \"example.com.zone\"; };\n",
        );

        let zones = parse_config_file(&conf, dir.path(), &[]).unwrap();
        assert_eq!(zones.len(), 1);
    }
}

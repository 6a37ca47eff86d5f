// tests/lexer_tests.rs

use dictquery::ast::{Token, TokenKind};
use dictquery::lexer::{LexError, Lexer, Position};

fn tokens(input: &str) -> Vec<Token> {
    Lexer::new(input).tokenize().unwrap()
}

fn kinds(input: &str) -> Vec<TokenKind> {
    tokens(input).into_iter().map(|t| t.kind).collect()
}

fn texts(input: &str) -> Vec<String> {
    tokens(input).into_iter().map(|t| t.text).collect()
}

// ============================================================================
// Token kinds
// ============================================================================

#[test_log::test]
fn test_dotted_path() {
    assert_eq!(
        kinds("root.child"),
        vec![TokenKind::Name, TokenKind::Dot, TokenKind::Name, TokenKind::End]
    );
}

#[test_log::test]
fn test_variable_and_script() {
    assert_eq!(
        kinds("$limit"),
        vec![TokenKind::VarSign, TokenKind::Name, TokenKind::End]
    );
    assert_eq!(
        kinds("@math.scale(2, factor=5)"),
        vec![
            TokenKind::ScriptSign,
            TokenKind::Name,
            TokenKind::Dot,
            TokenKind::Name,
            TokenKind::LParen,
            TokenKind::Number,
            TokenKind::Comma,
            TokenKind::Name,
            TokenKind::Operator,
            TokenKind::Number,
            TokenKind::RParen,
            TokenKind::End,
        ]
    );
}

#[test_log::test]
fn test_slice_tokens() {
    assert_eq!(
        kinds("n[5:2:-1]"),
        vec![
            TokenKind::Name,
            TokenKind::LBracket,
            TokenKind::Number,
            TokenKind::Colon,
            TokenKind::Number,
            TokenKind::Colon,
            TokenKind::Operator,
            TokenKind::Number,
            TokenKind::RBracket,
            TokenKind::End,
        ]
    );
}

#[test_log::test]
fn test_operators() {
    assert_eq!(
        texts("a==b!=c<=d>=e&&f||g<h>i+j-k*l/m"),
        vec![
            "a", "==", "b", "!=", "c", "<=", "d", ">=", "e", "&&", "f", "||", "g", "<", "h", ">",
            "i", "+", "j", "-", "k", "*", "l", "/", "m", "",
        ]
    );
}

#[test_log::test]
fn test_wildcards_are_operators() {
    assert_eq!(
        kinds("*.a[*]"),
        vec![
            TokenKind::Operator,
            TokenKind::Dot,
            TokenKind::Name,
            TokenKind::LBracket,
            TokenKind::Operator,
            TokenKind::RBracket,
            TokenKind::End,
        ]
    );
}

// ============================================================================
// Literals
// ============================================================================

#[test_log::test]
fn test_numbers() {
    assert_eq!(texts("12 3.25 1e5 2.5E-3"), vec!["12", "3.25", "1e5", "2.5E-3", ""]);
    // A trailing dot is an access, not part of the number
    assert_eq!(texts("1.a"), vec!["1", ".", "a", ""]);
}

#[test_log::test]
fn test_strings_keep_their_quotes() {
    assert_eq!(
        texts(r#"'single' "double" "with \" quote""#),
        vec!["'single'", "\"double\"", r#""with \" quote""#, ""]
    );
}

#[test_log::test]
fn test_escaped_name_is_one_token() {
    let toks = tokens(r"root.key\.01");
    assert_eq!(toks.len(), 4);
    assert_eq!(toks[2].kind, TokenKind::Name);
    assert_eq!(toks[2].text, r"key\.01");
}

#[test_log::test]
fn test_unicode_names() {
    assert_eq!(texts("数据.名称"), vec!["数据", ".", "名称", ""]);
}

// ============================================================================
// Positions and errors
// ============================================================================

#[test_log::test]
fn test_positions() {
    let toks = tokens("a\n  [0]");
    assert_eq!(toks[0].position, Position::new(1, 1));
    assert_eq!(toks[1].position, Position::new(2, 3));
    assert_eq!(toks[2].position, Position::new(2, 4));
}

#[test_log::test]
fn test_unexpected_character() {
    let err = Lexer::new("a # b").tokenize().unwrap_err();
    assert_eq!(
        err,
        LexError::UnexpectedChar {
            ch: '#',
            position: Position::new(1, 3)
        }
    );
    assert_eq!(err.to_string(), "unexpected character '#' at line 1, column 3");
}

#[test_log::test]
fn test_unterminated_string() {
    let err = Lexer::new("a['b").tokenize().unwrap_err();
    assert_eq!(
        err,
        LexError::UnterminatedString {
            position: Position::new(1, 3)
        }
    );
}

#[test_log::test]
fn test_lone_ampersand_and_bang() {
    assert!(Lexer::new("a & b").tokenize().is_err());
    assert!(Lexer::new("!a").tokenize().is_err());
}

#[test_log::test]
fn test_next_token_skips_whitespace() {
    let mut lexer = Lexer::new("  a   b ");
    assert_eq!(lexer.next_token().unwrap().text, "a");
    assert_eq!(lexer.next_token().unwrap().text, "b");
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
    assert_eq!(lexer.next_token().unwrap().kind, TokenKind::End);
}

//! Token, syntax tree and segment dumps for debugging paths

use super::CliError;
use crate::{
    CompiledPath, Lexer,
    segment::{parse_segments_with_limit, segments_to_path},
};

/// One line per token: position, kind and source text
pub fn dump_tokens(path: &str) -> Result<String, CliError> {
    let tokens = Lexer::new(path).tokenize()?;
    let lines: Vec<String> = tokens
        .iter()
        .map(|token| {
            format!(
                "{:>3}:{:<3} {:<10} {}",
                token.position.line,
                token.position.column,
                token.kind.to_string(),
                token.text
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

/// The parsed syntax tree in `{:#?}` form
pub fn dump_ast(path: &str, max_depth: usize) -> Result<String, CliError> {
    let compiled = CompiledPath::parse_with_limit(path, max_depth)?;
    Ok(format!("{:#?}\n# {}", compiled.expr(), compiled))
}

/// One line per segment, followed by the re-rendered path
pub fn dump_segments(path: &str, max_depth: usize) -> Result<String, CliError> {
    let segments = parse_segments_with_limit(path, max_depth)?;
    let mut lines: Vec<String> = segments.iter().map(|segment| format!("{segment:?}")).collect();
    lines.push(format!("# {}", segments_to_path(&segments)));
    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_tokens() {
        let dump = dump_tokens("a[0]").unwrap();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].contains('a'));
        assert!(lines[2].ends_with('0'));
    }

    #[test]
    fn test_dump_ast_and_segments() {
        assert!(dump_ast("a.b", 16).unwrap().ends_with("# a.b"));
        assert!(dump_segments("a.b", 16).unwrap().ends_with("# a.b"));
        assert!(matches!(
            dump_tokens("a # b"),
            Err(CliError::Query(crate::Error::Lex(_)))
        ));
        assert!(matches!(
            dump_ast("a[", 16),
            Err(CliError::Query(crate::Error::Syntax(_)))
        ));
    }
}

//! Compound Command Parser
//!
//! Parsers for the control structures: if/elif/else, while, until, for
//! (word-list and C-style), case, select, function definitions, brace
//! groups and subshells. Each parser is entered with the introducing token
//! still current and leaves the token after the construct current.

use crate::ast::*;
use crate::parser::arith;
use crate::parser::lexer::TokenType;
use crate::parser::parser::Parser;
use crate::parser::types::ParseException;
use crate::parser::word;

pub fn parse_if(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect_word("if")?;
    let mut clauses = Vec::new();

    loop {
        let condition = p.parse_statements_until(&["then"], &[])?;
        p.expect_word("then")?;
        let body = p.parse_statements_until(&["elif", "else", "fi"], &[])?;
        clauses.push(IfClause { condition, body });

        if p.at_word("elif") {
            p.advance();
            continue;
        }
        break;
    }

    let else_body = if p.at_word("else") {
        p.advance();
        Some(p.parse_statements_until(&["fi"], &[])?)
    } else {
        None
    };

    p.expect_word("fi")?;
    let redirections = p.parse_trailing_redirections()?;
    Ok(CompoundCommandNode::If(IfNode {
        clauses,
        else_body,
        redirections,
    }))
}

pub fn parse_while(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect_word("while")?;
    let condition = p.parse_statements_until(&["do"], &[])?;
    let (body, redirections) = parse_do_block(p)?;
    Ok(CompoundCommandNode::While(WhileNode {
        condition,
        body,
        redirections,
    }))
}

pub fn parse_until(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect_word("until")?;
    let condition = p.parse_statements_until(&["do"], &[])?;
    let (body, redirections) = parse_do_block(p)?;
    Ok(CompoundCommandNode::Until(UntilNode {
        condition,
        body,
        redirections,
    }))
}

pub fn parse_for(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect_word("for")?;

    // C-style header, captured by the lexer as one span.
    if p.current_type() == TokenType::ArithSpan {
        let span = p.advance();
        let mut exprs = [None, None, None];
        for (i, piece) in span.value.splitn(3, ';').enumerate() {
            let piece = piece.trim();
            if !piece.is_empty() {
                exprs[i] = Some(
                    arith::parse(piece)
                        .map_err(|e| ParseException::at_token(e.to_string(), &span))?,
                );
            }
        }
        let [init, condition, update] = exprs;

        if p.current_type() == TokenType::Semicolon {
            p.advance();
        }
        let (body, redirections) = parse_do_block(p)?;
        return Ok(CompoundCommandNode::CStyleFor(CStyleForNode {
            init,
            condition,
            update,
            body,
            redirections,
        }));
    }

    let (variable, words) = parse_loop_header(p)?;
    let (body, redirections) = parse_do_block(p)?;
    Ok(CompoundCommandNode::For(ForNode {
        variable,
        words,
        body,
        redirections,
    }))
}

pub fn parse_select(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect_word("select")?;
    let (variable, words) = parse_loop_header(p)?;
    let (body, redirections) = parse_do_block(p)?;
    Ok(CompoundCommandNode::Select(SelectNode {
        variable,
        words,
        body,
        redirections,
    }))
}

/// `NAME [in word…]` shared by for and select.
fn parse_loop_header(
    p: &mut Parser,
) -> Result<(String, Option<Vec<WordNode>>), ParseException> {
    let name_token = p.expect(TokenType::Word)?;
    if !word::is_valid_name(&name_token.value) {
        return Err(ParseException::at_token(
            format!("'{}' is not a valid variable name", name_token.value),
            &name_token,
        ));
    }
    let variable = name_token.value;

    p.skip_newlines();
    let words = if p.at_word("in") {
        p.advance();
        let mut words = Vec::new();
        while matches!(p.current_type(), TokenType::Word | TokenType::Number) {
            let token = p.advance();
            words.push(word::parse_word(&token.value, token.line, token.column)?);
        }
        Some(words)
    } else {
        None
    };

    if p.current_type() == TokenType::Semicolon {
        p.advance();
    }
    Ok((variable, words))
}

/// `do … done` with trailing redirections.
fn parse_do_block(
    p: &mut Parser,
) -> Result<(Vec<StatementNode>, Vec<RedirectionNode>), ParseException> {
    p.skip_separators();
    p.expect_word("do")?;
    let body = p.parse_statements_until(&["done"], &[])?;
    p.expect_word("done")?;
    let redirections = p.parse_trailing_redirections()?;
    Ok((body, redirections))
}

pub fn parse_case(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect_word("case")?;
    let word_token = match p.current_type() {
        TokenType::Word | TokenType::Number => p.advance(),
        _ => return Err(p.unexpected("expected a word after 'case'")),
    };
    let subject = word::parse_word(&word_token.value, word_token.line, word_token.column)?;

    p.skip_newlines();
    p.expect_word("in")?;
    p.skip_newlines();

    let mut items = Vec::new();
    while !p.at_word("esac") {
        if p.current_type() == TokenType::Eof {
            return Err(p.unexpected("expected 'esac'"));
        }

        // Optional open paren before the pattern list.
        if p.current_type() == TokenType::LParen {
            p.advance();
        }

        let mut patterns = Vec::new();
        loop {
            let token = match p.current_type() {
                TokenType::Word | TokenType::Number => p.advance(),
                _ => return Err(p.unexpected("expected a case pattern")),
            };
            patterns.push(word::parse_word(&token.value, token.line, token.column)?);
            if p.current_type() == TokenType::Pipe {
                p.advance();
                continue;
            }
            break;
        }
        p.expect(TokenType::RParen)?;

        let body = p.parse_statements_until(
            &["esac"],
            &[
                TokenType::DSemi,
                TokenType::SemiAnd,
                TokenType::SemiSemiAnd,
            ],
        )?;

        let terminator = match p.current_type() {
            TokenType::DSemi => {
                p.advance();
                CaseTerminator::Break
            }
            TokenType::SemiAnd => {
                p.advance();
                CaseTerminator::FallThrough
            }
            TokenType::SemiSemiAnd => {
                p.advance();
                CaseTerminator::Continue
            }
            // The last arm may omit its terminator.
            _ => CaseTerminator::Break,
        };
        items.push(CaseItemNode {
            patterns,
            body,
            terminator,
        });
        p.skip_newlines();
    }

    p.expect_word("esac")?;
    let redirections = p.parse_trailing_redirections()?;
    Ok(CompoundCommandNode::Case(CaseNode {
        word: subject,
        items,
        redirections,
    }))
}

pub fn parse_subshell(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect(TokenType::LParen)?;
    let body = p.parse_statements_until(&[], &[TokenType::RParen])?;
    p.expect(TokenType::RParen)?;
    let redirections = p.parse_trailing_redirections()?;
    Ok(CompoundCommandNode::Subshell(SubshellNode {
        body,
        redirections,
    }))
}

pub fn parse_group(p: &mut Parser) -> Result<CompoundCommandNode, ParseException> {
    p.expect(TokenType::LBrace)?;
    let body = p.parse_statements_until(&[], &[TokenType::RBrace])?;
    p.expect(TokenType::RBrace)?;
    let redirections = p.parse_trailing_redirections()?;
    Ok(CompoundCommandNode::Group(GroupNode {
        body,
        redirections,
    }))
}

/// `function NAME { … }`, `function NAME() { … }`, or `NAME() compound`.
pub fn parse_function(p: &mut Parser) -> Result<FunctionDefNode, ParseException> {
    if p.at_word("function") {
        p.advance();
    }

    let name_token = p.expect(TokenType::Word)?;
    if !word::is_valid_name(&name_token.value) {
        return Err(ParseException::at_token(
            format!("'{}' is not a valid function name", name_token.value),
            &name_token,
        ));
    }

    if p.current_type() == TokenType::LParen {
        p.advance();
        p.expect(TokenType::RParen)?;
    }
    p.skip_newlines();

    let body = match p.parse_command()? {
        CommandNode::Compound(c) => c,
        _ => {
            return Err(ParseException::at_token(
                "a function body must be a compound command",
                p.current(),
            ))
        }
    };

    Ok(FunctionDefNode {
        name: name_token.value,
        body: Box::new(body),
        redirections: Vec::new(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::parse;

    fn first_compound(input: &str) -> CompoundCommandNode {
        let script = parse(input).unwrap();
        match &script.statements[0].pipelines[0].commands[0] {
            CommandNode::Compound(c) => c.clone(),
            other => panic!("expected compound, got {:?}", other),
        }
    }

    #[test]
    fn if_else() {
        let node = first_compound("if true; then echo a; else echo b; fi");
        match node {
            CompoundCommandNode::If(n) => {
                assert_eq!(n.clauses.len(), 1);
                assert!(n.else_body.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn if_elif_chain() {
        let node = first_compound("if a; then x; elif b; then y; elif c; then z; fi");
        match node {
            CompoundCommandNode::If(n) => {
                assert_eq!(n.clauses.len(), 3);
                assert!(n.else_body.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn while_loop() {
        let node = first_compound("while true; do echo x; done");
        assert!(matches!(node, CompoundCommandNode::While(_)));
    }

    #[test]
    fn until_loop() {
        let node = first_compound("until false; do echo x; done");
        assert!(matches!(node, CompoundCommandNode::Until(_)));
    }

    #[test]
    fn for_with_words() {
        let node = first_compound("for i in 1 2 3; do echo $i; done");
        match node {
            CompoundCommandNode::For(n) => {
                assert_eq!(n.variable, "i");
                assert_eq!(n.words.as_ref().unwrap().len(), 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn for_without_words_uses_positionals() {
        let node = first_compound("for arg; do echo $arg; done");
        match node {
            CompoundCommandNode::For(n) => assert!(n.words.is_none()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn c_style_for() {
        let node = first_compound("for ((i=0; i<3; i++)); do echo $i; done");
        match node {
            CompoundCommandNode::CStyleFor(n) => {
                assert!(n.init.is_some());
                assert!(n.condition.is_some());
                assert!(n.update.is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn c_style_for_empty_sections() {
        let node = first_compound("for ((;;)); do break; done");
        match node {
            CompoundCommandNode::CStyleFor(n) => {
                assert!(n.init.is_none());
                assert!(n.condition.is_none());
                assert!(n.update.is_none());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn case_terminators() {
        let node = first_compound("case $x in a) echo a ;; b) echo b ;& c) echo c ;;& d) echo d ;; esac");
        match node {
            CompoundCommandNode::Case(n) => {
                assert_eq!(n.items.len(), 4);
                assert_eq!(n.items[0].terminator, CaseTerminator::Break);
                assert_eq!(n.items[1].terminator, CaseTerminator::FallThrough);
                assert_eq!(n.items[2].terminator, CaseTerminator::Continue);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn case_pattern_alternatives() {
        let node = first_compound("case $x in a|b|c) echo abc ;; esac");
        match node {
            CompoundCommandNode::Case(n) => assert_eq!(n.items[0].patterns.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn select_loop() {
        let node = first_compound("select opt in a b; do echo $opt; done");
        match node {
            CompoundCommandNode::Select(n) => {
                assert_eq!(n.variable, "opt");
                assert_eq!(n.words.as_ref().unwrap().len(), 2);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn subshell_and_group() {
        assert!(matches!(
            first_compound("(echo a; echo b)"),
            CompoundCommandNode::Subshell(_)
        ));
        assert!(matches!(
            first_compound("{ echo a; echo b; }"),
            CompoundCommandNode::Group(_)
        ));
    }

    #[test]
    fn group_redirection() {
        let node = first_compound("{ echo a; } > out.txt");
        match node {
            CompoundCommandNode::Group(n) => assert_eq!(n.redirections.len(), 1),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn function_definitions() {
        let script = parse("greet() { echo hi; }").unwrap();
        match &script.statements[0].pipelines[0].commands[0] {
            CommandNode::FunctionDef(def) => assert_eq!(def.name, "greet"),
            other => panic!("unexpected: {:?}", other),
        }

        let script = parse("function greet { echo hi; }").unwrap();
        match &script.statements[0].pipelines[0].commands[0] {
            CommandNode::FunctionDef(def) => assert_eq!(def.name, "greet"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn nested_loops() {
        let node = first_compound("for i in 1 2; do for j in a b; do echo $i$j; done; done");
        match node {
            CompoundCommandNode::For(outer) => {
                let inner = &outer.body[0].pipelines[0].commands[0];
                assert!(matches!(
                    inner,
                    CommandNode::Compound(CompoundCommandNode::For(_))
                ));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn unterminated_if_is_eof_error() {
        let err = parse("if true; then echo a").unwrap_err();
        assert!(err.unexpected_eof);
    }
}

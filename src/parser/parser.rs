//! Parser
//!
//! Recursive-descent parser over the token stream: chains of pipelines with
//! `&&`/`||` short-circuit operators, simple commands with assignment
//! prefixes and redirections, and the compound commands implemented in
//! [`compound`](super::compound).
//!
//! Reserved words are recognised positionally: `if`, `for` and friends are
//! keywords only where a command name may start, and plain words anywhere
//! else.

use crate::ast::*;
use crate::parser::compound;
use crate::parser::lexer::{HereDocBody, Token, TokenType};
use crate::parser::types::*;
use crate::parser::word;

pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
    pub(crate) depth: usize,
    input: Vec<char>,
    heredocs: Vec<HereDocBody>,
    heredoc_index: usize,
}

impl Parser {
    pub fn new(input: &str, tokens: Vec<Token>, heredocs: Vec<HereDocBody>) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            input: input.chars().collect(),
            heredocs,
            heredoc_index: 0,
        }
    }

    // ------------------------------------------------------------------
    // Token access
    // ------------------------------------------------------------------

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    pub(crate) fn current_type(&self) -> TokenType {
        self.current().token_type
    }

    /// Is the current token the given unquoted reserved word?
    pub(crate) fn at_word(&self, text: &str) -> bool {
        self.current().is_unquoted_word(text)
    }

    pub(crate) fn expect(&mut self, t: TokenType) -> Result<Token, ParseException> {
        if self.current_type() == t {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("expected '{}'", t.as_str())))
        }
    }

    pub(crate) fn expect_word(&mut self, text: &str) -> Result<(), ParseException> {
        if self.at_word(text) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected '{}'", text)))
        }
    }

    pub(crate) fn unexpected(&self, expected: &str) -> ParseException {
        let token = self.current();
        if token.token_type == TokenType::Eof {
            ParseException::eof(format!("{}, found end of input", expected), token)
        } else {
            ParseException::at_token(
                format!("{}, found '{}'", expected, token.value),
                token,
            )
        }
    }

    /// Skip newlines (used where the grammar allows line breaks).
    pub(crate) fn skip_newlines(&mut self) {
        while self.current_type() == TokenType::Newline {
            self.advance();
        }
    }

    /// Skip statement separators between list entries.
    pub(crate) fn skip_separators(&mut self) {
        while matches!(
            self.current_type(),
            TokenType::Newline | TokenType::Semicolon
        ) {
            self.advance();
        }
    }

    fn source_slice(&self, start: usize, end: usize) -> String {
        self.input[start.min(self.input.len())..end.min(self.input.len())]
            .iter()
            .collect::<String>()
            .trim()
            .to_string()
    }

    // ------------------------------------------------------------------
    // Script & statements
    // ------------------------------------------------------------------

    pub fn parse_script(&mut self) -> Result<ScriptNode, ParseException> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            if self.current_type() == TokenType::Eof {
                break;
            }
            statements.push(self.parse_statement()?);
        }
        Ok(ScriptNode { statements })
    }

    /// Parse statements until one of the stop words (at command position) or
    /// stop token types, leaving the stop token unconsumed.
    pub(crate) fn parse_statements_until(
        &mut self,
        stop_words: &[&str],
        stop_tokens: &[TokenType],
    ) -> Result<Vec<StatementNode>, ParseException> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators();
            let t = self.current_type();
            if stop_tokens.contains(&t) {
                break;
            }
            if stop_words.iter().any(|w| self.at_word(w)) {
                break;
            }
            if t == TokenType::Eof {
                return Err(self.unexpected(&format!(
                    "expected {}",
                    stop_words
                        .first()
                        .copied()
                        .or_else(|| stop_tokens.first().map(|t| t.as_str()))
                        .unwrap_or("more input")
                )));
            }
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    /// One chain: pipelines joined by `&&`/`||`, optionally backgrounded.
    pub(crate) fn parse_statement(&mut self) -> Result<StatementNode, ParseException> {
        let start = self.current().start;
        let mut pipelines = vec![self.parse_pipeline()?];
        let mut operators = Vec::new();

        loop {
            let op = match self.current_type() {
                TokenType::AndAnd => StatementOperator::And,
                TokenType::OrOr => StatementOperator::Or,
                _ => break,
            };
            self.advance();
            // A chain may continue on the next line after && or ||.
            self.skip_newlines();
            operators.push(op);
            pipelines.push(self.parse_pipeline()?);
        }

        let end = self.current().start;
        let mut background = false;
        match self.current_type() {
            TokenType::Amp => {
                background = true;
                self.advance();
            }
            TokenType::Semicolon => {
                self.advance();
            }
            _ => {}
        }
        Ok(StatementNode {
            pipelines,
            operators,
            background,
            source_text: Some(self.source_slice(start, end)),
        })
    }

    // ------------------------------------------------------------------
    // Pipelines
    // ------------------------------------------------------------------

    fn parse_pipeline(&mut self) -> Result<PipelineNode, ParseException> {
        let mut negated = false;
        let mut timed = false;

        loop {
            if self.current_type() == TokenType::Bang {
                negated = !negated;
                self.advance();
            } else if self.at_word("time") && !timed {
                timed = true;
                self.advance();
            } else {
                break;
            }
        }

        let mut commands = vec![self.parse_command()?];
        let mut stderr_pipes = Vec::new();

        loop {
            let stderr_too = match self.current_type() {
                TokenType::Pipe => false,
                TokenType::PipeAmp => true,
                _ => break,
            };
            self.advance();
            self.skip_newlines();
            stderr_pipes.push(stderr_too);
            commands.push(self.parse_command()?);
        }

        Ok(PipelineNode {
            commands,
            negated,
            timed,
            stderr_pipes,
        })
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub(crate) fn parse_command(&mut self) -> Result<CommandNode, ParseException> {
        if self.depth >= MAX_PARSER_DEPTH {
            return Err(self.unexpected("nesting too deep"));
        }
        self.depth += 1;
        let result = self.parse_command_inner();
        self.depth -= 1;
        result
    }

    fn parse_command_inner(&mut self) -> Result<CommandNode, ParseException> {
        match self.current_type() {
            TokenType::LParen => {
                let node = compound::parse_subshell(self)?;
                Ok(CommandNode::Compound(node))
            }
            TokenType::LBrace => {
                let node = compound::parse_group(self)?;
                Ok(CommandNode::Compound(node))
            }
            TokenType::Word if !self.current().quoted => {
                let value = self.current().value.clone();
                match value.as_str() {
                    "if" => Ok(CommandNode::Compound(compound::parse_if(self)?)),
                    "while" => Ok(CommandNode::Compound(compound::parse_while(self)?)),
                    "until" => Ok(CommandNode::Compound(compound::parse_until(self)?)),
                    "for" => Ok(CommandNode::Compound(compound::parse_for(self)?)),
                    "case" => Ok(CommandNode::Compound(compound::parse_case(self)?)),
                    "select" => Ok(CommandNode::Compound(compound::parse_select(self)?)),
                    "function" => Ok(CommandNode::FunctionDef(compound::parse_function(self)?)),
                    _ if self.is_function_definition() => {
                        Ok(CommandNode::FunctionDef(compound::parse_function(self)?))
                    }
                    _ if is_reserved_word(&value) => {
                        Err(self.unexpected("expected a command"))
                    }
                    _ => Ok(CommandNode::Simple(self.parse_simple_command()?)),
                }
            }
            TokenType::Word | TokenType::Number => {
                Ok(CommandNode::Simple(self.parse_simple_command()?))
            }
            _ if is_redirection_token(self.current_type()) => {
                Ok(CommandNode::Simple(self.parse_simple_command()?))
            }
            _ => Err(self.unexpected("expected a command")),
        }
    }

    /// `name ()` at command position begins a function definition.
    fn is_function_definition(&self) -> bool {
        let name_ok = word::is_valid_name(&self.current().value);
        name_ok
            && self
                .tokens
                .get(self.pos + 1)
                .map(|t| t.token_type == TokenType::LParen)
                .unwrap_or(false)
            && self
                .tokens
                .get(self.pos + 2)
                .map(|t| t.token_type == TokenType::RParen)
                .unwrap_or(false)
    }

    fn parse_simple_command(&mut self) -> Result<SimpleCommandNode, ParseException> {
        let line = self.current().line;
        let mut assignments = Vec::new();
        let mut name = None;
        let mut args = Vec::new();
        let mut redirections = Vec::new();

        loop {
            let t = self.current_type();

            // fd-prefixed redirection: `2> file`
            if t == TokenType::Number {
                let next = self
                    .tokens
                    .get(self.pos + 1)
                    .map(|t| t.token_type)
                    .unwrap_or(TokenType::Eof);
                if is_redirection_token(next) {
                    let fd_token = self.advance();
                    let fd: i32 = fd_token.value.parse().map_err(|_| {
                        ParseException::at_token("file descriptor out of range", &fd_token)
                    })?;
                    redirections.push(self.parse_redirection(Some(fd))?);
                    continue;
                }
                // A number not followed by a redirection is a plain word.
                let token = self.advance();
                let w = word::parse_word(&token.value, token.line, token.column)?;
                if name.is_none() {
                    name = Some(w);
                } else {
                    args.push(w);
                }
                continue;
            }

            if is_redirection_token(t) {
                redirections.push(self.parse_redirection(None)?);
                continue;
            }

            if t == TokenType::Word || t == TokenType::LBrace || t == TokenType::RBrace {
                let token = self.advance();

                // Assignment prefixes are only recognised before the command
                // name; afterwards VAR=x is an ordinary argument.
                if name.is_none() && !token.quoted {
                    if let Some((var, append, value_text)) = word::split_assignment(&token.value)
                    {
                        let value = if value_text.is_empty() {
                            None
                        } else {
                            Some(word::parse_word(value_text, token.line, token.column)?)
                        };
                        assignments.push(AssignmentNode {
                            name: var.to_string(),
                            value,
                            append,
                        });
                        continue;
                    }
                }

                let w = word::parse_word(&token.value, token.line, token.column)?;
                if name.is_none() {
                    name = Some(w);
                } else {
                    args.push(w);
                }
                continue;
            }

            break;
        }

        if assignments.is_empty() && name.is_none() && redirections.is_empty() {
            return Err(self.unexpected("expected a command"));
        }

        Ok(SimpleCommandNode {
            assignments,
            name,
            args,
            redirections,
            line,
        })
    }

    /// Parse one redirection, with the operator at the current position.
    pub(crate) fn parse_redirection(
        &mut self,
        fd: Option<i32>,
    ) -> Result<RedirectionNode, ParseException> {
        let op_token = self.advance();
        let operator = match op_token.token_type {
            TokenType::Less => RedirectionOperator::Less,
            TokenType::Great => RedirectionOperator::Great,
            TokenType::DGreat => RedirectionOperator::DGreat,
            TokenType::GreatAnd => RedirectionOperator::GreatAnd,
            TokenType::LessAnd => RedirectionOperator::LessAnd,
            TokenType::Clobber => RedirectionOperator::Clobber,
            TokenType::AndGreat => RedirectionOperator::AndGreat,
            TokenType::AndDGreat => RedirectionOperator::AndDGreat,
            TokenType::TLess => RedirectionOperator::TLess,
            TokenType::DLess => RedirectionOperator::DLess,
            TokenType::DLessDash => RedirectionOperator::DLessDash,
            _ => {
                return Err(ParseException::at_token(
                    format!("'{}' is not a redirection operator", op_token.value),
                    &op_token,
                ))
            }
        };

        if matches!(
            operator,
            RedirectionOperator::DLess | RedirectionOperator::DLessDash
        ) {
            // The delimiter word was emitted by the lexer right after the
            // operator; the body sits in the collected list, in order.
            let delim = self.expect(TokenType::Word)?;
            let body = self
                .heredocs
                .get(self.heredoc_index)
                .cloned()
                .ok_or_else(|| {
                    ParseException::at_token("here-document has no body", &delim)
                })?;
            self.heredoc_index += 1;
            let content = word::parse_heredoc_body(&body.body, body.quoted, delim.line)?;
            return Ok(RedirectionNode {
                fd,
                operator,
                target: RedirectionTarget::HereDoc(HereDocNode {
                    delimiter: body.delimiter,
                    content,
                    strip_tabs: body.strip_tabs,
                    quoted: body.quoted,
                }),
            });
        }

        let target_token = match self.current_type() {
            TokenType::Word | TokenType::Number | TokenType::LBrace | TokenType::RBrace => {
                self.advance()
            }
            _ => return Err(self.unexpected("expected a redirection target")),
        };
        let target = word::parse_word(&target_token.value, target_token.line, target_token.column)?;
        Ok(RedirectionNode {
            fd,
            operator,
            target: RedirectionTarget::Word(target),
        })
    }

    /// Redirections trailing a compound command's closing token.
    pub(crate) fn parse_trailing_redirections(
        &mut self,
    ) -> Result<Vec<RedirectionNode>, ParseException> {
        let mut redirections = Vec::new();
        loop {
            let t = self.current_type();
            if t == TokenType::Number {
                let next = self
                    .tokens
                    .get(self.pos + 1)
                    .map(|t| t.token_type)
                    .unwrap_or(TokenType::Eof);
                if is_redirection_token(next) {
                    let fd_token = self.advance();
                    let fd: i32 = fd_token.value.parse().map_err(|_| {
                        ParseException::at_token("file descriptor out of range", &fd_token)
                    })?;
                    redirections.push(self.parse_redirection(Some(fd))?);
                    continue;
                }
                break;
            }
            if is_redirection_token(t) {
                redirections.push(self.parse_redirection(None)?);
                continue;
            }
            break;
        }
        Ok(redirections)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::parse;

    fn first_statement(input: &str) -> StatementNode {
        parse(input).unwrap().statements.remove(0)
    }

    fn simple(cmd: &CommandNode) -> &SimpleCommandNode {
        match cmd {
            CommandNode::Simple(s) => s,
            other => panic!("expected simple command, got {:?}", other),
        }
    }

    #[test]
    fn parses_simple_command() {
        let stmt = first_statement("echo hello world");
        let cmd = simple(&stmt.pipelines[0].commands[0]);
        assert_eq!(cmd.name.as_ref().unwrap().as_bare_literal(), Some("echo"));
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn parses_pipeline() {
        let stmt = first_statement("a | b | c");
        assert_eq!(stmt.pipelines[0].commands.len(), 3);
    }

    #[test]
    fn parses_and_or_chain() {
        let stmt = first_statement("false && echo X || echo Y");
        assert_eq!(stmt.pipelines.len(), 3);
        assert_eq!(
            stmt.operators,
            vec![StatementOperator::And, StatementOperator::Or]
        );
    }

    #[test]
    fn semicolon_splits_statements() {
        let script = parse("a; b; c").unwrap();
        assert_eq!(script.statements.len(), 3);
    }

    #[test]
    fn background_statement() {
        let script = parse("sleep 1 & echo done").unwrap();
        assert_eq!(script.statements.len(), 2);
        assert!(script.statements[0].background);
        assert!(!script.statements[1].background);
    }

    #[test]
    fn negated_pipeline() {
        let stmt = first_statement("! true");
        assert!(stmt.pipelines[0].negated);
    }

    #[test]
    fn timed_pipeline() {
        let stmt = first_statement("time sleep 1");
        assert!(stmt.pipelines[0].timed);
    }

    #[test]
    fn assignment_prefixes() {
        let stmt = first_statement("FOO=1 BAR=2 env");
        let cmd = simple(&stmt.pipelines[0].commands[0]);
        assert_eq!(cmd.assignments.len(), 2);
        assert_eq!(cmd.assignments[0].name, "FOO");
        assert_eq!(cmd.name.as_ref().unwrap().as_bare_literal(), Some("env"));
    }

    #[test]
    fn assignment_only_command() {
        let stmt = first_statement("X=42");
        let cmd = simple(&stmt.pipelines[0].commands[0]);
        assert!(cmd.name.is_none());
        assert_eq!(cmd.assignments.len(), 1);
    }

    #[test]
    fn assignment_after_name_is_argument() {
        let stmt = first_statement("env FOO=1");
        let cmd = simple(&stmt.pipelines[0].commands[0]);
        assert!(cmd.assignments.is_empty());
        assert_eq!(cmd.args.len(), 1);
    }

    #[test]
    fn fd_redirection() {
        let stmt = first_statement("cmd 2> err.log");
        let cmd = simple(&stmt.pipelines[0].commands[0]);
        assert_eq!(cmd.redirections.len(), 1);
        assert_eq!(cmd.redirections[0].fd, Some(2));
        assert_eq!(
            cmd.redirections[0].operator,
            RedirectionOperator::Great
        );
    }

    #[test]
    fn plain_number_is_a_word() {
        let stmt = first_statement("echo 2");
        let cmd = simple(&stmt.pipelines[0].commands[0]);
        assert_eq!(cmd.args[0].as_bare_literal(), Some("2"));
    }

    #[test]
    fn heredoc_redirection() {
        let script = parse("cat <<EOF\nhello\nEOF\n").unwrap();
        let cmd = simple(&script.statements[0].pipelines[0].commands[0]);
        match &cmd.redirections[0].target {
            RedirectionTarget::HereDoc(h) => {
                assert_eq!(h.delimiter, "EOF");
                assert!(!h.quoted);
            }
            other => panic!("expected heredoc, got {:?}", other),
        }
    }

    #[test]
    fn reserved_word_only_in_command_position() {
        // `for` as an argument is an ordinary word.
        let stmt = first_statement("echo for while");
        let cmd = simple(&stmt.pipelines[0].commands[0]);
        assert_eq!(cmd.args.len(), 2);
    }

    #[test]
    fn chain_continues_after_newline() {
        let script = parse("true &&\nfalse").unwrap();
        assert_eq!(script.statements.len(), 1);
        assert_eq!(script.statements[0].pipelines.len(), 2);
    }

    #[test]
    fn syntax_error_reports_position() {
        let err = parse("echo |").unwrap_err();
        assert!(err.unexpected_eof);
        let err = parse("| echo").unwrap_err();
        assert!(!err.unexpected_eof);
    }

    #[test]
    fn stderr_pipe() {
        let stmt = first_statement("make |& tee log");
        assert_eq!(stmt.pipelines[0].stderr_pipes, vec![true]);
    }

    #[test]
    fn source_text_recorded() {
        let stmt = first_statement("echo hi");
        assert_eq!(stmt.source_text.as_deref(), Some("echo hi"));
    }

    #[test]
    fn printed_form_reparses_to_the_same_tree() {
        let inputs = [
            "echo hello world",
            "a | b | c",
            "false && echo X || echo Y",
            "! grep -q x file",
            "FOO=1 env > out.txt 2>&1",
            "if true; then echo a; elif false; then echo b; else echo c; fi",
            "for i in 1 2 3; do echo $i; done",
            "while test -f lock; do sleep 1; done",
            "case $x in a|b) echo ab ;; *) echo other ;; esac",
            "f() { echo hi; }",
            "( cd /tmp; pwd ) &",
            "echo ${HOME:-/root} $((1 + 2)) $(date)",
        ];
        for input in inputs {
            let first = parse(input).unwrap();
            let printed = first.to_string();
            let second = parse(&printed).unwrap();
            assert_eq!(
                printed,
                second.to_string(),
                "round-trip diverged for {:?}",
                input
            );
        }
    }
}

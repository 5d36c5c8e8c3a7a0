//! AST Source Printer
//!
//! Renders AST nodes back to single-line source form. The output is
//! whitespace-normalized, not byte-identical to the input: reparsing the
//! printed form yields the same AST. Here-document bodies are printed
//! inline after the chain they belong to.

use std::fmt;

use super::types::*;

fn write_body(f: &mut fmt::Formatter<'_>, body: &[StatementNode]) -> fmt::Result {
    for (i, stmt) in body.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", stmt)?;
        if !stmt.background {
            write!(f, ";")?;
        }
    }
    Ok(())
}

fn write_redirs(f: &mut fmt::Formatter<'_>, redirs: &[RedirectionNode]) -> fmt::Result {
    for r in redirs {
        write!(f, " {}", r)?;
    }
    Ok(())
}

impl fmt::Display for ScriptNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_body(f, &self.statements)
    }
}

impl fmt::Display for StatementNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, pipeline) in self.pipelines.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", self.operators[i - 1])?;
            }
            write!(f, "{}", pipeline)?;
        }
        if self.background {
            write!(f, " &")?;
        }
        Ok(())
    }
}

impl fmt::Display for PipelineNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            write!(f, "! ")?;
        }
        if self.timed {
            write!(f, "time ")?;
        }
        for (i, cmd) in self.commands.iter().enumerate() {
            if i > 0 {
                let stderr_too = self.stderr_pipes.get(i - 1).copied().unwrap_or(false);
                f.write_str(if stderr_too { " |& " } else { " | " })?;
            }
            write!(f, "{}", cmd)?;
        }
        Ok(())
    }
}

impl fmt::Display for CommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple(c) => write!(f, "{}", c),
            Self::Compound(c) => write!(f, "{}", c),
            Self::FunctionDef(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for SimpleCommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for a in &self.assignments {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{}", a)?;
        }
        if let Some(name) = &self.name {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{}", name)?;
        }
        for arg in &self.args {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{}", arg)?;
        }
        for r in &self.redirections {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            write!(f, "{}", r)?;
        }
        Ok(())
    }
}

impl fmt::Display for CompoundCommandNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::If(n) => {
                for (i, clause) in n.clauses.iter().enumerate() {
                    write!(f, "{} ", if i == 0 { "if" } else { "elif" })?;
                    write_body(f, &clause.condition)?;
                    write!(f, " then ")?;
                    write_body(f, &clause.body)?;
                    write!(f, " ")?;
                }
                if let Some(else_body) = &n.else_body {
                    write!(f, "else ")?;
                    write_body(f, else_body)?;
                    write!(f, " ")?;
                }
                write!(f, "fi")?;
                write_redirs(f, &n.redirections)
            }
            Self::For(n) => {
                write!(f, "for {}", n.variable)?;
                if let Some(words) = &n.words {
                    write!(f, " in")?;
                    for w in words {
                        write!(f, " {}", w)?;
                    }
                }
                write!(f, "; do ")?;
                write_body(f, &n.body)?;
                write!(f, " done")?;
                write_redirs(f, &n.redirections)
            }
            Self::CStyleFor(n) => {
                write!(f, "for ((")?;
                if let Some(e) = &n.init {
                    write!(f, "{}", e)?;
                }
                write!(f, "; ")?;
                if let Some(e) = &n.condition {
                    write!(f, "{}", e)?;
                }
                write!(f, "; ")?;
                if let Some(e) = &n.update {
                    write!(f, "{}", e)?;
                }
                write!(f, ")); do ")?;
                write_body(f, &n.body)?;
                write!(f, " done")?;
                write_redirs(f, &n.redirections)
            }
            Self::While(n) => {
                write!(f, "while ")?;
                write_body(f, &n.condition)?;
                write!(f, " do ")?;
                write_body(f, &n.body)?;
                write!(f, " done")?;
                write_redirs(f, &n.redirections)
            }
            Self::Until(n) => {
                write!(f, "until ")?;
                write_body(f, &n.condition)?;
                write!(f, " do ")?;
                write_body(f, &n.body)?;
                write!(f, " done")?;
                write_redirs(f, &n.redirections)
            }
            Self::Case(n) => {
                write!(f, "case {} in ", n.word)?;
                for item in &n.items {
                    for (i, p) in item.patterns.iter().enumerate() {
                        if i > 0 {
                            write!(f, "|")?;
                        }
                        write!(f, "{}", p)?;
                    }
                    write!(f, ") ")?;
                    write_body(f, &item.body)?;
                    write!(f, " {} ", item.terminator)?;
                }
                write!(f, "esac")?;
                write_redirs(f, &n.redirections)
            }
            Self::Select(n) => {
                write!(f, "select {}", n.variable)?;
                if let Some(words) = &n.words {
                    write!(f, " in")?;
                    for w in words {
                        write!(f, " {}", w)?;
                    }
                }
                write!(f, "; do ")?;
                write_body(f, &n.body)?;
                write!(f, " done")?;
                write_redirs(f, &n.redirections)
            }
            Self::Subshell(n) => {
                write!(f, "( ")?;
                write_body(f, &n.body)?;
                write!(f, " )")?;
                write_redirs(f, &n.redirections)
            }
            Self::Group(n) => {
                write!(f, "{{ ")?;
                write_body(f, &n.body)?;
                write!(f, " }}")?;
                write_redirs(f, &n.redirections)
            }
        }
    }
}

impl fmt::Display for FunctionDefNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}() {}", self.name, self.body)?;
        write_redirs(f, &self.redirections)
    }
}

impl fmt::Display for AssignmentNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}=", self.name, if self.append { "+" } else { "" })?;
        if let Some(v) = &self.value {
            write!(f, "{}", v)?;
        }
        Ok(())
    }
}

impl fmt::Display for RedirectionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(fd) = self.fd {
            write!(f, "{}", fd)?;
        }
        write!(f, "{}", self.operator)?;
        match &self.target {
            RedirectionTarget::Word(w) => write!(f, "{}", w),
            RedirectionTarget::HereDoc(h) => write!(f, "{}", h.delimiter),
        }
    }
}

impl fmt::Display for WordNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for part in &self.parts {
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl fmt::Display for WordPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(s) => write!(f, "{}", s),
            Self::SingleQuoted(s) => write!(f, "'{}'", s),
            Self::DoubleQuoted(parts) => {
                write!(f, "\"")?;
                for p in parts {
                    write!(f, "{}", p)?;
                }
                write!(f, "\"")
            }
            Self::Escaped(s) => write!(f, "\\{}", s),
            Self::Parameter(p) => write!(f, "{}", p),
            Self::CommandSubst(c) => {
                if c.backtick {
                    write!(f, "`{}`", c.body)
                } else {
                    write!(f, "$({})", c.body)
                }
            }
            Self::Arithmetic(e) => write!(f, "$(({}))", e),
            Self::ProcessSubst(p) => {
                let arrow = match p.direction {
                    ProcessDirection::Input => "<",
                    ProcessDirection::Output => ">",
                };
                write!(f, "{}({})", arrow, p.body)
            }
            Self::Brace(b) => write!(f, "{}", b),
            Self::Tilde(user) => match user {
                Some(u) => write!(f, "~{}", u),
                None => write!(f, "~"),
            },
        }
    }
}

impl fmt::Display for ParameterPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(op) = &self.op else {
            return write!(f, "${{{}}}", self.name);
        };
        match op {
            ParameterOp::Length => write!(f, "${{#{}}}", self.name),
            ParameterOp::DefaultValue { word, check_empty } => {
                write!(
                    f,
                    "${{{}{}-{}}}",
                    self.name,
                    if *check_empty { ":" } else { "" },
                    word
                )
            }
            ParameterOp::AssignDefault { word, check_empty } => {
                write!(
                    f,
                    "${{{}{}={}}}",
                    self.name,
                    if *check_empty { ":" } else { "" },
                    word
                )
            }
            ParameterOp::ErrorIfUnset { word, check_empty } => {
                write!(f, "${{{}{}?", self.name, if *check_empty { ":" } else { "" })?;
                if let Some(w) = word {
                    write!(f, "{}", w)?;
                }
                write!(f, "}}")
            }
            ParameterOp::UseAlternative { word, check_empty } => {
                write!(
                    f,
                    "${{{}{}+{}}}",
                    self.name,
                    if *check_empty { ":" } else { "" },
                    word
                )
            }
            ParameterOp::Substring { offset, length } => {
                write!(f, "${{{}:{}", self.name, offset)?;
                if let Some(len) = length {
                    write!(f, ":{}", len)?;
                }
                write!(f, "}}")
            }
            ParameterOp::Trim {
                pattern,
                side,
                longest,
            } => {
                let mark = match (side, longest) {
                    (TrimSide::Prefix, false) => "#",
                    (TrimSide::Prefix, true) => "##",
                    (TrimSide::Suffix, false) => "%",
                    (TrimSide::Suffix, true) => "%%",
                };
                write!(f, "${{{}{}{}}}", self.name, mark, pattern)
            }
            ParameterOp::Replace {
                pattern,
                replacement,
                all,
            } => {
                write!(f, "${{{}/{}{}", self.name, if *all { "/" } else { "" }, pattern)?;
                if let Some(rep) = replacement {
                    write!(f, "/{}", rep)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for BracePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Self::Range(r) => {
                write!(f, "{{")?;
                match (r.start, r.pad_width) {
                    (BraceEndpoint::Number(n), Some(w)) => write!(f, "{:0width$}", n, width = w)?,
                    (BraceEndpoint::Number(n), None) => write!(f, "{}", n)?,
                    (BraceEndpoint::Char(c), _) => write!(f, "{}", c)?,
                }
                write!(f, "..")?;
                match (r.end, r.pad_width) {
                    (BraceEndpoint::Number(n), Some(w)) => write!(f, "{:0width$}", n, width = w)?,
                    (BraceEndpoint::Number(n), None) => write!(f, "{}", n)?,
                    (BraceEndpoint::Char(c), _) => write!(f, "{}", c)?,
                }
                if let Some(step) = r.step {
                    write!(f, "..{}", step)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Variable(name) => write!(f, "{}", name),
            Self::Unary {
                op,
                operand,
                prefix,
            } => {
                let sym = match op {
                    ArithUnaryOp::Neg => "-",
                    ArithUnaryOp::Pos => "+",
                    ArithUnaryOp::Not => "!",
                    ArithUnaryOp::BitNot => "~",
                    ArithUnaryOp::Inc => "++",
                    ArithUnaryOp::Dec => "--",
                };
                if *prefix {
                    write!(f, "{}{}", sym, operand)
                } else {
                    write!(f, "{}{}", operand, sym)
                }
            }
            Self::Binary { op, left, right } => {
                let sym = match op {
                    ArithBinaryOp::Add => "+",
                    ArithBinaryOp::Sub => "-",
                    ArithBinaryOp::Mul => "*",
                    ArithBinaryOp::Div => "/",
                    ArithBinaryOp::Mod => "%",
                    ArithBinaryOp::Pow => "**",
                    ArithBinaryOp::Shl => "<<",
                    ArithBinaryOp::Shr => ">>",
                    ArithBinaryOp::Lt => "<",
                    ArithBinaryOp::Le => "<=",
                    ArithBinaryOp::Gt => ">",
                    ArithBinaryOp::Ge => ">=",
                    ArithBinaryOp::Eq => "==",
                    ArithBinaryOp::Ne => "!=",
                    ArithBinaryOp::BitAnd => "&",
                    ArithBinaryOp::BitOr => "|",
                    ArithBinaryOp::BitXor => "^",
                    ArithBinaryOp::LogAnd => "&&",
                    ArithBinaryOp::LogOr => "||",
                    ArithBinaryOp::Comma => ",",
                };
                write!(f, "{} {} {}", left, sym, right)
            }
            Self::Ternary {
                condition,
                consequent,
                alternate,
            } => write!(f, "{} ? {} : {}", condition, consequent, alternate),
            Self::Assignment { op, name, value } => {
                let sym = match op {
                    ArithAssignOp::Assign => "=",
                    ArithAssignOp::Add => "+=",
                    ArithAssignOp::Sub => "-=",
                    ArithAssignOp::Mul => "*=",
                    ArithAssignOp::Div => "/=",
                    ArithAssignOp::Mod => "%=",
                    ArithAssignOp::Shl => "<<=",
                    ArithAssignOp::Shr => ">>=",
                    ArithAssignOp::And => "&=",
                    ArithAssignOp::Or => "|=",
                    ArithAssignOp::Xor => "^=",
                };
                write!(f, "{} {} {}", name, sym, value)
            }
            Self::Group(inner) => write!(f, "({})", inner),
        }
    }
}

//! test / [ Builtin
//!
//! Classic conditional expressions: file tests, string tests, numeric
//! comparisons, `!` negation, `-a`/`-o` connectives, and parentheses.

use std::os::unix::fs::FileTypeExt;
use std::os::unix::fs::MetadataExt;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use crate::exec::Exec;
use crate::state::ShellState;

pub fn test(state: &mut ShellState, args: &[String]) -> Exec {
    run(state, args)
}

pub fn bracket(state: &mut ShellState, args: &[String]) -> Exec {
    match args.last() {
        Some(last) if last == "]" => run(state, &args[..args.len() - 1]),
        _ => {
            eprintln!("den: [: missing `]'");
            Ok(2)
        }
    }
}

fn run(_state: &mut ShellState, args: &[String]) -> Exec {
    if args.is_empty() {
        return Ok(1);
    }
    let mut parser = TestParser { args, pos: 0 };
    match parser.parse_or() {
        Ok(value) => {
            if parser.pos != args.len() {
                eprintln!("den: test: too many arguments");
                return Ok(2);
            }
            Ok(if value { 0 } else { 1 })
        }
        Err(message) => {
            eprintln!("den: test: {}", message);
            Ok(2)
        }
    }
}

struct TestParser<'a> {
    args: &'a [String],
    pos: usize,
}

impl<'a> TestParser<'a> {
    fn current(&self) -> Option<&'a str> {
        self.args.get(self.pos).map(|s| s.as_str())
    }

    fn advance(&mut self) -> Option<&'a str> {
        let value = self.current();
        if value.is_some() {
            self.pos += 1;
        }
        value
    }

    fn parse_or(&mut self) -> Result<bool, String> {
        let mut value = self.parse_and()?;
        while self.current() == Some("-o") {
            self.advance();
            let rhs = self.parse_and()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn parse_and(&mut self) -> Result<bool, String> {
        let mut value = self.parse_term()?;
        while self.current() == Some("-a") {
            self.advance();
            let rhs = self.parse_term()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn parse_term(&mut self) -> Result<bool, String> {
        match self.current() {
            Some("!") => {
                self.advance();
                Ok(!self.parse_term()?)
            }
            Some("(") => {
                self.advance();
                let value = self.parse_or()?;
                if self.advance() != Some(")") {
                    return Err("missing `)'".to_string());
                }
                Ok(value)
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<bool, String> {
        let Some(first) = self.advance() else {
            return Err("argument expected".to_string());
        };

        // Unary operators.
        if first.len() == 2 && first.starts_with('-') && self.current().is_some() {
            if let Some(result) = unary(first, self.current().unwrap()) {
                self.advance();
                return Ok(result);
            }
        }

        // Binary operators.
        if let Some(op) = self.current() {
            if is_binary_op(op) {
                let op = self.advance().unwrap();
                let Some(rhs) = self.advance() else {
                    return Err(format!("{}: argument expected", op));
                };
                return binary(first, op, rhs);
            }
        }

        // A lone word is true when non-empty.
        Ok(!first.is_empty())
    }
}

fn is_binary_op(op: &str) -> bool {
    matches!(
        op,
        "=" | "==" | "!=" | "<" | ">" | "-eq" | "-ne" | "-lt" | "-le" | "-gt" | "-ge" | "-nt"
            | "-ot" | "-ef"
    )
}

fn parse_num(text: &str) -> Result<i64, String> {
    text.trim()
        .parse::<i64>()
        .map_err(|_| format!("{}: integer expression expected", text))
}

fn binary(lhs: &str, op: &str, rhs: &str) -> Result<bool, String> {
    Ok(match op {
        "=" | "==" => lhs == rhs,
        "!=" => lhs != rhs,
        "<" => lhs < rhs,
        ">" => lhs > rhs,
        "-eq" => parse_num(lhs)? == parse_num(rhs)?,
        "-ne" => parse_num(lhs)? != parse_num(rhs)?,
        "-lt" => parse_num(lhs)? < parse_num(rhs)?,
        "-le" => parse_num(lhs)? <= parse_num(rhs)?,
        "-gt" => parse_num(lhs)? > parse_num(rhs)?,
        "-ge" => parse_num(lhs)? >= parse_num(rhs)?,
        "-nt" => mtime(lhs) > mtime(rhs),
        "-ot" => mtime(lhs) < mtime(rhs) && Path::new(rhs).exists(),
        "-ef" => same_file(lhs, rhs),
        _ => return Err(format!("{}: unknown operator", op)),
    })
}

fn mtime(path: &str) -> i64 {
    std::fs::metadata(path).map(|m| m.mtime()).unwrap_or(i64::MIN)
}

fn same_file(a: &str, b: &str) -> bool {
    match (std::fs::metadata(a), std::fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => ma.dev() == mb.dev() && ma.ino() == mb.ino(),
        _ => false,
    }
}

fn unary(op: &str, operand: &str) -> Option<bool> {
    let path = Path::new(operand);
    Some(match op {
        "-z" => operand.is_empty(),
        "-n" => !operand.is_empty(),
        "-e" => path.symlink_metadata().is_ok(),
        "-f" => path.is_file(),
        "-d" => path.is_dir(),
        "-L" | "-h" => path
            .symlink_metadata()
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false),
        "-s" => path.metadata().map(|m| m.len() > 0).unwrap_or(false),
        "-r" => nix::unistd::access(path, nix::unistd::AccessFlags::R_OK).is_ok(),
        "-w" => nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok(),
        "-x" => nix::unistd::access(path, nix::unistd::AccessFlags::X_OK).is_ok(),
        "-p" => path
            .metadata()
            .map(|m| m.file_type().is_fifo())
            .unwrap_or(false),
        "-S" => path
            .metadata()
            .map(|m| m.file_type().is_socket())
            .unwrap_or(false),
        "-b" => path
            .metadata()
            .map(|m| m.file_type().is_block_device())
            .unwrap_or(false),
        "-c" => path
            .metadata()
            .map(|m| m.file_type().is_char_device())
            .unwrap_or(false),
        "-u" => path
            .metadata()
            .map(|m| m.permissions().mode() & 0o4000 != 0)
            .unwrap_or(false),
        "-g" => path
            .metadata()
            .map(|m| m.permissions().mode() & 0o2000 != 0)
            .unwrap_or(false),
        "-k" => path
            .metadata()
            .map(|m| m.permissions().mode() & 0o1000 != 0)
            .unwrap_or(false),
        "-t" => operand
            .parse::<i32>()
            .map(|fd| unsafe { libc::isatty(fd) == 1 })
            .unwrap_or(false),
        _ => return None,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn check(args: &[&str]) -> i32 {
        let mut state = ShellState::new("den");
        let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        test(&mut state, &args).unwrap()
    }

    #[test]
    fn string_tests() {
        assert_eq!(check(&["-z", ""]), 0);
        assert_eq!(check(&["-z", "x"]), 1);
        assert_eq!(check(&["-n", "x"]), 0);
        assert_eq!(check(&["abc", "=", "abc"]), 0);
        assert_eq!(check(&["abc", "!=", "abc"]), 1);
        assert_eq!(check(&["abc"]), 0);
        assert_eq!(check(&[""]), 1);
    }

    #[test]
    fn numeric_tests() {
        assert_eq!(check(&["3", "-eq", "3"]), 0);
        assert_eq!(check(&["3", "-lt", "5"]), 0);
        assert_eq!(check(&["5", "-le", "4"]), 1);
        assert_eq!(check(&["junk", "-eq", "3"]), 2);
    }

    #[test]
    fn negation_and_connectives() {
        assert_eq!(check(&["!", "-z", "x"]), 0);
        assert_eq!(check(&["x", "-a", "y"]), 0);
        assert_eq!(check(&["x", "-a", ""]), 1);
        assert_eq!(check(&["", "-o", "y"]), 0);
        assert_eq!(check(&["(", "x", ")"]), 0);
    }

    #[test]
    fn file_tests() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        std::fs::write(&file, "data").unwrap();
        let file = file.to_string_lossy().into_owned();
        let dirpath = dir.path().to_string_lossy().into_owned();

        assert_eq!(check(&["-e", &file]), 0);
        assert_eq!(check(&["-f", &file]), 0);
        assert_eq!(check(&["-d", &file]), 1);
        assert_eq!(check(&["-d", &dirpath]), 0);
        assert_eq!(check(&["-s", &file]), 0);
        assert_eq!(check(&["-e", "/no/such/path"]), 1);
    }

    #[test]
    fn bracket_requires_closer() {
        let mut state = ShellState::new("den");
        let args: Vec<String> = vec!["x".into()];
        assert_eq!(bracket(&mut state, &args).unwrap(), 2);
        let args: Vec<String> = vec!["x".into(), "]".into()];
        assert_eq!(bracket(&mut state, &args).unwrap(), 0);
    }

    #[test]
    fn empty_test_is_false() {
        assert_eq!(check(&[]), 1);
    }
}

//! Drivers for the `calc` binary.
use calc_core::{self as core, Environment, Kind, ParseError, eval};
use std::{
    fs,
    io::{self, BufRead, Write},
    path::{Path, PathBuf},
};

pub const USAGE: &str = "Usage: calc [--tree] [FILE]";
pub const BANNER: &str = "Type quit to exit.";
pub const PROMPT: &str = "calc> ";

/// Prompt while a multi-line construct is incomplete.
pub const PROMPT_CONTINUE: &str = "...> ";
pub const QUIT: &str = "quit";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Options {
    /// Print the parse tree of each program before running it.
    pub tree: bool,

    /// Print usage and exit.
    pub help: bool,

    /// Program to run.
    /// `None` starts an interactive session.
    pub file: Option<PathBuf>,
}

impl Options {
    /// Parse command line arguments, excluding the program name.
    pub fn from_args<I>(args: I) -> Result<Self, error::Usage>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let mut options = Self::default();
        for arg in args {
            let arg = arg.into();
            match arg.as_str() {
                "--tree" | "-t" => options.tree = true,
                "--help" | "-h" => options.help = true,
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(error::Usage::UnknownOption(arg));
                }
                _ => {
                    if options.file.is_some() {
                        return Err(error::Usage::TooManyArguments);
                    }
                    options.file = Some(PathBuf::from(arg));
                }
            }
        }

        Ok(options)
    }
}

/// Run the program in a file in a fresh environment.
///
/// # Errors
/// + [`error::Run::Open`] if the file can not be read.
/// + [`error::Run::Program`] if the program fails to parse or evaluate.
pub fn run_file<W>(path: impl AsRef<Path>, tree: bool, out: &mut W) -> Result<(), error::Run>
where
    W: Write + ?Sized,
{
    let path = path.as_ref();
    let Ok(src) = fs::read_to_string(path) else {
        return Err(error::Run::Open(path.to_path_buf()));
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(path = %path.display(), "run");

    run_source(&src, tree, out)
}

/// Parse the whole source, then evaluate it in a fresh environment.
pub fn run_source<W>(src: &str, tree: bool, out: &mut W) -> Result<(), error::Run>
where
    W: Write + ?Sized,
{
    let program = core::parse(src).map_err(core::Error::from)?;
    if tree {
        write!(out, "{}", program.tree())?;
    }

    let env = Environment::new();
    eval::eval_program(&program, &env, out).map_err(core::Error::from)?;
    Ok(())
}

/// Interactive session.
///
/// Each line is a program run in an environment shared by the whole session.
/// A line which leaves a construct open, failing to parse only at the end of input,
/// is continued on the following lines. An empty continuation line abandons it.
/// Program failures are reported to `err` and the session continues.
///
/// # Errors
/// + If `input` can not be read or `out` or `err` can not be written.
pub fn repl<R, W, E>(input: R, out: &mut W, err: &mut E, tree: bool) -> io::Result<()>
where
    R: BufRead,
    W: Write + ?Sized,
    E: Write + ?Sized,
{
    let env = Environment::new();
    let mut lines = input.lines();
    let mut buffer = String::new();
    let mut pending: Option<ParseError> = None;

    writeln!(out, "{BANNER}")?;
    loop {
        let prompt = if buffer.is_empty() {
            PROMPT
        } else {
            PROMPT_CONTINUE
        };
        write!(out, "{prompt}")?;
        out.flush()?;

        let Some(line) = lines.next() else {
            writeln!(out)?;
            break;
        };
        let line = line?;

        if let Some(error) = pending.take() {
            if line.trim().is_empty() {
                #[cfg(feature = "tracing")]
                tracing::debug!(lines = buffer.lines().count(), "abandon");

                writeln!(err, "{error}")?;
                buffer.clear();
                continue;
            }
        } else if line.trim() == QUIT {
            break;
        }

        buffer.push_str(&line);
        buffer.push('\n');

        let program = match core::parse(&buffer) {
            Ok(program) => program,
            Err(error) if error.token.is(Kind::Eof) => {
                pending = Some(error);
                continue;
            }
            Err(error) => {
                writeln!(err, "{error}")?;
                buffer.clear();
                continue;
            }
        };
        buffer.clear();

        if tree {
            write!(out, "{}", program.tree())?;
        }

        if let Err(error) = eval::eval_program(&program, &env, out) {
            #[cfg(feature = "tracing")]
            tracing::debug!(%error);

            writeln!(err, "{error}")?;
        }
    }

    if let Some(error) = pending {
        writeln!(err, "{error}")?;
    }

    Ok(())
}

pub mod error {
    use std::{io, path::PathBuf};

    /// Invalid command line.
    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum Usage {
        #[error("unknown option `{0}`")]
        UnknownOption(String),

        #[error("too many arguments")]
        TooManyArguments,
    }

    #[derive(Debug, thiserror::Error, derive_more::From)]
    pub enum Run {
        #[from(skip)]
        #[error("Could not open {}", .0.display())]
        Open(PathBuf),

        #[error("{0}")]
        Program(calc_core::Error),

        /// Output could not be written.
        #[error("{0}")]
        Io(io::Error),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn session(input: &str) -> (String, String) {
        let mut out = Vec::new();
        let mut err = Vec::new();
        repl(input.as_bytes(), &mut out, &mut err, false).expect("session to run");
        (
            String::from_utf8(out).expect("output to be utf-8"),
            String::from_utf8(err).expect("errors to be utf-8"),
        )
    }

    /// Output with the banner and prompts removed.
    fn printed(out: &str) -> String {
        out.strip_prefix(BANNER)
            .unwrap_or(out)
            .replace(PROMPT, "")
            .replace(PROMPT_CONTINUE, "")
            .trim_start_matches('\n')
            .to_string()
    }

    #[test]
    fn options_from_args() {
        let options = Options::from_args(Vec::<String>::new()).unwrap();
        assert_eq!(options, Options::default());

        let options = Options::from_args(["prog.calc"]).unwrap();
        assert_eq!(options.file, Some(PathBuf::from("prog.calc")));
        assert!(!options.tree);

        let options = Options::from_args(["--tree", "prog.calc"]).unwrap();
        assert!(options.tree);
        assert_eq!(options.file, Some(PathBuf::from("prog.calc")));

        let options = Options::from_args(["-h"]).unwrap();
        assert!(options.help);

        assert_eq!(
            Options::from_args(["a.calc", "b.calc"]),
            Err(error::Usage::TooManyArguments)
        );
        assert_eq!(
            Options::from_args(["--verbose"]),
            Err(error::Usage::UnknownOption("--verbose".to_string()))
        );
    }

    #[test]
    fn run_source_output() {
        let mut out = Vec::new();
        let src = "integer x\nx = 0\nwhile x != 3\nx = x + 1\nend\nprint x\n";
        run_source(src, false, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "3\n");
    }

    #[test]
    fn run_source_tree() {
        let mut out = Vec::new();
        run_source("print 1 + 2\n", true, &mut out).unwrap();
        let expected = concat!(
            "  +PRINT: print\n",
            "  |  |--+INTLIT: 2\n",
            "  |--+PLUS: +\n",
            "  |  |--+INTLIT: 1\n",
            "PROGRAM\n",
            "3\n",
        );
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn run_source_errors() {
        let mut out = Vec::new();
        let err = run_source("1 +", false, &mut out).unwrap_err();
        assert!(matches!(err, error::Run::Program(core::Error::Parse(_))));
        assert_eq!(
            err.to_string(),
            "Unexpected Token EOF: \"\" Line: 1 Column: 3"
        );

        // output before the failure is kept
        let mut out = Vec::new();
        let err = run_source("print 1\nprint 1 / 0\n", false, &mut out).unwrap_err();
        assert!(matches!(err, error::Run::Program(core::Error::Runtime(_))));
        assert_eq!(String::from_utf8(out).unwrap(), "1\n");
    }

    #[test]
    fn run_file_missing() {
        let mut out = Vec::new();
        let path = std::env::temp_dir().join("calc-cli-test-missing.calc");
        let err = run_file(&path, false, &mut out).unwrap_err();
        assert!(matches!(err, error::Run::Open(_)));
        assert_eq!(err.to_string(), format!("Could not open {}", path.display()));
    }

    #[test]
    fn repl_session() {
        let (out, err) = session("integer x\nx = 3\nprint x * 2\nquit\nprint 1\n");
        assert_eq!(out, format!("{BANNER}\n{PROMPT}{PROMPT}{PROMPT}6\n{PROMPT}"));
        assert_eq!(err, "");
    }

    #[test]
    fn repl_end_of_input() {
        let (out, err) = session("print 1.5\n");
        assert_eq!(out, format!("{BANNER}\n{PROMPT}1.5\n{PROMPT}\n"));
        assert_eq!(err, "");
    }

    #[test]
    fn repl_errors_continue() {
        let (out, err) = session("print y\n1 + * 2\ninteger y\ny = 2\nprint y\n");
        assert_eq!(printed(&out), "2\n\n");
        assert_eq!(
            err,
            "undeclared name `y` Line: 1 Column: 6\nUnexpected Token TIMES: \"*\" Line: 1 Column: 4\n"
        );
    }

    #[test]
    fn repl_continuation() {
        let input = "\
integer i
while i != 2
i = i + 1
print i
end
print i
";
        let (out, err) = session(input);
        assert_eq!(err, "");
        assert_eq!(printed(&out), "1\n2\n2\n\n");
        assert!(out.contains(PROMPT_CONTINUE));

        let input = "\
function sq(integer n) returns integer
n * n
end
print sq(4)
";
        let (out, err) = session(input);
        assert_eq!(err, "");
        assert_eq!(printed(&out), "16\n\n");
    }

    #[test]
    fn repl_abandon_continuation() {
        let (out, err) = session("while 1 == 1\n\nprint 5\n");
        assert_eq!(printed(&out), "5\n\n");
        assert_eq!(
            err,
            "Unexpected Token EOF: \"\" Line: 2 Column: 0\n"
        );

        // incomplete at end of input
        let (_, err) = session("if 1 == 1\nprint 2\n");
        assert!(err.starts_with("Unexpected Token EOF"));
    }

    #[test]
    fn repl_quit_ignored_in_continuation() {
        let (out, err) = session("integer quit\nif 1 == 1\nquit = 4\nend\nprint quit\nquit\n");
        assert_eq!(err, "");
        assert_eq!(printed(&out), "4\n");
    }

    #[test]
    fn repl_tree() {
        let mut out = Vec::new();
        let mut err = Vec::new();
        repl("7\n".as_bytes(), &mut out, &mut err, true).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("  +INTLIT: 7\nPROGRAM\n"));
    }
}

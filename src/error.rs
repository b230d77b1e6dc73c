use failure::{Backtrace, Context, Fail};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::result;

/// A type alias for handling errors throughout the pipeline.
pub type Result<T> = result::Result<T, Error>;

/// An error that can occur while building the registry or running a pipeline.
///
/// Validation errors (see `Error::is_validation`) are recovered by the pipeline
/// executor into a failed step. Every other kind is an infrastructure failure
/// and propagates to the caller.
#[derive(Debug)]
pub struct Error {
    ctx: Context<ErrorKind>,
}

impl Error {
    /// Return the kind of this error.
    pub fn kind(&self) -> &ErrorKind {
        self.ctx.get_context()
    }

    /// Whether this error is caused by the caller (bad compiler name, language
    /// chain mismatch, bad argument value) rather than by the environment.
    pub fn is_validation(&self) -> bool {
        match *self.kind() {
            ErrorKind::UnknownCompiler(_)
            | ErrorKind::IncompatibleInput { .. }
            | ErrorKind::InvalidArgument { .. } => true,
            _ => false,
        }
    }

    pub(crate) fn bug<T: AsRef<str>>(msg: T) -> Error {
        Error::from(ErrorKind::Bug(msg.as_ref().to_string()))
    }

    pub(crate) fn config<T: AsRef<str>>(msg: T) -> Error {
        Error::from(ErrorKind::Config(msg.as_ref().to_string()))
    }

    pub(crate) fn process<T: AsRef<str>>(msg: T) -> Error {
        Error::from(ErrorKind::Process(msg.as_ref().to_string()))
    }

    pub(crate) fn duplicate_compiler<T: AsRef<str>>(name: T) -> Error {
        Error::from(ErrorKind::DuplicateCompiler(name.as_ref().to_string()))
    }

    pub(crate) fn descriptor<T: AsRef<str>, U: AsRef<str>>(compiler: T, msg: U) -> Error {
        Error::from(ErrorKind::Descriptor {
            compiler: compiler.as_ref().to_string(),
            message: msg.as_ref().to_string(),
        })
    }

    pub(crate) fn unknown_compiler<T: AsRef<str>>(name: T) -> Error {
        Error::from(ErrorKind::UnknownCompiler(name.as_ref().to_string()))
    }

    pub(crate) fn incompatible_input<T: AsRef<str>, U: AsRef<str>>(
        compiler: T,
        language: U,
    ) -> Error {
        Error::from(ErrorKind::IncompatibleInput {
            compiler: compiler.as_ref().to_string(),
            language: language.as_ref().to_string(),
        })
    }

    pub(crate) fn invalid_argument<T, U, V>(compiler: T, parameter: U, value: V) -> Error
    where
        T: AsRef<str>,
        U: AsRef<str>,
        V: AsRef<str>,
    {
        Error::from(ErrorKind::InvalidArgument {
            compiler: compiler.as_ref().to_string(),
            parameter: parameter.as_ref().to_string(),
            value: value.as_ref().to_string(),
        })
    }
}

impl Fail for Error {
    fn cause(&self) -> Option<&dyn Fail> {
        self.ctx.cause()
    }

    fn backtrace(&self) -> Option<&Backtrace> {
        self.ctx.backtrace()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.ctx.fmt(f)
    }
}

/// The specific kind of error that can occur.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// An I/O error without a more specific context.
    Io,
    /// An error that occurred while operating on a file or directory.
    Path(PathBuf),
    /// An external tool could not be launched at all.
    Launch(PathBuf),
    /// An external tool was launched but could not be waited on or read.
    Process(String),
    /// An error in the configuration (file, environment, values).
    Config(String),
    /// A TOML or JSON document could not be parsed.
    Parse(String),
    /// Two adapters were registered with the same name.
    DuplicateCompiler(String),
    /// An adapter declaration is malformed.
    Descriptor { compiler: String, message: String },
    /// A step references a compiler that is not registered.
    UnknownCompiler(String),
    /// A step's compiler does not accept the language flowing into it.
    IncompatibleInput { compiler: String, language: String },
    /// A submitted argument is not an allowed value for its parameter.
    InvalidArgument {
        compiler: String,
        parameter: String,
        value: String,
    },
    /// An unexpected state that indicates a bug in an adapter or the engine.
    Bug(String),
}

impl ErrorKind {
    pub fn path<P: AsRef<Path>>(path: P) -> ErrorKind {
        ErrorKind::Path(path.as_ref().to_path_buf())
    }

    pub fn launch<P: AsRef<Path>>(path: P) -> ErrorKind {
        ErrorKind::Launch(path.as_ref().to_path_buf())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ErrorKind::Io => write!(f, "I/O error"),
            ErrorKind::Path(ref path) => write!(f, "{}", path.display()),
            ErrorKind::Launch(ref path) => {
                write!(f, "failed to launch external tool: {}", path.display())
            }
            ErrorKind::Process(ref msg) => write!(f, "process error: {}", msg),
            ErrorKind::Config(ref msg) => write!(f, "config error: {}", msg),
            ErrorKind::Parse(ref msg) => write!(f, "parse error: {}", msg),
            ErrorKind::DuplicateCompiler(ref name) => {
                write!(f, "compiler '{}' is registered more than once", name)
            }
            ErrorKind::Descriptor {
                ref compiler,
                ref message,
            } => write!(f, "invalid declaration for compiler '{}': {}", compiler, message),
            ErrorKind::UnknownCompiler(ref name) => write!(f, "unknown compiler '{}'", name),
            ErrorKind::IncompatibleInput {
                ref compiler,
                ref language,
            } => write!(
                f,
                "incompatible input: compiler '{}' does not accept '{}'",
                compiler, language
            ),
            ErrorKind::InvalidArgument {
                ref compiler,
                ref parameter,
                ref value,
            } => write!(
                f,
                "invalid value '{}' for parameter '{}' of compiler '{}'",
                value, parameter, compiler
            ),
            ErrorKind::Bug(ref msg) => {
                let report = "Please report this bug with a backtrace at \
                              https://github.com/gwihlidal/svc-shader";
                write!(f, "BUG: {}\n{}", msg, report)
            }
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::from(Context::new(kind))
    }
}

impl From<Context<ErrorKind>> for Error {
    fn from(ctx: Context<ErrorKind>) -> Error {
        Error { ctx }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::from(err.context(ErrorKind::Io))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Error {
        let msg = err.to_string();
        Error::from(err.context(ErrorKind::Parse(msg)))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        let msg = err.to_string();
        Error::from(err.context(ErrorKind::Parse(msg)))
    }
}

/// Render an error and its chain of causes on multiple lines.
pub fn pretty_error(err: &failure::Error) -> String {
    let mut pretty = err.to_string();
    let mut prev = err.as_fail();
    while let Some(next) = prev.cause() {
        pretty.push_str(": ");
        pretty.push_str(&next.to_string());
        prev = next;
    }
    pretty
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_kinds_are_classified() {
        assert!(Error::unknown_compiler("nope").is_validation());
        assert!(Error::incompatible_input("dxc", "GLSL").is_validation());
        assert!(Error::invalid_argument("dxc", "Optimization", "-O9").is_validation());
        assert!(!Error::config("bad").is_validation());
        assert!(!Error::from(ErrorKind::launch("/missing/tool")).is_validation());
    }

    #[test]
    fn messages_name_the_offender() {
        let err = Error::incompatible_input("spirv-cross", "HLSL");
        assert_eq!(
            err.to_string(),
            "incompatible input: compiler 'spirv-cross' does not accept 'HLSL'"
        );
        let err = Error::unknown_compiler("frobnicator");
        assert_eq!(err.to_string(), "unknown compiler 'frobnicator'");
    }

    #[test]
    fn io_errors_keep_their_cause() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = Error::from(io_err);
        assert_eq!(err.kind(), &ErrorKind::Io);
        let pretty = pretty_error(&failure::Error::from(err));
        assert!(pretty.contains("gone"));
    }
}

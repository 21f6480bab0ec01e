use std::fmt;
use std::path::PathBuf;

#[derive(Debug)]
pub enum AutoError {
    Parse { message: String, path: PathBuf },
    Runtime(String),
    TestFailed { failed: usize, errors: usize, aborted: Option<String> },
    Io(std::io::Error),
}

impl AutoError {
    pub fn exit_code(&self) -> i32 {
        match self {
            AutoError::Parse { .. } => 2,
            AutoError::Runtime(_) => 3,
            AutoError::TestFailed { .. } => 1,
            AutoError::Io(_) => 4,
        }
    }
}

impl fmt::Display for AutoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutoError::Parse { message, path } => {
                write!(f, "Parse error in {}: {}", path.display(), message)
            }
            AutoError::Runtime(message) => write!(f, "Runtime error: {}", message),
            AutoError::TestFailed { failed, errors, aborted } => {
                write!(f, "Test failed: {} failed step(s), {} error(s)", failed, errors)?;
                if let Some(reason) = aborted {
                    write!(f, ", aborted: {}", reason)?;
                }
                Ok(())
            }
            AutoError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for AutoError {}

impl From<std::io::Error> for AutoError {
    fn from(e: std::io::Error) -> Self {
        AutoError::Io(e)
    }
}

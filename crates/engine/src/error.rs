use {tendril_common::hooks::HookError, thiserror::Error};

#[derive(Debug, Error)]
pub enum Error {
    #[error("command {id} not found")]
    CommandNotFound { id: String },

    #[error("topic {name} not found")]
    TopicNotFound { name: String },

    /// A hook asked the process to exit.
    #[error("hook requested exit with code {code}")]
    HookExit { code: i32 },

    #[error(transparent)]
    Load(tendril_plugins::Error),

    #[error("command {id} failed: {source}")]
    Command {
        id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// The exit code requested by a hook, if this is an exit request.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::HookExit { code } => Some(*code),
            _ => None,
        }
    }
}

impl From<HookError> for Error {
    fn from(err: HookError) -> Self {
        tendril_plugins::Error::Hook(err).into()
    }
}

/// An exit request keeps its code; any other failure stays a load error.
impl From<tendril_plugins::Error> for Error {
    fn from(err: tendril_plugins::Error) -> Self {
        match err {
            tendril_plugins::Error::Hook(HookError::Exit { code }) => Self::HookExit { code },
            other => Self::Load(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_request_keeps_its_code() {
        let err = Error::from(HookError::exit(4));
        assert_eq!(err.exit_code(), Some(4));

        let err = Error::from(tendril_plugins::Error::Hook(HookError::exit(2)));
        assert!(matches!(err, Error::HookExit { code: 2 }));
    }

    #[test]
    fn generic_hook_failure_is_a_load_error() {
        let err = Error::from(HookError::Failed(anyhow::anyhow!("boom")));
        assert_eq!(err.exit_code(), None);
        assert!(matches!(
            err,
            Error::Load(tendril_plugins::Error::Hook(HookError::Failed(_)))
        ));
        assert!(err.to_string().contains("boom"));
    }
}

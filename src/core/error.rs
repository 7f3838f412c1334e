use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,
    ConfigInvalidJson,
    ConfigInvalidValue,

    ValidationInvalidArgument,

    EnvironmentNotFound,
    EnvironmentNotSelected,

    ReleaseNotFound,
    ReleaseNotGenerated,
    ReleaseNoPrevious,

    SshIdentityFileNotFound,

    RemoteCommandFailed,
    LocalCommandFailed,

    PipelineStepFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",
            ErrorCode::ConfigInvalidJson => "config.invalid_json",
            ErrorCode::ConfigInvalidValue => "config.invalid_value",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::EnvironmentNotFound => "environment.not_found",
            ErrorCode::EnvironmentNotSelected => "environment.not_selected",

            ErrorCode::ReleaseNotFound => "release.not_found",
            ErrorCode::ReleaseNotGenerated => "release.not_generated",
            ErrorCode::ReleaseNoPrevious => "release.no_previous",

            ErrorCode::SshIdentityFileNotFound => "ssh.identity_file_not_found",

            ErrorCode::RemoteCommandFailed => "remote.command_failed",
            ErrorCode::LocalCommandFailed => "local.command_failed",

            ErrorCode::PipelineStepFailed => "pipeline.step_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMissingKeyDetails {
    pub keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidJsonDetails {
    pub path: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigInvalidValueDetails {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub problem: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotFoundDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub available: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalIoErrorDetails {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseNotFoundDetails {
    pub release: String,
    pub host: String,
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub host: String,
    pub elevated: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalCommandFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SshIdentityFileNotFoundDetails {
    pub host: String,
    pub identity_file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStepFailedDetails {
    pub step: String,
    pub completed: Vec<String>,
    pub cause: CauseDetails,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CauseDetails {
    pub code: String,
    pub message: String,
    pub details: Value,
}

fn to_details<T: Serialize>(details: T) -> Value {
    serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        id: Option<String>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ValidationInvalidArgument,
            format!("Invalid argument: {}", problem),
            to_details(InvalidArgumentDetails {
                field: field.into(),
                problem,
                id,
            }),
        )
    }

    pub fn config_missing_key(keys: Vec<String>, environment: Option<String>) -> Self {
        let message = format!("Missing required configuration: {}", keys.join(", "));
        Self::new(
            ErrorCode::ConfigMissingKey,
            message,
            to_details(ConfigMissingKeyDetails { keys, environment }),
        )
    }

    pub fn config_invalid_json(path: impl Into<String>, err: serde_json::Error) -> Self {
        Self::new(
            ErrorCode::ConfigInvalidJson,
            "Invalid JSON in configuration",
            to_details(ConfigInvalidJsonDetails {
                path: path.into(),
                error: err.to_string(),
            }),
        )
    }

    pub fn config_invalid_value(
        key: impl Into<String>,
        value: Option<String>,
        problem: impl Into<String>,
    ) -> Self {
        let problem = problem.into();
        Self::new(
            ErrorCode::ConfigInvalidValue,
            format!("Invalid configuration value: {}", problem),
            to_details(ConfigInvalidValueDetails {
                key: key.into(),
                value,
                problem,
            }),
        )
    }

    pub fn environment_not_found(id: impl Into<String>, available: Vec<String>) -> Self {
        let id = id.into();
        Self::new(
            ErrorCode::EnvironmentNotFound,
            format!("Environment '{}' not found", id),
            to_details(NotFoundDetails { id, available }),
        )
        .with_hint("Run 'liftoff env list' to see available environments")
    }

    pub fn environment_not_selected() -> Self {
        Self::new(
            ErrorCode::EnvironmentNotSelected,
            "No environment selected",
            Value::Object(serde_json::Map::new()),
        )
        .with_hint("Pass --env <name> (for example --env production) or --config <file>")
    }

    pub fn release_not_found(
        release: impl Into<String>,
        host: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        let release = release.into();
        Self::new(
            ErrorCode::ReleaseNotFound,
            format!("Missing release '{}'", release),
            to_details(ReleaseNotFoundDetails {
                release,
                host: host.into(),
                path: path.into(),
            }),
        )
        .with_hint("Run 'liftoff status' to see which releases the pointers reference")
    }

    pub fn release_not_generated() -> Self {
        Self::new(
            ErrorCode::ReleaseNotGenerated,
            "No release available for this operation",
            Value::Object(serde_json::Map::new()),
        )
        .with_hint("Run 'liftoff deploy-site' first or pass --release <id>")
    }

    pub fn release_no_previous(host: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ReleaseNoPrevious,
            "Nothing to roll back to: both current and previous releases are required",
            serde_json::json!({ "host": host.into() }),
        )
    }

    pub fn ssh_identity_file_not_found(
        host: impl Into<String>,
        identity_file: impl Into<String>,
    ) -> Self {
        Self::new(
            ErrorCode::SshIdentityFileNotFound,
            "SSH identity file not found",
            to_details(SshIdentityFileNotFoundDetails {
                host: host.into(),
                identity_file: identity_file.into(),
            }),
        )
    }

    pub fn remote_command_failed(details: RemoteCommandFailedDetails) -> Self {
        let message = format!(
            "Remote command failed on {} (exit {}): {}",
            details.host,
            details.exit_code,
            error_text(&details.stderr, &details.stdout)
        );
        Self::new(ErrorCode::RemoteCommandFailed, message, to_details(details))
    }

    pub fn local_command_failed(details: LocalCommandFailedDetails) -> Self {
        let message = format!(
            "Local command failed (exit {}): {}",
            details.exit_code,
            error_text(&details.stderr, &details.stdout)
        );
        Self::new(ErrorCode::LocalCommandFailed, message, to_details(details))
    }

    pub fn pipeline_step_failed(step: &str, completed: Vec<String>, cause: Error) -> Self {
        let message = format!("Step '{}' failed: {}", step, cause.message);
        let hints = cause.hints.clone();
        let details = to_details(PipelineStepFailedDetails {
            step: step.to_string(),
            completed,
            cause: CauseDetails {
                code: cause.code.as_str().to_string(),
                message: cause.message,
                details: cause.details,
            },
        });

        let mut err = Self::new(ErrorCode::PipelineStepFailed, message, details);
        err.hints = hints;
        err.with_hint("Inspect the host, then run 'liftoff rollback' or 'liftoff deploy-release <id>'")
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            to_details(InternalIoErrorDetails {
                error: error.into(),
                context,
            }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Step name when this error aborted a pipeline.
    pub fn failed_step(&self) -> Option<&str> {
        if self.code != ErrorCode::PipelineStepFailed {
            return None;
        }
        self.details.get("step").and_then(Value::as_str)
    }
}

/// Prefers stderr, falls back to stdout.
fn error_text<'a>(stderr: &'a str, stdout: &'a str) -> &'a str {
    if stderr.trim().is_empty() {
        stdout.trim()
    } else {
        stderr.trim()
    }
}

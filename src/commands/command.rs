//! Command model for the per-instance commands queue

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

/// Typed control request enqueued for asynchronous processing by an
/// instance's dispatcher.
///
/// # Examples
///
/// ```rust
/// use task_reactor::commands::{Command, CommandType};
///
/// let command = Command::new(CommandType::PauseInstance, None);
/// assert_eq!(command.command_type.as_str(), "PAUSE_INSTANCE");
/// assert!(command.payload.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Unique within the owning queue
    pub id: Uuid,

    pub command_type: CommandType,

    /// Optional structured payload, `None` for commands added with an empty payload
    pub payload: Option<serde_json::Value>,

    pub enqueued_at: DateTime<Utc>,
}

impl Command {
    /// Create a new command with generated ID and current timestamp
    pub fn new(command_type: CommandType, payload: Option<serde_json::Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            command_type,
            payload,
            enqueued_at: Utc::now(),
        }
    }

    pub fn with_empty_payload(command_type: CommandType) -> Self {
        Self::new(command_type, None)
    }
}

/// Command types understood by the task reactor.
///
/// Unrecognised wire names are kept as [`CommandType::Custom`] so that they
/// survive a round trip through storage and can be dead-lettered by the
/// dispatcher instead of being lost at parse time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CommandType {
    PauseInstance,
    ResumeInstance,
    CancelOngoingExecutions,
    Custom(String),
}

impl CommandType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::PauseInstance => "PAUSE_INSTANCE",
            Self::ResumeInstance => "RESUME_INSTANCE",
            Self::CancelOngoingExecutions => "CANCEL_ONGOING_EXECUTIONS",
            Self::Custom(name) => name,
        }
    }

    /// Lifecycle commands are still consumed while an instance is inactive
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::PauseInstance | Self::ResumeInstance)
    }

    pub fn lifecycle_types() -> [CommandType; 2] {
        [Self::PauseInstance, Self::ResumeInstance]
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CommandType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "PAUSE_INSTANCE" => Self::PauseInstance,
            "RESUME_INSTANCE" => Self::ResumeInstance,
            "CANCEL_ONGOING_EXECUTIONS" => Self::CancelOngoingExecutions,
            other => Self::Custom(other.to_string()),
        })
    }
}

impl From<&str> for CommandType {
    fn from(value: &str) -> Self {
        match value.parse() {
            Ok(command_type) => command_type,
            Err(never) => match never {},
        }
    }
}

impl Serialize for CommandType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CommandType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(CommandType::from(raw.as_str()))
    }
}

/// Processing status of a queued command.
///
/// `Pending -> Claimed -> {Completed | Retrying -> Claimed | Dead}`
///
/// A `Claimed` command is in flight and is only handed out again once its
/// claim has timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    Claimed,
    Retrying,
    Completed,
    Dead,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Dead)
    }

    /// Whether the dispatcher may hand this command out without a claim timeout
    pub fn is_deliverable(&self) -> bool {
        matches!(self, Self::Pending | Self::Retrying)
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Claimed => write!(f, "claimed"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

impl std::str::FromStr for CommandStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "claimed" => Ok(Self::Claimed),
            "retrying" => Ok(Self::Retrying),
            "completed" => Ok(Self::Completed),
            "dead" => Ok(Self::Dead),
            _ => Err(format!("Invalid command status: {s}")),
        }
    }
}

/// A command together with its queue bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub command: Command,

    /// Monotonic enqueue position within the instance queue
    pub sequence: i64,

    pub status: CommandStatus,

    /// Number of times the command has been handed to the dispatcher
    pub attempts: u32,

    pub last_error: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl QueuedCommand {
    pub fn pending(command: Command, sequence: i64) -> Self {
        let updated_at = command.enqueued_at;
        Self {
            command,
            sequence,
            status: CommandStatus::Pending,
            attempts: 0,
            last_error: None,
            updated_at,
        }
    }

    pub fn id(&self) -> Uuid {
        self.command.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_type_wire_names() {
        assert_eq!("PAUSE_INSTANCE".parse::<CommandType>().unwrap(), CommandType::PauseInstance);
        assert_eq!(
            "CANCEL_ONGOING_EXECUTIONS".parse::<CommandType>().unwrap(),
            CommandType::CancelOngoingExecutions
        );
        assert_eq!(
            CommandType::from("REFRESH_TOKENS"),
            CommandType::Custom("REFRESH_TOKENS".to_string())
        );
        assert_eq!(CommandType::ResumeInstance.to_string(), "RESUME_INSTANCE");
    }

    #[test]
    fn test_command_serializes_type_as_string() {
        let command = Command::new(
            CommandType::CancelOngoingExecutions,
            Some(serde_json::json!({"reason": "operator"})),
        );
        let value = serde_json::to_value(&command).unwrap();
        assert_eq!(value["command_type"], "CANCEL_ONGOING_EXECUTIONS");

        let back: Command = serde_json::from_value(value).unwrap();
        assert_eq!(back, command);
    }

    #[test]
    fn test_status_classification() {
        assert!(CommandStatus::Completed.is_terminal());
        assert!(CommandStatus::Dead.is_terminal());
        assert!(!CommandStatus::Retrying.is_terminal());
        assert!(CommandStatus::Pending.is_deliverable());
        assert!(!CommandStatus::Claimed.is_deliverable());
        assert!(!CommandStatus::Claimed.is_terminal());
        assert!(!CommandStatus::Dead.is_deliverable());
        assert_eq!("retrying".parse::<CommandStatus>().unwrap(), CommandStatus::Retrying);
        assert!("finished".parse::<CommandStatus>().is_err());
    }

    #[test]
    fn test_lifecycle_types() {
        assert!(CommandType::PauseInstance.is_lifecycle());
        assert!(CommandType::ResumeInstance.is_lifecycle());
        assert!(!CommandType::CancelOngoingExecutions.is_lifecycle());
    }
}

//! Requests clients may send over the live channel.

use serde::Deserialize;

use crate::broadcast::LiveMessage;
use crate::scheduler::Scheduler;

/// A client request, e.g. `{"action":"force","task":"extras"}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Send the full status to this client.
    Status,
    /// Run a task now.
    Force { task: String },
    /// Cancel the running extras task.
    CancelExtras,
}

/// Parse and execute one client request, returning the reply for that client.
pub async fn handle_command(scheduler: &Scheduler, text: &str) -> LiveMessage {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            return LiveMessage::Error {
                message: format!("Invalid command: {}", e),
            }
        }
    };

    tracing::debug!("Live command: {:?}", command);

    match command {
        ClientCommand::Status => match scheduler.status().await {
            Ok(snapshot) => snapshot.into(),
            Err(e) => LiveMessage::Error {
                message: e.to_string(),
            },
        },
        ClientCommand::Force { task } => match scheduler.force(&task).await {
            Ok(outcome) => LiveMessage::TaskForced { task, outcome },
            Err(e) => LiveMessage::Error {
                message: e.to_string(),
            },
        },
        ClientCommand::CancelExtras => LiveMessage::ExtrasCancelled {
            cancelled: scheduler.cancel_extras().await,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let force: ClientCommand =
            serde_json::from_str(r#"{"action":"force","task":"radarr_sync"}"#).unwrap();
        assert_eq!(
            force,
            ClientCommand::Force {
                task: "radarr_sync".to_string()
            }
        );

        let cancel: ClientCommand = serde_json::from_str(r#"{"action":"cancel_extras"}"#).unwrap();
        assert_eq!(cancel, ClientCommand::CancelExtras);

        assert!(serde_json::from_str::<ClientCommand>(r#"{"action":"reboot"}"#).is_err());
    }
}

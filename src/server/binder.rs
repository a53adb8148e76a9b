use super::protocol::{Response, ResponseType};
use super::transport::ResponseSink;
use crate::parser::ast::{Command, CommandKind};
use crate::result::CommandOutcome;
use crate::session::SessionId;
use crate::transaction::{BoundCommand, Continuation};
use log::debug;
use std::sync::Arc;

/// Attaches to each command the callback that turns its result into a
/// response for the issuing session.
#[derive(Clone)]
pub struct ContinuationBinder {
    sink: Arc<dyn ResponseSink>,
}

impl ContinuationBinder {
    pub fn new(sink: Arc<dyn ResponseSink>) -> Self {
        Self { sink }
    }

    pub fn bind(&self, session: SessionId, command: Command) -> BoundCommand {
        let continuation = self.continuation_for(session, &command);
        BoundCommand::new(command, continuation)
    }

    fn continuation_for(&self, session: SessionId, command: &Command) -> Continuation {
        let sink = Arc::clone(&self.sink);

        match command.kind() {
            CommandKind::CreateTable => {
                let table = command.table_name().to_string();
                notify_on_success(sink, session, format!("Table Created {}", table))
            }
            CommandKind::Insert => notify_on_success(sink, session, "Data Inserted".into()),
            CommandKind::Update => notify_on_success(sink, session, "Data Updated".into()),
            CommandKind::Delete => notify_on_success(sink, session, "Data Deleted".into()),
            CommandKind::DropTable => notify_on_success(sink, session, "Table Dropped".into()),
            CommandKind::Select => Box::new(move |result| {
                let response = match result {
                    Ok(CommandOutcome::ResultSet(rows)) => {
                        Response::new(ResponseType::Query, rows.to_json().to_string())
                    }
                    Ok(other) => Response::error(format!("Unexpected outcome for SELECT: {:?}", other)),
                    Err(e) => Response::error(e.to_string()),
                };
                sink.send(session, response);
            }),
            // ALTER TABLE runs but reports nothing back
            CommandKind::AlterTable => {
                let summary = command.summary();
                Box::new(move |result| {
                    if let Err(e) = result {
                        debug!("{} for session {} failed silently: {}", summary, session, e);
                    }
                })
            }
        }
    }
}

fn notify_on_success(sink: Arc<dyn ResponseSink>, session: SessionId, message: String) -> Continuation {
    Box::new(move |result| {
        let response = match result {
            Ok(_) => Response::notification(message),
            Err(e) => Response::error(e.to_string()),
        };
        sink.send(session, response);
    })
}

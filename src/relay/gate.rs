//! Preamble acceptance.
//!
//! The inbound loop's parser reports the peer's header block here. An
//! acceptable preamble opens the gate once, which releases the outbound loop;
//! anything else is refused and ends the connection as a parsing error.

use tokio::sync::oneshot;

use crate::config::Role;
use crate::http::ParsedMessage;

#[derive(Debug)]
pub struct HeaderGate {
    role: Role,
    open: Option<oneshot::Sender<()>>,
}

impl HeaderGate {
    /// A closed gate and the receiver that resolves when it opens. The
    /// receiver errors if the gate is dropped without opening.
    pub fn new(role: Role) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { role, open: Some(tx) }, rx)
    }

    /// Judge a completed header block. Connect role expects a 2xx response,
    /// listen role expects a request.
    pub fn admit(&mut self, message: &ParsedMessage) -> bool {
        let accepted = match self.role {
            Role::Connect => {
                message.is_response() && (200..300).contains(&message.status_code)
            }
            Role::Listen => message.is_request(),
        };

        if accepted {
            tracing::debug!(
                role = %self.role,
                method = %message.method,
                status = message.status_code,
                "Peer preamble accepted"
            );
            if let Some(tx) = self.open.take() {
                let _ = tx.send(());
            }
        } else {
            tracing::warn!(
                role = %self.role,
                method = %message.method,
                status = message.status_code,
                "Peer preamble rejected"
            );
        }
        accepted
    }

    pub fn is_open(&self) -> bool {
        self.open.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::parser::MessageKind;

    fn response(code: u16) -> ParsedMessage {
        ParsedMessage {
            kind: Some(MessageKind::Response),
            status_code: code,
            ..ParsedMessage::default()
        }
    }

    fn request() -> ParsedMessage {
        ParsedMessage {
            kind: Some(MessageKind::Request),
            method: "POST".into(),
            ..ParsedMessage::default()
        }
    }

    #[tokio::test]
    async fn connect_role_needs_success_status() {
        let (mut gate, opened) = HeaderGate::new(Role::Connect);
        assert!(!gate.admit(&response(403)));
        assert!(!gate.admit(&request()));
        assert!(!gate.is_open());

        assert!(gate.admit(&response(200)));
        assert!(gate.is_open());
        assert!(opened.await.is_ok());
    }

    #[tokio::test]
    async fn listen_role_needs_request() {
        let (mut gate, opened) = HeaderGate::new(Role::Listen);
        assert!(!gate.admit(&response(200)));
        assert!(gate.admit(&request()));
        assert!(opened.await.is_ok());
    }

    #[tokio::test]
    async fn dropped_gate_never_opens() {
        let (gate, opened) = HeaderGate::new(Role::Listen);
        drop(gate);
        assert!(opened.await.is_err());
    }
}

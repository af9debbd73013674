//! Delivery to registered sessions.
//!
//! Every send runs under the registry lock; a member whose queue rejects a
//! line is removed in that same critical section. Broadcast failures are
//! isolated per recipient.

use super::registry::Registry;
use super::session::SessionId;
use crate::error::ChatError;
use crate::markup;

/// Which private-message command produced a whisper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperKind {
    Whisper,
    Reply,
}

impl WhisperKind {
    fn verbs(self) -> (&'static str, &'static str) {
        match self {
            Self::Whisper => ("whisper", "whispers"),
            Self::Reply => ("reply", "replies"),
        }
    }
}

impl Registry {
    /// Queue lines for one session.
    pub fn send_to(&self, id: SessionId, lines: &[String]) -> Result<(), ChatError> {
        self.roster.lock().deliver(id, lines)
    }

    /// Queue a single line for one session.
    pub fn send_line(&self, id: SessionId, line: impl Into<String>) -> Result<(), ChatError> {
        self.send_to(id, &[line.into()])
    }

    /// Send to every registered session. Returns the number reached.
    pub fn broadcast(&self, lines: &[String]) -> usize {
        let mut roster = self.roster.lock();
        let ids = roster.ids();
        let reached = ids
            .into_iter()
            .filter(|id| roster.deliver(*id, lines).is_ok())
            .count();
        crate::metrics::record_fanout(reached);
        reached
    }

    /// Send to every registered session except `skip`.
    pub fn broadcast_except(&self, skip: SessionId, lines: &[String]) -> usize {
        let mut roster = self.roster.lock();
        let ids = roster.ids();
        ids.into_iter()
            .filter(|id| *id != skip)
            .filter(|id| roster.deliver(*id, lines).is_ok())
            .count()
    }

    /// Broadcast one line.
    pub fn broadcast_line(&self, line: impl Into<String>) -> usize {
        self.broadcast(&[line.into()])
    }

    /// Broadcast one line in system style.
    pub fn broadcast_sys(&self, text: &str) -> usize {
        let line = self.markup.sys(text);
        self.broadcast(&[line])
    }

    /// Deliver a private message and record the sender on the recipient.
    ///
    /// Sender confirmation, recipient delivery and the `last_msg_from` update
    /// all happen under one lock.
    pub fn whisper(
        &self,
        sender: SessionId,
        target: &str,
        kind: WhisperKind,
        text: &str,
    ) -> Result<(), ChatError> {
        let mut roster = self.roster.lock();

        let (sender_nick, sender_admin) = match roster.members.get(&sender) {
            Some(m) => (m.nickname.clone(), m.privilege.is_admin()),
            None => return Err(ChatError::DeliveryFailed(sender.to_string())),
        };
        let (target_id, target_nick) = match roster.find(target) {
            Some(m) => (m.session.id(), m.nickname.clone()),
            None => return Err(ChatError::NotFound(target.to_string())),
        };

        let text = markup::escape(text);
        if target_id == sender {
            let line = self
                .markup
                .render(&format!("<w>You whisper to yourself: {text}</w>"));
            return roster.deliver(sender, &[line]);
        }

        let (verb, verb_3rd) = kind.verbs();
        let to_sender = self
            .markup
            .render(&format!("<w>You {verb} to {target_nick}: {text}</w>"));
        let to_target = if sender_admin {
            self.markup
                .render(&format!("<aw>{sender_nick} (admin) {verb_3rd}: {text}</aw>"))
        } else {
            self.markup
                .render(&format!("<w>{sender_nick} {verb_3rd}: {text}</w>"))
        };

        // The sender's own failure doesn't stop the message reaching the target.
        let sent = roster.deliver(sender, &[to_sender]);
        roster.deliver(target_id, &[to_target])?;
        if let Some(member) = roster.members.get_mut(&target_id) {
            member.last_msg_from = Some(sender_nick);
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Privilege;
    use crate::state::registry::tests::{registry, test_session};

    #[test]
    fn test_send_failure_removes_session() {
        let reg = registry();
        let (a, mut ra) = test_session("alice", 1);
        let (b, rb) = test_session("bob", 8);
        let a_id = a.id();
        let b_id = b.id();
        reg.add(a.clone(), "alice", Privilege::User).unwrap();
        reg.add(b.clone(), "bob", Privilege::User).unwrap();

        // bob's writer is gone.
        drop(rb);
        assert!(matches!(
            reg.send_line(b_id, "hi"),
            Err(ChatError::DeliveryFailed(_))
        ));
        assert!(reg.find("bob").is_none());
        assert!(b.is_closing());

        // alice's queue holds one line; the second send overflows.
        reg.send_line(a_id, "one").unwrap();
        assert!(reg.send_line(a_id, "two").is_err());
        assert!(reg.is_empty());
        assert_eq!(ra.try_recv().unwrap(), "one");
    }

    #[test]
    fn test_broadcast_isolates_failures() {
        let reg = registry();
        let (a, mut ra) = test_session("alice", 8);
        let (b, rb) = test_session("bob", 8);
        let (c, mut rc) = test_session("carol", 8);
        reg.add(a, "alice", Privilege::User).unwrap();
        reg.add(b, "bob", Privilege::User).unwrap();
        reg.add(c, "carol", Privilege::User).unwrap();
        drop(rb);

        assert_eq!(reg.broadcast_line("hello"), 2);
        assert_eq!(ra.try_recv().unwrap(), "hello");
        assert_eq!(rc.try_recv().unwrap(), "hello");
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_broadcast_except() {
        let reg = registry();
        let (a, mut ra) = test_session("alice", 8);
        let (b, mut rb) = test_session("bob", 8);
        let a_id = a.id();
        reg.add(a, "alice", Privilege::User).unwrap();
        reg.add(b, "bob", Privilege::User).unwrap();

        assert_eq!(reg.broadcast_except(a_id, &["x".to_string()]), 1);
        assert!(ra.try_recv().is_err());
        assert_eq!(rb.try_recv().unwrap(), "x");
    }

    #[test]
    fn test_whisper_sets_last_sender() {
        let reg = registry();
        let (a, mut ra) = test_session("alice", 8);
        let (b, mut rb) = test_session("root", 8);
        let a_id = a.id();
        let b_id = b.id();
        reg.add(a, "alice", Privilege::User).unwrap();
        reg.add(b, "root", Privilege::Admin).unwrap();

        reg.whisper(b_id, "ALICE", WhisperKind::Whisper, "psst")
            .unwrap();
        assert_eq!(rb.try_recv().unwrap(), "You whisper to alice: psst");
        assert_eq!(ra.try_recv().unwrap(), "root (admin) whispers: psst");
        assert_eq!(
            reg.profile(a_id).unwrap().last_msg_from.as_deref(),
            Some("root")
        );

        reg.whisper(a_id, "root", WhisperKind::Reply, "<sys>hi</sys>")
            .unwrap();
        assert_eq!(ra.try_recv().unwrap(), "You reply to root: <sys>hi</sys>");
        assert_eq!(rb.try_recv().unwrap(), "alice replies: <sys>hi</sys>");
    }

    #[test]
    fn test_whisper_to_self_and_missing() {
        let reg = registry();
        let (a, mut ra) = test_session("alice", 8);
        let a_id = a.id();
        reg.add(a, "alice", Privilege::User).unwrap();

        reg.whisper(a_id, "alice", WhisperKind::Whisper, "me")
            .unwrap();
        assert_eq!(ra.try_recv().unwrap(), "You whisper to yourself: me");
        assert!(reg.profile(a_id).unwrap().last_msg_from.is_none());

        assert!(matches!(
            reg.whisper(a_id, "ghost", WhisperKind::Whisper, "x"),
            Err(ChatError::NotFound(_))
        ));
    }
}

//! The session registry.
//!
//! One mutex guards the nickname index and every member's mutable fields
//! (nickname, privilege, last whisper sender). Delivery to a member happens
//! inside the same critical section so a failed send removes the member
//! before anyone else can see it. The lock is never held across an await.

use super::nick;
use super::session::{Session, SessionId};
use crate::db::Privilege;
use crate::error::ChatError;
use crate::markup::Markup;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A registered session and its mutable chat state.
#[derive(Debug)]
pub(super) struct Member {
    pub(super) session: Arc<Session>,
    pub(super) nickname: String,
    pub(super) privilege: Privilege,
    pub(super) last_msg_from: Option<String>,
}

impl Member {
    fn profile(&self) -> Profile {
        Profile {
            session: Arc::clone(&self.session),
            nickname: self.nickname.clone(),
            privilege: self.privilege,
            last_msg_from: self.last_msg_from.clone(),
        }
    }
}

/// Point-in-time copy of a member, safe to use outside the lock.
#[derive(Debug, Clone)]
pub struct Profile {
    pub session: Arc<Session>,
    pub nickname: String,
    pub privilege: Privilege,
    pub last_msg_from: Option<String>,
}

impl Profile {
    #[inline]
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    #[inline]
    pub fn is_admin(&self) -> bool {
        self.privilege.is_admin()
    }
}

#[derive(Debug, Default)]
pub(super) struct Roster {
    by_nick: HashMap<String, SessionId>,
    pub(super) members: HashMap<SessionId, Member>,
    closed: bool,
}

impl Roster {
    pub(super) fn remove(&mut self, id: SessionId) -> Option<Member> {
        let member = self.members.remove(&id)?;
        self.by_nick.remove(&nick::normalize(&member.nickname));
        crate::metrics::set_connected_sessions(self.members.len());
        Some(member)
    }

    fn lookup(&self, nickname: &str) -> Option<SessionId> {
        self.by_nick.get(&nick::normalize(nickname)).copied()
    }

    pub(super) fn find(&self, nickname: &str) -> Option<&Member> {
        self.lookup(nickname).and_then(|id| self.members.get(&id))
    }

    /// Queue lines for one member; on failure drop the member and close it.
    pub(super) fn deliver(&mut self, id: SessionId, lines: &[String]) -> Result<(), ChatError> {
        let Some(member) = self.members.get(&id) else {
            return Err(ChatError::DeliveryFailed(id.to_string()));
        };

        for line in lines {
            if let Err(e) = member.session.try_deliver(line.clone()) {
                let nickname = member.nickname.clone();
                warn!(
                    nick = %nickname,
                    error = %e,
                    undelivered = lines.len(),
                    "Delivery failed, removing session"
                );
                crate::metrics::record_delivery_failure();
                if let Some(gone) = self.remove(id) {
                    gone.session.close();
                }
                return Err(ChatError::DeliveryFailed(nickname));
            }
        }
        Ok(())
    }

    pub(super) fn ids(&self) -> Vec<SessionId> {
        self.members.keys().copied().collect()
    }
}

/// Process-wide map of active sessions, keyed by case-insensitive nickname.
pub struct Registry {
    pub(super) roster: Mutex<Roster>,
    pub(super) markup: Markup,
}

impl Registry {
    pub fn new(markup: Markup) -> Self {
        Self {
            roster: Mutex::new(Roster::default()),
            markup,
        }
    }

    /// Renderer used for server-styled output.
    pub fn markup(&self) -> &Markup {
        &self.markup
    }

    /// Register a session under `nickname`.
    ///
    /// The uniqueness check and the insert happen under one lock.
    pub fn add(
        &self,
        session: Arc<Session>,
        nickname: &str,
        privilege: Privilege,
    ) -> Result<(), ChatError> {
        let mut roster = self.roster.lock();
        if roster.closed {
            return Err(ChatError::ShuttingDown);
        }
        let key = nick::normalize(nickname);
        if roster.by_nick.contains_key(&key) {
            return Err(ChatError::DuplicateNickname(nickname.to_string()));
        }

        let id = session.id();
        roster.by_nick.insert(key, id);
        roster.members.insert(
            id,
            Member {
                session,
                nickname: nickname.to_string(),
                privilege,
                last_msg_from: None,
            },
        );
        crate::metrics::set_connected_sessions(roster.members.len());
        debug!(nick = %nickname, session = id, "Session registered");
        Ok(())
    }

    /// Remove a session by id. No-op if it is already gone.
    pub fn remove_session(&self, id: SessionId) -> Option<Profile> {
        self.roster.lock().remove(id).map(|m| m.profile())
    }

    /// Remove the session holding `nickname`. No-op if there is none.
    pub fn remove(&self, nickname: &str) -> Option<Profile> {
        let mut roster = self.roster.lock();
        let id = roster.lookup(nickname)?;
        roster.remove(id).map(|m| m.profile())
    }

    /// Case-insensitive lookup.
    pub fn find(&self, nickname: &str) -> Option<Profile> {
        self.roster.lock().find(nickname).map(Member::profile)
    }

    /// Current state of a session, if it is still registered.
    pub fn profile(&self, id: SessionId) -> Option<Profile> {
        self.roster.lock().members.get(&id).map(Member::profile)
    }

    /// All registered sessions logged in as `username`.
    pub fn find_by_username(&self, username: &str) -> Vec<Profile> {
        self.roster
            .lock()
            .members
            .values()
            .filter(|m| m.session.username().eq_ignore_ascii_case(username))
            .map(Member::profile)
            .collect()
    }

    /// Atomically move a session to a new nickname. Returns the old one.
    ///
    /// Changing only the case of one's own nickname is allowed.
    pub fn rename(&self, id: SessionId, new_nickname: &str) -> Result<String, ChatError> {
        let mut roster = self.roster.lock();
        let new_key = nick::normalize(new_nickname);
        // Only a case change of one's own nickname may reuse the key.
        if let Some(&holder) = roster.by_nick.get(&new_key) {
            let unchanged = roster
                .members
                .get(&id)
                .is_some_and(|m| m.nickname == new_nickname);
            if holder != id || unchanged {
                return Err(ChatError::DuplicateNickname(new_nickname.to_string()));
            }
        }

        let member = roster
            .members
            .get_mut(&id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))?;
        let old = std::mem::replace(&mut member.nickname, new_nickname.to_string());

        roster.by_nick.remove(&nick::normalize(&old));
        roster.by_nick.insert(new_key, id);
        Ok(old)
    }

    /// Update the live privilege of every session logged in as `username`.
    pub fn set_privilege(&self, username: &str, privilege: Privilege) -> usize {
        let mut roster = self.roster.lock();
        let mut changed = 0;
        for member in roster.members.values_mut() {
            if member.session.username().eq_ignore_ascii_case(username) {
                member.privilege = privilege;
                changed += 1;
            }
        }
        changed
    }

    /// Who listing: admins first, then by nickname.
    ///
    /// Admin requesters also see each session's remote address.
    pub fn listing(&self, requester_is_admin: bool) -> Vec<String> {
        let roster = self.roster.lock();
        let mut members: Vec<&Member> = roster.members.values().collect();
        members.sort_by(|a, b| {
            b.privilege
                .cmp(&a.privilege)
                .then_with(|| a.nickname.cmp(&b.nickname))
        });

        members
            .into_iter()
            .map(|m| {
                if requester_is_admin {
                    format!(
                        "{} ({}) ({})",
                        m.nickname,
                        m.privilege.label(),
                        m.session.addr()
                    )
                } else {
                    format!("{} ({})", m.nickname, m.privilege.label())
                }
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.roster.lock().members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refuse further registrations and return every live session.
    pub fn close(&self) -> Vec<Arc<Session>> {
        let mut roster = self.roster.lock();
        roster.closed = true;
        roster
            .members
            .values()
            .map(|m| Arc::clone(&m.session))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.roster.lock().closed
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::markup::ColorMode;
    use crate::state::session::next_session_id;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    pub(crate) fn test_session(
        username: &str,
        depth: usize,
    ) -> (Arc<Session>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(depth);
        let session = Session::new(
            next_session_id(),
            username,
            "127.0.0.1:4000".parse().unwrap(),
            tx,
            CancellationToken::new(),
        );
        (Arc::new(session), rx)
    }

    pub(crate) fn registry() -> Registry {
        Registry::new(Markup::server(ColorMode::Never))
    }

    #[test]
    fn test_add_is_case_insensitive_unique() {
        let reg = registry();
        let (a, _ra) = test_session("carol", 8);
        let (b, _rb) = test_session("carol", 8);

        reg.add(a, "carol", Privilege::User).unwrap();
        assert!(matches!(
            reg.add(b, "CAROL", Privilege::User),
            Err(ChatError::DuplicateNickname(_))
        ));
        assert_eq!(reg.len(), 1);
        assert!(reg.find("CaRoL").is_some());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let reg = registry();
        let (a, _ra) = test_session("alice", 8);
        let id = a.id();
        reg.add(a, "alice", Privilege::User).unwrap();

        assert!(reg.remove_session(id).is_some());
        assert!(reg.remove_session(id).is_none());
        assert!(reg.remove("alice").is_none());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_rename_moves_index() {
        let reg = registry();
        let (a, _ra) = test_session("alice", 8);
        let (b, _rb) = test_session("bob", 8);
        let id = a.id();
        reg.add(a, "alice", Privilege::User).unwrap();
        reg.add(b, "bob", Privilege::User).unwrap();

        assert!(matches!(
            reg.rename(id, "BOB"),
            Err(ChatError::DuplicateNickname(_))
        ));
        assert_eq!(reg.rename(id, "a12").unwrap(), "alice");
        assert!(reg.find("alice").is_none());
        assert_eq!(reg.find("A12").unwrap().id(), id);

        // Case-only change of one's own nickname.
        assert_eq!(reg.rename(id, "A12").unwrap(), "a12");
        assert_eq!(reg.profile(id).unwrap().nickname, "A12");
    }

    #[test]
    fn test_rename_to_same_nickname_rejected() {
        let reg = registry();
        let (a, _ra) = test_session("alice", 8);
        let id = a.id();
        reg.add(a, "alice", Privilege::User).unwrap();

        assert!(matches!(
            reg.rename(id, "alice"),
            Err(ChatError::DuplicateNickname(_))
        ));
        assert_eq!(reg.find("alice").unwrap().id(), id);
        assert_eq!(reg.profile(id).unwrap().nickname, "alice");
    }

    #[test]
    fn test_listing_admins_first() {
        let reg = registry();
        let (a, _ra) = test_session("zed", 8);
        let (b, _rb) = test_session("amy", 8);
        let (c, _rc) = test_session("root", 8);
        reg.add(a, "zed", Privilege::User).unwrap();
        reg.add(b, "amy", Privilege::User).unwrap();
        reg.add(c, "root", Privilege::Admin).unwrap();

        assert_eq!(
            reg.listing(false),
            vec!["root (admin)", "amy (user)", "zed (user)"]
        );
        assert_eq!(
            reg.listing(true)[0],
            "root (admin) (127.0.0.1:4000)"
        );
    }

    #[test]
    fn test_set_privilege_by_username() {
        let reg = registry();
        let (a, _ra) = test_session("carol", 8);
        let (b, _rb) = test_session("carol", 8);
        let id = a.id();
        reg.add(a, "carol", Privilege::User).unwrap();
        reg.add(b, "carol2", Privilege::User).unwrap();

        assert_eq!(reg.set_privilege("CAROL", Privilege::Admin), 2);
        assert!(reg.profile(id).unwrap().is_admin());
    }

    #[test]
    fn test_closed_registry_refuses() {
        let reg = registry();
        let (a, _ra) = test_session("alice", 8);
        let (b, _rb) = test_session("bob", 8);
        reg.add(a, "alice", Privilege::User).unwrap();

        let live = reg.close();
        assert_eq!(live.len(), 1);
        assert!(matches!(
            reg.add(b, "bob", Privilege::User),
            Err(ChatError::ShuttingDown)
        ));
    }
}

use calldesk_common::CallSession;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

/// Indian mobile number as it appears in SIP attributes and room names.
fn mobile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\+91\d{10}").unwrap())
}

/// Pull a mobile number out of free-form call metadata.
pub fn extract_mobile_number(input: &str) -> Option<String> {
    if input.is_empty() {
        return None;
    }
    match mobile_pattern().find(input) {
        Some(m) => Some(m.as_str().to_string()),
        None => {
            warn!("No valid mobile number found in input: {}", input);
            None
        }
    }
}

/// Resolve the caller's number: the SIP attribute wins, the room name is
/// the fallback. Non-telephony participants have neither.
pub fn identify_caller(sip_phone_number: Option<&str>, room_name: &str) -> Option<String> {
    sip_phone_number
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| extract_mobile_number(room_name))
}

/// Live call sessions, one per connected caller. Sessions share the backing
/// adapters; the only cross-call state is the store itself.
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<Uuid, Arc<RwLock<CallSession>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: CallSession) -> Arc<RwLock<CallSession>> {
        let id = session.id;
        let handle = Arc::new(RwLock::new(session));
        self.sessions.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<RwLock<CallSession>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<RwLock<CallSession>>> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calldesk_common::{CallStage, Language};

    #[test]
    fn test_extract_mobile_number_from_room_name() {
        assert_eq!(
            extract_mobile_number("call-_+919106690970_hjkh"),
            Some("+919106690970".to_string())
        );
        assert_eq!(extract_mobile_number("lobby"), None);
        assert_eq!(extract_mobile_number(""), None);
    }

    #[test]
    fn test_extract_rejects_short_numbers() {
        assert_eq!(extract_mobile_number("call-+9191066909"), None);
    }

    #[test]
    fn test_identify_caller_prefers_sip_attribute() {
        let mobile = identify_caller(Some("+919000000001"), "call-_+919106690970_x");
        assert_eq!(mobile, Some("+919000000001".to_string()));

        let mobile = identify_caller(None, "call-_+919106690970_x");
        assert_eq!(mobile, Some("+919106690970".to_string()));

        let mobile = identify_caller(Some(""), "web-session");
        assert_eq!(mobile, None);
    }

    #[tokio::test]
    async fn test_session_manager_round_trip() {
        let manager = SessionManager::new();
        let session = CallSession::new("room", "sip-1", None, Language::English);
        let id = session.id;

        manager.insert(session).await;
        assert_eq!(manager.count().await, 1);

        let handle = manager.get(id).await.unwrap();
        handle.write().await.stage = CallStage::NewCaller;
        assert_eq!(manager.get(id).await.unwrap().read().await.stage, CallStage::NewCaller);

        manager.remove(id).await;
        assert!(manager.get(id).await.is_none());
    }
}

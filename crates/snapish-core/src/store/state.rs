use serde::Serialize;

use crate::auth::Session;
use crate::models::{
    CatchRecord, ConsentRecord, Coordinates, HotIssue, Post, ServiceEntry, TideSnapshot,
};

/// Everything the coordinator holds in memory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreState {
    pub session: Session,
    pub current_location: Option<Coordinates>,
    /// Operations currently waiting on the backend or location source
    pub in_flight: usize,
    pub global_loading: bool,
    /// Most recent user-facing failure, until cleared or replaced
    pub error: Option<String>,
    pub tide: Option<TideSnapshot>,
    pub catches: Vec<CatchRecord>,
    pub hot_issues: Vec<HotIssue>,
    pub consent: ConsentRecord,
    pub services: Vec<ServiceEntry>,
    pub posts: Vec<Post>,
}

impl StoreState {
    /// Append a catch, or replace the one with the same id.
    pub(crate) fn upsert_catch(&mut self, record: CatchRecord) {
        if !self.replace_catch(record.clone()) {
            self.catches.push(record);
        }
    }

    /// Replace by id. Unknown ids leave the list untouched.
    pub(crate) fn replace_catch(&mut self, record: CatchRecord) -> bool {
        match self.catches.iter_mut().find(|c| c.id == record.id) {
            Some(slot) => {
                *slot = record;
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_catch(&mut self, id: &str) -> bool {
        let before = self.catches.len();
        self.catches.retain(|c| c.id != id);
        self.catches.len() != before
    }

    pub(crate) fn replace_post(&mut self, post: Post) -> bool {
        match self.posts.iter_mut().find(|p| p.post_id == post.post_id) {
            Some(slot) => {
                *slot = post;
                true
            }
            None => false,
        }
    }

    /// Drop everything tied to the signed-in user
    pub(crate) fn sign_out(&mut self) {
        self.session.clear();
        self.tide = None;
        self.catches.clear();
        self.hot_issues.clear();
        self.consent = ConsentRecord::default();
    }
}

/// Where the tide table stands right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TideStatus {
    Empty,
    Fetching,
    Fresh,
    Stale,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catch(id: &str, memo: &str) -> CatchRecord {
        serde_json::from_value(serde_json::json!({"id": id, "memo": memo})).expect("catch json")
    }

    #[test]
    fn test_upsert_never_duplicates_ids() {
        let mut state = StoreState::default();
        state.upsert_catch(catch("1", "first"));
        state.upsert_catch(catch("2", "second"));
        state.upsert_catch(catch("1", "edited"));

        assert_eq!(state.catches.len(), 2);
        assert_eq!(state.catches[0].memo, "edited");
    }

    #[test]
    fn test_replace_unknown_catch_is_noop() {
        let mut state = StoreState::default();
        state.upsert_catch(catch("1", "first"));
        assert!(!state.replace_catch(catch("9", "ghost")));
        assert_eq!(state.catches, vec![catch("1", "first")]);
    }

    #[test]
    fn test_remove_catch() {
        let mut state = StoreState::default();
        state.upsert_catch(catch("1", "a"));
        state.upsert_catch(catch("2", "b"));

        assert!(state.remove_catch("1"));
        assert!(!state.remove_catch("1"));
        assert_eq!(state.catches, vec![catch("2", "b")]);
    }

    #[test]
    fn test_sign_out_keeps_public_data() {
        let mut state = StoreState {
            services: ServiceEntry::default_directory(),
            ..Default::default()
        };
        state.session.is_authenticated = true;
        state.upsert_catch(catch("1", "a"));

        state.sign_out();

        assert!(!state.session.is_authenticated);
        assert!(state.catches.is_empty());
        assert_eq!(state.services.len(), 4);
    }
}

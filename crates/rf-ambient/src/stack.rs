//! Profile Stack
//!
//! Priority context manager for overlapping ambience requests. Despite the
//! name this is an unordered bag: entries are appended on push and removed
//! by token or by profile identity, scanning from the most recent entry.
//! Removal is O(n) in entry count, which stays small in practice.

use crate::profile::AmbientProfile;
use std::sync::Arc;

/// Handle returned by a push, used to pop the entry later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StackToken(i64);

impl StackToken {
    /// Returned when nothing was pushed
    pub const INVALID: StackToken = StackToken(-1);

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub fn value(&self) -> i64 {
        self.0
    }
}

impl From<i64> for StackToken {
    fn from(value: i64) -> Self {
        StackToken(value)
    }
}

impl std::fmt::Display for StackToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Active instantiation of a profile
#[derive(Debug, Clone)]
pub struct StackEntry {
    /// Unique token
    pub token: StackToken,
    /// Shared profile
    pub profile: Arc<AmbientProfile>,
    /// Caller priority
    pub priority: i32,
    /// Fade requested when the entry was added (seconds)
    pub fade_seconds: f32,
}

/// Token-addressed bag of active profiles
#[derive(Debug, Clone)]
pub struct ProfileStack {
    entries: Vec<StackEntry>,
    next_token: i64,
}

impl Default for ProfileStack {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileStack {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_token: 1,
        }
    }

    /// Append an entry. A missing profile pushes nothing.
    pub fn push(
        &mut self,
        profile: Option<Arc<AmbientProfile>>,
        priority: i32,
        fade_seconds: f32,
    ) -> StackToken {
        let Some(profile) = profile else {
            return StackToken::INVALID;
        };

        let token = StackToken(self.next_token);
        self.next_token += 1;
        self.entries.push(StackEntry {
            token,
            profile,
            priority,
            fade_seconds,
        });
        token
    }

    /// Replace everything with a single priority-0 entry
    pub fn set_single(
        &mut self,
        profile: Option<Arc<AmbientProfile>>,
        fade_seconds: f32,
    ) -> StackToken {
        self.entries.clear();
        self.push(profile, 0, fade_seconds)
    }

    /// Remove the entry holding `token`
    pub fn pop(&mut self, token: StackToken) -> Option<StackEntry> {
        let index = self.entries.iter().rposition(|e| e.token == token)?;
        Some(self.entries.remove(index))
    }

    /// Remove the most recently added entry referencing `profile`
    pub fn pop_profile(&mut self, profile: &Arc<AmbientProfile>) -> Option<StackEntry> {
        let index = self
            .entries
            .iter()
            .rposition(|e| Arc::ptr_eq(&e.profile, profile))?;
        Some(self.entries.remove(index))
    }

    /// Remove all entries, returning how many were removed
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    /// Entries in insertion order
    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    /// Number of active entries
    pub fn depth(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(name: &str) -> Arc<AmbientProfile> {
        AmbientProfile::new(name).shared()
    }

    #[test]
    fn test_tokens_are_monotonic() {
        let mut stack = ProfileStack::new();
        let forest = profile("Forest");

        let a = stack.push(Some(forest.clone()), 0, 1.0);
        let b = stack.push(Some(forest.clone()), 0, 1.0);
        stack.pop(b);
        let c = stack.push(Some(forest), 0, 1.0);

        assert!(a.is_valid());
        assert!(a < b && b < c);
        assert_eq!(stack.depth(), 2);
    }

    #[test]
    fn test_null_profile_is_noop() {
        let mut stack = ProfileStack::new();
        let token = stack.push(None, 3, 1.0);
        assert_eq!(token, StackToken::INVALID);
        assert!(!token.is_valid());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_pop_unknown_token() {
        let mut stack = ProfileStack::new();
        stack.push(Some(profile("Cave")), 0, 1.0);

        assert!(stack.pop(StackToken::from(42)).is_none());
        assert!(stack.pop(StackToken::INVALID).is_none());
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn test_pop_profile_removes_last_match() {
        let mut stack = ProfileStack::new();
        let rain = profile("Rain");
        let wind = profile("Wind");

        let first = stack.push(Some(rain.clone()), 1, 1.0);
        stack.push(Some(wind.clone()), 0, 1.0);
        let second = stack.push(Some(rain.clone()), 2, 1.0);

        let removed = stack.pop_profile(&rain).unwrap();
        assert_eq!(removed.token, second);
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.entries()[0].token, first);

        // Identity, not name, decides the match
        let other_rain = profile("Rain");
        assert!(stack.pop_profile(&other_rain).is_none());
    }

    #[test]
    fn test_set_single_replaces_everything() {
        let mut stack = ProfileStack::new();
        stack.push(Some(profile("A")), 4, 1.0);
        stack.push(Some(profile("B")), 7, 1.0);

        let token = stack.set_single(Some(profile("C")), 0.5);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.entries()[0].token, token);
        assert_eq!(stack.entries()[0].priority, 0);
        assert_eq!(stack.entries()[0].profile.name, "C");
    }

    #[test]
    fn test_clear() {
        let mut stack = ProfileStack::new();
        assert_eq!(stack.clear(), 0);
        stack.push(Some(profile("A")), 0, 1.0);
        assert_eq!(stack.clear(), 1);
        assert!(stack.is_empty());
    }
}

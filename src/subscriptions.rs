//! Event listeners the background page should have registered, derived from
//! the current preferences and diffed against what is active.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::preferences::Preferences;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Subscription {
    BookmarkCreated,
    OpenPopupOnCreate,
    BookmarkChanged,
    BookmarkMoved,
    BeforeRequest,
}

pub fn desired(preferences: &Preferences) -> BTreeSet<Subscription> {
    let mut set = BTreeSet::from([
        Subscription::BookmarkCreated,
        Subscription::BookmarkChanged,
        Subscription::BookmarkMoved,
        Subscription::BeforeRequest,
    ]);
    if preferences.show_popup {
        set.insert(Subscription::OpenPopupOnCreate);
    }
    set
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubscriptionDiff {
    pub added: Vec<Subscription>,
    pub removed: Vec<Subscription>,
}

impl SubscriptionDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Subscriptions {
    active: BTreeSet<Subscription>,
}

impl Subscriptions {
    pub fn is_active(&self, subscription: Subscription) -> bool {
        self.active.contains(&subscription)
    }

    pub fn active(&self) -> impl Iterator<Item = Subscription> + '_ {
        self.active.iter().copied()
    }

    /// Makes the active set match `preferences` and reports what changed.
    pub fn reconcile(&mut self, preferences: &Preferences) -> SubscriptionDiff {
        let wanted = desired(preferences);
        let diff = SubscriptionDiff {
            added: wanted.difference(&self.active).copied().collect(),
            removed: self.active.difference(&wanted).copied().collect(),
        };
        self.active = wanted;
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reconcile_adds_everything() {
        let mut subs = Subscriptions::default();
        let diff = subs.reconcile(&Preferences::default());
        assert_eq!(diff.added.len(), 5);
        assert!(diff.removed.is_empty());
        assert!(subs.is_active(Subscription::OpenPopupOnCreate));
    }

    #[test]
    fn toggling_popup_only_touches_popup_listener() {
        let mut subs = Subscriptions::default();
        let mut prefs = Preferences::default();
        subs.reconcile(&prefs);

        prefs.show_popup = false;
        let diff = subs.reconcile(&prefs);
        assert_eq!(diff.removed, vec![Subscription::OpenPopupOnCreate]);
        assert!(diff.added.is_empty());
        assert!(!subs.is_active(Subscription::OpenPopupOnCreate));

        assert!(subs.reconcile(&prefs).is_empty());

        prefs.show_popup = true;
        let diff = subs.reconcile(&prefs);
        assert_eq!(diff.added, vec![Subscription::OpenPopupOnCreate]);
    }
}

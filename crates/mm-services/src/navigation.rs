//! Screen routing driven by session state.

use mm_core::models::{UserId, UserProfile};

/// Bottom navigation tabs of the signed-in shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Home,
    Friends,
    Profile,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    SignIn,
    NicknameSelection,
    /// Friend feed and the post box
    Home,
    /// Friend search and incoming requests
    Friends,
    /// Reached from the own profile
    FriendsList,
    /// The signed-in user's own profile
    Profile,
    /// Another user's profile
    UserProfile(UserId),
}

impl Screen {
    /// Where a session lands: sign-in without a user, nickname selection
    /// until one is claimed, the feed afterwards.
    pub fn after_session(user: Option<&UserProfile>) -> Self {
        match user {
            None => Screen::SignIn,
            Some(profile) if !profile.has_nickname() => Screen::NicknameSelection,
            Some(_) => Screen::Home,
        }
    }

    /// Switches tabs. Before onboarding completes there is no tab bar, so
    /// the current screen is kept.
    pub fn select_tab(&self, tab: Tab) -> Self {
        if !self.shows_navigation() {
            return self.clone();
        }
        match tab {
            Tab::Home => Screen::Home,
            Tab::Friends => Screen::Friends,
            Tab::Profile => Screen::Profile,
        }
    }

    /// Opening your own profile goes to the Profile tab instead.
    pub fn open_profile(viewer: &UserId, subject: &UserId) -> Self {
        if viewer == subject {
            Screen::Profile
        } else {
            Screen::UserProfile(subject.clone())
        }
    }

    /// Screen reached by going back, if any.
    pub fn back(&self) -> Option<Self> {
        match self {
            Screen::UserProfile(_) => Some(Screen::Friends),
            Screen::FriendsList => Some(Screen::Profile),
            _ => None,
        }
    }

    /// Whether the tab bar is shown.
    pub fn shows_navigation(&self) -> bool {
        !matches!(self, Screen::SignIn | Screen::NicknameSelection)
    }

    pub fn tab(&self) -> Option<Tab> {
        match self {
            Screen::Home => Some(Tab::Home),
            Screen::Friends | Screen::UserProfile(_) => Some(Tab::Friends),
            Screen::Profile | Screen::FriendsList => Some(Tab::Profile),
            Screen::SignIn | Screen::NicknameSelection => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_routing() {
        assert_eq!(Screen::after_session(None), Screen::SignIn);

        let mut profile = UserProfile::new(UserId::from("a"));
        assert_eq!(
            Screen::after_session(Some(&profile)),
            Screen::NicknameSelection
        );

        profile.nickname = Some("alice".into());
        assert_eq!(Screen::after_session(Some(&profile)), Screen::Home);
    }

    #[test]
    fn own_profile_routes_to_tab() {
        let a = UserId::from("a");
        let b = UserId::from("b");
        assert_eq!(Screen::open_profile(&a, &a), Screen::Profile);
        let other = Screen::open_profile(&a, &b);
        assert_eq!(other, Screen::UserProfile(b));
        assert_eq!(other.back(), Some(Screen::Friends));
        assert_eq!(other.tab(), Some(Tab::Friends));
    }

    #[test]
    fn tabs_ignored_before_onboarding_completes() {
        for screen in [Screen::SignIn, Screen::NicknameSelection] {
            assert!(!screen.shows_navigation());
            assert_eq!(screen.select_tab(Tab::Home), screen);
        }
        for tab in [Tab::Home, Tab::Friends, Tab::Profile] {
            let screen = Screen::Home.select_tab(tab);
            assert!(screen.shows_navigation());
            assert_eq!(screen.tab(), Some(tab));
            assert_eq!(screen.back(), None);
        }
    }

    #[test]
    fn friends_list_returns_to_profile() {
        assert_eq!(Screen::FriendsList.back(), Some(Screen::Profile));
        assert_eq!(Screen::FriendsList.tab(), Some(Tab::Profile));
    }
}

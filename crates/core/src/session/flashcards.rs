use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::fmt;
use thiserror::Error;

use crate::model::{CardId, FlashcardSessionCompleted, SetId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ReviewSessionError {
    #[error("no cards available for session")]
    Empty,

    #[error("card {0} appears more than once in the session")]
    DuplicateCard(CardId),
}

//
// ─── STATE ─────────────────────────────────────────────────────────────────────
//

/// Where a card stands within the current session.
///
/// A single mark per card keeps "known" and "needs review" mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CardMark {
    #[default]
    Unseen,
    Known,
    NeedsReview,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active { cursor: usize, flipped: bool },
    Completed,
}

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub total: usize,
    /// 1-based position of the card on screen; equals `total` once completed.
    pub position: usize,
    pub known: usize,
    pub needs_review: usize,
    pub is_complete: bool,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// Ephemeral traversal of a flashcard set.
///
/// Out-of-range moves and actions after completion are silently ignored,
/// matching disabled buttons in the UI. Nothing here is persisted until the
/// completion event is folded into the learner's record.
pub struct ReviewSession {
    set_id: SetId,
    cards: Vec<CardId>,
    marks: HashMap<CardId, CardMark>,
    state: SessionState,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl ReviewSession {
    /// Start a session over `cards` in the given order.
    ///
    /// # Errors
    ///
    /// Returns `ReviewSessionError::Empty` if no cards are provided.
    /// Returns `ReviewSessionError::DuplicateCard` if a card id repeats.
    pub fn new(
        set_id: SetId,
        cards: Vec<CardId>,
        started_at: DateTime<Utc>,
    ) -> Result<Self, ReviewSessionError> {
        if cards.is_empty() {
            return Err(ReviewSessionError::Empty);
        }
        let mut seen = HashSet::with_capacity(cards.len());
        for card in &cards {
            if !seen.insert(*card) {
                return Err(ReviewSessionError::DuplicateCard(*card));
            }
        }
        let marks = cards.iter().map(|c| (*c, CardMark::Unseen)).collect();

        Ok(Self {
            set_id,
            cards,
            marks,
            state: SessionState::Active {
                cursor: 0,
                flipped: false,
            },
            started_at,
            completed_at: None,
        })
    }

    #[must_use]
    pub fn set_id(&self) -> &SetId {
        &self.set_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.state, SessionState::Completed)
    }

    #[must_use]
    pub fn total_cards(&self) -> usize {
        self.cards.len()
    }

    #[must_use]
    pub fn cursor(&self) -> Option<usize> {
        match self.state {
            SessionState::Active { cursor, .. } => Some(cursor),
            SessionState::Completed => None,
        }
    }

    #[must_use]
    pub fn is_flipped(&self) -> bool {
        matches!(self.state, SessionState::Active { flipped: true, .. })
    }

    #[must_use]
    pub fn current_card(&self) -> Option<CardId> {
        self.cursor().map(|i| self.cards[i])
    }

    #[must_use]
    pub fn mark_of(&self, card_id: CardId) -> Option<CardMark> {
        self.marks.get(&card_id).copied()
    }

    /// Cards currently marked known, in session order.
    pub fn known_cards(&self) -> impl Iterator<Item = CardId> + '_ {
        self.cards_marked(CardMark::Known)
    }

    /// Cards currently marked for review, in session order.
    pub fn review_cards(&self) -> impl Iterator<Item = CardId> + '_ {
        self.cards_marked(CardMark::NeedsReview)
    }

    fn cards_marked(&self, mark: CardMark) -> impl Iterator<Item = CardId> + '_ {
        self.cards
            .iter()
            .copied()
            .filter(move |c| self.marks.get(c) == Some(&mark))
    }

    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known_cards().count()
    }

    #[must_use]
    pub fn review_count(&self) -> usize {
        self.review_cards().count()
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let position = match self.state {
            SessionState::Active { cursor, .. } => cursor + 1,
            SessionState::Completed => self.cards.len(),
        };
        SessionProgress {
            total: self.cards.len(),
            position,
            known: self.known_count(),
            needs_review: self.review_count(),
            is_complete: self.is_complete(),
        }
    }

    /// Known cards as a rounded percentage of the set.
    #[must_use]
    pub fn known_percent(&self) -> u32 {
        let total = self.cards.len();
        let pct = (self.known_count() * 100 + total / 2) / total;
        u32::try_from(pct).unwrap_or(100)
    }

    //
    // ─── TRANSITIONS ───────────────────────────────────────────────────────────
    //

    /// Toggle between prompt and answer. Flipping twice is the identity.
    pub fn flip(&mut self) {
        if let SessionState::Active { flipped, .. } = &mut self.state {
            *flipped = !*flipped;
        }
    }

    /// Mark `card_id` known and move on.
    ///
    /// Returns the completion event if this action finished the session.
    pub fn mark_known(
        &mut self,
        card_id: CardId,
        now: DateTime<Utc>,
    ) -> Option<FlashcardSessionCompleted> {
        self.mark(card_id, CardMark::Known, now)
    }

    /// Mark `card_id` for another review and move on.
    ///
    /// The answer does not need to have been revealed first.
    pub fn mark_review(
        &mut self,
        card_id: CardId,
        now: DateTime<Utc>,
    ) -> Option<FlashcardSessionCompleted> {
        self.mark(card_id, CardMark::NeedsReview, now)
    }

    fn mark(
        &mut self,
        card_id: CardId,
        mark: CardMark,
        now: DateTime<Utc>,
    ) -> Option<FlashcardSessionCompleted> {
        if self.is_complete() {
            return None;
        }
        let slot = self.marks.get_mut(&card_id)?;
        *slot = mark;
        self.advance(now)
    }

    /// Move to the next card, or complete the session from the last one.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Option<FlashcardSessionCompleted> {
        let SessionState::Active { cursor, .. } = self.state else {
            return None;
        };
        if cursor + 1 < self.cards.len() {
            self.state = SessionState::Active {
                cursor: cursor + 1,
                flipped: false,
            };
            None
        } else {
            self.state = SessionState::Completed;
            self.completed_at = Some(now);
            self.completion_event()
        }
    }

    /// Step back one card; ignored on the first card.
    pub fn retreat(&mut self) {
        if let SessionState::Active { cursor, .. } = self.state {
            if cursor > 0 {
                self.state = SessionState::Active {
                    cursor: cursor - 1,
                    flipped: false,
                };
            }
        }
    }

    /// The fold event for a completed session, rebuilt on demand so a failed
    /// fold can be retried.
    #[must_use]
    pub fn completion_event(&self) -> Option<FlashcardSessionCompleted> {
        let timestamp = self.completed_at?;
        Some(FlashcardSessionCompleted {
            set_id: self.set_id.clone(),
            known_count: u32::try_from(self.known_count()).unwrap_or(u32::MAX),
            total_cards: u32::try_from(self.cards.len()).unwrap_or(u32::MAX),
            timestamp,
        })
    }
}

impl fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReviewSession")
            .field("set_id", &self.set_id)
            .field("cards_len", &self.cards.len())
            .field("state", &self.state)
            .field("known", &self.known_count())
            .field("needs_review", &self.review_count())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use proptest::prelude::*;

    fn ids(n: u64) -> Vec<CardId> {
        (1..=n).map(CardId::new).collect()
    }

    fn session(n: u64) -> ReviewSession {
        ReviewSession::new(SetId::new("bio"), ids(n), fixed_now()).unwrap()
    }

    #[test]
    fn empty_and_duplicate_sequences_are_rejected() {
        assert_eq!(
            ReviewSession::new(SetId::new("s"), vec![], fixed_now()).unwrap_err(),
            ReviewSessionError::Empty
        );
        assert_eq!(
            ReviewSession::new(
                SetId::new("s"),
                vec![CardId::new(1), CardId::new(1)],
                fixed_now()
            )
            .unwrap_err(),
            ReviewSessionError::DuplicateCard(CardId::new(1))
        );
    }

    #[test]
    fn double_flip_is_identity() {
        let mut s = session(2);
        s.flip();
        assert!(s.is_flipped());
        s.flip();
        assert!(!s.is_flipped());
        assert_eq!(s.cursor(), Some(0));
    }

    #[test]
    fn marking_resets_flip_and_advances() {
        let mut s = session(3);
        s.flip();
        assert!(s.mark_known(CardId::new(1), fixed_now()).is_none());
        assert_eq!(s.cursor(), Some(1));
        assert!(!s.is_flipped());
    }

    #[test]
    fn retreat_is_noop_on_first_card() {
        let mut s = session(3);
        s.flip();
        s.retreat();
        assert_eq!(s.cursor(), Some(0));
        assert!(s.is_flipped());

        s.advance(fixed_now());
        s.flip();
        s.retreat();
        assert_eq!(s.cursor(), Some(0));
        assert!(!s.is_flipped());
    }

    #[test]
    fn remarking_a_card_keeps_one_membership() {
        let mut s = session(3);
        let a = CardId::new(1);
        s.mark_known(a, fixed_now());
        s.retreat();
        s.mark_review(a, fixed_now());
        s.retreat();
        s.mark_known(a, fixed_now());

        assert_eq!(s.known_cards().collect::<Vec<_>>(), vec![a]);
        assert_eq!(s.review_count(), 0);
    }

    #[test]
    fn four_card_session_completes_with_half_known() {
        let mut s = session(4);
        let now = fixed_now();
        assert!(s.mark_known(CardId::new(1), now).is_none());
        assert!(s.mark_review(CardId::new(2), now).is_none());
        assert!(s.mark_known(CardId::new(3), now).is_none());
        let event = s.mark_review(CardId::new(4), now).expect("session completes");

        assert_eq!(event.set_id, SetId::new("bio"));
        assert_eq!(event.known_count, 2);
        assert_eq!(event.total_cards, 4);
        assert_eq!(event.timestamp, now);
        assert_eq!(s.known_percent(), 50);
        assert_eq!(s.completion_event(), Some(event));
    }

    #[test]
    fn actions_after_completion_are_ignored() {
        let mut s = session(1);
        assert!(s.advance(fixed_now()).is_some());
        assert!(s.is_complete());
        assert!(s.advance(fixed_now()).is_none());
        assert!(s.mark_known(CardId::new(1), fixed_now()).is_none());
        s.flip();
        s.retreat();
        assert!(s.is_complete());
        assert_eq!(s.known_count(), 0);
    }

    #[test]
    fn unknown_card_is_ignored() {
        let mut s = session(2);
        assert!(s.mark_known(CardId::new(99), fixed_now()).is_none());
        assert_eq!(s.cursor(), Some(0));
        assert_eq!(s.known_count(), 0);
    }

    #[test]
    fn progress_reports_position_and_counts() {
        let mut s = session(3);
        s.mark_review(CardId::new(1), fixed_now());
        let p = s.progress();
        assert_eq!(p.position, 2);
        assert_eq!(p.needs_review, 1);
        assert!(!p.is_complete);
    }

    #[derive(Debug, Clone)]
    enum Action {
        Flip,
        Known(u64),
        Review(u64),
        Advance,
        Retreat,
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            Just(Action::Flip),
            (1_u64..=6).prop_map(Action::Known),
            (1_u64..=6).prop_map(Action::Review),
            Just(Action::Advance),
            Just(Action::Retreat),
        ]
    }

    proptest! {
        #[test]
        fn known_and_review_sets_stay_disjoint(actions in prop::collection::vec(action(), 0..40)) {
            let mut s = session(5);
            for a in actions {
                let event = match a {
                    Action::Flip => { s.flip(); None }
                    Action::Known(id) => s.mark_known(CardId::new(id), fixed_now()),
                    Action::Review(id) => s.mark_review(CardId::new(id), fixed_now()),
                    Action::Advance => s.advance(fixed_now()),
                    Action::Retreat => { s.retreat(); None }
                };
                let known: HashSet<_> = s.known_cards().collect();
                let review: HashSet<_> = s.review_cards().collect();
                prop_assert!(known.is_disjoint(&review));
                prop_assert!(known.len() + review.len() <= s.total_cards());
                if let Some(event) = event {
                    prop_assert!(event.known_count <= event.total_cards);
                    prop_assert!(s.is_complete());
                }
            }
        }
    }
}

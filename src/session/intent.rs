//! Turns square clicks into legal-move queries and move submissions.
//!
//! The controller never decides legality. Destinations come from the
//! server's `legalMoves` reply; the board is only read to check that the
//! clicked square holds one of our pieces on our turn.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::board::{BoardState, Color, Square};
use crate::ws::messages::Command;

use super::errors::Rejection;

/// Local selection sub-state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IntentState {
    #[default]
    Idle,
    AwaitingLegalMoves {
        square: Square,
        since: DateTime<Utc>,
    },
    Selected {
        square: Square,
        destinations: BTreeSet<Square>,
    },
}

/// Result of one click.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// A command to send; the controller has already moved on.
    Send(Command),
    /// Selection dropped without traffic.
    Cancelled,
    /// Click ignored by a local guard.
    Ignored(Rejection),
}

#[derive(Debug, Clone, Default)]
pub struct MoveIntentController {
    state: IntentState,
}

impl MoveIntentController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &IntentState {
        &self.state
    }

    pub fn selected_square(&self) -> Option<Square> {
        match &self.state {
            IntentState::Idle => None,
            IntentState::AwaitingLegalMoves { square, .. } | IntentState::Selected { square, .. } => {
                Some(*square)
            }
        }
    }

    /// Highlighted destinations; empty unless `Selected`.
    pub fn destinations(&self) -> BTreeSet<Square> {
        match &self.state {
            IntentState::Selected { destinations, .. } => destinations.clone(),
            _ => BTreeSet::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == IntentState::Idle
    }

    /// Drop any selection.
    pub fn reset(&mut self) {
        if !self.is_idle() {
            debug!(state = ?self.state, "selection cleared");
        }
        self.state = IntentState::Idle;
    }

    /// Handle a click on `square`. `color` is the side we play, if known.
    pub fn click(
        &mut self,
        square: Square,
        board: &BoardState,
        color: Option<Color>,
        now: DateTime<Utc>,
    ) -> ClickOutcome {
        match std::mem::take(&mut self.state) {
            IntentState::Idle => match guard(square, board, color) {
                Ok(()) => {
                    self.state = IntentState::AwaitingLegalMoves { square, since: now };
                    ClickOutcome::Send(Command::RequestLegalMoves(square))
                }
                Err(rejection) => ClickOutcome::Ignored(rejection),
            },
            // Any click while the query is in flight abandons it.
            IntentState::AwaitingLegalMoves { .. } => ClickOutcome::Cancelled,
            IntentState::Selected {
                square: from,
                destinations,
            } => {
                if square != from && destinations.contains(&square) {
                    ClickOutcome::Send(Command::MovePiece { from, to: square })
                } else {
                    ClickOutcome::Cancelled
                }
            }
        }
    }

    /// Accept a `legalMoves` reply. Returns false if nothing was pending.
    pub fn on_legal_moves(&mut self, squares: &[Square]) -> bool {
        match self.state {
            IntentState::AwaitingLegalMoves { square, .. } => {
                self.state = IntentState::Selected {
                    square,
                    destinations: squares.iter().copied().collect(),
                };
                true
            }
            _ => false,
        }
    }

    /// Give up on a query older than `timeout`. Returns the abandoned square.
    pub fn expire(&mut self, now: DateTime<Utc>, timeout: Duration) -> Option<Square> {
        match self.state {
            IntentState::AwaitingLegalMoves { square, since } if now - since >= timeout => {
                self.state = IntentState::Idle;
                Some(square)
            }
            _ => None,
        }
    }

    /// Drop a pending query (e.g. the server answered it with an error).
    pub fn abandon_query(&mut self) -> Option<Square> {
        match self.state {
            IntentState::AwaitingLegalMoves { square, .. } => {
                self.state = IntentState::Idle;
                Some(square)
            }
            _ => None,
        }
    }
}

fn guard(square: Square, board: &BoardState, color: Option<Color>) -> Result<(), Rejection> {
    let piece = board.piece_at(square).ok_or(Rejection::EmptySquare)?;
    let color = color.ok_or(Rejection::NoColorAssigned)?;
    if piece.color != color {
        return Err(Rejection::NotYourPiece);
    }
    if board.phase().side_to_move() != Some(color) {
        return Err(Rejection::NotYourTurn);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

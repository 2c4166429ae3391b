use super::types::{BoardError, Color, Phase, Piece, PieceKind, Shade, Square};

/// Placement field of the standard starting position.
pub const INITIAL_NOTATION: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

// ---------------------------------------------------------------------------
// BoardState
// ---------------------------------------------------------------------------

/// Full 64-square board plus game phase.
///
/// Always fully populated. A new authoritative snapshot replaces the whole
/// value; nothing patches it square by square except [`apply_local_move`],
/// whose result is never treated as final.
///
/// [`apply_local_move`]: BoardState::apply_local_move
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardState {
    squares: [Option<Piece>; Square::NUM],
    phase: Phase,
}

/// Read-only view of one square.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SquareView {
    pub square: Square,
    pub shade: Shade,
    pub occupant: Option<Piece>,
}

impl BoardState {
    /// A board with no pieces, white to move.
    pub fn empty() -> Self {
        BoardState {
            squares: [None; Square::NUM],
            phase: Phase::WhiteToMove,
        }
    }

    /// The standard starting position.
    pub fn initial() -> Self {
        const BACK_RANK: [PieceKind; 8] = [
            PieceKind::Rook,
            PieceKind::Knight,
            PieceKind::Bishop,
            PieceKind::Queen,
            PieceKind::King,
            PieceKind::Bishop,
            PieceKind::Knight,
            PieceKind::Rook,
        ];
        let mut board = BoardState::empty();
        for (file, kind) in BACK_RANK.into_iter().enumerate() {
            board.squares[file] = Some(Piece::new(Color::Black, kind));
            board.squares[8 + file] = Some(Piece::new(Color::Black, PieceKind::Pawn));
            board.squares[48 + file] = Some(Piece::new(Color::White, PieceKind::Pawn));
            board.squares[56 + file] = Some(Piece::new(Color::White, kind));
        }
        board
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn piece_at(&self, sq: Square) -> Option<Piece> {
        self.squares[sq.index()]
    }

    /// All squares in index order, with derived shade.
    pub fn squares(&self) -> impl Iterator<Item = SquareView> + '_ {
        Square::all().map(|square| SquareView {
            square,
            shade: square.shade(),
            occupant: self.piece_at(square),
        })
    }

    /// Occupant-for-occupant comparison, ignoring phase.
    pub fn same_placement(&self, other: &BoardState) -> bool {
        self.squares == other.squares
    }

    /// Non-authoritative echo of a move: the occupant of `from` lands on
    /// `to` and `from` is cleared. Phase is left untouched.
    pub fn apply_local_move(&self, from: Square, to: Square) -> BoardState {
        let mut next = self.clone();
        if from != to {
            next.squares[to.index()] = next.squares[from.index()].take();
        }
        next
    }

    /// Text diagram, rank 8 at the top.
    pub fn board_string(&self) -> String {
        let mut s = String::with_capacity(200);
        for rank in (1..=8).rev() {
            s.push_str(&format!("{rank} "));
            for file in 0..8 {
                let c = Square::from_file_rank(file, rank)
                    .and_then(|sq| self.piece_at(sq))
                    .map_or('.', Piece::to_char);
                s.push(c);
                if file < 7 {
                    s.push(' ');
                }
            }
            s.push('\n');
        }
        s.push_str("  a b c d e f g h\n");
        s
    }
}

impl Default for BoardState {
    fn default() -> Self {
        BoardState::initial()
    }
}

// ---------------------------------------------------------------------------
// Notation parsing / export
// ---------------------------------------------------------------------------

impl BoardState {
    /// Decode a placement field (`rnbqkbnr/pppppppp/8/...`). Phase is
    /// white to move.
    pub fn from_notation(notation: &str) -> Result<Self, BoardError> {
        let mut board = BoardState::empty();
        board.read_placement(notation)?;
        Ok(board)
    }

    /// Decode a `"<notation> <phaseCode>"` snapshot.
    pub fn from_snapshot(snapshot: &str) -> Result<Self, BoardError> {
        let fields: Vec<&str> = snapshot.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(BoardError::MalformedNotation(format!(
                "expected '<notation> <phase>', got {} fields",
                fields.len()
            )));
        }
        let mut board = BoardState::from_notation(fields[0])?;
        board.phase = fields[1]
            .parse::<u8>()
            .ok()
            .and_then(Phase::from_code)
            .ok_or_else(|| BoardError::InvalidPhase(fields[1].to_string()))?;
        Ok(board)
    }

    /// Fill `self.squares` from a placement field. On error `self` may be
    /// partially written, so callers only expose it on success.
    fn read_placement(&mut self, notation: &str) -> Result<(), BoardError> {
        let ranks: Vec<&str> = notation.split('/').collect();
        if ranks.len() != 8 {
            return Err(BoardError::MalformedNotation(format!(
                "expected 8 ranks, got {}",
                ranks.len()
            )));
        }

        let mut index = 0usize;
        for (row, rank_str) in ranks.iter().enumerate() {
            let rank = 8 - row;
            let mut file = 0usize;
            for ch in rank_str.chars() {
                if let Some(digit) = ch.to_digit(10) {
                    if !(1..=8).contains(&digit) {
                        return Err(BoardError::MalformedNotation(format!(
                            "invalid empty count '{ch}' in rank {rank}"
                        )));
                    }
                    file += digit as usize;
                    if file > 8 {
                        break;
                    }
                    for _ in 0..digit {
                        self.squares[index] = None;
                        index += 1;
                    }
                } else if let Some(piece) = Piece::from_char(ch) {
                    file += 1;
                    if file > 8 {
                        break;
                    }
                    self.squares[index] = Some(piece);
                    index += 1;
                } else {
                    return Err(BoardError::MalformedNotation(format!(
                        "invalid character '{ch}' in rank {rank}"
                    )));
                }
            }
            if file != 8 {
                return Err(BoardError::MalformedNotation(format!(
                    "rank {rank} covers {file} squares instead of 8"
                )));
            }
        }
        Ok(())
    }

    /// Encode the placement field, compressing runs of empty squares.
    pub fn to_notation(&self) -> String {
        let mut out = String::with_capacity(72);
        for (row, chunk) in self.squares.chunks(8).enumerate() {
            let mut empty_count = 0u8;
            for cell in chunk {
                match cell {
                    Some(piece) => {
                        if empty_count > 0 {
                            out.push((b'0' + empty_count) as char);
                            empty_count = 0;
                        }
                        out.push(piece.to_char());
                    }
                    None => empty_count += 1,
                }
            }
            if empty_count > 0 {
                out.push((b'0' + empty_count) as char);
            }
            if row < 7 {
                out.push('/');
            }
        }
        out
    }

    /// Encode as `"<notation> <phaseCode>"`.
    pub fn to_snapshot(&self) -> String {
        format!("{} {}", self.to_notation(), self.phase.code())
    }
}

impl std::fmt::Display for BoardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.board_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::types::{Color, PieceKind};

    fn sq(name: &str) -> Square {
        Square::from_algebraic(name).unwrap()
    }

    // ===================================================================
    // Decoding
    // ===================================================================

    #[test]
    fn initial_position_layout() {
        let board = BoardState::initial();
        assert_eq!(board.phase(), Phase::WhiteToMove);
        assert_eq!(
            board.piece_at(sq("e2")),
            Some(Piece::new(Color::White, PieceKind::Pawn))
        );
        assert_eq!(
            board.piece_at(sq("e8")),
            Some(Piece::new(Color::Black, PieceKind::King))
        );
        assert_eq!(
            board.piece_at(sq("d1")),
            Some(Piece::new(Color::White, PieceKind::Queen))
        );
        assert_eq!(board.piece_at(sq("e4")), None);
        assert_eq!(board.squares().filter(|v| v.occupant.is_some()).count(), 32);
    }

    #[test]
    fn decode_yields_64_squares_with_parity_shading() {
        let board = BoardState::from_notation("8/8/8/3k4/8/8/8/4K3").unwrap();
        let views: Vec<SquareView> = board.squares().collect();
        assert_eq!(views.len(), 64);
        for (i, view) in views.iter().enumerate() {
            assert_eq!(view.square.index(), i);
            let parity = (view.square.file() + view.square.rank()) % 2;
            let expected = if parity == 0 { Shade::Light } else { Shade::Dark };
            assert_eq!(view.shade, expected);
        }
    }

    #[test]
    fn snapshot_carries_phase() {
        let board = BoardState::from_snapshot(&format!("{INITIAL_NOTATION} 2")).unwrap();
        assert_eq!(board.phase(), Phase::BlackToMove);
        let board = BoardState::from_snapshot("8/8/8/8/8/8/8/8 5").unwrap();
        assert_eq!(board.phase(), Phase::Draw);
    }

    #[test]
    fn snapshot_rejects_bad_phase() {
        assert_eq!(
            BoardState::from_snapshot(&format!("{INITIAL_NOTATION} 9")),
            Err(BoardError::InvalidPhase("9".into()))
        );
        assert!(matches!(
            BoardState::from_snapshot(&format!("{INITIAL_NOTATION} w")),
            Err(BoardError::InvalidPhase(_))
        ));
        assert!(matches!(
            BoardState::from_snapshot(INITIAL_NOTATION),
            Err(BoardError::MalformedNotation(_))
        ));
    }

    // ===================================================================
    // Malformed notation
    // ===================================================================

    #[test]
    fn rejects_wrong_rank_count() {
        assert!(matches!(
            BoardState::from_notation("8/8/8/8/8/8/8"),
            Err(BoardError::MalformedNotation(_))
        ));
        assert!(matches!(
            BoardState::from_notation("8/8/8/8/8/8/8/8/8"),
            Err(BoardError::MalformedNotation(_))
        ));
    }

    #[test]
    fn rejects_short_and_long_ranks() {
        for bad in [
            "rnbqkbn/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR",
            "rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR",
            "8/8/8/44/8/8/8/7",
            "8/8/8/8/8/8/8/9",
            "8/8/8/8/8/8/8/72",
            "8/8/8/8/8/8/8/",
            "8/8/8/8/0/8/8/8",
        ] {
            assert!(
                matches!(
                    BoardState::from_notation(bad),
                    Err(BoardError::MalformedNotation(_))
                ),
                "accepted {bad}"
            );
        }
    }

    #[test]
    fn rejects_letters_outside_alphabet() {
        for bad in [
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNX",
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNx",
            "rnbqkbnr/pppppppp/8/8/3a4/8/PPPPPPPP/RNBQKBNR",
        ] {
            assert!(matches!(
                BoardState::from_notation(bad),
                Err(BoardError::MalformedNotation(_))
            ));
        }
    }

    // ===================================================================
    // Encoding
    // ===================================================================

    #[test]
    fn initial_notation_round_trip() {
        assert_eq!(BoardState::initial().to_notation(), INITIAL_NOTATION);
        assert_eq!(
            BoardState::initial(),
            BoardState::from_notation(INITIAL_NOTATION).unwrap()
        );
    }

    #[test]
    fn notation_round_trip_preserves_placement() {
        for notation in [
            INITIAL_NOTATION,
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR",
            "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R",
            "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8",
            "8/8/8/8/8/8/8/8",
        ] {
            let board = BoardState::from_notation(notation).unwrap();
            let encoded = board.to_notation();
            assert_eq!(encoded, notation);
            let again = BoardState::from_notation(&encoded).unwrap();
            assert!(again.same_placement(&board));
        }
    }

    #[test]
    fn non_canonical_runs_compress_on_encode() {
        let board = BoardState::from_notation("11111111/8/8/8/8/8/8/8").unwrap();
        assert_eq!(board.to_notation(), "8/8/8/8/8/8/8/8");
    }

    #[test]
    fn snapshot_round_trip() {
        let snap = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR 2";
        assert_eq!(BoardState::from_snapshot(snap).unwrap().to_snapshot(), snap);
    }

    // ===================================================================
    // Local echo
    // ===================================================================

    #[test]
    fn apply_local_move_moves_occupant() {
        let board = BoardState::initial();
        let next = board.apply_local_move(sq("e2"), sq("e4"));
        assert_eq!(next.piece_at(sq("e2")), None);
        assert_eq!(
            next.piece_at(sq("e4")),
            Some(Piece::new(Color::White, PieceKind::Pawn))
        );
        assert_eq!(next.phase(), board.phase());
        // the source board is untouched
        assert!(board.piece_at(sq("e2")).is_some());
    }

    #[test]
    fn local_echo_is_replaced_by_snapshot() {
        let echo = BoardState::initial().apply_local_move(sq("e2"), sq("e3"));
        let authoritative = BoardState::from_snapshot(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR 2",
        )
        .unwrap();
        assert!(!echo.same_placement(&authoritative));
        assert_eq!(authoritative.piece_at(sq("e3")), None);
    }

    #[test]
    fn board_string_has_rank_eight_first() {
        let s = BoardState::initial().board_string();
        let first = s.lines().next().unwrap();
        assert_eq!(first, "8 r n b q k b n r");
        assert!(s.ends_with("  a b c d e f g h\n"));
    }
}

use std::fmt;

// ---------------------------------------------------------------------------
// Color
// ---------------------------------------------------------------------------

/// The two sides in a chess game.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl std::ops::Not for Color {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Black => write!(f, "black"),
        }
    }
}

// ---------------------------------------------------------------------------
// PieceKind
// ---------------------------------------------------------------------------

/// The six piece kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    Pawn,
    Knight,
    Bishop,
    Rook,
    Queen,
    King,
}

impl PieceKind {
    /// All piece kinds in order.
    pub const ALL: [PieceKind; 6] = [
        PieceKind::Pawn,
        PieceKind::Knight,
        PieceKind::Bishop,
        PieceKind::Rook,
        PieceKind::Queen,
        PieceKind::King,
    ];

    /// Single uppercase letter for white, lowercase for black.
    pub fn to_char(self, color: Color) -> char {
        let c = match self {
            PieceKind::Pawn => 'p',
            PieceKind::Knight => 'n',
            PieceKind::Bishop => 'b',
            PieceKind::Rook => 'r',
            PieceKind::Queen => 'q',
            PieceKind::King => 'k',
        };
        match color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }

    /// Parse a notation letter. Case carries the color.
    pub fn from_char(c: char) -> Option<(Color, PieceKind)> {
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        let kind = match c.to_ascii_lowercase() {
            'p' => PieceKind::Pawn,
            'n' => PieceKind::Knight,
            'b' => PieceKind::Bishop,
            'r' => PieceKind::Rook,
            'q' => PieceKind::Queen,
            'k' => PieceKind::King,
            _ => return None,
        };
        Some((color, kind))
    }
}

impl fmt::Display for PieceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PieceKind::Pawn => write!(f, "pawn"),
            PieceKind::Knight => write!(f, "knight"),
            PieceKind::Bishop => write!(f, "bishop"),
            PieceKind::Rook => write!(f, "rook"),
            PieceKind::Queen => write!(f, "queen"),
            PieceKind::King => write!(f, "king"),
        }
    }
}

// ---------------------------------------------------------------------------
// Piece
// ---------------------------------------------------------------------------

/// A colored piece occupying a square.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Piece {
    pub color: Color,
    pub kind: PieceKind,
}

impl Piece {
    pub const fn new(color: Color, kind: PieceKind) -> Self {
        Piece { color, kind }
    }

    /// Notation letter for this piece.
    pub fn to_char(self) -> char {
        self.kind.to_char(self.color)
    }

    pub fn from_char(c: char) -> Option<Self> {
        PieceKind::from_char(c).map(|(color, kind)| Piece { color, kind })
    }

    /// Rendering asset key, e.g. `"white_knight"`.
    pub fn asset_key(self) -> &'static str {
        match (self.color, self.kind) {
            (Color::White, PieceKind::Pawn) => "white_pawn",
            (Color::White, PieceKind::Knight) => "white_knight",
            (Color::White, PieceKind::Bishop) => "white_bishop",
            (Color::White, PieceKind::Rook) => "white_rook",
            (Color::White, PieceKind::Queen) => "white_queen",
            (Color::White, PieceKind::King) => "white_king",
            (Color::Black, PieceKind::Pawn) => "black_pawn",
            (Color::Black, PieceKind::Knight) => "black_knight",
            (Color::Black, PieceKind::Bishop) => "black_bishop",
            (Color::Black, PieceKind::Rook) => "black_rook",
            (Color::Black, PieceKind::Queen) => "black_queen",
            (Color::Black, PieceKind::King) => "black_king",
        }
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.color, self.kind)
    }
}

// ---------------------------------------------------------------------------
// Square
// ---------------------------------------------------------------------------

/// Light or dark checkerboard shade.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shade {
    Light,
    Dark,
}

/// A board square, 0..63 in display order: a8=0, h8=7, a1=56, h1=63.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Square(u8);

impl Square {
    pub const NUM: usize = 64;

    /// Checked constructor.
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < Self::NUM).then_some(Square(index))
    }

    #[inline]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// File 0..7 (a..h).
    #[inline]
    pub fn file(self) -> u8 {
        self.0 % 8
    }

    /// Rank 1..8.
    #[inline]
    pub fn rank(self) -> u8 {
        8 - self.0 / 8
    }

    /// `file` in 0..7, `rank` in 1..8.
    pub fn from_file_rank(file: u8, rank: u8) -> Option<Self> {
        if file < 8 && (1..=8).contains(&rank) {
            Some(Square(file + (8 - rank) * 8))
        } else {
            None
        }
    }

    /// Light when `file + rank` is even.
    #[inline]
    pub fn shade(self) -> Shade {
        if (self.file() + self.rank()) % 2 == 0 {
            Shade::Light
        } else {
            Shade::Dark
        }
    }

    /// Parse algebraic notation like "e4".
    pub fn from_algebraic(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].wrapping_sub(b'a');
        let rank = bytes[1].wrapping_sub(b'0');
        Square::from_file_rank(file, rank)
    }

    /// Convert to algebraic notation like "e4".
    pub fn to_algebraic(self) -> String {
        let file = (b'a' + self.file()) as char;
        let rank = (b'0' + self.rank()) as char;
        format!("{file}{rank}")
    }

    /// All 64 squares in index order.
    pub fn all() -> impl Iterator<Item = Square> {
        (0..Self::NUM as u8).map(Square)
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_algebraic())
    }
}

impl std::str::FromStr for Square {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Square::from_algebraic(s).ok_or_else(|| BoardError::InvalidSquare(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// Whose move it is, or how the game ended.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    #[default]
    WhiteToMove,
    BlackToMove,
    WhiteWon,
    BlackWon,
    Draw,
}

impl Phase {
    /// Wire code: 1..=5.
    pub fn code(self) -> u8 {
        match self {
            Phase::WhiteToMove => 1,
            Phase::BlackToMove => 2,
            Phase::WhiteWon => 3,
            Phase::BlackWon => 4,
            Phase::Draw => 5,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Phase::WhiteToMove),
            2 => Some(Phase::BlackToMove),
            3 => Some(Phase::WhiteWon),
            4 => Some(Phase::BlackWon),
            5 => Some(Phase::Draw),
            _ => None,
        }
    }

    /// The side to move, or `None` once the game is decided.
    pub fn side_to_move(self) -> Option<Color> {
        match self {
            Phase::WhiteToMove => Some(Color::White),
            Phase::BlackToMove => Some(Color::Black),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.side_to_move().is_none()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::WhiteToMove => "white_to_move",
            Phase::BlackToMove => "black_to_move",
            Phase::WhiteWon => "white_won",
            Phase::BlackWon => "black_won",
            Phase::Draw => "draw",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// BoardError
// ---------------------------------------------------------------------------

/// Errors raised while reading board data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BoardError {
    #[error("malformed board notation: {0}")]
    MalformedNotation(String),

    #[error("invalid square notation: {0}")]
    InvalidSquare(String),

    #[error("invalid phase code: {0}")]
    InvalidPhase(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

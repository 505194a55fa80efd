//! Arena grid and zone geometry
//!
//! The grid stores one marker per interior cell (rows and columns 1..=20).
//! Players live in eight perimeter strips ("zones") and aliens in the inner
//! square of rows/columns 3..=18; the two regions never overlap.

use rand::Rng;
use shared::{
    cell_index, ALIEN_GLYPH, ARENA_SIZE, EMPTY_GLYPH, GRID_BYTES, HORIZONTAL_BEAM_GLYPH,
    VERTICAL_BEAM_GLYPH,
};

pub const ARENA_MIN: usize = 1;
pub const ARENA_MAX: usize = ARENA_SIZE;
pub const INNER_MIN: usize = 3;
pub const INNER_MAX: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    pub fn in_alien_space(&self) -> bool {
        (INNER_MIN..=INNER_MAX).contains(&self.row) && (INNER_MIN..=INNER_MAX).contains(&self.col)
    }

    /// Uniform random position inside the alien region.
    pub fn random_inner<R: Rng>(rng: &mut R) -> Self {
        Self {
            row: rng.gen_range(INNER_MIN..=INNER_MAX),
            col: rng.gen_range(INNER_MIN..=INNER_MAX),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Sweeps a whole row.
    Horizontal,
    /// Sweeps a whole column.
    Vertical,
}

impl Orientation {
    pub fn glyph(&self) -> u8 {
        match self {
            Orientation::Horizontal => HORIZONTAL_BEAM_GLYPH,
            Orientation::Vertical => VERTICAL_BEAM_GLYPH,
        }
    }

    /// Row (horizontal) or column (vertical) a beam fired from `origin` travels along.
    pub fn line_of(&self, origin: Position) -> usize {
        match self {
            Orientation::Horizontal => origin.row,
            Orientation::Vertical => origin.col,
        }
    }

    /// Every interior position on the given line, in ascending order.
    pub fn positions(&self, line: usize) -> impl Iterator<Item = Position> {
        let orientation = *self;
        (ARENA_MIN..=ARENA_MAX).map(move |i| match orientation {
            Orientation::Horizontal => Position::new(line, i),
            Orientation::Vertical => Position::new(i, line),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Player(u8),
    Alien,
    /// Transient beam marker tagged with the shot that drew it.
    Beam { orientation: Orientation, shot: u64 },
    /// Banner text written on the final frame.
    Label(u8),
}

impl Cell {
    pub fn glyph(&self) -> u8 {
        match self {
            Cell::Empty => EMPTY_GLYPH,
            Cell::Player(glyph) | Cell::Label(glyph) => *glyph,
            Cell::Alien => ALIEN_GLYPH,
            Cell::Beam { orientation, .. } => orientation.glyph(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Zone {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
}

impl Zone {
    pub const ALL: [Zone; 8] = [
        Zone::A,
        Zone::B,
        Zone::C,
        Zone::D,
        Zone::E,
        Zone::F,
        Zone::G,
        Zone::H,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Zone> {
        Self::ALL.get(index).copied()
    }

    pub fn letter(&self) -> u8 {
        b'A' + self.index() as u8
    }

    pub fn from_letter(letter: u8) -> Option<Zone> {
        letter
            .checked_sub(b'A')
            .and_then(|index| Self::from_index(index as usize))
    }

    /// Zones on the left/right edges fire along their row, the others along their column.
    pub fn orientation(&self) -> Orientation {
        match self {
            Zone::A | Zone::D | Zone::F | Zone::H => Orientation::Horizontal,
            Zone::B | Zone::C | Zone::E | Zone::G => Orientation::Vertical,
        }
    }

    /// The fixed row or column this zone's strip occupies.
    fn strip(&self) -> usize {
        match self {
            Zone::A => 1,
            Zone::H => 2,
            Zone::D => 19,
            Zone::F => 20,
            Zone::E => 1,
            Zone::G => 2,
            Zone::B => 19,
            Zone::C => 20,
        }
    }

    pub fn contains(&self, pos: Position) -> bool {
        let span = INNER_MIN..=INNER_MAX;
        match self.orientation() {
            // Vertical strips along the side edges
            Orientation::Horizontal => pos.col == self.strip() && span.contains(&pos.row),
            // Horizontal strips along the top and bottom edges
            Orientation::Vertical => pos.row == self.strip() && span.contains(&pos.col),
        }
    }

    /// Uniform random position inside this zone.
    pub fn spawn_position<R: Rng>(&self, rng: &mut R) -> Position {
        let along = rng.gen_range(INNER_MIN..=INNER_MAX);
        match self.orientation() {
            Orientation::Horizontal => Position::new(along, self.strip()),
            Orientation::Vertical => Position::new(self.strip(), along),
        }
    }

    /// Maps a coordinate to the zone containing it, if any.
    pub fn classify(pos: Position) -> Option<Zone> {
        Self::ALL.iter().copied().find(|zone| zone.contains(pos))
    }
}

/// The shared 20x20 cell store.
#[derive(Debug, Clone)]
pub struct Grid {
    cells: Vec<Cell>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::new()
    }
}

impl Grid {
    pub fn new() -> Self {
        Self {
            cells: vec![Cell::Empty; GRID_BYTES],
        }
    }

    fn in_bounds(pos: Position) -> bool {
        (ARENA_MIN..=ARENA_MAX).contains(&pos.row) && (ARENA_MIN..=ARENA_MAX).contains(&pos.col)
    }

    /// Out-of-bounds positions read as empty.
    pub fn get(&self, pos: Position) -> Cell {
        if Self::in_bounds(pos) {
            self.cells[cell_index(pos.row, pos.col)]
        } else {
            Cell::Empty
        }
    }

    pub fn set(&mut self, pos: Position, cell: Cell) {
        if Self::in_bounds(pos) {
            self.cells[cell_index(pos.row, pos.col)] = cell;
        }
    }

    pub fn is_vacant(&self, pos: Position) -> bool {
        Self::in_bounds(pos) && self.get(pos) == Cell::Empty
    }

    /// Positions of all alien markers, row-major.
    pub fn alien_positions(&self) -> Vec<Position> {
        self.positions()
            .filter(|pos| self.get(*pos) == Cell::Alien)
            .collect()
    }

    pub fn count_aliens(&self) -> usize {
        self.cells.iter().filter(|cell| **cell == Cell::Alien).count()
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> {
        (ARENA_MIN..=ARENA_MAX)
            .flat_map(|row| (ARENA_MIN..=ARENA_MAX).map(move |col| Position::new(row, col)))
    }

    pub fn clear(&mut self) {
        self.cells.fill(Cell::Empty);
    }

    /// Writes text left to right starting at `start`, one byte per cell.
    pub fn write_text(&mut self, start: Position, text: &str) {
        for (offset, byte) in text.bytes().enumerate() {
            let pos = Position::new(start.row, start.col + offset);
            if !Self::in_bounds(pos) {
                break;
            }
            self.set(pos, Cell::Label(byte));
        }
    }

    /// Row-major byte snapshot, one byte per cell.
    pub fn snapshot(&self) -> Vec<u8> {
        self.cells.iter().map(Cell::glyph).collect()
    }
}

//! Grid world: the cell-type matrix, coordinates and moves.

#[cfg(not(feature = "std"))]
use alloc::{collections::VecDeque, string::String, vec, vec::Vec};
#[cfg(feature = "std")]
use std::collections::VecDeque;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SandboxError;

/// Content of one grid cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Cell {
    #[default]
    Empty,
    Wall,
    Goal,
    Trap,
}

impl Cell {
    pub const ALL: [Cell; 4] = [Cell::Empty, Cell::Wall, Cell::Goal, Cell::Trap];

    pub fn as_str(self) -> &'static str {
        match self {
            Cell::Empty => "empty",
            Cell::Wall => "wall",
            Cell::Goal => "goal",
            Cell::Trap => "trap",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "empty" | "clear" | "." => Some(Cell::Empty),
            "wall" | "#" => Some(Cell::Wall),
            "goal" | "g" => Some(Cell::Goal),
            "trap" | "t" => Some(Cell::Trap),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Wall => '#',
            Cell::Goal => 'G',
            Cell::Trap => 'T',
        }
    }

    /// Goal and trap cells end an episode when entered.
    pub fn is_terminal(self) -> bool {
        matches!(self, Cell::Goal | Cell::Trap)
    }
}

/// Integer grid coordinate; `(0, 0)` is the top-left cell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Position) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

impl From<(u32, u32)> for Position {
    fn from((x, y): (u32, u32)) -> Self {
        Self { x, y }
    }
}

/// One of the four unit moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
}

impl Action {
    pub const COUNT: usize = 4;
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Action::Up => 0,
            Action::Down => 1,
            Action::Left => 2,
            Action::Right => 3,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Self::ALL.get(i).copied()
    }

    /// Unit displacement `(dx, dy)`; y grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Action::Up => (0, -1),
            Action::Down => (0, 1),
            Action::Left => (-1, 0),
            Action::Right => (1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
        }
    }

    pub fn from_action_str(action: &str) -> Option<Self> {
        match action {
            "up" => Some(Action::Up),
            "down" => Some(Action::Down),
            "left" => Some(Action::Left),
            "right" => Some(Action::Right),
            _ => None,
        }
    }
}

/// Fixed-size rectangular matrix of cells with a protected start cell and at
/// most one goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridWorld {
    w: u32,
    h: u32,
    cells: Vec<Cell>,
    start: Position,
    goal: Option<Position>,
}

impl GridWorld {
    pub const MIN_SIZE: u32 = 3;
    pub const START: Position = Position::new(1, 1);

    /// All-empty grid. Fails with `InvalidDimension` below 3x3.
    pub fn new(width: u32, height: u32) -> Result<Self, SandboxError> {
        if width < Self::MIN_SIZE || height < Self::MIN_SIZE {
            return Err(SandboxError::InvalidDimension { width, height });
        }
        Ok(Self {
            w: width,
            h: height,
            cells: vec![Cell::Empty; (width as usize) * (height as usize)],
            start: Self::START,
            goal: None,
        })
    }

    /// Empty grid surrounded by a one-cell wall border.
    pub fn with_border_walls(width: u32, height: u32) -> Result<Self, SandboxError> {
        let mut grid = Self::new(width, height)?;
        for y in 0..height {
            for x in 0..width {
                if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
                    grid.put(Position::new(x, y), Cell::Wall);
                }
            }
        }
        Ok(grid)
    }

    pub fn width(&self) -> u32 {
        self.w
    }

    pub fn height(&self) -> u32 {
        self.h
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn goal(&self) -> Option<Position> {
        self.goal
    }

    /// Row-major read-only view of every cell.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x < self.w && pos.y < self.h
    }

    #[inline]
    fn idx(&self, pos: Position) -> usize {
        (pos.y as usize) * (self.w as usize) + (pos.x as usize)
    }

    fn checked_idx(&self, pos: Position) -> Result<usize, SandboxError> {
        if self.in_bounds(pos) {
            Ok(self.idx(pos))
        } else {
            Err(SandboxError::OutOfBounds { x: pos.x, y: pos.y })
        }
    }

    pub fn cell(&self, pos: Position) -> Result<Cell, SandboxError> {
        let i = self.checked_idx(pos)?;
        Ok(self.cells[i])
    }

    /// Paint one cell.
    ///
    /// Returns `Ok(true)` when the layout actually changed. Painting a goal
    /// clears the previous one first.
    pub fn set_cell(&mut self, pos: Position, cell: Cell) -> Result<bool, SandboxError> {
        let i = self.checked_idx(pos)?;
        if pos == self.start {
            return Err(SandboxError::ProtectedCell { x: pos.x, y: pos.y });
        }
        if self.cells[i] == cell {
            return Ok(false);
        }
        self.put(pos, cell);
        Ok(true)
    }

    /// In bounds and not a wall.
    #[inline]
    pub fn is_passable(&self, pos: Position) -> bool {
        self.in_bounds(pos) && self.cells[self.idx(pos)] != Cell::Wall
    }

    /// The in-bounds cell one move away, if any.
    pub fn neighbor(&self, pos: Position, action: Action) -> Option<Position> {
        let (dx, dy) = action.delta();
        let x = pos.x.checked_add_signed(dx)?;
        let y = pos.y.checked_add_signed(dy)?;
        let next = Position::new(x, y);
        self.in_bounds(next).then_some(next)
    }

    /// Number of non-wall cells among the four neighbours.
    pub fn open_neighbor_count(&self, pos: Position) -> usize {
        Action::ALL
            .iter()
            .filter_map(|&a| self.neighbor(pos, a))
            .filter(|&n| self.is_passable(n))
            .count()
    }

    pub fn count(&self, cell: Cell) -> usize {
        self.cells.iter().filter(|&&c| c == cell).count()
    }

    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.h).flat_map(move |y| (0..self.w).map(move |x| Position::new(x, y)))
    }

    /// Flood fill from the start through non-wall, non-trap cells.
    pub fn is_solvable(&self) -> bool {
        let Some(goal) = self.goal else {
            return false;
        };
        let mut seen = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();
        seen[self.idx(self.start)] = true;
        queue.push_back(self.start);

        while let Some(pos) = queue.pop_front() {
            if pos == goal {
                return true;
            }
            for a in Action::ALL {
                let Some(n) = self.neighbor(pos, a) else {
                    continue;
                };
                let i = self.idx(n);
                if seen[i] || matches!(self.cells[i], Cell::Wall | Cell::Trap) {
                    continue;
                }
                seen[i] = true;
                queue.push_back(n);
            }
        }
        false
    }

    /// Text picture of the grid, one row per line. `S` marks the start and
    /// `A` the agent when given.
    pub fn render_ascii(&self, agent: Option<Position>) -> String {
        let mut out = String::with_capacity(self.cells.len() + self.h as usize);
        for pos in self.positions() {
            let ch = if Some(pos) == agent {
                'A'
            } else if pos == self.start {
                'S'
            } else {
                self.cells[self.idx(pos)].as_char()
            };
            out.push(ch);
            if pos.x + 1 == self.w {
                out.push('\n');
            }
        }
        out
    }

    /// Unchecked write used by generators and builders. The start cell is
    /// not protected here.
    pub(crate) fn put(&mut self, pos: Position, cell: Cell) {
        let i = self.idx(pos);
        let prev = self.cells[i];
        if cell == Cell::Goal {
            if let Some(old) = self.goal.take() {
                let oi = self.idx(old);
                self.cells[oi] = Cell::Empty;
            }
            self.goal = Some(pos);
        } else if prev == Cell::Goal {
            self.goal = None;
        }
        self.cells[i] = cell;
    }

    pub(crate) fn fill(&mut self, cell: Cell) {
        debug_assert!(cell != Cell::Goal, "a grid holds at most one goal");
        self.cells.fill(cell);
        self.goal = None;
    }
}

use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

const COLS: usize = 10;
const ROWS: usize = 20;
const LINES_PER_LEVEL: u32 = 10;
const LINE_SCORES: [u32; 5] = [0, 100, 300, 500, 800];
const BASE_DROP_MS: f32 = 1000.0;
const MIN_DROP_MS: f32 = 120.0;
const LEVEL_SPEEDUP: f32 = 0.85;
// Cell marker for the ghost projection in frame snapshots; 1..=7 are piece colors.
const GHOST_CELL: u8 = 8;

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
}

fn log(msg: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::log_1(&JsValue::from_str(msg));
    #[cfg(not(target_arch = "wasm32"))]
    let _ = msg;
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum PieceKind {
    I,
    J,
    L,
    O,
    S,
    Z,
    T,
}

impl PieceKind {
    pub fn all() -> [PieceKind; 7] {
        [
            PieceKind::I,
            PieceKind::J,
            PieceKind::L,
            PieceKind::O,
            PieceKind::S,
            PieceKind::Z,
            PieceKind::T,
        ]
    }

    // Uniform independent draw; deliberately not a bag randomizer, so long
    // repeats of the same kind are possible.
    fn random() -> PieceKind {
        let mut rng = thread_rng();
        *PieceKind::all().choose(&mut rng).unwrap()
    }

    fn color_id(self) -> u8 {
        match self {
            PieceKind::I => 1,
            PieceKind::J => 2,
            PieceKind::L => 3,
            PieceKind::O => 4,
            PieceKind::S => 5,
            PieceKind::Z => 6,
            PieceKind::T => 7,
        }
    }

    fn rotation_states(self) -> &'static [&'static [&'static [u8]]] {
        match self {
            PieceKind::I => &I_STATES,
            PieceKind::J => &J_STATES,
            PieceKind::L => &L_STATES,
            PieceKind::O => &O_STATES,
            PieceKind::S => &S_STATES,
            PieceKind::Z => &Z_STATES,
            PieceKind::T => &T_STATES,
        }
    }
}

// Catalog of rotation states. I and O live in a 4x4 matrix, everything else
// in 3x3. Kinds with rotational symmetry list only their distinct states;
// live rotation is the matrix transform below, so the catalog supplies spawn
// shapes and the mini-board previews.
const I_STATES: [&[&[u8]]; 2] = [
    &[&[0, 0, 0, 0], &[1, 1, 1, 1], &[0, 0, 0, 0], &[0, 0, 0, 0]],
    &[&[0, 0, 1, 0], &[0, 0, 1, 0], &[0, 0, 1, 0], &[0, 0, 1, 0]],
];

const J_STATES: [&[&[u8]]; 4] = [
    &[&[1, 0, 0], &[1, 1, 1], &[0, 0, 0]],
    &[&[0, 1, 1], &[0, 1, 0], &[0, 1, 0]],
    &[&[0, 0, 0], &[1, 1, 1], &[0, 0, 1]],
    &[&[0, 1, 0], &[0, 1, 0], &[1, 1, 0]],
];

const L_STATES: [&[&[u8]]; 4] = [
    &[&[0, 0, 1], &[1, 1, 1], &[0, 0, 0]],
    &[&[0, 1, 0], &[0, 1, 0], &[0, 1, 1]],
    &[&[0, 0, 0], &[1, 1, 1], &[1, 0, 0]],
    &[&[1, 1, 0], &[0, 1, 0], &[0, 1, 0]],
];

const O_STATES: [&[&[u8]]; 1] =
    [&[&[0, 1, 1, 0], &[0, 1, 1, 0], &[0, 0, 0, 0], &[0, 0, 0, 0]]];

const S_STATES: [&[&[u8]]; 2] = [
    &[&[0, 1, 1], &[1, 1, 0], &[0, 0, 0]],
    &[&[0, 1, 0], &[0, 1, 1], &[0, 0, 1]],
];

const T_STATES: [&[&[u8]]; 4] = [
    &[&[0, 1, 0], &[1, 1, 1], &[0, 0, 0]],
    &[&[0, 1, 0], &[0, 1, 1], &[0, 1, 0]],
    &[&[0, 0, 0], &[1, 1, 1], &[0, 1, 0]],
    &[&[0, 1, 0], &[1, 1, 0], &[0, 1, 0]],
];

const Z_STATES: [&[&[u8]]; 2] = [
    &[&[1, 1, 0], &[0, 1, 1], &[0, 0, 0]],
    &[&[0, 0, 1], &[0, 1, 1], &[0, 1, 0]],
];

type Shape = Vec<Vec<bool>>;

fn shape_from(rows: &[&[u8]]) -> Shape {
    rows.iter()
        .map(|row| row.iter().map(|&cell| cell != 0).collect())
        .collect()
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Spin {
    Cw,
    Ccw,
}

fn rotate_shape(shape: &Shape, spin: Spin) -> Shape {
    let size = shape.len();
    let mut out = vec![vec![false; size]; size];
    for row in 0..size {
        for col in 0..size {
            match spin {
                Spin::Cw => out[col][size - 1 - row] = shape[row][col],
                Spin::Ccw => out[size - 1 - col][row] = shape[row][col],
            }
        }
    }
    out
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct GameSettings {
    pub ghost_enabled: bool,
    pub grid: GridStyle,
}

impl Default for GameSettings {
    fn default() -> Self {
        Self {
            ghost_enabled: true,
            grid: GridStyle::Standard,
        }
    }
}

// Renderer hint only; echoed back through the frame snapshot.
#[derive(Clone, Copy, Serialize, Deserialize, Debug)]
pub enum GridStyle {
    None,
    Standard,
    Partial,
    Full,
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct ControlBindings {
    pub move_left: String,
    pub move_right: String,
    pub soft_drop: String,
    pub hard_drop: String,
    pub rotate_cw: String,
    pub rotate_ccw: String,
    pub hold: String,
    pub toggle_pause: String,
}

impl Default for ControlBindings {
    fn default() -> Self {
        Self {
            move_left: "ArrowLeft".to_string(),
            move_right: "ArrowRight".to_string(),
            soft_drop: "ArrowDown".to_string(),
            hard_drop: "Space".to_string(),
            rotate_cw: "ArrowUp".to_string(),
            rotate_ccw: "KeyZ".to_string(),
            hold: "ShiftLeft".to_string(),
            toggle_pause: "KeyP".to_string(),
        }
    }
}

#[derive(Clone, Debug)]
struct ActivePiece {
    kind: PieceKind,
    shape: Shape,
    row: i32,
    col: i32,
    // Quarter turns away from the spawn state, mod 4.
    rotation: u8,
}

impl ActivePiece {
    fn spawn(kind: PieceKind) -> Self {
        let shape = shape_from(kind.rotation_states()[0]);
        let col = spawn_col(&shape);
        Self {
            kind,
            shape,
            row: 0,
            col,
            rotation: 0,
        }
    }
}

fn spawn_col(shape: &Shape) -> i32 {
    (COLS as i32 - shape.len() as i32) / 2
}

// Hold keeps the shape as it was when stashed, so a rotated piece comes back
// rotated.
#[derive(Clone, Debug)]
struct HeldPiece {
    kind: PieceKind,
    shape: Shape,
}

#[derive(Clone)]
struct Board {
    cells: [[Option<PieceKind>; COLS]; ROWS],
}

impl Board {
    fn new() -> Self {
        Self {
            cells: [[None; COLS]; ROWS],
        }
    }

    // Pure trial placement check. Rows above the board (negative) only
    // collide horizontally, which lets pieces spawn partially off-screen.
    fn collides(&self, piece: &ActivePiece, row_off: i32, col_off: i32) -> bool {
        for (row, line) in piece.shape.iter().enumerate() {
            for (col, &filled) in line.iter().enumerate() {
                if !filled {
                    continue;
                }
                let board_row = piece.row + row_off + row as i32;
                let board_col = piece.col + col_off + col as i32;
                if board_col < 0 || board_col >= COLS as i32 || board_row >= ROWS as i32 {
                    return true;
                }
                if board_row >= 0
                    && self.cells[board_row as usize][board_col as usize].is_some()
                {
                    return true;
                }
            }
        }
        false
    }

    fn merge(&mut self, piece: &ActivePiece) {
        for (row, line) in piece.shape.iter().enumerate() {
            for (col, &filled) in line.iter().enumerate() {
                if !filled {
                    continue;
                }
                let board_row = piece.row + row as i32;
                let board_col = piece.col + col as i32;
                if (0..ROWS as i32).contains(&board_row)
                    && (0..COLS as i32).contains(&board_col)
                {
                    self.cells[board_row as usize][board_col as usize] = Some(piece.kind);
                }
            }
        }
    }

    fn clear_full_rows(&mut self) -> u32 {
        let mut cleared = 0;
        let mut row = ROWS;
        while row > 0 {
            if self.cells[row - 1].iter().all(|cell| cell.is_some()) {
                for pull in (1..row).rev() {
                    self.cells[pull] = self.cells[pull - 1];
                }
                self.cells[0] = [None; COLS];
                cleared += 1;
                // the row that slid into this index gets re-checked
            } else {
                row -= 1;
            }
        }
        cleared
    }
}

fn drop_interval_for(level: u32) -> f32 {
    (BASE_DROP_MS * LEVEL_SPEEDUP.powi(level as i32 - 1)).max(MIN_DROP_MS)
}

struct Game {
    board: Board,
    current: Option<ActivePiece>,
    next: ActivePiece,
    hold: Option<HeldPiece>,
    hold_used: bool,
    score: u32,
    level: u32,
    lines: u32,
    drop_interval: f32,
    drop_counter: f32,
    paused: bool,
    game_over: bool,
    settings: GameSettings,
}

impl Game {
    fn new(settings: GameSettings) -> Self {
        let mut game = Self {
            board: Board::new(),
            current: None,
            next: ActivePiece::spawn(PieceKind::random()),
            hold: None,
            hold_used: false,
            score: 0,
            level: 1,
            lines: 0,
            drop_interval: BASE_DROP_MS,
            drop_counter: 0.0,
            paused: false,
            game_over: false,
            settings,
        };
        game.spawn_next();
        game
    }

    fn accepting_input(&self) -> bool {
        !self.paused && !self.game_over
    }

    // Promotes the queued piece and refills the queue. Failing the collision
    // check right at spawn is the only way into game over.
    fn spawn_next(&mut self) {
        let mut piece =
            std::mem::replace(&mut self.next, ActivePiece::spawn(PieceKind::random()));
        piece.row = 0;
        piece.col = spawn_col(&piece.shape);
        self.hold_used = false;
        if self.board.collides(&piece, 0, 0) {
            self.current = None;
            self.game_over = true;
            log("game over: spawn position blocked");
        } else {
            self.current = Some(piece);
        }
    }

    fn shift(&mut self, delta: i32) {
        if !self.accepting_input() {
            return;
        }
        let Some(piece) = self.current.as_mut() else {
            return;
        };
        if !self.board.collides(piece, 0, delta) {
            piece.col += delta;
        }
    }

    fn rotate(&mut self, spin: Spin) {
        if !self.accepting_input() {
            return;
        }
        let Some(piece) = self.current.as_mut() else {
            return;
        };
        let trial = ActivePiece {
            shape: rotate_shape(&piece.shape, spin),
            ..piece.clone()
        };
        let size = trial.shape.len() as i32;
        // Simplified horizontal-only kick search: 0, +1, -1, ... up to the
        // shape size, first fit wins; past that the rotation is abandoned.
        for offset in 0..size {
            for kick in [offset, -offset] {
                if !self.board.collides(&trial, 0, kick) {
                    piece.shape = trial.shape;
                    piece.col += kick;
                    piece.rotation = match spin {
                        Spin::Cw => (piece.rotation + 1) % 4,
                        Spin::Ccw => (piece.rotation + 3) % 4,
                    };
                    return;
                }
            }
        }
    }

    fn soft_drop(&mut self) {
        if !self.accepting_input() {
            return;
        }
        let Some(piece) = self.current.as_mut() else {
            return;
        };
        if !self.board.collides(piece, 1, 0) {
            piece.row += 1;
            self.score += 1;
        } else {
            self.lock_current();
        }
        self.drop_counter = 0.0;
    }

    fn hard_drop(&mut self) {
        if !self.accepting_input() {
            return;
        }
        let Some(piece) = self.current.as_mut() else {
            return;
        };
        while !self.board.collides(piece, 1, 0) {
            piece.row += 1;
            self.score += 2;
        }
        self.lock_current();
    }

    fn hold(&mut self) {
        if !self.accepting_input() || self.hold_used {
            return;
        }
        let Some(current) = self.current.take() else {
            return;
        };
        let stashed = HeldPiece {
            kind: current.kind,
            shape: current.shape,
        };
        match self.hold.take() {
            Some(prev) => {
                let mut piece = ActivePiece::spawn(prev.kind);
                piece.shape = prev.shape;
                piece.col = spawn_col(&piece.shape);
                self.current = Some(piece);
                self.hold = Some(stashed);
            }
            None => {
                self.hold = Some(stashed);
                let mut piece =
                    std::mem::replace(&mut self.next, ActivePiece::spawn(PieceKind::random()));
                piece.row = 0;
                piece.col = spawn_col(&piece.shape);
                self.current = Some(piece);
            }
        }
        self.hold_used = true;
    }

    fn toggle_pause(&mut self) {
        if self.game_over {
            return;
        }
        self.paused = !self.paused;
    }

    // One gravity descent; a blocked descent locks instead. The accumulator
    // resets either way.
    fn apply_gravity(&mut self) {
        let Some(piece) = self.current.as_mut() else {
            return;
        };
        if !self.board.collides(piece, 1, 0) {
            piece.row += 1;
        } else {
            self.lock_current();
        }
        self.drop_counter = 0.0;
    }

    fn lock_current(&mut self) {
        let Some(piece) = self.current.take() else {
            return;
        };
        self.board.merge(&piece);
        let cleared = self.board.clear_full_rows();
        self.apply_clear_score(cleared);
        self.spawn_next();
    }

    fn apply_clear_score(&mut self, cleared: u32) {
        if cleared == 0 {
            return;
        }
        self.lines += cleared;
        self.score += LINE_SCORES[cleared as usize] * self.level;
        let level = self.lines / LINES_PER_LEVEL + 1;
        if level != self.level {
            self.level = level;
            self.drop_interval = drop_interval_for(level);
        }
    }

    fn tick(&mut self, dt_ms: f32) {
        if self.paused || self.game_over {
            return;
        }
        self.drop_counter += dt_ms;
        if self.drop_counter >= self.drop_interval {
            self.apply_gravity();
        }
    }

    fn ghost_piece(&self) -> Option<ActivePiece> {
        let mut ghost = self.current.as_ref()?.clone();
        while !self.board.collides(&ghost, 1, 0) {
            ghost.row += 1;
        }
        Some(ghost)
    }

    fn snapshot(&self) -> FrameView {
        let mut cells = [[0u8; COLS]; ROWS];
        for (row, line) in self.board.cells.iter().enumerate() {
            for (col, cell) in line.iter().enumerate() {
                cells[row][col] = cell.map_or(0, PieceKind::color_id);
            }
        }
        // Ghost first so the active piece wins where they overlap.
        if self.settings.ghost_enabled {
            if let Some(ghost) = self.ghost_piece() {
                stamp(&mut cells, &ghost, GHOST_CELL);
            }
        }
        if let Some(piece) = &self.current {
            stamp(&mut cells, piece, piece.kind.color_id());
        }
        FrameView {
            cells: cells.iter().flatten().copied().collect(),
            next: PieceView::of(self.next.kind, &self.next.shape),
            hold: self
                .hold
                .as_ref()
                .map(|held| PieceView::of(held.kind, &held.shape)),
            score: self.score,
            level: self.level,
            lines: self.lines,
            paused: self.paused,
            game_over: self.game_over,
            settings: self.settings.clone(),
        }
    }
}

fn stamp(cells: &mut [[u8; COLS]; ROWS], piece: &ActivePiece, value: u8) {
    for (row, line) in piece.shape.iter().enumerate() {
        for (col, &filled) in line.iter().enumerate() {
            if !filled {
                continue;
            }
            let board_row = piece.row + row as i32;
            let board_col = piece.col + col as i32;
            if (0..ROWS as i32).contains(&board_row) && (0..COLS as i32).contains(&board_col) {
                cells[board_row as usize][board_col as usize] = value;
            }
        }
    }
}

#[derive(Serialize)]
pub struct PieceView {
    pub color: u8,
    pub cells: Vec<Vec<bool>>,
}

impl PieceView {
    fn of(kind: PieceKind, shape: &Shape) -> Self {
        Self {
            color: kind.color_id(),
            cells: shape.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct FrameView {
    // ROWS x COLS, row-major, top row first; 0 empty, 1..=7 piece colors,
    // 8 ghost projection.
    pub cells: Vec<u8>,
    pub next: PieceView,
    pub hold: Option<PieceView>,
    pub score: u32,
    pub level: u32,
    pub lines: u32,
    pub paused: bool,
    pub game_over: bool,
    pub settings: GameSettings,
}


#[wasm_bindgen]
pub struct GameClient {
    game: Game,
}

#[wasm_bindgen]
impl GameClient {
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue) -> GameClient {
        let settings: GameSettings = from_value(settings).unwrap_or_default();
        GameClient {
            game: Game::new(settings),
        }
    }

    #[wasm_bindgen(js_name = tick)]
    pub fn tick(&mut self, dt_ms: f32) -> Result<JsValue, JsValue> {
        self.game.tick(dt_ms);
        to_value(&self.game.snapshot()).map_err(|e| e.into())
    }

    #[wasm_bindgen(js_name = snapshot)]
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        to_value(&self.game.snapshot()).map_err(|e| e.into())
    }

    #[wasm_bindgen(js_name = moveLeft)]
    pub fn move_left(&mut self) {
        self.game.shift(-1);
    }

    #[wasm_bindgen(js_name = moveRight)]
    pub fn move_right(&mut self) {
        self.game.shift(1);
    }

    #[wasm_bindgen(js_name = softDrop)]
    pub fn soft_drop(&mut self) {
        self.game.soft_drop();
    }

    #[wasm_bindgen(js_name = hardDrop)]
    pub fn hard_drop(&mut self) {
        self.game.hard_drop();
    }

    #[wasm_bindgen(js_name = rotateCw)]
    pub fn rotate_cw(&mut self) {
        self.game.rotate(Spin::Cw);
    }

    #[wasm_bindgen(js_name = rotateCcw)]
    pub fn rotate_ccw(&mut self) {
        self.game.rotate(Spin::Ccw);
    }

    #[wasm_bindgen(js_name = hold)]
    pub fn hold(&mut self) {
        self.game.hold();
    }

    #[wasm_bindgen(js_name = togglePause)]
    pub fn toggle_pause(&mut self) {
        self.game.toggle_pause();
    }

    #[wasm_bindgen(js_name = restart)]
    pub fn restart(&mut self) {
        self.game = Game::new(self.game.settings.clone());
    }

    #[wasm_bindgen(js_name = defaultBindings)]
    pub fn default_bindings() -> Result<JsValue, JsValue> {
        to_value(&ControlBindings::default()).map_err(|e| e.into())
    }
}

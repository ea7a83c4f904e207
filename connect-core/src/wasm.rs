//! WASM bindings for connect-core
//!
//! Provides a JavaScript-friendly API for a browser front end. The page maps
//! pointer events to cell indices and calls `begin` / `extend` / `end`.

use wasm_bindgen::prelude::*;

use crate::{Board, EngineError, Extend, Game, TurnOutcome};

fn to_js_error(err: EngineError) -> JsError {
    JsError::new(&err.to_string())
}

/// WASM-friendly wrapper around Game
#[wasm_bindgen]
pub struct WasmGame {
    inner: Game,
}

#[wasm_bindgen]
impl WasmGame {
    /// Start a new game. JS supplies the seed (e.g. from `crypto.getRandomValues`).
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> WasmGame {
        WasmGame { inner: Game::new(seed) }
    }

    /// Start from an exported encoding (decimal string of the u128).
    #[wasm_bindgen(js_name = fromEncoding)]
    pub fn from_encoding(encoding: &str, seed: u64) -> Result<WasmGame, JsError> {
        let bits: u128 = encoding
            .parse()
            .map_err(|_| JsError::new("encoding must be a decimal integer"))?;
        let board = Board::decode(bits).map_err(to_js_error)?;
        Ok(WasmGame { inner: Game::with_board(board, seed) })
    }

    /// Board encoding as a decimal string (u128 does not fit a JS number)
    pub fn encoding(&self) -> String {
        self.inner.board().encode().to_string()
    }

    /// Tile values in row-major order
    pub fn cells(&self) -> Vec<u32> {
        self.inner.board().values().to_vec()
    }

    /// Selected cell indices, first to last (for highlighting and drawing the line)
    pub fn path(&self) -> Vec<u8> {
        self.inner.selection().path().iter().map(|pos| pos.0).collect()
    }

    pub fn score(&self) -> f64 {
        self.inner.score() as f64
    }

    #[wasm_bindgen(js_name = isGameOver)]
    pub fn is_game_over(&self) -> bool {
        self.inner.is_over()
    }

    #[wasm_bindgen(js_name = isSelecting)]
    pub fn is_selecting(&self) -> bool {
        self.inner.selection().is_active()
    }

    pub fn begin(&mut self, index: usize) -> Result<(), JsError> {
        self.inner.begin(index).map_err(to_js_error)
    }

    /// Returns true when the path changed (append or retract), so the caller
    /// knows to redraw or vibrate.
    pub fn extend(&mut self, index: usize) -> Result<bool, JsError> {
        let result = self.inner.extend(index).map_err(to_js_error)?;
        Ok(matches!(result, Extend::Appended | Extend::Retracted))
    }

    /// End the gesture. Returns `{ merge, score, game_over }` as a JS object.
    pub fn end(&mut self) -> Result<JsValue, JsError> {
        let outcome = self.inner.end().map_err(to_js_error)?;
        serde_wasm_bindgen::to_value(&WasmOutcome::from(outcome)).map_err(JsError::from)
    }

    pub fn cancel(&mut self) {
        self.inner.cancel();
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }
}

/// Serializable turn outcome for JavaScript
#[derive(serde::Serialize)]
struct WasmOutcome {
    merged_value: Option<u32>,
    merged_at: Option<u8>,
    score_delta: f64,
    score: f64,
    game_over: bool,
}

impl From<TurnOutcome> for WasmOutcome {
    fn from(outcome: TurnOutcome) -> Self {
        WasmOutcome {
            merged_value: outcome.merge.map(|m| m.value),
            merged_at: outcome.merge.map(|m| m.at.0),
            score_delta: outcome.merge.map_or(0.0, |m| m.total as f64),
            score: outcome.score as f64,
            game_over: outcome.game_over,
        }
    }
}

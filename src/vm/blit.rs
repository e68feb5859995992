//! Per-pixel blit execution
//!
//! A blit worker caches one container and runs it once per source pixel,
//! binding `(pixel, shade, half)` as inputs and writing the transformed
//! pixel back through the destination surface. Zero output means
//! transparent: the pixel is skipped.

use super::Worker;
use crate::consts::*;
use crate::error::{ConfigError, RuntimeError};
use crate::container::Container;
use crate::parser::ParserCore;
use crate::types::TYPE_INT;

/// Minimal paletted pixel surface the blit worker draws through.
pub trait Surface {
    /// Surface width in pixels.
    fn width(&self) -> u32;

    /// Surface height in pixels.
    fn height(&self) -> u32;

    /// Read one pixel.
    fn pixel(&self, x: u32, y: u32) -> u8;

    /// Write one pixel.
    fn set_pixel(&mut self, x: u32, y: u32, value: u8);
}

/// A worker specialization caching one container for repeated per-pixel
/// execution.
pub struct BlitWorker<'a> {
    parser: &'a ParserCore,
    container: &'a Container,
    budget: usize,
}

impl<'a> BlitWorker<'a> {
    /// Bind a parser and container for blitting.
    ///
    /// The parser must declare one integer output (the transformed pixel)
    /// and exactly three integer inputs (`pixel`, `shade`, `half`).
    pub fn new(parser: &'a ParserCore, container: &'a Container) -> Result<Self, ConfigError> {
        let symbols = parser.symbols();

        let output_ok = symbols.outputs().len() == 1
            && symbols.outputs().iter().all(|decl| decl.kind.base == TYPE_INT);
        let inputs_ok = symbols.inputs().len() == 3
            && symbols.inputs().iter().all(|decl| decl.kind.base == TYPE_INT);

        if !output_ok || !inputs_ok {
            return Err(ConfigError::BlitSignature(parser.name().to_string()));
        }

        Ok(Self {
            parser,
            container,
            budget: DEFAULT_INSTRUCTION_BUDGET,
        })
    }

    /// Replace the per-pixel instruction budget.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Blit `src` onto `dst` at `(x, y)`, running the cached script per
    /// pixel.
    ///
    /// `shade` is forwarded to the script unchanged. A positive `half`
    /// restricts drawing to the right half of the source, a negative one to
    /// the left half. A zero script result skips the pixel.
    pub fn execute_blit<S: Surface, D: Surface>(
        &self,
        src: &S,
        dst: &mut D,
        x: i32,
        y: i32,
        shade: i64,
        half: i64,
    ) -> Result<(), RuntimeError> {
        let symbols = self.parser.symbols();
        let out = symbols.outputs()[0].offset;
        let input_offsets: Vec<u16> = symbols.inputs().iter().map(|decl| decl.offset).collect();

        let mid = src.width() / 2;

        for sy in 0..src.height() {
            for sx in 0..src.width() {
                if half > 0 && sx < mid {
                    continue;
                }
                if half < 0 && sx >= mid {
                    continue;
                }

                let dx = x + sx as i32;
                let dy = y + sy as i32;
                if dx < 0 || dy < 0 || dx as u32 >= dst.width() || dy as u32 >= dst.height() {
                    continue;
                }

                let pixel = src.pixel(sx, sy) as i64;

                let value = if self.container.is_empty() {
                    pixel
                } else {
                    let mut worker = Worker::new();
                    worker.set_word(input_offsets[0], pixel);
                    worker.set_word(input_offsets[1], shade);
                    worker.set_word(input_offsets[2], half);
                    // Scripts that fall through without a return keep the
                    // source pixel.
                    worker.set_word(out, pixel);

                    let mut budget = self.budget;
                    worker.execute_container(self.parser.catalog(), self.container, &mut budget)?;

                    worker.word(out)
                };

                if value != 0 {
                    dst.set_pixel(dx as u32, dy as u32, value.clamp(0, 255) as u8);
                }
            }
        }

        Ok(())
    }
}

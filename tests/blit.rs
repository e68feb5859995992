use std::sync::Arc;

use hookscript::prelude::*;

/// Row-major paletted buffer.
struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width * height) as usize],
        }
    }

    fn from_rows(rows: &[&[u8]]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map(|row| row.len()).unwrap_or(0) as u32;

        Self {
            width,
            height,
            pixels: rows.concat(),
        }
    }
}

impl Surface for Canvas {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn pixel(&self, x: u32, y: u32) -> u8 {
        self.pixels[(y * self.width + x) as usize]
    }

    fn set_pixel(&mut self, x: u32, y: u32, value: u8) {
        self.pixels[(y * self.width + x) as usize] = value;
    }
}

fn blit_parser(global: &Arc<ScriptGlobal>) -> Parser<(i64,), (i64, i64, i64)> {
    let mut parser = Parser::<(i64,), (i64, i64, i64)>::new(
        global,
        "blit",
        &["px"],
        &["pixel", "shade", "half"],
    )
    .unwrap();
    ops::install(&mut parser);

    parser
}

#[test]
fn blit_transforms_every_pixel() {
    let global = Arc::new(ScriptGlobal::new());
    let parser = blit_parser(&global);

    // Shift non-transparent pixels by the shade amount.
    let container = parser
        .parse(
            "recolor",
            "if eq pixel 0; px set 0; else; px add pixel shade; end; return px;",
        )
        .unwrap();

    let src = Canvas::from_rows(&[&[1, 0], &[2, 3]]);
    let mut dst = Canvas::new(2, 2);

    let blitter = BlitWorker::new(parser.core(), &container).unwrap();
    blitter.execute_blit(&src, &mut dst, 0, 0, 10, 0).unwrap();

    assert_eq!(dst.pixels, vec![11, 0, 12, 13]);
}

#[test]
fn blit_clips_to_the_destination() {
    let global = Arc::new(ScriptGlobal::new());
    let parser = blit_parser(&global);

    let container = parser.parse("copy", "px set pixel; return px;").unwrap();

    let src = Canvas::from_rows(&[&[7, 8], &[9, 6]]);
    let mut dst = Canvas::new(2, 2);

    let blitter = BlitWorker::new(parser.core(), &container).unwrap();
    // Offset by one: only the top-left source pixel lands inside.
    blitter.execute_blit(&src, &mut dst, 1, 1, 0, 0).unwrap();

    assert_eq!(dst.pixels, vec![0, 0, 0, 7]);
}

#[test]
fn blit_half_masks_draw_one_side() {
    let global = Arc::new(ScriptGlobal::new());
    let parser = blit_parser(&global);

    let container = parser.parse("copy", "px set pixel; return px;").unwrap();

    let src = Canvas::from_rows(&[&[1, 2], &[3, 4]]);

    let blitter = BlitWorker::new(parser.core(), &container).unwrap();

    let mut right_only = Canvas::new(2, 2);
    blitter
        .execute_blit(&src, &mut right_only, 0, 0, 0, 1)
        .unwrap();
    assert_eq!(right_only.pixels, vec![0, 2, 0, 4]);

    let mut left_only = Canvas::new(2, 2);
    blitter
        .execute_blit(&src, &mut left_only, 0, 0, 0, -1)
        .unwrap();
    assert_eq!(left_only.pixels, vec![1, 0, 3, 0]);
}

#[test]
fn empty_container_copies_the_source() {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser = blit_parser(&global);
    parser.set_default_script("broken too");

    let container = parser.parse_or_default("broken", "not a script;");
    assert!(container.is_empty());

    let src = Canvas::from_rows(&[&[5, 0]]);
    let mut dst = Canvas::new(2, 1);

    let blitter = BlitWorker::new(parser.core(), &container).unwrap();
    blitter.execute_blit(&src, &mut dst, 0, 0, 3, 0).unwrap();

    assert_eq!(dst.pixels, vec![5, 0]);
}

#[test]
fn blit_rejects_mismatched_signatures() {
    let global = Arc::new(ScriptGlobal::new());
    let mut parser = Parser::<(i64,), (i64,)>::new(&global, "narrow", &["px"], &["pixel"]).unwrap();
    ops::install(&mut parser);

    let container = parser.parse("copy", "px set pixel; return px;").unwrap();

    assert!(matches!(
        BlitWorker::new(parser.core(), &container),
        Err(ConfigError::BlitSignature(_))
    ));
}

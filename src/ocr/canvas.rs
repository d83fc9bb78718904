use super::{PageRect, RenderedTextElement};

/// Drawing surface for one page, measured in points from the top-left corner.
pub trait PageCanvas {
    fn width(&self) -> f32;
    fn height(&self) -> f32;
    fn draw_text(&mut self, element: &RenderedTextElement, visible: bool);
    fn draw_rectangle(&mut self, rect: PageRect);
}

#[derive(Debug, Clone)]
pub enum DrawOp {
    Text {
        element: RenderedTextElement,
        visible: bool,
    },
    Rectangle(PageRect),
}

/// Keeps draw calls so a page rebuilt on a worker can be written into a PDF
/// afterwards.
#[derive(Debug, Clone)]
pub struct RecordingCanvas {
    width: f32,
    height: f32,
    ops: Vec<DrawOp>,
}

impl RecordingCanvas {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn texts(&self) -> impl Iterator<Item = &RenderedTextElement> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { element, .. } => Some(element),
            DrawOp::Rectangle(_) => None,
        })
    }

    pub fn into_ops(self) -> Vec<DrawOp> {
        self.ops
    }
}

impl PageCanvas for RecordingCanvas {
    fn width(&self) -> f32 {
        self.width
    }

    fn height(&self) -> f32 {
        self.height
    }

    fn draw_text(&mut self, element: &RenderedTextElement, visible: bool) {
        self.ops.push(DrawOp::Text {
            element: element.clone(),
            visible,
        });
    }

    fn draw_rectangle(&mut self, rect: PageRect) {
        self.ops.push(DrawOp::Rectangle(rect));
    }
}

// Diagnostic drawing sink.
//
// The navigation data can describe itself as world-space points, lines, and
// boxes (graph nodes, adjacency, cell bounds). Where those go is up to the
// host: `DebugDraw` is the only coupling. `NullDebugDraw` discards
// everything; `RecordingDebugDraw` keeps the primitives for inspection in
// tests and tools.

use crate::types::Vec3;
use serde::{Deserialize, Serialize};

/// RGBA, 8 bits per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const GREEN: Color = Color::rgb(0, 255, 0);
    pub const BLUE: Color = Color::rgb(0, 0, 255);
    pub const YELLOW: Color = Color::rgb(255, 255, 0);
    pub const CYAN: Color = Color::rgb(0, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

pub trait DebugDraw {
    fn draw_point(&mut self, position: Vec3, size: f32, color: Color, duration: f32);

    fn draw_line(&mut self, from: Vec3, to: Vec3, color: Color, duration: f32);

    /// Axis-aligned box given by center and half-size.
    fn draw_box(&mut self, center: Vec3, extent: Vec3, color: Color, duration: f32);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullDebugDraw;

impl DebugDraw for NullDebugDraw {
    fn draw_point(&mut self, _: Vec3, _: f32, _: Color, _: f32) {}
    fn draw_line(&mut self, _: Vec3, _: Vec3, _: Color, _: f32) {}
    fn draw_box(&mut self, _: Vec3, _: Vec3, _: Color, _: f32) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum DebugPrimitive {
    Point { position: Vec3, size: f32, color: Color },
    Line { from: Vec3, to: Vec3, color: Color },
    Box { center: Vec3, extent: Vec3, color: Color },
}

/// Collects every primitive drawn, durations dropped.
#[derive(Clone, Debug, Default)]
pub struct RecordingDebugDraw {
    pub primitives: Vec<DebugPrimitive>,
}

impl RecordingDebugDraw {
    pub fn points(&self) -> usize {
        self.count(|p| matches!(p, DebugPrimitive::Point { .. }))
    }

    pub fn lines(&self) -> usize {
        self.count(|p| matches!(p, DebugPrimitive::Line { .. }))
    }

    pub fn boxes(&self) -> usize {
        self.count(|p| matches!(p, DebugPrimitive::Box { .. }))
    }

    fn count(&self, pred: impl Fn(&DebugPrimitive) -> bool) -> usize {
        self.primitives.iter().filter(|p| pred(p)).count()
    }
}

impl DebugDraw for RecordingDebugDraw {
    fn draw_point(&mut self, position: Vec3, size: f32, color: Color, _duration: f32) {
        self.primitives.push(DebugPrimitive::Point {
            position,
            size,
            color,
        });
    }

    fn draw_line(&mut self, from: Vec3, to: Vec3, color: Color, _duration: f32) {
        self.primitives
            .push(DebugPrimitive::Line { from, to, color });
    }

    fn draw_box(&mut self, center: Vec3, extent: Vec3, color: Color, _duration: f32) {
        self.primitives.push(DebugPrimitive::Box {
            center,
            extent,
            color,
        });
    }
}

//! Growable vertex buffers backing each rendered layer.

use serde::{Deserialize, Serialize};

/// Linear RGB color with components in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Unpack `0xRRGGBB`. The top byte is ignored.
    pub fn from_packed(c: u32) -> Self {
        let channel = |shift: u32| ((c >> shift) & 0xFF) as f32 / 255.0;
        Self { r: channel(16), g: channel(8), b: channel(0) }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }
}

/// How the consumer should assemble a buffer's vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Points,
    /// Consecutive vertex pairs form independent segments.
    LineSegments,
}

/// Vertex positions, optional per-vertex colors, and a draw range.
///
/// `capacity` only ever grows; `size` (the drawn vertex count) moves freely
/// within it. Growing reallocates to exactly the requested count and does
/// not preserve old contents, since every frame rewrites the active range.
///
/// Consumers detect changes through [`version`](Self::version), bumped once
/// per [`commit`](Self::commit).
#[derive(Debug, Clone)]
pub struct GeometryBuffer {
    primitive: Primitive,
    positions: Vec<[f32; 3]>,
    colors: Option<Vec<[f32; 3]>>,
    size: usize,
    version: u64,
    reallocations: u64,
    dirty: bool,
}

impl GeometryBuffer {
    /// An uncolored buffer; the consumer draws it in one layer color.
    pub fn new(primitive: Primitive) -> Self {
        Self {
            primitive,
            positions: Vec::new(),
            colors: None,
            size: 0,
            version: 0,
            reallocations: 0,
            dirty: false,
        }
    }

    /// A buffer carrying one color per vertex.
    pub fn colored(primitive: Primitive) -> Self {
        Self { colors: Some(Vec::new()), ..Self::new(primitive) }
    }

    /// Set the active vertex count, growing capacity only if needed.
    pub fn set_size(&mut self, n: usize) {
        if n > self.positions.len() {
            self.positions = vec![[0.0; 3]; n];
            if let Some(colors) = self.colors.as_mut() {
                *colors = vec![[0.0; 3]; n];
            }
            self.reallocations += 1;
        }
        self.size = n;
        self.dirty = true;
    }

    /// Write vertex `i`. Panics if `i` is outside the active size.
    pub fn write_position(&mut self, i: usize, x: f32, y: f32, z: f32) {
        assert!(i < self.size, "vertex {i} out of range (size {})", self.size);
        self.positions[i] = [x, y, z];
        self.dirty = true;
    }

    /// Write the color of vertex `i`. Panics if `i` is outside the active
    /// size or the buffer is uncolored.
    pub fn write_color(&mut self, i: usize, color: Rgb) {
        assert!(i < self.size, "vertex {i} out of range (size {})", self.size);
        let colors = self.colors.as_mut().expect("write_color on an uncolored buffer");
        colors[i] = color.to_array();
        self.dirty = true;
    }

    /// Publish this frame's writes to the consumer.
    ///
    /// Must follow the writes of a frame exactly once.
    pub fn commit(&mut self) {
        debug_assert!(self.dirty, "commit without any write since the last commit");
        self.dirty = false;
        self.version += 1;
    }

    pub fn primitive(&self) -> Primitive {
        self.primitive
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn capacity(&self) -> usize {
        self.positions.len()
    }

    pub fn is_colored(&self) -> bool {
        self.colors.is_some()
    }

    /// Commit counter; changes iff the contents changed.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Number of times capacity had to grow.
    pub fn reallocations(&self) -> u64 {
        self.reallocations
    }

    /// Active positions, `size` long.
    pub fn positions(&self) -> &[[f32; 3]] {
        &self.positions[..self.size]
    }

    /// Active colors, `size` long, if the buffer is colored.
    pub fn colors(&self) -> Option<&[[f32; 3]]> {
        self.colors.as_deref().map(|c| &c[..self.size])
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

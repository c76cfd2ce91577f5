//! Screen partitioning for dirty-region tracking.
//!
//! The screen is cut into a fixed grid of chunks. Chunk width and height are
//! the ceiling of screen size divided by the grid size, so the last column
//! and row may be narrower than the rest:
//!
//! ```text
//! width 1000, 8 columns → chunk width 125 ×8
//! width 1001, 8 columns → chunk width 126 ×7, last column 119
//! ```
//!
//! [`ChecksumGrid`] remembers, per chunk, the checksum of the pixels that
//! were last delivered in full to the client.

/// An axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl Rect {
    /// Number of pixels covered.
    pub fn area(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    /// Returns `true` if the rectangle covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Position of a chunk in the grid, column first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkIndex {
    pub column: u16,
    pub row: u16,
}

/// Geometry of the chunk grid for one screen size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGrid {
    screen_width: u16,
    screen_height: u16,
    columns: u16,
    rows: u16,
    chunk_width: u16,
    chunk_height: u16,
}

impl ChunkGrid {
    /// Builds the grid geometry. Zero grid dimensions are raised to one.
    pub fn new(screen_width: u16, screen_height: u16, columns: u16, rows: u16) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        Self {
            screen_width,
            screen_height,
            columns,
            rows,
            chunk_width: ceil_div(screen_width, columns),
            chunk_height: ceil_div(screen_height, rows),
        }
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    /// Screen dimensions this geometry was built for.
    pub fn screen_size(&self) -> (u16, u16) {
        (self.screen_width, self.screen_height)
    }

    /// Pixel count of the largest chunk; the scratch buffer is sized from it.
    pub fn max_chunk_pixels(&self) -> usize {
        usize::from(self.chunk_width) * usize::from(self.chunk_height)
    }

    /// Pixel rectangle of a chunk, clipped to the screen.
    ///
    /// When the screen is smaller than the grid, trailing chunks can be
    /// empty; callers skip those.
    pub fn chunk_rect(&self, index: ChunkIndex) -> Rect {
        let (x, width) = span(index.column, self.chunk_width, self.screen_width);
        let (y, height) = span(index.row, self.chunk_height, self.screen_height);
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    /// The chunk after `index` in raster order, or `None` after the last one.
    pub fn next(&self, index: ChunkIndex) -> Option<ChunkIndex> {
        if index.column + 1 < self.columns {
            Some(ChunkIndex {
                column: index.column + 1,
                row: index.row,
            })
        } else if index.row + 1 < self.rows {
            Some(ChunkIndex {
                column: 0,
                row: index.row + 1,
            })
        } else {
            None
        }
    }
}

/// Checksums of the last fully transmitted contents of each chunk.
///
/// All cells start at zero, which forces the first pass to send every chunk
/// whose checksum is non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumGrid {
    columns: u16,
    cells: Vec<u32>,
}

impl ChecksumGrid {
    pub fn new(columns: u16, rows: u16) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        Self {
            columns,
            cells: vec![0; usize::from(columns) * usize::from(rows)],
        }
    }

    /// Cached checksum for a chunk.
    pub fn get(&self, index: ChunkIndex) -> u32 {
        self.cells[self.offset(index)]
    }

    /// Records the checksum of a chunk whose pixels were delivered in full.
    pub fn commit(&mut self, index: ChunkIndex, checksum: u32) {
        let off = self.offset(index);
        self.cells[off] = checksum;
    }

    /// Forgets every cached checksum.
    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = 0);
    }

    fn offset(&self, index: ChunkIndex) -> usize {
        usize::from(index.row) * usize::from(self.columns) + usize::from(index.column)
    }
}

fn ceil_div(a: u16, b: u16) -> u16 {
    let (a, b) = (u32::from(a), u32::from(b));
    ((a + b - 1) / b) as u16
}

/// Start and length of chunk `n` along one axis.
fn span(n: u16, chunk: u16, screen: u16) -> (u16, u16) {
    let start = (u32::from(n) * u32::from(chunk)).min(u32::from(screen));
    let end = (start + u32::from(chunk)).min(u32::from(screen));
    (start as u16, (end - start) as u16)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn idx(column: u16, row: u16) -> ChunkIndex {
        ChunkIndex { column, row }
    }

    #[test]
    fn test_even_division_gives_equal_chunks() {
        let grid = ChunkGrid::new(1024, 768, 8, 8);
        assert_eq!(
            grid.chunk_rect(idx(0, 0)),
            Rect { x: 0, y: 0, width: 128, height: 96 }
        );
        assert_eq!(
            grid.chunk_rect(idx(7, 7)),
            Rect { x: 896, y: 672, width: 128, height: 96 }
        );
        assert_eq!(grid.max_chunk_pixels(), 128 * 96);
    }

    #[test]
    fn test_last_column_and_row_shrink_to_screen() {
        // Arrange – 1001 / 8 rounds up to 126; 7 × 126 = 882, leaving 119
        let grid = ChunkGrid::new(1001, 601, 8, 8);

        // Act
        let last = grid.chunk_rect(idx(7, 7));

        // Assert
        assert_eq!(last.x, 882);
        assert_eq!(last.width, 119);
        assert_eq!(last.y, 7 * 76);
        assert_eq!(last.height, 601 - 7 * 76);
    }

    #[test]
    fn test_chunks_tile_the_screen_exactly() {
        for (w, h) in [(1024u16, 768u16), (1001, 601), (17, 9), (5, 3)] {
            let grid = ChunkGrid::new(w, h, 8, 8);
            let mut covered = 0usize;
            let mut cursor = Some(idx(0, 0));
            while let Some(i) = cursor {
                let r = grid.chunk_rect(i);
                assert!(u32::from(r.x) + u32::from(r.width) <= u32::from(w));
                assert!(u32::from(r.y) + u32::from(r.height) <= u32::from(h));
                covered += r.area();
                cursor = grid.next(i);
            }
            assert_eq!(covered, usize::from(w) * usize::from(h), "{w}x{h}");
        }
    }

    #[test]
    fn test_screen_smaller_than_grid_yields_empty_trailing_chunks() {
        let grid = ChunkGrid::new(5, 5, 8, 8);
        assert_eq!(grid.chunk_rect(idx(4, 0)).width, 1);
        assert!(grid.chunk_rect(idx(5, 0)).is_empty());
        assert!(grid.chunk_rect(idx(7, 7)).is_empty());
    }

    #[test]
    fn test_next_walks_raster_order_and_ends() {
        // Arrange
        let grid = ChunkGrid::new(64, 64, 3, 2);
        let mut order = vec![idx(0, 0)];

        // Act
        while let Some(n) = grid.next(*order.last().unwrap()) {
            order.push(n);
        }

        // Assert
        assert_eq!(
            order,
            vec![idx(0, 0), idx(1, 0), idx(2, 0), idx(0, 1), idx(1, 1), idx(2, 1)]
        );
    }

    #[test]
    fn test_checksum_grid_starts_zero_and_commits() {
        let mut cache = ChecksumGrid::new(8, 8);
        assert_eq!(cache.get(idx(3, 5)), 0);

        cache.commit(idx(3, 5), 0xDEAD_BEEF);
        assert_eq!(cache.get(idx(3, 5)), 0xDEAD_BEEF);
        assert_eq!(cache.get(idx(5, 3)), 0);

        cache.reset();
        assert_eq!(cache.get(idx(3, 5)), 0);
    }
}

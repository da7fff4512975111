/// Row-major 2D buffer addressed in subpixels.
///
/// Accessors are bounds-checked and return `None` off the grid, so callers
/// never do their own linear index arithmetic.
#[derive(Clone, Debug, PartialEq)]
pub struct SubpixelGrid<T> {
    width: usize,
    height: usize,
    cells: Vec<T>,
}

impl<T: Copy + Default> SubpixelGrid<T> {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![T::default(); width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Signed coordinates so callers can test jittered points directly.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y * self.width + x)
        } else {
            None
        }
    }

    pub fn get(&self, x: usize, y: usize) -> Option<T> {
        self.index(x, y).map(|i| self.cells[i])
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        self.index(x, y).map(move |i| &mut self.cells[i])
    }

    pub fn values(&self) -> &[T] {
        &self.cells
    }

    pub fn values_mut(&mut self) -> &mut [T] {
        &mut self.cells
    }
}

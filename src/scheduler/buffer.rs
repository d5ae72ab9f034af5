/// Append/drain holding area between scheduler ticks. Not synchronized;
/// the owner decides how it is shared. Contents are lost on crash.
#[derive(Debug)]
pub struct Buffer<T> {
    items: Vec<T>,
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Buffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, items: impl IntoIterator<Item = T>) {
        self.items.extend(items);
    }

    /// Returns everything buffered so far and leaves the buffer empty.
    pub fn take_all(&mut self) -> Vec<T> {
        std::mem::take(&mut self.items)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

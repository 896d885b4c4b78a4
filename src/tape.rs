/// Fixed-size circular byte memory with a single data pointer.
///
/// The size never changes after construction. Pointer arithmetic wraps
/// modulo the size, cell arithmetic wraps modulo 256.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<u8>,
    pointer: usize,
}

impl Tape {
    /// Callers guarantee `size > 0`; `MachineConfig` validates it.
    pub(crate) fn new(size: usize) -> Self {
        debug_assert!(size > 0);
        Self {
            cells: vec![0; size],
            pointer: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    /// Value under the pointer.
    pub fn current(&self) -> u8 {
        self.cells[self.pointer]
    }

    pub(crate) fn set_current(&mut self, value: u8) {
        self.cells[self.pointer] = value;
    }

    pub(crate) fn move_right(&mut self) -> usize {
        self.pointer += 1;
        if self.pointer == self.cells.len() {
            self.pointer = 0;
        }
        self.pointer
    }

    pub(crate) fn move_left(&mut self) -> usize {
        self.pointer = self.pointer.checked_sub(1).unwrap_or(self.cells.len() - 1);
        self.pointer
    }

    pub(crate) fn increment(&mut self) -> u8 {
        let cell = &mut self.cells[self.pointer];
        *cell = cell.wrapping_add(1);
        *cell
    }

    pub(crate) fn decrement(&mut self) -> u8 {
        let cell = &mut self.cells[self.pointer];
        *cell = cell.wrapping_sub(1);
        *cell
    }

    pub(crate) fn rewind(&mut self) {
        self.pointer = 0;
    }

    /// Zero every cell and rewind the pointer.
    pub(crate) fn clear(&mut self) {
        self.cells.fill(0);
        self.pointer = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_right_wraps_to_zero() {
        let mut tape = Tape::new(3);
        assert_eq!(tape.move_right(), 1);
        assert_eq!(tape.move_right(), 2);
        assert_eq!(tape.move_right(), 0);
    }

    #[test]
    fn test_left_wraps_to_last() {
        let mut tape = Tape::new(3);
        assert_eq!(tape.move_left(), 2);
        assert_eq!(tape.move_left(), 1);
    }

    #[test]
    fn test_single_cell_pointer_never_moves() {
        let mut tape = Tape::new(1);
        assert_eq!(tape.move_right(), 0);
        assert_eq!(tape.move_right(), 0);
        assert_eq!(tape.move_left(), 0);
    }

    #[test]
    fn test_cell_wraps_both_ways() {
        let mut tape = Tape::new(2);
        assert_eq!(tape.decrement(), 255);
        assert_eq!(tape.increment(), 0);
        tape.set_current(255);
        assert_eq!(tape.increment(), 0);
    }

    #[test]
    fn test_clear_resets_cells_and_pointer() {
        let mut tape = Tape::new(4);
        tape.move_right();
        tape.increment();
        tape.clear();
        assert_eq!(tape.cells(), &[0, 0, 0, 0]);
        assert_eq!(tape.pointer(), 0);
        assert_eq!(tape.len(), 4);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn pointer_stays_in_bounds(size in 1usize..64, moves in prop::collection::vec(any::<bool>(), 0..256)) {
            let mut tape = Tape::new(size);
            for right in moves {
                let p = if right { tape.move_right() } else { tape.move_left() };
                prop_assert!(p < size);
            }
            prop_assert_eq!(tape.len(), size);
        }

        #[test]
        fn increments_wrap_mod_256(n in 0usize..1024) {
            let mut tape = Tape::new(1);
            for _ in 0..n {
                tape.increment();
            }
            prop_assert_eq!(tape.current() as usize, n % 256);
        }
    }
}

//! Probe window for the doubling search.

use std::num::NonZeroUsize;

/// Number of items requested by one probe.
///
/// Starts at 1 and doubles after every probe that does not burst. Windows are
/// local to one search level and never outlive an extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window(NonZeroUsize);

impl Window {
    /// The initial window of one item.
    pub const UNIT: Window = Window(NonZeroUsize::MIN);

    /// Returns the window size.
    pub fn get(self) -> usize {
        self.0.get()
    }

    /// Returns true while the window still holds a single item.
    pub fn is_unit(self) -> bool {
        self == Self::UNIT
    }

    /// Doubles the window, saturating at `usize::MAX`.
    pub fn double(&mut self) {
        self.0 = self.0.saturating_mul(NonZeroUsize::MIN.saturating_add(1));
    }
}

impl Default for Window {
    fn default() -> Self {
        Self::UNIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_from_one() {
        let mut window = Window::default();
        assert!(window.is_unit());

        let sizes: Vec<usize> = (0..5)
            .map(|_| {
                window.double();
                window.get()
            })
            .collect();

        assert_eq!(sizes, vec![2, 4, 8, 16, 32]);
        assert!(!window.is_unit());
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        let mut window = Window(NonZeroUsize::new(usize::MAX / 2 + 1).unwrap());
        window.double();
        assert_eq!(window.get(), usize::MAX);
        window.double();
        assert_eq!(window.get(), usize::MAX);
    }
}

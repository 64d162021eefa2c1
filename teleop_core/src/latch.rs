/// Toggle that flips once per rising edge of a noisy boolean input.
///
/// Holding the input high does not flip again; the input must drop back to
/// false to re-arm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EdgeLatch {
    armed: bool,
    output: bool,
}

impl EdgeLatch {
    pub fn new(initial: bool) -> Self {
        Self {
            armed: false,
            output: initial,
        }
    }

    /// Apply one input sample and return the latched output.
    pub fn update(&mut self, input: bool) -> bool {
        match (self.armed, input) {
            (false, true) => {
                self.armed = true;
                self.output = !self.output;
            }
            (true, false) => self.armed = false,
            _ => {}
        }
        self.output
    }

    #[inline]
    pub fn value(&self) -> bool {
        self.output
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed
    }
}

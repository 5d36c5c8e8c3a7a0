//! Control-Flow Signals
//!
//! `break`, `continue`, `return` and `exit` travel up the evaluator as the
//! `Err` side of [`Exec`]; each construct consumes the signals it binds
//! (loops take Break/Continue, function calls take Return, the top level
//! takes Exit) and everything else passes them through. Real errors ride
//! the same channel so one `?` propagates both.

use crate::error::ShellError;

/// Non-local control flow or error.
#[derive(Debug, Clone)]
pub enum Interrupt {
    /// `break [n]`
    Break(u32),
    /// `continue [n]`
    Continue(u32),
    /// `return [status]`
    Return(i32),
    /// `exit [status]` or a fatal condition under errexit
    Exit(i32),
    /// A reportable error with its status
    Error(ShellError),
}

/// Every evaluator returns the exit status or an interrupt.
pub type Exec<T = i32> = Result<T, Interrupt>;

impl From<ShellError> for Interrupt {
    fn from(e: ShellError) -> Self {
        Interrupt::Error(e)
    }
}

impl Interrupt {
    /// The status observed if this interrupt reaches the top level.
    pub fn status(&self) -> i32 {
        match self {
            Interrupt::Break(_) | Interrupt::Continue(_) => 0,
            Interrupt::Return(status) | Interrupt::Exit(status) => *status,
            Interrupt::Error(e) => e.status(),
        }
    }
}

/// Unwind one loop level: Break/Continue with depth 1 are consumed here,
/// deeper ones decrement and continue unwinding.
pub enum LoopSignal {
    /// Loop keeps going (continue hit this level)
    Continue,
    /// Loop ends (break hit this level)
    Break,
    /// Not ours; pass the interrupt outward
    Propagate(Interrupt),
}

pub fn classify_loop_interrupt(interrupt: Interrupt) -> LoopSignal {
    match interrupt {
        Interrupt::Break(1) => LoopSignal::Break,
        Interrupt::Break(n) => LoopSignal::Propagate(Interrupt::Break(n - 1)),
        Interrupt::Continue(1) => LoopSignal::Continue,
        Interrupt::Continue(n) => LoopSignal::Propagate(Interrupt::Continue(n - 1)),
        other => LoopSignal::Propagate(other),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_classification() {
        assert!(matches!(
            classify_loop_interrupt(Interrupt::Break(1)),
            LoopSignal::Break
        ));
        assert!(matches!(
            classify_loop_interrupt(Interrupt::Continue(1)),
            LoopSignal::Continue
        ));
        assert!(matches!(
            classify_loop_interrupt(Interrupt::Break(2)),
            LoopSignal::Propagate(Interrupt::Break(1))
        ));
        assert!(matches!(
            classify_loop_interrupt(Interrupt::Return(3)),
            LoopSignal::Propagate(Interrupt::Return(3))
        ));
    }

    #[test]
    fn interrupt_status() {
        assert_eq!(Interrupt::Exit(4).status(), 4);
        assert_eq!(Interrupt::Break(1).status(), 0);
        assert_eq!(
            Interrupt::Error(ShellError::CommandNotFound("x".into())).status(),
            127
        );
    }
}

//! Per-frame machine state.

use thiserror::Error;

use crate::context::Gas;

/// The gas budget could not cover a requested charge.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
#[error("out of gas: charge of {needed:?} exceeds remaining {left:?}")]
pub struct OutOfGas {
    pub needed: Gas,
    pub left: Gas,
}

/// Mutable per-call resource tracker handed to the interpreter.
///
/// One instance exists per frame, owned exclusively by the frame that
/// created it; it is never shared or aliased across frames.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MachineState {
    gas_left: Gas,
    initial_gas: Gas,
}

impl MachineState {
    pub const fn new(available_gas: Gas) -> Self {
        Self {
            gas_left: available_gas,
            initial_gas: available_gas,
        }
    }

    pub const fn gas_left(&self) -> Gas {
        self.gas_left
    }

    /// Gas consumed so far in this frame (including charges forwarded from
    /// nested frames).
    pub fn gas_used(&self) -> Gas {
        // `gas_left` only ever decreases from `initial_gas`, so this cannot
        // underflow.
        self.initial_gas
            .checked_sub(self.gas_left)
            .unwrap_or(Gas::ZERO)
    }

    /// Charges `amount` against the remaining budget. On failure the budget
    /// is left untouched; the interpreter decides the halting policy.
    pub fn consume(&mut self, amount: Gas) -> Result<(), OutOfGas> {
        match self.gas_left.checked_sub(amount) {
            Some(left) => {
                self.gas_left = left;
                Ok(())
            }
            None => Err(OutOfGas {
                needed: amount,
                left: self.gas_left,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consume_tracks_usage() {
        let mut machine = MachineState::new(Gas::new(100, 50));
        machine.consume(Gas::new(30, 10)).unwrap();
        machine.consume(Gas::new(20, 0)).unwrap();
        assert_eq!(machine.gas_left(), Gas::new(50, 40));
        assert_eq!(machine.gas_used(), Gas::new(50, 10));
    }

    #[test]
    fn over_consumption_is_rejected_without_charging() {
        let mut machine = MachineState::new(Gas::new(10, 10));
        let err = machine.consume(Gas::new(11, 0)).unwrap_err();
        assert_eq!(err.left, Gas::new(10, 10));
        assert_eq!(machine.gas_left(), Gas::new(10, 10));
    }
}

//! The per-call execution environment.
//!
//! An [`ExecutionEnvironment`] is an immutable snapshot of "who is calling
//! whom, with what arguments, under what global context". One instance exists
//! per call frame; nested calls derive a fresh child instance and the parent
//! is never touched. The interpreter's sole input surface is the flat
//! calldata array, so the constructor binds the function selector, the hash
//! of the raw arguments and the call-mode flag into a fixed 3-scalar prefix
//! ([`ContextInputs`]) that the proving circuit can later verify without
//! widening its public-input shape per function.

use std::sync::Arc;

use public_vm_common::{
    compute_var_args_hash, ContractAddress, FunctionSelector, Scalar,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::{BlockHeader, GasSettings, GlobalVariables};

/// Errors raised while deriving execution environments.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum EnvironmentError {
    /// Delegate calls are not part of the public VM's call model. The
    /// request is rejected up front rather than downgraded to a normal call.
    #[error("delegate calls are not supported")]
    DelegateCallsUnsupported,
}

/// The invocation mode of a call frame.
///
/// Static frames must not produce any observable side effect. The mode is an
/// explicit variant rather than a boolean so that every derivation site has
/// to state which mode it is propagating.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum CallMode {
    #[default]
    Normal,
    Static,
}

impl CallMode {
    pub const fn is_static(self) -> bool {
        matches!(self, CallMode::Static)
    }

    /// Resolves the mode of a child frame. `Static` is absorbing: a static
    /// parent can only ever produce static children, whatever the caller
    /// requested.
    pub const fn for_nested(parent: CallMode, requested: CallMode) -> CallMode {
        match (parent, requested) {
            (CallMode::Normal, CallMode::Normal) => CallMode::Normal,
            _ => CallMode::Static,
        }
    }
}

/// The fixed 3-scalar prefix prepended to every frame's calldata, binding
/// the dispatched selector, the argument hash and the call mode into the
/// interpreter's input array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ContextInputs {
    selector: Scalar,
    args_hash: Scalar,
    is_static_call: bool,
}

impl ContextInputs {
    /// Protocol constant: the prefix is always exactly this many scalars.
    pub const SIZE: usize = 3;

    pub fn new(selector: Scalar, args_hash: Scalar, mode: CallMode) -> Self {
        Self {
            selector,
            args_hash,
            is_static_call: mode.is_static(),
        }
    }

    pub fn to_scalars(self) -> [Scalar; Self::SIZE] {
        [
            self.selector,
            self.args_hash,
            Scalar::from(self.is_static_call),
        ]
    }
}

/// Immutable context for one call frame.
///
/// Constructed by the executor for the top-level frame and by
/// [`derive_for_nested_call`](Self::derive_for_nested_call) /
/// [`derive_for_nested_static_call`](Self::derive_for_nested_static_call)
/// for nested frames. Never mutated after construction; discarded when the
/// frame returns.
#[derive(Clone, Debug)]
pub struct ExecutionEnvironment {
    /// The contract whose code is executing.
    pub address: ContractAddress,
    /// The contract whose storage is in scope. Always equal to `address` in
    /// the supported call modes.
    pub storage_address: ContractAddress,
    /// The caller: the parent frame's `address`, or the transaction origin
    /// for the top-level frame.
    pub sender: ContractAddress,
    pub fee_per_l2_gas: Scalar,
    pub fee_per_da_gas: Scalar,
    /// Nesting depth of this frame; 0 for top-level calls.
    pub contract_call_depth: Scalar,
    pub header: Arc<BlockHeader>,
    pub globals: Arc<GlobalVariables>,
    pub call_mode: CallMode,
    /// Effective calldata: the [`ContextInputs`] prefix followed by the raw
    /// argument scalars.
    pub calldata: Vec<Scalar>,
    pub gas_settings: GasSettings,
    pub transaction_fee: Scalar,
    // The selector is transitional: once public bytecode becomes a single
    // blob per contract, dispatch moves into the bytecode itself and this
    // field goes away.
    pub function_selector: FunctionSelector,
}

impl ExecutionEnvironment {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        address: ContractAddress,
        sender: ContractAddress,
        call_mode: CallMode,
        calldata: Vec<Scalar>,
        function_selector: FunctionSelector,
        header: Arc<BlockHeader>,
        globals: Arc<GlobalVariables>,
        gas_settings: GasSettings,
        transaction_fee: Scalar,
    ) -> Self {
        Self {
            address,
            storage_address: address,
            sender,
            fee_per_l2_gas: globals.fee_per_l2_gas,
            fee_per_da_gas: globals.fee_per_da_gas,
            contract_call_depth: Scalar::ZERO,
            header,
            globals,
            call_mode,
            calldata: encode_calldata(function_selector, call_mode, calldata),
            gas_settings,
            transaction_fee,
            function_selector,
        }
    }

    /// Derives the environment for a nested call.
    ///
    /// The child runs under its own storage (`address = storage_address =
    /// target`) with this frame as `sender`. A static parent forces the
    /// child static regardless of the entry point used.
    pub fn derive_for_nested_call(
        &self,
        target_address: ContractAddress,
        calldata: Vec<Scalar>,
        function_selector: FunctionSelector,
    ) -> Self {
        self.derive_for_nested_call_internal(
            target_address,
            calldata,
            function_selector,
            CallMode::Normal,
        )
    }

    /// Derives the environment for a nested static call.
    pub fn derive_for_nested_static_call(
        &self,
        target_address: ContractAddress,
        calldata: Vec<Scalar>,
        function_selector: FunctionSelector,
    ) -> Self {
        self.derive_for_nested_call_internal(
            target_address,
            calldata,
            function_selector,
            CallMode::Static,
        )
    }

    /// Delegate calls run callee code under the caller's storage; the public
    /// VM does not support them in any form.
    pub fn derive_for_delegate_call(
        &self,
        _target_address: ContractAddress,
        _calldata: Vec<Scalar>,
        _function_selector: FunctionSelector,
    ) -> Result<Self, EnvironmentError> {
        Err(EnvironmentError::DelegateCallsUnsupported)
    }

    // Single derivation point: copies the parent snapshot and replaces only
    // the fields a nested call is allowed to change.
    fn derive_for_nested_call_internal(
        &self,
        target_address: ContractAddress,
        calldata: Vec<Scalar>,
        function_selector: FunctionSelector,
        requested_mode: CallMode,
    ) -> Self {
        let call_mode = CallMode::for_nested(self.call_mode, requested_mode);
        Self {
            address: target_address,
            storage_address: target_address,
            sender: self.address,
            contract_call_depth: self.contract_call_depth + Scalar::ONE,
            call_mode,
            calldata: encode_calldata(function_selector, call_mode, calldata),
            function_selector,
            ..self.clone()
        }
    }
}

/// Prepends the [`ContextInputs`] prefix to a frame's raw calldata. The
/// args-hash covers the raw arguments only, independent of the frame.
fn encode_calldata(
    selector: FunctionSelector,
    mode: CallMode,
    raw_calldata: Vec<Scalar>,
) -> Vec<Scalar> {
    let inputs = ContextInputs::new(
        selector.to_scalar(),
        compute_var_args_hash(&raw_calldata),
        mode,
    );
    let mut calldata = Vec::with_capacity(ContextInputs::SIZE + raw_calldata.len());
    calldata.extend(inputs.to_scalars());
    calldata.extend(raw_calldata);
    calldata
}

#[cfg(test)]
mod tests {
    use super::*;

    fn top_level(call_mode: CallMode) -> ExecutionEnvironment {
        ExecutionEnvironment::new(
            ContractAddress::from(0xa1),
            ContractAddress::from(0x51),
            call_mode,
            vec![Scalar::from(10u64), Scalar::from(20u64)],
            FunctionSelector::new(0x1111_2222),
            Arc::new(BlockHeader::default()),
            Arc::new(GlobalVariables {
                fee_per_l2_gas: Scalar::from(3u64),
                fee_per_da_gas: Scalar::from(4u64),
                ..GlobalVariables::default()
            }),
            GasSettings::default(),
            Scalar::from(7u64),
        )
    }

    #[test]
    fn calldata_carries_the_context_prefix() {
        let raw = vec![Scalar::from(10u64), Scalar::from(20u64)];
        let env = top_level(CallMode::Normal);

        assert_eq!(env.calldata.len(), ContextInputs::SIZE + raw.len());
        assert_eq!(env.calldata[0], FunctionSelector::new(0x1111_2222).to_scalar());
        assert_eq!(env.calldata[1], compute_var_args_hash(&raw));
        assert_eq!(env.calldata[2], Scalar::ZERO);
        assert_eq!(&env.calldata[ContextInputs::SIZE..], &raw[..]);
    }

    #[test]
    fn static_flag_is_encoded_in_the_prefix() {
        let env = top_level(CallMode::Static);
        assert_eq!(env.calldata[2], Scalar::ONE);
    }

    #[test]
    fn nested_call_rewires_sender_and_addresses() {
        let parent = top_level(CallMode::Normal);
        let target = ContractAddress::from(0xb2);
        let child = parent.derive_for_nested_call(
            target,
            vec![Scalar::from(5u64)],
            FunctionSelector::new(0x3333_4444),
        );

        assert_eq!(child.address, target);
        assert_eq!(child.storage_address, target);
        assert_eq!(child.sender, parent.address);
        assert_eq!(child.call_mode, CallMode::Normal);
        assert_eq!(child.contract_call_depth, Scalar::ONE);
        // Everything else is copied unchanged.
        assert_eq!(child.fee_per_l2_gas, parent.fee_per_l2_gas);
        assert_eq!(child.fee_per_da_gas, parent.fee_per_da_gas);
        assert_eq!(child.transaction_fee, parent.transaction_fee);
        assert_eq!(child.gas_settings, parent.gas_settings);
        assert!(Arc::ptr_eq(&child.header, &parent.header));
        assert!(Arc::ptr_eq(&child.globals, &parent.globals));
    }

    #[test]
    fn nested_static_call_is_static() {
        let parent = top_level(CallMode::Normal);
        let child = parent.derive_for_nested_static_call(
            ContractAddress::from(0xb2),
            vec![],
            FunctionSelector::empty(),
        );
        assert_eq!(child.call_mode, CallMode::Static);
        assert_eq!(child.calldata[2], Scalar::ONE);
    }

    #[test]
    fn static_parent_forces_static_children() {
        let parent = top_level(CallMode::Static);
        let child = parent.derive_for_nested_call(
            ContractAddress::from(0xb2),
            vec![],
            FunctionSelector::empty(),
        );
        assert_eq!(child.call_mode, CallMode::Static);
    }

    #[test]
    fn delegate_calls_always_fail() {
        let parent = top_level(CallMode::Normal);
        let result = parent.derive_for_delegate_call(
            ContractAddress::from(0xb2),
            vec![Scalar::ONE],
            FunctionSelector::new(1),
        );
        assert_eq!(result.unwrap_err(), EnvironmentError::DelegateCallsUnsupported);
    }

    #[test]
    fn prefix_is_present_at_every_depth() {
        let mut env = top_level(CallMode::Normal);
        for depth in 1..=4u64 {
            let raw = vec![Scalar::from(depth)];
            env = env.derive_for_nested_call(
                ContractAddress::from(depth),
                raw.clone(),
                FunctionSelector::new(depth as u32),
            );
            assert_eq!(env.contract_call_depth, Scalar::from(depth));
            assert_eq!(env.calldata[0], FunctionSelector::new(depth as u32).to_scalar());
            assert_eq!(env.calldata[1], compute_var_args_hash(&raw));
            assert_eq!(env.calldata[2], Scalar::ZERO);
        }
    }
}

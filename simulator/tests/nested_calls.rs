//! Nested-call semantics through the executor: ordinal ordering across
//! frames, per-frame calldata prefixes, debug-name resolution, revert
//! isolation and gas accounting.

use std::sync::Arc;

use public_vm_common::{compute_var_args_hash, ContractAddress, FunctionSelector, Scalar};
use public_vm_simulator::context::{Gas, GlobalVariables, TxContext};
use public_vm_simulator::environment::CallMode;
use public_vm_simulator::testing_utils::{
    init_logger, InMemoryCommitmentsDb, InMemoryContractsDb, InMemoryStateDb,
    ScriptedInterpreter, TestOp,
};
use public_vm_simulator::{ExecutionRequest, ExecutionResult, PublicExecutor};

const PARENT: ContractAddress = ContractAddress::new(Scalar::ONE);
const CHILD: ContractAddress = ContractAddress::new(Scalar::from_u64(0xb2));
const PARENT_SELECTOR: FunctionSelector = FunctionSelector::new(0x3000_0003);
const CHILD_SELECTOR: FunctionSelector = FunctionSelector::new(0x4000_0004);
const SLOT: Scalar = Scalar::ONE;

struct Harness {
    state: Arc<InMemoryStateDb>,
    contracts: Arc<InMemoryContractsDb>,
    executor: PublicExecutor<ScriptedInterpreter>,
}

fn harness(program: Vec<TestOp>) -> Harness {
    init_logger();
    let state = Arc::new(InMemoryStateDb::default());
    let contracts = Arc::new(InMemoryContractsDb::default());
    let executor = PublicExecutor::new(
        state.clone(),
        contracts.clone(),
        Arc::new(InMemoryCommitmentsDb::default()),
        Default::default(),
        ScriptedInterpreter::new(program),
    );
    Harness {
        state,
        contracts,
        executor,
    }
}

fn simulate(harness: &Harness, available_gas: Gas) -> anyhow::Result<ExecutionResult> {
    let request = ExecutionRequest {
        contract_address: PARENT,
        function_selector: PARENT_SELECTOR,
        sender: ContractAddress::from(0x5e4d),
        args: vec![Scalar::from(1u64)],
        call_mode: CallMode::Normal,
    };
    Ok(harness.executor.simulate(
        &request,
        GlobalVariables::default(),
        available_gas,
        TxContext::default(),
        &[],
        Scalar::ZERO,
        0,
    )?)
}

fn call_child(program: Vec<TestOp>) -> TestOp {
    TestOp::Call {
        target: CHILD,
        selector: CHILD_SELECTOR,
        calldata: vec![Scalar::from(5u64), Scalar::from(6u64)],
        program,
    }
}

/// Ordinals are assigned strictly in call order: parent, then child, then
/// the parent again after the child returns.
#[test]
fn ordinals_are_strictly_increasing_across_frames() -> anyhow::Result<()> {
    let harness = harness(vec![
        TestOp::WriteStorage { slot: SLOT, value: Scalar::from(1u64) },
        call_child(vec![TestOp::WriteStorage {
            slot: SLOT,
            value: Scalar::from(2u64),
        }]),
        TestOp::WriteStorage { slot: SLOT, value: Scalar::from(3u64) },
    ]);

    let result = simulate(&harness, Gas::new(1_000_000, 0))?;

    assert_eq!(result.storage_writes[0].counter, 0);
    let nested = &result.nested_executions[0];
    assert_eq!(nested.storage_writes[0].counter, 1);
    assert_eq!(result.storage_writes[1].counter, 2);

    // The child wrote its own storage, not the parent's.
    assert_eq!(harness.state.get(PARENT, SLOT), Some(Scalar::from(3u64)));
    assert_eq!(harness.state.get(CHILD, SLOT), Some(Scalar::from(2u64)));
    Ok(())
}

/// Every frame's effective calldata starts with the fixed 3-scalar prefix,
/// whatever the nesting depth.
#[test]
fn nested_frames_carry_the_calldata_prefix() -> anyhow::Result<()> {
    let raw = vec![Scalar::from(5u64), Scalar::from(6u64)];
    let harness = harness(vec![call_child(vec![])]);

    let result = simulate(&harness, Gas::new(1_000_000, 0))?;
    let nested = &result.nested_executions[0];

    assert_eq!(nested.contract_address, CHILD);
    assert_eq!(nested.function_selector, CHILD_SELECTOR);
    assert_eq!(nested.calldata.len(), 3 + raw.len());
    assert_eq!(nested.calldata[0], CHILD_SELECTOR.to_scalar());
    assert_eq!(nested.calldata[1], compute_var_args_hash(&raw));
    assert_eq!(nested.calldata[2], Scalar::ZERO);
    assert_eq!(&nested.calldata[3..], &raw[..]);
    Ok(())
}

/// Debug names resolve per frame where registered, and degrade to
/// `address:selector` where not.
#[test]
fn debug_names_resolve_with_fallback() -> anyhow::Result<()> {
    let harness = harness(vec![call_child(vec![])]);
    harness
        .contracts
        .register_function(PARENT, PARENT_SELECTOR, "token::transfer", vec![0xaa, 0xbb]);

    let result = simulate(&harness, Gas::new(1_000_000, 0))?;

    assert_eq!(result.function_name, "token::transfer");
    assert_eq!(result.bytecode, vec![0xaa, 0xbb]);
    let nested = &result.nested_executions[0];
    assert_eq!(
        nested.function_name,
        format!("{CHILD}:{CHILD_SELECTOR}")
    );
    Ok(())
}

/// A reverted nested frame is isolated: its writes never commit, its
/// ordinals are never reissued, and the parent continues.
#[test]
fn nested_revert_is_isolated_from_the_parent() -> anyhow::Result<()> {
    let harness = harness(vec![
        TestOp::WriteStorage { slot: SLOT, value: Scalar::from(1u64) },
        call_child(vec![
            TestOp::WriteStorage { slot: SLOT, value: Scalar::from(2u64) },
            TestOp::Revert { reason: "child failed".to_string() },
        ]),
        TestOp::WriteStorage {
            slot: Scalar::from(2u64),
            value: Scalar::from(9u64),
        },
    ]);

    let result = simulate(&harness, Gas::new(1_000_000, 0))?;

    assert!(!result.reverted);
    let nested = &result.nested_executions[0];
    assert!(nested.reverted);
    assert_eq!(nested.revert_reason.as_deref(), Some("child failed"));
    assert!(nested.storage_writes.is_empty());

    // The child consumed ordinal 1; the next parent effect gets 2.
    assert_eq!(result.storage_writes[1].counter, 2);

    // Only the parent's writes are durable.
    assert_eq!(harness.state.get(PARENT, SLOT), Some(Scalar::from(1u64)));
    assert_eq!(harness.state.get(CHILD, SLOT), None);
    Ok(())
}

/// Three levels of nesting, with siblings: the ordinals across the whole
/// result tree never repeat and cover exactly the consumed range.
#[test]
fn ordinals_never_repeat_across_deep_nesting() -> anyhow::Result<()> {
    fn note(value: u64) -> TestOp {
        TestOp::InsertNoteHash { value: Scalar::from(value) }
    }
    fn collect_counters(result: &ExecutionResult, counters: &mut Vec<u32>) {
        counters.extend(result.note_hashes.iter().map(|n| n.counter));
        for nested in &result.nested_executions {
            collect_counters(nested, counters);
        }
    }

    let grandchild = TestOp::Call {
        target: ContractAddress::from(0xc3),
        selector: FunctionSelector::new(9),
        calldata: vec![],
        program: vec![note(30), note(31)],
    };
    let harness = harness(vec![
        note(10),
        call_child(vec![note(20), grandchild, note(21)]),
        call_child(vec![note(22)]),
        note(11),
    ]);

    let result = simulate(&harness, Gas::new(1_000_000, 0))?;

    let mut counters = Vec::new();
    collect_counters(&result, &mut counters);
    assert_eq!(counters.len(), 7);
    let mut sorted = counters.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), counters.len());
    assert_eq!(sorted, (0..7).collect::<Vec<_>>());
    Ok(())
}

/// Gas consumed by a child is charged to the parent frame.
#[test]
fn child_gas_is_charged_to_the_parent() -> anyhow::Result<()> {
    let harness = harness(vec![
        TestOp::BurnGas { amount: Gas::new(100, 0) },
        call_child(vec![TestOp::BurnGas { amount: Gas::new(50, 10) }]),
    ]);

    let result = simulate(&harness, Gas::new(1_000, 1_000))?;

    assert_eq!(result.nested_executions[0].gas_used, Gas::new(50, 10));
    assert_eq!(result.gas_used, Gas::new(150, 10));
    Ok(())
}

/// Exhausting the budget reverts the frame with the whole budget consumed.
#[test]
fn out_of_gas_reverts_with_budget_exhausted() -> anyhow::Result<()> {
    let harness = harness(vec![TestOp::BurnGas { amount: Gas::new(2_000, 0) }]);

    let result = simulate(&harness, Gas::new(1_000, 5))?;

    assert!(result.reverted);
    assert_eq!(result.revert_reason.as_deref(), Some("out of gas"));
    assert_eq!(result.gas_used, Gas::new(1_000, 5));
    Ok(())
}

//! # Gas Accounting on Node State
//!
//! Single actions applied to a node's genesis state with the default gas
//! schedule: fee flow through the fee account, code collisions, block gas
//! exhaustion, interrupted execution and conservation of the native asset.

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use nc_chain::{apply_transaction, ChainReader, ExecutionOutcome, StateTransition, TransitionError};
    use nc_vm::{AccountManager, ExecutionState, Interrupt, StateDb, VmError};
    use node_runtime::NodeContainer;
    use primitive_types::U256;
    use proptest::prelude::*;
    use shared_types::{Action, Transaction};

    use crate::fixtures::*;

    const ACCOUNTS: [&str; 8] = ["alice", "bob", "alpha", "sys", "sys.fee", "sys.reward", LOOPER, TOGGLER];

    fn node() -> NodeContainer {
        node_with_looper(node_config(&["alpha"], 3_000))
    }

    fn apply(
        node: &NodeContainer,
        state: &mut dyn ExecutionState,
        pool: &mut nc_chain::GasPool,
        action: &Action,
    ) -> Result<ExecutionOutcome, TransitionError> {
        let context = head_context(node, "alpha");
        with_env(node, &context, &Interrupt::new(), |env| {
            StateTransition::new(env, action, U256::one(), pool, state).transition_db()
        })
    }

    fn balance(state: &dyn ExecutionState, account: &str) -> U256 {
        state.get_balance(&name(account), 0).unwrap()
    }

    fn supply(state: &dyn ExecutionState) -> U256 {
        ACCOUNTS
            .iter()
            .fold(U256::zero(), |total, account| total + balance(state, account))
    }

    #[test]
    fn test_fees_flow_to_coinbase() {
        let node = node();
        let mut state = head_state(&node);
        let mut pool = gas_pool(1_000_000);
        let action = transfer("alice", "bob", 10, 0).actions.remove(0);

        let out = apply(&node, state.as_mut(), &mut pool, &action).unwrap();
        assert!(!out.failed);
        assert_eq!(out.gas_used, 21_000);
        assert_eq!(balance(state.as_ref(), "alice"), U256::from(FUNDS - 10 - 21_000));
        assert_eq!(balance(state.as_ref(), "bob"), U256::from(FUNDS + 10));
        assert_eq!(balance(state.as_ref(), "alpha"), U256::from(21_000));
        assert_eq!(balance(state.as_ref(), "sys.fee"), U256::zero());
        assert_eq!(pool.gas(), 1_000_000 - 21_000);
    }

    #[test]
    fn test_code_collision_consumes_gas() {
        let node = node();
        let mut state = head_state(&node);
        let mut pool = gas_pool(1_000_000);
        let tx = create_tx("alice", LOOPER, loop_init_code(), 5, 0, 100_000);

        let out = apply(&node, state.as_mut(), &mut pool, &tx.actions[0]).unwrap();
        assert!(out.failed);
        assert_eq!(out.vm_err, Some(VmError::ContractCodeCollision(name(LOOPER))));
        assert!(out.consensus_error().is_none());
        assert_eq!(out.gas_used, 100_000);
        assert_eq!(out.intrinsic_gas + out.run_gas, 100_000);
        assert_eq!(out.distribution.total(), 100_000);

        assert_eq!(state.get_code(&name(LOOPER)).unwrap(), LOOP_CODE.to_vec());
        assert_eq!(balance(state.as_ref(), LOOPER), U256::zero());
        assert_eq!(balance(state.as_ref(), "alice"), U256::from(FUNDS - 100_000));
        assert_eq!(state.get_nonce(&name("alice")).unwrap(), 1);
    }

    #[test]
    fn test_block_gas_exhaustion_mutates_nothing() {
        let node = node();
        let mut state = head_state(&node);
        let root = state.intermediate_root();
        let mut pool = gas_pool(10_000);
        let action = transfer("alice", "bob", 10, 0).actions.remove(0);

        let err = apply(&node, state.as_mut(), &mut pool, &action).unwrap_err();
        assert!(err.is_gas_limit_reached());
        assert_eq!(pool.gas(), 10_000);
        assert_eq!(state.intermediate_root(), root);
    }

    #[test]
    fn test_expired_interrupt_fails_the_transaction() {
        let node = node();
        let mut state = head_state(&node);
        let mut pool = gas_pool(1_000_000);
        let tx = loop_call("alice", 0, 500_000);
        let context = head_context(&node, "alpha");
        let expired = Interrupt::new().with_deadline(Instant::now());

        let mut used = 0;
        let err = with_env(&node, &context, &expired, |env| {
            state.prepare(tx.hash(), 0);
            apply_transaction(env, &mut pool, state.as_mut(), &tx, &mut used)
        })
        .unwrap_err();
        assert!(err.is_exec_over_time());
        assert_eq!(used, 0);
    }

    #[derive(Debug, Clone, Copy)]
    enum Step {
        Transfer { from_alice: bool, amount: u64 },
        Toggle,
    }

    fn steps() -> impl Strategy<Value = Vec<(Step, u64)>> {
        let step = prop_oneof![
            (any::<bool>(), 0u64..2_000_000).prop_map(|(from_alice, amount)| Step::Transfer { from_alice, amount }),
            Just(Step::Toggle),
        ];
        prop::collection::vec((step, 0u64..60_000), 1..16)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_gas_and_supply_are_conserved(steps in steps()) {
            let node = node();
            let mut state = head_state(&node);
            let start = supply(state.as_ref());
            let sys_start = balance(state.as_ref(), "sys");
            let block_gas = node.chain.current_header().gas_limit;
            let mut pool = gas_pool(block_gas);
            let mut nonces = [0u64; 2];
            let mut charged = 0u64;

            for (step, gas_limit) in steps {
                let (action, slot) = match step {
                    Step::Transfer { from_alice, amount } => {
                        let (from, to, slot) = if from_alice { ("alice", "bob", 0) } else { ("bob", "alice", 1) };
                        (Action::transfer(name(from), name(to), 0, U256::from(amount), nonces[slot], gas_limit), slot)
                    }
                    Step::Toggle => (call_action("alice", TOGGLER, nonces[0], gas_limit), 0),
                };
                let out = apply(&node, state.as_mut(), &mut pool, &action).unwrap();
                nonces[slot] += 1;
                charged += out.gas_used;

                prop_assert_eq!(out.intrinsic_gas + out.run_gas + out.refunded_gas, gas_limit);
                prop_assert_eq!(out.gas_used + out.refunded_gas, gas_limit);
                prop_assert!(out.storage_refund <= out.refunded_gas);
                prop_assert_eq!(out.distribution.total(), out.gas_used as i64);
                if let Step::Transfer { .. } = step {
                    prop_assert_eq!(out.failed, gas_limit < 21_000);
                }
                prop_assert_eq!(balance(state.as_ref(), "sys.fee"), U256::zero());
                prop_assert_eq!(supply(state.as_ref()), start);
            }
            prop_assert_eq!(pool.gas(), block_gas - charged);
            let earned = balance(state.as_ref(), "alpha") + balance(state.as_ref(), "sys") - sys_start;
            prop_assert_eq!(earned, U256::from(charged));
        }
    }

    #[test]
    fn test_clearing_storage_refunds_gas() {
        let node = node();
        let mut state = head_state(&node);
        let mut pool = gas_pool(1_000_000);

        let set = apply(&node, state.as_mut(), &mut pool, &call_action("alice", TOGGLER, 0, 100_000)).unwrap();
        assert!(!set.failed);
        assert_eq!(set.storage_refund, 0);

        let clear = apply(&node, state.as_mut(), &mut pool, &call_action("alice", TOGGLER, 1, 100_000)).unwrap();
        assert!(!clear.failed);
        assert!(clear.storage_refund > 0);
        assert!(clear.gas_used < set.gas_used);
        assert_eq!(clear.intrinsic_gas + clear.run_gas + clear.refunded_gas, 100_000);
        assert_eq!(clear.gas_used + clear.refunded_gas, 100_000);
        assert_eq!(clear.distribution.total(), clear.gas_used as i64);
        assert_eq!(state.get_state(&name(TOGGLER), &[0u8; 32]), [0u8; 32]);
        assert_eq!(pool.gas(), 1_000_000 - set.gas_used - clear.gas_used);
        assert_eq!(
            balance(state.as_ref(), "alice"),
            U256::from(FUNDS - set.gas_used - clear.gas_used)
        );
    }

    #[test]
    fn test_multi_action_transaction_shares_a_receipt() {
        let node = node();
        let mut state = head_state(&node);
        let mut pool = gas_pool(1_000_000);
        let mut tx = transfer("alice", "bob", 1, 0);
        tx.actions.push(transfer("alice", "alpha", 2, 1).actions.remove(0));
        let tx = Transaction::new(tx.actions, U256::one());
        let context = head_context(&node, "alpha");

        let mut used = 0;
        let receipt = with_env(&node, &context, &Interrupt::new(), |env| {
            state.prepare(tx.hash(), 0);
            apply_transaction(env, &mut pool, state.as_mut(), &tx, &mut used)
        })
        .unwrap();
        assert_eq!(receipt.action_results.len(), 2);
        assert_eq!(receipt.total_gas_used, 42_000);
        assert_eq!(receipt.cumulative_gas_used, 42_000);
        assert_eq!(used, 42_000);
        assert_eq!(state.get_nonce(&name("alice")).unwrap(), 2);
        assert_eq!(balance(state.as_ref(), "alpha"), U256::from(42_000 + 2));
    }
}

//! Property tests over randomly generated, well-formed function bodies.

use kale_core::semantic::{ScopeTable, lower_function, reachable_blocks};
use kale_core::syntax::build::*;
use kale_core::{CheckConfig, FunctionIr, NodeKind, SyntaxNode, Value};
use proptest::prelude::*;
use std::collections::HashSet;

const OPERATORS: [NodeKind; 4] = [NodeKind::Add, NodeKind::Sub, NodeKind::Mul, NodeKind::Div];

fn expr() -> impl Strategy<Value = SyntaxNode> {
    let leaf = (0u64..1000).prop_map(int);
    leaf.prop_recursive(3, 16, 2, |inner| {
        (0..OPERATORS.len(), inner.clone(), inner)
            .prop_map(|(op, lhs, rhs)| binary(OPERATORS[op], lhs, rhs))
    })
}

fn stmt() -> impl Strategy<Value = SyntaxNode> {
    let simple = prop_oneof![
        expr(),
        Just(local("_", "int")),
        expr().prop_map(ret),
    ];
    simple.prop_recursive(3, 32, 4, |inner| {
        let body = prop::collection::vec(inner, 0..4).prop_map(block);
        prop_oneof![
            body.clone(),
            (expr(), body.clone()).prop_map(|(pred, body)| while_loop(pred, body)),
            (expr(), body.clone()).prop_map(|(pred, then)| if_then(pred, then)),
            (expr(), body.clone(), body)
                .prop_map(|(pred, then, otherwise)| if_else(pred, then, otherwise)),
        ]
    })
}

/// Gives every local a distinct name so generated bodies never collide.
fn rename_locals(node: &mut SyntaxNode, counter: &mut usize) {
    if node.kind == NodeKind::Local {
        node.children[0].token.text = format!("l{counter}");
        *counter += 1;
    }
    for child in &mut node.children {
        rename_locals(child, counter);
    }
}

fn function_body() -> impl Strategy<Value = SyntaxNode> {
    prop::collection::vec(stmt(), 0..6).prop_map(|statements| {
        let mut body = block(statements);
        rename_locals(&mut body, &mut 0);
        body
    })
}

fn lower(body: &SyntaxNode) -> FunctionIr {
    lower_function(&function("p", body.clone()), &CheckConfig::default())
        .expect("generated bodies are well-formed")
}

proptest! {
    #[test]
    fn values_increase_in_block_order(body in function_body()) {
        let func = lower(&body);
        let defs: Vec<u32> = func
            .instructions()
            .filter_map(|inst| inst.def)
            .map(Value::get)
            .collect();
        let expected: Vec<u32> = (1..=defs.len() as u32).collect();

        prop_assert_eq!(defs, expected);
    }

    #[test]
    fn inputs_are_defined_before_use(body in function_body()) {
        let func = lower(&body);
        let mut defined = HashSet::new();

        for inst in func.instructions() {
            for input in &inst.inputs {
                prop_assert!(defined.contains(input), "{} used before definition", input);
            }
            if let Some(def) = inst.def {
                defined.insert(def);
            }
        }
    }

    #[test]
    fn every_block_has_exactly_one_trailing_terminator(body in function_body()) {
        let func = lower(&body);

        for block in func.blocks() {
            let terminators = block.instructions.iter().filter(|inst| inst.is_terminator()).count();
            prop_assert_eq!(terminators, 1);
            prop_assert!(block.is_terminated());
        }
    }

    #[test]
    fn branch_targets_exist(body in function_body()) {
        let func = lower(&body);

        for block in func.blocks() {
            for succ in block.successors() {
                prop_assert!(succ.index() < func.block_count());
            }
        }
    }

    #[test]
    fn entry_block_is_reachable(body in function_body()) {
        let func = lower(&body);

        prop_assert!(reachable_blocks(&func).contains(0));
    }

    #[test]
    fn lowering_is_idempotent(body in function_body()) {
        prop_assert_eq!(lower(&body), lower(&body));
    }

    #[test]
    fn inner_binding_shadows_until_scope_exits(
        names in prop::collection::hash_set("[a-z]{1,6}", 1..40),
        pick in any::<prop::sample::Index>(),
    ) {
        let names: Vec<String> = names.into_iter().collect();
        let shadowed = pick.get(&names);
        let mut table = ScopeTable::new();
        table.enter_scope();
        for (i, name) in names.iter().enumerate() {
            let value = Value::new(i as u32 + 1).expect("non-zero");
            prop_assert!(table.declare(name, value).is_ok());
        }
        let outer = table.lookup(shadowed);

        table.enter_scope();
        let inner = Value::new(1000).expect("non-zero");
        prop_assert!(table.declare(shadowed, inner).is_ok());
        prop_assert_eq!(table.lookup(shadowed), Some(inner));

        table.exit_scope();
        prop_assert_eq!(table.lookup(shadowed), outer);
        for (i, name) in names.iter().enumerate() {
            prop_assert_eq!(table.lookup(name), Value::new(i as u32 + 1));
        }
    }
}

//! Tests for circuit generation

use proptest::prelude::*;
use zkay_compiler::ast::types::BuiltinOp;
use zkay_compiler::circuit::ir::{flatten, CircuitExpr, CircuitStatement};
use zkay_compiler::syntax::{
    ContractDef, DataType, Expression as E, FunctionDef, Owner, SourceUnit, StateVarDef, Statement as S, TypeSpec,
};
use zkay_compiler::{compile, Circuit, Compilation, CompilerConfig};

fn uint() -> DataType {
    DataType::uint()
}

fn compile_with(contract: ContractDef, config: &CompilerConfig) -> Compilation {
    compile(&SourceUnit::single(contract), config).unwrap()
}

fn names(slots: &[zkay_compiler::circuit::names::Slot]) -> Vec<&str> {
    slots.iter().map(|s| s.name.as_str()).collect()
}

/// `x = v + 1` with `x` and `v` owned by the caller
fn increment_contract() -> ContractDef {
    ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("set")
            .param("v", TypeSpec::me(uint()))
            .body(vec![S::assign(E::ident("x"), E::binop(BuiltinOp::Add, E::ident("v"), E::num(1)))]),
    )
}

fn enc_constraints(circuit: &Circuit) -> Vec<(&str, &str, bool)> {
    flatten(&circuit.phi)
        .into_iter()
        .filter_map(|s| match s {
            CircuitStatement::EncConstraint { plain, cipher, is_dec, .. } => {
                Some((plain.name.as_str(), cipher.name.as_str(), *is_dec))
            }
            _ => None,
        })
        .collect()
}

// ============================================================================
// SPLIT FUNCTION TESTS
// ============================================================================

#[test]
fn test_split_function_gets_two_circuits() {
    let compilation = compile_with(increment_contract(), &CompilerConfig::default());
    assert_eq!(compilation.circuits.len(), 2);

    let ext = compilation.circuit("set").unwrap();
    assert_eq!(ext.verifier.as_deref(), Some("zk__Verify_C_set"));
    assert_eq!(ext.calls, vec!["_zk__set".to_string()]);

    let internal = compilation.circuit("_zk__set").unwrap();
    assert_eq!(internal.verifier, None);
    assert!(!internal.requires_verification());
    assert_eq!(compilation.verifier_names(), vec!["zk__Verify_C_set".to_string()]);
}

#[test]
fn test_internal_circuit_layout() {
    let compilation = compile_with(increment_contract(), &CompilerConfig::default());
    let internal = compilation.circuit("_zk__set").unwrap();

    assert_eq!(names(&internal.inputs), vec!["zk__in0_cipher"]);
    assert_eq!(names(&internal.outputs), vec!["zk__out0_cipher"]);
    assert_eq!(names(&internal.secret), vec!["secret0_plain", "zk__in0_cipher_R", "zk__out0_cipher_R"]);
    assert_eq!(internal.global_keys, vec!["glob_key_me".to_string()]);
    assert_eq!(internal.trans_in_size, 0);

    // the input is decrypted, the result encrypted
    assert_eq!(
        enc_constraints(internal),
        vec![("secret0_plain", "zk__in0_cipher", true), ("tmp0_plain", "zk__out0_cipher", false)]
    );
}

#[test]
fn test_external_circuit_checks_parameter_encryption() {
    let config = CompilerConfig::default();
    let compilation = compile_with(increment_contract(), &config);
    let ext = compilation.circuit("set").unwrap();
    let internal = compilation.circuit("_zk__set").unwrap();

    assert_eq!(names(&ext.inputs), vec!["zk__in0_cipher_v", "glob_key_me"]);
    assert_eq!(names(&ext.secret), vec!["v", "v_R"]);
    assert!(ext.outputs.is_empty());
    assert_eq!(enc_constraints(ext), vec![("v", "zk__in0_cipher_v", false)]);

    let params = config.crypto_params();
    assert_eq!(ext.in_size, params.cipher_len() + params.key_len());
    assert_eq!(ext.trans_in_size, internal.in_size);
    assert_eq!(ext.trans_out_size, internal.out_size);
    assert_eq!(ext.in_size_trans(), ext.in_size + internal.in_size);
}

#[test]
fn test_hash_threshold() {
    let compilation = compile_with(increment_contract(), &CompilerConfig::default());
    assert!(compilation.circuits.iter().all(|c| !c.uses_hash));

    let compilation = compile_with(increment_contract(), &CompilerConfig::default().with_hash_threshold(0));
    assert!(compilation.circuits.iter().all(|c| c.uses_hash));
}

#[test]
fn test_private_parameter_without_computation() {
    // `x = v` needs no proof of its own, only of the parameter encryption
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::me(uint())))
        .function(FunctionDef::new("set").param("v", TypeSpec::me(uint())).body(vec![S::assign(E::ident("x"), E::ident("v"))]));
    let compilation = compile_with(c, &CompilerConfig::default());
    assert_eq!(compilation.circuits.len(), 1);

    let ext = compilation.circuit("set").unwrap();
    assert!(ext.calls.is_empty());
    assert_eq!(ext.trans_in_size, 0);
    assert_eq!(names(&ext.inputs), vec!["zk__in0_cipher_v", "glob_key_me"]);
}

// ============================================================================
// PRIVATE CONTROL FLOW TESTS
// ============================================================================

#[test]
fn test_private_if_joins_branches_with_ite() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("choose").param("c", TypeSpec::me(DataType::Bool)).body(vec![S::if_else(
            E::ident("c"),
            vec![S::assign(E::ident("x"), E::num(1))],
            vec![S::assign(E::ident("x"), E::num(2))],
        )]),
    );
    let compilation = compile_with(c, &CompilerConfig::default());
    let internal = compilation.circuit("_zk__choose").unwrap();
    let phi = flatten(&internal.phi);

    let joined = phi.iter().find_map(|s| match s {
        CircuitStatement::Assignment { lhs, expr: CircuitExpr::Op { op: BuiltinOp::Ite, .. } } => Some(lhs),
        _ => None,
    });
    let joined = joined.expect("join of both branches");
    assert!(joined.name.ends_with("_x"));

    let guards = phi.iter().filter(|s| matches!(s, CircuitStatement::EnterGuard { .. })).count();
    let leaves = phi.iter().filter(|s| matches!(s, CircuitStatement::LeaveGuard)).count();
    assert_eq!(guards, 2);
    assert_eq!(leaves, 2);

    // the joined value is what gets published
    let published = phi.iter().any(|s| {
        matches!(s, CircuitStatement::EncConstraint { plain, is_dec: false, .. } if plain.name == joined.name)
    });
    assert!(published);
    assert_eq!(internal.outputs.len(), 1);
}

/// `if (c) { x = <value> }` with no else branch
fn one_sided_if(value: E) -> Compilation {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("maybe")
            .param("c", TypeSpec::me(DataType::Bool))
            .body(vec![S::if_then(E::ident("c"), vec![S::assign(E::ident("x"), value)])]),
    );
    compile_with(c, &CompilerConfig::default())
}

/// Versions of `x` in the order they are bound, and the guard of the branch
fn versions_of_x(circuit: &Circuit) -> (Vec<(&str, &CircuitExpr)>, &str) {
    let versions = flatten(&circuit.phi)
        .into_iter()
        .filter_map(|s| match s {
            CircuitStatement::Assignment { lhs, expr } if lhs.name.ends_with("_x") => Some((lhs.name.as_str(), expr)),
            _ => None,
        })
        .collect();
    let guard = flatten(&circuit.phi)
        .into_iter()
        .find_map(|s| match s {
            CircuitStatement::EnterGuard { cond, is_true: true } => Some(cond.as_str()),
            _ => None,
        })
        .unwrap();
    (versions, guard)
}

#[test]
fn test_one_sided_if_joins_with_value_read_before_branch() {
    let compilation = one_sided_if(E::binop(BuiltinOp::Add, E::ident("x"), E::num(1)));
    let internal = compilation.circuit("_zk__maybe").unwrap();
    let (versions, guard) = versions_of_x(internal);

    let [(pre, _), (assigned, _), (_, joined)] = versions.as_slice() else {
        panic!("expected three versions of x, got {:?}", versions);
    };
    assert_eq!(
        **joined,
        CircuitExpr::ite(CircuitExpr::idf(guard), CircuitExpr::idf(*assigned), CircuitExpr::idf(*pre))
    );
}

#[test]
fn test_one_sided_if_joins_with_unread_value() {
    let compilation = one_sided_if(E::num(1));
    let internal = compilation.circuit("_zk__maybe").unwrap();
    let (versions, guard) = versions_of_x(internal);

    let [(assigned, _), (_, joined)] = versions.as_slice() else {
        panic!("expected two versions of x, got {:?}", versions);
    };
    let CircuitExpr::Op { op: BuiltinOp::Ite, args } = joined else {
        panic!("join is not an ite: {}", joined);
    };
    assert_eq!(args[0], CircuitExpr::idf(guard));
    assert_eq!(args[1], CircuitExpr::idf(*assigned));

    // the value before the branch is the decrypted input
    let CircuitExpr::Idf(pre) = &args[2] else {
        panic!("else value is not an identifier: {}", args[2]);
    };
    assert!(enc_constraints(internal).iter().any(|(plain, _, is_dec)| plain == pre && *is_dec));
}

#[test]
fn test_reveal_publishes_plain_output() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("get")
            .returns(TypeSpec::public(uint()))
            .body(vec![S::ret(E::reveal(E::ident("x"), Owner::All))]),
    );
    let compilation = compile_with(c, &CompilerConfig::default());
    let internal = compilation.circuit("_zk__get").unwrap();

    assert_eq!(names(&internal.outputs), vec!["zk__out0_plain"]);
    let eq = flatten(&internal.phi)
        .into_iter()
        .any(|s| matches!(s, CircuitStatement::EqConstraint { val, .. } if val.name == "zk__out0_plain"));
    assert!(eq);
}

// ============================================================================
// CONSTANT FOLDING TESTS
// ============================================================================

fn literals(expr: &CircuitExpr, out: &mut Vec<String>) {
    match expr {
        CircuitExpr::Number(value) => out.push(value.to_string()),
        CircuitExpr::Op { args, .. } => args.iter().for_each(|a| literals(a, out)),
        CircuitExpr::Cast { expr, .. } | CircuitExpr::Encrypt { expr, .. } => literals(expr, out),
        _ => {}
    }
}

fn phi_literals(circuit: &Circuit) -> Vec<String> {
    let mut out = Vec::new();
    for s in flatten(&circuit.phi) {
        if let CircuitStatement::TempVarDecl { expr, .. } | CircuitStatement::Assignment { expr, .. } = s {
            literals(expr, &mut out);
        }
    }
    out
}

/// `x = v + <constant>` with `x` and `v` of type `ty` owned by the caller
fn add_constant(ty: DataType, constant: E) -> ContractDef {
    ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(ty.clone()))).function(
        FunctionDef::new("set")
            .param("v", TypeSpec::me(ty))
            .body(vec![S::assign(E::ident("x"), E::binop(BuiltinOp::Add, E::ident("v"), constant))]),
    )
}

fn shifted_three() -> E {
    E::binop(BuiltinOp::Shr, E::binop(BuiltinOp::Shl, E::num(3), E::num(126)), E::num(126))
}

#[test]
fn test_shift_round_trip_folds_to_original_value() {
    for ty in [DataType::Int(64), DataType::uint()] {
        let compilation = compile_with(add_constant(ty, shifted_three()), &CompilerConfig::default());
        let internal = compilation.circuit("_zk__set").unwrap();
        assert_eq!(phi_literals(internal), vec!["3".to_string()]);
    }
}

#[test]
fn test_literal_above_i128_range() {
    let big = E::binop(BuiltinOp::Pow, E::num(2), E::num(200));
    let compilation = compile_with(add_constant(uint(), big), &CompilerConfig::default());
    let internal = compilation.circuit("_zk__set").unwrap();
    let expected = (num_bigint::BigInt::from(1) << 200usize).to_string();
    assert_eq!(phi_literals(internal), vec![expected]);
}

#[test]
fn test_constant_overflowing_uint256_is_rejected() {
    let max_plus_one = E::binop(BuiltinOp::Pow, E::num(2), E::num(256));
    let err = compile(&SourceUnit::single(add_constant(uint(), max_plus_one)), &CompilerConfig::default()).unwrap_err();
    assert!(err.to_string().contains("does not fit into 256 bits"));

    // every folded subexpression must fit, not just the final value
    let via_overflow = E::binop(BuiltinOp::Sub, E::binop(BuiltinOp::Pow, E::num(2), E::num(256)), E::num(1));
    assert!(compile(&SourceUnit::single(add_constant(uint(), via_overflow)), &CompilerConfig::default()).is_err());

    let max = E::binop(
        BuiltinOp::Add,
        E::binop(BuiltinOp::Sub, E::binop(BuiltinOp::Pow, E::num(2), E::num(255)), E::num(1)),
        E::binop(BuiltinOp::Pow, E::num(2), E::num(255)),
    );
    assert!(compile(&SourceUnit::single(add_constant(uint(), max)), &CompilerConfig::default()).is_ok());
}

// ============================================================================
// CALL TESTS
// ============================================================================

fn caller_contract() -> ContractDef {
    ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::me(uint())))
        .function(FunctionDef::new("bump").body(vec![S::assign(
            E::ident("x"),
            E::binop(BuiltinOp::Add, E::ident("x"), E::num(1)),
        )]))
        .function(FunctionDef::new("bump_twice").body(vec![
            S::expr(E::call("bump", vec![])),
            S::expr(E::call("bump", vec![])),
        ]))
}

#[test]
fn test_callee_circuits_are_included() {
    let compilation = compile_with(caller_contract(), &CompilerConfig::default());
    let callee = compilation.circuit("_zk__bump").unwrap();
    let caller = compilation.circuit("_zk__bump_twice").unwrap();

    assert_eq!(caller.calls, vec!["_zk__bump".to_string(), "_zk__bump".to_string()]);
    assert_eq!(caller.in_size, 0);
    assert_eq!(caller.trans_in_size, 2 * callee.in_size);
    assert_eq!(caller.trans_out_size, 2 * callee.out_size);
    assert_eq!(caller.trans_priv_size, 2 * callee.priv_in_size);
    assert_eq!(caller.global_keys, vec!["glob_key_me".to_string()]);

    let ext = compilation.circuit("bump_twice").unwrap();
    assert_eq!(ext.calls, vec!["_zk__bump_twice".to_string()]);
    assert_eq!(names(&ext.inputs), vec!["glob_key_me"]);
    assert_eq!(ext.trans_in_size, 2 * callee.in_size);
}

#[test]
fn test_call_statements_appear_in_phi() {
    let compilation = compile_with(caller_contract(), &CompilerConfig::default());
    let caller = compilation.circuit("_zk__bump_twice").unwrap();
    let calls: Vec<&str> = flatten(&caller.phi)
        .into_iter()
        .filter_map(|s| match s {
            CircuitStatement::Call { function } => Some(function.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(calls, vec!["_zk__bump", "_zk__bump"]);
}

// ============================================================================
// DETERMINISM TESTS
// ============================================================================

fn counter_contract(vars: usize, increments: &[i128]) -> ContractDef {
    let mut c = ContractDef::new("Counter");
    for i in 0..vars {
        c = c.state_var(StateVarDef::new(format!("v{}", i), TypeSpec::me(uint())));
    }
    let body = increments
        .iter()
        .enumerate()
        .map(|(i, k)| {
            let target = format!("v{}", i % vars);
            S::assign(E::ident(target.clone()), E::binop(BuiltinOp::Add, E::ident(target), E::num(*k)))
        })
        .collect();
    c.function(FunctionDef::new("step").param("a", TypeSpec::me(uint())).body(body))
}

proptest! {
    #[test]
    fn test_compilation_is_deterministic(vars in 1usize..4, increments in prop::collection::vec(0i128..1000, 1..6)) {
        let config = CompilerConfig::default();
        let first = compile_with(counter_contract(vars, &increments), &config);
        let second = compile_with(counter_contract(vars, &increments), &config);
        prop_assert_eq!(&first.circuits, &second.circuits);
        prop_assert_eq!(first.render(), second.render());
    }

    #[test]
    fn test_every_increment_has_one_output(vars in 1usize..4, increments in prop::collection::vec(0i128..1000, 1..6)) {
        let compilation = compile_with(counter_contract(vars, &increments), &CompilerConfig::default());
        let internal = compilation.circuit("_zk__step").unwrap();
        prop_assert_eq!(internal.outputs.len(), increments.len());
        prop_assert_eq!(internal.inputs.len(), increments.len());
    }
}

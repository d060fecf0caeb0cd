//! Tests for name resolution, type checking and circuit compliance

use zkay_compiler::ast::types::{BuiltinOp, Label};
use zkay_compiler::ast::{Ast, StmtKind, VarId};
use zkay_compiler::syntax::{
    ContractDef, DataType, Expression as E, FunctionDef, Owner, SourceUnit, StateVarDef, Statement as S, TypeSpec,
};
use zkay_compiler::{check, compile, typecheck, CompilerConfig, CompilerError};

fn uint() -> DataType {
    DataType::uint()
}

fn var(ast: &Ast, name: &str) -> Label {
    let i = ast.vars.iter().position(|v| v.name == name).unwrap();
    Label::Var(VarId(i as u32))
}

fn message(err: &CompilerError) -> String {
    match err {
        CompilerError::NameResolution { message, .. }
        | CompilerError::Type { message, .. }
        | CompilerError::CircuitCompliance { message, .. }
        | CompilerError::Unsupported { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

/// `final address owner` set to the deployer, plus a value only the owner can read
fn owned_value(guarded: bool) -> ContractDef {
    let mut body = Vec::new();
    if guarded {
        body.push(S::require(E::binop(BuiltinOp::Eq, E::ident("owner"), E::me())));
    }
    body.push(S::ret(E::reveal(E::ident("val"), Owner::All)));
    ContractDef::new("Vault")
        .state_var(StateVarDef::new("owner", TypeSpec::public(DataType::Address)).final_())
        .state_var(StateVarDef::new("val", TypeSpec::owned_by(uint(), "owner")))
        .function(FunctionDef::constructor().body(vec![S::assign(E::ident("owner"), E::me())]))
        .function(FunctionDef::new("get").returns(TypeSpec::public(uint())).body(body))
}

// ============================================================================
// NAME RESOLUTION TESTS
// ============================================================================

#[test]
fn test_undefined_identifier() {
    let c = ContractDef::new("C").function(
        FunctionDef::new("f").body(vec![S::assign(E::ident("missing").at(3, 9), E::num(1))]).at(2, 5),
    );
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::NameResolution { .. }));
    assert!(message(&err).contains("missing"));
    assert_eq!(err.context().unwrap().line, 3);
}

#[test]
fn test_undefined_privacy_label() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::owned_by(uint(), "nobody")));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::NameResolution { .. }));
}

#[test]
fn test_undefined_function() {
    let c = ContractDef::new("C").function(FunctionDef::new("f").body(vec![S::expr(E::call("g", vec![]))]));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(message(&err).contains("Undefined function 'g'"));
}

#[test]
fn test_check_returns_annotated_ast() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::me(uint())))
        .function(FunctionDef::new("inc").body(vec![S::assign(
            E::ident("x"),
            E::binop(BuiltinOp::Add, E::ident("x"), E::num(1)),
        )]));
    let ast = check(&SourceUnit::single(c)).unwrap();
    let f = ast.function_ids().next().unwrap();
    let facts = &ast.function(f).facts;
    assert!(facts.requires_verification);
    assert!(facts.requires_verification_when_external);
    assert_eq!(facts.modified_state.len(), 1);
}

// ============================================================================
// ALIAS ANALYSIS TESTS
// ============================================================================

/// `x`, `y` and `z` start out equal; each iteration shifts `y <- z <- w`
fn shifting_loop() -> ContractDef {
    let addr = || TypeSpec::public(DataType::Address);
    ContractDef::new("C").function(
        FunctionDef::new("f")
            .param("c", TypeSpec::public(DataType::Bool))
            .param("x", addr())
            .param("y", addr())
            .param("z", addr())
            .param("w", addr())
            .body(vec![
                S::assign(E::ident("x"), E::ident("z")),
                S::assign(E::ident("y"), E::ident("z")),
                S::while_loop(
                    E::ident("c"),
                    vec![
                        S::assign(E::ident("x"), E::ident("y")),
                        S::assign(E::ident("y"), E::ident("z")),
                        S::assign(E::ident("z"), E::ident("w")),
                    ],
                ),
            ]),
    )
}

#[test]
fn test_loop_carried_alias_does_not_survive_loop() {
    let ast = check(&SourceUnit::single(shifting_loop())).unwrap();
    let (x, y) = (var(&ast, "x"), var(&ast, "y"));
    let (id, body) = ast
        .stmts
        .iter()
        .enumerate()
        .find_map(|(i, s)| match s.kind {
            StmtKind::While { body, .. } => Some((i, body)),
            _ => None,
        })
        .unwrap();
    let looped = &ast.stmts[id];

    // one pass through the body keeps x~y, the second one does not
    assert!(looped.before.as_ref().unwrap().same_partition(&x, &y));
    assert!(!looped.after.as_ref().unwrap().same_partition(&x, &y));

    let StmtKind::Block(stmts) = &ast.stmt(body).kind else {
        panic!("loop body is a block");
    };
    let first = ast.stmt(stmts[0]).before.as_ref().unwrap();
    assert!(!first.same_partition(&x, &y));
}

// ============================================================================
// TYPE CHECKING TESTS
// ============================================================================

#[test]
fn test_redundant_reveal() {
    let c = ContractDef::new("C").function(FunctionDef::new("f").param("a", TypeSpec::public(uint())).body(vec![
        S::decl("b", TypeSpec::public(uint()), Some(E::reveal(E::ident("a"), Owner::All))),
    ]));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::Type { .. }));
    assert_eq!(message(&err), "Redundant reveal");
}

#[test]
fn test_private_value_to_public_target() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::public(uint())))
        .function(FunctionDef::new("f").param("v", TypeSpec::me(uint())).body(vec![S::assign(E::ident("x"), E::ident("v"))]));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::TypeMismatch { .. }));
}

#[test]
fn test_public_value_is_upgraded_to_private_target() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::me(uint())))
        .function(FunctionDef::new("f").param("v", TypeSpec::public(uint())).body(vec![S::assign(E::ident("x"), E::ident("v"))]));
    assert!(check(&SourceUnit::single(c)).is_ok());
}

#[test]
fn test_reveal_requires_alias_with_me() {
    assert!(check(&SourceUnit::single(owned_value(true))).is_ok());

    let err = check(&SourceUnit::single(owned_value(false))).unwrap_err();
    assert!(message(&err).contains("First argument of reveal must be accessible"));
}

#[test]
fn test_final_modified_outside_constructor() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::public(uint())).final_())
        .function(FunctionDef::constructor().body(vec![S::assign(E::ident("x"), E::num(1))]))
        .function(FunctionDef::new("f").body(vec![S::assign(E::ident("x"), E::num(2))]));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::Type { .. }));
    assert!(message(&err).contains("outside the constructor"));
}

#[test]
fn test_final_read_before_initialization() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::public(uint())).final_())
        .function(FunctionDef::constructor().body(vec![
            S::decl("y", TypeSpec::public(uint()), Some(E::ident("x"))),
            S::assign(E::ident("x"), E::num(1)),
        ]));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(message(&err).contains("read before it is initialized"));
}

#[test]
fn test_final_never_initialized() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::public(uint())).final_());
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(message(&err).contains("never initialized"));
}

#[test]
fn test_final_assigned_in_one_branch_only() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::public(uint())).final_())
        .function(FunctionDef::constructor().param("a", TypeSpec::public(DataType::Bool)).body(vec![S::if_then(
            E::ident("a"),
            vec![S::assign(E::ident("x"), E::num(1))],
        )]));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(message(&err).contains("both branches"));
}

#[test]
fn test_final_assigned_twice_in_constructor() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::public(uint())).final_())
        .function(FunctionDef::constructor().body(vec![
            S::assign(E::ident("x"), E::num(1)),
            S::assign(E::ident("x"), E::num(2)),
        ]));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::Type { .. }));
    assert_eq!(message(&err), "Final variable 'x' is assigned more than once");
}

/// Upgrades, implicit casts, folded literals, a private branch and a reveal
fn mixed_conversions() -> ContractDef {
    let shifted = E::binop(BuiltinOp::Shr, E::binop(BuiltinOp::Shl, E::num(3), E::num(126)), E::num(126));
    ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::me(uint())))
        .state_var(StateVarDef::new("small", TypeSpec::public(DataType::Uint(8))))
        .function(
            FunctionDef::new("f")
                .param("v", TypeSpec::public(uint()))
                .param("c", TypeSpec::me(DataType::Bool))
                .returns(TypeSpec::public(uint()))
                .body(vec![
                    S::assign(E::ident("x"), E::ident("v")),
                    S::assign(E::ident("x"), E::binop(BuiltinOp::Add, E::ident("x"), shifted)),
                    S::if_then(E::ident("c"), vec![S::assign(E::ident("x"), E::num(2))]),
                    S::decl("r", TypeSpec::public(uint()), Some(E::reveal(E::ident("x"), Owner::All))),
                    S::ret(E::binop(BuiltinOp::Add, E::ident("small"), E::ident("r"))),
                ]),
        )
}

#[test]
fn test_type_check_is_idempotent() {
    let mut ast = check(&SourceUnit::single(mixed_conversions())).unwrap();
    let types: Vec<_> = ast.exprs.iter().map(|e| e.ty.clone()).collect();
    assert!(types.iter().all(|t| t.is_some()));

    typecheck::run(&mut ast).unwrap();
    assert_eq!(ast.exprs.len(), types.len());
    let again: Vec<_> = ast.exprs.iter().map(|e| e.ty.clone()).collect();
    assert_eq!(again, types);
}

#[test]
fn test_privacy_label_must_be_final_address() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("owner", TypeSpec::public(DataType::Address)))
        .state_var(StateVarDef::new("val", TypeSpec::owned_by(uint(), "owner")));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(message(&err).contains("must be a final or constant address"));
}

#[test]
fn test_param_owned_by_other_party() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("owner", TypeSpec::public(DataType::Address)).final_().init(E::me()))
        .function(FunctionDef::new("f").param("v", TypeSpec::owned_by(uint(), "owner")));
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(message(&err).contains("Only me/all accepted"));
}

#[test]
fn test_private_mapping_key_is_rejected() {
    let c = ContractDef::new("C").state_var(StateVarDef::new(
        "m",
        TypeSpec::me(DataType::mapping(DataType::Address, TypeSpec::public(uint()))),
    ));
    assert!(check(&SourceUnit::single(c)).is_err());
}

// ============================================================================
// CIRCUIT COMPLIANCE TESTS
// ============================================================================

#[test]
fn test_private_expression_in_loop() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("f").param("n", TypeSpec::public(uint())).body(vec![S::while_loop(
            E::binop(BuiltinOp::Gt, E::ident("n"), E::num(0)),
            vec![
                S::assign(E::ident("x"), E::binop(BuiltinOp::Add, E::ident("x"), E::num(1))),
                S::assign(E::ident("n"), E::binop(BuiltinOp::Sub, E::ident("n"), E::num(1))),
            ],
        )]),
    );
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::CircuitCompliance { .. }));
    assert!(message(&err).contains("Loop body"));
}

#[test]
fn test_return_inside_private_if() {
    let c = ContractDef::new("C").function(
        FunctionDef::new("f")
            .param("c", TypeSpec::me(DataType::Bool))
            .returns(TypeSpec::public(uint()))
            .body(vec![S::if_then(E::ident("c"), vec![S::ret(E::num(1))]), S::ret(E::num(0))]),
    );
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(message(&err).contains("Return statements are not allowed"));
}

#[test]
fn test_reveal_to_all_inside_private_if() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("f").param("c", TypeSpec::me(DataType::Bool)).body(vec![S::if_then(
            E::ident("c"),
            vec![S::decl("r", TypeSpec::public(uint()), Some(E::reveal(E::ident("x"), Owner::All)))],
        )]),
    );
    let err = check(&SourceUnit::single(c)).unwrap_err();
    assert!(matches!(err, CompilerError::CircuitCompliance { .. }));
    assert_eq!(message(&err), "Revealing information to other parties is not allowed inside private if statements");
}

#[test]
fn test_private_if_must_not_modify_public_state() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("count", TypeSpec::public(uint())))
        .function(FunctionDef::new("f").param("c", TypeSpec::me(DataType::Bool)).body(vec![S::if_then(
            E::ident("c"),
            vec![S::assign(E::ident("count"), E::num(1))],
        )]));
    assert!(matches!(check(&SourceUnit::single(c)), Err(CompilerError::CircuitCompliance { .. })));
}

#[test]
fn test_public_loop_is_accepted() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("total", TypeSpec::public(uint()))).function(
        FunctionDef::new("f").body(vec![S::for_loop(
            Some(S::decl("i", TypeSpec::public(uint()), Some(E::num(0)))),
            Some(E::binop(BuiltinOp::Lt, E::ident("i"), E::num(10))),
            Some(S::assign(E::ident("i"), E::binop(BuiltinOp::Add, E::ident("i"), E::num(1)))),
            vec![S::assign(E::ident("total"), E::binop(BuiltinOp::Add, E::ident("total"), E::ident("i")))],
        )]),
    );
    let compilation = compile(&SourceUnit::single(c), &CompilerConfig::default()).unwrap();
    assert!(compilation.circuits.is_empty());
}

// ============================================================================
// ERROR RENDERING TESTS
// ============================================================================

#[test]
fn test_error_context_names_function_and_contract() {
    let c = ContractDef::new("Token").function(
        FunctionDef::new("mint").body(vec![S::assign(E::ident("supply").at(4, 9), E::num(1))]),
    );
    let err = check(&SourceUnit::single(c)).unwrap_err();
    let text = err.render(None);
    assert!(text.contains("4:9"));
    assert!(text.contains("mint"));
    assert!(text.contains("Token"));
}

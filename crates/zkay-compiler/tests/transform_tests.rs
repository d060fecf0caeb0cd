//! Tests for the public contract transformation and Solidity output

use zkay_compiler::ast::types::BuiltinOp;
use zkay_compiler::ast::Visibility;
use zkay_compiler::syntax::{
    ContractDef, DataType, Expression as E, FunctionDef, Owner, SourceUnit, StateVarDef, Statement as S, TypeSpec,
};
use zkay_compiler::transform::public::{PubExpr, PubStmt, PubType};
use zkay_compiler::{compile, Compilation, CompilerConfig, CompilerError, CryptoBackend};

fn uint() -> DataType {
    DataType::uint()
}

fn compile_default(contract: ContractDef) -> Compilation {
    compile(&SourceUnit::single(contract), &CompilerConfig::default()).unwrap()
}

fn increment_contract() -> ContractDef {
    ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("set")
            .param("v", TypeSpec::me(uint()))
            .body(vec![S::assign(E::ident("x"), E::binop(BuiltinOp::Add, E::ident("v"), E::num(1)))]),
    )
}

// ============================================================================
// CONTRACT STRUCTURE TESTS
// ============================================================================

#[test]
fn test_public_contract_without_private_data_is_unchanged() {
    let c = ContractDef::new("Plain")
        .state_var(StateVarDef::new("count", TypeSpec::public(uint())))
        .function(FunctionDef::new("inc").body(vec![S::assign(
            E::ident("count"),
            E::binop(BuiltinOp::Add, E::ident("count"), E::num(1)),
        )]));
    let compilation = compile_default(c);
    let contract = &compilation.contracts[0];

    assert!(contract.imports.is_empty());
    assert!(contract.external_contracts.is_empty());
    assert!(contract.structs.is_empty());
    assert_eq!(contract.functions.len(), 1);
    assert_eq!(contract.functions[0].name, "inc");
    assert!(compilation.render().contains("count = count + 1;"));
}

#[test]
fn test_split_function_structure() {
    let compilation = compile_default(increment_contract());
    let contract = &compilation.contracts[0];

    assert_eq!(contract.imports, vec!["PublicKeyInfrastructure.sol".to_string(), "zk__Verify_C_set.sol".to_string()]);
    let instances: Vec<&str> = contract.external_contracts.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(instances, vec!["PublicKeyInfrastructure_inst", "zk__Verify_C_set_inst"]);
    assert!(contract.external_contracts[0].constant);

    let wrapper = contract.function("set").unwrap();
    assert_eq!(wrapper.visibility, Visibility::Public);
    let params: Vec<&str> = wrapper.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["v", "zk__out", "zk__proof"]);

    let internal = contract.function("_zk__set").unwrap();
    assert_eq!(internal.visibility, Visibility::Internal);
    let params: Vec<&str> = internal.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["v", "zk__in", "zk__in_start_idx", "zk__out", "zk__out_start_idx"]);

    assert_eq!(contract.structs.len(), 1);
    assert_eq!(contract.structs[0].name, "set_zk__data");
    let fields: Vec<&str> = contract.structs[0].fields.iter().map(|(_, n)| n.as_str()).collect();
    assert_eq!(fields, vec!["zk__out0_cipher", "zk__in0_cipher"]);
}

#[test]
fn test_constructor_receives_verifier_addresses() {
    let compilation = compile_default(increment_contract());
    let ctor = compilation.contracts[0].constructor().unwrap();

    assert_eq!(ctor.params.len(), 1);
    assert_eq!(ctor.params[0].name, "_zk__Verify_C_set_inst");
    assert_eq!(ctor.params[0].ty, PubType::Contract("zk__Verify_C_set".to_string()));
    assert_eq!(
        ctor.body[0],
        PubStmt::assign(PubExpr::ident("zk__Verify_C_set_inst"), PubExpr::ident("_zk__Verify_C_set_inst"))
    );
}

#[test]
fn test_existing_constructor_is_extended() {
    let c = increment_contract().state_var(StateVarDef::new("limit", TypeSpec::public(uint()))).function(
        FunctionDef::constructor()
            .param("start", TypeSpec::public(uint()))
            .body(vec![S::assign(E::ident("limit"), E::ident("start"))]),
    );
    let compilation = compile_default(c);
    let contract = &compilation.contracts[0];
    assert_eq!(contract.functions.iter().filter(|f| f.is_constructor).count(), 1);

    let ctor = contract.constructor().unwrap();
    let params: Vec<&str> = ctor.params.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(params, vec!["_zk__Verify_C_set_inst", "start"]);
}

#[test]
fn test_wrapper_verifies_proof_after_call() {
    let compilation = compile_default(increment_contract());
    let wrapper = compilation.contracts[0].function("set").unwrap();

    let call_pos = wrapper
        .body
        .iter()
        .position(|s| matches!(s, PubStmt::Expr(PubExpr::Call { name, .. }) if name == "_zk__set"))
        .unwrap();
    let verify_pos = wrapper
        .body
        .iter()
        .position(|s| matches!(s, PubStmt::Expr(PubExpr::MethodCall { method, .. }) if method == "check_verify"))
        .unwrap();
    assert!(call_pos < verify_pos);
    assert_eq!(verify_pos, wrapper.body.len() - 1);
}

#[test]
fn test_multiple_return_values_use_return_variables() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("both")
            .returns(TypeSpec::public(uint()))
            .returns(TypeSpec::public(uint()))
            .body(vec![S::ret(E::tuple(vec![E::reveal(E::ident("x"), Owner::All), E::num(7)]))]),
    );
    let compilation = compile_default(c);
    let internal = compilation.contracts[0].function("_zk__both").unwrap();
    assert_eq!(
        internal.body.last(),
        Some(&PubStmt::Return(Some(PubExpr::Tuple(vec![PubExpr::ident("zk__ret_0"), PubExpr::ident("zk__ret_1")]))))
    );
}

#[test]
fn test_state_variable_initializer() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("limit", TypeSpec::public(uint())).init(E::binop(BuiltinOp::Mul, E::num(2), E::num(5))));
    let compilation = compile_default(c);
    assert!(compilation.render().contains("uint256 limit = 2 * 5;"));
}

// ============================================================================
// CALL SITE TESTS
// ============================================================================

#[test]
fn test_verified_call_receives_buffer_slices() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("x", TypeSpec::me(uint())))
        .function(FunctionDef::new("bump").body(vec![S::assign(
            E::ident("x"),
            E::binop(BuiltinOp::Add, E::ident("x"), E::num(1)),
        )]))
        .function(FunctionDef::new("bump_twice").body(vec![
            S::expr(E::call("bump", vec![])),
            S::expr(E::call("bump", vec![])),
        ]));
    let compilation = compile_default(c);
    let callee = compilation.circuit("_zk__bump").unwrap();
    let source = compilation.render();

    assert!(source.contains("_zk__bump(zk__in, zk__in_start_idx, zk__out, zk__out_start_idx);"));
    assert!(source.contains(&format!(
        "_zk__bump(zk__in, zk__in_start_idx + {}, zk__out, zk__out_start_idx + {});",
        callee.in_size, callee.out_size
    )));
}

#[test]
fn test_call_without_proof_keeps_plain_name() {
    let c = ContractDef::new("C")
        .state_var(StateVarDef::new("count", TypeSpec::public(uint())))
        .function(
            FunctionDef::new("add")
                .visibility(Visibility::Internal)
                .param("k", TypeSpec::public(uint()))
                .body(vec![S::assign(E::ident("count"), E::binop(BuiltinOp::Add, E::ident("count"), E::ident("k")))]),
        )
        .function(FunctionDef::new("inc").body(vec![S::expr(E::call("add", vec![E::num(1)]))]));
    let source = compile_default(c).render();
    assert!(source.contains("add(1);"));
    assert!(source.contains("function add(uint256 k) internal"));
}

// ============================================================================
// RENDERING TESTS
// ============================================================================

#[test]
fn test_render_split_function() {
    let config = CompilerConfig::default();
    let compilation = compile(&SourceUnit::single(increment_contract()), &config).unwrap();
    let source = compilation.render();
    let cipher_len = config.crypto_params().cipher_len();

    assert!(source.starts_with("pragma solidity"));
    assert!(source.contains("import \"./zk__Verify_C_set.sol\";"));
    assert!(source.contains("PublicKeyInfrastructure constant PublicKeyInfrastructure_inst"));
    assert!(source.contains(&format!("uint[{}] x;", cipher_len)));
    assert!(source.contains(&format!(
        "function set(uint[{}] calldata v, uint[] calldata zk__out, uint[8] calldata zk__proof) public",
        cipher_len
    )));
    assert!(source.contains("zk__Verify_C_set_inst.check_verify(zk__proof, zk__in, zk__out);"));
    assert!(source.contains("PublicKeyInfrastructure_inst.getPk(msg.sender)"));
    assert!(source.contains("// Preparing circuit inputs for:"));
}

#[test]
fn test_cipher_width_follows_backend() {
    let config = CompilerConfig::default().with_crypto_backend(CryptoBackend::Elgamal);
    let compilation = compile(&SourceUnit::single(increment_contract()), &config).unwrap();
    let source = compilation.render();
    assert!(source.contains(&format!("uint[{}] x;", config.crypto_params().cipher_len())));
}

// ============================================================================
// ERROR TESTS
// ============================================================================

#[test]
fn test_multiple_constructors() {
    let c = ContractDef::new("C")
        .function(FunctionDef::constructor())
        .function(FunctionDef::constructor().param("a", TypeSpec::public(uint())));
    let err = compile(&SourceUnit::single(c), &CompilerConfig::default()).unwrap_err();
    assert!(matches!(err, CompilerError::Internal(_)));
}

#[test]
fn test_early_return_in_verified_function() {
    let c = ContractDef::new("C").state_var(StateVarDef::new("x", TypeSpec::me(uint()))).function(
        FunctionDef::new("f").param("a", TypeSpec::public(DataType::Bool)).returns(TypeSpec::public(uint())).body(vec![
            S::if_then(E::ident("a"), vec![S::ret(E::num(0))]),
            S::assign(E::ident("x"), E::binop(BuiltinOp::Add, E::ident("x"), E::num(1))),
            S::ret(E::num(1)),
        ]),
    );
    let err = compile(&SourceUnit::single(c), &CompilerConfig::default()).unwrap_err();
    assert!(matches!(err, CompilerError::Unsupported { .. }));
}

#[test]
fn test_invalid_config_is_rejected() {
    let mut config = CompilerConfig::default();
    config.zk_out_name = config.zk_in_name.clone();
    let err = compile(&SourceUnit::single(increment_contract()), &config).unwrap_err();
    assert!(matches!(err, CompilerError::Runtime(_)));
}

#[test]
fn test_json_source_unit() {
    let json = r#"{
        "contracts": [{
            "name": "C",
            "state_vars": [{"name": "x", "ty": {"ty": {"uint": 256}, "privacy": "me"}}],
            "functions": [{
                "name": "set",
                "params": [{"name": "v", "ty": {"ty": {"uint": 256}, "privacy": "me"}}],
                "body": [{"kind": {"assign": {"lhs": {"kind": {"ident": "x"}}, "rhs": {"kind": {"ident": "v"}}}}}]
            }]
        }]
    }"#;
    let unit = SourceUnit::from_json(json).unwrap();
    let compilation = compile(&unit, &CompilerConfig::default()).unwrap();
    assert!(compilation.contracts[0].function("_zk__set").is_some());
}

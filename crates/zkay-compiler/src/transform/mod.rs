//! Transformation into public contracts and circuits
//!
//! Every function body is lowered by its own [`CircuitHelper`]. A function
//! which can be called from outside and touches private data is split in
//! two:
//!
//! - an internal function holding the lowered body. It receives slices of
//!   the shared `zk__in`/`zk__out` buffers, deserializes the circuit outputs
//!   on entry and serializes the circuit inputs on exit.
//! - an external wrapper with the original name. It accepts the circuit
//!   outputs and the proof, fills in the encrypted parameters and public
//!   keys, calls the internal function and finally verifies the proof.

pub mod calls;
pub mod expr;
pub mod public;
pub mod stmt;

use std::collections::BTreeMap;

use tracing::{debug, info};
use zkay_runtime::CompilerConfig;

use crate::ast::types::{BuiltinOp, Label, TypeName};
use crate::ast::{Ast, ContractId, ExprId, ExprKind, FunctionId, Mutability, VarId, Visibility};
use crate::circuit::helper::CircuitHelper;
use crate::circuit::names::Slot;
use crate::circuit::{circuit_name, Circuit};
use crate::error::{CompilerError, Result};
use calls::{call_site_offsets, compute_transitive_sizes, patch_call_sites, CallIo, TransIo};
use public::{
    DataLocation, PubExpr, PubFunction, PubParam, PubStateVar, PubStmt, PubStruct, PubType, PublicContract,
};

/// Output of [`transform`]
#[derive(Debug, Clone, Default)]
pub struct Transformed {
    pub contracts: Vec<PublicContract>,
    /// Circuits of all contracts, in function order
    pub circuits: Vec<Circuit>,
}

pub fn transform(ast: &Ast, config: &CompilerConfig) -> Result<Transformed> {
    let mut result = Transformed::default();
    for c in ast.contract_ids() {
        let (contract, circuits) = ContractTransformer::new(ast, config, c).run()?;
        info!(contract = %contract.name, circuits = circuits.len(), "contract transformed");
        result.contracts.push(contract);
        result.circuits.extend(circuits);
    }
    Ok(result)
}

fn missing_circuit() -> CompilerError {
    CompilerError::internal("function requiring verification has no circuit")
}

struct ContractTransformer<'a> {
    ast: &'a Ast,
    config: &'a CompilerConfig,
    contract: ContractId,
    /// `me` and every public address which can never change
    static_owners: Vec<Label>,
}

impl<'a> ContractTransformer<'a> {
    fn new(ast: &'a Ast, config: &'a CompilerConfig, contract: ContractId) -> Self {
        let mut static_owners = vec![Label::Me];
        for v in &ast.contract(contract).state_vars {
            let var = ast.var(*v);
            if (var.is_final || var.is_constant) && var.ty.ty.is_address() && !var.ty.is_private() {
                static_owners.push(Label::Var(*v));
            }
        }
        Self { ast, config, contract, static_owners }
    }

    fn run(self) -> Result<(PublicContract, Vec<Circuit>)> {
        let ast = self.ast;
        let config = self.config;
        let def = ast.contract(self.contract);
        if def.functions.iter().filter(|f| ast.function(**f).is_constructor()).count() > 1 {
            return Err(CompilerError::internal(format!("contract '{}' has several constructors", def.name)));
        }

        let mut lowered = Vec::with_capacity(def.functions.len());
        for &f in &def.functions {
            let mut helper = CircuitHelper::new(ast, config, f, self.static_owners.clone());
            let body = helper.function_body()?;
            lowered.push((f, helper, body));
        }

        let io: BTreeMap<FunctionId, CallIo> = lowered
            .iter()
            .filter(|(f, ..)| ast.function(*f).facts.requires_verification)
            .map(|(f, helper, _)| (*f, helper.call_io()))
            .collect();
        let trans = compute_transitive_sizes(&io)?;
        for (f, _, body) in lowered.iter_mut() {
            if io.contains_key(f) {
                let offsets = call_site_offsets(*f, &io, &trans)?;
                patch_call_sites(body, &offsets, config)?;
            }
        }

        let mut functions = Vec::new();
        let mut structs = Vec::new();
        let mut circuits = Vec::new();
        let mut verifiers = Vec::new();
        let mut uses_pki = false;
        for (f, helper, body) in lowered {
            let func = ast.function(f);
            let split = func.facts.requires_verification_when_external;
            debug!(function = %func.name, split, verifies = func.facts.requires_verification, "lowering function");

            if split {
                let (wrapper, circuit) = self.external_wrapper(f, io.get(&f), trans.get(&f))?;
                verifiers.push(circuit.verifier.clone().ok_or_else(missing_circuit)?);
                functions.push(wrapper);
                circuits.push(circuit);
                uses_pki = true;
            }
            if func.facts.requires_verification {
                let own = io.get(&f).ok_or_else(missing_circuit)?;
                let t = trans.get(&f).ok_or_else(missing_circuit)?;
                if own.in_size + own.out_size > 0 {
                    structs.push(self.data_struct(f, &helper));
                }
                functions.push(self.internal_function(f, &helper, body, own, t));
                circuits.push(helper.into_circuit(&def.name, circuit_name(ast, config, f), None, t));
                uses_pki = true;
            } else {
                functions.push(self.plain_function(f, body));
            }
        }
        self.add_verifier_params(&mut functions, &verifiers);

        let mut imports = Vec::new();
        let mut external_contracts = Vec::new();
        if uses_pki {
            let pki = &config.pki_contract_name;
            imports.push(format!("{}.sol", pki));
            external_contracts.push(PubStateVar {
                ty: PubType::Contract(pki.clone()),
                name: config.contract_instance_name(pki),
                constant: true,
                init: Some(PubExpr::cast(PubType::Contract(pki.clone()), PubExpr::num(0))),
            });
        }
        for v in &verifiers {
            imports.push(format!("{}.sol", v));
            external_contracts.push(PubStateVar {
                ty: PubType::Contract(v.clone()),
                name: config.contract_instance_name(v),
                constant: false,
                init: None,
            });
        }

        let mut state_vars = Vec::new();
        for v in &def.state_vars {
            let var = ast.var(*v);
            state_vars.push(PubStateVar {
                ty: PubType::from_annotated(&var.ty, config),
                name: var.name.clone(),
                constant: var.is_constant,
                init: var.initializer.map(|e| self.initializer_expr(e)).transpose()?,
            });
        }

        let contract =
            PublicContract { name: def.name.clone(), imports, external_contracts, state_vars, structs, functions };
        Ok((contract, circuits))
    }

    fn param(&self, v: VarId, reference_location: DataLocation) -> PubParam {
        let var = self.ast.var(v);
        let ty = PubType::from_annotated(&var.ty, self.config);
        let location = ty.is_reference().then_some(reference_location);
        PubParam::new(ty, var.name.clone(), location)
    }

    fn returns(&self, f: FunctionId) -> Vec<PubType> {
        self.ast.function(f).returns.iter().map(|r| PubType::from_annotated(r, self.config)).collect()
    }

    /// Declarations of the return variables, and the expression returning them
    fn return_vars(&self, f: FunctionId) -> (Vec<PubStmt>, Option<PubExpr>) {
        let config = self.config;
        let types = self.returns(f);
        let decls = types
            .iter()
            .enumerate()
            .map(|(i, ty)| PubStmt::VarDecl {
                ty: ty.clone(),
                name: config.return_var(i),
                location: ty.is_reference().then_some(DataLocation::Memory),
                init: None,
            })
            .collect();
        let value = match types.len() {
            0 => None,
            1 => Some(PubExpr::ident(config.return_var(0))),
            n => Some(PubExpr::Tuple((0..n).map(|i| PubExpr::ident(config.return_var(i))).collect())),
        };
        (decls, value)
    }

    /// Name of the function holding `f`'s body
    fn body_function_name(&self, f: FunctionId) -> String {
        let func = self.ast.function(f);
        if func.facts.requires_verification_when_external {
            self.config.internal_name(&func.name)
        } else {
            func.name.clone()
        }
    }

    /// A function without circuit, possibly renamed behind an external wrapper
    fn plain_function(&self, f: FunctionId, body: Vec<PubStmt>) -> PubFunction {
        let func = self.ast.function(f);
        let split = func.facts.requires_verification_when_external;
        PubFunction {
            name: self.body_function_name(f),
            is_constructor: func.is_constructor() && !split,
            visibility: if split { Visibility::Internal } else { func.visibility },
            mutability: if split { internal_mutability(func.mutability) } else { func.mutability },
            params: func.params.iter().map(|p| self.param(*p, DataLocation::Memory)).collect(),
            returns: self.returns(f),
            body,
        }
    }

    fn data_struct(&self, f: FunctionId, helper: &CircuitHelper) -> PubStruct {
        let func = self.ast.function(f);
        let fields = helper
            .outputs()
            .layout()
            .into_iter()
            .chain(helper.inputs().layout())
            .map(|slot| (PubType::from_type_name(&slot.ty, self.config), slot.name))
            .collect();
        PubStruct { name: self.config.zk_data_struct_name(&func.unambiguous_name), fields }
    }

    /// The lowered body of a function with a circuit, framed by circuit buffer (de)serialization
    fn internal_function(
        &self,
        f: FunctionId,
        helper: &CircuitHelper,
        body: Vec<PubStmt>,
        own: &CallIo,
        trans: &TransIo,
    ) -> PubFunction {
        let config = self.config;
        let func = self.ast.function(f);
        let split = func.facts.requires_verification_when_external;
        let zk_in = || PubExpr::ident(&config.zk_in_name);
        let zk_out = || PubExpr::ident(&config.zk_out_name);
        let in_start = || PubExpr::ident(config.in_start_name());
        let out_start = || PubExpr::ident(config.out_start_name());

        let mut params: Vec<PubParam> = func.params.iter().map(|p| self.param(*p, DataLocation::Memory)).collect();
        params.push(PubParam::new(PubType::UintArray(None), &config.zk_in_name, Some(DataLocation::Memory)));
        params.push(PubParam::new(PubType::Uint(256), config.in_start_name(), None));
        params.push(PubParam::new(PubType::UintArray(None), &config.zk_out_name, Some(DataLocation::Memory)));
        params.push(PubParam::new(PubType::Uint(256), config.out_start_name(), None));

        let mut stmts = vec![
            PubStmt::Require(fits(in_start(), own.in_size + trans.in_size, zk_in())),
            PubStmt::Require(fits(out_start(), own.out_size + trans.out_size, zk_out())),
        ];
        if own.in_size + own.out_size > 0 {
            stmts.push(PubStmt::VarDecl {
                ty: PubType::Struct(config.zk_data_struct_name(&func.unambiguous_name)),
                name: config.zk_data_var_name.clone(),
                location: Some(DataLocation::Memory),
                init: None,
            });
        }
        let (decls, ret) = self.return_vars(f);
        stmts.extend(decls);

        let data = PubExpr::ident(&config.zk_data_var_name);
        for slot in helper.outputs().layout() {
            let member = PubExpr::member(data.clone(), &slot.name);
            stmts.extend(deserialize_slot(&slot, |i| word(zk_out(), out_start(), slot.offset + i), member));
        }
        stmts.extend(body);
        for slot in helper.inputs().layout() {
            let member = PubExpr::member(data.clone(), &slot.name);
            stmts.extend(serialize_slot(&slot, |i| word(zk_in(), in_start(), slot.offset + i), member));
        }
        if let Some(ret) = ret {
            stmts.push(PubStmt::Return(Some(ret)));
        }

        PubFunction {
            name: if split && func.is_constructor() {
                config.internal_name("constructor")
            } else {
                self.body_function_name(f)
            },
            is_constructor: false,
            visibility: if split { Visibility::Internal } else { func.visibility },
            mutability: internal_mutability(func.mutability),
            params,
            returns: self.returns(f),
            body: stmts,
        }
    }

    /// Public entry point of a split function, and the circuit its proof is checked against
    fn external_wrapper(
        &self,
        f: FunctionId,
        io: Option<&CallIo>,
        trans: Option<&TransIo>,
    ) -> Result<(PubFunction, Circuit)> {
        let ast = self.ast;
        let config = self.config;
        let def = ast.contract(self.contract);
        let func = ast.function(f);
        let verifies = func.facts.requires_verification;

        let mut ext = CircuitHelper::new(ast, config, f, self.static_owners.clone());
        let mut inner = TransIo::default();
        if verifies {
            let (own, t) = io.zip(trans).ok_or_else(missing_circuit)?;
            inner = TransIo {
                in_size: own.in_size + t.in_size,
                out_size: own.out_size + t.out_size,
                priv_size: own.priv_size + t.priv_size,
                keys: t.keys.clone(),
            };
            ext.set_global_keys(inner.keys.clone());
        }
        let mut param_ciphers = Vec::new();
        for p in &func.params {
            if ast.var(*p).ty.is_private() {
                param_ciphers.push((*p, ext.ensure_parameter_encryption(*p)?));
            }
        }
        let keys = ext.allocate_global_keys();
        if verifies {
            ext.call_function(f);
        }
        inner.keys = ext.global_keys().to_vec();

        let in_total = ext.in_size() + inner.in_size;
        let out_total = ext.out_size() + inner.out_size;
        let layout = ext.inputs().layout();
        let offset_of = |name: &str| {
            layout
                .iter()
                .find(|s| s.name == name)
                .map(|s| s.offset)
                .ok_or_else(|| CompilerError::internal(format!("no input slot named '{}'", name)))
        };
        let zk_in = || PubExpr::ident(&config.zk_in_name);
        let zk_out = || PubExpr::ident(&config.zk_out_name);
        let in_at = |off: usize| PubExpr::index(zk_in(), PubExpr::num(off));

        let mut body = vec![
            PubStmt::Require(PubExpr::op(
                BuiltinOp::Eq,
                vec![PubExpr::member(zk_out(), "length"), PubExpr::num(out_total)],
            )),
            PubStmt::VarDecl {
                ty: PubType::UintArray(None),
                name: config.zk_in_name.clone(),
                location: Some(DataLocation::Memory),
                init: Some(PubExpr::NewArray { len: Box::new(PubExpr::num(in_total)) }),
            },
        ];
        let cipher_len = config.crypto_params().cipher_len();
        for (p, cipher) in &param_ciphers {
            let off = offset_of(&cipher.name)?;
            let name = &ast.var(*p).name;
            body.push(PubStmt::Comment(format!("Encrypted parameter {}", name)));
            for i in 0..cipher_len {
                body.push(PubStmt::assign(in_at(off + i), PubExpr::index(PubExpr::ident(name), PubExpr::num(i))));
            }
        }
        if !keys.is_empty() {
            let key_len = config.crypto_params().key_len();
            let tmp_key = || PubExpr::ident("_tmp_key");
            let pki = PubExpr::ident(config.contract_instance_name(&config.pki_contract_name));
            body.push(PubStmt::VarDecl {
                ty: PubType::Key(key_len),
                name: "_tmp_key".to_string(),
                location: Some(DataLocation::Memory),
                init: None,
            });
            for (label, idf) in &keys {
                let owner = match label {
                    Label::Me => PubExpr::MsgSender,
                    Label::Var(v) => PubExpr::ident(&ast.var(*v).name),
                    Label::All => return Err(CompilerError::internal("global key for @all")),
                };
                body.push(PubStmt::assign(tmp_key(), PubExpr::method(pki.clone(), "getPk", vec![owner])));
                let off = offset_of(&idf.name)?;
                for i in 0..key_len {
                    body.push(PubStmt::assign(in_at(off + i), PubExpr::index(tmp_key(), PubExpr::num(i))));
                }
            }
        }

        let mut args: Vec<PubExpr> = func.params.iter().map(|p| PubExpr::ident(&ast.var(*p).name)).collect();
        if verifies {
            args.push(zk_in());
            args.push(PubExpr::num(ext.in_size()));
            args.push(zk_out());
            args.push(PubExpr::num(ext.out_size()));
        }
        let callee = if func.is_constructor() { config.internal_name("constructor") } else { self.body_function_name(f) };
        let call = PubExpr::Call { name: callee, args, site: None };
        let (decls, ret) = self.return_vars(f);
        body.extend(decls);
        match &ret {
            Some(ret) => body.push(PubStmt::assign(ret.clone(), call)),
            None => body.push(PubStmt::Expr(call)),
        }

        let verifier = config.verifier_contract_name(&def.name, &func.unambiguous_name);
        body.push(PubStmt::Expr(PubExpr::method(
            PubExpr::ident(config.contract_instance_name(&verifier)),
            &config.verification_function_name,
            vec![PubExpr::ident(&config.proof_param_name), zk_in(), zk_out()],
        )));
        if let Some(ret) = ret {
            body.push(PubStmt::Return(Some(ret)));
        }

        let location = if func.is_constructor() { DataLocation::Memory } else { DataLocation::Calldata };
        let mut params: Vec<PubParam> = func.params.iter().map(|p| self.param(*p, location)).collect();
        params.push(PubParam::new(PubType::UintArray(None), &config.zk_out_name, Some(location)));
        params.push(PubParam::new(
            PubType::Proof(config.proving_scheme.proof_len()),
            &config.proof_param_name,
            Some(location),
        ));

        let wrapper = PubFunction {
            name: func.name.clone(),
            is_constructor: func.is_constructor(),
            visibility: func.visibility,
            mutability: func.mutability,
            params,
            returns: self.returns(f),
            body,
        };
        let circuit = ext.into_circuit(&def.name, func.unambiguous_name.clone(), Some(verifier), &inner);
        Ok((wrapper, circuit))
    }

    /// Verifier contract addresses are passed to the constructor
    fn add_verifier_params(&self, functions: &mut Vec<PubFunction>, verifiers: &[String]) {
        if verifiers.is_empty() {
            return;
        }
        let idx = match functions.iter().position(|f| f.is_constructor) {
            Some(idx) => idx,
            None => {
                functions.insert(
                    0,
                    PubFunction {
                        name: "constructor".to_string(),
                        is_constructor: true,
                        visibility: Visibility::Public,
                        mutability: Mutability::NonPayable,
                        params: Vec::new(),
                        returns: Vec::new(),
                        body: Vec::new(),
                    },
                );
                0
            }
        };
        let ctor = &mut functions[idx];
        let mut params = Vec::new();
        let mut assignments = Vec::new();
        for v in verifiers {
            let inst = self.config.contract_instance_name(v);
            let param = format!("_{}", inst);
            assignments.push(PubStmt::assign(PubExpr::ident(inst), PubExpr::ident(&param)));
            params.push(PubParam::new(PubType::Contract(v.clone()), param, None));
        }
        params.append(&mut ctor.params);
        ctor.params = params;
        assignments.append(&mut ctor.body);
        ctor.body = assignments;
    }

    /// State variable initializers are evaluated publicly at deployment
    fn initializer_expr(&self, e: ExprId) -> Result<PubExpr> {
        let ast = self.ast;
        let expr = ast.expr(e);
        if expr.evaluate_privately || expr.ty.as_ref().is_some_and(|t| t.is_private()) {
            return Err(CompilerError::unsupported("Private state variable initializer", ast.expr_context(e)));
        }
        let lower = |xs: &[ExprId]| xs.iter().map(|x| self.initializer_expr(*x)).collect::<Result<Vec<_>>>();
        match &expr.kind {
            ExprKind::Bool(b) => Ok(PubExpr::Bool(*b)),
            ExprKind::Number(n) => Ok(PubExpr::Number(n.clone())),
            ExprKind::Me => Ok(PubExpr::MsgSender),
            ExprKind::Ident(v) => Ok(PubExpr::ident(&ast.var(*v).name)),
            ExprKind::Builtin { op, args, .. } => Ok(PubExpr::op(*op, lower(args)?)),
            ExprKind::Index { base, index } => {
                Ok(PubExpr::index(self.initializer_expr(*base)?, self.initializer_expr(*index)?))
            }
            ExprKind::Cast { expr: inner, implicit: true, .. } => self.initializer_expr(*inner),
            ExprKind::Cast { ty, expr: inner, .. } => {
                Ok(PubExpr::cast(PubType::from_type_name(ty, self.config), self.initializer_expr(*inner)?))
            }
            ExprKind::Tuple(elems) => Ok(PubExpr::Tuple(lower(elems)?)),
            ExprKind::Call { func, args } if !ast.function(*func).facts.requires_verification_when_external => {
                Ok(PubExpr::Call { name: ast.function(*func).name.clone(), args: lower(args)?, site: None })
            }
            ExprKind::Call { .. } | ExprKind::Reclassify { .. } => Err(CompilerError::unsupported(
                "State variable initializer requires a proof",
                ast.expr_context(e),
            )),
        }
    }
}

/// Internal functions cannot receive ether
fn internal_mutability(m: Mutability) -> Mutability {
    match m {
        Mutability::Payable => Mutability::NonPayable,
        other => other,
    }
}

/// `start + len <= buf.length`
fn fits(start: PubExpr, len: usize, buf: PubExpr) -> PubExpr {
    PubExpr::op(
        BuiltinOp::Le,
        vec![PubExpr::op(BuiltinOp::Add, vec![start, PubExpr::num(len)]), PubExpr::member(buf, "length")],
    )
}

/// `buf[start + off]`
fn word(buf: PubExpr, start: PubExpr, off: usize) -> PubExpr {
    PubExpr::index(buf, PubExpr::offset(start, off))
}

fn is_buffer(ty: &TypeName) -> bool {
    matches!(ty, TypeName::Cipher | TypeName::Key | TypeName::Randomness)
}

/// `member = words`, converted to the member's type
fn deserialize_slot(slot: &Slot, word_at: impl Fn(usize) -> PubExpr, member: PubExpr) -> Vec<PubStmt> {
    if is_buffer(&slot.ty) {
        (0..slot.size)
            .map(|i| PubStmt::assign(PubExpr::index(member.clone(), PubExpr::num(i)), word_at(i)))
            .collect()
    } else {
        vec![PubStmt::assign(member, from_word(&slot.ty, word_at(0)))]
    }
}

/// `words = member`, encoded as uint256 words
fn serialize_slot(slot: &Slot, word_at: impl Fn(usize) -> PubExpr, member: PubExpr) -> Vec<PubStmt> {
    if is_buffer(&slot.ty) {
        (0..slot.size)
            .map(|i| PubStmt::assign(word_at(i), PubExpr::index(member.clone(), PubExpr::num(i))))
            .collect()
    } else {
        vec![PubStmt::assign(word_at(0), to_word(&slot.ty, member))]
    }
}

/// Reinterprets a uint256 circuit word as a value of type `ty`
fn from_word(ty: &TypeName, w: PubExpr) -> PubExpr {
    match ty {
        TypeName::Bool => PubExpr::op(BuiltinOp::Ne, vec![w, PubExpr::num(0)]),
        TypeName::Address => PubExpr::cast(PubType::Address, PubExpr::cast(PubType::Uint(160), w)),
        TypeName::AddressPayable => PubExpr::cast(PubType::AddressPayable, PubExpr::cast(PubType::Uint(160), w)),
        TypeName::Uint(256) => w,
        TypeName::Uint(n) => PubExpr::cast(PubType::Uint(*n), w),
        TypeName::Int(256) => PubExpr::cast(PubType::Int(256), w),
        TypeName::Int(n) => PubExpr::cast(PubType::Int(*n), PubExpr::cast(PubType::Int(256), w)),
        _ => w,
    }
}

/// Encodes a value of type `ty` as a uint256 circuit word
fn to_word(ty: &TypeName, v: PubExpr) -> PubExpr {
    match ty {
        TypeName::Bool => PubExpr::op(BuiltinOp::Ite, vec![v, PubExpr::num(1), PubExpr::num(0)]),
        TypeName::Address | TypeName::AddressPayable => {
            PubExpr::cast(PubType::Uint(256), PubExpr::cast(PubType::Uint(160), v))
        }
        TypeName::Uint(256) => v,
        TypeName::Uint(_) => PubExpr::cast(PubType::Uint(256), v),
        TypeName::Int(256) => PubExpr::cast(PubType::Uint(256), v),
        TypeName::Int(_) => PubExpr::cast(PubType::Uint(256), PubExpr::cast(PubType::Int(256), v)),
        _ => v,
    }
}

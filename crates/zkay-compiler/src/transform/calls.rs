//! Transitive circuit sizes and call-site buffer offsets
//!
//! A function which requires verification writes its circuit inputs and
//! outputs into slices of shared `zk__in`/`zk__out` buffers. Its own values
//! come first, followed by those of every verified callee in call order, each
//! callee again followed by its own callees. The offsets computed here are
//! appended to the public call sites.

use std::collections::BTreeMap;

use tracing::trace;
use zkay_runtime::CompilerConfig;

use crate::ast::types::Label;
use crate::ast::FunctionId;
use crate::error::{CompilerError, Result};
use crate::transform::public::{PubExpr, PubStmt};

/// Buffer usage of one circuit, excluding callees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallIo {
    pub in_size: usize,
    pub out_size: usize,
    pub priv_size: usize,
    /// Verified callees, one entry per call site
    pub calls: Vec<FunctionId>,
    pub keys: Vec<Label>,
}

/// Buffer usage contributed by all transitive callees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransIo {
    pub in_size: usize,
    pub out_size: usize,
    pub priv_size: usize,
    /// Global keys of the circuit and of all callees, deduplicated
    pub keys: Vec<Label>,
}

/// Computes [`TransIo`] for every function in `io`
pub fn compute_transitive_sizes(io: &BTreeMap<FunctionId, CallIo>) -> Result<BTreeMap<FunctionId, TransIo>> {
    let mut done = BTreeMap::new();
    for f in io.keys() {
        visit(*f, io, &mut done, &mut Vec::new())?;
    }
    Ok(done)
}

fn visit(
    f: FunctionId,
    io: &BTreeMap<FunctionId, CallIo>,
    done: &mut BTreeMap<FunctionId, TransIo>,
    stack: &mut Vec<FunctionId>,
) -> Result<TransIo> {
    if let Some(t) = done.get(&f) {
        return Ok(t.clone());
    }
    if stack.contains(&f) {
        return Err(CompilerError::internal("cycle among functions which require verification"));
    }
    let own = io.get(&f).ok_or_else(|| CompilerError::internal("call of a function without a circuit"))?;

    stack.push(f);
    let mut trans = TransIo { keys: own.keys.clone(), ..TransIo::default() };
    for g in &own.calls {
        let callee = io.get(g).ok_or_else(|| CompilerError::internal("call of a function without a circuit"))?;
        let callee_trans = visit(*g, io, done, stack)?;
        trans.in_size += callee.in_size + callee_trans.in_size;
        trans.out_size += callee.out_size + callee_trans.out_size;
        trans.priv_size += callee.priv_size + callee_trans.priv_size;
        for k in callee_trans.keys {
            if !trans.keys.contains(&k) {
                trans.keys.push(k);
            }
        }
    }
    stack.pop();

    trace!(function = f.0, in_size = trans.in_size, out_size = trans.out_size, "transitive sizes");
    done.insert(f, trans.clone());
    Ok(trans)
}

/// Input and output offset of every call site of `f`, relative to `f`'s slice
pub fn call_site_offsets(
    f: FunctionId,
    io: &BTreeMap<FunctionId, CallIo>,
    trans: &BTreeMap<FunctionId, TransIo>,
) -> Result<Vec<(usize, usize)>> {
    let missing = || CompilerError::internal("call of a function without a circuit");
    let own = io.get(&f).ok_or_else(missing)?;
    let mut in_off = own.in_size;
    let mut out_off = own.out_size;
    let mut offsets = Vec::with_capacity(own.calls.len());
    for g in &own.calls {
        offsets.push((in_off, out_off));
        let callee = io.get(g).ok_or_else(missing)?;
        let callee_trans = trans.get(g).ok_or_else(missing)?;
        in_off += callee.in_size + callee_trans.in_size;
        out_off += callee.out_size + callee_trans.out_size;
    }

    let total = trans.get(&f).ok_or_else(missing)?;
    if in_off != own.in_size + total.in_size || out_off != own.out_size + total.out_size {
        return Err(CompilerError::internal("call-site offsets do not add up to the transitive sizes"));
    }
    Ok(offsets)
}

/// Appends the buffer arguments to every numbered call site in `body`
pub fn patch_call_sites(body: &mut [PubStmt], offsets: &[(usize, usize)], config: &CompilerConfig) -> Result<()> {
    let mut patched = 0;
    let mut out_of_range = false;
    for s in body.iter_mut() {
        s.exprs_mut(&mut |e| {
            let PubExpr::Call { args, site, .. } = e else {
                return;
            };
            let Some(idx) = site.take() else {
                return;
            };
            let Some(&(in_off, out_off)) = offsets.get(idx) else {
                out_of_range = true;
                return;
            };
            args.push(PubExpr::ident(&config.zk_in_name));
            args.push(PubExpr::offset(PubExpr::ident(config.in_start_name()), in_off));
            args.push(PubExpr::ident(&config.zk_out_name));
            args.push(PubExpr::offset(PubExpr::ident(config.out_start_name()), out_off));
            patched += 1;
        });
    }
    if out_of_range || patched != offsets.len() {
        return Err(CompilerError::internal(format!(
            "patched {} of {} verified call sites",
            patched,
            offsets.len()
        )));
    }
    Ok(())
}

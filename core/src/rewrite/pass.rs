//! Rewrite passes and the fixpoint pipeline.
//!
//! A pass is a [`Rewriter`] with a name and a per-iteration hook. The
//! [`Pipeline`] runs its passes over everything reachable from a root until
//! nothing changes: structural defs are rewritten to fresh canonical defs,
//! while the operands of reachable nominals are rewritten in place (their
//! identity must survive, other defs point at them).

use core::ptr;

use hashbrown::HashSet;

use super::{Memo, Rewriter, uses};
use crate::def::{Def, DefRef, Node};
use crate::world::{Result, World};
use crate::{Box, Vec, vec};

pub trait Pass<'w>: Rewriter<'w> {
    fn name(&self) -> &'static str;

    /// Called once per pipeline iteration, before any rewriting.
    fn enter(&mut self) {}

    /// Called once per pipeline iteration, after this pass has run.
    fn finish(&mut self) {}
}

/// Fixpoint driver over a sequence of passes.
pub struct Pipeline<'p, 'w> {
    passes: Vec<Box<dyn Pass<'w> + 'p>>,
    max_iters: usize,
}

impl<'p, 'w> Pipeline<'p, 'w> {
    pub fn new() -> Self {
        Self {
            passes: Vec::new(),
            max_iters: 16,
        }
    }

    pub fn add(&mut self, pass: impl Pass<'w> + 'p) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Cap on full pass-sequence iterations before giving up on a fixpoint.
    pub fn set_max_iters(&mut self, max_iters: usize) -> &mut Self {
        self.max_iters = max_iters;
        self
    }

    /// Run all passes to a fixed point and return the rewritten root.
    pub fn run(&mut self, root: DefRef<'w>) -> Result<DefRef<'w>> {
        let mut root = root;
        for iter in 0..self.max_iters {
            let mut changed = false;
            for pass in &mut self.passes {
                pass.enter();
                for nom in collect_noms(root) {
                    // inside its own operands the nominal maps to itself, so
                    // a pass can only replace it at use sites
                    pass.memo_mut().clear();
                    pass.memo_mut().insert(nom as *const Def<'w>, nom);
                    for i in 0..nom.num_ops() {
                        let Some(op) = nom.op_opt(i) else { continue };
                        let img = pass.rewrite(op)?;
                        if !ptr::eq(img, op) {
                            tracing::debug!(pass = pass.name(), nom = %nom, "rewrote nominal operand");
                            nom.reset_op(i, img);
                            changed = true;
                        }
                    }
                }
                pass.memo_mut().clear();
                let new_root = pass.rewrite(root)?;
                if !ptr::eq(new_root, root) {
                    tracing::debug!(pass = pass.name(), "rewrote root");
                    root = new_root;
                    changed = true;
                }
                pass.finish();
            }
            if !changed {
                tracing::debug!(iterations = iter + 1, "pipeline reached a fixed point");
                return Ok(root);
            }
        }
        tracing::warn!(max_iters = self.max_iters, "pipeline hit its iteration cap");
        Ok(root)
    }
}

impl Default for Pipeline<'_, '_> {
    fn default() -> Self {
        Self::new()
    }
}

/// All set nominals reachable from `root`.
fn collect_noms<'w>(root: DefRef<'w>) -> Vec<DefRef<'w>> {
    let mut seen: HashSet<*const Def<'w>> = HashSet::new();
    let mut stack = vec![root];
    let mut noms = Vec::new();
    while let Some(d) = stack.pop() {
        if !seen.insert(d as *const Def<'w>) {
            continue;
        }
        if d.is_nom() && d.is_set() {
            noms.push(d);
        }
        if let Some(ty) = d.ty() {
            stack.push(ty);
        }
        for i in 0..d.num_ops() {
            if let Some(op) = d.op_opt(i) {
                stack.push(op);
            }
        }
    }
    noms
}

/// Inlines applications of non-recursive lambdas.
pub struct BetaRed<'p, 'w> {
    world: &'p World<'w>,
    memo: Memo<'w>,
}

impl<'p, 'w> BetaRed<'p, 'w> {
    pub fn new(world: &'p World<'w>) -> Self {
        Self {
            world,
            memo: Memo::default(),
        }
    }
}

impl<'w> Rewriter<'w> for BetaRed<'_, 'w> {
    fn world(&self) -> &World<'w> {
        self.world
    }

    fn memo(&self) -> &Memo<'w> {
        &self.memo
    }

    fn memo_mut(&mut self) -> &mut Memo<'w> {
        &mut self.memo
    }

    fn fold(&mut self, _old: DefRef<'w>, new: DefRef<'w>) -> Result<DefRef<'w>> {
        if new.node() == Node::App {
            let callee = new.callee();
            // a lam whose body mentions the lam itself is recursive; leave it
            if callee.node() == Node::Lam && callee.is_set() && !uses(callee.body(), callee) {
                tracing::debug!(lam = %callee, "beta-reducing");
                return self.world.reduce_lam(callee, new.arg());
            }
        }
        Ok(new)
    }
}

impl<'w> Pass<'w> for BetaRed<'_, 'w> {
    fn name(&self) -> &'static str {
        "beta_red"
    }
}

/// Rewrites `λx. f x` to `f` when `x` does not occur in `f` and the types
/// agree exactly.
pub struct EtaRed<'p, 'w> {
    world: &'p World<'w>,
    memo: Memo<'w>,
}

impl<'p, 'w> EtaRed<'p, 'w> {
    pub fn new(world: &'p World<'w>) -> Self {
        Self {
            world,
            memo: Memo::default(),
        }
    }
}

impl<'w> Rewriter<'w> for EtaRed<'_, 'w> {
    fn world(&self) -> &World<'w> {
        self.world
    }

    fn memo(&self) -> &Memo<'w> {
        &self.memo
    }

    fn memo_mut(&mut self) -> &mut Memo<'w> {
        &mut self.memo
    }

    fn rewrite_nom(&mut self, nom: DefRef<'w>) -> Result<DefRef<'w>> {
        if nom.node() == Node::Lam && nom.is_set() {
            let body = nom.body();
            if body.node() == Node::App {
                let f = body.callee();
                let var = self.world.var(nom);
                let same_ty = match (f.ty(), nom.ty()) {
                    (Some(ft), Some(lt)) => self.world.alpha_strict(ft, lt),
                    _ => false,
                };
                if ptr::eq(body.arg(), var) && same_ty && !uses(f, var) && !uses(f, nom) {
                    tracing::debug!(lam = %nom, "eta-reducing");
                    return Ok(f);
                }
            }
        }
        Ok(nom)
    }
}

impl<'w> Pass<'w> for EtaRed<'_, 'w> {
    fn name(&self) -> &'static str {
        "eta_red"
    }
}

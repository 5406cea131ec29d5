//! The generic memoized rewriter.
//!
//! A [`Rewriter`] maps a graph to a graph: structural defs are rebuilt
//! bottom-up through the world's constructors (so every local rewrite and
//! normalizer re-fires on the result), nominals go through
//! [`Rewriter::rewrite_nom`], and every image is memoized by pointer so
//! shared subgraphs are rewritten once. The traversal keeps its own explicit
//! stack; graph depth is not bounded by the call stack.

use core::ptr;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::check;
use crate::def::{Def, DefRef, Node};
use crate::world::{Result, World};
use crate::{Vec, vec};

pub mod pass;

/// Pointer-keyed memo of rewritten defs.
pub type Memo<'w> = HashMap<*const Def<'w>, DefRef<'w>>;

enum Frame<'w> {
    Visit(DefRef<'w>),
    Finish(DefRef<'w>),
}

fn lookup<'w>(memo: &Memo<'w>, def: DefRef<'w>) -> DefRef<'w> {
    let def = check::find(def);
    memo.get(&(def as *const Def<'w>)).copied().unwrap_or(def)
}

pub trait Rewriter<'w> {
    fn world(&self) -> &World<'w>;
    fn memo(&self) -> &Memo<'w>;
    fn memo_mut(&mut self) -> &mut Memo<'w>;

    /// Image of a nominal def. The default keeps nominals in place, which is
    /// also what terminates the traversal across cyclic definitions.
    fn rewrite_nom(&mut self, nom: DefRef<'w>) -> Result<DefRef<'w>> {
        Ok(nom)
    }

    /// Post-hook on every visited def, rebuilt or not. Passes fold here.
    fn fold(&mut self, _old: DefRef<'w>, new: DefRef<'w>) -> Result<DefRef<'w>> {
        Ok(new)
    }

    fn rewrite(&mut self, root: DefRef<'w>) -> Result<DefRef<'w>> {
        let mut stack: Vec<Frame<'w>> = vec![Frame::Visit(root)];
        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Visit(def) => {
                    let def = check::find(def);
                    let key = def as *const Def<'w>;
                    if self.memo().contains_key(&key) {
                        continue;
                    }
                    if def.is_nom() {
                        let img = self.rewrite_nom(def)?;
                        self.memo_mut().insert(key, img);
                        continue;
                    }
                    stack.push(Frame::Finish(def));
                    if let Some(ty) = def.ty() {
                        stack.push(Frame::Visit(ty));
                    }
                    for op in def.ops() {
                        stack.push(Frame::Visit(op));
                    }
                }
                Frame::Finish(def) => {
                    let key = def as *const Def<'w>;
                    if self.memo().contains_key(&key) {
                        continue;
                    }
                    let new_ty = def.ty().map(|t| lookup(self.memo(), t));
                    let new_ops: SmallVec<[DefRef<'w>; 4]> =
                        def.ops().map(|op| lookup(self.memo(), op)).collect();
                    let same_ty = match (def.ty(), new_ty) {
                        (Some(old), Some(new)) => ptr::eq(old, new),
                        (None, None) => true,
                        _ => false,
                    };
                    let same_ops =
                        def.ops().zip(new_ops.iter()).all(|(old, &new)| ptr::eq(old, new));
                    let img = if same_ty && same_ops {
                        def
                    } else {
                        self.world().rebuild(def, new_ty, &new_ops)?
                    };
                    let img = self.fold(def, img)?;
                    self.memo_mut().insert(key, img);
                }
            }
        }
        let root = check::find(root);
        Ok(lookup(self.memo(), root))
    }
}

/// Does `target` occur in the graph reachable from `def`, through types and
/// filled operand slots? Vars are leaves: their binder operand is a back
/// edge, but their type is still searched.
pub fn uses<'w>(def: DefRef<'w>, target: DefRef<'w>) -> bool {
    let mut seen: HashSet<*const Def<'w>> = HashSet::new();
    let mut stack = vec![def];
    while let Some(d) = stack.pop() {
        if ptr::eq(d, target) {
            return true;
        }
        if !seen.insert(d as *const Def<'w>) {
            continue;
        }
        if let Some(ty) = d.ty() {
            stack.push(ty);
        }
        if d.node() == Node::Var {
            continue;
        }
        for i in 0..d.num_ops() {
            if let Some(op) = d.op_opt(i) {
                stack.push(op);
            }
        }
    }
    false
}

/// Substitution of one bound variable by a value. Nominals that mention the
/// variable are stubbed and refilled so the binder structure survives;
/// everything else stays shared.
pub struct Substituter<'s, 'w> {
    world: &'s World<'w>,
    memo: Memo<'w>,
    var: DefRef<'w>,
}

impl<'s, 'w> Substituter<'s, 'w> {
    pub fn new(world: &'s World<'w>, var: DefRef<'w>, value: DefRef<'w>) -> Self {
        debug_assert_eq!(var.node(), Node::Var);
        let mut memo = Memo::default();
        memo.insert(var as *const Def<'w>, value);
        // the binder itself is not replaced, only its variable
        memo.insert(var.binder() as *const Def<'w>, var.binder());
        Self { world, memo, var }
    }
}

impl<'w> Rewriter<'w> for Substituter<'_, 'w> {
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
        if !uses(nom, self.var) {
            return Ok(nom);
        }
        let new_ty = match nom.ty() {
            Some(ty) => self.rewrite(ty)?,
            None => unreachable!("nominal without a type"),
        };
        let stub = self.world.stub(nom, new_ty);
        // memoized before the body so cyclic references hit the stub
        self.memo.insert(nom as *const Def<'w>, stub);
        for i in 0..nom.num_ops() {
            if let Some(op) = nom.op_opt(i) {
                let img = self.rewrite(op)?;
                stub.set_op(i, img);
            }
        }
        Ok(stub)
    }
}

impl<'w> World<'w> {
    /// `def` with `value` substituted for `binder`'s variable.
    pub(crate) fn reduce_with(
        &self,
        def: DefRef<'w>,
        binder: DefRef<'w>,
        value: DefRef<'w>,
    ) -> Result<DefRef<'w>> {
        Substituter::new(self, self.var(binder), value).rewrite(def)
    }

    /// The codomain of `pi` at argument `arg`. Only set nominal pis are
    /// dependent; structural pis return their codomain unchanged.
    pub fn reduce_pi(&self, pi: DefRef<'w>, arg: DefRef<'w>) -> Result<DefRef<'w>> {
        if pi.is_nom() && pi.is_set() {
            self.reduce_with(pi.codom(), pi, arg)
        } else {
            Ok(pi.op(1))
        }
    }

    /// The body of `lam` at argument `arg` (beta reduction).
    pub fn reduce_lam(&self, lam: DefRef<'w>, arg: DefRef<'w>) -> Result<DefRef<'w>> {
        debug_assert!(lam.node() == Node::Lam && lam.is_set());
        self.reduce_with(lam.body(), lam, arg)
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use core::ptr;

    use crate::world::World;

    #[test]
    fn reduce_lam_substitutes_through_structural_defs() {
        let arena = Bump::new();
        let w = World::new(&arena);

        // λx. (x, 1)
        let nat = w.nat();
        let sigma = w.arr(w.lit_nat(2), nat).unwrap();
        let pi = w.pi(nat, sigma);
        let lam = w.nom_lam(pi, "pair");
        let x = w.var(lam);
        lam.set_body(w.tuple(&[x, w.lit_nat(1)]).unwrap());

        let reduced = w.reduce_lam(lam, w.lit_nat(9)).unwrap();
        let expected = w.tuple(&[w.lit_nat(9), w.lit_nat(1)]).unwrap();
        assert!(ptr::eq(reduced, expected));
    }

    #[test]
    fn substitution_stubs_nominals_that_capture_the_variable() {
        let arena = Bump::new();
        let w = World::new(&arena);

        // λx. λy. add x y
        let nat = w.nat();
        let inner_pi = w.pi(nat, nat);
        let outer = w.nom_lam(w.pi(nat, inner_pi), "outer");
        let inner = w.nom_lam(inner_pi, "inner");
        let body = w
            .app_args(w.ax_nat_add(), &[w.var(outer), w.var(inner)])
            .unwrap();
        inner.set_body(body);
        outer.set_body(inner);

        let partial = w.reduce_lam(outer, w.lit_nat(2)).unwrap();
        // a fresh inner lambda, with the outer variable gone
        assert!(!ptr::eq(partial, inner));
        assert_eq!(partial.node(), crate::def::Node::Lam);

        let result = w.reduce_lam(partial, w.lit_nat(3)).unwrap();
        assert!(ptr::eq(result, w.lit_nat(5)));
    }

    #[test]
    fn unrelated_subgraphs_stay_shared() {
        let arena = Bump::new();
        let w = World::new(&arena);

        let nat = w.nat();
        let lam = w.nom_lam(w.pi(nat, w.arr(w.lit_nat(2), nat).unwrap()), "f");
        let keep = w.tuple(&[w.lit_nat(3), w.lit_nat(4)]).unwrap();
        let body = w
            .insert_at(keep, 0, w.var(lam))
            .unwrap();
        lam.set_body(body);

        let reduced = w.reduce_lam(lam, w.lit_nat(7)).unwrap();
        // insert on a literal tuple refines in place
        let expected = w.tuple(&[w.lit_nat(7), w.lit_nat(4)]).unwrap();
        assert!(ptr::eq(reduced, expected));
    }
}

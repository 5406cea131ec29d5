//! Alpha-equivalence, assignability, and inference-hole resolution.
//!
//! Unresolved `Infer` defs form a union-find structure over their sole
//! operand slot: an empty slot marks a root, a filled one points towards the
//! representative. [`find`] follows and compresses these chains. The
//! [`Check`] comparator runs in one of two modes: *infer* mode resolves holes
//! as a side effect of comparison, *strict* mode treats an open hole as equal
//! only to itself.

use core::ptr;

use hashbrown::{HashMap, HashSet};

use crate::def::{Def, DefRef, Node};
use crate::world::World;

/// Follow an `Infer` chain to its representative, compressing the path.
/// Identity on everything else.
pub fn find<'w>(def: DefRef<'w>) -> DefRef<'w> {
    if def.node() != Node::Infer {
        return def;
    }
    let mut root = def;
    while root.node() == Node::Infer {
        match root.op_opt(0) {
            Some(next) => root = next,
            None => break,
        }
    }
    let mut cur = def;
    while cur.node() == Node::Infer && !ptr::eq(cur, root) {
        match cur.op_opt(0) {
            Some(next) => {
                cur.resolve_to(root);
                cur = next;
            }
            None => break,
        }
    }
    root
}

/// Union two unresolved holes by rank. Returns the representative.
fn union<'w>(a: DefRef<'w>, b: DefRef<'w>) -> DefRef<'w> {
    debug_assert!(a.node() == Node::Infer && a.op_opt(0).is_none());
    debug_assert!(b.node() == Node::Infer && b.op_opt(0).is_none());
    let (winner, loser) = if a.rank() >= b.rank() { (a, b) } else { (b, a) };
    if a.rank() == b.rank() {
        winner.bump_rank();
    }
    loser.resolve_to(winner);
    winner
}

/// A single comparison run. Transient: the binder correspondence and the
/// coinduction cache are only meaningful within one top-level query.
pub struct Check<'c, 'w> {
    world: &'c World<'w>,
    /// Correspondence between nominals met on the left and on the right.
    binders: HashMap<*const Def<'w>, DefRef<'w>>,
    /// Pairs assumed equal while their bodies are being compared.
    done: HashSet<(u32, u32)>,
}

impl<'c, 'w> Check<'c, 'w> {
    pub fn new(world: &'c World<'w>) -> Self {
        Self {
            world,
            binders: HashMap::new(),
            done: HashSet::new(),
        }
    }

    /// Alpha-equivalence, resolving holes as needed.
    pub fn alpha(&mut self, a: DefRef<'w>, b: DefRef<'w>) -> bool {
        self.alpha_(true, a, b)
    }

    /// Alpha-equivalence without touching holes.
    pub fn alpha_strict(&mut self, a: DefRef<'w>, b: DefRef<'w>) -> bool {
        self.alpha_(false, a, b)
    }

    fn alpha_(&mut self, infer: bool, a: DefRef<'w>, b: DefRef<'w>) -> bool {
        let a = find(a);
        let b = find(b);
        if ptr::eq(a, b) {
            return true;
        }

        match (a.node() == Node::Infer, b.node() == Node::Infer) {
            (true, true) if infer => {
                union(a, b);
                return true;
            }
            (true, false) if infer => {
                a.resolve_to(b);
                return true;
            }
            (false, true) if infer => {
                b.resolve_to(a);
                return true;
            }
            (false, false) => {}
            // strict mode: an open hole only equals itself
            _ => return false,
        }

        if a.is_nom() && b.is_nom() {
            return self.alpha_nom(infer, a, b);
        }

        if a.node() == Node::Var && b.node() == Node::Var {
            // bound vars match through the binder correspondence; free vars
            // are up to the caller, so infer mode lets them pass
            if let Some(&img) = self.binders.get(&(a.binder() as *const Def<'w>)) {
                return ptr::eq(img, b.binder());
            }
            return infer;
        }

        if a.is_nom() || b.is_nom() {
            return false;
        }

        if a.node() != b.node() || a.bits() != b.bits() || a.num_ops() != b.num_ops() {
            return false;
        }
        match (a.ty(), b.ty()) {
            (Some(at), Some(bt)) => {
                if !self.alpha_(infer, at, bt) {
                    return false;
                }
            }
            (None, None) => {}
            _ => return false,
        }
        for i in 0..a.num_ops() {
            if !self.alpha_(infer, a.op(i), b.op(i)) {
                return false;
            }
        }
        true
    }

    fn alpha_nom(&mut self, infer: bool, a: DefRef<'w>, b: DefRef<'w>) -> bool {
        if a.node() != b.node() || a.num_ops() != b.num_ops() {
            return false;
        }
        // assume the pair equal while comparing the bodies
        if !self.done.insert((a.gid(), b.gid())) {
            return true;
        }
        match self.binders.insert(a as *const Def<'w>, b) {
            Some(prev) if !ptr::eq(prev, b) => return false,
            _ => {}
        }
        match (a.ty(), b.ty()) {
            (Some(at), Some(bt)) => {
                if !self.alpha_(infer, at, bt) {
                    return false;
                }
            }
            (None, None) => {}
            _ => return false,
        }
        for i in 0..a.num_ops() {
            match (a.op_opt(i), b.op_opt(i)) {
                (Some(ao), Some(bo)) => {
                    if !self.alpha_(infer, ao, bo) {
                        return false;
                    }
                }
                (None, None) => {}
                _ => return false,
            }
        }
        true
    }

    /// Can `value` be assigned to `ty`? Alpha-equivalence of the types first;
    /// failing that, aggregates are checked member by member, substituting
    /// the value into dependent members.
    pub fn assignable(&mut self, ty: DefRef<'w>, value: DefRef<'w>) -> bool {
        let ty = find(ty);
        let vty = match value.ty() {
            Some(t) => find(t),
            None => return false,
        };
        if self.alpha_(true, ty, vty) {
            return true;
        }

        match ty.node() {
            Node::Sigma => {
                if ty.is_nom() && !ty.is_set() {
                    return false;
                }
                let arity = self.world.arity_of(ty);
                if !self.alpha_(true, arity, self.world.arity_of(vty)) {
                    return false;
                }
                for i in 0..ty.num_ops() {
                    let elem = match self.world.extract_at(value, i as u64) {
                        Ok(e) => e,
                        Err(_) => return false,
                    };
                    let member = if ty.is_nom() {
                        // later members may depend on earlier elements
                        match self.world.reduce_with(ty.op(i), ty, value) {
                            Ok(m) => m,
                            Err(_) => return false,
                        }
                    } else {
                        ty.op(i)
                    };
                    if !self.assignable(member, elem) {
                        return false;
                    }
                }
                true
            }
            Node::Arr => {
                let n = match ty.shape().isa_lit() {
                    Some(n) => n,
                    None => return false,
                };
                if !self.alpha_(true, ty.shape(), self.world.arity_of(vty)) {
                    return false;
                }
                let body = ty.op(1);
                for i in 0..n {
                    let elem = match self.world.extract_at(value, i) {
                        Ok(e) => e,
                        Err(_) => return false,
                    };
                    if !self.assignable(body, elem) {
                        return false;
                    }
                }
                true
            }
            _ => false,
        }
    }

    /// The common representative of `defs`, if they are all strictly
    /// alpha-equivalent. `None` for an empty sequence.
    pub fn is_uniform(
        &mut self,
        defs: impl IntoIterator<Item = DefRef<'w>>,
    ) -> Option<DefRef<'w>> {
        let mut it = defs.into_iter();
        let first = it.next()?;
        for d in it {
            if !self.alpha_(false, first, d) {
                return None;
            }
        }
        Some(first)
    }
}

#[cfg(test)]
mod tests {
    use bumpalo::Bump;
    use pretty_assertions::assert_eq;

    use super::find;
    use crate::def::Node;
    use crate::world::World;

    #[test]
    fn nominal_pis_compare_up_to_their_binders() {
        let arena = Bump::new();
        let w = World::new(&arena);

        let make = || {
            let pi = w.nom_pi(w.nat());
            let codom = w.idx(w.var(pi)).unwrap();
            pi.set_codom(codom);
            pi
        };
        let p = make();
        let q = make();

        assert!(!core::ptr::eq(p, q));
        assert!(w.alpha(p, q));
        assert!(w.alpha_strict(p, q));
        // same domain, non-dependent codomain: different function type
        let r = w.nom_pi(w.nat());
        r.set_codom(w.nat());
        assert!(!w.alpha(p, r));
    }

    #[test]
    fn holes_union_and_resolve() {
        let arena = Bump::new();
        let w = World::new(&arena);

        let h1 = w.infer(w.star());
        let h2 = w.infer(w.star());
        assert!(w.alpha(h1, h2));

        // resolving one side resolves the whole class
        assert!(w.alpha(h1, w.nat()));
        assert!(core::ptr::eq(find(h1), w.nat()));
        assert!(core::ptr::eq(find(h2), w.nat()));

        // and the resolution is permanent: no match against another type
        assert!(!w.alpha(h2, w.type_bool()));
    }

    #[test]
    fn strict_mode_leaves_holes_open() {
        let arena = Bump::new();
        let w = World::new(&arena);

        let h = w.infer(w.star());
        assert!(!w.alpha_strict(h, w.nat()));
        assert_eq!(find(h).node(), Node::Infer);
        assert!(w.alpha_strict(h, h));
    }

    #[test]
    fn assignable_walks_dependent_sigma_members() {
        let arena = Bump::new();
        let w = World::new(&arena);

        // Σ(T: *, x: T)
        let sigma = w.nom_sigma(1, 2);
        let var = w.var(sigma);
        sigma.set_op(0, w.star());
        sigma.set_op(1, w.extract_at(var, 0).unwrap());

        let good = w.tuple(&[w.nat(), w.lit_nat(42)]).unwrap();
        assert!(w.assignable(sigma, good));

        let bad = w.tuple(&[w.type_bool(), w.lit_nat(42)]).unwrap();
        assert!(!w.assignable(sigma, bad));
    }

    #[test]
    fn assignable_checks_array_elements() {
        let arena = Bump::new();
        let w = World::new(&arena);

        let arr = w.arr(w.lit_nat(3), w.nat()).unwrap();
        let ones = w.pack(w.lit_nat(3), w.lit_nat(1)).unwrap();
        assert!(w.assignable(arr, ones));
        assert!(!w.assignable(arr, w.lit_nat(1)));
    }

    #[test]
    fn is_uniform_returns_the_common_representative() {
        let arena = Bump::new();
        let w = World::new(&arena);

        let f = w.axiom(w.pi(w.nat(), w.nat()), 1, None, "f");
        assert!(w.is_uniform([f, f, f]).is_some());
        let g = w.axiom(w.pi(w.nat(), w.nat()), 1, None, "g");
        assert!(w.is_uniform([f, g]).is_none());
        assert!(w.is_uniform([]).is_none());
    }
}

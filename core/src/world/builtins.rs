//! Builtin axioms: nat arithmetic, nat comparison, and `bitcast`.
//!
//! Each axiom is registered lazily on first use and cached, so every lookup
//! within one world returns the same def. Their normalizers fold literal
//! operands and the usual algebraic identities at construction time.

use core::cell::Cell;
use core::ptr;

use crate::def::DefRef;
use crate::world::World;

pub(crate) struct Builtins<'w> {
    nat_add: Cell<Option<DefRef<'w>>>,
    nat_sub: Cell<Option<DefRef<'w>>>,
    nat_mul: Cell<Option<DefRef<'w>>>,
    nat_eq: Cell<Option<DefRef<'w>>>,
    bitcast: Cell<Option<DefRef<'w>>>,
}

impl<'w> Builtins<'w> {
    pub(crate) fn new() -> Self {
        Self {
            nat_add: Cell::new(None),
            nat_sub: Cell::new(None),
            nat_mul: Cell::new(None),
            nat_eq: Cell::new(None),
            bitcast: Cell::new(None),
        }
    }
}

impl<'w> World<'w> {
    fn cached(
        &self,
        cell: &Cell<Option<DefRef<'w>>>,
        make: impl FnOnce(&Self) -> DefRef<'w>,
    ) -> DefRef<'w> {
        if let Some(def) = cell.get() {
            return def;
        }
        let def = make(self);
        cell.set(Some(def));
        def
    }

    fn nat_binop_ty(&self) -> DefRef<'w> {
        let nat = self.nat();
        self.pi(nat, self.pi(nat, nat))
    }

    /// `%nat_add : Π nat. Π nat. nat`
    pub fn ax_nat_add(&self) -> DefRef<'w> {
        self.cached(&self.builtins.nat_add, |w| {
            w.axiom(w.nat_binop_ty(), 2, Some(normalize_nat_add), "nat_add")
        })
    }

    /// `%nat_sub : Π nat. Π nat. nat` — wraps on underflow.
    pub fn ax_nat_sub(&self) -> DefRef<'w> {
        self.cached(&self.builtins.nat_sub, |w| {
            w.axiom(w.nat_binop_ty(), 2, Some(normalize_nat_sub), "nat_sub")
        })
    }

    /// `%nat_mul : Π nat. Π nat. nat`
    pub fn ax_nat_mul(&self) -> DefRef<'w> {
        self.cached(&self.builtins.nat_mul, |w| {
            w.axiom(w.nat_binop_ty(), 2, Some(normalize_nat_mul), "nat_mul")
        })
    }

    /// `%nat_eq : Π nat. Π nat. Idx 2`
    pub fn ax_nat_eq(&self) -> DefRef<'w> {
        self.cached(&self.builtins.nat_eq, |w| {
            let nat = w.nat();
            let ty = w.pi(nat, w.pi(nat, w.type_bool()));
            w.axiom(ty, 2, Some(normalize_nat_eq), "nat_eq")
        })
    }

    /// `%bitcast : Π T: *. Π S: *. Π S. T`
    pub fn ax_bitcast(&self) -> DefRef<'w> {
        self.cached(&self.builtins.bitcast, |w| {
            let outer = w.nom_pi(w.star());
            let t = w.var(outer);
            let inner = w.nom_pi(w.star());
            let s = w.var(inner);
            inner.set_codom(w.pi(s, t));
            outer.set_codom(inner);
            w.axiom(outer, 3, Some(normalize_bitcast), "bitcast")
        })
    }
}

fn normalize_nat_add<'w>(
    world: &World<'w>,
    _ty: DefRef<'w>,
    callee: DefRef<'w>,
    b: DefRef<'w>,
) -> Option<DefRef<'w>> {
    let a = callee.arg();
    match (a.isa_lit(), b.isa_lit()) {
        (Some(x), Some(y)) => Some(world.lit_nat(x.wrapping_add(y))),
        (Some(0), _) => Some(b),
        (_, Some(0)) => Some(a),
        _ => None,
    }
}

fn normalize_nat_sub<'w>(
    world: &World<'w>,
    _ty: DefRef<'w>,
    callee: DefRef<'w>,
    b: DefRef<'w>,
) -> Option<DefRef<'w>> {
    let a = callee.arg();
    if ptr::eq(a, b) {
        return Some(world.lit_nat(0));
    }
    match (a.isa_lit(), b.isa_lit()) {
        (Some(x), Some(y)) => Some(world.lit_nat(x.wrapping_sub(y))),
        (_, Some(0)) => Some(a),
        _ => None,
    }
}

fn normalize_nat_mul<'w>(
    world: &World<'w>,
    _ty: DefRef<'w>,
    callee: DefRef<'w>,
    b: DefRef<'w>,
) -> Option<DefRef<'w>> {
    let a = callee.arg();
    match (a.isa_lit(), b.isa_lit()) {
        (Some(x), Some(y)) => Some(world.lit_nat(x.wrapping_mul(y))),
        (Some(0), _) | (_, Some(0)) => Some(world.lit_nat(0)),
        (Some(1), _) => Some(b),
        (_, Some(1)) => Some(a),
        _ => None,
    }
}

fn normalize_nat_eq<'w>(
    world: &World<'w>,
    _ty: DefRef<'w>,
    callee: DefRef<'w>,
    b: DefRef<'w>,
) -> Option<DefRef<'w>> {
    let a = callee.arg();
    if ptr::eq(a, b) {
        return Some(world.lit_bool(true));
    }
    match (a.isa_lit(), b.isa_lit()) {
        (Some(x), Some(y)) => Some(world.lit_bool(x == y)),
        _ => None,
    }
}

/// `ty` is the reduced target type of the cast. Same-type casts vanish and
/// literals are re-typed directly, which also re-checks their range.
fn normalize_bitcast<'w>(
    world: &World<'w>,
    ty: DefRef<'w>,
    callee: DefRef<'w>,
    x: DefRef<'w>,
) -> Option<DefRef<'w>> {
    let src = callee.arg();
    if world.alpha(ty, src) {
        return Some(x);
    }
    if let Some(bits) = x.isa_lit() {
        return world.lit(ty, bits).ok();
    }
    None
}

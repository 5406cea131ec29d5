//! The world: arena, uniquing table, and the construction facade.
//!
//! All defs are created through the methods here, never directly. Each
//! constructor runs its validity checks, then a fixed battery of local
//! rewrites (constant folding, extract/insert cancellation, eta for tuples,
//! degenerate arities), then axiom normalization for fully curried
//! applications, and finally falls through to [`World::unify`], which
//! returns the canonical instance for structurally equal nodes.

use core::cell::{Cell, RefCell};
use core::hash::{Hash, Hasher};
use core::ptr;

use bumpalo::Bump;
use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::check::{self, Check};
use crate::def::{Def, DefFlags, DefRef, Node, Normalizer};
use crate::{String, Vec, format};

mod builtins;
mod error;

#[cfg(test)]
mod world_test;

use builtins::Builtins;
pub use error::{Error, Result};

/// Structural identity of a def: kind, type pointer, operand pointers, and
/// the payload bits. Operand lists compare positionally; sub-operands are
/// already unified, so pointer equality suffices.
struct DefKey<'w> {
    node: Node,
    ty: Option<DefRef<'w>>,
    bits: u64,
    ops: SmallVec<[DefRef<'w>; 4]>,
}

fn addr(def: DefRef<'_>) -> usize {
    def as *const Def<'_> as usize
}

impl PartialEq for DefKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
            && self.bits == other.bits
            && self.ty.map(addr) == other.ty.map(addr)
            && self.ops.len() == other.ops.len()
            && self.ops.iter().zip(&other.ops).all(|(a, b)| ptr::eq(*a, *b))
    }
}

impl Eq for DefKey<'_> {}

impl Hash for DefKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
        self.bits.hash(state);
        self.ty.map(addr).unwrap_or(0).hash(state);
        for op in &self.ops {
            addr(op).hash(state);
        }
    }
}

/// Owner of the term graph: the arena, the uniquing table, symbol interning,
/// the gid counter, and the cache of builtin axioms. One world per
/// compilation unit; every def it creates dies with it.
pub struct World<'w> {
    arena: &'w Bump,
    interned: RefCell<HashMap<DefKey<'w>, DefRef<'w>>>,
    syms: RefCell<HashMap<&'w str, &'w str>>,
    /// All defs in gid order, for debug lookup.
    defs: RefCell<Vec<DefRef<'w>>>,
    next_gid: Cell<u32>,
    next_axiom: Cell<u32>,
    builtins: Builtins<'w>,
}

fn render(def: DefRef<'_>) -> String {
    format!("{}", def)
}

impl<'w> World<'w> {
    pub fn new(arena: &'w Bump) -> Self {
        Self {
            arena,
            interned: RefCell::new(HashMap::new()),
            syms: RefCell::new(HashMap::new()),
            defs: RefCell::new(Vec::new()),
            next_gid: Cell::new(0),
            next_axiom: Cell::new(0),
            builtins: Builtins::new(),
        }
    }

    /// Intern a string in the world's arena.
    pub fn sym(&self, s: &str) -> &'w str {
        if let Some(&interned) = self.syms.borrow().get(s) {
            return interned;
        }
        let arena_str = self.arena.alloc_str(s);
        self.syms.borrow_mut().insert(arena_str, arena_str);
        arena_str
    }

    /*
     * allocation & uniquing
     */

    #[allow(clippy::too_many_arguments)]
    fn alloc_def(
        &self,
        node: Node,
        ty: Option<DefRef<'w>>,
        slots: &'w [Cell<Option<DefRef<'w>>>],
        bits: u64,
        curry: u8,
        normalizer: Option<Normalizer<'w>>,
        flags: DefFlags,
        name: Option<&'w str>,
    ) -> DefRef<'w> {
        let gid = self.next_gid.get();
        self.next_gid
            .set(gid.checked_add(1).expect("gid overflowed"));
        let def: DefRef<'w> = self.arena.alloc(Def {
            gid,
            node,
            ty,
            ops: slots,
            bits: Cell::new(bits),
            curry,
            normalizer,
            flags: Cell::new(flags),
            name: Cell::new(name),
        });
        self.defs.borrow_mut().push(def);
        def
    }

    /// Allocate a fresh nominal with `arity` unfilled operand slots.
    /// Never consults the uniquing table: nominal identity is the allocation.
    pub(crate) fn new_nom(
        &self,
        node: Node,
        ty: Option<DefRef<'w>>,
        arity: usize,
        name: Option<&'w str>,
    ) -> DefRef<'w> {
        let slots = self.arena.alloc_slice_fill_with(arity, |_| Cell::new(None));
        let mut flags = DefFlags::NOM;
        if arity == 0 {
            flags |= DefFlags::SET;
        }
        if node == Node::Infer {
            flags |= DefFlags::HAS_INFER;
        }
        tracing::trace!(?node, "new nominal");
        self.alloc_def(node, ty, slots, 0, 0, None, flags, name)
    }

    /// Canonicalize a structural node: return the existing instance for this
    /// `(node, ty, ops, bits)` or allocate, insert, and return a new one.
    pub(crate) fn unify(
        &self,
        node: Node,
        ty: Option<DefRef<'w>>,
        ops: &[DefRef<'w>],
        bits: u64,
    ) -> DefRef<'w> {
        let key = DefKey {
            node,
            ty,
            bits,
            ops: SmallVec::from_slice(ops),
        };
        if let Some(&def) = self.interned.borrow().get(&key) {
            tracing::trace!(gid = def.gid(), ?node, "unify hit");
            return def;
        }

        let mut flags = DefFlags::SET;
        if ty.is_some_and(|t| t.has_infer()) || ops.iter().any(|op| op.has_infer()) {
            flags |= DefFlags::HAS_INFER;
        }
        let slots = self
            .arena
            .alloc_slice_fill_iter(ops.iter().map(|&op| Cell::new(Some(op))));
        let def = self.alloc_def(node, ty, slots, bits, 0, None, flags, None);
        tracing::trace!(gid = def.gid(), ?node, "unify insert");
        self.interned.borrow_mut().insert(key, def);
        def
    }

    /// A fresh, empty copy of a nominal with a (possibly rewritten) type.
    pub(crate) fn stub(&self, nom: DefRef<'w>, ty: DefRef<'w>) -> DefRef<'w> {
        debug_assert!(nom.is_nom());
        self.new_nom(nom.node(), Some(ty), nom.num_ops(), nom.name())
    }

    /*
     * universes & base types
     */

    /// The universe of levels; the only def without a type.
    pub fn univ(&self) -> DefRef<'w> {
        self.unify(Node::Univ, None, &[], 0)
    }

    pub fn lit_univ(&self, level: u64) -> DefRef<'w> {
        self.unify(Node::Lit, Some(self.univ()), &[], level)
    }

    /// `Type level`. The level must be of type `□`.
    pub fn type_at(&self, level: DefRef<'w>) -> Result<DefRef<'w>> {
        match level.ty() {
            Some(t) if t.node() == Node::Univ => {}
            _ => {
                return Err(Error::BadLevel {
                    level: render(level),
                    gid: level.gid(),
                });
            }
        }
        Ok(self.unify(Node::Type, Some(self.univ()), &[level], 0))
    }

    /// `Type l` for a literal level.
    pub fn kind(&self, level: u64) -> DefRef<'w> {
        self.unify(Node::Type, Some(self.univ()), &[self.lit_univ(level)], 0)
    }

    /// The kind of simple types, `Type 0`.
    pub fn star(&self) -> DefRef<'w> {
        self.kind(0)
    }

    pub fn nat(&self) -> DefRef<'w> {
        self.unify(Node::Nat, Some(self.star()), &[], 0)
    }

    /// Bounded integer type `Idx size`; the size must be of type `nat`.
    pub fn idx(&self, size: DefRef<'w>) -> Result<DefRef<'w>> {
        match size.ty() {
            Some(t) if t.node() == Node::Nat => Ok(self.idx_raw(size)),
            _ => Err(Error::BadSize {
                size: render(size),
                gid: size.gid(),
            }),
        }
    }

    fn idx_raw(&self, size: DefRef<'w>) -> DefRef<'w> {
        self.unify(Node::Idx, Some(self.star()), &[size], 0)
    }

    /// `Idx 2`, doubling as the type of booleans.
    pub fn type_bool(&self) -> DefRef<'w> {
        self.idx_raw(self.lit_nat(2))
    }

    /*
     * literals
     */

    /// A literal of the given type. Literals of `Idx` type are range-checked
    /// against the size when it is known; `0` fits any size.
    pub fn lit(&self, ty: DefRef<'w>, value: u64) -> Result<DefRef<'w>> {
        if ty.node() == Node::Idx {
            let size = ty.op(0);
            match size.isa_lit() {
                Some(s) if s != 0 && value >= s => {
                    return Err(Error::OutOfRange {
                        value,
                        size: render(size),
                        gid: ty.gid(),
                    });
                }
                None if value != 0 => {
                    return Err(Error::UnknownSize {
                        value,
                        size: render(size),
                        gid: ty.gid(),
                    });
                }
                _ => {}
            }
        }
        Ok(self.unify(Node::Lit, Some(ty), &[], value))
    }

    pub fn lit_nat(&self, value: u64) -> DefRef<'w> {
        self.unify(Node::Lit, Some(self.nat()), &[], value)
    }

    /// A literal of type `Idx size`.
    pub fn lit_idx(&self, size: u64, value: u64) -> Result<DefRef<'w>> {
        self.lit(self.idx_raw(self.lit_nat(size)), value)
    }

    pub fn lit_bool(&self, value: bool) -> DefRef<'w> {
        self.unify(Node::Lit, Some(self.type_bool()), &[], value as u64)
    }

    /// A string as a tuple of nat literals.
    pub fn tuple_str(&self, s: &str) -> Result<DefRef<'w>> {
        let ops: Vec<DefRef<'w>> = s.bytes().map(|b| self.lit_nat(b as u64)).collect();
        self.tuple(&ops)
    }

    /*
     * functions
     */

    /// Structural (non-dependent) function type.
    pub fn pi(&self, dom: DefRef<'w>, codom: DefRef<'w>) -> DefRef<'w> {
        let level = self.level_of(dom).max(self.level_of(codom));
        self.unify(Node::Pi, Some(self.kind(level)), &[dom, codom], 0)
    }

    /// Nominal function type whose codomain may mention `var(pi)`.
    /// Complete it with `pi.set_codom(codom)`.
    pub fn nom_pi(&self, dom: DefRef<'w>) -> DefRef<'w> {
        let pi = self.new_nom(Node::Pi, Some(self.kind(self.level_of(dom))), 2, None);
        pi.set_op(0, dom);
        pi
    }

    /// Fresh continuation of the given pi type; fill the body with
    /// `lam.set_body(body)`.
    pub fn nom_lam(&self, pi: DefRef<'w>, name: &str) -> DefRef<'w> {
        debug_assert_eq!(pi.node(), Node::Pi);
        self.new_nom(Node::Lam, Some(pi), 1, Some(self.sym(name)))
    }

    /// The variable bound by a nominal lam, pi, or sigma.
    pub fn var(&self, nom: DefRef<'w>) -> DefRef<'w> {
        debug_assert!(nom.is_nom());
        let ty = match nom.node() {
            Node::Lam => nom.ty().expect("lam without a type").dom(),
            Node::Pi => nom.op(0),
            Node::Sigma => nom,
            _ => unreachable!("var of a non-binding nominal"),
        };
        self.unify(Node::Var, Some(ty), &[nom], 0)
    }

    /// Apply `callee` to `arg`: checks the domain, reduces a dependent
    /// codomain against the concrete argument, and runs the axiom normalizer
    /// when the callee's currying is exhausted.
    pub fn app(&self, callee: DefRef<'w>, arg: DefRef<'w>) -> Result<DefRef<'w>> {
        let not_callable = || Error::NotCallable {
            callee: render(callee),
            ty: callee.ty().map(render).unwrap_or_else(|| render(callee)),
            gid: callee.gid(),
        };
        let cty = check::find(callee.ty().ok_or_else(|| not_callable())?);
        let pi = match cty.node() {
            Node::Pi => cty,
            // (f, g)#i where every tuple entry has the same function type
            Node::Extract if cty.op(0).node() == Node::Tuple => {
                match self.is_uniform(cty.op(0).ops()) {
                    Some(uni) if uni.node() == Node::Pi => uni,
                    _ => return Err(not_callable()),
                }
            }
            _ => return Err(not_callable()),
        };

        if !self.assignable(pi.dom(), arg) {
            return Err(Error::NotAssignable {
                arg: render(arg),
                arg_ty: arg.ty().map(render).unwrap_or_default(),
                callee: render(callee),
                dom: render(pi.dom()),
                gid: arg.gid(),
            });
        }

        let ty = self.reduce_pi(pi, arg)?;

        if let Some((axiom, remaining)) = axiom_spine(callee) {
            if remaining == 1 {
                if let Some(normalize) = axiom.normalizer() {
                    if let Some(folded) = normalize(self, ty, callee, arg) {
                        tracing::debug!(axiom = %axiom, "normalizer fired");
                        return Ok(folded);
                    }
                }
            }
        }

        Ok(self.unify(Node::App, Some(ty), &[callee, arg], 0))
    }

    /// Left-fold of [`app`](Self::app) over a curried argument list.
    pub fn app_args(&self, callee: DefRef<'w>, args: &[DefRef<'w>]) -> Result<DefRef<'w>> {
        let mut acc = callee;
        for &arg in args {
            acc = self.app(acc, arg)?;
        }
        Ok(acc)
    }

    /// Register an axiom: a primitive operation with a currying depth and an
    /// optional normalizer. Every registration is a fresh def.
    pub fn axiom(
        &self,
        ty: DefRef<'w>,
        curry: u8,
        normalizer: Option<Normalizer<'w>>,
        name: &str,
    ) -> DefRef<'w> {
        let id = self.next_axiom.get();
        self.next_axiom
            .set(id.checked_add(1).expect("axiom id overflowed"));
        let slots: &'w [Cell<Option<DefRef<'w>>>] = self.arena.alloc_slice_fill_with(0, |_| Cell::new(None));
        tracing::debug!(name, curry, "register axiom");
        self.alloc_def(
            Node::Axiom,
            Some(ty),
            slots,
            id as u64,
            curry,
            normalizer,
            DefFlags::SET,
            Some(self.sym(name)),
        )
    }

    /// An unresolved inference hole of the given type.
    pub fn infer(&self, ty: DefRef<'w>) -> DefRef<'w> {
        self.new_nom(Node::Infer, Some(ty), 1, None)
    }

    /*
     * aggregates
     */

    /// The empty product type.
    pub fn unit(&self) -> DefRef<'w> {
        self.unify(Node::Sigma, Some(self.star()), &[], 0)
    }

    /// Product type. Degenerates: 0-ary to [`unit`](Self::unit), 1-ary to the
    /// sole member, all-equal members to an array.
    pub fn sigma(&self, ops: &[DefRef<'w>]) -> Result<DefRef<'w>> {
        match ops {
            [] => Ok(self.unit()),
            [op] => Ok(*op),
            [front, rest @ ..] => {
                if rest.iter().all(|op| ptr::eq(*op, *front)) {
                    return self.arr(self.lit_nat(ops.len() as u64), *front);
                }
                let level = self.max_level(ops.iter().copied());
                Ok(self.unify(Node::Sigma, Some(self.kind(level)), ops, 0))
            }
        }
    }

    /// Nominal product type, for recursive or dependent products; fill the
    /// members with `set_op`, mentioning `var(sigma)` for dependencies.
    pub fn nom_sigma(&self, level: u64, arity: usize) -> DefRef<'w> {
        self.new_nom(Node::Sigma, Some(self.kind(level)), arity, None)
    }

    /// Product value with an inferred sigma type.
    pub fn tuple(&self, ops: &[DefRef<'w>]) -> Result<DefRef<'w>> {
        if ops.len() == 1 {
            return Ok(ops[0]);
        }
        let types: SmallVec<[DefRef<'w>; 4]> = ops
            .iter()
            .map(|op| op.ty().expect("term without a type"))
            .collect();
        let sigma = self.sigma(&types)?;
        let tuple = self.tuple_of(sigma, ops)?;
        if !self.assignable(sigma, tuple) {
            return Err(Error::BadTuple {
                tuple: render(tuple),
                ty: render(sigma),
                gid: tuple.gid(),
            });
        }
        Ok(tuple)
    }

    /// Product value of a given (possibly nominal) sigma type.
    pub fn tuple_of(&self, ty: DefRef<'w>, ops: &[DefRef<'w>]) -> Result<DefRef<'w>> {
        let n = ops.len();
        let nom_sigma = ty.node() == Node::Sigma && ty.is_nom();
        if !nom_sigma {
            if n == 0 {
                return Ok(self.unify(Node::Tuple, Some(self.unit()), &[], 0));
            }
            if n == 1 {
                return Ok(ops[0]);
            }
            let front = ops[0];
            if ops[1..].iter().all(|op| ptr::eq(*op, front)) {
                return self.pack(self.lit_nat(n as u64), front);
            }
        }

        // eta: (extract(t, 0), extract(t, 1), ..., extract(t, n-1)) -> t
        if n != 0 && ops[0].node() == Node::Extract {
            let tup = ops[0].op(0);
            let mut eta = tup.ty().is_some_and(|t| ptr::eq(t, ty));
            if eta {
                for (i, op) in ops.iter().enumerate() {
                    if op.node() != Node::Extract
                        || !ptr::eq(op.op(0), tup)
                        || op.index().isa_lit() != Some(i as u64)
                    {
                        eta = false;
                        break;
                    }
                }
            }
            if eta {
                return Ok(tup);
            }
        }

        Ok(self.unify(Node::Tuple, Some(ty), ops, 0))
    }

    /// The arity of an aggregate type, as a nat.
    pub(crate) fn arity_of(&self, ty: DefRef<'w>) -> DefRef<'w> {
        match ty.node() {
            Node::Sigma => self.lit_nat(ty.num_ops() as u64),
            Node::Arr => ty.op(0),
            _ => self.lit_nat(1),
        }
    }

    /// Extract the element of `d` at `index`. The index's `Idx` size must
    /// match the arity of `d`'s type.
    pub fn extract(&self, d: DefRef<'w>, index: DefRef<'w>) -> Result<DefRef<'w>> {
        let dty = check::find(d.ty().expect("term without a type"));
        let size = match index.ty() {
            Some(t) if t.node() == Node::Idx => t.op(0),
            _ => {
                return Err(Error::BadIndex {
                    index: render(index),
                    arity: render(self.arity_of(dty)),
                    gid: index.gid(),
                });
            }
        };
        let arity = self.arity_of(dty);
        if !self.alpha(arity, size) {
            return Err(Error::BadIndex {
                index: render(index),
                arity: render(arity),
                gid: index.gid(),
            });
        }

        let nom_sigma = dty.node() == Node::Sigma && dty.is_nom();
        // 1-ary aggregates are their own sole element (nominal sigmas can
        // be genuine 1-tuples, so they keep the extract)
        if size.isa_lit() == Some(1) && !nom_sigma {
            return Ok(d);
        }
        if d.node() == Node::Pack && !d.is_nom() {
            return Ok(d.body());
        }
        // extract(insert(x, index, v), index) -> v
        if d.node() == Node::Insert && ptr::eq(d.index(), index) {
            return Ok(d.value());
        }

        if let Some(i) = index.isa_lit() {
            if d.node() == Node::Tuple {
                return Ok(d.op(i as usize));
            }
            // extract(insert(x, j, v), i) -> extract(x, i), i != j by the rule above
            if d.node() == Node::Insert && d.index().isa_lit().is_some() {
                return self.extract(d.op(0), index);
            }
            if dty.node() == Node::Sigma {
                let member = dty.op(i as usize);
                let elem_ty = if nom_sigma {
                    // later members may depend on earlier ones through the var
                    self.reduce_with(member, dty, d)?
                } else {
                    member
                };
                return Ok(self.unify(Node::Extract, Some(elem_ty), &[d, index], 0));
            }
        }

        let elem_ty = match dty.node() {
            Node::Arr => dty.op(1),
            Node::Sigma => {
                // symbolic index into a sigma: the type is the extract of the
                // member tuple at the same index
                let members: SmallVec<[DefRef<'w>; 4]> = dty.ops().collect();
                let tup = self.tuple(&members)?;
                self.extract(tup, index)?
            }
            _ => unreachable!("arity matched a non-aggregate type"),
        };
        Ok(self.unify(Node::Extract, Some(elem_ty), &[d, index], 0))
    }

    /// [`extract`](Self::extract) with a plain integer index; the `Idx`
    /// literal is built against the aggregate's literal arity.
    pub fn extract_at(&self, d: DefRef<'w>, i: u64) -> Result<DefRef<'w>> {
        let dty = check::find(d.ty().expect("term without a type"));
        let arity = self.arity_of(dty);
        let n = arity.isa_lit().ok_or_else(|| Error::BadIndex {
            index: format!("{}", i),
            arity: render(arity),
            gid: d.gid(),
        })?;
        self.extract(d, self.lit_idx(n, i)?)
    }

    /// Replace the element of `d` at `index` with `value`.
    pub fn insert(
        &self,
        d: DefRef<'w>,
        index: DefRef<'w>,
        value: DefRef<'w>,
    ) -> Result<DefRef<'w>> {
        let dty = check::find(d.ty().expect("term without a type"));
        let size = match index.ty() {
            Some(t) if t.node() == Node::Idx => t.op(0),
            _ => {
                return Err(Error::BadIndex {
                    index: render(index),
                    arity: render(self.arity_of(dty)),
                    gid: index.gid(),
                });
            }
        };
        let arity = self.arity_of(dty);
        if !self.alpha(arity, size) {
            return Err(Error::BadIndex {
                index: render(index),
                arity: render(arity),
                gid: index.gid(),
            });
        }

        let nom_sigma = dty.node() == Node::Sigma && dty.is_nom();
        // replacing the sole element replaces the aggregate
        if size.isa_lit() == Some(1) && !nom_sigma {
            return Ok(value);
        }
        // insert((a, b, c), 1, x) -> (a, x, c)
        if d.node() == Node::Tuple {
            if let Some(i) = index.isa_lit() {
                let mut new_ops: SmallVec<[DefRef<'w>; 4]> = d.ops().collect();
                new_ops[i as usize] = value;
                return self.tuple_of(dty, &new_ops);
            }
        }
        // insert(<4; x>, 2, y) -> (x, x, y, x)
        if d.node() == Node::Pack && !d.is_nom() {
            if let (Some(a), Some(i)) = (d.shape().isa_lit(), index.isa_lit()) {
                let mut new_ops: SmallVec<[DefRef<'w>; 4]> =
                    (0..a).map(|_| d.body()).collect();
                new_ops[i as usize] = value;
                return self.tuple_of(dty, &new_ops);
            }
        }
        // insert(insert(x, index, y), index, v) -> insert(x, index, v)
        let mut d = d;
        if d.node() == Node::Insert && ptr::eq(d.index(), index) {
            d = d.op(0);
        }

        Ok(self.unify(Node::Insert, Some(dty), &[d, index, value], 0))
    }

    /// [`insert`](Self::insert) with a plain integer index.
    pub fn insert_at(&self, d: DefRef<'w>, i: u64, value: DefRef<'w>) -> Result<DefRef<'w>> {
        let dty = check::find(d.ty().expect("term without a type"));
        let arity = self.arity_of(dty);
        let n = arity.isa_lit().ok_or_else(|| Error::BadIndex {
            index: format!("{}", i),
            arity: render(arity),
            gid: d.gid(),
        })?;
        self.insert(d, self.lit_idx(n, i)?, value)
    }

    /// Is `ty` the type of a shape: `nat`, a product of `nat`s, or an array
    /// of `nat`s?
    fn is_shape(&self, ty: DefRef<'w>) -> bool {
        match ty.node() {
            Node::Nat => true,
            Node::Arr => ty.op(1).node() == Node::Nat,
            Node::Sigma if !ty.is_nom() => ty.ops().all(|op| op.node() == Node::Nat),
            _ => false,
        }
    }

    /// Homogeneous array type `«shape; body»`. Degenerates: shape 0 to
    /// [`unit`](Self::unit), shape 1 to the body; tuple shapes curry into
    /// nested arrays.
    pub fn arr(&self, shape: DefRef<'w>, body: DefRef<'w>) -> Result<DefRef<'w>> {
        let sty = shape.ty().expect("shape without a type");
        if !self.is_shape(sty) {
            return Err(Error::BadShape {
                shape: render(shape),
                ty: render(sty),
                gid: shape.gid(),
            });
        }

        if let Some(a) = shape.isa_lit() {
            if a == 0 {
                return Ok(self.unit());
            }
            if a == 1 {
                return Ok(body);
            }
        }
        // «(a, b, c); T» -> «a; «(b, c); T»»
        if shape.node() == Node::Tuple {
            let ops: SmallVec<[DefRef<'w>; 4]> = shape.ops().collect();
            let (front, rest) = ops.split_first().expect("tuple shape is non-empty");
            let tail = self.tuple(rest)?;
            let inner = self.arr(tail, body)?;
            return self.arr(*front, inner);
        }
        // «<n; x>; T» -> «x; «<n-1; x>; T»»
        if shape.node() == Node::Pack && !shape.is_nom() {
            if let Some(s) = shape.shape().isa_lit() {
                let shrunk = self.pack(self.lit_nat(s - 1), shape.body())?;
                let inner = self.arr(shrunk, body)?;
                return self.arr(shape.body(), inner);
            }
        }

        let level = self.level_of(body);
        Ok(self.unify(Node::Arr, Some(self.kind(level)), &[shape, body], 0))
    }

    /// Homogeneous array value `<shape; body>`; same degenerations as
    /// [`arr`](Self::arr).
    pub fn pack(&self, shape: DefRef<'w>, body: DefRef<'w>) -> Result<DefRef<'w>> {
        let sty = shape.ty().expect("shape without a type");
        if !self.is_shape(sty) {
            return Err(Error::BadShape {
                shape: render(shape),
                ty: render(sty),
                gid: shape.gid(),
            });
        }

        if let Some(a) = shape.isa_lit() {
            if a == 0 {
                return self.tuple(&[]);
            }
            if a == 1 {
                return Ok(body);
            }
        }
        // <(a, b, c); x> -> <a; <(b, c); x>>
        if shape.node() == Node::Tuple {
            let ops: SmallVec<[DefRef<'w>; 4]> = shape.ops().collect();
            let (front, rest) = ops.split_first().expect("tuple shape is non-empty");
            let tail = self.tuple(rest)?;
            let inner = self.pack(tail, body)?;
            return self.pack(*front, inner);
        }
        // <<n; a>; x> -> <a; <<n-1; a>; x>>
        if shape.node() == Node::Pack && !shape.is_nom() {
            if let Some(s) = shape.shape().isa_lit() {
                let shrunk = self.pack(self.lit_nat(s - 1), shape.body())?;
                let inner = self.pack(shrunk, body)?;
                return self.pack(shape.body(), inner);
            }
        }

        let ty = self.arr(shape, body.ty().expect("term without a type"))?;
        Ok(self.unify(Node::Pack, Some(ty), &[body], 0))
    }

    /*
     * unions
     */

    /// Union type over the given alternatives: gid-sorted, deduplicated,
    /// degenerate to the sole alternative.
    pub fn join(&self, ops: &[DefRef<'w>]) -> Result<DefRef<'w>> {
        if ops.is_empty() {
            return Err(Error::EmptyJoin);
        }
        let mut alts: SmallVec<[DefRef<'w>; 4]> = SmallVec::from_slice(ops);
        alts.sort_by_key(|d| d.gid());
        alts.dedup_by(|a, b| ptr::eq(*a, *b));
        if alts.len() == 1 {
            return Ok(alts[0]);
        }
        let level = self.max_level(alts.iter().copied());
        Ok(self.unify(Node::Join, Some(self.kind(level)), &alts, 0))
    }

    /// Inject a value into a union type. Identity when `ty` is not a join.
    pub fn vel(&self, ty: DefRef<'w>, value: DefRef<'w>) -> Result<DefRef<'w>> {
        if ty.node() != Node::Join {
            return Ok(value);
        }
        let vty = value.ty().expect("term without a type");
        if !ty.ops().any(|alt| self.alpha(alt, vty)) {
            return Err(Error::NotAnAlternative {
                ty: render(vty),
                join: render(ty),
                gid: value.gid(),
            });
        }
        Ok(self.unify(Node::Vel, Some(ty), &[value], 0))
    }

    /*
     * casts
     */

    /// Reinterpret `value` at type `dst` via the builtin `bitcast` axiom.
    /// Same-type casts and literal operands fold at construction time.
    pub fn bitcast(&self, dst: DefRef<'w>, value: DefRef<'w>) -> Result<DefRef<'w>> {
        let src = value.ty().expect("term without a type");
        let ax = self.ax_bitcast();
        let with_dst = self.app(ax, dst)?;
        let with_src = self.app(with_dst, src)?;
        self.app(with_src, value)
    }

    /*
     * levels
     */

    /// The universe level a def lives at: `Type l` is at `l + 1`, anything
    /// whose type is `Type l` is at `l`, terms default to 0.
    pub(crate) fn level_of(&self, def: DefRef<'w>) -> u64 {
        match def.node() {
            Node::Type => def.op(0).isa_lit().unwrap_or(0) + 1,
            _ => match def.ty() {
                Some(t) if t.node() == Node::Type => t.op(0).isa_lit().unwrap_or(0),
                _ => 0,
            },
        }
    }

    fn max_level(&self, ops: impl Iterator<Item = DefRef<'w>>) -> u64 {
        ops.map(|op| self.level_of(op)).max().unwrap_or(0)
    }

    /*
     * rebuilding (used by the rewrite engine)
     */

    /// Re-dispatch a def through the public constructors with new type and
    /// operands, so rewrites re-normalize and re-share.
    pub fn rebuild(
        &self,
        def: DefRef<'w>,
        ty: Option<DefRef<'w>>,
        ops: &[DefRef<'w>],
    ) -> Result<DefRef<'w>> {
        match def.node() {
            Node::Univ | Node::Nat | Node::Axiom | Node::Infer | Node::Lam => Ok(def),
            Node::Pi | Node::Sigma if def.is_nom() => Ok(def),
            Node::Lit => match (def.ty(), ty) {
                (Some(old), Some(new)) if !ptr::eq(old, new) => self.lit(new, def.bits()),
                _ => Ok(def),
            },
            Node::Type => self.type_at(ops[0]),
            Node::Idx => self.idx(ops[0]),
            Node::Pi => Ok(self.pi(ops[0], ops[1])),
            Node::Sigma => self.sigma(ops),
            Node::Var => Ok(self.var(ops[0])),
            Node::App => self.app(ops[0], ops[1]),
            Node::Tuple => self.tuple_of(ty.expect("tuple without a type"), ops),
            Node::Extract => self.extract(ops[0], ops[1]),
            Node::Insert => self.insert(ops[0], ops[1], ops[2]),
            Node::Arr => self.arr(ops[0], ops[1]),
            Node::Pack => match ty {
                Some(t) if t.node() == Node::Arr => self.pack(t.op(0), ops[0]),
                Some(t) if t.node() == Node::Sigma && t.num_ops() == 0 => self.tuple(&[]),
                _ => Ok(ops[0]),
            },
            Node::Join => self.join(ops),
            Node::Vel => self.vel(ty.expect("vel without a type"), ops[0]),
        }
    }

    /*
     * checking
     */

    /// Alpha-equivalence in inference mode: holes are resolved as a side
    /// effect.
    pub fn alpha(&self, a: DefRef<'w>, b: DefRef<'w>) -> bool {
        Check::new(self).alpha(a, b)
    }

    /// Alpha-equivalence in strict mode: holes are left untouched and
    /// distinct free variables differ.
    pub fn alpha_strict(&self, a: DefRef<'w>, b: DefRef<'w>) -> bool {
        Check::new(self).alpha_strict(a, b)
    }

    /// Can `value` be assigned to something of (possibly dependent) `ty`?
    pub fn assignable(&self, ty: DefRef<'w>, value: DefRef<'w>) -> bool {
        Check::new(self).assignable(ty, value)
    }

    /// The common representative of `defs` if they are all strictly
    /// alpha-equivalent.
    pub fn is_uniform(
        &self,
        defs: impl IntoIterator<Item = DefRef<'w>>,
    ) -> Option<DefRef<'w>> {
        Check::new(self).is_uniform(defs)
    }

    /*
     * debugging
     */

    /// Look a def up by its process-unique id.
    pub fn gid2def(&self, gid: u32) -> Option<DefRef<'w>> {
        let defs = self.defs.borrow();
        defs.binary_search_by_key(&gid, |d| d.gid())
            .ok()
            .map(|i| defs[i])
    }

    /// Number of defs this world has created.
    pub fn num_defs(&self) -> usize {
        self.defs.borrow().len()
    }
}

/// Walk an application spine down to its axiom, tracking the remaining
/// currying depth: the normalizer may fire when exactly one argument is
/// still missing before this application.
fn axiom_spine<'w>(def: DefRef<'w>) -> Option<(DefRef<'w>, u8)> {
    match def.node() {
        Node::Axiom => Some((def, def.curry())),
        Node::App => {
            let (axiom, remaining) = axiom_spine(def.op(0))?;
            Some((axiom, remaining.saturating_sub(1)))
        }
        _ => None,
    }
}

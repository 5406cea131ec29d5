//! The graph node model.
//!
//! Every IR entity is a [`Def`]: an arena-allocated, type-annotated node with
//! an ordered list of operand references. Structural defs are immutable after
//! creation and hash-consed by the [`World`](crate::world::World); nominal
//! defs (lambdas, recursive sigmas/pis, inference holes) have identity
//! independent of their content and fill their operand slots after creation,
//! which is how cyclic definitions are tied.

use core::cell::Cell;
use core::fmt;

use bitflags::bitflags;

use crate::world::World;

/// Shared reference to a node. All defs created by one world share its
/// arena lifetime and are compared by pointer identity.
pub type DefRef<'w> = &'w Def<'w>;

/// A normalizer attached to an axiom: inspects `(type, callee, arg)` once the
/// axiom's currying depth is exhausted and either folds the application to a
/// simpler def or returns `None` to leave it as a plain `App`.
pub type Normalizer<'w> =
    fn(&World<'w>, DefRef<'w>, DefRef<'w>, DefRef<'w>) -> Option<DefRef<'w>>;

/// Node-kind discriminator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Node {
    /// Universe of levels; the only def without a type.
    Univ,
    /// `Type l` — the kind of types at level `l`; op: `[level]`.
    Type,
    /// The type of sizes and nat literals.
    Nat,
    /// Bounded integer type; op: `[size]`. `Idx 2` doubles as bool.
    Idx,
    /// Function type; ops: `[dom, codom]`. Nominal pis bind a var so the
    /// codomain may depend on the domain value.
    Pi,
    /// Continuation/function. Always nominal; op: `[body]`.
    Lam,
    /// The variable bound by a nominal; op: `[binder]`.
    Var,
    /// Application; ops: `[callee, arg]`.
    App,
    /// Product type; ops are the member types. Nominal sigmas bind a var.
    Sigma,
    /// Product value; ops are the elements.
    Tuple,
    /// ops: `[tuple, index]`.
    Extract,
    /// ops: `[tuple, index, value]`.
    Insert,
    /// Homogeneous array type; ops: `[shape, body]`.
    Arr,
    /// Homogeneous array value; op: `[body]`, shape lives on the `Arr` type.
    Pack,
    /// Union type; ops are the alternatives, gid-sorted and deduplicated.
    Join,
    /// Injection into a union; op: `[value]`.
    Vel,
    /// Literal; the payload lives in `bits`.
    Lit,
    /// Primitive operation or constant; fresh on every registration,
    /// carries a currying depth and an optional normalizer.
    Axiom,
    /// Inference hole, resolved via union-find; op: `[solution]` once known.
    Infer,
}

bitflags! {
    /// Cached properties of a def, computed once at creation.
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct DefFlags: u8 {
        /// Identity independent of content; operand slots fill after creation.
        const NOM = 1;
        /// All operand slots are filled.
        const SET = 1 << 1;
        /// This def is, or transitively contains, an unresolved `Infer`.
        const HAS_INFER = 1 << 2;
    }
}

pub(crate) type OpSlots<'w> = &'w [Cell<Option<DefRef<'w>>>];

/// A single IR node. See the module docs for the structural/nominal split.
pub struct Def<'w> {
    pub(crate) gid: u32,
    pub(crate) node: Node,
    pub(crate) ty: Option<DefRef<'w>>,
    pub(crate) ops: OpSlots<'w>,
    /// Kind-specific payload: literal value, axiom id, union-find rank.
    /// Part of structural identity.
    pub(crate) bits: Cell<u64>,
    /// Remaining currying depth before an axiom's normalizer may fire.
    pub(crate) curry: u8,
    pub(crate) normalizer: Option<Normalizer<'w>>,
    pub(crate) flags: Cell<DefFlags>,
    pub(crate) name: Cell<Option<&'w str>>,
}

impl<'w> Def<'w> {
    /// Process-unique monotonic id; creation order, not structural identity.
    pub fn gid(&self) -> u32 {
        self.gid
    }

    pub fn node(&self) -> Node {
        self.node
    }

    /// The type of this def. `None` only for [`Node::Univ`].
    pub fn ty(&self) -> Option<DefRef<'w>> {
        self.ty
    }

    pub fn num_ops(&self) -> usize {
        self.ops.len()
    }

    /// The `i`-th operand. Reading an unfilled slot is a contract violation:
    /// nominals must be completed before they are consumed.
    pub fn op(&self, i: usize) -> DefRef<'w> {
        self.ops[i].get().expect("operand slot not yet set")
    }

    pub fn op_opt(&self, i: usize) -> Option<DefRef<'w>> {
        self.ops[i].get()
    }

    pub fn ops(&self) -> impl ExactSizeIterator<Item = DefRef<'w>> + '_ {
        self.ops.iter().map(|c| c.get().expect("operand slot not yet set"))
    }

    pub fn flags(&self) -> DefFlags {
        self.flags.get()
    }

    pub fn is_nom(&self) -> bool {
        self.flags().contains(DefFlags::NOM)
    }

    /// All operand slots filled?
    pub fn is_set(&self) -> bool {
        self.flags().contains(DefFlags::SET)
    }

    pub fn has_infer(&self) -> bool {
        self.flags().contains(DefFlags::HAS_INFER)
    }

    pub fn bits(&self) -> u64 {
        self.bits.get()
    }

    pub fn curry(&self) -> u8 {
        self.curry
    }

    pub fn normalizer(&self) -> Option<Normalizer<'w>> {
        self.normalizer
    }

    pub fn name(&self) -> Option<&'w str> {
        self.name.get()
    }

    pub fn set_name(&self, name: &'w str) -> &Self {
        self.name.set(Some(name));
        self
    }

    /// The literal payload, if this is a `Lit`.
    pub fn isa_lit(&self) -> Option<u64> {
        (self.node == Node::Lit).then(|| self.bits())
    }

    /// Fill operand slot `i` of a nominal. Slots are once-set during
    /// construction; overwriting is reserved to [`reset_op`](Self::reset_op).
    pub fn set_op(&self, i: usize, def: DefRef<'w>) -> &Self {
        debug_assert!(self.is_nom(), "set_op on a structural def");
        debug_assert!(self.ops[i].get().is_none(), "operand slot set twice");
        self.ops[i].set(Some(def));
        self.update_set_flag();
        self
    }

    /// Overwrite an already-filled slot of a nominal. Used by the pass
    /// pipeline to rewrite nominal bodies in place.
    pub fn reset_op(&self, i: usize, def: DefRef<'w>) -> &Self {
        debug_assert!(self.is_nom(), "reset_op on a structural def");
        debug_assert!(self.ops[i].get().is_some(), "reset_op on an unset slot");
        self.ops[i].set(Some(def));
        self
    }

    /// Complete a nominal pi with its codomain.
    pub fn set_codom(&self, codom: DefRef<'w>) -> &Self {
        debug_assert_eq!(self.node, Node::Pi);
        self.set_op(1, codom)
    }

    /// Complete a nominal lam with its body.
    pub fn set_body(&self, body: DefRef<'w>) -> &Self {
        debug_assert_eq!(self.node, Node::Lam);
        self.set_op(0, body)
    }

    /// Record the solution of an `Infer`. Union-find internal; unlike
    /// `set_op` this may overwrite (path compression).
    pub(crate) fn resolve_to(&self, def: DefRef<'w>) {
        debug_assert_eq!(self.node, Node::Infer);
        self.ops[0].set(Some(def));
        self.update_set_flag();
    }

    fn update_set_flag(&self) {
        if self.ops.iter().all(|c| c.get().is_some()) {
            self.flags.set(self.flags() | DefFlags::SET);
        }
    }

    pub(crate) fn rank(&self) -> u64 {
        debug_assert_eq!(self.node, Node::Infer);
        self.bits()
    }

    pub(crate) fn bump_rank(&self) {
        self.bits.set(self.bits() + 1);
    }

    // Projections for the common shapes. Each is a contract on the node kind.

    /// Domain of a `Pi`.
    pub fn dom(&self) -> DefRef<'w> {
        debug_assert_eq!(self.node, Node::Pi);
        self.op(0)
    }

    /// Codomain of a `Pi`.
    pub fn codom(&self) -> DefRef<'w> {
        debug_assert_eq!(self.node, Node::Pi);
        self.op(1)
    }

    pub fn callee(&self) -> DefRef<'w> {
        debug_assert_eq!(self.node, Node::App);
        self.op(0)
    }

    pub fn arg(&self) -> DefRef<'w> {
        debug_assert_eq!(self.node, Node::App);
        self.op(1)
    }

    /// Body of a `Lam` or `Pack`.
    pub fn body(&self) -> DefRef<'w> {
        debug_assert!(matches!(self.node, Node::Lam | Node::Pack));
        self.op(0)
    }

    /// Shape of an `Arr`, or of a `Pack` (read off its `Arr` type).
    pub fn shape(&self) -> DefRef<'w> {
        match self.node {
            Node::Arr => self.op(0),
            Node::Pack => {
                let ty = self.ty.expect("pack without a type");
                debug_assert_eq!(ty.node, Node::Arr);
                ty.op(0)
            }
            _ => unreachable!("shape of a non-array def"),
        }
    }

    /// Index operand of an `Extract` or `Insert`.
    pub fn index(&self) -> DefRef<'w> {
        debug_assert!(matches!(self.node, Node::Extract | Node::Insert));
        self.op(1)
    }

    /// Inserted value of an `Insert`.
    pub fn value(&self) -> DefRef<'w> {
        debug_assert_eq!(self.node, Node::Insert);
        self.op(2)
    }

    /// The binder of a `Var`.
    pub fn binder(&self) -> DefRef<'w> {
        debug_assert_eq!(self.node, Node::Var);
        self.op(0)
    }
}

impl fmt::Display for Def<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node {
            Node::Lit => write!(f, "{}", self.bits()),
            Node::Axiom => match self.name() {
                Some(name) => write!(f, "%{}", name),
                None => write!(f, "%axiom#{}", self.gid),
            },
            Node::Lam => match self.name() {
                Some(name) => write!(f, "λ{}#{}", name, self.gid),
                None => write!(f, "λ#{}", self.gid),
            },
            Node::Univ => write!(f, "□"),
            Node::Nat => write!(f, "nat"),
            _ => write!(f, "{:?}#{}", self.node, self.gid),
        }
    }
}

impl fmt::Debug for Def<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}#{}", self.node, self.gid)
    }
}

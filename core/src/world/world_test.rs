use core::ptr;

use bumpalo::Bump;
use pretty_assertions::assert_eq;

use crate::def::Node;
use crate::test_utils::init_test_logging;
use crate::world::{Error, World};

#[test]
fn structural_defs_are_shared() {
    init_test_logging();
    let arena = Bump::new();
    let w = World::new(&arena);

    assert!(ptr::eq(w.lit_nat(42), w.lit_nat(42)));
    assert!(!ptr::eq(w.lit_nat(42), w.lit_nat(43)));
    assert!(ptr::eq(w.pi(w.nat(), w.nat()), w.pi(w.nat(), w.nat())));

    // nominals are fresh every time
    let pi = w.pi(w.nat(), w.nat());
    assert!(!ptr::eq(w.nom_lam(pi, "f"), w.nom_lam(pi, "f")));
}

#[test]
fn universe_tower() {
    let arena = Bump::new();
    let w = World::new(&arena);

    assert!(w.univ().ty().is_none());
    assert_eq!(w.star().node(), Node::Type);
    assert!(ptr::eq(w.star(), w.kind(0)));
    assert!(ptr::eq(
        w.type_at(w.lit_univ(3)).unwrap(),
        w.kind(3)
    ));
    // a level must live in the universe of levels
    assert!(matches!(
        w.type_at(w.lit_nat(3)),
        Err(Error::BadLevel { .. })
    ));
    assert!(ptr::eq(w.nat().ty().unwrap(), w.star()));
}

#[test]
fn sigma_degenerates() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let nat = w.nat();
    assert!(ptr::eq(w.sigma(&[]).unwrap(), w.unit()));
    assert!(ptr::eq(w.sigma(&[nat]).unwrap(), nat));

    // all members equal: an array
    let homo = w.sigma(&[nat, nat, nat]).unwrap();
    assert_eq!(homo.node(), Node::Arr);
    assert!(ptr::eq(homo, w.arr(w.lit_nat(3), nat).unwrap()));

    let hetero = w.sigma(&[nat, w.type_bool()]).unwrap();
    assert_eq!(hetero.node(), Node::Sigma);
}

#[test]
fn tuple_degenerates() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let one = w.lit_nat(1);
    assert!(ptr::eq(w.tuple(&[one]).unwrap(), one));

    // all elements equal: a pack
    let homo = w.tuple(&[one, one]).unwrap();
    assert_eq!(homo.node(), Node::Pack);
    assert!(ptr::eq(homo, w.pack(w.lit_nat(2), one).unwrap()));

    let hetero = w.tuple(&[one, w.lit_nat(2)]).unwrap();
    assert_eq!(hetero.node(), Node::Tuple);
}

#[test]
fn tuple_of_extracts_etas_to_the_source() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let ty = w.sigma(&[w.nat(), w.type_bool()]).unwrap();
    let t = w.axiom(ty, 0, None, "t");
    let e0 = w.extract_at(t, 0).unwrap();
    let e1 = w.extract_at(t, 1).unwrap();
    assert!(ptr::eq(w.tuple(&[e0, e1]).unwrap(), t));

    // swapped order is a genuine tuple
    let swapped = w.tuple(&[e1, e0]).unwrap();
    assert_eq!(swapped.node(), Node::Tuple);
}

#[test]
fn extract_and_insert_fold_on_literals() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let t = w.tuple(&[w.lit_nat(1), w.lit_nat(2)]).unwrap();
    assert!(ptr::eq(w.extract_at(t, 0).unwrap(), w.lit_nat(1)));
    assert!(ptr::eq(w.extract_at(t, 1).unwrap(), w.lit_nat(2)));

    let refined = w.insert_at(t, 1, w.lit_nat(9)).unwrap();
    assert!(ptr::eq(
        refined,
        w.tuple(&[w.lit_nat(1), w.lit_nat(9)]).unwrap()
    ));
}

#[test]
fn extract_insert_cancel_on_opaque_values() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let ty = w.sigma(&[w.nat(), w.type_bool()]).unwrap();
    let a = w.axiom(ty, 0, None, "a");

    let e = w.extract_at(a, 0).unwrap();
    assert_eq!(e.node(), Node::Extract);
    assert!(ptr::eq(e.ty().unwrap(), w.nat()));

    // extract(insert(a, 0, v), 0) -> v
    let ins = w.insert_at(a, 0, w.lit_nat(5)).unwrap();
    assert_eq!(ins.node(), Node::Insert);
    assert!(ptr::eq(w.extract_at(ins, 0).unwrap(), w.lit_nat(5)));
    // extract(insert(a, 0, v), 1) -> extract(a, 1)
    assert!(ptr::eq(
        w.extract_at(ins, 1).unwrap(),
        w.extract_at(a, 1).unwrap()
    ));
    // insert(insert(a, 0, v), 0, u) -> insert(a, 0, u)
    let again = w.insert_at(ins, 0, w.lit_nat(6)).unwrap();
    assert!(ptr::eq(again, w.insert_at(a, 0, w.lit_nat(6)).unwrap()));
}

#[test]
fn extract_checks_the_index_size() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let t = w.tuple(&[w.lit_nat(1), w.lit_nat(2)]).unwrap();
    // an Idx 3 into a 2-tuple
    let bad = w.lit_idx(3, 1).unwrap();
    assert!(matches!(w.extract(t, bad), Err(Error::BadIndex { .. })));
    // a nat is not an index at all
    assert!(matches!(
        w.extract(t, w.lit_nat(0)),
        Err(Error::BadIndex { .. })
    ));
}

#[test]
fn idx_literals_are_range_checked() {
    let arena = Bump::new();
    let w = World::new(&arena);

    assert!(w.lit_idx(4, 3).is_ok());
    assert!(matches!(
        w.lit_idx(4, 4),
        Err(Error::OutOfRange { value: 4, .. })
    ));

    // symbolic size: only 0 is known to fit
    let n = w.axiom(w.nat(), 0, None, "n");
    let idx = w.idx(n).unwrap();
    assert!(w.lit(idx, 0).is_ok());
    assert!(matches!(w.lit(idx, 1), Err(Error::UnknownSize { .. })));

    // an Idx size must be a nat
    assert!(matches!(
        w.idx(w.lit_bool(false)),
        Err(Error::BadSize { .. })
    ));
}

#[test]
fn arrays_and_packs_degenerate() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let nat = w.nat();
    assert!(ptr::eq(w.arr(w.lit_nat(0), nat).unwrap(), w.unit()));
    assert!(ptr::eq(w.arr(w.lit_nat(1), nat).unwrap(), nat));
    let x = w.lit_nat(7);
    assert!(ptr::eq(w.pack(w.lit_nat(1), x).unwrap(), x));

    // tuple shapes curry
    let shape = w.tuple(&[w.lit_nat(2), w.lit_nat(3)]).unwrap();
    let nested = w.arr(shape, nat).unwrap();
    let by_hand = w
        .arr(w.lit_nat(2), w.arr(w.lit_nat(3), nat).unwrap())
        .unwrap();
    assert!(ptr::eq(nested, by_hand));

    // a shape must be made of nats
    assert!(matches!(
        w.arr(w.lit_bool(true), nat),
        Err(Error::BadShape { .. })
    ));

    // extracting from a pack yields its body
    let p = w.pack(w.lit_nat(4), x).unwrap();
    let i = w.axiom(w.idx(w.lit_nat(4)).unwrap(), 0, None, "i");
    assert!(ptr::eq(w.extract(p, i).unwrap(), x));
}

#[test]
fn pack_shapes_curry_like_tuple_shapes() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let nat = w.nat();
    let two = w.lit_nat(2);
    // <3; 2> as a shape nests three levels deep, for types and values alike
    let shape = w.pack(w.lit_nat(3), two).unwrap();
    assert_eq!(shape.node(), Node::Pack);

    let ty_by_hand = w
        .arr(two, w.arr(two, w.arr(two, nat).unwrap()).unwrap())
        .unwrap();
    assert!(ptr::eq(w.arr(shape, nat).unwrap(), ty_by_hand));

    let x = w.lit_nat(7);
    let val_by_hand = w
        .pack(two, w.pack(two, w.pack(two, x).unwrap()).unwrap())
        .unwrap();
    assert!(ptr::eq(w.pack(shape, x).unwrap(), val_by_hand));
}

#[test]
fn joins_are_canonical() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let a = w.nat();
    let b = w.type_bool();
    let j = w.join(&[a, b]).unwrap();
    assert_eq!(j.node(), Node::Join);
    assert!(ptr::eq(j, w.join(&[b, a]).unwrap()));
    assert!(ptr::eq(w.join(&[a, a]).unwrap(), a));
    assert!(matches!(w.join(&[]), Err(Error::EmptyJoin)));

    let v = w.vel(j, w.lit_nat(3)).unwrap();
    assert_eq!(v.node(), Node::Vel);
    assert!(ptr::eq(v.ty().unwrap(), j));
    // vel into a non-join is the identity
    assert!(ptr::eq(w.vel(a, w.lit_nat(3)).unwrap(), w.lit_nat(3)));
    // Idx 4 is not an alternative of nat ∪ Idx 2
    let stray = w.lit_idx(4, 1).unwrap();
    assert!(matches!(
        w.vel(j, stray),
        Err(Error::NotAnAlternative { .. })
    ));
}

#[test]
fn nat_axioms_normalize() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let add = w.ax_nat_add();
    let mul = w.ax_nat_mul();
    assert!(ptr::eq(
        w.app_args(add, &[w.lit_nat(2), w.lit_nat(3)]).unwrap(),
        w.lit_nat(5)
    ));

    let x = w.axiom(w.nat(), 0, None, "x");
    assert!(ptr::eq(w.app_args(add, &[x, w.lit_nat(0)]).unwrap(), x));
    assert!(ptr::eq(w.app_args(mul, &[x, w.lit_nat(1)]).unwrap(), x));
    assert!(ptr::eq(
        w.app_args(mul, &[x, w.lit_nat(0)]).unwrap(),
        w.lit_nat(0)
    ));
    // x - x folds without knowing x
    assert!(ptr::eq(
        w.app_args(w.ax_nat_sub(), &[x, x]).unwrap(),
        w.lit_nat(0)
    ));
    assert!(ptr::eq(
        w.app_args(w.ax_nat_eq(), &[x, x]).unwrap(),
        w.lit_bool(true)
    ));

    // symbolic operands stay applications, and share
    let sym = w.app_args(add, &[x, w.lit_nat(3)]).unwrap();
    assert_eq!(sym.node(), Node::App);
    assert!(ptr::eq(sym, w.app_args(add, &[x, w.lit_nat(3)]).unwrap()));
}

#[test]
fn partial_application_keeps_its_type() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let add = w.ax_nat_add();
    let partial = w.app(add, w.lit_nat(2)).unwrap();
    assert_eq!(partial.node(), Node::App);
    assert!(ptr::eq(
        partial.ty().unwrap(),
        w.pi(w.nat(), w.nat())
    ));
}

#[test]
fn dependent_pi_reduces_its_codomain() {
    let arena = Bump::new();
    let w = World::new(&arena);

    // f : Π n: nat. Idx n
    let pi = w.nom_pi(w.nat());
    pi.set_codom(w.idx(w.var(pi)).unwrap());
    let f = w.axiom(pi, 1, None, "f");

    let a = w.app(f, w.lit_nat(8)).unwrap();
    assert!(ptr::eq(
        a.ty().unwrap(),
        w.idx(w.lit_nat(8)).unwrap()
    ));
}

#[test]
fn app_rejects_bad_callees_and_args() {
    let arena = Bump::new();
    let w = World::new(&arena);

    assert!(matches!(
        w.app(w.lit_nat(1), w.lit_nat(2)),
        Err(Error::NotCallable { .. })
    ));

    let f = w.axiom(w.pi(w.nat(), w.nat()), 1, None, "f");
    assert!(matches!(
        w.app(f, w.lit_bool(true)),
        Err(Error::NotAssignable { .. })
    ));
}

#[test]
fn app_through_a_uniform_tuple_of_functions() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let pi = w.pi(w.nat(), w.nat());
    let f = w.axiom(pi, 1, None, "f");
    let g = w.axiom(pi, 1, None, "g");
    let fg = w.tuple(&[f, g]).unwrap();
    let which = w.axiom(w.type_bool(), 0, None, "which");
    let picked = w.extract(fg, which).unwrap();

    let applied = w.app(picked, w.lit_nat(1)).unwrap();
    assert!(ptr::eq(applied.ty().unwrap(), w.nat()));

    // mixed-type tuples are not callable
    let h = w.axiom(w.pi(w.type_bool(), w.nat()), 1, None, "h");
    let fh = w.tuple(&[f, h]).unwrap();
    let picked = w.extract(fh, which).unwrap();
    assert!(matches!(
        w.app(picked, w.lit_nat(1)),
        Err(Error::NotCallable { .. })
    ));
}

#[test]
fn bitcast_folds_literals_and_identity_casts() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let seven = w.lit_nat(7);
    assert!(ptr::eq(w.bitcast(w.nat(), seven).unwrap(), seven));

    let as_bool = w.bitcast(w.type_bool(), w.lit_nat(1)).unwrap();
    assert!(ptr::eq(as_bool, w.lit_bool(true)));

    // a symbolic cast stays an application
    let x = w.axiom(w.nat(), 0, None, "x");
    let cast = w.bitcast(w.type_bool(), x).unwrap();
    assert_eq!(cast.node(), Node::App);
    assert!(ptr::eq(cast.ty().unwrap(), w.type_bool()));
}

#[test]
fn tuple_str_is_a_tuple_of_nats() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let s = w.tuple_str("ok").unwrap();
    assert_eq!(s.node(), Node::Tuple);
    assert!(ptr::eq(w.extract_at(s, 0).unwrap(), w.lit_nat(b'o' as u64)));
    assert!(ptr::eq(w.extract_at(s, 1).unwrap(), w.lit_nat(b'k' as u64)));

    // a homogeneous string collapses to a pack
    let aa = w.tuple_str("aa").unwrap();
    assert_eq!(aa.node(), Node::Pack);
}

#[test]
fn gid2def_finds_defs_by_id() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let d = w.lit_nat(5);
    assert!(ptr::eq(w.gid2def(d.gid()).unwrap(), d));
    assert!(w.gid2def(u32::MAX).is_none());
    assert!(w.num_defs() > 0);
}

#[test]
fn holes_resolve_through_construction() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let h = w.infer(w.star());
    assert!(h.has_infer());
    assert!(w.alpha(h, w.nat()));
    // once resolved, the hole behaves as its solution
    assert!(w.alpha_strict(h, w.nat()));
    let f = w.axiom(w.pi(w.nat(), w.nat()), 1, None, "f");
    let x = w.axiom(w.nat(), 0, None, "x");
    assert!(w.app(f, x).is_ok());
}

#[test]
fn names_render_in_display() {
    let arena = Bump::new();
    let w = World::new(&arena);

    assert_eq!(crate::format!("{}", w.lit_nat(3)), "3");
    assert_eq!(crate::format!("{}", w.ax_nat_add()), "%nat_add");
    assert_eq!(crate::format!("{}", w.univ()), "□");
}

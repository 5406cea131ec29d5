//! End-to-end exercises of the public API: construction, dependent typing,
//! and the pass pipeline working together on one graph.

use core::ptr;

use bumpalo::Bump;
use pretty_assertions::assert_eq;

use tangle_core::{BetaRed, EtaRed, Node, Pipeline, World};

#[test]
fn arithmetic_folds_across_a_whole_expression() {
    let arena = Bump::new();
    let w = World::new(&arena);

    // (2 + 3) * (10 - 4)  ~>  30, purely at construction time
    let add = w.ax_nat_add();
    let sub = w.ax_nat_sub();
    let mul = w.ax_nat_mul();
    let lhs = w.app_args(add, &[w.lit_nat(2), w.lit_nat(3)]).unwrap();
    let rhs = w.app_args(sub, &[w.lit_nat(10), w.lit_nat(4)]).unwrap();
    let prod = w.app_args(mul, &[lhs, rhs]).unwrap();
    assert!(ptr::eq(prod, w.lit_nat(30)));
}

#[test]
fn dependent_vectors_type_check() {
    let arena = Bump::new();
    let w = World::new(&arena);

    // new_vec : Π n: nat. «n; nat»
    let pi = w.nom_pi(w.nat());
    pi.set_codom(w.arr(w.var(pi), w.nat()).unwrap());
    let new_vec = w.axiom(pi, 1, None, "new_vec");

    let v3 = w.app(new_vec, w.lit_nat(3)).unwrap();
    let expect = w.arr(w.lit_nat(3), w.nat()).unwrap();
    assert!(ptr::eq(v3.ty().unwrap(), expect));

    // indices are checked against the instantiated length
    assert!(w.extract_at(v3, 2).is_ok());
    assert!(w.extract_at(v3, 3).is_err());
}

#[test]
fn pipeline_optimizes_a_program() {
    let arena = Bump::new();
    let w = World::new(&arena);

    // twice = λf. λx. f (f x)
    let nat = w.nat();
    let fn_ty = w.pi(nat, nat);
    let twice = w.nom_lam(w.pi(fn_ty, fn_ty), "twice");
    let f = w.var(twice);
    let inner = w.nom_lam(fn_ty, "apply");
    let x = w.var(inner);
    inner.set_body(w.app(f, w.app(f, x).unwrap()).unwrap());
    twice.set_body(inner);

    // inc = λn. add n 1
    let inc = w.nom_lam(fn_ty, "inc");
    inc.set_body(w.app_args(w.ax_nat_add(), &[w.var(inc), w.lit_nat(1)]).unwrap());

    // (twice inc) 5  ~>  7
    let applied = w.app(w.app(twice, inc).unwrap(), w.lit_nat(5)).unwrap();
    assert_eq!(applied.node(), Node::App);

    let mut pipe = Pipeline::new();
    pipe.add(BetaRed::new(&w));
    pipe.add(EtaRed::new(&w));
    let out = pipe.run(applied).unwrap();
    assert!(ptr::eq(out, w.lit_nat(7)));
}

#[test]
fn aggregates_round_trip_through_rewrites() {
    let arena = Bump::new();
    let w = World::new(&arena);

    // swap = λp. (p#1, p#0) over (nat, bool)
    let pair_ty = w.sigma(&[w.nat(), w.type_bool()]).unwrap();
    let swapped_ty = w.sigma(&[w.type_bool(), w.nat()]).unwrap();
    let swap = w.nom_lam(w.pi(pair_ty, swapped_ty), "swap");
    let p = w.var(swap);
    let body = w
        .tuple(&[
            w.extract_at(p, 1).unwrap(),
            w.extract_at(p, 0).unwrap(),
        ])
        .unwrap();
    swap.set_body(body);

    let arg = w.tuple(&[w.lit_nat(4), w.lit_bool(false)]).unwrap();
    let root = w.app(swap, arg).unwrap();

    let mut pipe = Pipeline::new();
    pipe.add(BetaRed::new(&w));
    let out = pipe.run(root).unwrap();
    let expect = w.tuple(&[w.lit_bool(false), w.lit_nat(4)]).unwrap();
    assert!(ptr::eq(out, expect));
}

#[test]
fn holes_resolve_against_concrete_uses() {
    let arena = Bump::new();
    let w = World::new(&arena);

    let hole = w.infer(w.star());
    assert!(hole.has_infer());

    // checking a concrete value against the hole pins it down
    assert!(w.assignable(hole, w.lit_nat(3)));
    assert!(w.alpha_strict(hole, w.nat()));
    assert!(!w.alpha_strict(hole, w.type_bool()));
}

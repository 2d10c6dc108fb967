//! Scenario tests: auto-naming, disambiguation, entry-block reuse,
//! traversal order, and use typing against the verifier.

use dlvm_ir::builder::Builder;
use dlvm_ir::inst::{BinaryOp, BranchTarget, InstructionKind};
use dlvm_ir::ir::FunctionAttributes;
use dlvm_ir::ty::{DataType, Type};
use dlvm_ir::value::{Literal, ScalarLiteral, Use};
use dlvm_ir::{VerificationError, Verifier};

fn scalar(dt: DataType) -> Type { Type::scalar(dt) }

/// Builder construction is instrumented with `tracing`; surface it the
/// way a real integration run would rather than letting it go nowhere.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[test]
fn auto_naming_mints_sequential_names_without_collision() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f32_ty = scalar(DataType::f32());
    let f = builder
        .build_function(
            "g",
            vec![("a".to_string(), f32_ty.clone()), ("b".to_string(), f32_ty.clone())],
            f32_ty.clone(),
            FunctionAttributes::empty(),
        )
        .unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    builder.move_to(Some(entry)).unwrap();

    let a = builder.use_of_argument(builder.module().function(f).arguments.get("a").unwrap());
    let b = builder.use_of_argument(builder.module().function(f).arguments.get("b").unwrap());

    let first = builder.add(a.clone(), b.clone(), None).unwrap();
    let second = builder.add(a, b, None).unwrap();

    let module = builder.finish();
    assert_eq!(module.instruction(first).name.as_deref(), Some("v0"));
    assert_eq!(module.instruction(second).name.as_deref(), Some("v1"));
}

#[test]
fn disambiguation_appends_smallest_free_suffix() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f32_ty = scalar(DataType::f32());
    builder.build_function("h", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let f = builder.module().functions.get("h").unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    builder.move_to(Some(entry)).unwrap();

    let literal = Use::Literal(f32_ty, Literal::Scalar(ScalarLiteral::Float(1.0)));
    let mk = |builder: &mut Builder| {
        builder
            .build_instruction(
                InstructionKind::Binary {
                    op: BinaryOp::Add,
                    lhs: literal.clone(),
                    rhs: literal.clone(),
                    broadcasting: None,
                },
                Some("x".to_string()),
            )
            .unwrap()
    };

    let x0 = mk(&mut builder);
    let x1 = mk(&mut builder);
    let x2 = mk(&mut builder);
    let x3 = mk(&mut builder);

    let module = builder.finish();
    assert_eq!(module.instruction(x0).name.as_deref(), Some("x"));
    assert_eq!(module.instruction(x1).name.as_deref(), Some("x.1"));
    assert_eq!(module.instruction(x2).name.as_deref(), Some("x.2"));
    assert_eq!(module.instruction(x3).name.as_deref(), Some("x.3"));
}

#[test]
fn building_entry_by_name_returns_the_existing_entry_block() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f32_ty = scalar(DataType::f32());
    let h = builder
        .build_function("h", vec![("a".to_string(), f32_ty.clone())], f32_ty, FunctionAttributes::empty())
        .unwrap();

    let expected_entry = builder.module().function(h).entry;
    let returned = builder.build_basic_block(h, "entry", Vec::new()).unwrap();

    assert_eq!(returned, expected_entry);
    let entry_block = builder.module().block(returned);
    assert_eq!(entry_block.arguments.len(), 1);
    let (name, _) = entry_block.arguments.iter().next().unwrap();
    assert_eq!(name, "a");
}

#[test]
fn traversal_visits_a_four_block_diamond_in_the_documented_orders() {
    use dlvm_ir::arena::Id;
    use dlvm_ir::graph::{Bfs, ControlFlowGraph, PostOrderDfs, PreOrderDfs, Successors};

    init_tracing();
    let mut builder = Builder::new("M");
    let f = builder.build_function("f", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    let b1 = builder.build_basic_block(f, "b1", Vec::new()).unwrap();
    let b2 = builder.build_basic_block(f, "b2", Vec::new()).unwrap();
    let exit = builder.build_basic_block(f, "exit", Vec::new()).unwrap();

    builder.move_to(Some(entry)).unwrap();
    builder
        .conditional(
            Use::Literal(scalar(DataType::bool1()), Literal::Scalar(ScalarLiteral::Bool(true))),
            BranchTarget { block: b1, arguments: Vec::new() },
            BranchTarget { block: b2, arguments: Vec::new() },
        )
        .unwrap();

    builder.move_to(Some(b1)).unwrap();
    builder.branch(BranchTarget { block: exit, arguments: Vec::new() }).unwrap();
    builder.move_to(Some(b2)).unwrap();
    builder.branch(BranchTarget { block: exit, arguments: Vec::new() }).unwrap();
    builder.move_to(Some(exit)).unwrap();
    builder.return_(None).unwrap();

    let module = builder.finish();
    let cfg = ControlFlowGraph { module: &module };

    let bfs: Vec<Id<_>> = Bfs::new(&cfg, entry).collect();
    assert_eq!(bfs, vec![entry, b1, b2, exit]);

    let pre: Vec<Id<_>> = PreOrderDfs::new(&cfg, entry).collect();
    assert_eq!(pre, vec![entry, b1, exit, b2]);

    let post: Vec<Id<_>> = PostOrderDfs::new(&cfg, entry).collect();
    assert_eq!(post, vec![exit, b1, b2, entry]);

    assert_eq!(cfg.predecessors(exit).len(), 2);
    assert_eq!(cfg.successors(entry).len(), 2);
}

#[test]
fn use_typing_agrees_with_the_referent_in_a_well_formed_module() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f32_ty = scalar(DataType::f32());
    let f = builder
        .build_function(
            "f",
            vec![("a".to_string(), f32_ty.clone()), ("b".to_string(), f32_ty.clone())],
            f32_ty.clone(),
            FunctionAttributes::empty(),
        )
        .unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    builder.move_to(Some(entry)).unwrap();

    let a = builder.use_of_argument(builder.module().function(f).arguments.get("a").unwrap());
    let b = builder.use_of_argument(builder.module().function(f).arguments.get("b").unwrap());
    let v = builder.add(a, b, None).unwrap();
    let result = builder.use_of(v);
    assert_eq!(builder.module().type_of_use(&result), f32_ty);
    builder.return_(Some(result)).unwrap();

    let module = builder.finish();
    assert!(Verifier::new(&module).run().is_empty());
}

#[test]
fn verifier_rejects_a_use_whose_ascribed_type_disagrees_with_its_referent() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f32_ty = scalar(DataType::f32());
    let i32_ty = scalar(DataType::i32());
    let f = builder
        .build_function(
            "f",
            vec![("a".to_string(), f32_ty.clone()), ("b".to_string(), f32_ty)],
            Type::Void,
            FunctionAttributes::empty(),
        )
        .unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    builder.move_to(Some(entry)).unwrap();

    let a = builder.use_of_argument(builder.module().function(f).arguments.get("a").unwrap());
    let b = builder.use_of_argument(builder.module().function(f).arguments.get("b").unwrap());
    let v = builder.add(a, b, None).unwrap();

    // An operand whose ascribed type disagrees with `v`'s own declared
    // result type; the builder trusts it, the verifier must not.
    let mismatched = Use::Instruction(i32_ty, v);
    builder.deallocate(mismatched).unwrap();
    builder.return_(None).unwrap();

    let module = builder.finish();
    let errors = Verifier::new(&module).run();
    assert!(errors.iter().any(|e| matches!(e, VerificationError::TypeMismatch { .. })));
}

#[test]
fn verifier_rejects_a_use_referring_to_an_unlinked_instruction() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f32_ty = scalar(DataType::f32());
    let f = builder
        .build_function("f", vec![("a".to_string(), f32_ty.clone())], Type::Void, FunctionAttributes::empty())
        .unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    builder.move_to(Some(entry)).unwrap();

    let a = builder.use_of_argument(builder.module().function(f).arguments.get("a").unwrap());
    let dead = builder.unary(dlvm_ir::inst::UnaryOp::Negate, a).unwrap();
    let dead_use = builder.use_of(dead);
    builder.deallocate(dead_use).unwrap();
    builder.return_(None).unwrap();

    builder.unlink_instruction(dead);

    let module = builder.finish();
    let errors = Verifier::new(&module).run();
    assert!(errors.iter().any(|e| matches!(e, VerificationError::DanglingUse { .. })));
}

#[test]
fn entry_block_name_occupies_the_function_scope() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f = builder.build_function("f", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    builder.move_to(Some(entry)).unwrap();

    // Naming an instruction "entry" must not collide silently with the
    // block of the same name; it has to be disambiguated instead.
    let literal = Use::Literal(scalar(DataType::f32()), Literal::Scalar(ScalarLiteral::Float(1.0)));
    let inst = builder
        .build_instruction(
            InstructionKind::Unary { op: dlvm_ir::inst::UnaryOp::Negate, operand: literal },
            Some("entry".to_string()),
        )
        .unwrap();

    let module = builder.finish();
    assert_eq!(module.instruction(inst).name.as_deref(), Some("entry.1"));
}

#[test]
fn builder_rejects_a_function_id_from_a_different_module() {
    init_tracing();
    let mut builder_a = Builder::new("A");
    builder_a.build_function("f", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let module_a = builder_a.finish();
    let foreign_function = module_a.functions.get("f").unwrap();

    // `builder_b` has never built a function, so `foreign_function`'s
    // slot index is out of bounds for it regardless of which module
    // actually minted it.
    let builder_b = Builder::new("B");
    assert!(matches!(
        builder_b.find_block(foreign_function, "entry"),
        Err(dlvm_ir::BuilderError::UnknownFunction(_))
    ));
}

#[test]
fn move_to_rejects_a_block_id_out_of_range_for_this_module() {
    init_tracing();
    let mut builder_a = Builder::new("A");
    let f = builder_a.build_function("f", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let foreign_block = builder_a.find_block(f, "entry").unwrap();

    let mut builder_b = Builder::new("B");
    assert!(matches!(
        builder_b.move_to(Some(foreign_block)),
        Err(dlvm_ir::BuilderError::UnknownBasicBlock(_))
    ));
}

#[test]
fn verifier_flags_a_branch_target_outside_the_branching_function() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f1 = builder.build_function("f1", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let f2 = builder.build_function("f2", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let f1_entry = builder.find_block(f1, "entry").unwrap();
    let f2_entry = builder.find_block(f2, "entry").unwrap();

    builder.move_to(Some(f1_entry)).unwrap();
    builder.branch(BranchTarget { block: f2_entry, arguments: Vec::new() }).unwrap();

    builder.move_to(Some(f2_entry)).unwrap();
    builder.return_(None).unwrap();

    let module = builder.finish();
    let errors = Verifier::new(&module).run();
    assert!(errors.iter().any(|e| matches!(e, VerificationError::MalformedTerminator(_))));
}

#[test]
fn verifier_flags_a_branch_target_argument_arity_mismatch() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f = builder.build_function("f", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    let target = builder.build_basic_block(f, "target", vec![("p".to_string(), scalar(DataType::f32()))]).unwrap();

    builder.move_to(Some(entry)).unwrap();
    // `target` declares one f32 argument; branch to it with none.
    builder.branch(BranchTarget { block: target, arguments: Vec::new() }).unwrap();

    builder.move_to(Some(target)).unwrap();
    builder.return_(None).unwrap();

    let module = builder.finish();
    let errors = Verifier::new(&module).run();
    assert!(errors.iter().any(|e| matches!(e, VerificationError::TypeMismatch { .. })));
}

#[test]
fn build_instruction_accepts_ill_typed_operands_and_defers_to_the_verifier() {
    init_tracing();
    let mut builder = Builder::new("M");
    let f = builder.build_function("f", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
    let entry = builder.find_block(f, "entry").unwrap();
    builder.move_to(Some(entry)).unwrap();

    // A transpose of a rank-1 tensor has no result type; the builder
    // must still accept it rather than rejecting the operand itself.
    let rank_one = Use::Literal(
        Type::tensor_of(vec![4], DataType::f32()),
        Literal::Scalar(ScalarLiteral::Float(0.0)),
    );
    let transposed = builder.transpose(rank_one).unwrap();
    assert_eq!(builder.module().instruction(transposed).result_type, Type::Invalid);

    builder.return_(None).unwrap();
    let module = builder.finish();
    let errors = Verifier::new(&module).run();
    assert!(errors.iter().any(|e| matches!(e, VerificationError::TypeMismatch { .. })));
}

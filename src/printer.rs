//! The deterministic textual pretty-printer: the stable IR surface
//! described in §6. Never mutates the module, never allocates a name —
//! an unnamed, value-producing instruction reaching the printer is a
//! bug upstream of it.

use crate::inst::InstructionKind;
use crate::ir::{GlobalValueKind, Module};
use crate::ty::{DataType, ElementKey, Shape, Type};
use crate::value::Use;

/// A generic append-only character sink. Buffering (or not) is entirely
/// up to the implementor; the printer only ever calls `append`.
pub trait Sink {
    fn append(&mut self, text: &str);
}

impl Sink for String {
    fn append(&mut self, text: &str) {
        self.push_str(text);
    }
}

/// Renders `module` to `sink` using the exact textual surface in §6.
pub fn print_module(module: &Module, sink: &mut dyn Sink) {
    sink.append("module ");
    sink.append(&module.name);
    sink.append("\n\n");

    for id in module.globals_in_order() {
        print_global(module, module.global(id), sink);
        sink.append("\n");
    }
    sink.append("\n");

    for id in module.functions_in_order() {
        print_function(module, module.function(id), sink);
        sink.append("\n\n");
    }
}

fn print_global(module: &Module, global: &crate::ir::GlobalValueData, sink: &mut dyn Sink) {
    sink.append("declare ");
    sink.append(global.kind.keyword());
    sink.append(" ");
    sink.append(&global.kind.sigil().to_string());
    sink.append(&global.name);
    sink.append(" : ");
    print_type(module, &global.ty, sink);
    // Only `variable` globals print their initializer (§6's worked
    // example shows neither `placeholder` nor `output` with one).
    if global.kind == GlobalValueKind::Variable {
        sink.append(" = ");
        print_use_value_only(module, &global.initializer, sink);
    }
}

fn print_function(module: &Module, function: &crate::ir::FunctionData, sink: &mut dyn Sink) {
    if function.attributes.contains(crate::ir::FunctionAttributes::DIFFERENTIABLE) {
        sink.append("differentiable ");
    }
    sink.append("func @");
    sink.append(&function.name);
    sink.append("(");
    let arg_ids: Vec<_> = function.arguments.ids().collect();
    for (i, arg_id) in arg_ids.iter().enumerate() {
        if i > 0 {
            sink.append(", ");
        }
        print_argument(module, module.argument(*arg_id), sink);
    }
    sink.append(")");
    if !function.result.is_void() {
        sink.append(" -> ");
        print_type(module, &function.result, sink);
    }
    sink.append(" {\n");
    for block_id in function.blocks_in_order() {
        print_block(module, module.block(block_id), sink);
    }
    sink.append("}\n");
}

fn print_argument(module: &Module, argument: &crate::ir::ArgumentData, sink: &mut dyn Sink) {
    sink.append("%");
    sink.append(&argument.name);
    sink.append(": ");
    print_type(module, &argument.ty, sink);
}

fn print_block(module: &Module, block: &crate::ir::BasicBlockData, sink: &mut dyn Sink) {
    sink.append(&block.name);
    sink.append("(");
    let arg_ids: Vec<_> = block.argument_ids().collect();
    for (i, arg_id) in arg_ids.iter().enumerate() {
        if i > 0 {
            sink.append(", ");
        }
        print_argument(module, module.argument(*arg_id), sink);
    }
    sink.append("):\n");
    for &instruction_id in &block.instructions {
        sink.append("    ");
        print_instruction(module, module.instruction(instruction_id), sink);
        sink.append("\n");
    }
}

fn print_instruction(module: &Module, instruction: &crate::ir::InstructionData, sink: &mut dyn Sink) {
    if let Some(name) = &instruction.name {
        sink.append("%");
        sink.append(name);
        sink.append(" = ");
    }
    print_kind(module, &instruction.kind, sink);
}

fn print_kind(module: &Module, kind: &InstructionKind, sink: &mut dyn Sink) {
    let mut uses = |label: &str, items: &[&Use], sink: &mut dyn Sink| {
        sink.append(label);
        sink.append(" ");
        for (i, u) in items.iter().enumerate() {
            if i > 0 {
                sink.append(", ");
            }
            print_use(module, u, sink);
        }
    };

    match kind {
        InstructionKind::Binary { op, lhs, rhs, .. } => uses(op.keyword(), &[lhs, rhs], sink),
        InstructionKind::Unary { op, operand } => uses(op.keyword(), &[operand], sink),
        InstructionKind::MatrixMultiply { lhs, rhs } => uses("matrixMultiply", &[lhs, rhs], sink),
        InstructionKind::Transpose { operand } => uses("transpose", &[operand], sink),
        InstructionKind::Reduce { op, operand, axis } => {
            sink.append("reduce ");
            sink.append(op.keyword());
            sink.append(" ");
            print_use(module, operand, sink);
            sink.append(&format!(", {}", axis));
        }
        InstructionKind::Scan { op, operand, axis } => {
            sink.append("scan ");
            sink.append(op.keyword());
            sink.append(" ");
            print_use(module, operand, sink);
            sink.append(&format!(", {}", axis));
        }
        InstructionKind::Concatenate { operands, axis } => {
            sink.append("concatenate ");
            for (i, u) in operands.iter().enumerate() {
                if i > 0 {
                    sink.append(", ");
                }
                print_use(module, u, sink);
            }
            sink.append(&format!(", {}", axis));
        }
        InstructionKind::ShapeCast { operand, shape } => {
            sink.append("shapeCast ");
            print_use(module, operand, sink);
            sink.append(", ");
            print_shape(shape, sink);
        }
        InstructionKind::DataTypeCast { operand, data_type } => {
            sink.append("dataTypeCast ");
            print_use(module, operand, sink);
            sink.append(", ");
            sink.append(&data_type.token());
        }
        InstructionKind::Tuple { elements } => {
            sink.append("tuple ");
            for (i, u) in elements.iter().enumerate() {
                if i > 0 {
                    sink.append(", ");
                }
                print_use(module, u, sink);
            }
        }
        InstructionKind::Extract { source, keys } => {
            sink.append("element ");
            print_use(module, source, sink);
            print_keys(keys, sink);
        }
        InstructionKind::Insert { value, destination, keys } => {
            sink.append("yield ");
            print_use(module, value, sink);
            sink.append(", ");
            print_use(module, destination, sink);
            print_keys(keys, sink);
        }
        InstructionKind::ElementPointer { source, keys } => {
            sink.append("subtensor ");
            print_use(module, source, sink);
            print_keys(keys, sink);
        }
        InstructionKind::Load { pointer } => uses("pull", &[pointer], sink),
        InstructionKind::Store { value, destination } => uses("store", &[value, destination], sink),
        InstructionKind::AllocateHeap { element_type, count } => {
            sink.append("allocateHeap ");
            print_type(module, element_type, sink);
            sink.append(", ");
            print_use(module, count, sink);
        }
        InstructionKind::AllocateBox { element_type } => {
            sink.append("allocateBox ");
            print_type(module, element_type, sink);
        }
        InstructionKind::ProjectBox { boxed } => uses("projectBox", &[boxed], sink),
        InstructionKind::Deallocate { value } => uses("deallocate", &[value], sink),
        InstructionKind::Apply { callee, arguments } => {
            sink.append("call ");
            print_use(module, callee, sink);
            for a in arguments {
                sink.append(", ");
                print_use(module, a, sink);
            }
        }
        InstructionKind::Gradient { function, output, with_respect_to, keeping } => {
            sink.append("gradient ");
            print_use(module, function, sink);
            sink.append(", ");
            print_use(module, output, sink);
            sink.append(", wrt [");
            sink.append(&with_respect_to.iter().map(u32_string).collect::<Vec<_>>().join(", "));
            sink.append("], keeping [");
            sink.append(&keeping.iter().map(u32_string).collect::<Vec<_>>().join(", "));
            sink.append("]");
        }
        InstructionKind::Branch { target } => {
            sink.append("branch ");
            print_branch_target(module, target, sink);
        }
        InstructionKind::Conditional { condition, when_true, when_false } => {
            sink.append("conditional ");
            print_use(module, condition, sink);
            sink.append(", ");
            print_branch_target(module, when_true, sink);
            sink.append(", ");
            print_branch_target(module, when_false, sink);
        }
        InstructionKind::Return { value } => {
            sink.append("return");
            if let Some(v) = value {
                sink.append(" ");
                print_use(module, v, sink);
            }
        }
    }
}

fn u32_string(i: &usize) -> String { i.to_string() }

fn print_branch_target(module: &Module, target: &crate::inst::BranchTarget, sink: &mut dyn Sink) {
    sink.append(&module.block(target.block).name);
    sink.append("(");
    for (i, a) in target.arguments.iter().enumerate() {
        if i > 0 {
            sink.append(", ");
        }
        print_use(module, a, sink);
    }
    sink.append(")");
}

fn print_keys(keys: &[ElementKey], sink: &mut dyn Sink) {
    for key in keys {
        match key {
            ElementKey::TupleIndex(i) => sink.append(&format!(", {}", i)),
            ElementKey::TensorDim(d) => sink.append(&format!(", {}", d)),
        }
    }
}

/// Renders a `Use` as `<type> <sigil><name>` (or a literal's inline form
/// prefixed by its type).
fn print_use(module: &Module, use_: &Use, sink: &mut dyn Sink) {
    print_type(module, use_.ascribed_type(), sink);
    sink.append(" ");
    print_use_value_only(module, use_, sink);
}

/// Renders just the value half of a `Use` — sigil+name, or a literal's
/// inline form — without its type prefix. Used both by `print_use` and
/// by a global declaration's initializer, which already states its type
/// via the declaration's own `: <type>` clause.
fn print_use_value_only(module: &Module, use_: &Use, sink: &mut dyn Sink) {
    match use_ {
        Use::Argument(_, id) => {
            sink.append("%");
            sink.append(&module.argument(*id).name);
        }
        Use::Instruction(_, id) => {
            sink.append("%");
            sink.append(module.instruction(*id).name.as_deref().unwrap_or("<unnamed>"));
        }
        Use::Global(_, id) => {
            let global = module.global(*id);
            sink.append(&global.kind.sigil().to_string());
            sink.append(&global.name);
        }
        Use::Function(_, id) => {
            sink.append("@");
            sink.append(&module.function(*id).name);
        }
        Use::Literal(_, literal) => sink.append(&literal.render()),
        Use::Constant(_, kind) => print_kind(module, kind, sink),
    }
}

fn print_type(module: &Module, ty: &Type, sink: &mut dyn Sink) {
    match ty {
        Type::Void => sink.append("void"),
        Type::Tensor(t) => {
            sink.append(&t.data_type.token());
            if !t.is_scalar() {
                sink.append(" ");
                print_shape(&t.shape, sink);
            }
        }
        Type::Tuple(elements) => {
            sink.append("(");
            for (i, e) in elements.iter().enumerate() {
                if i > 0 {
                    sink.append(", ");
                }
                print_type(module, e, sink);
            }
            sink.append(")");
        }
        Type::Array(inner) => {
            sink.append("array<");
            print_type(module, inner, sink);
            sink.append(">");
        }
        Type::Alias(id) => sink.append(&module.alias(*id).name),
        Type::Struct(id) => sink.append(&module.struct_type(*id).name),
        Type::Function(f) => {
            sink.append("(");
            for (i, a) in f.arguments.iter().enumerate() {
                if i > 0 {
                    sink.append(", ");
                }
                print_type(module, a, sink);
            }
            sink.append(") -> ");
            print_type(module, &f.result, sink);
        }
        Type::Pointer(inner) => {
            sink.append("pointer<");
            print_type(module, inner, sink);
            sink.append(">");
        }
        Type::Box(inner) => {
            sink.append("box<");
            print_type(module, inner, sink);
            sink.append(">");
        }
        Type::Invalid => sink.append("<invalid>"),
    }
}

fn print_shape(shape: &Shape, sink: &mut dyn Sink) {
    sink.append("[");
    sink.append(&shape.iter().map(u64::to_string).collect::<Vec<_>>().join("x"));
    sink.append("]");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::ir::FunctionAttributes;

    #[test]
    fn minimal_function_prints_exactly() {
        let mut builder = Builder::new("M");
        let f = builder.build_function("f", Vec::new(), Type::Void, FunctionAttributes::empty()).unwrap();
        let entry = builder.find_block(f, "entry").unwrap();
        builder.move_to(Some(entry)).unwrap();
        builder.return_(None).unwrap();

        let module = builder.finish();
        let mut out = String::new();
        print_module(&module, &mut out);

        assert_eq!(
            out,
            "module M\n\n\nfunc @f() {\nentry():\n    return\n}\n\n\n"
        );
    }

    #[test]
    fn add_instruction_prints_typed_operands() {
        let mut builder = Builder::new("M");
        let f = builder
            .build_function("g", vec![("a".into(), Type::scalar(DataType::f32())), ("b".into(), Type::scalar(DataType::f32()))], Type::scalar(DataType::f32()), FunctionAttributes::empty())
            .unwrap();
        let entry = builder.find_block(f, "entry").unwrap();
        builder.move_to(Some(entry)).unwrap();
        let a = builder.use_of_argument(module_arg(&builder, f, "a"));
        let b = builder.use_of_argument(module_arg(&builder, f, "b"));
        let sum = builder.add(a, b, None).unwrap();
        let result = builder.use_of(sum);
        builder.return_(Some(result)).unwrap();

        let module = builder.finish();
        let mut out = String::new();
        print_module(&module, &mut out);
        assert!(out.contains("%v0 = add f32 %a, f32 %b"));
        assert!(out.contains("return f32 %v0"));
    }

    fn module_arg(builder: &Builder, f: crate::arena::Id<crate::ir::FunctionData>, name: &str) -> crate::arena::Id<crate::ir::ArgumentData> {
        builder.module().function(f).arguments.get(name).unwrap()
    }
}

//! A minimal well-formedness pass over a finished [`Module`].
//!
//! This is deliberately narrow: it checks the handful of invariants the
//! builder cannot already guarantee by construction (every instruction
//! the builder creates is typed from well-typed operands at creation
//! time), not a full analysis suite. It exists so a module built by hand
//! from malformed pieces — e.g. by a test exercising `Use`s directly, or
//! by a future textual parser — has somewhere to be rejected.

use crate::arena::Id;
use crate::error::VerificationError;
use crate::inst::BranchTarget;
use crate::ir::{FunctionData, Module};
use crate::value::Use;

/// Walks every function in `module` and collects every well-formedness
/// violation found. An empty result means `module` is well-formed.
pub struct Verifier<'m> {
    module: &'m Module,
}

impl<'m> Verifier<'m> {
    #[must_use]
    pub fn new(module: &'m Module) -> Self {
        Verifier { module }
    }

    #[must_use]
    pub fn run(&self) -> Vec<VerificationError> {
        let mut errors = Vec::new();
        // An instruction is "live" iff it still appears in its block's
        // instruction list; `unlink_instruction` drops it from there
        // without freeing its arena slot, so this is the set a `Use`
        // must resolve into to not be dangling.
        let mut linked = rustc_hash::FxHashSet::default();
        for function_id in self.module.functions_in_order() {
            for block_id in self.module.function(function_id).blocks_in_order() {
                linked.extend(self.module.block(block_id).instructions.iter().copied());
            }
        }

        for function_id in self.module.functions_in_order() {
            let function = self.module.function(function_id);
            for block_id in function.blocks_in_order() {
                let block = self.module.block(block_id);
                if !block.is_complete(self.module) {
                    errors.push(VerificationError::MalformedTerminator(block.name.clone()));
                }
                for &instruction_id in &block.instructions {
                    let instruction = self.module.instruction(instruction_id);
                    let label = instruction
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("<{}>", instruction_id.index()));

                    for use_ in operands_of(&instruction.kind) {
                        if let Use::Instruction(_, referent) = use_ {
                            if !linked.contains(referent) {
                                errors.push(VerificationError::DanglingUse {
                                    user: label.clone(),
                                    referent: self
                                        .module
                                        .instruction(*referent)
                                        .name
                                        .clone()
                                        .unwrap_or_else(|| "<unnamed>".to_string()),
                                });
                                continue;
                            }
                        }
                        let declared = self.module.type_of_use(use_);
                        if &declared != use_.ascribed_type() {
                            errors.push(VerificationError::TypeMismatch {
                                instruction: label.clone(),
                                expected: format!("{:?}", declared),
                                found: format!("{:?}", use_.ascribed_type()),
                            });
                        }
                    }

                    // Invariant 4: branch/conditional targets stay inside
                    // this function, and their argument lists match the
                    // target block's declared parameters in both arity
                    // and type. The builder never checks this (§4.3) —
                    // targets are plain `Id`s it trusts the caller to
                    // have resolved correctly — so it's the verifier's
                    // job alone.
                    match &instruction.kind {
                        crate::inst::InstructionKind::Branch { target } => {
                            check_branch_target(self.module, function_id, &label, target, &mut errors);
                        }
                        crate::inst::InstructionKind::Conditional { when_true, when_false, .. } => {
                            check_branch_target(self.module, function_id, &label, when_true, &mut errors);
                            check_branch_target(self.module, function_id, &label, when_false, &mut errors);
                        }
                        _ => {}
                    }

                    match instruction.kind.result_type() {
                        Some(computed) if computed == instruction.result_type => {}
                        Some(computed) => errors.push(VerificationError::TypeMismatch {
                            instruction: label.clone(),
                            expected: format!("{:?}", computed),
                            found: format!("{:?}", instruction.result_type),
                        }),
                        None => errors.push(VerificationError::TypeMismatch {
                            instruction: label,
                            expected: "well-typed operands".to_string(),
                            found: "ill-typed operands".to_string(),
                        }),
                    }
                }
            }
        }
        errors
    }
}

/// Checks invariant 4 for a single branch target: the target block
/// belongs to the same function as the branching instruction, and the
/// argument list handed to it matches the target block's declared
/// parameters in both count and type.
fn check_branch_target(
    module: &Module,
    function_id: Id<FunctionData>,
    label: &str,
    target: &BranchTarget,
    errors: &mut Vec<VerificationError>,
) {
    let target_block = module.block(target.block);
    if target_block.function != function_id {
        errors.push(VerificationError::MalformedTerminator(format!(
            "{} (branch target `{}` belongs to a different function)",
            label, target_block.name
        )));
        return;
    }

    let expected_arity = target_block.arguments.len();
    if target.arguments.len() != expected_arity {
        errors.push(VerificationError::TypeMismatch {
            instruction: label.to_string(),
            expected: format!("{} branch argument(s)", expected_arity),
            found: format!("{} branch argument(s)", target.arguments.len()),
        });
        return;
    }

    for (arg, (_, param_id)) in target.arguments.iter().zip(target_block.arguments.iter()) {
        let param_type = &module.argument(param_id).ty;
        if arg.ascribed_type() != param_type {
            errors.push(VerificationError::TypeMismatch {
                instruction: label.to_string(),
                expected: format!("{:?}", param_type),
                found: format!("{:?}", arg.ascribed_type()),
            });
        }
    }
}

/// Every [`Use`] an instruction consumes directly (branch-target
/// arguments included), for the per-operand type check above.
fn operands_of(kind: &crate::inst::InstructionKind) -> Vec<&Use> {
    use crate::inst::InstructionKind::*;
    let mut out = Vec::new();
    match kind {
        Binary { lhs, rhs, .. } => { out.push(lhs); out.push(rhs); }
        Unary { operand, .. } => out.push(operand),
        MatrixMultiply { lhs, rhs } => { out.push(lhs); out.push(rhs); }
        Transpose { operand } => out.push(operand),
        Reduce { operand, .. } | Scan { operand, .. } => out.push(operand),
        Concatenate { operands, .. } => out.extend(operands.iter()),
        ShapeCast { operand, .. } | DataTypeCast { operand, .. } => out.push(operand),
        Tuple { elements } => out.extend(elements.iter()),
        Extract { source, .. } => out.push(source),
        Insert { value, destination, .. } => { out.push(value); out.push(destination); }
        ElementPointer { source, .. } => out.push(source),
        Load { pointer } => out.push(pointer),
        Store { value, destination } => { out.push(value); out.push(destination); }
        AllocateHeap { count, .. } => out.push(count),
        AllocateBox { .. } => {}
        ProjectBox { boxed } => out.push(boxed),
        Deallocate { value } => out.push(value),
        Apply { callee, arguments } => { out.push(callee); out.extend(arguments.iter()); }
        Gradient { function, output, .. } => { out.push(function); out.push(output); }
        Branch { target } => out.extend(target.arguments.iter()),
        Conditional { condition, when_true, when_false } => {
            out.push(condition);
            out.extend(when_true.arguments.iter());
            out.extend(when_false.arguments.iter());
        }
        Return { value } => out.extend(value.iter()),
    }
    out
}

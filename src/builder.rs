//! The builder: the only way new entities enter a [`Module`].
//!
//! A `Builder` owns its `Module` outright and exposes every construction
//! entry point from `§4.3` of the design: struct/alias/global/function
//! declarations, basic blocks, and one instruction constructor per op
//! class. It maintains the positioning (`currentBlock`) and naming
//! (`v{N}` counter, disambiguation) state those constructors depend on,
//! and fails fast on the handful of structural errors a caller can get
//! wrong at construction time — everything else is left to
//! [`crate::verify::Verifier`].

use tracing::{debug, instrument, trace};

use crate::arena::Id;
use crate::error::BuilderError;
use crate::inst::{AssociativeOp, BinaryOp, BranchTarget, InstructionKind, UnaryOp};
use crate::ir::{
    ArgumentData, BasicBlockData, FunctionAttributes, FunctionData, GlobalValueData,
    GlobalValueKind, InstructionData, Module, NamedSet, StructAttributes, StructTypeData,
    TypeAliasData,
};
use crate::ty::{BroadcastingConfig, DataType, ElementKey, Shape, Type};
use crate::value::Use;

/// Incrementally constructs a [`Module`], tracking an insertion point and
/// the naming state needed to mint and disambiguate SSA names.
pub struct Builder {
    module: Module,
    current_block: Option<Id<BasicBlockData>>,
    current_function: Option<Id<FunctionData>>,
}

impl Builder {
    #[must_use]
    pub fn new(module_name: impl Into<String>) -> Self {
        Builder { module: Module::new(module_name), current_block: None, current_function: None }
    }

    #[must_use]
    pub fn module(&self) -> &Module { &self.module }

    /// Consumes the builder, returning the module it built.
    #[must_use]
    pub fn finish(self) -> Module { self.module }

    #[must_use]
    pub fn current_block(&self) -> Option<Id<BasicBlockData>> { self.current_block }

    #[must_use]
    pub fn current_function(&self) -> Option<Id<FunctionData>> { self.current_function }

    /// Sets the insertion point. Moving to a block owned by a different
    /// function than the previous one is transparent: each function
    /// keeps its own `v{N}` counter, so nothing needs to be reset here.
    pub fn move_to(&mut self, block: Option<Id<BasicBlockData>>) -> Result<(), BuilderError> {
        if let Some(b) = block {
            self.check_block_id(b)?;
        }
        self.current_function = block.map(|b| self.module.block(b).function);
        self.current_block = block;
        Ok(())
    }

    /// Rejects `id`s that don't index into this builder's own module —
    /// e.g. a `Id<FunctionData>` minted by a different `Builder` — before
    /// any method indexes straight into an arena with it.
    fn check_function_id(&self, id: Id<FunctionData>) -> Result<(), BuilderError> {
        if (id.index() as usize) < self.module.functions_arena.len() {
            Ok(())
        } else {
            Err(BuilderError::UnknownFunction(format!("{:?}", id)))
        }
    }

    /// As [`Builder::check_function_id`], for basic block ids.
    fn check_block_id(&self, id: Id<BasicBlockData>) -> Result<(), BuilderError> {
        if (id.index() as usize) < self.module.blocks_arena.len() {
            Ok(())
        } else {
            Err(BuilderError::UnknownBasicBlock(format!("{:?}", id)))
        }
    }

    // ---- module-scope declarations: fail fast on name collision ----

    #[instrument(skip(self, fields))]
    pub fn build_struct(
        &mut self,
        name: impl Into<String>,
        fields: Vec<(String, Type)>,
        attributes: StructAttributes,
    ) -> Result<Id<StructTypeData>, BuilderError> {
        let name = name.into();
        if self.module.structs.contains(&name) {
            return Err(BuilderError::DuplicateName { scope: "module structs".to_string(), name });
        }
        let mut seen = rustc_hash::FxHashSet::default();
        for (field_name, _) in &fields {
            if !seen.insert(field_name.clone()) {
                return Err(BuilderError::DuplicateName { scope: format!("struct `{}` fields", name), name: field_name.clone() });
            }
        }
        trace!(%name, fields = fields.len(), "building struct");
        let id = self.module.structs_arena.push(StructTypeData { name: name.clone(), fields, attributes });
        self.module.structs.insert(name, id);
        Ok(id)
    }

    #[instrument(skip(self))]
    pub fn build_alias(
        &mut self,
        name: impl Into<String>,
        ty: Option<Type>,
    ) -> Result<Id<TypeAliasData>, BuilderError> {
        let name = name.into();
        if self.module.aliases.contains(&name) {
            return Err(BuilderError::DuplicateName { scope: "module aliases".to_string(), name });
        }
        trace!(%name, "building type alias");
        let id = self.module.aliases_arena.push(TypeAliasData { name: name.clone(), ty });
        self.module.aliases.insert(name, id);
        Ok(id)
    }

    #[instrument(skip(self, initializer))]
    pub fn build_global_value(
        &mut self,
        name: impl Into<String>,
        kind: GlobalValueKind,
        ty: Type,
        initializer: Use,
    ) -> Result<Id<GlobalValueData>, BuilderError> {
        let name = name.into();
        if self.module.globals.contains(&name) {
            return Err(BuilderError::DuplicateName { scope: "module globals".to_string(), name });
        }
        trace!(%name, ?kind, "building global value");
        let id = self.module.globals_arena.push(GlobalValueData { name: name.clone(), kind, ty, initializer });
        self.module.globals.insert(name, id);
        Ok(id)
    }

    /// Creates a function together with its `entry` block, whose
    /// arguments are the very same [`ArgumentData`] entries as the
    /// function's own argument list (they are one set, not two copies of
    /// it — invariant in §3: "the first [block] being `entry` whose
    /// arguments equal the function's arguments").
    #[instrument(skip(self, arguments))]
    pub fn build_function(
        &mut self,
        name: impl Into<String>,
        arguments: Vec<(String, Type)>,
        result: Type,
        attributes: FunctionAttributes,
    ) -> Result<Id<FunctionData>, BuilderError> {
        let name = name.into();
        if self.module.functions.contains(&name) {
            return Err(BuilderError::DuplicateName { scope: "module functions".to_string(), name });
        }
        let mut seen = rustc_hash::FxHashSet::default();
        for (arg_name, _) in &arguments {
            if !seen.insert(arg_name.clone()) {
                return Err(BuilderError::DuplicateName { scope: format!("function `{}` arguments", name), name: arg_name.clone() });
            }
        }

        let function_id = self.module.functions_arena.push(FunctionData {
            name: name.clone(),
            arguments: NamedSet::new(),
            result,
            attributes,
            blocks: NamedSet::new(),
            entry: Id::dangling(),
            names_in_scope: rustc_hash::FxHashSet::default(),
            next_value_number: 0,
        });
        let entry_id = self.module.blocks_arena.push(BasicBlockData {
            name: "entry".to_string(),
            function: function_id,
            arguments: NamedSet::new(),
            instructions: Vec::new(),
        });
        self.module.functions_arena[function_id].entry = entry_id;
        self.module.functions_arena[function_id].blocks.insert("entry".to_string(), entry_id);
        self.module.functions_arena[function_id].names_in_scope.insert("entry".to_string());

        for (arg_name, arg_type) in arguments {
            let argument_id =
                self.module.arguments_arena.push(ArgumentData { name: arg_name.clone(), ty: arg_type, block: entry_id });
            self.module.blocks_arena[entry_id].arguments.insert(arg_name.clone(), argument_id);
            self.module.functions_arena[function_id].arguments.insert(arg_name.clone(), argument_id);
            self.module.functions_arena[function_id].names_in_scope.insert(arg_name);
        }

        trace!(%name, "building function");
        self.module.functions.insert(name, function_id);
        Ok(function_id)
    }

    /// Creates a basic block in `function`, or returns its existing
    /// `entry` block unchanged if `name == "entry"` (invariant 6).
    /// Otherwise the name is disambiguated, never rejected.
    #[instrument(skip(self, arguments))]
    pub fn build_basic_block(
        &mut self,
        function: Id<FunctionData>,
        name: impl Into<String>,
        arguments: Vec<(String, Type)>,
    ) -> Result<Id<BasicBlockData>, BuilderError> {
        self.check_function_id(function)?;
        let name = name.into();
        if name == "entry" {
            return Ok(self.module.function(function).entry);
        }

        let resolved = disambiguate(&self.module.functions_arena[function].names_in_scope, &name);
        let was_disambiguated = resolved != name;
        let block_id = self.module.blocks_arena.push(BasicBlockData {
            name: resolved.clone(),
            function,
            arguments: NamedSet::new(),
            instructions: Vec::new(),
        });
        self.module.functions_arena[function].blocks.insert(resolved.clone(), block_id);
        self.module.functions_arena[function].names_in_scope.insert(resolved.clone());

        let mut seen = rustc_hash::FxHashSet::default();
        for (arg_name, _) in &arguments {
            if !seen.insert(arg_name.clone()) || self.module.functions_arena[function].names_in_scope.contains(arg_name) {
                return Err(BuilderError::DuplicateName {
                    scope: format!("block `{}` arguments", resolved),
                    name: arg_name.clone(),
                });
            }
        }
        for (arg_name, arg_type) in arguments {
            let argument_id =
                self.module.arguments_arena.push(ArgumentData { name: arg_name.clone(), ty: arg_type, block: block_id });
            self.module.blocks_arena[block_id].arguments.insert(arg_name.clone(), argument_id);
            self.module.functions_arena[function].names_in_scope.insert(arg_name);
        }

        if was_disambiguated {
            debug!(function = %self.module.function(function).name, requested = %name, resolved, "disambiguated basic block name");
        } else {
            trace!(function = %self.module.function(function).name, block = %resolved, "building basic block");
        }
        Ok(block_id)
    }

    // ---- instruction construction ----

    /// Appends `kind` to the current block. If the result type is void
    /// the instruction is unnamed regardless of `name`; otherwise `name`
    /// is used (or a fresh `v{N}` is minted) and then disambiguated.
    #[instrument(skip(self, kind))]
    pub fn build_instruction(
        &mut self,
        kind: InstructionKind,
        name: Option<String>,
    ) -> Result<Id<InstructionData>, BuilderError> {
        let block_id = self.current_block.ok_or(BuilderError::NoInsertionPoint)?;
        let function_id = self.current_function.expect("current_function tracks current_block");
        // Operand type-checking is the verifier's job, not the builder's
        // (§4.3): an instruction whose operands don't type-check still
        // gets built, with `Invalid` standing in for its unknowable
        // result type until `Verifier::run` flags it.
        let result_type = kind.result_type().unwrap_or(Type::Invalid);

        let mut was_disambiguated = false;
        let final_name = if result_type.is_void() {
            None
        } else {
            let candidate = name.unwrap_or_else(|| {
                let function = &mut self.module.functions_arena[function_id];
                let n = function.next_value_number;
                function.next_value_number += 1;
                format!("v{}", n)
            });
            let resolved = disambiguate(&self.module.functions_arena[function_id].names_in_scope, &candidate);
            was_disambiguated = resolved != candidate;
            Some(resolved)
        };

        let instruction_id = self.module.instructions_arena.push(InstructionData {
            name: final_name.clone(),
            kind,
            result_type,
            block: block_id,
        });
        self.module.blocks_arena[block_id].instructions.push(instruction_id);
        if let Some(name) = &final_name {
            self.module.functions_arena[function_id].names_in_scope.insert(name.clone());
        }
        if was_disambiguated {
            debug!(instruction = ?final_name, "disambiguated instruction name");
        } else {
            trace!(instruction = ?final_name, "building instruction");
        }
        Ok(instruction_id)
    }

    /// A typed reference to an instruction this builder has already
    /// created, for chaining into the next instruction's operands.
    #[must_use]
    pub fn use_of(&self, id: Id<InstructionData>) -> Use {
        Use::Instruction(self.module.instruction(id).result_type.clone(), id)
    }

    /// Unlinks `id` from its parent block's instruction list. The
    /// instruction's arena slot is untouched — any `Use` still pointing
    /// at it keeps resolving to its data — but it no longer appears in
    /// its block, so [`crate::verify::Verifier`] will flag any remaining
    /// user as a dangling use. Modeled after a transform pass deleting
    /// dead code: the definition is gone, the references to it are the
    /// caller's problem to clean up first.
    pub fn unlink_instruction(&mut self, id: Id<InstructionData>) {
        let block_id = self.module.instruction(id).block;
        self.module.blocks_arena[block_id].instructions.retain(|&i| i != id);
    }

    #[must_use]
    pub fn use_of_argument(&self, id: Id<ArgumentData>) -> Use {
        Use::Argument(self.module.argument(id).ty.clone(), id)
    }

    #[must_use]
    pub fn use_of_global(&self, id: Id<GlobalValueData>) -> Use {
        Use::Global(self.module.global(id).ty.clone(), id)
    }

    #[must_use]
    pub fn use_of_function(&self, id: Id<FunctionData>) -> Use {
        Use::Function(self.module.function(id).function_type(&self.module), id)
    }

    /// Resolves a basic block by name within `function`.
    pub fn find_block(&self, function: Id<FunctionData>, name: &str) -> Result<Id<BasicBlockData>, BuilderError> {
        self.check_function_id(function)?;
        self.module
            .function(function)
            .blocks
            .get(name)
            .ok_or_else(|| BuilderError::UnknownBasicBlock(name.to_string()))
    }

    // ---- convenience constructors: pure sugar over build_instruction ----

    pub fn binary(
        &mut self,
        op: BinaryOp,
        lhs: Use,
        rhs: Use,
        broadcasting: Option<BroadcastingConfig>,
        name: Option<String>,
    ) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Binary { op, lhs, rhs, broadcasting }, name)
    }

    pub fn add(&mut self, lhs: Use, rhs: Use, broadcasting: Option<BroadcastingConfig>) -> Result<Id<InstructionData>, BuilderError> {
        self.binary(BinaryOp::Add, lhs, rhs, broadcasting, None)
    }

    pub fn subtract(&mut self, lhs: Use, rhs: Use, broadcasting: Option<BroadcastingConfig>) -> Result<Id<InstructionData>, BuilderError> {
        self.binary(BinaryOp::Subtract, lhs, rhs, broadcasting, None)
    }

    pub fn multiply(&mut self, lhs: Use, rhs: Use, broadcasting: Option<BroadcastingConfig>) -> Result<Id<InstructionData>, BuilderError> {
        self.binary(BinaryOp::Multiply, lhs, rhs, broadcasting, None)
    }

    pub fn divide(&mut self, lhs: Use, rhs: Use, broadcasting: Option<BroadcastingConfig>) -> Result<Id<InstructionData>, BuilderError> {
        self.binary(BinaryOp::Divide, lhs, rhs, broadcasting, None)
    }

    pub fn power(&mut self, lhs: Use, rhs: Use, broadcasting: Option<BroadcastingConfig>) -> Result<Id<InstructionData>, BuilderError> {
        self.binary(BinaryOp::Power, lhs, rhs, broadcasting, None)
    }

    /// Any of the six comparison operators; always yields a bool tensor.
    pub fn compare(
        &mut self,
        op: BinaryOp,
        lhs: Use,
        rhs: Use,
        broadcasting: Option<BroadcastingConfig>,
    ) -> Result<Id<InstructionData>, BuilderError> {
        debug_assert!(op.is_comparison());
        self.binary(op, lhs, rhs, broadcasting, None)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Unary { op, operand }, None)
    }

    pub fn matrix_multiply(&mut self, lhs: Use, rhs: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::MatrixMultiply { lhs, rhs }, None)
    }

    pub fn transpose(&mut self, operand: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Transpose { operand }, None)
    }

    pub fn reduce(&mut self, op: AssociativeOp, operand: Use, axis: usize) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Reduce { op, operand, axis }, None)
    }

    pub fn scan(&mut self, op: AssociativeOp, operand: Use, axis: usize) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Scan { op, operand, axis }, None)
    }

    pub fn concatenate(&mut self, operands: Vec<Use>, axis: usize) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Concatenate { operands, axis }, None)
    }

    pub fn shape_cast(&mut self, operand: Use, shape: Shape) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::ShapeCast { operand, shape }, None)
    }

    pub fn data_type_cast(&mut self, operand: Use, data_type: DataType) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::DataTypeCast { operand, data_type }, None)
    }

    /// Sugar over `dataTypeCast`: reinterprets the same bits under a new
    /// data type rather than converting the value.
    pub fn bit_cast(&mut self, operand: Use, data_type: DataType) -> Result<Id<InstructionData>, BuilderError> {
        self.data_type_cast(operand, data_type)
    }

    pub fn tuple(&mut self, elements: Vec<Use>) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Tuple { elements }, None)
    }

    pub fn extract(&mut self, source: Use, keys: Vec<ElementKey>) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Extract { source, keys }, None)
    }

    pub fn insert(&mut self, value: Use, destination: Use, keys: Vec<ElementKey>) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Insert { value, destination, keys }, None)
    }

    pub fn element_pointer(&mut self, source: Use, keys: Vec<ElementKey>) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::ElementPointer { source, keys }, None)
    }

    pub fn load(&mut self, pointer: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Load { pointer }, None)
    }

    pub fn store(&mut self, value: Use, destination: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Store { value, destination }, None)
    }

    pub fn allocate_heap(&mut self, element_type: Type, count: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::AllocateHeap { element_type, count }, None)
    }

    pub fn allocate_box(&mut self, element_type: Type) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::AllocateBox { element_type }, None)
    }

    pub fn project_box(&mut self, boxed: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::ProjectBox { boxed }, None)
    }

    pub fn deallocate(&mut self, value: Use) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Deallocate { value }, None)
    }

    pub fn apply(&mut self, callee: Use, arguments: Vec<Use>) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Apply { callee, arguments }, None)
    }

    pub fn gradient(
        &mut self,
        function: Use,
        output: Use,
        with_respect_to: Vec<usize>,
        keeping: Vec<usize>,
    ) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Gradient { function, output, with_respect_to, keeping }, None)
    }

    pub fn branch(&mut self, target: BranchTarget) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Branch { target }, None)
    }

    pub fn conditional(
        &mut self,
        condition: Use,
        when_true: BranchTarget,
        when_false: BranchTarget,
    ) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Conditional { condition, when_true, when_false }, None)
    }

    pub fn return_(&mut self, value: Option<Use>) -> Result<Id<InstructionData>, BuilderError> {
        self.build_instruction(InstructionKind::Return { value }, None)
    }
}

/// Disambiguates `candidate` against `names_in_scope`: the candidate
/// itself if free, otherwise `candidate.1`, `candidate.2`, … up to the
/// first free suffix.
fn disambiguate(names_in_scope: &rustc_hash::FxHashSet<String>, candidate: &str) -> String {
    if !names_in_scope.contains(candidate) {
        return candidate.to_string();
    }
    let mut n = 1u32;
    loop {
        let attempt = format!("{}.{}", candidate, n);
        if !names_in_scope.contains(&attempt) {
            return attempt;
        }
        n += 1;
    }
}

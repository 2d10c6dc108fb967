//! The IR containers: Module, Function, BasicBlock, Instruction,
//! Argument, GlobalValue, StructType and TypeAlias, and the named,
//! order-preserving tables that hold them.

use bitflags::bitflags;
use indexmap::IndexMap;
use rustc_hash::FxHashSet;

use crate::arena::{Arena, Id};
use crate::inst::InstructionKind;
use crate::ty::Type;
use crate::value::Use;

bitflags! {
    /// Attributes attached to a function declaration.
    #[derive(Default)]
    pub struct FunctionAttributes: u32 {
        /// The function is a registered autodiff target: a `gradient`
        /// instruction may reference it.
        const DIFFERENTIABLE = 0b001;
        /// The function is an external declaration with no body beyond
        /// its `entry` block (reserved for a future declaration-only
        /// builder entry point; unused by the current builder surface).
        const EXTERNAL = 0b010;
        /// The function should not be inlined by an optimizer.
        const NO_INLINE = 0b100;
    }
}

bitflags! {
    /// Attributes attached to a struct type declaration.
    #[derive(Default)]
    pub struct StructAttributes: u32 {
        /// Fields are laid out in declaration order with no reordering
        /// for packing.
        const PACKED = 0b001;
    }
}

/// An ordered, name-keyed table. Insertion order is preserved (so it
/// doubles as the "ordered sequence" half of the data model) and lookup
/// by name is O(1) (the "fast by-name lookup" half). Name collisions are
/// rejected by the builder before an entry ever reaches this table, so
/// `NamedSet` itself does not need to re-check uniqueness.
#[derive(Debug)]
pub struct NamedSet<T> {
    entries: IndexMap<String, Id<T>>,
}

impl<T> Default for NamedSet<T> {
    fn default() -> Self { NamedSet { entries: IndexMap::new() } }
}

impl<T> NamedSet<T> {
    #[must_use] pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, name: String, id: Id<T>) {
        self.entries.insert(name, id);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Id<T>> {
        self.entries.get(name).copied()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Id<T>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> + '_ {
        self.entries.values().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

/// A block parameter: a named, typed value owned by exactly one basic
/// block.
#[derive(Debug)]
pub struct ArgumentData {
    pub name: String,
    pub ty: Type,
    pub block: Id<BasicBlockData>,
}

/// An instruction: optionally named (named iff its kind's result type is
/// non-void), owned by exactly one basic block.
#[derive(Debug)]
pub struct InstructionData {
    pub name: Option<String>,
    pub kind: InstructionKind,
    pub result_type: Type,
    pub block: Id<BasicBlockData>,
}

/// A basic block: an ordered set of arguments (block parameters) and an
/// ordered sequence of instructions, owned by exactly one function.
#[derive(Debug)]
pub struct BasicBlockData {
    pub name: String,
    pub function: Id<FunctionData>,
    pub arguments: NamedSet<ArgumentData>,
    pub instructions: Vec<Id<InstructionData>>,
}

impl BasicBlockData {
    /// The block's argument IDs in declaration order.
    pub fn argument_ids(&self) -> impl Iterator<Item = Id<ArgumentData>> + '_ {
        self.arguments.ids()
    }

    /// Whether the block's last instruction is a terminator. An empty
    /// block is not complete (invariant 5).
    #[must_use]
    pub fn is_complete(&self, module: &Module) -> bool {
        self.instructions
            .last()
            .is_some_and(|id| module.instruction(*id).kind.is_terminator())
    }
}

/// A function: an ordered list of typed arguments, a result type, a set
/// of attributes, and an ordered sequence of basic blocks beginning with
/// `entry`.
#[derive(Debug)]
pub struct FunctionData {
    pub name: String,
    pub arguments: NamedSet<ArgumentData>,
    pub result: Type,
    pub attributes: FunctionAttributes,
    pub blocks: NamedSet<BasicBlockData>,
    pub entry: Id<BasicBlockData>,
    /// Every name bound anywhere in this function — arguments, block
    /// names and named instructions share one namespace (invariant 6),
    /// so the builder checks collisions against this single set rather
    /// than against each sub-table individually.
    pub(crate) names_in_scope: FxHashSet<String>,
    /// Counter behind auto-generated `v{N}` instruction names, reset to
    /// zero at the start of each function.
    pub(crate) next_value_number: u32,
}

impl FunctionData {
    #[must_use]
    pub fn function_type(&self, module: &Module) -> Type {
        let arguments = self
            .arguments
            .ids()
            .map(|id| module.argument(id).ty.clone())
            .collect();
        Type::Function(crate::ty::FunctionType { arguments, result: Box::new(self.result.clone()) })
    }
}

/// The kind of a module-scope [`GlobalValueData`]: a `placeholder`
/// (externally-supplied input, printed and referenced with `%`), a
/// mutable `variable`, or a declared `output`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlobalValueKind {
    Constant,
    Variable,
    Output,
}

impl GlobalValueKind {
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            GlobalValueKind::Constant => "placeholder",
            GlobalValueKind::Variable => "variable",
            GlobalValueKind::Output => "output",
        }
    }

    /// The sigil used to print and reference this global: a `Constant`
    /// (placeholder) behaves like a local value at reference sites,
    /// everything else like a module-scope value.
    #[must_use]
    pub fn sigil(self) -> char {
        match self {
            GlobalValueKind::Constant => '%',
            GlobalValueKind::Variable | GlobalValueKind::Output => '@',
        }
    }
}

/// A named, module-scope value with an initializer.
#[derive(Debug)]
pub struct GlobalValueData {
    pub name: String,
    pub kind: GlobalValueKind,
    pub ty: Type,
    pub initializer: Use,
}

/// A nominal struct type: an ordered list of named, typed fields.
#[derive(Debug)]
pub struct StructTypeData {
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub attributes: StructAttributes,
}

impl StructTypeData {
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }
}

/// A name bound to an optional type. `ty: None` models a forward
/// declaration (an opaque alias yet to be resolved).
#[derive(Debug)]
pub struct TypeAliasData {
    pub name: String,
    pub ty: Option<Type>,
}

/// The top-level IR container: owns every function, global value,
/// struct type and type alias in the program, realized as per-kind
/// arenas (§3's "arena-based implementation" strategy).
#[derive(Debug)]
pub struct Module {
    pub name: String,

    pub(crate) functions_arena: Arena<FunctionData>,
    pub(crate) blocks_arena: Arena<BasicBlockData>,
    pub(crate) instructions_arena: Arena<InstructionData>,
    pub(crate) arguments_arena: Arena<ArgumentData>,
    pub(crate) globals_arena: Arena<GlobalValueData>,
    pub(crate) structs_arena: Arena<StructTypeData>,
    pub(crate) aliases_arena: Arena<TypeAliasData>,

    pub functions: NamedSet<FunctionData>,
    pub globals: NamedSet<GlobalValueData>,
    pub structs: NamedSet<StructTypeData>,
    pub aliases: NamedSet<TypeAliasData>,
}

impl Module {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            functions_arena: Arena::new(),
            blocks_arena: Arena::new(),
            instructions_arena: Arena::new(),
            arguments_arena: Arena::new(),
            globals_arena: Arena::new(),
            structs_arena: Arena::new(),
            aliases_arena: Arena::new(),
            functions: NamedSet::new(),
            globals: NamedSet::new(),
            structs: NamedSet::new(),
            aliases: NamedSet::new(),
        }
    }

    #[must_use] pub fn function(&self, id: Id<FunctionData>) -> &FunctionData { &self.functions_arena[id] }
    #[must_use] pub fn block(&self, id: Id<BasicBlockData>) -> &BasicBlockData { &self.blocks_arena[id] }
    #[must_use] pub fn instruction(&self, id: Id<InstructionData>) -> &InstructionData { &self.instructions_arena[id] }
    #[must_use] pub fn argument(&self, id: Id<ArgumentData>) -> &ArgumentData { &self.arguments_arena[id] }
    #[must_use] pub fn global(&self, id: Id<GlobalValueData>) -> &GlobalValueData { &self.globals_arena[id] }
    #[must_use] pub fn struct_type(&self, id: Id<StructTypeData>) -> &StructTypeData { &self.structs_arena[id] }
    #[must_use] pub fn alias(&self, id: Id<TypeAliasData>) -> &TypeAliasData { &self.aliases_arena[id] }

    /// Resolves the type a [`Use`] must carry per invariant 3: the
    /// referent's own declared type.
    #[must_use]
    pub fn type_of_use(&self, use_: &Use) -> Type {
        match use_ {
            Use::Argument(_, id) => self.argument(*id).ty.clone(),
            Use::Instruction(_, id) => self.instruction(*id).result_type.clone(),
            Use::Global(_, id) => self.global(*id).ty.clone(),
            Use::Function(_, id) => self.function(*id).function_type(self),
            Use::Literal(t, _) => t.clone(),
            Use::Constant(_, kind) => kind.result_type().unwrap_or(Type::Invalid),
        }
    }

    /// Functions in declaration order.
    pub fn functions_in_order(&self) -> impl Iterator<Item = Id<FunctionData>> + '_ {
        self.functions.ids()
    }

    /// Global values in declaration order.
    pub fn globals_in_order(&self) -> impl Iterator<Item = Id<GlobalValueData>> + '_ {
        self.globals.ids()
    }
}

impl FunctionData {
    /// Basic blocks in declaration order, `entry` first.
    pub fn blocks_in_order(&self) -> impl Iterator<Item = Id<BasicBlockData>> + '_ {
        self.blocks.ids()
    }
}
